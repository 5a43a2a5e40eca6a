// crates/accrue-distribution/src/slash.rs
//
// Slash event log. Every slash closes the validator's current period so the
// stake reduction lines up with a real ledger entry, and the event keeps a
// reference on that entry until the validator is removed.

use tracing::debug;

use accrue_core::{
    AccrueError, Dec, KvStore, StakingSource, TransferSink, ValidatorAddress, ValidatorInfo,
    ValidatorSlashEvent,
};

use crate::keeper::{Context, Keeper};
use crate::state::SLASH_EVENTS;

fn check_fraction(fraction: Dec) -> Result<(), AccrueError> {
    if fraction.is_negative() || fraction > Dec::one() {
        return Err(AccrueError::InvalidAmount(format!(
            "slash fraction {} must lie in [0, 1]",
            fraction
        )));
    }
    Ok(())
}

/// A slash event together with the height it was recorded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSlash {
    pub height: u64,
    pub event: ValidatorSlashEvent,
}

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    pub(crate) fn record_slash<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorInfo,
        fraction: Dec,
    ) -> Result<(), AccrueError> {
        let period = self.increment_period(ctx, val)?;
        self.increment_reference_count(ctx.store, &val.operator, period)?;
        SLASH_EVENTS.save(
            ctx.store,
            &(val.operator.clone(), ctx.height, period),
            &ValidatorSlashEvent {
                validator_period: period,
                fraction,
            },
        )?;
        debug!(validator = %val.operator, height = ctx.height, period, %fraction, "recorded slash event");
        Ok(())
    }

    /// Record that `val` lost `fraction` of its stake at the current height.
    pub fn record_slash_event<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
        fraction: Dec,
    ) -> Result<(), AccrueError> {
        check_fraction(fraction)?;
        let info = self.validator_info(val)?;
        self.atomically(ctx, |k, c| k.record_slash(c, &info, fraction))
    }

    /// Slash events with heights in `[start_height, end_height]`, ordered by
    /// height and then period.
    pub(crate) fn slash_events_between<S: KvStore>(
        &self,
        store: &S,
        val: &ValidatorAddress,
        start_height: u64,
        end_height: u64,
    ) -> Result<Vec<RecordedSlash>, AccrueError> {
        let from = (val.clone(), start_height);
        let to = (val.clone(), end_height);
        Ok(SLASH_EVENTS
            .range(store, &from, &to)?
            .into_iter()
            .map(|((_, height, _), event)| RecordedSlash { height, event })
            .collect())
    }
}
