// crates/accrue-replay/src/config.rs
//
// Scenario files for the replay tool: distribution parameters, a log level,
// and an ordered list of steps. Loaded from TOML.

use std::fs;

use accrue_core::{Dec, DistributionParams};
use serde::Deserialize;

use crate::runner::ReplayError;

/// A complete replay scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub params: DistributionParams,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Denomination used for every amount in the scenario.
    #[serde(default = "default_denom")]
    pub denom: String,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_denom() -> String {
    "stake".to_string()
}

fn default_block_count() -> u64 {
    1
}

/// Token amount. TOML integers stop at i64, so larger amounts are written
/// as strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Int(u64),
    Text(String),
}

impl Amount {
    pub fn value(&self) -> Result<u128, ReplayError> {
        match self {
            Amount::Int(v) => Ok(u128::from(*v)),
            Amount::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| ReplayError::Config(format!("invalid amount {:?}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Vote {
    pub validator: String,
    pub power: u64,
}

/// One scenario step. Each step runs at the current block height.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    CreateValidator {
        validator: String,
        commission_rate: Dec,
        #[serde(default = "zero_amount")]
        self_bond: Amount,
    },
    Delegate {
        delegator: String,
        validator: String,
        amount: Amount,
    },
    Undelegate {
        delegator: String,
        validator: String,
        shares: Dec,
    },
    Slash {
        validator: String,
        fraction: Dec,
    },
    /// Fund the module account and credit one validator directly.
    Allocate {
        validator: String,
        amount: Amount,
    },
    /// Fund the module account and split fees by voting power.
    AllocateBlock {
        total_power: u64,
        votes: Vec<Vote>,
        fees: Amount,
    },
    Withdraw {
        delegator: String,
        validator: String,
    },
    WithdrawCommission {
        validator: String,
    },
    SetWithdrawAddress {
        delegator: String,
        address: String,
    },
    RemoveValidator {
        validator: String,
    },
    NextBlock {
        #[serde(default = "default_block_count")]
        count: u64,
    },
}

fn zero_amount() -> Amount {
    Amount::Int(0)
}

impl ScenarioConfig {
    pub fn parse(contents: &str) -> Result<Self, ReplayError> {
        let config: ScenarioConfig =
            toml::from_str(contents).map_err(|e| ReplayError::Config(e.to_string()))?;
        config.params.validate()?;
        Ok(config)
    }

    /// Load a scenario from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, ReplayError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ReplayError::Config(format!("cannot read {}: {}", path, e)))?;
        Self::parse(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScenarioConfig::parse("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.denom, "stake");
        assert_eq!(config.params, DistributionParams::default());
        assert!(config.steps.is_empty());
    }

    #[test]
    fn test_step_parsing() {
        let config = ScenarioConfig::parse(
            r#"
            [params]
            community_tax = "0.05"

            [[step]]
            action = "create_validator"
            validator = "val1"
            commission_rate = "0.1"
            self_bond = 100

            [[step]]
            action = "allocate_block"
            total_power = 10
            fees = "340282366920938463463374607431768211455"
            votes = [{ validator = "val1", power = 10 }]

            [[step]]
            action = "next_block"
            "#,
        )
        .unwrap();

        assert_eq!(config.params.community_tax, Dec::percent(5));
        assert_eq!(config.steps.len(), 3);
        match &config.steps[0] {
            Step::CreateValidator { self_bond, .. } => assert_eq!(self_bond.value().unwrap(), 100),
            other => panic!("unexpected step {:?}", other),
        }
        match &config.steps[1] {
            Step::AllocateBlock { fees, votes, .. } => {
                assert_eq!(fees.value().unwrap(), u128::MAX);
                assert_eq!(votes[0].power, 10);
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(config.steps[2], Step::NextBlock { count: 1 });
    }

    #[test]
    fn test_rejects_invalid_params() {
        assert!(ScenarioConfig::parse("[params]\ncommunity_tax = \"1.5\"\n").is_err());
        assert!(ScenarioConfig::parse("[[step]]\naction = \"teleport\"\n").is_err());
    }

    #[test]
    fn test_bad_amount_text() {
        assert!(Amount::Text("12abc".into()).value().is_err());
        assert_eq!(Amount::Text(" 42 ".into()).value().unwrap(), 42);
    }
}
