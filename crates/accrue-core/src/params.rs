// crates/accrue-core/src/params.rs
//
// Distribution parameters, loaded from a TOML file or populated with defaults.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::dec::Dec;
use crate::error::AccrueError;

/// Read-only parameters consumed by allocation and withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionParams {
    /// Share of each block's fees diverted to the community pool, in [0, 1].
    #[serde(default = "default_community_tax")]
    pub community_tax: Dec,

    /// Whether delegators may redirect rewards to another account.
    #[serde(default = "default_withdraw_addr_enabled")]
    pub withdraw_addr_enabled: bool,
}

fn default_community_tax() -> Dec {
    Dec::percent(2)
}

fn default_withdraw_addr_enabled() -> bool {
    true
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            community_tax: default_community_tax(),
            withdraw_addr_enabled: default_withdraw_addr_enabled(),
        }
    }
}

impl DistributionParams {
    /// Load parameters from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, AccrueError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| AccrueError::Storage(format!("failed to read {}: {}", path, e)))?;
        let params: DistributionParams = toml::from_str(&contents)
            .map_err(|e| AccrueError::Serialization(format!("invalid params in {}: {}", path, e)))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), AccrueError> {
        if self.community_tax.is_negative() || self.community_tax > Dec::one() {
            return Err(AccrueError::InvalidAmount(format!(
                "community tax {} must lie in [0, 1]",
                self.community_tax
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let params: DistributionParams = toml::from_str("").unwrap();
        assert_eq!(params, DistributionParams::default());
        assert_eq!(params.community_tax.to_string(), "0.02");
        assert!(params.withdraw_addr_enabled);
    }

    #[test]
    fn test_parse_string_tax() {
        let params: DistributionParams =
            toml::from_str("community_tax = \"0.1\"\nwithdraw_addr_enabled = false").unwrap();
        assert_eq!(params.community_tax, Dec::percent(10));
        assert!(!params.withdraw_addr_enabled);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tax_above_one() {
        let params = DistributionParams {
            community_tax: Dec::from(2u64),
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(AccrueError::InvalidAmount(_))));
    }
}
