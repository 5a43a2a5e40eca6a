use thiserror::Error;

/// Engine-wide error types for the Accrue reward-distribution engine.
#[derive(Debug, Error)]
pub enum AccrueError {
    /// Negative or malformed input amount, rate, or fraction.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// No delegation (or no starting info) for the delegator/validator pair.
    #[error("No delegation exists: {0}")]
    NoDelegationExists(String),

    /// The stake source has no record of the validator.
    #[error("No validator exists: {0}")]
    NoValidatorExists(String),

    /// Commission withdrawal requested with nothing accumulated.
    #[error("No validator commission to withdraw: {0}")]
    NoValidatorCommission(String),

    /// Custom withdraw addresses are disabled by parameter.
    #[error("Setting a withdraw address is disabled")]
    WithdrawAddrDisabled,

    /// Bubbled up unchanged from the transfer collaborator.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Bookkeeping invariant violated (negative amount, missing period,
    /// reference count underflow, arithmetic overflow).
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    /// Storage backend error (RocksDB, in-memory store).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Value codec error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AccrueError {
    /// Whether the enclosing transaction must be aborted rather than committed.
    ///
    /// Fatal errors indicate corrupted or unreadable bookkeeping. Everything
    /// else is an ordinary, recoverable rejection surfaced to the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AccrueError::InternalConsistency(_)
                | AccrueError::Storage(_)
                | AccrueError::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for AccrueError {
    fn from(e: serde_json::Error) -> Self {
        AccrueError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AccrueError::InternalConsistency("x".into()).is_fatal());
        assert!(AccrueError::Storage("x".into()).is_fatal());
        assert!(!AccrueError::InvalidAmount("x".into()).is_fatal());
        assert!(!AccrueError::InsufficientFunds("x".into()).is_fatal());
        assert!(!AccrueError::WithdrawAddrDisabled.is_fatal());
    }
}
