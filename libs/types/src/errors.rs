//! Error taxonomy for the exchange engine
//!
//! Command-scope errors surface to the requesting client as typed result
//! messages; nothing here propagates past the dispatcher.

use thiserror::Error;

/// Numeric parse/validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("invalid decimal text: {0}")]
    InvalidDecimal(String),

    #[error("value must be positive: {0}")]
    NotPositive(String),

    #[error("value must not be negative: {0}")]
    Negative(String),
}

/// Balance ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds for asset {asset}: required {required}, available {available}")]
    InsufficientFunds {
        asset: String,
        required: String,
        available: String,
    },

    #[error("insufficient locked balance for asset {asset}: required {required}, locked {locked}")]
    InsufficientLocked {
        asset: String,
        required: String,
        locked: String,
    },
}

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("unknown market: {symbol}")]
    UnknownMarket { symbol: String },

    #[error("unknown order: {order_id}")]
    UnknownOrder { order_id: String },

    #[error("order would match own resting order")]
    SelfTrade,

    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },
}

impl From<NumericError> for EngineError {
    fn from(err: NumericError) -> Self {
        EngineError::MalformedInput {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::InsufficientFunds {
            asset: "INR".to_string(),
            required: "1000".to_string(),
            available: "500".to_string(),
        };
        assert!(err.to_string().contains("INR"));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_engine_error_from_ledger_error() {
        let ledger_err = LedgerError::InsufficientFunds {
            asset: "BTC".to_string(),
            required: "1".to_string(),
            available: "0".to_string(),
        };
        let engine_err: EngineError = ledger_err.into();
        assert!(matches!(engine_err, EngineError::Ledger(_)));
    }

    #[test]
    fn test_numeric_error_becomes_malformed_input() {
        let err: EngineError = NumericError::InvalidDecimal("abc".to_string()).into();
        assert!(matches!(err, EngineError::MalformedInput { .. }));
    }
}
