//! Error types for the incentive mechanism
//!
//! Comprehensive error taxonomy using thiserror. Every variant is a local,
//! synchronous validation failure raised before any state is mutated.

use thiserror::Error;

/// Top-level mechanism error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MechanismError {
    #[error("Risk model error: {0}")]
    Risk(#[from] RiskError),

    #[error("Liquidity parameter error: {0}")]
    Liquidity(#[from] LiquidityError),

    #[error("Order book error: {0}")]
    Book(#[from] BookError),

    #[error("Liquidity provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),
}

/// Risk model parameter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error(
        "Invalid risk parameters: tau={tau}, sigma={sigma}, lambd={lambd} \
         (need tau >= 0, sigma > 0, 0 <= lambd <= 1)"
    )]
    InvalidParameters { tau: f64, sigma: f64, lambd: f64 },
}

/// Mechanism network parameter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiquidityError {
    #[error("Invalid liquidity parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },
}

/// Order book shape errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookError {
    #[error("Invalid book parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("Volume array must have length equal to number of ticks: expected {expected}, got {actual}")]
    InvalidVolumeArray { expected: usize, actual: usize },

    #[error("Fractions array must have length equal to number of ticks: expected {expected}, got {actual}")]
    InvalidFractionsArray { expected: usize, actual: usize },

    #[error("Liquidity fractions must be non-negative with at least one strictly positive (sum={sum})")]
    InvalidLiquidityFractions { sum: f64 },

    #[error("Invalid entry at tick {index}: {value}")]
    InvalidEntry { index: usize, value: f64 },
}

/// Liquidity provider errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Side mismatch: {slot} shape has is_sell_side={is_sell_side}")]
    SideMismatch { slot: &'static str, is_sell_side: bool },

    #[error("Annualised return undefined for {name}: stake is zero")]
    UndefinedReturn { name: String },

    #[error("Invalid stake for {name}: {stake}")]
    InvalidStake { name: String, stake: f64 },

    #[error("Liquidity provider not found: {name}")]
    NotFound { name: String },
}

/// Market state errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Invalid observation {field}: {value}")]
    InvalidObservation { field: &'static str, value: f64 },

    #[error("Unknown step {step}: history has {len} snapshots")]
    UnknownStep { step: usize, len: usize },

    #[error("Invalid market name: {0:?}")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_error_display() {
        let err = BookError::InvalidVolumeArray { expected: 10, actual: 3 };
        assert!(err.to_string().contains("expected 10, got 3"));
    }

    #[test]
    fn test_provider_error_undefined_return() {
        let err = ProviderError::UndefinedReturn { name: "alice".to_string() };
        assert!(err.to_string().contains("alice"));
        assert!(err.to_string().contains("stake is zero"));
    }

    #[test]
    fn test_mechanism_error_from_book_error() {
        let book_err = BookError::InvalidLiquidityFractions { sum: 0.0 };
        let err: MechanismError = book_err.into();
        assert!(matches!(err, MechanismError::Book(_)));
    }

    #[test]
    fn test_mechanism_error_from_risk_error() {
        let err: MechanismError = RiskError::InvalidParameters {
            tau: -1.0,
            sigma: 1.0,
            lambd: 0.5,
        }
        .into();
        assert!(err.to_string().starts_with("Risk model error"));
    }
}
