//! Liquidity mechanism network parameters
//!
//! One immutable bundle per market snapshot. Each snapshot owns its own copy,
//! so replacing the parameters at step `n` never rewrites earlier steps.

use crate::errors::LiquidityError;
use serde::{Deserialize, Serialize};

/// Network parameters of the liquidity incentive mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Liquidity {
    /// Multiple of open interest targeted for coverage by liquidity providers
    pub c2: f64,
    /// Multiple of the target coverage required as stake to secure the obligation
    pub v: f64,
    /// Obligation per unit of committed stake (`obligation = k * stake`)
    pub k: f64,
    /// Days over which the MAXIMUM open interest sets the stake target
    pub stake_target_period: usize,
    /// Days over which the SUM of traded volume sets the valuation
    pub valuation_period: usize,
}

impl Liquidity {
    /// Create a validated parameter set.
    pub fn new(
        c2: f64,
        v: f64,
        k: f64,
        stake_target_period: usize,
        valuation_period: usize,
    ) -> Result<Self, LiquidityError> {
        let params = Self {
            c2,
            v,
            k,
            stake_target_period,
            valuation_period,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check multipliers are finite and non-negative and windows are non-empty.
    pub fn validate(&self) -> Result<(), LiquidityError> {
        for (name, value) in [("c2", self.c2), ("v", self.v), ("k", self.k)] {
            if !value.is_finite() || value < 0.0 {
                return Err(LiquidityError::InvalidParameter {
                    name,
                    value: value.to_string(),
                });
            }
        }
        if self.stake_target_period == 0 {
            return Err(LiquidityError::InvalidParameter {
                name: "stake_target_period",
                value: "0".to_string(),
            });
        }
        if self.valuation_period == 0 {
            return Err(LiquidityError::InvalidParameter {
                name: "valuation_period",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Liquidity {
    fn default() -> Self {
        Self {
            c2: 1.0,
            v: 5.0,
            k: 1.0,
            stake_target_period: 7,
            valuation_period: 1,
        }
    }
}
