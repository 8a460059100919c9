//! Log-normal risk model
//!
//! Probability of trading and Expected-Shortfall margin factors under a
//! log-normal price diffusion over one time step `tau` (in years).

use crate::stats::{normal_cdf, normal_quantile, normal_sf};
use serde::{Deserialize, Serialize};
use types::errors::RiskError;
use types::numeric::Price;

/// One minute expressed in years.
pub const ONE_MINUTE_IN_YEARS: f64 = 1.0 / 60.0 / 24.0 / 365.25;

/// Price diffusion parameters used for margining and probability of trading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskModel {
    /// Annualised drift
    pub mu: f64,
    /// Annualised volatility
    pub sigma: f64,
    /// Horizon in years
    pub tau: f64,
    /// Tail probability for Expected Shortfall
    pub lambd: f64,
}

impl RiskModel {
    /// Create a validated risk model.
    pub fn new(mu: f64, sigma: f64, tau: f64, lambd: f64) -> Result<Self, RiskError> {
        let model = Self { mu, sigma, tau, lambd };
        model.validate()?;
        Ok(model)
    }

    /// Requires `tau >= 0`, `sigma > 0` and `0 <= lambd <= 1`.
    pub fn validate(&self) -> Result<(), RiskError> {
        let valid = self.mu.is_finite()
            && self.tau.is_finite()
            && self.tau >= 0.0
            && self.sigma.is_finite()
            && self.sigma > 0.0
            && (0.0..=1.0).contains(&self.lambd);
        if valid {
            Ok(())
        } else {
            Err(RiskError::InvalidParameters {
                tau: self.tau,
                sigma: self.sigma,
                lambd: self.lambd,
            })
        }
    }

    /// Volatility over the horizon: `sqrt(tau) * sigma`.
    pub fn sigma_bar(&self) -> f64 {
        self.tau.sqrt() * self.sigma
    }

    /// Log-return drift over the horizon: `(mu - sigma^2 / 2) * tau`.
    pub fn mu_bar(&self) -> f64 {
        (self.mu - 0.5 * self.sigma * self.sigma) * self.tau
    }

    fn es_scale(&self) -> f64 {
        let sigma_bar = self.sigma_bar();
        (self.mu_bar() * sigma_bar * sigma_bar * 0.5).exp()
    }

    /// Margin factor for long exposure at confidence `1 - lambd`.
    pub fn risk_factor_long(&self) -> f64 {
        if self.lambd == 0.0 {
            return 1.0;
        }
        let quantile = normal_quantile(self.lambd);
        let log_normal_es =
            -(1.0 / self.lambd) * self.es_scale() * normal_cdf(quantile - self.sigma_bar());
        log_normal_es + 1.0
    }

    /// Margin factor for short exposure at confidence `1 - lambd`.
    ///
    /// Unbounded as `lambd` goes to zero, so `lambd == 0` yields infinity.
    pub fn risk_factor_short(&self) -> f64 {
        if self.lambd == 0.0 {
            return f64::INFINITY;
        }
        // Upper quantile by symmetry, 1 - lambd would round away the tail
        let quantile = -normal_quantile(self.lambd);
        let negative_log_normal_es =
            (1.0 / self.lambd) * self.es_scale() * normal_sf(quantile - self.sigma_bar());
        negative_log_normal_es - 1.0
    }

    /// Probability that the price moves from `mid` to reach `level` within `tau`.
    ///
    /// Upper tail for levels above mid, lower tail (CDF) otherwise. Non-positive
    /// prices cannot trade. With a zero horizon only `level == mid` trades.
    pub fn prob_of_trading(&self, mid: Price, level: Price) -> f64 {
        if mid <= 0.0 || level <= 0.0 {
            return 0.0;
        }
        let sigma_bar = self.sigma_bar();
        if sigma_bar == 0.0 {
            return if level == mid { 1.0 } else { 0.0 };
        }
        let trans_level = ((level / mid).ln() - self.mu_bar()) / sigma_bar;
        if mid < level {
            normal_sf(trans_level)
        } else {
            normal_cdf(trans_level)
        }
    }
}

impl Default for RiskModel {
    fn default() -> Self {
        Self {
            mu: 0.0,
            sigma: 2.0,
            tau: ONE_MINUTE_IN_YEARS,
            lambd: 0.001,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_risk_factors_non_negative(
            mu in 0.0f64..0.5,
            sigma in 0.5f64..3.0,
            tau in 1e-6f64..(1.0 / 365.0),
            lambd in 0.001f64..0.5,
        ) {
            let model = RiskModel::new(mu, sigma, tau, lambd).unwrap();
            prop_assert!(model.risk_factor_long() >= 0.0);
            prop_assert!(model.risk_factor_short() >= 0.0);
        }

        #[test]
        fn prop_prob_at_mid_near_half(
            sigma in 0.1f64..3.0,
            tau in 1e-6f64..(1.0 / 365.0),
            mid in 1.0f64..100_000.0,
        ) {
            let model = RiskModel::new(0.0, sigma, tau, 0.01).unwrap();
            let p = model.prob_of_trading(mid, mid);
            // Exactly Φ(sigma_bar / 2) for zero drift
            prop_assert!((p - 0.5).abs() <= 0.5 * model.sigma_bar() + 1e-6);
        }

        #[test]
        fn prop_prob_rises_toward_mid(
            sigma in 0.1f64..3.0,
            tau in 1e-4f64..(1.0 / 365.0),
            mid in 100.0f64..10_000.0,
        ) {
            let model = RiskModel::new(0.0, sigma, tau, 0.01).unwrap();
            let tick = mid * 0.001;
            let mut previous = 0.0;
            for i in (1..=20).rev() {
                let p = model.prob_of_trading(mid, mid - tick * i as f64);
                prop_assert!(p + 1e-6 >= previous);
                previous = p;
            }
            let mut previous = 1.0;
            for i in 1..=20 {
                let p = model.prob_of_trading(mid, mid + tick * i as f64);
                prop_assert!(p <= previous + 1e-6);
                previous = p;
            }
        }
    }
}
