//! Synthetic market paths
//!
//! Daily observations from a seeded generator: geometric Brownian motion for
//! the mark price, log-normal traded volume, and open interest as a
//! mean-reverting multiple of volume.

use crate::series::Observation;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use types::numeric::{Price, Volume, DAYS_PER_YEAR};

/// Configuration for a synthetic market path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketPathConfig {
    pub seed: u64,
    pub days: usize,
    pub initial_price: Price,
    /// Annualised price drift
    pub drift: f64,
    /// Annualised price volatility
    pub volatility: f64,
    /// Median daily traded volume
    pub base_volume: Volume,
    /// Log-volatility of daily volume
    pub volume_volatility: f64,
    /// Long-run open interest as a multiple of daily volume
    pub open_interest_ratio: f64,
    /// Fraction of the gap to the long-run multiple closed each day
    pub open_interest_reversion: f64,
    /// Daily noise on the open interest multiple
    pub open_interest_noise: f64,
}

impl Default for MarketPathConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            days: 30,
            initial_price: 1000.0,
            drift: 0.0,
            volatility: 0.8,
            base_volume: 10_000.0,
            volume_volatility: 0.3,
            open_interest_ratio: 0.5,
            open_interest_reversion: 0.2,
            open_interest_noise: 0.05,
        }
    }
}

/// Deterministic daily path generator.
pub struct MarketPath {
    config: MarketPathConfig,
    price: Price,
    open_interest_multiple: f64,
    rng: ChaCha8Rng,
}

impl MarketPath {
    /// Create a generator; the same config always yields the same path.
    pub fn new(config: MarketPathConfig) -> Self {
        Self {
            price: config.initial_price,
            open_interest_multiple: config.open_interest_ratio,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        }
    }

    /// Box-Muller standard normal draw.
    fn standard_normal(&mut self) -> f64 {
        // 1 - U(0,1] keeps ln away from zero
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Advance one day.
    pub fn step(&mut self) -> Observation {
        let dt = 1.0 / DAYS_PER_YEAR;
        let sigma = self.config.volatility;
        let z_price = self.standard_normal();
        self.price *= ((self.config.drift - 0.5 * sigma * sigma) * dt
            + sigma * dt.sqrt() * z_price)
            .exp();

        let vol_sigma = self.config.volume_volatility;
        let z_volume = self.standard_normal();
        let traded_volume =
            self.config.base_volume * (vol_sigma * z_volume - 0.5 * vol_sigma * vol_sigma).exp();

        let z_oi = self.standard_normal();
        self.open_interest_multiple = (self.open_interest_multiple
            + self.config.open_interest_reversion
                * (self.config.open_interest_ratio - self.open_interest_multiple)
            + self.config.open_interest_noise * z_oi)
            .max(0.0);

        Observation {
            mark_price: self.price,
            traded_volume,
            open_interest: Some(self.open_interest_multiple * traded_volume),
        }
    }

    /// All `days` observations of the configured path.
    pub fn generate(config: MarketPathConfig) -> Vec<Observation> {
        let days = config.days;
        let mut path = Self::new(config);
        (0..days).map(|_| path.step()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_output() {
        let a = MarketPath::generate(MarketPathConfig::default());
        let b = MarketPath::generate(MarketPathConfig::default());
        assert_eq!(a, b);
        assert_eq!(a.len(), 30);
    }

    #[test]
    fn test_different_seeds_different_output() {
        let a = MarketPath::generate(MarketPathConfig::default());
        let b = MarketPath::generate(MarketPathConfig {
            seed: 7,
            ..Default::default()
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_observations_valid() {
        let path = MarketPath::generate(MarketPathConfig {
            days: 365,
            ..Default::default()
        });
        for obs in &path {
            assert!(obs.mark_price.is_finite() && obs.mark_price > 0.0);
            assert!(obs.traded_volume.is_finite() && obs.traded_volume > 0.0);
            let oi = obs.open_interest.unwrap();
            assert!(oi.is_finite() && oi >= 0.0);
        }
    }

    #[test]
    fn test_zero_volatility_is_flat() {
        let path = MarketPath::generate(MarketPathConfig {
            volatility: 0.0,
            volume_volatility: 0.0,
            open_interest_noise: 0.0,
            ..Default::default()
        });
        for obs in &path {
            assert!((obs.mark_price - 1000.0).abs() < 1e-9);
            assert!((obs.traded_volume - 10_000.0).abs() < 1e-9);
            assert!((obs.open_interest.unwrap() - 5_000.0).abs() < 1e-9);
        }
    }
}
