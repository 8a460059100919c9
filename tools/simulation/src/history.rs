//! Market history arena
//!
//! [`MarketHistory`] owns every snapshot of one market, indexed by step.
//! Stepping clones the latest snapshot, applies the observations and appends
//! it; nothing already in history is modified afterwards.

use crate::market::{check_observation, MarketConfig, MarketSnapshot, StepUpdate, ZeroOverride};
use crate::provider::LiquidityProvider;
use crate::view::MarketView;
use std::ops::Index;
use tracing::{debug, info, warn};
use types::errors::{MarketError, MechanismError};

/// Append-only history of one market.
#[derive(Debug, Clone)]
pub struct MarketHistory {
    snapshots: Vec<MarketSnapshot>,
    zero_override: ZeroOverride,
}

impl MarketHistory {
    /// Validate `config` and create a history holding step zero.
    pub fn new(config: MarketConfig) -> Result<Self, MechanismError> {
        config.liquidity.validate()?;
        config.risk_model.validate()?;
        let initial = MarketSnapshot::initial(&config)?;

        info!(
            market = %initial.name,
            mark_price = initial.mark_price,
            num_ticks = initial.num_ticks,
            tick_size = initial.tick_size,
            "Market history created"
        );

        Ok(Self {
            snapshots: vec![initial],
            zero_override: config.zero_override,
        })
    }

    /// Commit a provider to the latest snapshot.
    ///
    /// The entry valuation is the latest valuation before registration. A
    /// provider already registered under the same name is replaced in place.
    pub fn attach(&mut self, mut lp: LiquidityProvider) -> MarketView<'_> {
        let n = self.latest_index();
        let entry_valuation = self.view_at(n).valuation();
        lp.set_entry_valuation(entry_valuation);

        let name = lp.name().clone();
        let stake = lp.stake();
        let latest = &mut self.snapshots[n];
        if let Some(replaced) = latest.register(lp) {
            warn!(
                market = %latest.name,
                provider = %name,
                old_stake = replaced.stake(),
                new_stake = stake,
                "Provider commitment overwritten"
            );
        } else {
            info!(
                market = %latest.name,
                provider = %name,
                stake,
                entry_valuation,
                step = n,
                "Provider attached"
            );
        }
        self.view_at(n)
    }

    /// Step forward one period.
    ///
    /// Unsupplied observations carry forward from the latest snapshot, as does
    /// the liquidity configuration. Validation happens before anything is
    /// appended.
    pub fn next(&mut self, update: StepUpdate) -> Result<MarketView<'_>, MechanismError> {
        for (field, value) in [
            ("traded_volume", update.traded_volume),
            ("open_interest", update.open_interest),
            ("mark_price", update.mark_price),
        ] {
            if let Some(value) = value {
                check_observation(field, value)?;
            }
        }
        if let Some(liquidity) = &update.liquidity {
            liquidity.validate()?;
        }

        let n = self.snapshots.len();
        let zero_override = self.zero_override;
        let mut next = self.latest().clone();
        next.set_n(n);
        next.traded_volume = resolve(update.traded_volume, next.traded_volume, zero_override);
        next.open_interest = resolve(update.open_interest, next.open_interest, zero_override);
        next.mark_price = resolve(update.mark_price, next.mark_price, zero_override);
        if let Some(liquidity) = update.liquidity {
            next.liquidity = liquidity;
        }

        debug!(
            market = %next.name,
            step = n,
            mark_price = next.mark_price,
            traded_volume = next.traded_volume,
            open_interest = next.open_interest,
            "Market stepped"
        );

        self.snapshots.push(next);
        Ok(self.view_at(n))
    }

    pub fn get(&self, n: usize) -> Option<&MarketSnapshot> {
        self.snapshots.get(n)
    }

    /// Derived queries at step `n`.
    pub fn view(&self, n: usize) -> Result<MarketView<'_>, MarketError> {
        if n >= self.snapshots.len() {
            return Err(MarketError::UnknownStep {
                step: n,
                len: self.snapshots.len(),
            });
        }
        Ok(self.view_at(n))
    }

    /// Derived queries at the latest step.
    pub fn current(&self) -> MarketView<'_> {
        self.view_at(self.latest_index())
    }

    pub fn latest(&self) -> &MarketSnapshot {
        &self.snapshots[self.latest_index()]
    }

    /// Number of snapshots, including step zero.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always false: step zero exists from construction.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarketSnapshot> {
        self.snapshots.iter()
    }

    /// Views over every step, oldest first.
    pub fn views(&self) -> impl Iterator<Item = MarketView<'_>> {
        (0..self.snapshots.len()).map(move |n| self.view_at(n))
    }

    pub fn snapshots(&self) -> &[MarketSnapshot] {
        &self.snapshots
    }

    fn latest_index(&self) -> usize {
        self.snapshots.len() - 1
    }

    fn view_at(&self, n: usize) -> MarketView<'_> {
        MarketView::new(&self.snapshots, n)
    }
}

impl Index<usize> for MarketHistory {
    type Output = MarketSnapshot;

    fn index(&self, n: usize) -> &MarketSnapshot {
        &self.snapshots[n]
    }
}

fn resolve(supplied: Option<f64>, previous: f64, zero_override: ZeroOverride) -> f64 {
    match (supplied, zero_override) {
        (Some(value), ZeroOverride::Fallback) if value == 0.0 => previous,
        (Some(value), _) => value,
        (None, _) => previous,
    }
}
