//! Order book shapes
//!
//! An [`OrderSetForSide`] is one side of a liquidity provider's quoted book:
//! resting limit order volume per tick plus the liquidity fractions used to
//! distribute pegged volume. Shapes carry no market reference; every
//! calculation takes the [`PricingContext`] of the snapshot being evaluated,
//! so the same shape is re-priced at each step's mark price.

use crate::risk::RiskModel;
use serde::{Deserialize, Serialize};
use types::errors::BookError;
use types::numeric::{Price, Volume};
use types::order::Side;

/// Book geometry and pricing model of one market snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingContext {
    pub mid: Price,
    pub tick_size: Price,
    pub num_ticks: usize,
    pub risk_model: RiskModel,
}

impl PricingContext {
    /// Validate the book geometry.
    ///
    /// Tick size and count must be positive and the farthest bid level
    /// (`mid - tick_size * num_ticks`) strictly positive.
    pub fn new(
        mid: Price,
        tick_size: Price,
        num_ticks: usize,
        risk_model: RiskModel,
    ) -> Result<Self, BookError> {
        if tick_size <= 0.0 || !tick_size.is_finite() || num_ticks == 0 {
            return Err(BookError::InvalidParameters {
                reason: format!("tick_size={tick_size}, num_ticks={num_ticks}"),
            });
        }
        if !mid.is_finite() || mid - tick_size * num_ticks as f64 <= 0.0 {
            return Err(BookError::InvalidParameters {
                reason: format!(
                    "cannot handle non-positive prices (mid={mid}, tick_size={tick_size}, \
                     num_ticks={num_ticks}): choose higher mid, smaller tick or fewer ticks"
                ),
            });
        }
        Ok(Self {
            mid,
            tick_size,
            num_ticks,
            risk_model,
        })
    }

    /// Price of the `index`-th tick away from mid (0-based, mid excluded).
    pub fn price_level(&self, side: Side, index: usize) -> Price {
        self.mid + side.direction() * self.tick_size * (index + 1) as f64
    }

    /// All tick prices on `side`, nearest to mid first.
    pub fn price_list(&self, side: Side) -> Vec<Price> {
        (0..self.num_ticks).map(|i| self.price_level(side, i)).collect()
    }

    pub fn prob_of_trading(&self, level: Price) -> f64 {
        self.risk_model.prob_of_trading(self.mid, level)
    }

    /// Short factor for offers, long factor for bids.
    pub fn risk_factor(&self, side: Side) -> f64 {
        match side {
            Side::SELL => self.risk_model.risk_factor_short(),
            Side::BUY => self.risk_model.risk_factor_long(),
        }
    }

    fn check_volume_len(&self, actual: usize) -> Result<(), BookError> {
        if actual != self.num_ticks {
            return Err(BookError::InvalidVolumeArray {
                expected: self.num_ticks,
                actual,
            });
        }
        Ok(())
    }

    fn check_fractions_len(&self, actual: usize) -> Result<(), BookError> {
        if actual != self.num_ticks {
            return Err(BookError::InvalidFractionsArray {
                expected: self.num_ticks,
                actual,
            });
        }
        Ok(())
    }
}

/// One side of a liquidity provider's order book shape.
///
/// Deserialized shapes go through the same entry checks as [`OrderSetForSide::new`];
/// tick count is checked against the book when the shape is priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOrderSet")]
pub struct OrderSetForSide {
    side: Side,
    limit_orders: Vec<Volume>,
    liquidity_fractions: Vec<f64>,
}

#[derive(Deserialize)]
struct RawOrderSet {
    side: Side,
    limit_orders: Vec<Volume>,
    liquidity_fractions: Vec<f64>,
}

impl TryFrom<RawOrderSet> for OrderSetForSide {
    type Error = BookError;

    fn try_from(raw: RawOrderSet) -> Result<Self, BookError> {
        if raw.liquidity_fractions.len() != raw.limit_orders.len() {
            return Err(BookError::InvalidFractionsArray {
                expected: raw.limit_orders.len(),
                actual: raw.liquidity_fractions.len(),
            });
        }
        check_entries(&raw.limit_orders)?;
        check_entries(&raw.liquidity_fractions)?;
        Ok(Self {
            side: raw.side,
            limit_orders: raw.limit_orders,
            liquidity_fractions: raw.liquidity_fractions,
        })
    }
}

/// Entries must be finite and non-negative.
fn check_entries(values: &[f64]) -> Result<(), BookError> {
    match values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        Some((index, &value)) => Err(BookError::InvalidEntry { index, value }),
        None => Ok(()),
    }
}

impl OrderSetForSide {
    /// Build a shape validated against the book geometry of `ctx`.
    pub fn new(
        is_sell_side: bool,
        limit_orders: impl Into<Vec<Volume>>,
        liquidity_fractions: impl Into<Vec<f64>>,
        ctx: &PricingContext,
    ) -> Result<Self, BookError> {
        let limit_orders = limit_orders.into();
        let liquidity_fractions = liquidity_fractions.into();

        ctx.check_volume_len(limit_orders.len())?;
        ctx.check_fractions_len(liquidity_fractions.len())?;
        check_entries(&limit_orders)?;
        check_entries(&liquidity_fractions)?;

        Ok(Self {
            side: Side::from_sell_flag(is_sell_side),
            limit_orders,
            liquidity_fractions,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_sell_side(&self) -> bool {
        self.side.is_sell_side()
    }

    pub fn limit_orders(&self) -> &[Volume] {
        &self.limit_orders
    }

    pub fn liquidity_fractions(&self) -> &[f64] {
        &self.liquidity_fractions
    }

    /// Tick prices on this side of mid.
    pub fn price_list(&self, ctx: &PricingContext) -> Vec<Price> {
        ctx.price_list(self.side)
    }

    /// Σ volume × price × probability of trading over the ticks of this side.
    pub fn calculate_liquidity(
        &self,
        ctx: &PricingContext,
        vol_array: &[Volume],
    ) -> Result<f64, BookError> {
        ctx.check_volume_len(vol_array.len())?;
        let liquidity = vol_array
            .iter()
            .enumerate()
            .map(|(i, volume)| {
                let level = ctx.price_level(self.side, i);
                volume * level * ctx.prob_of_trading(level)
            })
            .sum();
        Ok(liquidity)
    }

    pub fn calculate_limit_order_liquidity(&self, ctx: &PricingContext) -> Result<f64, BookError> {
        self.calculate_liquidity(ctx, &self.limit_orders)
    }

    /// Σ risk factor × mid × volume over the ticks of this side.
    pub fn calculate_margin(
        &self,
        ctx: &PricingContext,
        vol_array: &[Volume],
    ) -> Result<f64, BookError> {
        ctx.check_volume_len(vol_array.len())?;
        let risk_factor = ctx.risk_factor(self.side);
        Ok(vol_array.iter().map(|volume| risk_factor * ctx.mid * volume).sum())
    }

    pub(crate) fn check_fractions(&self, ctx: &PricingContext) -> Result<(), BookError> {
        ctx.check_fractions_len(self.liquidity_fractions.len())
    }
}
