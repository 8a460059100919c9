//! Liquidity provider commitments
//!
//! A [`LiquidityProvider`] is a plain value: name, stake, fee bid and the
//! optional book shapes on each side. It joins a market through
//! [`MarketHistory::attach`](crate::history::MarketHistory::attach), which
//! records the entry valuation. Market-dependent figures (equity, shares,
//! returns) are read through [`ProviderView`](crate::view::ProviderView).

use crate::book::{OrderSetForSide, PricingContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use types::errors::{BookError, ProviderError};
use types::ids::ProviderId;
use types::numeric::{Rate, Volume, PROB_TRADING_FLOOR};

/// A liquidity provider's commitment and fee bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityProvider {
    name: ProviderId,
    stake: f64,
    fee_bid: Rate,
    sell_side_shape: Option<OrderSetForSide>,
    buy_side_shape: Option<OrderSetForSide>,
    entry_valuation: f64,
}

/// Liquidity and margin of the obligation-meeting book on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySummary {
    pub obligation: f64,
    pub bid_liquidity: f64,
    pub offer_liquidity: f64,
    /// min(bid, offer): the binding side
    pub supplied_liquidity: f64,
    pub bid_margin: f64,
    pub offer_margin: f64,
    /// max(bid, offer)
    pub charged_margin: f64,
}

impl LiquidityProvider {
    /// Create a commitment without book shapes.
    pub fn new(
        name: impl Into<ProviderId>,
        stake: f64,
        fee_bid: Rate,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        if !stake.is_finite() || stake < 0.0 {
            return Err(ProviderError::InvalidStake {
                name: name.to_string(),
                stake,
            });
        }
        Ok(Self {
            name,
            stake,
            fee_bid,
            sell_side_shape: None,
            buy_side_shape: None,
            entry_valuation: 0.0,
        })
    }

    /// Attach book shapes; each must be flagged for the slot it fills.
    pub fn with_shapes(
        mut self,
        sell_side_shape: Option<OrderSetForSide>,
        buy_side_shape: Option<OrderSetForSide>,
    ) -> Result<Self, ProviderError> {
        if let Some(shape) = &sell_side_shape {
            if !shape.is_sell_side() {
                return Err(ProviderError::SideMismatch {
                    slot: "sell_side_shape",
                    is_sell_side: false,
                });
            }
        }
        if let Some(shape) = &buy_side_shape {
            if shape.is_sell_side() {
                return Err(ProviderError::SideMismatch {
                    slot: "buy_side_shape",
                    is_sell_side: true,
                });
            }
        }
        self.sell_side_shape = sell_side_shape;
        self.buy_side_shape = buy_side_shape;
        Ok(self)
    }

    pub fn name(&self) -> &ProviderId {
        &self.name
    }

    pub fn stake(&self) -> f64 {
        self.stake
    }

    pub fn fee_bid(&self) -> Rate {
        self.fee_bid
    }

    pub fn sell_side_shape(&self) -> Option<&OrderSetForSide> {
        self.sell_side_shape.as_ref()
    }

    pub fn buy_side_shape(&self) -> Option<&OrderSetForSide> {
        self.buy_side_shape.as_ref()
    }

    /// Market valuation when the commitment was attached.
    pub fn entry_valuation(&self) -> f64 {
        self.entry_valuation
    }

    pub(crate) fn set_entry_valuation(&mut self, valuation: f64) {
        self.entry_valuation = valuation;
    }

    /// Divide each fraction by their sum.
    pub fn normalise_fractions(fractions: &[f64]) -> Result<Vec<f64>, BookError> {
        let norm_factor: f64 = fractions.iter().sum();
        if norm_factor.is_nan() || norm_factor <= 0.0 {
            return Err(BookError::InvalidLiquidityFractions { sum: norm_factor });
        }
        Ok(fractions.iter().map(|f| f / norm_factor).collect())
    }

    /// Pegged volume per tick needed on top of the limit orders of `shape` to
    /// reach `obligation`, distributed by the normalised liquidity fractions.
    ///
    /// Ticks with probability of trading at or below 1e-10 get no volume.
    /// Volumes are rounded up to whole units.
    pub fn volume_meeting_obligation(
        &self,
        shape: &OrderSetForSide,
        ctx: &PricingContext,
        obligation: f64,
    ) -> Result<Vec<Volume>, BookError> {
        shape.check_fractions(ctx)?;
        let limit_order_liquidity = shape.calculate_limit_order_liquidity(ctx)?;
        let remaining_obligation = (obligation - limit_order_liquidity).max(0.0);
        let vol_shape = Self::normalise_fractions(shape.liquidity_fractions())?;

        let implied = vol_shape
            .iter()
            .enumerate()
            .map(|(i, fraction)| {
                let level = ctx.price_level(shape.side(), i);
                let prob_trading = ctx.prob_of_trading(level);
                if prob_trading > PROB_TRADING_FLOOR {
                    (remaining_obligation * fraction / prob_trading / level).ceil()
                } else {
                    0.0
                }
            })
            .collect();
        Ok(implied)
    }

    /// Limit orders plus pegged volume: the book that meets the obligation.
    pub fn obligation_volume(
        &self,
        shape: &OrderSetForSide,
        ctx: &PricingContext,
        obligation: f64,
    ) -> Result<Vec<Volume>, BookError> {
        let implied = self.volume_meeting_obligation(shape, ctx, obligation)?;
        Ok(shape
            .limit_orders()
            .iter()
            .zip(implied)
            .map(|(limit, pegged)| limit + pegged)
            .collect())
    }

    /// True iff limit order liquidity plus the liquidity of `vol_array`
    /// strictly exceeds `obligation`.
    pub fn check_if_volume_meets_obligation(
        &self,
        vol_array: &[Volume],
        shape: &OrderSetForSide,
        ctx: &PricingContext,
        obligation: f64,
    ) -> Result<bool, BookError> {
        let additional = shape.calculate_liquidity(ctx, vol_array)?;
        let limit_order_liquidity = shape.calculate_limit_order_liquidity(ctx)?;
        Ok(limit_order_liquidity + additional > obligation)
    }

    /// Margin of the obligation-meeting book summed over the present sides.
    pub fn margin(&self, ctx: &PricingContext, obligation: f64) -> Result<f64, BookError> {
        let mut margin = 0.0;
        for shape in [&self.sell_side_shape, &self.buy_side_shape].into_iter().flatten() {
            let volume = self.obligation_volume(shape, ctx, obligation)?;
            margin += shape.calculate_margin(ctx, &volume)?;
        }
        Ok(margin)
    }

    /// Liquidity and margin per side of the obligation-meeting book. An absent
    /// side supplies no liquidity and charges no margin.
    pub fn liquidity_summary(
        &self,
        ctx: &PricingContext,
        obligation: f64,
    ) -> Result<LiquiditySummary, BookError> {
        let side_figures = |shape: Option<&OrderSetForSide>| -> Result<(f64, f64), BookError> {
            match shape {
                Some(shape) => {
                    let volume = self.obligation_volume(shape, ctx, obligation)?;
                    Ok((
                        shape.calculate_liquidity(ctx, &volume)?,
                        shape.calculate_margin(ctx, &volume)?,
                    ))
                }
                None => Ok((0.0, 0.0)),
            }
        };
        let (bid_liquidity, bid_margin) = side_figures(self.buy_side_shape())?;
        let (offer_liquidity, offer_margin) = side_figures(self.sell_side_shape())?;

        Ok(LiquiditySummary {
            obligation,
            bid_liquidity,
            offer_liquidity,
            supplied_liquidity: bid_liquidity.min(offer_liquidity),
            bid_margin,
            offer_margin,
            charged_margin: bid_margin.max(offer_margin),
        })
    }
}

impl fmt::Display for LiquidityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(stake={}, fee_bid={})",
            self.name, self.stake, self.fee_bid
        )
    }
}
