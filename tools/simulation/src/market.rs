//! Market snapshots and configuration
//!
//! A [`MarketSnapshot`] is the state of one market at one step: mechanism
//! parameters, the risk model, observables and the committed liquidity
//! providers. Snapshots live in a [`MarketHistory`](crate::history::MarketHistory)
//! arena and are never modified once a later step exists.

use crate::book::PricingContext;
use crate::provider::LiquidityProvider;
use crate::risk::RiskModel;
use serde::{Deserialize, Serialize};
use types::errors::{BookError, MarketError};
use types::ids::{MarketId, ProviderId};
use types::liquidity::Liquidity;
use types::numeric::{Price, Volume};

/// How `next()` treats an observation supplied as exactly zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroOverride {
    /// Zero is read as "not supplied" and the previous value carries forward.
    #[default]
    Fallback,
    /// Zero is recorded as supplied.
    Explicit,
}

/// Initial state of a simulated market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub name: String,
    pub liquidity: Liquidity,
    pub risk_model: RiskModel,
    /// Ticks quoted on each side of mid
    pub num_ticks: usize,
    pub tick_size: Price,
    pub mark_price: Price,
    pub traded_volume: Volume,
    pub open_interest: Volume,
    pub zero_override: ZeroOverride,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            name: "market".to_string(),
            liquidity: Liquidity::default(),
            risk_model: RiskModel::default(),
            num_ticks: 10,
            tick_size: 1.0,
            mark_price: 0.0,
            traded_volume: 0.0,
            open_interest: 0.0,
            zero_override: ZeroOverride::Fallback,
        }
    }
}

impl MarketConfig {
    /// Load a configuration from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Observations and parameter overrides for one step forward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepUpdate {
    pub traded_volume: Option<Volume>,
    pub open_interest: Option<Volume>,
    pub mark_price: Option<Price>,
    pub liquidity: Option<Liquidity>,
}

impl StepUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traded_volume(mut self, volume: Volume) -> Self {
        self.traded_volume = Some(volume);
        self
    }

    pub fn open_interest(mut self, open_interest: Volume) -> Self {
        self.open_interest = Some(open_interest);
        self
    }

    pub fn mark_price(mut self, price: Price) -> Self {
        self.mark_price = Some(price);
        self
    }

    pub fn liquidity(mut self, liquidity: Liquidity) -> Self {
        self.liquidity = Some(liquidity);
        self
    }
}

/// State of one market at one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub name: MarketId,
    pub liquidity: Liquidity,
    pub risk_model: RiskModel,
    pub num_ticks: usize,
    pub tick_size: Price,
    pub mark_price: Price,
    pub traded_volume: Volume,
    pub open_interest: Volume,
    providers: Vec<LiquidityProvider>,
    n: usize,
}

impl MarketSnapshot {
    /// Step zero of a market.
    pub(crate) fn initial(config: &MarketConfig) -> Result<Self, MarketError> {
        let name = MarketId::try_new(config.name.clone())
            .ok_or_else(|| MarketError::InvalidName(config.name.clone()))?;
        check_observation("mark_price", config.mark_price)?;
        check_observation("traded_volume", config.traded_volume)?;
        check_observation("open_interest", config.open_interest)?;
        Ok(Self {
            name,
            liquidity: config.liquidity.clone(),
            risk_model: config.risk_model,
            num_ticks: config.num_ticks,
            tick_size: config.tick_size,
            mark_price: config.mark_price,
            traded_volume: config.traded_volume,
            open_interest: config.open_interest,
            providers: Vec::new(),
            n: 0,
        })
    }

    /// Position in history.
    pub fn n(&self) -> usize {
        self.n
    }

    pub(crate) fn set_n(&mut self, n: usize) {
        self.n = n;
    }

    /// Committed providers in order of first registration.
    pub fn providers(&self) -> &[LiquidityProvider] {
        &self.providers
    }

    pub fn provider(&self, name: &str) -> Option<&LiquidityProvider> {
        self.providers.iter().find(|lp| lp.name() == name)
    }

    pub fn provider_names(&self) -> impl Iterator<Item = &ProviderId> {
        self.providers.iter().map(|lp| lp.name())
    }

    /// Register a provider, replacing any provider of the same name in place.
    /// Returns the replaced provider.
    pub(crate) fn register(&mut self, lp: LiquidityProvider) -> Option<LiquidityProvider> {
        match self.providers.iter_mut().find(|existing| existing.name() == lp.name()) {
            Some(existing) => Some(std::mem::replace(existing, lp)),
            None => {
                self.providers.push(lp);
                None
            }
        }
    }

    /// Book geometry at this step's mark price.
    pub fn pricing_context(&self) -> Result<PricingContext, BookError> {
        PricingContext::new(self.mark_price, self.tick_size, self.num_ticks, self.risk_model)
    }
}

/// Observations must be finite and non-negative.
pub(crate) fn check_observation(field: &'static str, value: f64) -> Result<(), MarketError> {
    if !value.is_finite() || value < 0.0 {
        return Err(MarketError::InvalidObservation { field, value });
    }
    Ok(())
}
