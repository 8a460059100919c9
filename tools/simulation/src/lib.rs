//! Liquidity Provider Incentive Simulation
//!
//! Step-driven model of a market-maker incentive mechanism for a derivatives
//! market. Liquidity providers commit stake and a fee bid; the market derives
//! a valuation from traded volume, a target stake from open interest and a
//! fee rate from a stake-weighted auction over the bids, and providers earn
//! equity-weighted fee revenue.
//!
//! # Modules
//! - `stats` - Standard normal CDF and quantile
//! - `risk` - Log-normal risk model (probability of trading, ES risk factors)
//! - `book` - Pricing context and per-side order book shapes
//! - `provider` - Liquidity provider commitments, implied volume, margin
//! - `market` - Market configuration, step updates, snapshots
//! - `history` - Append-only snapshot arena (`attach`, `next`)
//! - `view` - Derived market and provider queries at a step
//! - `export` - CSV / JSON / numeric table export of a history
//! - `series` - Historical candle ingestion and replay
//! - `scenarios` - Seeded market paths and the incentive scenario

pub mod stats;
pub mod risk;
pub mod book;
pub mod provider;
pub mod market;
pub mod history;
pub mod view;
pub mod export;
pub mod series;
pub mod scenarios;

pub use history::MarketHistory;
pub use market::{MarketConfig, StepUpdate, ZeroOverride};
pub use provider::LiquidityProvider;
pub use view::{MarketView, ProviderView};

/// Crate version constant
pub const VERSION: &str = "1.0.0";
