//! Historical market series
//!
//! Candles in the exchange REST format (as cached on disk) are turned into
//! per-step observations and replayed through a [`MarketHistory`]. No network
//! access: callers supply the JSON.

use crate::history::MarketHistory;
use crate::market::StepUpdate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;
use types::errors::MechanismError;
use types::numeric::{Price, Volume};

/// Series ingestion errors
#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("Malformed candle JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read candle file: {0}")]
    Io(#[from] std::io::Error),
}

/// One OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub start_time: DateTime<Utc>,
    /// Start time in epoch milliseconds
    pub time: f64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Volume,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CandleFile {
    Envelope { result: Vec<Candle> },
    Bare(Vec<Candle>),
}

/// Parse candles from a `{"result": [...]}` envelope or a bare array.
pub fn parse_candles(json: &str) -> Result<Vec<Candle>, SeriesError> {
    let candles = match serde_json::from_str(json)? {
        CandleFile::Envelope { result } => result,
        CandleFile::Bare(candles) => candles,
    };
    Ok(candles)
}

/// Read and parse a cached candle file.
pub fn load_candles(path: impl AsRef<Path>) -> Result<Vec<Candle>, SeriesError> {
    let json = std::fs::read_to_string(path)?;
    parse_candles(&json)
}

/// Market observations for one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub mark_price: Price,
    pub traded_volume: Volume,
    /// `None` carries the previous open interest forward
    pub open_interest: Option<Volume>,
}

impl From<Observation> for StepUpdate {
    fn from(obs: Observation) -> Self {
        StepUpdate {
            traded_volume: Some(obs.traded_volume),
            open_interest: obs.open_interest,
            mark_price: Some(obs.mark_price),
            liquidity: None,
        }
    }
}

/// Close becomes the mark price and volume the traded volume. Open interest
/// is not in the candle, so it comes from `open_interest`.
pub fn observations_from_candles<F>(candles: &[Candle], open_interest: F) -> Vec<Observation>
where
    F: Fn(&Candle) -> Option<Volume>,
{
    candles
        .iter()
        .map(|candle| Observation {
            mark_price: candle.close,
            traded_volume: candle.volume,
            open_interest: open_interest(candle),
        })
        .collect()
}

/// Step `history` once per observation. Returns the number of steps taken.
///
/// Stops at the first observation the market rejects; steps already taken
/// stay in history.
pub fn replay<I>(history: &mut MarketHistory, observations: I) -> Result<usize, MechanismError>
where
    I: IntoIterator<Item = Observation>,
{
    let start = history.len();
    for obs in observations {
        history.next(obs.into())?;
    }
    let steps = history.len() - start;

    let view = history.current();
    info!(
        market = %view.snapshot().name,
        steps,
        final_mark_price = view.snapshot().mark_price,
        "Series replayed"
    );
    Ok(steps)
}
