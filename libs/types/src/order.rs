//! Book side types

use serde::{Deserialize, Serialize};

/// Order book side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy orders (bids), quoted below mid
    BUY,
    /// Sell orders (offers), quoted above mid
    SELL,
}

impl Side {
    /// Build from the `is_sell_side` flag
    pub fn from_sell_flag(is_sell_side: bool) -> Self {
        if is_sell_side {
            Side::SELL
        } else {
            Side::BUY
        }
    }

    pub fn is_sell_side(&self) -> bool {
        matches!(self, Side::SELL)
    }

    /// Direction of price levels away from mid: +1 for offers, -1 for bids
    pub fn direction(&self) -> f64 {
        match self {
            Side::BUY => -1.0,
            Side::SELL => 1.0,
        }
    }
}
