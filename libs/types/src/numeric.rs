//! Numeric aliases and mechanism constants
//!
//! The mechanism works with log-normal pricing (ln, exp, normal CDF), so all
//! quantities are plain `f64`.

/// Price level (quote currency per contract)
pub type Price = f64;

/// Order or traded volume
pub type Volume = f64;

/// Fee or return rate
pub type Rate = f64;

/// Days per year used to annualise per-day returns
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Probability of trading at or below which a tick gets no implied volume
pub const PROB_TRADING_FLOOR: f64 = 1e-10;
