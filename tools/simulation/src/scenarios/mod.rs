//! Scenario simulation modules
//!
//! Each scenario drives a market history through a seeded synthetic path.

pub mod incentive;
pub mod market_path;

use serde::{Deserialize, Serialize};

/// Result of a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub days_run: usize,
    pub providers: usize,
    pub final_fee_rate: f64,
    pub total_fees: f64,
    /// (provider, equity share) at the final step, in registration order
    pub final_equity_shares: Vec<(String, f64)>,
    pub passed: bool,
    pub details: String,
}
