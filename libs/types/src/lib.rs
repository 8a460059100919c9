//! Types library for the liquidity incentive mechanism
//!
//! This library provides the core value types shared by the mechanism
//! simulation: parameter bundles, identifiers, book sides, and the error
//! taxonomy.
//!
//! # Modules
//! - `ids`: Identifiers (MarketId, ProviderId)
//! - `numeric`: Numeric aliases and mechanism constants
//! - `order`: Book side
//! - `liquidity`: Mechanism network parameters
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod order;
pub mod liquidity;
pub mod errors;
