//! Lendbank Price Oracle
//!
//! Provides asset prices for collateral and debt valuation.
//! Ships a `MockOracle` for tests and the CLI; real feeds implement `PriceOracle`.

mod error;
mod mock;
mod types;

pub use error::OracleError;
pub use mock::MockOracle;
pub use types::{Price, PriceOracle};
