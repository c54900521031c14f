//! Lendbank Risk Engine
//!
//! Pre-commit gatekeeper: values drafted positions with oracle prices and
//! rejects borrows and withdrawals that would leave them undercollateralized.
//! Also sizes liquidations of unhealthy positions.

pub mod engine;
pub mod error;
pub mod liquidation;

pub use engine::{AccountHealth, AccountValuation, RiskConfig, RiskEngine};
pub use error::RiskError;
pub use liquidation::{LiquidationEngine, LiquidationPlan};
