//! Risk engine errors

use lendbank_core::{AssetId, OwnerId};
use lendbank_ledger::LedgerError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    #[error("Undercollateralized: collateral {collateral} < borrowed {borrowed}")]
    Undercollateralized { collateral: Decimal, borrowed: Decimal },

    #[error("Oracle price unavailable for {asset}: {reason}")]
    OraclePriceUnavailable { asset: AssetId, reason: String },

    #[error("Position of {owner} is not liquidatable: {reason}")]
    NotLiquidatable { owner: OwnerId, reason: String },

    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("Unknown user: {0}")]
    UnknownUser(OwnerId),

    #[error("Arithmetic overflow in {0}")]
    MathOverflow(&'static str),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
