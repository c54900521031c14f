//! Ledger errors

use lendbank_core::{AssetId, OwnerId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while validating or applying a ledger transition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Bank already exists for {0}")]
    AlreadyExists(AssetId),

    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("Unknown user: {0}")]
    UnknownUser(OwnerId),

    #[error("Insufficient balance for {owner} in {asset}: available {available}, requested {requested}")]
    InsufficientBalance {
        owner: OwnerId,
        asset: AssetId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient liquidity in {asset}: treasury {available}, requested {requested}")]
    InsufficientLiquidity {
        asset: AssetId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Repayment exceeds debt in {asset}: owed {owed}, requested {requested}")]
    OverRepayment {
        asset: AssetId,
        owed: Decimal,
        requested: Decimal,
    },

    #[error("Arithmetic overflow in {0}")]
    MathOverflow(&'static str),
}

impl From<lendbank_core::AmountError> for LedgerError {
    fn from(err: lendbank_core::AmountError) -> Self {
        LedgerError::InvalidAmount(err.to_string())
    }
}
