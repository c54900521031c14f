//! Operation errors surfaced to callers

use lendbank_core::{AmountError, AssetId, ClockError, IdError, OwnerId};
use lendbank_events::EventError;
use lendbank_ledger::{LedgerError, TransferError};
use lendbank_risk::RiskError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Every way a lending operation can fail.
///
/// All variants except `MathOverflow`, `Storage` and `Halted` are
/// rejections of a single operation; those indicate the ledger cannot
/// continue safely.
#[derive(Error, Debug)]
pub enum LendingError {
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

    #[error("Undercollateralized: collateral {collateral} < borrowed {borrowed}")]
    Undercollateralized { collateral: Decimal, borrowed: Decimal },

    #[error("Oracle price unavailable for {asset}: {reason}")]
    OraclePriceUnavailable { asset: AssetId, reason: String },

    #[error("Position of {owner} is not liquidatable: {reason}")]
    NotLiquidatable { owner: OwnerId, reason: String },

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Token transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    #[error("Arithmetic overflow in {0}")]
    MathOverflow(&'static str),

    #[error("Journal storage error: {0}")]
    Storage(#[from] EventError),

    #[error("Ledger halted after a journal failure: {0}")]
    Halted(String),
}

impl LendingError {
    /// Whether the ledger should stop accepting operations
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LendingError::MathOverflow(_) | LendingError::Storage(_) | LendingError::Halted(_)
        )
    }
}

impl From<LedgerError> for LendingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount(msg) => LendingError::InvalidAmount(msg),
            LedgerError::InvalidParameter(msg) => LendingError::InvalidParameter(msg),
            LedgerError::AlreadyExists(asset) => LendingError::AlreadyExists(asset),
            LedgerError::UnknownAsset(asset) => LendingError::UnknownAsset(asset),
            LedgerError::UnknownUser(owner) => LendingError::UnknownUser(owner),
            LedgerError::InsufficientBalance {
                owner,
                asset,
                available,
                requested,
            } => LendingError::InsufficientBalance {
                owner,
                asset,
                available,
                requested,
            },
            LedgerError::InsufficientLiquidity {
                asset,
                available,
                requested,
            } => LendingError::InsufficientLiquidity {
                asset,
                available,
                requested,
            },
            LedgerError::OverRepayment {
                asset,
                owed,
                requested,
            } => LendingError::OverRepayment {
                asset,
                owed,
                requested,
            },
            LedgerError::MathOverflow(ctx) => LendingError::MathOverflow(ctx),
        }
    }
}

impl From<RiskError> for LendingError {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::Undercollateralized {
                collateral,
                borrowed,
            } => LendingError::Undercollateralized {
                collateral,
                borrowed,
            },
            RiskError::OraclePriceUnavailable { asset, reason } => {
                LendingError::OraclePriceUnavailable { asset, reason }
            }
            RiskError::NotLiquidatable { owner, reason } => LendingError::NotLiquidatable { owner, reason },
            RiskError::UnknownAsset(asset) => LendingError::UnknownAsset(asset),
            RiskError::UnknownUser(owner) => LendingError::UnknownUser(owner),
            RiskError::MathOverflow(ctx) => LendingError::MathOverflow(ctx),
            RiskError::Ledger(err) => err.into(),
        }
    }
}

impl From<AmountError> for LendingError {
    fn from(err: AmountError) -> Self {
        LendingError::InvalidAmount(err.to_string())
    }
}

impl From<IdError> for LendingError {
    fn from(err: IdError) -> Self {
        LendingError::InvalidParameter(err.to_string())
    }
}
