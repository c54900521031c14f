//! Lendbank Ledger - banks, positions and their transitions
//!
//! Accounting is share based: a position holds deposit and borrow shares per
//! asset and a bank's indices convert shares into amounts. Every operation
//! is a [`LedgerEvent`] applied through [`LedgerState::prepare`] and
//! [`LedgerState::commit`], which is also how the journal is replayed.

pub mod bank;
pub mod error;
pub mod event;
pub mod hash;
pub mod interest;
pub mod journal;
pub mod position;
pub mod registry;
pub mod state;
pub mod transfer;

pub use bank::{Bank, BankParams, DEFAULT_CLOSE_FACTOR, DEFAULT_LIQUIDATION_BONUS, SHARE_SCALE};
pub use error::LedgerError;
pub use event::{LedgerEvent, LedgerOp, OperationKind};
pub use hash::{calculate_record_hash, verify_chain, ChainError};
pub use interest::{InterestRateModel, SECONDS_PER_YEAR};
pub use journal::{JournalRecord, GENESIS_HASH};
pub use position::{Position, PositionBook, PositionStatus};
pub use registry::BankRegistry;
pub use state::{AssetBalance, Draft, LedgerState, LiquidationReceipt, PositionReceipt, Prepared, Receipt};
pub use transfer::{
    NoopTransfer, RecordingTransfer, TokenTransfer, TransferDirection, TransferError, TransferInstruction,
};
