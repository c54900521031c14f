//! Token transfer capability
//!
//! The ledger only accounts for tokens; moving them is delegated to a
//! [`TokenTransfer`] implementation. Transfers run after a draft passed
//! validation and before it is committed.

use async_trait::async_trait;
use lendbank_core::{Amount, AssetId, OwnerId};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use strum_macros::Display;
use thiserror::Error;
use tracing::debug;

/// Direction of a token movement, seen from the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransferDirection {
    /// From the party into the protocol treasury
    Pull,
    /// From the protocol treasury to the party
    Push,
}

/// A single movement requested by a prepared operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstruction {
    pub direction: TransferDirection,
    pub party: OwnerId,
    pub asset: AssetId,
    pub amount: Amount,
}

impl TransferInstruction {
    pub fn pull(party: OwnerId, asset: AssetId, amount: Amount) -> Self {
        Self {
            direction: TransferDirection::Pull,
            party,
            asset,
            amount,
        }
    }

    pub fn push(party: OwnerId, asset: AssetId, amount: Amount) -> Self {
        Self {
            direction: TransferDirection::Push,
            party,
            asset,
            amount,
        }
    }

    /// The movement that undoes this one
    pub fn reversed(&self) -> Self {
        let direction = match self.direction {
            TransferDirection::Pull => TransferDirection::Push,
            TransferDirection::Push => TransferDirection::Pull,
        };
        Self {
            direction,
            ..self.clone()
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Transfer rejected: {0}")]
    Rejected(String),

    #[error("Transfer backend unavailable: {0}")]
    Unavailable(String),
}

/// Moves tokens between parties and the protocol treasury
#[async_trait]
pub trait TokenTransfer: Send + Sync {
    /// Move `amount` of `asset` from `from` into the treasury
    async fn pull(&self, from: &OwnerId, asset: &AssetId, amount: Amount) -> Result<(), TransferError>;

    /// Move `amount` of `asset` from the treasury to `to`
    async fn push(&self, to: &OwnerId, asset: &AssetId, amount: Amount) -> Result<(), TransferError>;

    async fn execute(&self, instruction: &TransferInstruction) -> Result<(), TransferError> {
        match instruction.direction {
            TransferDirection::Pull => {
                self.pull(&instruction.party, &instruction.asset, instruction.amount)
                    .await
            }
            TransferDirection::Push => {
                self.push(&instruction.party, &instruction.asset, instruction.amount)
                    .await
            }
        }
    }
}

/// Accepts every transfer without moving anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransfer;

#[async_trait]
impl TokenTransfer for NoopTransfer {
    async fn pull(&self, from: &OwnerId, asset: &AssetId, amount: Amount) -> Result<(), TransferError> {
        debug!(%from, %asset, %amount, "pull (noop)");
        Ok(())
    }

    async fn push(&self, to: &OwnerId, asset: &AssetId, amount: Amount) -> Result<(), TransferError> {
        debug!(%to, %asset, %amount, "push (noop)");
        Ok(())
    }
}

/// Records every executed transfer; can be told to reject some
#[derive(Debug, Default)]
pub struct RecordingTransfer {
    executed: Mutex<Vec<TransferInstruction>>,
    reject: Mutex<Option<TransferDirection>>,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every transfer in `direction` (or none)
    pub fn reject(&self, direction: Option<TransferDirection>) {
        *self.reject.lock().unwrap_or_else(PoisonError::into_inner) = direction;
    }

    /// Transfers executed so far, in order
    pub fn executed(&self) -> Vec<TransferInstruction> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, instruction: TransferInstruction) -> Result<(), TransferError> {
        let rejected = *self.reject.lock().unwrap_or_else(PoisonError::into_inner);
        if rejected == Some(instruction.direction) {
            return Err(TransferError::Rejected(format!(
                "{} of {} {} for {}",
                instruction.direction, instruction.amount, instruction.asset, instruction.party
            )));
        }
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(instruction);
        Ok(())
    }
}

#[async_trait]
impl TokenTransfer for RecordingTransfer {
    async fn pull(&self, from: &OwnerId, asset: &AssetId, amount: Amount) -> Result<(), TransferError> {
        self.record(TransferInstruction::pull(from.clone(), asset.clone(), amount))
    }

    async fn push(&self, to: &OwnerId, asset: &AssetId, amount: Amount) -> Result<(), TransferError> {
        self.record(TransferInstruction::push(to.clone(), asset.clone(), amount))
    }
}
