//! Ledger events - the replayable record of every committed operation
//!
//! An event carries everything its transition needs, including the
//! timestamp it accrued at and, for liquidations, the amounts priced at the
//! time. Replaying events never consults an oracle.

use chrono::{DateTime, Utc};
use lendbank_core::{Amount, AssetId, OwnerId};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::bank::BankParams;

/// Operation kinds, as shown in logs and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateBank,
    Fund,
    Accrue,
    InitUser,
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Liquidate,
}

/// A state transition with its operands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerOp {
    BankCreated {
        asset: AssetId,
        params: BankParams,
    },
    BankFunded {
        asset: AssetId,
        amount: Amount,
    },
    BankAccrued {
        asset: AssetId,
    },
    UserInitialized {
        owner: OwnerId,
    },
    Deposited {
        owner: OwnerId,
        asset: AssetId,
        amount: Amount,
    },
    Withdrew {
        owner: OwnerId,
        asset: AssetId,
        amount: Amount,
    },
    Borrowed {
        owner: OwnerId,
        asset: AssetId,
        amount: Amount,
    },
    Repaid {
        owner: OwnerId,
        asset: AssetId,
        amount: Amount,
    },
    Liquidated {
        liquidator: OwnerId,
        owner: OwnerId,
        collateral_asset: AssetId,
        debt_asset: AssetId,
        repaid: Amount,
        seized: Amount,
    },
}

impl LedgerOp {
    pub fn kind(&self) -> OperationKind {
        match self {
            LedgerOp::BankCreated { .. } => OperationKind::CreateBank,
            LedgerOp::BankFunded { .. } => OperationKind::Fund,
            LedgerOp::BankAccrued { .. } => OperationKind::Accrue,
            LedgerOp::UserInitialized { .. } => OperationKind::InitUser,
            LedgerOp::Deposited { .. } => OperationKind::Deposit,
            LedgerOp::Withdrew { .. } => OperationKind::Withdraw,
            LedgerOp::Borrowed { .. } => OperationKind::Borrow,
            LedgerOp::Repaid { .. } => OperationKind::Repay,
            LedgerOp::Liquidated { .. } => OperationKind::Liquidate,
        }
    }

    /// Position owner the operation acts on, if any
    pub fn owner(&self) -> Option<&OwnerId> {
        match self {
            LedgerOp::UserInitialized { owner }
            | LedgerOp::Deposited { owner, .. }
            | LedgerOp::Withdrew { owner, .. }
            | LedgerOp::Borrowed { owner, .. }
            | LedgerOp::Repaid { owner, .. }
            | LedgerOp::Liquidated { owner, .. } => Some(owner),
            LedgerOp::BankCreated { .. } | LedgerOp::BankFunded { .. } | LedgerOp::BankAccrued { .. } => None,
        }
    }

    /// Whether committing this operation requires a solvency check
    pub fn requires_risk_check(&self) -> bool {
        matches!(self, LedgerOp::Withdrew { .. } | LedgerOp::Borrowed { .. })
    }
}

/// An operation stamped with the time it was applied at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub at: DateTime<Utc>,
    pub op: LedgerOp,
}

impl LedgerEvent {
    pub fn new(at: DateTime<Utc>, op: LedgerOp) -> Self {
        Self { at, op }
    }

    pub fn kind(&self) -> OperationKind {
        self.op.kind()
    }
}
