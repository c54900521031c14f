//! Ledger state and its transition functions
//!
//! Every operation is applied in two steps. [`LedgerState::prepare`] copies
//! the banks and positions the event touches into a [`Draft`], accrues them
//! to the event time and applies the operation to the copies. Nothing in the
//! live state changes until [`LedgerState::commit`] swaps the draft in, so a
//! draft that fails any later check (solvency, token transfer, journal
//! append) is simply dropped.

use chrono::{DateTime, Utc};
use lendbank_core::{Amount, AssetId, OwnerId};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::bank::{Bank, BankParams};
use crate::error::LedgerError;
use crate::event::{LedgerEvent, LedgerOp};
use crate::position::{Position, PositionBook};
use crate::registry::BankRegistry;
use crate::transfer::TransferInstruction;

/// Uncommitted copies of the records an operation touches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    banks: BTreeMap<AssetId, Bank>,
    positions: BTreeMap<OwnerId, Position>,
}

impl Draft {
    pub fn bank(&self, asset: &AssetId) -> Option<&Bank> {
        self.banks.get(asset)
    }

    /// Every bank in the draft, accrued to the draft time
    pub fn banks(&self) -> &BTreeMap<AssetId, Bank> {
        &self.banks
    }

    pub fn position(&self, owner: &OwnerId) -> Option<&Position> {
        self.positions.get(owner)
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty() && self.positions.is_empty()
    }

    fn position_and_bank_mut(
        &mut self,
        owner: &OwnerId,
        asset: &AssetId,
    ) -> Result<(&mut Position, &mut Bank), LedgerError> {
        let position = self
            .positions
            .get_mut(owner)
            .ok_or_else(|| LedgerError::UnknownUser(owner.clone()))?;
        let bank = self
            .banks
            .get_mut(asset)
            .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))?;
        Ok((position, bank))
    }
}

/// Share movement of a deposit, withdrawal, borrow or repayment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionReceipt {
    pub owner: OwnerId,
    pub asset: AssetId,
    pub amount: Amount,
    /// Shares minted or burned
    pub shares: Decimal,
    /// Owner's shares on that side of the asset afterwards
    pub balance_shares: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquidationReceipt {
    pub liquidator: OwnerId,
    pub owner: OwnerId,
    pub debt_asset: AssetId,
    pub repaid: Amount,
    pub debt_shares_burned: Decimal,
    pub collateral_asset: AssetId,
    pub seized: Amount,
    pub collateral_shares_burned: Decimal,
}

/// Result of an applied operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Receipt {
    BankCreated { asset: AssetId },
    Funded { asset: AssetId, treasury: Decimal },
    Accrued {
        asset: AssetId,
        deposit_index: Decimal,
        borrow_index: Decimal,
    },
    UserInitialized { owner: OwnerId, created: bool },
    Deposited(PositionReceipt),
    Withdrew(PositionReceipt),
    Borrowed(PositionReceipt),
    Repaid(PositionReceipt),
    Liquidated(LiquidationReceipt),
}

/// A validated-but-uncommitted operation
#[derive(Debug, Clone)]
pub struct Prepared {
    pub draft: Draft,
    pub receipt: Receipt,
    /// Token movements to execute before committing
    pub transfers: Vec<TransferInstruction>,
}

/// Amounts of one asset held by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetBalance {
    pub asset: AssetId,
    pub deposit_shares: Decimal,
    pub deposited: Decimal,
    pub borrow_shares: Decimal,
    pub borrowed: Decimal,
}

/// All banks and positions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    banks: BankRegistry,
    positions: PositionBook,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the draft and receipt of `event` without touching live state
    pub fn prepare(&self, event: &LedgerEvent) -> Result<Prepared, LedgerError> {
        let at = event.at;
        match &event.op {
            LedgerOp::BankCreated { asset, params } => self.prepare_create_bank(asset, params, at),
            LedgerOp::BankFunded { asset, amount } => self.prepare_fund(asset, *amount, at),
            LedgerOp::BankAccrued { asset } => self.prepare_accrue(asset, at),
            LedgerOp::UserInitialized { owner } => Ok(self.prepare_init_user(owner)),
            LedgerOp::Deposited {
                owner,
                asset,
                amount,
            } => self.prepare_deposit(owner, asset, *amount, at),
            LedgerOp::Withdrew {
                owner,
                asset,
                amount,
            } => self.prepare_withdraw(owner, asset, *amount, at),
            LedgerOp::Borrowed {
                owner,
                asset,
                amount,
            } => self.prepare_borrow(owner, asset, *amount, at),
            LedgerOp::Repaid {
                owner,
                asset,
                amount,
            } => self.prepare_repay(owner, asset, *amount, at),
            LedgerOp::Liquidated {
                liquidator,
                owner,
                collateral_asset,
                debt_asset,
                repaid,
                seized,
            } => self.prepare_liquidation(
                liquidator,
                owner,
                collateral_asset,
                debt_asset,
                *repaid,
                *seized,
                at,
            ),
        }
    }

    /// Swap the draft's records into the live state
    pub fn commit(&mut self, draft: Draft) {
        for bank in draft.banks.into_values() {
            self.banks.insert(bank);
        }
        for position in draft.positions.into_values() {
            self.positions.insert(position);
        }
    }

    /// Prepare and commit in one step, with no external checks.
    ///
    /// This is the replay path: the event was validated when first applied.
    pub fn apply(&mut self, event: &LedgerEvent) -> Result<Receipt, LedgerError> {
        let prepared = self.prepare(event)?;
        self.commit(prepared.draft);
        Ok(prepared.receipt)
    }

    // === Queries ===

    pub fn bank(&self, asset: &AssetId) -> Result<&Bank, LedgerError> {
        self.banks.get(asset)
    }

    /// Copy of a bank accrued to `now`
    pub fn bank_at(&self, asset: &AssetId, now: DateTime<Utc>) -> Result<Bank, LedgerError> {
        let mut bank = self.banks.get(asset)?.clone();
        bank.accrue(now)?;
        Ok(bank)
    }

    pub fn banks(&self) -> impl Iterator<Item = &Bank> {
        self.banks.iter()
    }

    pub fn position(&self, owner: &OwnerId) -> Result<&Position, LedgerError> {
        self.positions.get(owner)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    /// The owner's position with every bank it references, accrued to `now`
    pub fn account_at(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<Draft, LedgerError> {
        self.draft_for(owner, &[], now)
    }

    /// Deposited and borrowed amounts per asset, accrued to `now`
    pub fn balances_at(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<Vec<AssetBalance>, LedgerError> {
        let account = self.account_at(owner, now)?;
        let position = account
            .position(owner)
            .ok_or_else(|| LedgerError::UnknownUser(owner.clone()))?;

        position
            .assets()
            .into_iter()
            .map(|asset| {
                let bank = account
                    .bank(&asset)
                    .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))?;
                let deposit_shares = position.deposit_shares(&asset);
                let borrow_shares = position.borrow_shares(&asset);
                Ok(AssetBalance {
                    deposited: bank.deposit_value(deposit_shares)?,
                    borrowed: bank.borrow_value(borrow_shares)?,
                    asset,
                    deposit_shares,
                    borrow_shares,
                })
            })
            .collect()
    }

    // === Transitions ===

    fn prepare_create_bank(
        &self,
        asset: &AssetId,
        params: &BankParams,
        at: DateTime<Utc>,
    ) -> Result<Prepared, LedgerError> {
        if self.banks.contains(asset) {
            return Err(LedgerError::AlreadyExists(asset.clone()));
        }
        let bank = Bank::new(asset.clone(), params.clone(), at)?;

        let mut draft = Draft::default();
        draft.banks.insert(asset.clone(), bank);
        Ok(Prepared {
            draft,
            receipt: Receipt::BankCreated {
                asset: asset.clone(),
            },
            transfers: Vec::new(),
        })
    }

    fn prepare_fund(&self, asset: &AssetId, amount: Amount, at: DateTime<Utc>) -> Result<Prepared, LedgerError> {
        require_positive(amount)?;
        let mut bank = self.bank_at(asset, at)?;
        bank.fund(amount)?;

        let receipt = Receipt::Funded {
            asset: asset.clone(),
            treasury: bank.treasury,
        };
        let mut draft = Draft::default();
        draft.banks.insert(asset.clone(), bank);
        Ok(Prepared {
            draft,
            receipt,
            transfers: Vec::new(),
        })
    }

    fn prepare_accrue(&self, asset: &AssetId, at: DateTime<Utc>) -> Result<Prepared, LedgerError> {
        let bank = self.bank_at(asset, at)?;

        let receipt = Receipt::Accrued {
            asset: asset.clone(),
            deposit_index: bank.deposit_index,
            borrow_index: bank.borrow_index,
        };
        let mut draft = Draft::default();
        draft.banks.insert(asset.clone(), bank);
        Ok(Prepared {
            draft,
            receipt,
            transfers: Vec::new(),
        })
    }

    fn prepare_init_user(&self, owner: &OwnerId) -> Prepared {
        let mut draft = Draft::default();
        let created = !self.positions.contains(owner);
        if created {
            draft
                .positions
                .insert(owner.clone(), Position::new(owner.clone()));
        }
        Prepared {
            draft,
            receipt: Receipt::UserInitialized {
                owner: owner.clone(),
                created,
            },
            transfers: Vec::new(),
        }
    }

    fn prepare_deposit(
        &self,
        owner: &OwnerId,
        asset: &AssetId,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<Prepared, LedgerError> {
        require_positive(amount)?;
        self.banks.get(asset)?;
        let mut position = self.positions.get(owner)?.clone();
        let mut bank = self.bank_at(asset, at)?;

        let shares = bank.mint_deposit(amount)?;
        let balance_shares = position.add_deposit_shares(asset, shares)?;

        let mut draft = Draft::default();
        draft.banks.insert(asset.clone(), bank);
        draft.positions.insert(owner.clone(), position);
        Ok(Prepared {
            draft,
            receipt: Receipt::Deposited(PositionReceipt {
                owner: owner.clone(),
                asset: asset.clone(),
                amount,
                shares,
                balance_shares,
            }),
            transfers: vec![TransferInstruction::pull(owner.clone(), asset.clone(), amount)],
        })
    }

    fn prepare_withdraw(
        &self,
        owner: &OwnerId,
        asset: &AssetId,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<Prepared, LedgerError> {
        require_positive(amount)?;
        self.banks.get(asset)?;
        let mut draft = self.draft_for(owner, &[asset], at)?;

        let (shares, balance_shares) = {
            let (position, bank) = draft.position_and_bank_mut(owner, asset)?;
            let shares = shares_to_redeem(position, bank, amount)?;
            bank.burn_deposit(shares, amount)?;
            (shares, position.remove_deposit_shares(asset, shares))
        };

        Ok(Prepared {
            draft,
            receipt: Receipt::Withdrew(PositionReceipt {
                owner: owner.clone(),
                asset: asset.clone(),
                amount,
                shares,
                balance_shares,
            }),
            transfers: vec![TransferInstruction::push(owner.clone(), asset.clone(), amount)],
        })
    }

    fn prepare_borrow(
        &self,
        owner: &OwnerId,
        asset: &AssetId,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<Prepared, LedgerError> {
        require_positive(amount)?;
        self.banks.get(asset)?;
        let mut draft = self.draft_for(owner, &[asset], at)?;

        let (shares, balance_shares) = {
            let (position, bank) = draft.position_and_bank_mut(owner, asset)?;
            let shares = bank.mint_borrow(amount)?;
            (shares, position.add_borrow_shares(asset, shares)?)
        };

        Ok(Prepared {
            draft,
            receipt: Receipt::Borrowed(PositionReceipt {
                owner: owner.clone(),
                asset: asset.clone(),
                amount,
                shares,
                balance_shares,
            }),
            transfers: vec![TransferInstruction::push(owner.clone(), asset.clone(), amount)],
        })
    }

    fn prepare_repay(
        &self,
        owner: &OwnerId,
        asset: &AssetId,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<Prepared, LedgerError> {
        require_positive(amount)?;
        self.banks.get(asset)?;
        let mut draft = self.draft_for(owner, &[asset], at)?;

        let (shares, balance_shares) = {
            let (position, bank) = draft.position_and_bank_mut(owner, asset)?;
            let shares = shares_to_repay(position, bank, amount)?;
            bank.burn_borrow(shares, amount)?;
            (shares, position.remove_borrow_shares(asset, shares))
        };

        Ok(Prepared {
            draft,
            receipt: Receipt::Repaid(PositionReceipt {
                owner: owner.clone(),
                asset: asset.clone(),
                amount,
                shares,
                balance_shares,
            }),
            transfers: vec![TransferInstruction::pull(owner.clone(), asset.clone(), amount)],
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare_liquidation(
        &self,
        liquidator: &OwnerId,
        owner: &OwnerId,
        collateral_asset: &AssetId,
        debt_asset: &AssetId,
        repaid: Amount,
        seized: Amount,
        at: DateTime<Utc>,
    ) -> Result<Prepared, LedgerError> {
        require_positive(repaid)?;
        require_positive(seized)?;
        self.banks.get(collateral_asset)?;
        self.banks.get(debt_asset)?;
        let mut draft = self.draft_for(owner, &[collateral_asset, debt_asset], at)?;

        let debt_shares_burned = {
            let (position, bank) = draft.position_and_bank_mut(owner, debt_asset)?;
            let shares = shares_to_repay(position, bank, repaid)?;
            bank.burn_borrow(shares, repaid)?;
            position.remove_borrow_shares(debt_asset, shares);
            shares
        };

        let collateral_shares_burned = {
            let (position, bank) = draft.position_and_bank_mut(owner, collateral_asset)?;
            let shares = shares_to_redeem(position, bank, seized)?;
            bank.burn_deposit(shares, seized)?;
            position.remove_deposit_shares(collateral_asset, shares);
            shares
        };

        Ok(Prepared {
            draft,
            receipt: Receipt::Liquidated(LiquidationReceipt {
                liquidator: liquidator.clone(),
                owner: owner.clone(),
                debt_asset: debt_asset.clone(),
                repaid,
                debt_shares_burned,
                collateral_asset: collateral_asset.clone(),
                seized,
                collateral_shares_burned,
            }),
            transfers: vec![
                TransferInstruction::pull(liquidator.clone(), debt_asset.clone(), repaid),
                TransferInstruction::push(liquidator.clone(), collateral_asset.clone(), seized),
            ],
        })
    }

    /// Draft holding the owner's position plus every bank it references and
    /// `extra` assets, all accrued to `at`
    fn draft_for(&self, owner: &OwnerId, extra: &[&AssetId], at: DateTime<Utc>) -> Result<Draft, LedgerError> {
        let position = self.positions.get(owner)?.clone();

        let mut assets = position.assets();
        assets.extend(extra.iter().map(|asset| (*asset).clone()));

        let mut draft = Draft::default();
        for asset in assets {
            let bank = self.bank_at(&asset, at)?;
            draft.banks.insert(asset, bank);
        }
        draft.positions.insert(owner.clone(), position);
        Ok(draft)
    }
}

fn require_positive(amount: Amount) -> Result<(), LedgerError> {
    if amount.is_zero() {
        return Err(LedgerError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Deposit shares to burn for redeeming `amount`.
///
/// Shares are rounded up. Redeeming the full deposit value burns every
/// share even when that rounds above the held shares.
fn shares_to_redeem(position: &Position, bank: &Bank, amount: Amount) -> Result<Decimal, LedgerError> {
    let held = position.deposit_shares(&bank.asset);
    let shares = bank.deposit_shares_burned(amount)?;
    if shares <= held {
        return Ok(shares);
    }

    let available = bank.deposit_value(held)?;
    if amount.value() <= available {
        Ok(held)
    } else {
        Err(LedgerError::InsufficientBalance {
            owner: position.owner.clone(),
            asset: bank.asset.clone(),
            available,
            requested: amount.value(),
        })
    }
}

/// Borrow shares to burn for a repayment of `amount`, rounded down;
/// repaying exactly the owed value burns every share
fn shares_to_repay(position: &Position, bank: &Bank, amount: Amount) -> Result<Decimal, LedgerError> {
    let held = position.borrow_shares(&bank.asset);
    let owed = bank.borrow_value(held)?;
    if amount.value() > owed {
        return Err(LedgerError::OverRepayment {
            asset: bank.asset.clone(),
            owed,
            requested: amount.value(),
        });
    }
    if amount.value() == owed {
        return Ok(held);
    }
    Ok(bank.borrow_shares_burned(amount)?.min(held))
}
