//! Application context - wires everything together
//!
//! `AppContext` is the transactional boundary of the ledger. Every operation
//! runs the same pipeline:
//!
//! 1. read the clock and build the event
//! 2. prepare a draft (accrues the involved banks)
//! 3. risk check the draft (borrow and withdraw only)
//! 4. execute token transfers
//! 5. append the event to the journal
//! 6. commit the draft
//!
//! A failure at any step drops the draft. Transfers already executed when a
//! later step fails are reversed. A failed journal append halts the context:
//! the journal may hold a partial record, so every later operation is
//! refused until the ledger is reopened from disk.

use chrono::{DateTime, Utc};
use lendbank_core::{Amount, AssetId, Clock, OwnerId};
use lendbank_events::{EventError, EventReader, EventStore};
use lendbank_ledger::{
    AssetBalance, Bank, BankParams, JournalRecord, LedgerEvent, LedgerOp, LedgerState, Position, Receipt,
    TokenTransfer, TransferInstruction, GENESIS_HASH,
};
use lendbank_oracle::PriceOracle;
use lendbank_risk::{AccountHealth, LiquidationEngine, RiskEngine};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::LendingConfig;
use crate::error::LendingError;

/// External services the ledger depends on
#[derive(Clone)]
pub struct Capabilities {
    pub oracle: Arc<dyn PriceOracle>,
    pub transfer: Arc<dyn TokenTransfer>,
    pub clock: Arc<dyn Clock>,
}

/// Application context - wires together all components
pub struct AppContext {
    state: LedgerState,
    risk: Arc<RiskEngine>,
    liquidation: LiquidationEngine,
    transfer: Arc<dyn TokenTransfer>,
    clock: Arc<dyn Clock>,
    config: LendingConfig,
    event_store: EventStore,
    journal_path: PathBuf,
    last_sequence: u64,
    last_hash: String,
    halted: Option<String>,
}

impl AppContext {
    /// Open the ledger stored under `data_path`, replaying its journal
    pub fn open(
        data_path: impl AsRef<Path>,
        config: LendingConfig,
        capabilities: Capabilities,
    ) -> Result<Self, LendingError> {
        let journal_path = data_path.as_ref().join("journal");
        let event_store = EventStore::new(&journal_path)?;

        let reader = EventReader::from_directory(&journal_path)?;
        let records = reader.read_all()?;
        lendbank_ledger::verify_chain(&records).map_err(EventError::from)?;

        let mut state = LedgerState::new();
        for record in &records {
            state.apply(&record.event).map_err(|e| EventError::Replay {
                sequence: record.sequence,
                reason: e.to_string(),
            })?;
        }

        let (last_sequence, last_hash) = match records.last() {
            Some(last) => (last.sequence, last.hash.clone()),
            None => (0, GENESIS_HASH.to_string()),
        };

        info!(
            journal = %journal_path.display(),
            records = records.len(),
            banks = state.banks().count(),
            positions = state.positions().count(),
            "journal replayed"
        );

        let risk = Arc::new(RiskEngine::new(capabilities.oracle, config.risk_config()));
        let liquidation = LiquidationEngine::new(risk.clone());

        Ok(Self {
            state,
            risk,
            liquidation,
            transfer: capabilities.transfer,
            clock: capabilities.clock,
            config,
            event_store,
            journal_path,
            last_sequence,
            last_hash,
            halted: None,
        })
    }

    // === Bank registry ===

    /// Create a bank with the configured rate curve and liquidation terms
    pub async fn create_bank(
        &mut self,
        asset: AssetId,
        liquidation_threshold: Decimal,
        max_ltv: Decimal,
    ) -> Result<Receipt, LendingError> {
        let params = self.config.bank_params(liquidation_threshold, max_ltv);
        self.create_bank_with(asset, params).await
    }

    pub async fn create_bank_with(&mut self, asset: AssetId, params: BankParams) -> Result<Receipt, LendingError> {
        self.execute(LedgerOp::BankCreated { asset, params }).await
    }

    /// Add liquidity to a bank's treasury without minting shares
    pub async fn fund(&mut self, asset: AssetId, amount: Decimal) -> Result<Receipt, LendingError> {
        let amount = Amount::positive(amount)?;
        self.execute(LedgerOp::BankFunded { asset, amount }).await
    }

    pub async fn accrue(&mut self, asset: AssetId) -> Result<Receipt, LendingError> {
        self.execute(LedgerOp::BankAccrued { asset }).await
    }

    // === Positions ===

    /// Create an empty position; a no-op for an existing owner
    pub async fn init_user(&mut self, owner: OwnerId) -> Result<Receipt, LendingError> {
        if self.state.position(&owner).is_ok() {
            return Ok(Receipt::UserInitialized { owner, created: false });
        }
        self.execute(LedgerOp::UserInitialized { owner }).await
    }

    pub async fn deposit(&mut self, owner: OwnerId, asset: AssetId, amount: Decimal) -> Result<Receipt, LendingError> {
        let amount = Amount::positive(amount)?;
        self.execute(LedgerOp::Deposited { owner, asset, amount }).await
    }

    pub async fn withdraw(&mut self, owner: OwnerId, asset: AssetId, amount: Decimal) -> Result<Receipt, LendingError> {
        let amount = Amount::positive(amount)?;
        self.execute(LedgerOp::Withdrew { owner, asset, amount }).await
    }

    pub async fn borrow(&mut self, owner: OwnerId, asset: AssetId, amount: Decimal) -> Result<Receipt, LendingError> {
        let amount = Amount::positive(amount)?;
        self.execute(LedgerOp::Borrowed { owner, asset, amount }).await
    }

    pub async fn repay(&mut self, owner: OwnerId, asset: AssetId, amount: Decimal) -> Result<Receipt, LendingError> {
        let amount = Amount::positive(amount)?;
        self.execute(LedgerOp::Repaid { owner, asset, amount }).await
    }

    /// Repay part of an unhealthy position's debt in exchange for collateral
    pub async fn liquidate(
        &mut self,
        liquidator: OwnerId,
        owner: OwnerId,
        collateral_asset: AssetId,
        debt_asset: AssetId,
    ) -> Result<Receipt, LendingError> {
        let at = self.clock.now()?;
        let result = self
            .liquidate_at(liquidator, owner, collateral_asset, debt_asset, at)
            .await;
        if let Err(ref e) = result {
            warn!(op = "liquidate", error = %e, "operation rejected");
        }
        result
    }

    async fn liquidate_at(
        &mut self,
        liquidator: OwnerId,
        owner: OwnerId,
        collateral_asset: AssetId,
        debt_asset: AssetId,
        at: DateTime<Utc>,
    ) -> Result<Receipt, LendingError> {
        self.state.bank(&collateral_asset)?;
        self.state.bank(&debt_asset)?;
        let account = self.state.account_at(&owner, at)?;
        let position = account
            .position(&owner)
            .ok_or_else(|| LendingError::UnknownUser(owner.clone()))?;

        let plan = self
            .liquidation
            .plan(position, account.banks(), &collateral_asset, &debt_asset, at)
            .await?;

        let op = LedgerOp::Liquidated {
            liquidator,
            owner,
            collateral_asset,
            debt_asset,
            repaid: plan.repaid,
            seized: plan.seized,
        };
        self.commit_event(LedgerEvent::new(at, op)).await
    }

    // === Queries ===

    /// Bank snapshot accrued to now
    pub fn bank(&self, asset: &AssetId) -> Result<Bank, LendingError> {
        let now = self.clock.now()?;
        Ok(self.state.bank_at(asset, now)?)
    }

    /// All bank snapshots accrued to now
    pub fn banks(&self) -> Result<Vec<Bank>, LendingError> {
        let now = self.clock.now()?;
        self.state
            .banks()
            .map(|bank| self.state.bank_at(&bank.asset, now).map_err(LendingError::from))
            .collect()
    }

    pub fn position(&self, owner: &OwnerId) -> Result<&Position, LendingError> {
        Ok(self.state.position(owner)?)
    }

    /// Deposited and borrowed amounts per asset, accrued to now
    pub fn balances(&self, owner: &OwnerId) -> Result<Vec<AssetBalance>, LendingError> {
        let now = self.clock.now()?;
        Ok(self.state.balances_at(owner, now)?)
    }

    pub async fn is_solvent(&self, owner: &OwnerId) -> Result<bool, LendingError> {
        let now = self.clock.now()?;
        let account = self.state.account_at(owner, now)?;
        let position = account
            .position(owner)
            .ok_or_else(|| LendingError::UnknownUser(owner.clone()))?;
        Ok(self.risk.is_solvent(position, account.banks(), now).await?)
    }

    pub async fn health(&self, owner: &OwnerId) -> Result<AccountHealth, LendingError> {
        let now = self.clock.now()?;
        let account = self.state.account_at(owner, now)?;
        let position = account
            .position(owner)
            .ok_or_else(|| LendingError::UnknownUser(owner.clone()))?;
        Ok(self.risk.health(position, account.banks(), now).await?)
    }

    /// Verify the journal's hash chain; returns the number of records
    pub fn audit(&self) -> Result<usize, LendingError> {
        let reader = EventReader::from_directory(&self.journal_path)?;
        Ok(reader.verify()?)
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    // === Commit pipeline ===

    async fn execute(&mut self, op: LedgerOp) -> Result<Receipt, LendingError> {
        let kind = op.kind();
        let at = self.clock.now()?;
        let result = self.commit_event(LedgerEvent::new(at, op)).await;
        if let Err(ref e) = result {
            if e.is_fatal() {
                error!(op = %kind, error = %e, "operation failed");
            } else {
                warn!(op = %kind, error = %e, "operation rejected");
            }
        }
        result
    }

    /// Prepare → Risk Check → Transfer → Append → Commit
    async fn commit_event(&mut self, event: LedgerEvent) -> Result<Receipt, LendingError> {
        if let Some(reason) = &self.halted {
            return Err(LendingError::Halted(reason.clone()));
        }

        // 1. Draft the transition
        let prepared = self.state.prepare(&event)?;

        // 2. Solvency gate on the drafted position
        if event.op.requires_risk_check() {
            if let Some(owner) = event.op.owner() {
                let position = prepared
                    .draft
                    .position(owner)
                    .ok_or_else(|| LendingError::UnknownUser(owner.clone()))?;
                self.risk
                    .check_solvent(position, prepared.draft.banks(), event.at)
                    .await?;
            }
        }

        // 3. Move tokens
        self.execute_transfers(&prepared.transfers).await?;

        // 4. Journal (source of truth)
        let record = match self.append(event) {
            Ok(record) => record,
            Err(e) => {
                self.reverse_transfers(&prepared.transfers).await;
                error!(sequence = self.last_sequence + 1, error = %e, "journal append failed, halting");
                self.halted = Some(e.to_string());
                return Err(e);
            }
        };

        // 5. Swap the draft in
        self.state.commit(prepared.draft);

        info!(
            op = %record.event.kind(),
            sequence = record.sequence,
            correlation_id = %record.correlation_id,
            "operation committed"
        );
        Ok(prepared.receipt)
    }

    async fn execute_transfers(&self, transfers: &[TransferInstruction]) -> Result<(), LendingError> {
        for (index, instruction) in transfers.iter().enumerate() {
            if let Err(e) = self.transfer.execute(instruction).await {
                self.reverse_transfers(&transfers[..index]).await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Undo executed transfers, newest first
    async fn reverse_transfers(&self, executed: &[TransferInstruction]) {
        for instruction in executed.iter().rev() {
            let reversal = instruction.reversed();
            if let Err(e) = self.transfer.execute(&reversal).await {
                error!(
                    direction = %reversal.direction,
                    party = %reversal.party,
                    asset = %reversal.asset,
                    amount = %reversal.amount,
                    error = %e,
                    "transfer reversal failed"
                );
            }
        }
    }

    fn append(&mut self, event: LedgerEvent) -> Result<JournalRecord, LendingError> {
        let record = JournalRecord::seal(
            self.last_sequence + 1,
            self.last_hash.clone(),
            Uuid::new_v4().to_string(),
            event,
        );
        self.event_store.append(&record)?;

        self.last_sequence = record.sequence;
        self.last_hash = record.hash.clone();
        Ok(record)
    }
}
