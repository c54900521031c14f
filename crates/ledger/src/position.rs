//! User positions
//!
//! A position holds deposit and borrow shares per asset. Amounts are never
//! stored; they are derived from shares and the owning bank's index.

use lendbank_core::{AssetId, OwnerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::{Display, EnumString};

use crate::error::LedgerError;

/// Lifecycle of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    /// Initialized, never held shares
    #[default]
    Empty,
    /// Has held deposit or borrow shares at least once
    Active,
}

/// Shares held by one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub owner: OwnerId,
    pub status: PositionStatus,
    pub deposits: BTreeMap<AssetId, Decimal>,
    pub borrows: BTreeMap<AssetId, Decimal>,
}

impl Position {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            status: PositionStatus::Empty,
            deposits: BTreeMap::new(),
            borrows: BTreeMap::new(),
        }
    }

    pub fn deposit_shares(&self, asset: &AssetId) -> Decimal {
        self.deposits.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn borrow_shares(&self, asset: &AssetId) -> Decimal {
        self.borrows.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn has_borrows(&self) -> bool {
        !self.borrows.is_empty()
    }

    /// Every asset the position holds shares in
    pub fn assets(&self) -> BTreeSet<AssetId> {
        self.deposits
            .keys()
            .chain(self.borrows.keys())
            .cloned()
            .collect()
    }

    pub fn add_deposit_shares(&mut self, asset: &AssetId, shares: Decimal) -> Result<Decimal, LedgerError> {
        add_shares(&mut self.deposits, asset, shares)?;
        self.activate(shares);
        Ok(self.deposit_shares(asset))
    }

    pub fn remove_deposit_shares(&mut self, asset: &AssetId, shares: Decimal) -> Decimal {
        remove_shares(&mut self.deposits, asset, shares)
    }

    pub fn add_borrow_shares(&mut self, asset: &AssetId, shares: Decimal) -> Result<Decimal, LedgerError> {
        add_shares(&mut self.borrows, asset, shares)?;
        self.activate(shares);
        Ok(self.borrow_shares(asset))
    }

    pub fn remove_borrow_shares(&mut self, asset: &AssetId, shares: Decimal) -> Decimal {
        remove_shares(&mut self.borrows, asset, shares)
    }

    fn activate(&mut self, shares: Decimal) {
        if shares > Decimal::ZERO {
            self.status = PositionStatus::Active;
        }
    }
}

fn add_shares(
    map: &mut BTreeMap<AssetId, Decimal>,
    asset: &AssetId,
    shares: Decimal,
) -> Result<(), LedgerError> {
    if shares.is_zero() {
        return Ok(());
    }
    let entry = map.entry(asset.clone()).or_insert(Decimal::ZERO);
    *entry = entry
        .checked_add(shares)
        .ok_or(LedgerError::MathOverflow("position shares"))?;
    Ok(())
}

/// Remove up to `shares`; a balance reaching zero drops the entry.
/// Returns the remaining shares.
fn remove_shares(map: &mut BTreeMap<AssetId, Decimal>, asset: &AssetId, shares: Decimal) -> Decimal {
    let Some(held) = map.get_mut(asset) else {
        return Decimal::ZERO;
    };
    *held = (*held - shares).max(Decimal::ZERO);
    let remaining = *held;
    if remaining.is_zero() {
        map.remove(asset);
    }
    remaining
}

/// Positions keyed by owner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionBook {
    positions: BTreeMap<OwnerId, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, owner: &OwnerId) -> bool {
        self.positions.contains_key(owner)
    }

    pub fn get(&self, owner: &OwnerId) -> Result<&Position, LedgerError> {
        self.positions
            .get(owner)
            .ok_or_else(|| LedgerError::UnknownUser(owner.clone()))
    }

    /// Insert or replace the position of `position.owner`
    pub fn insert(&mut self, position: Position) {
        self.positions.insert(position.owner.clone(), position);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
