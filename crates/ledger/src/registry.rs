//! Bank registry - one bank per asset

use lendbank_core::AssetId;
use std::collections::BTreeMap;

use crate::bank::Bank;
use crate::error::LedgerError;

/// All banks keyed by asset, iterated in asset order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankRegistry {
    banks: BTreeMap<AssetId, Bank>,
}

impl BankRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, asset: &AssetId) -> bool {
        self.banks.contains_key(asset)
    }

    pub fn get(&self, asset: &AssetId) -> Result<&Bank, LedgerError> {
        self.banks
            .get(asset)
            .ok_or_else(|| LedgerError::UnknownAsset(asset.clone()))
    }

    /// Insert or replace the bank of `bank.asset`
    pub fn insert(&mut self, bank: Bank) {
        self.banks.insert(bank.asset.clone(), bank);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bank> {
        self.banks.values()
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}
