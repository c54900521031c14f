//! Risk engine implementation

use chrono::{DateTime, Duration, Utc};
use lendbank_core::AssetId;
use lendbank_ledger::{Bank, Position};
use lendbank_oracle::PriceOracle;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RiskError;

/// Default maximum accepted price age (seconds)
pub const DEFAULT_MAX_PRICE_AGE_SECS: i64 = 100;

/// Default bound on a single oracle lookup (milliseconds)
pub const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 500;

/// Oracle freshness and latency bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskConfig {
    pub max_price_age: Duration,
    pub oracle_timeout: std::time::Duration,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_price_age: Duration::seconds(DEFAULT_MAX_PRICE_AGE_SECS),
            oracle_timeout: std::time::Duration::from_millis(DEFAULT_ORACLE_TIMEOUT_MS),
        }
    }
}

/// Priced view of a position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountValuation {
    /// Market value of all deposits
    pub collateral_value: Decimal,
    /// Deposits weighted by each bank's `max_ltv`
    pub borrow_capacity: Decimal,
    /// Deposits weighted by each bank's `liquidation_threshold`
    pub liquidation_collateral: Decimal,
    /// Market value of all debt
    pub borrowed_value: Decimal,
    /// Price used per asset
    pub prices: BTreeMap<AssetId, Decimal>,
}

impl AccountValuation {
    pub fn is_solvent(&self) -> bool {
        self.borrow_capacity >= self.borrowed_value
    }

    pub fn health(&self) -> Result<AccountHealth, RiskError> {
        let health_factor = if self.borrowed_value.is_zero() {
            None
        } else {
            Some(
                self.liquidation_collateral
                    .checked_div(self.borrowed_value)
                    .ok_or(RiskError::MathOverflow("health factor"))?,
            )
        };

        Ok(AccountHealth {
            collateral_value: self.collateral_value,
            borrow_capacity: self.borrow_capacity,
            liquidation_collateral: self.liquidation_collateral,
            borrowed_value: self.borrowed_value,
            is_liquidatable: health_factor.is_some_and(|hf| hf < Decimal::ONE),
            health_factor,
        })
    }
}

/// Liquidation view of a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountHealth {
    pub collateral_value: Decimal,
    pub borrow_capacity: Decimal,
    pub liquidation_collateral: Decimal,
    pub borrowed_value: Decimal,
    /// `liquidation_collateral / borrowed_value`, `None` without debt
    pub health_factor: Option<Decimal>,
    pub is_liquidatable: bool,
}

/// Risk Engine - Pre-commit gatekeeper
///
/// Values drafted positions with oracle prices and the drafted bank indices.
/// Any price it cannot obtain fresh fails the evaluation.
pub struct RiskEngine {
    oracle: Arc<dyn PriceOracle>,
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(oracle: Arc<dyn PriceOracle>, config: RiskConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Fetch a fresh, positive price for `asset`
    pub async fn price(&self, asset: &AssetId, now: DateTime<Utc>) -> Result<Decimal, RiskError> {
        let unavailable = |reason: String| {
            warn!(%asset, %reason, "price unavailable");
            RiskError::OraclePriceUnavailable {
                asset: asset.clone(),
                reason,
            }
        };

        let lookup = self.oracle.get_price(asset, self.config.max_price_age);
        let price = match tokio::time::timeout(self.config.oracle_timeout, lookup).await {
            Err(_) => {
                return Err(unavailable(format!(
                    "lookup timed out after {}ms",
                    self.config.oracle_timeout.as_millis()
                )))
            }
            Ok(Err(e)) => return Err(unavailable(e.to_string())),
            Ok(Ok(price)) => price,
        };

        // the oracle's own check used its clock; hold it to ours too
        price
            .validate(now, self.config.max_price_age)
            .map_err(|e| unavailable(e.to_string()))?;

        debug!(%asset, price = %price.price, source = %price.source, "price fetched");
        Ok(price.price)
    }

    /// Price every asset the position holds shares in and aggregate
    pub async fn valuation(
        &self,
        position: &Position,
        banks: &BTreeMap<AssetId, Bank>,
        now: DateTime<Utc>,
    ) -> Result<AccountValuation, RiskError> {
        let mut valuation = AccountValuation::default();

        for asset in position.assets() {
            let bank = banks
                .get(&asset)
                .ok_or_else(|| RiskError::UnknownAsset(asset.clone()))?;
            let price = self.price(&asset, now).await?;

            let deposit_shares = position.deposit_shares(&asset);
            if !deposit_shares.is_zero() {
                let value = mul(bank.deposit_value(deposit_shares)?, price)?;
                valuation.collateral_value = add(valuation.collateral_value, value)?;
                valuation.borrow_capacity = add(valuation.borrow_capacity, mul(value, bank.params.max_ltv)?)?;
                valuation.liquidation_collateral = add(
                    valuation.liquidation_collateral,
                    mul(value, bank.params.liquidation_threshold)?,
                )?;
            }

            let borrow_shares = position.borrow_shares(&asset);
            if !borrow_shares.is_zero() {
                let value = mul(bank.borrow_value(borrow_shares)?, price)?;
                valuation.borrowed_value = add(valuation.borrowed_value, value)?;
            }

            valuation.prices.insert(asset, price);
        }

        Ok(valuation)
    }

    /// Whether `max_ltv`-weighted collateral covers the debt.
    ///
    /// A position without debt is solvent without consulting the oracle.
    pub async fn is_solvent(
        &self,
        position: &Position,
        banks: &BTreeMap<AssetId, Bank>,
        now: DateTime<Utc>,
    ) -> Result<bool, RiskError> {
        if !position.has_borrows() {
            return Ok(true);
        }
        Ok(self.valuation(position, banks, now).await?.is_solvent())
    }

    /// Reject an insolvent position with `Undercollateralized`
    pub async fn check_solvent(
        &self,
        position: &Position,
        banks: &BTreeMap<AssetId, Bank>,
        now: DateTime<Utc>,
    ) -> Result<(), RiskError> {
        if !position.has_borrows() {
            return Ok(());
        }

        let valuation = self.valuation(position, banks, now).await?;
        if !valuation.is_solvent() {
            warn!(
                owner = %position.owner,
                collateral = %valuation.borrow_capacity,
                borrowed = %valuation.borrowed_value,
                "position would be undercollateralized"
            );
            return Err(RiskError::Undercollateralized {
                collateral: valuation.borrow_capacity,
                borrowed: valuation.borrowed_value,
            });
        }
        Ok(())
    }

    pub async fn health(
        &self,
        position: &Position,
        banks: &BTreeMap<AssetId, Bank>,
        now: DateTime<Utc>,
    ) -> Result<AccountHealth, RiskError> {
        self.valuation(position, banks, now).await?.health()
    }
}

pub(crate) fn mul(a: Decimal, b: Decimal) -> Result<Decimal, RiskError> {
    a.checked_mul(b).ok_or(RiskError::MathOverflow("valuation"))
}

pub(crate) fn add(a: Decimal, b: Decimal) -> Result<Decimal, RiskError> {
    a.checked_add(b).ok_or(RiskError::MathOverflow("valuation"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lendbank_core::{Amount, Clock, ManualClock, OwnerId};
    use lendbank_ledger::{BankParams, InterestRateModel, LedgerEvent, LedgerOp, LedgerState};
    use lendbank_oracle::MockOracle;
    use rust_decimal_macros::dec;

    pub(crate) const T0: i64 = 1_700_000_000;

    pub(crate) fn usdc() -> AssetId {
        AssetId::new("USDC").unwrap()
    }

    pub(crate) fn sol() -> AssetId {
        AssetId::new("SOL").unwrap()
    }

    pub(crate) fn alice() -> OwnerId {
        OwnerId::new("alice").unwrap()
    }

    pub(crate) fn amt(v: Decimal) -> Amount {
        Amount::positive(v).unwrap()
    }

    /// USDC (threshold 0.85, max_ltv 0.8) and SOL (0.75, 0.7) banks with no
    /// interest, both funded with 10,000; alice deposits 100 USDC
    pub(crate) fn scenario(clock: &ManualClock) -> LedgerState {
        let now = clock.now().unwrap();
        let zero_rate = InterestRateModel::Fixed { rate: Decimal::ZERO };
        let mut state = LedgerState::new();
        for (asset, threshold, ltv) in [(usdc(), dec!(0.85), dec!(0.8)), (sol(), dec!(0.75), dec!(0.7))] {
            let params = BankParams::new(threshold, ltv).with_interest_model(zero_rate);
            state
                .apply(&LedgerEvent::new(now, LedgerOp::BankCreated { asset: asset.clone(), params }))
                .unwrap();
            state
                .apply(&LedgerEvent::new(now, LedgerOp::BankFunded { asset, amount: amt(dec!(10000)) }))
                .unwrap();
        }
        state
            .apply(&LedgerEvent::new(now, LedgerOp::UserInitialized { owner: alice() }))
            .unwrap();
        state
            .apply(&LedgerEvent::new(
                now,
                LedgerOp::Deposited { owner: alice(), asset: usdc(), amount: amt(dec!(100)) },
            ))
            .unwrap();
        state
    }

    pub(crate) fn priced_oracle(clock: Arc<ManualClock>) -> Arc<MockOracle> {
        let oracle = MockOracle::with_clock(clock);
        oracle.set_price(usdc(), dec!(1.0));
        oracle.set_price(sol(), dec!(20.0));
        Arc::new(oracle)
    }

    async fn check_borrow(
        engine: &RiskEngine,
        state: &LedgerState,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), RiskError> {
        let prepared = state
            .prepare(&LedgerEvent::new(
                now,
                LedgerOp::Borrowed { owner: alice(), asset: sol(), amount: amt(amount) },
            ))
            .unwrap();
        let position = prepared.draft.position(&alice()).unwrap();
        engine.check_solvent(position, prepared.draft.banks(), now).await
    }

    #[tokio::test]
    async fn test_borrow_within_ltv_is_solvent() {
        let clock = Arc::new(ManualClock::at_unix(T0).unwrap());
        let state = scenario(&clock);
        let engine = RiskEngine::new(priced_oracle(clock.clone()), RiskConfig::default());

        // 100 USDC * 0.8 = 80 >= 3 SOL * 20 = 60
        assert!(check_borrow(&engine, &state, dec!(3), clock.now().unwrap()).await.is_ok());
    }

    #[tokio::test]
    async fn test_borrow_beyond_ltv_is_rejected() {
        let clock = Arc::new(ManualClock::at_unix(T0).unwrap());
        let state = scenario(&clock);
        let engine = RiskEngine::new(priced_oracle(clock.clone()), RiskConfig::default());

        let result = check_borrow(&engine, &state, dec!(5), clock.now().unwrap()).await;
        match result {
            Err(RiskError::Undercollateralized { collateral, borrowed }) => {
                assert_eq!(collateral, dec!(80));
                assert_eq!(borrowed, dec!(100));
            }
            other => panic!("expected Undercollateralized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stale_price_fails_closed() {
        let clock = Arc::new(ManualClock::at_unix(T0).unwrap());
        let state = scenario(&clock);
        let engine = RiskEngine::new(priced_oracle(clock.clone()), RiskConfig::default());

        clock.advance_secs(DEFAULT_MAX_PRICE_AGE_SECS + 1);
        let result = check_borrow(&engine, &state, dec!(1), clock.now().unwrap()).await;
        assert!(matches!(result, Err(RiskError::OraclePriceUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_missing_price_fails_closed() {
        let clock = Arc::new(ManualClock::at_unix(T0).unwrap());
        let state = scenario(&clock);
        let oracle = priced_oracle(clock.clone());
        oracle.remove_price(&sol());
        let engine = RiskEngine::new(oracle, RiskConfig::default());

        let result = check_borrow(&engine, &state, dec!(1), clock.now().unwrap()).await;
        match result {
            Err(RiskError::OraclePriceUnavailable { asset, .. }) => assert_eq!(asset, sol()),
            other => panic!("expected OraclePriceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_oracle_times_out() {
        let clock = Arc::new(ManualClock::at_unix(T0).unwrap());
        let state = scenario(&clock);
        let oracle = priced_oracle(clock.clone());
        oracle.set_latency(Some(std::time::Duration::from_millis(200)));
        let config = RiskConfig {
            oracle_timeout: std::time::Duration::from_millis(10),
            ..RiskConfig::default()
        };
        let engine = RiskEngine::new(oracle, config);

        let result = check_borrow(&engine, &state, dec!(1), clock.now().unwrap()).await;
        match result {
            Err(RiskError::OraclePriceUnavailable { reason, .. }) => assert!(reason.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_debt_is_solvent_without_oracle() {
        let clock = Arc::new(ManualClock::at_unix(T0).unwrap());
        let state = scenario(&clock);
        // empty oracle: any lookup would fail
        let engine = RiskEngine::new(Arc::new(MockOracle::with_clock(clock.clone())), RiskConfig::default());

        let now = clock.now().unwrap();
        let account = state.account_at(&alice(), now).unwrap();
        let position = account.position(&alice()).unwrap();
        assert!(engine.is_solvent(position, account.banks(), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_health_factor() {
        let clock = Arc::new(ManualClock::at_unix(T0).unwrap());
        let mut state = scenario(&clock);
        let oracle = priced_oracle(clock.clone());
        let engine = RiskEngine::new(oracle.clone(), RiskConfig::default());
        let now = clock.now().unwrap();

        state
            .apply(&LedgerEvent::new(now, LedgerOp::Borrowed { owner: alice(), asset: sol(), amount: amt(dec!(4)) }))
            .unwrap();

        let account = state.account_at(&alice(), now).unwrap();
        let position = account.position(&alice()).unwrap();
        let health = engine.health(position, account.banks(), now).await.unwrap();
        // 100 * 0.85 / 80
        assert_eq!(health.health_factor, Some(dec!(1.0625)));
        assert!(!health.is_liquidatable);

        oracle.set_price(sol(), dec!(25));
        let health = engine.health(position, account.banks(), now).await.unwrap();
        // 85 / 100
        assert_eq!(health.health_factor, Some(dec!(0.85)));
        assert!(health.is_liquidatable);
    }

    #[test]
    fn test_health_without_debt() {
        let valuation = AccountValuation {
            collateral_value: dec!(100),
            borrow_capacity: dec!(80),
            liquidation_collateral: dec!(85),
            ..AccountValuation::default()
        };
        let health = valuation.health().unwrap();
        assert_eq!(health.health_factor, None);
        assert!(!health.is_liquidatable);
    }
}
