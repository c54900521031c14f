//! Mock Oracle for testing
//!
//! Provides configurable fixed prices for testing collateral valuation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lendbank_core::{AssetId, Clock, SystemClock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::OracleError;
use crate::types::{Price, PriceOracle};

/// Mock Price Oracle for testing
///
/// Stores fixed prices that can be updated programmatically. Freshness is
/// judged against the injected clock, so tests driving a `ManualClock` can
/// age prices deterministically.
pub struct MockOracle {
    /// Stored prices (asset -> price)
    prices: RwLock<HashMap<AssetId, Price>>,
    clock: Arc<dyn Clock>,
    /// Artificial response delay, for exercising lookup timeouts
    latency: RwLock<Option<std::time::Duration>>,
}

impl MockOracle {
    /// Create a new empty mock oracle on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty mock oracle stamping and aging prices with `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            clock,
            latency: RwLock::new(None),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().unwrap_or_else(|_| Utc::now())
    }

    /// Set a price observed now
    pub fn set_price(&self, asset: AssetId, price: Decimal) {
        let observed_at = self.now();
        self.set_price_at(asset, price, observed_at);
    }

    /// Set a price with an explicit observation time
    pub fn set_price_at(&self, asset: AssetId, price: Decimal, observed_at: DateTime<Utc>) {
        let price_obj = Price::new(asset.clone(), price, observed_at, "mock");
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        prices.insert(asset, price_obj);
    }

    /// Remove a price (for testing missing feeds)
    pub fn remove_price(&self, asset: &AssetId) {
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        prices.remove(asset);
    }

    /// Delay every lookup by `latency`
    pub fn set_latency(&self, latency: Option<std::time::Duration>) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = latency;
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn get_price(&self, asset: &AssetId, max_age: Duration) -> Result<Price, OracleError> {
        let latency = *self.latency.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let price = {
            let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
            prices
                .get(asset)
                .cloned()
                .ok_or_else(|| OracleError::PriceNotFound {
                    asset: asset.to_string(),
                })?
        };

        price.validate(self.now(), max_age)?;
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbank_core::ManualClock;
    use rust_decimal_macros::dec;

    fn asset(id: &str) -> AssetId {
        AssetId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_mock_oracle_set_price() {
        let oracle = MockOracle::new();
        let sol = asset("SOL");

        // Initially not set
        assert!(oracle.get_price(&sol, Duration::seconds(60)).await.is_err());

        oracle.set_price(sol.clone(), dec!(20));

        let price = oracle.get_price(&sol, Duration::seconds(60)).await.unwrap();
        assert_eq!(price.price, dec!(20));
        assert_eq!(price.source, "mock");
    }

    #[tokio::test]
    async fn test_mock_oracle_price_not_found() {
        let oracle = MockOracle::new();
        let result = oracle.get_price(&asset("UNKNOWN"), Duration::seconds(60)).await;
        assert!(matches!(result, Err(OracleError::PriceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_mock_oracle_ages_with_clock() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000).unwrap());
        let oracle = MockOracle::with_clock(clock.clone());
        let usdc = asset("USDC");

        oracle.set_price(usdc.clone(), dec!(1));
        assert!(oracle.get_price(&usdc, Duration::seconds(100)).await.is_ok());

        clock.advance_secs(101);
        let result = oracle.get_price(&usdc, Duration::seconds(100)).await;
        assert!(matches!(result, Err(OracleError::StalePrice { .. })));
    }

    #[tokio::test]
    async fn test_mock_oracle_remove_price() {
        let oracle = MockOracle::new();
        oracle.set_price(asset("USDC"), dec!(1));
        oracle.set_price(asset("SOL"), dec!(20));

        oracle.remove_price(&asset("SOL"));
        let result = oracle.get_price(&asset("SOL"), Duration::seconds(60)).await;
        assert!(matches!(result, Err(OracleError::PriceNotFound { .. })));
        assert!(oracle.get_price(&asset("USDC"), Duration::seconds(60)).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_oracle_latency() {
        let oracle = MockOracle::new();
        oracle.set_price(asset("USDC"), dec!(1));
        oracle.set_latency(Some(std::time::Duration::from_millis(500)));

        let usdc = asset("USDC");
        let lookup = oracle.get_price(&usdc, Duration::seconds(60));
        let result = tokio::time::timeout(std::time::Duration::from_millis(20), lookup).await;
        assert!(result.is_err());
    }
}
