//! Core oracle types

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lendbank_core::AssetId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::OracleError;

/// A price observation for one asset, quoted in the protocol's unit of account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// The priced asset
    pub asset: AssetId,
    /// Price of one unit of the asset
    pub price: Decimal,
    /// When the feed observed this price
    pub observed_at: DateTime<Utc>,
    /// Source of the price (e.g., "mock", "pyth", "switchboard")
    pub source: String,
}

impl Price {
    pub fn new(
        asset: AssetId,
        price: Decimal,
        observed_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            asset,
            price,
            observed_at,
            source: source.into(),
        }
    }

    /// Age of the observation at `now`. Observations from the future count as fresh.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.observed_at).max(Duration::zero())
    }

    /// Check if price is older than `max_age` at `now`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }

    /// Reject stale or non-positive prices
    pub fn validate(&self, now: DateTime<Utc>, max_age: Duration) -> Result<(), OracleError> {
        if self.price <= Decimal::ZERO {
            return Err(OracleError::InvalidPrice {
                asset: self.asset.to_string(),
                reason: format!("price must be positive, got {}", self.price),
            });
        }

        if self.is_stale(now, max_age) {
            return Err(OracleError::StalePrice {
                asset: self.asset.to_string(),
                observed_at: self.observed_at.to_rfc3339(),
                max_age_secs: max_age.num_seconds(),
            });
        }

        Ok(())
    }
}

/// Price Oracle trait - interface for price feeds
///
/// Implementations can be:
/// - MockOracle: For testing with fixed prices
/// - A Pyth or Switchboard adapter reading on-chain feeds
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Get the current price for an asset, no older than `max_age`
    async fn get_price(&self, asset: &AssetId, max_age: Duration) -> Result<Price, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sol() -> AssetId {
        AssetId::new("SOL").unwrap()
    }

    #[test]
    fn test_price_age_and_staleness() {
        let observed = Utc::now();
        let price = Price::new(sol(), dec!(20), observed, "test");

        let later = observed + Duration::seconds(90);
        assert_eq!(price.age(later), Duration::seconds(90));
        assert!(price.is_stale(later, Duration::seconds(60)));
        assert!(!price.is_stale(later, Duration::seconds(90)));
    }

    #[test]
    fn test_future_observation_is_fresh() {
        let now = Utc::now();
        let price = Price::new(sol(), dec!(20), now + Duration::seconds(5), "test");
        assert_eq!(price.age(now), Duration::zero());
        assert!(price.validate(now, Duration::seconds(1)).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let now = Utc::now();
        let price = Price::new(sol(), Decimal::ZERO, now, "test");
        assert!(matches!(
            price.validate(now, Duration::seconds(60)),
            Err(OracleError::InvalidPrice { .. })
        ));
    }
}
