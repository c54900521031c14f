//! Oracle error types

use thiserror::Error;

/// Oracle-related errors
#[derive(Debug, Error)]
pub enum OracleError {
    /// No feed configured for the asset
    #[error("No price feed for {asset}")]
    PriceNotFound { asset: String },

    /// Price data is older than the requested bound
    #[error("Stale price for {asset}: observed at {observed_at}, max age is {max_age_secs}s")]
    StalePrice {
        asset: String,
        observed_at: String,
        max_age_secs: i64,
    },

    /// Price data is invalid (zero, negative)
    #[error("Invalid price for {asset}: {reason}")]
    InvalidPrice { asset: String, reason: String },

    /// The feed did not answer in time
    #[error("Price lookup for {asset} timed out after {timeout_ms}ms")]
    Timeout { asset: String, timeout_ms: u128 },

    /// External oracle connection failed
    #[error("Oracle connection failed: {source}")]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
