//! Lending configuration
//!
//! Oracle bounds, default bank terms and the CLI's price table. Loaded from a
//! JSON file; every field falls back to its default when omitted.

use lendbank_core::AssetId;
use lendbank_ledger::{BankParams, InterestRateModel, DEFAULT_CLOSE_FACTOR, DEFAULT_LIQUIDATION_BONUS};
use lendbank_risk::engine::{DEFAULT_MAX_PRICE_AGE_SECS, DEFAULT_ORACLE_TIMEOUT_MS};
use lendbank_risk::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "LENDBANK_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingConfig {
    // === Oracle ===
    /// Oldest accepted price observation (seconds)
    #[serde(default = "default_max_price_age_secs")]
    pub max_price_age_secs: i64,

    /// Bound on a single price lookup (milliseconds)
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,

    // === Bank defaults ===
    /// Rate curve of banks created without an explicit model
    #[serde(default)]
    pub interest_model: InterestRateModel,

    #[serde(default = "default_liquidation_bonus")]
    pub liquidation_bonus: Decimal,

    #[serde(default = "default_close_factor")]
    pub close_factor: Decimal,

    // === CLI ===
    /// Prices served by the CLI's mock oracle
    #[serde(default)]
    pub prices: BTreeMap<AssetId, Decimal>,
}

fn default_max_price_age_secs() -> i64 {
    DEFAULT_MAX_PRICE_AGE_SECS
}

fn default_oracle_timeout_ms() -> u64 {
    DEFAULT_ORACLE_TIMEOUT_MS
}

fn default_liquidation_bonus() -> Decimal {
    DEFAULT_LIQUIDATION_BONUS
}

fn default_close_factor() -> Decimal {
    DEFAULT_CLOSE_FACTOR
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            max_price_age_secs: default_max_price_age_secs(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            interest_model: InterestRateModel::default(),
            liquidation_bonus: default_liquidation_bonus(),
            close_factor: default_close_factor(),
            prices: BTreeMap::new(),
        }
    }
}

impl LendingConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, else from `$LENDBANK_CONFIG`, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_price_age_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "max_price_age_secs must be positive, got {}",
                self.max_price_age_secs
            )));
        }
        if self.max_price_age().is_none() {
            return Err(ConfigError::Invalid(format!(
                "max_price_age_secs is out of range, got {}",
                self.max_price_age_secs
            )));
        }
        if self.oracle_timeout_ms == 0 {
            return Err(ConfigError::Invalid("oracle_timeout_ms must be positive".to_string()));
        }
        if let Some((asset, price)) = self.prices.iter().find(|(_, price)| **price <= Decimal::ZERO) {
            return Err(ConfigError::Invalid(format!("price of {asset} must be positive, got {price}")));
        }
        // a bank built from the defaults must be valid
        self.bank_params(Decimal::ONE, Decimal::ONE)
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Price freshness window; `None` when the seconds overflow a duration
    pub fn max_price_age(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_seconds(self.max_price_age_secs)
    }

    pub fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            max_price_age: self.max_price_age().unwrap_or(chrono::Duration::MAX),
            oracle_timeout: self.oracle_timeout(),
        }
    }

    /// Bank parameters with this configuration's rate curve and terms
    pub fn bank_params(&self, liquidation_threshold: Decimal, max_ltv: Decimal) -> BankParams {
        BankParams::new(liquidation_threshold, max_ltv)
            .with_interest_model(self.interest_model)
            .with_liquidation_terms(self.liquidation_bonus, self.close_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LendingConfig::default();

        assert_eq!(config.max_price_age_secs, 100);
        assert_eq!(config.oracle_timeout_ms, 500);
        assert_eq!(config.liquidation_bonus, dec!(0.05));
        assert_eq!(config.close_factor, dec!(0.5));
        assert!(config.prices.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "max_price_age_secs": 30, "prices": { "SOL": "20.5" } }"#;
        let config: LendingConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.max_price_age_secs, 30);
        assert_eq!(config.oracle_timeout_ms, 500); // default
        assert_eq!(config.prices[&AssetId::new("SOL").unwrap()], dec!(20.5));
    }

    #[test]
    fn test_config_serialization() {
        let config = LendingConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("max_price_age_secs"));

        let parsed: LendingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_risk_config_conversion() {
        let config = LendingConfig {
            max_price_age_secs: 60,
            oracle_timeout_ms: 250,
            ..LendingConfig::default()
        };
        let risk = config.risk_config();
        assert_eq!(risk.max_price_age, chrono::Duration::seconds(60));
        assert_eq!(risk.oracle_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_price_age_out_of_range() {
        let config = LendingConfig {
            max_price_age_secs: i64::MAX,
            ..LendingConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(config.risk_config().max_price_age, chrono::Duration::MAX);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_price_age_secs": {} }}"#, i64::MAX / 1000 + 1).unwrap();
        let result = LendingConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bank_params_carry_defaults() {
        let config = LendingConfig {
            close_factor: dec!(0.25),
            ..LendingConfig::default()
        };
        let params = config.bank_params(dec!(0.85), dec!(0.8));
        assert_eq!(params.close_factor, dec!(0.25));
        assert_eq!(params.liquidation_bonus, dec!(0.05));
        assert_eq!(params.interest_model, InterestRateModel::default());
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "close_factor": "1.5" }}"#).unwrap();
        let result = LendingConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let result = LendingConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
