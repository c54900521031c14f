//! AssetId - Identifier of the fungible asset backing a bank
//!
//! Asset identifiers are opaque: a ticker such as `USDC` or a mint address
//! both work. They are case-sensitive, since mint addresses are.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of an identifier (fits a base58 mint address)
pub const MAX_ID_LEN: usize = 64;

/// Errors that can occur when parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Empty identifier")]
    Empty,

    #[error("Identifier too long (max {MAX_ID_LEN} chars): {0}")]
    TooLong(String),

    #[error("Invalid identifier format: {0}")]
    InvalidFormat(String),
}

/// Validate an identifier: non-empty, bounded, `[A-Za-z0-9_.-]` only.
pub(crate) fn validate_id(raw: &str) -> Result<String, IdError> {
    let s = raw.trim();

    if s.is_empty() {
        return Err(IdError::Empty);
    }

    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong(s.to_string()));
    }

    if !s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(IdError::InvalidFormat(s.to_string()));
    }

    Ok(s.to_string())
}

/// Identifier of a supported asset (one bank per asset).
///
/// # Examples
/// ```
/// use lendbank_core::AssetId;
///
/// let usdc: AssetId = "USDC".parse().unwrap();
/// assert_eq!(usdc.as_str(), "USDC");
///
/// // Mint addresses are kept verbatim
/// let mint: AssetId = "So11111111111111111111111111111111111111112".parse().unwrap();
/// assert_eq!(mint.to_string().len(), 43);
///
/// assert!("".parse::<AssetId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Create an asset identifier, validating its format
    pub fn new(id: impl AsRef<str>) -> Result<Self, IdError> {
        validate_id(id.as_ref()).map(Self)
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AssetId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker() {
        let asset: AssetId = "USDC".parse().unwrap();
        assert_eq!(asset.as_str(), "USDC");
        assert_eq!(asset.to_string(), "USDC");
    }

    #[test]
    fn test_case_is_preserved() {
        let lower: AssetId = "usdc".parse().unwrap();
        let upper: AssetId = "USDC".parse().unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_whitespace_trimmed() {
        let asset: AssetId = "  SOL ".parse().unwrap();
        assert_eq!(asset.as_str(), "SOL");
    }

    #[test]
    fn test_empty_error() {
        assert!(matches!("".parse::<AssetId>(), Err(IdError::Empty)));
        assert!(matches!("   ".parse::<AssetId>(), Err(IdError::Empty)));
    }

    #[test]
    fn test_too_long_error() {
        let long = "A".repeat(MAX_ID_LEN + 1);
        assert!(matches!(long.parse::<AssetId>(), Err(IdError::TooLong(_))));
    }

    #[test]
    fn test_invalid_format_error() {
        assert!(matches!(
            "BTC/USD".parse::<AssetId>(),
            Err(IdError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip_and_validation() {
        let asset = AssetId::new("SOL").unwrap();
        let json = serde_json::to_string(&asset).unwrap();
        assert_eq!(json, "\"SOL\"");
        assert_eq!(serde_json::from_str::<AssetId>(&json).unwrap(), asset);

        assert!(serde_json::from_str::<AssetId>("\"a b\"").is_err());
    }
}
