//! Lendbank Core - Domain types
//!
//! This crate contains the fundamental types used across Lendbank:
//! - `Amount`: Non-negative decimal wrapper for token amounts
//! - `AssetId` / `OwnerId`: Validated identifiers for banks and position holders
//! - `Clock`: Injected time source

pub mod amount;
pub mod asset;
pub mod clock;
pub mod owner;

pub use amount::{Amount, AmountError};
pub use asset::{AssetId, IdError};
pub use clock::{Clock, ClockError, ManualClock, SystemClock};
pub use owner::OwnerId;
