//! Clock capability
//!
//! The ledger never reads the system time directly. Every operation asks an
//! injected [`Clock`] for "now", which keeps accrual deterministic in tests
//! and during journal replay.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Clock failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Clock unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<DateTime<Utc>, ClockError>;
}

/// Wall clock backed by [`Utc::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        Ok(Utc::now())
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
    unavailable: AtomicBool,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Start at a unix timestamp (seconds)
    pub fn at_unix(secs: i64) -> Result<Self, ClockError> {
        let start = Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or(ClockError::InvalidTimestamp(secs))?;
        Ok(Self::new(start))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    /// Make subsequent `now()` calls fail
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClockError::Unavailable("manual clock switched off".to_string()));
        }
        Ok(*self.now.read().unwrap_or_else(PoisonError::into_inner))
    }
}
