//! Interest Accrual Module
//!
//! Interest compounds continuously on the borrow index:
//! `borrow_index *= e^(rate * elapsed / year)`.
//! Depositors receive the interest borrowers pay, so the deposit index grows
//! by the borrow growth scaled by utilization.

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Seconds in a 365-day year
pub const SECONDS_PER_YEAR: Decimal = Decimal::from_parts(31_536_000, 0, 0, false, 0);

/// Default base borrow rate (2% APR)
pub const DEFAULT_BASE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);
/// Default slope below the kink (10% APR at optimal utilization)
pub const DEFAULT_SLOPE1: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
/// Default slope above the kink (+100% APR at full utilization)
pub const DEFAULT_SLOPE2: Decimal = Decimal::from_parts(100, 0, 0, false, 2);
/// Default optimal utilization (80%)
pub const DEFAULT_OPTIMAL_UTILIZATION: Decimal = Decimal::from_parts(80, 0, 0, false, 2);

/// Annualized borrow rate curve of a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterestRateModel {
    /// Constant rate regardless of utilization
    Fixed { rate: Decimal },

    /// Kinked curve: gentle slope up to `optimal_utilization`, steep after
    Utilization {
        base_rate: Decimal,
        slope1: Decimal,
        slope2: Decimal,
        optimal_utilization: Decimal,
    },
}

impl Default for InterestRateModel {
    fn default() -> Self {
        InterestRateModel::Utilization {
            base_rate: DEFAULT_BASE_RATE,
            slope1: DEFAULT_SLOPE1,
            slope2: DEFAULT_SLOPE2,
            optimal_utilization: DEFAULT_OPTIMAL_UTILIZATION,
        }
    }
}

impl InterestRateModel {
    /// Check that all rates are non-negative and the kink lies in (0, 1)
    pub fn validate(&self) -> Result<(), LedgerError> {
        match *self {
            InterestRateModel::Fixed { rate } => {
                if rate < Decimal::ZERO {
                    return Err(LedgerError::InvalidParameter(format!(
                        "interest rate must be >= 0, got {rate}"
                    )));
                }
            }
            InterestRateModel::Utilization {
                base_rate,
                slope1,
                slope2,
                optimal_utilization,
            } => {
                if base_rate < Decimal::ZERO || slope1 < Decimal::ZERO || slope2 < Decimal::ZERO {
                    return Err(LedgerError::InvalidParameter(
                        "interest rate curve must be non-negative".to_string(),
                    ));
                }
                if optimal_utilization <= Decimal::ZERO || optimal_utilization >= Decimal::ONE {
                    return Err(LedgerError::InvalidParameter(format!(
                        "optimal utilization must be in (0, 1), got {optimal_utilization}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Annualized borrow rate at `utilization` (expected in [0, 1])
    pub fn borrow_rate(&self, utilization: Decimal) -> Result<Decimal, LedgerError> {
        const CTX: &str = "borrow rate";
        match *self {
            InterestRateModel::Fixed { rate } => Ok(rate),
            InterestRateModel::Utilization {
                base_rate,
                slope1,
                slope2,
                optimal_utilization,
            } => {
                if utilization <= optimal_utilization {
                    let ramp = slope1
                        .checked_mul(utilization)
                        .and_then(|v| v.checked_div(optimal_utilization))
                        .ok_or(LedgerError::MathOverflow(CTX))?;
                    base_rate.checked_add(ramp).ok_or(LedgerError::MathOverflow(CTX))
                } else {
                    let excess = (utilization - optimal_utilization)
                        .checked_div(Decimal::ONE - optimal_utilization)
                        .ok_or(LedgerError::MathOverflow(CTX))?;
                    slope2
                        .checked_mul(excess)
                        .and_then(|v| v.checked_add(base_rate))
                        .and_then(|v| v.checked_add(slope1))
                        .ok_or(LedgerError::MathOverflow(CTX))
                }
            }
        }
    }
}

/// Borrowed share of deposited value, 0 with no deposits, capped at 1.
///
/// Externally funded treasuries can lend more than depositors supplied; the
/// cap keeps the rate curve and depositor yield within their defined range.
pub fn utilization(total_borrow_value: Decimal, total_deposit_value: Decimal) -> Decimal {
    if total_deposit_value <= Decimal::ZERO || total_borrow_value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    total_borrow_value
        .checked_div(total_deposit_value)
        .unwrap_or(Decimal::ONE)
        .min(Decimal::ONE)
}

/// Deposit and borrow accrual multipliers of a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indices {
    pub deposit_index: Decimal,
    pub borrow_index: Decimal,
}

impl Indices {
    /// Indices of a freshly created bank
    pub const INITIAL: Self = Self {
        deposit_index: Decimal::ONE,
        borrow_index: Decimal::ONE,
    };
}

/// Advance `indices` by `elapsed_secs` of interest.
///
/// Non-positive elapsed time (including a clock that went backwards) leaves
/// the indices untouched. Neither index ever decreases.
pub fn accrue_indices(
    indices: Indices,
    utilization: Decimal,
    model: &InterestRateModel,
    elapsed_secs: i64,
) -> Result<Indices, LedgerError> {
    const CTX: &str = "interest accrual";

    if elapsed_secs <= 0 {
        return Ok(indices);
    }

    let rate = model.borrow_rate(utilization)?;
    if rate.is_zero() {
        return Ok(indices);
    }

    let exponent = rate
        .checked_mul(Decimal::from(elapsed_secs))
        .and_then(|v| v.checked_div(SECONDS_PER_YEAR))
        .ok_or(LedgerError::MathOverflow(CTX))?;
    let growth = exponent
        .checked_exp()
        .ok_or(LedgerError::MathOverflow(CTX))?
        .max(Decimal::ONE);

    let borrow_index = indices
        .borrow_index
        .checked_mul(growth)
        .ok_or(LedgerError::MathOverflow(CTX))?;

    let deposit_growth = (growth - Decimal::ONE)
        .checked_mul(utilization)
        .and_then(|v| v.checked_add(Decimal::ONE))
        .ok_or(LedgerError::MathOverflow(CTX))?;
    let deposit_index = indices
        .deposit_index
        .checked_mul(deposit_growth)
        .ok_or(LedgerError::MathOverflow(CTX))?;

    Ok(Indices {
        deposit_index: deposit_index.max(indices.deposit_index),
        borrow_index: borrow_index.max(indices.borrow_index),
    })
}
