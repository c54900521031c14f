//! Bank - the liquidity pool of a single asset
//!
//! A bank never stores per-user amounts. Holders own shares; the amount a
//! share is worth is the bank's current index, so accruing interest for every
//! holder is a single index update.

use chrono::{DateTime, Duration, Utc};
use lendbank_core::{Amount, AssetId};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::interest::{accrue_indices, utilization, Indices, InterestRateModel};

/// Default bonus paid to liquidators on seized collateral (5%)
pub const DEFAULT_LIQUIDATION_BONUS: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Default share of a debt repayable in one liquidation (50%)
pub const DEFAULT_CLOSE_FACTOR: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Decimal places kept on share balances
pub const SHARE_SCALE: u32 = 18;

/// Risk and rate parameters fixed at bank creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankParams {
    /// Collateral weight at which a position becomes liquidatable
    pub liquidation_threshold: Decimal,
    /// Collateral weight available for borrowing
    pub max_ltv: Decimal,
    #[serde(default)]
    pub interest_model: InterestRateModel,
    #[serde(default = "default_liquidation_bonus")]
    pub liquidation_bonus: Decimal,
    #[serde(default = "default_close_factor")]
    pub close_factor: Decimal,
}

fn default_liquidation_bonus() -> Decimal {
    DEFAULT_LIQUIDATION_BONUS
}

fn default_close_factor() -> Decimal {
    DEFAULT_CLOSE_FACTOR
}

impl BankParams {
    /// Parameters with the default rate curve and liquidation terms
    pub fn new(liquidation_threshold: Decimal, max_ltv: Decimal) -> Self {
        Self {
            liquidation_threshold,
            max_ltv,
            interest_model: InterestRateModel::default(),
            liquidation_bonus: DEFAULT_LIQUIDATION_BONUS,
            close_factor: DEFAULT_CLOSE_FACTOR,
        }
    }

    pub fn with_interest_model(mut self, model: InterestRateModel) -> Self {
        self.interest_model = model;
        self
    }

    pub fn with_liquidation_terms(mut self, bonus: Decimal, close_factor: Decimal) -> Self {
        self.liquidation_bonus = bonus;
        self.close_factor = close_factor;
        self
    }

    /// Requires `0 < max_ltv <= liquidation_threshold <= 1`, a non-negative
    /// bonus and a close factor in (0, 1]
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.max_ltv <= Decimal::ZERO
            || self.max_ltv > self.liquidation_threshold
            || self.liquidation_threshold > Decimal::ONE
        {
            return Err(LedgerError::InvalidParameter(format!(
                "expected 0 < max_ltv <= liquidation_threshold <= 1, got max_ltv {} and liquidation_threshold {}",
                self.max_ltv, self.liquidation_threshold
            )));
        }
        if self.liquidation_bonus < Decimal::ZERO {
            return Err(LedgerError::InvalidParameter(format!(
                "liquidation bonus must be >= 0, got {}",
                self.liquidation_bonus
            )));
        }
        if self.close_factor <= Decimal::ZERO || self.close_factor > Decimal::ONE {
            return Err(LedgerError::InvalidParameter(format!(
                "close factor must be in (0, 1], got {}",
                self.close_factor
            )));
        }
        self.interest_model.validate()
    }
}

/// Pool state of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub asset: AssetId,
    pub total_deposit_shares: Decimal,
    pub total_deposit_value: Decimal,
    pub total_borrow_shares: Decimal,
    pub total_borrow_value: Decimal,
    pub deposit_index: Decimal,
    pub borrow_index: Decimal,
    pub last_update: DateTime<Utc>,
    pub treasury: Decimal,
    pub params: BankParams,
}

impl Bank {
    /// Create an empty bank with both indices at 1
    pub fn new(asset: AssetId, params: BankParams, created_at: DateTime<Utc>) -> Result<Self, LedgerError> {
        params.validate()?;
        Ok(Self {
            asset,
            total_deposit_shares: Decimal::ZERO,
            total_deposit_value: Decimal::ZERO,
            total_borrow_shares: Decimal::ZERO,
            total_borrow_value: Decimal::ZERO,
            deposit_index: Indices::INITIAL.deposit_index,
            borrow_index: Indices::INITIAL.borrow_index,
            last_update: created_at,
            treasury: Decimal::ZERO,
            params,
        })
    }

    pub fn indices(&self) -> Indices {
        Indices {
            deposit_index: self.deposit_index,
            borrow_index: self.borrow_index,
        }
    }

    /// Current borrowed share of deposits, in [0, 1]
    pub fn utilization(&self) -> Decimal {
        utilization(self.total_borrow_value, self.total_deposit_value)
    }

    /// Current annualized borrow rate
    pub fn borrow_rate(&self) -> Result<Decimal, LedgerError> {
        self.params.interest_model.borrow_rate(self.utilization())
    }

    /// Accrue interest up to `now`.
    ///
    /// Only whole elapsed seconds are accrued and `last_update` advances by
    /// exactly that many, so a sub-second remainder carries into the next
    /// accrual. A `now` at or before `last_update` is a no-op.
    pub fn accrue(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let elapsed = (now - self.last_update).num_seconds();
        if elapsed <= 0 {
            return Ok(());
        }

        let indices = accrue_indices(
            self.indices(),
            self.utilization(),
            &self.params.interest_model,
            elapsed,
        )?;
        self.deposit_index = indices.deposit_index;
        self.borrow_index = indices.borrow_index;
        self.last_update += Duration::seconds(elapsed);
        self.refresh_totals()
    }

    /// Amount redeemable for `shares` deposit shares
    pub fn deposit_value(&self, shares: Decimal) -> Result<Decimal, LedgerError> {
        shares
            .checked_mul(self.deposit_index)
            .ok_or(LedgerError::MathOverflow("deposit value"))
    }

    /// Amount owed for `shares` borrow shares
    pub fn borrow_value(&self, shares: Decimal) -> Result<Decimal, LedgerError> {
        shares
            .checked_mul(self.borrow_index)
            .ok_or(LedgerError::MathOverflow("borrow value"))
    }

    /// Deposit shares minted for `amount`, rounded down
    pub fn deposit_shares_minted(&self, amount: Amount) -> Result<Decimal, LedgerError> {
        to_shares(amount, self.deposit_index, RoundingStrategy::ToZero, "deposit shares")
    }

    /// Deposit shares burned to redeem `amount`, rounded up
    pub fn deposit_shares_burned(&self, amount: Amount) -> Result<Decimal, LedgerError> {
        to_shares(amount, self.deposit_index, RoundingStrategy::AwayFromZero, "deposit shares")
    }

    /// Borrow shares minted for `amount`, rounded up
    pub fn borrow_shares_minted(&self, amount: Amount) -> Result<Decimal, LedgerError> {
        to_shares(amount, self.borrow_index, RoundingStrategy::AwayFromZero, "borrow shares")
    }

    /// Borrow shares burned by a repayment of `amount`, rounded down
    pub fn borrow_shares_burned(&self, amount: Amount) -> Result<Decimal, LedgerError> {
        to_shares(amount, self.borrow_index, RoundingStrategy::ToZero, "borrow shares")
    }

    /// Add externally supplied liquidity; mints no shares
    pub fn fund(&mut self, amount: Amount) -> Result<(), LedgerError> {
        self.treasury = self
            .treasury
            .checked_add(amount.value())
            .ok_or(LedgerError::MathOverflow("fund"))?;
        Ok(())
    }

    /// Take `amount` into the treasury and mint the matching deposit shares
    pub fn mint_deposit(&mut self, amount: Amount) -> Result<Decimal, LedgerError> {
        let shares = self.deposit_shares_minted(amount)?;
        self.total_deposit_shares = self
            .total_deposit_shares
            .checked_add(shares)
            .ok_or(LedgerError::MathOverflow("deposit shares"))?;
        self.fund(amount)?;
        self.refresh_totals()?;
        Ok(shares)
    }

    /// Burn `shares` deposit shares and pay `amount` out of the treasury
    pub fn burn_deposit(&mut self, shares: Decimal, amount: Amount) -> Result<(), LedgerError> {
        self.pay_out(amount)?;
        self.total_deposit_shares = (self.total_deposit_shares - shares).max(Decimal::ZERO);
        self.refresh_totals()
    }

    /// Pay `amount` out of the treasury and mint the matching borrow shares
    pub fn mint_borrow(&mut self, amount: Amount) -> Result<Decimal, LedgerError> {
        let shares = self.borrow_shares_minted(amount)?;
        self.pay_out(amount)?;
        self.total_borrow_shares = self
            .total_borrow_shares
            .checked_add(shares)
            .ok_or(LedgerError::MathOverflow("borrow shares"))?;
        self.refresh_totals()?;
        Ok(shares)
    }

    /// Burn `shares` borrow shares against a repayment of `amount`
    pub fn burn_borrow(&mut self, shares: Decimal, amount: Amount) -> Result<(), LedgerError> {
        self.fund(amount)?;
        self.total_borrow_shares = (self.total_borrow_shares - shares).max(Decimal::ZERO);
        self.refresh_totals()
    }

    fn pay_out(&mut self, amount: Amount) -> Result<(), LedgerError> {
        if self.treasury < amount.value() {
            return Err(LedgerError::InsufficientLiquidity {
                asset: self.asset.clone(),
                available: self.treasury,
                requested: amount.value(),
            });
        }
        self.treasury -= amount.value();
        Ok(())
    }

    fn refresh_totals(&mut self) -> Result<(), LedgerError> {
        self.total_deposit_value = self.deposit_value(self.total_deposit_shares)?;
        self.total_borrow_value = self.borrow_value(self.total_borrow_shares)?;
        Ok(())
    }
}

/// Convert `amount` to shares at `index`, kept to `SHARE_SCALE` places.
///
/// A conversion that rounds to no shares at all is rejected.
fn to_shares(
    amount: Amount,
    index: Decimal,
    strategy: RoundingStrategy,
    what: &'static str,
) -> Result<Decimal, LedgerError> {
    let shares = amount
        .value()
        .checked_div(index)
        .ok_or(LedgerError::MathOverflow(what))?
        .round_dp_with_strategy(SHARE_SCALE, strategy);
    if shares.is_zero() {
        return Err(LedgerError::InvalidAmount(format!(
            "{} is worth less than the smallest unit of {}",
            amount, what
        )));
    }
    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usdc() -> AssetId {
        AssetId::new("USDC").unwrap()
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn amount(v: Decimal) -> Amount {
        Amount::positive(v).unwrap()
    }

    fn fixed_bank(rate: Decimal) -> Bank {
        let params = BankParams::new(dec!(0.85), dec!(0.8))
            .with_interest_model(InterestRateModel::Fixed { rate });
        Bank::new(usdc(), params, t0()).unwrap()
    }

    #[test]
    fn test_params_ordering() {
        assert!(BankParams::new(dec!(0.85), dec!(0.8)).validate().is_ok());
        assert!(BankParams::new(dec!(1), dec!(1)).validate().is_ok());

        // max_ltv above threshold
        assert!(BankParams::new(dec!(0.7), dec!(0.8)).validate().is_err());
        // zero ltv
        assert!(BankParams::new(dec!(0.5), dec!(0)).validate().is_err());
        // threshold above one
        assert!(BankParams::new(dec!(1.1), dec!(0.8)).validate().is_err());
    }

    #[test]
    fn test_params_liquidation_terms() {
        let params = BankParams::new(dec!(0.85), dec!(0.8)).with_liquidation_terms(dec!(-0.1), dec!(0.5));
        assert!(matches!(params.validate(), Err(LedgerError::InvalidParameter(_))));

        let params = BankParams::new(dec!(0.85), dec!(0.8)).with_liquidation_terms(dec!(0.1), dec!(0));
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_params_json_defaults() {
        let json = r#"{ "liquidation_threshold": "0.85", "max_ltv": "0.8" }"#;
        let params: BankParams = serde_json::from_str(json).unwrap();
        assert_eq!(params, BankParams::new(dec!(0.85), dec!(0.8)));
    }

    #[test]
    fn test_new_bank_is_empty() {
        let bank = fixed_bank(dec!(0.1));
        assert_eq!(bank.deposit_index, Decimal::ONE);
        assert_eq!(bank.borrow_index, Decimal::ONE);
        assert_eq!(bank.treasury, Decimal::ZERO);
        assert_eq!(bank.total_deposit_value, Decimal::ZERO);
    }

    #[test]
    fn test_fund_mints_no_shares() {
        let mut bank = fixed_bank(dec!(0.1));
        bank.fund(amount(dec!(10000))).unwrap();
        assert_eq!(bank.treasury, dec!(10000));
        assert_eq!(bank.total_deposit_shares, Decimal::ZERO);
    }

    #[test]
    fn test_mint_and_burn_deposit() {
        let mut bank = fixed_bank(dec!(0.1));
        let shares = bank.mint_deposit(amount(dec!(100))).unwrap();
        assert_eq!(shares, dec!(100));
        assert_eq!(bank.treasury, dec!(100));

        bank.burn_deposit(shares, amount(dec!(100))).unwrap();
        assert_eq!(bank.total_deposit_shares, Decimal::ZERO);
        assert_eq!(bank.treasury, Decimal::ZERO);
    }

    #[test]
    fn test_share_rounding_favors_the_bank() {
        let mut bank = fixed_bank(dec!(0.1));
        bank.deposit_index = dec!(3);
        bank.borrow_index = dec!(3);

        let ten = amount(dec!(10));
        assert_eq!(bank.deposit_shares_minted(ten).unwrap(), dec!(3.333333333333333333));
        assert_eq!(bank.deposit_shares_burned(ten).unwrap(), dec!(3.333333333333333334));
        assert_eq!(bank.borrow_shares_minted(ten).unwrap(), dec!(3.333333333333333334));
        assert_eq!(bank.borrow_shares_burned(ten).unwrap(), dec!(3.333333333333333333));
    }

    #[test]
    fn test_dust_rounding_to_no_shares_is_rejected() {
        let mut bank = fixed_bank(dec!(0.1));
        bank.fund(amount(dec!(100))).unwrap();
        bank.deposit_index = dec!(2);
        bank.borrow_index = dec!(2);

        let dust = amount(dec!(0.000000000000000001));
        assert!(matches!(bank.mint_deposit(dust), Err(LedgerError::InvalidAmount(_))));
        assert!(matches!(bank.borrow_shares_burned(dust), Err(LedgerError::InvalidAmount(_))));
        assert_eq!(bank.treasury, dec!(100));

        // rounding up never loses the debt
        assert_eq!(bank.mint_borrow(dust).unwrap(), dec!(0.000000000000000001));
        assert_eq!(bank.total_borrow_shares, dec!(0.000000000000000001));
    }

    #[test]
    fn test_borrow_requires_liquidity() {
        let mut bank = fixed_bank(dec!(0.1));
        bank.fund(amount(dec!(50))).unwrap();

        let result = bank.mint_borrow(amount(dec!(51)));
        assert!(matches!(result, Err(LedgerError::InsufficientLiquidity { .. })));
        assert_eq!(bank.treasury, dec!(50));
        assert_eq!(bank.total_borrow_shares, Decimal::ZERO);
    }

    #[test]
    fn test_accrue_refreshes_totals() {
        let mut bank = fixed_bank(dec!(0.1));
        bank.fund(amount(dec!(1000))).unwrap();
        bank.mint_deposit(amount(dec!(100))).unwrap();
        bank.mint_borrow(amount(dec!(50))).unwrap();

        bank.accrue(t0() + Duration::days(365)).unwrap();

        assert!(bank.borrow_index > Decimal::ONE);
        assert!(bank.deposit_index > Decimal::ONE);
        assert_eq!(bank.total_borrow_value, bank.total_borrow_shares * bank.borrow_index);
        assert_eq!(bank.total_deposit_value, bank.total_deposit_shares * bank.deposit_index);
        assert_eq!(bank.last_update, t0() + Duration::days(365));
    }

    #[test]
    fn test_accrue_is_idempotent_and_monotonic() {
        let mut bank = fixed_bank(dec!(0.1));
        bank.fund(amount(dec!(1000))).unwrap();
        bank.mint_deposit(amount(dec!(100))).unwrap();
        bank.mint_borrow(amount(dec!(50))).unwrap();

        let later = t0() + Duration::hours(12);
        bank.accrue(later).unwrap();
        let snapshot = bank.clone();

        bank.accrue(later).unwrap();
        assert_eq!(bank, snapshot);

        // clock going backwards changes nothing
        bank.accrue(t0()).unwrap();
        assert_eq!(bank, snapshot);
    }

    #[test]
    fn test_sub_second_remainder_carries_over() {
        let mut bank = fixed_bank(dec!(0.1));
        bank.fund(amount(dec!(1000))).unwrap();
        bank.mint_deposit(amount(dec!(100))).unwrap();
        bank.mint_borrow(amount(dec!(50))).unwrap();

        bank.accrue(t0() + Duration::milliseconds(1_500)).unwrap();
        assert_eq!(bank.last_update, t0() + Duration::seconds(1));
    }
}
