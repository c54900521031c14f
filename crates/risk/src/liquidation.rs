//! Liquidation planning
//!
//! A position whose health factor fell below 1 can be partially closed by a
//! third party. The liquidator repays up to the debt bank's close factor of
//! the owed amount and receives collateral worth the repayment plus the
//! collateral bank's liquidation bonus.

use chrono::{DateTime, Utc};
use lendbank_core::{Amount, AssetId, OwnerId};
use lendbank_ledger::{Bank, Position};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::engine::{mul, AccountHealth, RiskEngine};
use crate::error::RiskError;

/// Amounts a liquidation moves, priced at planning time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquidationPlan {
    pub repaid: Amount,
    pub seized: Amount,
    pub debt_price: Decimal,
    pub collateral_price: Decimal,
    /// Health before the liquidation
    pub health: AccountHealth,
}

/// Liquidation engine
pub struct LiquidationEngine {
    risk: Arc<RiskEngine>,
}

impl LiquidationEngine {
    pub fn new(risk: Arc<RiskEngine>) -> Self {
        Self { risk }
    }

    /// Size a liquidation of `debt_asset` against `collateral_asset`.
    ///
    /// `banks` must hold every bank the position references, accrued to `now`.
    pub async fn plan(
        &self,
        position: &Position,
        banks: &BTreeMap<AssetId, Bank>,
        collateral_asset: &AssetId,
        debt_asset: &AssetId,
        now: DateTime<Utc>,
    ) -> Result<LiquidationPlan, RiskError> {
        let owner = &position.owner;
        let debt_shares = position.borrow_shares(debt_asset);
        if debt_shares.is_zero() {
            return Err(not_liquidatable(owner, format!("no debt in {debt_asset}")));
        }
        let collateral_shares = position.deposit_shares(collateral_asset);
        if collateral_shares.is_zero() {
            return Err(not_liquidatable(owner, format!("no collateral in {collateral_asset}")));
        }

        let valuation = self.risk.valuation(position, banks, now).await?;
        let health = valuation.health()?;
        if !health.is_liquidatable {
            let reason = match health.health_factor {
                Some(hf) => format!("health factor {hf} is not below 1"),
                None => "position has no debt".to_string(),
            };
            return Err(not_liquidatable(owner, reason));
        }

        let debt_bank = banks
            .get(debt_asset)
            .ok_or_else(|| RiskError::UnknownAsset(debt_asset.clone()))?;
        let collateral_bank = banks
            .get(collateral_asset)
            .ok_or_else(|| RiskError::UnknownAsset(collateral_asset.clone()))?;
        let debt_price = price_of(&valuation.prices, debt_asset)?;
        let collateral_price = price_of(&valuation.prices, collateral_asset)?;

        let owed = debt_bank.borrow_value(debt_shares)?;
        let max_repay = mul(owed, debt_bank.params.close_factor)?;
        let available_collateral = collateral_bank.deposit_value(collateral_shares)?;

        // collateral units per unit of debt repaid, bonus included
        let bonus_multiplier = Decimal::ONE + collateral_bank.params.liquidation_bonus;
        let rate = mul(debt_price, bonus_multiplier)?
            .checked_div(collateral_price)
            .ok_or(RiskError::MathOverflow("liquidation rate"))?;

        let mut repaid = max_repay;
        let mut seized = mul(repaid, rate)?;
        if seized > available_collateral {
            seized = available_collateral;
            repaid = seized
                .checked_div(rate)
                .ok_or(RiskError::MathOverflow("liquidation repayment"))?
                .min(max_repay);
        }

        let repaid = Amount::positive(repaid)
            .map_err(|_| not_liquidatable(owner, "repayment rounds to zero".to_string()))?;
        let seized = Amount::positive(seized)
            .map_err(|_| not_liquidatable(owner, "seizure rounds to zero".to_string()))?;

        info!(
            %owner,
            %debt_asset,
            %collateral_asset,
            %repaid,
            %seized,
            "liquidation planned"
        );

        Ok(LiquidationPlan {
            repaid,
            seized,
            debt_price,
            collateral_price,
            health,
        })
    }
}

fn not_liquidatable(owner: &OwnerId, reason: String) -> RiskError {
    RiskError::NotLiquidatable {
        owner: owner.clone(),
        reason,
    }
}

fn price_of(prices: &BTreeMap<AssetId, Decimal>, asset: &AssetId) -> Result<Decimal, RiskError> {
    prices
        .get(asset)
        .copied()
        .ok_or_else(|| RiskError::OraclePriceUnavailable {
            asset: asset.clone(),
            reason: "not priced in valuation".to_string(),
        })
}
