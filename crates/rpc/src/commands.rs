//! CLI commands

use lendbank_core::{AssetId, OwnerId};
use lendbank_ledger::Receipt;
use rust_decimal::Decimal;
use serde_json::json;

use crate::context::AppContext;

/// Create a bank for an asset
pub async fn create_bank(
    ctx: &mut AppContext,
    asset: &str,
    liquidation_threshold: Decimal,
    max_ltv: Decimal,
) -> Result<(), anyhow::Error> {
    let asset = AssetId::new(asset)?;
    ctx.create_bank(asset.clone(), liquidation_threshold, max_ltv).await?;

    println!(
        "✅ Created bank {} (threshold {}, max LTV {}, seq: {})",
        asset,
        liquidation_threshold,
        max_ltv,
        ctx.last_sequence()
    );
    Ok(())
}

/// Add liquidity to a bank's treasury
pub async fn fund(ctx: &mut AppContext, asset: &str, amount: Decimal) -> Result<(), anyhow::Error> {
    let asset = AssetId::new(asset)?;
    if let Receipt::Funded { asset, treasury } = ctx.fund(asset, amount).await? {
        println!("✅ Funded {} {} (treasury: {})", amount, asset, treasury);
    }
    Ok(())
}

/// Persist accrued interest of a bank
pub async fn accrue(ctx: &mut AppContext, asset: &str) -> Result<(), anyhow::Error> {
    let asset = AssetId::new(asset)?;
    if let Receipt::Accrued {
        asset,
        deposit_index,
        borrow_index,
    } = ctx.accrue(asset).await?
    {
        println!(
            "✅ Accrued {} (deposit index {}, borrow index {})",
            asset, deposit_index, borrow_index
        );
    }
    Ok(())
}

pub async fn init_user(ctx: &mut AppContext, user: &str) -> Result<(), anyhow::Error> {
    let owner = OwnerId::new(user)?;
    match ctx.init_user(owner).await? {
        Receipt::UserInitialized { owner, created: true } => println!("✅ Initialized position for {}", owner),
        Receipt::UserInitialized { owner, created: false } => println!("ℹ️  Position for {} already exists", owner),
        _ => {}
    }
    Ok(())
}

/// Deposit collateral
pub async fn deposit(ctx: &mut AppContext, user: &str, amount: Decimal, asset: &str) -> Result<(), anyhow::Error> {
    let receipt = ctx.deposit(OwnerId::new(user)?, AssetId::new(asset)?, amount).await?;
    if let Receipt::Deposited(r) = receipt {
        println!(
            "✅ Deposited {} {} for {} ({} shares, seq: {})",
            r.amount,
            r.asset,
            r.owner,
            r.shares,
            ctx.last_sequence()
        );
    }
    Ok(())
}

pub async fn withdraw(ctx: &mut AppContext, user: &str, amount: Decimal, asset: &str) -> Result<(), anyhow::Error> {
    let receipt = ctx.withdraw(OwnerId::new(user)?, AssetId::new(asset)?, amount).await?;
    if let Receipt::Withdrew(r) = receipt {
        println!(
            "✅ Withdrew {} {} for {} ({} shares burned, seq: {})",
            r.amount,
            r.asset,
            r.owner,
            r.shares,
            ctx.last_sequence()
        );
    }
    Ok(())
}

pub async fn borrow(ctx: &mut AppContext, user: &str, amount: Decimal, asset: &str) -> Result<(), anyhow::Error> {
    let receipt = ctx.borrow(OwnerId::new(user)?, AssetId::new(asset)?, amount).await?;
    if let Receipt::Borrowed(r) = receipt {
        println!(
            "✅ Borrowed {} {} for {} ({} debt shares, seq: {})",
            r.amount,
            r.asset,
            r.owner,
            r.shares,
            ctx.last_sequence()
        );
    }
    Ok(())
}

pub async fn repay(ctx: &mut AppContext, user: &str, amount: Decimal, asset: &str) -> Result<(), anyhow::Error> {
    let receipt = ctx.repay(OwnerId::new(user)?, AssetId::new(asset)?, amount).await?;
    if let Receipt::Repaid(r) = receipt {
        println!(
            "✅ Repaid {} {} for {} ({} debt shares left, seq: {})",
            r.amount,
            r.asset,
            r.owner,
            r.balance_shares,
            ctx.last_sequence()
        );
    }
    Ok(())
}

/// Liquidate an unhealthy position
pub async fn liquidate(
    ctx: &mut AppContext,
    liquidator: &str,
    user: &str,
    collateral_asset: &str,
    debt_asset: &str,
) -> Result<(), anyhow::Error> {
    let receipt = ctx
        .liquidate(
            OwnerId::new(liquidator)?,
            OwnerId::new(user)?,
            AssetId::new(collateral_asset)?,
            AssetId::new(debt_asset)?,
        )
        .await?;
    if let Receipt::Liquidated(r) = receipt {
        println!(
            "✅ {} liquidated {}: repaid {} {}, seized {} {}",
            r.liquidator, r.owner, r.repaid, r.debt_asset, r.seized, r.collateral_asset
        );
    }
    Ok(())
}

/// Show banks (all, or one)
pub async fn bank(ctx: &AppContext, asset: Option<&str>) -> Result<(), anyhow::Error> {
    let banks = match asset {
        Some(asset) => vec![ctx.bank(&AssetId::new(asset)?)?],
        None => ctx.banks()?,
    };

    if banks.is_empty() {
        println!("No banks");
        return Ok(());
    }

    for bank in banks {
        let output = json!({
            "asset": bank.asset,
            "total_deposit_value": bank.total_deposit_value.to_string(),
            "total_borrow_value": bank.total_borrow_value.to_string(),
            "treasury": bank.treasury.to_string(),
            "deposit_index": bank.deposit_index.to_string(),
            "borrow_index": bank.borrow_index.to_string(),
            "utilization": bank.utilization().to_string(),
            "borrow_rate": bank.borrow_rate()?.to_string(),
            "last_update": bank.last_update.to_rfc3339(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

/// Show a position's balances
pub async fn position(ctx: &AppContext, user: &str) -> Result<(), anyhow::Error> {
    let owner = OwnerId::new(user)?;
    let balances = ctx.balances(&owner)?;

    println!("Position for {}:", owner);
    if balances.is_empty() {
        println!("  (empty)");
        return Ok(());
    }
    for balance in balances {
        println!(
            "  {}: deposited {}, borrowed {}",
            balance.asset, balance.deposited, balance.borrowed
        );
    }
    Ok(())
}

/// Show a position's health
pub async fn health(ctx: &AppContext, user: &str) -> Result<(), anyhow::Error> {
    let owner = OwnerId::new(user)?;
    let health = ctx.health(&owner).await?;
    let solvent = ctx.is_solvent(&owner).await?;

    let output = json!({
        "owner": owner,
        "collateral_value": health.collateral_value.to_string(),
        "borrow_capacity": health.borrow_capacity.to_string(),
        "borrowed_value": health.borrowed_value.to_string(),
        "health_factor": health.health_factor.map(|h| h.to_string()),
        "solvent": solvent,
        "liquidatable": health.is_liquidatable,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Verify the journal's hash chain
pub async fn audit(ctx: &AppContext) -> Result<(), anyhow::Error> {
    match ctx.audit() {
        Ok(count) => println!("✅ Hash chain verified ({} records)", count),
        Err(e) => println!("❌ Hash chain broken: {}", e),
    }
    Ok(())
}
