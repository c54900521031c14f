//! Lendbank CLI - Main entry point

use clap::{Parser, Subcommand};
use lendbank_core::SystemClock;
use lendbank_ledger::NoopTransfer;
use lendbank_oracle::MockOracle;
use lendbank_rpc::{commands, AppContext, Capabilities, LendingConfig};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lendbank")]
#[command(about = "Lendbank - Over-collateralized lending ledger", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Config file (falls back to $LENDBANK_CONFIG, then defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a bank for an asset
    CreateBank {
        /// Asset code
        asset: String,
        /// Collateral weight at which positions become liquidatable
        #[arg(long)]
        liquidation_threshold: Decimal,
        /// Collateral weight for new borrows and withdrawals
        #[arg(long)]
        max_ltv: Decimal,
    },

    /// Add liquidity to a bank's treasury
    Fund {
        /// Asset code
        asset: String,
        /// Amount to add
        amount: Decimal,
    },

    /// Persist accrued interest of a bank
    Accrue {
        /// Asset code
        asset: String,
    },

    /// Create an empty position
    InitUser {
        /// User ID
        user: String,
    },

    /// Deposit collateral
    Deposit {
        /// User ID
        user: String,
        /// Amount to deposit
        amount: Decimal,
        /// Asset code
        asset: String,
    },

    /// Withdraw collateral
    Withdraw {
        /// User ID
        user: String,
        /// Amount to withdraw
        amount: Decimal,
        /// Asset code
        asset: String,
    },

    /// Borrow against collateral
    Borrow {
        /// User ID
        user: String,
        /// Amount to borrow
        amount: Decimal,
        /// Asset code
        asset: String,
    },

    /// Repay debt
    Repay {
        /// User ID
        user: String,
        /// Amount to repay
        amount: Decimal,
        /// Asset code
        asset: String,
    },

    /// Liquidate an unhealthy position
    Liquidate {
        /// Liquidator ID
        liquidator: String,
        /// Owner of the unhealthy position
        user: String,
        /// Collateral asset to seize
        #[arg(long)]
        collateral: String,
        /// Debt asset to repay
        #[arg(long)]
        debt: String,
    },

    /// Show bank state
    Bank {
        /// Asset code (all banks when omitted)
        asset: Option<String>,
    },

    /// Show a position's balances
    Position {
        /// User ID
        user: String,
    },

    /// Show a position's health
    Health {
        /// User ID
        user: String,
    },

    /// Audit the journal (verify hash chain)
    Audit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lendbank=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = LendingConfig::load(cli.config.as_deref())?;

    let clock = Arc::new(SystemClock);
    let oracle = MockOracle::with_clock(clock.clone());
    for (asset, price) in &config.prices {
        oracle.set_price(asset.clone(), *price);
    }
    let capabilities = Capabilities {
        oracle: Arc::new(oracle),
        transfer: Arc::new(NoopTransfer),
        clock,
    };

    // Create application context (replays the journal)
    let mut ctx = AppContext::open(&cli.data, config, capabilities)?;

    match cli.command {
        Commands::CreateBank {
            asset,
            liquidation_threshold,
            max_ltv,
        } => {
            commands::create_bank(&mut ctx, &asset, liquidation_threshold, max_ltv).await?;
        }

        Commands::Fund { asset, amount } => {
            commands::fund(&mut ctx, &asset, amount).await?;
        }

        Commands::Accrue { asset } => {
            commands::accrue(&mut ctx, &asset).await?;
        }

        Commands::InitUser { user } => {
            commands::init_user(&mut ctx, &user).await?;
        }

        Commands::Deposit { user, amount, asset } => {
            commands::deposit(&mut ctx, &user, amount, &asset).await?;
        }

        Commands::Withdraw { user, amount, asset } => {
            commands::withdraw(&mut ctx, &user, amount, &asset).await?;
        }

        Commands::Borrow { user, amount, asset } => {
            commands::borrow(&mut ctx, &user, amount, &asset).await?;
        }

        Commands::Repay { user, amount, asset } => {
            commands::repay(&mut ctx, &user, amount, &asset).await?;
        }

        Commands::Liquidate {
            liquidator,
            user,
            collateral,
            debt,
        } => {
            commands::liquidate(&mut ctx, &liquidator, &user, &collateral, &debt).await?;
        }

        Commands::Bank { asset } => {
            commands::bank(&ctx, asset.as_deref()).await?;
        }

        Commands::Position { user } => {
            commands::position(&ctx, &user).await?;
        }

        Commands::Health { user } => {
            commands::health(&ctx, &user).await?;
        }

        Commands::Audit => {
            commands::audit(&ctx).await?;
        }
    }

    Ok(())
}
