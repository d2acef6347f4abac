//! token-reclaim - recover rent from a wallet's SPL token accounts
//!
//! Burns any leftover balance (outside protected mints), closes every
//! token account the wallet owns and returns the rent to the wallet.
//! Work is packed into compute-budgeted transactions which are simulated
//! before being sent; a failed batch is reported and the run continues.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_reclaim::config::{Config, ConfigOverrides, FileConfig};
use token_reclaim::ledger::RpcLedger;
use token_reclaim::reclaim::{run_reclaim, ExecutionOutcome, RunReport};
use token_reclaim::structured_logging::StructuredLogger;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long, env = "RECLAIM_CONFIG")]
    config: Option<String>,

    /// RPC endpoint (http or https)
    #[arg(long, env = "RPC_ENDPOINT")]
    rpc_endpoint: Option<String>,

    /// Base58-encoded 64-byte keypair
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Path to a keypair file (JSON byte array)
    #[arg(long, env = "KEYPAIR_PATH")]
    keypair_path: Option<String>,

    /// Leave USDC balances untouched (close only)
    #[arg(long, env = "SKIP_USDC")]
    skip_usdc: Option<bool>,

    /// Additional mint whose balance must never be burned (repeatable)
    #[arg(long = "protect-mint", value_name = "MINT")]
    protect_mint: Vec<String>,

    /// Maximum reclaim instructions per transaction
    #[arg(long, env = "MAX_INSTRUCTIONS")]
    max_instructions: Option<usize>,

    /// Priority fee in micro-lamports per compute unit
    #[arg(long, env = "COMPUTE_UNIT_PRICE")]
    compute_unit_price: Option<u64>,

    /// Compute unit limit per transaction
    #[arg(long, env = "COMPUTE_UNIT_LIMIT")]
    compute_unit_limit: Option<u32>,

    /// Simulate every batch but submit nothing (`--dry-run false` overrides the config file)
    #[arg(
        long,
        env = "DRY_RUN",
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    dry_run: Option<bool>,

    /// Per-request RPC timeout in seconds
    #[arg(long, env = "RPC_TIMEOUT_SECS")]
    rpc_timeout_secs: Option<u64>,

    /// Confirmation timeout in seconds
    #[arg(long, env = "CONFIRM_TIMEOUT_SECS")]
    confirm_timeout_secs: Option<u64>,

    /// Balance queries kept in flight
    #[arg(long)]
    balance_concurrency: Option<usize>,

    /// Prefix for transaction links
    #[arg(long)]
    explorer_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            rpc_endpoint: self.rpc_endpoint.clone(),
            private_key: self.private_key.clone(),
            keypair_path: self.keypair_path.clone(),
            skip_usdc: self.skip_usdc,
            protected_mints: self.protect_mint.clone(),
            max_instructions: self.max_instructions,
            compute_unit_price: self.compute_unit_price,
            compute_unit_limit: self.compute_unit_limit,
            dry_run: self.dry_run,
            rpc_timeout_secs: self.rpc_timeout_secs,
            confirm_timeout_secs: self.confirm_timeout_secs,
            balance_concurrency: self.balance_concurrency,
            explorer_url: self.explorer_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env feeds clap's env fallbacks, so it must load before parsing
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;

    let config = load_config(&args)?;
    let wallet = config.load_wallet().context("Failed to load wallet")?;
    let settings = config.reclaim_settings()?;
    let ledger = RpcLedger::new(config.ledger_config());

    info!(
        wallet = %wallet.pubkey(),
        endpoint = %ledger.endpoint(),
        dry_run = config.dry_run,
        "Starting token account reclaim"
    );

    let report = run_reclaim(&ledger, &wallet, &settings, StructuredLogger::for_new_run())
        .await
        .context("Reclaim run aborted")?;

    print_report(&config, &report);
    Ok(())
}

/// Initialize logging
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "token_reclaim=debug,info"
    } else {
        "token_reclaim=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_target(true)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Resolve configuration from file, environment and flags
fn load_config(args: &Args) -> Result<Config> {
    let file = match &args.config {
        Some(path) => FileConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => FileConfig::default(),
    };
    Config::resolve(file, args.overrides()).context("Invalid configuration")
}

fn print_report(config: &Config, report: &RunReport) {
    for batch in &report.batches {
        match &batch.outcome {
            ExecutionOutcome::Confirmed { signature } => println!(
                "batch {}: confirmed ({} instructions) {}",
                batch.index,
                batch.instruction_count,
                config.explorer_link(signature)
            ),
            outcome => println!(
                "batch {}: {} ({} instructions)",
                batch.index, outcome, batch.instruction_count
            ),
        }
    }

    println!(
        "{} accounts discovered, {} skipped; {} burns, {} closes in {} batches ({} ok, {} failed)",
        report.accounts_discovered,
        report.accounts_skipped,
        report.burns,
        report.closes,
        report.batches.len(),
        report.succeeded(),
        report.failed(),
    );
    println!("{} accounts closed", report.confirmed_accounts().count());
    println!(
        "reclaimable rent: {:.6} SOL",
        report.reclaimable_lamports as f64 / LAMPORTS_PER_SOL as f64
    );
}
