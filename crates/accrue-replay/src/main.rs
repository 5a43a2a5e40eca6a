// crates/accrue-replay/src/main.rs
//
// Binary entrypoint for the Accrue replay tool.
//
// Loads a TOML scenario, initializes tracing, replays the steps against an
// in-memory or RocksDB store, and prints a summary together with the digest
// of the final ledger.

mod config;
mod runner;

use clap::Parser;
use config::ScenarioConfig;
use runner::{replay, ReplaySummary};

use accrue_store::{MemoryStore, RocksStore};

/// Accrue replay: run a distribution scenario and report the resulting ledger.
#[derive(Parser, Debug)]
#[command(name = "accrue-replay", version = "0.1.0", about = "Deterministic reward-distribution replay")]
struct Args {
    /// Path to the TOML scenario file.
    scenario: String,

    /// Persist the ledger in a RocksDB database under this directory
    /// instead of memory. The database must be empty.
    #[arg(long)]
    data_dir: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = ScenarioConfig::load(&args.scenario)?;

    // RUST_LOG wins over the scenario's log level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Accrue replay v0.1.0");
    tracing::info!("Scenario: {} ({} steps)", args.scenario, config.steps.len());
    tracing::info!(
        "Community tax: {}, withdraw addresses {}",
        config.params.community_tax,
        if config.params.withdraw_addr_enabled { "enabled" } else { "disabled" }
    );

    let summary = match &args.data_dir {
        Some(dir) => {
            let db_path = format!("{}/distribution", dir);
            let store = RocksStore::open(&db_path)?;
            tracing::info!("Ledger stored at {}", db_path);
            replay(&config, store)?
        }
        None => replay(&config, MemoryStore::new())?,
    };

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ReplaySummary) {
    println!("steps:          {}", summary.steps);
    println!("final height:   {}", summary.height);
    println!("allocated:      {}", summary.allocated);
    println!("paid out:       {}", summary.paid);
    println!("community pool: {}", summary.community_pool);
    for v in &summary.validators {
        println!(
            "validator {}: outstanding {} commission {}",
            v.validator, v.outstanding, v.commission
        );
    }
    println!("ledger digest:  {}", summary.digest);
}
