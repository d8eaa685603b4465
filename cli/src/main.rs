//! LedgerIndex CLI: sync a Rivine chain into a ledger store and inspect it.
//!
//! # Commands
//! ```text
//! ledgerindex sync
//! ledgerindex run
//! ledgerindex status
//! ledgerindex block  <HEIGHT>
//! ledgerindex tx     <ID>
//! ledgerindex wallet <ADDRESS>
//! ledgerindex peers
//! ledgerindex info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use ledgerindex_core::store::LedgerStore;
use ledgerindex_rivine::{
    ChainClient, HttpChainClient, SyncEngine, SyncEngineBuilder, SyncOutcome,
};
use ledgerindex_storage::{InMemoryLedgerStore, SqliteLedgerStore};

mod config;
mod logging;

use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "ledgerindex",
    about = "Sequential ledger indexer for Rivine-based chains",
    long_about = "
LedgerIndex walks a Rivine node (e.g. tfchain) block by block and keeps an
address-indexed coin ledger: blocks, transactions and wallet balances.

ENVIRONMENT VARIABLES:
  RUST_LOG    tracing filter, overrides --log-level
",
    version
)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Node base URL (default: http://localhost:23110/)
    #[arg(long, global = true)]
    node: Option<String>,

    /// SQLite database file (default: in-memory store)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Log level: trace | debug | info | warn | error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the store up to the current chain head once
    Sync,

    /// Sync, then keep following the head and refreshing snapshots
    Run,

    /// Compare the store's cursor with the node head
    Status,

    /// Show a stored block
    Block {
        height: u64,
    },

    /// Show a stored transaction
    Tx {
        id: String,
    },

    /// Show a wallet balance
    Wallet {
        address: String,
    },

    /// List the node's connected peers
    Peers,

    /// Show build and configuration info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Sync => cmd_sync(&config).await,
        Commands::Run => cmd_run(&config).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Block { height } => cmd_block(&config, height).await,
        Commands::Tx { id } => cmd_tx(&config, &id).await,
        Commands::Wallet { address } => cmd_wallet(&config, &address).await,
        Commands::Peers => cmd_peers(&config).await,
        Commands::Info => cmd_info(&config),
    }
}

/// Config file (if any), overridden by flags.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(node) = &cli.node {
        config.node.base_url = node.clone();
    }
    if let Some(db) = &cli.db {
        config.db = Some(db.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    if cli.json_logs {
        config.log.json = true;
    }
    Ok(config)
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn LedgerStore>> {
    match &config.db {
        Some(path) => {
            let store = SqliteLedgerStore::open(path)
                .await
                .with_context(|| format!("opening ledger database {path}"))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("no --db given, using an in-memory ledger store");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
    }
}

fn client(config: &AppConfig) -> Result<HttpChainClient> {
    Ok(HttpChainClient::new(config.node.http())?)
}

async fn engine(config: &AppConfig) -> Result<SyncEngine> {
    Ok(SyncEngineBuilder::new()
        .with_config(config.sync.clone())
        .store(open_store(config).await?)
        .build(client(config)?))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_time(timestamp: u64) -> String {
    chrono::DateTime::from_timestamp(timestamp as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn cmd_sync(config: &AppConfig) -> Result<()> {
    let engine = engine(config).await?;
    let outcome = engine.sync_to_head().await.context("sync failed")?;
    println!("{}", sync_summary(&outcome));
    Ok(())
}

/// Reports the committed height; a pass that stopped short also names the head.
fn sync_summary(outcome: &SyncOutcome) -> String {
    let committed = match outcome.committed {
        Some(h) => format!("synced to height {h}"),
        None => "nothing committed".to_string(),
    };
    let trailer = if outcome.converged {
        String::new()
    } else {
        format!("; head {} still moving", outcome.head)
    };
    format!(
        "{committed} ({} blocks, {} transactions, {} rounds){trailer}",
        outcome.blocks_indexed, outcome.transactions_indexed, outcome.rounds,
    )
}

async fn cmd_run(config: &AppConfig) -> Result<()> {
    let engine = engine(config).await?;
    let poll = config.sync.poll_interval();
    info!(node = %config.node.base_url, poll_ms = poll.as_millis() as u64, "following chain head");

    loop {
        if let Err(e) = follow_once(&engine).await {
            error!(error = %e, "sync round failed");
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Run the initial pass until it converges, then refresh through the
/// freshness trigger.
async fn follow_once(engine: &SyncEngine) -> Result<()> {
    if !engine.status().synced {
        engine.sync_to_head().await?;
        return Ok(());
    }
    let head = engine.client().head().await?.height;
    let signal = engine.ensure_synced_to(head).await?;
    if signal.triggered_refresh {
        info!(head, "ledger refreshed");
    }
    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let client = client(config)?;
    let cursor = store.last_height().await?;
    let head = client.head().await?.height;

    println!("node:          {}", client.base_url());
    println!("head:          {head}");
    match cursor {
        Some(h) => println!("last indexed:  {h}"),
        None => println!("last indexed:  (empty)"),
    }
    let lag = ledgerindex_core::cursor::SyncCursor::new(cursor).lag(head);
    println!("lag:           {lag}");
    println!("blocks:        {}", store.block_count().await?);
    println!("transactions:  {}", store.transaction_count().await?);
    Ok(())
}

async fn cmd_block(config: &AppConfig, height: u64) -> Result<()> {
    let store = open_store(config).await?;
    match store.block_by_height(height).await? {
        Some(block) => {
            println!("time: {}", format_time(block.timestamp));
            print_json(&block)
        }
        None => anyhow::bail!("no block at height {height}"),
    }
}

async fn cmd_tx(config: &AppConfig, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    match store.transaction(id).await? {
        Some(tx) => {
            println!(
                "included at height {} ({})",
                tx.block.height,
                format_time(tx.block.timestamp)
            );
            print_json(&tx)
        }
        None => anyhow::bail!("transaction {id} not indexed"),
    }
}

async fn cmd_wallet(config: &AppConfig, address: &str) -> Result<()> {
    let store = open_store(config).await?;
    match store.wallet(address).await? {
        Some(wallet) => print_json(&wallet),
        None => anyhow::bail!("address {address} not seen"),
    }
}

async fn cmd_peers(config: &AppConfig) -> Result<()> {
    let peers = client(config)?.peers().await?;
    if peers.is_empty() {
        println!("no peers");
    }
    for peer in peers {
        println!(
            "{:<40} {:<10} {}",
            peer.netaddress,
            peer.version.as_deref().unwrap_or("-"),
            if peer.inbound.unwrap_or(false) {
                "inbound"
            } else {
                "outbound"
            }
        );
    }
    Ok(())
}

fn cmd_info(config: &AppConfig) -> Result<()> {
    println!("LedgerIndex v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Node:        {}", config.node.base_url);
    println!("User agent:  {}", config.node.user_agent);
    println!("Store:       {}", config.db.as_deref().unwrap_or("in-memory"));
    println!("Chain:       {}", config.sync.chain);
    println!();
    print_json(&config.sync)
}
