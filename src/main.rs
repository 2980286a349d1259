use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use workshop_pass::application::BookingServices;
use workshop_pass::config::{DEFAULT_ARTIFACT_TTL_DAYS, ServiceConfig};
use workshop_pass::domain::artifact::ArtifactToken;
use workshop_pass::domain::order::{OrderId, UserId};
use workshop_pass::domain::ports::OrderStoreRef;
use workshop_pass::infrastructure::gateway::SimulatedGateway;
use workshop_pass::infrastructure::in_memory::{InMemoryCatalog, InMemoryOrderStore};
#[cfg(feature = "storage-rocksdb")]
use workshop_pass::infrastructure::rocksdb::RocksDBOrderStore;
use workshop_pass::interfaces::csv::catalog_reader::CatalogReader;
use workshop_pass::interfaces::csv::journal_reader::JournalReader;
use workshop_pass::interfaces::csv::order_writer::OrderWriter;
use workshop_pass::interfaces::replay::JournalReplayer;

const DRAIN_POLL: Duration = Duration::from_millis(10);
const DRAIN_ATTEMPTS: u32 = 500;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "WORKSHOP_PASS_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Base URL of the payment-link provider.
    #[arg(
        long,
        global = true,
        env = "WORKSHOP_PASS_PAYMENT_BASE_URL",
        default_value = "https://pay.example.com"
    )]
    payment_base_url: String,

    /// Deadline for every catalog, gateway and store call, in milliseconds.
    #[arg(long, global = true, env = "WORKSHOP_PASS_CALL_TIMEOUT_MS", default_value_t = 5000)]
    call_timeout_ms: u64,

    /// Generation attempts a reconciliation sweep runs at once.
    #[arg(long, global = true, env = "WORKSHOP_PASS_SWEEP_CONCURRENCY", default_value_t = 4)]
    sweep_concurrency: usize,

    /// Artifact lifetime in days; 0 issues non-expiring artifacts.
    #[arg(
        long,
        global = true,
        env = "WORKSHOP_PASS_ARTIFACT_TTL_DAYS",
        default_value_t = DEFAULT_ARTIFACT_TTL_DAYS as u32
    )]
    artifact_ttl_days: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a booking journal against a workshop catalog and print the orders.
    Replay {
        /// Catalog CSV (reference, title, price, currency, bookable)
        catalog: PathBuf,
        /// Journal CSV (kind, reference, workshop, user, contact, status, note)
        journal: PathBuf,
    },
    /// Issue missing artifacts for successful orders, once.
    Sweep,
    /// Sweep periodically until interrupted.
    Watch {
        /// Seconds between sweeps (default 60).
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Print an order as JSON.
    Status { order_id: String },
    /// Print a user's orders, newest first, as JSON.
    History { user_id: String },
    /// Decode and check a verification token.
    Validate { token: String },
}

impl Cli {
    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            sweep_concurrency: self.sweep_concurrency,
            artifact_ttl: match self.artifact_ttl_days {
                0 => None,
                days => Some(TimeDelta::days(i64::from(days))),
            },
            ..ServiceConfig::default()
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> Result<(OrderStoreRef, bool)> {
    match db_path {
        Some(path) => {
            let store: OrderStoreRef =
                Arc::new(RocksDBOrderStore::open(path).into_diagnostic()?);
            Ok((store, true))
        }
        None => {
            let store: OrderStoreRef = Arc::new(InMemoryOrderStore::new());
            Ok((store, false))
        }
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> Result<(OrderStoreRef, bool)> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    let store: OrderStoreRef = Arc::new(InMemoryOrderStore::new());
    Ok((store, false))
}

async fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let catalog = InMemoryCatalog::new();
    let file = File::open(path).into_diagnostic()?;
    for item in CatalogReader::new(file).items() {
        match item {
            Ok(item) => catalog.upsert(item).await,
            Err(e) => eprintln!("Error reading catalog item: {}", e),
        }
    }
    info!(items = catalog.len().await, "Catalog loaded");
    Ok(catalog)
}

/// Waits for background generations started by webhooks to settle.
async fn drain_generations(services: &BookingServices) {
    for _ in 0..DRAIN_ATTEMPTS {
        if services.artifacts.in_flight_count() == 0 {
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
    warn!(
        in_flight = services.artifacts.in_flight_count(),
        "Artifact generations still running"
    );
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workshop_pass=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.service_config();
    let (store, persistent) = open_store(cli.db_path.as_deref())?;

    let catalog = match &cli.command {
        Commands::Replay { catalog, .. } => load_catalog(catalog).await?,
        _ => InMemoryCatalog::new(),
    };

    let services = BookingServices::new(
        store,
        Arc::new(SimulatedGateway::new(cli.payment_base_url.clone())),
        Arc::new(catalog),
        Arc::new(mockable::DefaultClock),
        &config,
    );

    match cli.command {
        Commands::Replay { journal, .. } => {
            let file = File::open(journal).into_diagnostic()?;
            let mut replayer = JournalReplayer::new(&services.lifecycle);
            for entry in JournalReader::new(file).entries() {
                match entry {
                    Ok(entry) => {
                        if let Err(e) = replayer.apply(entry).await {
                            eprintln!("Error applying journal entry: {}", e);
                        }
                    }
                    Err(e) => eprintln!("Error reading journal entry: {}", e),
                }
            }

            drain_generations(&services).await;
            let report = services
                .reconciliation
                .sweep_missing_artifacts()
                .await
                .into_diagnostic()?;
            debug!(?report, "Post-replay reconciliation");
            drain_generations(&services).await;

            let mut orders = Vec::with_capacity(replayer.touched().len());
            for order_id in replayer.touched() {
                orders.push(
                    services
                        .lifecycle
                        .get_order_status(order_id)
                        .await
                        .into_diagnostic()?,
                );
            }

            let stdout = io::stdout();
            let mut writer = OrderWriter::new(stdout.lock());
            writer.write_orders(&orders).into_diagnostic()?;
        }
        Commands::Sweep => {
            let report = services
                .reconciliation
                .sweep_missing_artifacts()
                .await
                .into_diagnostic()?;
            print_json(&report)?;
        }
        Commands::Watch { interval_secs } => {
            let interval = interval_secs
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or(config.sweep_interval);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(true);
                }
            });
            services
                .reconciliation
                .run(interval, shutdown_rx)
                .await;
        }
        Commands::Status { order_id } => {
            let order = services
                .lifecycle
                .get_order_status(&OrderId::from(order_id))
                .await
                .into_diagnostic()?;
            print_json(&order)?;
        }
        Commands::History { user_id } => {
            let orders = services
                .lifecycle
                .get_order_history(&UserId::from(user_id))
                .await
                .into_diagnostic()?;
            print_json(&orders)?;
        }
        Commands::Validate { token } => {
            let token = ArtifactToken::from(token);
            let payload = if persistent {
                services.artifacts.verify_artifact(&token).await
            } else {
                services.artifacts.validate_artifact(&token)
            }
            .into_diagnostic()?;
            print_json(&payload)?;
        }
    }

    Ok(())
}
