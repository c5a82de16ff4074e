mod auth;
mod config;
mod error;
mod gateway;
mod grpc;
mod http;
mod mux;
mod observability;
mod service;
mod validation;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{resolve_database_url, GatewayConfig, DEFAULT_BOOTSTRAP_VALID_DAYS};
use gateway::Gateway;
use liveops_store_sqlite::SqliteStore;
use observability::{init_metrics, TelemetryObserver};
use service::{bootstrap_admin, LiveOpsService};

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "liveops-server")]
#[command(about = "Live-ops event service: gRPC and HTTP/JSON on a single port")]
struct Cli {
    /// Database URL (sqlite://path/to/db.db)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Legacy: Path to SQLite database file (use --database-url instead)
    #[arg(long, global = true, env = "LIVEOPS_DB_PATH")]
    db: Option<String>,

    /// Log level or tracing filter directives
    #[arg(long, global = true, env = "LIVEOPS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve gRPC and HTTP on one port
    Serve {
        /// Listen address
        #[arg(long, env = "LIVEOPS_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,

        /// How long a new connection may take to identify its protocol
        #[arg(long, env = "LIVEOPS_SNIFF_TIMEOUT_MS", default_value = "5000")]
        sniff_timeout_ms: u64,

        /// How many leading bytes may be buffered to identify the protocol
        #[arg(long, env = "LIVEOPS_SNIFF_MAX_BYTES", default_value = "64")]
        sniff_max_bytes: usize,

        /// Do not install the Prometheus recorder or serve /metrics
        #[arg(long)]
        no_metrics: bool,
    },
    /// Create (or reuse) an administrator and print a fresh credential
    Bootstrap {
        /// Administrator name
        #[arg(long, default_value = "admin")]
        name: String,

        /// Credential validity in days (1-365)
        #[arg(long, default_value_t = DEFAULT_BOOTSTRAP_VALID_DAYS)]
        valid_days: i64,

        /// Output only the token (for scripts)
        #[arg(long)]
        plain: bool,
    },
}

// ────────────────────────────────────── Commands ──────────────────────────────────────

async fn cmd_serve(
    config: GatewayConfig,
    with_metrics: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::open(&config.database_url).await?);
    let metrics = if with_metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let service = LiveOpsService::new(store.clone(), store, Arc::new(TelemetryObserver));
    let gateway = Gateway::bind(&config, service, metrics).await?;
    info!(
        addr = %gateway.local_addr(),
        database = %config.database_url,
        log_level = %config.log_level,
        "liveops-server listening"
    );

    gateway
        .run(shutdown_signal())
        .await
        .map_err(|e| e as Box<dyn std::error::Error>)
}

async fn cmd_bootstrap(
    db_url: &str,
    name: &str,
    valid_days: i64,
    plain: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(db_url).await?;
    let (principal, credential) = bootstrap_admin(&store, name, valid_days).await?;

    if plain {
        println!("{}", credential.token);
    } else {
        println!("✓ Administrator ready");
        println!();
        println!("Name:    {}", principal.name);
        println!("ID:      {}", principal.id.0);
        println!("Token:   {}", credential.token);
        println!("Expires: {}", credential.expires_at);
        println!();
        println!("Send it as the x-api-key header (HTTP) or metadata entry (gRPC).");
    }
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down gracefully"),
        _ = terminate => info!("received SIGTERM, shutting down gracefully"),
    }
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db_url = resolve_database_url(cli.database_url, cli.db);

    match cli.command {
        Command::Serve {
            addr,
            sniff_timeout_ms,
            sniff_max_bytes,
            no_metrics,
        } => {
            let config = GatewayConfig::new(
                &addr,
                db_url,
                cli.log_level,
                sniff_timeout_ms,
                sniff_max_bytes,
            )?;
            cmd_serve(config, !no_metrics).await?;
        }
        Command::Bootstrap {
            name,
            valid_days,
            plain,
        } => {
            cmd_bootstrap(&db_url, &name, valid_days, plain).await?;
        }
    }

    Ok(())
}

// ────────────────────────────────────── Tests ──────────────────────────────────────

#[cfg(test)]
mod tests;
