//! backplaned - Backplane daemon
//!
//! Serves backend status, summaries and gated queries for Redis, PostgreSQL,
//! Elasticsearch and Qdrant over HTTP.
//!
//! Usage:
//!   backplaned [--config FILE] [--demo] serve [--port PORT]
//!   backplaned [--config FILE] [--demo] check
//!
//! Without a config file the built-in defaults apply (local development
//! stack). `--demo` swaps every backend for an in-memory mock.

mod backends;
mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use backplane_api::{create_router, AppState};
use backplane_gateway::{AggregatorConfig, CommandGate, StatusAggregator};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DaemonConfig;

#[derive(Parser, Debug)]
#[command(name = "backplaned")]
#[command(author, version, about = "Status and query gateway for data store backends")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "BACKPLANE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Use in-memory demo backends instead of real connections
    #[arg(long, global = true)]
    demo: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Listen port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Probe every backend once, print the snapshot and exit non-zero if any is down
    Check,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "backplaned=info,backplane_gateway=info,backplane_api=info,backplane_probes=debug".into()
    });
    let json = matches!(format, LogFormat::Json);

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    tracing::info!("Starting backplaned");

    let config = DaemonConfig::load(cli.config.as_deref())?;
    match &cli.config {
        Some(path) => tracing::info!("Loaded config from: {}", path.display()),
        None => tracing::info!("No config file provided, using defaults"),
    }

    let registry = if cli.demo {
        tracing::info!("Demo mode: using in-memory backends");
        backends::build_demo_registry(&config.backends)
    } else {
        backends::build_registry(&config.backends)?
    };
    tracing::info!(backends = registry.len(), "Backend registry ready");

    let assistant_configured = config.assistant.is_configured();
    tracing::info!(configured = assistant_configured, "Assistant credential");

    let aggregator = Arc::new(StatusAggregator::new(
        Arc::new(registry),
        AggregatorConfig {
            status_ttl: config.cache.status_ttl(),
            summary_ttl: config.cache.summary_ttl(),
        },
    ));
    let gate = Arc::new(CommandGate::new(
        aggregator.clone(),
        config.backends.probe.command_timeout(),
    ));

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Check => check(&aggregator).await,
        Commands::Serve { port } => {
            let state = AppState::new(aggregator, gate, assistant_configured);
            serve(state, &config, port).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Force one probe round and print it
async fn check(aggregator: &StatusAggregator) -> anyhow::Result<ExitCode> {
    let snapshot = aggregator.get_snapshot(true).await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if snapshot.all_healthy() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(
            connected = snapshot.connected_count(),
            total = snapshot.len(),
            "Not every backend is healthy"
        );
        Ok(ExitCode::FAILURE)
    }
}

async fn serve(state: AppState, config: &DaemonConfig, port: Option<u16>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!(
        "{}:{}",
        config.server.bind,
        port.unwrap_or(config.server.port)
    )
    .parse()
    .with_context(|| format!("Invalid bind address: {}", config.server.bind))?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["backplaned"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.demo);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["backplaned", "check", "--demo", "--config", "b.toml"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::Check)));
        assert!(cli.demo);
        assert_eq!(cli.config, Some(PathBuf::from("b.toml")));
    }

    #[tokio::test]
    async fn check_fails_when_a_backend_is_down() {
        use backplane_core::{BackendError, BackendKind};
        use backplane_gateway::BackendRegistry;
        use backplane_probes::MockBackend;

        let healthy = Arc::new(MockBackend::new("redis", BackendKind::KeyValue));
        let down = Arc::new(MockBackend::new("qdrant", BackendKind::Vector));
        down.fail_with(BackendError::ConnectionRefused("port 6333".to_string()));

        let mut registry = BackendRegistry::new();
        registry.register_backend(healthy);
        registry.register_backend(down);
        let aggregator = StatusAggregator::new(Arc::new(registry), AggregatorConfig::default());

        let code = check(&aggregator).await.unwrap();
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::FAILURE));
    }

    #[tokio::test]
    async fn check_succeeds_in_demo_mode() {
        let registry = backends::build_demo_registry(&DaemonConfig::default().backends);
        let aggregator = StatusAggregator::new(Arc::new(registry), AggregatorConfig::default());

        let code = check(&aggregator).await.unwrap();
        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::SUCCESS));
    }
}
