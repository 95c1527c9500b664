//! inferopsd — the InferOps inference gateway daemon.
//!
//! Single binary that assembles the gateway:
//! - State store (in memory)
//! - Health poller
//! - Alert evaluator
//! - Stream router + REST API
//!
//! # Usage
//!
//! ```text
//! inferopsd serve --config /etc/inferops/inferops.toml --port 8000
//! inferopsd check-config --config inferops.toml
//! ```

mod supervisor;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use inferops_agent::AgentClient;
use inferops_alerts::{AlertEvaluator, AlertRule};
use inferops_api::{ApiState, build_router};
use inferops_core::{GatewayConfig, NodeConfig};
use inferops_health::HealthPoller;
use inferops_state::StateStore;

use crate::supervisor::spawn_supervised;

const RESTART_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "inferopsd", about = "InferOps inference gateway daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway.
    Serve {
        /// Path to inferops.toml.
        #[arg(long, default_value = "inferops.toml")]
        config: PathBuf,

        /// Override `gateway.host`.
        #[arg(long)]
        host: Option<String>,

        /// Override `gateway.port`.
        #[arg(long)]
        port: Option<u16>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        json_logs: bool,
    },
    /// Parse and validate a config file, then print a summary.
    CheckConfig {
        #[arg(long, default_value = "inferops.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            json_logs,
        } => {
            init_tracing(json_logs);
            let mut config = load_config(&config)?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            serve(config).await
        }
        Command::CheckConfig { config } => {
            let config = load_config(&config)?;
            print!("{}", summary(&config));
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,inferopsd=debug,inferops=debug"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    GatewayConfig::from_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn summary(config: &GatewayConfig) -> String {
    let mut out = format!(
        "config OK\n  listen: {}:{}\n  health: every {:?}, timeout {:?}\n  locks: timeout {:?}\n  upstream: timeout {:?}\n  alerts: every {:?}, {} rule(s)\n  nodes: {}\n",
        config.gateway.host,
        config.gateway.port,
        config.health_interval(),
        config.health_timeout(),
        config.lock_timeout(),
        config.upstream_timeout(),
        config.alert_interval(),
        config.alert_rules().len(),
        config.nodes.len(),
    );
    for node in &config.nodes {
        out.push_str(&format!(
            "    [{}] {} weight={} agent={} inference={}\n",
            node.id, node.name, node.static_weight, node.agent_url, node.inference_url
        ));
    }
    out
}

async fn serve(config: GatewayConfig) -> anyhow::Result<()> {
    info!(nodes = config.nodes.len(), "InferOps gateway starting");

    // ── Initialize subsystems ──────────────────────────────────

    let nodes: Arc<[NodeConfig]> = config.nodes.clone().into();
    let state = StateStore::new(&nodes);
    info!("state store initialized");

    let poller = Arc::new(HealthPoller::new(
        state.clone(),
        nodes.clone(),
        AgentClient::new(),
        config.health_interval(),
        config.health_timeout(),
    ));
    info!(interval = ?config.health_interval(), "health poller initialized");

    let rules: Vec<AlertRule> = config.alert_rules().iter().map(AlertRule::from).collect();
    let evaluator = Arc::new(AlertEvaluator::new(state.clone(), rules));
    let alert_interval = config.alert_interval();
    info!(interval = ?alert_interval, "alert evaluator initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let health_shutdown = shutdown_rx.clone();
    let health_handle = spawn_supervised(
        "health-poller",
        shutdown_rx.clone(),
        RESTART_DELAY,
        move || {
            let poller = poller.clone();
            let shutdown = health_shutdown.clone();
            async move { poller.run(shutdown).await }
        },
    );

    let alert_shutdown = shutdown_rx.clone();
    let alert_handle = spawn_supervised(
        "alert-evaluator",
        shutdown_rx.clone(),
        RESTART_DELAY,
        move || {
            let evaluator = evaluator.clone();
            let shutdown = alert_shutdown.clone();
            async move { evaluator.run(alert_interval, shutdown).await }
        },
    );

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ApiState::from_config(&config, state));
    let listener =
        tokio::net::TcpListener::bind((config.gateway.host.as_str(), config.gateway.port))
            .await
            .with_context(|| {
                format!(
                    "failed to bind {}:{}",
                    config.gateway.host, config.gateway.port
                )
            })?;
    info!(addr = %listener.local_addr()?, "API server listening");

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = health_handle.await;
    let _ = alert_handle.await;

    info!("InferOps gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
[gateway]
port = 9000

[[nodes]]
id = 1
name = "gpu-a"
agent_url = "http://10.0.0.1:9100"
inference_url = "http://10.0.0.1:11434/api/chat"
static_weight = 2.0
"#;

    #[test]
    fn cli_parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "inferopsd",
            "serve",
            "--config",
            "/tmp/x.toml",
            "--port",
            "9999",
            "--json-logs",
        ])
        .unwrap();
        match cli.command {
            Command::Serve {
                config,
                host,
                port,
                json_logs,
            } => {
                assert_eq!(config, PathBuf::from("/tmp/x.toml"));
                assert_eq!(host, None);
                assert_eq!(port, Some(9999));
                assert!(json_logs);
            }
            Command::CheckConfig { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.nodes.len(), 1);

        let text = summary(&config);
        assert!(text.starts_with("config OK"));
        assert!(text.contains("[1] gpu-a weight=2"));
        assert!(text.contains("2 rule(s)"));
    }

    #[test]
    fn load_config_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = load_config(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
