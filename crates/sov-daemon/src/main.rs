//! # sov-daemon
//!
//! Sovereign compliance engine HTTP daemon.
//!
//! Loads the policy set from YAML and the engine config from TOML, opens
//! the audit log, and serves the compliance API. A background task replays
//! audit records that were deferred while the log was unavailable.
//!
//! ## Usage
//!
//! ```text
//! sov-daemon --policies policies.yaml --config engine.toml --bind 127.0.0.1:8740
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sov_daemon::{build_app, AppState};
use sov_engine::{ComplianceEngine, EngineConfig, EngineError};
use sov_policy::PolicySet;

/// Sovereign compliance engine HTTP daemon.
#[derive(Parser)]
#[command(name = "sov-daemon", about = "Sovereign compliance engine HTTP API")]
struct Cli {
    /// Engine config (TOML). Defaults apply when the file is absent.
    #[arg(long, default_value = "engine.toml")]
    config: PathBuf,

    /// Policy set (YAML). Without it the daemon starts with no residency
    /// policies and the built-in sector postures.
    #[arg(long)]
    policies: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8740")]
    bind: String,

    /// Seconds between replays of deferred audit records.
    #[arg(long, default_value_t = 30)]
    reconcile_interval_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("sov_engine=info".parse()?)
        .add_directive("sov_daemon=info".parse()?);
    // Logs go to stderr so stdout stays free for the caller.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn spawn_reconciler(engine: Arc<ComplianceEngine>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let engine = engine.clone();
            let outcome = tokio::task::spawn_blocking(move || -> Result<usize, EngineError> {
                if engine.pending_audit_count()? == 0 {
                    return Ok(0);
                }
                engine.reconcile()
            })
            .await;
            match outcome {
                Ok(Ok(0)) => {}
                Ok(Ok(n)) => tracing::info!(replayed = n, "deferred audit records written"),
                Ok(Err(e)) => tracing::warn!(error = %e, "audit reconcile failed"),
                Err(e) => tracing::error!(error = %e, "reconciler task failed"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let config = EngineConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading engine config {}", cli.config.display()))?;
    let set = match &cli.policies {
        Some(path) => PolicySet::from_yaml_file(path)
            .with_context(|| format!("loading policies {}", path.display()))?,
        None => {
            tracing::warn!("no --policies given, starting without residency policies");
            PolicySet::default()
        }
    };

    tracing::info!(audit_log = %config.audit_log.display(), "starting compliance engine");
    let engine = ComplianceEngine::open(config, set)?;

    let mut state = AppState::new(engine);
    if let Some(path) = &cli.policies {
        state = state.with_policies_path(path);
    }
    spawn_reconciler(
        state.engine.clone(),
        Duration::from_secs(cli.reconcile_interval_secs.max(1)),
    );

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;
    tracing::info!(bind = %cli.bind, "compliance API listening");

    axum::serve(listener, app)
        .await
        .inspect_err(|e| tracing::error!("serving error: {:?}", e))?;

    tracing::info!("compliance API shutting down");
    Ok(())
}
