//! PingOps Binary Entry Point
//!
//! Monitors the configured targets, refreshes a status table in the
//! terminal, optionally serves the HTTP API, and exports on shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pingops::{
    config::{AppConfig, parse_duration},
    export_snapshot,
    input::{ParsedInput, pair_targets},
    monitor::{MonitorRegistry, render_table},
    probe::{ProbeMethod, build_prober},
    server::{AppState, create_router, serve},
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PingOps - multi-target ping monitor
#[derive(Parser, Debug)]
#[command(name = "pingops", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (optional; defaults are used when absent)
    #[arg(short, long, default_value = "pingops.yaml", env = "PINGOPS_CONFIG")]
    config: PathBuf,

    /// File with one address per line
    #[arg(long)]
    addresses: Option<PathBuf>,

    /// File with one name per line, matching the address order
    #[arg(long)]
    names: Option<PathBuf>,

    /// Addresses to monitor (appended after file and config targets)
    #[arg(value_name = "ADDRESS")]
    targets: Vec<String>,

    /// Probe interval, e.g. `1s`, `2s` (overrides config file)
    #[arg(long, value_parser = parse_duration, env = "PINGOPS_INTERVAL")]
    interval: Option<Duration>,

    /// Probe method (overrides config file)
    #[arg(long, env = "PINGOPS_METHOD")]
    method: Option<ProbeMethod>,

    /// Export results to this path on exit (`.xlsx` or `.csv`)
    #[arg(short, long, env = "PINGOPS_EXPORT")]
    export: Option<String>,

    /// Serve the HTTP API
    #[arg(long)]
    serve: bool,

    /// API bind address (overrides config file)
    #[arg(long, env = "PINGOPS_SERVER_BIND")]
    bind: Option<String>,

    /// API port (overrides config file)
    #[arg(long, env = "PINGOPS_SERVER_PORT")]
    port: Option<u16>,

    /// Do not print the status table
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pingops=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = AppConfig::load_or_default(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(interval) = cli.interval {
        config.monitor.interval = interval;
    }
    if let Some(method) = cli.method {
        config.probe.method = method;
    }
    if let Some(path) = cli.export.clone() {
        config.export.path = Some(path);
    }
    if cli.serve {
        config.server.enabled = true;
    }
    if let Some(bind) = cli.bind.clone() {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.quiet {
        config.display.enabled = false;
    }
    config.validate()?;

    let input = collect_targets(&cli, &config)?;
    for rejected in &input.rejected {
        tracing::warn!(
            line = rejected.line,
            value = %rejected.value,
            reason = %rejected.reason,
            "Skipping address"
        );
    }

    let prober = build_prober(config.probe.method, config.probe.timeout);
    let registry = Arc::new(MonitorRegistry::new(config.monitor.settings(), prober).await?);

    registry.replace(input.targets).await;
    let started = registry.start_all().await?;
    tracing::info!("Monitoring {} targets", started);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = if config.server.enabled {
        let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = create_router(AppState {
            registry: Arc::clone(&registry),
            default_export_path: PathBuf::from(&config.export.default_path),
            allowed_origins: config.server.allowed_origins.clone(),
        });
        tracing::info!("API listening on: http://{}", addr);
        let mut shutdown_rx = shutdown_rx.clone();
        Some(tokio::spawn(serve(listener, app, async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })))
    } else {
        None
    };

    tracing::info!("Press Ctrl+C to stop");
    let display = config.display.enabled.then(|| {
        let registry = Arc::clone(&registry);
        let refresh = config.display.refresh;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh);
            loop {
                ticker.tick().await;
                let rows = registry.snapshot().await;
                println!("\n{}", render_table(&rows));
            }
        })
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    // No request may restart a target once stopping begins.
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => tracing::info!("API server stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "API server failed"),
            Err(e) => tracing::error!(error = %e, "API server task failed"),
        }
    }
    if let Some(display) = display {
        display.abort();
        let _ = display.await;
    }

    tracing::info!("Stopping all targets...");
    if let Err(e) = registry.stop_all().await {
        tracing::error!(error = %e, "Failed to stop all targets");
    }

    if let Some(path) = &config.export.path {
        let rows = registry.snapshot().await;
        match export_snapshot(&rows, path) {
            Ok(written) => tracing::info!("Saved: {}", written.display()),
            Err(e) => tracing::error!(error = %e, "Export failed"),
        }
    }

    match Arc::try_unwrap(registry) {
        Ok(registry) => registry.shutdown().await?,
        Err(_) => tracing::warn!("Registry still referenced, skipping scheduler shutdown"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Gather targets from the config file, the address/name files and the
/// positional arguments, in that order.
fn collect_targets(cli: &Cli, config: &AppConfig) -> Result<ParsedInput, std::io::Error> {
    let mut parsed = ParsedInput {
        targets: config.targets(),
        rejected: Vec::new(),
    };

    if let Some(path) = &cli.addresses {
        let addresses = std::fs::read_to_string(path)?;
        let names = match &cli.names {
            Some(names) => std::fs::read_to_string(names)?,
            None => String::new(),
        };
        let from_files = pingops::parse_text_lists(&addresses, &names);
        parsed.targets.extend(from_files.targets);
        parsed.rejected.extend(from_files.rejected);
    }

    let from_args = pair_targets(&cli.targets, &[] as &[&str]);
    parsed.targets.extend(from_args.targets);
    parsed.rejected.extend(from_args.rejected);

    Ok(parsed)
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
