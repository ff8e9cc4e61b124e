use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use api_server::config::Config;
use api_server::server::{self, AppState};
use clap::Parser;
use share_queue::snapshot::{spawn_snapshotter, SnapshotFile};
use share_queue::{
    ClientIdentities, HttpShareClient, HttpTokenResolver, InMemoryLedger, PatternExtractor,
    ShareExecutor, ShareManager, TaskLedger,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Share relay HTTP server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "share-relay.toml")]
    config: String,

    /// Host to bind to (overrides config file)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bearer token for state-changing routes (overrides config file)
    #[arg(long, env = "SHARE_RELAY_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config))?;
    if let Some(host) = cli.host {
        config.server.host = host.to_string();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.api_token.is_some() {
        config.server.api_token = cli.api_token;
    }

    let ledger: Arc<dyn TaskLedger> = Arc::new(InMemoryLedger::new(config.ledger.capacity));

    let snapshot = config.ledger.snapshot_path.clone().map(SnapshotFile::new);
    if let Some(file) = &snapshot {
        file.restore_into(ledger.as_ref())
            .await
            .with_context(|| format!("restoring snapshot {}", file.path().display()))?;
    }

    let extractor = PatternExtractor::new(&config.resolver.patterns, config.resolver.min_token_len)
        .context("compiling token patterns")?;
    let resolver = HttpTokenResolver::new(config.resolver.clone(), Arc::new(extractor))
        .context("building resolver HTTP client")?;
    let client =
        HttpShareClient::new(&config.share.client).context("building share HTTP client")?;
    let executor = ShareExecutor::new(
        Arc::new(client),
        ledger.clone(),
        config.share.executor.clone(),
    );
    let manager = ShareManager::new(
        ledger.clone(),
        Arc::new(resolver),
        Arc::new(executor),
        ClientIdentities::new(config.client_identities.clone()),
    );

    let snapshot_stop = CancellationToken::new();
    let snapshotter = snapshot.map(|file| {
        spawn_snapshotter(
            file,
            ledger.clone(),
            Duration::from_secs(config.ledger.snapshot_interval_secs.max(1)),
            snapshot_stop.clone(),
        )
    });

    let state = AppState::new(manager.clone(), &config);
    let app = server::build_app(state, config.server.request_timeout_secs);

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid listen host {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Share relay listening on http://{addr}");
    if config.server.api_token.is_none() {
        info!("No API token configured, write routes accept loopback clients only");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    info!("Stopping share pipelines");
    manager.shutdown().await;

    snapshot_stop.cancel();
    if let Some(handle) = snapshotter {
        handle.await.context("snapshot task panicked")?;
    }

    info!("Share relay stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
