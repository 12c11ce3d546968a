use catalogdb_core::activity::ActivityLog;
use catalogdb_core::config;
use catalogdb_core::storage::{load_or_default, save_catalog, snapshot_path, Catalog};
use catalogdb_server::api::create_router;
use catalogdb_server::api::handlers::AppState;
use catalogdb_server::api::metrics;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catalogdb", about = "Content catalog analytics server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "CATALOGDB_PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Data directory for snapshots
    #[arg(short, long, env = "CATALOGDB_DATA_DIR", default_value = config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Snapshot interval in seconds (0 = disabled)
    #[arg(long, env = "CATALOGDB_SNAPSHOT_INTERVAL", default_value_t = config::DEFAULT_SNAPSHOT_INTERVAL_SECS)]
    snapshot_interval: u64,

    /// Graceful shutdown timeout in seconds
    #[arg(long, env = "CATALOGDB_SHUTDOWN_TIMEOUT", default_value_t = config::DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    shutdown_timeout: u64,

    /// Number of activity log entries kept in memory
    #[arg(long, env = "CATALOGDB_ACTIVITY_CAPACITY", default_value_t = config::DEFAULT_ACTIVITY_CAPACITY)]
    activity_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("catalogdb_server=info".parse()?)
                .add_directive("catalogdb_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }
    if args.data_dir.exists() && !args.data_dir.is_dir() {
        eprintln!(
            "Error: data_dir '{}' exists but is not a directory",
            args.data_dir.display()
        );
        std::process::exit(1);
    }

    // A corrupt snapshot aborts startup rather than silently starting empty.
    let catalog = load_or_default(&args.data_dir)?;
    let activity = ActivityLog::new(args.activity_capacity);

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let state = AppState {
        catalog: catalog.clone(),
        activity: activity.clone(),
        data_dir: args.data_dir.clone(),
        prometheus_handle,
        start_time: Instant::now(),
    };
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", args.port);
    let counts = catalog.counts();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        data_dir = %args.data_dir.display(),
        snapshot_interval_secs = args.snapshot_interval,
        activity_capacity = args.activity_capacity,
        records = counts.total,
        active_records = counts.active,
        "catalogdb ready"
    );

    // Spawn catalog metrics background task
    let metrics_catalog = catalog.clone();
    let metrics_activity = activity.clone();
    let metrics_snapshot = snapshot_path(&args.data_dir);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15));
        loop {
            interval.tick().await;
            metrics::update_catalog_metrics(&metrics_catalog, &metrics_activity);
            metrics::update_snapshot_metrics(&metrics_snapshot);
        }
    });

    // Spawn auto-snapshot background task
    if args.snapshot_interval > 0 {
        let snap_catalog = catalog.clone();
        let snap_data_dir = args.data_dir.clone();
        let snap_interval = args.snapshot_interval;
        tracing::info!("Auto-snapshots enabled every {}s", snap_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(snap_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                tracing::info!("Running periodic snapshot...");
                let catalog = snap_catalog.clone();
                let dir = snap_data_dir.clone();
                match tokio::task::spawn_blocking(move || save_catalog(&catalog, &dir)).await {
                    Ok(Ok(_)) => tracing::info!("Periodic snapshot complete"),
                    Ok(Err(e)) => tracing::error!("Periodic snapshot failed: {}", e),
                    Err(e) => tracing::error!("Periodic snapshot task panicked: {}", e),
                }
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    flush_and_shutdown(&catalog, &args.data_dir, args.shutdown_timeout).await;

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
}

async fn flush_and_shutdown(catalog: &Catalog, data_dir: &Path, timeout_secs: u64) {
    tracing::info!("All requests drained, flushing catalog...");

    let catalog = catalog.clone();
    let dir = data_dir.to_path_buf();
    let save = tokio::task::spawn_blocking(move || save_catalog(&catalog, &dir));
    match tokio::time::timeout(Duration::from_secs(timeout_secs), save).await {
        Ok(Ok(Ok(bytes))) => tracing::info!(bytes, "Saved catalog on shutdown"),
        Ok(Ok(Err(e))) => tracing::error!("Failed to save catalog on shutdown: {}", e),
        Ok(Err(e)) => tracing::error!("Shutdown snapshot task panicked: {}", e),
        Err(_) => tracing::error!(
            "Shutdown flush timeout ({}s) exceeded, snapshot abandoned",
            timeout_secs
        ),
    }
}
