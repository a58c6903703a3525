use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use reclaimer::{
    config::ReclaimerConfig,
    db::DbPool,
    gc::{
        AggregateCollector, BuildCollector, BuildLogReaper, CacheConfigReclaimer,
        ContainerReclaimer, Reclaimer, RunContext, VersionReaper, VolumeReclaimer, WorkerSweeper,
        run_pass, start_reclaimer_worker,
    },
    observability,
    worker_client::{HttpWorkerClient, WorkerClient},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

const DEFAULT_CONFIG_PATH: &str = "reclaimer.toml";

/// How long shutdown waits for in-flight passes before giving up.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// CLI arguments for the reclaimer
#[derive(Parser, Debug)]
#[command(version, about = "CI worker resource reclaimer", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./reclaimer.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run every reclaimer on its interval until interrupted (default)
    Serve,
    /// Run a single pass of every reclaimer and exit
    ///
    /// Exits non-zero if any reclaimer failed.
    RunOnce,
    /// Run database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::RunOnce) => run_once(args.config.as_deref()).await,
        Some(Command::Migrate) => run_migrate(args.config.as_deref()).await,
        Some(Command::Serve) | None => run_server(args.config.as_deref()).await,
    }
}

/// Load and validate the config file, exiting on failure.
fn load_config(explicit_path: Option<&str>) -> (PathBuf, ReclaimerConfig) {
    let path = PathBuf::from(explicit_path.unwrap_or(DEFAULT_CONFIG_PATH));
    match ReclaimerConfig::from_file(&path) {
        Ok(config) => (path, config),
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn init_observability(config: &ReclaimerConfig) -> observability::TracingGuard {
    let guard = match observability::init_tracing(&config.observability) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::error!(error = %e, "Failed to initialize metrics");
        std::process::exit(1);
    }

    guard
}

async fn connect(config: &ReclaimerConfig) -> Arc<DbPool> {
    match DbPool::from_config(&config.database).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    }
}

/// Every reclaimer, wired to the store and the worker client.
struct Reclaimers {
    builds: Arc<dyn Reclaimer>,
    containers: Arc<dyn Reclaimer>,
    volumes: Arc<dyn Reclaimer>,
    cache_configs: Arc<dyn Reclaimer>,
    versions: Arc<dyn Reclaimer>,
    build_logs: Arc<dyn Reclaimer>,
    workers: Arc<dyn Reclaimer>,
}

impl Reclaimers {
    fn new(config: &ReclaimerConfig, db: &DbPool, client: Arc<dyn WorkerClient>) -> Self {
        let gc = &config.gc;
        Self {
            builds: Arc::new(BuildCollector::new(db.builds())),
            containers: Arc::new(ContainerReclaimer::new(
                db.containers(),
                gc.hijack_grace_period(),
                gc.missing_grace_period(),
            )),
            volumes: Arc::new(VolumeReclaimer::new(db.volumes(), gc.missing_grace_period())),
            cache_configs: Arc::new(CacheConfigReclaimer::new(db.resource_caches())),
            versions: Arc::new(VersionReaper::new(
                db.versions(),
                gc.versions.effective_max_versions(),
                gc.dry_run,
            )),
            build_logs: Arc::new(BuildLogReaper::new(
                db.pipelines(),
                db.builds(),
                gc.build_logs.clone(),
                gc.dry_run,
            )),
            workers: Arc::new(WorkerSweeper::new(
                db.workers(),
                client,
                db.container_handles(),
                db.volume_handles(),
                gc,
                config.workers.request_timeout(),
            )),
        }
    }
}

async fn run_server(explicit_config_path: Option<&str>) {
    let (config_path, config) = load_config(explicit_config_path);
    let _tracing_guard = init_observability(&config);

    let dry_run_msg = if config.gc.dry_run { " (DRY RUN)" } else { "" };
    tracing::info!(
        config_file = %config_path.display(),
        dry_run = config.gc.dry_run,
        "Starting reclaimer{}",
        dry_run_msg
    );

    let db = connect(&config).await;
    let client = match HttpWorkerClient::from_config(&config.workers) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build worker client");
            std::process::exit(1);
        }
    };

    let reclaimers = Reclaimers::new(&config, &db, client);
    let intervals = &config.gc.intervals;
    let schedule = [
        (reclaimers.builds, intervals.builds()),
        (reclaimers.containers, intervals.containers()),
        (reclaimers.volumes, intervals.volumes()),
        (reclaimers.cache_configs, intervals.cache_configs()),
        (reclaimers.versions, intervals.versions()),
        (reclaimers.build_logs, intervals.build_logs()),
        (reclaimers.workers, config.workers.sweep_interval()),
    ];

    let cancel = CancellationToken::new();
    let task_tracker = TaskTracker::new();
    for (reclaimer, interval) in schedule {
        task_tracker.spawn(start_reclaimer_worker(reclaimer, interval, cancel.clone()));
    }

    shutdown_signal().await;

    tracing::info!("Shutdown signal received, waiting for reclaimers to finish...");
    cancel.cancel();
    task_tracker.close();

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, task_tracker.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Timeout waiting for reclaimers to stop"
        );
    } else {
        tracing::info!("All reclaimers stopped");
    }

    db.close().await;
}

/// One sweep of the workers followed by one pass of every reclaimer.
async fn run_once(explicit_config_path: Option<&str>) {
    let (_, config) = load_config(explicit_config_path);
    let _tracing_guard = init_observability(&config);

    let db = connect(&config).await;
    let client = match HttpWorkerClient::from_config(&config.workers) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build worker client");
            std::process::exit(1);
        }
    };

    let reclaimers = Reclaimers::new(&config, &db, client);
    let collector = AggregateCollector::new(
        vec![
            reclaimers.builds,
            reclaimers.cache_configs,
            reclaimers.versions,
            reclaimers.build_logs,
        ],
        vec![reclaimers.containers, reclaimers.volumes],
    );

    let ctx = RunContext::new(CancellationToken::new());
    let sweep = run_pass(reclaimers.workers.as_ref(), &ctx).await;
    let collect = run_pass(&collector, &ctx).await;
    db.close().await;

    match sweep.and(collect) {
        Ok(()) => tracing::info!(run_id = %ctx.run_id, "Reclamation pass completed"),
        Err(e) => {
            tracing::error!(run_id = %ctx.run_id, error = %e, "Reclamation pass failed");
            std::process::exit(1);
        }
    }
}

async fn run_migrate(explicit_config_path: Option<&str>) {
    let (config_path, config) = load_config(explicit_config_path);
    let _tracing_guard = init_observability(&config);

    tracing::info!(
        config_file = %config_path.display(),
        "Running database migrations"
    );

    let db = connect(&config).await;
    match db.run_migrations().await {
        Ok(()) => {
            tracing::info!("Database migrations completed successfully");
            db.close().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Database migrations failed");
            std::process::exit(1);
        }
    }
}

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
