use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;
use clap::{Parser, ValueEnum};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camrec::auth::{PermissionTable, RateLimiter, SessionStore, TokenCodec};
use camrec::config::{self, AppConfig, ConfigView};
use camrec::device::{DeviceMonitor, MonitorSettings, V4l2CtlExecutor};
use camrec::events::FanoutSettings;
use camrec::media::{HealthMonitor, HealthMonitorSettings, MediaClient, MediaClientConfig};
use camrec::paths::PathController;
use camrec::recording::RecordingCoordinator;
use camrec::rpc::ws_handler;
use camrec::snapshot::{SnapshotCoordinator, SnapshotSettings};
use camrec::state::AppState;
use camrec::storage::StorageGuard;
use camrec::video::format::Resolution;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// camera-recorder command line arguments
#[derive(Parser, Debug)]
#[command(name = "camera-recorder")]
#[command(version, about = "Control plane for local cameras in front of a MediaMTX media server", long_about = None)]
struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bind address (overrides config file)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// Bind port (overrides config file)
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    let mut config = config::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config.server.host = address;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let state = build_state(config).await?;

    let app = Router::new()
        .route(&state.config.get().server.websocket_path, any(ws_handler))
        .route("/health", get(health_check))
        .nest_service("/files/recordings", ServeDir::new(&state.recordings_dir))
        .nest_service("/files/snapshots", ServeDir::new(&state.snapshots_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = format!("{}:{}", state.config.get().server.host, state.config.get().server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
        tracing::info!("shutdown signal received");
    };

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("server error: {}", e);
            }
        }
        _ = shutdown_signal => {}
    }

    cleanup(&state).await;
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

#[allow(clippy::too_many_lines)]
async fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let recordings_dir = PathBuf::from(&config.mediamtx.recordings_path);
    let snapshots_dir = PathBuf::from(&config.mediamtx.snapshots_path);
    tokio::fs::create_dir_all(&recordings_dir).await?;
    tokio::fs::create_dir_all(&snapshots_dir).await?;

    let config_view = ConfigView::new(config.clone());

    let device_monitor = Arc::new(DeviceMonitor::new(
        Arc::new(|path: &std::path::Path| path.exists()),
        Arc::new(V4l2CtlExecutor),
    ));
    device_monitor
        .start(MonitorSettings {
            poll_interval: std::time::Duration::from_secs(config.camera.poll_interval_secs),
            device_range: config.camera.device_range.clone(),
            disconnect_after_misses: config.camera.disconnect_after_misses,
        })
        .await?;

    let media_client = Arc::new(MediaClient::new(MediaClientConfig {
        base_url: format!("http://{}:{}", config.mediamtx.host, config.mediamtx.api_port),
        request_timeout: std::time::Duration::from_secs(config.mediamtx.request_timeout_secs),
        max_retries: config.mediamtx.max_retries,
        backoff_base: std::time::Duration::from_millis(200),
        jitter_range: config.mediamtx.backoff_jitter_range,
    })?);

    let health_monitor = HealthMonitor::new(HealthMonitorSettings {
        check_interval: std::time::Duration::from_secs(config.mediamtx.health_check_interval_secs),
        failure_threshold: config.mediamtx.health_failure_threshold,
        recovery_confirmation_threshold: config.mediamtx.health_recovery_confirmation_threshold,
        circuit_breaker_timeout: std::time::Duration::from_secs(config.mediamtx.health_circuit_breaker_timeout_secs),
        max_backoff_interval: std::time::Duration::from_secs(config.mediamtx.health_max_backoff_interval_secs),
        backoff_base_multiplier: config.mediamtx.backoff_base_multiplier,
        request_timeout: std::time::Duration::from_secs(config.mediamtx.request_timeout_secs),
    });
    health_monitor.start(Arc::clone(&media_client)).await?;

    let path_controller = Arc::new(PathController::new(Arc::clone(&media_client)));

    let storage_guard = Arc::new(StorageGuard::new(config.storage.clone()));

    let recording = Arc::new(RecordingCoordinator::new(
        Arc::clone(&device_monitor),
        Arc::clone(&path_controller),
        Arc::clone(&storage_guard),
    ));

    let snapshot = Arc::new(SnapshotCoordinator::new(
        Arc::clone(&media_client),
        Arc::clone(&path_controller),
        Arc::clone(&storage_guard),
        SnapshotSettings {
            output_dir: snapshots_dir.clone(),
            capture_resolution: Resolution::new(1920, 1080),
            tier1_timeout: std::time::Duration::from_millis(config.snapshots.tier1_timeout_ms),
            tier2_timeout: std::time::Duration::from_millis(config.snapshots.tier2_timeout_ms),
            tier3_activation_timeout: std::time::Duration::from_millis(config.snapshots.tier3_activation_timeout_ms),
            tier3_timeout: std::time::Duration::from_millis(config.snapshots.tier3_timeout_ms),
            total_timeout: std::time::Duration::from_millis(config.snapshots.total_timeout_ms),
            max_age: std::time::Duration::from_secs(config.snapshots.max_age_secs),
            max_count: config.snapshots.max_count,
        },
    ));

    let sessions = SessionStore::new(std::time::Duration::from_secs(config.security.session_timeout_secs as u64));
    sessions
        .start_cleanup(std::time::Duration::from_secs(config.security.session_cleanup_interval_secs as u64))
        .await?;

    let permissions = Arc::new(PermissionTable::new());
    let rate_limiter = Arc::new(RateLimiter::new(
        std::time::Duration::from_secs(config.security.rate_limit_window_secs as u64),
        config.security.rate_limit_requests,
    ));
    let token_codec = Arc::new(TokenCodec::new(config.security.jwt_secret_key.clone()));

    let events = camrec::events::EventFanout::new(FanoutSettings::default());
    events.start_cleanup().await?;

    Ok(AppState::new(
        config_view,
        device_monitor,
        media_client,
        health_monitor,
        path_controller,
        recording,
        snapshot,
        storage_guard,
        sessions,
        permissions,
        rate_limiter,
        token_codec,
        events,
        recordings_dir,
        snapshots_dir,
    ))
}

/// Stop every background task in reverse dependency order.
async fn cleanup(state: &Arc<AppState>) {
    state.device_monitor.stop().await;
    tracing::info!("device monitor stopped");

    state.health_monitor.stop().await;
    tracing::info!("health monitor stopped");

    state.sessions.stop_cleanup().await;
    tracing::info!("session cleanup stopped");

    state.events.stop_cleanup().await;
    tracing::info!("event fanout cleanup stopped");
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "camrec=error,tower_http=error",
        LogLevel::Warn => "camrec=warn,tower_http=warn",
        LogLevel::Info => "camrec=info,tower_http=info",
        LogLevel::Verbose => "camrec=debug,tower_http=info",
        LogLevel::Debug => "camrec=debug,tower_http=debug",
        LogLevel::Trace => "camrec=trace,tower_http=debug",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {err}");
    }
}
