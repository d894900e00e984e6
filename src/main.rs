// ABOUTME: Entry point for the berth gateway daemon.
// ABOUTME: Wires components, spawns the idle sweeper, and serves HTTP.

mod cli;

use berth::config::{BACKEND_CONTAINER_PORT, Config};
use berth::error::Result;
use berth::gateway::{self, AppState};
use berth::lifecycle::{LifecycleController, ProvisionSettings};
use berth::oracle::OutlineOracle;
use berth::ports::PortAllocator;
use berth::registry::Registry;
use berth::runtime::{BollardRuntime, ContainerRuntime, resolve_runtime};
use berth::sweeper::IdleSweeper;
use clap::Parser;
use cli::Cli;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?,
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let runtime_info = resolve_runtime(config.runtime.as_ref())?;
    info!(
        runtime = %runtime_info.runtime_type,
        socket = %runtime_info.socket_path,
        "connecting to container runtime"
    );

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(BollardRuntime::connect(&runtime_info)?);

    // A dead daemon at boot is not fatal: every request path degrades to
    // 503 until it comes back.
    if let Err(e) = runtime.ping().await {
        warn!(error = %e, "container runtime did not answer ping");
    }

    let registry = Arc::new(Registry::new());
    let allocator = Arc::new(PortAllocator::new(
        Arc::clone(&runtime),
        config.port_window.low,
        config.port_window.high,
        BACKEND_CONTAINER_PORT,
    ));
    let oracle = Arc::new(OutlineOracle::new(&config.outline_url));
    let controller = LifecycleController::new(
        Arc::clone(&runtime),
        Arc::clone(&registry),
        Arc::clone(&allocator),
        ProvisionSettings {
            image: config.image.clone(),
            memory_bytes: config.resources.memory_bytes()?,
            cpus: config.resources.cpus,
            outline_url: config.outline_url.clone(),
        },
    );

    let sweeper = IdleSweeper::new(
        controller.clone(),
        config.sweep_interval,
        config.idle_timeout,
    );
    tokio::spawn(sweeper.run());

    let state = AppState::new(
        controller,
        registry,
        runtime,
        oracle,
        config.request_timeout,
    );
    let app = gateway::router(state);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!(listen = %config.listen, image = %config.image, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
