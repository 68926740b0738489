use std::sync::Arc;

use clap::Parser;
use monoexec::{
    cli::MonoexecArgs,
    engine::{DockerEngine, Engine, OrchestrationPool},
    orchestration::Orchestrator,
    server::ExecutorServer,
    storage::{LocalStorage, Storage},
    ExecutorResult,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExecutorResult<()> {
    // Loaded first so `.env` can set RUST_LOG and the argument fallbacks.
    let dotenv = dotenvy::dotenv();

    fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!("loaded environment from {}", path.display());
    }

    let args = MonoexecArgs::parse();
    let docker = DockerEngine::new(&args.docker);
    let config = args.into_config();
    config.validate()?;

    let pool = OrchestrationPool::from_fn(*config.get_pool_size(), || {
        Box::new(docker.clone()) as Box<dyn Engine>
    });
    let source: Arc<dyn Storage> = Arc::new(LocalStorage::new(config.get_source_root()));
    let destination: Arc<dyn Storage> =
        Arc::new(LocalStorage::new(config.get_destination_root()));

    let orchestrator = Orchestrator::new(config, pool, source, destination)?;

    orchestrator.warmup().await;
    orchestrator.sweep_orphans().await;

    let shutdown = CancellationToken::new();
    let maintenance = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.clone();
        async move { orchestrator.run_maintenance(shutdown).await }
    });

    let server = ExecutorServer::new(orchestrator.clone());
    server.serve(wait_for_signal(shutdown.clone())).await?;

    shutdown.cancel();
    maintenance.await?;

    let drained = orchestrator.drain().await;
    tracing::info!("removed {drained} runtimes, exiting");

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: *
//--------------------------------------------------------------------------------------------------

/// Resolves on SIGINT, SIGTERM or SIGQUIT, or once `shutdown` is cancelled.
async fn wait_for_signal(shutdown: CancellationToken) {
    let (mut interrupt, mut terminate, mut quit) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(interrupt), Ok(terminate), Ok(quit)) => (interrupt, terminate, quit),
        _ => {
            tracing::error!("failed to install signal handlers, stopping");
            return;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => tracing::info!("received SIGINT, shutting down"),
        _ = terminate.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = quit.recv() => tracing::info!("received SIGQUIT, shutting down"),
        _ = shutdown.cancelled() => {}
    }
}
