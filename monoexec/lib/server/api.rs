use std::future::{Future, IntoFuture};

use axum::Router;
use tokio::{net::TcpListener, time};
use tokio_util::sync::CancellationToken;

use crate::{orchestration::Orchestrator, ExecutorResult};

use super::{routes, state::ServerState};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The HTTP control API of an executor.
#[derive(Debug, Clone)]
pub struct ExecutorServer {
    /// The shared state of every handler.
    state: ServerState,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExecutorServer {
    /// Creates a new server instance
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            state: ServerState::new(orchestrator),
        }
    }

    /// The router serving every endpoint.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    /// Binds the configured listen address and serves until `shutdown` resolves.
    pub async fn serve(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ExecutorResult<()> {
        let addr = *self.state.orchestrator().config().get_listen_addr();
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound `listener` until `shutdown` resolves.
    ///
    /// In-flight requests get the configured grace period to finish. Whatever is still running
    /// after that is abandoned so the caller can go on to tear runtimes down.
    pub async fn serve_on(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ExecutorResult<()> {
        tracing::info!("server listening on {}", listener.local_addr()?);

        let grace = self.state.orchestrator().config().shutdown_grace();
        let stopping = CancellationToken::new();
        let signal = {
            let stopping = stopping.clone();
            async move {
                shutdown.await;
                stopping.cancel();
            }
        };

        let serving = axum::serve(listener, self.router().into_make_service())
            .with_graceful_shutdown(signal)
            .into_future();

        tokio::select! {
            result = serving => result?,
            _ = async {
                stopping.cancelled().await;
                time::sleep(grace).await;
            } => {
                tracing::warn!(
                    "requests still in flight {}s after shutdown, stopping anyway",
                    grace.as_secs()
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }
}
