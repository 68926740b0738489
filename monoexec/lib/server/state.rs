//! Server state management.

use crate::orchestration::Orchestrator;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// Shared server state handed to every request handler.
#[derive(Debug, Clone)]
pub struct ServerState {
    /// The shared orchestrator instance
    orchestrator: Orchestrator,
}

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl ServerState {
    /// Creates a new ServerState instance
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Gets a reference to the orchestrator
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// The shared secret callers must present.
    pub fn secret(&self) -> &str {
        self.orchestrator.config().get_secret()
    }
}
