//! Application state for the API server

use std::sync::Arc;

use crate::chain::ChainEngine;
use crate::config::ServiceConfig;
use crate::storage::ProofStorage;
use crate::validator::ValidatorRegistry;

/// API server state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Chain engine (owns storage and the validator registry).
    pub engine: ChainEngine,
    /// Service configuration.
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// Wire up state from its collaborators.
    pub fn new(
        storage: Arc<dyn ProofStorage>,
        registry: ValidatorRegistry,
        config: ServiceConfig,
    ) -> Self {
        Self {
            engine: ChainEngine::new(storage, Arc::new(registry)),
            config: Arc::new(config),
        }
    }
}
