//! Health check service implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::proto::{health_server::Health, HealthCheckRequest, HealthCheckResponse, ServingStatus};

/// Fully qualified name of the account service.
pub const ACCOUNT_SERVICE: &str = "keeper.v1.Account";
/// Fully qualified name of the vault service.
pub const VAULT_SERVICE: &str = "keeper.v1.Vault";

/// Service health state shared across threads.
#[derive(Debug)]
pub struct HealthState {
    vault_healthy: AtomicBool,
    draining: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            vault_healthy: AtomicBool::new(true),
            draining: AtomicBool::new(false),
        }
    }
}

impl HealthState {
    /// Create a new health state reporting healthy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the vault backend healthy or not.
    pub fn set_vault_healthy(&self, healthy: bool) {
        self.vault_healthy.store(healthy, Ordering::SeqCst);
    }

    /// Whether the vault backend is healthy.
    #[must_use]
    pub fn is_vault_healthy(&self) -> bool {
        self.vault_healthy.load(Ordering::SeqCst)
    }

    /// Mark the server as draining for shutdown.
    pub fn set_draining(&self, draining: bool) {
        self.draining.store(draining, Ordering::SeqCst);
    }

    /// Whether the server is draining.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    fn serving(&self) -> bool {
        self.is_vault_healthy() && !self.is_draining()
    }
}

/// Implementation of the Health gRPC service.
#[derive(Debug, Clone)]
pub struct HealthServiceImpl {
    state: Arc<HealthState>,
}

impl Default for HealthServiceImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthServiceImpl {
    /// Create a new health service.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(Arc::new(HealthState::new()))
    }

    /// Create a new health service with shared state.
    #[must_use]
    pub fn with_state(state: Arc<HealthState>) -> Self {
        Self { state }
    }

    /// Get a reference to the health state.
    #[must_use]
    pub fn state(&self) -> &Arc<HealthState> {
        &self.state
    }
}

#[tonic::async_trait]
impl Health for HealthServiceImpl {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let service = request.into_inner().service;

        let status = match service.as_deref() {
            Some("" | ACCOUNT_SERVICE | VAULT_SERVICE) | None => {
                if self.state.serving() {
                    ServingStatus::Serving
                } else {
                    ServingStatus::NotServing
                }
            },
            Some(unknown) => {
                tracing::warn!(service = unknown, "health check for unknown service");
                ServingStatus::Unspecified
            },
        };

        Ok(Response::new(HealthCheckResponse {
            status: status.into(),
        }))
    }
}
