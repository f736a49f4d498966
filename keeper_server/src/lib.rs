// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keeper gRPC Server
//!
//! Exposes the secret vault from `keeper_core` over gRPC:
//!
//! - `keeper.v1.Account`: registration and token issuance
//! - `keeper.v1.Vault`: token-protected secret storage with streaming
//!   binary upload and download
//! - `keeper.v1.Health`: serving status, flipped while draining
//! - Optional TLS and gRPC reflection
//!
//! # Example
//!
//! ```ignore
//! use keeper_server::{KeeperServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_env()?;
//!     KeeperServer::new(config).serve().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rustdoc::broken_intra_doc_links
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::result_large_err)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::future_not_send)]

pub mod auth;
pub mod config;
pub mod convert;
pub mod error;
pub mod service;
pub mod shutdown;
pub mod signals;

/// Generated protobuf types.
#[allow(missing_docs)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
pub mod proto {
    tonic::include_proto!("keeper.v1");

    /// File descriptor set for reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("keeper_descriptor");
}

use std::future::Future;
use std::sync::Arc;

use keeper_core::{Cipher, CredentialHasher, MemoryStorage, TokenAuthority, VaultService, VaultStorage};
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};

pub use auth::{AccessGate, Caller};
pub use config::{SecretValue, ServerConfig, TlsConfig};
pub use error::{vault_status, Result, ServerError, ERROR_KIND_HEADER};
pub use service::{AccountServiceImpl, HealthServiceImpl, HealthState, VaultServiceImpl};
pub use shutdown::{ShutdownConfig, ShutdownManager, StreamGuard};

use proto::account_server::AccountServer;
use proto::health_server::HealthServer;
use proto::vault_server::VaultServer;

/// The keeper gRPC server.
pub struct KeeperServer {
    config: ServerConfig,
    storage: Arc<dyn VaultStorage>,
}

impl KeeperServer {
    /// Create a server backed by in-memory storage.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_storage(config, Arc::new(MemoryStorage::new()))
    }

    /// Create a server over the given storage backend.
    #[must_use]
    pub fn with_storage(config: ServerConfig, storage: Arc<dyn VaultStorage>) -> Self {
        Self { config, storage }
    }

    /// Get the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn build_vault(&self) -> Result<VaultService> {
        let config = &self.config;
        let cipher = Cipher::new(config.crypt_key.expose())?;
        let tokens = TokenAuthority::new(config.token_secret.expose(), config.token_ttl)?;
        let pepper = config
            .password_pepper
            .as_ref()
            .map(SecretValue::expose)
            .unwrap_or_default();
        let hasher = CredentialHasher::new(pepper);

        Ok(VaultService::new(
            Arc::clone(&self.storage),
            cipher,
            tokens,
            hasher,
            config.pipeline(),
        )?)
    }

    /// Load TLS configuration from files.
    fn load_tls_config(tls: &TlsConfig) -> Result<ServerTlsConfig> {
        let cert = std::fs::read(&tls.cert_path).map_err(|e| {
            ServerError::Config(format!(
                "failed to read certificate file {}: {e}",
                tls.cert_path.display()
            ))
        })?;
        let key = std::fs::read(&tls.key_path).map_err(|e| {
            ServerError::Config(format!(
                "failed to read key file {}: {e}",
                tls.key_path.display()
            ))
        })?;

        let mut tls_config = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));

        if let Some(ref ca_path) = tls.ca_cert_path {
            let ca_cert = std::fs::read(ca_path).map_err(|e| {
                ServerError::Config(format!(
                    "failed to read CA certificate file {}: {e}",
                    ca_path.display()
                ))
            })?;
            tls_config = tls_config.client_ca_root(Certificate::from_pem(ca_cert));
        }

        Ok(tls_config)
    }

    /// Run until SIGTERM or SIGINT, then drain and stop.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(signals::wait_for_shutdown_signal())
            .await
    }

    /// Run until `shutdown` completes.
    ///
    /// With a shutdown configuration, new binary transfers are refused once
    /// `shutdown` fires and in-flight ones get up to the drain timeout to
    /// finish, followed by the grace period.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        self.config.validate()?;

        let addr = self.config.bind_addr;
        let max_message_size = self.config.max_message_size;
        let vault = Arc::new(self.build_vault()?);

        let health_state = Arc::new(HealthState::new());
        let shutdown_manager = self
            .config
            .shutdown
            .as_ref()
            .map(|cfg| Arc::new(ShutdownManager::new(cfg.clone(), Arc::clone(&health_state))));

        let gate = AccessGate::new(vault.tokens(), self.config.auth_header.clone());

        let mut vault_service = VaultServiceImpl::new(Arc::clone(&vault))
            .with_health(Arc::clone(&health_state))
            .with_stream_channel_capacity(self.config.stream_channel_capacity);
        if let Some(ref mgr) = shutdown_manager {
            vault_service = vault_service.with_shutdown(Arc::clone(mgr));
        }
        let vault_svc = InterceptedService::new(
            VaultServer::new(vault_service)
                .max_decoding_message_size(max_message_size)
                .max_encoding_message_size(max_message_size),
            gate,
        );
        let account_svc = AccountServer::new(AccountServiceImpl::new(vault))
            .max_decoding_message_size(max_message_size)
            .max_encoding_message_size(max_message_size);
        let health_svc = HealthServer::new(HealthServiceImpl::with_state(Arc::clone(&health_state)));

        let reflection_svc = if self.config.enable_reflection {
            tracing::info!("reflection service enabled");
            Some(
                tonic_reflection::server::Builder::configure()
                    .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
                    .build_v1()
                    .map_err(|e| {
                        ServerError::Config(format!("failed to build reflection service: {e}"))
                    })?,
            )
        } else {
            None
        };

        let mut builder = match self.config.tls {
            Some(ref tls) => Server::builder().tls_config(Self::load_tls_config(tls)?)?,
            None => Server::builder(),
        };
        if let Some(timeout) = self.config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let drain_future = async move {
            shutdown.await;

            if let Some(ref mgr) = shutdown_manager {
                mgr.trigger_shutdown();
                if !mgr.wait_for_drain().await {
                    tracing::warn!(
                        remaining_streams = mgr.active_count(),
                        "forcing shutdown with transfers still running"
                    );
                }
                tokio::time::sleep(mgr.config().grace_period).await;
            } else {
                health_state.set_draining(true);
            }
            tracing::info!("server stopping");
        };

        tracing::info!(
            %addr,
            tls = self.config.tls.is_some(),
            auth_header = %self.config.auth_header,
            "starting keeper gRPC server"
        );

        builder
            .add_service(account_svc)
            .add_service(vault_svc)
            .add_service(health_svc)
            .add_optional_service(reflection_svc)
            .serve_with_shutdown(addr, drain_future)
            .await?;

        Ok(())
    }
}
