// SPDX-License-Identifier: MIT OR Apache-2.0
//! Vault service: per-kind secret operations and binary streaming.
//!
//! Every handler expects the [`Caller`](crate::auth::Caller) attached by the
//! access gate, for unary and streaming calls alike.

use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use keeper_core::{SecretId, VaultError, VaultService};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status, Streaming};

use crate::auth::caller;
use crate::convert::{
    card_from_proto, card_to_proto, login_pass_from_proto, login_pass_to_proto,
    summaries_to_proto, text_from_proto, text_to_proto, upload_to_proto,
};
use crate::error::vault_status;
use crate::proto::{
    vault_server::Vault, AddBinaryResponse, AddCardRequest, AddLoginPassRequest,
    AddSecretResponse, AddTextRequest, BinaryChunk, CardRecord, GetSecretRequest,
    ListSecretsRequest, ListSecretsResponse, LoginPassRecord, SetBinaryTitleRequest,
    SetBinaryTitleResponse, TextRecord,
};
use crate::service::health::HealthState;
use crate::shutdown::{ShutdownManager, StreamGuard};

/// Default channel capacity for download streams.
const DEFAULT_STREAM_CHANNEL_CAPACITY: usize = 32;

/// Consecutive storage failures before the vault reports unhealthy.
const FAILURE_THRESHOLD: u32 = 5;

/// Implementation of the Vault gRPC service.
#[derive(Clone)]
pub struct VaultServiceImpl {
    vault: Arc<VaultService>,
    shutdown: Option<Arc<ShutdownManager>>,
    health_state: Option<Arc<HealthState>>,
    consecutive_failures: Arc<AtomicU32>,
    stream_channel_capacity: usize,
}

impl VaultServiceImpl {
    /// Create a vault service without drain tracking.
    #[must_use]
    pub fn new(vault: Arc<VaultService>) -> Self {
        Self {
            vault,
            shutdown: None,
            health_state: None,
            consecutive_failures: Arc::new(AtomicU32::new(0)),
            stream_channel_capacity: DEFAULT_STREAM_CHANNEL_CAPACITY,
        }
    }

    /// Report storage failures through the shared health state.
    #[must_use]
    pub fn with_health(mut self, state: Arc<HealthState>) -> Self {
        self.health_state = Some(state);
        self
    }

    /// Track binary streams with a shutdown manager.
    #[must_use]
    pub fn with_shutdown(mut self, manager: Arc<ShutdownManager>) -> Self {
        self.shutdown = Some(manager);
        self
    }

    /// Set the download channel capacity.
    #[must_use]
    pub fn with_stream_channel_capacity(mut self, capacity: usize) -> Self {
        self.stream_channel_capacity = capacity.max(1);
        self
    }

    fn record_success(&self) {
        if self.consecutive_failures.swap(0, Ordering::SeqCst) > 0 {
            if let Some(ref health) = self.health_state {
                health.set_vault_healthy(true);
            }
        }
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= FAILURE_THRESHOLD {
            if let Some(ref health) = self.health_state {
                health.set_vault_healthy(false);
                tracing::warn!(failures, "vault marked unhealthy after consecutive storage failures");
            }
        }
    }

    /// Map a vault result to a status, tracking storage health on the way.
    fn observe<T>(&self, result: Result<T, VaultError>) -> Result<T, Status> {
        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            },
            Err(e) => {
                if matches!(e, VaultError::Storage(_)) {
                    self.record_failure();
                }
                Err(status(e))
            },
        }
    }

    /// Admit a binary transfer, unless the server is draining.
    fn admit(&self) -> Result<Option<StreamGuard>, Status> {
        match &self.shutdown {
            None => Ok(None),
            Some(manager) => manager
                .admit()
                .map(Some)
                .ok_or_else(|| Status::unavailable("server is shutting down")),
        }
    }
}

fn login_of<T>(request: &Request<T>) -> Result<String, Status> {
    Ok(caller(request)?.login.clone())
}

fn status(err: VaultError) -> Status {
    vault_status(&err)
}

type BinaryStream = Pin<Box<dyn tokio_stream::Stream<Item = Result<BinaryChunk, Status>> + Send>>;

#[tonic::async_trait]
impl Vault for VaultServiceImpl {
    async fn add_login_pass(
        &self,
        request: Request<AddLoginPassRequest>,
    ) -> Result<Response<AddSecretResponse>, Status> {
        let login = login_of(&request)?;
        let record = login_pass_from_proto(request.into_inner());
        let id = self.observe(self.vault.add_login_pass(&login, record).await)?;
        Ok(Response::new(AddSecretResponse { id }))
    }

    async fn list_login_pass(
        &self,
        request: Request<ListSecretsRequest>,
    ) -> Result<Response<ListSecretsResponse>, Status> {
        let login = login_of(&request)?;
        let list = self.observe(self.vault.list_login_pass(&login).await)?;
        Ok(Response::new(summaries_to_proto(list)))
    }

    async fn get_login_pass(
        &self,
        request: Request<GetSecretRequest>,
    ) -> Result<Response<LoginPassRecord>, Status> {
        let login = login_of(&request)?;
        let id = request.into_inner().id;
        let entry = self.observe(self.vault.get_login_pass(&login, id).await)?;
        Ok(Response::new(login_pass_to_proto(entry)))
    }

    async fn add_text(
        &self,
        request: Request<AddTextRequest>,
    ) -> Result<Response<AddSecretResponse>, Status> {
        let login = login_of(&request)?;
        let record = text_from_proto(request.into_inner());
        let id = self.observe(self.vault.add_text(&login, record).await)?;
        Ok(Response::new(AddSecretResponse { id }))
    }

    async fn list_text(
        &self,
        request: Request<ListSecretsRequest>,
    ) -> Result<Response<ListSecretsResponse>, Status> {
        let login = login_of(&request)?;
        let list = self.observe(self.vault.list_text(&login).await)?;
        Ok(Response::new(summaries_to_proto(list)))
    }

    async fn get_text(
        &self,
        request: Request<GetSecretRequest>,
    ) -> Result<Response<TextRecord>, Status> {
        let login = login_of(&request)?;
        let id = request.into_inner().id;
        let entry = self.observe(self.vault.get_text(&login, id).await)?;
        Ok(Response::new(text_to_proto(entry)))
    }

    async fn add_card(
        &self,
        request: Request<AddCardRequest>,
    ) -> Result<Response<AddSecretResponse>, Status> {
        let login = login_of(&request)?;
        let record = card_from_proto(request.into_inner());
        let id = self.observe(self.vault.add_card(&login, record).await)?;
        Ok(Response::new(AddSecretResponse { id }))
    }

    async fn list_card(
        &self,
        request: Request<ListSecretsRequest>,
    ) -> Result<Response<ListSecretsResponse>, Status> {
        let login = login_of(&request)?;
        let list = self.observe(self.vault.list_card(&login).await)?;
        Ok(Response::new(summaries_to_proto(list)))
    }

    async fn get_card(
        &self,
        request: Request<GetSecretRequest>,
    ) -> Result<Response<CardRecord>, Status> {
        let login = login_of(&request)?;
        let id = request.into_inner().id;
        let entry = self.observe(self.vault.get_card(&login, id).await)?;
        Ok(Response::new(card_to_proto(entry)))
    }

    async fn add_binary(
        &self,
        request: Request<Streaming<BinaryChunk>>,
    ) -> Result<Response<AddBinaryResponse>, Status> {
        let login = login_of(&request)?;
        let _guard = self.admit()?;

        let input = request.into_inner().map(|message| {
            message
                .map(|chunk| chunk.data)
                .map_err(|s| VaultError::StreamCancelled(s.message().to_string()))
        });

        let summary = self.observe(self.vault.add_binary(&login, input).await)?;
        Ok(Response::new(upload_to_proto(&summary)))
    }

    async fn set_binary_title(
        &self,
        request: Request<SetBinaryTitleRequest>,
    ) -> Result<Response<SetBinaryTitleResponse>, Status> {
        let login = login_of(&request)?;
        let req = request.into_inner();
        self.observe(self.vault.set_binary_title(&login, req.id, &req.title).await)?;
        Ok(Response::new(SetBinaryTitleResponse {}))
    }

    async fn list_binary(
        &self,
        request: Request<ListSecretsRequest>,
    ) -> Result<Response<ListSecretsResponse>, Status> {
        let login = login_of(&request)?;
        let list = self.observe(self.vault.list_binary(&login).await)?;
        Ok(Response::new(summaries_to_proto(list)))
    }

    type GetBinaryStream = BinaryStream;

    async fn get_binary(
        &self,
        request: Request<GetSecretRequest>,
    ) -> Result<Response<Self::GetBinaryStream>, Status> {
        let login = login_of(&request)?;
        let id: SecretId = request.into_inner().id;
        let guard = self.admit()?;

        let (record, mut chunks) = self.observe(self.vault.get_binary(&login, id).await)?;
        tracing::debug!(binary_id = record.id, chunks = ?record.chunk_count, "download started");

        let (tx, rx) = mpsc::channel(self.stream_channel_capacity);
        tokio::spawn(async move {
            let _guard = guard;
            while let Some(item) = chunks.next().await {
                let failed = item.is_err();
                let message = item.map(|data| BinaryChunk { data }).map_err(status);
                if tx.send(message).await.is_err() {
                    tracing::debug!(binary_id = id, "download receiver dropped");
                    return;
                }
                if failed {
                    return;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}
