// SPDX-License-Identifier: MIT OR Apache-2.0
//! Account service: registration and token issuance.

use std::sync::Arc;

use keeper_core::VaultService;
use tonic::{Request, Response, Status};

use crate::error::vault_status;
use crate::proto::{
    account_server::Account, AuthUserRequest, AuthUserResponse, RegisterUserRequest,
    RegisterUserResponse,
};

/// Implementation of the Account gRPC service.
#[derive(Clone)]
pub struct AccountServiceImpl {
    vault: Arc<VaultService>,
}

impl AccountServiceImpl {
    /// Create an account service over the vault.
    #[must_use]
    pub fn new(vault: Arc<VaultService>) -> Self {
        Self { vault }
    }
}

#[tonic::async_trait]
impl Account for AccountServiceImpl {
    async fn register_user(
        &self,
        request: Request<RegisterUserRequest>,
    ) -> Result<Response<RegisterUserResponse>, Status> {
        let req = request.into_inner();
        self.vault
            .register_user(&req.login, &req.password)
            .await
            .map_err(|e| vault_status(&e))?;
        Ok(Response::new(RegisterUserResponse {}))
    }

    async fn auth_user(
        &self,
        request: Request<AuthUserRequest>,
    ) -> Result<Response<AuthUserResponse>, Status> {
        let req = request.into_inner();
        let token = self
            .vault
            .auth_user(&req.login, &req.password)
            .await
            .map_err(|e| vault_status(&e))?;
        Ok(Response::new(AuthUserResponse { token }))
    }
}
