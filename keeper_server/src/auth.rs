// SPDX-License-Identifier: MIT OR Apache-2.0
//! Token verification for vault calls.
//!
//! [`AccessGate`] runs as a tonic interceptor in front of the vault service.
//! A verified caller is attached to the request extensions and read back by
//! the handlers with [`caller`].

use std::sync::Arc;

use keeper_core::{TokenAuthority, VaultError};
use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::error::vault_status;

/// Identity of a caller whose token checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Login carried in the token.
    pub login: String,
}

/// Interceptor that verifies the identity token on every call.
#[derive(Clone)]
pub struct AccessGate {
    tokens: Arc<TokenAuthority>,
    header: String,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    /// Create a gate reading tokens from the given metadata key.
    #[must_use]
    pub fn new(tokens: Arc<TokenAuthority>, header: impl Into<String>) -> Self {
        Self {
            tokens,
            header: header.into(),
        }
    }

    /// Metadata key the token is read from.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Verify the token on a request.
    pub fn authorize<T>(&self, request: &Request<T>) -> Result<Caller, VaultError> {
        let raw = request
            .metadata()
            .get(self.header.as_str())
            .ok_or(VaultError::MissingToken)?
            .to_str()
            .map_err(|_| VaultError::InvalidToken)?
            .trim();
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        if token.is_empty() {
            return Err(VaultError::MissingToken);
        }

        let claims = self.tokens.verify(token)?;
        if claims.login.is_empty() {
            return Err(VaultError::Unauthenticated);
        }
        Ok(Caller {
            login: claims.login,
        })
    }
}

impl Interceptor for AccessGate {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        match self.authorize(&request) {
            Ok(caller) => {
                tracing::debug!(login = %caller.login, "token accepted");
                request.extensions_mut().insert(caller);
                Ok(request)
            },
            Err(e) => {
                tracing::warn!(kind = e.kind(), "token rejected");
                Err(vault_status(&e))
            },
        }
    }
}

/// Verified caller attached by [`AccessGate`].
pub fn caller<T>(request: &Request<T>) -> Result<&Caller, Status> {
    request
        .extensions()
        .get::<Caller>()
        .ok_or_else(|| vault_status(&VaultError::MissingToken))
}
