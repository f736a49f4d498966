//! Error types for the keeper gRPC server.
//!
//! This is the only place vault error kinds become gRPC status codes.

use keeper_core::VaultError;
use thiserror::Error;
use tonic::metadata::MetadataValue;
use tonic::{Code, Status};

/// Metadata key carrying the machine-readable error kind on failed calls.
pub const ERROR_KIND_HEADER: &str = "x-error-kind";

/// Server error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the vault engine.
    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl From<ServerError> for Status {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Config(msg) => Status::invalid_argument(msg),
            ServerError::Transport(e) => Status::unavailable(e.to_string()),
            ServerError::Io(e) => {
                tracing::error!(error = %e, "I/O failure while handling request");
                Status::internal("internal error")
            },
            ServerError::Vault(e) => vault_status(&e),
        }
    }
}

fn code_for(err: &VaultError) -> Code {
    match err {
        VaultError::AlreadyExists => Code::AlreadyExists,
        VaultError::MissingToken | VaultError::TokenExpired | VaultError::Unauthenticated => {
            Code::Unauthenticated
        },
        VaultError::InvalidToken | VaultError::InvalidArgument(_) => Code::InvalidArgument,
        VaultError::PasswordMismatch => Code::PermissionDenied,
        VaultError::UserNotFound | VaultError::NotFound(_) => Code::NotFound,
        VaultError::UploadTooLarge { .. } => Code::ResourceExhausted,
        VaultError::StreamCancelled(_) => Code::Cancelled,
        _ => Code::Internal,
    }
}

/// Translate a vault error into a caller-facing status.
///
/// Technical failures are logged here and reach the caller only as an
/// opaque "internal error".
pub fn vault_status(err: &VaultError) -> Status {
    let code = code_for(err);
    let mut status = if err.is_internal() || code == Code::Internal {
        tracing::error!(kind = err.kind(), error = %err, "request failed");
        Status::new(Code::Internal, "internal error")
    } else {
        Status::new(code, err.to_string())
    };

    status
        .metadata_mut()
        .insert(ERROR_KIND_HEADER, MetadataValue::from_static(err.kind()));
    status
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
