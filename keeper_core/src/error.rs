// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error kinds shared by every layer of the vault.

use thiserror::Error;

/// Every failure the vault engine can report.
///
/// Domain variants carry no sensitive detail and may be shown to callers.
/// Technical variants (`Storage`, `EncryptionFailed`, `DecryptionFailed`,
/// `PasswordHash`, `Internal`) carry diagnostics meant for logs only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VaultError {
    /// A user with this login is already registered.
    #[error("already exists")]
    AlreadyExists,

    /// The call carried no bearer token.
    #[error("missing auth token")]
    MissingToken,

    /// Signature, algorithm, or structure of the token is wrong.
    #[error("invalid token")]
    InvalidToken,

    /// The token verified but names no caller.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The token was valid but its expiry has passed.
    #[error("token expired")]
    TokenExpired,

    /// The token signing secret is empty.
    #[error("secret key must not be empty")]
    EmptySecretKey,

    /// The symmetric key is not exactly 32 bytes.
    #[error("secret key len must be {expected} bytes, got {actual}")]
    SecretKeyLen {
        /// Required key length.
        expected: usize,
        /// Supplied key length.
        actual: usize,
    },

    /// The supplied password does not match the stored hash.
    #[error("users password not match")]
    PasswordMismatch,

    /// No user is registered under the login.
    #[error("user not found")]
    UserNotFound,

    /// The requested secret does not exist for this owner.
    #[error("not found: {0}")]
    NotFound(String),

    /// A request field failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A binary upload exceeded the configured ceiling.
    #[error("upload exceeds maximum size of {limit} bytes")]
    UploadTooLarge {
        /// Configured ceiling in bytes.
        limit: u64,
    },

    /// Ciphertext was truncated, badly encoded, or failed authentication.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The cipher could not be initialised or sealing failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Password hashing or hash parsing failed.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// The byte stream feeding an upload was cancelled or broke.
    #[error("stream cancelled: {0}")]
    StreamCancelled(String),

    /// The storage backend failed for a technical reason.
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else that should never happen.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Stable snake_case name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "already_exists",
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::Unauthenticated => "unauthenticated",
            Self::TokenExpired => "token_expired",
            Self::EmptySecretKey => "empty_secret_key",
            Self::SecretKeyLen { .. } => "secret_key_len",
            Self::PasswordMismatch => "password_mismatch",
            Self::UserNotFound => "user_not_found",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::UploadTooLarge { .. } => "upload_too_large",
            Self::DecryptionFailed => "decryption_failed",
            Self::EncryptionFailed(_) => "encryption_failed",
            Self::PasswordHash(_) => "password_hash",
            Self::StreamCancelled(_) => "stream_cancelled",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the error is a technical failure whose detail must stay server-side.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::EmptySecretKey
                | Self::SecretKeyLen { .. }
                | Self::DecryptionFailed
                | Self::EncryptionFailed(_)
                | Self::PasswordHash(_)
                | Self::Storage(_)
                | Self::Internal(_)
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, VaultError>;
