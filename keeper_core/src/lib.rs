// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keeper Core: the server-side engine of a personal secret vault.
//!
//! Users store login/password pairs, notes, payment cards and arbitrary
//! binaries. Every sensitive field is sealed with AES-256-GCM before it
//! reaches storage.
//!
//! Components:
//! - [`TokenAuthority`]: HS256 identity tokens with expiry
//! - [`Cipher`]: per-field authenticated encryption
//! - [`CredentialHasher`]: Argon2id password hashing
//! - [`VaultStorage`]: persistence contract, with [`MemoryStorage`]
//! - [`ChunkPipeline`]: concurrent, order-preserving chunked transfer
//! - [`VaultService`]: orchestration of all of the above
//!
//! The transport layer verifies the caller's token and passes the verified
//! login into every [`VaultService`] call.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

mod cipher;
mod error;
pub mod model;
mod password;
mod pipeline;
mod storage;
mod token;
mod vault;

pub use cipher::{Cipher, Sealed, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{Result, VaultError};
pub use model::{
    BinaryRecord, Card, Entry, LoginPass, SecretId, SecretSummary, Text, UploadSummary, User,
    UserId,
};
pub use password::CredentialHasher;
pub use pipeline::{
    ChunkPipeline, PipelineConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_IN_FLIGHT, DEFAULT_MAX_UPLOAD_SIZE,
};
pub use storage::{MemoryStorage, VaultStorage};
pub use token::{Claims, TokenAuthority};
pub use vault::{VaultService, MAX_TITLE_LEN};
