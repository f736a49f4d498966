// SPDX-License-Identifier: MIT OR Apache-2.0
//! Vault orchestration: accounts, per-kind secret operations, binaries.
//!
//! Every operation takes the caller's verified login and resolves it to an
//! owner id through storage before touching any secret. Plaintext is sealed
//! before storage calls and opened after them; storage never sees it.

use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, instrument, warn};

use crate::cipher::Cipher;
use crate::error::{Result, VaultError};
use crate::model::{
    BinaryRecord, Card, Entry, LoginPass, Seal, SecretId, SecretSummary, Text, UploadSummary,
    UserId,
};
use crate::password::CredentialHasher;
use crate::pipeline::{ChunkPipeline, PipelineConfig};
use crate::storage::VaultStorage;
use crate::token::TokenAuthority;

/// Largest accepted title, in bytes.
pub const MAX_TITLE_LEN: usize = 256;

/// Entry point for every vault operation.
pub struct VaultService {
    storage: Arc<dyn VaultStorage>,
    cipher: Arc<Cipher>,
    tokens: Arc<TokenAuthority>,
    hasher: Arc<CredentialHasher>,
    pipeline: ChunkPipeline,
}

impl VaultService {
    /// Wire the engine together.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidArgument`] if `pipeline` fails validation.
    pub fn new(
        storage: Arc<dyn VaultStorage>,
        cipher: Cipher,
        tokens: TokenAuthority,
        hasher: CredentialHasher,
        pipeline: PipelineConfig,
    ) -> Result<Self> {
        let cipher = Arc::new(cipher);
        let pipeline = ChunkPipeline::new(Arc::clone(&storage), Arc::clone(&cipher), pipeline)?;
        Ok(Self {
            storage,
            cipher,
            tokens: Arc::new(tokens),
            hasher: Arc::new(hasher),
            pipeline,
        })
    }

    /// The token authority, shared with the call gate.
    #[must_use]
    pub fn tokens(&self) -> Arc<TokenAuthority> {
        Arc::clone(&self.tokens)
    }

    #[must_use]
    pub const fn pipeline(&self) -> &ChunkPipeline {
        &self.pipeline
    }

    async fn owner(&self, login: &str) -> Result<UserId> {
        Ok(self.storage.user_by_login(login).await?.id)
    }

    // --- accounts ---

    /// Create an account with a salted password hash.
    #[instrument(skip(self, password))]
    pub async fn register_user(&self, login: &str, password: &str) -> Result<()> {
        if login.trim().is_empty() {
            return Err(VaultError::InvalidArgument("login must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(VaultError::InvalidArgument(
                "password must not be empty".to_string(),
            ));
        }

        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| VaultError::Internal(format!("hashing task failed: {e}")))??;

        self.storage.register_user(login, &hash).await?;
        info!(login, "user registered");
        Ok(())
    }

    /// Check credentials and mint a token.
    #[instrument(skip(self, password))]
    pub async fn auth_user(&self, login: &str, password: &str) -> Result<String> {
        let user = self.storage.user_by_login(login).await?;

        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let stored = user.password_hash;
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| VaultError::Internal(format!("hashing task failed: {e}")))??;

        let token = self.tokens.issue(login)?;
        debug!(login, "token issued");
        Ok(token)
    }

    // --- login/password pairs ---

    pub async fn add_login_pass(&self, login: &str, record: LoginPass) -> Result<SecretId> {
        validate_title(&record.title)?;
        let owner = self.owner(login).await?;
        let sealed = record.seal(&self.cipher)?;
        self.storage.add_login_pass(owner, sealed).await
    }

    pub async fn list_login_pass(&self, login: &str) -> Result<Vec<SecretSummary>> {
        let owner = self.owner(login).await?;
        self.storage.login_pass_list(owner).await
    }

    pub async fn get_login_pass(&self, login: &str, id: SecretId) -> Result<Entry<LoginPass>> {
        let owner = self.owner(login).await?;
        let sealed = self.storage.login_pass_by_id(owner, id).await?;
        Ok(Entry {
            id,
            secret: LoginPass::open(&sealed, &self.cipher)?,
        })
    }

    // --- text notes ---

    pub async fn add_text(&self, login: &str, record: Text) -> Result<SecretId> {
        validate_title(&record.title)?;
        let owner = self.owner(login).await?;
        let sealed = record.seal(&self.cipher)?;
        self.storage.add_text(owner, sealed).await
    }

    pub async fn list_text(&self, login: &str) -> Result<Vec<SecretSummary>> {
        let owner = self.owner(login).await?;
        self.storage.text_list(owner).await
    }

    pub async fn get_text(&self, login: &str, id: SecretId) -> Result<Entry<Text>> {
        let owner = self.owner(login).await?;
        let sealed = self.storage.text_by_id(owner, id).await?;
        Ok(Entry {
            id,
            secret: Text::open(&sealed, &self.cipher)?,
        })
    }

    // --- cards ---

    pub async fn add_card(&self, login: &str, record: Card) -> Result<SecretId> {
        validate_title(&record.title)?;
        let owner = self.owner(login).await?;
        let sealed = record.seal(&self.cipher)?;
        self.storage.add_card(owner, sealed).await
    }

    pub async fn list_card(&self, login: &str) -> Result<Vec<SecretSummary>> {
        let owner = self.owner(login).await?;
        self.storage.card_list(owner).await
    }

    pub async fn get_card(&self, login: &str, id: SecretId) -> Result<Entry<Card>> {
        let owner = self.owner(login).await?;
        let sealed = self.storage.card_by_id(owner, id).await?;
        Ok(Entry {
            id,
            secret: Card::open(&sealed, &self.cipher)?,
        })
    }

    // --- binaries ---

    /// Store a streamed binary. The row is created first so chunks can
    /// reference it; it is marked complete only after every chunk landed.
    #[instrument(skip(self, input))]
    pub async fn add_binary<S>(&self, login: &str, input: S) -> Result<UploadSummary>
    where
        S: Stream<Item = Result<Vec<u8>>> + Unpin + Send,
    {
        let owner = self.owner(login).await?;
        let binary_id = self.storage.create_binary(owner).await?;

        let summary = self.pipeline.upload(binary_id, input).await?;
        if let Err(e) = self
            .storage
            .finish_binary(owner, binary_id, summary.chunks)
            .await
        {
            warn!(
                binary_id,
                orphaned_chunks = summary.chunks,
                error = %e,
                "binary not marked complete; persisted chunk rows left orphaned"
            );
            return Err(e);
        }

        info!(
            binary_id,
            chunks = summary.chunks,
            bytes = summary.bytes,
            "binary stored"
        );
        Ok(summary)
    }

    pub async fn set_binary_title(&self, login: &str, id: SecretId, title: &str) -> Result<()> {
        validate_title(title)?;
        let owner = self.owner(login).await?;
        self.storage.set_binary_title(owner, id, title).await
    }

    pub async fn list_binary(&self, login: &str) -> Result<Vec<SecretSummary>> {
        let owner = self.owner(login).await?;
        self.storage.binary_list(owner).await
    }

    /// Metadata of a complete binary owned by `login`.
    pub async fn binary_info(&self, login: &str, id: SecretId) -> Result<BinaryRecord> {
        let owner = self.owner(login).await?;
        let record = self.storage.binary_by_id(owner, id).await?;
        if !record.is_complete() {
            return Err(VaultError::NotFound(format!("binary {id} upload incomplete")));
        }
        Ok(record)
    }

    /// Open a plaintext stream over a complete binary.
    pub async fn get_binary(
        &self,
        login: &str,
        id: SecretId,
    ) -> Result<(BinaryRecord, ReceiverStream<Result<Vec<u8>>>)> {
        let record = self.binary_info(login, id).await?;
        let chunks = record.chunk_count.unwrap_or(0);
        let stream = self.pipeline.download(id, chunks);
        Ok((record, stream))
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(VaultError::InvalidArgument("title must not be empty".to_string()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(VaultError::InvalidArgument(format!(
            "title exceeds {MAX_TITLE_LEN} bytes"
        )));
    }
    Ok(())
}
