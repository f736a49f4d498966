// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistence contract consumed by the vault, plus an in-memory backend.
//!
//! Backends only ever receive sealed records. Every secret query is scoped
//! by the owner id resolved from the caller's login.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::cipher::Sealed;
use crate::error::{Result, VaultError};
use crate::model::{
    BinaryRecord, SealedCard, SealedChunk, SealedLoginPass, SealedText, SecretId, SecretSummary,
    User, UserId,
};

/// Storage operations the vault engine depends on.
///
/// Implementations must be safe to call concurrently; upload workers
/// persist chunks of the same binary in parallel.
#[async_trait]
pub trait VaultStorage: Send + Sync {
    /// Create an account. Fails with [`VaultError::AlreadyExists`] if the
    /// login is taken.
    async fn register_user(&self, login: &str, password_hash: &str) -> Result<UserId>;

    /// Look up an account. Fails with [`VaultError::UserNotFound`].
    async fn user_by_login(&self, login: &str) -> Result<User>;

    async fn add_login_pass(&self, owner: UserId, record: SealedLoginPass) -> Result<SecretId>;
    async fn login_pass_list(&self, owner: UserId) -> Result<Vec<SecretSummary>>;
    async fn login_pass_by_id(&self, owner: UserId, id: SecretId) -> Result<SealedLoginPass>;

    async fn add_text(&self, owner: UserId, record: SealedText) -> Result<SecretId>;
    async fn text_list(&self, owner: UserId) -> Result<Vec<SecretSummary>>;
    async fn text_by_id(&self, owner: UserId, id: SecretId) -> Result<SealedText>;

    async fn add_card(&self, owner: UserId, record: SealedCard) -> Result<SecretId>;
    async fn card_list(&self, owner: UserId) -> Result<Vec<SecretSummary>>;
    async fn card_by_id(&self, owner: UserId, id: SecretId) -> Result<SealedCard>;

    /// Create an untitled, incomplete binary row so chunks can reference it.
    async fn create_binary(&self, owner: UserId) -> Result<SecretId>;

    async fn set_binary_title(&self, owner: UserId, id: SecretId, title: &str) -> Result<()>;

    /// Mark the binary complete with the number of chunks it consists of.
    async fn finish_binary(&self, owner: UserId, id: SecretId, chunk_count: u32) -> Result<()>;

    async fn binary_by_id(&self, owner: UserId, id: SecretId) -> Result<BinaryRecord>;

    /// Summaries of complete binaries only.
    async fn binary_list(&self, owner: UserId) -> Result<Vec<SecretSummary>>;

    /// Append one chunk. Chunks are never overwritten.
    async fn add_binary_chunk(&self, chunk: SealedChunk) -> Result<()>;

    async fn binary_chunk(&self, binary_id: SecretId, order_number: u32) -> Result<Sealed>;
}

struct Owned<T> {
    owner: UserId,
    record: T,
}

#[derive(Default)]
struct Secrets {
    login_pass: BTreeMap<SecretId, Owned<SealedLoginPass>>,
    texts: BTreeMap<SecretId, Owned<SealedText>>,
    cards: BTreeMap<SecretId, Owned<SealedCard>>,
    binaries: BTreeMap<SecretId, Owned<BinaryRecord>>,
}

/// Process-local backend keeping every table behind a `RwLock`.
///
/// Nothing survives a restart. Suitable for tests and single-node demos.
pub struct MemoryStorage {
    users: RwLock<HashMap<String, User>>,
    secrets: RwLock<Secrets>,
    chunks: RwLock<BTreeMap<(SecretId, u32), Sealed>>,
    next_id: AtomicI64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            secrets: RwLock::new(Secrets::default()),
            chunks: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn allocate_id(&self) -> SecretId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of chunk rows stored for `binary_id`, complete or not.
    #[must_use]
    pub fn chunk_rows(&self, binary_id: SecretId) -> usize {
        self.chunks
            .read()
            .range((binary_id, 0)..=(binary_id, u32::MAX))
            .count()
    }
}

fn summaries<T>(
    table: &BTreeMap<SecretId, Owned<T>>,
    owner: UserId,
    title: impl Fn(&T) -> Option<&str>,
) -> Vec<SecretSummary> {
    table
        .iter()
        .filter(|(_, row)| row.owner == owner)
        .filter_map(|(id, row)| {
            title(&row.record).map(|title| SecretSummary {
                id: *id,
                title: title.to_string(),
            })
        })
        .collect()
}

fn owned_by<'a, T>(
    table: &'a BTreeMap<SecretId, Owned<T>>,
    owner: UserId,
    id: SecretId,
    kind: &str,
) -> Result<&'a T> {
    table
        .get(&id)
        .filter(|row| row.owner == owner)
        .map(|row| &row.record)
        .ok_or_else(|| VaultError::NotFound(format!("{kind} {id}")))
}

fn owned_by_mut<'a, T>(
    table: &'a mut BTreeMap<SecretId, Owned<T>>,
    owner: UserId,
    id: SecretId,
    kind: &str,
) -> Result<&'a mut T> {
    table
        .get_mut(&id)
        .filter(|row| row.owner == owner)
        .map(|row| &mut row.record)
        .ok_or_else(|| VaultError::NotFound(format!("{kind} {id}")))
}

#[async_trait]
impl VaultStorage for MemoryStorage {
    async fn register_user(&self, login: &str, password_hash: &str) -> Result<UserId> {
        let mut users = self.users.write();
        if users.contains_key(login) {
            return Err(VaultError::AlreadyExists);
        }

        let id = UserId(Uuid::new_v4());
        users.insert(
            login.to_string(),
            User {
                id,
                login: login.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(id)
    }

    async fn user_by_login(&self, login: &str) -> Result<User> {
        self.users
            .read()
            .get(login)
            .cloned()
            .ok_or(VaultError::UserNotFound)
    }

    async fn add_login_pass(&self, owner: UserId, record: SealedLoginPass) -> Result<SecretId> {
        let id = self.allocate_id();
        self.secrets
            .write()
            .login_pass
            .insert(id, Owned { owner, record });
        Ok(id)
    }

    async fn login_pass_list(&self, owner: UserId) -> Result<Vec<SecretSummary>> {
        Ok(summaries(&self.secrets.read().login_pass, owner, |r| {
            Some(r.title.as_str())
        }))
    }

    async fn login_pass_by_id(&self, owner: UserId, id: SecretId) -> Result<SealedLoginPass> {
        owned_by(&self.secrets.read().login_pass, owner, id, "login_pass").cloned()
    }

    async fn add_text(&self, owner: UserId, record: SealedText) -> Result<SecretId> {
        let id = self.allocate_id();
        self.secrets
            .write()
            .texts
            .insert(id, Owned { owner, record });
        Ok(id)
    }

    async fn text_list(&self, owner: UserId) -> Result<Vec<SecretSummary>> {
        Ok(summaries(&self.secrets.read().texts, owner, |r| {
            Some(r.title.as_str())
        }))
    }

    async fn text_by_id(&self, owner: UserId, id: SecretId) -> Result<SealedText> {
        owned_by(&self.secrets.read().texts, owner, id, "text").cloned()
    }

    async fn add_card(&self, owner: UserId, record: SealedCard) -> Result<SecretId> {
        let id = self.allocate_id();
        self.secrets
            .write()
            .cards
            .insert(id, Owned { owner, record });
        Ok(id)
    }

    async fn card_list(&self, owner: UserId) -> Result<Vec<SecretSummary>> {
        Ok(summaries(&self.secrets.read().cards, owner, |r| {
            Some(r.title.as_str())
        }))
    }

    async fn card_by_id(&self, owner: UserId, id: SecretId) -> Result<SealedCard> {
        owned_by(&self.secrets.read().cards, owner, id, "card").cloned()
    }

    async fn create_binary(&self, owner: UserId) -> Result<SecretId> {
        let id = self.allocate_id();
        let record = BinaryRecord {
            id,
            title: String::new(),
            chunk_count: None,
        };
        self.secrets
            .write()
            .binaries
            .insert(id, Owned { owner, record });
        Ok(id)
    }

    async fn set_binary_title(&self, owner: UserId, id: SecretId, title: &str) -> Result<()> {
        let mut secrets = self.secrets.write();
        owned_by_mut(&mut secrets.binaries, owner, id, "binary")?.title = title.to_string();
        Ok(())
    }

    async fn finish_binary(&self, owner: UserId, id: SecretId, chunk_count: u32) -> Result<()> {
        let mut secrets = self.secrets.write();
        owned_by_mut(&mut secrets.binaries, owner, id, "binary")?.chunk_count = Some(chunk_count);
        Ok(())
    }

    async fn binary_by_id(&self, owner: UserId, id: SecretId) -> Result<BinaryRecord> {
        owned_by(&self.secrets.read().binaries, owner, id, "binary").cloned()
    }

    async fn binary_list(&self, owner: UserId) -> Result<Vec<SecretSummary>> {
        Ok(summaries(&self.secrets.read().binaries, owner, |r| {
            r.is_complete().then_some(r.title.as_str())
        }))
    }

    async fn add_binary_chunk(&self, chunk: SealedChunk) -> Result<()> {
        if !self.secrets.read().binaries.contains_key(&chunk.binary_id) {
            return Err(VaultError::NotFound(format!("binary {}", chunk.binary_id)));
        }

        let mut chunks = self.chunks.write();
        let key = (chunk.binary_id, chunk.order_number);
        if chunks.contains_key(&key) {
            return Err(VaultError::Storage(format!(
                "duplicate chunk {} of binary {}",
                chunk.order_number, chunk.binary_id
            )));
        }
        chunks.insert(key, chunk.payload);
        Ok(())
    }

    async fn binary_chunk(&self, binary_id: SecretId, order_number: u32) -> Result<Sealed> {
        self.chunks
            .read()
            .get(&(binary_id, order_number))
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("chunk {order_number} of binary {binary_id}")))
    }
}
