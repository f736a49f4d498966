// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chunked binary transfer with concurrent encryption.
//!
//! Uploads regroup an incoming byte stream into fixed-size segments. Order
//! numbers are assigned on the reading side, one at a time, before a segment
//! is handed to a worker. Workers encrypt and persist in parallel and may
//! finish in any order. Downloads read segments back strictly by order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::cipher::Cipher;
use crate::error::{Result, VaultError};
use crate::model::{SealedChunk, SecretId, UploadSummary};
use crate::storage::VaultStorage;

/// Default plaintext segment size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default maximum number of chunk workers alive per upload.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Default upload ceiling: 512MB
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 512 * 1024 * 1024;

/// Default download channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Tuning knobs for [`ChunkPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub max_in_flight: usize,
    pub max_upload_size: u64,
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub const fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    #[must_use]
    pub const fn with_max_in_flight(mut self, workers: usize) -> Self {
        self.max_in_flight = workers;
        self
    }

    #[must_use]
    pub const fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Reject values that would stall or break the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(VaultError::InvalidArgument(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(VaultError::InvalidArgument(
                "max_in_flight must be greater than 0".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(VaultError::InvalidArgument(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Splits, seals and persists binaries; reassembles them on the way out.
pub struct ChunkPipeline {
    storage: Arc<dyn VaultStorage>,
    cipher: Arc<Cipher>,
    config: PipelineConfig,
}

/// Bookkeeping for one upload in progress.
struct Upload {
    binary_id: SecretId,
    workers: JoinSet<Result<()>>,
    buffer: Vec<u8>,
    next_order: u32,
    bytes: u64,
    persisted: Arc<AtomicU32>,
}

impl ChunkPipeline {
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidArgument`] if `config` fails validation.
    pub fn new(
        storage: Arc<dyn VaultStorage>,
        cipher: Arc<Cipher>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            cipher,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Consume `input` and store it as the chunks of `binary_id`.
    ///
    /// Returns once every chunk is persisted, or with the first error from
    /// either side. An input error stops all workers; a worker error stops
    /// reading input. Chunks already persisted by then are left in place.
    pub async fn upload<S>(&self, binary_id: SecretId, mut input: S) -> Result<UploadSummary>
    where
        S: Stream<Item = Result<Vec<u8>>> + Unpin + Send,
    {
        let mut upload = Upload {
            binary_id,
            workers: JoinSet::new(),
            buffer: Vec::with_capacity(self.config.chunk_size),
            next_order: 1,
            bytes: 0,
            persisted: Arc::new(AtomicU32::new(0)),
        };

        match self.drive(&mut upload, &mut input).await {
            Ok(()) => {
                let chunks = upload.next_order - 1;
                debug!(binary_id, chunks, bytes = upload.bytes, "upload persisted");
                Ok(UploadSummary {
                    binary_id,
                    chunks,
                    bytes: upload.bytes,
                })
            },
            Err(e) => {
                upload.workers.abort_all();
                while upload.workers.join_next().await.is_some() {}

                let orphaned = upload.persisted.load(Ordering::SeqCst);
                if orphaned > 0 {
                    warn!(
                        binary_id,
                        orphaned_chunks = orphaned,
                        error = %e,
                        "upload aborted; persisted chunk rows left orphaned"
                    );
                } else {
                    warn!(binary_id, error = %e, "upload aborted");
                }
                Err(e)
            },
        }
    }

    async fn drive<S>(&self, upload: &mut Upload, input: &mut S) -> Result<()>
    where
        S: Stream<Item = Result<Vec<u8>>> + Unpin + Send,
    {
        let chunk_size = self.config.chunk_size;

        loop {
            tokio::select! {
                biased;

                Some(joined) = upload.workers.join_next(), if !upload.workers.is_empty() => {
                    worker_result(joined)?;
                },
                item = input.next() => match item {
                    Some(Ok(bytes)) => {
                        upload.bytes = upload.bytes.saturating_add(bytes.len() as u64);
                        if upload.bytes > self.config.max_upload_size {
                            return Err(VaultError::UploadTooLarge {
                                limit: self.config.max_upload_size,
                            });
                        }

                        let mut rest = bytes.as_slice();
                        while !rest.is_empty() {
                            let take = (chunk_size - upload.buffer.len()).min(rest.len());
                            upload.buffer.extend_from_slice(&rest[..take]);
                            rest = &rest[take..];

                            if upload.buffer.len() == chunk_size {
                                let full = std::mem::replace(
                                    &mut upload.buffer,
                                    Vec::with_capacity(chunk_size),
                                );
                                self.dispatch(upload, full).await?;
                            }
                        }
                    },
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
            }
        }

        if !upload.buffer.is_empty() {
            let tail = std::mem::take(&mut upload.buffer);
            self.dispatch(upload, tail).await?;
        }

        while let Some(joined) = upload.workers.join_next().await {
            worker_result(joined)?;
        }
        Ok(())
    }

    /// Assign the next order number to `plaintext` and hand it to a worker,
    /// waiting for a free slot first.
    async fn dispatch(&self, upload: &mut Upload, plaintext: Vec<u8>) -> Result<()> {
        while upload.workers.len() >= self.config.max_in_flight {
            if let Some(joined) = upload.workers.join_next().await {
                worker_result(joined)?;
            }
        }

        let order_number = upload.next_order;
        upload.next_order = order_number
            .checked_add(1)
            .ok_or_else(|| VaultError::Internal("chunk order number overflow".to_string()))?;

        let binary_id = upload.binary_id;
        let storage = Arc::clone(&self.storage);
        let cipher = Arc::clone(&self.cipher);
        let persisted = Arc::clone(&upload.persisted);

        upload.workers.spawn(async move {
            let payload = cipher.encrypt(&plaintext)?;
            storage
                .add_binary_chunk(SealedChunk {
                    binary_id,
                    order_number,
                    payload,
                })
                .await?;
            persisted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Ok(())
    }

    /// Stream the plaintext of chunks `1..=chunk_count` in order.
    ///
    /// The stream ends after the first error. A chunk missing inside the
    /// recorded range is reported as an error, never skipped.
    #[must_use]
    pub fn download(&self, binary_id: SecretId, chunk_count: u32) -> ReceiverStream<Result<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let storage = Arc::clone(&self.storage);
        let cipher = Arc::clone(&self.cipher);

        tokio::spawn(async move {
            for order in 1..=chunk_count {
                let result = match storage.binary_chunk(binary_id, order).await {
                    Ok(sealed) => cipher.decrypt(&sealed),
                    Err(VaultError::NotFound(_)) => Err(VaultError::Internal(format!(
                        "chunk {order} of complete binary {binary_id} is missing"
                    ))),
                    Err(e) => Err(e),
                };

                let failed = result.is_err();
                if tx.send(result).await.is_err() {
                    debug!(binary_id, order, "download receiver dropped");
                    return;
                }
                if failed {
                    return;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

fn worker_result(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| VaultError::Internal(format!("chunk worker failed: {e}")))?
}
