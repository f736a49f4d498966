// SPDX-License-Identifier: MIT OR Apache-2.0
//! Drain-aware shutdown for long-lived transfer streams.
//!
//! Binary uploads and downloads hold a [`StreamGuard`] for their whole
//! lifetime. Once shutdown is triggered no new guard is handed out, and the
//! server waits up to the drain timeout for the outstanding ones to drop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::service::health::HealthState;

/// Configuration for graceful shutdown behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight transfers to complete.
    pub drain_timeout: Duration,
    /// Extra time granted after the drain before connections are closed.
    pub grace_period: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(30),
            grace_period: Duration::from_secs(5),
        }
    }
}

impl ShutdownConfig {
    /// Create a new shutdown configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the drain timeout.
    #[must_use]
    pub const fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Set the grace period.
    #[must_use]
    pub const fn with_grace_period(mut self, period: Duration) -> Self {
        self.grace_period = period;
        self
    }
}

/// Tracks in-flight transfers and coordinates the drain.
#[derive(Debug)]
pub struct ShutdownManager {
    config: ShutdownConfig,
    health_state: Arc<HealthState>,
    active_streams: AtomicU32,
    shutdown_triggered: AtomicBool,
    drained: Notify,
}

impl ShutdownManager {
    /// Create a new shutdown manager.
    #[must_use]
    pub fn new(config: ShutdownConfig, health_state: Arc<HealthState>) -> Self {
        Self {
            config,
            health_state,
            active_streams: AtomicU32::new(0),
            shutdown_triggered: AtomicBool::new(false),
            drained: Notify::new(),
        }
    }

    /// Register a new transfer.
    ///
    /// Returns `None` once shutdown has begun. The slot is counted before the
    /// shutdown flag is read and handed back if admission is refused.
    pub fn admit(self: &Arc<Self>) -> Option<StreamGuard> {
        self.active_streams.fetch_add(1, Ordering::SeqCst);
        if self.is_shutting_down() {
            self.release();
            return None;
        }
        Some(StreamGuard {
            manager: Arc::clone(self),
        })
    }

    fn release(&self) {
        if self.active_streams.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Number of transfers currently in flight.
    #[must_use]
    pub fn active_count(&self) -> u32 {
        self.active_streams.load(Ordering::SeqCst)
    }

    /// Check if shutdown has been triggered.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_triggered.load(Ordering::SeqCst)
    }

    /// Stop admitting transfers and report draining through health checks.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        self.health_state.set_draining(true);
        tracing::info!(active_streams = self.active_count(), "shutdown triggered");
    }

    /// Get the shutdown configuration.
    #[must_use]
    pub fn config(&self) -> &ShutdownConfig {
        &self.config
    }

    /// Wait for all in-flight transfers to finish.
    ///
    /// Returns `true` if they completed within the drain timeout.
    pub async fn wait_for_drain(&self) -> bool {
        let timeout = self.config.drain_timeout;
        tracing::info!(
            active_streams = self.active_count(),
            timeout_secs = timeout.as_secs(),
            "waiting for transfers to drain"
        );

        let drained = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.drained.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok();

        if drained {
            tracing::info!("all transfers drained");
        } else {
            tracing::warn!(
                remaining_streams = self.active_count(),
                "drain timeout reached"
            );
        }
        drained
    }
}

/// Proof of an admitted transfer. Dropping it releases the slot.
#[derive(Debug)]
pub struct StreamGuard {
    manager: Arc<ShutdownManager>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.manager.release();
    }
}
