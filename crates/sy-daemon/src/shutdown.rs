use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// ShutdownSignal
// ---------------------------------------------------------------------------

/// Cooperative shutdown for the daemon's background loop.
///
/// The rebalancer loop `select!`s on a subscription alongside its sweep timer
/// and holds a [`DrainGuard`] for its lifetime. The host triggers once on
/// process exit, then may wait for the guard to drop so the final sweep is
/// known to have finished rather than been cancelled mid-migration.
///
/// ```ignore
/// let shutdown = ShutdownSignal::new();
/// let handle = spawn_rebalancer(orchestrator, shutdown.clone());
///
/// shutdown.trigger();
/// shutdown.wait_for_drain(Duration::from_secs(5)).await;
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    trigger: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
    drained_tx: Arc<watch::Sender<bool>>,
    drained_rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (trigger, _) = broadcast::channel(1);
        let (drained_tx, drained_rx) = watch::channel(false);
        Self {
            trigger,
            triggered: Arc::new(AtomicBool::new(false)),
            drained_tx: Arc::new(drained_tx),
            drained_rx,
        }
    }

    /// Receiver for the loop to `select!` on.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.trigger.subscribe()
    }

    /// Non-blocking check of the flag.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Relaxed)
    }

    /// Fire the signal. Idempotent; only the first caller broadcasts, and the
    /// return value says whether this call was it.
    pub fn trigger(&self) -> bool {
        let first = !self.triggered.swap(true, Ordering::SeqCst);
        if first {
            info!("shutdown signal triggered");
            let _ = self.trigger.send(());
        } else {
            debug!("shutdown already triggered");
        }
        first
    }

    /// RAII handle the loop keeps alive until it has fully wound down.
    pub fn drain_guard(&self) -> DrainGuard {
        DrainGuard {
            drained: Arc::clone(&self.drained_tx),
        }
    }

    /// Whether the loop has already wound down.
    pub fn is_drained(&self) -> bool {
        *self.drained_rx.borrow()
    }

    /// Wait until the loop's [`DrainGuard`] drops, up to `timeout`. Returns
    /// `true` on drain, `false` on timeout.
    pub async fn wait_for_drain(&mut self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, self.drained_rx.wait_for(|d| *d)).await;
        match drained {
            Ok(_) => {
                info!("rebalancer loop drained");
                true
            }
            Err(_) => {
                warn!("drain timeout, rebalancer loop did not confirm");
                false
            }
        }
    }

    /// How many loops are currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.trigger.receiver_count()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// DrainGuard
// ---------------------------------------------------------------------------

/// Marks the signal drained when dropped. The rebalancer loop takes one on
/// entry, so whatever path the loop exits through flips the flag.
pub struct DrainGuard {
    drained: Arc<watch::Sender<bool>>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let _ = self.drained.send(true);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
