//! Lifecycle management state and behavior.
//!
//! This module contains the `LifecycleManager` struct, which isolates
//! server lifecycle events (shutdown) from the broker's routing state.

use tokio::sync::broadcast;

/// Lifecycle management state.
pub struct LifecycleManager {
    /// Shutdown signal broadcaster.
    /// Every listener and connection task subscribes; one send stops them all.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        // Capacity 16 leaves room for slow subscribers during shutdown
        let (shutdown_tx, _) = broadcast::channel(16);
        Self { shutdown_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every subscriber to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
