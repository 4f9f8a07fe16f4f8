//! Last-known client store snapshot.
//!
//! Lossy by design: this is a latest-value cell, not a queue. A read
//! loop replacing the snapshot never blocks, and intermediate
//! snapshots may be observed by nobody. Last writer wins.

use serde_json::{Map, Value};
use tokio::sync::watch;

/// Shared cell holding the most recent `StoreChange` snapshot.
#[derive(Clone)]
pub struct StoreCell {
    tx: watch::Sender<Option<Map<String, Value>>>,
}

impl StoreCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the snapshot wholesale. No merge semantics.
    pub fn update(&self, snapshot: Map<String, Value>) {
        self.tx.send_replace(Some(snapshot));
    }

    /// Latest snapshot, or `None` before the first `StoreChange`.
    pub fn get(&self) -> Option<Map<String, Value>> {
        self.tx.borrow().clone()
    }

    /// Watch for snapshot replacements, for consumers that want to
    /// react to store changes rather than poll.
    pub fn subscribe(&self) -> watch::Receiver<Option<Map<String, Value>>> {
        self.tx.subscribe()
    }
}

impl Default for StoreCell {
    fn default() -> Self {
        Self::new()
    }
}
