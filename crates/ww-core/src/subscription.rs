//! # Collection subscriptions
//!
//! A `Subscription` yields full snapshots of one collection: first the state
//! at subscribe time, then one snapshot per committed write, in write order.
//! Stores publish snapshots on a `tokio::sync::broadcast` channel; dropping or
//! cancelling the subscription releases its receiver.

use std::sync::Arc;

use log::warn;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::models::Document;

/// An immutable, shareable view of every document in a collection.
pub type Snapshot = Arc<Vec<Document>>;

/// Snapshots buffered per collection before slow subscribers start lagging.
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

pub struct Subscription {
    collection: String,
    initial: Option<Snapshot>,
    rx: Option<broadcast::Receiver<Snapshot>>,
}

impl Subscription {
    /// `rx` must have been subscribed while `initial` was current, so no
    /// write falls between the two.
    pub fn new(
        collection: impl Into<String>,
        initial: Snapshot,
        rx: broadcast::Receiver<Snapshot>,
    ) -> Self {
        Self {
            collection: collection.into(),
            initial: Some(initial),
            rx: Some(rx),
        }
    }

    /// Waits for the next snapshot. Returns `None` once cancelled or once the
    /// store has shut down.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    // Snapshots are whole-collection, so the next one still
                    // carries the current state.
                    warn!(
                        "subscription on '{}' lagged, skipped {} snapshots",
                        self.collection, skipped
                    );
                }
                Err(RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Stops delivery immediately. Safe to call more than once.
    pub fn cancel(&mut self) {
        self.initial = None;
        self.rx = None;
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some() || self.initial.is_some()
    }
}
