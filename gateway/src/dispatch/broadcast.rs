//! Status broadcast to observers.
//!
//! Snapshots travel over a watch channel: a new subscriber immediately sees
//! the current snapshot, dropping the receiver unsubscribes, and a stalled
//! or failing subscriber cannot affect delivery to the others.

use tokio::sync::watch;

use studio_common::StatusSnapshot;

pub struct StatusBroadcaster {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx }
    }

    /// Register an observer. The receiver holds the latest snapshot from the
    /// moment of subscription.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// Push a new snapshot to all observers. Called by the dispatcher under
    /// its state lock after every structural change, so snapshots reach the
    /// channel in transition order.
    pub fn publish(&self, snapshot: StatusSnapshot) {
        // send_replace updates the value even when no observer is attached.
        self.tx.send_replace(snapshot);
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
