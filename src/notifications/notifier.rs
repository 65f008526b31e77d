//! Broadcast transport for change events.
//!
//! Observers subscribe to a [`ChangeNotifier`] and receive every event; a
//! [`ContentWatcher`] narrows the stream to changes relevant to one address.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::provider::ResourceAddress;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Fine-grained change of one address.
    ResourceChanged { address: ResourceAddress },
    /// Something in the artwork collection changed.
    ArtworkChanged,
    /// Something in the sources collection changed.
    SourcesChanged,
}

/// Coarse category broadcast for a changed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseBroadcast {
    Artwork,
    Sources,
}

impl CoarseBroadcast {
    pub fn for_address(address: &ResourceAddress) -> Self {
        match address {
            ResourceAddress::ArtworkCollection => CoarseBroadcast::Artwork,
            ResourceAddress::SourcesCollection | ResourceAddress::SourceItem(_) => {
                CoarseBroadcast::Sources
            }
        }
    }

    pub fn event(&self) -> ChangeEvent {
        match self {
            CoarseBroadcast::Artwork => ChangeEvent::ArtworkChanged,
            CoarseBroadcast::Sources => ChangeEvent::SourcesChanged,
        }
    }
}

pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Watches changes covered by `address`.
    pub fn watch(&self, address: ResourceAddress) -> ContentWatcher {
        ContentWatcher {
            address,
            rx: self.tx.subscribe(),
        }
    }

    pub fn notify_change(&self, address: ResourceAddress) {
        self.emit(ChangeEvent::ResourceChanged { address });
    }

    pub fn broadcast(&self, broadcast: CoarseBroadcast) {
        self.emit(broadcast.event());
    }

    /// Best-effort send; a write has already been applied when this runs, so a
    /// failed send is only logged.
    fn emit(&self, event: ChangeEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!("Emitted change event to {} observers", receivers),
            Err(broadcast::error::SendError(event)) => {
                debug!("No observers for change event {:?}", event)
            }
        }
    }
}

/// Change subscription tied to one address, as held by a query cursor.
pub struct ContentWatcher {
    address: ResourceAddress,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ContentWatcher {
    pub fn address(&self) -> ResourceAddress {
        self.address
    }

    fn is_relevant(&self, event: &ChangeEvent) -> bool {
        match event {
            ChangeEvent::ResourceChanged { address } => self.address.covers(address),
            _ => false,
        }
    }

    /// Drains queued events and reports whether any of them concern the
    /// watched address. A lagged receiver counts as changed.
    pub fn poll_changed(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.rx.try_recv() {
                Ok(event) => changed |= self.is_relevant(&event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => changed = true,
                Err(_) => return changed,
            }
        }
    }

    /// Waits for the next change concerning the watched address.
    ///
    /// Returns `false` once the notifier is gone.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.is_relevant(&event) => return true,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Content watcher lagged by {} events", n);
                    return true;
                }
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }
}
