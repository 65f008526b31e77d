//! Batched, coalesced change notification.
//!
//! Outside a batch every recorded change is broadcast right away: its
//! fine-grained event, then its coarse category event. Inside a batch the
//! changed addresses are buffered and flushed by [`ChangeSession::end_batch`],
//! which still emits every fine-grained event in order but at most one
//! "sources changed" broadcast for the whole batch.

use tracing::debug;

use super::notifier::{ChangeNotifier, CoarseBroadcast};
use crate::provider::ResourceAddress;

/// Change recorder owned by whoever drives a sequence of writes.
pub struct ChangeSession<'n> {
    notifier: &'n ChangeNotifier,
    batch_open: bool,
    pending: Vec<ResourceAddress>,
}

impl<'n> ChangeSession<'n> {
    pub fn new(notifier: &'n ChangeNotifier) -> Self {
        Self {
            notifier,
            batch_open: false,
            pending: Vec::new(),
        }
    }

    pub fn is_batch_open(&self) -> bool {
        self.batch_open
    }

    pub fn pending(&self) -> &[ResourceAddress] {
        &self.pending
    }

    pub fn begin_batch(&mut self) {
        self.batch_open = true;
    }

    pub fn record_change(&mut self, address: ResourceAddress) {
        if self.batch_open {
            if !self.pending.contains(&address) {
                self.pending.push(address);
            }
            return;
        }
        self.notifier.notify_change(address);
        self.notifier
            .broadcast(CoarseBroadcast::for_address(&address));
    }

    /// Closes the batch and flushes the buffered changes. Returns how many
    /// addresses were flushed.
    pub fn end_batch(&mut self) -> usize {
        self.batch_open = false;
        let pending = std::mem::take(&mut self.pending);
        let mut sources_changed = false;
        for address in &pending {
            self.notifier.notify_change(*address);
            match CoarseBroadcast::for_address(address) {
                CoarseBroadcast::Artwork => self.notifier.broadcast(CoarseBroadcast::Artwork),
                CoarseBroadcast::Sources => sources_changed = true,
            }
        }
        if sources_changed {
            self.notifier.broadcast(CoarseBroadcast::Sources);
        }
        debug!("Flushed {} coalesced changes", pending.len());
        pending.len()
    }

    /// Closes the batch without emitting anything.
    pub fn discard(&mut self) {
        if !self.pending.is_empty() {
            debug!("Discarding {} pending changes", self.pending.len());
        }
        self.batch_open = false;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::ChangeEvent;
    use tokio::sync::broadcast;

    fn drain(rx: &mut broadcast::Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn changed(address: ResourceAddress) -> ChangeEvent {
        ChangeEvent::ResourceChanged { address }
    }

    #[test]
    fn test_batch_coalesces_coarse_events() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();
        let mut session = ChangeSession::new(&notifier);

        session.begin_batch();
        session.record_change(ResourceAddress::SourceItem(1));
        session.record_change(ResourceAddress::SourceItem(2));
        session.record_change(ResourceAddress::ArtworkCollection);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.end_batch(), 3);

        assert_eq!(
            drain(&mut rx),
            vec![
                changed(ResourceAddress::SourceItem(1)),
                changed(ResourceAddress::SourceItem(2)),
                changed(ResourceAddress::ArtworkCollection),
                ChangeEvent::ArtworkChanged,
                ChangeEvent::SourcesChanged,
            ]
        );
        assert!(!session.is_batch_open());
        assert!(session.pending().is_empty());
    }

    #[test]
    fn test_batch_deduplicates_and_keeps_first_order() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();
        let mut session = ChangeSession::new(&notifier);

        session.begin_batch();
        session.record_change(ResourceAddress::SourceItem(2));
        session.record_change(ResourceAddress::SourcesCollection);
        session.record_change(ResourceAddress::SourceItem(2));
        assert_eq!(
            session.pending(),
            &[ResourceAddress::SourceItem(2), ResourceAddress::SourcesCollection]
        );
        session.end_batch();

        assert_eq!(
            drain(&mut rx),
            vec![
                changed(ResourceAddress::SourceItem(2)),
                changed(ResourceAddress::SourcesCollection),
                ChangeEvent::SourcesChanged,
            ]
        );
    }

    #[test]
    fn test_immediate_mode_broadcasts_per_change() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();
        let mut session = ChangeSession::new(&notifier);

        session.record_change(ResourceAddress::SourceItem(1));
        session.record_change(ResourceAddress::SourceItem(2));
        session.record_change(ResourceAddress::ArtworkCollection);

        assert_eq!(
            drain(&mut rx),
            vec![
                changed(ResourceAddress::SourceItem(1)),
                ChangeEvent::SourcesChanged,
                changed(ResourceAddress::SourceItem(2)),
                ChangeEvent::SourcesChanged,
                changed(ResourceAddress::ArtworkCollection),
                ChangeEvent::ArtworkChanged,
            ]
        );
    }

    #[test]
    fn test_empty_batch_emits_nothing() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();
        let mut session = ChangeSession::new(&notifier);
        session.begin_batch();
        assert_eq!(session.end_batch(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_discard_drops_pending_changes() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();
        let mut session = ChangeSession::new(&notifier);
        session.begin_batch();
        session.record_change(ResourceAddress::ArtworkCollection);
        session.discard();
        assert!(!session.is_batch_open());
        assert!(drain(&mut rx).is_empty());
    }
}
