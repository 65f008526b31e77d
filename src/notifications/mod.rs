mod coalescer;
mod notifier;

pub use coalescer::ChangeSession;
pub use notifier::{
    ChangeEvent, ChangeNotifier, CoarseBroadcast, ContentWatcher, DEFAULT_CHANNEL_CAPACITY,
};
