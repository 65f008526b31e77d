//! Artwork provider library
//!
//! Addressable storage for the current artwork and its content sources, with
//! change notification and access to the current artwork image file.

pub mod config;
pub mod error;
pub mod notifications;
pub mod payload;
pub mod preferences;
pub mod provider;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use error::{ProviderError, ProviderResult};
pub use notifications::{ChangeEvent, ChangeNotifier};
pub use preferences::{PreferenceStore, SqlitePreferenceStore};
pub use provider::{ArtworkProvider, Cursor, QueryArgs, ResourceAddress, SqliteProviderStore};
