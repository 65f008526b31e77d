//! Small persistent key/value store for provider settings.

mod schema;
mod sqlite_preference_store;

pub use schema::PREFERENCES_VERSIONED_SCHEMAS;
pub use sqlite_preference_store::SqlitePreferenceStore;

use anyhow::Result;

pub trait PreferenceStore: Send + Sync {
    fn get_string(&self, key: &str) -> Result<Option<String>>;
    fn set_string(&self, key: &str, value: &str) -> Result<()>;
    /// Returns whether the key was present.
    fn remove(&self, key: &str) -> Result<bool>;
}
