//! Artwork provider: a string-addressed CRUD surface over the artwork and
//! sources relations, with change notification.

mod address;
mod batch;
mod dispatcher;
mod filter;
mod models;
mod schema;
mod store;
mod values;

pub use address::{ContentKind, Relation, ResourceAddress, ARTWORK_PATH, SOURCES_PATH};
pub use batch::{Batch, OperationResult, ProviderOperation};
pub use dispatcher::{QueryArgs, UpsertOutcome};
pub use filter::{CompareOp, Filter, SortKey, SortOrder};
pub use models::{artwork_columns, source_columns, Artwork, Source};
pub use schema::{ARTWORK_TABLE, CASCADE_VERSION, PROVIDER_VERSIONED_SCHEMAS, SOURCES_TABLE};
pub use store::SqliteProviderStore;
pub use values::{ContentValues, FieldValue, Row};

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::AppConfig;
use crate::error::ProviderResult;
use crate::notifications::{ChangeEvent, ChangeNotifier, ChangeSession, ContentWatcher};
use crate::payload::PayloadGate;
use crate::preferences::{PreferenceStore, SqlitePreferenceStore};
use crate::sqlite_persistence::Table;
use dispatcher::Dispatcher;

/// Table definition backing a relation.
pub fn table_for(relation: Relation) -> &'static Table {
    dispatcher::table_for(relation)
}

#[derive(Clone)]
pub struct ArtworkProvider {
    store: SqliteProviderStore,
    notifier: Arc<ChangeNotifier>,
    payload: PayloadGate,
}

impl ArtworkProvider {
    pub fn new(
        store: SqliteProviderStore,
        notifier: Arc<ChangeNotifier>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            store,
            notifier,
            payload: PayloadGate::new(preferences),
        }
    }

    /// Opens both databases under the configured directory.
    pub fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let store = SqliteProviderStore::open(config.provider_db_path())
            .context("Failed to open provider store")?;
        let preferences = SqlitePreferenceStore::open(config.preferences_db_path())
            .context("Failed to open preference store")?;
        info!("Artwork provider ready in {:?}", config.db_dir);
        Ok(Self::new(
            store,
            Arc::new(ChangeNotifier::new(config.notification_capacity)),
            Arc::new(preferences),
        ))
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Receives every change event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    pub fn watch(&self, address: &str) -> ProviderResult<ContentWatcher> {
        Ok(self.notifier.watch(ResourceAddress::parse(address)?))
    }

    pub fn get_type(&self, address: &str) -> ProviderResult<ContentKind> {
        Ok(ResourceAddress::parse(address)?.content_kind())
    }

    /// Reads rows at `address`. The returned cursor is told about later changes
    /// covering that address.
    pub fn query(&self, address: &str, args: QueryArgs) -> ProviderResult<Cursor> {
        let address = ResourceAddress::parse(address)?;
        // Subscribe first so a write landing right after the read is not missed
        let watcher = self.notifier.watch(address);
        let (columns, rows) = {
            let conn = self.store.lock()?;
            Dispatcher::new(&conn).query(&address, &args)?
        };
        Ok(Cursor {
            address,
            args,
            columns,
            rows,
            store: self.store.clone(),
            watcher,
        })
    }

    pub fn insert(&self, address: &str, values: &ContentValues) -> ProviderResult<ResourceAddress> {
        let address = ResourceAddress::parse(address)?;
        let conn = self.store.lock()?;
        let mut session = ChangeSession::new(&self.notifier);
        Dispatcher::new(&conn).insert(&mut session, &address, values)
    }

    pub fn update(
        &self,
        address: &str,
        values: &ContentValues,
        filter: &Filter,
    ) -> ProviderResult<usize> {
        let address = ResourceAddress::parse(address)?;
        let conn = self.store.lock()?;
        let mut session = ChangeSession::new(&self.notifier);
        Dispatcher::new(&conn).update(&mut session, &address, values, filter)
    }

    pub fn delete(&self, address: &str, filter: &Filter) -> ProviderResult<usize> {
        let address = ResourceAddress::parse(address)?;
        let conn = self.store.lock()?;
        let mut session = ChangeSession::new(&self.notifier);
        Dispatcher::new(&conn).delete(&mut session, &address, filter)
    }

    /// Starts an atomic batch. See [`Batch`] for the locking rules.
    pub fn begin_batch(&self) -> ProviderResult<Batch<'_>> {
        Batch::begin(self.store.lock()?, &self.notifier)
    }

    /// Applies every operation in one transaction. The first failure rolls the
    /// whole list back and nothing is reported to observers.
    pub fn apply_batch(
        &self,
        operations: &[ProviderOperation],
    ) -> ProviderResult<Vec<OperationResult>> {
        let mut batch = self.begin_batch()?;
        let results = operations
            .iter()
            .map(|operation| batch.apply(operation))
            .collect::<ProviderResult<Vec<_>>>()?;
        batch.commit()?;
        Ok(results)
    }

    pub fn open_current_artwork_payload(&self, address: &str, mode: &str) -> ProviderResult<File> {
        self.payload.open_current_artwork_payload(address, mode)
    }

    pub fn record_current_artwork_payload_location(&self, path: &Path) -> bool {
        self.payload.record_current_artwork_payload_location(path)
    }
}

/// Materialized query result that stays subscribed to changes of its address.
///
/// Iteration can be restarted any number of times; [`Cursor::requery`] reruns
/// the original query against the current store.
pub struct Cursor {
    address: ResourceAddress,
    args: QueryArgs,
    columns: Arc<[String]>,
    rows: Vec<Row>,
    store: SqliteProviderStore,
    watcher: ContentWatcher,
}

impl Cursor {
    pub fn address(&self) -> ResourceAddress {
        self.address
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows read as sources; rows missing the identity or component columns
    /// are skipped.
    pub fn sources(&self) -> Vec<Source> {
        self.rows.iter().filter_map(Source::from_row).collect()
    }

    pub fn artwork(&self) -> Vec<Artwork> {
        self.rows.iter().filter_map(Artwork::from_row).collect()
    }

    /// Whether a change covering this cursor's address happened since the
    /// last check.
    pub fn has_changed(&mut self) -> bool {
        self.watcher.poll_changed()
    }

    pub fn watcher_mut(&mut self) -> &mut ContentWatcher {
        &mut self.watcher
    }

    pub fn requery(&mut self) -> ProviderResult<()> {
        self.watcher.poll_changed();
        let conn = self.store.lock()?;
        let (columns, rows) = Dispatcher::new(&conn).query(&self.address, &self.args)?;
        self.columns = columns;
        self.rows = rows;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Cursor {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    fn create_provider() -> ArtworkProvider {
        ArtworkProvider::new(
            SqliteProviderStore::open_in_memory().unwrap(),
            Arc::new(ChangeNotifier::default()),
            Arc::new(SqlitePreferenceStore::open_in_memory().unwrap()),
        )
    }

    fn source(component_ref: &str) -> ContentValues {
        ContentValues::new().with(source_columns::COMPONENT_REF, component_ref)
    }

    #[test]
    fn test_unknown_address_is_rejected_everywhere() {
        let provider = create_provider();
        let values = source("com.example/.Featured");
        for result in [
            provider.query("/users", QueryArgs::new()).map(|_| ()),
            provider.insert("/users", &values).map(|_| ()),
            provider.update("/users", &values, &Filter::All).map(|_| ()),
            provider.delete("/users", &Filter::All).map(|_| ()),
            provider.get_type("/users").map(|_| ()),
            provider.open_current_artwork_payload("/users", "r").map(|_| ()),
        ] {
            assert!(matches!(result, Err(ProviderError::UnrecognizedAddress(_))));
        }
    }

    #[test]
    fn test_default_source_order_puts_selected_first() {
        let provider = create_provider();
        provider.insert("/sources", &source("a")).unwrap();
        provider
            .insert("/sources", &source("b").with(source_columns::IS_SELECTED, true))
            .unwrap();
        provider.insert("/sources", &source("c")).unwrap();

        let cursor = provider.query("/sources", QueryArgs::new()).unwrap();
        let refs: Vec<String> = cursor.sources().into_iter().map(|s| s.component_ref).collect();
        assert_eq!(refs, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_projection_limits_columns() {
        let provider = create_provider();
        provider.insert("/sources", &source("a")).unwrap();
        let cursor = provider
            .query(
                "/sources",
                QueryArgs::new().projection([source_columns::COMPONENT_REF]),
            )
            .unwrap();
        assert_eq!(cursor.columns(), &[source_columns::COMPONENT_REF.to_string()]);
        assert_eq!(cursor.rows()[0].get_text(source_columns::COMPONENT_REF), Some("a"));
    }

    #[test]
    fn test_unknown_projection_column_is_rejected() {
        let provider = create_provider();
        assert!(matches!(
            provider.query("/sources", QueryArgs::new().projection(["password"])),
            Err(ProviderError::InvalidColumn { .. })
        ));
    }

    #[test]
    fn test_writing_id_is_rejected() {
        let provider = create_provider();
        let values = source("a").with(source_columns::ID, 7);
        assert!(matches!(
            provider.insert("/sources", &values),
            Err(ProviderError::InvalidColumn { .. })
        ));
    }

    #[test]
    fn test_insert_on_item_is_unsupported() {
        let provider = create_provider();
        assert!(matches!(
            provider.insert("/sources/1", &source("a")),
            Err(ProviderError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_duplicate_component_ref_is_accepted() {
        let provider = create_provider();
        let first = provider.insert("/sources", &source("a")).unwrap();
        let second = provider.insert("/sources", &source("a")).unwrap();
        assert_ne!(first, second);

        let cursor = provider.query("/sources", QueryArgs::new()).unwrap();
        assert_eq!(cursor.len(), 2);
    }

    #[test]
    fn test_empty_update_touches_nothing() {
        let provider = create_provider();
        provider.insert("/sources", &source("a")).unwrap();
        let mut rx = provider.subscribe();
        assert_eq!(
            provider
                .update("/sources", &ContentValues::new(), &Filter::All)
                .unwrap(),
            0
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cursor_requery_sees_new_rows() {
        let provider = create_provider();
        let mut cursor = provider.query("/sources", QueryArgs::new()).unwrap();
        assert!(cursor.is_empty());

        provider.insert("/sources", &source("a")).unwrap();
        assert!(cursor.has_changed());
        assert_eq!(cursor.len(), 0);

        cursor.requery().unwrap();
        assert_eq!(cursor.len(), 1);
        assert!(!cursor.has_changed());
        assert_eq!(cursor.iter().count(), cursor.iter().count());
    }

    #[test]
    fn test_item_cursor_ignores_other_items() {
        let provider = create_provider();
        let first = provider.insert("/sources", &source("a")).unwrap();
        let mut cursor = provider.query(&first.to_string(), QueryArgs::new()).unwrap();
        assert_eq!(cursor.len(), 1);

        provider.insert("/sources", &source("b")).unwrap();
        assert!(!cursor.has_changed());

        provider.delete("/sources/99", &Filter::All).unwrap();
        assert!(!cursor.has_changed());

        provider
            .update(
                &first.to_string(),
                &ContentValues::new().with(source_columns::DESCRIPTION, "Daily art"),
                &Filter::All,
            )
            .unwrap();
        assert!(cursor.has_changed());
    }

    #[test]
    fn test_get_type() {
        let provider = create_provider();
        assert_eq!(provider.get_type("/sources/3").unwrap(), ContentKind::SourceItem);
        assert_eq!(provider.get_type("/sources").unwrap(), ContentKind::SourceDir);
        assert_eq!(provider.get_type("/artwork").unwrap(), ContentKind::ArtworkDir);
    }
}
