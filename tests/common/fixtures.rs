//! Provider fixtures backed by a temporary directory

use super::constants::*;
use artwork_provider::config::{AppConfig, CliConfig};
use artwork_provider::provider::{source_columns, ContentValues, Source};
use artwork_provider::{ArtworkProvider, ChangeEvent, QueryArgs, ResourceAddress};
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// A provider opened on fresh databases. The directory is removed on drop.
pub struct TestProvider {
    pub provider: ArtworkProvider,
    pub config: AppConfig,
    pub temp_dir: TempDir,
}

impl TestProvider {
    pub fn spawn() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cli = CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, None).expect("Failed to resolve config");
        let provider = ArtworkProvider::open(&config).expect("Failed to open provider");
        Self {
            provider,
            config,
            temp_dir,
        }
    }

    /// Opens a second provider on the same databases.
    #[allow(dead_code)]
    pub fn reopen(&self) -> ArtworkProvider {
        ArtworkProvider::open(&self.config).expect("Failed to reopen provider")
    }

    pub fn add_source(&self, component_ref: &str) -> ResourceAddress {
        self.provider
            .insert(
                "/sources",
                &ContentValues::new().with(source_columns::COMPONENT_REF, component_ref),
            )
            .expect("Failed to insert source")
    }

    #[allow(dead_code)]
    pub fn publish_artwork(&self, source_ref: &str, title: &str) -> ResourceAddress {
        self.provider
            .insert("/artwork", &artwork_values(source_ref, title))
            .expect("Failed to publish artwork")
    }

    pub fn query_sources(&self) -> Vec<Source> {
        self.provider
            .query("/sources", QueryArgs::new())
            .expect("Failed to query sources")
            .sources()
    }

    /// Writes an image file inside the temp dir and returns its path.
    #[allow(dead_code)]
    pub fn write_image(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, ARTWORK_IMAGE_BYTES).expect("Failed to write image");
        path
    }
}

#[allow(dead_code)]
pub fn artwork_values(source_ref: &str, title: &str) -> ContentValues {
    use artwork_provider::provider::artwork_columns;
    ContentValues::new()
        .with(artwork_columns::SOURCE_REF, source_ref)
        .with(artwork_columns::TITLE, title)
        .with(artwork_columns::BYLINE, ARTWORK_BYLINE)
}

pub fn drain_events(rx: &mut broadcast::Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
