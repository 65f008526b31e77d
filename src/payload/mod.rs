//! Access to the image file backing the current artwork.
//!
//! The location of that file is not part of the artwork row: whoever
//! downloads the image records its path in the preference store, and readers
//! open it through [`PayloadGate::open_current_artwork_payload`].

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::preferences::PreferenceStore;
use crate::provider::ResourceAddress;

pub const CURRENT_ARTWORK_LOCATION_KEY: &str = "current_artwork_location";

const READ_MODE: &str = "r";

#[derive(Clone)]
pub struct PayloadGate {
    preferences: Arc<dyn PreferenceStore>,
}

impl PayloadGate {
    pub fn new(preferences: Arc<dyn PreferenceStore>) -> Self {
        Self { preferences }
    }

    /// Opens the current artwork image read-only.
    ///
    /// Only the artwork address can be opened, and only in mode `"r"`.
    pub fn open_current_artwork_payload(&self, address: &str, mode: &str) -> ProviderResult<File> {
        if ResourceAddress::parse(address)? != ResourceAddress::ArtworkCollection {
            return Err(ProviderError::UnrecognizedAddress(address.to_string()));
        }
        if mode != READ_MODE {
            return Err(ProviderError::UnsupportedMode(mode.to_string()));
        }

        let location = self
            .preferences
            .get_string(CURRENT_ARTWORK_LOCATION_KEY)
            .map_err(ProviderError::Preferences)?
            .ok_or_else(|| ProviderError::NotFound("No artwork image is set".to_string()))?;
        let path = PathBuf::from(location);
        if !path.exists() {
            return Err(ProviderError::NotFound(format!(
                "File {} does not exist",
                path.display()
            )));
        }

        debug!("Opening artwork payload {:?}", path);
        File::open(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => {
                ProviderError::NotFound(format!("File {} does not exist", path.display()))
            }
            _ => ProviderError::Io(err),
        })
    }

    /// Records where the current artwork image lives. Returns false, without
    /// touching the stored location, when the file is missing or the location
    /// cannot be stored.
    pub fn record_current_artwork_payload_location(&self, path: &Path) -> bool {
        if !path.exists() {
            warn!("Artwork payload {:?} does not exist", path);
            return false;
        }
        let absolute = match path.canonicalize() {
            Ok(absolute) => absolute,
            Err(err) => {
                warn!("Failed to resolve artwork payload {:?}: {}", path, err);
                return false;
            }
        };
        let Some(location) = absolute.to_str() else {
            warn!("Artwork payload path {:?} is not valid UTF-8", absolute);
            return false;
        };
        match self
            .preferences
            .set_string(CURRENT_ARTWORK_LOCATION_KEY, location)
        {
            Ok(()) => {
                debug!("Current artwork payload is now {}", location);
                true
            }
            Err(err) => {
                warn!("Failed to store artwork payload location: {:#}", err);
                false
            }
        }
    }
}
