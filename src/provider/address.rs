//! Resource addresses and the content kinds they resolve to.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProviderError, ProviderResult};

pub const ARTWORK_PATH: &str = "artwork";
pub const SOURCES_PATH: &str = "sources";

/// Backing relation of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Artwork,
    Sources,
}

impl Relation {
    pub fn table_name(&self) -> &'static str {
        match self {
            Relation::Artwork => ARTWORK_PATH,
            Relation::Sources => SOURCES_PATH,
        }
    }
}

/// A resolved resource address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceAddress {
    ArtworkCollection,
    SourcesCollection,
    SourceItem(i64),
}

impl ResourceAddress {
    /// Resolves a collection-relative address such as `/sources/12`.
    ///
    /// Empty path segments are ignored, so `/sources/` and `sources` resolve
    /// the same as `/sources`.
    pub fn parse(address: &str) -> ProviderResult<Self> {
        let segments: Vec<&str> = address.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [ARTWORK_PATH] => Ok(ResourceAddress::ArtworkCollection),
            [SOURCES_PATH] => Ok(ResourceAddress::SourcesCollection),
            [SOURCES_PATH, id] if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => id
                .parse::<i64>()
                .map(ResourceAddress::SourceItem)
                .map_err(|_| ProviderError::UnrecognizedAddress(address.to_string())),
            _ => Err(ProviderError::UnrecognizedAddress(address.to_string())),
        }
    }

    pub fn relation(&self) -> Relation {
        match self {
            ResourceAddress::ArtworkCollection => Relation::Artwork,
            ResourceAddress::SourcesCollection | ResourceAddress::SourceItem(_) => {
                Relation::Sources
            }
        }
    }

    /// Identity the address is scoped to, if it names a single item.
    pub fn item_id(&self) -> Option<i64> {
        match self {
            ResourceAddress::SourceItem(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether an observer registered on `self` is told about a change at `other`.
    ///
    /// Holds in both directions between the sources collection and its items:
    /// a write recorded at `/sources` may have touched any item.
    pub fn covers(&self, other: &ResourceAddress) -> bool {
        match (self, other) {
            (ResourceAddress::SourcesCollection, ResourceAddress::SourceItem(_))
            | (ResourceAddress::SourceItem(_), ResourceAddress::SourcesCollection) => true,
            _ => self == other,
        }
    }

    pub fn content_kind(&self) -> ContentKind {
        match self {
            ResourceAddress::ArtworkCollection => ContentKind::ArtworkDir,
            ResourceAddress::SourcesCollection => ContentKind::SourceDir,
            ResourceAddress::SourceItem(_) => ContentKind::SourceItem,
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAddress::ArtworkCollection => write!(f, "/{}", ARTWORK_PATH),
            ResourceAddress::SourcesCollection => write!(f, "/{}", SOURCES_PATH),
            ResourceAddress::SourceItem(id) => write!(f, "/{}/{}", SOURCES_PATH, id),
        }
    }
}

impl std::str::FromStr for ResourceAddress {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceAddress::parse(s)
    }
}

impl Serialize for ResourceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ResourceAddress::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Content-kind label returned by kind lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    ArtworkDir,
    SourceDir,
    SourceItem,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::ArtworkDir => "vnd.artwork-provider.dir/artwork",
            ContentKind::SourceDir => "vnd.artwork-provider.dir/source",
            ContentKind::SourceItem => "vnd.artwork-provider.item/source",
        }
    }

    pub fn is_single_row(&self) -> bool {
        matches!(self, ContentKind::SourceItem)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_addresses() {
        assert_eq!(
            ResourceAddress::parse("/artwork").unwrap(),
            ResourceAddress::ArtworkCollection
        );
        assert_eq!(
            ResourceAddress::parse("/sources").unwrap(),
            ResourceAddress::SourcesCollection
        );
        assert_eq!(
            ResourceAddress::parse("/sources/42").unwrap(),
            ResourceAddress::SourceItem(42)
        );
        assert_eq!(
            ResourceAddress::parse("sources/").unwrap(),
            ResourceAddress::SourcesCollection
        );
    }

    #[test]
    fn test_parse_rejects_unknown_addresses() {
        for address in [
            "",
            "/",
            "/artwork/1",
            "/sources/abc",
            "/sources/-1",
            "/sources/1/extra",
            "/sources/99999999999999999999",
            "/users",
        ] {
            assert!(
                matches!(
                    ResourceAddress::parse(address),
                    Err(ProviderError::UnrecognizedAddress(_))
                ),
                "{address} should not resolve"
            );
        }
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(ResourceAddress::ArtworkCollection.to_string(), "/artwork");
        assert_eq!(ResourceAddress::SourcesCollection.to_string(), "/sources");
        assert_eq!(ResourceAddress::SourceItem(3).to_string(), "/sources/3");
    }

    #[test]
    fn test_covers() {
        let item = ResourceAddress::SourceItem(1);
        assert!(ResourceAddress::SourcesCollection.covers(&item));
        assert!(item.covers(&item));
        assert!(!item.covers(&ResourceAddress::SourceItem(2)));
        assert!(item.covers(&ResourceAddress::SourcesCollection));
        assert!(!ResourceAddress::ArtworkCollection.covers(&item));
    }

    #[test]
    fn test_content_kinds() {
        assert_eq!(
            ResourceAddress::ArtworkCollection.content_kind().as_str(),
            "vnd.artwork-provider.dir/artwork"
        );
        assert!(!ResourceAddress::SourcesCollection
            .content_kind()
            .is_single_row());
        assert!(ResourceAddress::SourceItem(9).content_kind().is_single_row());
    }

    #[test]
    fn test_serde_uses_path_form() {
        let json = serde_json::to_string(&ResourceAddress::SourceItem(5)).unwrap();
        assert_eq!(json, "\"/sources/5\"");
        let back: ResourceAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ResourceAddress::SourceItem(5));
        assert!(serde_json::from_str::<ResourceAddress>("\"/nope\"").is_err());
    }
}
