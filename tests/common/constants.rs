//! Shared constants for end-to-end tests

// ============================================================================
// Sources
// ============================================================================

pub const FEATURED_SOURCE: &str = "com.example.art/.FeaturedArtSource";

pub const GALLERY_SOURCE: &str = "com.example.gallery/.GallerySource";

pub const PHOTOS_SOURCE: &str = "com.example.photos/.PhotosSource";

// ============================================================================
// Artwork
// ============================================================================

pub const ARTWORK_TITLE: &str = "The Starry Night";

pub const ARTWORK_BYLINE: &str = "Vincent van Gogh, 1889";

pub const ARTWORK_IMAGE_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0 not really a jpeg";
