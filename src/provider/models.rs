use serde::{Deserialize, Serialize};

use super::values::{ContentValues, Row};

pub mod source_columns {
    pub const ID: &str = "id";
    /// Opaque reference to the content producer. Required on insert.
    pub const COMPONENT_REF: &str = "component_ref";
    pub const IS_SELECTED: &str = "is_selected";
    pub const DESCRIPTION: &str = "description";
    pub const WANTS_NETWORK: &str = "wants_network";
    pub const SUPPORTS_NEXT_COMMAND: &str = "supports_next_command";
    /// Serialized command list, stored as given.
    pub const COMMANDS: &str = "commands";
}

pub mod artwork_columns {
    pub const ID: &str = "id";
    /// `component_ref` of the source that published the artwork. Required on insert.
    pub const SOURCE_REF: &str = "source_ref";
    pub const IMAGE_URI: &str = "image_uri";
    pub const TITLE: &str = "title";
    pub const BYLINE: &str = "byline";
    pub const ATTRIBUTION: &str = "attribution";
    pub const TOKEN: &str = "token";
    pub const VIEW_INTENT: &str = "view_intent";
    pub const META_FONT: &str = "meta_font";

    /// Identity of the single current artwork row.
    pub const CURRENT_ARTWORK_ID: i64 = 1;
}

/// A content producer configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub component_ref: String,
    pub is_selected: bool,
    pub description: Option<String>,
    pub wants_network: bool,
    pub supports_next_command: bool,
    pub commands: Option<String>,
}

impl Source {
    pub fn new(component_ref: impl Into<String>) -> Self {
        Self {
            component_ref: component_ref.into(),
            ..Default::default()
        }
    }

    /// Builds a source from a row holding every source column. Missing
    /// booleans read as `false`.
    pub fn from_row(row: &Row) -> Option<Self> {
        use source_columns::*;
        Some(Self {
            id: row.get_i64(ID)?,
            component_ref: row.get_text(COMPONENT_REF)?.to_string(),
            is_selected: row.get_bool(IS_SELECTED).unwrap_or(false),
            description: row.get_text(DESCRIPTION).map(str::to_string),
            wants_network: row.get_bool(WANTS_NETWORK).unwrap_or(false),
            supports_next_command: row.get_bool(SUPPORTS_NEXT_COMMAND).unwrap_or(false),
            commands: row.get_text(COMMANDS).map(str::to_string),
        })
    }

    /// Every writable field; the store-assigned `id` is left out.
    pub fn to_values(&self) -> ContentValues {
        use source_columns::*;
        ContentValues::new()
            .with(COMPONENT_REF, self.component_ref.as_str())
            .with(IS_SELECTED, self.is_selected)
            .with(DESCRIPTION, self.description.clone())
            .with(WANTS_NETWORK, self.wants_network)
            .with(SUPPORTS_NEXT_COMMAND, self.supports_next_command)
            .with(COMMANDS, self.commands.clone())
    }
}

/// The current artwork record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artwork {
    pub id: i64,
    pub source_ref: String,
    pub image_uri: Option<String>,
    pub title: Option<String>,
    pub byline: Option<String>,
    pub attribution: Option<String>,
    pub token: Option<String>,
    pub view_intent: Option<String>,
    pub meta_font: Option<String>,
}

impl Artwork {
    pub fn from_row(row: &Row) -> Option<Self> {
        use artwork_columns::*;
        let text = |column: &str| row.get_text(column).map(str::to_string);
        Some(Self {
            id: row.get_i64(ID)?,
            source_ref: row.get_text(SOURCE_REF)?.to_string(),
            image_uri: text(IMAGE_URI),
            title: text(TITLE),
            byline: text(BYLINE),
            attribution: text(ATTRIBUTION),
            token: text(TOKEN),
            view_intent: text(VIEW_INTENT),
            meta_font: text(META_FONT),
        })
    }

    pub fn to_values(&self) -> ContentValues {
        use artwork_columns::*;
        ContentValues::new()
            .with(SOURCE_REF, self.source_ref.as_str())
            .with(IMAGE_URI, self.image_uri.clone())
            .with(TITLE, self.title.clone())
            .with(BYLINE, self.byline.clone())
            .with(ATTRIBUTION, self.attribution.clone())
            .with(TOKEN, self.token.clone())
            .with(VIEW_INTENT, self.view_intent.clone())
            .with(META_FONT, self.meta_font.clone())
    }
}
