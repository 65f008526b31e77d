//! SQLite schema definitions for the provider database.
//!
//! Version 1 only held the artwork table. Version 2 added sources. Version 3
//! ties artwork rows to their source: deleting the last source with a given
//! `component_ref` deletes the artwork published by it. Reaching version 3
//! drops and recreates the artwork table (the current artwork is lost and is
//! re-published by its source).
//!
//! `component_ref` is unique by convention only, so the cascade is a trigger
//! rather than a foreign key.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, Trigger, VersionedSchema};

use super::models::{artwork_columns as art, source_columns as src};

// =============================================================================
// Version 1 - Artwork
// =============================================================================

pub const ARTWORK_TABLE: Table = Table {
    name: "artwork",
    columns: &[
        sqlite_column!(art::ID, &SqlType::Integer, is_primary_key = true, auto_increment = true),
        sqlite_column!(art::SOURCE_REF, &SqlType::Text),
        sqlite_column!(art::IMAGE_URI, &SqlType::Text),
        sqlite_column!(art::TITLE, &SqlType::Text),
        sqlite_column!(art::BYLINE, &SqlType::Text),
        sqlite_column!(art::ATTRIBUTION, &SqlType::Text),
        sqlite_column!(art::TOKEN, &SqlType::Text),
        sqlite_column!(art::META_FONT, &SqlType::Text),
        sqlite_column!(art::VIEW_INTENT, &SqlType::Text),
    ],
    indices: &[],
    triggers: &[],
};

// =============================================================================
// Version 2 - Sources
// =============================================================================

const SOURCES_COLUMNS: &[Column<'static, &'static str>] = &[
    sqlite_column!(src::ID, &SqlType::Integer, is_primary_key = true, auto_increment = true),
    sqlite_column!(src::COMPONENT_REF, &SqlType::Text),
    sqlite_column!(src::IS_SELECTED, &SqlType::Integer),
    sqlite_column!(src::DESCRIPTION, &SqlType::Text),
    sqlite_column!(src::WANTS_NETWORK, &SqlType::Integer),
    sqlite_column!(src::SUPPORTS_NEXT_COMMAND, &SqlType::Integer),
    sqlite_column!(src::COMMANDS, &SqlType::Text),
];

const SOURCES_TABLE_V2: Table = Table {
    name: "sources",
    columns: SOURCES_COLUMNS,
    indices: &[],
    triggers: &[],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    SOURCES_TABLE_V2.create(conn)
}

// =============================================================================
// Version 3 - Deleting a source deletes its artwork
// =============================================================================

/// Artwork goes away once no source row carries its `source_ref` any more.
const SOURCE_DELETE_CASCADE: Trigger = Trigger {
    name: "sources_delete_artwork",
    timing: "AFTER DELETE",
    body: "DELETE FROM artwork WHERE source_ref = OLD.component_ref \
           AND NOT EXISTS (SELECT 1 FROM sources WHERE component_ref = OLD.component_ref);",
};

pub const SOURCES_TABLE: Table = Table {
    name: "sources",
    columns: SOURCES_COLUMNS,
    indices: &[],
    triggers: &[SOURCE_DELETE_CASCADE],
};

/// Version at which deleting a source started deleting its artwork. Any
/// older database loses its artwork table on upgrade.
pub const CASCADE_VERSION: usize = 3;

fn migrate_v2_to_v3(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute("DROP TABLE IF EXISTS artwork", [])?;
    ARTWORK_TABLE.create(conn)?;
    SOURCES_TABLE.create_triggers(conn)
}

// =============================================================================
// Versioned Schema Definition
// =============================================================================

pub const PROVIDER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[ARTWORK_TABLE],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[ARTWORK_TABLE, SOURCES_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
    VersionedSchema {
        version: CASCADE_VERSION,
        tables: &[ARTWORK_TABLE, SOURCES_TABLE],
        migration: Some(migrate_v2_to_v3),
    },
];
