//! Per-resource CRUD semantics on top of a SQLite connection.
//!
//! The dispatcher never owns the connection: the provider hands it either the
//! plain connection (immediate writes) or one inside an open batch
//! transaction, together with the [`ChangeSession`] that records the changes.

use std::sync::Arc;

use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::address::{Relation, ResourceAddress};
use super::filter::{checked_column, Filter, SortOrder};
use super::models::{artwork_columns, source_columns};
use super::schema::{ARTWORK_TABLE, SOURCES_TABLE};
use super::values::{ContentValues, FieldValue, Row};
use crate::error::{ProviderError, ProviderResult};
use crate::notifications::ChangeSession;
use crate::sqlite_persistence::Table;

/// Projection, filter and ordering of a read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryArgs {
    /// Columns to return; every column in schema order when `None`.
    pub projection: Option<Vec<String>>,
    pub filter: Filter,
    pub sort: Option<SortOrder>,
}

impl QueryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projection<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.projection = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Result of writing the singleton artwork row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Inserted,
}

pub(crate) fn table_for(relation: Relation) -> &'static Table {
    match relation {
        Relation::Artwork => &ARTWORK_TABLE,
        Relation::Sources => &SOURCES_TABLE,
    }
}

fn default_sort(relation: Relation) -> Option<SortOrder> {
    match relation {
        Relation::Artwork => None,
        Relation::Sources => Some(
            SortOrder::default()
                .desc(source_columns::IS_SELECTED)
                .asc(source_columns::ID),
        ),
    }
}

/// Narrows the caller's filter to the item an address is scoped to.
fn scoped_filter(address: &ResourceAddress, filter: Filter) -> Filter {
    match address.item_id() {
        Some(id) => Filter::eq(source_columns::ID, id).and(filter),
        None => filter,
    }
}

fn where_clause(filter: &Filter, table: &Table) -> ProviderResult<(String, Vec<FieldValue>)> {
    Ok(match filter.to_sql(table)? {
        Some((clause, params)) => (format!(" WHERE {}", clause), params),
        None => (String::new(), Vec::new()),
    })
}

/// Checks every written column exists and is caller-writable.
fn checked_write_columns(
    table: &Table,
    values: &ContentValues,
) -> ProviderResult<Vec<(&'static str, FieldValue)>> {
    values
        .iter()
        .map(|(column, value)| {
            let column = checked_column(table, column)?;
            if table.column(column).is_some_and(|c| c.is_primary_key) {
                return Err(ProviderError::InvalidColumn {
                    relation: table.name,
                    column: column.to_string(),
                });
            }
            Ok((column, value.clone()))
        })
        .collect()
}

pub(crate) struct Dispatcher<'c> {
    conn: &'c Connection,
}

impl<'c> Dispatcher<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn query(
        &self,
        address: &ResourceAddress,
        args: &QueryArgs,
    ) -> ProviderResult<(Arc<[String]>, Vec<Row>)> {
        let relation = address.relation();
        let table = table_for(relation);

        let columns: Vec<String> = match &args.projection {
            Some(projection) => projection
                .iter()
                .map(|c| checked_column(table, c).map(str::to_string))
                .collect::<ProviderResult<_>>()?,
            None => table.column_names().map(str::to_string).collect(),
        };
        let filter = scoped_filter(address, args.filter.clone());
        let (where_sql, params) = where_clause(&filter, table)?;
        let sort = match &args.sort {
            Some(sort) if !sort.is_empty() => Some(sort.clone()),
            _ => default_sort(relation),
        };
        let order_sql = match sort {
            Some(sort) => sort
                .to_sql(table)?
                .map(|order| format!(" ORDER BY {}", order))
                .unwrap_or_default(),
            None => String::new(),
        };

        let sql = format!(
            "SELECT {} FROM {}{}{}",
            columns.join(", "),
            table.name,
            where_sql,
            order_sql
        );
        debug!("Query {}: {}", address, sql);

        let columns: Arc<[String]> = columns.into();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(FieldValue::from))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            result.push(Row::new(columns.clone(), values));
        }
        Ok((columns, result))
    }

    pub(crate) fn insert(
        &self,
        session: &mut ChangeSession<'_>,
        address: &ResourceAddress,
        values: &ContentValues,
    ) -> ProviderResult<ResourceAddress> {
        match address {
            ResourceAddress::ArtworkCollection => {
                self.upsert_current_artwork(values)?;
                session.record_change(ResourceAddress::ArtworkCollection);
                Ok(ResourceAddress::ArtworkCollection)
            }
            ResourceAddress::SourcesCollection => self.insert_source(session, values),
            ResourceAddress::SourceItem(_) => Err(ProviderError::UnsupportedOperation(format!(
                "Inserts are not supported on {}",
                address
            ))),
        }
    }

    /// Writes the current artwork row: updates identity 1 if it exists,
    /// inserts it otherwise.
    pub(crate) fn upsert_current_artwork(
        &self,
        values: &ContentValues,
    ) -> ProviderResult<UpsertOutcome> {
        let address = ResourceAddress::ArtworkCollection;
        if !values.contains_key(artwork_columns::SOURCE_REF) {
            return Err(ProviderError::MissingRequiredField {
                field: artwork_columns::SOURCE_REF,
            });
        }
        let columns = checked_write_columns(&ARTWORK_TABLE, values)?;

        let assignments = columns
            .iter()
            .map(|(c, _)| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<FieldValue> = columns.iter().map(|(_, v)| v.clone()).collect();
        params.push(FieldValue::Integer(artwork_columns::CURRENT_ARTWORK_ID));
        let updated = self
            .conn
            .execute(
                &format!(
                    "UPDATE {} SET {} WHERE {} = ?",
                    ARTWORK_TABLE.name,
                    assignments,
                    artwork_columns::ID
                ),
                params_from_iter(params.iter()),
            )
            .map_err(|e| ProviderError::from_write(address, e))?;
        if updated == 1 {
            debug!("Updated current artwork");
            return Ok(UpsertOutcome::Updated);
        }

        let mut names = vec![artwork_columns::ID];
        names.extend(columns.iter().map(|(c, _)| *c));
        let mut params = vec![FieldValue::Integer(artwork_columns::CURRENT_ARTWORK_ID)];
        params.extend(columns.into_iter().map(|(_, v)| v));
        let placeholders = vec!["?"; names.len()].join(", ");
        let inserted = self
            .conn
            .execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    ARTWORK_TABLE.name,
                    names.join(", "),
                    placeholders
                ),
                params_from_iter(params.iter()),
            )
            .map_err(|e| ProviderError::from_write(address, e))?;
        if inserted != 1 {
            return Err(ProviderError::write_failure(address, "no row was inserted"));
        }
        debug!("Inserted current artwork");
        Ok(UpsertOutcome::Inserted)
    }

    fn insert_source(
        &self,
        session: &mut ChangeSession<'_>,
        values: &ContentValues,
    ) -> ProviderResult<ResourceAddress> {
        let address = ResourceAddress::SourcesCollection;
        if !values.contains_key(source_columns::COMPONENT_REF) {
            return Err(ProviderError::MissingRequiredField {
                field: source_columns::COMPONENT_REF,
            });
        }
        let columns = checked_write_columns(&SOURCES_TABLE, values)?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    SOURCES_TABLE.name,
                    columns.iter().map(|(c, _)| *c).collect::<Vec<_>>().join(", "),
                    placeholders
                ),
                params_from_iter(columns.iter().map(|(_, v)| v)),
            )
            .map_err(|e| ProviderError::from_write(address, e))?;

        let row_id = self.conn.last_insert_rowid();
        if row_id <= 0 {
            return Err(ProviderError::write_failure(address, "no row id was produced"));
        }
        let source_address = ResourceAddress::SourceItem(row_id);
        debug!("Inserted source {}", source_address);
        session.record_change(source_address);
        Ok(source_address)
    }

    pub(crate) fn update(
        &self,
        session: &mut ChangeSession<'_>,
        address: &ResourceAddress,
        values: &ContentValues,
        filter: &Filter,
    ) -> ProviderResult<usize> {
        if address.relation() == Relation::Artwork {
            return Err(ProviderError::UnsupportedOperation(
                "Updates are not allowed on artwork: insert does an insert or update".to_string(),
            ));
        }
        let columns = checked_write_columns(&SOURCES_TABLE, values)?;
        if columns.is_empty() {
            return Ok(0);
        }

        let filter = scoped_filter(address, filter.clone());
        let (where_sql, filter_params) = where_clause(&filter, &SOURCES_TABLE)?;
        let assignments = columns
            .iter()
            .map(|(c, _)| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<FieldValue> = columns.into_iter().map(|(_, v)| v).collect();
        params.extend(filter_params);

        let count = self
            .conn
            .execute(
                &format!(
                    "UPDATE {} SET {}{}",
                    SOURCES_TABLE.name, assignments, where_sql
                ),
                params_from_iter(params.iter()),
            )
            .map_err(|e| ProviderError::from_write(address, e))?;

        if count > 0 {
            session.record_change(*address);
            return Ok(count);
        }
        if values.contains_key(source_columns::COMPONENT_REF) {
            // Updating a missing source with a component_ref inserts it instead.
            // Callers rely on this; a mistyped identity also ends up here.
            debug!("Update of {} matched nothing, inserting instead", address);
            self.insert_source(session, values)?;
            return Ok(1);
        }
        Ok(0)
    }

    pub(crate) fn delete(
        &self,
        session: &mut ChangeSession<'_>,
        address: &ResourceAddress,
        filter: &Filter,
    ) -> ProviderResult<usize> {
        if address.relation() == Relation::Artwork {
            return Err(ProviderError::UnsupportedOperation(
                "Deletes are not supported on artwork".to_string(),
            ));
        }
        let filter = scoped_filter(address, filter.clone());
        let (where_sql, params) = where_clause(&filter, &SOURCES_TABLE)?;
        let count = self.conn.execute(
            &format!("DELETE FROM {}{}", SOURCES_TABLE.name, where_sql),
            params_from_iter(params.iter()),
        )?;
        debug!("Deleted {} rows at {}", count, address);
        if count > 0 {
            session.record_change(*address);
        }
        Ok(count)
    }
}
