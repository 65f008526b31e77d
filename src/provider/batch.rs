//! Atomic multi-operation writes.

use std::sync::MutexGuard;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::address::ResourceAddress;
use super::dispatcher::{Dispatcher, QueryArgs};
use super::filter::Filter;
use super::values::{ContentValues, Row};
use crate::error::ProviderResult;
use crate::notifications::{ChangeNotifier, ChangeSession};

/// One write inside a batch, addressed the same way as the single-shot calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProviderOperation {
    Insert {
        address: String,
        values: ContentValues,
    },
    Update {
        address: String,
        values: ContentValues,
        #[serde(default)]
        filter: Filter,
    },
    Delete {
        address: String,
        #[serde(default)]
        filter: Filter,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OperationResult {
    Inserted { address: ResourceAddress },
    Affected { count: usize },
}

/// An open write transaction.
///
/// Holds the provider connection for its whole lifetime, so calling the
/// provider's own read or write methods from the thread that owns a batch
/// blocks forever; go through the batch instead. Changes are reported only by
/// [`Batch::commit`]. Dropping an uncommitted batch rolls it back and the
/// buffered changes are never reported.
pub struct Batch<'p> {
    conn: MutexGuard<'p, Connection>,
    session: ChangeSession<'p>,
    finished: bool,
}

impl<'p> Batch<'p> {
    pub(crate) fn begin(
        conn: MutexGuard<'p, Connection>,
        notifier: &'p ChangeNotifier,
    ) -> ProviderResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let mut session = ChangeSession::new(notifier);
        session.begin_batch();
        debug!("Batch started");
        Ok(Self {
            conn,
            session,
            finished: false,
        })
    }

    pub fn insert(
        &mut self,
        address: &str,
        values: &ContentValues,
    ) -> ProviderResult<ResourceAddress> {
        let address = ResourceAddress::parse(address)?;
        Dispatcher::new(&self.conn).insert(&mut self.session, &address, values)
    }

    pub fn update(
        &mut self,
        address: &str,
        values: &ContentValues,
        filter: &Filter,
    ) -> ProviderResult<usize> {
        let address = ResourceAddress::parse(address)?;
        Dispatcher::new(&self.conn).update(&mut self.session, &address, values, filter)
    }

    pub fn delete(&mut self, address: &str, filter: &Filter) -> ProviderResult<usize> {
        let address = ResourceAddress::parse(address)?;
        Dispatcher::new(&self.conn).delete(&mut self.session, &address, filter)
    }

    /// Reads inside the transaction, seeing its uncommitted writes.
    pub fn query(&self, address: &str, args: &QueryArgs) -> ProviderResult<Vec<Row>> {
        let address = ResourceAddress::parse(address)?;
        let (_, rows) = Dispatcher::new(&self.conn).query(&address, args)?;
        Ok(rows)
    }

    pub fn apply(&mut self, operation: &ProviderOperation) -> ProviderResult<OperationResult> {
        Ok(match operation {
            ProviderOperation::Insert { address, values } => OperationResult::Inserted {
                address: self.insert(address, values)?,
            },
            ProviderOperation::Update {
                address,
                values,
                filter,
            } => OperationResult::Affected {
                count: self.update(address, values, filter)?,
            },
            ProviderOperation::Delete { address, filter } => OperationResult::Affected {
                count: self.delete(address, filter)?,
            },
        })
    }

    /// Addresses changed so far, in first-change order.
    pub fn pending_changes(&self) -> &[ResourceAddress] {
        self.session.pending()
    }

    /// Commits and then reports the coalesced changes. Returns how many
    /// distinct addresses were reported.
    pub fn commit(mut self) -> ProviderResult<usize> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        let flushed = self.session.end_batch();
        debug!("Batch committed with {} changed addresses", flushed);
        Ok(flushed)
    }

    pub fn rollback(mut self) -> ProviderResult<()> {
        self.finished = true;
        self.session.discard();
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.session.discard();
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            warn!("Failed to roll back batch: {}", err);
        }
    }
}
