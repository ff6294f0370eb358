use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    storage::{
        source::{FileSource, Source, is_remote},
        table::Table,
    },
};

/// Loaded tables keyed by source identifier
///
/// The map and the most-recently-used identifier share one lock, so looking
/// up a table and reading or updating the recency pointer is a single step.
/// The lock is never held while loading, saving or waiting on a table.
pub struct TableCache<S: Source = FileSource> {
    source: S,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Arc<Table>>,
    /// Empty until the first table is loaded
    recent: String,
    closed: bool,
}

impl<S: Source> TableCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the table for `id`, loading it on first reference.
    ///
    /// An empty `id` means the most recently used table.
    pub fn resolve(&self, id: &str) -> Result<Arc<Table>> {
        let id = {
            let mut inner = self.inner.lock()?;
            if inner.closed {
                return Err(Error::Cancelled);
            }
            let id = match id {
                "" if inner.recent.is_empty() => {
                    return Err(Error::NotFound("no table has been loaded yet".into()));
                }
                "" => inner.recent.clone(),
                id => id.to_string(),
            };
            if let Some(table) = inner.tables.get(&id).cloned() {
                debug!(source = %id, "table cache hit");
                inner.recent = id;
                return Ok(table);
            }
            id
        };

        // Load outside the lock; a failed load leaves the cache untouched
        info!(source = %id, "loading table");
        let table = Arc::new(self.source.load(&id)?);

        let mut inner = self.inner.lock()?;
        if inner.closed {
            return Err(Error::Cancelled);
        }
        // A concurrent load of the same id may have won; keep the first one
        let table = inner.tables.entry(id.clone()).or_insert(table).clone();
        inner.recent = id;
        Ok(table)
    }

    /// The most recently used identifier, empty if nothing is loaded
    pub fn recent(&self) -> Result<String> {
        Ok(self.inner.lock()?.recent.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.lock()?.tables.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Writes the most recently used table back to its source and returns
    /// its identifier. Remote identifiers cannot be saved.
    pub fn save_recent(&self) -> Result<String> {
        let (id, table) = {
            let inner = self.inner.lock()?;
            if inner.recent.is_empty() {
                return Err(Error::Save("no table has been loaded to save".into()));
            }
            if is_remote(&inner.recent) {
                return Err(Error::Save(
                    "Saving CSV to an URL using POST is not implemented".into(),
                ));
            }
            let table = inner
                .tables
                .get(&inner.recent)
                .cloned()
                .ok_or(Error::Internal(format!("table {} missing", inner.recent)))?;
            (inner.recent.clone(), table)
        };
        self.source.save(&id, &table)?;
        Ok(id)
    }

    /// Closes every table: parked must-wait queries fail with `Cancelled`,
    /// and so does any later resolution
    pub fn close(&self) -> Result<()> {
        let tables: Vec<_> = {
            let mut inner = self.inner.lock()?;
            inner.closed = true;
            inner.tables.values().cloned().collect()
        };
        for table in tables {
            table.close()?;
        }
        Ok(())
    }
}
