use std::sync::Arc;

use tracing::debug;

use crate::{
    error::Result,
    sql::{
        executor::{Delete, Executor, Insert, ResultSet, Select, Update},
        parser::Parser,
        types::Filter,
    },
    storage::{
        cache::TableCache,
        source::{FileSource, Source},
        table::Table,
    },
};

/// Executes statements against tables obtained from a shared `TableCache`
pub struct QueryEngine<S: Source = FileSource> {
    cache: Arc<TableCache<S>>,
}

impl<S: Source> Clone for QueryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<S: Source> QueryEngine<S> {
    pub fn new(cache: Arc<TableCache<S>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<TableCache<S>> {
        &self.cache
    }

    /// Parses and executes one statement.
    ///
    /// Blocks while a WAIT query has nothing to act on.
    pub fn execute(&self, sql: &str) -> Result<ResultSet> {
        let stmt = Parser::new(sql).parse()?;
        debug!(?stmt, "executing");
        let Some(source) = stmt.source() else {
            return self.save();
        };
        let table = self.cache.resolve(source)?;
        <dyn Executor>::build(stmt, &table)?.execute(&table)
    }

    /// Rows matching `filter` (all rows when None), projected to `columns`
    /// (`*` for all). With `wait`, blocks until at least one row matches.
    pub fn select(
        &self,
        table: &Table,
        wait: bool,
        columns: &[String],
        filter: Option<Filter>,
    ) -> Result<ResultSet> {
        Select::new(table, columns, filter, wait)?.execute(table)
    }

    /// Sets `columns` to `values` in every row matching `filter`. With `wait`,
    /// blocks until at least one row matches.
    pub fn update(
        &self,
        table: &Table,
        wait: bool,
        columns: &[String],
        values: &[String],
        filter: Option<Filter>,
    ) -> Result<ResultSet> {
        Update::new(table, columns, values, filter, wait)?.execute(table)
    }

    /// Not implemented; always `Unsupported`
    pub fn insert(
        &self,
        table: &Table,
        _wait: bool,
        _columns: &[String],
        _values: &[String],
    ) -> Result<ResultSet> {
        Insert::new().execute(table)
    }

    /// Not implemented; always `Unsupported`
    pub fn delete(&self, table: &Table, _wait: bool, _filter: Option<Filter>) -> Result<ResultSet> {
        Delete::new().execute(table)
    }

    /// Writes the most recently used table back to its source
    pub fn save(&self) -> Result<ResultSet> {
        let source = self.cache.save_recent()?;
        Ok(ResultSet::Save { source })
    }

    /// Cancels parked WAIT queries and refuses new ones
    pub fn shutdown(&self) -> Result<()> {
        self.cache.close()
    }
}
