use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

use crate::{
    error::{Error, Result},
    sql::types::Row as Values,
};

/// One record of a table.
///
/// Every read-for-decision or write of any field goes through `lock`, so a
/// reader always sees either all or none of a concurrent update's fields.
#[derive(Debug)]
pub struct Row {
    values: Mutex<Values>,
}

impl Row {
    pub fn new(values: Values) -> Self {
        Self {
            values: Mutex::new(values),
        }
    }

    /// Acquires this row's exclusive lock
    pub fn lock(&self) -> Result<MutexGuard<'_, Values>> {
        Ok(self.values.lock()?)
    }
}

/// State paired with the table's condition variable
#[derive(Debug, Default)]
struct Changes {
    /// Bumped after every update that modified at least one row
    version: u64,
    /// Set at shutdown; waiters give up instead of parking again
    closed: bool,
}

/// An ordered collection of rows with a fixed column schema
#[derive(Debug)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
    changes: Mutex<Changes>,
    changed: Condvar,
}

impl Table {
    /// Builds a table, checking every row against the column count
    pub fn new(columns: Vec<String>, rows: Vec<Values>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Load("table has no columns".into()));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(Error::Load(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns,
            rows: rows.into_iter().map(Row::new).collect(),
            changes: Mutex::new(Changes::default()),
            changed: Condvar::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the column index for a given column name (case-sensitive)
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or(Error::NotFound(format!("column {} not found", name)))
    }

    /// Copies every row, taking each row's lock in turn
    pub fn snapshot(&self) -> Result<Vec<Values>> {
        self.rows
            .iter()
            .map(|row| row.lock().map(|values| values.clone()))
            .collect()
    }

    /// Current change version; record it before scanning and pass it to
    /// `wait_for_change` so changes made during the scan are not missed.
    pub fn version(&self) -> Result<u64> {
        let changes = self.changes.lock()?;
        if changes.closed {
            return Err(Error::Cancelled);
        }
        Ok(changes.version)
    }

    /// Blocks until the version moves past `seen`
    pub fn wait_for_change(&self, seen: u64) -> Result<()> {
        let mut changes = self.changes.lock()?;
        while changes.version == seen && !changes.closed {
            changes = self.changed.wait(changes)?;
        }
        if changes.closed {
            return Err(Error::Cancelled);
        }
        debug!(version = changes.version, "table changed, re-evaluating");
        Ok(())
    }

    /// Publishes a change and wakes every waiter
    pub fn notify_changed(&self) -> Result<()> {
        let mut changes = self.changes.lock()?;
        changes.version += 1;
        drop(changes);
        self.changed.notify_all();
        Ok(())
    }

    /// Closes the table for waiting: current and future waiters get `Cancelled`
    pub fn close(&self) -> Result<()> {
        self.changes.lock()?.closed = true;
        self.changed.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, mpsc},
        thread,
        time::Duration,
    };

    use super::Table;
    use crate::error::{Error, Result};

    fn table() -> Result<Table> {
        Table::new(
            vec!["id".into(), "status".into()],
            vec![
                vec!["1".into(), "pending".into()],
                vec!["2".into(), "done".into()],
            ],
        )
    }

    #[test]
    fn test_new_checks_field_count() {
        let t = Table::new(vec!["a".into(), "b".into()], vec![vec!["1".into()]]);
        assert!(matches!(t, Err(Error::Load(_))));
        assert!(matches!(Table::new(vec![], vec![]), Err(Error::Load(_))));
    }

    #[test]
    fn test_column_index() -> Result<()> {
        let t = table()?;
        assert_eq!(t.column_index("status")?, 1);
        assert_eq!(
            t.column_index("Status"),
            Err(Error::NotFound("column Status not found".into()))
        );
        Ok(())
    }

    #[test]
    fn test_change_before_wait_is_not_missed() -> Result<()> {
        let t = table()?;
        let seen = t.version()?;
        t.notify_changed()?;
        // Returns immediately, the version already moved
        t.wait_for_change(seen)?;
        assert_eq!(t.version()?, seen + 1);
        Ok(())
    }

    #[test]
    fn test_wait_woken_by_notify() -> Result<()> {
        let t = Arc::new(table()?);
        let seen = t.version()?;
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let t = t.clone();
            thread::spawn(move || {
                let _ = tx.send(t.wait_for_change(seen));
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        t.notify_changed()?;
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Ok(())));
        waiter.join().unwrap();
        Ok(())
    }

    #[test]
    fn test_close_cancels_waiters() -> Result<()> {
        let t = Arc::new(table()?);
        let seen = t.version()?;
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let t = t.clone();
            thread::spawn(move || {
                let _ = tx.send(t.wait_for_change(seen));
            })
        };
        t.close()?;
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Err(Error::Cancelled)));
        waiter.join().unwrap();
        assert_eq!(t.version(), Err(Error::Cancelled));
        Ok(())
    }
}
