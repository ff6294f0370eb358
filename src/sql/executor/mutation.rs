use tracing::debug;

use crate::{
    error::{Error, Result},
    sql::{executor::ResultSet, types::Filter},
    storage::table::Table,
};

use super::Executor;

/// UPDATE executor
pub struct Update {
    /// (column index, new value) pairs
    assignments: Vec<(usize, String)>,
    filter: Option<Filter>,
    wait: bool,
}

impl Update {
    pub fn new(
        table: &Table,
        columns: &[String],
        values: &[String],
        filter: Option<Filter>,
        wait: bool,
    ) -> Result<Box<Self>> {
        if columns.len() != values.len() {
            return Err(Error::Parse(format!(
                "{} columns but {} values to update",
                columns.len(),
                values.len()
            )));
        }
        let assignments = columns
            .iter()
            .zip(values)
            .map(|(col, value)| -> Result<(usize, String)> {
                Ok((table.column_index(col)?, value.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(Self {
            assignments,
            filter,
            wait,
        }))
    }
}

impl Executor for Update {
    fn execute(self: Box<Self>, table: &Table) -> Result<ResultSet> {
        loop {
            let seen = table.version()?;
            let mut count = 0;
            for row in table.rows() {
                // Match and write under one acquisition, so no other query
                // sees the row half-updated
                let mut values = row.lock()?;
                if Filter::matches(self.filter.as_ref(), &values) {
                    for (i, value) in &self.assignments {
                        values[*i] = value.clone();
                    }
                    count += 1;
                }
            }

            if count > 0 {
                // Wake every waiter on this table, whatever it waits for
                table.notify_changed()?;
                return Ok(ResultSet::Update { count });
            }
            if !self.wait {
                return Ok(ResultSet::Update { count });
            }
            debug!("update matched no rows, waiting for table change");
            table.wait_for_change(seen)?;
        }
    }
}

/// INSERT executor, not implemented: always fails without touching the table
pub struct Insert;

impl Insert {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Executor for Insert {
    fn execute(self: Box<Self>, _table: &Table) -> Result<ResultSet> {
        Err(Error::Unsupported("insert is not yet implemented.".into()))
    }
}

/// DELETE executor, not implemented: always fails without touching the table
pub struct Delete;

impl Delete {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Executor for Delete {
    fn execute(self: Box<Self>, _table: &Table) -> Result<ResultSet> {
        Err(Error::Unsupported("delete is not yet implemented.".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, mpsc},
        thread,
        time::Duration,
    };

    use super::{Delete, Insert, Update};
    use crate::{
        error::{Error, Result},
        sql::{
            executor::{Executor, ResultSet, Select},
            types::{Comparator, Filter},
        },
        storage::{csv, table::Table},
    };

    fn table() -> Result<Table> {
        csv::load("id,a,b\n1,0,0\n2,0,0\n3,0,0\n".as_bytes())
    }

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_update_with_filter() -> Result<()> {
        let t = table()?;
        let filter = Filter::new(0, Comparator::GreaterThanOrEqual, "2");
        let rs = Update::new(&t, &names(&["b", "a"]), &names(&["y", "x"]), Some(filter), false)?
            .execute(&t)?;
        assert_eq!(rs, ResultSet::Update { count: 2 });
        assert_eq!(
            t.snapshot()?,
            vec![
                names(&["1", "0", "0"]),
                names(&["2", "x", "y"]),
                names(&["3", "x", "y"]),
            ]
        );
        assert_eq!(t.version()?, 1);
        Ok(())
    }

    #[test]
    fn test_update_no_match_without_wait() -> Result<()> {
        let t = table()?;
        let filter = Filter::new(0, Comparator::Equal, "9");
        let rs = Update::new(&t, &names(&["a"]), &names(&["x"]), Some(filter), false)?.execute(&t)?;
        assert_eq!(rs.to_string(), "0 row(s) updated.\n");
        // No change, no broadcast
        assert_eq!(t.version()?, 0);
        Ok(())
    }

    #[test]
    fn test_update_errors() -> Result<()> {
        let t = table()?;
        assert!(matches!(
            Update::new(&t, &names(&["c"]), &names(&["x"]), None, false),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            Update::new(&t, &names(&["a", "b"]), &names(&["x"]), None, false),
            Err(Error::Parse(_))
        ));
        Ok(())
    }

    #[test]
    fn test_update_wait_chain() -> Result<()> {
        // A waiting update moves a job from "ready" to "taken" once it is ready
        let t = Arc::new(csv::load("id,status\n1,new\n".as_bytes())?);
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let t = t.clone();
            thread::spawn(move || {
                let filter = Filter::new(1, Comparator::Equal, "ready");
                let rs = Update::new(&t, &names(&["status"]), &names(&["taken"]), Some(filter), true)
                    .and_then(|update| update.execute(&t));
                let _ = tx.send(rs);
            })
        };
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        Update::new(&t, &names(&["status"]), &names(&["ready"]), None, false)?.execute(&t)?;
        let rs = rx.recv_timeout(Duration::from_secs(5)).expect("waiter not woken")?;
        assert_eq!(rs, ResultSet::Update { count: 1 });
        assert_eq!(t.snapshot()?, vec![names(&["1", "taken"])]);
        waiter.join().unwrap();
        Ok(())
    }

    #[test]
    fn test_rows_never_half_updated() -> Result<()> {
        let t = Arc::new(table()?);
        let writer = {
            let t = t.clone();
            thread::spawn(move || -> Result<()> {
                for i in 1..=500 {
                    let v = i.to_string();
                    Update::new(&t, &names(&["a", "b"]), &[v.clone(), v], None, false)?
                        .execute(&t)?;
                }
                Ok(())
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let t = t.clone();
                thread::spawn(move || -> Result<()> {
                    for _ in 0..500 {
                        let rs = Select::new(&t, &names(&["a", "b"]), None, false)?.execute(&t)?;
                        let ResultSet::Select { rows, .. } = rs else {
                            panic!("expected select result");
                        };
                        for row in rows {
                            assert_eq!(row[0], row[1], "half-updated row observed");
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        writer.join().unwrap()?;
        for r in readers {
            r.join().unwrap()?;
        }
        assert!(t.snapshot()?.iter().all(|r| r[1] == "500" && r[2] == "500"));
        Ok(())
    }

    #[test]
    fn test_insert_delete_unsupported() -> Result<()> {
        let t = table()?;
        let before = t.snapshot()?;
        assert_eq!(
            Insert::new().execute(&t),
            Err(Error::Unsupported("insert is not yet implemented.".into()))
        );
        assert_eq!(
            Delete::new().execute(&t),
            Err(Error::Unsupported("delete is not yet implemented.".into()))
        );
        assert_eq!(t.snapshot()?, before);
        assert_eq!(t.version()?, 0);
        Ok(())
    }
}
