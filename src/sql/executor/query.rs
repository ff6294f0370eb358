use tracing::debug;

use crate::{
    error::Result,
    sql::{
        executor::ResultSet,
        types::{Filter, Row},
    },
    storage::table::Table,
};

use super::Executor;

/// Table scan executor (SELECT)
pub struct Select {
    /// Output column names, in projection order
    names: Vec<String>,
    /// Table column index for each output column
    projection: Vec<usize>,
    filter: Option<Filter>,
    wait: bool,
}

impl Select {
    /// `columns` of `["*"]` (or empty) selects every column
    pub fn new(
        table: &Table,
        columns: &[String],
        filter: Option<Filter>,
        wait: bool,
    ) -> Result<Box<Self>> {
        let names = match columns.first() {
            None => table.columns().to_vec(),
            Some(c) if c == "*" => table.columns().to_vec(),
            Some(_) => columns.to_vec(),
        };
        let projection = names
            .iter()
            .map(|name| table.column_index(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(Self {
            names,
            projection,
            filter,
            wait,
        }))
    }
}

impl Executor for Select {
    fn execute(self: Box<Self>, table: &Table) -> Result<ResultSet> {
        loop {
            let seen = table.version()?;
            let mut rows: Vec<Row> = Vec::new();
            for row in table.rows() {
                // Only this row is locked, and only to test and copy it
                let values = row.lock()?;
                if Filter::matches(self.filter.as_ref(), &values) {
                    rows.push(self.projection.iter().map(|&i| values[i].clone()).collect());
                }
            }

            if !rows.is_empty() || !self.wait {
                return Ok(ResultSet::Select {
                    columns: self.names,
                    rows,
                });
            }
            debug!("select matched no rows, waiting for table change");
            table.wait_for_change(seen)?;
        }
    }
}
