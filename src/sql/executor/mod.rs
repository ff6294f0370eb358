use std::fmt::Display;

use crate::{
    error::{Error, Result},
    sql::{
        parser::ast::{Condition, Statement},
        types::{Filter, Row},
    },
    storage::table::Table,
};

mod mutation;
mod query;

pub use mutation::{Delete, Insert, Update};
pub use query::Select;

/// Statement executor, bound to one table
pub trait Executor {
    fn execute(self: Box<Self>, table: &Table) -> Result<ResultSet>;
}

impl dyn Executor {
    /// Builds an executor for a table statement, resolving column names
    /// against the table before anything is locked
    pub fn build(stmt: Statement, table: &Table) -> Result<Box<dyn Executor>> {
        let executor: Box<dyn Executor> = match stmt {
            Statement::Select {
                columns,
                where_clause,
                wait,
                ..
            } => Select::new(table, &columns, resolve_filter(table, where_clause)?, wait)?,
            Statement::Update {
                columns,
                where_clause,
                wait,
                ..
            } => {
                let (columns, values): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
                Update::new(
                    table,
                    &columns,
                    &values,
                    resolve_filter(table, where_clause)?,
                    wait,
                )?
            }
            Statement::Insert { .. } => Insert::new(),
            Statement::Delete { .. } => Delete::new(),
            Statement::Save => {
                return Err(Error::Internal("save does not run against a table".into()));
            }
        };
        Ok(executor)
    }
}

/// Resolves a parsed WHERE clause to a column index on the table
pub fn resolve_filter(table: &Table, condition: Option<Condition>) -> Result<Option<Filter>> {
    match condition {
        Some(c) => Ok(Some(Filter::new(
            table.column_index(&c.column)?,
            c.comparator,
            c.value,
        ))),
        None => Ok(None),
    }
}

/// Execution result set
#[derive(Debug, PartialEq)]
pub enum ResultSet {
    Select { columns: Vec<String>, rows: Vec<Row> },
    Update { count: usize },
    Save { source: String },
}

/// Renders the result as response text: tab-separated rows followed by a
/// row count line
impl Display for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultSet::Select { columns, rows } => {
                if !rows.is_empty() {
                    writeln!(f, "{}", columns.join("\t"))?;
                    for row in rows {
                        writeln!(f, "{}", row.join("\t"))?;
                    }
                }
                writeln!(f, "{} row(s) selected.", rows.len())
            }
            ResultSet::Update { count } => writeln!(f, "{} row(s) updated.", count),
            ResultSet::Save { source } => writeln!(f, "{} saved.", source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResultSet;

    #[test]
    fn test_display() {
        let rs = ResultSet::Select {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec!["1".into(), "Alice".into()], vec!["2".into(), "Bob".into()]],
        };
        assert_eq!(rs.to_string(), "id\tname\n1\tAlice\n2\tBob\n2 row(s) selected.\n");

        let rs = ResultSet::Select {
            columns: vec!["id".into()],
            rows: vec![],
        };
        assert_eq!(rs.to_string(), "0 row(s) selected.\n");
        assert_eq!(ResultSet::Update { count: 3 }.to_string(), "3 row(s) updated.\n");
        assert_eq!(
            ResultSet::Save { source: "a.csv".into() }.to_string(),
            "a.csv saved.\n"
        );
    }
}
