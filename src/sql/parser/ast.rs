use std::collections::BTreeMap;

use crate::sql::types::Comparator;

/// Abstract Syntax Tree (AST) node definitions for statements
///
/// `source` is the table's file path or URL; an empty source means the most
/// recently used table.
#[derive(Debug, PartialEq)]
pub enum Statement {
    /// SELECT statement; `columns` is `["*"]` for all columns
    Select {
        source: String,
        columns: Vec<String>,
        where_clause: Option<Condition>,
        wait: bool,
    },
    /// UPDATE statement
    Update {
        source: String,
        columns: BTreeMap<String, String>,
        where_clause: Option<Condition>,
        wait: bool,
    },
    /// INSERT statement
    Insert {
        source: String,
        columns: Option<Vec<String>>,
        values: Vec<String>,
        wait: bool,
    },
    /// DELETE statement
    Delete {
        source: String,
        where_clause: Option<Condition>,
        wait: bool,
    },
    /// SAVE the most recently used table
    Save,
}

impl Statement {
    /// The table this statement runs against, None for SAVE
    pub fn source(&self) -> Option<&str> {
        match self {
            Statement::Select { source, .. }
            | Statement::Update { source, .. }
            | Statement::Insert { source, .. }
            | Statement::Delete { source, .. } => Some(source),
            Statement::Save => None,
        }
    }
}

/// WHERE clause: `column <comparator> value`
#[derive(Debug, PartialEq, Clone)]
pub struct Condition {
    pub column: String,
    pub comparator: Comparator,
    pub value: String,
}
