use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    error::{Error, Result},
    storage::{csv, source::Source, table::Table},
};

/// In-memory table source: identifier -> CSV text
#[derive(Debug, Default)]
pub struct MemorySource {
    data: Mutex<HashMap<String, String>>,
    loads: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the CSV text behind an identifier
    pub fn with(self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.set(id, text);
        self
    }

    pub fn set(&self, id: impl Into<String>, text: impl Into<String>) {
        // A poisoned map is still a valid map
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.insert(id.into(), text.into());
    }

    /// Returns the current CSV text behind an identifier
    pub fn get(&self, id: &str) -> Result<Option<String>> {
        Ok(self.data.lock()?.get(id).cloned())
    }

    /// Number of successful loads served so far
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

/// Implements the Source trait over the in-memory map
impl Source for MemorySource {
    fn load(&self, id: &str) -> Result<Table> {
        let text = self
            .get(id)?
            .ok_or(Error::Load(format!("unable to open {}", id)))?;
        let table = csv::load(text.as_bytes())?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(table)
    }

    fn save(&self, id: &str, table: &Table) -> Result<()> {
        let mut out = Vec::new();
        csv::save(table, &mut out)?;
        self.set(id, String::from_utf8(out)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemorySource;
    use crate::{
        error::{Error, Result},
        storage::source::Source,
    };

    #[test]
    fn test_memory() -> Result<()> {
        let source = MemorySource::new().with("t.csv", "a,b\n1,2\n");
        let table = source.load("t.csv")?;
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(source.loads(), 1);

        table.rows()[0].lock()?[0] = "9".into();
        source.save("t.csv", &table)?;
        assert_eq!(source.get("t.csv")?, Some("a,b\n9,2\n".to_string()));

        assert!(matches!(source.load("missing.csv"), Err(Error::Load(_))));
        assert_eq!(source.loads(), 1);
        Ok(())
    }
}
