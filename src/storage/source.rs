use std::{
    fs::File,
    io::{BufReader, BufWriter},
};

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    storage::{csv, table::Table},
};

/// Abstract table source (load/save boundary behind the table cache)
///
/// Identifiers are opaque to the cache; the source decides what they mean.
pub trait Source: Send + Sync {
    /// Builds a fresh table from the identifier's current contents
    fn load(&self, id: &str) -> Result<Table>;

    /// Writes the table back to the identifier
    fn save(&self, id: &str, table: &Table) -> Result<()>;
}

/// Returns true for identifiers that name a remote (HTTP) source
pub fn is_remote(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

/// Loads local CSV files and downloads remote ones; saves to local files only
#[derive(Debug, Clone, Default)]
pub struct FileSource;

impl FileSource {
    pub fn new() -> Self {
        Self
    }

    fn download(url: &str) -> Result<Table> {
        debug!(%url, "downloading");
        let response = ureq::get(url).call().map_err(|err| match err {
            ureq::Error::Status(code, response) => Error::Load(format!(
                "Error ({} {}) getting {}",
                code,
                response.status_text(),
                url
            )),
            ureq::Error::Transport(transport) => {
                Error::Load(format!("unable to download {}: {}", url, transport))
            }
        })?;
        csv::load(response.into_reader())
    }
}

impl Source for FileSource {
    fn load(&self, id: &str) -> Result<Table> {
        let table = if is_remote(id) {
            Self::download(id)?
        } else {
            let file = File::open(id)
                .map_err(|e| Error::Load(format!("unable to open {}: {}", id, e)))?;
            csv::load(BufReader::new(file))?
        };
        info!(source = %id, rows = table.rows().len(), "table loaded");
        Ok(table)
    }

    fn save(&self, id: &str, table: &Table) -> Result<()> {
        if is_remote(id) {
            return Err(Error::Save(
                "Saving CSV to an URL using POST is not implemented".into(),
            ));
        }
        let file = File::create(id)
            .map_err(|e| Error::Save(format!("unable to create {}: {}", id, e)))?;
        csv::save(table, BufWriter::new(file))?;
        info!(source = %id, "table saved");
        Ok(())
    }
}
