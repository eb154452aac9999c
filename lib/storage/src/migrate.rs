//! Moving catalog documents between collections and files
//!
//! Used to seed a local collection from a client's live inventory, keeping a
//! backup copy next to the active one, and to load or dump JSON inventory
//! files.

use crate::store::CatalogStore;
use atomicwrites::{AllowOverwrite, AtomicFile};
use lustre_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub source_count: usize,
    pub active_inserted: usize,
    pub backup_inserted: usize,
}

/// Copy every document of `source` into `active` and `backup`, replacing
/// whatever they held. An empty source aborts before anything is dropped.
pub fn migrate(source: &dyn CatalogStore, active: &dyn CatalogStore, backup: &dyn CatalogStore) -> Result<MigrationReport> {
    info!("Reading source collection '{}'", source.name());
    let docs = source.documents()?;
    if docs.is_empty() {
        return Err(Error::EmptySource(source.name().to_string()));
    }
    let source_count = docs.len();
    info!("Found {} documents in '{}'", source_count, source.name());

    let active_inserted = active.replace_all(docs.clone())?;
    info!("Inserted {} documents into '{}'", active_inserted, active.name());

    let backup_inserted = backup.replace_all(docs)?;
    info!("Inserted {} documents into '{}'", backup_inserted, backup.name());

    Ok(MigrationReport {
        source_count,
        active_inserted,
        backup_inserted,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InventoryFile {
    Documents(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

/// Read an inventory dump: a JSON array of documents, or `{"data": [...]}`
pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
    let bytes = std::fs::read(path.as_ref())?;
    let file: InventoryFile = serde_json::from_slice(&bytes)?;
    let docs = match file {
        InventoryFile::Documents(docs) => docs,
        InventoryFile::Wrapped { data } => data,
    };
    if let Some(bad) = docs.iter().find(|d| !d.is_object()) {
        return Err(Error::Serialization(format!("inventory entry is not an object: {}", bad)));
    }
    Ok(docs)
}

/// Replace the contents of `target` with the documents in a JSON file
pub fn import_json<P: AsRef<Path>>(path: P, target: &dyn CatalogStore) -> Result<usize> {
    let docs = read_json_file(&path)?;
    let inserted = target.replace_all(docs)?;
    info!("Imported {} documents from {:?} into '{}'", inserted, path.as_ref(), target.name());
    Ok(inserted)
}

/// Write all documents of `source` to a JSON file, atomically
pub fn export_json<P: AsRef<Path>>(source: &dyn CatalogStore, path: P) -> Result<usize> {
    let docs = source.documents()?;
    let data = serde_json::to_vec_pretty(&docs)?;
    AtomicFile::new(path.as_ref(), AllowOverwrite)
        .write(|f| f.write_all(&data))
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    info!("Exported {} documents from '{}' to {:?}", docs.len(), source.name(), path.as_ref());
    Ok(docs.len())
}
