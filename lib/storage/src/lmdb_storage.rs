// LMDB-backed catalog collections (one named database per collection)
use crate::store::{apply_operations, ensure_id, unique_keys, BulkWriteResult, CatalogStore};
use anyhow::{anyhow, Result};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use lustre_core::{Error, UpdateOperation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DB_COLLECTIONS: &str = "collections";
const COLLECTION_PREFIX: &str = "catalog:";
const MAP_SIZE: usize = 10 * 1024 * 1024 * 1024; // 10GB
const MAX_DBS: u32 = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// An LMDB environment; stands in for one catalog database
pub struct LmdbStorage {
    env: Arc<Env>,
    collections_db: Database<Str, Bytes>,
    path: PathBuf,
}

impl LmdbStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(MAX_DBS)
                .open(&path)?
        });

        let mut wtxn = env.write_txn()?;
        let collections_db = env.create_database(&mut wtxn, Some(DB_COLLECTIONS))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            collections_db,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a collection, creating it on first use
    pub fn collection(&self, name: &str) -> Result<LmdbCollection> {
        if name.is_empty() {
            return Err(anyhow!("collection name cannot be empty"));
        }

        let db_name = format!("{}{}", COLLECTION_PREFIX, name);
        let mut wtxn = self.env.write_txn()?;
        let db: Database<Str, Bytes> = self.env.create_database(&mut wtxn, Some(db_name.as_str()))?;
        if self.collections_db.get(&wtxn, name)?.is_none() {
            let meta = CollectionMeta {
                name: name.to_string(),
                created_at: chrono::Utc::now(),
            };
            self.collections_db.put(&mut wtxn, name, &serde_json::to_vec(&meta)?)?;
        }
        wtxn.commit()?;

        Ok(LmdbCollection {
            env: self.env.clone(),
            db,
            name: name.to_string(),
        })
    }

    pub fn list_collections(&self) -> Result<Vec<CollectionMeta>> {
        let rtxn = self.env.read_txn()?;
        let mut collections = Vec::new();
        for entry in self.collections_db.iter(&rtxn)? {
            let (_, data) = entry?;
            collections.push(serde_json::from_slice(data)?);
        }
        Ok(collections)
    }
}

/// One catalog collection; documents are JSON keyed by `_id`
pub struct LmdbCollection {
    env: Arc<Env>,
    db: Database<Str, Bytes>,
    name: String,
}

impl LmdbCollection {
    fn read_all(&self) -> Result<Vec<Value>> {
        let rtxn = self.env.read_txn()?;
        let mut docs = Vec::new();
        for entry in self.db.iter(&rtxn)? {
            let (_, data) = entry?;
            docs.push(serde_json::from_slice(data)?);
        }
        Ok(docs)
    }

    fn len(&self) -> Result<usize> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.len(&rtxn)? as usize)
    }

    /// Returns the number of documents stored afterwards
    fn replace(&self, docs: Vec<Value>) -> Result<usize> {
        let docs: Vec<Value> = docs.into_iter().map(ensure_id).collect();
        let keys = unique_keys(&docs)?;

        let mut wtxn = self.env.write_txn()?;
        self.db.clear(&mut wtxn)?;
        for (key, doc) in keys.iter().zip(&docs) {
            self.db.put(&mut wtxn, key, &serde_json::to_vec(doc)?)?;
        }
        let stored = self.db.len(&wtxn)? as usize;
        wtxn.commit()?;
        Ok(stored)
    }

    /// Apply every operation inside one write transaction
    fn write(&self, operations: &[UpdateOperation]) -> Result<BulkWriteResult> {
        let mut wtxn = self.env.write_txn()?;

        let mut keys = Vec::new();
        let mut docs = Vec::new();
        for entry in self.db.iter(&wtxn)? {
            let (key, data) = entry?;
            keys.push(key.to_string());
            docs.push(serde_json::from_slice::<Value>(data)?);
        }

        let (touched, result) = apply_operations(&mut docs, operations);
        for pos in touched {
            self.db.put(&mut wtxn, &keys[pos], &serde_json::to_vec(&docs[pos])?)?;
        }
        wtxn.commit()?;
        Ok(result)
    }
}

impl CatalogStore for LmdbCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn documents(&self) -> lustre_core::Result<Vec<Value>> {
        self.read_all().map_err(|e| Error::Storage(e.to_string()))
    }

    fn count(&self) -> lustre_core::Result<usize> {
        self.len().map_err(|e| Error::Storage(e.to_string()))
    }

    fn replace_all(&self, docs: Vec<Value>) -> lustre_core::Result<usize> {
        self.replace(docs).map_err(|e| Error::Storage(e.to_string()))
    }

    fn bulk_write(&self, operations: &[UpdateOperation]) -> lustre_core::Result<BulkWriteResult> {
        self.write(operations).map_err(|e| Error::Storage(e.to_string()))
    }
}
