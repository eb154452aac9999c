use ahash::{AHashMap, AHashSet};
use lustre_core::{fields, CatalogRecord, Error, MatchKey, RecordId, Result, UpdateOperation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Catalog projection read at the start of a run
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub records: Vec<CatalogRecord>,
    /// Documents that could not be decoded (no `_id` or `stockRef`)
    pub rejected: usize,
}

impl CatalogSnapshot {
    /// Decode projected documents, skipping the ones that do not decode
    pub fn from_documents<'a, I>(docs: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut snapshot = Self::default();
        for doc in docs {
            match CatalogRecord::from_document(&project(doc)) {
                Ok(record) => snapshot.records.push(record),
                Err(e) => {
                    let id = doc.get(fields::ID).map(Value::to_string).unwrap_or_default();
                    warn!("Skipping catalog document {}: {}", id, e);
                    snapshot.rejected += 1;
                }
            }
        }
        snapshot
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregate outcome of a bulk write; there is no per-operation status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteResult {
    pub matched: usize,
    pub modified: usize,
}

/// A document collection holding the catalog
pub trait CatalogStore: Send + Sync {
    /// Collection name, for logging
    fn name(&self) -> &str;

    /// Every stored document, unprojected
    fn documents(&self) -> Result<Vec<Value>>;

    fn count(&self) -> Result<usize>;

    /// Drop the collection contents and insert `docs`. Returns the number inserted.
    fn replace_all(&self, docs: Vec<Value>) -> Result<usize>;

    /// Apply all operations as one batch
    fn bulk_write(&self, operations: &[UpdateOperation]) -> Result<BulkWriteResult>;

    /// Read the projection the engine needs
    fn fetch_catalog(&self) -> Result<CatalogSnapshot> {
        let docs = self.documents()?;
        Ok(CatalogSnapshot::from_documents(&docs))
    }
}

/// Keep only the fields listed in [`fields::PROJECTION`]
pub fn project(doc: &Value) -> Value {
    match doc.as_object() {
        Some(obj) => {
            let projected: Map<String, Value> = fields::PROJECTION
                .iter()
                .filter_map(|field| obj.get(*field).map(|v| (field.to_string(), v.clone())))
                .collect();
            Value::Object(projected)
        }
        None => Value::Null,
    }
}

/// Give a document an `_id` when it has none
pub fn ensure_id(mut doc: Value) -> Value {
    if let Some(obj) = doc.as_object_mut() {
        if !obj.contains_key(fields::ID) {
            obj.insert(fields::ID.to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
    }
    doc
}

/// Storage key for a document: the compact JSON text of its `_id`, so ids of
/// different types (`7`, `"7"`, `{"$oid": "7"}`) never share a key
pub fn document_key(doc: &Value) -> Option<String> {
    doc.get(fields::ID).map(Value::to_string)
}

/// Keys for a batch about to be inserted. Fails on a document without `_id`
/// and on any `_id` that appears twice.
pub fn unique_keys(docs: &[Value]) -> Result<Vec<String>> {
    let mut seen = AHashSet::with_capacity(docs.len());
    let mut keys = Vec::with_capacity(docs.len());
    for doc in docs {
        let key = document_key(doc).ok_or_else(|| Error::Storage(format!("document has no _id: {}", doc)))?;
        if !seen.insert(key.clone()) {
            return Err(Error::Storage(format!("duplicate _id {}", key)));
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Keys a document can be matched by
fn keys_of(doc: &Value) -> impl Iterator<Item = MatchKey> {
    let stock_ref = match doc.get(fields::STOCK_REF) {
        Some(Value::String(s)) => Some(MatchKey::StockRef(s.clone())),
        Some(Value::Number(n)) => Some(MatchKey::StockRef(n.to_string())),
        _ => None,
    };
    let id = doc
        .get(fields::ID)
        .and_then(|v| serde_json::from_value::<RecordId>(v.clone()).ok())
        .map(MatchKey::Id);
    stock_ref.into_iter().chain(id)
}

/// Apply operations to an in-memory document list. Each operation updates the
/// first document its key matches. Returns the touched positions with the counts.
pub fn apply_operations(docs: &mut [Value], operations: &[UpdateOperation]) -> (Vec<usize>, BulkWriteResult) {
    let mut index: AHashMap<MatchKey, usize> = AHashMap::with_capacity(docs.len() * 2);
    for (pos, doc) in docs.iter().enumerate() {
        for key in keys_of(doc) {
            index.entry(key).or_insert(pos);
        }
    }

    let mut touched = Vec::new();
    let mut result = BulkWriteResult::default();
    for op in operations {
        let Some(&pos) = index.get(&op.key) else {
            continue;
        };
        result.matched += 1;
        if op.apply_to(&mut docs[pos]) {
            result.modified += 1;
            touched.push(pos);
        }
    }
    (touched, result)
}
