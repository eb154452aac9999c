use crate::store::{apply_operations, ensure_id, unique_keys, BulkWriteResult, CatalogStore};
use lustre_core::{Result, UpdateOperation};
use parking_lot::RwLock;
use serde_json::Value;

/// Catalog collection kept in process memory, in insertion order
pub struct MemoryStore {
    name: String,
    docs: RwLock<Vec<Value>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(Vec::new()),
        }
    }

    pub fn with_documents(name: impl Into<String>, docs: Vec<Value>) -> Self {
        let store = Self::new(name);
        *store.docs.write() = docs.into_iter().map(ensure_id).collect();
        store
    }
}

impl CatalogStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn documents(&self) -> Result<Vec<Value>> {
        Ok(self.docs.read().clone())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.docs.read().len())
    }

    fn replace_all(&self, docs: Vec<Value>) -> Result<usize> {
        let docs: Vec<Value> = docs.into_iter().map(ensure_id).collect();
        let inserted = unique_keys(&docs)?.len();
        *self.docs.write() = docs;
        Ok(inserted)
    }

    fn bulk_write(&self, operations: &[UpdateOperation]) -> Result<BulkWriteResult> {
        let mut docs = self.docs.write();
        let (_, result) = apply_operations(&mut docs, operations);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lustre_core::MatchKey;
    use serde_json::json;

    #[test]
    fn test_bulk_write_then_fetch() {
        let store = MemoryStore::with_documents(
            "diamonds",
            vec![
                json!({"_id": "1", "stockRef": "A", "shape": "ROUND"}),
                json!({"_id": "2", "stockRef": "B", "shape": "ROUND"}),
            ],
        );
        let ops = vec![UpdateOperation::new(MatchKey::StockRef("A".into()), vec!["B".into()])];
        let result = store.bulk_write(&ops).unwrap();
        assert_eq!(result, BulkWriteResult { matched: 1, modified: 1 });

        let docs = store.documents().unwrap();
        assert_eq!(docs[0]["similar_diamonds"], json!(["B"]));

        let snapshot = store.fetch_catalog().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.records[1].stock_ref, "B");
    }

    #[test]
    fn test_replace_all() {
        let store = MemoryStore::with_documents("diamonds", vec![json!({"_id": "1", "stockRef": "A"})]);
        assert_eq!(store.replace_all(vec![json!({"stockRef": "X"}), json!({"stockRef": "Y"})]).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 2);
        assert!(store.documents().unwrap().iter().all(|d| d.get("_id").is_some()));
    }

    #[test]
    fn test_replace_all_rejects_duplicate_ids() {
        let store = MemoryStore::with_documents("diamonds", vec![json!({"_id": "1", "stockRef": "A"})]);
        let docs = vec![json!({"_id": -1, "stockRef": "X"}), json!({"_id": -1, "stockRef": "Y"})];
        assert!(store.replace_all(docs).is_err());
        assert_eq!(store.documents().unwrap()[0]["stockRef"], json!("A"));

        let docs = vec![json!({"_id": 7, "stockRef": "X"}), json!({"_id": "7", "stockRef": "Y"})];
        assert_eq!(store.replace_all(docs).unwrap(), 2);
    }
}
