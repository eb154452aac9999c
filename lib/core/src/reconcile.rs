//! Reconciliation Builder
//!
//! Turns per-record neighbor results into keyed partial updates of the
//! `similar_diamonds` field. Every run overwrites the field for every record
//! it touches; nothing is compared against previously stored values.

use crate::grouping::NeighborResult;
use crate::record::fields;
use crate::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which stored record an update targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", content = "value")]
pub enum MatchKey {
    #[serde(rename = "stockRef")]
    StockRef(String),
    #[serde(rename = "_id")]
    Id(RecordId),
}

impl MatchKey {
    /// Document field the key is matched against
    pub fn field(&self) -> &'static str {
        match self {
            MatchKey::StockRef(_) => fields::STOCK_REF,
            MatchKey::Id(_) => fields::ID,
        }
    }

    /// Whether a stored document carries this key
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(stored) = doc.get(self.field()) else {
            return false;
        };
        match self {
            MatchKey::StockRef(reference) => match stored {
                Value::String(s) => s == reference,
                Value::Number(n) => n.to_string() == *reference,
                _ => false,
            },
            MatchKey::Id(id) => serde_json::from_value::<RecordId>(stored.clone())
                .map(|stored| stored == *id)
                .unwrap_or(false),
        }
    }
}

impl std::fmt::Display for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKey::StockRef(s) => write!(f, "stockRef={}", s),
            MatchKey::Id(id) => write!(f, "_id={}", id),
        }
    }
}

/// Set `similar_diamonds` on the record matched by `key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOperation {
    pub key: MatchKey,
    pub similar: Vec<String>,
}

impl UpdateOperation {
    pub fn new(key: MatchKey, similar: Vec<String>) -> Self {
        Self { key, similar }
    }

    /// Apply to a document in place. Returns true when the stored value changed.
    pub fn apply_to(&self, doc: &mut Value) -> bool {
        let Some(obj) = doc.as_object_mut() else {
            return false;
        };
        let new_value = Value::from(self.similar.clone());
        if obj.get(fields::SIMILAR) == Some(&new_value) {
            return false;
        }
        obj.insert(fields::SIMILAR.to_string(), new_value);
        true
    }
}

/// Builds the update batch for one run
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationBuilder {
    clear_stale: bool,
}

impl ReconciliationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also emit an emptying update for records that got no recommendations
    #[must_use]
    pub fn with_clear_stale(mut self, clear_stale: bool) -> Self {
        self.clear_stale = clear_stale;
        self
    }

    pub fn build(&self, results: Vec<NeighborResult>) -> Vec<UpdateOperation> {
        results
            .into_iter()
            .filter(|result| self.clear_stale || !result.similar.is_empty())
            .map(|result| UpdateOperation::new(result.key, result.similar))
            .collect()
    }
}
