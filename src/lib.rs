//! # Lustre
//!
//! A batch similar-item recommender for diamond inventories.
//!
//! For every item in a catalog, Lustre finds the most similar other items of
//! the same shape and writes their stock references back into the item's
//! `similar_diamonds` field. Items whose shape has no other members fall
//! back to the nearest items across the whole catalog.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! lustre import inventory.json
//! lustre serve --http-port 8000
//! curl -X POST http://localhost:8000/trigger-update
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use lustre::prelude::*;
//! use serde_json::json;
//!
//! let store = MemoryStore::with_documents("diamonds", vec![
//!     json!({"_id": "1", "stockRef": "A", "shape": "ROUND", "priceListUSD": 1000, "weight": 0.5}),
//!     json!({"_id": "2", "stockRef": "B", "shape": "ROUND", "priceListUSD": 1200, "weight": 0.6}),
//! ]);
//!
//! let engine = SimilarityEngine::new(EngineConfig::default()).unwrap();
//! let snapshot = store.fetch_catalog().unwrap();
//! let plan = engine.plan(&snapshot.records, &CancelToken::new()).unwrap();
//! let written = store.bulk_write(&plan.operations).unwrap();
//! assert_eq!(written.modified, 2);
//! ```
//!
//! ## Crate Structure
//!
//! - `lustre-core` - Records, feature normalization, neighbor search, grouping, reconciliation
//! - `lustre-storage` - Catalog stores (LMDB, in-memory), import, export and migration
//! - `lustre-api` - Batch runner, run scheduler and the HTTP trigger API

pub mod config;

// Re-export core types
pub use lustre_core::{
    CancelToken, CatalogRecord, EngineConfig, Error, FeatureWeights, GroupingMode, MatchKey, RecordId, Result,
    RunPlan, SimilarityEngine, UpdateOperation,
};

// Re-export storage
pub use lustre_storage::{BulkWriteResult, CatalogSnapshot, CatalogStore, LmdbStorage, MemoryStore};

// Re-export API
pub use lustre_api::{BatchRunner, RestApi, RunReport, RunScheduler};

pub use config::AppConfig;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AppConfig, BatchRunner, BulkWriteResult, CancelToken, CatalogRecord, CatalogSnapshot, CatalogStore,
        EngineConfig, Error, FeatureWeights, GroupingMode, LmdbStorage, MatchKey, MemoryStore, RecordId, RestApi,
        Result, RunPlan, RunReport, RunScheduler, SimilarityEngine, UpdateOperation,
    };
}
