//! # Lustre Core
//!
//! Core library for the Lustre similar-item recommender.
//!
//! This crate provides the recommendation engine itself:
//!
//! - [`CatalogRecord`] - An inventory item projected to the fields the engine reads
//! - [`FeatureNormalizer`] - Ordinal encoding, standardization and importance weights
//! - [`NeighborIndex`] - Exact k-nearest-neighbor search with deterministic ties
//! - [`grouping`] - Per-shape search with a catalog-wide fallback for orphans
//! - [`ReconciliationBuilder`] - Neighbor lists to keyed update operations
//! - [`SimilarityEngine`] - Ties the pieces together for one snapshot
//!
//! ## Example
//!
//! ```rust
//! use lustre_core::{CancelToken, CatalogRecord, EngineConfig, SimilarityEngine};
//!
//! let catalog = vec![
//!     CatalogRecord::new("1", "SR-1").with_shape("ROUND").with_price(5200.0).with_weight(1.0),
//!     CatalogRecord::new("2", "SR-2").with_shape("ROUND").with_price(5400.0).with_weight(1.1),
//!     CatalogRecord::new("3", "SR-3").with_shape("ROUND").with_price(9100.0).with_weight(1.6),
//! ];
//!
//! let engine = SimilarityEngine::new(EngineConfig::default()).unwrap();
//! let plan = engine.plan(&catalog, &CancelToken::new()).unwrap();
//! assert_eq!(plan.operations.len(), 3);
//! assert_eq!(plan.operations[0].similar, vec!["SR-2", "SR-3"]);
//! ```

pub mod engine;
pub mod error;
pub mod features;
pub mod grade;
pub mod grouping;
pub mod knn;
pub mod reconcile;
pub mod record;

pub use engine::{CancelToken, EngineConfig, EngineStats, RunPlan, SimilarityEngine};
pub use error::{Error, Result};
pub use features::{FeatureNormalizer, FeatureScaler, FeatureVector, FeatureWeights, FittedNormalizer, FEATURE_DIM};
pub use grade::GradeScale;
pub use grouping::{partition, Group, GroupSearch, GroupingMode, NeighborResult, MAX_RECOMMENDATIONS};
pub use knn::{Neighbor, NeighborIndex, Neighbors};
pub use reconcile::{MatchKey, ReconciliationBuilder, UpdateOperation};
pub use record::{fields, CatalogRecord, RecordId};
