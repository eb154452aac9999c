use chrono::{DateTime, Utc};
use lustre_core::{CancelToken, EngineConfig, Result, SimilarityEngine};
use lustre_storage::CatalogStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one successful batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: usize,
    /// Documents skipped because they could not be decoded
    pub rejected: usize,
    pub groups: usize,
    pub orphans: usize,
    /// Records that received no recommendations
    pub skipped: usize,
    pub operations: usize,
    /// Operations that empty a stale list
    pub cleared: usize,
    pub matched: usize,
    pub modified: usize,
}

/// A unit of work the scheduler can run
pub trait BatchJob: Send + Sync + 'static {
    fn execute(&self, run_id: Uuid, cancel: &CancelToken) -> Result<RunReport>;
}

/// Fetch the catalog, compute recommendations, write them back in one batch
pub struct BatchRunner {
    store: Arc<dyn CatalogStore>,
    engine: SimilarityEngine,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn CatalogStore>, config: EngineConfig) -> Result<Self> {
        let engine = SimilarityEngine::new(config)?;
        Ok(Self { store, engine })
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Run once. Any storage failure aborts the run before anything is written.
    pub fn run(&self, run_id: Uuid, cancel: &CancelToken) -> Result<RunReport> {
        let started_at = Utc::now();
        info!("Starting batch update {} on '{}'", run_id, self.store.name());

        let snapshot = self.store.fetch_catalog()?;
        let mut report = RunReport {
            run_id,
            started_at,
            finished_at: started_at,
            records: snapshot.len(),
            rejected: snapshot.rejected,
            groups: 0,
            orphans: 0,
            skipped: 0,
            operations: 0,
            cleared: 0,
            matched: 0,
            modified: 0,
        };

        if snapshot.is_empty() {
            info!("Catalog is empty, nothing to do");
            report.finished_at = Utc::now();
            return Ok(report);
        }
        info!("Processing {} records", snapshot.len());

        let plan = self.engine.plan(&snapshot.records, cancel)?;
        report.groups = plan.stats.groups;
        report.orphans = plan.stats.orphans;
        report.skipped = plan.stats.skipped;
        report.operations = plan.operations.len();
        report.cleared = plan.operations.iter().filter(|op| op.similar.is_empty()).count();

        // Last point where a run can stop without touching storage
        cancel.check()?;

        if plan.operations.is_empty() {
            warn!("No operations generated");
        } else {
            info!("Writing {} updates to '{}'", plan.operations.len(), self.store.name());
            let result = self.store.bulk_write(&plan.operations)?;
            report.matched = result.matched;
            report.modified = result.modified;
            info!("Done. Matched: {} | Modified: {}", result.matched, result.modified);
        }

        report.finished_at = Utc::now();
        Ok(report)
    }
}

impl BatchJob for BatchRunner {
    fn execute(&self, run_id: Uuid, cancel: &CancelToken) -> Result<RunReport> {
        self.run(run_id, cancel)
    }
}
