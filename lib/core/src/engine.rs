use crate::grouping::{partition, GroupSearch, GroupingMode, NeighborResult};
use crate::reconcile::{ReconciliationBuilder, UpdateOperation};
use crate::{CatalogRecord, Error, FeatureNormalizer, FeatureWeights, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for the recommendation engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub weights: FeatureWeights,
    pub grouping: GroupingMode,
    /// Empty out the list of records that received no recommendations
    pub clear_stale: bool,
    /// Fan groups out over the rayon pool instead of a sequential loop
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: FeatureWeights::default(),
            grouping: GroupingMode::ByShape,
            clear_stale: false,
            parallel: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()
    }
}

/// Shared cancellation flag for one run
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Counters describing one engine pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub records: usize,
    pub groups: usize,
    /// Groups searched internally (two or more members)
    pub searched_groups: usize,
    /// Single-member groups resolved by the cross-group fallback
    pub orphans: usize,
    /// Records left without recommendations
    pub skipped: usize,
}

/// Everything one run will write
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub results: Vec<NeighborResult>,
    pub operations: Vec<UpdateOperation>,
    pub stats: EngineStats,
}

/// Computes similar-item lists for a catalog snapshot
pub struct SimilarityEngine {
    config: EngineConfig,
    normalizer: FeatureNormalizer,
}

impl SimilarityEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let normalizer = FeatureNormalizer::new(config.weights);
        Ok(Self { config, normalizer })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One result per snapshot record: grouped results in group order, then
    /// the orphans in group order.
    pub fn recommend(&self, snapshot: &[CatalogRecord], cancel: &CancelToken) -> Result<(Vec<NeighborResult>, EngineStats)> {
        let groups = partition(snapshot, self.config.grouping);
        let search = GroupSearch::new(snapshot, &self.normalizer, self.config.grouping);

        let (searched, orphans): (Vec<_>, Vec<_>) = groups.iter().partition(|g| g.len() >= 2);
        let mut stats = EngineStats {
            records: snapshot.len(),
            groups: groups.len(),
            searched_groups: searched.len(),
            orphans: orphans.len(),
            skipped: 0,
        };

        let search_group = |members: &[usize]| -> Result<Vec<NeighborResult>> {
            cancel.check()?;
            Ok(search.within_group(members))
        };
        let batches: Vec<Vec<NeighborResult>> = if self.config.parallel {
            searched
                .par_iter()
                .map(|group| {
                    debug!("Searching group '{}' with {} records", group.key, group.len());
                    search_group(&group.members)
                })
                .collect::<Result<_>>()?
        } else {
            searched
                .iter()
                .map(|group| {
                    debug!("Searching group '{}' with {} records", group.key, group.len());
                    search_group(&group.members)
                })
                .collect::<Result<_>>()?
        };

        let mut results: Vec<NeighborResult> = batches.into_iter().flatten().collect();

        // Orphans need the full snapshot, so they run after every group pass
        for group in &orphans {
            cancel.check()?;
            let orphan = group.members[0];
            warn!(
                "Group '{}' has a single record ({}), falling back to catalog-wide search",
                group.key, snapshot[orphan].stock_ref
            );
            results.push(search.across_catalog(orphan));
        }

        stats.skipped = results.iter().filter(|r| r.similar.is_empty()).count();
        Ok((results, stats))
    }

    /// Recommend and translate into the update batch for this snapshot
    pub fn plan(&self, snapshot: &[CatalogRecord], cancel: &CancelToken) -> Result<RunPlan> {
        let (results, stats) = self.recommend(snapshot, cancel)?;
        let operations = ReconciliationBuilder::new()
            .with_clear_stale(self.config.clear_stale)
            .build(results.clone());

        info!(
            "Planned {} updates for {} records ({} groups searched, {} orphans, {} skipped)",
            operations.len(),
            stats.records,
            stats.searched_groups,
            stats.orphans,
            stats.skipped
        );

        Ok(RunPlan {
            results,
            operations,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_weights_rejected() {
        let config = EngineConfig {
            weights: FeatureWeights { price: -2.0, carat: 2.0, color: 1.0 },
            ..Default::default()
        };
        assert!(matches!(SimilarityEngine::new(config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_snapshot() {
        let engine = SimilarityEngine::new(EngineConfig::default()).unwrap();
        let plan = engine.plan(&[], &CancelToken::new()).unwrap();
        assert!(plan.operations.is_empty());
        assert_eq!(plan.stats, EngineStats::default());
    }

    #[test]
    fn test_cancelled_before_start() {
        let records = vec![
            CatalogRecord::new(1u64, "A").with_shape("ROUND"),
            CatalogRecord::new(2u64, "B").with_shape("ROUND"),
        ];
        let engine = SimilarityEngine::new(EngineConfig::default()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(engine.plan(&records, &cancel), Err(Error::Cancelled)));
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(other.check().is_ok());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
