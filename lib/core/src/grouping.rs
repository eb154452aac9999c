//! Grouping & fallback strategy
//!
//! The catalog is partitioned by group key and searched one group at a time.
//! A group with a single member cannot recommend anything internally, so its
//! member falls back to a search over the whole catalog minus itself.

use crate::knn::NeighborIndex;
use crate::reconcile::MatchKey;
use crate::{CatalogRecord, FeatureNormalizer};
use ahash::AHashMap;

/// Upper bound on recommendations per record
pub const MAX_RECOMMENDATIONS: usize = 10;

/// How the catalog is partitioned before searching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupingMode {
    /// One group per shape; references and match keys are `stockRef`
    #[default]
    ByShape,
    /// The whole catalog is one group; references and match keys are `_id`
    Ungrouped,
}

impl GroupingMode {
    /// The reference other records use to point at `record`
    pub fn reference(self, record: &CatalogRecord) -> String {
        match self {
            GroupingMode::ByShape => record.stock_ref.clone(),
            GroupingMode::Ungrouped => record.id.to_string(),
        }
    }

    /// The key an update for `record` is matched by
    pub fn match_key(self, record: &CatalogRecord) -> MatchKey {
        match self {
            GroupingMode::ByShape => MatchKey::StockRef(record.stock_ref.clone()),
            GroupingMode::Ungrouped => MatchKey::Id(record.id.clone()),
        }
    }
}

/// Records sharing one group key, as positions into the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'a> {
    pub key: &'a str,
    pub members: Vec<usize>,
}

impl Group<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    pub fn is_orphan(&self) -> bool {
        self.members.len() == 1
    }
}

/// Partition the snapshot. Groups come out in order of first appearance,
/// members in snapshot order.
pub fn partition(records: &[CatalogRecord], mode: GroupingMode) -> Vec<Group<'_>> {
    if mode == GroupingMode::Ungrouped {
        if records.is_empty() {
            return Vec::new();
        }
        return vec![Group {
            key: "",
            members: (0..records.len()).collect(),
        }];
    }

    let mut positions: AHashMap<&str, usize> = AHashMap::new();
    let mut groups: Vec<Group<'_>> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let key = record.group_key();
        let slot = *positions.entry(key).or_insert_with(|| {
            groups.push(Group { key, members: Vec::new() });
            groups.len() - 1
        });
        groups[slot].members.push(idx);
    }
    groups
}

/// Recommendations computed for one record
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborResult {
    /// Position of the record in the snapshot
    pub record: usize,
    pub key: MatchKey,
    /// References of similar records, nearest first
    pub similar: Vec<String>,
    /// Whether the list came from the cross-group fallback
    pub fallback: bool,
}

/// Runs normalizer and index over parts of one snapshot
pub struct GroupSearch<'a> {
    snapshot: &'a [CatalogRecord],
    normalizer: &'a FeatureNormalizer,
    mode: GroupingMode,
}

impl<'a> GroupSearch<'a> {
    pub fn new(snapshot: &'a [CatalogRecord], normalizer: &'a FeatureNormalizer, mode: GroupingMode) -> Self {
        Self {
            snapshot,
            normalizer,
            mode,
        }
    }

    /// Search a group of two or more members against itself only
    pub fn within_group(&self, members: &[usize]) -> Vec<NeighborResult> {
        let (matrix, _) = self.normalizer.fit(members.iter().map(|&i| &self.snapshot[i]));
        // One extra slot, since every row finds itself
        let k = (MAX_RECOMMENDATIONS + 1).min(members.len());
        let hits = NeighborIndex::new(matrix).search(k);

        members
            .iter()
            .zip(hits)
            .map(|(&record, hits)| {
                let candidates = hits.iter().map(|n| members[n.index]);
                self.result_for(record, candidates, false)
            })
            .collect()
    }

    /// Search the whole snapshot minus `orphan` on behalf of `orphan`
    pub fn across_catalog(&self, orphan: usize) -> NeighborResult {
        let others: Vec<usize> = (0..self.snapshot.len()).filter(|&i| i != orphan).collect();
        if others.is_empty() {
            return self.result_for(orphan, std::iter::empty(), true);
        }

        let (matrix, fitted) = self.normalizer.fit(others.iter().map(|&i| &self.snapshot[i]));
        let query = fitted.transform(&self.snapshot[orphan]);
        let k = MAX_RECOMMENDATIONS.min(others.len());
        let hits = NeighborIndex::new(matrix).query(&query, k);

        let candidates = hits.iter().map(|n| others[n.index]);
        self.result_for(orphan, candidates, true)
    }

    fn result_for<I>(&self, record: usize, candidates: I, fallback: bool) -> NeighborResult
    where
        I: Iterator<Item = usize>,
    {
        let own = self.mode.reference(&self.snapshot[record]);
        let similar = candidates
            .map(|i| self.mode.reference(&self.snapshot[i]))
            .filter(|reference| *reference != own)
            .take(MAX_RECOMMENDATIONS)
            .collect();

        NeighborResult {
            record,
            key: self.mode.match_key(&self.snapshot[record]),
            similar,
            fallback,
        }
    }
}
