use crate::FeatureVector;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::BinaryHeap;

/// Neighbor lists hold at most 11 entries in practice
pub type Neighbors = SmallVec<[Neighbor; 16]>;

/// One search hit: row position in the index and its distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// Exact nearest-neighbor index over a feature matrix
///
/// Built from scratch for every batch; nothing is kept between calls.
/// Ties in distance resolve by row order, so results are deterministic.
pub struct NeighborIndex {
    rows: Vec<FeatureVector>,
}

impl NeighborIndex {
    pub fn new(rows: Vec<FeatureVector>) -> Self {
        Self { rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `k` rows nearest to `query`, ascending by distance.
    /// `k` is clamped to the number of rows.
    pub fn query(&self, query: &FeatureVector, k: usize) -> Neighbors {
        let k = k.min(self.rows.len());
        if k == 0 {
            return Neighbors::new();
        }

        // Max-heap on (distance, row): the worst kept candidate sits on top
        let mut heap: BinaryHeap<(OrderedFloat<f64>, usize)> = BinaryHeap::with_capacity(k + 1);
        for (idx, row) in self.rows.iter().enumerate() {
            let dist = OrderedFloat(query.squared_distance(row));
            if heap.len() < k {
                heap.push((dist, idx));
            } else if let Some(&top) = heap.peek() {
                if (dist, idx) < top {
                    heap.pop();
                    heap.push((dist, idx));
                }
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|(dist, index)| Neighbor {
                index,
                distance: dist.into_inner().sqrt(),
            })
            .collect()
    }

    /// Neighbors of every indexed row, each list including the row itself
    pub fn search(&self, k: usize) -> Vec<Neighbors> {
        self.rows
            .par_iter()
            .map(|row| self.query(row, k))
            .collect()
    }
}

/// Distances and row indices for every row of `matrix`, `k` nearest each
pub fn search(matrix: Vec<FeatureVector>, k: usize) -> (Vec<Vec<f64>>, Vec<Vec<usize>>) {
    let results = NeighborIndex::new(matrix).search(k);
    let distances = results
        .iter()
        .map(|hits| hits.iter().map(|n| n.distance).collect())
        .collect();
    let indices = results
        .iter()
        .map(|hits| hits.iter().map(|n| n.index).collect())
        .collect();
    (distances, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn point(x: f64, y: f64) -> FeatureVector {
        FeatureVector::new([x, y, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn test_query_orders_by_distance() {
        let index = NeighborIndex::new(vec![point(0.0, 0.0), point(5.0, 0.0), point(1.0, 0.0), point(3.0, 4.0)]);
        let hits = index.query(&point(0.0, 0.0), 3);
        let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![0, 2, 1]);
        assert!((hits[2].distance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_ties_break_by_row_order() {
        let rows = vec![point(1.0, 0.0); 6];
        let index = NeighborIndex::new(rows);
        let hits = index.query(&point(1.0, 0.0), 4);
        let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);

        let symmetric = NeighborIndex::new(vec![point(-1.0, 0.0), point(0.0, 0.0), point(1.0, 0.0)]);
        let hits = symmetric.query(&point(0.0, 0.0), 3);
        let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_k_clamped_to_rows() {
        let index = NeighborIndex::new(vec![point(0.0, 0.0), point(1.0, 1.0)]);
        assert_eq!(index.query(&point(0.0, 0.0), 11).len(), 2);
        assert!(index.query(&point(0.0, 0.0), 0).is_empty());
        assert!(NeighborIndex::new(Vec::new()).query(&point(0.0, 0.0), 3).is_empty());
    }

    #[test]
    fn test_search_includes_self_first() {
        let (distances, indices) = search(vec![point(0.0, 0.0), point(10.0, 0.0), point(2.0, 0.0)], 2);
        assert_eq!(indices, vec![vec![0, 2], vec![1, 2], vec![2, 0]]);
        assert_eq!(distances[0][0], 0.0);
        assert!((distances[1][1] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_matches_full_sort_on_random_rows() {
        let mut rng = StdRng::seed_from_u64(11);
        let rows: Vec<FeatureVector> = (0..200)
            .map(|_| {
                let mut data = [0.0; crate::FEATURE_DIM];
                for v in data.iter_mut() {
                    // Coarse values so distance ties actually occur
                    *v = rng.random_range(0..4) as f64;
                }
                FeatureVector::new(data)
            })
            .collect();
        let index = NeighborIndex::new(rows.clone());

        for (q, query) in rows.iter().enumerate().take(20) {
            let mut expected: Vec<(f64, usize)> = rows
                .iter()
                .enumerate()
                .map(|(i, row)| (query.squared_distance(row), i))
                .collect();
            expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let expected: Vec<usize> = expected.iter().take(11).map(|&(_, i)| i).collect();

            let hits: Vec<usize> = index.query(query, 11).iter().map(|n| n.index).collect();
            assert_eq!(hits, expected, "row {}", q);
        }
    }
}
