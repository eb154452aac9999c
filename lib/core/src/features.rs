//! Feature Normalizer
//!
//! Turns catalog records into fixed-width numeric vectors. Categorical
//! grades are ordinal-encoded, missing numbers become zero, every dimension
//! is standardized over the batch being normalized, and the configured
//! importance weights scale the standardized price, carat and color
//! dimensions so that they count for more (or less) in Euclidean distance.

use crate::grade::GradeScale;
use crate::{CatalogRecord, Error, RecordId, Result};
use serde::{Deserialize, Serialize};

/// Number of dimensions in a feature vector
pub const FEATURE_DIM: usize = 7;

/// Dimension positions inside a [`FeatureVector`]
pub mod dim {
    pub const PRICE: usize = 0;
    pub const CARAT: usize = 1;
    pub const DEPTH: usize = 2;
    pub const TABLE: usize = 3;
    pub const COLOR: usize = 4;
    pub const CLARITY: usize = 5;
    pub const CUT: usize = 6;
}

/// Importance multipliers for the weighted dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub price: f64,
    pub carat: f64,
    pub color: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            price: 1.5,
            carat: 2.0,
            color: 1.0,
        }
    }
}

impl FeatureWeights {
    /// Weights must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("price", self.price), ("carat", self.carat), ("color", self.color)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "weight '{}' must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Per-dimension multipliers; unweighted dimensions get 1.0
    pub fn per_dimension(&self) -> [f64; FEATURE_DIM] {
        let mut dims = [1.0; FEATURE_DIM];
        dims[dim::PRICE] = self.price;
        dims[dim::CARAT] = self.carat;
        dims[dim::COLOR] = self.color;
        dims
    }
}

/// A point in feature space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    data: [f64; FEATURE_DIM],
}

impl FeatureVector {
    #[inline]
    #[must_use]
    pub fn new(data: [f64; FEATURE_DIM]) -> Self {
        Self { data }
    }

    /// Raw (unscaled) encoding of a record
    pub fn from_record(record: &CatalogRecord) -> Self {
        let number = |v: Option<f64>| v.filter(|x| x.is_finite()).unwrap_or(0.0);
        let mut data = [0.0; FEATURE_DIM];
        data[dim::PRICE] = number(record.price);
        data[dim::CARAT] = number(record.weight);
        data[dim::DEPTH] = number(record.depth_percent);
        data[dim::TABLE] = number(record.table_percent);
        data[dim::COLOR] = GradeScale::Color.score(record.color.as_deref());
        data[dim::CLARITY] = GradeScale::Clarity.score(record.clarity.as_deref());
        data[dim::CUT] = GradeScale::Finish.score(record.cut_grade());
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn get(&self, dimension: usize) -> f64 {
        self.data[dimension]
    }

    #[inline]
    pub fn squared_distance(&self, other: &FeatureVector) -> f64 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// Euclidean distance
    #[inline]
    pub fn l2_distance(&self, other: &FeatureVector) -> f64 {
        self.squared_distance(other).sqrt()
    }
}

/// Per-dimension standardization statistics (population variance)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScaler {
    mean: [f64; FEATURE_DIM],
    scale: [f64; FEATURE_DIM],
}

impl FeatureScaler {
    /// Fit mean and standard deviation; a constant dimension keeps scale 1.0
    pub fn fit(rows: &[FeatureVector]) -> Self {
        let mut mean = [0.0; FEATURE_DIM];
        let mut scale = [1.0; FEATURE_DIM];
        if rows.is_empty() {
            return Self { mean, scale };
        }

        let n = rows.len() as f64;
        for d in 0..FEATURE_DIM {
            mean[d] = rows.iter().map(|r| r.data[d]).sum::<f64>() / n;
            let var = rows
                .iter()
                .map(|r| {
                    let dev = r.data[d] - mean[d];
                    dev * dev
                })
                .sum::<f64>()
                / n;
            let std = var.sqrt();
            // Rounding noise on a constant column must not be blown up to unit scale
            if std > 10.0 * f64::EPSILON * mean[d].abs().max(1.0) {
                scale[d] = std;
            }
        }

        Self { mean, scale }
    }

    #[inline]
    pub fn mean(&self) -> &[f64; FEATURE_DIM] {
        &self.mean
    }

    #[inline]
    pub fn scale(&self) -> &[f64; FEATURE_DIM] {
        &self.scale
    }

    #[inline]
    pub fn transform(&self, row: &FeatureVector) -> FeatureVector {
        let mut data = [0.0; FEATURE_DIM];
        for (d, value) in data.iter_mut().enumerate() {
            *value = (row.data[d] - self.mean[d]) / self.scale[d];
        }
        FeatureVector { data }
    }
}

/// Statistics fitted on one batch, reusable for query vectors of that batch
#[derive(Debug, Clone)]
pub struct FittedNormalizer {
    scaler: FeatureScaler,
    multipliers: [f64; FEATURE_DIM],
}

impl FittedNormalizer {
    /// Standardize and weight a record with this batch's statistics
    pub fn transform(&self, record: &CatalogRecord) -> FeatureVector {
        self.transform_raw(&FeatureVector::from_record(record))
    }

    fn transform_raw(&self, raw: &FeatureVector) -> FeatureVector {
        let mut scaled = self.scaler.transform(raw);
        for (value, weight) in scaled.data.iter_mut().zip(self.multipliers.iter()) {
            *value *= weight;
        }
        scaled
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }
}

/// Converts records into weighted, standardized feature vectors
#[derive(Debug, Clone, Default)]
pub struct FeatureNormalizer {
    weights: FeatureWeights,
}

impl FeatureNormalizer {
    pub fn new(weights: FeatureWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &FeatureWeights {
        &self.weights
    }

    /// Normalize a batch. Returns the feature matrix and the parallel ids.
    /// An empty batch yields two empty vectors.
    pub fn normalize<'a, I>(&self, records: I) -> (Vec<FeatureVector>, Vec<RecordId>)
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let records: Vec<&CatalogRecord> = records.into_iter().collect();
        let (matrix, _) = self.fit(records.iter().copied());
        let ids = records.iter().map(|r| r.id.clone()).collect();
        (matrix, ids)
    }

    /// Normalize a batch and keep its statistics for later queries
    pub fn fit<'a, I>(&self, records: I) -> (Vec<FeatureVector>, FittedNormalizer)
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let raw: Vec<FeatureVector> = records.into_iter().map(FeatureVector::from_record).collect();
        let fitted = FittedNormalizer {
            scaler: FeatureScaler::fit(&raw),
            multipliers: self.weights.per_dimension(),
        };
        let matrix = raw.iter().map(|row| fitted.transform_raw(row)).collect();
        (matrix, fitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone(id: &str, price: f64, weight: f64) -> CatalogRecord {
        CatalogRecord::new(id, id)
            .with_shape("ROUND")
            .with_price(price)
            .with_weight(weight)
            .with_proportions(61.5, 57.0)
            .with_grades("G", "VS1", "EX")
    }

    #[test]
    fn test_empty_batch() {
        let normalizer = FeatureNormalizer::default();
        let (matrix, ids) = normalizer.normalize(std::iter::empty::<&CatalogRecord>());
        assert!(matrix.is_empty());
        assert!(ids.is_empty());
    }

    #[test]
    fn test_raw_encoding_defaults() {
        let record = CatalogRecord::new("x", "X").with_price(1000.0);
        let raw = FeatureVector::from_record(&record);
        assert_eq!(raw.get(dim::PRICE), 1000.0);
        assert_eq!(raw.get(dim::CARAT), 0.0);
        assert_eq!(raw.get(dim::DEPTH), 0.0);
        assert_eq!(raw.get(dim::COLOR), 11.0);
        assert_eq!(raw.get(dim::CLARITY), 11.0);
        assert_eq!(raw.get(dim::CUT), 5.0);
    }

    #[test]
    fn test_standardized_columns() {
        let records = vec![stone("a", 1000.0, 0.5), stone("b", 2000.0, 1.0), stone("c", 3000.0, 1.5)];
        let weights = FeatureWeights { price: 1.0, carat: 1.0, color: 1.0 };
        let (matrix, ids) = FeatureNormalizer::new(weights).normalize(&records);

        assert_eq!(ids, vec![RecordId::from("a"), RecordId::from("b"), RecordId::from("c")]);
        for d in [dim::PRICE, dim::CARAT] {
            let mean: f64 = matrix.iter().map(|r| r.get(d)).sum::<f64>() / 3.0;
            let var: f64 = matrix.iter().map(|r| (r.get(d) - mean).powi(2)).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-9);
            assert!((var - 1.0).abs() < 1e-9);
        }
        // Constant columns are centered, not inflated
        for row in &matrix {
            assert_eq!(row.get(dim::DEPTH), 0.0);
            assert_eq!(row.get(dim::COLOR), 0.0);
        }
    }

    #[test]
    fn test_weights_scale_standardized_dimension() {
        let records = vec![stone("a", 1000.0, 0.5), stone("b", 3000.0, 1.5)];
        let light = FeatureNormalizer::new(FeatureWeights { price: 1.0, carat: 1.0, color: 1.0 });
        let heavy = FeatureNormalizer::new(FeatureWeights { price: 3.0, carat: 1.0, color: 1.0 });

        let (m1, _) = light.normalize(&records);
        let (m2, _) = heavy.normalize(&records);
        assert!((m2[0].get(dim::PRICE) - 3.0 * m1[0].get(dim::PRICE)).abs() < 1e-9);
        assert!((m2[0].get(dim::CARAT) - m1[0].get(dim::CARAT)).abs() < 1e-9);
        assert!(m2[0].l2_distance(&m2[1]) > m1[0].l2_distance(&m1[1]));
    }

    #[test]
    fn test_fitted_transform_matches_batch() {
        let records = vec![stone("a", 1000.0, 0.5), stone("b", 2500.0, 1.1), stone("c", 4000.0, 2.0)];
        let normalizer = FeatureNormalizer::default();
        let (matrix, fitted) = normalizer.fit(&records);
        assert_eq!(fitted.transform(&records[1]), matrix[1]);
    }

    #[test]
    fn test_invalid_weights() {
        let weights = FeatureWeights { price: -1.0, ..Default::default() };
        assert!(matches!(weights.validate(), Err(Error::InvalidConfig(_))));
        let weights = FeatureWeights { color: f64::NAN, ..Default::default() };
        assert!(weights.validate().is_err());
        assert!(FeatureWeights::default().validate().is_ok());
    }

    #[test]
    fn test_fitted_statistics() {
        let records = vec![stone("a", 1000.0, 0.5), stone("b", 2000.0, 1.0), stone("c", 3000.0, 1.5)];
        let (_, fitted) = FeatureNormalizer::default().fit(&records);
        let scaler = fitted.scaler();

        assert!((scaler.mean()[dim::PRICE] - 2000.0).abs() < 1e-9);
        assert!((scaler.scale()[dim::PRICE] - 1000.0 * (2.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert_eq!(scaler.mean()[dim::DEPTH], 61.5);
        assert_eq!(scaler.scale()[dim::DEPTH], 1.0);
    }
}
