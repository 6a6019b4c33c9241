//! Session gallery and nearest-neighbour matching.
//!
//! A [`Gallery`] is the ordered snapshot of enrolled students used for one
//! recognition session. Index order is storage order, and every embedding in
//! a gallery has the same dimensionality.

use crate::types::{Embedding, StudentRecord};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GalleryError {
    #[error("student {id}: embedding has {actual} dimensions, gallery uses {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },
}

/// Ordered, read-only snapshot of student records.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    records: Vec<StudentRecord>,
    dim: usize,
}

impl Gallery {
    /// Build a gallery, rejecting records whose embedding length differs
    /// from the first record's.
    pub fn new(records: Vec<StudentRecord>) -> Result<Self, GalleryError> {
        let dim = records.first().map(|r| r.embedding.dim()).unwrap_or(0);
        if let Some(bad) = records.iter().find(|r| r.embedding.dim() != dim) {
            return Err(GalleryError::DimensionMismatch {
                id: bad.id.clone(),
                expected: dim,
                actual: bad.embedding.dim(),
            });
        }
        Ok(Self { records, dim })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embedding dimensionality (0 for an empty gallery).
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, index: usize) -> Option<&StudentRecord> {
        self.records.get(index)
    }

    pub fn find(&self, student_id: &str) -> Option<&StudentRecord> {
        self.records.iter().find(|r| r.id == student_id)
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }
}

/// Result of matching a query embedding against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the nearest gallery entry (`f32::INFINITY` if none).
    pub distance: f32,
    /// Gallery index of the nearest entry, set only when `matched`.
    pub index: Option<usize>,
}

impl MatchResult {
    fn no_match(distance: f32) -> Self {
        Self {
            matched: false,
            distance,
            index: None,
        }
    }
}

/// Strategy for comparing a query embedding against a gallery.
pub trait Matcher {
    fn compare(&self, query: &Embedding, gallery: &Gallery) -> MatchResult;
}

/// Accepts the globally nearest entry when its Euclidean distance is
/// strictly below `tolerance`. Equal distances keep the lowest index.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatcher {
    pub tolerance: f32,
}

impl NearestMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }
}

impl Matcher for NearestMatcher {
    fn compare(&self, query: &Embedding, gallery: &Gallery) -> MatchResult {
        if gallery.is_empty() {
            return MatchResult::no_match(f32::INFINITY);
        }
        if query.dim() != gallery.dim() {
            tracing::warn!(
                query = query.dim(),
                gallery = gallery.dim(),
                "query embedding dimensionality does not match gallery"
            );
            return MatchResult::no_match(f32::INFINITY);
        }

        let mut best_dist = f32::INFINITY;
        let mut best_idx = None;

        for (i, record) in gallery.records().iter().enumerate() {
            let dist = query.distance(&record.embedding);
            // Strict comparison: the first index wins a tie.
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_dist < self.tolerance => MatchResult {
                matched: true,
                distance: best_dist,
                index: Some(idx),
            },
            _ => MatchResult::no_match(best_dist),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, values: Vec<f32>) -> StudentRecord {
        StudentRecord {
            id: id.into(),
            name: format!("name-{id}"),
            embedding: Embedding::new(values),
            voice_path: None,
        }
    }

    #[test]
    fn test_gallery_rejects_mixed_dimensions() {
        let err = Gallery::new(vec![
            record("S1", vec![0.0, 1.0]),
            record("S2", vec![0.0, 1.0, 2.0]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            GalleryError::DimensionMismatch {
                id: "S2".into(),
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_gallery_preserves_order() {
        let records = vec![record("B", vec![1.0]), record("A", vec![2.0])];
        let g = Gallery::new(records).unwrap();
        assert_eq!(g.get(0).unwrap().id, "B");
        assert_eq!(g.find("A").unwrap().embedding.values, vec![2.0]);
        assert_eq!(g.dim(), 1);
    }

    #[test]
    fn test_identical_query_matches_with_zero_distance() {
        let records = vec![record("S1", vec![0.1, 0.2, 0.3])];
        let g = Gallery::new(records).unwrap();
        let query = Embedding::new(vec![0.1, 0.2, 0.3]);
        let result = NearestMatcher::new(1e-6).compare(&query, &g);
        assert!(result.matched);
        assert_eq!(result.distance, 0.0);
        assert_eq!(result.index, Some(0));
    }

    #[test]
    fn test_nearest_wins_over_first_within_tolerance() {
        let g = Gallery::new(vec![
            record("far", vec![0.4, 0.0]),
            record("near", vec![0.1, 0.0]),
        ])
        .unwrap();
        let query = Embedding::new(vec![0.0, 0.0]);
        let result = NearestMatcher::new(0.5).compare(&query, &g);
        assert_eq!(result.index, Some(1));
    }

    #[test]
    fn test_tie_resolves_to_first_index() {
        let g = Gallery::new(vec![
            record("first", vec![1.0, 0.0]),
            record("second", vec![-1.0, 0.0]),
        ])
        .unwrap();
        let query = Embedding::new(vec![0.0, 0.0]);
        let result = NearestMatcher::new(2.0).compare(&query, &g);
        assert!(result.matched);
        assert_eq!(result.index, Some(0));
    }

    #[test]
    fn test_distance_at_tolerance_is_rejected() {
        let g = Gallery::new(vec![record("S1", vec![0.5])]).unwrap();
        let query = Embedding::new(vec![0.0]);
        let result = NearestMatcher::new(0.5).compare(&query, &g);
        assert!(!result.matched);
        assert_eq!(result.index, None);
        assert!((result.distance - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_gallery_never_matches() {
        let query = Embedding::new(vec![1.0]);
        let empty = Gallery::default();
        let result = NearestMatcher::new(10.0).compare(&query, &empty);
        assert!(!result.matched);
        assert!(result.distance.is_infinite());
    }

    #[test]
    fn test_dimension_mismatch_never_matches() {
        let g = Gallery::new(vec![record("S1", vec![0.0, 0.0])]).unwrap();
        let query = Embedding::new(vec![0.0]);
        assert!(!NearestMatcher::new(10.0).compare(&query, &g).matched);
    }
}
