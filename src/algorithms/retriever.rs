use super::encoder::{FeatureMatrix, SparseVector};
use crate::config::ContentConfig;
use crate::models::Catalog;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Cosine similarity of two sparse rows; 0.0 when either row is all zeros.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let norm_a = a.norm();
    let norm_b = b.norm();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        a.dot(b) / (norm_a * norm_b)
    }
}

/// Scores every catalog row against a query vector on demand.
pub struct ContentRetriever<'a> {
    features: &'a FeatureMatrix,
    catalog: &'a Catalog,
    config: &'a ContentConfig,
}

impl<'a> ContentRetriever<'a> {
    pub fn new(features: &'a FeatureMatrix, catalog: &'a Catalog, config: &'a ContentConfig) -> Self {
        Self {
            features,
            catalog,
            config,
        }
    }

    /// Raw cosine against every row, in catalog order.
    pub fn score_all(&self, query: &SparseVector) -> Vec<f64> {
        self.features
            .rows()
            .par_iter()
            .map(|row| cosine_similarity(query, row))
            .collect()
    }

    /// Rows ranked against catalog row `query_row`, excluding the query row itself,
    /// with near-duplicate scores damped.
    pub fn rank_row(&self, query_row: usize, n: usize) -> Vec<(usize, f64)> {
        let Some(query) = self.features.row(query_row) else {
            return Vec::new();
        };
        let mut scores = self.score_all(query);
        self.apply_duplicate_correction(query_row, &mut scores);
        top_k_excluding(&scores, Some(query_row), n)
    }

    /// Rows ranked against an arbitrary encoded vector; nothing is excluded or damped.
    pub fn rank_vector(&self, query: &SparseVector, n: usize) -> Vec<(usize, f64)> {
        let scores = self.score_all(query);
        top_k_excluding(&scores, None, n)
    }

    /// Items that are nearly identical to the query and share its categorical
    /// attributes get `min(cap, sim * penalty)`, so distinct products never tie at 1.0.
    /// The match covers all seven categoricals, gender included; pairs differing
    /// only in gender are left uncorrected.
    fn apply_duplicate_correction(&self, query_row: usize, scores: &mut [f64]) {
        let items = self.catalog.items();
        let Some(query) = items.get(query_row) else {
            return;
        };
        let tuple = query.categorical_values();
        for (row, score) in scores.iter_mut().enumerate() {
            if row == query_row || *score <= self.config.duplicate_threshold {
                continue;
            }
            if items.get(row).map(|item| item.categorical_values()) == Some(tuple) {
                *score = self.config.duplicate_cap.min(*score * self.config.duplicate_penalty);
            }
        }
    }
}

/// Indices of the `k` highest scores, ties kept in index order.
pub fn top_k_excluding(scores: &[f64], exclude: Option<usize>, k: usize) -> Vec<(usize, f64)> {
    let mut indexed: Vec<(usize, f64)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(row, _)| Some(*row) != exclude)
        .collect();

    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    indexed.truncate(k);
    indexed
}
