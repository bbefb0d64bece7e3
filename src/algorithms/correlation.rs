//! Pairwise item-item affinity from co-ratings.
//!
//! The score for a pair depends on how many users rated both items:
//!
//! | common raters | score |
//! |---|---|
//! | 0 | metadata agreement (category, colour, ...) |
//! | 1 | `max(0, (5 - |r1 - r2|) / 5) * single_rater_discount` |
//! | 2 | `pearson * two_rater_discount`, metadata when undefined |
//! | 3+ | `identical_pattern_score` for identical vectors, else `min(pearson, cap)` |

use crate::config::CollaborativeConfig;
use crate::models::{Catalog, ItemId, RatingMatrix};
use nalgebra::DVector;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

const MAX_RATING: f64 = 5.0;
const DEFAULT_ITEM_MEAN: f64 = 3.0;

/// Symmetric item x item similarity with an exact 1.0 diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSimilarityMatrix {
    items: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
    values: Array2<f64>,
}

impl ItemSimilarityMatrix {
    fn identity(items: Vec<ItemId>) -> Self {
        let n = items.len();
        let index = items
            .iter()
            .enumerate()
            .map(|(pos, item)| (*item, pos))
            .collect();
        Self {
            items,
            index,
            values: Array2::eye(n),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn position(&self, item_id: ItemId) -> Option<usize> {
        self.index.get(&item_id).copied()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.index.contains_key(&item_id)
    }

    pub fn get(&self, a: ItemId, b: ItemId) -> Option<f64> {
        Some(self.values[[self.position(a)?, self.position(b)?]])
    }

    pub fn row(&self, item_id: ItemId) -> Option<ArrayView1<'_, f64>> {
        self.position(item_id).map(|pos| self.values.row(pos))
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }
}

/// Output of a correlation pass.
#[derive(Debug, Clone)]
pub struct CorrelationOutput {
    pub similarity: ItemSimilarityMatrix,
    pub item_means: HashMap<ItemId, f64>,
    /// Rating matrix restricted to the items that received similarity rows.
    pub ratings: RatingMatrix,
}

pub struct CorrelationEngine<'a> {
    config: &'a CollaborativeConfig,
    catalog: Option<&'a Catalog>,
}

impl<'a> CorrelationEngine<'a> {
    pub fn new(config: &'a CollaborativeConfig, catalog: Option<&'a Catalog>) -> Self {
        Self { config, catalog }
    }

    pub fn build_similarity_matrix(&self, ratings: &RatingMatrix) -> CorrelationOutput {
        let n_total = ratings.n_items();
        let ratings = if n_total > self.config.max_items {
            info!(
                from = n_total,
                to = self.config.max_items,
                "Limiting items to the most rated for memory efficiency"
            );
            ratings.retain_items(&select_top_items(ratings, self.config.max_items))
        } else {
            ratings.clone()
        };

        let items = ratings.items().to_vec();
        let n_items = items.len();
        info!(items = n_items, "Computing pairwise item correlations");

        let item_means: HashMap<ItemId, f64> = items
            .iter()
            .map(|&item| (item, ratings.item_mean(item).unwrap_or(DEFAULT_ITEM_MEAN)))
            .collect();

        let mut similarity = ItemSimilarityMatrix::identity(items.clone());
        for i in 0..n_items {
            if i % 50 == 0 {
                debug!(item = i + 1, total = n_items, "Processing item");
            }
            let column_i = ratings.item_column_entries(i);
            for j in (i + 1)..n_items {
                let common = common_ratings(column_i, ratings.item_column_entries(j));
                let score = self.pair_similarity(items[i], items[j], &common);
                similarity.values[[i, j]] = score;
                similarity.values[[j, i]] = score;
            }
        }

        info!(shape = ?similarity.values.dim(), "Item similarity matrix completed");

        CorrelationOutput {
            similarity,
            item_means,
            ratings,
        }
    }

    /// Similarity of two distinct items given their co-ratings as `(rating_a, rating_b)`.
    pub fn pair_similarity(&self, a: ItemId, b: ItemId, common: &[(f64, f64)]) -> f64 {
        match common.len() {
            0 => self.metadata_similarity(a, b),
            1 => {
                let (r1, r2) = common[0];
                ((MAX_RATING - (r1 - r2).abs()) / MAX_RATING).max(0.0)
                    * self.config.single_rater_discount
            }
            2 => {
                let (xs, ys) = split_pairs(common);
                match pearson(&xs, &ys) {
                    Some(r) => r * self.config.two_rater_discount,
                    None => self.metadata_similarity(a, b),
                }
            }
            _ => {
                let (xs, ys) = split_pairs(common);
                if xs == ys {
                    return self.config.identical_pattern_score;
                }
                match pearson(&xs, &ys) {
                    Some(r) => r.min(self.config.correlation_cap).max(-1.0),
                    None => 0.0,
                }
            }
        }
    }

    /// Weighted attribute agreement, capped. Falls back to the default score when
    /// either item has no catalog record.
    pub fn metadata_similarity(&self, a: ItemId, b: ItemId) -> f64 {
        let weights = &self.config.metadata;
        let (Some(first), Some(second)) = (
            self.catalog.and_then(|c| c.get(a)),
            self.catalog.and_then(|c| c.get(b)),
        ) else {
            return weights.default_score;
        };

        let checks = [
            (first.master_category == second.master_category, weights.master_category),
            (first.sub_category == second.sub_category, weights.sub_category),
            (first.article_type == second.article_type, weights.article_type),
            (first.gender == second.gender, weights.gender),
            (first.season == second.season, weights.season),
            (first.usage == second.usage, weights.usage),
            (first.base_colour == second.base_colour, weights.base_colour),
        ];
        let score: f64 = checks
            .iter()
            .filter(|(agrees, _)| *agrees)
            .map(|(_, weight)| weight)
            .sum();
        score.min(weights.cap)
    }
}

/// The `max_items` most-rated items, ties broken by ascending id.
pub fn select_top_items(ratings: &RatingMatrix, max_items: usize) -> Vec<ItemId> {
    let mut counted: Vec<(ItemId, usize)> = ratings
        .items()
        .iter()
        .enumerate()
        .map(|(col, &item)| (item, ratings.item_column_entries(col).len()))
        .collect();
    counted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counted.truncate(max_items);
    counted.into_iter().map(|(item, _)| item).collect()
}

/// Pearson correlation; `None` when either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let x = DVector::from_column_slice(xs);
    let y = DVector::from_column_slice(ys);
    let x = x.add_scalar(-x.mean());
    let y = y.add_scalar(-y.mean());

    let denominator = x.norm() * y.norm();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    Some((x.dot(&y) / denominator).clamp(-1.0, 1.0))
}

/// Merge-join of two sorted columns on user row.
fn common_ratings(a: &[(usize, f64)], b: &[(usize, f64)]) -> Vec<(f64, f64)> {
    let mut common = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                common.push((a[i].1, b[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    common
}

fn split_pairs(pairs: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    pairs.iter().copied().unzip()
}
