use super::correlation::ItemSimilarityMatrix;
use crate::models::{ItemId, RatingMatrix, RatingRecord};
use crate::utils::sort_scored_desc;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;
pub const DEFAULT_RATING: f64 = 3.0;

/// Item-based rating prediction over a fitted similarity matrix.
pub struct RatingPredictor<'a> {
    ratings: &'a RatingMatrix,
    similarity: &'a ItemSimilarityMatrix,
    item_means: &'a HashMap<ItemId, f64>,
    popularity: &'a [(ItemId, f64)],
}

impl<'a> RatingPredictor<'a> {
    pub fn new(
        ratings: &'a RatingMatrix,
        similarity: &'a ItemSimilarityMatrix,
        item_means: &'a HashMap<ItemId, f64>,
        popularity: &'a [(ItemId, f64)],
    ) -> Self {
        Self {
            ratings,
            similarity,
            item_means,
            popularity,
        }
    }

    fn mean_or_default(&self, item_id: ItemId) -> f64 {
        self.item_means.get(&item_id).copied().unwrap_or(DEFAULT_RATING)
    }

    /// Similarity-weighted average of the user's ratings on the `k` most similar
    /// positively-correlated items they rated, clamped to the rating scale.
    pub fn predict(&self, user_id: &str, item_id: ItemId, k: usize) -> f64 {
        match self.ratings.user_ratings(user_id) {
            Some(rated) => self.predict_from(&rated, item_id, k),
            None => self.mean_or_default(item_id),
        }
    }

    fn predict_from(&self, rated: &[(ItemId, f64)], item_id: ItemId, k: usize) -> f64 {
        let Some(target_row) = self.similarity.row(item_id) else {
            return DEFAULT_RATING;
        };

        let mut neighbors: Vec<(f64, f64)> = rated
            .iter()
            .filter_map(|&(rated_item, rating)| {
                let sim = target_row[self.similarity.position(rated_item)?];
                (sim > 0.0).then_some((sim, rating))
            })
            .collect();
        if neighbors.is_empty() {
            return self.mean_or_default(item_id);
        }

        neighbors.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(k);

        let weight: f64 = neighbors.iter().map(|(sim, _)| sim).sum();
        if weight <= 0.0 {
            return self.mean_or_default(item_id);
        }
        let weighted: f64 = neighbors.iter().map(|(sim, rating)| sim * rating).sum();
        (weighted / weight).clamp(MIN_RATING, MAX_RATING)
    }

    /// Predicted scores for every fitted item the user has not rated, best first.
    /// `None` for a user without any usable rating history.
    pub fn rank_unrated(&self, user_id: &str, n: usize, k: usize) -> Option<Vec<(ItemId, f64)>> {
        let rated = self.ratings.user_ratings(user_id)?;
        if rated.is_empty() {
            return None;
        }

        let seen: HashSet<ItemId> = rated.iter().map(|(item, _)| *item).collect();
        let mut predictions: Vec<(ItemId, f64)> = self
            .ratings
            .items()
            .iter()
            .filter(|item| !seen.contains(*item))
            .map(|&item| (item, self.predict_from(&rated, item, k)))
            .collect();
        sort_scored_desc(&mut predictions);
        predictions.truncate(n);
        Some(predictions)
    }

    /// Global popularity ranking, the cold-start answer.
    pub fn popular(&self, n: usize) -> Vec<(ItemId, f64)> {
        self.popularity.iter().take(n).copied().collect()
    }

    /// Neighbors with a strictly positive, strictly sub-unity score, best first.
    /// `None` when the item has no similarity row.
    pub fn similar_items(&self, item_id: ItemId, n: usize) -> Option<Vec<(ItemId, f64)>> {
        let row = self.similarity.row(item_id)?;
        let mut neighbors: Vec<(ItemId, f64)> = self
            .similarity
            .items()
            .iter()
            .zip(row.iter())
            .filter(|(other, score)| **other != item_id && **score > 0.0 && **score < 1.0)
            .map(|(other, score)| (*other, *score))
            .collect();
        sort_scored_desc(&mut neighbors);
        neighbors.truncate(n);
        Some(neighbors)
    }
}

/// Items ranked by `count * mean rating`, ties by ascending id.
pub fn popularity_ranking(records: &[RatingRecord]) -> Vec<(ItemId, f64)> {
    let mut totals: BTreeMap<ItemId, (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = totals.entry(record.item_id).or_insert((0.0, 0));
        entry.0 += record.rating;
        entry.1 += 1;
    }
    let mut ranked: Vec<(ItemId, f64)> = totals
        .into_iter()
        .map(|(item, (sum, count))| (item, count as f64 * (sum / count as f64)))
        .collect();
    sort_scored_desc(&mut ranked);
    ranked
}
