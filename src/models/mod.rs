mod catalog;
mod ratings;

pub use catalog::{Catalog, CatalogItem, FeatureFilter, CATEGORICAL_FIELDS, UNKNOWN_VALUE};
pub use ratings::{RatingMatrix, RatingRecord};

use serde::{Deserialize, Serialize};

pub type ItemId = u64;
pub type UserId = String;

/// A catalog record returned to callers, optionally carrying the score that ranked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    #[serde(flatten)]
    pub item: CatalogItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl RecommendedItem {
    pub fn new(item: CatalogItem) -> Self {
        Self { item, score: None }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn item_id(&self) -> ItemId {
        self.item.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborativeStats {
    pub users: usize,
    pub items: usize,
    pub similarity_shape: (usize, usize),
    pub zero_correlations: usize,
    pub non_zero_correlations: usize,
    pub non_zero_min: Option<f64>,
    pub non_zero_max: Option<f64>,
    pub non_zero_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_items: usize,
    pub unique_genders: usize,
    pub unique_categories: usize,
    pub unique_subcategories: usize,
    pub unique_article_types: usize,
    pub unique_colours: usize,
    pub year_range: Option<(i32, i32)>,
    pub feature_matrix_shape: (usize, usize),
    pub feature_matrix_sparsity: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureBreakdown {
    pub categorical: usize,
    pub numerical: usize,
    pub text: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub item_id: ItemId,
    pub item: CatalogItem,
    pub total_features: usize,
    pub active_features: usize,
    pub sparsity: f64,
    pub top_features: Vec<(String, f64)>,
    pub breakdown: FeatureBreakdown,
}
