use crate::algorithms::encoder::{FeatureBlock, FeatureEncoder, FeatureMatrix};
use crate::algorithms::retriever::ContentRetriever;
use crate::algorithms::SimilarityEngine;
use crate::config::{Config, ContentConfig};
use crate::error::{RecommenderError, Result};
use crate::models::{
    Catalog, CatalogItem, DatasetStats, FeatureBreakdown, FeatureFilter, FeatureImportance, ItemId,
    RecommendedItem,
};
use crate::services::catalog::load_catalog;
use crate::services::snapshot::{
    read_blob, write_blob, write_snapshot, EngineKind, SnapshotHeader, SnapshotReader, FORMAT_VERSION,
    LEGACY_SPLIT_VERSION,
};
use crate::utils::validation::validate_content_config;
use crate::utils::{sibling_with_suffix, strip_stem_suffix};
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ENGINE: &str = "content";
const TOP_FEATURES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ContentState {
    config: ContentConfig,
    catalog: Catalog,
    encoder: FeatureEncoder,
    features: FeatureMatrix,
}

/// Split layout: the feature matrix is stored in a sidecar file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LegacyContentState {
    config: ContentConfig,
    catalog: Catalog,
    encoder: FeatureEncoder,
    feature_matrix_path: PathBuf,
}

/// Attribute-based recommendations: cosine similarity over encoded item rows.
#[derive(Debug, Clone)]
pub struct ContentRecommender {
    config: ContentConfig,
    state: Option<ContentState>,
}

impl ContentRecommender {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.content.clone(),
            state: None,
        }
    }

    pub fn fit(&mut self, catalog_path: &Path) -> Result<()> {
        let catalog = load_catalog(catalog_path)?;
        self.fit_catalog(catalog)
    }

    pub fn fit_catalog(&mut self, catalog: Catalog) -> Result<()> {
        validate_content_config(&self.config).map_err(|e| RecommenderError::InvalidInput(e.to_string()))?;
        if catalog.is_empty() {
            return Err(RecommenderError::InvalidInput("catalog has no items".to_string()));
        }

        let (encoder, features) = FeatureEncoder::fit_transform(&catalog, &self.config);
        info!(
            shape = ?features.shape(),
            sparsity = features.sparsity(),
            "Feature matrix built"
        );
        self.state = Some(ContentState {
            config: self.config.clone(),
            catalog,
            encoder,
            features,
        });
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> Result<&ContentState> {
        self.state.as_ref().ok_or(RecommenderError::NotFitted { engine: ENGINE })
    }

    fn retriever<'a>(&self, state: &'a ContentState) -> ContentRetriever<'a> {
        ContentRetriever::new(&state.features, &state.catalog, &state.config)
    }

    /// The `n` catalog items most similar to `item_id`, best first.
    pub fn get_recommendations(
        &self,
        item_id: ItemId,
        n: usize,
        include_scores: bool,
    ) -> Result<Vec<RecommendedItem>> {
        let state = self.state()?;
        let row = state
            .catalog
            .row_of(item_id)
            .ok_or(RecommenderError::UnknownItem(item_id))?;

        let items = state.catalog.items();
        Ok(self
            .retriever(state)
            .rank_row(row, usize::MAX)
            .into_iter()
            .filter(|(other, _)| items[*other].id != item_id)
            .take(n)
            .map(|(other, score)| {
                let record = RecommendedItem::new(items[other].clone());
                if include_scores {
                    record.with_score(score)
                } else {
                    record
                }
            })
            .collect())
    }

    /// Neighbors with a strictly positive, strictly sub-unity score, best first.
    pub fn find_similar_items(&self, item_id: ItemId, n: usize) -> Result<Vec<(ItemId, f64)>> {
        let state = self.state()?;
        let row = state
            .catalog
            .row_of(item_id)
            .ok_or(RecommenderError::UnknownItem(item_id))?;

        let items = state.catalog.items();
        Ok(self
            .retriever(state)
            .rank_row(row, usize::MAX)
            .into_iter()
            .map(|(other, score)| (items[other].id, score))
            .filter(|(other, score)| *other != item_id && *score > 0.0 && *score < 1.0)
            .take(n)
            .collect())
    }

    pub fn feature_matrix(&self) -> Result<&FeatureMatrix> {
        Ok(&self.state()?.features)
    }

    /// Items matching every given attribute, in catalog order. Without any
    /// constraint a random sample is returned.
    pub fn find_similar_by_features(&self, filter: &FeatureFilter, n: usize) -> Result<Vec<CatalogItem>> {
        let state = self.state()?;
        let items = state.catalog.items();
        if filter.is_empty() {
            let mut rows = sample(&mut rand::thread_rng(), items.len(), n.min(items.len())).into_vec();
            rows.sort_unstable();
            return Ok(rows.into_iter().map(|row| items[row].clone()).collect());
        }

        Ok(items
            .iter()
            .filter(|item| filter.matches(item))
            .take(n)
            .cloned()
            .collect())
    }

    /// Recommendations for an item that may not be in the catalog. Unknown
    /// attribute values simply contribute nothing to the encoded row.
    pub fn recommend_for_item(&self, item: &CatalogItem, n: usize) -> Result<Vec<RecommendedItem>> {
        let state = self.state()?;
        let query = state.encoder.transform(item);
        let items = state.catalog.items();
        Ok(self
            .retriever(state)
            .rank_vector(&query, usize::MAX)
            .into_iter()
            .filter(|(row, _)| items[*row].id != item.id)
            .take(n)
            .map(|(row, score)| RecommendedItem::new(items[row].clone()).with_score(score))
            .collect())
    }

    pub fn item_details(&self, item_id: ItemId) -> Result<CatalogItem> {
        self.state()?
            .catalog
            .get(item_id)
            .cloned()
            .ok_or(RecommenderError::UnknownItem(item_id))
    }

    pub fn feature_importance(&self, item_id: ItemId) -> Result<FeatureImportance> {
        let state = self.state()?;
        let row = state
            .catalog
            .row_of(item_id)
            .ok_or(RecommenderError::UnknownItem(item_id))?;
        let vector = state
            .features
            .row(row)
            .ok_or(RecommenderError::UnknownItem(item_id))?;
        let names = state.encoder.feature_names();

        let mut breakdown = FeatureBreakdown::default();
        let mut active: Vec<(String, f64)> = Vec::with_capacity(vector.nnz());
        for (col, value) in vector.iter() {
            match state.encoder.block_of(col) {
                FeatureBlock::Categorical => breakdown.categorical += 1,
                FeatureBlock::Numerical => breakdown.numerical += 1,
                FeatureBlock::Text => breakdown.text += 1,
            }
            let name = names.get(col).cloned().unwrap_or_else(|| format!("feature_{}", col));
            active.push((name, value));
        }
        active.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total = state.features.width();
        let active_features = vector.nnz();
        active.truncate(TOP_FEATURES);
        Ok(FeatureImportance {
            item_id,
            item: state.catalog.items()[row].clone(),
            total_features: total,
            active_features,
            sparsity: if total == 0 {
                0.0
            } else {
                1.0 - active_features as f64 / total as f64
            },
            top_features: active,
            breakdown,
        })
    }

    pub fn dataset_stats(&self) -> Result<DatasetStats> {
        let state = self.state()?;
        let items = state.catalog.items();
        let distinct = |field: usize| -> usize {
            items
                .iter()
                .map(|item| item.categorical_values()[field])
                .collect::<HashSet<_>>()
                .len()
        };
        let year_range = items
            .iter()
            .map(|item| item.year)
            .fold(None, |range: Option<(i32, i32)>, year| match range {
                None => Some((year, year)),
                Some((lo, hi)) => Some((lo.min(year), hi.max(year))),
            });

        Ok(DatasetStats {
            total_items: items.len(),
            unique_genders: distinct(0),
            unique_categories: distinct(1),
            unique_subcategories: distinct(2),
            unique_article_types: distinct(3),
            unique_colours: distinct(4),
            year_range,
            feature_matrix_shape: state.features.shape(),
            feature_matrix_sparsity: state.features.sparsity(),
        })
    }

    pub fn catalog(&self) -> Result<&Catalog> {
        Ok(&self.state()?.catalog)
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let state = self.state()?;
        write_snapshot(path, &SnapshotHeader::new(EngineKind::Content, FORMAT_VERSION), state)
    }

    /// Writes the split layout: the feature matrix goes to `<stem>_features.<ext>`
    /// and the primary file records where it is.
    pub fn save_split_snapshot(&self, path: &Path) -> Result<PathBuf> {
        let state = self.state()?;
        let sidecar = sibling_with_suffix(path, "_features");
        write_blob(&sidecar, &state.features)?;
        let legacy = LegacyContentState {
            config: state.config.clone(),
            catalog: state.catalog.clone(),
            encoder: state.encoder.clone(),
            feature_matrix_path: sidecar.clone(),
        };
        write_snapshot(
            path,
            &SnapshotHeader::new(EngineKind::Content, LEGACY_SPLIT_VERSION),
            &legacy,
        )?;
        Ok(sidecar)
    }

    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let reader = SnapshotReader::open(path, EngineKind::Content)?;
        let mut state = if reader.header().format_version == LEGACY_SPLIT_VERSION {
            let legacy: LegacyContentState = reader.read_state()?;
            let sidecar = locate_sidecar(path, &legacy.feature_matrix_path)?;
            let features: FeatureMatrix = read_blob(&sidecar)?;
            ContentState {
                config: legacy.config,
                catalog: legacy.catalog,
                encoder: legacy.encoder,
                features,
            }
        } else {
            reader.read_state::<ContentState>()?
        };

        if state.features.n_rows() != state.catalog.len() {
            return Err(RecommenderError::SnapshotIncomplete {
                path: path.to_path_buf(),
                reason: format!(
                    "feature matrix has {} rows for {} catalog items",
                    state.features.n_rows(),
                    state.catalog.len()
                ),
            });
        }
        state.encoder.rebuild_lookup();

        Ok(Self {
            config: state.config.clone(),
            state: Some(state),
        })
    }
}

/// Recorded path first, then `<stem>_features.<ext>` beside the primary file,
/// then the same with an `_optimized` stem suffix removed.
fn locate_sidecar(primary: &Path, recorded: &Path) -> Result<PathBuf> {
    let mut candidates = vec![recorded.to_path_buf(), sibling_with_suffix(primary, "_features")];
    if let Some(stripped) = strip_stem_suffix(primary, "_optimized") {
        candidates.push(sibling_with_suffix(&stripped, "_features"));
    }

    match candidates.iter().find(|candidate| candidate.exists()) {
        Some(found) => {
            if found != recorded {
                warn!(
                    recorded = %recorded.display(),
                    found = %found.display(),
                    "Feature matrix not at its recorded path, using fallback"
                );
            }
            Ok(found.clone())
        }
        None => Err(RecommenderError::SnapshotIncomplete {
            path: primary.to_path_buf(),
            reason: format!(
                "feature matrix not found (tried {})",
                candidates
                    .iter()
                    .map(|c| c.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}

impl SimilarityEngine for ContentRecommender {
    fn engine_name(&self) -> &'static str {
        ENGINE
    }

    fn is_fitted(&self) -> bool {
        ContentRecommender::is_fitted(self)
    }

    fn similar_items(&self, item_id: ItemId, k: usize) -> Result<Vec<(ItemId, f64)>> {
        self.find_similar_items(item_id, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: ItemId, article_type: &str, colour: &str, name: &str) -> CatalogItem {
        CatalogItem {
            id,
            gender: "Men".to_string(),
            master_category: "Apparel".to_string(),
            sub_category: "Topwear".to_string(),
            article_type: article_type.to_string(),
            base_colour: colour.to_string(),
            season: "Summer".to_string(),
            usage: "Casual".to_string(),
            year: 2010 + (id % 4) as i32,
            product_display_name: name.to_string(),
        }
    }

    fn fitted() -> ContentRecommender {
        let catalog = Catalog::new(vec![
            item(1, "Tshirts", "Blue", "Nike Men Blue Tshirt"),
            item(2, "Tshirts", "Blue", "Nike Men Blue Polo Tshirt"),
            item(3, "Shirts", "White", "Arrow Men White Formal Shirt"),
            item(4, "Shirts", "Blue", "Arrow Men Blue Shirt"),
            item(5, "Jeans", "Black", "Levis Men Black Jeans"),
        ]);
        let mut engine = ContentRecommender::new(&Config::default());
        engine.fit_catalog(catalog).unwrap();
        engine
    }

    #[test]
    fn test_not_fitted() {
        let engine = ContentRecommender::new(&Config::default());
        assert!(matches!(
            engine.get_recommendations(1, 3, true),
            Err(RecommenderError::NotFitted { engine: "content" })
        ));
    }

    #[test]
    fn test_recommendations_exclude_query_and_are_sorted() {
        let engine = fitted();
        let recs = engine.get_recommendations(1, 3, true).unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].item_id(), 2);
        assert!(recs.iter().all(|r| r.item_id() != 1));
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));

        let bare = engine.get_recommendations(1, 3, false).unwrap();
        assert!(bare.iter().all(|r| r.score.is_none()));
        assert!(matches!(engine.get_recommendations(99, 3, true), Err(RecommenderError::UnknownItem(99))));
    }

    #[test]
    fn test_similar_items_drop_non_positive_scores() {
        let mut disjoint = item(2, "Jeans", "Black", "Levis Denim");
        disjoint.gender = "Women".to_string();
        disjoint.master_category = "Bottomwear".to_string();
        disjoint.sub_category = "Pants".to_string();
        disjoint.season = "Winter".to_string();
        disjoint.usage = "Formal".to_string();
        let mut other = item(3, "Heels", "Red", "Catwalk Stilettos");
        other.gender = "Unisex".to_string();
        other.master_category = "Footwear".to_string();
        other.sub_category = "Shoes".to_string();
        other.season = "Fall".to_string();
        other.usage = "Party".to_string();

        let mut engine = ContentRecommender::new(&Config::default());
        engine
            .fit_catalog(Catalog::new(vec![
                item(1, "Tshirts", "Blue", "Nike Tshirt"),
                disjoint,
                other,
            ]))
            .unwrap();

        let raw = engine.get_recommendations(1, 5, true).unwrap();
        assert_eq!(raw.len(), 2);
        assert!(raw.iter().any(|r| r.score.unwrap() <= 0.0));

        let similar = engine.find_similar_items(1, 5).unwrap();
        assert!(similar.iter().all(|(id, s)| *id != 1 && *s > 0.0 && *s < 1.0));
        assert_eq!(SimilarityEngine::similar_items(&engine, 1, 5).unwrap(), similar);
    }

    #[test]
    fn test_feature_filter_and_random_sample() {
        let engine = fitted();
        let filter = FeatureFilter {
            base_colour: Some("Blue".to_string()),
            ..Default::default()
        };
        let ids: Vec<ItemId> = engine
            .find_similar_by_features(&filter, 10)
            .unwrap()
            .iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 4]);
        assert_eq!(engine.find_similar_by_features(&FeatureFilter::default(), 3).unwrap().len(), 3);
        assert_eq!(engine.find_similar_by_features(&FeatureFilter::default(), 50).unwrap().len(), 5);
    }

    #[test]
    fn test_recommend_for_unseen_item() {
        let engine = fitted();
        let unseen = item(77, "Kurtas", "Blue", "Nike Blue Kurta");
        let recs = engine.recommend_for_item(&unseen, 2).unwrap();
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.score.is_some()));
    }

    #[test]
    fn test_feature_importance_and_stats() {
        let engine = fitted();
        let importance = engine.feature_importance(3).unwrap();
        assert_eq!(importance.breakdown.categorical, 7);
        assert_eq!(importance.active_features, importance.top_features.len());
        assert!(importance.top_features.windows(2).all(|w| w[0].1.abs() >= w[1].1.abs()));

        let stats = engine.dataset_stats().unwrap();
        assert_eq!(stats.total_items, 5);
        assert_eq!(stats.unique_article_types, 3);
        assert_eq!(stats.unique_colours, 3);
        assert_eq!(stats.year_range, Some((2010, 2013)));
        assert_eq!(stats.feature_matrix_shape.0, 5);
    }

    #[test]
    fn test_split_snapshot_round_trip_and_fallback_paths() {
        let engine = fitted();
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("content_based_model_optimized.bin");
        let sidecar = engine.save_split_snapshot(&primary).unwrap();

        // the recorded path is gone; only the de-suffixed sibling remains
        let moved = dir.path().join("content_based_model_features.bin");
        std::fs::rename(&sidecar, &moved).unwrap();
        let restored = ContentRecommender::load_snapshot(&primary).unwrap();
        assert_eq!(
            restored.get_recommendations(1, 4, true).unwrap(),
            engine.get_recommendations(1, 4, true).unwrap()
        );

        std::fs::remove_file(&moved).unwrap();
        assert!(matches!(
            ContentRecommender::load_snapshot(&primary),
            Err(RecommenderError::SnapshotIncomplete { .. })
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let engine = fitted();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.bin");
        engine.save_snapshot(&path).unwrap();
        let restored = ContentRecommender::load_snapshot(&path).unwrap();
        assert_eq!(restored.state, engine.state);
        assert_eq!(restored.dataset_stats().unwrap(), engine.dataset_stats().unwrap());
    }
}
