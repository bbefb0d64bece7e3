use crate::algorithms::correlation::{CorrelationEngine, ItemSimilarityMatrix};
use crate::algorithms::predictor::{popularity_ranking, RatingPredictor};
use crate::algorithms::SimilarityEngine;
use crate::config::{CollaborativeConfig, Config, RatingStoreConfig};
use crate::error::{RecommenderError, Result};
use crate::models::{Catalog, CatalogItem, CollaborativeStats, ItemId, RatingMatrix, RecommendedItem};
use crate::services::rating_store::RatingStore;
use crate::services::snapshot::{EngineKind, SnapshotHeader, SnapshotReader, FORMAT_VERSION};
use crate::utils::validation::validate_collaborative_config;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const ENGINE: &str = "collaborative";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CfState {
    config: CollaborativeConfig,
    ratings: RatingMatrix,
    similarity: ItemSimilarityMatrix,
    item_means: HashMap<ItemId, f64>,
    popularity: Vec<(ItemId, f64)>,
    catalog: Option<Catalog>,
}

/// Item-based collaborative filtering over user ratings.
#[derive(Debug, Clone)]
pub struct ItemBasedCf {
    config: CollaborativeConfig,
    store_config: RatingStoreConfig,
    use_enhanced_dataset: bool,
    state: Option<CfState>,
}

impl ItemBasedCf {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.collaborative.clone(),
            store_config: config.ratings.clone(),
            use_enhanced_dataset: config.data.use_enhanced_dataset,
            state: None,
        }
    }

    pub fn fit(&mut self, ratings_path: &Path, catalog_path: Option<&Path>) -> Result<()> {
        let store = RatingStore::load(
            ratings_path,
            catalog_path,
            &self.store_config,
            self.use_enhanced_dataset,
        )?;
        self.fit_store(store)
    }

    pub fn fit_store(&mut self, store: RatingStore) -> Result<()> {
        validate_collaborative_config(&self.config)
            .map_err(|e| RecommenderError::InvalidInput(e.to_string()))?;

        let (records, matrix, catalog) = store.into_parts();
        let popularity = popularity_ranking(&records);
        let output = CorrelationEngine::new(&self.config, catalog.as_ref()).build_similarity_matrix(&matrix);

        self.state = Some(CfState {
            config: self.config.clone(),
            ratings: output.ratings,
            similarity: output.similarity,
            item_means: output.item_means,
            popularity,
            catalog,
        });

        if let Ok(stats) = self.stats() {
            info!(
                users = stats.users,
                items = stats.items,
                non_zero = stats.non_zero_correlations,
                "Item-based CF model fitted"
            );
        }
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> Result<&CfState> {
        self.state.as_ref().ok_or(RecommenderError::NotFitted { engine: ENGINE })
    }

    fn predictor(&self) -> Result<RatingPredictor<'_>> {
        let state = self.state()?;
        Ok(RatingPredictor::new(
            &state.ratings,
            &state.similarity,
            &state.item_means,
            &state.popularity,
        ))
    }

    /// Positively similar items, best first, never the item itself.
    pub fn find_similar_items(&self, item_id: ItemId, n: usize) -> Result<Vec<(ItemId, f64)>> {
        self.predictor()?
            .similar_items(item_id, n)
            .ok_or(RecommenderError::UnknownItem(item_id))
    }

    pub fn predict_rating(&self, user_id: &str, item_id: ItemId) -> Result<f64> {
        self.predict_rating_with_k(user_id, item_id, self.state()?.config.neighbors)
    }

    pub fn predict_rating_with_k(&self, user_id: &str, item_id: ItemId, k: usize) -> Result<f64> {
        let predictor = self.predictor()?;
        check_neighbors(k)?;
        Ok(predictor.predict(user_id, item_id, k))
    }

    /// Personalised ranking of unrated items; users without history get the
    /// popularity ranking instead.
    pub fn get_item_recommendations(&self, user_id: &str, n: usize, k: usize) -> Result<Vec<RecommendedItem>> {
        let predictor = self.predictor()?;
        check_neighbors(k)?;
        let ranked = match predictor.rank_unrated(user_id, n, k) {
            Some(ranked) => ranked,
            None => {
                info!(user = user_id, "No rating history, falling back to popular items");
                predictor.popular(n)
            }
        };
        self.to_records(ranked)
    }

    /// [`Self::find_similar_items`] with catalog attributes attached.
    pub fn similar_item_records(&self, item_id: ItemId, n: usize) -> Result<Vec<RecommendedItem>> {
        let similar = self.find_similar_items(item_id, n)?;
        self.to_records(similar)
    }

    fn to_records(&self, scored: Vec<(ItemId, f64)>) -> Result<Vec<RecommendedItem>> {
        let state = self.state()?;
        Ok(scored
            .into_iter()
            .map(|(item_id, score)| {
                let item = state
                    .catalog
                    .as_ref()
                    .and_then(|catalog| catalog.get(item_id))
                    .cloned()
                    .unwrap_or_else(|| CatalogItem::placeholder(item_id));
                RecommendedItem::new(item).with_score(score)
            })
            .collect())
    }

    pub fn similarity_matrix(&self) -> Result<&ItemSimilarityMatrix> {
        Ok(&self.state()?.similarity)
    }

    pub fn item_mean(&self, item_id: ItemId) -> Result<Option<f64>> {
        Ok(self.state()?.item_means.get(&item_id).copied())
    }

    /// Correlation analysis over the off-diagonal cells.
    pub fn stats(&self) -> Result<CollaborativeStats> {
        let state = self.state()?;
        let values = state.similarity.values();
        let mut zero = 0usize;
        let mut non_zero: Vec<f64> = Vec::new();
        for ((i, j), &value) in values.indexed_iter() {
            if i == j {
                continue;
            }
            if value == 0.0 {
                zero += 1;
            } else {
                non_zero.push(value);
            }
        }

        let min = non_zero.iter().copied().reduce(f64::min);
        let max = non_zero.iter().copied().reduce(f64::max);
        let mean = (!non_zero.is_empty()).then(|| non_zero.iter().sum::<f64>() / non_zero.len() as f64);

        Ok(CollaborativeStats {
            users: state.ratings.n_users(),
            items: state.ratings.n_items(),
            similarity_shape: values.dim(),
            zero_correlations: zero,
            non_zero_correlations: non_zero.len(),
            non_zero_min: min,
            non_zero_max: max,
            non_zero_mean: mean,
        })
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let state = self.state()?;
        crate::services::snapshot::write_snapshot(
            path,
            &SnapshotHeader::new(EngineKind::Collaborative, FORMAT_VERSION),
            state,
        )
    }

    /// Restores a fitted engine, including the configuration it was fitted with.
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let reader = SnapshotReader::open(path, EngineKind::Collaborative)?;
        if reader.header().format_version != FORMAT_VERSION {
            return Err(RecommenderError::SnapshotFormat {
                path: path.to_path_buf(),
                reason: format!(
                    "collaborative snapshots have no version {} layout",
                    reader.header().format_version
                ),
            });
        }
        let state: CfState = reader.read_state()?;
        Ok(Self {
            config: state.config.clone(),
            store_config: RatingStoreConfig::default(),
            use_enhanced_dataset: false,
            state: Some(state),
        })
    }
}

fn check_neighbors(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RecommenderError::InvalidInput(
            "neighbor count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

impl SimilarityEngine for ItemBasedCf {
    fn engine_name(&self) -> &'static str {
        ENGINE
    }

    fn is_fitted(&self) -> bool {
        ItemBasedCf::is_fitted(self)
    }

    fn similar_items(&self, item_id: ItemId, k: usize) -> Result<Vec<(ItemId, f64)>> {
        self.find_similar_items(item_id, k)
    }
}
