use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SAMPLE_SIZE: usize = 50_000;
pub const DEFAULT_FALLBACK_SAMPLE_SIZE: usize = 10_000;
pub const DEFAULT_SAMPLING_SEED: u64 = 42;
pub const DEFAULT_MAX_MATRIX_CELLS: u64 = 4_000_000_000;

pub const DEFAULT_MAX_ITEMS: usize = 5_000;
pub const DEFAULT_NEIGHBORS: usize = 10;
/// Score for distinct items whose common-rater vectors are identical.
pub const IDENTICAL_PATTERN_SCORE: f64 = 0.95;
/// Discount applied to the single-rater agreement score.
pub const SINGLE_RATER_DISCOUNT: f64 = 0.5;
/// Discount applied to a correlation computed from exactly two common raters.
pub const TWO_RATER_DISCOUNT: f64 = 0.7;
pub const CORRELATION_CAP: f64 = 0.99;
pub const METADATA_CAP: f64 = 0.7;
pub const METADATA_DEFAULT: f64 = 0.1;

pub const DEFAULT_MAX_TEXT_FEATURES: usize = 500;
pub const DEFAULT_MIN_DF: usize = 2;
pub const DEFAULT_MAX_DF: f64 = 0.8;
pub const DUPLICATE_THRESHOLD: f64 = 0.99;
pub const DUPLICATE_PENALTY: f64 = 0.95;
pub const DUPLICATE_CAP: f64 = 0.99;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub ratings: RatingStoreConfig,
    pub collaborative: CollaborativeConfig,
    pub content: ContentConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub ratings_path: PathBuf,
    pub catalog_path: PathBuf,
    /// Prefer `<ratings>_enhanced.csv` when it exists next to the ratings file.
    pub use_enhanced_dataset: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingStoreConfig {
    pub sample_size: usize,
    pub fallback_sample_size: usize,
    pub seed: u64,
    /// Upper bound on users x items for a single pivot.
    pub max_matrix_cells: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborativeConfig {
    pub max_items: usize,
    pub neighbors: usize,
    pub identical_pattern_score: f64,
    pub single_rater_discount: f64,
    pub two_rater_discount: f64,
    pub correlation_cap: f64,
    pub metadata: MetadataWeights,
}

/// Per-attribute agreement weights for the zero-overlap fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataWeights {
    pub master_category: f64,
    pub sub_category: f64,
    pub article_type: f64,
    pub gender: f64,
    pub season: f64,
    pub usage: f64,
    pub base_colour: f64,
    pub cap: f64,
    pub default_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub max_text_features: usize,
    pub min_df: usize,
    pub max_df: f64,
    pub ngram_max: usize,
    pub use_stop_words: bool,
    pub duplicate_threshold: f64,
    pub duplicate_penalty: f64,
    pub duplicate_cap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
    pub collaborative_file: String,
    pub content_file: String,
}

impl SnapshotConfig {
    pub fn collaborative_path(&self) -> PathBuf {
        self.dir.join(&self.collaborative_file)
    }

    pub fn content_path(&self) -> PathBuf {
        self.dir.join(&self.content_file)
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ratings_path: PathBuf::from("data/user_ratings.csv"),
            catalog_path: PathBuf::from("data/styles.csv"),
            use_enhanced_dataset: true,
        }
    }
}

impl Default for RatingStoreConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            fallback_sample_size: DEFAULT_FALLBACK_SAMPLE_SIZE,
            seed: DEFAULT_SAMPLING_SEED,
            max_matrix_cells: DEFAULT_MAX_MATRIX_CELLS,
        }
    }
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            neighbors: DEFAULT_NEIGHBORS,
            identical_pattern_score: IDENTICAL_PATTERN_SCORE,
            single_rater_discount: SINGLE_RATER_DISCOUNT,
            two_rater_discount: TWO_RATER_DISCOUNT,
            correlation_cap: CORRELATION_CAP,
            metadata: MetadataWeights::default(),
        }
    }
}

impl Default for MetadataWeights {
    fn default() -> Self {
        Self {
            master_category: 0.4,
            sub_category: 0.3,
            article_type: 0.2,
            gender: 0.1,
            season: 0.05,
            usage: 0.05,
            base_colour: 0.1,
            cap: METADATA_CAP,
            default_score: METADATA_DEFAULT,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_text_features: DEFAULT_MAX_TEXT_FEATURES,
            min_df: DEFAULT_MIN_DF,
            max_df: DEFAULT_MAX_DF,
            ngram_max: 2,
            use_stop_words: true,
            duplicate_threshold: DUPLICATE_THRESHOLD,
            duplicate_penalty: DUPLICATE_PENALTY,
            duplicate_cap: DUPLICATE_CAP,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            collaborative_file: "item_based_cf_model.bin".to_string(),
            content_file: "content_based_model.bin".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("STYLEREC").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.collaborative.max_items, 5_000);
        assert_eq!(config.ratings.sample_size, 50_000);
        assert_eq!(config.ratings.fallback_sample_size, 10_000);
        assert_eq!(config.ratings.seed, 42);
        assert_eq!(config.content.max_text_features, 500);
        assert_eq!(config.collaborative.metadata.cap, 0.7);
        assert_eq!(
            config.snapshot.content_path(),
            PathBuf::from("models/content_based_model.bin")
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stylerec.toml");
        std::fs::write(&path, "[collaborative]\nmax_items = 250\n").unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.collaborative.max_items, 250);
        assert_eq!(config.collaborative.neighbors, DEFAULT_NEIGHBORS);
        assert_eq!(config.content.min_df, DEFAULT_MIN_DF);
    }
}
