use crate::config::RatingStoreConfig;
use crate::error::{RecommenderError, Result};
use crate::models::{Catalog, RatingMatrix, RatingRecord};
use crate::services::catalog::load_catalog;
use crate::utils::sibling_with_suffix;
use crate::utils::validation::{validate_rating_record, validate_rating_store_config};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Sampled rating records, their pivoted matrix and the optional catalog.
#[derive(Debug, Clone)]
pub struct RatingStore {
    records: Vec<RatingRecord>,
    matrix: RatingMatrix,
    catalog: Option<Catalog>,
}

impl RatingStore {
    pub fn load(
        ratings_path: &Path,
        catalog_path: Option<&Path>,
        config: &RatingStoreConfig,
        use_enhanced_dataset: bool,
    ) -> Result<Self> {
        let source = resolve_ratings_path(ratings_path, use_enhanced_dataset);
        let records = read_ratings(&source)?;
        info!(path = %source.display(), records = records.len(), "Loaded rating records");

        let catalog = catalog_path.map(load_catalog).transpose()?;
        Self::from_records(records, catalog, config, &source.display().to_string())
    }

    /// Samples and pivots already-loaded records.
    pub fn from_records(
        records: Vec<RatingRecord>,
        catalog: Option<Catalog>,
        config: &RatingStoreConfig,
        source_name: &str,
    ) -> Result<Self> {
        validate_rating_store_config(config).map_err(|e| RecommenderError::InvalidInput(e.to_string()))?;

        let records = if records.len() > config.sample_size {
            info!(
                from = records.len(),
                to = config.sample_size,
                "Sampling rating records for memory efficiency"
            );
            sample_records(&records, config.sample_size, config.seed)
        } else {
            records
        };

        let (records, matrix) = match pivot(&records, config, source_name) {
            Ok(matrix) => (records, matrix),
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = config.fallback_sample_size,
                    "Rating pivot failed, retrying with a smaller sample"
                );
                let smaller = sample_records(&records, config.fallback_sample_size, config.seed);
                let matrix = pivot(&smaller, config, source_name)?;
                (smaller, matrix)
            }
        };

        info!(
            users = matrix.n_users(),
            items = matrix.n_items(),
            observed = matrix.n_observed(),
            "Rating matrix created"
        );
        Ok(Self {
            records,
            matrix,
            catalog,
        })
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn matrix(&self) -> &RatingMatrix {
        &self.matrix
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn into_parts(self) -> (Vec<RatingRecord>, RatingMatrix, Option<Catalog>) {
        (self.records, self.matrix, self.catalog)
    }
}

/// Prefers `<stem>_enhanced.<ext>` next to the ratings file when asked to and present.
pub fn resolve_ratings_path(ratings_path: &Path, use_enhanced_dataset: bool) -> PathBuf {
    if use_enhanced_dataset {
        let enhanced = sibling_with_suffix(ratings_path, "_enhanced");
        if enhanced.exists() {
            info!(path = %enhanced.display(), "Using enhanced ratings dataset");
            return enhanced;
        }
    }
    ratings_path.to_path_buf()
}

pub fn read_ratings(path: &Path) -> Result<Vec<RatingRecord>> {
    let file = std::fs::File::open(path)
        .map_err(|e| RecommenderError::io(format!("opening ratings {}", path.display()), e))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    reader
        .deserialize()
        .enumerate()
        .map(|(line, row)| {
            row.map_err(|e| {
                RecommenderError::data_shape(
                    path.display().to_string(),
                    format!("line {}: {}", line + 2, e),
                )
            })
        })
        .collect()
}

/// Uniform sample of exactly `n` records (all of them when there are fewer),
/// keeping their original relative order.
pub fn sample_records(records: &[RatingRecord], n: usize, seed: u64) -> Vec<RatingRecord> {
    if records.len() <= n {
        return records.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, records.len(), n).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| records[i].clone()).collect()
}

fn pivot(records: &[RatingRecord], config: &RatingStoreConfig, source_name: &str) -> Result<RatingMatrix> {
    for record in records {
        validate_rating_record(record)
            .map_err(|e| RecommenderError::data_shape(source_name, e.to_string()))?;
    }

    let users: HashSet<&str> = records.iter().map(|r| r.user_id.as_str()).collect();
    let items: HashSet<u64> = records.iter().map(|r| r.item_id).collect();
    let cells = users.len() as u64 * items.len() as u64;
    if cells > config.max_matrix_cells {
        return Err(RecommenderError::data_shape(
            source_name,
            format!(
                "{} users x {} items exceeds the budget of {} cells",
                users.len(),
                items.len(),
                config.max_matrix_cells
            ),
        ));
    }

    Ok(RatingMatrix::from_records(records))
}
