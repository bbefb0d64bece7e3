pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use algorithms::SimilarityEngine;
pub use config::Config;
pub use error::{RecommenderError, Result};
pub use models::*;
pub use services::{ContentRecommender, ItemBasedCf, RatingStore};

use std::sync::Arc;

/// Shared handles for a serving process: configuration plus cached engines.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The collaborative engine from the configured snapshot, loaded once per process.
    pub fn collaborative(&self) -> Result<Arc<ItemBasedCf>> {
        services::collaborative_cache().get_or_load(&self.config.snapshot.collaborative_path())
    }

    /// The content engine from the configured snapshot, loaded once per process.
    pub fn content(&self) -> Result<Arc<ContentRecommender>> {
        services::content_cache().get_or_load(&self.config.snapshot.content_path())
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
