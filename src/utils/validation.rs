use crate::config::{CollaborativeConfig, ContentConfig, RatingStoreConfig};
use crate::models::RatingRecord;
use anyhow::{anyhow, Result};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

pub fn validate_rating_record(record: &RatingRecord) -> Result<()> {
    if record.user_id.trim().is_empty() {
        return Err(anyhow!("User ID cannot be empty (item {})", record.item_id));
    }

    if !record.rating.is_finite() {
        return Err(anyhow!(
            "Rating for user {} on item {} is not a finite number",
            record.user_id,
            record.item_id
        ));
    }

    if !(MIN_RATING..=MAX_RATING).contains(&record.rating) {
        return Err(anyhow!(
            "Rating {} for user {} on item {} is outside {}..={}",
            record.rating,
            record.user_id,
            record.item_id,
            MIN_RATING,
            MAX_RATING
        ));
    }

    Ok(())
}

pub fn validate_rating_store_config(config: &RatingStoreConfig) -> Result<()> {
    if config.sample_size == 0 {
        return Err(anyhow!("Sample size must be greater than 0"));
    }

    if config.fallback_sample_size == 0 {
        return Err(anyhow!("Fallback sample size must be greater than 0"));
    }

    if config.max_matrix_cells == 0 {
        return Err(anyhow!("Matrix cell budget must be greater than 0"));
    }

    Ok(())
}

pub fn validate_collaborative_config(config: &CollaborativeConfig) -> Result<()> {
    if config.max_items == 0 {
        return Err(anyhow!("max_items must be greater than 0"));
    }

    if config.neighbors == 0 {
        return Err(anyhow!("neighbors must be greater than 0"));
    }

    // Off-diagonal scores must stay strictly below the 1.0 diagonal. A discount
    // of 1.0 would let perfect agreement on one or two raters reach it.
    for (name, value) in [
        ("identical_pattern_score", config.identical_pattern_score),
        ("correlation_cap", config.correlation_cap),
        ("metadata.cap", config.metadata.cap),
        ("metadata.default_score", config.metadata.default_score),
        ("single_rater_discount", config.single_rater_discount),
        ("two_rater_discount", config.two_rater_discount),
    ] {
        if !(0.0..1.0).contains(&value) {
            return Err(anyhow!("{} must be in [0, 1), got {}", name, value));
        }
    }

    Ok(())
}

pub fn validate_content_config(config: &ContentConfig) -> Result<()> {
    if config.max_df <= 0.0 || config.max_df > 1.0 {
        return Err(anyhow!("max_df must be in (0, 1], got {}", config.max_df));
    }

    if config.ngram_max == 0 {
        return Err(anyhow!("ngram_max must be at least 1"));
    }

    if config.duplicate_cap >= 1.0 {
        return Err(anyhow!("duplicate_cap must stay below 1.0"));
    }

    Ok(())
}
