pub mod correlation;
pub mod encoder;
pub mod predictor;
pub mod retriever;

use crate::error::Result;
use crate::models::ItemId;

/// The contract both engines share: neighbors of an item with a score.
pub trait SimilarityEngine: Send + Sync {
    fn engine_name(&self) -> &'static str;

    fn is_fitted(&self) -> bool;

    /// Up to `k` items most similar to `item_id`, best first. The item itself is never returned.
    fn similar_items(&self, item_id: ItemId, k: usize) -> Result<Vec<(ItemId, f64)>>;
}
