pub mod catalog;
pub mod collaborative;
pub mod content;
pub mod rating_store;
pub mod snapshot;

pub use collaborative::ItemBasedCf;
pub use content::ContentRecommender;
pub use rating_store::RatingStore;

use snapshot::cache::SnapshotCache;
use std::sync::OnceLock;

/// Process-wide cache of loaded collaborative engines.
pub fn collaborative_cache() -> &'static SnapshotCache<ItemBasedCf> {
    static CACHE: OnceLock<SnapshotCache<ItemBasedCf>> = OnceLock::new();
    CACHE.get_or_init(|| SnapshotCache::new(ItemBasedCf::load_snapshot))
}

/// Process-wide cache of loaded content engines.
pub fn content_cache() -> &'static SnapshotCache<ContentRecommender> {
    static CACHE: OnceLock<SnapshotCache<ContentRecommender>> = OnceLock::new();
    CACHE.get_or_init(|| SnapshotCache::new(ContentRecommender::load_snapshot))
}
