use crate::error::Result;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type Loader<E> = fn(&Path) -> Result<E>;

/// Loaded engines shared across the process, keyed by snapshot path as given.
/// Entries are only replaced through [`SnapshotCache::reload`].
pub struct SnapshotCache<E> {
    entries: DashMap<PathBuf, Arc<E>>,
    loader: Loader<E>,
}

impl<E> SnapshotCache<E> {
    pub fn new(loader: Loader<E>) -> Self {
        Self {
            entries: DashMap::new(),
            loader,
        }
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<E>> {
        if let Some(entry) = self.entries.get(path) {
            debug!(path = %path.display(), "Snapshot cache hit");
            return Ok(entry.value().clone());
        }

        // Loading happens outside the map lock; a concurrent loader may win the insert.
        let loaded = Arc::new((self.loader)(path)?);
        let entry = self.entries.entry(path.to_path_buf()).or_insert(loaded);
        info!(path = %path.display(), "Snapshot cached");
        Ok(entry.value().clone())
    }

    pub fn reload(&self, path: &Path) -> Result<Arc<E>> {
        let loaded = Arc::new((self.loader)(path)?);
        if self.entries.insert(path.to_path_buf(), loaded.clone()).is_none() {
            warn!(path = %path.display(), "Reloaded a snapshot that was not cached");
        }
        Ok(loaded)
    }

    pub fn evict(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
