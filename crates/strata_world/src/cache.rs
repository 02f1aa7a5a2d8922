//! # Chunk Cache
//!
//! Bounded in-memory store of resolved chunks, evicting the least recently
//! used entry when full. Eviction only drops the RAM copy; the chunk's disk
//! record is untouched and a later request resolves it again from disk.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use strata_procedural::{ChunkKey, VoxelSet};

/// Default number of resolved chunks kept in RAM.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// A cached chunk and when it was last read.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// Resolved voxels (base plus modifications).
    pub voxels: Arc<VoxelSet>,
    /// Last read or write.
    pub last_access: Instant,
}

/// LRU cache of resolved chunks.
pub struct ChunkCache {
    entries: LruCache<ChunkKey, CacheEntry>,
    evictions: u64,
}

impl ChunkCache {
    /// Creates a cache holding at most `capacity` chunks (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            evictions: 0,
        }
    }

    /// Looks up a chunk and marks it most recently used.
    pub fn get(&mut self, key: ChunkKey) -> Option<Arc<VoxelSet>> {
        let entry = self.entries.get_mut(&key)?;
        entry.last_access = Instant::now();
        Some(Arc::clone(&entry.voxels))
    }

    /// Looks up a chunk without touching recency.
    #[must_use]
    pub fn peek(&self, key: ChunkKey) -> Option<&CacheEntry> {
        self.entries.peek(&key)
    }

    /// Returns true if the chunk is cached.
    #[must_use]
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.entries.contains(&key)
    }

    /// Stores a chunk as most recently used, returning the key it evicted.
    pub fn insert(&mut self, key: ChunkKey, voxels: Arc<VoxelSet>) -> Option<ChunkKey> {
        let entry = CacheEntry {
            voxels,
            last_access: Instant::now(),
        };
        match self.entries.push(key, entry) {
            Some((evicted, _)) if evicted != key => {
                self.evictions += 1;
                tracing::debug!(key = %evicted, "chunk evicted from cache");
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Applies an in-place edit to a cached chunk. Returns false if the chunk
    /// is not cached.
    pub fn update(&mut self, key: ChunkKey, edit: impl FnOnce(&mut VoxelSet)) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        edit(Arc::make_mut(&mut entry.voxels));
        entry.last_access = Instant::now();
        true
    }

    /// Drops every cached chunk.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cached chunk count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum chunk count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Chunks evicted since creation.
    #[must_use]
    pub const fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Keys from least to most recently used.
    #[must_use]
    pub fn lru_order(&self) -> Vec<ChunkKey> {
        self.entries.iter().rev().map(|(key, _)| *key).collect()
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_procedural::{Material, Voxel, VoxelPos};

    fn chunk(n: i32) -> Arc<VoxelSet> {
        Arc::new(VoxelSet::from_iter([Voxel::generated(
            VoxelPos::new(n, 0, 0),
            Material::Stone,
        )]))
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = ChunkCache::new(2);
        let (a, b, c) = (ChunkKey::new(0, 0), ChunkKey::new(1, 0), ChunkKey::new(2, 0));

        assert_eq!(cache.insert(a, chunk(0)), None);
        assert_eq!(cache.insert(b, chunk(1)), None);
        assert!(cache.get(a).is_some());
        assert_eq!(cache.lru_order(), vec![b, a]);

        assert_eq!(cache.insert(c, chunk(2)), Some(b));
        assert!(!cache.contains(b));
        assert!(cache.contains(a));
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn test_reinsert_is_not_an_eviction() {
        let mut cache = ChunkCache::new(1);
        let key = ChunkKey::new(3, 3);
        cache.insert(key, chunk(0));
        assert_eq!(cache.insert(key, chunk(1)), None);
        assert_eq!(cache.evictions(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_update_copies_on_write() {
        let mut cache = ChunkCache::default();
        let key = ChunkKey::new(0, 0);
        cache.insert(key, chunk(0));
        let before = cache.get(key).unwrap();

        assert!(cache.update(key, |voxels| {
            voxels.remove(VoxelPos::new(0, 0, 0));
        }));
        assert_eq!(before.len(), 1);
        assert!(cache.get(key).unwrap().is_empty());
        assert!(!cache.update(ChunkKey::new(9, 9), |_| {}));
    }

    #[test]
    fn test_peek_keeps_order() {
        let mut cache = ChunkCache::new(2);
        let (a, b) = (ChunkKey::new(0, 0), ChunkKey::new(0, 1));
        cache.insert(a, chunk(0));
        cache.insert(b, chunk(1));
        assert!(cache.peek(a).is_some());
        assert_eq!(cache.lru_order(), vec![a, b]);
        assert_eq!(cache.capacity(), 2);
    }
}
