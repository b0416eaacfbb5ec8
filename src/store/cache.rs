//! Byte-bounded LRU cache for decoded time chunks.

use lru::LruCache;
use serde::Serialize;
use std::sync::Arc;

/// Identifies one chunk: a block of `chunk_steps` time steps of one variable
/// at one grid point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub variable: String,
    pub chunk: usize,
    pub lat_index: usize,
    pub lon_index: usize,
}

impl ChunkKey {
    pub fn new(variable: &str, chunk: usize, lat_index: usize, lon_index: usize) -> Self {
        Self {
            variable: variable.to_string(),
            chunk,
            lat_index,
            lon_index,
        }
    }
}

/// Cache counters, exposed through the metadata endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub memory_bytes: usize,
    pub capacity_bytes: usize,
}

/// LRU cache whose footprint is bounded by bytes rather than entry count.
pub struct ChunkCache {
    cache: LruCache<ChunkKey, Arc<[f32]>>,
    memory_limit: usize,
    current_memory: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

fn size_of_chunk(data: &[f32]) -> usize {
    std::mem::size_of_val(data)
}

impl ChunkCache {
    /// Create a new chunk cache with the given memory limit in bytes.
    pub fn new(memory_limit: usize) -> Self {
        Self {
            cache: LruCache::unbounded(),
            memory_limit,
            current_memory: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up a chunk, promoting it to most recently used.
    pub fn get(&mut self, key: &ChunkKey) -> Option<Arc<[f32]>> {
        match self.cache.get(key) {
            Some(data) => {
                self.hits += 1;
                Some(Arc::clone(data))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, key: &ChunkKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a chunk, evicting least recently used entries until it fits.
    ///
    /// A chunk larger than the whole cache is not stored.
    pub fn insert(&mut self, key: ChunkKey, data: Arc<[f32]>) {
        let data_size = size_of_chunk(&data);
        if data_size > self.memory_limit {
            return;
        }

        if let Some(previous) = self.cache.pop(&key) {
            self.current_memory = self.current_memory.saturating_sub(size_of_chunk(&previous));
        }

        while self.current_memory + data_size > self.memory_limit {
            match self.cache.pop_lru() {
                Some((_, evicted)) => {
                    self.current_memory =
                        self.current_memory.saturating_sub(size_of_chunk(&evicted));
                    self.evictions += 1;
                }
                None => break,
            }
        }

        self.cache.put(key, data);
        self.current_memory += data_size;
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_memory = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.cache.len(),
            memory_bytes: self.current_memory,
            capacity_bytes: self.memory_limit,
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
