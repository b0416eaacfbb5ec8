//! Chunked, cached access to variable time series.
//!
//! The time axis is partitioned into fixed-size chunks. A chunk is the unit
//! of I/O and caching: one variable, one grid point, `chunk_steps` consecutive
//! time steps (the last chunk may be shorter). Memory use is bounded by the
//! cache capacity, never by the dataset size.

pub mod cache;
pub mod memory;
#[cfg(feature = "netcdf")]
pub mod netcdf_source;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{IsobarError, Result};

pub use cache::{CacheStats, ChunkCache, ChunkKey};
pub use memory::MemorySource;
#[cfg(feature = "netcdf")]
pub use netcdf_source::NetCdfSource;

/// Number of time steps per chunk unless configured otherwise.
pub const DEFAULT_CHUNK_STEPS: usize = 48;

/// Raw storage behind a [`ChunkStore`].
///
/// Implementations read a contiguous run of time steps for one variable at
/// one grid point, in storage units (before fill masking and unpacking).
pub trait ChunkSource: Send + Sync {
    fn read(
        &self,
        variable: &str,
        time: Range<usize>,
        lat_index: usize,
        lon_index: usize,
    ) -> Result<Vec<f32>>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

type InFlight = Arc<OnceCell<Arc<[f32]>>>;

/// Serves time-range reads from cached chunks, reading through to a
/// [`ChunkSource`] on a miss.
pub struct ChunkStore {
    source: Arc<dyn ChunkSource>,
    chunk_steps: usize,
    time_len: usize,
    cache: Mutex<ChunkCache>,
    in_flight: Mutex<HashMap<ChunkKey, InFlight>>,
    generation: AtomicU64,
}

impl ChunkStore {
    pub fn new(
        source: Arc<dyn ChunkSource>,
        time_len: usize,
        chunk_steps: usize,
        cache_bytes: usize,
    ) -> Result<Self> {
        if chunk_steps == 0 {
            return Err(IsobarError::Config {
                message: "chunk_steps must be at least 1".to_string(),
            });
        }

        Ok(Self {
            source,
            chunk_steps,
            time_len,
            cache: Mutex::new(ChunkCache::new(cache_bytes)),
            in_flight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn chunk_steps(&self) -> usize {
        self.chunk_steps
    }

    /// Read the inclusive time-offset range for one variable at one grid point.
    pub fn fetch(
        &self,
        variable: &str,
        time: RangeInclusive<usize>,
        lat_index: usize,
        lon_index: usize,
    ) -> Result<Vec<f32>> {
        let (first, last) = (*time.start(), *time.end());
        if first > last || last >= self.time_len {
            return Err(IsobarError::InvalidParameter {
                param: "time".to_string(),
                message: format!(
                    "Time offsets {}..={} are outside a {}-step axis",
                    first, last, self.time_len
                ),
            });
        }

        let mut values = Vec::with_capacity(last - first + 1);
        for chunk in first / self.chunk_steps..=last / self.chunk_steps {
            let data = self.chunk(variable, chunk, lat_index, lon_index)?;
            let chunk_start = chunk * self.chunk_steps;
            let from = first.max(chunk_start) - chunk_start;
            let to = last.min(chunk_start + data.len() - 1) - chunk_start;
            values.extend_from_slice(&data[from..=to]);
        }

        Ok(values)
    }

    /// Drop every cached chunk. Reads already in progress will not repopulate
    /// the cache with data from before the call.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.lock().clear();
        debug!(source = %self.source.describe(), "Chunk cache invalidated");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    fn chunk(
        &self,
        variable: &str,
        chunk: usize,
        lat_index: usize,
        lon_index: usize,
    ) -> Result<Arc<[f32]>> {
        let key = ChunkKey::new(variable, chunk, lat_index, lon_index);

        if let Some(data) = self.cache.lock().get(&key) {
            trace!(variable, chunk, lat_index, lon_index, "Chunk cache hit");
            return Ok(data);
        }

        // Concurrent misses on the same key share one read.
        let cell = Arc::clone(
            self.in_flight
                .lock()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );

        let result = cell
            .get_or_try_init(|| self.read_chunk(&key))
            .map(Arc::clone);

        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            in_flight.remove(&key);
        }

        result
    }

    fn read_chunk(&self, key: &ChunkKey) -> Result<Arc<[f32]>> {
        let generation = self.generation.load(Ordering::SeqCst);
        let start = key.chunk * self.chunk_steps;
        let end = (start + self.chunk_steps).min(self.time_len);

        debug!(
            variable = %key.variable,
            chunk = key.chunk,
            lat_index = key.lat_index,
            lon_index = key.lon_index,
            "Chunk cache miss, reading from storage"
        );

        let data = self
            .source
            .read(&key.variable, start..end, key.lat_index, key.lon_index)?;

        if data.len() != end - start {
            return Err(IsobarError::StorageIo {
                message: format!(
                    "Short read for {} chunk {}: expected {} values, got {}",
                    key.variable,
                    key.chunk,
                    end - start,
                    data.len()
                ),
            });
        }

        let data: Arc<[f32]> = data.into();
        // Compared under the cache lock so a concurrent invalidate() either
        // bumps the generation first or clears after this insert.
        let mut cache = self.cache.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            cache.insert(key.clone(), Arc::clone(&data));
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// Wraps a memory source, counting reads and failing on demand.
    struct CountingSource {
        inner: MemorySource,
        reads: AtomicUsize,
        fail: AtomicBool,
    }

    impl ChunkSource for CountingSource {
        fn read(
            &self,
            variable: &str,
            time: Range<usize>,
            lat_index: usize,
            lon_index: usize,
        ) -> Result<Vec<f32>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(IsobarError::StorageIo {
                    message: "simulated read failure".to_string(),
                });
            }
            self.inner.read(variable, time, lat_index, lon_index)
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    const STEPS: usize = 100;

    fn source() -> Arc<CountingSource> {
        // value = time offset + 1000 * lat + 10000 * lon
        let data = Array3::from_shape_fn((STEPS, 2, 2), |(t, y, x)| {
            t as f32 + 1000.0 * y as f32 + 10000.0 * x as f32
        });
        let mut inner = MemorySource::new();
        inner.insert("t2m", data);
        Arc::new(CountingSource {
            inner,
            reads: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    fn store(source: Arc<CountingSource>, chunk_steps: usize) -> ChunkStore {
        ChunkStore::new(source, STEPS, chunk_steps, 1024 * 1024).unwrap()
    }

    #[test]
    fn test_fetch_within_one_chunk() {
        let source = source();
        let store = store(Arc::clone(&source), 48);
        let values = store.fetch("t2m", 3..=5, 1, 0).unwrap();
        assert_eq!(values, vec![1003.0, 1004.0, 1005.0]);
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_across_chunk_boundaries_is_contiguous() {
        let source = source();
        let store = store(Arc::clone(&source), 10);
        let values = store.fetch("t2m", 7..=33, 0, 1).unwrap();

        let expected: Vec<f32> = (7..=33).map(|t| t as f32 + 10000.0).collect();
        assert_eq!(values, expected);
        // chunks 0, 1, 2 and 3
        assert_eq!(source.reads.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_fetch_last_partial_chunk() {
        let source = source();
        let store = store(Arc::clone(&source), 48);
        let values = store.fetch("t2m", 95..=99, 0, 0).unwrap();
        assert_eq!(values, vec![95.0, 96.0, 97.0, 98.0, 99.0]);
        assert!(store.fetch("t2m", 95..=100, 0, 0).is_err());
    }

    #[test]
    fn test_repeated_fetch_hits_cache() {
        let source = source();
        let store = store(Arc::clone(&source), 48);
        let first = store.fetch("t2m", 0..=60, 1, 1).unwrap();
        let second = store.fetch("t2m", 10..=50, 1, 1).unwrap();

        assert_eq!(&first[10..=50], &second[..]);
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
        assert!(store.cache_stats().hits >= 2);
    }

    #[test]
    fn test_failed_read_leaves_cache_intact() {
        let source = source();
        let store = store(Arc::clone(&source), 10);
        store.fetch("t2m", 0..=9, 0, 0).unwrap();
        let before = store.cache_stats();

        source.fail.store(true, Ordering::SeqCst);
        let err = store.fetch("t2m", 0..=25, 0, 0).unwrap_err();
        assert!(matches!(err, IsobarError::StorageIo { .. }));

        let after = store.cache_stats();
        assert_eq!(after.entries, before.entries);
        assert_eq!(after.memory_bytes, before.memory_bytes);

        // Cached chunk is still served; the failed one is retried.
        source.fail.store(false, Ordering::SeqCst);
        let values = store.fetch("t2m", 0..=25, 0, 0).unwrap();
        assert_eq!(values, (0..=25).map(|t| t as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_unknown_variable_is_storage_error() {
        let store = store(source(), 48);
        assert!(matches!(
            store.fetch("sst", 0..=1, 0, 0),
            Err(IsobarError::StorageIo { .. })
        ));
    }

    #[test]
    fn test_invalidate_forces_reread() {
        let source = source();
        let store = store(Arc::clone(&source), 48);
        store.fetch("t2m", 0..=1, 0, 0).unwrap();
        store.invalidate();
        assert_eq!(store.cache_stats().entries, 0);
        store.fetch("t2m", 0..=1, 0, 0).unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    /// Invalidates its store in the middle of every read.
    struct InvalidatingSource {
        inner: MemorySource,
        store: OnceCell<std::sync::Weak<ChunkStore>>,
    }

    impl ChunkSource for InvalidatingSource {
        fn read(
            &self,
            variable: &str,
            time: Range<usize>,
            lat_index: usize,
            lon_index: usize,
        ) -> Result<Vec<f32>> {
            if let Some(store) = self.store.get().and_then(std::sync::Weak::upgrade) {
                store.invalidate();
            }
            self.inner.read(variable, time, lat_index, lon_index)
        }

        fn describe(&self) -> String {
            "invalidating".to_string()
        }
    }

    #[test]
    fn test_read_overlapping_invalidate_is_not_cached() {
        let mut inner = MemorySource::new();
        inner.insert("t2m", Array3::from_shape_fn((STEPS, 1, 1), |(t, _, _)| t as f32));
        let source = Arc::new(InvalidatingSource {
            inner,
            store: OnceCell::new(),
        });
        let store = Arc::new(
            ChunkStore::new(Arc::clone(&source) as Arc<dyn ChunkSource>, STEPS, 10, 1024).unwrap(),
        );
        let _ = source.store.set(Arc::downgrade(&store));

        // The caller still gets the data it asked for
        assert_eq!(store.fetch("t2m", 0..=2, 0, 0).unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(store.cache_stats().entries, 0);
    }

    #[test]
    fn test_memory_bounded_by_capacity() {
        let source = source();
        // Room for two 10-step chunks
        let store = ChunkStore::new(Arc::clone(&source) as Arc<dyn ChunkSource>, STEPS, 10, 80)
            .unwrap();
        let values = store.fetch("t2m", 0..=99, 1, 1).unwrap();
        assert_eq!(values.len(), 100);
        let stats = store.cache_stats();
        assert!(stats.memory_bytes <= 80);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_concurrent_fetches_agree() {
        let source = source();
        let store = Arc::new(store(Arc::clone(&source), 16));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.fetch("t2m", 0..=99, 1, 0).unwrap())
            })
            .collect();

        let expected: Vec<f32> = (0..100).map(|t| t as f32 + 1000.0).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn test_zero_chunk_steps_rejected() {
        assert!(ChunkStore::new(source(), STEPS, 0, 1024).is_err());
    }
}
