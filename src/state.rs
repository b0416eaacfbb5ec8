//! Application state shared by all handlers.
//!
//! The state owns a single engine slot. It starts empty, is filled by an
//! explicit [`AppState::load`] (or lazily by the first query) and is replaced
//! wholesale by [`AppState::reload`]. Queries clone the engine `Arc` under a
//! short read lock, so a reload never disturbs queries already running.

use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dataset::Dataset;
use crate::engine::QueryEngine;
use crate::error::{IsobarError, Result};
use crate::logging::{log_dataset_load_stats, log_timed_operation};

pub struct AppState {
    pub config: Config,
    data_path: PathBuf,
    engine: RwLock<Option<Arc<QueryEngine>>>,
    /// Serializes dataset opens so concurrent first queries load once.
    load_lock: Mutex<()>,
    started_at: Instant,
}

impl AppState {
    /// Create an unloaded state for the dataset at `data_path`.
    pub fn new(config: Config, data_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            data_path: data_path.into(),
            engine: RwLock::new(None),
            load_lock: Mutex::new(()),
            started_at: Instant::now(),
        }
    }

    /// Create a state around an already built engine.
    pub fn with_engine(config: Config, engine: QueryEngine) -> Self {
        let data_path = engine
            .dataset()
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let state = Self::new(config, data_path);
        *state.engine.write() = Some(Arc::new(engine));
        state
    }

    pub fn new_shared(config: Config, data_path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self::new(config, data_path))
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.read().is_some()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Open the dataset and install a fresh engine, replacing any current one.
    pub fn load(&self) -> Result<Arc<QueryEngine>> {
        let _guard = self.load_lock.lock();
        self.install()
    }

    /// Rebuild the engine from the data file. Queries that already hold the
    /// previous engine finish against it.
    pub fn reload(&self) -> Result<()> {
        info!(path = %self.data_path.display(), "Reloading dataset");
        self.load().map(|_| ())
    }

    /// The current engine, loading the dataset first if nothing is installed.
    pub fn engine(&self) -> Result<Arc<QueryEngine>> {
        if let Some(engine) = self.engine.read().as_ref() {
            return Ok(Arc::clone(engine));
        }

        let _guard = self.load_lock.lock();
        if let Some(engine) = self.engine.read().as_ref() {
            return Ok(Arc::clone(engine));
        }

        warn!(path = %self.data_path.display(), "Dataset not loaded, loading on demand");
        self.install().map_err(|e| {
            error!(error = %e, "On-demand dataset load failed");
            IsobarError::NotInitialized {
                message: e.to_string(),
            }
        })
    }

    /// Must be called with `load_lock` held.
    fn install(&self) -> Result<Arc<QueryEngine>> {
        let start = Instant::now();
        let dataset = Arc::new(Dataset::open(&self.data_path)?);
        log_dataset_load_stats(&dataset, start.elapsed().as_secs_f64() * 1000.0);

        let settings = self.config.engine_settings();
        let engine = Arc::new(log_timed_operation("build_engine", || {
            QueryEngine::new(dataset, settings)
        })?);
        let previous = self.engine.write().replace(Arc::clone(&engine));
        if let Some(previous) = previous {
            // Release the old cache now rather than when its last query ends.
            previous.store().invalidate();
        }
        Ok(engine)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("data_path", &self.data_path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
