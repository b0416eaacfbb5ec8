//! Configuration management for isobar.
//!
//! Layered configuration, highest precedence first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::{EngineSettings, Precision, MAX_DECIMALS};
use crate::error::{IsobarError, Result};

/// Default location of the dataset served when no path is given.
pub const DEFAULT_DATA_PATH: &str = "./data/2025-06-01T00_00_00_cn_flatted.nc";

/// Command-line arguments for isobar
#[derive(Parser, Debug, Default)]
#[command(name = "isobar")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the NetCDF file to serve
    #[arg(env = "ISOBAR_DATA_PATH")]
    pub data_file: Option<PathBuf>,

    /// Host address to bind to
    #[arg(short = 'H', long, env = "ISOBAR_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "ISOBAR_PORT")]
    pub port: Option<u16>,

    /// Number of runtime worker threads
    #[arg(short, long, env = "ISOBAR_WORKERS")]
    pub workers: Option<usize>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "ISOBAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ISOBAR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Time steps per cached chunk
    #[arg(long, env = "ISOBAR_CHUNK_STEPS")]
    pub chunk_steps: Option<usize>,

    /// Chunk cache capacity in MiB
    #[arg(long, env = "ISOBAR_CACHE_MB")]
    pub cache_capacity_mb: Option<usize>,

    /// Nearest-match tolerance in degrees
    #[arg(long, env = "ISOBAR_TOLERANCE")]
    pub tolerance: Option<f64>,

    /// Decimals kept in single-point results (full precision if unset)
    #[arg(long, env = "ISOBAR_SINGLE_PRECISION")]
    pub single_precision: Option<u32>,

    /// Decimals kept in batch results
    #[arg(long, env = "ISOBAR_BATCH_PRECISION")]
    pub batch_precision: Option<u32>,

    /// Worker threads used per batch query
    #[arg(long, env = "ISOBAR_BATCH_PARALLELISM")]
    pub batch_parallelism: Option<usize>,

    /// Maximum locations accepted in one batch
    #[arg(long, env = "ISOBAR_MAX_BATCH_LOCATIONS")]
    pub max_batch_locations: Option<usize>,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Runtime worker threads (None = number of CPU cores)
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Dataset location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

/// Query engine tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_chunk_steps")]
    pub chunk_steps: usize,

    #[serde(default = "default_cache_capacity_mb")]
    pub cache_capacity_mb: usize,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Decimals for single-point values; `null` keeps full precision.
    #[serde(default)]
    pub single_precision: Option<u32>,

    /// Decimals for batch values; `null` keeps full precision.
    #[serde(default = "default_batch_precision")]
    pub batch_precision: Option<u32>,

    #[serde(default = "default_batch_parallelism")]
    pub batch_parallelism: usize,

    #[serde(default = "default_max_batch_locations")]
    pub max_batch_locations: usize,
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources, returning it with the data path.
    pub fn load() -> Result<(Self, PathBuf)> {
        Self::from_args(Args::parse())
    }

    /// Resolve configuration from already parsed arguments.
    pub fn from_args(args: Args) -> Result<(Self, PathBuf)> {
        let mut config = match &args.config {
            Some(path) => Self::load_from_file(path)?,
            None => Config::default(),
        };

        config.apply_args(&args);

        let data_path = args
            .data_file
            .or_else(|| config.data.file_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        Ok((config, data_path))
    }

    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IsobarError::Config {
            message: format!("Cannot read config file {}: {}", path.display(), e),
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override fields with anything given on the command line or environment
    fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if args.workers.is_some() {
            self.server.workers = args.workers;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }

        let engine = &mut self.engine;
        if let Some(steps) = args.chunk_steps {
            engine.chunk_steps = steps;
        }
        if let Some(mb) = args.cache_capacity_mb {
            engine.cache_capacity_mb = mb;
        }
        if let Some(tolerance) = args.tolerance {
            engine.tolerance = tolerance;
        }
        if args.single_precision.is_some() {
            engine.single_precision = args.single_precision;
        }
        if args.batch_precision.is_some() {
            engine.batch_precision = args.batch_precision;
        }
        if let Some(parallelism) = args.batch_parallelism {
            engine.batch_parallelism = parallelism;
        }
        if let Some(max) = args.max_batch_locations {
            engine.max_batch_locations = max;
        }
    }

    /// Settings handed to the query engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            chunk_steps: self.engine.chunk_steps,
            cache_bytes: self.engine.cache_capacity_mb.saturating_mul(1024 * 1024),
            tolerance: self.engine.tolerance,
            single_precision: Precision::from_decimals(self.engine.single_precision),
            batch_precision: Precision::from_decimals(self.engine.batch_precision),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(IsobarError::Config { message });

        if self.server.host.is_empty() {
            return invalid("Server host cannot be empty".to_string());
        }
        if self.server.port == 0 {
            return invalid("Server port cannot be 0".to_string());
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return invalid(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.log_level
                ));
            }
        }

        let engine = &self.engine;
        if engine.chunk_steps == 0 {
            return invalid("chunk_steps must be at least 1".to_string());
        }
        if engine.cache_capacity_mb == 0 {
            return invalid("cache_capacity_mb must be at least 1".to_string());
        }
        if !(engine.tolerance.is_finite() && engine.tolerance > 0.0) {
            return invalid(format!(
                "tolerance must be a positive number, got {}",
                engine.tolerance
            ));
        }
        for (name, decimals) in [
            ("single_precision", engine.single_precision),
            ("batch_precision", engine.batch_precision),
        ] {
            if decimals.is_some_and(|d| d > MAX_DECIMALS) {
                return invalid(format!(
                    "{} must be at most {}, got {:?}",
                    name, MAX_DECIMALS, decimals
                ));
            }
        }
        if engine.batch_parallelism == 0 {
            return invalid("batch_parallelism must be at least 1".to_string());
        }
        if engine.max_batch_locations == 0 {
            return invalid("max_batch_locations must be at least 1".to_string());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data: DataConfig::default(),
            engine: EngineConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_steps: default_chunk_steps(),
            cache_capacity_mb: default_cache_capacity_mb(),
            tolerance: default_tolerance(),
            single_precision: None,
            batch_precision: default_batch_precision(),
            batch_parallelism: default_batch_parallelism(),
            max_batch_locations: default_max_batch_locations(),
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_chunk_steps() -> usize {
    crate::store::DEFAULT_CHUNK_STEPS
}

fn default_cache_capacity_mb() -> usize {
    256
}

fn default_tolerance() -> f64 {
    crate::engine::DEFAULT_TOLERANCE
}

fn default_batch_precision() -> Option<u32> {
    Some(2)
}

fn default_batch_parallelism() -> usize {
    1
}

fn default_max_batch_locations() -> usize {
    1000
}
