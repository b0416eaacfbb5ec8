//! # isobar
//!
//! Point-and-time queries over a gridded NetCDF dataset without loading it
//! into memory.
//!
//! ## Architecture
//!
//! - **Grid**: maps timestamps and coordinates to array offsets ([`grid`]).
//! - **Storage**: reads `[time, lat, lon]` hyperslabs in fixed time chunks
//!   through a byte-bounded LRU cache ([`store`]).
//! - **Catalog**: variable names, units and decoding metadata ([`catalog`]).
//! - **Queries**: single-point series ([`engine`]) and multi-location batches
//!   ([`batch`]).
//! - **Server**: axum handlers over a reloadable engine ([`handlers`], [`state`]).

pub mod batch;
pub mod catalog;
pub mod config;
#[cfg(feature = "netcdf")]
pub mod data_loader;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod grid;
pub mod handlers;
pub mod logging;
pub mod state;
pub mod store;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchCoordinator, BatchQuery, BatchResult, LocationInput, LocationResult, VariableSeries};
pub use catalog::{VariableCatalog, VariableInfo};
pub use config::Config;
pub use dataset::{Dataset, DatasetSummary};
pub use engine::{EngineSettings, Precision, Query, QueryEngine, QueryResult, TimeValue};
pub use error::{ErrorClass, IsobarError, Result};
pub use grid::{GridIndex, GridPoint, SpatialAxis, SpatialResolution, TimeAxis};
pub use logging::{
    create_http_trace_layer, generate_request_id, init_tracing, log_dataset_load_stats,
    log_operation_end, log_operation_start, log_request_error, log_timed_operation,
};
pub use state::AppState;
pub use store::{ChunkSource, ChunkStore, MemorySource};
