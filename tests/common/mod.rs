//! Common test utilities for isobar.

pub mod assertions;
pub mod http_client;
pub mod test_data;
