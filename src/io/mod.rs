//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `http` - HTTP API for event ingestion, queries, and metrics
//! - `zone_file` - Zone definition file loading

pub mod http;
pub mod zone_file;

// Re-export commonly used types
pub use http::start_http_server;
pub use zone_file::load_zones;
