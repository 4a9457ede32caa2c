//! HTTP request handlers for the conversion service.

pub mod convert;
pub mod health;

pub use convert::{data_handler, grid_chunks_handler, metadata_handler};
pub use health::{health_handler, metrics_handler};
