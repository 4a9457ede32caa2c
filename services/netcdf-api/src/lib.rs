//! NetCDF to JSON conversion service.
//!
//! Accepts NetCDF uploads as multipart forms and answers with either a
//! complete JSON document (metadata or data) or a stream of per-cell grid
//! records separated by `||*split*||`.

pub mod config;
pub mod error;
pub mod form;
pub mod handlers;
pub mod metrics;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Route prefix shared by the conversion endpoints.
pub const CONVERT_PREFIX: &str = "/api/convert-netcdf-to-json";

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        // Conversions
        .route(
            &format!("{}/metadata", CONVERT_PREFIX),
            post(handlers::metadata_handler),
        )
        .route(
            &format!("{}/data", CONVERT_PREFIX),
            post(handlers::data_handler),
        )
        .route(
            &format!("{}/cerv2-data-chunks", CONVERT_PREFIX),
            post(handlers::grid_chunks_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
