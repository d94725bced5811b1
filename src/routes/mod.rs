//! Route modules for the redate server

pub mod documents;
pub mod files;
pub mod health;

use axum::{extract::DefaultBodyLimit, Router};

use crate::state::AppState;

/// Multipart overhead allowed on top of the file size limit
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// All routes with their state and body limit applied
pub fn app(state: AppState) -> Router {
    let body_limit = state.config().server.max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .merge(health::router())
        .merge(documents::router())
        .merge(files::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
