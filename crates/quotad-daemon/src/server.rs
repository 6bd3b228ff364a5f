//! HTTP surface of the daemon.
//!
//! Two POST endpoints, both taking a sealed credential as the request body:
//! `/quota` reports a user's allocations and `/folders` creates, resizes,
//! or deletes a project folder.

use axum::Router;
use axum::routing::post;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::check::check_quota;
use crate::state::SharedState;
use crate::update::update_folder;

/// Upper bound on request body size.
///
/// A sealed credential wrapping either request payload fits in a few
/// kilobytes; anything close to this limit is garbage or abuse.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the daemon router with both endpoints and the shared middleware
/// stack. The body limit sits outermost so oversized requests are refused
/// before any handler work happens.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/quota", post(check_quota))
        .route("/folders", post(update_folder))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
