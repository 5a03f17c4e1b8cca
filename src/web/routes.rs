use std::sync::Arc;

use axum::{
    http::header,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::LOCATION]);

    Router::new()
        .route("/", get(handlers::index))
        .route("/mode", get(handlers::mode))
        .route("/config", get(handlers::guest_config))
        // Controller endpoints
        .route(
            "/whep",
            post(handlers::controller_offer).options(handlers::preflight),
        )
        .route(
            "/whep/:id",
            patch(handlers::controller_trickle)
                .delete(handlers::controller_delete)
                .options(handlers::preflight),
        )
        // Viewer endpoints
        .route(
            "/whep/view",
            post(handlers::viewer_offer).options(handlers::preflight),
        )
        .route(
            "/whep/view/:id",
            patch(handlers::viewer_trickle)
                .delete(handlers::viewer_delete)
                .options(handlers::preflight),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
