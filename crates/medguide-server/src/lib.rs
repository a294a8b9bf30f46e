//! medguide-server
//!
//! HTTP surface over the diagnosis engine. The router is built here so it
//! can be driven in tests without binding a socket; `main.rs` resolves the
//! environment and serves it.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::middleware as axum_mw;
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

pub use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/sessions", post(routes::sessions::create_session))
        .route("/sessions/{id}", delete(routes::sessions::end_session))
        .route("/sessions/{id}/turns", post(routes::sessions::submit_turn))
        .route("/patients/{id}/review", get(routes::patients::review_patient))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(axum_mw::from_fn(middleware::audit::audit_log)),
        )
        .with_state(state)
}
