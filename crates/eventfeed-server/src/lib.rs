//! HTTP surface of the event feed.
//!
//! The same API is mounted under `/calendar/v1` and `/calendar/v2`.

pub mod routes;
pub mod state;

pub use routes::AppError;
pub use state::AppState;

use axum::{http::Method, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const NAMESPACES: [&str; 2] = ["/calendar/v1", "/calendar/v2"];

fn api() -> Router<AppState> {
    Router::new()
        .merge(routes::calendar::router())
        .merge(routes::render::router())
        .merge(routes::admin::router())
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let mut app = Router::new().route(
        "/health",
        get(|| async { Json(serde_json::json!({ "status": "ok" })) }),
    );
    for ns in NAMESPACES {
        app = app.nest(ns, api());
    }

    app.with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
