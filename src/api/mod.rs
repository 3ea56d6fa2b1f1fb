pub mod columns;
pub mod comments;
mod state;
pub mod tags;
pub mod tasks;
pub mod users;

use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Json, Router};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::{AppState, Pool};

pub fn create_router(pool: Pool) -> Router {
    let state = AppState {
        pool: Arc::new(pool),
    };

    // The development frontend runs on localhost:3000 and sends credentials,
    // so the origin has to be listed explicitly rather than wildcarded.
    let cors = CorsLayer::new()
        .allow_origin(
            "http://localhost:3000"
                .parse::<HeaderValue>()
                .expect("valid origin"),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
        .merge(columns::create_router())
        .merge(tasks::create_router())
        .merge(users::create_router())
        .merge(comments::create_router())
        .merge(tags::create_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to Kanban API" }))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Deserializer for patch fields that need to tell "key absent" apart from
/// "key explicitly null". Pair with `#[serde(default)]`: an absent key stays
/// `None`, `null` becomes `Some(None)`, a value becomes `Some(Some(v))`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
