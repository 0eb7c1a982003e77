pub mod appresult;
pub mod config;
pub mod db;
pub mod events;
pub mod profiles;
pub mod res;
pub mod store;
pub mod tz;

use axum::{debug_handler, extract::FromRef, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use events::EventLocks;
use store::Store;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Store,
    pub locks: EventLocks,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self { store, locks: EventLocks::default() }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/test", get(test))
        .nest("/profile", profiles::router())
        .nest("/events", events::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[debug_handler]
async fn test() -> Json<Value> {
    Json(json!({ "message": "server endpoints are working" }))
}
