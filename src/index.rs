use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};

use crate::{messages::MessageStore, realtime::ConnectionRegistry, AppState};

#[debug_handler]
pub async fn index() -> &'static str {
    "Server is running"
}

#[debug_handler(state = AppState)]
pub async fn health(
    State(registry): State<Arc<ConnectionRegistry>>,
    State(store): State<MessageStore>,
) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": registry.connection_count().await,
        "store": store.is_available(),
    }))
}
