use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};

use crate::{AppResult, AppState};

use super::{login::Credentials, UserStore};

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(users): State<UserStore>,
    Json(Credentials { username, password }): Json<Credentials>,
) -> AppResult<Json<Value>> {
    users.create(&username, &password).await?;
    Ok(Json(json!({ "success": true })))
}
