use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{AppResult, AppState};

use super::{SessionAuthenticator, UserStore};

#[derive(Deserialize)]
pub(crate) struct Credentials {
    #[serde(default)]
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) password: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(users): State<UserStore>,
    State(auth): State<SessionAuthenticator>,
    Json(Credentials { username, password }): Json<Credentials>,
) -> AppResult<Json<Value>> {
    let username = users.verify(&username, &password).await?;
    let token = auth.issue(&username)?;

    tracing::info!(%username, "login");
    Ok(Json(json!({ "token": token })))
}
