use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    realtime::{Broadcaster, MessagePayload},
    AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct SendMessageBody {
    #[serde(default)]
    to: String,
    #[serde(default)]
    text: String,
}

/// HTTP entry to the same fan-out the realtime channel uses; the sender is the caller.
#[debug_handler(state = AppState)]
pub(crate) async fn send_message(
    AuthUser(caller): AuthUser,
    State(broadcaster): State<Broadcaster>,
    Json(SendMessageBody { to, text }): Json<SendMessageBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let payload = MessagePayload::new(caller.clone(), to, text);
    let outcome = broadcaster.handle_send(Some(&caller), payload).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "stored": outcome.stored.is_some(),
            "delivered": outcome.delivered,
        })),
    ))
}
