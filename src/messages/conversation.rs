use axum::{
    debug_handler,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use crate::{
    auth::{bearer_token, AuthUser, SessionAuthenticator},
    AppError, AppResult, AppState,
};

use super::store::{Message, MessageStore};

/// Authorized reads of a caller's history with one other identity.
#[derive(Clone)]
pub struct ConversationService {
    auth: SessionAuthenticator,
    store: MessageStore,
}

impl ConversationService {
    pub fn new(auth: SessionAuthenticator, store: MessageStore) -> Self {
        Self { auth, store }
    }

    /// `token` must resolve to `caller`. An unavailable store yields an empty history.
    pub async fn get_conversation(
        &self,
        caller: &str,
        other: &str,
        token: Option<&str>,
    ) -> AppResult<Vec<Message>> {
        let token = token.ok_or_else(|| AppError::unauthorized("no token"))?;
        if self.auth.verify(token)? != caller {
            return Err(AppError::unauthorized(format!("token does not belong to {caller}")));
        }

        let messages = self.store.query(caller, other).await;
        tracing::debug!(%caller, other, count = messages.len(), "conversation read");
        Ok(messages)
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversation(
    State(service): State<ConversationService>,
    AuthUser(caller): AuthUser,
    Path(other): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Message>>> {
    let messages = service
        .get_conversation(&caller, &other, bearer_token(&headers))
        .await?;
    Ok(Json(messages))
}
