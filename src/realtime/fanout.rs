use std::sync::Arc;

use crate::{
    config::DeliveryScope,
    messages::{Message, MessageStore},
    AppError, AppResult,
};

use super::{
    event::{MessagePayload, ServerEvent},
    registry::ConnectionRegistry,
};

/// What happened to one send.
#[derive(Debug)]
pub struct SendOutcome {
    /// `None` when the store was unavailable and the message went out live only.
    pub stored: Option<Message>,
    pub delivered: usize,
}

/// Persists each new message and pushes it to the registry.
#[derive(Clone)]
pub struct Broadcaster {
    store: MessageStore,
    registry: Arc<ConnectionRegistry>,
    scope: DeliveryScope,
}

impl Broadcaster {
    pub fn new(store: MessageStore, registry: Arc<ConnectionRegistry>, scope: DeliveryScope) -> Self {
        Self { store, registry, scope }
    }

    /// Validates, appends, then broadcasts `new-message`. `origin` is the sending connection's identity.
    pub async fn handle_send(
        &self,
        origin: Option<&str>,
        payload: MessagePayload,
    ) -> AppResult<SendOutcome> {
        validate(origin, &payload)?;

        let stored = match self.store.append(&payload.from, &payload.to, &payload.text).await {
            Ok(message) => Some(message),
            Err(AppError::StoreUnavailable) => {
                tracing::warn!(
                    sender = %payload.from,
                    recipient = %payload.to,
                    "store unavailable, broadcasting without persisting"
                );
                None
            }
            Err(err) => return Err(err),
        };

        let participants = [payload.from.clone(), payload.to.clone()];
        let event = ServerEvent::NewMessage(payload);
        let delivered = match self.scope {
            DeliveryScope::All => self.registry.broadcast(&event).await,
            DeliveryScope::Participants => {
                let targets = [participants[0].as_str(), participants[1].as_str()];
                self.registry.broadcast_to(&targets, &event).await
            }
        };

        Ok(SendOutcome { stored, delivered })
    }
}

fn validate(origin: Option<&str>, payload: &MessagePayload) -> AppResult<()> {
    if payload.from.trim().is_empty() {
        return Err(AppError::validation("from is required"));
    }
    if payload.to.trim().is_empty() {
        return Err(AppError::validation("to is required"));
    }
    if payload.text.is_empty() {
        return Err(AppError::validation("text is required"));
    }
    if let Some(origin) = origin {
        if origin != payload.from {
            return Err(AppError::validation(format!(
                "connection is bound to {origin}, cannot send as {}",
                payload.from
            )));
        }
    }
    Ok(())
}
