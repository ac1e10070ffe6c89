pub mod conversation;
mod send;
pub mod store;

pub use conversation::ConversationService;
pub use store::{Message, MessageStore};

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations/{other}", get(conversation::conversation))
        .route("/api/messages/{other}", get(conversation::conversation))
        .route("/api/messages", post(send::send_message))
}
