pub mod event;
pub mod fanout;
pub mod registry;
mod ws;

pub use event::{ClientEvent, MessagePayload, ServerEvent};
pub use fanout::{Broadcaster, SendOutcome};
pub use registry::{Connection, ConnectionId, ConnectionRegistry};

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::realtime_ws))
}
