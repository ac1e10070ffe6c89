pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod index;
pub mod messages;
pub mod realtime;
pub mod uploads;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use auth::{SessionAuthenticator, UserStore};
use config::Config;
use messages::{ConversationService, MessageStore};
use realtime::{Broadcaster, ConnectionRegistry};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: MessageStore,
    pub users: UserStore,
    pub auth: SessionAuthenticator,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    pub conversations: ConversationService,
}

impl AppState {
    /// Wires every component around one registry. `pool` is `None` in degraded mode.
    pub fn new(config: Config, pool: Option<SqlitePool>) -> Self {
        let store = MessageStore::from_pool(pool.clone());
        let users = UserStore::new(pool, config.bcrypt_cost);
        let auth = SessionAuthenticator::new(&config.jwt_secret);
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(store.clone(), registry.clone(), config.delivery_scope);
        let conversations = ConversationService::new(auth.clone(), store.clone());

        Self {
            config: Arc::new(config),
            store,
            users,
            auth,
            registry,
            broadcaster,
            conversations,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index::index))
        .route("/health", get(index::health))

        .merge(auth::router())
        .merge(messages::router())
        .merge(realtime::router())
        .merge(uploads::router(&state.config))

        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
