mod extract;
mod login;
mod register;
pub mod token;
pub mod users;

pub use extract::{bearer_token, AuthUser};
pub use token::SessionAuthenticator;
pub use users::UserStore;

use axum::{routing::post, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register::register))
        .route("/api/login", post(login::login))
}
