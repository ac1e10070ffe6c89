use sqlx::SqlitePool;

use crate::{AppError, AppResult};

/// Username + bcrypt hash records, sharing the message store's pool.
#[derive(Clone)]
pub struct UserStore {
    pool: Option<SqlitePool>,
    bcrypt_cost: u32,
}

impl UserStore {
    pub fn new(pool: Option<SqlitePool>, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    fn pool(&self) -> AppResult<&SqlitePool> {
        self.pool
            .as_ref()
            .filter(|pool| !pool.is_closed())
            .ok_or(AppError::StoreUnavailable)
    }

    pub async fn create(&self, username: &str, password: &str) -> AppResult<()> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("username and password are required"));
        }
        let pool = self.pool()?;

        let cost = self.bcrypt_cost;
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(anyhow::Error::from)?;

        let result = sqlx::query("INSERT INTO users (username,password_hash) VALUES (?,?)")
            .bind(username)
            .bind(hash)
            .execute(pool)
            .await;

        match result {
            Ok(_) => {
                tracing::info!(username, "registered user");
                Ok(())
            }
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(AppError::Conflict(format!("username {username} is taken")))
            }
            Err(err) => {
                tracing::warn!(error = %err, username, "user insert failed");
                Err(AppError::StoreUnavailable)
            }
        }
    }

    /// Checks a password and returns the canonical username on success.
    pub async fn verify(&self, username: &str, password: &str) -> AppResult<String> {
        let pool = self.pool()?;

        let row: Option<(String, String)> =
            sqlx::query_as("SELECT username,password_hash FROM users WHERE username=?")
                .bind(username)
                .fetch_optional(pool)
                .await
                .map_err(|err| {
                    tracing::warn!(error = %err, username, "user lookup failed");
                    AppError::StoreUnavailable
                })?;

        let Some((username, hash)) = row else {
            return Err(AppError::NotFound("user not found".to_owned()));
        };

        let password = password.to_owned();
        let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(anyhow::Error::from)?;

        if ok {
            Ok(username)
        } else {
            Err(AppError::unauthorized("wrong password"))
        }
    }
}
