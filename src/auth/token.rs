use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub iat: i64,
}

/// Issues and verifies HS256 bearer tokens. Tokens carry no expiry.
#[derive(Clone)]
pub struct SessionAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionAuthenticator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, identity: &str) -> AppResult<String> {
        let claims = Claims {
            sub: identity.to_owned(),
            iat: OffsetDateTime::now_utc().unix_timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| anyhow::anyhow!("failed to sign token: {err}").into())
    }

    /// Resolves a token to its identity. Anything short of a valid signature over a
    /// non-empty subject is `Unauthorized`.
    pub fn verify(&self, token: &str) -> AppResult<String> {
        let token = strip_bearer(token);
        if token.is_empty() {
            return Err(AppError::unauthorized("no token"));
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            tracing::debug!(error = %err, "token rejected");
            AppError::unauthorized("invalid token")
        })?;

        if data.claims.sub.is_empty() {
            return Err(AppError::unauthorized("invalid token"));
        }
        Ok(data.claims.sub)
    }
}

fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim_start(),
        _ => value,
    }
}
