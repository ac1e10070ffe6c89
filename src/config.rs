use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_JWT_SECRET: &str = "CHANGE_ME";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_BCRYPT_COST: u32 = 10;
const DEFAULT_WS_IDLE_TIMEOUT_SECS: u64 = 60;

/// Which connections receive a `new-message` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryScope {
    /// Every registered connection.
    #[default]
    All,
    /// Only connections bound to the sender or the recipient.
    Participants,
}

impl FromStr for DeliveryScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DeliveryScope::All),
            "participants" => Ok(DeliveryScope::Participants),
            other => Err(anyhow!("unknown delivery scope {other:?}, expected all or participants")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Absent means degraded mode: reads return empty and writes are not recorded.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub bcrypt_cost: u32,
    pub delivery_scope: DeliveryScope,
    pub ws_idle_timeout: Duration,
    /// Largest accepted upload body in bytes. `None` streams uploads of any size.
    pub upload_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_owned(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            delivery_scope: DeliveryScope::All,
            ws_idle_timeout: Duration::from_secs(DEFAULT_WS_IDLE_TIMEOUT_SECS),
            upload_limit: None,
        }
    }
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fn parse<T: FromStr>(key: &str, value: Option<String>, default: T) -> anyhow::Result<T>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            match value {
                Some(v) => v.trim().parse().with_context(|| format!("invalid {key}: {v:?}")),
                None => Ok(default),
            }
        }

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set, falling back to an insecure default");
                DEFAULT_JWT_SECRET.to_owned()
            }
        };

        let delivery_scope = match get("DELIVERY_SCOPE") {
            Some(v) => v.parse()?,
            None => DeliveryScope::default(),
        };

        let idle_secs = parse(
            "WS_IDLE_TIMEOUT_SECS",
            get("WS_IDLE_TIMEOUT_SECS"),
            DEFAULT_WS_IDLE_TIMEOUT_SECS,
        )?;
        if idle_secs == 0 {
            bail!("WS_IDLE_TIMEOUT_SECS must be greater than zero");
        }

        let upload_limit = match get("UPLOAD_LIMIT_BYTES") {
            Some(v) => Some(parse("UPLOAD_LIMIT_BYTES", Some(v), 0)?),
            None => None,
        };

        Ok(Config {
            port: parse("PORT", get("PORT"), DEFAULT_PORT)?,
            database_url: get("DATABASE_URL"),
            jwt_secret,
            upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| DEFAULT_UPLOAD_DIR.into()),
            bcrypt_cost: parse("BCRYPT_COST", get("BCRYPT_COST"), DEFAULT_BCRYPT_COST)?,
            delivery_scope,
            ws_idle_timeout: Duration::from_secs(idle_secs),
            upload_limit,
        })
    }
}
