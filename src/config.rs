// src/config.rs

use std::{env, fmt, net::SocketAddr, path::PathBuf};

use dotenvy::dotenv;

/// Raised when the environment cannot produce a usable configuration.
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has invalid value '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Signs session and attempt tokens.
    pub secret_key: String,
    /// Session token lifetime in seconds.
    pub session_expiration: u64,
    /// Queue broker. `None` means essay grading runs inline.
    pub broker_url: Option<String>,
    /// Where the worker records task status. Defaults to the broker.
    pub result_backend_url: Option<String>,
    pub cert_folder: PathBuf,
    pub bind_addr: SocketAddr,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Lifetime of the token handed out when a quiz is started.
pub const ATTEMPT_TOKEN_TTL_SECS: u64 = 4 * 60 * 60;

/// Number of rows on a quiz leaderboard.
pub const LEADERBOARD_SIZE: i64 = 10;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://instance/quiz.db".to_string());

        let secret_key = env::var("SECRET_KEY").map_err(|_| ConfigError::Missing("SECRET_KEY"))?;

        let session_expiration = match env::var("SESSION_EXPIRATION") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "SESSION_EXPIRATION",
                value: raw,
            })?,
            Err(_) => 86_400,
        };

        let broker_url = optional("BROKER_URL");
        let result_backend_url = optional("RESULT_BACKEND_URL").or_else(|| broker_url.clone());

        let cert_folder = env::var("CERT_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("instance/certificates"));

        let bind_raw = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            secret_key,
            session_expiration,
            broker_url,
            result_backend_url,
            cert_folder,
            bind_addr,
            rust_log,
            admin_username: optional("ADMIN_USERNAME"),
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
