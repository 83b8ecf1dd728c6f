use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("PIGEON_JWT_SECRET").unwrap_or_default();
        if jwt_secret.len() < MIN_SECRET_LEN || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PIGEON_JWT_SECRET is unset, shorter than {MIN_SECRET_LEN} bytes, or still a placeholder");
        }

        let host = lookup("PIGEON_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("PIGEON_PORT")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("PIGEON_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("PIGEON_HOST '{}' is not a valid IP address", host))?;

        let db_path: PathBuf = lookup("PIGEON_DB_PATH")
            .unwrap_or_else(|| "pigeon.db".into())
            .into();

        let ttl_days: i64 = lookup("PIGEON_TOKEN_TTL_DAYS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("PIGEON_TOKEN_TTL_DAYS must be a whole number of days")?;
        if !(1..=365).contains(&ttl_days) {
            bail!("PIGEON_TOKEN_TTL_DAYS must be between 1 and 365");
        }

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            token_ttl: chrono::Duration::days(ttl_days),
        })
    }
}
