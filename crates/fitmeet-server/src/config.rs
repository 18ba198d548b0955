use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Secrets that ship in examples and must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source, so tests never touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("FITMEET_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("FITMEET_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("FITMEET_PORT is not a port number: {}", raw))?,
            None => 3000,
        };
        let db_path = lookup("FITMEET_DB_PATH").unwrap_or_else(|| "fitmeet.db".into());

        let jwt_secret = lookup("FITMEET_JWT_SECRET").unwrap_or_default();
        let trimmed = jwt_secret.trim();
        if trimmed.is_empty() {
            bail!("FITMEET_JWT_SECRET must be set");
        }
        if PLACEHOLDER_SECRETS.iter().any(|p| trimmed.eq_ignore_ascii_case(p)) {
            bail!("FITMEET_JWT_SECRET is still a placeholder value; pick a real secret");
        }

        let token_ttl_days = match lookup("FITMEET_TOKEN_TTL_DAYS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("FITMEET_TOKEN_TTL_DAYS is not a number: {}", raw))?,
            None => 30,
        };
        if token_ttl_days < 1 {
            bail!("FITMEET_TOKEN_TTL_DAYS must be at least 1");
        }

        Ok(Self {
            host,
            port,
            db_path: PathBuf::from(db_path),
            jwt_secret,
            token_ttl_days,
        })
    }
}
