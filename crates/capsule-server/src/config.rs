use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Server configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    /// A file path, or `:memory:` for a throwaway database.
    pub db_location: String,
    pub media_dir: PathBuf,
    pub jwt_secret: String,
    pub db_timeout: Duration,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("CAPSULE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CAPSULE_JWT_SECRET is unset or still a placeholder");
        }

        let host = get("CAPSULE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("CAPSULE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("Invalid CAPSULE_PORT")?;
        let addr = format!("{}:{}", host, port)
            .parse()
            .context("Invalid CAPSULE_HOST")?;

        let db_timeout_ms: u64 = get("CAPSULE_DB_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("Invalid CAPSULE_DB_TIMEOUT_MS")?;
        let token_ttl_days: i64 = get("CAPSULE_TOKEN_TTL_DAYS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("Invalid CAPSULE_TOKEN_TTL_DAYS")?;
        if token_ttl_days <= 0 {
            bail!("CAPSULE_TOKEN_TTL_DAYS must be positive");
        }

        Ok(Self {
            addr,
            db_location: get("CAPSULE_DB_PATH").unwrap_or_else(|| "capsule.db".into()),
            media_dir: get("CAPSULE_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into(),
            jwt_secret,
            db_timeout: Duration::from_millis(db_timeout_ms),
            token_ttl: chrono::Duration::days(token_ttl_days),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("CAPSULE_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.db_location, "capsule.db");
        assert_eq!(config.media_dir, PathBuf::from("./media"));
        assert_eq!(config.db_timeout, Duration::from_secs(5));
        assert_eq!(config.token_ttl, chrono::Duration::days(30));
    }

    #[test]
    fn missing_or_placeholder_secret_is_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[("CAPSULE_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("CAPSULE_JWT_SECRET", "a-real-secret"),
            ("CAPSULE_HOST", "127.0.0.1"),
            ("CAPSULE_PORT", "8088"),
            ("CAPSULE_DB_PATH", ":memory:"),
            ("CAPSULE_DB_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8088".parse().unwrap());
        assert_eq!(config.db_location, ":memory:");
        assert_eq!(config.db_timeout, Duration::from_millis(250));
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(load(&[("CAPSULE_JWT_SECRET", "x1"), ("CAPSULE_PORT", "http")]).is_err());
    }
}
