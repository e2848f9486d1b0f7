use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("KIND_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("KIND_JWT_SECRET is unset or still a placeholder; it must match the auth provider's signing secret");
        }

        let db_path = get("KIND_DB_PATH").unwrap_or_else(|| "kindmatch.db".into()).into();
        let host = get("KIND_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("KIND_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("KIND_PORT must be a port number")?;
        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("KIND_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("kindmatch.db"));
        assert_eq!(config.addr.port(), 3000);
    }

    #[test]
    fn test_rejects_placeholder_secret() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("KIND_JWT_SECRET", "dev-secret-change-me")])).is_err());
    }

    #[test]
    fn test_bad_port() {
        let result = Config::from_lookup(lookup(&[("KIND_JWT_SECRET", "s3cret"), ("KIND_PORT", "http")]));
        assert!(result.is_err());
    }
}
