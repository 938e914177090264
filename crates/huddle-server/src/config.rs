use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Unset means in-memory repositories.
    pub db_path: Option<PathBuf>,
    pub upload_dir: PathBuf,
    /// URL path the published uploads are served under.
    pub public_upload_path: String,
    /// Unset means the assistant always answers with the fallback.
    pub completion: Option<CompletionConfig>,
    pub completion_timeout: Duration,
    /// Unset means permissive CORS.
    pub client_origin: Option<String>,
}

impl ServerConfig {
    /// Read `HUDDLE_*` variables. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("HUDDLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("HUDDLE_JWT_SECRET is unset or still a placeholder");
        }

        let port = match var("HUDDLE_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("HUDDLE_PORT is not a port: {raw:?}"))?,
            None => 3000,
        };

        let completion_timeout = match var("HUDDLE_COMPLETION_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("HUDDLE_COMPLETION_TIMEOUT_SECS is not a number: {raw:?}"))?,
            ),
            None => Duration::from_secs(20),
        };

        let completion = var("HUDDLE_COMPLETION_URL").map(|url| CompletionConfig {
            url,
            api_key: var("HUDDLE_COMPLETION_API_KEY"),
            model: var("HUDDLE_COMPLETION_MODEL").unwrap_or_else(|| "gpt-4".into()),
        });

        let public_upload_path = var("HUDDLE_PUBLIC_UPLOAD_PATH").unwrap_or_else(|| "/uploads".into());
        if !public_upload_path.starts_with('/') || public_upload_path == "/" {
            bail!("HUDDLE_PUBLIC_UPLOAD_PATH must be an absolute sub-path, got {public_upload_path:?}");
        }

        Ok(Self {
            host: var("HUDDLE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            jwt_secret,
            db_path: var("HUDDLE_DB_PATH").map(PathBuf::from),
            upload_dir: var("HUDDLE_UPLOAD_DIR")
                .unwrap_or_else(|| "./uploads".into())
                .into(),
            public_upload_path: public_upload_path.trim_end_matches('/').to_string(),
            completion,
            completion_timeout,
            client_origin: var("HUDDLE_CLIENT_ORIGIN"),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_with_only_a_secret() {
        let cfg = config(&[("HUDDLE_JWT_SECRET", "s3cret-value")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert!(cfg.db_path.is_none());
        assert!(cfg.completion.is_none());
        assert_eq!(cfg.public_upload_path, "/uploads");
        assert_eq!(cfg.completion_timeout, Duration::from_secs(20));
    }

    #[test]
    fn placeholder_and_missing_secrets_are_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("HUDDLE_JWT_SECRET", "dev-secret-change-me")]).is_err());
        assert!(config(&[("HUDDLE_JWT_SECRET", "  ")]).is_err());
    }

    #[test]
    fn completion_is_enabled_by_url() {
        let cfg = config(&[
            ("HUDDLE_JWT_SECRET", "s3cret-value"),
            ("HUDDLE_COMPLETION_URL", "http://localhost:8080/v1/chat/completions"),
            ("HUDDLE_COMPLETION_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        let completion = cfg.completion.unwrap();
        assert_eq!(completion.model, "gpt-4");
        assert!(completion.api_key.is_none());
        assert_eq!(cfg.completion_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("HUDDLE_JWT_SECRET", "s3cret-value"), ("HUDDLE_PORT", "http")]).is_err());
        assert!(config(&[("HUDDLE_JWT_SECRET", "x"), ("HUDDLE_PUBLIC_UPLOAD_PATH", "uploads")]).is_err());
    }
}
