/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, Auth 設定, JWKS 設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use url::Url;

use crate::services::auth::jwks::DEFAULT_HTTP_TIMEOUT_SECONDS;
use crate::services::auth::key_cache::{DEFAULT_CACHE_TTL_SECONDS, DEFAULT_MIN_REFRESH_SECONDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub auth_algorithm: String,

    pub jwks_url: Url,
    pub jwks_cache_ttl_seconds: u64,
    pub jwks_min_refresh_seconds: u64,
    pub jwks_http_timeout_seconds: u64,

    pub request_body_limit_bytes: usize,
    pub request_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match lookup("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = match lookup("APP_ENV").map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("production") | Some("prod") => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let auth_issuer = required(&lookup, "AUTH_ISSUER")?;
        let auth_audience = required(&lookup, "AUTH_AUDIENCE")?;

        // Not validated against the known list here; an unknown name fails every token.
        let auth_algorithm = lookup("AUTH_ALGORITHM")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "RS256".to_string());

        let jwks_url = match lookup("AUTH_JWKS_URL").filter(|v| !v.trim().is_empty()) {
            Some(v) => Url::parse(v.trim()).map_err(|_| ConfigError::Invalid("AUTH_JWKS_URL"))?,
            None => default_jwks_url(&auth_issuer)
                .map_err(|_| ConfigError::Invalid("AUTH_ISSUER"))?,
        };

        let jwks_cache_ttl_seconds =
            seconds(&lookup, "JWKS_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS)?;
        let jwks_min_refresh_seconds =
            seconds(&lookup, "JWKS_MIN_REFRESH_SECONDS", DEFAULT_MIN_REFRESH_SECONDS)?;
        let jwks_http_timeout_seconds = seconds(
            &lookup,
            "JWKS_HTTP_TIMEOUT_SECONDS",
            DEFAULT_HTTP_TIMEOUT_SECONDS,
        )?;

        let request_body_limit_bytes = match lookup("REQUEST_BODY_LIMIT_BYTES") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("REQUEST_BODY_LIMIT_BYTES"))?,
            None => 1024 * 1024,
        };
        let request_timeout_seconds = seconds(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?;
        // The JWKS request must give up first; otherwise a slow issuer shows up as a 408.
        if request_timeout_seconds <= jwks_http_timeout_seconds {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            auth_issuer,
            auth_audience,
            auth_algorithm,
            jwks_url,
            jwks_cache_ttl_seconds,
            jwks_min_refresh_seconds,
            jwks_http_timeout_seconds,
            request_body_limit_bytes,
            request_timeout_seconds,
        })
    }
}

/// `{issuer}/.well-known/jwks.json`
pub fn default_jwks_url(issuer: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{}/.well-known/jwks.json",
        issuer.trim().trim_end_matches('/')
    ))
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn seconds<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}
