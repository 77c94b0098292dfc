//! Key Fetcher: GET the issuer's JWKS document and pick a signing key record.
//!
//! Selection policy:
//! - if the token names a `kid` and a record carries the same `kid`, use that record
//! - otherwise use the first record in the set
//!
//! One outbound request per fetch. No retry, no backoff; the HTTP client owns timeouts.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::services::auth::error::AuthError;

/// Default timeout for the JWKS request.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Raw JWK as published by the issuer.
///
/// Fields are kept untyped; `convert` decides which ones the key type needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PublicKeyRecord(Map<String, Value>);

impl PublicKeyRecord {
    pub fn kty(&self) -> Option<&str> {
        self.field_str("kty")
    }

    pub fn kid(&self) -> Option<&str> {
        self.field_str("kid")
    }

    pub fn alg(&self) -> Option<&str> {
        self.field_str("alg")
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for PublicKeyRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// JWKS document body.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<PublicKeyRecord>,
}

/// Ordered, non-empty list of key records.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySet {
    keys: Vec<PublicKeyRecord>,
}

impl KeySet {
    /// Fails with `NoKey` for an empty list.
    pub fn new(keys: Vec<PublicKeyRecord>) -> Result<Self, AuthError> {
        if keys.is_empty() {
            return Err(AuthError::NoKey);
        }
        Ok(Self { keys })
    }

    /// Parse a JWKS body (`{ "keys": [ {..}, .. ] }`).
    pub fn from_slice(body: &[u8]) -> Result<Self, AuthError> {
        let document: JwksDocument = serde_json::from_slice(body)
            .map_err(|e| AuthError::fetch(format!("invalid key set body: {e}")))?;
        Self::new(document.keys)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains_kid(&self, kid: &str) -> bool {
        self.keys.iter().any(|key| key.kid() == Some(kid))
    }

    /// Pick the record matching `kid`, falling back to the first record.
    pub fn select(&self, kid: Option<&str>) -> Result<PublicKeyRecord, AuthError> {
        let matched = kid.and_then(|kid| self.keys.iter().find(|key| key.kid() == Some(kid)));

        matched
            .or_else(|| self.keys.first())
            .cloned()
            .ok_or(AuthError::NoKey)
    }
}

/// Where the gate gets its signing keys from.
///
/// Implementations must be shareable across requests.
#[async_trait]
pub trait KeySource: Send + Sync + 'static {
    /// Fetch the whole key set.
    async fn fetch_key_set(&self) -> Result<Arc<KeySet>, AuthError>;

    /// Fetch the key set and select one record for a token carrying `kid`.
    async fn fetch(&self, kid: Option<&str>) -> Result<PublicKeyRecord, AuthError> {
        self.fetch_key_set().await?.select(kid)
    }

    /// A signature check failed against keys this source handed out.
    ///
    /// Returns `true` when the next `fetch` may see a different key set, i.e. a retry is
    /// worth it. Sources that always go upstream have nothing to drop.
    async fn invalidate_after_rejection(&self) -> bool {
        false
    }
}

/// Fetches the key set over HTTP on every call.
#[derive(Debug, Clone)]
pub struct HttpKeyFetcher {
    jwks_url: String,
    http_client: reqwest::Client,
}

impl HttpKeyFetcher {
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self::with_timeout(jwks_url, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS))
    }

    pub fn with_timeout(jwks_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build jwks http client, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url: jwks_url.into(),
            http_client,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl KeySource for HttpKeyFetcher {
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch_key_set(&self) -> Result<Arc<KeySet>, AuthError> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "jwks request failed");
                AuthError::fetch(format!("jwks endpoint unreachable: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%status, "jwks endpoint returned error status");
            return Err(AuthError::fetch(format!("jwks endpoint returned {status}")));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(error = %e, "failed to read jwks response body");
            AuthError::fetch(format!("failed to read jwks body: {e}"))
        })?;

        let keys = KeySet::from_slice(&body)?;
        tracing::debug!(key_count = keys.len(), "jwks fetched");

        Ok(Arc::new(keys))
    }
}
