//! Authorization Gate (framework independent part).
//!
//! Pulls the bearer token out of the request headers, runs fetch -> convert -> verify and
//! classifies the result:
//! - any `JwtError` is the client's problem -> `Unauthorized`
//! - anything else is ours -> `Fault`, handed back untouched
use std::sync::Arc;

use axum::http::{HeaderMap, header};
use tracing::instrument;

use crate::services::auth::claims::TokenClaims;
use crate::services::auth::convert::convert;
use crate::services::auth::error::{AuthError, JwtErrorKind};
use crate::services::auth::jwks::KeySource;
use crate::services::auth::options::AuthorizationOptions;
use crate::services::auth::verify::{peek_kid, verify};

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was rejected. Never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingCredentials,
    InvalidToken(JwtErrorKind),
}

#[derive(Debug)]
pub enum VerificationOutcome {
    Authorized(TokenClaims),
    Unauthorized(RejectReason),
    Fault(AuthError),
}

impl VerificationOutcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }
}

impl From<Result<TokenClaims, AuthError>> for VerificationOutcome {
    fn from(result: Result<TokenClaims, AuthError>) -> Self {
        match result {
            Ok(claims) => Self::Authorized(claims),
            Err(AuthError::Jwt(err)) => Self::Unauthorized(RejectReason::InvalidToken(err.kind)),
            Err(fault) => Self::Fault(fault),
        }
    }
}

/// Shared, immutable per-process gate.
pub struct Authorizer {
    options: AuthorizationOptions,
    keys: Arc<dyn KeySource>,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("options", &self.options)
            .finish()
    }
}

impl Authorizer {
    pub fn new(options: AuthorizationOptions, keys: Arc<dyn KeySource>) -> Self {
        Self { options, keys }
    }

    pub fn options(&self) -> &AuthorizationOptions {
        &self.options
    }

    /// Decide what happens to a request carrying `headers`.
    #[instrument(skip_all)]
    pub async fn authorize(&self, headers: &HeaderMap) -> VerificationOutcome {
        let Some(token) = bearer_token(headers) else {
            tracing::warn!("missing or malformed authorization header");
            return VerificationOutcome::Unauthorized(RejectReason::MissingCredentials);
        };

        let outcome = VerificationOutcome::from(self.verify_token(token).await);
        match &outcome {
            VerificationOutcome::Authorized(claims) => {
                tracing::debug!(sub = ?claims.sub(), "access token accepted");
            }
            VerificationOutcome::Unauthorized(reason) => {
                tracing::warn!(?reason, "access token verification failed");
            }
            VerificationOutcome::Fault(err) => {
                tracing::error!(error = %err, "access token could not be verified");
            }
        }
        outcome
    }

    /// fetch -> convert -> verify for a raw token string.
    ///
    /// A kid-less token whose signature fails is retried once if the key source could
    /// drop stale keys; tokens with a `kid` already refresh on a kid miss.
    pub async fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let kid = peek_kid(token);
        let result = self.verify_with_current_keys(token, kid.as_deref()).await;

        let bad_signature = matches!(
            &result,
            Err(AuthError::Jwt(err)) if err.kind == JwtErrorKind::InvalidSignature
        );
        if bad_signature && kid.is_none() && self.keys.invalidate_after_rejection().await {
            tracing::debug!("retrying signature check against refreshed jwks");
            return self.verify_with_current_keys(token, None).await;
        }
        result
    }

    async fn verify_with_current_keys(
        &self,
        token: &str,
        kid: Option<&str>,
    ) -> Result<TokenClaims, AuthError> {
        let record = self.keys.fetch(kid).await?;
        let key = convert(&record)?;
        let claims = verify(token, &key, &self.options)?;
        Ok(claims)
    }
}

/// The token after `"Bearer "`, possibly empty.
///
/// `None` when the header is absent, not visible ASCII, or lacks the prefix.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
}
