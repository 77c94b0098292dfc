//! Error taxonomy of the verification pipeline.
//!
//! Two families:
//! - credential faults (`AuthError::Jwt`): the token itself is bad. The gate turns these into 401.
//! - infrastructure faults (`Fetch`, `NoKey`, `MalformedKey`): the verifier cannot do its job.
//!   These are never turned into 401; they propagate to the host.
use std::fmt;

use thiserror::Error;

/// Which check rejected the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtErrorKind {
    MalformedToken,
    InvalidSignature,
    AlgorithmMismatch,
    ExpiredToken,
    IssuerMismatch,
    AudienceMismatch,
}

impl JwtErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::AlgorithmMismatch => "algorithm_mismatch",
            Self::ExpiredToken => "expired_token",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::AudienceMismatch => "audience_mismatch",
        }
    }
}

impl fmt::Display for JwtErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token rejected by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("jwt rejected: {kind}")]
pub struct JwtError {
    pub kind: JwtErrorKind,
}

impl JwtError {
    pub fn new(kind: JwtErrorKind) -> Self {
        Self { kind }
    }
}

impl From<JwtErrorKind> for JwtError {
    fn from(kind: JwtErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Errors raised anywhere in fetch -> convert -> verify.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to fetch key set: {0}")]
    Fetch(String),
    #[error("key set contains no keys")]
    NoKey,
    #[error("malformed public key: {0}")]
    MalformedKey(String),
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl AuthError {
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    pub fn malformed_key(message: impl Into<String>) -> Self {
        Self::MalformedKey(message.into())
    }

    /// Credential faults are safe to surface as 401; everything else is operational.
    pub fn is_credential_fault(&self) -> bool {
        matches!(self, Self::Jwt(_))
    }
}

impl From<JwtErrorKind> for AuthError {
    fn from(kind: JwtErrorKind) -> Self {
        Self::Jwt(JwtError::new(kind))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        let kind = match e.kind() {
            // The backend refused the key itself; no token could verify against it.
            ErrorKind::InvalidKeyFormat | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) => {
                return Self::malformed_key(e.to_string());
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => JwtErrorKind::MalformedToken,
            // The key family cannot back the configured algorithm (e.g. RSA key + ES256).
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => JwtErrorKind::AlgorithmMismatch,
            ErrorKind::ExpiredSignature => JwtErrorKind::ExpiredToken,
            ErrorKind::InvalidIssuer => JwtErrorKind::IssuerMismatch,
            ErrorKind::InvalidAudience => JwtErrorKind::AudienceMismatch,
            _ => JwtErrorKind::InvalidSignature,
        };

        kind.into()
    }
}
