use std::str::FromStr;

use jsonwebtoken::Algorithm;

/// What a token must look like to be accepted.
///
/// `algorithm` is deliberately kept as the configured string. An unrecognized name is not
/// rejected here; it simply never matches, so every token fails with `AlgorithmMismatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationOptions {
    pub issuer: String,
    pub audience: String,
    pub algorithm: String,
}

impl AuthorizationOptions {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        algorithm: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm: algorithm.into(),
        }
    }

    /// The configured algorithm, if jsonwebtoken knows it.
    pub fn signature_algorithm(&self) -> Option<Algorithm> {
        Algorithm::from_str(&self.algorithm).ok()
    }
}
