//! Token Verifier: signature + claims validation.
//!
//! Check order (first failure wins):
//! 1. three segments, decodable header            -> MalformedToken
//! 2. header `alg` == configured algorithm          -> AlgorithmMismatch
//! 3. signature over header.payload                 -> InvalidSignature
//! 4. payload is a JSON object                      -> MalformedToken
//! 5. `iss` == configured issuer                    -> IssuerMismatch
//! 6. `aud` == configured audience (or contains it) -> AudienceMismatch
//! 7. `exp` > now                                   -> ExpiredToken
//!
//! Claims are only inspected after the signature has been verified.
//!
//! Failures are `AuthError::Jwt`, except a key the signature backend refuses to use,
//! which is `AuthError::MalformedKey`.
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Validation;
use serde_json::{Map, Value};

use crate::services::auth::claims::TokenClaims;
use crate::services::auth::convert::VerificationKey;
use crate::services::auth::error::{AuthError, JwtError, JwtErrorKind};
use crate::services::auth::options::AuthorizationOptions;

/// Verify `token` against `key` using the current time.
pub fn verify(
    token: &str,
    key: &VerificationKey,
    options: &AuthorizationOptions,
) -> Result<TokenClaims, AuthError> {
    verify_at(token, key, options, chrono::Utc::now().timestamp())
}

/// Verify `token` as of `now` (Unix seconds).
pub fn verify_at(
    token: &str,
    key: &VerificationKey,
    options: &AuthorizationOptions,
    now: i64,
) -> Result<TokenClaims, AuthError> {
    let header = decode_header(token)?;

    // Exact, case-sensitive. "none" never parses into an Algorithm, so it can never match.
    let alg = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or(JwtErrorKind::AlgorithmMismatch)?;
    if alg != options.algorithm {
        return Err(JwtErrorKind::AlgorithmMismatch.into());
    }
    let algorithm = options
        .signature_algorithm()
        .ok_or(JwtErrorKind::AlgorithmMismatch)?;

    // jsonwebtoken only checks the signature here; claims are validated below
    // so that the exact rules (exclusive expiry, no leeway) apply.
    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.leeway = 0;

    let data = jsonwebtoken::decode::<Value>(token, key.decoding_key(), &validation)?;

    let Value::Object(claims) = data.claims else {
        return Err(JwtErrorKind::MalformedToken.into());
    };

    check_issuer(&claims, &options.issuer)?;
    check_audience(&claims, &options.audience)?;
    check_expiry(&claims, now)?;

    Ok(TokenClaims::from(claims))
}

/// Read `kid` from the token header without verifying anything.
///
/// Used only to pick a key; a token whose header cannot be read yields `None`
/// and is rejected later by `verify`.
pub fn peek_kid(token: &str) -> Option<String> {
    decode_header(token)
        .ok()?
        .get("kid")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn decode_header(token: &str) -> Result<Map<String, Value>, JwtError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(JwtErrorKind::MalformedToken.into());
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| JwtErrorKind::MalformedToken)?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(JwtErrorKind::MalformedToken.into()),
    }
}

fn check_issuer(claims: &Map<String, Value>, issuer: &str) -> Result<(), JwtError> {
    match claims.get("iss").and_then(Value::as_str) {
        Some(iss) if iss == issuer => Ok(()),
        _ => Err(JwtErrorKind::IssuerMismatch.into()),
    }
}

fn check_audience(claims: &Map<String, Value>, audience: &str) -> Result<(), JwtError> {
    let matches = match claims.get("aud") {
        Some(Value::String(aud)) => aud == audience,
        Some(Value::Array(auds)) => auds.iter().any(|aud| aud.as_str() == Some(audience)),
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(JwtErrorKind::AudienceMismatch.into())
    }
}

// Exclusive: a token expiring at `now` is already expired.
fn check_expiry(claims: &Map<String, Value>, now: i64) -> Result<(), JwtError> {
    match claims.get("exp").and_then(Value::as_f64) {
        Some(exp) if exp > now as f64 => Ok(()),
        _ => Err(JwtErrorKind::ExpiredToken.into()),
    }
}
