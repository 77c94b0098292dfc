use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Verified token payload.
///
/// Always a JSON object. Every claim the issuer put in the token is kept as-is,
/// not just the ones the verifier checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    pub fn sub(&self) -> Option<&str> {
        self.get_str("sub")
    }

    pub fn iss(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// `aud` may be a string or an array of strings.
    pub fn aud(&self) -> Option<&Value> {
        self.0.get("aud")
    }

    pub fn exp(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for TokenClaims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
