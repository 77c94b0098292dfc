//! Shared fixtures: a mocked issuer serving a JWKS document, and token signing helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, header};
use bearer_gate::services::auth::{AuthorizationOptions, Authorizer, HttpKeyFetcher};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ISSUER: &str = "http://issuer.com";
pub const AUDIENCE: &str = "audience";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

const RSA_PRIVATE_PEM: &str = include_str!("../fixtures/rsa_private.pem");
const OTHER_RSA_PRIVATE_PEM: &str = include_str!("../fixtures/other_rsa_private.pem");
const RSA_PUBLIC_JWK: &str = include_str!("../fixtures/rsa_public.jwk.json");
const OTHER_RSA_PUBLIC_JWK: &str = include_str!("../fixtures/other_rsa_public.jwk.json");

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn options() -> AuthorizationOptions {
    AuthorizationOptions::new(ISSUER, AUDIENCE, "RS256")
}

/// `{sub:"foo", iss, aud, exp: now+10}`
pub fn claims() -> Value {
    json!({
        "sub": "foo",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "exp": now() + 10
    })
}

pub fn rsa_public_jwk() -> Value {
    serde_json::from_str(RSA_PUBLIC_JWK).expect("fixture jwk")
}

/// Public half of the key behind `sign_with_foreign_key`.
pub fn other_rsa_public_jwk() -> Value {
    serde_json::from_str(OTHER_RSA_PUBLIC_JWK).expect("fixture jwk")
}

pub fn sign(claims: &Value) -> String {
    sign_rs256(RSA_PRIVATE_PEM, claims, None)
}

pub fn sign_with_kid(claims: &Value, kid: &str) -> String {
    sign_rs256(RSA_PRIVATE_PEM, claims, Some(kid))
}

/// Signed by a key the issuer never published.
pub fn sign_with_foreign_key(claims: &Value) -> String {
    sign_rs256(OTHER_RSA_PRIVATE_PEM, claims, None)
}

fn sign_rs256(pem: &str, claims: &Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(String::from);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture pem");
    jsonwebtoken::encode(&header, claims, &key).expect("sign token")
}

pub fn request(authorization: Option<&str>) -> Request<Body> {
    request_to("/", authorization)
}

pub fn request_to(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).expect("request")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Mock issuer publishing a JWKS document.
pub struct TestIssuer {
    pub server: MockServer,
}

impl TestIssuer {
    /// Issuer publishing `{ "keys": [<fixture RSA key>] }`.
    pub async fn start() -> Self {
        Self::serving(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [rsa_public_jwk()]
        })))
        .await
    }

    pub async fn serving(response: ResponseTemplate) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&server)
            .await;
        Self { server }
    }

    pub async fn serve(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    pub async fn jwks_hits(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    pub fn authorizer(&self) -> Arc<Authorizer> {
        self.authorizer_with(options())
    }

    pub fn authorizer_with(&self, options: AuthorizationOptions) -> Arc<Authorizer> {
        Arc::new(Authorizer::new(
            options,
            Arc::new(HttpKeyFetcher::new(self.jwks_url())),
        ))
    }
}
