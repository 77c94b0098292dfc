//! Authorization layer tests.
//!
//! Drive `AuthorizeLayer` directly with a counting inner service so that "next was called",
//! "a response was sent" and "an error propagated" can each be observed.

mod common;

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bearer_gate::middleware::auth::AuthorizeLayer;
use bearer_gate::services::auth::{AuthError, AuthorizationOptions, Authorizer, TokenClaims};
use serde_json::json;
use tower::{BoxError, Layer, ServiceExt};
use wiremock::ResponseTemplate;

use common::{AUDIENCE, ISSUER, TestIssuer, bearer, claims, now, request, sign};

/// What the protected handler observed.
#[derive(Clone, Default)]
struct Next {
    calls: Arc<AtomicUsize>,
    claims: Arc<Mutex<Option<TokenClaims>>>,
}

impl Next {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn claims(&self) -> Option<TokenClaims> {
        self.claims.lock().unwrap().clone()
    }
}

async fn run(authorizer: Arc<Authorizer>, req: Request<Body>) -> (Result<Response, BoxError>, Next) {
    let next = Next::default();
    let observed = next.clone();

    let inner = tower::service_fn(move |req: Request<Body>| {
        let observed = observed.clone();
        async move {
            observed.calls.fetch_add(1, Ordering::SeqCst);
            *observed.claims.lock().unwrap() = req.extensions().get::<TokenClaims>().cloned();
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        }
    });

    let result = AuthorizeLayer::new(authorizer).layer(inner).oneshot(req).await;
    (result, next)
}

async fn assert_rejected(result: Result<Response, BoxError>, next: &Next) {
    let response = result.expect("rejection is a response, not an error");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty(), "401 must not carry details");
    assert_eq!(next.calls(), 0);
}

fn fault(result: Result<Response, BoxError>) -> AuthError {
    let err = result.expect_err("fault must propagate as an error");
    match err.downcast::<AuthError>() {
        Ok(err) => *err,
        Err(other) => panic!("unexpected error type: {other}"),
    }
}

#[tokio::test]
async fn valid_token_attaches_claims_and_calls_next_once() {
    let issuer = TestIssuer::start().await;
    let input = json!({
        "sub": "foo",
        "iss": "http://issuer.com",
        "aud": "audience",
        "exp": now() + 10
    });
    let token = sign(&input);

    let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&token)))).await;

    let response = result.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(next.calls(), 1);
    assert_eq!(
        serde_json::to_value(next.claims().unwrap()).unwrap(),
        input
    );
    assert_eq!(issuer.jwks_hits().await, 1);
}

#[tokio::test]
async fn extra_claims_are_carried_through() {
    let issuer = TestIssuer::start().await;
    let mut input = claims();
    input["scope"] = json!("read write");
    input["aud"] = json!(["other", AUDIENCE]);

    let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&sign(&input))))).await;

    assert_eq!(result.unwrap().status(), StatusCode::OK);
    let attached = next.claims().unwrap();
    assert_eq!(attached.get("scope"), Some(&json!("read write")));
    assert_eq!(serde_json::to_value(attached).unwrap(), input);
}

#[tokio::test]
async fn missing_authorization_header_is_rejected_without_fetching_keys() {
    let issuer = TestIssuer::start().await;

    let (result, next) = run(issuer.authorizer(), request(None)).await;

    assert_rejected(result, &next).await;
    assert_eq!(issuer.jwks_hits().await, 0);
}

#[tokio::test]
async fn header_without_bearer_prefix_is_rejected() {
    let issuer = TestIssuer::start().await;
    let token = sign(&claims());

    for value in [
        String::new(),
        token.clone(),
        format!("bearer {token}"),
        format!("Basic {token}"),
        format!("Bearer{token}"),
    ] {
        let (result, next) = run(issuer.authorizer(), request(Some(&value))).await;
        assert_rejected(result, &next).await;
    }
    assert_eq!(issuer.jwks_hits().await, 0);
}

#[tokio::test]
async fn syntactically_invalid_token_is_rejected() {
    let issuer = TestIssuer::start().await;

    for token in ["invalidToken", "a.b", "a.b.c.d", ""] {
        let (result, next) = run(issuer.authorizer(), request(Some(&bearer(token)))).await;
        assert_rejected(result, &next).await;
    }
}

#[tokio::test]
async fn algorithm_mismatch_is_rejected() {
    let issuer = TestIssuer::start().await;
    let authorizer = issuer.authorizer_with(AuthorizationOptions::new(ISSUER, AUDIENCE, "RS384"));

    let (result, next) = run(authorizer, request(Some(&bearer(&sign(&claims()))))).await;

    assert_rejected(result, &next).await;
}

#[tokio::test]
async fn unrecognized_configured_algorithm_rejects_every_token() {
    let issuer = TestIssuer::start().await;
    let authorizer = issuer.authorizer_with(AuthorizationOptions::new(ISSUER, AUDIENCE, "RSA-256"));

    let (result, next) = run(authorizer, request(Some(&bearer(&sign(&claims()))))).await;

    assert_rejected(result, &next).await;
}

#[tokio::test]
async fn token_expiring_now_or_earlier_is_rejected() {
    let issuer = TestIssuer::start().await;

    for exp in [now(), now() - 60] {
        let mut payload = claims();
        payload["exp"] = json!(exp);

        let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&sign(&payload))))).await;
        assert_rejected(result, &next).await;
    }
}

#[tokio::test]
async fn wrong_issuer_or_audience_is_rejected() {
    let issuer = TestIssuer::start().await;

    let mut wrong_issuer = claims();
    wrong_issuer["iss"] = json!("http://evil.com");
    let mut wrong_audience = claims();
    wrong_audience["aud"] = json!("someone-else");

    for payload in [wrong_issuer, wrong_audience] {
        let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&sign(&payload))))).await;
        assert_rejected(result, &next).await;
    }
}

#[tokio::test]
async fn token_signed_by_unpublished_key_is_rejected() {
    let issuer = TestIssuer::start().await;
    let token = common::sign_with_foreign_key(&claims());

    let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&token)))).await;

    assert_rejected(result, &next).await;
}

#[tokio::test]
async fn invalid_public_key_record_propagates_fault() {
    let issuer = TestIssuer::serving(ResponseTemplate::new(200).set_body_json(json!({
        "keys": [{"property": "notAValidPublicKey"}]
    })))
    .await;

    let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&sign(&claims()))))).await;

    assert!(matches!(fault(result), AuthError::MalformedKey(_)));
    assert_eq!(next.calls(), 0);
}

#[tokio::test]
async fn degenerate_issuer_keys_propagate_faults() {
    let records = [
        json!({"kty": "RSA", "kid": "k", "n": "AQAB", "e": "AQAB"}),
        json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE",
            "y": "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE"
        }),
    ];

    for record in records {
        let issuer =
            TestIssuer::serving(ResponseTemplate::new(200).set_body_json(json!({"keys": [record]})))
                .await;
        let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&sign(&claims()))))).await;

        assert!(matches!(fault(result), AuthError::MalformedKey(_)));
        assert_eq!(next.calls(), 0);
    }
}

#[tokio::test]
async fn jwks_endpoint_failures_propagate_faults() {
    let cases = [
        ResponseTemplate::new(500),
        ResponseTemplate::new(404),
        ResponseTemplate::new(200).set_body_string("<html>not a key set</html>"),
        ResponseTemplate::new(200).set_body_json(json!({"not_keys": []})),
    ];

    for response in cases {
        let issuer = TestIssuer::serving(response).await;
        let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&sign(&claims()))))).await;

        assert!(matches!(fault(result), AuthError::Fetch(_)));
        assert_eq!(next.calls(), 0);
    }
}

#[tokio::test]
async fn empty_key_set_propagates_no_key_fault() {
    let issuer =
        TestIssuer::serving(ResponseTemplate::new(200).set_body_json(json!({"keys": []}))).await;

    let (result, next) = run(issuer.authorizer(), request(Some(&bearer(&sign(&claims()))))).await;

    assert!(matches!(fault(result), AuthError::NoKey));
    assert_eq!(next.calls(), 0);
}

#[tokio::test]
async fn unreachable_issuer_propagates_fault() {
    let authorizer = Arc::new(Authorizer::new(
        common::options(),
        Arc::new(bearer_gate::services::auth::HttpKeyFetcher::new(
            "http://127.0.0.1:1/.well-known/jwks.json",
        )),
    ));

    let (result, next) = run(authorizer, request(Some(&bearer(&sign(&claims()))))).await;

    assert!(matches!(fault(result), AuthError::Fetch(_)));
    assert_eq!(next.calls(), 0);
}

#[tokio::test]
async fn same_token_verified_twice_yields_identical_claims() {
    let issuer = TestIssuer::start().await;
    let authorizer = issuer.authorizer();
    let token = sign(&claims());

    let (first, first_next) = run(authorizer.clone(), request(Some(&bearer(&token)))).await;
    let (second, second_next) = run(authorizer, request(Some(&bearer(&token)))).await;

    assert_eq!(first.unwrap().status(), StatusCode::OK);
    assert_eq!(second.unwrap().status(), StatusCode::OK);
    assert_eq!(first_next.claims(), second_next.claims());
    // No cache configured: one fetch per verification.
    assert_eq!(issuer.jwks_hits().await, 2);
}
