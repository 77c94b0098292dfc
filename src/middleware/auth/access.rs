//! access token (JWT) 検証 → TokenClaims を extensions に入れる
//!
//! Per request exactly one of:
//! - claims attached, inner service called once
//! - 401 returned, inner service not called
//! - the `AuthError` returned as the service error, no response produced, inner service not called
//!
//! The last case is how a fault reaches the host: `apply` puts a `HandleErrorLayer` on top that
//! turns it into a 500.
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    Router,
    error_handling::HandleErrorLayer,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use tower::{BoxError, Layer, Service, ServiceBuilder};

use crate::error::AppError;
use crate::services::auth::{AuthError, Authorizer, VerificationOutcome};

/// `route_layer` で保護したいルートにだけ掛ける。
///
/// 例：
/// ```ignore
/// let v1 = api::v1::routes();
/// let v1 = middleware::auth::access::apply(v1, state.authorizer.clone());
/// ```
pub fn apply<S>(router: Router<S>, authorizer: Arc<Authorizer>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_fault))
            .layer(AuthorizeLayer::new(authorizer)),
    )
}

/// Host-side fault handling: an unverifiable request is an operational error, never a 401.
pub async fn handle_fault(err: BoxError) -> Response {
    if let Some(fault) = err.downcast_ref::<AuthError>() {
        tracing::error!(error = %fault, "authorization fault");
        return AppError::Internal.into_response();
    }
    if err.is::<tower::timeout::error::Elapsed>() {
        return StatusCode::REQUEST_TIMEOUT.into_response();
    }

    tracing::error!(error = %err, "unhandled service error");
    AppError::Internal.into_response()
}

#[derive(Debug, Clone)]
pub struct AuthorizeLayer {
    authorizer: Arc<Authorizer>,
}

impl AuthorizeLayer {
    pub fn new(authorizer: Arc<Authorizer>) -> Self {
        Self { authorizer }
    }
}

impl<S> Layer<S> for AuthorizeLayer {
    type Service = Authorize<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Authorize {
            inner,
            authorizer: self.authorizer.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Authorize<S> {
    inner: S,
    authorizer: Arc<Authorizer>,
}

impl<S, B> Service<Request<B>> for Authorize<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Keep the instance that was polled ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authorizer = self.authorizer.clone();

        Box::pin(async move {
            match authorizer.authorize(req.headers()).await {
                VerificationOutcome::Authorized(claims) => {
                    // middleware → extractor への受け渡し
                    req.extensions_mut().insert(claims);
                    inner.call(req).await.map_err(Into::into)
                }
                VerificationOutcome::Unauthorized(_) => Ok(AppError::Unauthorized.into_response()),
                VerificationOutcome::Fault(err) => Err(err.into()),
            }
        })
    }
}
