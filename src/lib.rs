//! Bearer-token authorization gate for axum services.
//!
//! A request is let through only if its `Authorization: Bearer <jwt>` verifies against the
//! issuer's published JWKS (signature, algorithm, `iss`, `aud`, `exp`). Rejections are a
//! uniform 401; failures of the verification machinery itself propagate as service errors.
//!
//! ```ignore
//! let fetcher = HttpKeyFetcher::new("https://issuer.example/.well-known/jwks.json");
//! let authorizer = Arc::new(Authorizer::new(
//!     AuthorizationOptions::new("https://issuer.example", "my-api", "RS256"),
//!     Arc::new(CachedKeySource::new(fetcher)),
//! ));
//! let router = middleware::auth::apply(router, authorizer);
//! ```
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
