/// Factory: build the `Authorizer` from application `Config`.
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::auth::{
    AuthorizationOptions, Authorizer, CachedKeySource, HttpKeyFetcher, KeySource,
};

pub fn build_authorizer(config: &Config) -> Arc<Authorizer> {
    let options = AuthorizationOptions::new(
        &config.auth_issuer,
        &config.auth_audience,
        &config.auth_algorithm,
    );

    let fetcher = HttpKeyFetcher::with_timeout(
        config.jwks_url.as_str(),
        Duration::from_secs(config.jwks_http_timeout_seconds),
    );

    // TTL 0 keeps the minimal behavior: one fetch per verification.
    let keys: Arc<dyn KeySource> = if config.jwks_cache_ttl_seconds == 0 {
        Arc::new(fetcher)
    } else {
        Arc::new(
            CachedKeySource::with_ttl(fetcher, Duration::from_secs(config.jwks_cache_ttl_seconds))
                .min_refresh_interval(Duration::from_secs(config.jwks_min_refresh_seconds)),
        )
    };

    tracing::info!(
        issuer = %options.issuer,
        audience = %options.audience,
        algorithm = %options.algorithm,
        jwks_url = %config.jwks_url,
        cache_ttl_seconds = config.jwks_cache_ttl_seconds,
        "authorizer configured"
    );

    Arc::new(Authorizer::new(options, keys))
}
