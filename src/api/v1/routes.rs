/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health は公開、/me は Bearer 必須 (route_layer で access middleware を適用)
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, me::me};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new().route("/me", get(me));
    let protected = middleware::auth::access::apply(protected, state.authorizer.clone());

    Router::new()
        .route("/health", get(health))
        .merge(protected)
}
