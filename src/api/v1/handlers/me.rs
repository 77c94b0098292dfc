/*
 * Responsibility
 * - GET /me: 検証済みトークンの claims をそのまま返す
 */
use axum::Json;

use crate::api::v1::extractors::CurrentUser;
use crate::services::auth::TokenClaims;

pub async fn me(CurrentUser(claims): CurrentUser) -> Json<TokenClaims> {
    tracing::debug!(sub = ?claims.sub(), "serving current user");
    Json(claims)
}
