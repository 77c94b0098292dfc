/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: Bearer トークン検証 (access)
 * - http: request-id / body limit / timeout / trace
 */
pub mod auth;
pub mod http;
