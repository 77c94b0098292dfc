/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - 認証済みリクエストのコンテキスト（TokenClaims）を handler に提供する
 * - 検証そのものは middleware::auth::access の責務
 *
 * Public API:
 * - CurrentUser
 */

mod core;

pub use core::CurrentUser;
