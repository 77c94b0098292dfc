/*
 * Responsibility
 * - ドメイン寄りの処理 (HTTP に依存しない)
 * - auth: JWKS 取得 → 鍵変換 → JWT 検証 → 分類
 */
pub mod auth;
