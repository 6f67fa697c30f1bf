/*!
 * Authenticated principal extractor
 *
 * Responsibility:
 * - 認証ゲートウェイが extensions に入れた Principal を handler に渡す
 * - Principal の型は services::auth::strategy 側で定義する
 */

mod core;

pub use core::AuthPrincipal;
