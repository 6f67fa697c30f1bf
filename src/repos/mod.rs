/*
 * Responsibility
 * - 永続化層の公開インターフェース
 * - ユーザーの参照 (lookup-by-email) のみを扱う
 */
pub mod error;
pub mod user_repo;

pub use error::RepoError;
pub use user_repo::{InMemoryUserDirectory, PgUserDirectory, UserDirectory, UserRecord};
