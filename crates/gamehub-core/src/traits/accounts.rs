//! Accounts collaborator used to resolve callers into user records.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::user::UserRecord;

/// Lookup of user accounts owned by the surrounding game backend.
///
/// The extensibility runtime never writes users; it only resolves the
/// identifier attached to a call so extension code can act on behalf of
/// the invoking user.
#[async_trait]
pub trait AccountsService: Send + Sync + 'static {
    /// Find a user by numeric identifier. Returns `None` if no such user exists.
    async fn find_user(&self, user_id: i64) -> AppResult<Option<UserRecord>>;
}
