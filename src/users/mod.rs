/// User credential store
///
/// Persists user identity and password hashes; the source of the numeric
/// user IDs every session and access token refers back to.

mod manager;

pub use manager::UserManager;

use crate::datetime::DateTime;
use crate::record::Record;

/// Role tier at or above which a user counts as administrator.
pub const ADMIN_ROLE: i64 = 3;

/// User identity record
#[derive(Debug, Clone, Default)]
pub struct User {
    pub record: Record,
    /// Opaque fixed-length identifier, safe to expose externally. Assigned
    /// at insert and immutable afterwards.
    pub external_id: String,
    pub name: String,
    pub email: String,
    /// bcrypt hash; never the plaintext
    pub password_hash: String,
    pub role: i64,
    pub active: bool,
    pub verified: bool,
    pub expires: DateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role >= ADMIN_ROLE
    }
}
