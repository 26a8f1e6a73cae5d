/// Login session management
///
/// Sessions bind a high-entropy opaque secret to a user row, with lazy
/// expiry enforcement and HMAC-based CSRF tokens derived from (but never
/// stored alongside) the session.

mod manager;

pub use manager::SessionManager;

use crate::datetime::DateTime;
use crate::error::AuthResult;
use crate::record::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Login session record
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub record: Record,
    /// The opaque session secret handed to the client
    pub secret: String,
    /// Opaque serialized JSON payload; use [`Session::set_data`] and
    /// [`Session::data_as`] at the boundary
    pub data: Option<String>,
    pub user_id: i64,
    /// Informational only; not part of any validity check
    pub ip: String,
    /// Informational only; not part of any validity check
    pub agent: String,
    /// Zero value means the session never expires
    pub expires: DateTime,
}

impl Session {
    pub fn set_data<T: Serialize>(&mut self, value: &T) -> AuthResult<()> {
        self.data = Some(serde_json::to_string(value)?);
        Ok(())
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> AuthResult<Option<T>> {
        match &self.data {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}
