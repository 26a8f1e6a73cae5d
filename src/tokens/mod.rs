/// Capability token management
///
/// Access tokens are single-purpose bearer secrets: scoped to exactly one
/// path, good for a finite number of uses, and independent of any login
/// session.

mod manager;

pub use manager::AccessTokenManager;

use crate::datetime::DateTime;
use crate::error::AuthResult;
use crate::record::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Capability token record
#[derive(Debug, Clone, Default)]
pub struct AccessToken {
    pub record: Record,
    /// The opaque bearer secret
    pub secret: String,
    /// Opaque serialized JSON payload
    pub data: Option<String>,
    /// The single path this token is valid for
    pub path: String,
    /// User that minted the token
    pub creator_id: i64,
    /// Remaining uses; decremented on every successful validation
    pub uses: i64,
    /// Zero value means the token never expires
    pub expires: DateTime,
}

impl AccessToken {
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
