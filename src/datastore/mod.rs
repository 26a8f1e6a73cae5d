/// Key/value datastore for install-level state
///
/// A small JSON-per-key table; its main tenant is [`Settings`], which
/// carries the per-install identifier-generator seeds that keep ID
/// sequences stable across restarts.

mod manager;

pub use manager::DataStoreManager;

use crate::error::AuthResult;
use crate::record::Record;
use crate::security;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Datastore key the settings record is stored under.
pub const SETTINGS_KEY: &str = "sets";

/// A stored datastore row
#[derive(Debug, Clone)]
pub struct DataEntry {
    pub record: Record,
    pub key: String,
    /// Serialized JSON payload
    pub data: String,
}

impl DataEntry {
    pub fn data_as<T: DeserializeOwned>(&self) -> AuthResult<T> {
        Ok(serde_json::from_str(&self.data)?)
    }
}

/// Install-level settings, persisted once and reloaded on every boot.
///
/// The seeds are minted on first boot and must never change afterwards:
/// the identifier generators reproduce their sequences from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub edition: String,
    #[serde(default)]
    pub contact: String,

    #[serde(default)]
    pub user_seed: u64,
    #[serde(default)]
    pub session_seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            icon: String::new(),
            name: String::new(),
            desc: String::new(),
            url: "http://localhost:8080".to_string(),
            edition: String::new(),
            contact: String::new(),
            user_seed: security::random_u64_not_prime(),
            session_seed: security::random_u64_not_prime(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_have_seeds() {
        let s = Settings::default();
        assert_ne!(s.user_seed, 0);
        assert_ne!(s.session_seed, 0);
        assert_ne!(s.user_seed, s.session_seed);
    }

    #[test]
    fn test_settings_json_round_trip() {
        let s = Settings::default();
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.user_seed, s.user_seed);
        assert_eq!(back.session_seed, s.session_seed);
        assert_eq!(back.url, s.url);
    }
}
