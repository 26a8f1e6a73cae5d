/// Configuration management for the credential subsystem
use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub storage: StorageConfig,
    pub tables: TableConfig,
    pub expiration: ExpirationConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database_file: PathBuf,
    /// Size of the pooled read handle; writes always go through a single
    /// serialized connection.
    pub max_read_connections: u32,
    pub enable_wal: bool,
}

/// Table naming. Changing these after first boot is unsupported; the
/// tables are created under these names and never renamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub users: String,
    pub sessions: String,
    pub access_tokens: String,
    pub datastore: String,
    pub id_field: String,
}

/// Expiration durations, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirationConfig {
    /// Account expiry stamped on every inserted user
    pub user: i64,
    pub long_session: i64,
    pub short_session: i64,
    pub long_token: i64,
    pub short_token: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_directory = PathBuf::from("./data");
        Self {
            database_file: data_directory.join("warden.db"),
            data_directory,
            max_read_connections: 10,
            enable_wal: true,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            users: "__users".to_string(),
            sessions: "__sessions".to_string(),
            access_tokens: "__access_tokens".to_string(),
            datastore: "__datastore".to_string(),
            id_field: "id".to_string(),
        }
    }
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            user: 60 * 60 * 24 * 365 * 10, // ~10 years
            long_session: 60 * 60 * 24 * 30,
            short_session: 60 * 60 * 2,
            long_token: 60 * 60 * 24 * 7,
            short_token: 60 * 60 * 6,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            tables: TableConfig::default(),
            expiration: ExpirationConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> AuthResult<Self> {
        let data_directory: PathBuf = env::var("WARDEN_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database_file = env::var("WARDEN_DATABASE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("warden.db"));
        let max_read_connections = env::var("WARDEN_MAX_READ_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| AuthError::Config("Invalid read connection count".to_string()))?;
        let enable_wal = env::var("WARDEN_ENABLE_WAL")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let expiration = ExpirationConfig {
            user: parse_secs("WARDEN_USER_EXPIRATION", ExpirationConfig::default().user)?,
            long_session: parse_secs(
                "WARDEN_LONG_SESSION_EXPIRATION",
                ExpirationConfig::default().long_session,
            )?,
            short_session: parse_secs(
                "WARDEN_SHORT_SESSION_EXPIRATION",
                ExpirationConfig::default().short_session,
            )?,
            long_token: parse_secs(
                "WARDEN_LONG_TOKEN_EXPIRATION",
                ExpirationConfig::default().long_token,
            )?,
            short_token: parse_secs(
                "WARDEN_SHORT_TOKEN_EXPIRATION",
                ExpirationConfig::default().short_token,
            )?,
        };

        Ok(Self {
            storage: StorageConfig {
                data_directory,
                database_file,
                max_read_connections,
                enable_wal,
            },
            tables: TableConfig::default(),
            expiration,
        })
    }
}

fn parse_secs(var: &str, default: i64) -> AuthResult<i64> {
    match env::var(var) {
        Ok(v) => v
            .parse()
            .map_err(|_| AuthError::Config(format!("Invalid duration in {}", var))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.tables.users, "__users");
        assert_eq!(config.tables.id_field, "id");
        assert_eq!(config.expiration.short_session, 7200);
        assert_eq!(config.expiration.long_session, 2_592_000);
        assert!(config.storage.enable_wal);
    }
}
