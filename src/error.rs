/// Unified error types for the credential subsystem
use thiserror::Error;

/// Main error type covering the full credential-lifecycle taxonomy.
///
/// Storage errors that map to a named condition are wrapped into the
/// matching variant; everything else propagates as [`AuthError::Database`].
#[derive(Error, Debug)]
pub enum AuthError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No matching row
    #[error("Not found")]
    NotFound,

    /// Row existed but was past its expiry; deleted as a side effect
    #[error("Expired")]
    Expired,

    /// Access token uses exhausted; row deleted
    #[error("Access token already used up")]
    Reused,

    /// Access token path scope mismatch; row deleted
    #[error("Access token not valid for this path")]
    InvalidPath,

    /// Credential mismatch
    #[error("Wrong password")]
    WrongPassword,

    /// Attempted mutation of the immutable external ID
    #[error("External ID is not allowed to be changed")]
    ExternalIdChanged,

    /// Unsafe token insertion without a creator
    #[error("Access token has no valid creator")]
    UserInvalid,

    /// Unsafe token insertion with a blank path
    #[error("Access token has no valid path")]
    PathInvalid,

    /// Password exceeds the hash primitive's byte ceiling
    #[error("Password exceeds {max} bytes")]
    PasswordTooLong { max: usize },

    /// Password hashing failed
    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    /// Secure random source exhausted after bounded retries
    #[error("No randomness available")]
    RandomnessUnavailable,

    /// Opaque data payload (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for credential operations
pub type AuthResult<T> = Result<T, AuthError>;
