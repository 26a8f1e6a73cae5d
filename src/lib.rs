//! Warden - authentication and credential lifecycle
//!
//! Persistent user credentials, login sessions, path-scoped capability
//! tokens and CSRF binding over SQLite, backed by a restart-safe
//! permutation-based identifier generator. The crate exposes the managers
//! and a bootstrap context; HTTP routing, templating and process wiring
//! live outside.

pub mod config;
pub mod context;
pub mod datastore;
pub mod datetime;
pub mod db;
pub mod error;
pub mod lcg;
pub mod record;
pub mod security;
pub mod sessions;
pub mod tokens;
pub mod users;

pub use config::AuthConfig;
pub use context::AuthContext;
pub use error::{AuthError, AuthResult};
