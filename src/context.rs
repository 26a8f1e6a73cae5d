/// Bootstrap context wiring the managers together
use crate::{
    config::AuthConfig,
    datastore::{DataStoreManager, Settings, SETTINGS_KEY},
    db::Db,
    error::{AuthError, AuthResult},
    sessions::SessionManager,
    tokens::AccessTokenManager,
    users::UserManager,
};
use std::sync::Arc;

/// Composition root of the subsystem: opens the database, loads or mints
/// the persisted settings (and with them the identifier-generator seeds),
/// and constructs the managers in dependency order. Everything above this
/// — routing, templates, process wiring — lives outside the crate.
#[derive(Clone)]
pub struct AuthContext {
    config: Arc<AuthConfig>,
    db: Db,
    settings: Arc<Settings>,
    datastore: Arc<DataStoreManager>,
    users: Arc<UserManager>,
    sessions: Arc<SessionManager>,
    tokens: Arc<AccessTokenManager>,
}

impl AuthContext {
    pub async fn bootstrap(config: AuthConfig) -> AuthResult<Self> {
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;

        let db = Db::open(&config.storage).await?;

        let datastore =
            DataStoreManager::new(db.clone(), &config.tables.datastore, &config.tables.id_field)
                .await?;

        let settings = Self::load_or_create_settings(&datastore).await?;

        let users = UserManager::new(
            db.clone(),
            &config.tables.users,
            &config.tables.id_field,
            config.expiration.user,
            settings.user_seed,
        )
        .await?;

        let tokens = AccessTokenManager::new(
            db.clone(),
            &config.tables.access_tokens,
            &config.tables.users,
            &config.tables.id_field,
            config.expiration.long_token,
            config.expiration.short_token,
        )
        .await?;

        let sessions = SessionManager::new(
            db.clone(),
            &config.tables.sessions,
            &config.tables.users,
            &config.tables.id_field,
            config.expiration.long_session,
            config.expiration.short_session,
            settings.session_seed,
        )
        .await?;

        tracing::info!(
            database = %config.storage.database_file.display(),
            "credential subsystem bootstrapped"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            settings: Arc::new(settings),
            datastore: Arc::new(datastore),
            users: Arc::new(users),
            sessions: Arc::new(sessions),
            tokens: Arc::new(tokens),
        })
    }

    /// Load the persisted settings, minting and persisting defaults on
    /// first boot. Seeds missing from an existing record (older installs)
    /// are filled in and written back once.
    async fn load_or_create_settings(datastore: &DataStoreManager) -> AuthResult<Settings> {
        match datastore.select_by_key(SETTINGS_KEY).await {
            Ok(entry) => {
                let mut settings: Settings = entry.data_as()?;
                if settings.user_seed == 0 || settings.session_seed == 0 {
                    if settings.user_seed == 0 {
                        settings.user_seed = crate::security::random_u64_not_prime();
                    }
                    if settings.session_seed == 0 {
                        settings.session_seed = crate::security::random_u64_not_prime();
                    }
                    datastore.update(entry.record.id, &settings).await?;
                    tracing::info!("minted missing identifier seeds");
                }
                Ok(settings)
            }
            Err(AuthError::NotFound) => {
                let settings = Settings::default();
                datastore.insert(SETTINGS_KEY, &settings).await?;
                tracing::info!("first boot, persisted fresh settings");
                Ok(settings)
            }
            Err(e) => Err(e),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn datastore(&self) -> &DataStoreManager {
        &self.datastore
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tokens(&self) -> &AccessTokenManager {
        &self.tokens
    }

    pub async fn shutdown(&self) {
        self.db.close().await;
    }
}
