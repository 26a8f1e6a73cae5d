/// User manager implementation using runtime queries
use crate::{
    db::Db,
    datetime::DateTime,
    error::{AuthError, AuthResult},
    lcg::Lcg,
    record::Record,
    users::User,
};
use chrono::Duration;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Mutex;
use uuid::Uuid;

/// bcrypt ignores everything past this many bytes; longer passwords are
/// rejected outright instead of silently truncated.
const MAX_PASSWORD_BYTES: usize = 72;

const BCRYPT_COST: u32 = 12;

/// Credential store for user records.
pub struct UserManager {
    db: Db,
    table: String,
    id_field: String,
    expiration_secs: i64,
    lcg: Mutex<Lcg>,
}

impl UserManager {
    /// Create the manager, its backing table and indexes, and advance the
    /// identifier generator past all rows inserted by previous process
    /// lifetimes.
    pub async fn new(
        db: Db,
        table: &str,
        id_field: &str,
        expiration_secs: i64,
        seed: u64,
    ) -> AuthResult<Self> {
        if table.is_empty() {
            return Err(AuthError::Config("users table name is empty".to_string()));
        }
        if id_field.is_empty() {
            return Err(AuthError::Config("id field name is empty".to_string()));
        }
        if seed == 0 {
            return Err(AuthError::Config("user id seed is unset".to_string()));
        }

        let manager = Self {
            db,
            table: table.to_string(),
            id_field: id_field.to_string(),
            expiration_secs,
            lcg: Mutex::new(Lcg::new(seed)),
        };

        manager.create_table().await?;

        let existing = manager.count().await?;
        if existing > 0 {
            manager.lcg.lock().unwrap().skip(existing);
            tracing::debug!(rows = existing, "advanced user id generator past existing rows");
        }

        Ok(manager)
    }

    async fn create_table(&self) -> AuthResult<()> {
        let tn = Db::quote_table(&self.table);

        let q = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY NOT NULL, \
             external_id TEXT NOT NULL, \
             email TEXT NOT NULL, \
             name TEXT NOT NULL, \
             password TEXT NOT NULL, \
             role INTEGER DEFAULT 0, \
             active BOOLEAN DEFAULT TRUE, \
             verified BOOLEAN DEFAULT FALSE, \
             created INTEGER DEFAULT 0, \
             modified INTEGER DEFAULT 0, \
             expires INTEGER DEFAULT 0)",
            tn, self.id_field,
        );

        sqlx::query(&q).execute(self.db.write()).await?;

        self.db.create_unique_index(&self.table, "email").await?;
        self.db
            .create_unique_index(&self.table, "external_id")
            .await?;

        Ok(())
    }

    /// Insert a new user, hashing the plaintext password and allocating
    /// the numeric and external IDs. Email uniqueness violations propagate
    /// from storage.
    pub async fn insert(&self, mut user: User, password: &str) -> AuthResult<User> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::PasswordTooLong {
                max: MAX_PASSWORD_BYTES,
            });
        }

        user.password_hash = bcrypt::hash(password, BCRYPT_COST)?;
        user.record = Record::new();
        user.record.id = self.lcg.lock().unwrap().next() as i64;
        user.external_id = Uuid::new_v4().simple().to_string();
        user.expires = user
            .record
            .created
            .add(Duration::seconds(self.expiration_secs));

        let tn = Db::quote_table(&self.table);
        let q = format!(
            "INSERT INTO {} ({}, external_id, email, name, password, role, active, verified, created, modified, expires) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            tn, self.id_field,
        );

        sqlx::query(&q)
            .bind(user.record.id)
            .bind(&user.external_id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(user.active)
            .bind(user.verified)
            .bind(user.record.created.unix_micros())
            .bind(user.record.modified.unix_micros())
            .bind(user.expires.unix_micros())
            .execute(self.db.write())
            .await?;

        Ok(user)
    }

    pub async fn select_by_id(&self, id: i64) -> AuthResult<User> {
        let q = format!(
            "SELECT * FROM {} WHERE {} = ?1 LIMIT 1",
            Db::quote_table(&self.table),
            self.id_field,
        );

        let row = sqlx::query(&q)
            .bind(id)
            .fetch_optional(self.db.read())
            .await?
            .ok_or(AuthError::NotFound)?;

        Ok(self.map_user(&row))
    }

    pub async fn select_by_email(&self, email: &str) -> AuthResult<User> {
        let q = format!(
            "SELECT * FROM {} WHERE email = ?1 LIMIT 1",
            Db::quote_table(&self.table),
        );

        let row = sqlx::query(&q)
            .bind(email)
            .fetch_optional(self.db.read())
            .await?
            .ok_or(AuthError::NotFound)?;

        Ok(self.map_user(&row))
    }

    pub async fn select_by_external_id(&self, external_id: &str) -> AuthResult<User> {
        let q = format!(
            "SELECT * FROM {} WHERE external_id = ?1 LIMIT 1",
            Db::quote_table(&self.table),
        );

        let row = sqlx::query(&q)
            .bind(external_id)
            .fetch_optional(self.db.read())
            .await?
            .ok_or(AuthError::NotFound)?;

        Ok(self.map_user(&row))
    }

    /// Constant-time password comparison against the stored bcrypt hash.
    pub fn check_password(&self, user: &User, password: &str) -> AuthResult<()> {
        if bcrypt::verify(password, &user.password_hash)? {
            Ok(())
        } else {
            Err(AuthError::WrongPassword)
        }
    }

    /// Look up by email and verify the password in one step. Fails with
    /// `NotFound` and `WrongPassword` distinctly so callers can log the
    /// difference; the end-user-visible message must not differentiate.
    pub async fn check_get_user(&self, email: &str, password: &str) -> AuthResult<User> {
        let user = self.select_by_email(email).await?;
        self.check_password(&user, password)?;
        Ok(user)
    }

    /// Persist all fields, re-stamping the modification time. A blank
    /// external ID is rejected to guard against accidental erasure of the
    /// immutable identifier.
    pub async fn update(&self, mut user: User) -> AuthResult<User> {
        if user.external_id.is_empty() {
            return Err(AuthError::ExternalIdChanged);
        }

        user.record.modified = DateTime::now();

        let tn = Db::quote_table(&self.table);
        let q = format!(
            "UPDATE {} SET external_id = ?1, email = ?2, name = ?3, password = ?4, \
             role = ?5, active = ?6, verified = ?7, modified = ?8, expires = ?9 \
             WHERE {} = ?10",
            tn, self.id_field,
        );

        sqlx::query(&q)
            .bind(&user.external_id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(user.active)
            .bind(user.verified)
            .bind(user.record.modified.unix_micros())
            .bind(user.expires.unix_micros())
            .bind(user.record.id)
            .execute(self.db.write())
            .await?;

        Ok(user)
    }

    pub async fn delete(&self, id: i64) -> AuthResult<()> {
        let q = format!(
            "DELETE FROM {} WHERE {} = ?1",
            Db::quote_table(&self.table),
            self.id_field,
        );

        sqlx::query(&q).bind(id).execute(self.db.write()).await?;
        Ok(())
    }

    /// True iff at least one row carries an administrator role.
    pub async fn has_admins(&self) -> AuthResult<bool> {
        let q = format!(
            "SELECT {} FROM {} WHERE role >= ?1 LIMIT 1",
            self.id_field,
            Db::quote_table(&self.table),
        );

        let row = sqlx::query(&q)
            .bind(crate::users::ADMIN_ROLE)
            .fetch_optional(self.db.read())
            .await?;

        Ok(row.is_some())
    }

    pub async fn count(&self) -> AuthResult<i64> {
        let q = format!(
            "SELECT COUNT(*) AS count FROM {}",
            Db::quote_table(&self.table),
        );

        let row = sqlx::query(&q).fetch_one(self.db.read()).await?;
        Ok(row.get("count"))
    }

    fn map_user(&self, row: &SqliteRow) -> User {
        User {
            record: Record {
                id: row.get(self.id_field.as_str()),
                created: DateTime::from_unix_micros(row.get("created")),
                modified: DateTime::from_unix_micros(row.get("modified")),
            },
            external_id: row.get("external_id"),
            email: row.get("email"),
            name: row.get("name"),
            password_hash: row.get("password"),
            role: row.get("role"),
            active: row.get("active"),
            verified: row.get("verified"),
            expires: DateTime::from_unix_micros(row.get("expires")),
        }
    }
}
