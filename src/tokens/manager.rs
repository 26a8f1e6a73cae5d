/// Access token manager implementation using runtime queries
use crate::{
    db::Db,
    datetime::DateTime,
    error::{AuthError, AuthResult},
    record::Record,
    security,
    tokens::AccessToken,
};
use chrono::Duration;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Manages capability tokens: minting, scoped validation with use-count
/// decrement, and the lazy deletion that retires a token the moment any
/// validity check fails.
pub struct AccessTokenManager {
    db: Db,
    table: String,
    id_field: String,
    long_exp_secs: i64,
    short_exp_secs: i64,
}

impl AccessTokenManager {
    pub async fn new(
        db: Db,
        table: &str,
        user_table: &str,
        id_field: &str,
        long_exp_secs: i64,
        short_exp_secs: i64,
    ) -> AuthResult<Self> {
        if table.is_empty() {
            return Err(AuthError::Config(
                "access tokens table name is empty".to_string(),
            ));
        }
        if user_table.is_empty() || id_field.is_empty() {
            return Err(AuthError::Config(
                "user table or id field name is empty".to_string(),
            ));
        }

        let manager = Self {
            db,
            table: table.to_string(),
            id_field: id_field.to_string(),
            long_exp_secs,
            short_exp_secs,
        };

        manager.create_table(user_table).await?;

        Ok(manager)
    }

    async fn create_table(&self, user_table: &str) -> AuthResult<()> {
        let tn = Db::quote_table(&self.table);
        let utn = Db::quote_table(user_table);

        let q = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY NOT NULL, \
             token TEXT NOT NULL, \
             token_data TEXT, \
             path TEXT NOT NULL, \
             uses INTEGER DEFAULT 0, \
             created INTEGER DEFAULT 0, \
             modified INTEGER DEFAULT 0, \
             expires INTEGER DEFAULT 0, \
             creator_id INTEGER NOT NULL, \
             FOREIGN KEY(creator_id) REFERENCES {}({}))",
            tn, self.id_field, utn, self.id_field,
        );

        sqlx::query(&q).execute(self.db.write()).await?;

        self.db.create_unique_index(&self.table, "token").await?;
        self.db.create_index(&self.table, "creator_id").await?;

        Ok(())
    }

    /// Mint a token scoped to `path`, good for `uses` validations, expiring
    /// after the short or long configured duration.
    pub async fn insert(
        &self,
        creator_id: i64,
        uses: i64,
        path: &str,
        short: bool,
    ) -> AuthResult<AccessToken> {
        let exp_secs = if short {
            self.short_exp_secs
        } else {
            self.long_exp_secs
        };

        let mut token = AccessToken {
            record: Record::new(),
            creator_id,
            uses,
            path: path.to_string(),
            ..Default::default()
        };
        token.expires = token.record.created.add(Duration::seconds(exp_secs));
        token.secret = security::random_sha256_token().await?;

        self.persist(&mut token).await?;
        Ok(token)
    }

    /// Mint a single-shot, non-expiring token: one use, no expiry, consumed
    /// on first successful validation.
    pub async fn insert_eternal(&self, creator_id: i64, path: &str) -> AuthResult<AccessToken> {
        let mut token = AccessToken {
            record: Record::new(),
            creator_id,
            uses: 1,
            path: path.to_string(),
            ..Default::default()
        };
        token.secret = security::random_sha256_token().await?;

        self.persist(&mut token).await?;
        Ok(token)
    }

    /// Persist an operator-supplied token verbatim. This is the only entry
    /// point accepting caller-chosen token material; it bypasses the
    /// secure-generation path, hence the name.
    pub async fn insert_unsafe(&self, token: &mut AccessToken) -> AuthResult<()> {
        if token.creator_id == 0 {
            return Err(AuthError::UserInvalid);
        }
        if token.path.is_empty() {
            return Err(AuthError::PathInvalid);
        }

        if token.record.created.is_zero() {
            token.record = Record {
                id: token.record.id,
                ..Record::new()
            };
        }

        self.persist(token).await
    }

    async fn persist(&self, token: &mut AccessToken) -> AuthResult<()> {
        let q = format!(
            "INSERT INTO {} (token, token_data, path, uses, created, modified, expires, creator_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            Db::quote_table(&self.table),
        );

        let result = sqlx::query(&q)
            .bind(&token.secret)
            .bind(&token.data)
            .bind(&token.path)
            .bind(token.uses)
            .bind(token.record.created.unix_micros())
            .bind(token.record.modified.unix_micros())
            .bind(token.expires.unix_micros())
            .bind(token.creator_id)
            .execute(self.db.write())
            .await?;

        token.record.id = result.last_insert_rowid();
        Ok(())
    }

    /// Validate and consume one use of a token.
    ///
    /// The check order is load-bearing: expiry, then path scope, then
    /// remaining uses. Each failure deletes the row (best effort) and
    /// short-circuits; a token found with zero uses left reports `Reused`,
    /// distinct from `NotFound`.
    pub async fn select_by_access_token(&self, secret: &str, path: &str) -> AuthResult<AccessToken> {
        let q = format!(
            "SELECT * FROM {} WHERE token = ?1 LIMIT 1",
            Db::quote_table(&self.table),
        );

        let row = sqlx::query(&q)
            .bind(secret)
            .fetch_optional(self.db.read())
            .await?
            .ok_or(AuthError::NotFound)?;

        let mut token = self.map_token(&row);

        if !token.expires.is_zero() && token.expires.is_past() {
            self.reap(&token.secret, "expired").await;
            return Err(AuthError::Expired);
        }

        if token.path != path {
            self.reap(&token.secret, "path mismatch").await;
            return Err(AuthError::InvalidPath);
        }

        if token.uses <= 0 {
            self.reap(&token.secret, "uses exhausted").await;
            return Err(AuthError::Reused);
        }

        token.uses -= 1;
        token.record.modified = DateTime::now();

        let q = format!(
            "UPDATE {} SET uses = ?1, modified = ?2 WHERE token = ?3",
            Db::quote_table(&self.table),
        );
        sqlx::query(&q)
            .bind(token.uses)
            .bind(token.record.modified.unix_micros())
            .bind(&token.secret)
            .execute(self.db.write())
            .await?;

        Ok(token)
    }

    /// Best-effort cleanup; the originating error is what the caller sees
    /// even if the delete fails.
    async fn reap(&self, secret: &str, reason: &str) {
        if let Err(e) = self.delete_by_access_token(secret).await {
            tracing::warn!(error = %e, reason, "failed to delete invalid access token");
        }
    }

    pub async fn delete_by_access_token(&self, secret: &str) -> AuthResult<()> {
        let q = format!(
            "DELETE FROM {} WHERE token = ?1",
            Db::quote_table(&self.table),
        );

        sqlx::query(&q).bind(secret).execute(self.db.write()).await?;
        Ok(())
    }

    pub async fn count(&self) -> AuthResult<i64> {
        let q = format!(
            "SELECT COUNT(*) AS count FROM {}",
            Db::quote_table(&self.table),
        );

        let row = sqlx::query(&q).fetch_one(self.db.read()).await?;
        Ok(row.get("count"))
    }

    fn map_token(&self, row: &SqliteRow) -> AccessToken {
        AccessToken {
            record: Record {
                id: row.get(self.id_field.as_str()),
                created: DateTime::from_unix_micros(row.get("created")),
                modified: DateTime::from_unix_micros(row.get("modified")),
            },
            secret: row.get("token"),
            data: row.get("token_data"),
            path: row.get("path"),
            uses: row.get("uses"),
            expires: DateTime::from_unix_micros(row.get("expires")),
            creator_id: row.get("creator_id"),
        }
    }
}
