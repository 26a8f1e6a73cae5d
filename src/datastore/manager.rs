/// Datastore manager implementation using runtime queries
use crate::{
    datastore::DataEntry,
    datetime::DateTime,
    db::Db,
    error::{AuthError, AuthResult},
    record::Record,
};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub struct DataStoreManager {
    db: Db,
    table: String,
    id_field: String,
}

impl DataStoreManager {
    pub async fn new(db: Db, table: &str, id_field: &str) -> AuthResult<Self> {
        if table.is_empty() {
            return Err(AuthError::Config(
                "datastore table name is empty".to_string(),
            ));
        }
        if id_field.is_empty() {
            return Err(AuthError::Config("id field name is empty".to_string()));
        }

        let manager = Self {
            db,
            table: table.to_string(),
            id_field: id_field.to_string(),
        };

        manager.create_table().await?;

        Ok(manager)
    }

    async fn create_table(&self) -> AuthResult<()> {
        let tn = Db::quote_table(&self.table);

        let q = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY, \
             key TEXT NOT NULL, \
             data TEXT NOT NULL, \
             created INTEGER DEFAULT 0, \
             modified INTEGER DEFAULT 0)",
            tn, self.id_field,
        );

        sqlx::query(&q).execute(self.db.write()).await?;

        self.db.create_index(&self.table, "key").await?;

        for column in ["created", "modified"] {
            let q = format!(
                "CREATE INDEX IF NOT EXISTS {}_{}_desc_idx ON {} ({} DESC)",
                self.table, column, tn, column,
            );
            sqlx::query(&q).execute(self.db.write()).await?;
        }

        Ok(())
    }

    /// Persist a new entry under `key`, serializing the value to JSON.
    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) -> AuthResult<DataEntry> {
        let mut entry = DataEntry {
            record: Record::new(),
            key: key.to_string(),
            data: serde_json::to_string(value)?,
        };

        let q = format!(
            "INSERT INTO {} (key, data, created, modified) VALUES (?1, ?2, ?3, ?4)",
            Db::quote_table(&self.table),
        );

        let result = sqlx::query(&q)
            .bind(&entry.key)
            .bind(&entry.data)
            .bind(entry.record.created.unix_micros())
            .bind(entry.record.modified.unix_micros())
            .execute(self.db.write())
            .await?;

        entry.record.id = result.last_insert_rowid();
        Ok(entry)
    }

    /// Replace the payload of an existing entry, re-stamping modified.
    pub async fn update<T: Serialize>(&self, id: i64, value: &T) -> AuthResult<()> {
        let data = serde_json::to_string(value)?;

        let q = format!(
            "UPDATE {} SET data = ?1, modified = ?2 WHERE {} = ?3",
            Db::quote_table(&self.table),
            self.id_field,
        );

        sqlx::query(&q)
            .bind(&data)
            .bind(DateTime::now().unix_micros())
            .bind(id)
            .execute(self.db.write())
            .await?;

        Ok(())
    }

    /// Fetch the most recent entry stored under `key`.
    pub async fn select_by_key(&self, key: &str) -> AuthResult<DataEntry> {
        let q = format!(
            "SELECT * FROM {} WHERE key = ?1 ORDER BY created DESC LIMIT 1",
            Db::quote_table(&self.table),
        );

        let row = sqlx::query(&q)
            .bind(key)
            .fetch_optional(self.db.read())
            .await?
            .ok_or(AuthError::NotFound)?;

        Ok(self.map_entry(&row))
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

    fn map_entry(&self, row: &SqliteRow) -> DataEntry {
        DataEntry {
            record: Record {
                id: row.get(self.id_field.as_str()),
                created: DateTime::from_unix_micros(row.get("created")),
                modified: DateTime::from_unix_micros(row.get("modified")),
            },
            key: row.get("key"),
            data: row.get("data"),
        }
    }
}
