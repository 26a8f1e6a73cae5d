/// Database layer
///
/// Owns the two SQLite handles the managers run on: a pooled read handle
/// for all selects and counts, and a single serialized write connection
/// for every mutation including table/index creation at boot. SQLite
/// serializes writers at the file level anyway; routing mutations through
/// one connection avoids write-lock contention and keeps mutations in
/// program order within the process.
use crate::config::StorageConfig;
use crate::error::AuthResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;

/// The paired read/write handles over one database file.
#[derive(Debug, Clone)]
pub struct Db {
    read: SqlitePool,
    write: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the database file with the teacher-grade
    /// pragmas: WAL journal, foreign keys on, busy timeout.
    pub async fn open(storage: &StorageConfig) -> AuthResult<Self> {
        if let Some(parent) = storage.database_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&storage.database_file)
            .create_if_missing(true)
            .journal_mode(if storage.enable_wal {
                SqliteJournalMode::Wal
            } else {
                SqliteJournalMode::Delete
            })
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let write = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;

        let read = SqlitePoolOptions::new()
            .max_connections(storage.max_read_connections)
            .connect_with(options)
            .await?;

        Ok(Self { read, write })
    }

    /// Pooled handle for `SELECT`/`COUNT` traffic.
    pub fn read(&self) -> &SqlitePool {
        &self.read
    }

    /// Single-connection handle; all mutations go through here.
    pub fn write(&self) -> &SqlitePool {
        &self.write
    }

    /// Quote a table name for interpolation into DDL/DML text.
    pub fn quote_table(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    pub async fn create_index(&self, table: &str, column: &str) -> AuthResult<()> {
        self.create_index_inner(table, column, false).await
    }

    pub async fn create_unique_index(&self, table: &str, column: &str) -> AuthResult<()> {
        self.create_index_inner(table, column, true).await
    }

    async fn create_index_inner(&self, table: &str, column: &str, unique: bool) -> AuthResult<()> {
        let q = format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            Self::quote_table(&format!("{}_{}_idx", table, column)),
            Self::quote_table(table),
            Self::quote_table(column),
        );

        sqlx::query(&q).execute(&self.write).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.read.close().await;
        self.write.close().await;
    }
}
