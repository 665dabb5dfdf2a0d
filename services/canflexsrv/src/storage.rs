//! Document storage - SQLite persistence for the rule set, user database and notes
//!
//! All three are stored as raw text bodies in one `documents` table so the
//! submitted JSON round-trips unchanged (including fields the engine ignores).

use crate::error::Result;
use canflex_rules::{parse_rule_set_json, RuleSetDocument};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Rule set document (`{"rules":[...]}`)
pub const RULES_DOC: &str = "rules";
/// Opaque user database owned by the control UI
pub const USERDB_DOC: &str = "userdb";
/// Free-text notes
pub const NOTES_DOC: &str = "notes";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        name TEXT PRIMARY KEY,
        body TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

/// Stored document with its last update time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub body: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    /// Open (creating if missing) the database file and ensure the schema
    pub async fn connect(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        debug!("Document store opened: {}", db_path);
        Self::from_pool(pool).await
    }

    /// Private in-memory database (tests, `--validate` without a file)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn get(&self, name: &str) -> Result<Option<StoredDocument>> {
        let row = sqlx::query("SELECT body, updated_at FROM documents WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<StoredDocument> {
            Ok(StoredDocument {
                body: row.try_get("body")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    pub async fn put(&self, name: &str, body: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO documents (name, body, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(body)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        debug!("Document '{}' saved ({} bytes)", name, body.len());
        Ok(())
    }

    /// Stored rule set, `None` when nothing has been saved yet
    pub async fn load_rule_set(&self) -> Result<Option<RuleSetDocument>> {
        match self.get(RULES_DOC).await? {
            Some(doc) => Ok(Some(parse_rule_set_json(&doc.body)?)),
            None => Ok(None),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool; later calls fail with a storage error
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
