use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use shared::domain::{Account, StoredBatch};

/// Key under which the active identity record is mirrored.
pub const IDENTITY_KEY: &str = "session.identity";
/// Key under which the last generation result and cursor are mirrored.
pub const LAST_RESULT_KEY: &str = "session.lastResult";

/// Durable key/value session store backed by sqlite.
///
/// Values are structured records serialized to JSON text. Reads
/// tolerate missing or corrupt rows by returning `None`; persistence
/// corruption is never surfaced to callers.
#[derive(Clone)]
pub struct SessionStore {
    pool: Pool<Sqlite>,
}

impl SessionStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        let store = Self { pool };
        store.ensure_session_state_table().await?;
        Ok(store)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_session_state_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure session_state table exists")?;
        Ok(())
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized =
            serde_json::to_string(value).with_context(|| format!("serializing '{key}'"))?;
        sqlx::query(
            "INSERT INTO session_state (key, value, updated_at)
             VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
        )
        .bind(key)
        .bind(serialized)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns the stored value for `key`, or `None` when the key is
    /// absent or its value no longer deserializes.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row = sqlx::query("SELECT value FROM session_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.get(0);
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(key, %err, "discarding corrupt session record");
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM session_state WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Typed helpers for the two session keys.

    pub async fn load_identity(&self) -> Result<Option<Account>> {
        self.get(IDENTITY_KEY).await
    }

    pub async fn save_identity(&self, account: &Account) -> Result<()> {
        self.put(IDENTITY_KEY, account).await
    }

    pub async fn load_last_result(&self) -> Result<Option<StoredBatch>> {
        self.get(LAST_RESULT_KEY).await
    }

    pub async fn save_last_result(&self, stored: &StoredBatch) -> Result<()> {
        self.put(LAST_RESULT_KEY, stored).await
    }

    pub async fn clear_session(&self) -> Result<()> {
        self.delete(IDENTITY_KEY).await?;
        self.delete(LAST_RESULT_KEY).await?;
        Ok(())
    }

    /// Stores an already-serialized value verbatim.
    pub async fn put_raw(&self, key: &str, raw: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO session_state (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        )
        .bind(key)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return Ok(());
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return Ok(());
    }

    let Some(parent) = Path::new(path).parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
