use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::data::ProcessedAsset;
use crate::error::{Result, SyncError};

/// Durable key-value store of processed assets, keyed by asset id.
///
/// Writes are committed per record; there is no cross-record transaction.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List every stored record as `(id, record)` pairs
    async fn list_all(&self) -> Result<Vec<(String, ProcessedAsset)>>;

    /// List stored ids without decoding the records behind them
    async fn list_ids(&self) -> Result<Vec<String>>;

    /// Fetch one record, or `None` if the id is not stored
    async fn get(&self, id: &str) -> Result<Option<ProcessedAsset>>;

    /// Insert or overwrite a record
    async fn set(&self, id: &str, asset: &ProcessedAsset) -> Result<()>;

    /// Remove a record; removing an absent id is not an error
    async fn delete(&self, id: &str) -> Result<()>;
}

/// The SQLite-backed record store.
/// Each record is stored as JSON, alongside the time it was last written.
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteRecordStore {
    /// Open (or create) the store at the given path and initialize the schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;

        info!(path = %db_path.display(), "Record store initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        })
    }

    /// Create the records table if it doesn't exist.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS larolds (
                id              TEXT PRIMARY KEY,
                data_json       TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Run a closure against the connection on the blocking pool.
    ///
    /// rusqlite is synchronous, so every query is moved off the async workers.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| SyncError::Persistence("connection lock poisoned".to_string()))?;
            f(&conn)
        })
        .await?
    }
}

fn decode(id: &str, json: &str) -> Result<ProcessedAsset> {
    ProcessedAsset::from_json(json)
        .map_err(|e| SyncError::Persistence(format!("corrupt record {}: {}", id, e)))
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn list_all(&self) -> Result<Vec<(String, ProcessedAsset)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, data_json FROM larolds ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (id, json) = row?;
                let asset = decode(&id, &json)?;
                records.push((id, asset));
            }
            Ok(records)
        })
        .await
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM larolds ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<ProcessedAsset>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT data_json FROM larolds WHERE id = ?1",
                    [&id],
                    |row| row.get(0),
                )
                .optional()?;

            json.map(|json| decode(&id, &json)).transpose()
        })
        .await
    }

    async fn set(&self, id: &str, asset: &ProcessedAsset) -> Result<()> {
        let id = id.to_string();
        let json = asset
            .to_json()
            .map_err(|e| SyncError::Persistence(format!("failed to encode {}: {}", id, e)))?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO larolds (id, data_json, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET data_json = excluded.data_json,
                                               updated_at = excluded.updated_at",
                rusqlite::params![&id, &json, Utc::now().timestamp()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM larolds WHERE id = ?1", [&id])?;
            Ok(())
        })
        .await
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::storage_path;

    fn asset(id: &str, modified: &str) -> ProcessedAsset {
        ProcessedAsset {
            asset_id: id.to_string(),
            name: format!("Larold {}", id),
            attribution: String::new(),
            submitter: String::new(),
            image_url: format!("https://example.com/{}.png", id),
            last_modified: modified.to_string(),
            ordinal_index: 1,
            warnings: vec![],
            storage_path: storage_path(id),
        }
    }

    #[tokio::test]
    async fn test_set_get_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::open(&dir.path().join("store.db")).unwrap();

        assert!(store.get("attA").await.unwrap().is_none());

        store.set("attA", &asset("attA", "t1")).await.unwrap();
        assert_eq!(store.get("attA").await.unwrap(), Some(asset("attA", "t1")));

        store.set("attA", &asset("attA", "t2")).await.unwrap();
        let stored = store.get("attA").await.unwrap().unwrap();
        assert_eq!(stored.last_modified, "t2");
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::open(&dir.path().join("nested/store.db")).unwrap();

        store.set("attA", &asset("attA", "t1")).await.unwrap();
        store.set("attB", &asset("attB", "t1")).await.unwrap();
        store.delete("attA").await.unwrap();
        // Deleting twice is fine
        store.delete("attA").await.unwrap();

        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["attB".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let store = SqliteRecordStore::open(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        conn.execute(
            "INSERT INTO larolds (id, data_json, updated_at) VALUES ('bad', 'not json', 0)",
            [],
        )
        .unwrap();

        let err = store.get("bad").await.unwrap_err();
        assert!(matches!(err, SyncError::Persistence(_)));
        assert!(store.list_all().await.is_err());

        // Ids stay listable and the bad record stays deletable
        store.set("good", &asset("good", "t1")).await.unwrap();
        assert_eq!(store.list_ids().await.unwrap(), vec!["bad", "good"]);
        store.delete("bad").await.unwrap();
        assert_eq!(store.list_ids().await.unwrap(), vec!["good"]);
    }
}
