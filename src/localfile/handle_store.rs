use super::handle::FileHandle;
use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// Version of the `localfile` table layout.
pub const SCHEMA_VERSION: i32 = 1;

/// SQLite-backed map from image record id to its persisted file handle.
///
/// Every operation touches a single key; nothing spans transactions.
pub struct HandleStore {
    conn: Arc<Mutex<Connection>>,
}

impl HandleStore {
    /// Open (or create) the store at `db_path`. Safe to call repeatedly on the
    /// same path; SQLite serializes concurrent openers.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open {}", db_path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        Self::migrate(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            bail!(
                "handle store schema version {version} is newer than supported \
                 version {SCHEMA_VERSION}"
            );
        }
        if version < SCHEMA_VERSION {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS localfile (
                    id      TEXT PRIMARY KEY,
                    handle  TEXT NOT NULL
                );
                PRAGMA user_version = {SCHEMA_VERSION};"
            ))
            .context("Failed to init handle store schema")?;
        }
        Ok(())
    }

    /// Look up the handle persisted for `id`.
    pub async fn get(&self, id: &str) -> Result<Option<FileHandle>> {
        let id = id.to_string();
        let raw = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT handle FROM localfile WHERE id = ?1",
                    params![id],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .context("Failed to read handle")
            })
            .await?;
        raw.map(|json| serde_json::from_str(&json).context("Corrupt handle entry"))
            .transpose()
    }

    /// Insert or replace the handle for `id`.
    pub async fn set(&self, id: &str, handle: &FileHandle) -> Result<()> {
        let id = id.to_string();
        let json = serde_json::to_string(handle)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO localfile (id, handle) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET handle = excluded.handle",
                params![id, json],
            )
            .context("Failed to persist handle")?;
            Ok(())
        })
        .await
    }

    /// Remove the entry for `id`. Missing ids are not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM localfile WHERE id = ?1", params![id])
                .context("Failed to delete handle")?;
            Ok(())
        })
        .await
    }

    pub async fn len(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM localfile", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    // SQLite calls block; keep them off the async workers.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&*conn.lock()))
            .await
            .context("Handle store task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn set_then_get_returns_same_handle() {
        let store = HandleStore::open_in_memory().unwrap();
        let handle = FileHandle::new("/photos/beach.jpg");
        store.set("X", &handle).await.unwrap();
        assert_eq!(store.get("X").await.unwrap(), Some(handle));
    }

    #[tokio::test]
    async fn unknown_id_is_absent() {
        let store = HandleStore::open_in_memory().unwrap();
        assert_eq!(store.get("never-set").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_and_delete_removes() {
        let store = HandleStore::open_in_memory().unwrap();
        store.set("a", &FileHandle::new("/one.png")).await.unwrap();
        store.set("a", &FileHandle::new("/two.png")).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.get("a").await.unwrap(), Some(FileHandle::new("/two.png")));

        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("nested").join("localfile.db");
        {
            let store = HandleStore::open(&db).unwrap();
            store.set("keep", &FileHandle::new("/clip.mp4")).await.unwrap();
        }
        let first = HandleStore::open(&db).unwrap();
        let second = HandleStore::open(&db).unwrap();
        assert_eq!(first.get("keep").await.unwrap(), Some(FileHandle::new("/clip.mp4")));
        assert_eq!(second.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn refuses_newer_schema() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("future.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch("PRAGMA user_version = 7;").unwrap();
        }
        assert!(HandleStore::open(&db).is_err());
    }
}
