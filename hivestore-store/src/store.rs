//! The durable backing store.
//!
//! A store is a single SQLite file holding a metadata table and a generic
//! objects table. WAL journaling and a busy timeout let several processes of
//! the same application family share the file. Opening validates the stored
//! model-version identifiers against the running build; there is no in-place
//! migration, so an incompatible store fails to open and recovery is the
//! lifecycle's job.

use crate::error::{StoreError, StoreResult};
use hivestore_types::ObjectId;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// On-disk layout version this build reads and writes.
pub const FORMAT_VERSION: i64 = 1;

const META_STORE_UUID: &str = "store_uuid";
const META_FORMAT_VERSION: &str = "format_version";
const META_VERSION_IDENTIFIERS: &str = "version_identifiers";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS objects (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        data TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        modified_at INTEGER NOT NULL
    );
";

/// A generic object row in the store.
///
/// The `data` field holds arbitrary JSON whose structure is defined by the
/// application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: ObjectId,
    pub kind: String,
    pub data: serde_json::Value,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Store metadata, readable without opening the store read-write.
#[derive(Debug, Clone, Default)]
pub struct StoreMetadata {
    /// Identity assigned when the store file was first created.
    pub store_uuid: Option<Uuid>,
    /// On-disk layout version.
    pub format_version: Option<i64>,
    /// Model version identifiers the stored data is compatible with.
    pub version_identifiers: BTreeSet<String>,
}

/// An open handle to the durable backing store.
pub struct Store {
    path: PathBuf,
    uuid: Uuid,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("uuid", &self.uuid)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Opens (creating if absent) the store at `path`.
    ///
    /// This is the single "load attempt" primitive: it fails with
    /// [`StoreError::OpenFailed`] when the file is not a database, when the
    /// stored format version is newer than this build supports, or when the
    /// stored model identifiers do not include `model_version`.
    pub fn open(path: &Path, model_version: &str) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::OpenFailed(format!("cannot open {}: {e}", path.display())))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StoreError::OpenFailed(format!("busy timeout: {e}")))?;

        // The journal-mode probe doubles as a corruption check: it is the
        // first statement SQLite actually executes against the file.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(|e| StoreError::OpenFailed(format!("{}: {e}", path.display())))?;

        let meta = Self::metadata_from(&conn)
            .map_err(|e| StoreError::OpenFailed(format!("{}: {e}", path.display())))?;

        if let Some(format) = meta.format_version {
            if format > FORMAT_VERSION {
                return Err(StoreError::OpenFailed(format!(
                    "store format v{format} is newer than supported v{FORMAT_VERSION}"
                )));
            }
        }
        if !meta.version_identifiers.is_empty()
            && !meta.version_identifiers.contains(model_version)
        {
            return Err(StoreError::OpenFailed(format!(
                "store model identifiers {:?} do not include {model_version:?}",
                meta.version_identifiers
            )));
        }

        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::OpenFailed(format!("schema: {e}")))?;

        let uuid = match meta.store_uuid {
            Some(uuid) => uuid,
            None => {
                let uuid = Uuid::new_v4();
                Self::put_meta(&conn, META_STORE_UUID, &uuid.to_string())?;
                uuid
            }
        };
        if meta.format_version.is_none() {
            Self::put_meta(&conn, META_FORMAT_VERSION, &FORMAT_VERSION.to_string())?;
        }
        if meta.version_identifiers.is_empty() {
            let identifiers = serde_json::to_string(&[model_version])?;
            Self::put_meta(&conn, META_VERSION_IDENTIFIERS, &identifiers)?;
        }

        debug!("opened store {uuid} at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            uuid,
            conn: Mutex::new(conn),
        })
    }

    /// Destroys the store at `path`: removes the database file and its
    /// `-wal`/`-shm` sidecars. Irreversible. A missing file is not an error.
    pub fn destroy(path: &Path) -> StoreResult<()> {
        for victim in [path.to_path_buf(), sidecar(path, "-wal"), sidecar(path, "-shm")] {
            match std::fs::remove_file(&victim) {
                Ok(()) => debug!("removed {}", victim.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::DestroyFailed(format!(
                        "{}: {e}",
                        victim.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Reads store metadata without opening the store read-write.
    ///
    /// Fails if the file is missing or unreadable as a database. Pure read.
    pub fn read_metadata(path: &Path) -> StoreResult<StoreMetadata> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| StoreError::OpenFailed(format!("cannot open {}: {e}", path.display())))?;
        Self::metadata_from(&conn)
    }

    fn metadata_from(conn: &Connection) -> StoreResult<StoreMetadata> {
        let has_meta: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'store_meta'",
            [],
            |row| row.get(0),
        )?;
        if has_meta == 0 {
            return Ok(StoreMetadata::default());
        }

        let mut meta = StoreMetadata::default();
        if let Some(raw) = Self::get_meta(conn, META_STORE_UUID)? {
            meta.store_uuid = Some(
                raw.parse()
                    .map_err(|e| StoreError::InvalidData(format!("store_uuid: {e}")))?,
            );
        }
        if let Some(raw) = Self::get_meta(conn, META_FORMAT_VERSION)? {
            meta.format_version = Some(
                raw.parse()
                    .map_err(|e| StoreError::InvalidData(format!("format_version: {e}")))?,
            );
        }
        if let Some(raw) = Self::get_meta(conn, META_VERSION_IDENTIFIERS)? {
            meta.version_identifiers = serde_json::from_str(&raw)?;
        }
        Ok(meta)
    }

    fn get_meta(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
        conn.query_row(
            "SELECT value FROM store_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    fn put_meta(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
        conn.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// The store's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The store's identity, assigned at creation.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    // ── Object access ────────────────────────────────────────────

    /// Fetches a single object row by identifier.
    pub fn get_object(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, kind, data, created_at, modified_at FROM objects WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id_str, kind, data, created_at, modified_at)) => {
                let id = ObjectId::parse(&id_str)
                    .map_err(|e| StoreError::InvalidData(format!("object id: {e}")))?;
                Ok(Some(StoredObject {
                    id,
                    kind,
                    data: serde_json::from_str(&data)?,
                    created_at,
                    modified_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Number of object rows in the store.
    pub fn object_count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Applies a batch of upserts and deletes in one transaction.
    pub fn commit(&self, upserts: &[StoredObject], deletes: &[ObjectId]) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for obj in upserts {
            tx.execute(
                "INSERT INTO objects (id, kind, data, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     kind = excluded.kind,
                     data = excluded.data,
                     modified_at = excluded.modified_at",
                params![
                    obj.id.to_string(),
                    obj.kind,
                    serde_json::to_string(&obj.data)?,
                    obj.created_at,
                    obj.modified_at,
                ],
            )?;
        }
        for id in deletes {
            tx.execute("DELETE FROM objects WHERE id = ?1", params![id.to_string()])?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
