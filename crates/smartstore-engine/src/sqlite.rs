//! SQLite implementation of the Engine trait.
//!
//! This is the persistent engine. Each store is its own database file under
//! the engine's root directory:
//!
//! ```text
//! <root>/global/<store>.sqlite
//! <root>/users/<user-dir>/<store>.sqlite
//! ```
//!
//! It uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use smartstore_core::entry::{self, SoupEntryId};
use smartstore_core::{IndexSpec, SoupFeature, SoupSpec, StoreKey, StoreName, StoreScope};

use crate::error::{EngineError, Result};
use crate::migration;
use crate::now_millis;
use crate::traits::Engine;

/// File extension of store databases.
const STORE_EXTENSION: &str = "sqlite";

/// Configuration for [`SqliteEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteEngineConfig {
    /// Directory holding all store files.
    pub root_dir: PathBuf,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl SqliteEngineConfig {
    /// Config rooted at `root_dir` with default settings.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for SqliteEngineConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("smartstore"),
            busy_timeout_ms: 5_000,
        }
    }
}

/// SQLite-based engine.
pub struct SqliteEngine {
    config: SqliteEngineConfig,
}

/// Handle to an open SQLite store.
///
/// Clones share one connection, protected by a mutex.
#[derive(Debug, Clone)]
pub struct SqliteHandle {
    key: StoreKey,
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHandle {
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Path of the store's database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute a blocking operation on the connection off the runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        run_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| EngineError::Task(format!("mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
    }
}

impl SqliteEngine {
    pub fn new(config: SqliteEngineConfig) -> Self {
        Self { config }
    }

    /// Engine rooted at `root_dir` with default settings.
    pub fn open(root_dir: impl Into<PathBuf>) -> Self {
        Self::new(SqliteEngineConfig::new(root_dir))
    }

    pub fn config(&self) -> &SqliteEngineConfig {
        &self.config
    }

    /// Directory holding the stores of a scope.
    pub fn scope_dir(&self, scope: &StoreScope) -> PathBuf {
        match scope {
            StoreScope::Global => self.config.root_dir.join("global"),
            StoreScope::User(user) => self.config.root_dir.join("users").join(user.storage_dir()),
        }
    }

    /// Database file of a store.
    pub fn store_path(&self, key: &StoreKey) -> PathBuf {
        self.scope_dir(&key.scope)
            .join(format!("{}.{}", key.name, STORE_EXTENSION))
    }
}

/// Run a blocking closure on tokio's blocking pool.
async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Task(format!("spawn_blocking failed: {e}")))?
}

/// Look up the entry table of a soup.
fn soup_table(conn: &Connection, soup: &str) -> Result<Option<String>> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM soup_names WHERE soup_name = ?1",
            params![soup],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(|id| format!("TABLE_{id}")))
}

/// Look up the entry table of a soup that must exist.
fn require_soup_table(conn: &Connection, soup: &str) -> Result<String> {
    soup_table(conn, soup)?.ok_or_else(|| EngineError::SoupNotFound(soup.to_string()))
}

fn encode_features(features: &[SoupFeature]) -> Result<Vec<u8>> {
    let names: Vec<&str> = features.iter().map(SoupFeature::as_str).collect();
    let mut buf = Vec::new();
    ciborium::into_writer(&names, &mut buf)
        .map_err(|e| EngineError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_features(bytes: &[u8]) -> Result<Vec<SoupFeature>> {
    let names: Vec<String> =
        ciborium::from_reader(bytes).map_err(|e| EngineError::Serialization(e.to_string()))?;
    names
        .iter()
        .map(|name| {
            name.parse()
                .map_err(|e| EngineError::InvalidData(format!("soup features: {e}")))
        })
        .collect()
}

/// Insert or update one entry inside an open transaction.
fn upsert_entry(
    tx: &Transaction<'_>,
    table: &str,
    soup: &str,
    mut e: Value,
    now: i64,
) -> Result<Value> {
    let existing_id = entry::entry_id(&e);
    let obj = e
        .as_object_mut()
        .ok_or_else(|| EngineError::InvalidEntry("expected a JSON object".to_string()))?;

    let id = match existing_id {
        Some(id) => id,
        None => {
            tx.execute(
                &format!("INSERT INTO {table} (soup, created, lastModified) VALUES ('{{}}', ?1, ?1)"),
                params![now],
            )?;
            tx.last_insert_rowid()
        }
    };

    entry::stamp(obj, id, now);
    let json = serde_json::to_string(&e)?;

    let changed = tx.execute(
        &format!("UPDATE {table} SET soup = ?1, lastModified = ?2 WHERE id = ?3"),
        params![json, now, id],
    )?;
    if changed == 0 {
        return Err(EngineError::InvalidEntry(format!(
            "no entry with {} {} in soup {}",
            entry::SOUP_ENTRY_ID,
            id,
            soup
        )));
    }

    Ok(e)
}

/// Fail unless `path` is one of the soup's index paths (or `_soupEntryId`).
fn require_indexed(conn: &Connection, soup: &str, path: &str) -> Result<()> {
    if path == entry::SOUP_ENTRY_ID {
        return Ok(());
    }
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM soup_index_map WHERE soup_name = ?1 AND path = ?2",
        params![soup, path],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(EngineError::not_indexed(soup, path));
    }
    Ok(())
}

/// The single entry whose value at `path` equals `value`.
fn find_by_path(
    conn: &Connection,
    table: &str,
    soup: &str,
    path: &str,
    value: &Value,
) -> Result<Option<SoupEntryId>> {
    let mut stmt = conn.prepare(&format!("SELECT id, soup FROM {table} ORDER BY id"))?;
    let mut rows = stmt.query([])?;

    let mut found = None;
    while let Some(row) = rows.next()? {
        let json: String = row.get(1)?;
        let stored: Value = serde_json::from_str(&json)?;
        if entry::project(&stored, path) != Some(value) {
            continue;
        }
        if found.is_some() {
            return Err(EngineError::ambiguous_match(soup, path, value));
        }
        found = Some(row.get(0)?);
    }
    Ok(found)
}

/// Point an entry at the stored entry sharing its external id, or clear its
/// id so it is inserted.
fn resolve_external_id(
    tx: &Transaction<'_>,
    table: &str,
    soup: &str,
    path: &str,
    mut e: Value,
) -> Result<Value> {
    if path == entry::SOUP_ENTRY_ID {
        return Ok(e);
    }

    let existing = match entry::project(&e, path).filter(|v| !v.is_null()) {
        Some(value) => find_by_path(tx, table, soup, path, value)?,
        None => None,
    };
    if let Some(obj) = e.as_object_mut() {
        match existing {
            Some(id) => obj.insert(entry::SOUP_ENTRY_ID.to_string(), Value::from(id)),
            None => obj.remove(entry::SOUP_ENTRY_ID),
        };
    }
    Ok(e)
}

#[async_trait]
impl Engine for SqliteEngine {
    type Handle = SqliteHandle;

    async fn open_store(&self, key: &StoreKey) -> Result<SqliteHandle> {
        let key = key.clone();
        let dir = self.scope_dir(&key.scope);
        let path = self.store_path(&key);
        let busy_timeout = Duration::from_millis(self.config.busy_timeout_ms);

        let (conn, path) = run_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| {
                EngineError::Unavailable(format!("cannot create {}: {e}", dir.display()))
            })?;

            let mut conn = Connection::open(&path).map_err(|e| {
                EngineError::Unavailable(format!("cannot open {}: {e}", path.display()))
            })?;
            conn.busy_timeout(busy_timeout)?;
            migration::migrate(&mut conn)?;
            Ok((conn, path))
        })
        .await?;

        tracing::debug!(store = %key, path = %path.display(), "opened sqlite store");

        Ok(SqliteHandle {
            key,
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn delete_store(&self, key: &StoreKey) -> Result<()> {
        let key = key.clone();
        let path = self.store_path(&key);

        run_blocking(move || {
            if !path.is_file() {
                return Err(EngineError::StoreNotFound(key));
            }
            std::fs::remove_file(&path)?;

            // Sidecar files exist only while a journal is active
            for suffix in ["-journal", "-wal", "-shm"] {
                let mut sidecar = path.clone().into_os_string();
                sidecar.push(suffix);
                match std::fs::remove_file(&sidecar) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }

            tracing::info!(store = %key, path = %path.display(), "deleted sqlite store");
            Ok(())
        })
        .await
    }

    async fn store_exists(&self, key: &StoreKey) -> Result<bool> {
        let path = self.store_path(key);
        run_blocking(move || Ok(path.is_file())).await
    }

    async fn store_names(&self, scope: &StoreScope) -> Result<Vec<StoreName>> {
        let dir = self.scope_dir(scope);

        run_blocking(move || {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };

            let mut names = Vec::new();
            for dir_entry in entries {
                let path = dir_entry?.path();
                if !path.is_file()
                    || path.extension().and_then(|ext| ext.to_str()) != Some(STORE_EXTENSION)
                {
                    continue;
                }
                if let Some(name) = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| StoreName::new(stem).ok())
                {
                    names.push(name);
                }
            }

            names.sort();
            Ok(names)
        })
        .await
    }

    async fn soup_exists(&self, handle: &SqliteHandle, soup: &str) -> Result<bool> {
        let soup = soup.to_string();
        handle
            .with_conn(move |conn| Ok(soup_table(conn, &soup)?.is_some()))
            .await
    }

    async fn register_soup(
        &self,
        handle: &SqliteHandle,
        spec: &SoupSpec,
        indices: &[IndexSpec],
    ) -> Result<bool> {
        let spec = spec.clone();
        let indices = indices.to_vec();

        handle
            .with_conn(move |conn| {
                let tx = conn.transaction()?;

                if soup_table(&tx, spec.name())?.is_some() {
                    return Ok(false);
                }

                tx.execute(
                    "INSERT INTO soup_names (soup_name, features, created_at) VALUES (?1, ?2, ?3)",
                    params![spec.name(), encode_features(spec.features())?, now_millis()],
                )?;
                let table = format!("TABLE_{}", tx.last_insert_rowid());

                for (position, index) in indices.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO soup_index_map (soup_name, position, path, column_type)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            spec.name(),
                            position as i64,
                            index.path(),
                            index.index_type().as_str()
                        ],
                    )?;
                }

                tx.execute_batch(&format!(
                    "CREATE TABLE {table} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        soup TEXT NOT NULL,
                        created INTEGER NOT NULL,
                        lastModified INTEGER NOT NULL
                    )"
                ))?;

                tx.commit()?;
                Ok(true)
            })
            .await
    }

    async fn remove_soup(&self, handle: &SqliteHandle, soup: &str) -> Result<bool> {
        let soup = soup.to_string();

        handle
            .with_conn(move |conn| {
                let tx = conn.transaction()?;

                let Some(table) = soup_table(&tx, &soup)? else {
                    return Ok(false);
                };

                tx.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;
                tx.execute("DELETE FROM soup_index_map WHERE soup_name = ?1", params![soup])?;
                tx.execute("DELETE FROM soup_names WHERE soup_name = ?1", params![soup])?;

                tx.commit()?;
                Ok(true)
            })
            .await
    }

    async fn soup_names(&self, handle: &SqliteHandle) -> Result<Vec<String>> {
        handle
            .with_conn(|conn| {
                let mut stmt = conn.prepare("SELECT soup_name FROM soup_names ORDER BY soup_name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(names)
            })
            .await
    }

    async fn soup_indices(
        &self,
        handle: &SqliteHandle,
        soup: &str,
    ) -> Result<Option<Vec<IndexSpec>>> {
        let soup = soup.to_string();

        handle
            .with_conn(move |conn| {
                if soup_table(conn, &soup)?.is_none() {
                    return Ok(None);
                }

                let mut stmt = conn.prepare(
                    "SELECT path, column_type FROM soup_index_map
                     WHERE soup_name = ?1
                     ORDER BY position",
                )?;
                let rows = stmt
                    .query_map(params![soup], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let indices = rows
                    .into_iter()
                    .map(|(path, column_type)| {
                        IndexSpec::parse(path, &column_type)
                            .map_err(|e| EngineError::InvalidData(format!("soup {soup}: {e}")))
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(Some(indices))
            })
            .await
    }

    async fn soup_spec(&self, handle: &SqliteHandle, soup: &str) -> Result<Option<SoupSpec>> {
        let soup = soup.to_string();

        handle
            .with_conn(move |conn| {
                let features: Option<Vec<u8>> = conn
                    .query_row(
                        "SELECT features FROM soup_names WHERE soup_name = ?1",
                        params![soup],
                        |row| row.get(0),
                    )
                    .optional()?;

                match features {
                    Some(bytes) => Ok(Some(SoupSpec::with_features(
                        soup,
                        decode_features(&bytes)?,
                    )?)),
                    None => Ok(None),
                }
            })
            .await
    }

    async fn clear_soup(&self, handle: &SqliteHandle, soup: &str) -> Result<()> {
        let soup = soup.to_string();

        handle
            .with_conn(move |conn| {
                let table = require_soup_table(conn, &soup)?;
                conn.execute(&format!("DELETE FROM {table}"), [])?;
                Ok(())
            })
            .await
    }

    async fn upsert_entries(
        &self,
        handle: &SqliteHandle,
        soup: &str,
        entries: Vec<Value>,
    ) -> Result<Vec<Value>> {
        let soup = soup.to_string();

        handle
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let table = require_soup_table(&tx, &soup)?;
                let now = now_millis();

                let stored = entries
                    .into_iter()
                    .map(|e| upsert_entry(&tx, &table, &soup, e, now))
                    .collect::<Result<Vec<_>>>()?;

                tx.commit()?;
                Ok(stored)
            })
            .await
    }

    async fn upsert_entries_with_external_id(
        &self,
        handle: &SqliteHandle,
        soup: &str,
        entries: Vec<Value>,
        external_id_path: &str,
    ) -> Result<Vec<Value>> {
        let soup = soup.to_string();
        let path = external_id_path.to_string();

        handle
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let table = require_soup_table(&tx, &soup)?;
                require_indexed(&tx, &soup, &path)?;
                let now = now_millis();

                let mut stored = Vec::with_capacity(entries.len());
                for e in entries {
                    let e = resolve_external_id(&tx, &table, &soup, &path, e)?;
                    stored.push(upsert_entry(&tx, &table, &soup, e, now)?);
                }

                tx.commit()?;
                Ok(stored)
            })
            .await
    }

    async fn lookup_entry_id(
        &self,
        handle: &SqliteHandle,
        soup: &str,
        path: &str,
        value: &Value,
    ) -> Result<Option<SoupEntryId>> {
        let soup = soup.to_string();
        let path = path.to_string();
        let value = value.clone();

        handle
            .with_conn(move |conn| {
                let table = require_soup_table(conn, &soup)?;
                require_indexed(conn, &soup, &path)?;
                find_by_path(conn, &table, &soup, &path, &value)
            })
            .await
    }

    async fn retrieve_entries(
        &self,
        handle: &SqliteHandle,
        soup: &str,
        ids: &[SoupEntryId],
    ) -> Result<Vec<Value>> {
        let soup = soup.to_string();
        let ids = ids.to_vec();

        handle
            .with_conn(move |conn| {
                let table = require_soup_table(conn, &soup)?;
                let mut stmt = conn.prepare(&format!("SELECT soup FROM {table} WHERE id = ?1"))?;

                let mut found: Vec<Value> = Vec::with_capacity(ids.len());
                for id in ids {
                    let json: Option<String> =
                        stmt.query_row(params![id], |row| row.get(0)).optional()?;
                    if let Some(json) = json {
                        found.push(serde_json::from_str(&json)?);
                    }
                }
                Ok(found)
            })
            .await
    }

    async fn remove_entries(
        &self,
        handle: &SqliteHandle,
        soup: &str,
        ids: &[SoupEntryId],
    ) -> Result<()> {
        let soup = soup.to_string();
        let ids = ids.to_vec();

        handle
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let table = require_soup_table(&tx, &soup)?;
                for id in ids {
                    tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    async fn entry_count(&self, handle: &SqliteHandle, soup: &str) -> Result<u64> {
        let soup = soup.to_string();

        handle
            .with_conn(move |conn| {
                let table = require_soup_table(conn, &soup)?;
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::EngineExt;
    use serde_json::json;
    use smartstore_core::{IndexType, UserId};

    fn name(s: &str) -> StoreName {
        StoreName::new(s).unwrap()
    }

    fn key_specs() -> Vec<IndexSpec> {
        vec![IndexSpec::string("key").unwrap()]
    }

    #[tokio::test]
    async fn test_open_creates_file_per_scope() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let user = UserId::new("00D", "005");

        let global = engine.open_global_store(name("SWIFTGLBLCOOKBOOK")).await.unwrap();
        let shared = engine
            .open_shared_store(name("SWIFTLOCALCOOKBOOK"), user.clone())
            .await
            .unwrap();

        assert!(global.path().starts_with(dir.path().join("global")));
        assert!(global.path().is_file());
        assert!(shared
            .path()
            .starts_with(dir.path().join("users").join(user.storage_dir())));
        assert!(shared.path().is_file());

        assert_eq!(
            engine.store_names(&StoreScope::Global).await.unwrap(),
            vec![name("SWIFTGLBLCOOKBOOK")]
        );
        assert_eq!(
            engine.store_names(&StoreScope::User(user)).await.unwrap(),
            vec![name("SWIFTLOCALCOOKBOOK")]
        );
    }

    #[tokio::test]
    async fn test_register_and_remove_soup() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();
        let spec = SoupSpec::new("WONTONSOUP").unwrap();

        assert!(!engine.soup_exists(&handle, "WONTONSOUP").await.unwrap());
        assert!(engine.register_soup(&handle, &spec, &key_specs()).await.unwrap());
        assert!(!engine.register_soup(&handle, &spec, &key_specs()).await.unwrap());
        assert!(engine.soup_exists(&handle, "WONTONSOUP").await.unwrap());

        assert!(engine.remove_soup(&handle, "WONTONSOUP").await.unwrap());
        assert!(!engine.soup_exists(&handle, "WONTONSOUP").await.unwrap());
        assert!(!engine.remove_soup(&handle, "WONTONSOUP").await.unwrap());
    }

    #[tokio::test]
    async fn test_soup_indices_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();
        let indices = vec![
            IndexSpec::new("name", IndexType::String).unwrap(),
            IndexSpec::new("age", IndexType::Integer).unwrap(),
            IndexSpec::new("bio", IndexType::FullText).unwrap(),
        ];
        let spec = SoupSpec::with_features("people", vec![SoupFeature::ExternalStorage]).unwrap();

        engine.register_soup(&handle, &spec, &indices).await.unwrap();

        assert_eq!(engine.soup_indices(&handle, "people").await.unwrap(), Some(indices));
        assert_eq!(engine.soup_spec(&handle, "people").await.unwrap(), Some(spec));
        assert_eq!(engine.soup_indices(&handle, "missing").await.unwrap(), None);
        assert_eq!(engine.soup_spec(&handle, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let spec = SoupSpec::new("WONTONSOUP").unwrap();

        let stored = {
            let engine = SqliteEngine::open(dir.path());
            let handle = engine.open_global_store(name("G1")).await.unwrap();
            engine.register_soup(&handle, &spec, &key_specs()).await.unwrap();
            engine
                .upsert_entries(&handle, "WONTONSOUP", vec![json!({"key": "ka1", "value": "va1"})])
                .await
                .unwrap()
        };
        let id = entry::entry_id(&stored[0]).unwrap();

        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();
        assert!(engine.soup_exists(&handle, "WONTONSOUP").await.unwrap());

        let retrieved = engine
            .retrieve_entries(&handle, "WONTONSOUP", &[id, id + 100])
            .await
            .unwrap();
        assert_eq!(retrieved, stored);
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();
        engine
            .register_soup(&handle, &SoupSpec::new("S").unwrap(), &key_specs())
            .await
            .unwrap();

        let mut stored = engine
            .upsert_entries(&handle, "S", vec![json!({"key": "a"})])
            .await
            .unwrap();
        stored[0]["key"] = json!("b");

        let updated = engine.upsert_entries(&handle, "S", stored.clone()).await.unwrap();
        assert_eq!(entry::entry_id(&updated[0]), entry::entry_id(&stored[0]));
        assert_eq!(engine.entry_count(&handle, "S").await.unwrap(), 1);

        let unknown = engine
            .upsert_entries(&handle, "S", vec![json!({"key": "c"}), json!({"_soupEntryId": 999})])
            .await
            .unwrap_err();
        assert!(matches!(unknown, EngineError::InvalidEntry(_)));
        // Rolled back: the first entry of the failed batch was not kept
        assert_eq!(engine.entry_count(&handle, "S").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_soup_drops_entries() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();
        let spec = SoupSpec::new("S").unwrap();
        engine.register_soup(&handle, &spec, &key_specs()).await.unwrap();
        engine
            .upsert_entries(&handle, "S", vec![json!({"key": "a"}), json!({"key": "b"})])
            .await
            .unwrap();

        engine.remove_soup(&handle, "S").await.unwrap();
        engine.register_soup(&handle, &spec, &key_specs()).await.unwrap();
        assert_eq!(engine.entry_count(&handle, "S").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entry_ops_on_missing_soup() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();

        let err = engine.clear_soup(&handle, "nope").await.unwrap_err();
        assert!(matches!(err, EngineError::SoupNotFound(s) if s == "nope"));
        let err = engine.entry_count(&handle, "nope").await.unwrap_err();
        assert!(matches!(err, EngineError::SoupNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_store() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();
        let path = handle.path().to_path_buf();
        drop(handle);

        engine.delete_global_store(name("G1")).await.unwrap();
        assert!(!path.exists());

        let err = engine.delete_global_store(name("G1")).await.unwrap_err();
        assert!(matches!(err, EngineError::StoreNotFound(_)));
    }

    #[tokio::test]
    async fn test_open_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("root");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let engine = SqliteEngine::open(&blocker);
        let err = engine.open_global_store(name("G1")).await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config = SqliteEngineConfig::from_json(r#"{"root_dir": "/tmp/stores"}"#).unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/tmp/stores"));
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[tokio::test]
    async fn test_upsert_with_external_id() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();
        let indices = vec![IndexSpec::string("Id").unwrap()];
        engine
            .register_soup(&handle, &SoupSpec::new("accounts").unwrap(), &indices)
            .await
            .unwrap();

        let first = engine
            .upsert_entries_with_external_id(
                &handle,
                "accounts",
                vec![json!({"Id": "001", "Name": "Acme"})],
                "Id",
            )
            .await
            .unwrap();
        let acme = entry::entry_id(&first[0]).unwrap();

        // A stale _soupEntryId is ignored in favor of the external id
        let second = engine
            .upsert_entries_with_external_id(
                &handle,
                "accounts",
                vec![
                    json!({"Id": "001", "Name": "Acme Corp", "_soupEntryId": 999}),
                    json!({"Id": "002", "Name": "Globex"}),
                ],
                "Id",
            )
            .await
            .unwrap();
        assert_eq!(entry::entry_id(&second[0]), Some(acme));
        assert_ne!(entry::entry_id(&second[1]), Some(acme));
        assert_eq!(engine.entry_count(&handle, "accounts").await.unwrap(), 2);

        assert_eq!(
            engine
                .lookup_entry_id(&handle, "accounts", "Id", &json!("002"))
                .await
                .unwrap(),
            entry::entry_id(&second[1])
        );
        assert_eq!(
            engine
                .lookup_entry_id(&handle, "accounts", "Id", &json!("404"))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_external_id_errors() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SqliteEngine::open(dir.path());
        let handle = engine.open_global_store(name("G1")).await.unwrap();
        engine
            .register_soup(&handle, &SoupSpec::new("S").unwrap(), &key_specs())
            .await
            .unwrap();
        engine
            .upsert_entries(&handle, "S", vec![json!({"key": "dup"}), json!({"key": "dup"})])
            .await
            .unwrap();

        let err = engine
            .lookup_entry_id(&handle, "S", "key", &json!("dup"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidEntry(_)));

        let err = engine
            .upsert_entries_with_external_id(&handle, "S", vec![json!({"other": 1})], "other")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidEntry(_)));
        assert_eq!(engine.entry_count(&handle, "S").await.unwrap(), 2);
    }
}
