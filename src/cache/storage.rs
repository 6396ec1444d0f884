//! Cache storage trait with in-memory and SQLite implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::net::{headers_from_pairs, headers_to_pairs, Response};

use super::traits::{vary_matches, CachedResponse, EntrySummary, RequestKey, StoredEntry, VaryValue};

/// Trait for cache storage backends.
///
/// Partitions are kept in creation order; `match_any` searches them in that order.
pub trait CacheStorage: Send + Sync + 'static {
  /// Create the partition if it does not exist yet.
  fn open(&self, partition: &str) -> Result<()>;

  /// Names of all existing partitions.
  fn keys(&self) -> Result<Vec<String>>;

  /// Delete a partition and its entries. Returns false if it did not exist.
  fn delete(&self, partition: &str) -> Result<bool>;

  /// Look up a request in one partition.
  fn match_in(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Look up a request across all partitions, first hit wins.
  fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Store one entry, replacing any previous entry for the same key.
  fn put(&self, partition: &str, entry: &StoredEntry) -> Result<()>;

  /// Store all entries or none of them.
  fn put_all(&self, partition: &str, entries: &[StoredEntry]) -> Result<()>;

  /// List the entries of a partition.
  fn entries(&self, partition: &str) -> Result<Vec<EntrySummary>>;
}

impl<T: CacheStorage> CacheStorage for Arc<T> {
  fn open(&self, partition: &str) -> Result<()> {
    (**self).open(partition)
  }

  fn keys(&self) -> Result<Vec<String>> {
    (**self).keys()
  }

  fn delete(&self, partition: &str) -> Result<bool> {
    (**self).delete(partition)
  }

  fn match_in(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    (**self).match_in(partition, key)
  }

  fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    (**self).match_any(key)
  }

  fn put(&self, partition: &str, entry: &StoredEntry) -> Result<()> {
    (**self).put(partition, entry)
  }

  fn put_all(&self, partition: &str, entries: &[StoredEntry]) -> Result<()> {
    (**self).put_all(partition, entries)
  }

  fn entries(&self, partition: &str) -> Result<Vec<EntrySummary>> {
    (**self).entries(partition)
  }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
  mutex.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
}

// ============================================================================
// In-memory storage
// ============================================================================

struct MemoryEntry {
  entry: StoredEntry,
  cached_at: DateTime<Utc>,
}

struct MemoryPartition {
  name: String,
  entries: HashMap<String, MemoryEntry>,
}

/// Storage that lives only as long as the process.
/// Used for ephemeral runs and tests.
#[derive(Default)]
pub struct MemoryStorage {
  partitions: Mutex<Vec<MemoryPartition>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl MemoryPartition {
  fn lookup(&self, key: &RequestKey) -> Option<CachedResponse> {
    if !key.is_cacheable() {
      return None;
    }
    self
      .entries
      .get(&key.cache_hash())
      .filter(|e| vary_matches(&e.entry.vary, key))
      .map(|e| CachedResponse {
        response: e.entry.response.clone(),
        partition: self.name.clone(),
        cached_at: e.cached_at,
      })
  }
}

fn partition_mut<'a>(partitions: &'a mut Vec<MemoryPartition>, name: &str) -> &'a mut MemoryPartition {
  match partitions.iter().position(|p| p.name == name) {
    Some(index) => &mut partitions[index],
    None => {
      partitions.push(MemoryPartition {
        name: name.to_string(),
        entries: HashMap::new(),
      });
      let last = partitions.len() - 1;
      &mut partitions[last]
    }
  }
}

impl CacheStorage for MemoryStorage {
  fn open(&self, partition: &str) -> Result<()> {
    let mut partitions = lock(&self.partitions)?;
    partition_mut(&mut partitions, partition);
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let partitions = lock(&self.partitions)?;
    Ok(partitions.iter().map(|p| p.name.clone()).collect())
  }

  fn delete(&self, partition: &str) -> Result<bool> {
    let mut partitions = lock(&self.partitions)?;
    let before = partitions.len();
    partitions.retain(|p| p.name != partition);
    Ok(partitions.len() != before)
  }

  fn match_in(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let partitions = lock(&self.partitions)?;
    Ok(
      partitions
        .iter()
        .find(|p| p.name == partition)
        .and_then(|p| p.lookup(key)),
    )
  }

  fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let partitions = lock(&self.partitions)?;
    Ok(partitions.iter().find_map(|p| p.lookup(key)))
  }

  fn put(&self, partition: &str, entry: &StoredEntry) -> Result<()> {
    self.put_all(partition, std::slice::from_ref(entry))
  }

  fn put_all(&self, partition: &str, entries: &[StoredEntry]) -> Result<()> {
    let mut partitions = lock(&self.partitions)?;
    let target = partition_mut(&mut partitions, partition);
    let cached_at = Utc::now();
    for entry in entries {
      target.entries.insert(
        entry.key_hash.clone(),
        MemoryEntry {
          entry: entry.clone(),
          cached_at,
        },
      );
    }
    Ok(())
  }

  fn entries(&self, partition: &str) -> Result<Vec<EntrySummary>> {
    let partitions = lock(&self.partitions)?;
    let mut rows: Vec<EntrySummary> = partitions
      .iter()
      .filter(|p| p.name == partition)
      .flat_map(|p| p.entries.values())
      .map(|e| EntrySummary {
        method: e.entry.method.clone(),
        url: e.entry.url.clone(),
        status: e.entry.response.status,
        size: e.entry.response.body.len(),
        cached_at: e.cached_at,
      })
      .collect();
    rows.sort_by(|a, b| a.url.cmp(&b.url));
    Ok(rows)
  }
}

// ============================================================================
// SQLite storage
// ============================================================================

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("sawmill-offline").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = lock(&self.conn)?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Named partitions, in creation order
CREATE TABLE IF NOT EXISTS partitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots
CREATE TABLE IF NOT EXISTS entries (
    partition_id INTEGER NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    vary TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    response_url TEXT,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (partition_id, key_hash),
    FOREIGN KEY (partition_id) REFERENCES partitions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_key ON entries(key_hash);
"#;

/// Columns needed to rebuild a cached response.
struct EntryRow {
  partition: String,
  vary: String,
  status: u16,
  headers: String,
  body: Vec<u8>,
  response_url: Option<String>,
  cached_at: String,
}

impl EntryRow {
  const COLUMNS: &'static str =
    "p.name, e.vary, e.status, e.headers, e.body, e.response_url, e.cached_at";

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      partition: row.get(0)?,
      vary: row.get(1)?,
      status: row.get(2)?,
      headers: row.get(3)?,
      body: row.get(4)?,
      response_url: row.get(5)?,
      cached_at: row.get(6)?,
    })
  }

  fn into_cached(self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let vary: Vec<VaryValue> =
      serde_json::from_str(&self.vary).map_err(|e| eyre!("Failed to parse vary data: {}", e))?;
    if !vary_matches(&vary, key) {
      return Ok(None);
    }

    let pairs: Vec<(String, String)> = serde_json::from_str(&self.headers)
      .map_err(|e| eyre!("Failed to parse cached headers: {}", e))?;

    let mut response = Response::new(self.status, headers_from_pairs(&pairs), self.body);
    response.url = self.response_url;

    Ok(Some(CachedResponse {
      response,
      partition: self.partition,
      cached_at: parse_datetime(&self.cached_at)?,
    }))
  }
}

fn insert_entry(conn: &Connection, partition_id: i64, entry: &StoredEntry) -> Result<()> {
  let vary =
    serde_json::to_string(&entry.vary).map_err(|e| eyre!("Failed to serialize vary: {}", e))?;
  let headers = serde_json::to_string(&headers_to_pairs(&entry.response.headers))
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO entries
         (partition_id, key_hash, method, url, vary, status, headers, body, response_url, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        partition_id,
        entry.key_hash,
        entry.method,
        entry.url,
        vary,
        entry.response.status,
        headers,
        entry.response.body.as_ref(),
        entry.response.url,
      ],
    )
    .map_err(|e| eyre!("Failed to store entry for {}: {}", entry.url, e))?;

  Ok(())
}

/// Get or create the partition row id.
fn partition_id(conn: &Connection, partition: &str) -> Result<i64> {
  conn
    .execute(
      "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
      params![partition],
    )
    .map_err(|e| eyre!("Failed to create partition {}: {}", partition, e))?;

  conn
    .query_row(
      "SELECT id FROM partitions WHERE name = ?",
      params![partition],
      |row| row.get(0),
    )
    .map_err(|e| eyre!("Failed to look up partition {}: {}", partition, e))
}

impl CacheStorage for SqliteStorage {
  fn open(&self, partition: &str) -> Result<()> {
    let conn = lock(&self.conn)?;
    partition_id(&conn, partition)?;
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = lock(&self.conn)?;

    let mut stmt = conn
      .prepare("SELECT name FROM partitions ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list partitions: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read partition name: {}", e))?;

    Ok(names)
  }

  fn delete(&self, partition: &str) -> Result<bool> {
    let mut conn = lock(&self.conn)?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM entries WHERE partition_id IN (SELECT id FROM partitions WHERE name = ?)",
      params![partition],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", partition, e))?;

    let removed = tx
      .execute("DELETE FROM partitions WHERE name = ?", params![partition])
      .map_err(|e| eyre!("Failed to delete partition {}: {}", partition, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn match_in(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    if !key.is_cacheable() {
      return Ok(None);
    }
    let conn = lock(&self.conn)?;

    let row = conn
      .query_row(
        &format!(
          "SELECT {} FROM entries e
           INNER JOIN partitions p ON p.id = e.partition_id
           WHERE p.name = ? AND e.key_hash = ?",
          EntryRow::COLUMNS
        ),
        params![partition, key.cache_hash()],
        EntryRow::from_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to query partition {}: {}", partition, e))?;

    match row {
      Some(row) => row.into_cached(key),
      None => Ok(None),
    }
  }

  fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    if !key.is_cacheable() {
      return Ok(None);
    }
    let conn = lock(&self.conn)?;

    let mut stmt = conn
      .prepare(&format!(
        "SELECT {} FROM entries e
         INNER JOIN partitions p ON p.id = e.partition_id
         WHERE e.key_hash = ?
         ORDER BY p.id",
        EntryRow::COLUMNS
      ))
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map(params![key.cache_hash()], EntryRow::from_row)
      .map_err(|e| eyre!("Failed to query entries: {}", e))?
      .collect::<rusqlite::Result<Vec<EntryRow>>>()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    for row in rows {
      if let Some(hit) = row.into_cached(key)? {
        return Ok(Some(hit));
      }
    }

    Ok(None)
  }

  fn put(&self, partition: &str, entry: &StoredEntry) -> Result<()> {
    self.put_all(partition, std::slice::from_ref(entry))
  }

  fn put_all(&self, partition: &str, entries: &[StoredEntry]) -> Result<()> {
    let mut conn = lock(&self.conn)?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let id = partition_id(&tx, partition)?;
    for entry in entries {
      insert_entry(&tx, id, entry)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn entries(&self, partition: &str) -> Result<Vec<EntrySummary>> {
    let conn = lock(&self.conn)?;

    let mut stmt = conn
      .prepare(
        "SELECT e.method, e.url, e.status, length(e.body), e.cached_at FROM entries e
         INNER JOIN partitions p ON p.id = e.partition_id
         WHERE p.name = ?
         ORDER BY e.url",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map(params![partition], |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, u16>(2)?,
          row.get::<_, i64>(3)?,
          row.get::<_, String>(4)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query entries: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    rows
      .into_iter()
      .map(|(method, url, status, size, cached_at)| {
        Ok(EntrySummary {
          method,
          url,
          status,
          size: usize::try_from(size).unwrap_or_default(),
          cached_at: parse_datetime(&cached_at)?,
        })
      })
      .collect()
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::Request;
  use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE, VARY};
  use reqwest::Method;

  fn entry(url: &str, body: &'static str) -> (RequestKey, StoredEntry) {
    let key = RequestKey::from_request(&Request::get(url));
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    let stored = StoredEntry::new(&key, &Response::new(200, headers, body)).unwrap();
    (key, stored)
  }

  fn backends() -> Vec<(&'static str, Box<dyn CacheStorage>)> {
    vec![
      ("memory", Box::new(MemoryStorage::new())),
      ("sqlite", Box::new(SqliteStorage::open_in_memory().unwrap())),
    ]
  }

  #[test]
  fn test_open_keeps_creation_order() {
    for (name, storage) in backends() {
      storage.open("app-static-v1").unwrap();
      storage.open("app-runtime-v1").unwrap();
      storage.open("app-static-v1").unwrap();
      assert_eq!(
        storage.keys().unwrap(),
        vec!["app-static-v1", "app-runtime-v1"],
        "{}",
        name
      );
    }
  }

  #[test]
  fn test_put_then_match() {
    for (name, storage) in backends() {
      let (key, stored) = entry("https://app.example/app.js", "console.log(1)");
      storage.put("app-runtime-v1", &stored).unwrap();

      let hit = storage.match_in("app-runtime-v1", &key).unwrap().unwrap();
      assert_eq!(hit.response.body.as_ref(), b"console.log(1)", "{}", name);
      assert_eq!(hit.response.status, 200);
      assert_eq!(hit.response.headers.get(CONTENT_TYPE).unwrap(), "text/plain");
      assert_eq!(hit.partition, "app-runtime-v1");

      assert!(storage.match_in("app-static-v1", &key).unwrap().is_none());
      assert!(storage.match_any(&key).unwrap().is_some());
    }
  }

  #[test]
  fn test_put_replaces_existing_entry() {
    for (name, storage) in backends() {
      let (key, first) = entry("https://app.example/a", "one");
      let (_, second) = entry("https://app.example/a", "two");
      storage.put("p", &first).unwrap();
      storage.put("p", &second).unwrap();

      let hit = storage.match_in("p", &key).unwrap().unwrap();
      assert_eq!(hit.response.body.as_ref(), b"two", "{}", name);
      assert_eq!(storage.entries("p").unwrap().len(), 1);
    }
  }

  #[test]
  fn test_match_any_prefers_earlier_partition() {
    for (name, storage) in backends() {
      let (key, older) = entry("https://app.example/a", "static");
      let (_, newer) = entry("https://app.example/a", "runtime");
      storage.open("static").unwrap();
      storage.open("runtime").unwrap();
      storage.put("runtime", &newer).unwrap();
      storage.put("static", &older).unwrap();

      let hit = storage.match_any(&key).unwrap().unwrap();
      assert_eq!(hit.partition, "static", "{}", name);
    }
  }

  #[test]
  fn test_delete_removes_entries() {
    for (name, storage) in backends() {
      let (key, stored) = entry("https://app.example/a", "x");
      storage.put("old", &stored).unwrap();

      assert!(storage.delete("old").unwrap(), "{}", name);
      assert!(!storage.delete("old").unwrap());
      assert!(storage.keys().unwrap().is_empty());
      assert!(storage.match_any(&key).unwrap().is_none());

      // Recreated partition starts empty
      storage.open("old").unwrap();
      assert!(storage.match_in("old", &key).unwrap().is_none());
    }
  }

  #[test]
  fn test_non_get_never_matches() {
    for (name, storage) in backends() {
      let (_, stored) = entry("https://app.example/a", "x");
      storage.put("p", &stored).unwrap();

      let head = RequestKey::from_request(&Request::new(Method::POST, "https://app.example/a"));
      assert!(storage.match_any(&head).unwrap().is_none(), "{}", name);
    }
  }

  #[test]
  fn test_vary_mismatch_is_a_miss() {
    for (name, storage) in backends() {
      let request = Request::get("https://app.example/greeting")
        .with_header(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
      let key = RequestKey::from_request(&request);
      let mut headers = HeaderMap::new();
      headers.insert(VARY, HeaderValue::from_static("accept-language"));
      let stored = StoredEntry::new(&key, &Response::new(200, headers, "hello")).unwrap();
      storage.put("p", &stored).unwrap();

      assert!(storage.match_any(&key).unwrap().is_some(), "{}", name);

      let german = RequestKey::from_request(
        &Request::get("https://app.example/greeting")
          .with_header(ACCEPT_LANGUAGE, HeaderValue::from_static("de")),
      );
      assert!(storage.match_any(&german).unwrap().is_none(), "{}", name);
    }
  }

  #[test]
  fn test_entries_listing() {
    for (name, storage) in backends() {
      let (_, b) = entry("https://app.example/b", "bbbb");
      let (_, a) = entry("https://app.example/a", "aa");
      storage.put_all("p", &[b, a]).unwrap();

      let rows = storage.entries("p").unwrap();
      assert_eq!(rows.len(), 2, "{}", name);
      assert_eq!(rows[0].url, "https://app.example/a");
      assert_eq!(rows[0].size, 2);
      assert_eq!(rows[1].size, 4);
      assert_eq!(rows[1].method, "GET");
    }
  }

  #[test]
  fn test_sqlite_put_all_rolls_back_on_failure() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.open("sawmill-static-v1").unwrap();
    lock(&storage.conn)
      .unwrap()
      .execute_batch(
        "CREATE TRIGGER reject_entry BEFORE INSERT ON entries
         WHEN NEW.url LIKE '%fail%'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
      )
      .unwrap();

    let (ok_key, ok) = entry("https://app.example/index.html", "<html>");
    let (_, bad) = entry("https://app.example/fail.js", "boom");

    assert!(storage.put_all("sawmill-static-v1", &[ok, bad]).is_err());
    assert!(storage.entries("sawmill-static-v1").unwrap().is_empty());
    assert!(storage.match_any(&ok_key).unwrap().is_none());
    assert_eq!(storage.keys().unwrap(), vec!["sawmill-static-v1"]);
  }

  #[test]
  fn test_sqlite_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    let (key, stored) = entry("https://app.example/index.html", "<html></html>");

    {
      let storage = SqliteStorage::open(Some(&path)).unwrap();
      storage.put("sawmill-static-v1", &stored).unwrap();
    }

    let storage = SqliteStorage::open(Some(&path)).unwrap();
    assert_eq!(storage.keys().unwrap(), vec!["sawmill-static-v1"]);
    let hit = storage.match_any(&key).unwrap().unwrap();
    assert_eq!(hit.response.body.as_ref(), b"<html></html>");
  }
}
