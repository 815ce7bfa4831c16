//! Durable Rule Store
//!
//! SQLite-backed `url_info(id, type, url)` table. Every write commits row by
//! row; after any committed change the store rebuilds a [`RuleSnapshot`],
//! publishes it to the shared [`SnapshotCell`] and notifies feed subscribers.
//!
//! A committed write is reported as success even if the rebuild fails; the
//! previous snapshot stays published until the next successful rebuild.

use crate::feed::RuleFeed;
use crate::rule::{Rule, RuleId, RuleType};
use crate::snapshot::{RuleSnapshot, SnapshotCell};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS url_info (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        url  TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_url_info_type_url ON url_info (type, url);
";

/// Rule store and rule service errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Rule already exists: {rule_type}, {value}")]
    DuplicateRule { rule_type: RuleType, value: String },

    #[error("Rule value is empty")]
    EmptyValue,

    #[error("Invalid rule type: {0}")]
    InvalidRuleType(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(String),
}

/// Durable table of block rules
pub struct RuleStore {
    conn: Mutex<Connection>,
    snapshots: Arc<SnapshotCell>,
    feed: watch::Sender<Arc<RuleSnapshot>>,
    generation: AtomicU64,
}

impl RuleStore {
    /// Open (or create) the rule database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!("Opened rule database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Volatile store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let rules = load_rules(&conn)?;
        let snapshot = Arc::new(RuleSnapshot::build(1, rules));
        info!("Rule store ready: {} rules", snapshot.len());

        let (feed, _) = watch::channel(Arc::clone(&snapshot));
        Ok(Self {
            conn: Mutex::new(conn),
            snapshots: Arc::new(SnapshotCell::new_shared(snapshot)),
            feed,
            generation: AtomicU64::new(1),
        })
    }

    /// Shared snapshot slot, handed to matchers at construction
    pub fn snapshots(&self) -> Arc<SnapshotCell> {
        Arc::clone(&self.snapshots)
    }

    /// Currently published snapshot
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.snapshots.load()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a rule and return its new identity
    pub fn insert(&self, rule: &Rule) -> Result<RuleId, StoreError> {
        let conn = self.lock();
        let id = insert_row(&conn, rule)?;
        debug!("Inserted rule #{} {}: {}", id, rule.rule_type, rule.value);
        self.republish(&conn);
        Ok(id)
    }

    /// Insert rules one row at a time
    ///
    /// Not atomic: rows written before a failure stay committed and visible.
    pub fn insert_batch(&self, rules: &[Rule]) -> Result<Vec<RuleId>, StoreError> {
        let conn = self.lock();
        let mut ids = Vec::with_capacity(rules.len());
        let mut failure = None;
        for rule in rules {
            match insert_row(&conn, rule) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!("Batch insert stopped after {} rows: {}", ids.len(), e);
                    failure = Some(e);
                    break;
                }
            }
        }
        if !ids.is_empty() {
            self.republish(&conn);
        }
        match failure {
            Some(e) => Err(e.into()),
            None => {
                info!("Inserted {} rules", ids.len());
                Ok(ids)
            }
        }
    }

    /// Replace type and value of the rule with `rule.id`; 0 when absent
    pub fn update(&self, rule: &Rule) -> Result<usize, StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE url_info SET type = ?1, url = ?2 WHERE id = ?3",
            params![rule.rule_type.as_str(), rule.value, rule.id],
        )?;
        Ok(self.after_write(&conn, changed))
    }

    pub fn delete_by_id(&self, id: RuleId) -> Result<usize, StoreError> {
        let conn = self.lock();
        let changed = conn.execute("DELETE FROM url_info WHERE id = ?1", params![id])?;
        Ok(self.after_write(&conn, changed))
    }

    /// Delete by identity
    pub fn delete(&self, rule: &Rule) -> Result<usize, StoreError> {
        self.delete_by_id(rule.id)
    }

    /// Delete each rule by identity, one row at a time
    pub fn delete_batch(&self, rules: &[Rule]) -> Result<usize, StoreError> {
        let conn = self.lock();
        let mut changed = 0;
        let mut failure = None;
        for rule in rules {
            match conn.execute("DELETE FROM url_info WHERE id = ?1", params![rule.id]) {
                Ok(n) => changed += n,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.after_write(&conn, changed);
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(changed),
        }
    }

    /// Delete every rule with this exact `(type, value)`
    pub fn delete_by_value(&self, rule_type: RuleType, value: &str) -> Result<usize, StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "DELETE FROM url_info WHERE type = ?1 AND url = ?2",
            params![rule_type.as_str(), value],
        )?;
        Ok(self.after_write(&conn, changed))
    }

    pub fn delete_all(&self) -> Result<usize, StoreError> {
        let conn = self.lock();
        let changed = conn.execute("DELETE FROM url_info", [])?;
        info!("Cleared {} rules", changed);
        Ok(self.after_write(&conn, changed))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All rules from durable storage, most recent first
    pub fn list_all(&self) -> Result<Vec<Rule>, StoreError> {
        load_rules(&self.lock())
    }

    /// Live full list
    pub fn observe_all(&self) -> RuleFeed {
        RuleFeed::new(self.feed.subscribe(), None)
    }

    /// Live list filtered by substring over value and type
    pub fn search(&self, text: &str) -> RuleFeed {
        RuleFeed::new(self.feed.subscribe(), Some(text.to_string()))
    }

    /// Whether any rule of any type has this value
    pub fn exists_exact(&self, value: &str) -> Result<bool, StoreError> {
        let conn = self.lock();
        let exists = conn.query_row(
            "SELECT COUNT(*) > 0 FROM url_info WHERE url = ?1",
            params![value],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Whether a rule with this exact `(type, value)` exists
    pub fn exists_exact_typed(&self, rule_type: RuleType, value: &str) -> Result<bool, StoreError> {
        let conn = self.lock();
        let exists = conn.query_row(
            "SELECT COUNT(*) > 0 FROM url_info WHERE type = ?1 AND url = ?2",
            params![rule_type.as_str(), value],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // =========================================================================
    // Publication
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn after_write(&self, conn: &Connection, changed: usize) -> usize {
        if changed > 0 {
            self.republish(conn);
        }
        changed
    }

    /// Rebuild from the table and publish. Called with the connection lock
    /// held, so generations are published in commit order.
    fn republish(&self, conn: &Connection) {
        let rules = match load_rules(conn) {
            Ok(rules) => rules,
            Err(e) => {
                warn!("Rule snapshot not rebuilt after commit: {}", e);
                return;
            }
        };
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = Arc::new(RuleSnapshot::build(generation, rules));
        self.snapshots.publish(Arc::clone(&snapshot));
        self.feed.send_replace(snapshot);
    }
}

fn insert_row(conn: &Connection, rule: &Rule) -> rusqlite::Result<RuleId> {
    conn.execute(
        "INSERT INTO url_info (type, url) VALUES (?1, ?2)",
        params![rule.rule_type.as_str(), rule.value],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Read the table newest first; rows with an unknown type are skipped
fn load_rules(conn: &Connection) -> Result<Vec<Rule>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, type, url FROM url_info ORDER BY id DESC")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, RuleId>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut rules = Vec::new();
    for row in rows {
        let (id, type_text, value) = row?;
        match type_text.parse::<RuleType>() {
            Ok(rule_type) => rules.push(Rule::with_id(id, rule_type, value)),
            Err(e) => warn!("Skipping rule #{}: {}", id, e),
        }
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> RuleStore {
        RuleStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_then_list() {
        let store = store();
        let id = store.insert(&Rule::new(RuleType::Domain, "ads.example.com")).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert!(all[0].same_entry(&Rule::new(RuleType::Domain, "ads.example.com")));
    }

    #[test]
    fn test_delete_by_id_excludes_rule() {
        let store = store();
        let keep = store.insert(&Rule::new(RuleType::Url, "https://a/")).unwrap();
        let gone = store.insert(&Rule::new(RuleType::Url, "https://b/")).unwrap();

        assert_eq!(store.delete_by_id(gone).unwrap(), 1);
        let ids: Vec<_> = store.list_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![keep]);
        assert_eq!(store.delete_by_id(gone).unwrap(), 0);
    }

    #[test]
    fn test_delete_by_identity() {
        let store = store();
        let id = store.insert(&Rule::new(RuleType::Domain, "ads.example.com")).unwrap();
        let twin = store.insert(&Rule::new(RuleType::Domain, "ads.example.com")).unwrap();

        let rule = Rule::with_id(id, RuleType::Domain, "ads.example.com");
        assert_eq!(store.delete(&rule).unwrap(), 1);
        assert_eq!(store.delete(&rule).unwrap(), 0);

        let ids: Vec<_> = store.list_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![twin]);
        assert!(store.snapshot().exists_domain_match("ads.example.com"));
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let store = store();
        let first = store.insert(&Rule::new(RuleType::KeyWord, "a")).unwrap();
        store.delete_by_id(first).unwrap();
        let second = store.insert(&Rule::new(RuleType::KeyWord, "b")).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let store = store();
        store.insert(&Rule::new(RuleType::KeyWord, "first")).unwrap();
        store.insert(&Rule::new(RuleType::KeyWord, "second")).unwrap();

        let values: Vec<_> = store.list_all().unwrap().into_iter().map(|r| r.value).collect();
        assert_eq!(values, vec!["second", "first"]);
    }

    #[test]
    fn test_delete_all_twice() {
        let store = store();
        store
            .insert_batch(&[
                Rule::new(RuleType::Domain, "a.com"),
                Rule::new(RuleType::Domain, "b.com"),
            ])
            .unwrap();

        assert_eq!(store.delete_all().unwrap(), 2);
        assert_eq!(store.delete_all().unwrap(), 0);
        assert!(store.list_all().unwrap().is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_update_preserves_identity() {
        let store = store();
        let id = store.insert(&Rule::new(RuleType::Domain, "old.com")).unwrap();

        let changed = store
            .update(&Rule::with_id(id, RuleType::KeyWord, "new"))
            .unwrap();
        assert_eq!(changed, 1);

        let all = store.list_all().unwrap();
        assert_eq!(all, vec![Rule::with_id(id, RuleType::KeyWord, "new")]);

        assert_eq!(store.update(&Rule::with_id(999, RuleType::Domain, "x")).unwrap(), 0);
    }

    #[test]
    fn test_exists_checks() {
        let store = store();
        store.insert(&Rule::new(RuleType::Url, "https://t.com/px")).unwrap();

        assert!(store.exists_exact("https://t.com/px").unwrap());
        assert!(store.exists_exact_typed(RuleType::Url, "https://t.com/px").unwrap());
        assert!(!store.exists_exact_typed(RuleType::KeyWord, "https://t.com/px").unwrap());
        assert!(!store.exists_exact("nope").unwrap());
    }

    #[test]
    fn test_store_permits_duplicates() {
        let store = store();
        store.insert(&Rule::new(RuleType::Domain, "dup.com")).unwrap();
        store.insert(&Rule::new(RuleType::Domain, "dup.com")).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 2);

        assert_eq!(store.delete_by_value(RuleType::Domain, "dup.com").unwrap(), 2);
    }

    #[test]
    fn test_delete_batch_counts_rows() {
        let store = store();
        let ids = store
            .insert_batch(&[
                Rule::new(RuleType::KeyWord, "a"),
                Rule::new(RuleType::KeyWord, "b"),
                Rule::new(RuleType::KeyWord, "c"),
            ])
            .unwrap();

        let victims = vec![
            Rule::with_id(ids[0], RuleType::KeyWord, "a"),
            Rule::with_id(ids[2], RuleType::KeyWord, "c"),
            Rule::with_id(12345, RuleType::KeyWord, "missing"),
        ];
        assert_eq!(store.delete_batch(&victims).unwrap(), 2);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_follows_writes() {
        let store = store();
        let before = store.snapshot();
        store.insert(&Rule::new(RuleType::Domain, "ads.com")).unwrap();
        let after = store.snapshot();

        assert!(after.generation() > before.generation());
        assert!(after.exists_domain_match("ads.com"));
        assert!(!before.exists_domain_match("ads.com"));
    }

    #[test]
    fn test_feed_replays_then_follows() {
        let store = store();
        store.insert(&Rule::new(RuleType::Domain, "one.com")).unwrap();

        let mut feed = store.observe_all();
        assert_eq!(feed.try_next().unwrap().len(), 1);
        assert!(feed.try_next().is_none());

        store.insert(&Rule::new(RuleType::Domain, "two.com")).unwrap();
        let update = feed.try_next().unwrap();
        assert_eq!(update[0].value, "two.com");

        // A fresh subscription starts from the current contents
        let mut again = store.observe_all();
        assert_eq!(again.try_next().unwrap().len(), 2);
    }

    #[test]
    fn test_search_feed_filters() {
        let store = store();
        store.insert(&Rule::new(RuleType::Domain, "ads.example.com")).unwrap();
        store.insert(&Rule::new(RuleType::KeyWord, "banner")).unwrap();

        let mut feed = store.search("EXAMPLE");
        let hits = feed.try_next().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rule_type, RuleType::Domain);
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules").join("rules.db");

        {
            let store = RuleStore::open(&path).unwrap();
            store.insert(&Rule::new(RuleType::KeyWord, "persist")).unwrap();
        }

        let store = RuleStore::open(&path).unwrap();
        assert!(store.snapshot().exists_keyword_match("https://x/persist"));
    }

    #[test]
    fn test_committed_write_survives_failed_rebuild() {
        let store = store();
        store.insert(&Rule::new(RuleType::Domain, "a.com")).unwrap();
        // A blob value cannot be read back as text, so every rebuild fails
        store
            .lock()
            .execute("INSERT INTO url_info (type, url) VALUES ('Domain', X'00')", [])
            .unwrap();
        let before = store.snapshot().generation();

        let id = store.insert(&Rule::new(RuleType::KeyWord, "banner")).unwrap();
        assert!(id > 0);
        assert!(store.exists_exact_typed(RuleType::KeyWord, "banner").unwrap());
        assert_eq!(store.snapshot().generation(), before);
        assert!(!store.snapshot().exists_keyword_match("https://x/banner"));

        assert_eq!(store.delete_by_value(RuleType::KeyWord, "banner").unwrap(), 1);
        assert!(store.list_all().is_err());
    }

    #[test]
    fn test_unknown_type_rows_are_skipped() {
        let store = store();
        store
            .lock()
            .execute("INSERT INTO url_info (type, url) VALUES ('Regex', '.*')", [])
            .unwrap();
        store.insert(&Rule::new(RuleType::Domain, "ok.com")).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, "ok.com");
    }
}
