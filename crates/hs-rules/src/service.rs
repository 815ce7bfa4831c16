//! Rule service for user-facing flows
//!
//! Enforces the checks the store itself does not (empty values, duplicate
//! entries) and runs SQLite work on the blocking pool. A write that has been
//! handed to the pool runs to completion even if the awaiting caller is
//! cancelled; batches commit row by row.

use crate::rule::{Rule, RuleId, RuleType};
use crate::rule_file;
use crate::store::{RuleStore, StoreError};
use std::collections::HashSet;
use std::io::{BufReader, Read, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a rule file import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Valid rule lines read from the file
    pub parsed: usize,
    /// Rules added to the store
    pub inserted: usize,
    /// Lines already present in the store or repeated in the file
    pub skipped: usize,
}

/// Async façade over [`RuleStore`]
#[derive(Clone)]
pub struct RuleService {
    store: Arc<RuleStore>,
}

impl RuleService {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Add a rule after rejecting empty values and existing entries
    pub async fn add_rule(&self, rule_type: RuleType, value: &str) -> Result<RuleId, StoreError> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(StoreError::EmptyValue);
        }
        self.run_blocking(move |store| {
            if store.exists_exact_typed(rule_type, &value)? {
                return Err(StoreError::DuplicateRule { rule_type, value });
            }
            store.insert(&Rule::new(rule_type, value))
        })
        .await
    }

    /// Replace an existing rule's type and value
    pub async fn update_rule(&self, rule: Rule) -> Result<usize, StoreError> {
        let rule = Rule::with_id(rule.id, rule.rule_type, rule.value.trim());
        if rule.value.is_empty() {
            return Err(StoreError::EmptyValue);
        }
        self.run_blocking(move |store| store.update(&rule)).await
    }

    pub async fn remove_rule(&self, id: RuleId) -> Result<usize, StoreError> {
        self.run_blocking(move |store| store.delete_by_id(id)).await
    }

    pub async fn remove_rules(&self, rules: Vec<Rule>) -> Result<usize, StoreError> {
        self.run_blocking(move |store| store.delete_batch(&rules)).await
    }

    pub async fn clear(&self) -> Result<usize, StoreError> {
        self.run_blocking(|store| store.delete_all()).await
    }

    /// Import a rule file, skipping entries the store already has
    pub async fn import_from<R>(&self, reader: R) -> Result<ImportSummary, StoreError>
    where
        R: Read + Send + 'static,
    {
        self.run_blocking(move |store| {
            let parsed = rule_file::read_rules(BufReader::new(reader))?;
            let snapshot = store.snapshot();

            let mut seen = HashSet::new();
            let fresh: Vec<Rule> = parsed
                .iter()
                .filter(|rule| !rule.value.is_empty())
                .filter(|rule| !snapshot.contains_entry(rule.rule_type, &rule.value))
                .filter(|rule| seen.insert((rule.rule_type, rule.value.clone())))
                .cloned()
                .collect();

            let inserted = if fresh.is_empty() {
                debug!("Import found nothing new");
                0
            } else {
                store.insert_batch(&fresh)?.len()
            };

            let summary = ImportSummary {
                parsed: parsed.len(),
                inserted,
                skipped: parsed.len() - inserted,
            };
            info!(
                "Imported {} of {} rules ({} skipped)",
                summary.inserted, summary.parsed, summary.skipped
            );
            Ok(summary)
        })
        .await
    }

    /// Export the current rules, returning the number of lines written
    pub async fn export_to<W>(&self, writer: W) -> Result<usize, StoreError>
    where
        W: Write + Send + 'static,
    {
        self.run_blocking(move |store| {
            let rules = store.list_all()?;
            let written = rule_file::write_rules(writer, &rules)?;
            info!("Exported {} rules", written);
            Ok(written)
        })
        .await
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&RuleStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn service() -> RuleService {
        RuleService::new(Arc::new(RuleStore::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_add_rejects_empty_and_duplicates() {
        let service = service();

        assert!(matches!(
            service.add_rule(RuleType::KeyWord, "   ").await,
            Err(StoreError::EmptyValue)
        ));

        service.add_rule(RuleType::Domain, "ads.com").await.unwrap();
        assert!(matches!(
            service.add_rule(RuleType::Domain, " ads.com ").await,
            Err(StoreError::DuplicateRule { .. })
        ));

        // Same value under another type is a different entry
        service.add_rule(RuleType::KeyWord, "ads.com").await.unwrap();
        assert_eq!(service.store().list_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_skips_existing_and_repeats() {
        let service = service();
        service.add_rule(RuleType::Domain, "a.com").await.unwrap();

        let file = "Domain, a.com\nURL, https://b/\nURL, https://b/\nbogus line\nKeyWord, c\n";
        let summary = service.import_from(Cursor::new(file.to_string())).await.unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                parsed: 4,
                inserted: 2,
                skipped: 2
            }
        );
        assert_eq!(service.store().list_all().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_export_round_trip() {
        let service = service();
        service.add_rule(RuleType::KeyWord, "banner").await.unwrap();
        service.add_rule(RuleType::Domain, "ads.com").await.unwrap();
        service
            .add_rule(RuleType::Url, "https://cdn.example.com/a,b")
            .await
            .unwrap();

        let buffer = Arc::new(std::sync::Mutex::new(Vec::new()));
        struct Shared(Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        assert_eq!(service.export_to(Shared(Arc::clone(&buffer))).await.unwrap(), 3);
        let text = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(
            text,
            "Domain, ads.com\nKeyWord, banner\nURL, https://cdn.example.com/a,b\n"
        );

        let fresh = RuleService::new(Arc::new(RuleStore::open_in_memory().unwrap()));
        let summary = fresh.import_from(Cursor::new(text)).await.unwrap();
        assert_eq!(summary.inserted, 3);
        assert!(fresh
            .store()
            .exists_exact_typed(RuleType::Url, "https://cdn.example.com/a,b")
            .unwrap());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let service = service();
        let a = service.add_rule(RuleType::Domain, "a.com").await.unwrap();
        let b = service.add_rule(RuleType::Domain, "b.com").await.unwrap();
        service.add_rule(RuleType::Domain, "c.com").await.unwrap();

        assert_eq!(service.remove_rule(a).await.unwrap(), 1);
        let rules = vec![Rule::with_id(b, RuleType::Domain, "b.com")];
        assert_eq!(service.remove_rules(rules).await.unwrap(), 1);
        assert_eq!(service.clear().await.unwrap(), 1);
        assert_eq!(service.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_empty() {
        let service = service();
        let id = service.add_rule(RuleType::Domain, "a.com").await.unwrap();
        assert!(matches!(
            service.update_rule(Rule::with_id(id, RuleType::Domain, "")).await,
            Err(StoreError::EmptyValue)
        ));
        assert_eq!(
            service
                .update_rule(Rule::with_id(id, RuleType::Url, "https://a.com/"))
                .await
                .unwrap(),
            1
        );
    }
}
