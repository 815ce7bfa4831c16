//! Immutable rule snapshots
//!
//! A snapshot is built once per committed mutation and never changes
//! afterwards. It carries the three lookup indexes used on the hot path:
//! - Domain: hash map keyed by value (exact equality)
//! - URL: hash map keyed by value plus the set of distinct value lengths,
//!   so a prefix query probes one slice per distinct length
//! - KeyWord: Aho-Corasick automaton over all keyword values
//!
//! Within one strategy the earliest inserted rule (lowest id) wins.

use crate::rule::{Rule, RuleType};
use aho_corasick::AhoCorasick;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Point-in-time view of the rule table
#[derive(Debug)]
pub struct RuleSnapshot {
    /// Monotonic publication number
    generation: u64,
    /// All rules, most recent first
    rules: Vec<Rule>,
    /// Domain value -> index into `rules`
    domains: HashMap<String, usize>,
    /// URL prefix value -> index into `rules`
    url_prefixes: HashMap<String, usize>,
    /// Distinct URL prefix lengths, ascending
    url_lengths: Vec<usize>,
    /// Automaton over keyword values; pattern order is ascending rule id
    keyword_automaton: Option<AhoCorasick>,
    /// Pattern index -> index into `rules`
    keyword_rules: Vec<usize>,
}

impl RuleSnapshot {
    /// Empty snapshot at generation 0
    pub fn empty() -> Self {
        Self::build(0, Vec::new())
    }

    /// Build the indexes. `rules` must be ordered by descending id.
    pub fn build(generation: u64, rules: Vec<Rule>) -> Self {
        let mut domains = HashMap::new();
        let mut url_prefixes = HashMap::new();
        let mut keyword_index: HashMap<&str, usize> = HashMap::new();
        let mut keyword_rules = Vec::new();

        // Walk oldest first so the first insert for a value keeps the lowest id
        for (idx, rule) in rules.iter().enumerate().rev() {
            match rule.rule_type {
                RuleType::Domain => {
                    domains.entry(rule.value.clone()).or_insert(idx);
                }
                RuleType::Url => {
                    url_prefixes.entry(rule.value.clone()).or_insert(idx);
                }
                RuleType::KeyWord => {
                    keyword_index.entry(rule.value.as_str()).or_insert_with(|| {
                        keyword_rules.push(idx);
                        idx
                    });
                }
            }
        }

        let mut url_lengths: Vec<usize> = url_prefixes.keys().map(String::len).collect();
        url_lengths.sort_unstable();
        url_lengths.dedup();

        let keyword_automaton = if keyword_rules.is_empty() {
            None
        } else {
            let patterns = keyword_rules.iter().map(|&idx| rules[idx].value.as_str());
            match AhoCorasick::new(patterns) {
                Ok(automaton) => Some(automaton),
                Err(e) => {
                    // Linear containment scan stays correct, only slower
                    warn!("Keyword automaton build failed, falling back to scan: {}", e);
                    None
                }
            }
        };

        debug!(
            "Built rule snapshot gen {}: {} rules ({} domain, {} url, {} keyword)",
            generation,
            rules.len(),
            domains.len(),
            url_prefixes.len(),
            keyword_rules.len()
        );

        Self {
            generation,
            rules,
            domains,
            url_prefixes,
            url_lengths,
            keyword_automaton,
            keyword_rules,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All rules, most recent first
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose value or type contains `text`, case-insensitive
    pub fn search(&self, text: &str) -> Vec<Rule> {
        let needle = text.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| {
                needle.is_empty()
                    || rule.value.to_lowercase().contains(&needle)
                    || rule.rule_type.as_str().to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Whether an identical `(type, value)` entry is present
    pub fn contains_entry(&self, rule_type: RuleType, value: &str) -> bool {
        match rule_type {
            RuleType::Domain => self.domains.contains_key(value),
            RuleType::Url => self.url_prefixes.contains_key(value),
            RuleType::KeyWord => self
                .keyword_rules
                .iter()
                .any(|&idx| self.rules[idx].value == value),
        }
    }

    // =========================================================================
    // Strategies
    // =========================================================================

    /// First match in priority order: Domain, URL, KeyWord
    pub fn find_match(&self, full_url: &str, host: &str) -> Option<&Rule> {
        self.find_domain_match(host)
            .or_else(|| self.find_url_match(full_url))
            .or_else(|| self.find_keyword_match(full_url))
    }

    /// Same decision as [`find_match`](Self::find_match), without picking a rule
    pub fn exists_match(&self, full_url: &str, host: &str) -> bool {
        self.exists_domain_match(host)
            || self.exists_url_match(full_url)
            || self.exists_keyword_match(full_url)
    }

    pub fn find_domain_match(&self, host: &str) -> Option<&Rule> {
        if host.is_empty() {
            return None;
        }
        self.domains.get(host).map(|&idx| &self.rules[idx])
    }

    pub fn exists_domain_match(&self, host: &str) -> bool {
        !host.is_empty() && self.domains.contains_key(host)
    }

    pub fn find_url_match(&self, full_url: &str) -> Option<&Rule> {
        // Higher index means older rule
        self.url_prefix_hits(full_url)
            .max()
            .map(|idx| &self.rules[idx])
    }

    pub fn exists_url_match(&self, full_url: &str) -> bool {
        self.url_prefix_hits(full_url).next().is_some()
    }

    pub fn find_keyword_match(&self, full_url: &str) -> Option<&Rule> {
        if full_url.is_empty() || self.keyword_rules.is_empty() {
            return None;
        }
        match &self.keyword_automaton {
            Some(automaton) => automaton
                .find_overlapping_iter(full_url)
                .map(|m| m.pattern().as_usize())
                .min()
                .map(|pattern| &self.rules[self.keyword_rules[pattern]]),
            None => self
                .keyword_rules
                .iter()
                .map(|&idx| &self.rules[idx])
                .find(|rule| full_url.contains(rule.value.as_str())),
        }
    }

    pub fn exists_keyword_match(&self, full_url: &str) -> bool {
        if full_url.is_empty() || self.keyword_rules.is_empty() {
            return false;
        }
        match &self.keyword_automaton {
            Some(automaton) => automaton.is_match(full_url),
            None => self
                .keyword_rules
                .iter()
                .any(|&idx| full_url.contains(self.rules[idx].value.as_str())),
        }
    }

    fn url_prefix_hits<'a>(&'a self, full_url: &'a str) -> impl Iterator<Item = usize> + 'a {
        let lengths: &[usize] = if full_url.is_empty() {
            &[]
        } else {
            &self.url_lengths
        };
        lengths
            .iter()
            .take_while(move |&&len| len <= full_url.len())
            .filter(move |&&len| full_url.is_char_boundary(len))
            .filter_map(move |&len| self.url_prefixes.get(&full_url[..len]).copied())
    }
}

/// Shared slot holding the currently published snapshot
///
/// Readers hold the lock only long enough to clone an `Arc`; writers build
/// the next snapshot outside the lock and swap it in.
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<RuleSnapshot>>,
}

impl SnapshotCell {
    pub fn new(snapshot: RuleSnapshot) -> Self {
        Self::new_shared(Arc::new(snapshot))
    }

    pub fn new_shared(snapshot: Arc<RuleSnapshot>) -> Self {
        Self {
            current: RwLock::new(snapshot),
        }
    }

    /// The snapshot visible right now
    #[inline]
    pub fn load(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Make `snapshot` visible to all subsequent loads
    pub fn publish(&self, snapshot: Arc<RuleSnapshot>) {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *slot = snapshot;
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(RuleSnapshot::empty())
    }
}
