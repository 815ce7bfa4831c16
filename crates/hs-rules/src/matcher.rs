//! Rule Matching Engine
//!
//! This is the hot path - every intercepted request goes through here.
//! Each call loads exactly one snapshot and answers from it, so a decision
//! is always consistent even while rules are being edited.

use crate::rule::Rule;
use crate::snapshot::{RuleSnapshot, SnapshotCell};
use std::sync::Arc;
use tracing::trace;

/// Outcome of a match together with the snapshot it was computed against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDecision {
    /// Generation of the snapshot that produced this decision
    pub generation: u64,
    /// The rule that fired, if any
    pub rule: Option<Rule>,
}

impl MatchDecision {
    pub fn is_blocked(&self) -> bool {
        self.rule.is_some()
    }
}

/// Block/allow decisions over the currently published rules
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    snapshots: Arc<SnapshotCell>,
}

impl RuleMatcher {
    pub fn new(snapshots: Arc<SnapshotCell>) -> Self {
        Self { snapshots }
    }

    /// Snapshot the next call would read
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.snapshots.load()
    }

    /// First matching rule: Domain, then URL prefix, then KeyWord
    pub fn find_match(&self, full_url: &str, host: &str) -> Option<Rule> {
        self.snapshots.load().find_match(full_url, host).cloned()
    }

    /// Yes/no answer for the per-request hot path
    #[inline]
    pub fn exists_match(&self, full_url: &str, host: &str) -> bool {
        let hit = self.snapshots.load().exists_match(full_url, host);
        trace!("exists_match {} ({}) -> {}", full_url, host, hit);
        hit
    }

    /// Matched rule plus the generation it was read from
    pub fn decide(&self, full_url: &str, host: &str) -> MatchDecision {
        let snapshot = self.snapshots.load();
        MatchDecision {
            generation: snapshot.generation(),
            rule: snapshot.find_match(full_url, host).cloned(),
        }
    }

    pub fn find_domain_match(&self, host: &str) -> Option<Rule> {
        self.snapshots.load().find_domain_match(host).cloned()
    }

    pub fn find_url_match(&self, full_url: &str) -> Option<Rule> {
        self.snapshots.load().find_url_match(full_url).cloned()
    }

    pub fn find_keyword_match(&self, full_url: &str) -> Option<Rule> {
        self.snapshots.load().find_keyword_match(full_url).cloned()
    }

    pub fn exists_domain_match(&self, host: &str) -> bool {
        self.snapshots.load().exists_domain_match(host)
    }

    pub fn exists_url_match(&self, full_url: &str) -> bool {
        self.snapshots.load().exists_url_match(full_url)
    }

    pub fn exists_keyword_match(&self, full_url: &str) -> bool {
        self.snapshots.load().exists_keyword_match(full_url)
    }
}
