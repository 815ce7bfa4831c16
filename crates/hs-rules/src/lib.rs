//! HookShield Rule Engine
//!
//! User-maintained block rules and the per-request matching engine.
//!
//! Architecture:
//! 1. Rules live in a SQLite `url_info` table (the durable contract)
//! 2. Every committed mutation rebuilds an immutable [`RuleSnapshot`]
//! 3. The snapshot is swapped in atomically; matchers only ever read snapshots
//! 4. Matching order is fixed: Domain, then URL prefix, then KeyWord substring

mod feed;
mod matcher;
mod rule;
pub mod rule_file;
mod service;
mod snapshot;
mod store;

pub use feed::RuleFeed;
pub use matcher::{MatchDecision, RuleMatcher};
pub use rule::{ParseRuleTypeError, Rule, RuleId, RuleType};
pub use service::{ImportSummary, RuleService};
pub use snapshot::{RuleSnapshot, SnapshotCell};
pub use store::{RuleStore, StoreError};
