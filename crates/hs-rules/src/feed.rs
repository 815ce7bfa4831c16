//! Live rule sequences for list views.

use crate::rule::Rule;
use crate::snapshot::RuleSnapshot;
use std::sync::Arc;
use tokio::sync::watch;

/// Push-style view over the rule table
///
/// The first [`next`](RuleFeed::next) yields the current contents; every later
/// call waits for the next committed mutation. Dropping the feed and
/// subscribing again replays the current contents.
pub struct RuleFeed {
    rx: watch::Receiver<Arc<RuleSnapshot>>,
    /// Case-insensitive search text, `None` for the full list
    filter: Option<String>,
    primed: bool,
}

impl RuleFeed {
    pub(crate) fn new(rx: watch::Receiver<Arc<RuleSnapshot>>, filter: Option<String>) -> Self {
        Self {
            rx,
            filter,
            primed: false,
        }
    }

    /// Current contents without waiting
    pub fn current(&self) -> Vec<Rule> {
        let snapshot = Arc::clone(&self.rx.borrow());
        self.select(&snapshot)
    }

    /// Next list, or `None` once the store is gone
    pub async fn next(&mut self) -> Option<Vec<Rule>> {
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;
        let snapshot = Arc::clone(&self.rx.borrow_and_update());
        Some(self.select(&snapshot))
    }

    /// Non-blocking variant of [`next`](RuleFeed::next)
    pub fn try_next(&mut self) -> Option<Vec<Rule>> {
        if self.primed && !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        self.primed = true;
        let snapshot = Arc::clone(&self.rx.borrow_and_update());
        Some(self.select(&snapshot))
    }

    fn select(&self, snapshot: &RuleSnapshot) -> Vec<Rule> {
        match &self.filter {
            Some(text) => snapshot.search(text),
            None => snapshot.rules().to_vec(),
        }
    }
}
