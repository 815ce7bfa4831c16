//! Request Interceptor
//!
//! Adapts the rule matching engine to the request paths of the host.
//!
//! Flow:
//! 1. Hooked client reports a request (DNS host, or HTTP/OkHttp/WebView URL)
//! 2. URLs are normalized (query dropped, path decoded)
//! 3. Decision cache hit for the current snapshot generation → done
//! 4. Miss → match against the snapshot, cache the decision
//! 5. First sighting of the host/URL → published on the event feed

use crate::events::{EventFeed, RequestDetails};
use crate::normalize::{extract_host, format_url_without_query};
use dashmap::DashMap;
use hs_rules::{Rule, RuleMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, trace};

/// Hooked request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Dns,
    Http,
    OkHttp,
    Web,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Dns => "DNS",
            RequestKind::Http => "HTTP",
            RequestKind::OkHttp => "OKHTTP",
            RequestKind::Web => "Web",
        }
    }

    /// Cache namespace: hosts and URLs never share keys
    fn query_type(&self) -> &'static str {
        match self {
            RequestKind::Dns => "host",
            _ => "url",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of interception check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptResult {
    /// Request is allowed to proceed
    Allow,
    /// Request is blocked by `rule`
    Blocked { rule: Rule },
}

impl InterceptResult {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    fn from_rule(rule: Option<Rule>) -> Self {
        match rule {
            Some(rule) => Self::Blocked { rule },
            None => Self::Allow,
        }
    }
}

/// Interceptor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// When false every request is allowed without matching
    pub enabled: bool,
    /// Upper bound on cached decisions
    pub cache_capacity: usize,
    /// Publish decisions on the event feed
    pub emit_events: bool,
    /// Event channel capacity
    pub event_buffer: usize,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_capacity: 12_948,
            emit_events: true,
            event_buffer: 1024,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedDecision {
    generation: u64,
    rule: Option<Rule>,
}

/// Interception statistics
#[derive(Debug, Default)]
pub struct InterceptorStats {
    pub total_requests: AtomicU64,
    pub blocked_requests: AtomicU64,
    pub cache_hits: AtomicU64,
}

/// Point-in-time copy of [`InterceptorStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub cache_hits: u64,
    pub events_dropped: u64,
}

/// Request interceptor over the live rule set
pub struct RequestInterceptor {
    matcher: RuleMatcher,
    config: InterceptorConfig,
    cache: DashMap<String, CachedDecision>,
    events: Option<EventFeed>,
    stats: InterceptorStats,
}

impl RequestInterceptor {
    pub fn new(matcher: RuleMatcher, config: InterceptorConfig) -> Self {
        info!(
            "Request interceptor ready (filtering: {}, cache capacity: {})",
            config.enabled, config.cache_capacity
        );
        Self {
            matcher,
            config,
            cache: DashMap::new(),
            events: None,
            stats: InterceptorStats::default(),
        }
    }

    /// Attach an event feed; ignored when `emit_events` is off
    pub fn with_event_feed(mut self, feed: EventFeed) -> Self {
        if self.config.emit_events {
            self.events = Some(feed);
        }
        self
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// DNS lookup of `host`; `addresses` are the resolved results, if known
    ///
    /// The host is lowercased, as the URL paths do.
    pub fn check_dns(&self, host: &str, addresses: &[IpAddr]) -> InterceptResult {
        let host = host.trim().to_ascii_lowercase();
        let details = RequestDetails::dns(&host, addresses);
        self.check(RequestKind::Dns, &host, &host, &details)
    }

    /// `HttpURLConnection`-style request
    pub fn check_http(&self, url: &str, details: &RequestDetails) -> InterceptResult {
        self.check_url(RequestKind::Http, url, details)
    }

    pub fn check_okhttp(&self, url: &str, details: &RequestDetails) -> InterceptResult {
        self.check_url(RequestKind::OkHttp, url, details)
    }

    /// WebView resource request
    pub fn check_web(&self, url: &str, details: &RequestDetails) -> InterceptResult {
        self.check_url(RequestKind::Web, url, details)
    }

    fn check_url(&self, kind: RequestKind, url: &str, details: &RequestDetails) -> InterceptResult {
        let Some(formatted) = format_url_without_query(url) else {
            self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
            trace!("Unparseable {} request allowed: {}", kind, url);
            return InterceptResult::Allow;
        };
        let host = extract_host(&formatted).unwrap_or_default();
        self.check(kind, &formatted, &host, details)
    }

    fn check(&self, kind: RequestKind, value: &str, host: &str, details: &RequestDetails) -> InterceptResult {
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        if !self.config.enabled || value.is_empty() {
            return InterceptResult::Allow;
        }

        let rule = self.decide(kind, value, host);
        if rule.is_some() {
            self.stats.blocked_requests.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(feed) = &self.events {
            feed.publish(kind, value, rule.as_ref(), details);
        }

        match &rule {
            Some(r) => debug!("{} blocked: {} ({})", kind, value, r),
            None => trace!("{} allowed: {}", kind, value),
        }
        InterceptResult::from_rule(rule)
    }

    /// Cached decision for the current snapshot generation
    fn decide(&self, kind: RequestKind, value: &str, host: &str) -> Option<Rule> {
        let snapshot = self.matcher.snapshot();
        let generation = snapshot.generation();
        let key = format!("{}:{}", kind.query_type(), value);

        if let Some(cached) = self.cache.get(&key) {
            if cached.generation == generation {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                return cached.rule.clone();
            }
        }

        let rule = snapshot.find_match(value, host).cloned();

        if self.cache.len() >= self.config.cache_capacity {
            // Coarse eviction: decisions are cheap to recompute
            self.cache.clear();
        }
        if self.config.cache_capacity > 0 {
            self.cache.insert(
                key,
                CachedDecision {
                    generation,
                    rule: rule.clone(),
                },
            );
        }
        rule
    }

    pub fn cached_decisions(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.stats.total_requests.load(Ordering::Relaxed),
            blocked_requests: self.stats.blocked_requests.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            events_dropped: self.events.as_ref().map_or(0, EventFeed::dropped),
        }
    }
}
