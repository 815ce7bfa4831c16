//! Request event feed
//!
//! Every decision is published twice: once on the `all` channel and once on
//! `block` or `pass`. Each DNS host and each URL is reported only the first
//! time it is seen during the process lifetime.

use crate::interceptor::RequestKind;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use dashmap::DashMap;
use hs_rules::{Rule, RuleType};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventChannel {
    All,
    Block,
    Pass,
}

/// Request metadata captured by the hooked client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetails {
    pub method: Option<String>,
    pub url_string: Option<String>,
    pub request_headers: Option<String>,
    pub response_code: Option<u16>,
    pub response_message: Option<String>,
    pub response_headers: Option<String>,
    pub stack: Option<String>,
    pub dns_host: Option<String>,
    pub dns_cidr: Option<String>,
    pub full_address: Option<String>,
}

impl RequestDetails {
    /// Details for a resolved DNS lookup
    pub fn dns(host: &str, addresses: &[IpAddr]) -> Self {
        Self {
            dns_host: Some(host.to_string()),
            dns_cidr: (!addresses.is_empty()).then(|| {
                addresses
                    .iter()
                    .map(|addr| cidr_notation(*addr))
                    .collect::<Vec<_>>()
                    .join(", ")
            }),
            full_address: addresses.first().map(|addr| addr.to_string()),
            ..Default::default()
        }
    }

    /// Details for an HTTP-level request
    pub fn http(method: &str, url: &str) -> Self {
        Self {
            method: Some(method.to_string()),
            url_string: Some(url.to_string()),
            ..Default::default()
        }
    }
}

/// One reported decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub channel: EventChannel,
    pub kind: RequestKind,
    pub host_package: String,
    /// The normalized value that was matched
    pub request: String,
    pub timestamp_ms: u64,
    pub blocked: bool,
    pub rule_type: Option<RuleType>,
    pub rule_value: Option<String>,
    pub details: RequestDetails,
}

/// `address/prefix` where the prefix is the number of set bits in the address
pub fn cidr_notation(addr: IpAddr) -> String {
    let prefix: u32 = match addr {
        IpAddr::V4(v4) => v4.octets().iter().map(|b| b.count_ones()).sum(),
        IpAddr::V6(v6) => v6.octets().iter().map(|b| b.count_ones()).sum(),
    };
    format!("{addr}/{prefix}")
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Publishing side of the event feed
pub struct EventFeed {
    tx: Sender<RequestEvent>,
    host_package: String,
    seen_hosts: DashMap<String, ()>,
    seen_urls: DashMap<String, ()>,
    dropped: AtomicU64,
}

impl EventFeed {
    /// Bounded feed; events are dropped rather than blocking the request path
    pub fn new(host_package: impl Into<String>, capacity: usize) -> (Self, Receiver<RequestEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (
            Self {
                tx,
                host_package: host_package.into(),
                seen_hosts: DashMap::new(),
                seen_urls: DashMap::new(),
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Events lost to a full or closed channel
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True the first time a request is seen
    fn first_sighting(&self, details: &RequestDetails) -> bool {
        if let Some(host) = &details.dns_host {
            if self.seen_hosts.insert(host.clone(), ()).is_some() {
                return false;
            }
        }
        if let Some(url) = &details.url_string {
            if self.seen_urls.insert(url.clone(), ()).is_some() {
                return false;
            }
        }
        true
    }

    /// Report a decision; returns whether it was published
    pub fn publish(
        &self,
        kind: RequestKind,
        request: &str,
        rule: Option<&Rule>,
        details: &RequestDetails,
    ) -> bool {
        if !self.first_sighting(details) {
            trace!("Duplicate {} request {} not reported", kind, request);
            return false;
        }

        let blocked = rule.is_some();
        let timestamp_ms = now_ms();
        let verdict = if blocked { EventChannel::Block } else { EventChannel::Pass };

        for channel in [EventChannel::All, verdict] {
            let event = RequestEvent {
                channel,
                kind,
                host_package: self.host_package.clone(),
                request: request.to_string(),
                timestamp_ms,
                blocked,
                rule_type: rule.map(|r| r.rule_type),
                rule_value: rule.map(|r| r.value.clone()),
                details: details.clone(),
            };
            match self.tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("Request event dropped for {}", request);
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_cidr_notation() {
        assert_eq!(cidr_notation(IpAddr::V4(Ipv4Addr::new(255, 255, 255, 0))), "255.255.255.0/24");
        assert_eq!(cidr_notation(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))), "10.0.0.1/3");
        assert_eq!(cidr_notation(IpAddr::V6(Ipv6Addr::LOCALHOST)), "::1/1");
    }

    #[test]
    fn test_dns_details() {
        let details = RequestDetails::dns(
            "ads.example.com",
            &[IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3))],
        );
        assert_eq!(details.dns_cidr.as_deref(), Some("10.0.0.1/3, 10.0.0.3/4"));
        assert_eq!(details.full_address.as_deref(), Some("10.0.0.1"));
        assert!(RequestDetails::dns("x", &[]).dns_cidr.is_none());
    }

    #[test]
    fn test_publish_all_and_verdict_once() {
        let (feed, rx) = EventFeed::new("com.example.app", 16);
        let rule = Rule::with_id(1, RuleType::Domain, "ads.example.com");
        let details = RequestDetails::dns("ads.example.com", &[]);

        assert!(feed.publish(RequestKind::Dns, "ads.example.com", Some(&rule), &details));
        assert!(!feed.publish(RequestKind::Dns, "ads.example.com", Some(&rule), &details));

        let events: Vec<RequestEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].channel, EventChannel::All);
        assert_eq!(events[1].channel, EventChannel::Block);
        assert_eq!(events[1].rule_type, Some(RuleType::Domain));
        assert!(events.iter().all(|e| e.blocked));
    }

    #[test]
    fn test_full_channel_drops() {
        let (feed, _rx) = EventFeed::new("com.example.app", 1);
        feed.publish(RequestKind::Http, "https://a.example/", None, &RequestDetails::http("GET", "https://a.example/"));
        assert_eq!(feed.dropped(), 1);
    }

    #[test]
    fn test_event_serializes() {
        let (feed, rx) = EventFeed::new("com.example.app", 4);
        feed.publish(RequestKind::Web, "https://a.example/x", None, &RequestDetails::http("GET", "https://a.example/x?q"));
        let event = rx.recv().unwrap();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"channel\":\"all\""));
        assert!(json.contains("\"blocked\":false"));
    }
}
