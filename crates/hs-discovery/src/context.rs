//! Discovery context: one scan session plus the process-wide cache.

use crate::cache::{DiscoveryCache, MethodList};
use crate::locator::{BytecodeLocator, ScanSession};
use crate::predicate::ScanPredicate;
use std::sync::Arc;
use tracing::{debug, info};

/// Cache key for a hook group within a host application
pub fn discovery_key(host_package: &str, hook_name: &str) -> String {
    format!("{host_package}:{hook_name}")
}

/// Owns the scan session for one host process
pub struct DiscoveryContext {
    host_package: String,
    session: ScanSession,
    cache: DiscoveryCache,
}

impl DiscoveryContext {
    pub fn open(host_package: impl Into<String>, locator: Box<dyn BytecodeLocator>) -> Self {
        let host_package = host_package.into();
        info!("Discovery context opened for {}", host_package);
        Self {
            host_package,
            session: ScanSession::open(locator),
            cache: DiscoveryCache::new(),
        }
    }

    pub fn host_package(&self) -> &str {
        &self.host_package
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Methods for `hook_name`, scanning at most once per session
    ///
    /// After [`close`](DiscoveryContext::close) every key resolves to an empty
    /// list that is not recorded in the cache.
    pub fn discover(&self, hook_name: &str, predicate: &ScanPredicate) -> MethodList {
        let key = discovery_key(&self.host_package, hook_name);
        if !self.session.is_open() {
            debug!("Discovery for {} after close", key);
            return Arc::from(Vec::new());
        }
        self.cache
            .get_or_compute(&key, || self.session.scan(predicate))
    }

    /// Close the scan session and drop every cached result
    pub fn close(&self) {
        self.session.close();
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MethodDescriptor, Modifiers};
    use crate::inventory::{InventoryEntry, InventoryLocator};

    fn locator() -> Box<dyn BytecodeLocator> {
        Box::new(InventoryLocator::new(vec![InventoryEntry {
            descriptor: MethodDescriptor::new(
                "com.bytedance.sdk.openadsdk.TTAdSdk",
                "init",
                vec!["android.content.Context".into()],
                "boolean",
                Modifiers::PUBLIC | Modifiers::STATIC,
            ),
            strings: vec![],
        }]))
    }

    #[test]
    fn test_key_format() {
        assert_eq!(discovery_key("com.example.app", "Pangolin"), "com.example.app:Pangolin");
    }

    #[test]
    fn test_discover_scans_once() {
        let ctx = DiscoveryContext::open("com.example.app", locator());
        let pred = ScanPredicate::class_methods("com.bytedance.sdk.openadsdk.TTAdSdk", "init");

        let first = ctx.discover("Pangolin", &pred);
        let second = ctx.discover("Pangolin", &pred);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(ctx.session().scan_count(), 1);
        assert!(ctx.cache().contains("com.example.app:Pangolin"));
    }

    #[test]
    fn test_discover_after_close() {
        let ctx = DiscoveryContext::open("com.example.app", locator());
        let pred = ScanPredicate::class_methods("com.bytedance.sdk.openadsdk.TTAdSdk", "init");
        assert_eq!(ctx.discover("Pangolin", &pred).len(), 1);
        assert_eq!(ctx.cache().len(), 1);
        ctx.close();
        assert!(ctx.cache().is_empty());

        // Nothing resolves or gets cached once the session is gone
        assert!(ctx.discover("Pangolin", &pred).is_empty());
        assert!(ctx.discover("Other", &pred).is_empty());
        assert!(ctx.cache().is_empty());
        assert!(!ctx.cache().contains("com.example.app:Other"));
        assert_eq!(ctx.session().scan_count(), 1);
    }
}
