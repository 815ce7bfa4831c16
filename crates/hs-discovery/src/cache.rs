//! Session-lifetime discovery cache with singleflight computation.

use crate::descriptor::MethodDescriptor;
use crate::locator::ScanError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, warn};

/// Immutable, shareable discovery result
pub type MethodList = Arc<[MethodDescriptor]>;

type Slot = Arc<OnceLock<MethodList>>;

/// Key → descriptor list, filled at most once per key
///
/// Concurrent first requests for the same key block on one computation
/// and all observe the same list. A failed computation is recorded as an
/// empty list and is not retried.
#[derive(Default)]
pub struct DiscoveryCache {
    slots: Mutex<HashMap<String, Slot>>,
    computations: AtomicU64,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached list for `key`, computing it with `compute` on first request
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> MethodList
    where
        F: FnOnce() -> Result<Vec<MethodDescriptor>, ScanError>,
    {
        // The map lock is only held to find the slot; the scan runs outside it
        let slot = Arc::clone(self.slots().entry(key.to_string()).or_default());

        let list = slot.get_or_init(|| {
            self.computations.fetch_add(1, Ordering::Relaxed);
            match compute() {
                Ok(methods) => {
                    debug!("Discovered {} methods for {}", methods.len(), key);
                    methods.into()
                }
                Err(e) => {
                    warn!("Discovery for {} failed, caching empty result: {}", key, e);
                    Arc::from(Vec::new())
                }
            }
        });
        Arc::clone(list)
    }

    /// Cached list for `key` if its computation has completed
    pub fn get(&self, key: &str) -> Option<MethodList> {
        self.slots().get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots().values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times a computation actually ran
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Forget every entry (used at teardown and in tests)
    pub fn clear(&self) {
        self.slots().clear();
    }
}
