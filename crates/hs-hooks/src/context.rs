//! Shield context: the install-time state of one host process.

use crate::groups::HookGroup;
use crate::orchestrator::{HookOrchestrator, InstallReport};
use crate::target::MethodInterceptionTarget;
use hs_discovery::{BytecodeLocator, DiscoveryContext};
use std::sync::Arc;
use tracing::info;

/// Owns the scan session, discovery cache and orchestrator
///
/// Opened at process init, passed explicitly, closed at teardown.
pub struct ShieldContext {
    discovery: DiscoveryContext,
    orchestrator: HookOrchestrator,
}

impl ShieldContext {
    pub fn open(
        host_package: impl Into<String>,
        locator: Box<dyn BytecodeLocator>,
        target: Arc<dyn MethodInterceptionTarget>,
    ) -> Self {
        Self {
            discovery: DiscoveryContext::open(host_package, locator),
            orchestrator: HookOrchestrator::new(target),
        }
    }

    pub fn host_package(&self) -> &str {
        self.discovery.host_package()
    }

    pub fn discovery(&self) -> &DiscoveryContext {
        &self.discovery
    }

    pub fn orchestrator(&self) -> &HookOrchestrator {
        &self.orchestrator
    }

    /// One discovery + install pass on the calling thread
    pub fn install(&self, groups: &[HookGroup]) -> InstallReport {
        self.orchestrator.run_all(&self.discovery, groups)
    }

    /// Close the scan session and drop the discovery cache; installed
    /// intercepts stay in place
    pub fn close(&self) {
        let cached = self.discovery.cache().len();
        self.discovery.close();
        info!(
            "Shield context for {} closed: {} methods hooked, {} discovery keys released",
            self.host_package(),
            self.orchestrator.installed_count(),
            cached
        );
    }
}
