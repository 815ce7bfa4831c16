//! Hook orchestrator: discovery → filter → install, fail-soft per method.

use crate::groups::HookGroup;
use crate::neutralize::InterceptAction;
use crate::target::MethodInterceptionTarget;
use hs_discovery::{DiscoveryContext, MethodDescriptor};
use serde::Serialize;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// What happened to one located method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum InstallOutcome {
    Installed,
    /// Another group already hooked this method during this process
    AlreadyInstalled,
    ResolutionFailed(String),
    InstallFailed(String),
}

impl InstallOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ResolutionFailed(_) | Self::InstallFailed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallRecord {
    pub method: String,
    pub action: InterceptAction,
    pub outcome: InstallOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupReport {
    pub group: String,
    /// Methods returned by discovery, before filtering
    pub discovered: usize,
    pub records: Vec<InstallRecord>,
}

impl GroupReport {
    pub fn installed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == InstallOutcome::Installed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_failure()).count()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    /// Set when the pass was refused because another was running
    pub skipped: bool,
    pub groups: Vec<GroupReport>,
}

impl InstallReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            groups: Vec::new(),
        }
    }

    pub fn installed(&self) -> usize {
        self.groups.iter().map(GroupReport::installed).sum()
    }

    pub fn failed(&self) -> usize {
        self.groups.iter().map(GroupReport::failed).sum()
    }

    pub fn group(&self, name: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group == name)
    }
}

/// Clears the running flag when a pass ends, including by unwinding
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Installs intercepts for hook groups against one interception target
pub struct HookOrchestrator {
    target: Arc<dyn MethodInterceptionTarget>,
    running: AtomicBool,
    installed: Mutex<HashSet<String>>,
}

impl HookOrchestrator {
    pub fn new(target: Arc<dyn MethodInterceptionTarget>) -> Self {
        Self {
            target,
            running: AtomicBool::new(false),
            installed: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of distinct methods hooked so far
    pub fn installed_count(&self) -> usize {
        self.installed.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run every group in order
    ///
    /// Refuses to start while another pass is running on this orchestrator and
    /// returns a report flagged `skipped` instead.
    pub fn run_all(&self, discovery: &DiscoveryContext, groups: &[HookGroup]) -> InstallReport {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Install pass already running, skipping");
            return InstallReport::skipped();
        }
        let _guard = RunGuard(&self.running);

        info!("Install pass started: {} groups", groups.len());
        let report = InstallReport {
            skipped: false,
            groups: groups
                .iter()
                .map(|group| self.run_group(discovery, group))
                .collect(),
        };
        info!(
            "Install pass finished: {} installed, {} failed",
            report.installed(),
            report.failed()
        );
        report
    }

    fn run_group(&self, discovery: &DiscoveryContext, group: &HookGroup) -> GroupReport {
        let methods = discovery.discover(&group.name, &group.predicate);
        let mut report = GroupReport {
            group: group.name.clone(),
            discovered: methods.len(),
            records: Vec::new(),
        };

        for method in methods.iter().filter(|m| group.filter.accepts(m)) {
            let action = group.neutralization.action_for(method);
            let outcome = self.install_isolated(method, action);
            match &outcome {
                InstallOutcome::Installed => debug!("[{}] Hooked {} with {}", group.name, method, action),
                InstallOutcome::AlreadyInstalled => debug!("[{}] {} already hooked", group.name, method),
                InstallOutcome::ResolutionFailed(e) | InstallOutcome::InstallFailed(e) => {
                    warn!("[{}] Skipping {}: {}", group.name, method, e)
                }
            }
            report.records.push(InstallRecord {
                method: method.signature(),
                action,
                outcome,
            });
        }

        debug!(
            "[{}] {} discovered, {} installed",
            group.name,
            report.discovered,
            report.installed()
        );
        report
    }

    /// One method inside a panic isolation boundary
    fn install_isolated(&self, method: &MethodDescriptor, action: InterceptAction) -> InstallOutcome {
        let signature = method.signature();
        if self
            .installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&signature)
        {
            return InstallOutcome::AlreadyInstalled;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.install_one(method, action)));
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(panic_info) => {
                let error_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!("Install on {} panicked: {}", signature, error_msg);
                InstallOutcome::InstallFailed(format!("panicked: {error_msg}"))
            }
        };

        if outcome == InstallOutcome::Installed {
            self.installed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(signature);
        }
        outcome
    }

    fn install_one(&self, method: &MethodDescriptor, action: InterceptAction) -> InstallOutcome {
        let handle = match self.target.resolve_executable(method) {
            Ok(handle) => handle,
            Err(e) => return InstallOutcome::ResolutionFailed(e.to_string()),
        };
        let result = match action {
            InterceptAction::Before(hook) => self.target.install_before(&handle, hook),
            InterceptAction::Replace => self.target.install_replace(&handle),
        };
        match result {
            Ok(()) => InstallOutcome::Installed,
            Err(e) => InstallOutcome::InstallFailed(e.to_string()),
        }
    }
}
