//! In-memory interception target.
//!
//! Records installed intercepts instead of patching a live process, and can
//! simulate invocations against them. Used for dry-run install passes and
//! tests; failures can be injected per method signature.

use crate::neutralize::InterceptAction;
use crate::target::{
    BeforeHook, InstallError, MethodHandle, MethodInterceptionTarget, OverrideValue, ResolveError,
};
use hs_discovery::MethodDescriptor;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

/// Outcome of a simulated call through an installed intercept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub value: OverrideValue,
    pub original_ran: bool,
}

#[derive(Default)]
struct State {
    installed: HashMap<String, InterceptAction>,
    unresolvable: HashSet<String>,
    rejecting: HashSet<String>,
    panicking: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryTarget {
    state: Mutex<State>,
    next_handle: AtomicU64,
}

impl InMemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make resolution of `signature` fail
    pub fn fail_resolution(&self, signature: impl Into<String>) {
        self.state().unresolvable.insert(signature.into());
    }

    /// Make installs on `signature` be rejected
    pub fn reject_install(&self, signature: impl Into<String>) {
        self.state().rejecting.insert(signature.into());
    }

    /// Make installs on `signature` panic inside the bridge
    pub fn panic_on_install(&self, signature: impl Into<String>) {
        self.state().panicking.insert(signature.into());
    }

    pub fn installed(&self, signature: &str) -> Option<InterceptAction> {
        self.state().installed.get(signature).copied()
    }

    pub fn installed_count(&self) -> usize {
        self.state().installed.len()
    }

    /// Call `descriptor` through its intercept, if any
    ///
    /// `original` stands in for the real body and yields its return value.
    pub fn invoke<F>(&self, descriptor: &MethodDescriptor, original: F) -> Invocation
    where
        F: FnOnce() -> OverrideValue,
    {
        let action = self.installed(&descriptor.signature());
        match action {
            None => Invocation {
                value: original(),
                original_ran: true,
            },
            Some(InterceptAction::Replace) => Invocation {
                value: OverrideValue::Unit,
                original_ran: false,
            },
            Some(InterceptAction::Before(hook)) if hook.suppress_original => Invocation {
                value: hook.value,
                original_ran: false,
            },
            Some(InterceptAction::Before(hook)) => {
                let _ = original();
                Invocation {
                    value: hook.value,
                    original_ran: true,
                }
            }
        }
    }

    fn install(&self, handle: &MethodHandle, action: InterceptAction) -> Result<(), InstallError> {
        let signature = handle.descriptor().signature();
        let mut state = self.state();
        if state.panicking.contains(&signature) {
            drop(state);
            panic!("instrumentation bridge crashed on {signature}");
        }
        if state.rejecting.contains(&signature) {
            return Err(InstallError::Rejected {
                signature,
                reason: "rejected by target".into(),
            });
        }
        trace!("Installed {} on {}", action, signature);
        state.installed.insert(signature, action);
        Ok(())
    }
}

impl MethodInterceptionTarget for InMemoryTarget {
    fn resolve_executable(&self, descriptor: &MethodDescriptor) -> Result<MethodHandle, ResolveError> {
        let signature = descriptor.signature();
        if self.state().unresolvable.contains(&signature) {
            return Err(ResolveError::MethodNotFound(signature));
        }
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        Ok(MethodHandle::new(id, descriptor.clone()))
    }

    fn install_before(&self, handle: &MethodHandle, hook: BeforeHook) -> Result<(), InstallError> {
        self.install(handle, InterceptAction::Before(hook))
    }

    fn install_replace(&self, handle: &MethodHandle) -> Result<(), InstallError> {
        self.install(handle, InterceptAction::Replace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_discovery::Modifiers;

    fn method(ret: &str) -> MethodDescriptor {
        MethodDescriptor::new("com.ads.Sdk", "init", vec![], ret, Modifiers::PUBLIC)
    }

    #[test]
    fn test_invoke_without_intercept_runs_original() {
        let target = InMemoryTarget::new();
        let call = target.invoke(&method("boolean"), || OverrideValue::Bool(true));
        assert_eq!(call, Invocation { value: OverrideValue::Bool(true), original_ran: true });
    }

    #[test]
    fn test_before_hook_preempts_return_value() {
        let target = InMemoryTarget::new();
        let desc = method("boolean");
        let handle = target.resolve_executable(&desc).unwrap();
        target
            .install_before(&handle, BeforeHook { value: OverrideValue::Bool(false), suppress_original: false })
            .unwrap();

        let call = target.invoke(&desc, || OverrideValue::Bool(true));
        assert_eq!(call.value, OverrideValue::Bool(false));
        assert!(call.original_ran);
    }

    #[test]
    fn test_replace_skips_original() {
        let target = InMemoryTarget::new();
        let desc = method("void");
        let handle = target.resolve_executable(&desc).unwrap();
        target.install_replace(&handle).unwrap();

        let call = target.invoke(&desc, || panic!("original must not run"));
        assert!(!call.original_ran);
        assert_eq!(call.value, OverrideValue::Unit);
    }

    #[test]
    fn test_injected_failures() {
        let target = InMemoryTarget::new();
        let desc = method("void");
        target.fail_resolution(desc.signature());
        assert!(matches!(target.resolve_executable(&desc), Err(ResolveError::MethodNotFound(_))));

        let other = MethodDescriptor::new("com.ads.Sdk", "show", vec![], "void", Modifiers::PUBLIC);
        target.reject_install(other.signature());
        let handle = target.resolve_executable(&other).unwrap();
        assert!(target.install_replace(&handle).is_err());
        assert_eq!(target.installed_count(), 0);
    }
}
