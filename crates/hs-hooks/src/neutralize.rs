//! Neutralization policies: which intercept a located method receives.

use crate::target::{BeforeHook, OverrideValue};
use hs_discovery::{MethodDescriptor, ReturnKind};
use serde::Serialize;
use std::fmt;

/// Source of the override value for a before-intercept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePolicy {
    /// `Void → Unit`, `Boolean → false`, anything else `null`
    ByReturnKind,
    Fixed(OverrideValue),
}

impl OverridePolicy {
    pub fn value_for(&self, kind: ReturnKind) -> OverrideValue {
        match self {
            OverridePolicy::Fixed(value) => *value,
            OverridePolicy::ByReturnKind => match kind {
                ReturnKind::Void => OverrideValue::Unit,
                ReturnKind::Boolean => OverrideValue::Bool(false),
                ReturnKind::Other => OverrideValue::Null,
            },
        }
    }
}

/// How a hook group neutralizes its methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neutralization {
    Before {
        policy: OverridePolicy,
        suppress_original: bool,
    },
    /// No-op body; only meaningful for void methods
    Replace,
}

impl Neutralization {
    pub fn by_return_kind(suppress_original: bool) -> Self {
        Self::Before {
            policy: OverridePolicy::ByReturnKind,
            suppress_original,
        }
    }

    pub fn fixed(value: OverrideValue, suppress_original: bool) -> Self {
        Self::Before {
            policy: OverridePolicy::Fixed(value),
            suppress_original,
        }
    }

    /// The concrete intercept for one method
    pub fn action_for(&self, descriptor: &MethodDescriptor) -> InterceptAction {
        match self {
            Neutralization::Before {
                policy,
                suppress_original,
            } => InterceptAction::Before(BeforeHook {
                value: policy.value_for(descriptor.return_kind),
                suppress_original: *suppress_original,
            }),
            Neutralization::Replace => InterceptAction::Replace,
        }
    }
}

/// The intercept chosen for one located method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InterceptAction {
    Before(BeforeHook),
    Replace,
}

impl fmt::Display for InterceptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterceptAction::Before(hook) if hook.suppress_original => {
                write!(f, "before(return {}, skip original)", hook.value)
            }
            InterceptAction::Before(hook) => write!(f, "before(return {})", hook.value),
            InterceptAction::Replace => write!(f, "replace(no-op)"),
        }
    }
}
