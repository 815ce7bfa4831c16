//! Method interception capability consumed by the orchestrator.

use hs_discovery::MethodDescriptor;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Value an intercept hands back in place of the original result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverrideValue {
    /// No value; used for void methods
    Unit,
    Null,
    Bool(bool),
}

impl fmt::Display for OverrideValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideValue::Unit => write!(f, "()"),
            OverrideValue::Null => write!(f, "null"),
            OverrideValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A before-intercept: the override always preempts the original's return
/// value; `suppress_original` decides whether the original body still runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeforeHook {
    pub value: OverrideValue,
    pub suppress_original: bool,
}

/// A resolved, invocable method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    id: u64,
    descriptor: MethodDescriptor,
}

impl MethodHandle {
    pub fn new(id: u64, descriptor: MethodDescriptor) -> Self {
        Self { id, descriptor }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("No method matching {0}")]
    MethodNotFound(String),

    #[error("Resolution failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Intercept rejected for {signature}: {reason}")]
    Rejected { signature: String, reason: String },

    #[error("Instrumentation unavailable")]
    Unavailable,
}

/// Host instrumentation bridge
///
/// Implementations need not be re-entrant; the orchestrator serializes
/// install passes.
pub trait MethodInterceptionTarget: Send + Sync {
    /// Turn a cached descriptor back into an invocable method
    fn resolve_executable(&self, descriptor: &MethodDescriptor) -> Result<MethodHandle, ResolveError>;

    fn install_before(&self, handle: &MethodHandle, hook: BeforeHook) -> Result<(), InstallError>;

    /// Replace the method body with a no-op
    fn install_replace(&self, handle: &MethodHandle) -> Result<(), InstallError>;
}
