//! HookShield Hooks
//!
//! Neutralizes located ad/analytics SDK methods:
//! - Hook groups pair a discovery predicate with a filter and a policy
//! - The orchestrator installs one intercept per surviving method, fail-soft
//! - Install passes can run on a background worker with panic isolation

mod context;
mod filter;
pub mod groups;
mod memory;
mod neutralize;
mod orchestrator;
mod target;
mod worker;

pub use context::ShieldContext;
pub use filter::MethodFilter;
pub use groups::{BUILTIN_GROUP_NAMES, HookGroup, builtin_groups, select_groups};
pub use memory::{InMemoryTarget, Invocation};
pub use neutralize::{InterceptAction, Neutralization, OverridePolicy};
pub use orchestrator::{GroupReport, HookOrchestrator, InstallOutcome, InstallRecord, InstallReport};
pub use target::{
    BeforeHook, InstallError, MethodHandle, MethodInterceptionTarget, OverrideValue, ResolveError,
};
pub use worker::spawn_install_pass;
