//! HookShield Method Discovery
//!
//! Locates ad/analytics SDK methods inside the host's compiled code and
//! remembers the result for the lifetime of the process.
//!
//! Flow:
//! 1. A hook group asks the [`DiscoveryContext`] for a discovery key
//! 2. Cache hit → cached descriptors, no scan
//! 3. Cache miss → one scan through the shared [`ScanSession`]
//! 4. Concurrent misses on the same key wait for that one scan

mod cache;
mod context;
mod descriptor;
mod inventory;
mod locator;
mod predicate;

pub use cache::{DiscoveryCache, MethodList};
pub use context::{DiscoveryContext, discovery_key};
pub use descriptor::{MethodDescriptor, Modifiers, ReturnKind};
pub use inventory::{InventoryEntry, InventoryLocator};
pub use locator::{BytecodeLocator, ScanError, ScanSession};
pub use predicate::ScanPredicate;
