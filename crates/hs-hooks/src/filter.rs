//! Post-discovery method filters.

use hs_discovery::{MethodDescriptor, ReturnKind};
use std::collections::BTreeSet;

/// Decides which located methods receive an intercept
///
/// Constructors and static initializers are always rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFilter {
    public_only: bool,
    concrete_only: bool,
    return_kind: Option<ReturnKind>,
    names: Option<BTreeSet<String>>,
}

impl MethodFilter {
    /// Everything except constructors
    pub fn any() -> Self {
        Self::default()
    }

    pub fn public_only(mut self) -> Self {
        self.public_only = true;
        self
    }

    /// Reject abstract methods
    pub fn concrete_only(mut self) -> Self {
        self.concrete_only = true;
        self
    }

    pub fn returning(mut self, kind: ReturnKind) -> Self {
        self.return_kind = Some(kind);
        self
    }

    /// Only methods whose simple name is in `names`
    pub fn named<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn accepts(&self, method: &MethodDescriptor) -> bool {
        if method.is_constructor() {
            return false;
        }
        if self.public_only && !method.is_public() {
            return false;
        }
        if self.concrete_only && method.is_abstract() {
            return false;
        }
        if self.return_kind.is_some_and(|kind| kind != method.return_kind) {
            return false;
        }
        self.names
            .as_ref()
            .is_none_or(|names| names.contains(&method.method_name))
    }
}
