//! Scan predicates understood by bytecode locators.

use crate::descriptor::{MethodDescriptor, Modifiers, ReturnKind};
use serde::{Deserialize, Serialize};

/// What a one-time bytecode scan should look for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPredicate {
    /// Methods whose body references every listed string literal
    /// (each listed string may appear inside a longer literal)
    UsingStrings(Vec<String>),
    /// Methods declared under any of `packages` that carry at least
    /// `modifiers` and, when set, return `return_kind`
    InPackages {
        packages: Vec<String>,
        modifiers: Modifiers,
        return_kind: Option<ReturnKind>,
    },
    /// All overloads of `method_name` declared on `class_name`
    ClassMethods {
        class_name: String,
        method_name: String,
    },
}

impl ScanPredicate {
    pub fn using_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::UsingStrings(strings.into_iter().map(Into::into).collect())
    }

    pub fn class_methods(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self::ClassMethods {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Evaluate against one method and the string literals its body uses
    pub fn matches(&self, descriptor: &MethodDescriptor, used_strings: &[String]) -> bool {
        match self {
            Self::UsingStrings(wanted) => {
                !wanted.is_empty()
                    && wanted
                        .iter()
                        .all(|w| used_strings.iter().any(|used| used.contains(w.as_str())))
            }
            Self::InPackages {
                packages,
                modifiers,
                return_kind,
            } => {
                packages.iter().any(|p| descriptor.in_package(p))
                    && descriptor.modifiers.contains(*modifiers)
                    && return_kind.is_none_or(|kind| descriptor.return_kind == kind)
            }
            Self::ClassMethods {
                class_name,
                method_name,
            } => descriptor.class_name == *class_name && descriptor.method_name == *method_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(class: &str, name: &str, ret: &str, modifiers: Modifiers) -> MethodDescriptor {
        MethodDescriptor::new(class, name, vec![], ret, modifiers)
    }

    #[test]
    fn test_using_strings_requires_all() {
        let pred = ScanPredicate::using_strings(["anythink_sdk", "init"]);
        let desc = method("a.B", "c", "void", Modifiers::PUBLIC);

        let used = vec!["prefix anythink_sdk suffix".to_string(), "init".to_string()];
        assert!(pred.matches(&desc, &used));
        assert!(!pred.matches(&desc, &used[..1]));
        assert!(!ScanPredicate::using_strings(Vec::<String>::new()).matches(&desc, &used));
    }

    #[test]
    fn test_in_packages() {
        let pred = ScanPredicate::InPackages {
            packages: vec!["com.applovin".into(), "com.vungle.warren".into()],
            modifiers: Modifiers::PUBLIC,
            return_kind: Some(ReturnKind::Void),
        };

        assert!(pred.matches(&method("com.applovin.sdk.AppLovinSdk", "initializeSdk", "void", Modifiers::PUBLIC | Modifiers::FINAL), &[]));
        assert!(!pred.matches(&method("com.applovin.sdk.AppLovinSdk", "isReady", "boolean", Modifiers::PUBLIC), &[]));
        assert!(!pred.matches(&method("com.applovin.sdk.AppLovinSdk", "load", "void", Modifiers::PRIVATE), &[]));
        assert!(!pred.matches(&method("com.example.App", "load", "void", Modifiers::PUBLIC), &[]));
    }

    #[test]
    fn test_class_methods() {
        let pred = ScanPredicate::class_methods("com.bytedance.sdk.openadsdk.TTAdSdk", "init");
        assert!(pred.matches(&method("com.bytedance.sdk.openadsdk.TTAdSdk", "init", "boolean", Modifiers::PUBLIC), &[]));
        assert!(!pred.matches(&method("com.bytedance.sdk.openadsdk.TTAdSdk", "start", "void", Modifiers::PUBLIC), &[]));
    }
}
