//! Located method descriptors.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Access flags of a located method, using the class-file bit values
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Modifiers: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers::empty()
    }
}

/// Closed classification of a method's declared return type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnKind {
    Void,
    /// Primitive `boolean` only; the boxed type is [`ReturnKind::Other`]
    Boolean,
    Other,
}

impl ReturnKind {
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name.trim() {
            "void" | "V" => Self::Void,
            "boolean" | "Z" => Self::Boolean,
            _ => Self::Other,
        }
    }
}

/// Everything needed to re-resolve an invocable method without rescanning
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "DescriptorRecord")]
pub struct MethodDescriptor {
    pub class_name: String,
    pub method_name: String,
    pub param_types: Vec<String>,
    pub return_type: String,
    pub modifiers: Modifiers,
    /// Derived from `return_type` once, at discovery time
    #[serde(skip_serializing)]
    pub return_kind: ReturnKind,
}

/// Wire shape: `return_kind` is always recomputed
#[derive(Deserialize)]
struct DescriptorRecord {
    class_name: String,
    method_name: String,
    #[serde(default)]
    param_types: Vec<String>,
    return_type: String,
    #[serde(default)]
    modifiers: Modifiers,
}

impl From<DescriptorRecord> for MethodDescriptor {
    fn from(record: DescriptorRecord) -> Self {
        MethodDescriptor::new(
            record.class_name,
            record.method_name,
            record.param_types,
            record.return_type,
            record.modifiers,
        )
    }
}

impl MethodDescriptor {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        param_types: Vec<String>,
        return_type: impl Into<String>,
        modifiers: Modifiers,
    ) -> Self {
        let return_type = return_type.into();
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            param_types,
            return_kind: ReturnKind::from_type_name(&return_type),
            return_type,
            modifiers,
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.method_name == "<init>" || self.method_name == "<clinit>"
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(Modifiers::ABSTRACT)
    }

    pub fn is_public(&self) -> bool {
        self.modifiers.contains(Modifiers::PUBLIC)
    }

    /// Whether the declaring class sits in `package` or one of its subpackages
    pub fn in_package(&self, package: &str) -> bool {
        self.class_name
            .strip_prefix(package)
            .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Stable identity: `class.name(params): return`
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({}): {}",
            self.class_name,
            self.method_name,
            self.param_types.join(", "),
            self.return_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_kind_classification() {
        assert_eq!(ReturnKind::from_type_name("void"), ReturnKind::Void);
        assert_eq!(ReturnKind::from_type_name("boolean"), ReturnKind::Boolean);
        assert_eq!(ReturnKind::from_type_name("java.lang.Boolean"), ReturnKind::Other);
        assert_eq!(ReturnKind::from_type_name("int"), ReturnKind::Other);
    }

    #[test]
    fn test_signature_format() {
        let desc = MethodDescriptor::new(
            "com.ads.Sdk",
            "init",
            vec!["android.content.Context".into(), "int".into()],
            "void",
            Modifiers::PUBLIC | Modifiers::STATIC,
        );
        assert_eq!(desc.signature(), "com.ads.Sdk.init(android.content.Context, int): void");
        assert_eq!(desc.return_kind, ReturnKind::Void);
        assert!(desc.is_public());
    }

    #[test]
    fn test_package_membership() {
        let desc = MethodDescriptor::new("com.unity3d.ads.Ads", "show", vec![], "void", Modifiers::PUBLIC);
        assert!(desc.in_package("com.unity3d.ads"));
        assert!(desc.in_package("com.unity3d"));
        assert!(!desc.in_package("com.unity3d.ad"));
    }

    #[test]
    fn test_deserialize_recomputes_return_kind() {
        let json = r#"{
            "class_name": "com.ads.Sdk",
            "method_name": "isReady",
            "return_type": "boolean",
            "modifiers": "PUBLIC | FINAL"
        }"#;
        let desc: MethodDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.return_kind, ReturnKind::Boolean);
        assert_eq!(desc.modifiers, Modifiers::PUBLIC | Modifiers::FINAL);
        assert!(desc.param_types.is_empty());
    }
}
