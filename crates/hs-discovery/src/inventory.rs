//! Inventory-backed locator
//!
//! Evaluates scan predicates against a pre-dumped method inventory: a JSON
//! array of methods with the string literals each body references.
//!
//! ```json
//! [
//!   {
//!     "class_name": "com.anythink.core.api.ATSDK",
//!     "method_name": "init",
//!     "param_types": ["android.content.Context", "java.lang.String"],
//!     "return_type": "void",
//!     "modifiers": "PUBLIC | STATIC",
//!     "strings": ["anythink_sdk"]
//!   }
//! ]
//! ```

use crate::descriptor::MethodDescriptor;
use crate::locator::{BytecodeLocator, ScanError};
use crate::predicate::ScanPredicate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// One inventoried method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    #[serde(flatten)]
    pub descriptor: MethodDescriptor,
    /// String literals referenced by the method body
    #[serde(default)]
    pub strings: Vec<String>,
}

/// [`BytecodeLocator`] over an in-memory inventory
#[derive(Debug, Clone, Default)]
pub struct InventoryLocator {
    entries: Vec<InventoryEntry>,
}

impl InventoryLocator {
    pub fn new(entries: Vec<InventoryEntry>) -> Self {
        Self { entries }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ScanError> {
        let entries: Vec<InventoryEntry> = serde_json::from_reader(reader)?;
        info!("Loaded method inventory: {} methods", entries.len());
        Ok(Self::new(entries))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    /// Every inventoried descriptor, in inventory order
    pub fn descriptors(&self) -> Vec<MethodDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }
}

impl BytecodeLocator for InventoryLocator {
    fn scan_for_methods(&self, predicate: &ScanPredicate) -> Result<Vec<MethodDescriptor>, ScanError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| predicate.matches(&entry.descriptor, &entry.strings))
            .map(|entry| entry.descriptor.clone())
            .collect())
    }
}
