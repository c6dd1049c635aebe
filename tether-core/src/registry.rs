//! Catalog of syncable configuration types.
//!
//! The registry is an explicit value built once at startup and passed by
//! reference to whatever needs it. It is generic over the handler so this
//! crate stays independent of the sync engine; `tether-sync` instantiates it
//! with boxed `Syncable` handlers.
//!
//! # Selection rules
//!
//! [`TypeRegistry::each_filtered`] yields:
//! 1. every type when `selection.all` is set;
//! 2. otherwise, every type whose flag is explicitly `true`;
//! 3. otherwise (nothing explicitly on), the default-included types that
//!    were not explicitly switched off.

use crate::error::RegistryError;
use crate::types::Selection;

/// One registered type.
#[derive(Debug)]
pub struct RegistryEntry<H> {
    pub name: String,
    pub handler: H,
    /// Single-character CLI selector (`-a`, `-m`, ...).
    pub selector: char,
    pub description: String,
    /// Included when the caller selects nothing explicitly.
    pub default_included: bool,
}

/// Ordered catalog of sync types.
#[derive(Debug)]
pub struct TypeRegistry<H> {
    entries: Vec<RegistryEntry<H>>,
}

impl<H> Default for TypeRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> TypeRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a type. Names and selector characters must be unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: H,
        selector: char,
        description: impl Into<String>,
        default_included: bool,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(RegistryError::DuplicateType { name });
        }
        if let Some(existing) = self.by_selector(selector) {
            return Err(RegistryError::DuplicateSelector {
                selector,
                name: existing.name.clone(),
            });
        }
        self.entries.push(RegistryEntry {
            name,
            handler,
            selector,
            description: description.into(),
            default_included,
        });
        Ok(())
    }

    /// All entries in registration order.
    pub fn each(&self) -> impl Iterator<Item = &RegistryEntry<H>> {
        self.entries.iter()
    }

    /// Entries chosen by `selection`, in registration order.
    pub fn each_filtered(&self, selection: &Selection) -> Vec<&RegistryEntry<H>> {
        if selection.all {
            return self.entries.iter().collect();
        }

        let explicit: Vec<&RegistryEntry<H>> = self
            .entries
            .iter()
            .filter(|e| selection.flag(&e.name) == Some(true))
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }

        self.entries
            .iter()
            .filter(|e| e.default_included)
            .collect()
    }

    /// Names in `selection` that match no registered type.
    pub fn unknown_names(&self, selection: &Selection) -> Vec<String> {
        selection
            .flags
            .keys()
            .filter(|name| self.get(name).is_none())
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry<H>> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn by_selector(&self, selector: char) -> Option<&RegistryEntry<H>> {
        self.entries.iter().find(|e| e.selector == selector)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry so the registry can be rebuilt.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
