// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Namespaced package storage.
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

/// Errors reported by [`PackageStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Storage under that name already exists.
    #[error("package storage already exists: {0}")]
    AlreadyExists(String),
}

/// Host-side storage slots keyed by package name.
///
/// Removal is either immediate ([`purge`](Self::purge), used when a load
/// fails halfway) or deferred until the next collection pass
/// ([`mark_garbage`](Self::mark_garbage)).
#[derive(Debug, Default)]
pub struct PackageStore {
    // value: marked for collection
    packages: BTreeMap<String, bool>,
}

impl PackageStore {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the storage slot `name`.
    pub fn create(&mut self, name: impl Into<String>) -> Result<(), StorageError> {
        let name = name.into();
        if self.packages.contains_key(&name) {
            return Err(StorageError::AlreadyExists(name));
        }
        self.packages.insert(name, false);
        Ok(())
    }

    /// Returns `true` if the slot exists, garbage or not.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Removes the slot now. Returns `true` if it existed.
    pub fn purge(&mut self, name: &str) -> bool {
        self.packages.remove(name).is_some()
    }

    /// Flags the slot for removal by the next [`collect`](Self::collect).
    pub fn mark_garbage(&mut self, name: &str) -> bool {
        match self.packages.get_mut(name) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the slot is waiting for collection.
    #[must_use]
    pub fn is_garbage(&self, name: &str) -> bool {
        self.packages.get(name).copied().unwrap_or(false)
    }

    /// Removes every flagged slot. Returns how many were removed.
    pub fn collect(&mut self) -> usize {
        let before = self.packages.len();
        self.packages.retain(|_, garbage| !*garbage);
        let removed = before - self.packages.len();
        debug!(removed, remaining = self.packages.len(), "collected package storage");
        removed
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns `true` when no slot exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Slot names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.packages.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicates() {
        let mut store = PackageStore::new();
        assert!(store.create("Scenes/INST_1_Hall").is_ok());
        assert_eq!(
            store.create("Scenes/INST_1_Hall"),
            Err(StorageError::AlreadyExists("Scenes/INST_1_Hall".to_owned()))
        );
    }

    #[test]
    fn garbage_waits_for_collection() {
        let mut store = PackageStore::new();
        assert!(store.create("A").is_ok());
        assert!(store.create("B").is_ok());
        assert!(store.mark_garbage("A"));
        assert!(!store.mark_garbage("C"));
        assert!(store.contains("A") && store.is_garbage("A"));
        assert_eq!(store.collect(), 1);
        assert!(!store.contains("A"));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn purge_is_immediate() {
        let mut store = PackageStore::new();
        assert!(store.create("A").is_ok());
        assert!(store.purge("A"));
        assert!(!store.purge("A"));
        assert!(store.is_empty());
    }
}
