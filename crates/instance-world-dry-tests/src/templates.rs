// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory template source fake for testing without a filesystem.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use instance_world::{GraphContent, TemplateError, TemplatePackage, TemplateSource};

#[derive(Clone, Debug)]
enum Entry {
    Package(TemplatePackage),
    Malformed(String),
}

#[derive(Debug, Default)]
struct Inner {
    packages: BTreeMap<String, Entry>,
    loads: BTreeMap<String, usize>,
}

/// In-memory implementation of [`TemplateSource`].
///
/// Clones share the same table and load counters, so a test can hand one
/// clone to a `Host` and keep another to populate and inspect.
///
/// # Example
///
/// ```
/// use instance_world::{GraphContent, Host};
/// use instance_world_dry_tests::InMemoryTemplateSource;
///
/// let source = InMemoryTemplateSource::new()
///     .with_graph("Scenes/Hall", GraphContent::default());
/// let host = Host::new(source.clone());
/// assert_eq!(source.total_loads(), 0);
/// # drop(host);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryTemplateSource {
    inner: Rc<RefCell<Inner>>,
}

impl InMemoryTemplateSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert_graph`](Self::insert_graph).
    #[must_use]
    pub fn with_graph(self, package: &str, content: GraphContent) -> Self {
        self.insert_graph(package, content);
        self
    }

    /// Store a graph package.
    pub fn insert_graph(&self, package: &str, content: GraphContent) {
        self.insert(package, Entry::Package(TemplatePackage::Graph(content)));
    }

    /// Store a redirector to `target`.
    pub fn insert_redirect(&self, package: &str, target: &str) {
        self.insert(
            package,
            Entry::Package(TemplatePackage::Redirect(target.to_owned())),
        );
    }

    /// Store a package that holds no graph.
    pub fn insert_assets(&self, package: &str) {
        self.insert(package, Entry::Package(TemplatePackage::Assets));
    }

    /// Store a package whose load fails as malformed.
    pub fn insert_malformed(&self, package: &str, reason: &str) {
        self.insert(package, Entry::Malformed(reason.to_owned()));
    }

    /// Remove a package so later loads report it missing.
    pub fn remove(&self, package: &str) -> bool {
        self.inner.borrow_mut().packages.remove(package).is_some()
    }

    /// Number of load attempts for `package`, successful or not.
    pub fn load_count(&self, package: &str) -> usize {
        self.inner
            .borrow()
            .loads
            .get(package)
            .copied()
            .unwrap_or(0)
    }

    /// Number of load attempts across all packages.
    pub fn total_loads(&self) -> usize {
        self.inner.borrow().loads.values().sum()
    }

    fn insert(&self, package: &str, entry: Entry) {
        self.inner
            .borrow_mut()
            .packages
            .insert(package.to_owned(), entry);
    }
}

impl TemplateSource for InMemoryTemplateSource {
    fn load(&self, package: &str) -> Result<TemplatePackage, TemplateError> {
        let mut inner = self.inner.borrow_mut();
        *inner.loads.entry(package.to_owned()).or_default() += 1;
        match inner.packages.get(package) {
            Some(Entry::Package(p)) => Ok(p.clone()),
            Some(Entry::Malformed(reason)) => Err(TemplateError::Malformed {
                package: package.to_owned(),
                reason: reason.clone(),
            }),
            None => Err(TemplateError::NotFound(package.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_table_and_counters() {
        let a = InMemoryTemplateSource::new();
        let b = a.clone();
        a.insert_graph("Scenes/Hall", GraphContent::default());
        assert!(matches!(b.load("Scenes/Hall"), Ok(TemplatePackage::Graph(_))));
        assert!(matches!(b.load("Scenes/Gone"), Err(TemplateError::NotFound(_))));
        assert_eq!(a.load_count("Scenes/Hall"), 1);
        assert_eq!(a.total_loads(), 2);
    }

    #[test]
    fn malformed_entries_fail_with_their_reason() {
        let source = InMemoryTemplateSource::new();
        source.insert_malformed("Scenes/Bad", "truncated");
        let err = source.load("Scenes/Bad").unwrap_err();
        assert_eq!(
            err,
            TemplateError::Malformed {
                package: "Scenes/Bad".to_owned(),
                reason: "truncated".to_owned(),
            }
        );
    }
}
