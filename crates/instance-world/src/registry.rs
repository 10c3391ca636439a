// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process-wide record of namespaced package identities.
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::ident::InstanceId;
use crate::namespace;

/// Set of namespaced package identities known to belong to some instance.
///
/// The [`ReferenceRewriter`](crate::ReferenceRewriter) consults it to decide
/// whether a reference that is not obviously graph-internal must still be
/// localized. A missing entry leaves a reference dangling into the shared
/// template; an extra entry is harmless.
///
/// Cloning yields another handle to the same set. The handle is `!Send`: the
/// registry lives on the thread that drives the host update loop and is never
/// locked. Entries are only ever added.
#[derive(Clone, Default, Debug)]
pub struct NamespaceRegistry {
    names: Rc<RefCell<FxHashSet<String>>>,
}

impl NamespaceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name`. Returns `true` if it was not present yet.
    pub fn insert(&self, name: impl Into<String>) -> bool {
        self.names.borrow_mut().insert(name.into())
    }

    /// Returns `true` if `name` has been recorded.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.borrow().contains(name)
    }

    /// Number of recorded identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.borrow().len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.borrow().is_empty()
    }

    /// Returns the recorded identities in the namespace of `id`, sorted.
    #[must_use]
    pub fn entries_for(&self, id: InstanceId) -> Vec<String> {
        let mut out: Vec<String> = self
            .names
            .borrow()
            .iter()
            .filter(|name| namespace::instance_of(name) == Some(id))
            .cloned()
            .collect();
        out.sort_unstable();
        out
    }
}
