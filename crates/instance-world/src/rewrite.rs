// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference rewriting into an instance namespace.
//!
//! Two tiers decide whether a reference follows the duplicate:
//!
//! 1. A sub-path under the graph root (`Root`, `Root.*`) is graph-internal and
//!    is always localized.
//! 2. Anything else is localized only when its would-be namespaced package is
//!    already in the [`NamespaceRegistry`].
//!
//! Everything else is external and keeps pointing at shared content. The
//! second tier is a heuristic: a graph-internal reference whose package was
//! never registered stays dangling into the template.
use tracing::trace;

use crate::ident::InstanceId;
use crate::namespace;
use crate::reference::{SoftRef, VisitRefs};
use crate::registry::NamespaceRegistry;
use crate::resource::ROOT_OBJECT_NAME;

/// Counts from one rewrite pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// References visited.
    pub visited: usize,
    /// References moved into the namespace.
    pub rewritten: usize,
}

impl RewriteStats {
    /// Adds the counts of `other`.
    pub fn absorb(&mut self, other: Self) {
        self.visited += other.visited;
        self.rewritten += other.rewritten;
    }
}

/// Moves references into an instance namespace.
///
/// Reads the registry, never writes it: the duplicator registers every minted
/// identity before a rewrite runs. Passes are idempotent and may be repeated
/// over the same content or run incrementally as sub-graphs stream in.
#[derive(Clone, Debug)]
pub struct ReferenceRewriter {
    registry: NamespaceRegistry,
}

fn addresses_graph_root(sub_path: &str) -> bool {
    sub_path
        .strip_prefix(ROOT_OBJECT_NAME)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

impl ReferenceRewriter {
    /// Creates a rewriter consulting `registry`.
    #[must_use]
    pub fn new(registry: NamespaceRegistry) -> Self {
        Self { registry }
    }

    /// Registry this rewriter consults.
    #[must_use]
    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    /// Localizes one reference for instance `id`. Returns `true` if it changed.
    pub fn fixup(&self, r: &mut SoftRef, id: InstanceId) -> bool {
        if r.is_null() || namespace::has_prefix(r.path()) {
            return false;
        }
        let target = namespace::namespaced_path(r.path(), id);
        if !addresses_graph_root(r.sub_path())
            && !self.registry.contains(namespace::package_of(&target))
        {
            return false;
        }
        trace!(from = %r, to = %target, "localized reference");
        r.set_path(target);
        true
    }

    /// Localizes every reference reachable from `target`.
    pub fn rewrite<T: VisitRefs + ?Sized>(&self, target: &mut T, id: InstanceId) -> RewriteStats {
        let mut stats = RewriteStats::default();
        target.visit_refs_mut(&mut |r| {
            stats.visited += 1;
            if self.fixup(r, id) {
                stats.rewritten += 1;
            }
        });
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Value;

    const ID: InstanceId = InstanceId::new(4);

    fn rewriter_with(entries: &[&str]) -> ReferenceRewriter {
        let registry = NamespaceRegistry::new();
        for e in entries {
            registry.insert(*e);
        }
        ReferenceRewriter::new(registry)
    }

    #[test]
    fn root_sub_paths_are_always_localized() {
        let rw = rewriter_with(&[]);
        let mut r = SoftRef::new("Scenes/Hall.Hall", "Root.Lamp");
        assert!(rw.fixup(&mut r, ID));
        assert_eq!(r.path(), "Scenes/INST_4_Hall.Hall");
        assert_eq!(r.sub_path(), "Root.Lamp");

        let mut bare = SoftRef::new("Scenes/Hall.Hall", "Root");
        assert!(rw.fixup(&mut bare, ID));
    }

    #[test]
    fn root_lookalikes_are_not_graph_internal() {
        let rw = rewriter_with(&[]);
        let mut r = SoftRef::new("Scenes/Hall.Hall", "Rooted.Lamp");
        assert!(!rw.fixup(&mut r, ID));
        assert_eq!(r.path(), "Scenes/Hall.Hall");
    }

    #[test]
    fn registry_membership_decides_the_rest() {
        let rw = rewriter_with(&["Scenes/INST_4_Hall_Sub"]);
        let mut sub = SoftRef::to_object("Scenes/Hall_Sub.Hall_Sub");
        let mut shared = SoftRef::to_object("Shared/Wood.Wood");
        assert!(rw.fixup(&mut sub, ID));
        assert!(!rw.fixup(&mut shared, ID));
        assert_eq!(sub.path(), "Scenes/INST_4_Hall_Sub.Hall_Sub");
        assert_eq!(shared.path(), "Shared/Wood.Wood");
    }

    #[test]
    fn null_and_prefixed_references_are_skipped() {
        let rw = rewriter_with(&[]);
        let mut null = SoftRef::null();
        let mut other = SoftRef::new("Scenes/INST_9_Hall.Hall", "Root.Lamp");
        assert!(!rw.fixup(&mut null, ID));
        assert!(!rw.fixup(&mut other, ID));
        assert_eq!(other.path(), "Scenes/INST_9_Hall.Hall");
    }

    #[test]
    fn passes_are_idempotent() {
        let rw = rewriter_with(&[]);
        let mut value = Value::List(vec![
            Value::Ref(SoftRef::new("Scenes/Hall.Hall", "Root.A")),
            Value::Ref(SoftRef::to_object("Shared/Wood.Wood")),
        ]);
        let first = rw.rewrite(&mut value, ID);
        assert_eq!(first, RewriteStats { visited: 2, rewritten: 1 });
        let second = rw.rewrite(&mut value, ID);
        assert_eq!(second, RewriteStats { visited: 2, rewritten: 0 });
    }
}
