// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Template duplication into namespaced storage.
use thiserror::Error;
use tracing::{info, warn};

use crate::graph::{Graph, GraphHandle};
use crate::host::Host;
use crate::ident::InstanceId;
use crate::namespace;
use crate::registry::NamespaceRegistry;
use crate::resource::GraphContent;
use crate::rewrite::ReferenceRewriter;
use crate::source::{resolve_template, TemplateError};
use crate::storage::StorageError;
use crate::streaming::StreamFixup;

/// Leaf name of graphs built without a template.
pub const EMPTY_GRAPH_NAME: &str = "EmptyInstanceWorld";

/// Errors from [`GraphDuplicator::create_from_template`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DuplicateError {
    /// The namespaced identity already has storage. Programmer error: ids
    /// are never reused.
    #[error("namespace collision: {0} already exists")]
    NamespaceCollision(String),
    /// The template could not be resolved.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// Storage could not be created.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Produces namespaced copies of template graphs.
#[derive(Clone, Debug)]
pub struct GraphDuplicator {
    rewriter: ReferenceRewriter,
}

impl GraphDuplicator {
    /// Creates a duplicator that registers into, and rewrites against,
    /// `registry`.
    #[must_use]
    pub fn new(registry: NamespaceRegistry) -> Self {
        Self {
            rewriter: ReferenceRewriter::new(registry),
        }
    }

    /// Rewriter used for the root level and attached to streaming slots.
    #[must_use]
    pub fn rewriter(&self) -> &ReferenceRewriter {
        &self.rewriter
    }

    fn mint(&self, package: &str, id: InstanceId) -> String {
        let minted = namespace::namespaced_path(package, id);
        self.rewriter.registry().insert(minted.clone());
        minted
    }

    /// Loads `template` into storage namespaced for `id` and localizes it.
    ///
    /// On failure nothing is registered and no storage is left behind.
    pub fn create_from_template(
        &self,
        host: &mut Host,
        template: &str,
        id: InstanceId,
    ) -> Result<GraphHandle, DuplicateError> {
        let package = namespace::package_of(template).to_owned();
        let name = namespace::namespaced_path(&package, id);
        if host.packages().contains(&name) {
            debug_assert!(false, "namespace collision: {name} already exists");
            return Err(DuplicateError::NamespaceCollision(name));
        }

        host.packages_mut().create(name.clone())?;
        let mut content = match resolve_template(host.templates(), &package) {
            Ok(content) => content,
            Err(err) => {
                host.packages_mut().purge(&name);
                warn!(template = %package, instance = %id, %err, "template duplication failed");
                return Err(err.into());
            }
        };

        self.rewriter.registry().insert(name.clone());
        self.localize_sub_graphs(&mut content, id);
        let stats = self.rewriter.rewrite(&mut content.root, id);
        for slot in &mut content.streaming {
            slot.fixup = Some(StreamFixup::new(self.rewriter.clone(), id));
        }

        info!(
            template = %package,
            graph = %name,
            streaming = content.streaming.len(),
            tiles = content.tiles.len(),
            visited = stats.visited,
            rewritten = stats.rewritten,
            "duplicated template"
        );
        Ok(Graph::new(name, id, Some(package), content).into_handle())
    }

    fn localize_sub_graphs(&self, content: &mut GraphContent, id: InstanceId) {
        for tile in &mut content.tiles {
            tile.package = self.mint(&tile.package, id);
            for lod in &mut tile.lod_packages {
                *lod = self.mint(lod, id);
            }
        }
        for slot in &mut content.streaming {
            if slot.package_to_load.is_none() {
                slot.package_to_load = Some(slot.package.clone());
            }
            slot.package = self.mint(&slot.package, id);
            if slot.lod_packages_to_load.is_empty() {
                slot.lod_packages_to_load.clone_from(&slot.lod_packages);
            }
            for lod in &mut slot.lod_packages {
                *lod = self.mint(lod, id);
            }
        }
    }

    /// Builds an empty graph for `id`. Nothing is registered or stored.
    #[must_use]
    pub fn create_empty(&self, id: InstanceId) -> GraphHandle {
        let name = format!("{}{EMPTY_GRAPH_NAME}", namespace::build_prefix(id));
        info!(graph = %name, "created empty graph");
        Graph::new(name, id, None, GraphContent::default()).into_handle()
    }
}
