// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Template content: resources, levels, streaming sub-graphs and tiles.
use std::collections::BTreeMap;

use crate::reference::{SoftRef, Value, VisitRefs};
use crate::streaming::StreamFixup;

/// Name of the root object inside every graph package.
///
/// A reference whose sub-path is `Root` or starts with `Root.` addresses
/// something inside the graph that owns the package.
pub const ROOT_OBJECT_NAME: &str = "Root";

/// Running state of a single resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Loaded but never begun.
    #[default]
    Idle,
    /// `begin_running` has been applied.
    Running,
    /// `end_running` has been applied; never begins again.
    Ended,
}

/// One node of a resource tree.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resource {
    /// Name, unique among siblings.
    pub name: String,
    /// Free-form type tag.
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: String,
    /// Named properties; references live here.
    #[cfg_attr(feature = "serde", serde(default))]
    pub props: BTreeMap<String, Value>,
    /// Owned sub-resources.
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<Resource>,
    /// Runtime state. Never serialized.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub run_state: RunState,
}

impl Resource {
    /// Creates an idle resource with no properties or children.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Adds a property.
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Adds a reference-valued property.
    pub fn with_ref(self, key: impl Into<String>, target: SoftRef) -> Self {
        self.with_prop(key, Value::Ref(target))
    }

    /// Adds an owned sub-resource.
    pub fn with_child(mut self, child: Resource) -> Self {
        self.children.push(child);
        self
    }

    /// Looks up a property.
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Looks up a reference-valued property.
    #[must_use]
    pub fn reference(&self, key: &str) -> Option<&SoftRef> {
        match self.props.get(key) {
            Some(Value::Ref(r)) => Some(r),
            _ => None,
        }
    }

    /// Returns `true` once the resource has begun running, even if it has
    /// since ended.
    #[must_use]
    pub fn has_begun_running(&self) -> bool {
        self.run_state != RunState::Idle
    }

    fn begin(&mut self) -> bool {
        if self.run_state == RunState::Idle {
            self.run_state = RunState::Running;
            true
        } else {
            false
        }
    }

    fn end(&mut self) -> bool {
        if self.run_state == RunState::Running {
            self.run_state = RunState::Ended;
            true
        } else {
            false
        }
    }
}

impl VisitRefs for Resource {
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef)) {
        for value in self.props.values() {
            value.visit_refs(visitor);
        }
        self.children.visit_refs(visitor);
    }

    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef)) {
        for value in self.props.values_mut() {
            value.visit_refs_mut(visitor);
        }
        self.children.visit_refs_mut(visitor);
    }
}

/// Top-level resource list of one package (the children of `Root`).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Level {
    /// Top-level resources in declaration order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub resources: Vec<Resource>,
}

impl Level {
    /// Creates an empty level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a top-level resource.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Finds a resource by its dotted path below `Root` (`Lamp.Bulb`).
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Resource> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.resources.iter().find(|r| r.name == first)?;
        for part in parts {
            current = current.children.iter().find(|r| r.name == part)?;
        }
        Some(current)
    }

    /// Returns `true` if a top-level resource is called `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name == name)
    }

    /// Begins every idle top-level resource. Returns how many began.
    pub fn begin_running(&mut self) -> usize {
        self.resources
            .iter_mut()
            .map(Resource::begin)
            .filter(|began| *began)
            .count()
    }

    /// Ends every running top-level resource in reverse declaration order.
    /// Returns how many ended.
    pub fn end_running(&mut self) -> usize {
        self.resources
            .iter_mut()
            .rev()
            .map(Resource::end)
            .filter(|ended| *ended)
            .count()
    }
}

impl VisitRefs for Level {
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef)) {
        self.resources.visit_refs(visitor);
    }

    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef)) {
        self.resources.visit_refs_mut(visitor);
    }
}

/// Progress of a streaming slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Not requested.
    #[default]
    Unloaded,
    /// Requested; waiting for the update loop to admit it.
    Pending,
    /// Loaded, fixed up and attached to the graph.
    Shown,
    /// Request dropped by a forced unload.
    Cancelled,
    /// Load attempted and failed.
    Failed,
}

/// Nested sub-graph that loads lazily after the owning graph exists.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamingLevel {
    /// Package the loaded content is stored under. Namespaced after
    /// duplication.
    pub package: String,
    /// Package the content is read from. Filled with the un-namespaced
    /// source package during duplication.
    #[cfg_attr(feature = "serde", serde(default))]
    pub package_to_load: Option<String>,
    /// Level-of-detail packages. Namespaced after duplication.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lod_packages: Vec<String>,
    /// Level-of-detail source packages, saved before namespacing.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lod_packages_to_load: Vec<String>,
    /// Requested loaded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub should_be_loaded: bool,
    /// Requested visible once loaded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub should_be_visible: bool,
    /// Requested at initialization, outside the editor.
    #[cfg_attr(feature = "serde", serde(default))]
    pub always_loaded: bool,
    /// Runtime slot state.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub state: StreamState,
    /// Loaded content, once shown.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub loaded: Option<Level>,
    /// Fix-up run over the content when it arrives.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub fixup: Option<StreamFixup>,
}

impl StreamingLevel {
    /// Creates an unrequested slot for `package`.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Self::default()
        }
    }

    /// Marks the slot as requested at initialization.
    pub fn always_loaded(mut self) -> Self {
        self.always_loaded = true;
        self
    }

    /// Adds a level-of-detail package.
    pub fn with_lod(mut self, package: impl Into<String>) -> Self {
        self.lod_packages.push(package.into());
        self
    }

    /// Package the content is read from.
    #[must_use]
    pub fn load_package(&self) -> &str {
        self.package_to_load.as_deref().unwrap_or(&self.package)
    }

    /// Returns `true` while waiting to be admitted.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == StreamState::Pending
    }
}

impl VisitRefs for StreamingLevel {
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef)) {
        if let Some(level) = &self.loaded {
            level.visit_refs(visitor);
        }
    }

    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef)) {
        if let Some(level) = &mut self.loaded {
            level.visit_refs_mut(visitor);
        }
    }
}

/// Statically declared composition tile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompositionTile {
    /// Tile package.
    pub package: String,
    /// Level-of-detail packages of the tile.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lod_packages: Vec<String>,
}

/// Everything a graph package holds.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphContent {
    /// Resources under `Root`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub root: Level,
    /// Lazily loaded sub-graphs.
    #[cfg_attr(feature = "serde", serde(default))]
    pub streaming: Vec<StreamingLevel>,
    /// Composition tiles.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tiles: Vec<CompositionTile>,
    /// Packages held for the life of the graph once it is initialized.
    #[cfg_attr(feature = "serde", serde(default))]
    pub aux_packages: Vec<String>,
    /// Sound mix applied when audio playback is allowed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub default_sound_mix: Option<String>,
}

impl GraphContent {
    /// Wraps a root level.
    #[must_use]
    pub fn with_root(root: Level) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    /// Adds a streaming slot.
    pub fn with_streaming(mut self, level: StreamingLevel) -> Self {
        self.streaming.push(level);
        self
    }

    /// Adds a composition tile.
    pub fn with_tile(mut self, tile: CompositionTile) -> Self {
        self.tiles.push(tile);
        self
    }

    /// Adds an auxiliary package.
    pub fn with_aux_package(mut self, package: impl Into<String>) -> Self {
        self.aux_packages.push(package.into());
        self
    }

    /// Sets the default sound mix.
    pub fn with_sound_mix(mut self, mix: impl Into<String>) -> Self {
        self.default_sound_mix = Some(mix.into());
        self
    }
}

impl VisitRefs for GraphContent {
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef)) {
        self.root.visit_refs(visitor);
        self.streaming.visit_refs(visitor);
    }

    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef)) {
        self.root.visit_refs_mut(visitor);
        self.streaming.visit_refs_mut(visitor);
    }
}
