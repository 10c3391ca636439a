// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime graph owned by one instance.
use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::ident::InstanceId;
use crate::namespace;
use crate::resource::{GraphContent, Resource, StreamState, ROOT_OBJECT_NAME};
use crate::sched::{DeferredQueue, OwningContextHandle, ServiceHandle, TimerService};

/// Shared handle to a [`Graph`].
pub type GraphHandle = Rc<RefCell<Graph>>;

/// Internal systems a graph may carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphSystems {
    /// Audio playback enabled.
    pub audio_playback: bool,
    /// Physics scene created.
    pub physics_scene: bool,
    /// Physics scene simulates each update.
    pub simulate_physics: bool,
    /// Visual-effects system created.
    pub fx_system: bool,
    /// Systems were set up for a freshly synthesized graph.
    pub initialized_as_new: bool,
}

/// A loaded, namespaced graph: content, systems and runtime flags.
#[derive(Debug)]
pub struct Graph {
    name: String,
    instance: InstanceId,
    source: Option<String>,
    content: GraphContent,
    systems: Option<GraphSystems>,
    begun_running: bool,
    tearing_down: bool,
    streaming_frozen: bool,
    force_unload_streaming: bool,
    should_update: bool,
    loaded_this_tick: bool,
    in_update: bool,
    garbage: bool,
    timers: ServiceHandle<TimerService>,
    deferred: ServiceHandle<DeferredQueue>,
    owning_context: Option<OwningContextHandle>,
}

impl Graph {
    /// Creates a graph named `name` belonging to instance `instance`.
    ///
    /// `source` is the template package the content came from, if any.
    pub fn new(
        name: impl Into<String>,
        instance: InstanceId,
        source: Option<String>,
        content: GraphContent,
    ) -> Self {
        Self {
            name: name.into(),
            instance,
            source,
            content,
            systems: None,
            begun_running: false,
            tearing_down: false,
            streaming_frozen: false,
            force_unload_streaming: false,
            should_update: false,
            loaded_this_tick: false,
            in_update: false,
            garbage: false,
            timers: TimerService::handle(),
            deferred: DeferredQueue::handle(),
            owning_context: None,
        }
    }

    /// Wraps the graph in a shared handle.
    #[must_use]
    pub fn into_handle(self) -> GraphHandle {
        Rc::new(RefCell::new(self))
    }

    /// Namespaced package identity.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning instance.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Template package the graph was duplicated from.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Graph content.
    #[must_use]
    pub fn content(&self) -> &GraphContent {
        &self.content
    }

    /// Mutable graph content.
    pub fn content_mut(&mut self) -> &mut GraphContent {
        &mut self.content
    }

    /// Internal systems, once initialized.
    #[must_use]
    pub fn systems(&self) -> Option<GraphSystems> {
        self.systems
    }

    /// Returns `true` once [`init_systems`](Self::init_systems) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.systems.is_some()
    }

    /// Sets up internal systems. Ignored if they already exist.
    pub fn init_systems(&mut self, systems: GraphSystems) {
        if self.systems.is_none() {
            debug!(graph = %self.name, ?systems, "graph systems initialized");
            self.systems = Some(systems);
        }
    }

    /// Tears down internal systems. Returns `true` if there were any.
    pub fn destroy_systems(&mut self) -> bool {
        self.systems.take().is_some()
    }

    /// Returns `true` while the graph is valid for registration and updates.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.garbage && !self.tearing_down
    }

    /// Returns `true` after `begin_running` and before `end_running`.
    #[must_use]
    pub fn has_begun_running(&self) -> bool {
        self.begun_running
    }

    /// Begins every idle resource of the root level and of every shown
    /// streaming level. Resources that already began are skipped.
    pub fn begin_running(&mut self) -> usize {
        let mut begun = self.content.root.begin_running();
        for slot in &mut self.content.streaming {
            if let Some(level) = &mut slot.loaded {
                begun += level.begin_running();
            }
        }
        self.begun_running = true;
        begun
    }

    /// Ends every running resource, streaming levels first, each level in
    /// reverse declaration order.
    pub fn end_running(&mut self) -> usize {
        let mut ended = 0;
        for slot in self.content.streaming.iter_mut().rev() {
            if let Some(level) = &mut slot.loaded {
                ended += level.end_running();
            }
        }
        ended += self.content.root.end_running();
        self.begun_running = false;
        ended
    }

    /// Adds a top-level resource, renaming it if the name is taken, and begins
    /// it when the graph is running. Returns its sub-path (`Root.<name>`).
    pub fn spawn(&mut self, mut resource: Resource) -> String {
        if self.content.root.contains(&resource.name) {
            let base = std::mem::take(&mut resource.name);
            let mut n = 1_u32;
            let mut candidate = format!("{base}_{n}");
            while self.content.root.contains(&candidate) {
                n += 1;
                candidate = format!("{base}_{n}");
            }
            resource.name = candidate;
        }
        let sub_path = format!("{ROOT_OBJECT_NAME}.{}", resource.name);
        self.content.root.resources.push(resource);
        if self.begun_running {
            self.content.root.begin_running();
        }
        debug!(graph = %self.name, %sub_path, "spawned resource");
        sub_path
    }

    /// Requests the streaming slot for `package` (namespaced or source name).
    ///
    /// Returns `false` if no slot matches or the graph is tearing down.
    pub fn request_stream_in(&mut self, package: &str) -> bool {
        if self.tearing_down {
            return false;
        }
        let Some(slot) = self
            .content
            .streaming
            .iter_mut()
            .find(|s| s.package == package || s.load_package() == package)
        else {
            return false;
        };
        slot.should_be_loaded = true;
        slot.should_be_visible = true;
        if matches!(
            slot.state,
            StreamState::Unloaded | StreamState::Cancelled | StreamState::Failed
        ) {
            slot.state = StreamState::Pending;
        }
        true
    }

    /// Sets the visibility request of the slot for `package`. A level left
    /// hidden is dropped when the graph tears down.
    pub fn set_stream_visibility(&mut self, package: &str, visible: bool) -> bool {
        match self
            .content
            .streaming
            .iter_mut()
            .find(|s| s.package == package || s.load_package() == package)
        {
            Some(slot) => {
                slot.should_be_visible = visible;
                true
            }
            None => false,
        }
    }

    /// Every package this graph owns storage for: its own and every
    /// streaming slot's.
    #[must_use]
    pub fn owned_packages(&self) -> Vec<String> {
        let mut out = vec![self.name.clone()];
        out.extend(
            self.content
                .streaming
                .iter()
                .map(|s| s.package.clone())
                .filter(|p| namespace::instance_of(p) == Some(self.instance)),
        );
        out
    }

    /// Private timer service.
    #[must_use]
    pub fn timers(&self) -> ServiceHandle<TimerService> {
        Rc::clone(&self.timers)
    }

    /// Private deferred-action queue.
    #[must_use]
    pub fn deferred(&self) -> ServiceHandle<DeferredQueue> {
        Rc::clone(&self.deferred)
    }

    /// Timer service currently in effect: the owning context's current one
    /// when a context is installed, otherwise the private one.
    #[must_use]
    pub fn active_timers(&self) -> ServiceHandle<TimerService> {
        match &self.owning_context {
            Some(ctx) => ctx.borrow().timers(),
            None => self.timers(),
        }
    }

    /// Deferred-action queue currently in effect.
    #[must_use]
    pub fn active_deferred(&self) -> ServiceHandle<DeferredQueue> {
        match &self.owning_context {
            Some(ctx) => ctx.borrow().deferred(),
            None => self.deferred(),
        }
    }

    /// Owning context, if installed.
    #[must_use]
    pub fn owning_context(&self) -> Option<&OwningContextHandle> {
        self.owning_context.as_ref()
    }

    /// Installs or clears the owning context.
    pub fn set_owning_context(&mut self, ctx: Option<OwningContextHandle>) {
        self.owning_context = ctx;
    }

    /// Returns `true` if the host should update this graph every frame.
    #[must_use]
    pub fn should_update(&self) -> bool {
        self.should_update
    }

    /// Sets the continuous-update flag.
    pub fn set_should_update(&mut self, update: bool) {
        self.should_update = update;
    }

    /// Returns `true` during the frame the graph finished loading.
    #[must_use]
    pub fn loaded_this_tick(&self) -> bool {
        self.loaded_this_tick
    }

    /// Sets the loaded-this-tick flag.
    pub fn set_loaded_this_tick(&mut self, loaded: bool) {
        self.loaded_this_tick = loaded;
    }

    /// Returns `true` between the update-begin and update-end notifications.
    #[must_use]
    pub fn in_update(&self) -> bool {
        self.in_update
    }

    pub(crate) fn set_in_update(&mut self, in_update: bool) {
        self.in_update = in_update;
    }

    /// Returns `true` once teardown has started.
    #[must_use]
    pub fn is_tearing_down(&self) -> bool {
        self.tearing_down
    }

    /// Returns `true` while stream-ins are held back.
    #[must_use]
    pub fn is_streaming_frozen(&self) -> bool {
        self.streaming_frozen
    }

    /// Holds back or releases stream-in admission.
    pub fn set_streaming_frozen(&mut self, frozen: bool) {
        self.streaming_frozen = frozen;
    }

    /// Returns `true` when pending stream-ins are to be cancelled.
    #[must_use]
    pub fn force_unload_streaming(&self) -> bool {
        self.force_unload_streaming
    }

    /// Enters teardown: stops admission and makes the next flush cancel.
    pub(crate) fn begin_tear_down(&mut self) {
        self.tearing_down = true;
        self.streaming_frozen = false;
        self.force_unload_streaming = true;
    }

    /// Returns `true` once the graph has been marked for collection.
    #[must_use]
    pub fn is_garbage(&self) -> bool {
        self.garbage
    }

    pub(crate) fn mark_garbage(&mut self) {
        self.garbage = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Level, StreamingLevel};
    use crate::sched::OwningContext;

    fn graph() -> Graph {
        let content = GraphContent::with_root(
            Level::new()
                .with_resource(Resource::new("Lamp", "Light"))
                .with_resource(Resource::new("Door", "Mesh")),
        )
        .with_streaming(StreamingLevel {
            package_to_load: Some("Scenes/Hall_Sub".to_owned()),
            ..StreamingLevel::new("Scenes/INST_3_Hall_Sub")
        });
        Graph::new("Scenes/INST_3_Hall", InstanceId::new(3), Some("Scenes/Hall".to_owned()), content)
    }

    #[test]
    fn spawn_picks_unique_names_and_begins_when_running() {
        let mut g = graph();
        assert_eq!(g.begin_running(), 2);
        assert_eq!(g.spawn(Resource::new("Lamp", "Light")), "Root.Lamp_1");
        assert_eq!(g.spawn(Resource::new("Lamp", "Light")), "Root.Lamp_2");
        assert!(g.content().root.find("Lamp_2").is_some_and(Resource::has_begun_running));
        assert_eq!(g.end_running(), 4);
    }

    #[test]
    fn stream_requests_match_either_name() {
        let mut g = graph();
        assert!(g.request_stream_in("Scenes/Hall_Sub"));
        assert!(g.content().streaming[0].is_pending());
        assert!(!g.request_stream_in("Scenes/Other"));
        g.begin_tear_down();
        assert!(!g.request_stream_in("Scenes/INST_3_Hall_Sub"));
        assert!(g.force_unload_streaming());
    }

    #[test]
    fn active_services_follow_the_owning_context() {
        let mut g = graph();
        assert!(Rc::ptr_eq(&g.active_timers(), &g.timers()));
        let ctx = OwningContext::new("session").into_handle();
        g.set_owning_context(Some(Rc::clone(&ctx)));
        assert!(Rc::ptr_eq(&g.active_timers(), &ctx.borrow().timers()));
        assert!(!Rc::ptr_eq(&g.active_timers(), &g.timers()));
    }

    #[test]
    fn owned_packages_cover_namespaced_slots() {
        let g = graph();
        assert_eq!(g.owned_packages(), vec!["Scenes/INST_3_Hall", "Scenes/INST_3_Hall_Sub"]);
    }
}
