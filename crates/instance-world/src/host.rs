// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host facade: the cross-instance engine state instances interpose into.
//!
//! The host owns everything an instance borrows but does not own itself:
//! template access, package storage, execution contexts, resource holds, the
//! update-listener list and the global phase flags that gate forced
//! collection. It also drives the per-frame update loop.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use crate::graph::{Graph, GraphHandle};
use crate::multiplex::{ListenerId, UpdateListener, UpdatePhase, UpdateRegistration};
use crate::registry::NamespaceRegistry;
use crate::sched::{OwningContextHandle, TimerFired};
use crate::source::TemplateSource;
use crate::storage::PackageStore;
use crate::streaming::process_streaming;

/// Port for outstanding shader/async compile work.
pub trait CompileQueue {
    /// Jobs still outstanding.
    fn pending(&self) -> usize;
    /// Makes progress on outstanding jobs.
    fn poll(&mut self);
}

/// Compile queue that never has work.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPendingWork;

impl CompileQueue for NoPendingWork {
    fn pending(&self) -> usize {
        0
    }

    fn poll(&mut self) {}
}

/// Port for the audio device graphs play through.
pub trait AudioDevice {
    /// Applies a base sound mix.
    fn set_base_mix(&mut self, mix: &str);
    /// Drops everything queued for `graph`.
    fn flush(&mut self, graph: &str);
    /// Sets the transient master volume.
    fn set_transient_volume(&mut self, volume: f32);
}

/// Audio device that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudio;

impl AudioDevice for NullAudio {
    fn set_base_mix(&mut self, _mix: &str) {}
    fn flush(&mut self, _graph: &str) {}
    fn set_transient_volume(&mut self, _volume: f32) {}
}

/// Identifier of a registered execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Host-side record tying a graph to its owning context.
#[derive(Debug)]
pub struct ExecutionContext {
    graph: Weak<RefCell<Graph>>,
    owning: Option<OwningContextHandle>,
    last_url: Option<String>,
}

impl ExecutionContext {
    /// Graph of this context, if still alive.
    #[must_use]
    pub fn graph(&self) -> Option<GraphHandle> {
        self.graph.upgrade()
    }

    /// Owning context installed for the graph.
    #[must_use]
    pub fn owning(&self) -> Option<&OwningContextHandle> {
        self.owning.as_ref()
    }

    /// Installs the owning context.
    pub fn set_owning(&mut self, owning: Option<OwningContextHandle>) {
        self.owning = owning;
    }

    /// Last package the context loaded.
    #[must_use]
    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    /// Records the last package the context loaded.
    pub fn set_last_url(&mut self, url: impl Into<String>) {
        self.last_url = Some(url.into());
    }
}

/// Kind of package held alive for a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HoldKind {
    /// Requested extension package.
    Extension,
    /// The graph's own package.
    GraphPackage,
    /// Per-graph auxiliary package.
    Auxiliary,
}

/// A package held alive on behalf of a context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxHold {
    /// Holding context.
    pub context: ContextId,
    /// Why it is held.
    pub kind: HoldKind,
    /// Held package.
    pub package: String,
}

/// What one update tick did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Graphs that ran an update slice.
    pub graphs_updated: usize,
    /// Timers that fired, in firing order.
    pub timers_fired: Vec<TimerFired>,
    /// Deferred actions that ran, in order.
    pub deferred_run: Vec<String>,
    /// Streaming levels that loaded.
    pub levels_streamed: usize,
}

struct ListenerEntry {
    registration: UpdateRegistration,
    listener: Weak<RefCell<dyn UpdateListener>>,
}

/// Cross-instance engine state and the update loop.
pub struct Host {
    templates: Box<dyn TemplateSource>,
    compile: Box<dyn CompileQueue>,
    audio: Box<dyn AudioDevice>,
    registry: NamespaceRegistry,
    packages: PackageStore,
    contexts: BTreeMap<ContextId, ExecutionContext>,
    next_context: u64,
    listeners: Vec<ListenerEntry>,
    next_listener: u64,
    holds: Vec<AuxHold>,
    shutting_down: bool,
    ending_session: bool,
    collecting: bool,
    editor: bool,
    collections: usize,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("registry", &self.registry)
            .field("packages", &self.packages)
            .field("contexts", &self.contexts)
            .field("listeners", &self.listeners.len())
            .field("holds", &self.holds)
            .field("shutting_down", &self.shutting_down)
            .field("ending_session", &self.ending_session)
            .field("collecting", &self.collecting)
            .field("editor", &self.editor)
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Creates a host reading templates from `templates`, with no compile
    /// work, silent audio and a fresh registry.
    pub fn new(templates: impl TemplateSource + 'static) -> Self {
        Self {
            templates: Box::new(templates),
            compile: Box::new(NoPendingWork),
            audio: Box::new(NullAudio),
            registry: NamespaceRegistry::new(),
            packages: PackageStore::new(),
            contexts: BTreeMap::new(),
            next_context: 1,
            listeners: Vec::new(),
            next_listener: 1,
            holds: Vec::new(),
            shutting_down: false,
            ending_session: false,
            collecting: false,
            editor: false,
            collections: 0,
        }
    }

    /// Replaces the compile queue port.
    pub fn with_compile_queue(mut self, queue: impl CompileQueue + 'static) -> Self {
        self.compile = Box::new(queue);
        self
    }

    /// Replaces the audio device port.
    pub fn with_audio(mut self, audio: impl AudioDevice + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    /// Marks the host as an editor/offline context.
    pub fn with_editor(mut self, editor: bool) -> Self {
        self.editor = editor;
        self
    }

    /// Template source.
    #[must_use]
    pub fn templates(&self) -> &dyn TemplateSource {
        self.templates.as_ref()
    }

    /// Namespace registry shared with duplicators.
    #[must_use]
    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    /// Package storage.
    #[must_use]
    pub fn packages(&self) -> &PackageStore {
        &self.packages
    }

    /// Mutable package storage.
    pub fn packages_mut(&mut self) -> &mut PackageStore {
        &mut self.packages
    }

    /// Audio device.
    pub fn audio_mut(&mut self) -> &mut dyn AudioDevice {
        self.audio.as_mut()
    }

    /// Returns `true` for editor/offline hosts.
    #[must_use]
    pub fn is_editor(&self) -> bool {
        self.editor
    }

    // ── execution contexts ───────────────────────────────────────────

    /// Registers a context for `graph`.
    pub fn create_context(&mut self, graph: &GraphHandle) -> ContextId {
        let id = ContextId(self.next_context);
        self.next_context += 1;
        self.contexts.insert(
            id,
            ExecutionContext {
                graph: Rc::downgrade(graph),
                owning: None,
                last_url: None,
            },
        );
        debug!(context = id.get(), graph = graph.borrow().name(), "context created");
        id
    }

    /// Looks up a context.
    #[must_use]
    pub fn context(&self, id: ContextId) -> Option<&ExecutionContext> {
        self.contexts.get(&id)
    }

    /// Looks up a context mutably.
    pub fn context_mut(&mut self, id: ContextId) -> Option<&mut ExecutionContext> {
        self.contexts.get_mut(&id)
    }

    /// Finds the context registered for `graph`.
    #[must_use]
    pub fn context_for(&self, graph: &GraphHandle) -> Option<ContextId> {
        self.contexts
            .iter()
            .find(|(_, ctx)| std::ptr::eq(ctx.graph.as_ptr(), Rc::as_ptr(graph)))
            .map(|(id, _)| *id)
    }

    /// Deregisters a context. Returns `true` if it existed.
    pub fn destroy_context(&mut self, id: ContextId) -> bool {
        let removed = self.contexts.remove(&id).is_some();
        if removed {
            debug!(context = id.get(), "context destroyed");
        }
        removed
    }

    /// Number of registered contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    // ── holds ────────────────────────────────────────────────────────

    /// Holds `package` alive for `context`.
    pub fn acquire_hold(&mut self, context: ContextId, kind: HoldKind, package: impl Into<String>) {
        self.holds.push(AuxHold {
            context,
            kind,
            package: package.into(),
        });
    }

    /// Releases every hold of `context`, most recent first, and returns them
    /// in release order.
    pub fn release_holds(&mut self, context: ContextId) -> Vec<AuxHold> {
        let (mine, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.holds).into_iter().partition(|h| h.context == context);
        self.holds = rest;
        let mut released = mine;
        released.reverse();
        released
    }

    /// Holds currently in effect, in acquisition order.
    #[must_use]
    pub fn holds(&self) -> &[AuxHold] {
        &self.holds
    }

    // ── phase flags ──────────────────────────────────────────────────

    /// Enters process shutdown. Never cleared.
    pub fn begin_shutdown(&mut self) {
        self.shutting_down = true;
    }

    /// Returns `true` once shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Enters an end-of-session transition.
    pub fn begin_session_end(&mut self) {
        self.ending_session = true;
    }

    /// Leaves the end-of-session transition.
    pub fn end_session_end(&mut self) {
        self.ending_session = false;
    }

    /// Returns `true` during an end-of-session transition.
    #[must_use]
    pub fn is_ending_session(&self) -> bool {
        self.ending_session
    }

    /// Marks a host-driven collection as running.
    pub fn begin_collection(&mut self) {
        self.collecting = true;
    }

    /// Marks the host-driven collection as finished.
    pub fn end_collection(&mut self) {
        self.collecting = false;
    }

    /// Returns `true` while a collection is running.
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    // ── collection ───────────────────────────────────────────────────

    /// Runs one synchronous full collection pass: removes garbage storage
    /// and forgets dead contexts and listeners. Returns the number of storage
    /// slots removed.
    ///
    /// A pass nested inside a host-driven collection leaves the outer
    /// collection flag set.
    pub fn collect_garbage(&mut self) -> usize {
        let outer = std::mem::replace(&mut self.collecting, true);
        let removed = self.packages.collect();
        self.contexts.retain(|_, ctx| ctx.graph.strong_count() > 0);
        self.listeners.retain(|l| l.listener.strong_count() > 0);
        self.collecting = outer;
        self.collections += 1;
        info!(removed, pass = self.collections, "full collection pass");
        removed
    }

    /// Number of full collection passes run so far.
    #[must_use]
    pub fn collections(&self) -> usize {
        self.collections
    }

    // ── update loop ──────────────────────────────────────────────────

    /// Registers `listener` for `phase`. The host keeps a weak reference
    /// only; dropping the listener silently ends its registration.
    pub fn add_update_listener<L: UpdateListener + 'static>(
        &mut self,
        listener: &Rc<RefCell<L>>,
        phase: UpdatePhase,
    ) -> UpdateRegistration {
        let registration = UpdateRegistration {
            id: ListenerId::new(self.next_listener),
            phase,
        };
        self.next_listener += 1;
        let weak = Rc::downgrade(listener);
        let weak: Weak<RefCell<dyn UpdateListener>> = weak;
        self.listeners.push(ListenerEntry {
            registration,
            listener: weak,
        });
        registration
    }

    /// Ends a registration. Returns `true` if it was registered.
    pub fn remove_update_listener(&mut self, registration: &UpdateRegistration) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.registration.id != registration.id);
        before != self.listeners.len()
    }

    /// Number of live listener registrations.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .iter()
            .filter(|l| l.listener.strong_count() > 0)
            .count()
    }

    fn notify(&mut self, phase: UpdatePhase, graph: &GraphHandle) {
        self.listeners.retain(|l| l.listener.strong_count() > 0);
        let targets: Vec<_> = self
            .listeners
            .iter()
            .filter(|l| l.registration.phase == phase)
            .filter_map(|l| l.listener.upgrade())
            .collect();
        for listener in targets {
            match listener.try_borrow_mut() {
                Ok(mut l) => l.on_update(phase, graph),
                Err(_) => warn!(?phase, "update listener re-entered; notification dropped"),
            }
        }
    }

    /// Blocks until the compile queue drains. Returns the number of polls.
    pub fn settle_compile_work(&mut self) -> usize {
        let mut polls = 0;
        while self.compile.pending() > 0 {
            self.compile.poll();
            polls += 1;
        }
        if polls > 0 {
            debug!(polls, "compile work settled");
        }
        polls
    }

    /// Runs one update tick with no per-frame logic.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        self.tick_with(dt, |_| {})
    }

    /// Runs one update tick.
    ///
    /// For every live context whose graph should update and is not tearing
    /// down, in context order: admit stream-ins, notify
    /// [`UpdatePhase::BeforeUpdate`], run `logic`, advance the graph's active
    /// timers and deferred queue, notify [`UpdatePhase::AfterUpdate`].
    pub fn tick_with<F: FnMut(&GraphHandle)>(&mut self, dt: f64, mut logic: F) -> TickReport {
        let mut report = TickReport::default();
        let graphs: Vec<GraphHandle> = self.contexts.values().filter_map(ExecutionContext::graph).collect();
        for graph in graphs {
            {
                let g = graph.borrow();
                if !g.should_update() || g.is_tearing_down() {
                    continue;
                }
            }
            report.levels_streamed += process_streaming(&graph, self);

            graph.borrow_mut().set_in_update(true);
            self.notify(UpdatePhase::BeforeUpdate, &graph);
            logic(&graph);
            let (timers, deferred) = {
                let g = graph.borrow();
                (g.active_timers(), g.active_deferred())
            };
            report.timers_fired.extend(timers.borrow_mut().tick(dt));
            report.deferred_run.extend(deferred.borrow_mut().tick());
            self.notify(UpdatePhase::AfterUpdate, &graph);
            {
                let mut g = graph.borrow_mut();
                g.set_in_update(false);
                g.set_loaded_this_tick(false);
            }
            report.graphs_updated += 1;
        }
        report
    }
}
