// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording doubles for the host ports and instance hooks.
//!
//! Every double is cheap to clone and clones share their state, so a test can
//! move one copy into the host and inspect the other afterwards.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use instance_world::{
    AudioDevice, CaptureSink, CompileQueue, Component, Graph, GraphHandle, InstanceId,
    UpdateListener, UpdatePhase,
};

/// Shared, append-only event log.
pub type EventLog = Rc<RefCell<Vec<String>>>;

/// Component that records its callbacks as `register:<graph>`,
/// `unregister:<graph>` and `destroy`.
#[derive(Clone, Debug)]
pub struct RecordingComponent {
    name: String,
    log: EventLog,
}

impl RecordingComponent {
    /// Creates a component called `name` with a fresh log.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            log: EventLog::default(),
        }
    }

    /// Handle on the log; stays readable after the component is boxed away.
    pub fn log(&self) -> EventLog {
        Rc::clone(&self.log)
    }
}

impl Component for RecordingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_register(&mut self, graph: &Graph) {
        self.log.borrow_mut().push(format!("register:{}", graph.name()));
    }

    fn on_unregister(&mut self, graph: &Graph) {
        self.log.borrow_mut().push(format!("unregister:{}", graph.name()));
    }

    fn on_destroy(&mut self) {
        self.log.borrow_mut().push("destroy".to_owned());
    }
}

/// Compile queue holding a fixed number of jobs; each poll finishes one.
#[derive(Clone, Debug, Default)]
pub struct ScriptedCompileQueue {
    pending: Rc<Cell<usize>>,
    polls: Rc<Cell<usize>>,
}

impl ScriptedCompileQueue {
    /// Queue with `jobs` outstanding.
    pub fn new(jobs: usize) -> Self {
        let queue = Self::default();
        queue.pending.set(jobs);
        queue
    }

    /// Adds `jobs` more outstanding jobs.
    pub fn enqueue(&self, jobs: usize) {
        self.pending.set(self.pending.get() + jobs);
    }

    /// Number of polls so far.
    pub fn polls(&self) -> usize {
        self.polls.get()
    }
}

impl CompileQueue for ScriptedCompileQueue {
    fn pending(&self) -> usize {
        self.pending.get()
    }

    fn poll(&mut self) {
        self.polls.set(self.polls.get() + 1);
        self.pending.set(self.pending.get().saturating_sub(1));
    }
}

/// Call recorded by [`RecordingAudio`].
#[derive(Clone, Debug, PartialEq)]
pub enum AudioEvent {
    /// Base mix applied.
    BaseMix(String),
    /// Graph audio flushed.
    Flush(String),
    /// Transient volume changed.
    Volume(f32),
}

/// Audio device that records every call.
#[derive(Clone, Debug, Default)]
pub struct RecordingAudio {
    events: Rc<RefCell<Vec<AudioEvent>>>,
}

impl RecordingAudio {
    /// Creates a device with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded calls.
    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.borrow().clone()
    }
}

impl AudioDevice for RecordingAudio {
    fn set_base_mix(&mut self, mix: &str) {
        self.events.borrow_mut().push(AudioEvent::BaseMix(mix.to_owned()));
    }

    fn flush(&mut self, graph: &str) {
        self.events.borrow_mut().push(AudioEvent::Flush(graph.to_owned()));
    }

    fn set_transient_volume(&mut self, volume: f32) {
        self.events.borrow_mut().push(AudioEvent::Volume(volume));
    }
}

/// One capture: instance, graph name and number of root resources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capture {
    /// Captured instance.
    pub instance: InstanceId,
    /// Its graph name.
    pub graph: String,
    /// Root resources at capture time.
    pub resources: usize,
}

/// Capture sink that records what it was handed.
#[derive(Clone, Debug, Default)]
pub struct RecordingCaptureSink {
    captures: Vec<Capture>,
}

impl RecordingCaptureSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures so far, in order.
    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }
}

impl CaptureSink for RecordingCaptureSink {
    fn capture(&mut self, instance: InstanceId, graph: &Graph) {
        self.captures.push(Capture {
            instance,
            graph: graph.name().to_owned(),
            resources: graph.content().root.resources.len(),
        });
    }
}

/// Update listener recording `(phase, graph name)` pairs.
#[derive(Debug, Default)]
pub struct PhaseRecorder {
    /// Notifications in delivery order.
    pub seen: Vec<(UpdatePhase, String)>,
}

impl UpdateListener for PhaseRecorder {
    fn on_update(&mut self, phase: UpdatePhase, graph: &GraphHandle) {
        self.seen.push((phase, graph.borrow().name().to_owned()));
    }
}
