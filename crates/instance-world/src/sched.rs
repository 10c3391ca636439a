// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Timer and deferred-callback services, and the owning context that borrows
//! them.
//!
//! Services are plain single-threaded state machines advanced by the host
//! update loop. Graphs own a private pair; an [`OwningContext`] holds the pair
//! that is *current* for whoever reads it, which the
//! [`SchedulerMultiplexer`](crate::SchedulerMultiplexer) swaps per update
//! slice.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::reference::Value;

/// Shared handle to a scheduler service.
pub type ServiceHandle<T> = Rc<RefCell<T>>;

static NEXT_SCHED_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> u64 {
    NEXT_SCHED_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// Process-unique handle of a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

/// Process-unique handle of a deferred action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeferredHandle(u64);

/// A timer that elapsed during [`TimerService::tick`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerFired {
    /// Timer that fired.
    pub handle: TimerHandle,
    /// Label it was scheduled with.
    pub label: String,
}

#[derive(Debug)]
struct Timer {
    handle: TimerHandle,
    label: String,
    remaining: f64,
    interval: f64,
    looping: bool,
}

/// Labelled countdown timers.
#[derive(Debug, Default)]
pub struct TimerService {
    timers: Vec<Timer>,
}

impl TimerService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh service in a shared handle.
    #[must_use]
    pub fn handle() -> ServiceHandle<Self> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Schedules `label` to fire after `delay` seconds, repeating every
    /// `delay` seconds when `looping`.
    pub fn set_timer(&mut self, label: impl Into<String>, delay: f64, looping: bool) -> TimerHandle {
        let handle = TimerHandle(next_handle());
        let label = label.into();
        trace!(?handle, %label, delay, looping, "timer set");
        self.timers.push(Timer {
            handle,
            label,
            remaining: delay,
            interval: delay,
            looping,
        });
        handle
    }

    /// Cancels a timer. Returns `true` if it was active.
    pub fn clear(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        before != self.timers.len()
    }

    /// Returns `true` if `handle` is scheduled here.
    #[must_use]
    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    /// Returns `true` if any scheduled timer carries `label`.
    #[must_use]
    pub fn contains_label(&self, label: &str) -> bool {
        self.timers.iter().any(|t| t.label == label)
    }

    /// Number of scheduled timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns `true` if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Advances every timer by `dt` seconds.
    ///
    /// A looping timer fires at most once per tick. One-shot timers are
    /// removed after firing.
    pub fn tick(&mut self, dt: f64) -> Vec<TimerFired> {
        let mut fired = Vec::new();
        self.timers.retain_mut(|t| {
            t.remaining -= dt;
            if t.remaining > 0.0 {
                return true;
            }
            fired.push(TimerFired {
                handle: t.handle,
                label: t.label.clone(),
            });
            if t.looping {
                t.remaining = if t.interval > 0.0 {
                    t.remaining.max(-t.interval) + t.interval
                } else {
                    0.0
                };
            }
            t.looping
        });
        fired
    }
}

#[derive(Debug)]
struct Deferred {
    handle: DeferredHandle,
    label: String,
    frames_left: u32,
}

/// Actions run a number of update frames from now.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    pending: Vec<Deferred>,
}

impl DeferredQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh queue in a shared handle.
    #[must_use]
    pub fn handle() -> ServiceHandle<Self> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Queues `label` to run on the `frames`-th call to [`tick`](Self::tick)
    /// from now; 0 counts as 1.
    ///
    /// The host ticks a graph's deferred queue at the end of its update
    /// slice, so an action deferred by 1 frame from inside a slice runs at
    /// the end of that same slice.
    pub fn defer(&mut self, label: impl Into<String>, frames: u32) -> DeferredHandle {
        let handle = DeferredHandle(next_handle());
        self.pending.push(Deferred {
            handle,
            label: label.into(),
            frames_left: frames.max(1),
        });
        handle
    }

    /// Drops a queued action. Returns `true` if it was queued.
    pub fn cancel(&mut self, handle: DeferredHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|d| d.handle != handle);
        before != self.pending.len()
    }

    /// Returns `true` if any queued action carries `label`.
    #[must_use]
    pub fn contains_label(&self, label: &str) -> bool {
        self.pending.iter().any(|d| d.label == label)
    }

    /// Number of queued actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Advances one frame and returns the labels of the actions that ran.
    pub fn tick(&mut self) -> Vec<String> {
        let mut ran = Vec::new();
        self.pending.retain_mut(|d| {
            d.frames_left -= 1;
            if d.frames_left == 0 {
                ran.push(std::mem::take(&mut d.label));
                false
            } else {
                true
            }
        });
        ran
    }
}

/// Shared higher-level session state that one or more instances may belong
/// to.
///
/// Readers reach timers and deferred actions through
/// [`timers`](Self::timers) / [`deferred`](Self::deferred), which return
/// whatever pair is current.
#[derive(Debug)]
pub struct OwningContext {
    name: String,
    timers: ServiceHandle<TimerService>,
    deferred: ServiceHandle<DeferredQueue>,
    state: BTreeMap<String, Value>,
}

/// Shared handle to an [`OwningContext`].
pub type OwningContextHandle = Rc<RefCell<OwningContext>>;

impl OwningContext {
    /// Creates a context with its own default services.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timers: TimerService::handle(),
            deferred: DeferredQueue::handle(),
            state: BTreeMap::new(),
        }
    }

    /// Wraps the context in a shared handle.
    #[must_use]
    pub fn into_handle(self) -> OwningContextHandle {
        Rc::new(RefCell::new(self))
    }

    /// Context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current timer service.
    #[must_use]
    pub fn timers(&self) -> ServiceHandle<TimerService> {
        Rc::clone(&self.timers)
    }

    /// Current deferred-action queue.
    #[must_use]
    pub fn deferred(&self) -> ServiceHandle<DeferredQueue> {
        Rc::clone(&self.deferred)
    }

    /// Installs a service pair and returns the one it replaced.
    pub fn replace_services(
        &mut self,
        timers: ServiceHandle<TimerService>,
        deferred: ServiceHandle<DeferredQueue>,
    ) -> (ServiceHandle<TimerService>, ServiceHandle<DeferredQueue>) {
        (
            std::mem::replace(&mut self.timers, timers),
            std::mem::replace(&mut self.deferred, deferred),
        )
    }

    /// Shared state value.
    #[must_use]
    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Sets a shared state value, returning the previous one.
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.state.insert(key.into(), value)
    }
}
