// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-instance timer/deferred service swapping around update slices.
//!
//! Several instances may share one [`OwningContext`](crate::OwningContext).
//! For the duration of a graph's update slice the context must expose that
//! graph's private services only, so timers scheduled during one slice never
//! show up in another. The multiplexer installs the graph's pair on
//! [`UpdatePhase::BeforeUpdate`] and restores the saved pair on
//! [`UpdatePhase::AfterUpdate`].
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::graph::{Graph, GraphHandle};
use crate::sched::{DeferredQueue, ServiceHandle, TimerService};

/// Host update notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    /// A graph is about to run its per-frame logic.
    BeforeUpdate,
    /// A graph finished its per-frame logic and timers.
    AfterUpdate,
}

/// Identifier of one host listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Registration of a listener for one phase, kept by its owner and handed
/// back to [`Host::remove_update_listener`](crate::Host::remove_update_listener).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpdateRegistration {
    /// Host-assigned id.
    pub id: ListenerId,
    /// Phase the listener receives.
    pub phase: UpdatePhase,
}

/// Receiver of host update notifications.
///
/// Called for every updated graph; implementations filter by graph
/// themselves. Must not call back into the host.
pub trait UpdateListener {
    /// Handles `phase` for `graph`.
    fn on_update(&mut self, phase: UpdatePhase, graph: &GraphHandle);
}

type SavedServices = (ServiceHandle<TimerService>, ServiceHandle<DeferredQueue>);

/// Swaps one graph's private services into its owning context.
#[derive(Debug)]
pub struct SchedulerMultiplexer {
    graph: Weak<RefCell<Graph>>,
    saved: Option<SavedServices>,
}

impl SchedulerMultiplexer {
    /// Creates a multiplexer for `graph`.
    #[must_use]
    pub fn new(graph: &GraphHandle) -> Self {
        Self {
            graph: Rc::downgrade(graph),
            saved: None,
        }
    }

    /// Returns `true` between install and restore.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.saved.is_some()
    }

    fn is_mine(&self, graph: &GraphHandle) -> bool {
        std::ptr::eq(self.graph.as_ptr(), Rc::as_ptr(graph))
    }

    fn install(&mut self, graph: &Graph) {
        let Some(ctx) = graph.owning_context() else {
            return;
        };
        if self.saved.is_some() {
            debug_assert!(false, "nested scheduler install for {}", graph.name());
            return;
        }
        let previous = ctx
            .borrow_mut()
            .replace_services(graph.timers(), graph.deferred());
        trace!(graph = graph.name(), "scheduler services installed");
        self.saved = Some(previous);
    }

    fn restore(&mut self, graph: &Graph) {
        let Some((timers, deferred)) = self.saved.take() else {
            return;
        };
        if let Some(ctx) = graph.owning_context() {
            ctx.borrow_mut().replace_services(timers, deferred);
            trace!(graph = graph.name(), "scheduler services restored");
        }
    }
}

impl UpdateListener for SchedulerMultiplexer {
    fn on_update(&mut self, phase: UpdatePhase, graph: &GraphHandle) {
        if !self.is_mine(graph) {
            return;
        }
        let g = graph.borrow();
        match phase {
            UpdatePhase::BeforeUpdate => self.install(&g),
            UpdatePhase::AfterUpdate => self.restore(&g),
        }
    }
}
