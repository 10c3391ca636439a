// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Load/unload sequencing for instance graphs.
//!
//! [`Lifecycle::initialize`] mirrors a host "load scene" sequence adapted to
//! contexts that have no player; [`Lifecycle::dispose`] mirrors "unload
//! scene" and ends with a forced collection unless the host is already in a
//! window where collecting is unsafe.
use thiserror::Error;
use tracing::{debug, info};

use crate::config::WorldOptions;
use crate::graph::GraphHandle;
use crate::host::{AuxHold, ContextId, HoldKind, Host};
use crate::streaming::{flush_streaming, process_streaming};

/// Stage of an instance's life. Advances strictly forward, one step at a
/// time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Graph being produced.
    #[default]
    Constructing,
    /// Graph being brought up.
    Initializing,
    /// Graph live and updating.
    Running,
    /// Teardown in progress.
    TearingDown,
    /// Torn down; terminal.
    Destroyed,
}

impl LifecycleState {
    /// State that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Constructing => Some(Self::Initializing),
            Self::Initializing => Some(Self::Running),
            Self::Running => Some(Self::TearingDown),
            Self::TearingDown => Some(Self::Destroyed),
            Self::Destroyed => None,
        }
    }

    /// Moves to `to` if it directly follows the current state.
    pub fn advance(&mut self, to: Self) -> Result<(), LifecycleError> {
        if self.next() != Some(to) {
            return Err(LifecycleError::InvalidTransition { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

/// Errors from lifecycle sequencing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Transition skips or reverses a stage.
    #[error("invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state.
        from: LifecycleState,
        /// Requested state.
        to: LifecycleState,
    },
    /// The graph already has an execution context.
    #[error("graph {0} is already registered with the host")]
    AlreadyRegistered(String),
}

/// What [`Lifecycle::dispose`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// `false` when disposal was a no-op.
    pub performed: bool,
    /// Holds released, in release order.
    pub released_holds: Vec<AuxHold>,
    /// Pending stream-ins cancelled by the flush.
    pub cancelled_streams: usize,
    /// Loaded but hidden or unrequested levels dropped by the flush.
    pub unloaded_streams: usize,
    /// Storage slots marked for collection.
    pub marked_packages: usize,
    /// Whether a forced collection pass ran.
    pub forced_collection: bool,
}

/// Load and unload sequences.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lifecycle;

impl Lifecycle {
    /// Brings `graph` up and returns its execution context.
    pub fn initialize(
        host: &mut Host,
        graph: &GraphHandle,
        from_template: bool,
        options: &WorldOptions,
    ) -> Result<ContextId, LifecycleError> {
        if host.context_for(graph).is_some() {
            return Err(LifecycleError::AlreadyRegistered(graph.borrow().name().to_owned()));
        }
        let ctx = host.create_context(graph);

        {
            let mut g = graph.borrow_mut();
            if !g.is_initialized() {
                let mut systems = options.systems();
                systems.initialized_as_new = !from_template;
                g.init_systems(systems);
            }
            g.set_owning_context(options.owning_context.clone());
        }
        if let Some(exec) = host.context_mut(ctx) {
            exec.set_owning(options.owning_context.clone());
        }

        if options.allow_audio_playback {
            let mix = graph.borrow().content().default_sound_mix.clone();
            if let Some(mix) = mix {
                host.audio_mut().set_base_mix(&mix);
            }
        }

        if from_template {
            for package in &options.extension_packages {
                host.acquire_hold(ctx, HoldKind::Extension, package.clone());
            }
            host.settle_compile_work();

            let (name, aux, always) = {
                let g = graph.borrow();
                let always: Vec<String> = g
                    .content()
                    .streaming
                    .iter()
                    .filter(|s| s.always_loaded)
                    .map(|s| s.package.clone())
                    .collect();
                (g.name().to_owned(), g.content().aux_packages.clone(), always)
            };
            host.acquire_hold(ctx, HoldKind::GraphPackage, name);
            for package in aux {
                host.acquire_hold(ctx, HoldKind::Auxiliary, package);
            }
            if !host.is_editor() && !always.is_empty() {
                {
                    let mut g = graph.borrow_mut();
                    for package in &always {
                        g.request_stream_in(package);
                    }
                }
                let loaded = process_streaming(graph, host);
                debug!(requested = always.len(), loaded, "always-loaded levels duplicated");
            }
        }

        let (name, begun) = {
            let mut g = graph.borrow_mut();
            let begun = g.begin_running();
            g.set_loaded_this_tick(true);
            g.set_should_update(options.update_every_frame);
            (g.name().to_owned(), begun)
        };
        if let Some(exec) = host.context_mut(ctx) {
            exec.set_last_url(name.clone());
        }
        info!(graph = %name, context = ctx.get(), begun, from_template, "graph initialized");
        Ok(ctx)
    }

    /// Returns `true` when a forced collection must be skipped: the host is
    /// already collecting, shutting down or ending a session.
    #[must_use]
    pub fn collection_blocked(host: &Host) -> bool {
        host.is_collecting() || host.is_shutting_down() || host.is_ending_session()
    }

    /// Returns `true` if `graph` is inside its update slice, which makes
    /// disposal an invariant violation.
    pub(crate) fn inside_update_slice(graph: &GraphHandle) -> bool {
        let inside = graph.borrow().in_update();
        debug_assert!(!inside, "graph disposed inside its update slice");
        inside
    }

    /// Tears `graph` down and clears the handle.
    ///
    /// No-op for an empty handle or a graph the host does not know.
    pub fn dispose(
        host: &mut Host,
        graph: &mut Option<GraphHandle>,
        from_template: bool,
    ) -> TeardownReport {
        let Some(handle) = graph.clone() else {
            return TeardownReport::default();
        };
        let Some(ctx) = host.context_for(&handle) else {
            debug!(graph = handle.borrow().name(), "dispose skipped: no execution context");
            return TeardownReport::default();
        };
        if Self::inside_update_slice(&handle) {
            return TeardownReport::default();
        }

        let mut report = TeardownReport {
            performed: true,
            ..TeardownReport::default()
        };
        if from_template {
            report.released_holds = host.release_holds(ctx);
        }

        handle.borrow_mut().begin_tear_down();
        let flushed = flush_streaming(&handle, host);
        report.cancelled_streams = flushed.cancelled;
        report.unloaded_streams = flushed.unloaded;

        let (name, owned) = {
            let mut g = handle.borrow_mut();
            let ended = g.end_running();
            g.destroy_systems();
            debug!(graph = g.name(), ended, "graph stopped");
            (g.name().to_owned(), g.owned_packages())
        };

        let audio = host.audio_mut();
        audio.flush(&name);
        audio.set_transient_volume(1.0);

        report.marked_packages = owned
            .iter()
            .filter(|p| host.packages_mut().mark_garbage(p))
            .count();
        handle.borrow_mut().mark_garbage();

        host.destroy_context(ctx);

        if Self::collection_blocked(host) {
            debug!(graph = %name, "forced collection skipped");
        } else {
            host.collect_garbage();
            report.forced_collection = true;
        }

        *graph = None;
        info!(
            graph = %name,
            released = report.released_holds.len(),
            cancelled = report.cancelled_streams,
            marked = report.marked_packages,
            collected = report.forced_collection,
            "graph disposed"
        );
        report
    }
}
