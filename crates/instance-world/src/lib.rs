// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! instance-world: isolated, namespaced runtime copies of shared scene graphs.
//!
//! An [`InstanceWorld`] is a private copy of a template graph (or an empty
//! graph) living under its own namespace prefix (`INST_<id>_`). The crate
//! covers the whole life of such a copy:
//!
//! - [`allocate_instance_id`] and the [`namespace`] helpers mint ids and
//!   derive namespaced package paths.
//! - [`GraphDuplicator`] loads a template into namespaced storage, registers
//!   every minted identity with the [`NamespaceRegistry`] and runs the
//!   [`ReferenceRewriter`] so internal references resolve inside the copy.
//! - [`Lifecycle`] mirrors a host "load scene" / "unload scene" sequence for
//!   non-interactive contexts, including the guarded forced collection.
//! - [`SchedulerMultiplexer`] swaps the instance's private timer and
//!   deferred-callback services into a shared [`OwningContext`] for the
//!   duration of each update slice.
//!
//! All of it is confined to the single thread driving the [`Host`] update
//! loop; shared state uses `Rc`/`RefCell` and is `!Send` on purpose.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod component;
mod config;
mod duplicate;
mod graph;
mod host;
mod ident;
mod lifecycle;
mod multiplex;
pub mod namespace;
mod reference;
mod registry;
mod resource;
mod rewrite;
mod sched;
mod source;
mod storage;
mod streaming;
mod world;

/// Component trait, shared handles and the per-instance owned set.
pub use component::{Component, ComponentError, ComponentHandle, ComponentSet};
/// Construction values and flat option parsing.
pub use config::{OptionValue, WorldOptions};
/// Template duplication into namespaced storage.
pub use duplicate::{DuplicateError, GraphDuplicator, EMPTY_GRAPH_NAME};
/// Runtime graph and its internal systems.
pub use graph::{Graph, GraphHandle, GraphSystems};
/// Host facade: contexts, storage, holds, update loop and its ports.
pub use host::{
    AudioDevice, AuxHold, CompileQueue, ContextId, ExecutionContext, HoldKind, Host,
    NoPendingWork, NullAudio, TickReport,
};
/// Instance id type and the process-wide allocator.
pub use ident::{allocate_instance_id, InstanceId};
/// Load/unload sequencing for instance graphs.
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleState, TeardownReport};
/// Per-instance timer/deferred service swapping.
pub use multiplex::{ListenerId, SchedulerMultiplexer, UpdateListener, UpdatePhase, UpdateRegistration};
/// Path-shaped references and the reference visiting capability.
pub use reference::{SoftRef, Value, VisitRefs};
/// Process-wide record of namespaced identities.
pub use registry::NamespaceRegistry;
/// Template content types.
pub use resource::{
    CompositionTile, GraphContent, Level, Resource, RunState, StreamState, StreamingLevel,
    ROOT_OBJECT_NAME,
};
/// Reference rewriting into an instance namespace.
pub use rewrite::{ReferenceRewriter, RewriteStats};
/// Timer/deferred services and the shared owning context.
pub use sched::{
    DeferredHandle, DeferredQueue, OwningContext, OwningContextHandle, ServiceHandle,
    TimerFired, TimerHandle, TimerService,
};
/// Template source port and redirect resolution.
pub use source::{resolve_template, TemplateError, TemplatePackage, TemplateSource, MAX_REDIRECTS};
/// Namespaced package storage.
pub use storage::{PackageStore, StorageError};
/// Stream-in processing and teardown flush.
pub use streaming::{flush_streaming, process_streaming, FlushReport, StreamFixup};
/// The instance itself and its capture port.
pub use world::{CaptureSink, InstanceError, InstanceWorld};
