// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The instance: an isolated, namespaced graph with an explicit lifetime.
use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::{info, warn};

use crate::component::{ComponentError, ComponentHandle, ComponentSet};
use crate::config::WorldOptions;
use crate::duplicate::{DuplicateError, GraphDuplicator};
use crate::graph::{Graph, GraphHandle};
use crate::host::{ContextId, Host};
use crate::ident::{allocate_instance_id, InstanceId};
use crate::lifecycle::{Lifecycle, LifecycleError, LifecycleState, TeardownReport};
use crate::multiplex::{SchedulerMultiplexer, UpdatePhase, UpdateRegistration};
use crate::namespace;
use crate::resource::Resource;

/// Port for the render/capture pipeline.
pub trait CaptureSink {
    /// Captures the current state of `graph`, owned by `instance`.
    fn capture(&mut self, instance: InstanceId, graph: &Graph);
}

/// Errors from building or using an [`InstanceWorld`].
#[derive(Debug, Error)]
pub enum InstanceError {
    /// Template duplication failed.
    #[error(transparent)]
    Duplicate(#[from] DuplicateError),
    /// Initialization failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// The operation needs a running instance.
    #[error("instance {id} is {state:?}, not running")]
    NotRunning {
        /// Instance.
        id: InstanceId,
        /// Its current state.
        state: LifecycleState,
    },
}

/// Isolated runtime copy of a template graph, or an empty graph.
///
/// Must be disposed with [`dispose`](Self::dispose) on the thread that drives
/// the host. Dropping an undisposed instance destroys its components and logs
/// a leak; its storage and holds stay with the host. Debug builds also fail
/// the drop unless the thread is already unwinding.
#[derive(Debug)]
pub struct InstanceWorld {
    id: InstanceId,
    prefix: String,
    graph: Option<GraphHandle>,
    state: LifecycleState,
    from_template: bool,
    components: ComponentSet,
    context: Option<ContextId>,
    multiplexer: Option<Rc<RefCell<SchedulerMultiplexer>>>,
    registrations: Vec<UpdateRegistration>,
}

impl InstanceWorld {
    /// Builds and initializes an instance.
    ///
    /// On error nothing of the instance remains: no registry entries for a
    /// failed duplication, no storage, no execution context.
    pub fn new(host: &mut Host, options: WorldOptions) -> Result<Self, InstanceError> {
        let id = allocate_instance_id();
        let mut state = LifecycleState::Constructing;
        let duplicator = GraphDuplicator::new(host.registry().clone());
        let (graph, from_template) = match &options.template {
            Some(template) => (duplicator.create_from_template(host, template, id)?, true),
            None => (duplicator.create_empty(id), false),
        };

        state.advance(LifecycleState::Initializing)?;
        let context = match Lifecycle::initialize(host, &graph, from_template, &options) {
            Ok(ctx) => ctx,
            Err(err) => {
                let name = graph.borrow().name().to_owned();
                host.packages_mut().purge(&name);
                return Err(err.into());
            }
        };
        state.advance(LifecycleState::Running)?;

        let mut registrations = Vec::new();
        let multiplexer = options.owning_context.as_ref().map(|_| {
            let mux = Rc::new(RefCell::new(SchedulerMultiplexer::new(&graph)));
            registrations.push(host.add_update_listener(&mux, UpdatePhase::BeforeUpdate));
            registrations.push(host.add_update_listener(&mux, UpdatePhase::AfterUpdate));
            mux
        });

        info!(
            instance = %id,
            graph = graph.borrow().name(),
            from_template,
            multiplexed = multiplexer.is_some(),
            "instance running"
        );
        Ok(Self {
            id,
            prefix: namespace::build_prefix(id),
            graph: Some(graph),
            state,
            from_template,
            components: ComponentSet::new(),
            context: Some(context),
            multiplexer,
            registrations,
        })
    }

    /// Instance id.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Namespace prefix (`INST_<id>_`).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Graph handle; `None` after disposal.
    #[must_use]
    pub fn graph(&self) -> Option<&GraphHandle> {
        self.graph.as_ref()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns `true` if the graph was duplicated from a template.
    #[must_use]
    pub fn was_loaded_from_template(&self) -> bool {
        self.from_template
    }

    /// Attached components.
    #[must_use]
    pub fn components(&self) -> &ComponentSet {
        &self.components
    }

    /// Host execution context; `None` after disposal.
    #[must_use]
    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    /// Returns `true` if a scheduler multiplexer is registered.
    #[must_use]
    pub fn is_multiplexed(&self) -> bool {
        self.multiplexer.is_some()
    }

    /// Attaches `component` to the graph. Failures are logged and skipped.
    pub fn attach(&mut self, component: &ComponentHandle) -> Result<(), ComponentError> {
        let graph = self.graph.as_ref().map(|g| g.borrow());
        self.components.attach(graph.as_deref(), component)
    }

    /// Detaches `component` from the graph. Failures are logged and skipped.
    pub fn detach(&mut self, component: &ComponentHandle) -> Result<(), ComponentError> {
        let graph = self.graph.as_ref().map(|g| g.borrow());
        self.components.detach(graph.as_deref(), component)
    }

    fn running_graph(&self) -> Result<&GraphHandle, InstanceError> {
        match (&self.graph, self.state) {
            (Some(graph), LifecycleState::Running) => Ok(graph),
            _ => Err(InstanceError::NotRunning {
                id: self.id,
                state: self.state,
            }),
        }
    }

    /// Adds a resource to the running graph. Returns its sub-path.
    pub fn spawn(&self, resource: Resource) -> Result<String, InstanceError> {
        Ok(self.running_graph()?.borrow_mut().spawn(resource))
    }

    /// Hands the running graph to `sink`.
    pub fn capture(&self, sink: &mut dyn CaptureSink) -> Result<(), InstanceError> {
        let graph = self.running_graph()?;
        sink.capture(self.id, &graph.borrow());
        Ok(())
    }

    /// Tears the instance down: components first, then listener
    /// registrations, then the graph. Later calls return an empty report.
    pub fn dispose(&mut self, host: &mut Host) -> TeardownReport {
        if self.state != LifecycleState::Running {
            return TeardownReport::default();
        }
        if self.graph.as_ref().is_some_and(Lifecycle::inside_update_slice) {
            return TeardownReport::default();
        }
        self.state = LifecycleState::TearingDown;

        let graph = self.graph.as_ref().map(|g| g.borrow());
        let detached = self.components.detach_all(graph.as_deref());
        drop(graph);
        for registration in self.registrations.drain(..) {
            host.remove_update_listener(&registration);
        }
        self.multiplexer = None;

        let report = Lifecycle::dispose(host, &mut self.graph, self.from_template);
        self.graph = None;
        self.context = None;
        self.state = LifecycleState::Destroyed;
        info!(instance = %self.id, detached, "instance disposed");
        report
    }
}

impl Drop for InstanceWorld {
    fn drop(&mut self) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        let graph = self.graph.as_ref().and_then(|g| g.try_borrow().ok());
        let detached = self.components.detach_all(graph.as_deref());
        warn!(instance = %self.id, detached, "instance dropped without dispose");
        if !std::thread::panicking() {
            debug_assert!(false, "instance {} dropped without dispose", self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::{TemplateError, TemplatePackage, TemplateSource};

    struct NoTemplates;

    impl TemplateSource for NoTemplates {
        fn load(&self, package: &str) -> Result<TemplatePackage, TemplateError> {
            Err(TemplateError::NotFound(package.to_owned()))
        }
    }

    #[test]
    #[cfg_attr(
        debug_assertions,
        should_panic(expected = "graph disposed inside its update slice")
    )]
    fn disposal_inside_the_update_slice_is_refused() {
        let mut host = Host::new(NoTemplates);
        let mut world = InstanceWorld::new(&mut host, WorldOptions::new()).unwrap();
        let graph = world.graph().cloned().unwrap();
        graph.borrow_mut().set_in_update(true);

        let report = world.dispose(&mut host);
        assert!(!report.performed);
        assert_eq!(world.state(), LifecycleState::Running);
        assert_eq!(host.context_count(), 1);
        assert!(!graph.borrow().is_garbage());

        graph.borrow_mut().set_in_update(false);
        assert!(world.dispose(&mut host).performed);
        assert_eq!(world.state(), LifecycleState::Destroyed);
    }
}
