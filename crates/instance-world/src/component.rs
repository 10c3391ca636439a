// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime components attached to an instance's graph.
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::Graph;
use crate::ident::InstanceId;

/// Stateful runtime object that can be registered with one graph at a time.
pub trait Component {
    /// Display name used in logs and errors.
    fn name(&self) -> &str;

    /// Called after the component is registered with `graph`.
    fn on_register(&mut self, _graph: &Graph) {}

    /// Called after the component is unregistered from `graph`.
    fn on_unregister(&mut self, _graph: &Graph) {}

    /// Called once when the component is destroyed.
    fn on_destroy(&mut self) {}
}

/// Errors from attach/detach. Recoverable: the operation was skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// The instance has no valid graph.
    #[error("instance graph is not valid")]
    InvalidGraph,
    /// The component has been destroyed.
    #[error("component {0} has been destroyed")]
    InvalidComponent(String),
    /// The component belongs to another instance.
    #[error("component {component} is registered with instance {instance}")]
    RegisteredElsewhere {
        /// Component name.
        component: String,
        /// Instance it belongs to.
        instance: InstanceId,
    },
    /// The component is not registered with this instance.
    #[error("component {0} is not registered with this instance")]
    NotRegistered(String),
}

struct ComponentCell {
    component: RefCell<Box<dyn Component>>,
    name: String,
    valid: Cell<bool>,
    registered_with: Cell<Option<InstanceId>>,
}

/// Shared handle to a component.
///
/// Clones refer to the same component; equality is identity.
#[derive(Clone)]
pub struct ComponentHandle {
    inner: Rc<ComponentCell>,
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("name", &self.inner.name)
            .field("valid", &self.inner.valid.get())
            .field("registered_with", &self.inner.registered_with.get())
            .finish()
    }
}

impl PartialEq for ComponentHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ComponentHandle {}

impl ComponentHandle {
    /// Wraps `component`.
    pub fn new(component: impl Component + 'static) -> Self {
        let name = component.name().to_owned();
        Self {
            inner: Rc::new(ComponentCell {
                component: RefCell::new(Box::new(component)),
                name,
                valid: Cell::new(true),
                registered_with: Cell::new(None),
            }),
        }
    }

    /// Component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `false` once destroyed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.valid.get()
    }

    /// Instance the component is registered with.
    #[must_use]
    pub fn registered_with(&self) -> Option<InstanceId> {
        self.inner.registered_with.get()
    }

    /// Destroys the component. Later calls are no-ops.
    ///
    /// A destroyed component cannot be attached; a registered one stays
    /// recorded until detached.
    pub fn destroy(&self) {
        if self.inner.valid.replace(false) {
            self.inner.component.borrow_mut().on_destroy();
            debug!(component = self.name(), "component destroyed");
        }
    }

    fn register(&self, graph: &Graph) {
        self.inner.registered_with.set(Some(graph.instance()));
        self.inner.component.borrow_mut().on_register(graph);
    }

    fn unregister(&self, graph: &Graph) {
        self.inner.registered_with.set(None);
        self.inner.component.borrow_mut().on_unregister(graph);
    }
}

/// Components owned by one instance. Never holds the same component twice.
#[derive(Debug, Default)]
pub struct ComponentSet {
    items: Vec<ComponentHandle>,
}

fn valid_graph<'a>(graph: Option<&'a Graph>) -> Result<&'a Graph, ComponentError> {
    match graph {
        Some(g) if g.is_valid() => Ok(g),
        _ => {
            warn!("component operation on an invalid graph skipped");
            Err(ComponentError::InvalidGraph)
        }
    }
}

impl ComponentSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if `component` is attached.
    #[must_use]
    pub fn contains(&self, component: &ComponentHandle) -> bool {
        self.items.contains(component)
    }

    /// Attached components in attach order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentHandle> + '_ {
        self.items.iter()
    }

    /// Registers `component` with `graph` and records it.
    ///
    /// Attaching a component already registered with this graph's instance
    /// is a no-op.
    pub fn attach(
        &mut self,
        graph: Option<&Graph>,
        component: &ComponentHandle,
    ) -> Result<(), ComponentError> {
        let graph = valid_graph(graph)?;
        if !component.is_valid() {
            warn!(component = component.name(), "attach of a destroyed component skipped");
            return Err(ComponentError::InvalidComponent(component.name().to_owned()));
        }
        match component.registered_with() {
            Some(id) if id == graph.instance() => {
                debug!(component = component.name(), "component already attached");
                return Ok(());
            }
            Some(other) => {
                warn!(
                    component = component.name(),
                    instance = %other,
                    "attach of a component owned by another instance skipped"
                );
                return Err(ComponentError::RegisteredElsewhere {
                    component: component.name().to_owned(),
                    instance: other,
                });
            }
            None => {}
        }
        component.register(graph);
        if !self.contains(component) {
            self.items.push(component.clone());
        }
        debug!(component = component.name(), graph = graph.name(), "component attached");
        Ok(())
    }

    /// Unregisters `component` from `graph` and forgets it.
    pub fn detach(
        &mut self,
        graph: Option<&Graph>,
        component: &ComponentHandle,
    ) -> Result<(), ComponentError> {
        let graph = valid_graph(graph)?;
        let Some(pos) = self.items.iter().position(|c| c == component) else {
            warn!(component = component.name(), "detach of an unattached component skipped");
            return Err(ComponentError::NotRegistered(component.name().to_owned()));
        };
        if component.registered_with() != Some(graph.instance()) {
            warn!(component = component.name(), "detach of an unattached component skipped");
            return Err(ComponentError::NotRegistered(component.name().to_owned()));
        }
        component.unregister(graph);
        self.items.remove(pos);
        debug!(component = component.name(), graph = graph.name(), "component detached");
        Ok(())
    }

    /// Force-detaches and destroys every component. Returns how many there
    /// were.
    ///
    /// Runs even if the graph is already invalid; unregister callbacks are
    /// only delivered when a graph is given.
    pub fn detach_all(&mut self, graph: Option<&Graph>) -> usize {
        let items = std::mem::take(&mut self.items);
        for component in &items {
            match graph {
                Some(g) => component.unregister(g),
                None => component.inner.registered_with.set(None),
            }
            component.destroy();
        }
        items.len()
    }
}
