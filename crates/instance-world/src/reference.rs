// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Path-shaped references and the reference-visiting capability.
//!
//! A [`SoftRef`] points from one resource at another by path rather than by
//! handle, so it survives serialization and can point at content that has not
//! loaded yet. Duplicating a graph therefore has to find every `SoftRef` it
//! owns and decide where it should point; [`VisitRefs`] is how resource types
//! expose them.
use std::collections::BTreeMap;
use std::fmt;

use crate::ident::InstanceId;
use crate::namespace;

/// Path-shaped pointer at another resource.
///
/// `path` is an object path (`Dir/Pkg.Object`); `sub_path` is a dotted path
/// inside that object (`Root.Lamp.Bulb`) and may be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SoftRef {
    path: String,
    #[cfg_attr(feature = "serde", serde(default))]
    sub_path: String,
}

impl SoftRef {
    /// Creates a reference to `sub_path` inside the object at `path`.
    pub fn new(path: impl Into<String>, sub_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sub_path: sub_path.into(),
        }
    }

    /// Creates a reference to the object at `path` itself.
    pub fn to_object(path: impl Into<String>) -> Self {
        Self::new(path, String::new())
    }

    /// The null reference.
    #[must_use]
    pub fn null() -> Self {
        Self::default()
    }

    /// Parses the `path:sub_path` form produced by `Display`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((path, sub)) => Self::new(path, sub),
            None => Self::to_object(text),
        }
    }

    /// Returns `true` for the null reference.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.path.is_empty()
    }

    /// Object path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Sub-path inside the object (may be empty).
    #[must_use]
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    /// Package holding the referenced object.
    #[must_use]
    pub fn package_name(&self) -> &str {
        namespace::package_of(&self.path)
    }

    /// Instance namespace the reference points into, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<InstanceId> {
        namespace::instance_of(&self.path)
    }

    /// Replaces the object path, keeping the sub-path.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }
}

impl fmt::Display for SoftRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub_path.is_empty() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}:{}", self.path, self.sub_path)
        }
    }
}

/// Property value stored on a resource.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free text. Never interpreted as a reference.
    Text(String),
    /// Path-shaped reference.
    Ref(SoftRef),
    /// Ordered list.
    List(Vec<Value>),
    /// Keyed map.
    Map(BTreeMap<String, Value>),
}

/// Walks every reference a value owns, directly or through owned
/// sub-resources.
///
/// Implementations must reach every `SoftRef` that a serialization of the
/// value would write; missing one leaves it pointing at the shared template
/// after duplication.
pub trait VisitRefs {
    /// Calls `visitor` on every owned reference.
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef));

    /// Calls `visitor` on every owned reference, allowing it to rewrite them.
    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef));

    /// Collects a copy of every owned reference in visiting order.
    fn collect_refs(&self) -> Vec<SoftRef> {
        let mut out = Vec::new();
        self.visit_refs(&mut |r| out.push(r.clone()));
        out
    }
}

impl VisitRefs for SoftRef {
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef)) {
        visitor(self);
    }

    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef)) {
        visitor(self);
    }
}

impl VisitRefs for Value {
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef)) {
        match self {
            Self::Ref(r) => visitor(r),
            Self::List(items) => items.visit_refs(visitor),
            Self::Map(entries) => {
                for value in entries.values() {
                    value.visit_refs(visitor);
                }
            }
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Text(_) => {}
        }
    }

    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef)) {
        match self {
            Self::Ref(r) => visitor(r),
            Self::List(items) => items.visit_refs_mut(visitor),
            Self::Map(entries) => {
                for value in entries.values_mut() {
                    value.visit_refs_mut(visitor);
                }
            }
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Text(_) => {}
        }
    }
}

impl<T: VisitRefs> VisitRefs for [T] {
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef)) {
        for item in self {
            item.visit_refs(visitor);
        }
    }

    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef)) {
        for item in self {
            item.visit_refs_mut(visitor);
        }
    }
}

impl<T: VisitRefs> VisitRefs for Vec<T> {
    fn visit_refs(&self, visitor: &mut dyn FnMut(&SoftRef)) {
        self.as_slice().visit_refs(visitor);
    }

    fn visit_refs_mut(&mut self, visitor: &mut dyn FnMut(&mut SoftRef)) {
        self.as_mut_slice().visit_refs_mut(visitor);
    }
}
