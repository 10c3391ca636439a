// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Template source port and redirect resolution.
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::namespace;
use crate::resource::GraphContent;

/// Redirect hops followed before a chain is treated as malformed.
pub const MAX_REDIRECTS: usize = 8;

/// What a template package holds.
#[derive(Clone, Debug)]
pub enum TemplatePackage {
    /// A loadable graph.
    Graph(GraphContent),
    /// A redirector pointing at another package.
    Redirect(String),
    /// A package that exists but holds no graph.
    Assets,
}

/// Errors reported while resolving a template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// No package with that identity exists.
    #[error("template not found: {0}")]
    NotFound(String),
    /// The package exists but cannot be used as a graph.
    #[error("template {package} is malformed: {reason}")]
    Malformed {
        /// Package that failed.
        package: String,
        /// Human-readable cause.
        reason: String,
    },
}

/// Port for reading shared template packages.
///
/// Implementations must not mutate what they hand out: every instance gets
/// its own copy of the content.
pub trait TemplateSource {
    /// Loads the package called `package`.
    fn load(&self, package: &str) -> Result<TemplatePackage, TemplateError>;
}

impl<T: TemplateSource + ?Sized> TemplateSource for Rc<T> {
    fn load(&self, package: &str) -> Result<TemplatePackage, TemplateError> {
        (**self).load(package)
    }
}

impl<T: TemplateSource + ?Sized> TemplateSource for Box<T> {
    fn load(&self, package: &str) -> Result<TemplatePackage, TemplateError> {
        (**self).load(package)
    }
}

/// Loads `package`, following redirectors until a graph is found.
///
/// A chain longer than [`MAX_REDIRECTS`] or ending in a package without a
/// graph is [`TemplateError::Malformed`].
pub fn resolve_template(
    source: &(impl TemplateSource + ?Sized),
    package: &str,
) -> Result<GraphContent, TemplateError> {
    let mut current = package.to_owned();
    for _ in 0..=MAX_REDIRECTS {
        match source.load(&current)? {
            TemplatePackage::Graph(content) => return Ok(content),
            TemplatePackage::Redirect(target) => {
                debug!(from = %current, to = %target, "following template redirect");
                current = namespace::package_of(&target).to_owned();
            }
            TemplatePackage::Assets => {
                return Err(TemplateError::Malformed {
                    package: current,
                    reason: "package holds no graph".to_owned(),
                });
            }
        }
    }
    Err(TemplateError::Malformed {
        package: package.to_owned(),
        reason: format!("redirect chain exceeds {MAX_REDIRECTS} hops"),
    })
}
