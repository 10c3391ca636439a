// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed template source: one JSON file per package.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use instance_world::{GraphContent, TemplateError, TemplatePackage, TemplateSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// On-disk form of a template package.
///
/// ```json
/// { "graph": { "root": { "resources": [] } } }
/// { "redirect": "Scenes/Showcase.Showcase" }
/// "assets"
/// ```
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFile {
    /// A loadable graph.
    Graph(GraphContent),
    /// Redirector to another package or object path.
    Redirect(String),
    /// A package without a graph.
    Assets,
}

impl From<TemplateFile> for TemplatePackage {
    fn from(file: TemplateFile) -> Self {
        match file {
            TemplateFile::Graph(content) => Self::Graph(content),
            TemplateFile::Redirect(target) => Self::Redirect(target),
            TemplateFile::Assets => Self::Assets,
        }
    }
}

/// Reads `<base>/<package>.json`.
#[derive(Clone, Debug)]
pub struct DirTemplateSource {
    base: PathBuf,
}

impl DirTemplateSource {
    /// Source rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn path_for(&self, package: &str) -> PathBuf {
        self.base.join(format!("{package}.json"))
    }
}

impl TemplateSource for DirTemplateSource {
    fn load(&self, package: &str) -> Result<TemplatePackage, TemplateError> {
        let path = self.path_for(package);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(TemplateError::NotFound(package.to_owned()))
            }
            Err(err) => {
                return Err(TemplateError::Malformed {
                    package: package.to_owned(),
                    reason: err.to_string(),
                })
            }
        };
        let file: TemplateFile =
            serde_json::from_slice(&bytes).map_err(|err| TemplateError::Malformed {
                package: package.to_owned(),
                reason: err.to_string(),
            })?;
        debug!(package, path = %path.display(), "template file read");
        Ok(file.into())
    }
}
