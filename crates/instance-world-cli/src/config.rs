// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Options files: a storage port, a filesystem store and the JSON service
//! on top.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use instance_world::{OptionValue, WorldOptions};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Storage port for raw options blobs keyed by logical name.
pub trait ConfigStore {
    /// Reads the blob for `key`; `Ok(None)` when the store has no such key.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError>;
}

/// Failure reading or decoding an options blob.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The store exists but the blob could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying cause.
        source: std::io::Error,
    },
    /// The blob is not valid JSON for the requested type.
    #[error("cannot decode options {key}: {source}")]
    Decode {
        /// Key that failed.
        key: String,
        /// Underlying cause.
        source: serde_json::Error,
    },
}

/// Stores blobs as `<base>/<key>.json`.
#[derive(Clone, Debug)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Splits `file` into a store rooted at its directory and the key naming
    /// it. Returns `None` for paths without a file name.
    pub fn for_file(file: &Path) -> Option<(Self, String)> {
        let key = file.file_stem()?.to_str()?.to_owned();
        let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
        Some((Self::new(base), key))
    }
}

impl ConfigStore for FsConfigStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        let path = self.base.join(format!("{key}.json"));
        fs::read(&path).map(Some).or_else(|source| match source.kind() {
            ErrorKind::NotFound => Ok(None),
            _ => Err(ConfigError::Read { path, source }),
        })
    }
}

/// Decodes typed values out of a [`ConfigStore`].
#[derive(Debug)]
pub struct ConfigService<S> {
    store: S,
}

impl<S: ConfigStore> ConfigService<S> {
    /// Service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Decodes the blob for `key`. Missing and empty blobs are `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let Some(bytes) = self.store.read(key)?.filter(|b| !b.is_empty()) else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ConfigError::Decode {
                key: key.to_owned(),
                source,
            })
    }
}

/// Contents of an options file.
///
/// ```json
/// {
///   "options": { "template": "Scenes/Showcase", "allow_audio_playback": 1 },
///   "extension_packages": ["Ext/Weather"]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsFile {
    /// Flat `name = value` options.
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
    /// Extension packages to hold for template instances.
    #[serde(default)]
    pub extension_packages: Vec<String>,
}

impl OptionsFile {
    /// Applies the file on top of `target`. Returns the number of flat
    /// options applied.
    pub fn apply_to(&self, target: &mut WorldOptions) -> usize {
        let applied = target.apply_flat(self.options.iter().map(|(k, v)| (k, v.clone())));
        target
            .extension_packages
            .extend(self.extension_packages.iter().cloned());
        debug!(
            applied,
            ignored = self.options.len() - applied,
            extensions = self.extension_packages.len(),
            "options file applied"
        );
        applied
    }
}
