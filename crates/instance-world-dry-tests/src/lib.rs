// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for the instance-world crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`templates`] - In-memory template source fake
//! - [`fixtures`] - The showcase scene and small content builders
//! - [`doubles`] - Recording component, compile queue, audio device and
//!   capture sink
//! - [`host`] - Host builder wiring the recording doubles together

pub mod doubles;
pub mod fixtures;
pub mod host;
pub mod templates;

pub use doubles::{
    AudioEvent, Capture, EventLog, PhaseRecorder, RecordingAudio, RecordingCaptureSink,
    RecordingComponent, ScriptedCompileQueue,
};
pub use fixtures::{
    graph_of, is_shared, level_of, showcase_content, showcase_fixture, SHARED_DIR, SHOWCASE,
    SHOWCASE_AUX, SHOWCASE_LIGHTS, SHOWCASE_MIX, SHOWCASE_SUB, SHOWCASE_TILE,
};
pub use host::TestHost;
pub use templates::InMemoryTemplateSource;
