// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host construction with inspectable doubles.

use instance_world::Host;

use crate::doubles::{RecordingAudio, ScriptedCompileQueue};
use crate::fixtures::showcase_fixture;
use crate::templates::InMemoryTemplateSource;

/// A [`Host`] plus the shared halves of the doubles plugged into it.
#[derive(Debug)]
pub struct TestHost {
    /// The host under test.
    pub host: Host,
    /// Template source shared with the host.
    pub templates: InMemoryTemplateSource,
    /// Audio log shared with the host.
    pub audio: RecordingAudio,
    /// Compile queue shared with the host.
    pub compile: ScriptedCompileQueue,
}

impl TestHost {
    /// Host reading from `templates` with recording audio and an idle
    /// compile queue.
    pub fn new(templates: InMemoryTemplateSource) -> Self {
        let audio = RecordingAudio::new();
        let compile = ScriptedCompileQueue::new(0);
        let host = Host::new(templates.clone())
            .with_audio(audio.clone())
            .with_compile_queue(compile.clone());
        Self {
            host,
            templates,
            audio,
            compile,
        }
    }

    /// Host serving the showcase fixture.
    pub fn showcase() -> Self {
        Self::new(showcase_fixture())
    }

    /// Same host, flagged as an editor/offline context.
    #[must_use]
    pub fn editor(mut self) -> Self {
        self.host = self.host.with_editor(true);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn showcase_host_starts_empty() {
        let t = TestHost::showcase();
        assert!(t.host.registry().is_empty());
        assert!(t.host.packages().is_empty());
        assert_eq!(t.host.context_count(), 0);
        assert!(t.audio.events().is_empty());
    }
}
