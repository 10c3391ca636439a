// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Construction values for an instance.
use tracing::debug;

use crate::graph::GraphSystems;
use crate::sched::OwningContextHandle;

/// Value of one flat option.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum OptionValue {
    /// Boolean.
    Bool(bool),
    /// Number; non-zero reads as `true`.
    Number(f64),
    /// Text.
    Text(String),
}

impl OptionValue {
    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) => Some(n.abs() > 0.0),
            Self::Text(t) => match t.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
        }
    }
}

/// How an instance is built and what its graph carries.
#[derive(Clone, Debug)]
pub struct WorldOptions {
    /// Graph plays audio; the default sound mix is applied on initialize.
    pub allow_audio_playback: bool,
    /// Graph gets a physics scene.
    pub create_physics_scene: bool,
    /// Physics scene simulates each update.
    pub simulate_physics: bool,
    /// Graph is updated by every host tick.
    pub update_every_frame: bool,
    /// Graph gets a visual-effects system.
    pub create_fx_system: bool,
    /// Template package to duplicate; `None` builds an empty graph.
    pub template: Option<String>,
    /// Shared owning context; enables scheduler multiplexing.
    pub owning_context: Option<OwningContextHandle>,
    /// Extension packages held while the graph lives.
    pub extension_packages: Vec<String>,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            allow_audio_playback: false,
            create_physics_scene: true,
            simulate_physics: false,
            update_every_frame: true,
            create_fx_system: true,
            template: None,
            owning_context: None,
            extension_packages: Vec::new(),
        }
    }
}

impl WorldOptions {
    /// Default options: no template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default options duplicating `template`.
    pub fn from_template(template: impl Into<String>) -> Self {
        Self::default().with_template(template)
    }

    /// Sets the template package.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Sets the owning context.
    pub fn with_owning_context(mut self, ctx: OwningContextHandle) -> Self {
        self.owning_context = Some(ctx);
        self
    }

    /// Adds an extension package.
    pub fn with_extension_package(mut self, package: impl Into<String>) -> Self {
        self.extension_packages.push(package.into());
        self
    }

    /// Sets audio playback.
    pub fn with_audio_playback(mut self, on: bool) -> Self {
        self.allow_audio_playback = on;
        self
    }

    /// Sets physics scene creation.
    pub fn with_physics_scene(mut self, on: bool) -> Self {
        self.create_physics_scene = on;
        self
    }

    /// Sets physics simulation.
    pub fn with_simulate_physics(mut self, on: bool) -> Self {
        self.simulate_physics = on;
        self
    }

    /// Sets continuous update.
    pub fn with_update_every_frame(mut self, on: bool) -> Self {
        self.update_every_frame = on;
        self
    }

    /// Sets effects-system creation.
    pub fn with_fx_system(mut self, on: bool) -> Self {
        self.create_fx_system = on;
        self
    }

    /// Graph systems these options ask for.
    #[must_use]
    pub fn systems(&self) -> GraphSystems {
        GraphSystems {
            audio_playback: self.allow_audio_playback,
            physics_scene: self.create_physics_scene,
            simulate_physics: self.create_physics_scene && self.simulate_physics,
            fx_system: self.create_fx_system,
            initialized_as_new: false,
        }
    }

    /// Applies flat `name = value` options. Returns how many were applied.
    ///
    /// Unknown names and values of the wrong shape are skipped.
    pub fn apply_flat<I, K>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, OptionValue)>,
        K: AsRef<str>,
    {
        let mut applied = 0;
        for (key, value) in entries {
            let key = key.as_ref();
            if key == "template" {
                match value {
                    OptionValue::Text(template) => {
                        self.template = Some(template);
                        applied += 1;
                    }
                    other => debug!(option = key, value = ?other, "option value ignored"),
                }
                continue;
            }
            let slot = match key {
                "allow_audio_playback" => &mut self.allow_audio_playback,
                "create_physics_scene" => &mut self.create_physics_scene,
                "simulate_physics" => &mut self.simulate_physics,
                "update_every_frame" => &mut self.update_every_frame,
                "create_fx_system" => &mut self.create_fx_system,
                _ => {
                    debug!(option = key, ?value, "unrecognized option ignored");
                    continue;
                }
            };
            match value.as_bool() {
                Some(on) => {
                    *slot = on;
                    applied += 1;
                }
                None => debug!(option = key, ?value, "option value ignored"),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = WorldOptions::default();
        assert!(!o.allow_audio_playback);
        assert!(o.create_physics_scene);
        assert!(!o.simulate_physics);
        assert!(o.update_every_frame);
        assert!(o.create_fx_system);
        assert!(o.template.is_none());
    }

    #[test]
    fn flat_options_accept_bools_and_numbers() {
        let mut o = WorldOptions::default();
        let applied = o.apply_flat([
            ("allow_audio_playback", OptionValue::Number(1.0)),
            ("create_fx_system", OptionValue::Bool(false)),
            ("simulate_physics", OptionValue::Text("true".to_owned())),
            ("update_every_frame", OptionValue::Number(0.0)),
            ("template", OptionValue::Text("Scenes/Showcase".to_owned())),
        ]);
        assert_eq!(applied, 5);
        assert!(o.allow_audio_playback);
        assert!(!o.create_fx_system);
        assert!(o.simulate_physics);
        assert!(!o.update_every_frame);
        assert_eq!(o.template.as_deref(), Some("Scenes/Showcase"));
    }

    #[test]
    fn unknown_options_are_ignored() {
        let mut o = WorldOptions::default();
        let applied = o.apply_flat([
            ("camera_fov", OptionValue::Number(60.0)),
            ("create_physics_scene", OptionValue::Text("maybe".to_owned())),
            ("template", OptionValue::Bool(true)),
        ]);
        assert_eq!(applied, 0);
        assert!(o.create_physics_scene);
        assert!(o.template.is_none());
    }

    #[test]
    fn simulation_needs_a_physics_scene() {
        let o = WorldOptions::default()
            .with_physics_scene(false)
            .with_simulate_physics(true);
        assert!(!o.systems().simulate_physics);
    }
}
