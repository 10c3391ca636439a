// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Template content fixtures.
//!
//! The showcase fixture is a small scene exercising every reference shape the
//! rewriter distinguishes: root sub-paths, references to statically declared
//! sub-levels, shared external assets, references buried in lists and child
//! resources, and text that merely looks like a path.

use instance_world::{
    CompositionTile, GraphContent, Level, Resource, SoftRef, StreamingLevel, Value,
};

use crate::templates::InMemoryTemplateSource;

/// Showcase template package.
pub const SHOWCASE: &str = "Scenes/Showcase";
/// Streaming sub-level loaded on request.
pub const SHOWCASE_SUB: &str = "Scenes/Showcase_Sub";
/// Streaming sub-level requested at initialization.
pub const SHOWCASE_LIGHTS: &str = "Scenes/Showcase_Lights";
/// Composition tile of the showcase.
pub const SHOWCASE_TILE: &str = "Scenes/Tiles/Showcase_X0_Y0";
/// Auxiliary package held by the showcase.
pub const SHOWCASE_AUX: &str = "Shared/Audio/Ambience";
/// Default sound mix of the showcase.
pub const SHOWCASE_MIX: &str = "Showcase/Mix";

/// Directory prefix of every shared, never-duplicated package in the
/// fixtures.
pub const SHARED_DIR: &str = "Shared/";

/// Returns `true` for references the fixtures treat as external.
pub fn is_shared(r: &SoftRef) -> bool {
    r.path().starts_with(SHARED_DIR)
}

/// Level with one idle resource per name, all of kind `Prop`.
pub fn level_of(names: &[&str]) -> Level {
    names
        .iter()
        .fold(Level::new(), |level, name| level.with_resource(Resource::new(*name, "Prop")))
}

/// Graph content whose root holds one resource per name.
pub fn graph_of(names: &[&str]) -> GraphContent {
    GraphContent::with_root(level_of(names))
}

/// Root level of the showcase.
pub fn showcase_root() -> Level {
    let main = "Scenes/Showcase.Showcase";
    Level::new()
        .with_resource(
            Resource::new("Lamp", "Light")
                .with_ref("target", SoftRef::new(main, "Root.Bulb"))
                .with_ref("material", SoftRef::to_object("Shared/Materials/Wood.Wood"))
                .with_ref("sublevel", SoftRef::to_object("Scenes/Showcase_Sub.Showcase_Sub"))
                .with_child(
                    Resource::new("Shade", "Mesh")
                        .with_ref("owner", SoftRef::new(main, "Root.Lamp"))
                        .with_ref("texture", SoftRef::to_object("Shared/Textures/Cloth.Cloth")),
                ),
        )
        .with_resource(
            Resource::new("Bulb", "Light")
                .with_ref("hum", SoftRef::to_object("Shared/Audio/Hum.Hum"))
                .with_prop(
                    "linked",
                    Value::List(vec![
                        Value::Ref(SoftRef::new(main, "Root.Lamp.Shade")),
                        Value::Ref(SoftRef::to_object("Shared/Materials/Glass.Glass")),
                        Value::Int(2),
                    ]),
                ),
        )
        .with_resource(
            Resource::new("Door", "Mesh")
                .with_prop("label", Value::Text(main.to_owned()))
                .with_ref("unset", SoftRef::null()),
        )
}

/// Full showcase content as stored in the template source.
pub fn showcase_content() -> GraphContent {
    GraphContent::with_root(showcase_root())
        .with_streaming(StreamingLevel::new(SHOWCASE_SUB))
        .with_streaming(StreamingLevel::new(SHOWCASE_LIGHTS).always_loaded())
        .with_tile(CompositionTile {
            package: SHOWCASE_TILE.to_owned(),
            lod_packages: Vec::new(),
        })
        .with_aux_package(SHOWCASE_AUX)
        .with_sound_mix(SHOWCASE_MIX)
}

/// Content of the on-request sub-level.
pub fn showcase_sub_content() -> GraphContent {
    GraphContent::with_root(
        Level::new().with_resource(
            Resource::new("Crate", "Prop")
                .with_ref("anchor", SoftRef::new("Scenes/Showcase_Sub.Showcase_Sub", "Root.Crate"))
                .with_ref("parent", SoftRef::to_object("Scenes/Showcase.Showcase"))
                .with_ref("wood", SoftRef::to_object("Shared/Materials/Wood.Wood")),
        ),
    )
}

/// Content of the always-loaded sub-level.
pub fn showcase_lights_content() -> GraphContent {
    GraphContent::with_root(
        Level::new().with_resource(
            Resource::new("Sun", "Light")
                .with_ref("lamp", SoftRef::new("Scenes/Showcase.Showcase", "Root.Lamp"))
                .with_ref("sky", SoftRef::to_object("Shared/Sky/Noon.Noon")),
        ),
    )
}

/// Template source holding the showcase and both of its sub-levels.
pub fn showcase_fixture() -> InMemoryTemplateSource {
    InMemoryTemplateSource::new()
        .with_graph(SHOWCASE, showcase_content())
        .with_graph(SHOWCASE_SUB, showcase_sub_content())
        .with_graph(SHOWCASE_LIGHTS, showcase_lights_content())
}
