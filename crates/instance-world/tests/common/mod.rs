// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use instance_world::{GraphHandle, InstanceWorld, WorldOptions};
use instance_world_dry_tests::{TestHost, SHOWCASE};

/// Options building the showcase by its object path.
pub fn showcase_options() -> WorldOptions {
    WorldOptions::from_template(format!("{SHOWCASE}.Showcase"))
}

/// Builds a showcase instance on `t`, panicking on failure.
pub fn showcase_world(t: &mut TestHost, options: WorldOptions) -> InstanceWorld {
    match InstanceWorld::new(&mut t.host, options) {
        Ok(world) => world,
        Err(err) => panic!("showcase instance failed to build: {err}"),
    }
}

/// Graph handle of a live instance.
pub fn graph_of(world: &InstanceWorld) -> GraphHandle {
    match world.graph() {
        Some(graph) => graph.clone(),
        None => panic!("instance {} has no graph", world.id()),
    }
}

/// Namespaced package `dir/INST_<id>_leaf`.
pub fn minted(dir: &str, world: &InstanceWorld, leaf: &str) -> String {
    format!("{dir}/{}{leaf}", world.prefix())
}
