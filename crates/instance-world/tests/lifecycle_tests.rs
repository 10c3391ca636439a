// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Initialization and teardown sequencing against a recording host.

mod common;

use instance_world::{
    GraphDuplicator, HoldKind, InstanceId, Lifecycle, LifecycleError, LifecycleState, StreamState,
    VisitRefs, WorldOptions,
};
use instance_world_dry_tests::{
    AudioEvent, TestHost, SHOWCASE, SHOWCASE_AUX, SHOWCASE_LIGHTS, SHOWCASE_MIX, SHOWCASE_SUB,
};

use common::{graph_of, minted, showcase_options, showcase_world};

#[test]
fn showcase_round_trip_with_a_pinned_id() {
    let mut t = TestHost::showcase();
    let id = InstanceId::new(7);
    let dup = GraphDuplicator::new(t.host.registry().clone());
    let graph = dup
        .create_from_template(&mut t.host, "Scenes/Showcase.Showcase", id)
        .expect("showcase duplicates");
    assert_eq!(graph.borrow().name(), "Scenes/INST_7_Showcase");

    let ctx = Lifecycle::initialize(&mut t.host, &graph, true, &showcase_options())
        .expect("showcase initializes");
    {
        let g = graph.borrow();
        assert!(g.has_begun_running());
        assert!(g.loaded_this_tick());
        assert!(g.should_update());
        let systems = g.systems().expect("systems created");
        assert!(!systems.initialized_as_new);
        assert!(systems.physics_scene && systems.fx_system);
        assert!(!systems.audio_playback);

        let localized = g
            .content()
            .root
            .collect_refs()
            .into_iter()
            .filter(|r| r.namespace() == Some(id))
            .count();
        assert_eq!(localized, 4);
    }
    assert_eq!(
        t.host.context(ctx).and_then(|c| c.last_url()),
        Some("Scenes/INST_7_Showcase")
    );

    let mut slot = Some(graph.clone());
    let report = Lifecycle::dispose(&mut t.host, &mut slot, true);
    assert!(slot.is_none());
    assert!(report.performed);
    assert!(report.forced_collection);
    assert_eq!(t.host.collections(), 1);
    assert!(graph.borrow().is_garbage());
    assert!(!graph.borrow().is_valid());
    assert!(!graph.borrow().has_begun_running());
    assert!(t.host.packages().is_empty());
    assert_eq!(t.host.context_count(), 0);
}

#[test]
fn initializing_a_registered_graph_is_rejected() {
    let mut t = TestHost::showcase();
    let dup = GraphDuplicator::new(t.host.registry().clone());
    let graph = dup.create_empty(InstanceId::new(800_001));
    let options = WorldOptions::new();
    assert!(Lifecycle::initialize(&mut t.host, &graph, false, &options).is_ok());
    assert_eq!(
        Lifecycle::initialize(&mut t.host, &graph, false, &options),
        Err(LifecycleError::AlreadyRegistered("INST_800001_EmptyInstanceWorld".to_owned()))
    );
    assert_eq!(t.host.context_count(), 1);
}

#[test]
fn disposal_leaves_nothing_of_the_instance() {
    let mut t = TestHost::showcase();
    let options = showcase_options()
        .with_extension_package("Ext/Weather")
        .with_audio_playback(true);
    let mut world = showcase_world(&mut t, options);
    let graph = graph_of(&world);
    let name = graph.borrow().name().to_owned();
    assert_eq!(world.state(), LifecycleState::Running);
    assert!(world.was_loaded_from_template());
    assert_eq!(t.host.holds().len(), 3);
    assert_eq!(t.host.packages().len(), 2);

    let report = world.dispose(&mut t.host);
    assert!(report.performed);
    assert_eq!(report.marked_packages, 2);
    assert_eq!(report.cancelled_streams, 0);
    assert!(report.forced_collection);

    assert_eq!(world.state(), LifecycleState::Destroyed);
    assert!(world.graph().is_none());
    assert!(world.context().is_none());
    assert!(t.host.holds().is_empty());
    assert!(t.host.packages().is_empty());
    assert_eq!(t.host.context_count(), 0);
    assert_eq!(t.host.listener_count(), 0);
    assert!(graph.borrow().is_garbage());
    assert_eq!(graph.borrow().systems(), None);
    assert_eq!(
        t.audio.events(),
        vec![
            AudioEvent::BaseMix(SHOWCASE_MIX.to_owned()),
            AudioEvent::Flush(name),
            AudioEvent::Volume(1.0),
        ]
    );

    let again = world.dispose(&mut t.host);
    assert!(!again.performed);
    assert_eq!(t.host.collections(), 1);
}

#[test]
fn holds_are_released_most_recent_first() {
    let mut t = TestHost::showcase();
    let options = showcase_options()
        .with_extension_package("Ext/Weather")
        .with_extension_package("Ext/Crowds");
    let mut world = showcase_world(&mut t, options);
    let main = minted("Scenes", &world, "Showcase");
    let acquired: Vec<_> = t.host.holds().iter().map(|h| (h.kind, h.package.clone())).collect();
    assert_eq!(
        acquired,
        vec![
            (HoldKind::Extension, "Ext/Weather".to_owned()),
            (HoldKind::Extension, "Ext/Crowds".to_owned()),
            (HoldKind::GraphPackage, main.clone()),
            (HoldKind::Auxiliary, SHOWCASE_AUX.to_owned()),
        ]
    );
    let report = world.dispose(&mut t.host);
    let released: Vec<_> = report.released_holds.into_iter().map(|h| h.package).collect();
    assert_eq!(
        released,
        vec![SHOWCASE_AUX.to_owned(), main, "Ext/Crowds".to_owned(), "Ext/Weather".to_owned()]
    );
}

#[test]
fn compile_work_settles_before_the_graph_package_is_held() {
    let mut t = TestHost::showcase();
    t.compile.enqueue(3);
    let mut world = showcase_world(&mut t, showcase_options());
    assert_eq!(t.compile.polls(), 3);
    world.dispose(&mut t.host);
}

#[test]
fn empty_instances_take_no_holds_and_no_compile_wait() {
    let mut t = TestHost::showcase();
    t.compile.enqueue(2);
    let mut world = showcase_world(&mut t, WorldOptions::new().with_extension_package("Ext/Unused"));
    assert!(!world.was_loaded_from_template());
    assert!(t.host.holds().is_empty());
    assert_eq!(t.compile.polls(), 0);
    let graph = graph_of(&world);
    assert_eq!(graph.borrow().systems().map(|s| s.initialized_as_new), Some(true));
    let report = world.dispose(&mut t.host);
    assert!(report.released_holds.is_empty());
    assert_eq!(report.marked_packages, 0);
    assert!(report.forced_collection);
}

#[test]
fn editor_hosts_do_not_stream_always_loaded_levels() {
    let mut t = TestHost::showcase().editor();
    let mut world = showcase_world(&mut t, showcase_options());
    let graph = graph_of(&world);
    assert!(graph
        .borrow()
        .content()
        .streaming
        .iter()
        .all(|s| s.state == StreamState::Unloaded));
    assert_eq!(t.templates.load_count(SHOWCASE_LIGHTS), 0);
    assert_eq!(t.host.packages().len(), 1);
    world.dispose(&mut t.host);
}

#[test]
fn requested_levels_stream_in_on_the_next_tick() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let graph = graph_of(&world);
    assert!(graph.borrow_mut().request_stream_in(SHOWCASE_SUB));
    assert_eq!(t.host.tick(0.016).levels_streamed, 1);

    let g = graph.borrow();
    let slot = &g.content().streaming[0];
    assert_eq!(slot.state, StreamState::Shown);
    let crate_res = slot.loaded.as_ref().and_then(|l| l.find("Crate")).expect("crate streamed");
    assert!(crate_res.has_begun_running());
    let sub = format!("{}.Showcase_Sub", minted("Scenes", &world, "Showcase_Sub"));
    let main = format!("{}.Showcase", minted("Scenes", &world, "Showcase"));
    assert_eq!(crate_res.reference("anchor").map(|r| r.path().to_owned()), Some(sub));
    assert_eq!(crate_res.reference("parent").map(|r| r.path().to_owned()), Some(main));
    assert_eq!(
        crate_res.reference("wood").map(|r| r.path().to_owned()),
        Some("Shared/Materials/Wood.Wood".to_owned())
    );
    drop(g);
    world.dispose(&mut t.host);
}

#[test]
fn frozen_streaming_holds_requests_back() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let graph = graph_of(&world);
    {
        let mut g = graph.borrow_mut();
        g.set_streaming_frozen(true);
        assert!(g.request_stream_in(SHOWCASE_SUB));
    }
    assert_eq!(t.host.tick(0.016).levels_streamed, 0);
    assert_eq!(graph.borrow().content().streaming[0].state, StreamState::Pending);
    graph.borrow_mut().set_streaming_frozen(false);
    assert_eq!(t.host.tick(0.016).levels_streamed, 1);
    world.dispose(&mut t.host);
}

#[test]
fn teardown_cancels_pending_stream_ins() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let graph = graph_of(&world);
    assert!(graph.borrow_mut().request_stream_in(SHOWCASE_SUB));

    let loads_before = t.templates.load_count(SHOWCASE_SUB);
    let report = world.dispose(&mut t.host);
    assert_eq!(report.cancelled_streams, 1);
    assert_eq!(t.templates.load_count(SHOWCASE_SUB), loads_before);
    let g = graph.borrow();
    assert_eq!(g.content().streaming[0].state, StreamState::Cancelled);
    assert!(!g.content().streaming[0].should_be_loaded);
    assert!(g.is_garbage());
}

#[test]
fn stream_requests_after_teardown_are_refused() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let graph = graph_of(&world);
    world.dispose(&mut t.host);
    assert!(!graph.borrow_mut().request_stream_in(SHOWCASE_SUB));
}

fn disposal_under(block: impl FnOnce(&mut TestHost), unblock: impl FnOnce(&mut TestHost)) {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let main = minted("Scenes", &world, "Showcase");
    block(&mut t);
    assert!(Lifecycle::collection_blocked(&t.host));

    let report = world.dispose(&mut t.host);
    assert!(report.performed);
    assert!(!report.forced_collection);
    assert_eq!(t.host.collections(), 0);
    assert!(t.host.packages().is_garbage(&main));

    unblock(&mut t);
    if !Lifecycle::collection_blocked(&t.host) {
        assert_eq!(t.host.collect_garbage(), 2);
        assert!(t.host.packages().is_empty());
    }
}

#[test]
fn no_forced_collection_during_shutdown() {
    disposal_under(|t| t.host.begin_shutdown(), |_| {});
}

#[test]
fn no_forced_collection_while_a_session_ends() {
    disposal_under(|t| t.host.begin_session_end(), |t| t.host.end_session_end());
}

#[test]
fn no_forced_collection_inside_a_collection() {
    disposal_under(|t| t.host.begin_collection(), |t| t.host.end_collection());
}

#[test]
fn a_nested_pass_does_not_end_the_host_collection() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    t.host.begin_collection();
    assert_eq!(t.host.collect_garbage(), 0);
    assert!(t.host.is_collecting());
    assert!(Lifecycle::collection_blocked(&t.host));

    let report = world.dispose(&mut t.host);
    assert!(report.performed);
    assert!(!report.forced_collection);
    assert_eq!(t.host.collections(), 1);
    t.host.end_collection();
    assert_eq!(t.host.collect_garbage(), 2);
}

#[test]
fn hidden_levels_are_dropped_at_teardown() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let graph = graph_of(&world);
    assert!(graph.borrow_mut().request_stream_in(SHOWCASE_SUB));
    assert_eq!(t.host.tick(0.016).levels_streamed, 1);
    assert!(graph.borrow_mut().set_stream_visibility(SHOWCASE_SUB, false));
    assert!(!graph.borrow_mut().set_stream_visibility("Scenes/Nowhere", false));

    let report = world.dispose(&mut t.host);
    assert_eq!(report.unloaded_streams, 1);
    assert_eq!(report.cancelled_streams, 0);
    let g = graph.borrow();
    let sub = &g.content().streaming[0];
    assert_eq!(sub.state, StreamState::Unloaded);
    assert!(sub.loaded.is_none());
    let lights = g
        .content()
        .streaming
        .iter()
        .find(|s| s.load_package() == SHOWCASE_LIGHTS)
        .expect("lights slot");
    assert_eq!(lights.state, StreamState::Shown);
    assert!(lights.loaded.is_some());
}

#[test]
fn showcase_key_is_the_package_not_the_object() {
    let mut t = TestHost::showcase();
    let mut a = showcase_world(&mut t, WorldOptions::from_template(SHOWCASE));
    let mut b = showcase_world(&mut t, showcase_options());
    assert_eq!(
        graph_of(&a).borrow().source(),
        graph_of(&b).borrow().source()
    );
    a.dispose(&mut t.host);
    b.dispose(&mut t.host);
    assert_eq!(t.host.collections(), 2);
}
