// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Template duplication: reference locality, redirects and cleanup on failure.

mod common;

use instance_world::{
    DuplicateError, GraphDuplicator, Host, InstanceError, InstanceId, InstanceWorld, SoftRef,
    TemplateError, VisitRefs, WorldOptions,
};
use instance_world_dry_tests::{
    is_shared, InMemoryTemplateSource, TestHost, SHOWCASE, SHOWCASE_LIGHTS, SHOWCASE_SUB,
};

use common::{graph_of, minted, showcase_options, showcase_world};

fn reference(world: &InstanceWorld, resource: &str, key: &str) -> SoftRef {
    let graph = graph_of(world);
    let g = graph.borrow();
    g.content()
        .root
        .find(resource)
        .and_then(|r| r.reference(key))
        .cloned()
        .unwrap_or_else(|| panic!("{resource}.{key} missing"))
}

#[test]
fn internal_references_follow_the_copy_and_shared_ones_do_not() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let main = format!("{}.Showcase", minted("Scenes", &world, "Showcase"));

    let target = reference(&world, "Lamp", "target");
    assert_eq!(target.path(), main);
    assert_eq!(target.sub_path(), "Root.Bulb");

    let sublevel = reference(&world, "Lamp", "sublevel");
    assert_eq!(sublevel.path(), format!("{}.Showcase_Sub", minted("Scenes", &world, "Showcase_Sub")));

    let owner = reference(&world, "Lamp.Shade", "owner");
    assert_eq!(owner.path(), main);

    assert_eq!(reference(&world, "Lamp", "material").path(), "Shared/Materials/Wood.Wood");
    assert!(reference(&world, "Door", "unset").is_null());

    let graph = graph_of(&world);
    let refs = graph.borrow().content().root.collect_refs();
    for r in refs.iter().filter(|r| !r.is_null()) {
        if is_shared(r) {
            assert_eq!(r.namespace(), None, "{r} should stay shared");
        } else {
            assert_eq!(r.namespace(), Some(world.id()), "{r} should be localized");
        }
    }
    let label = graph.borrow().content().root.find("Door").and_then(|r| r.prop("label")).cloned();
    assert_eq!(label, Some(instance_world::Value::Text("Scenes/Showcase.Showcase".to_owned())));

    world.dispose(&mut t.host);
}

#[test]
fn template_content_is_never_mutated() {
    let mut t = TestHost::showcase();
    let mut a = showcase_world(&mut t, showcase_options());
    let mut b = showcase_world(&mut t, showcase_options());
    assert_ne!(graph_of(&a).borrow().name(), graph_of(&b).borrow().name());

    let pristine = instance_world_dry_tests::showcase_content().root.collect_refs();
    let reloaded = instance_world::resolve_template(&t.templates, SHOWCASE)
        .expect("showcase resolves")
        .root
        .collect_refs();
    assert_eq!(pristine, reloaded);

    a.dispose(&mut t.host);
    b.dispose(&mut t.host);
}

#[test]
fn every_minted_identity_is_registered() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let mut expected = vec![
        minted("Scenes", &world, "Showcase"),
        minted("Scenes", &world, "Showcase_Lights"),
        minted("Scenes", &world, "Showcase_Sub"),
        minted("Scenes/Tiles", &world, "Showcase_X0_Y0"),
    ];
    expected.sort();
    assert_eq!(t.host.registry().entries_for(world.id()), expected);
    world.dispose(&mut t.host);
    // the registry never forgets
    assert_eq!(t.host.registry().entries_for(world.id()).len(), 4);
}

#[test]
fn redirects_duplicate_under_the_requested_name() {
    let mut t = TestHost::showcase();
    t.templates.insert_redirect("Scenes/Legacy", "Scenes/Showcase.Showcase");
    let mut world = showcase_world(&mut t, WorldOptions::from_template("Scenes/Legacy"));
    let graph = graph_of(&world);
    assert_eq!(graph.borrow().name(), minted("Scenes", &world, "Legacy"));
    assert_eq!(graph.borrow().source(), Some("Scenes/Legacy"));
    assert!(graph.borrow().content().root.contains("Lamp"));
    assert_eq!(t.templates.load_count(SHOWCASE), 1);
    world.dispose(&mut t.host);
}

fn assert_nothing_leaked(t: &TestHost) {
    assert!(t.host.registry().is_empty(), "registry: {:?}", t.host.registry());
    assert!(t.host.packages().is_empty(), "packages: {:?}", t.host.packages().names().collect::<Vec<_>>());
    assert_eq!(t.host.context_count(), 0);
    assert!(t.host.holds().is_empty());
}

#[test]
fn missing_templates_leak_no_namespace() {
    let mut t = TestHost::showcase();
    let err = InstanceWorld::new(&mut t.host, WorldOptions::from_template("Scenes/Missing")).unwrap_err();
    assert!(matches!(
        err,
        InstanceError::Duplicate(DuplicateError::Template(TemplateError::NotFound(ref p))) if p == "Scenes/Missing"
    ));
    assert_nothing_leaked(&t);
}

#[test]
fn malformed_templates_leak_no_namespace() {
    let mut t = TestHost::new(InMemoryTemplateSource::new());
    t.templates.insert_malformed("Scenes/Broken", "bad header");
    t.templates.insert_assets("Shared/Materials/Wood");
    for template in ["Scenes/Broken", "Shared/Materials/Wood"] {
        let err = InstanceWorld::new(&mut t.host, WorldOptions::from_template(template)).unwrap_err();
        assert!(matches!(
            err,
            InstanceError::Duplicate(DuplicateError::Template(TemplateError::Malformed { .. }))
        ));
    }
    assert_nothing_leaked(&t);
}

#[test]
fn redirect_loops_leak_no_namespace() {
    let mut t = TestHost::new(InMemoryTemplateSource::new());
    t.templates.insert_redirect("Scenes/A", "Scenes/B.B");
    t.templates.insert_redirect("Scenes/B", "Scenes/A.A");
    assert!(InstanceWorld::new(&mut t.host, WorldOptions::from_template("Scenes/A")).is_err());
    assert_nothing_leaked(&t);
    assert!(t.templates.total_loads() > instance_world::MAX_REDIRECTS);
}

#[test]
fn failed_stream_ins_release_their_storage() {
    let mut t = TestHost::showcase();
    t.templates.remove(SHOWCASE_SUB);
    let mut world = showcase_world(&mut t, showcase_options());
    let graph = graph_of(&world);
    assert!(graph.borrow_mut().request_stream_in(SHOWCASE_SUB));
    let report = t.host.tick(0.016);
    assert_eq!(report.levels_streamed, 0);
    let sub = minted("Scenes", &world, "Showcase_Sub");
    assert!(!t.host.packages().contains(&sub));
    assert_eq!(
        graph.borrow().content().streaming[0].state,
        instance_world::StreamState::Failed
    );
    assert!(t.host.packages().contains(&minted("Scenes", &world, "Showcase_Lights")));
    world.dispose(&mut t.host);
    assert!(t.host.packages().is_empty());
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "namespace collision"))]
fn duplicating_twice_into_one_namespace_is_a_collision() {
    let mut host = Host::new(instance_world_dry_tests::showcase_fixture());
    let dup = GraphDuplicator::new(host.registry().clone());
    let id = InstanceId::new(900_001);
    let _first = dup.create_from_template(&mut host, SHOWCASE, id).expect("first copy");
    let second = dup.create_from_template(&mut host, SHOWCASE, id);
    assert_eq!(
        second.unwrap_err(),
        DuplicateError::NamespaceCollision("Scenes/INST_900001_Showcase".to_owned())
    );
}

#[test]
fn always_loaded_levels_arrive_localized() {
    let mut t = TestHost::showcase();
    let mut world = showcase_world(&mut t, showcase_options());
    let graph = graph_of(&world);
    {
        let g = graph.borrow();
        let lights = g
            .content()
            .streaming
            .iter()
            .find(|s| s.load_package() == SHOWCASE_LIGHTS)
            .expect("lights slot");
        assert_eq!(lights.state, instance_world::StreamState::Shown);
        let level = lights.loaded.as_ref().expect("lights loaded");
        let sun = level.find("Sun").expect("sun");
        assert!(sun.has_begun_running());
        assert_eq!(
            sun.reference("lamp").map(SoftRef::path),
            Some(format!("{}.Showcase", minted("Scenes", &world, "Showcase")).as_str())
        );
        assert_eq!(sun.reference("sky").map(SoftRef::path), Some("Shared/Sky/Noon.Noon"));
    }
    world.dispose(&mut t.host);
}
