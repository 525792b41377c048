use std::{cell::Cell, rc::Rc};

use sprite_ngin::{
    data_structures::scene_graph::{GraphEvent, GraphEventKind, NodeId, SceneGraph},
    flow::GameEvent,
};

use crate::common::test_utils::{StaticScene, add_textures, headless_game, test_config};

mod common;

fn drift(graph: &mut SceneGraph, id: NodeId, _delta: f64, _time: f64) {
    let x = graph.get(id).map_or(0.0, |n| n.transform.position.x);
    graph.set_x(id, x + 1.0);
}

#[test]
fn boot_runs_scenes_and_the_first_frame() {
    let mut game = headless_game(test_config());
    let world = game.graph.create_world(64.0, 64.0);
    let scene = StaticScene::new(vec![world]);
    let (boots, updates) = (scene.boots.clone(), scene.updates.clone());
    game.install("main", Box::new(scene));

    let booted = Rc::new(Cell::new(0));
    let counter = booted.clone();
    game.events.on(GameEvent::Boot, move |_| counter.set(counter.get() + 1));

    game.boot();
    game.boot();
    assert!(game.is_booted());
    assert_eq!(booted.get(), 1);
    assert_eq!(boots.get(), 1);
    assert_eq!(updates.get(), 1);
    assert_eq!(game.frame(), 1);
    assert_eq!(game.graph.frame(), 1);
}

#[test]
fn duplicate_scene_keys_are_rejected() {
    let mut game = headless_game(test_config());
    assert!(game.install("main", Box::new(StaticScene::new(Vec::new()))));
    assert!(!game.install("main", Box::new(StaticScene::new(Vec::new()))));
    assert_eq!(game.scenes.len(), 1);
}

#[test]
fn scenes_installed_after_boot_boot_immediately() {
    let mut game = headless_game(test_config());
    game.boot();
    let scene = StaticScene::new(Vec::new());
    let boots = scene.boots.clone();
    game.install("late", Box::new(scene));
    assert_eq!(boots.get(), 1);
}

#[test]
fn paused_games_skip_update_and_render_but_count_frames() {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 1);
    let world = game.graph.create_world(64.0, 64.0);
    let sprite = game.graph.create_sprite(0.0, 0.0, &game.textures, &keys[0], None);
    game.graph.add_child(world, sprite);
    game.graph.set_update_hook(sprite, drift);
    let scene = StaticScene::new(vec![world]);
    let updates = scene.updates.clone();
    game.install("main", Box::new(scene));

    let deltas = Rc::new(std::cell::RefCell::new(Vec::new()));
    let seen = deltas.clone();
    game.events
        .on(GameEvent::Update, move |(delta, _)| seen.borrow_mut().push(*delta));

    game.boot();
    game.step(100.0);
    assert_eq!(updates.get(), 2);
    assert_eq!(game.graph.get(sprite).unwrap().transform.position.x, 2.0);

    game.pause();
    game.renderer.gl().clear_calls();
    game.step(116.0);
    game.step(132.0);
    assert!(game.is_paused());
    assert_eq!(updates.get(), 2);
    assert!(game.renderer.gl().calls().is_empty());
    assert_eq!(game.frame(), 4);

    game.resume();
    let resumed_at = game.now();
    game.step(resumed_at + 16.0);
    assert_eq!(updates.get(), 3);
    assert_eq!(game.graph.get(sprite).unwrap().transform.position.x, 3.0);
    assert!(!game.renderer.gl().draw_calls().is_empty());
    // The pause does not leak into the first delta after resuming.
    let last = *deltas.borrow().last().unwrap();
    assert!((16.0..17.0).contains(&last), "delta after resume was {last}");
}

#[test]
fn disabling_render_keeps_updating() {
    let mut game = headless_game(test_config());
    let world = game.graph.create_world(64.0, 64.0);
    let scene = StaticScene::new(vec![world]);
    let updates = scene.updates.clone();
    game.install("main", Box::new(scene));
    game.will_render = false;

    let renders = Rc::new(Cell::new(0));
    let counter = renders.clone();
    game.events.on(GameEvent::Render, move |_| counter.set(counter.get() + 1));

    game.boot();
    game.step(16.0);
    assert_eq!(updates.get(), 2);
    assert_eq!(renders.get(), 0);
}

#[test]
fn hidden_worlds_do_not_render_or_update_their_nodes() {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 1);
    let world = game.graph.create_world(64.0, 64.0);
    let sprite = game.graph.create_sprite(0.0, 0.0, &game.textures, &keys[0], None);
    game.graph.add_child(world, sprite);
    game.graph.set_update_hook(sprite, drift);
    game.graph.set_visible(world, false);
    game.graph.get_mut(world).unwrap().will_update = false;
    game.install("main", Box::new(StaticScene::new(vec![world])));

    game.boot();
    assert!(game.renderer.gl().draw_calls().is_empty());
    assert_eq!(game.graph.get(sprite).unwrap().transform.position.x, 0.0);
}

#[test]
fn graph_events_are_dispatched_every_step() {
    let mut game = headless_game(test_config());
    let world = game.graph.create_world(64.0, 64.0);
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();

    let added = Rc::new(Cell::new(0));
    let removed = Rc::new(Cell::new(0));
    let (on_add, on_remove) = (added.clone(), removed.clone());
    game.graph_events
        .on(GraphEventKind::AddedToWorld, move |event| {
            assert!(matches!(event, GraphEvent::AddedToWorld { .. }));
            on_add.set(on_add.get() + 1);
        });
    game.graph_events
        .on(GraphEventKind::RemovedFromWorld, move |_| on_remove.set(on_remove.get() + 1));

    let node = game.graph.create_container(0.0, 0.0);
    for frame in 0..100 {
        game.graph.add_child(world, node);
        game.graph.remove_child(world, node);
        game.step(16.0 * (frame + 1) as f64);
    }

    assert_eq!(added.get(), 100);
    assert_eq!(removed.get(), 100);
    assert!(game.graph.drain_events().is_empty());
}
