use sprite_ngin::{
    data_structures::scene_graph::NodeId,
    flow::Game,
    gl::headless::{GlCall, HeadlessGl},
    pipelines::{indexed_buffer::quad_indices, shader_system::ShaderKey, source::SINGLE_QUAD_FRAG},
    renderer::webgl::WebGlRenderer,
};

use crate::common::test_utils::{
    HeadlessGame, StaticScene, add_textures, clears, draw_framebuffers, headless_game,
    test_config,
};

mod common;

#[test]
fn texture_unit_exhaustion_flushes_once_per_overflow() {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 7);
    let world = game.graph.create_world(64.0, 64.0);
    for key in &keys {
        let sprite = game.graph.create_sprite(8.0, 8.0, &game.textures, key, None);
        game.graph.add_child(world, sprite);
    }
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();

    // Units 1..=3 are handed out per batch; the 4th and 7th textures overflow.
    assert_eq!(game.renderer.flush_total(), 3);
    let counts: Vec<i32> = game
        .renderer
        .gl()
        .draw_calls()
        .into_iter()
        .filter_map(|call| match call {
            GlCall::DrawElements { count, .. } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![18, 18, 6]);
    assert!(game.renderer.textures.current_active() <= game.renderer.textures.max_textures);
    let last = game.textures.get(&keys[6]);
    assert_eq!(game.renderer.binding(last).map(|b| b.index), Some(1));
}

#[test]
fn shared_textures_do_not_overflow() {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 2);
    let world = game.graph.create_world(64.0, 64.0);
    for i in 0..10 {
        let sprite = game
            .graph
            .create_sprite(i as f32, 0.0, &game.textures, &keys[i % 2], None);
        game.graph.add_child(world, sprite);
    }
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();

    assert_eq!(game.renderer.flush_total(), 1);
    assert!(matches!(
        game.renderer.gl().draw_calls()[..],
        [GlCall::DrawElements { count: 60, .. }]
    ));
}

#[test]
fn full_batch_is_flushed_before_the_next_quad() {
    let config = test_config().with_batch_size(4);
    let mut game = headless_game(config);
    let keys = add_textures(&mut game.textures, 1);
    let world = game.graph.create_world(64.0, 64.0);
    for _ in 0..6 {
        let sprite = game.graph.create_sprite(0.0, 0.0, &game.textures, &keys[0], None);
        game.graph.add_child(world, sprite);
    }
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();

    assert_eq!(game.renderer.flush_total(), 2);
}

#[test]
fn index_buffer_is_deterministic() {
    let batch = 37;
    let indices = quad_indices(batch);
    assert_eq!(indices.len(), 6 * batch);
    for k in 0..batch {
        let base = 4 * k as u16;
        assert_eq!(
            indices[6 * k..6 * k + 6],
            [base, base + 1, base + 2, base + 2, base + 3, base]
        );
    }
}

#[test]
fn render_layer_bakes_once_until_a_child_moves() {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 2);
    let world = game.graph.create_world(64.0, 64.0);
    let layer = game.graph.create_render_layer();
    game.graph.add_child(world, layer);
    let a = game.graph.create_sprite(10.0, 10.0, &game.textures, &keys[0], None);
    let b = game.graph.create_sprite(30.0, 30.0, &game.textures, &keys[1], None);
    game.graph.add_children(layer, &[a, b]);
    game.install("main", Box::new(StaticScene::new(vec![world])));

    game.boot();
    assert_eq!(clears(game.renderer.gl()), 1, "first frame bakes the layer");
    let target = game
        .renderer
        .layer_texture(layer)
        .and_then(|binding| binding.framebuffer);
    assert!(target.is_some());
    // Children into the target, then the composite onto the backbuffer.
    assert_eq!(draw_framebuffers(game.renderer.gl()), vec![target, None]);

    for frame in 0..5 {
        game.renderer.gl().clear_calls();
        game.step(16.0 * (frame + 1) as f64);
        assert_eq!(clears(game.renderer.gl()), 0, "cached frame {frame} re-baked");
        assert_eq!(draw_framebuffers(game.renderer.gl()), vec![None]);
    }

    game.graph.set_position(b, 40.0, 40.0);
    game.renderer.gl().clear_calls();
    game.step(200.0);
    assert_eq!(clears(game.renderer.gl()), 1);
    assert_eq!(draw_framebuffers(game.renderer.gl()), vec![target, None]);

    game.renderer.gl().clear_calls();
    game.step(216.0);
    assert_eq!(clears(game.renderer.gl()), 0);
}

#[test]
fn hidden_layer_child_does_not_break_the_cache() {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 1);
    let world = game.graph.create_world(64.0, 64.0);
    let layer = game.graph.create_render_layer();
    game.graph.add_child(world, layer);
    let a = game.graph.create_sprite(10.0, 10.0, &game.textures, &keys[0], None);
    game.graph.add_child(layer, a);
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();

    game.graph.set_visible(a, false);
    game.renderer.gl().clear_calls();
    game.step(16.0);
    // The layer has no renderable entries left but still composites.
    assert_eq!(game.renderer.fbo.depth(), 0);
}

#[test]
fn effect_layer_runs_its_shader_chain() {
    let mut game = headless_game(test_config());
    let shader = game
        .renderer
        .add_shader("passthrough", SINGLE_QUAD_FRAG)
        .unwrap();
    let keys = add_textures(&mut game.textures, 1);
    let world = game.graph.create_world(64.0, 64.0);
    let layer = game.graph.create_effect_layer(vec![shader]);
    game.graph.add_child(world, layer);
    let sprite = game.graph.create_sprite(10.0, 10.0, &game.textures, &keys[0], None);
    game.graph.add_child(layer, sprite);
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();

    let layer_fb = game
        .renderer
        .layer_texture(layer)
        .and_then(|binding| binding.framebuffer);
    let shader_fb = game
        .renderer
        .shaders
        .get(ShaderKey::Custom(shader))
        .and_then(|s| s.target.as_ref())
        .and_then(|binding| binding.framebuffer);
    assert!(layer_fb.is_some() && shader_fb.is_some());
    assert_eq!(
        draw_framebuffers(game.renderer.gl()),
        vec![layer_fb, shader_fb, None]
    );
    assert_eq!(game.renderer.shaders.depth(), 1);
    assert_eq!(game.renderer.fbo.depth(), 0);
}

#[test]
fn failing_effect_shader_is_skipped() {
    let config = test_config();
    let gl = HeadlessGl::new(16).with_failing_shader("broken");
    let renderer = WebGlRenderer::new(gl, &config).unwrap();
    let mut game = Game::new(config, renderer);
    let source = format!("{SINGLE_QUAD_FRAG}\n// broken\n");
    let shader = game.renderer.add_shader("fx", &source).unwrap();
    let keys = add_textures(&mut game.textures, 1);
    let world = game.graph.create_world(64.0, 64.0);
    let layer = game.graph.create_effect_layer(vec![shader]);
    game.graph.add_child(world, layer);
    let sprite = game.graph.create_sprite(10.0, 10.0, &game.textures, &keys[0], None);
    game.graph.add_child(layer, sprite);
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();

    // The layer is composited straight from its own target.
    let layer_fb = game
        .renderer
        .layer_texture(layer)
        .and_then(|binding| binding.framebuffer);
    assert_eq!(draw_framebuffers(game.renderer.gl()), vec![layer_fb, None]);
    assert_eq!(game.renderer.shaders.depth(), 1);
}

#[test]
fn context_loss_suspends_and_restore_rebuilds() {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 1);
    let world = game.graph.create_world(64.0, 64.0);
    let sprite = game.graph.create_sprite(10.0, 10.0, &game.textures, &keys[0], None);
    game.graph.add_child(world, sprite);
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();
    let texture = game.textures.get(&keys[0]);
    assert!(game.renderer.binding(texture).is_some());

    game.renderer.gl().lose_context();
    game.renderer.on_context_lost();
    game.renderer.gl().clear_calls();
    game.step(16.0);
    assert!(game.renderer.gl().calls().is_empty());

    game.renderer.on_context_restored().unwrap();
    assert!(game.renderer.binding(texture).is_none());
    assert!(!game.renderer.context_lost());
    // Placeholders on every unit plus fresh shader programs.
    assert_eq!(game.renderer.gl().state().live_textures.len(), 4);
    assert!(!game.renderer.gl().state().live_programs.is_empty());

    game.renderer.gl().clear_calls();
    game.graph.set_x(sprite, 12.0);
    game.step(32.0);
    assert_eq!(game.renderer.gl().draw_calls().len(), 1);
    assert!(game.renderer.binding(texture).is_some());
    assert_eq!(game.renderer.gl().state().live_textures.len(), 5);
}

#[test]
fn removed_textures_are_deleted_once() {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 1);
    let world = game.graph.create_world(64.0, 64.0);
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();
    let id = game.textures.get(&keys[0]);
    assert!(game.renderer.binding(id).is_some());

    game.textures.remove(&keys[0]);
    game.renderer.gl().clear_calls();
    game.step(16.0);
    game.step(32.0);
    let deletes = game
        .renderer
        .gl()
        .calls()
        .iter()
        .filter(|c| matches!(c, GlCall::DeleteTexture(_)))
        .count();
    assert_eq!(deletes, 1);
    assert!(game.renderer.binding(id).is_none());
}

fn static_layer_game() -> (HeadlessGame, NodeId) {
    let mut game = headless_game(test_config());
    let keys = add_textures(&mut game.textures, 2);
    let world = game.graph.create_world(64.0, 64.0);
    let layer = game.graph.create_render_layer();
    game.graph.add_child(world, layer);
    let a = game.graph.create_sprite(10.0, 10.0, &game.textures, &keys[0], None);
    let b = game.graph.create_sprite(30.0, 30.0, &game.textures, &keys[1], None);
    game.graph.add_children(layer, &[a, b]);
    game.install("main", Box::new(StaticScene::new(vec![world])));
    game.boot();
    game.step(16.0);
    (game, layer)
}

fn layer_framebuffer(game: &HeadlessGame, layer: NodeId) -> Option<u32> {
    game.renderer
        .layer_texture(layer)
        .and_then(|binding| binding.framebuffer)
}

#[test]
fn resize_rebakes_static_layers() {
    let (mut game, layer) = static_layer_game();

    game.renderer.resize(128, 128, 1.0);
    game.renderer.gl().clear_calls();
    game.step(32.0);
    let target = layer_framebuffer(&game, layer);
    assert!(target.is_some());
    assert_eq!(clears(game.renderer.gl()), 1);
    assert_eq!(draw_framebuffers(game.renderer.gl()), vec![target, None]);

    game.renderer.gl().clear_calls();
    game.step(48.0);
    assert_eq!(clears(game.renderer.gl()), 0);
    assert_eq!(draw_framebuffers(game.renderer.gl()), vec![None]);
}

#[test]
fn context_restore_rebakes_static_layers() {
    let (mut game, layer) = static_layer_game();

    game.renderer.gl().lose_context();
    game.renderer.on_context_lost();
    game.step(32.0);
    game.renderer.on_context_restored().unwrap();
    assert!(game.renderer.layer_texture(layer).is_none());

    game.renderer.gl().clear_calls();
    game.step(48.0);
    let target = layer_framebuffer(&game, layer);
    assert!(target.is_some());
    assert_eq!(clears(game.renderer.gl()), 1);
    assert_eq!(draw_framebuffers(game.renderer.gl()), vec![target, None]);
}

#[test]
fn hiding_a_layer_child_rebakes_the_layer() {
    let (mut game, layer) = static_layer_game();
    let hidden = game.graph.children(layer)[1];
    let target = layer_framebuffer(&game, layer);

    game.graph.set_visible(hidden, false);
    game.renderer.gl().clear_calls();
    game.step(32.0);
    assert_eq!(clears(game.renderer.gl()), 1);
    let bake = game.renderer.gl().draw_calls();
    assert_eq!(draw_framebuffers(game.renderer.gl()), vec![target, None]);
    // Only the visible sprite is baked.
    assert!(matches!(bake[0], GlCall::DrawElements { count: 6, .. }));

    game.renderer.gl().clear_calls();
    game.step(48.0);
    assert_eq!(clears(game.renderer.gl()), 0);
}
