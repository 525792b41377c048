#![allow(dead_code)]

use std::{cell::Cell, rc::Rc};

use sprite_ngin::{
    context::Config,
    data_structures::{scene_graph::NodeId, texture::Texture},
    flow::{Game, Scene, SceneContext},
    gl::headless::{GlCall, HeadlessGl},
    logging::{LoggingConfig, init_logging},
    renderer::webgl::WebGlRenderer,
    resources::texture::{TextureManager, solid_color_texture},
};

pub const EPSILON: f32 = 1e-4;

pub fn init_test_logging() {
    init_logging(LoggingConfig {
        env_filter: Some("sprite_ngin=debug".into()),
        level: log::Level::Debug,
    });
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// A scene that renders worlds built by the test itself and counts its
/// updates.
pub struct StaticScene {
    pub worlds: Vec<NodeId>,
    pub boots: Rc<Cell<u32>>,
    pub updates: Rc<Cell<u32>>,
}

impl StaticScene {
    pub fn new(worlds: Vec<NodeId>) -> Self {
        Self {
            worlds,
            boots: Rc::new(Cell::new(0)),
            updates: Rc::new(Cell::new(0)),
        }
    }
}

impl Scene for StaticScene {
    fn on_boot(&mut self, _ctx: &mut SceneContext<'_>) {
        self.boots.set(self.boots.get() + 1);
    }

    fn on_update(&mut self, _ctx: &mut SceneContext<'_>, _delta: f64, _time: f64) {
        self.updates.set(self.updates.get() + 1);
    }

    fn worlds(&self) -> Vec<NodeId> {
        self.worlds.clone()
    }
}

pub type HeadlessGame = Game<WebGlRenderer<HeadlessGl>>;

pub fn test_config() -> Config {
    Config::new()
        .with_size(64, 64)
        .with_max_textures(4)
        .with_batch_size(16)
        .with_clear_before_render(false)
}

pub fn headless_game(config: Config) -> HeadlessGame {
    init_test_logging();
    let renderer = WebGlRenderer::new(HeadlessGl::new(16), &config).unwrap();
    Game::new(config, renderer)
}

/// Adds `count` distinct 4×4 textures named `tex0`, `tex1`, …
pub fn add_textures(textures: &mut TextureManager, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let key = format!("tex{i}");
            textures.add(&key, solid_color_texture(0xff0000 + i as u32, 4, 4));
            key
        })
        .collect()
}

pub fn add_texture(textures: &mut TextureManager, key: &str, width: u32, height: u32) {
    textures.add(key, Texture::empty(width, height));
}

pub fn clears(gl: &HeadlessGl) -> usize {
    gl.calls().iter().filter(|c| matches!(c, GlCall::Clear)).count()
}

pub fn draw_framebuffers(gl: &HeadlessGl) -> Vec<Option<u32>> {
    gl.draw_calls()
        .into_iter()
        .filter_map(|call| match call {
            GlCall::DrawElements { framebuffer, .. } => Some(framebuffer),
            _ => None,
        })
        .collect()
}
