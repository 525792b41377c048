//! Game loop, scenes and the renderer seam.
//!
//! A [`Game`] owns the scene graph, the texture manager, the installed
//! scenes and a [`Renderer`]. Each call to [`Game::step`] is one frame:
//!
//! 1. Compute the delta since the previous step
//! 2. Run scene and node update hooks (`will_update`)
//! 3. Build the render lists of every world and hand them to the renderer
//!    (`will_render`)
//! 4. Dispatch queued graph events and advance the frame counter
//!
//! Steps 2 and 3 are skipped while paused; the frame counter always moves.
//! What drives `step` is up to the platform: tests call it directly,
//! the browser calls it from `requestAnimationFrame`.

use std::collections::HashSet;

use instant::Instant;
use log::{info, warn};

use crate::{
    context::Config,
    data_structures::scene_graph::{GraphEvent, GraphEventKind, NodeId, SceneGraph},
    events::EventEmitter,
    render::{SceneRenderData, render_world},
    resources::texture::TextureManager,
};

/// Something that turns a frame's render data into pixels.
pub trait Renderer {
    /// Runs before the frame's render lists are built.
    fn prepare(&mut self, _graph: &mut SceneGraph) {}

    fn render(&mut self, graph: &mut SceneGraph, textures: &mut TextureManager, data: &SceneRenderData);

    /// `width`×`height` CSS pixels at `resolution` device pixels each.
    fn resize(&mut self, width: u32, height: u32, resolution: f32);

    /// Size in CSS pixels.
    fn size(&self) -> (u32, u32);

    fn set_background_color(&mut self, color: u32);
}

/// What a scene can touch while booting or updating.
pub struct SceneContext<'a> {
    pub graph: &'a mut SceneGraph,
    pub textures: &'a mut TextureManager,
    pub config: &'a Config,
}

/// A self-contained part of the game: it creates worlds and nodes on boot
/// and reports which worlds it renders.
///
/// # Lifecycle
///
/// 1. `on_boot()` is called once when the game boots (or right away when the
///    scene is installed into a booted game)
/// 2. `on_update()` is called every unpaused frame, before the node hooks of
///    its worlds run
/// 3. `worlds()` is queried every frame to build the render lists, in order
pub trait Scene {
    fn on_boot(&mut self, ctx: &mut SceneContext<'_>);

    fn on_update(&mut self, _ctx: &mut SceneContext<'_>, _delta: f64, _time: f64) {}

    fn worlds(&self) -> Vec<NodeId>;
}

struct InstalledScene {
    key: String,
    scene: Box<dyn Scene>,
    booted: bool,
}

/// Scenes in installation order.
#[derive(Default)]
pub struct SceneManager {
    scenes: Vec<InstalledScene>,
    keys: HashSet<String>,
    /// Forces the next frame to count as dirty.
    pub flush: bool,
}

impl SceneManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `scene` under `key`. A key can only be used once. The next
    /// frame counts as dirty.
    pub fn install(&mut self, key: &str, scene: Box<dyn Scene>) -> bool {
        if !self.keys.insert(key.to_string()) {
            warn!("scene '{key}' is already installed");
            return false;
        }
        self.flush = true;
        self.scenes.push(InstalledScene {
            key: key.to_string(),
            scene,
            booted: false,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.scenes.iter().map(|s| s.key.as_str())
    }

    /// Boots every scene that has not been booted yet.
    pub fn boot(&mut self, ctx: &mut SceneContext<'_>) {
        for installed in self.scenes.iter_mut().filter(|s| !s.booted) {
            installed.scene.on_boot(ctx);
            installed.booted = true;
        }
    }

    pub fn update(&mut self, ctx: &mut SceneContext<'_>, delta: f64, time: f64) {
        for installed in self.scenes.iter_mut().filter(|s| s.booted) {
            installed.scene.on_update(ctx, delta, time);
            for world in installed.scene.worlds() {
                if ctx.graph.get(world).is_some_and(|w| w.will_update) {
                    ctx.graph.update(world, delta, time);
                }
            }
        }
    }

    /// Builds the render data of every world of every booted scene.
    pub fn render(&mut self, graph: &mut SceneGraph, game_frame: u64) -> SceneRenderData {
        let mut data = SceneRenderData::new(game_frame);
        for installed in self.scenes.iter().filter(|s| s.booted) {
            for world in installed.scene.worlds() {
                render_world(graph, world, &mut data);
            }
        }
        if self.flush {
            data.num_dirty_frames += 1;
            self.flush = false;
        }
        data
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameEvent {
    Boot,
    /// After the update phase; args are `(delta, time)`.
    Update,
    /// After the renderer has drawn the frame; args are `(delta, time)`.
    Render,
    Pause,
    Resume,
}

pub struct Game<R: Renderer> {
    pub config: Config,
    pub renderer: R,
    pub graph: SceneGraph,
    pub textures: TextureManager,
    pub scenes: SceneManager,
    pub events: EventEmitter<GameEvent, (f64, f64)>,
    /// Structural graph changes, dispatched once per step.
    pub graph_events: EventEmitter<GraphEventKind, GraphEvent>,
    pub will_update: bool,
    pub will_render: bool,
    is_booted: bool,
    is_paused: bool,
    last_tick: f64,
    elapsed: f64,
    frame: u64,
    clock: Instant,
}

impl<R: Renderer> Game<R> {
    pub fn new(config: Config, renderer: R) -> Self {
        let graph = SceneGraph::with_default_origin(config.default_origin);
        Self {
            config,
            renderer,
            graph,
            textures: TextureManager::new(),
            scenes: SceneManager::new(),
            events: EventEmitter::new(),
            graph_events: EventEmitter::new(),
            will_update: true,
            will_render: true,
            is_booted: false,
            is_paused: false,
            last_tick: 0.0,
            elapsed: 0.0,
            frame: 0,
            clock: Instant::now(),
        }
    }

    /// Installs a scene, booting it immediately if the game already runs.
    pub fn install(&mut self, key: &str, scene: Box<dyn Scene>) -> bool {
        let installed = self.scenes.install(key, scene);
        if installed && self.is_booted {
            self.boot_scenes();
        }
        installed
    }

    fn boot_scenes(&mut self) {
        let mut ctx = SceneContext {
            graph: &mut self.graph,
            textures: &mut self.textures,
            config: &self.config,
        };
        self.scenes.boot(&mut ctx);
    }

    /// Boots all installed scenes and runs the first step.
    pub fn boot(&mut self) {
        if self.is_booted {
            return;
        }
        self.graph.set_game_frame(self.frame);
        self.boot_scenes();
        self.is_booted = true;
        info!("booted with {} scene(s)", self.scenes.len());
        self.events.emit(&GameEvent::Boot, &(0.0, 0.0));
        self.last_tick = self.now();
        self.step(self.last_tick);
    }

    pub fn is_booted(&self) -> bool {
        self.is_booted
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Milliseconds accumulated over all steps, paused ones included.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Milliseconds since the game was created.
    pub fn now(&self) -> f64 {
        self.clock.elapsed().as_secs_f64() * 1000.0
    }

    pub fn pause(&mut self) {
        self.is_paused = true;
        self.events.emit(&GameEvent::Pause, &(0.0, self.last_tick));
    }

    /// Resumes without counting the paused time as one huge delta.
    pub fn resume(&mut self) {
        self.is_paused = false;
        self.last_tick = self.now();
        self.events.emit(&GameEvent::Resume, &(0.0, self.last_tick));
    }

    /// Runs one frame at `time` milliseconds.
    pub fn step(&mut self, time: f64) {
        let delta = time - self.last_tick;
        self.last_tick = time;
        self.elapsed += delta;

        if !self.is_paused {
            if self.will_update {
                let mut ctx = SceneContext {
                    graph: &mut self.graph,
                    textures: &mut self.textures,
                    config: &self.config,
                };
                self.scenes.update(&mut ctx, delta, time);
                self.events.emit(&GameEvent::Update, &(delta, time));
            }
            if self.will_render {
                self.renderer.prepare(&mut self.graph);
                let data = self.scenes.render(&mut self.graph, self.frame);
                self.renderer.render(&mut self.graph, &mut self.textures, &data);
                self.events.emit(&GameEvent::Render, &(delta, time));
            }
        }

        for event in self.graph.drain_events() {
            self.graph_events.emit(&event.kind(), &event);
        }
        self.frame += 1;
        self.graph.set_game_frame(self.frame);
    }

    /// Steps at the current clock time.
    pub fn tick(&mut self) {
        let now = self.now();
        self.step(now);
    }
}

#[cfg(target_arch = "wasm32")]
pub use crate::platform::web::{run, run_with_loader};
