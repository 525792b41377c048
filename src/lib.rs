//! sprite-ngin
//!
//! A 2D scene-graph engine with a batching WebGL renderer and a Canvas2D
//! fallback. Nodes live in a [`SceneGraph`](data_structures::scene_graph::SceneGraph)
//! arena; every frame each world is flattened into a render list which a
//! [`Renderer`](flow::Renderer) turns into draw calls.
//!
//! High-level modules
//! - `context`: engine configuration
//! - `data_structures`: math, textures, nodes and the scene graph
//! - `flow`: game loop, scenes and the renderer seam
//! - `gl`: the GL surface the WebGL renderer needs, over glow or headless
//! - `pipelines`: quad batching, shaders and vertex layout
//! - `render`: per-frame render lists and dirty counting
//! - `renderer`: WebGL and Canvas renderers and their GPU bookkeeping
//! - `resources`: texture management and the asset loader
//!

pub mod context;
pub mod data_structures;
pub mod error;
pub mod events;
pub mod flow;
pub mod gl;
pub mod logging;
pub mod pipelines;
#[cfg(target_arch = "wasm32")]
pub mod platform;
pub mod render;
pub mod renderer;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use context::{Config, RendererKind};
pub use data_structures::scene_graph::{NodeId, SceneGraph};
pub use error::{NginError, NginResult};
pub use flow::{Game, Renderer, Scene, SceneContext};
pub use resources::texture::TextureManager;
