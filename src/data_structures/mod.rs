//! Scene data: geometry, transforms, textures and the node tree.
//!
//! - `matrix` and `geometry` hold the 2D math types
//! - `dirty` and `transform` are the per-node state the renderers read
//! - `texture` holds CPU-side images and their frames
//! - `sprite` builds the quad vertices of a textured node
//! - `scene_graph` owns every node and implements hierarchy operations
//! - `world` is the root of a renderable tree plus its camera

pub mod dirty;
pub mod geometry;
pub mod matrix;
pub mod scene_graph;
pub mod sprite;
pub mod texture;
pub mod transform;
pub mod world;
