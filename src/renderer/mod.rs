//! Renderers and the GPU state they own.
//!
//! [`webgl::WebGlRenderer`] batches quads through the shaders in
//! [`pipelines`](crate::pipelines); [`canvas::CanvasRenderer`] draws with the
//! 2D context API. Both implement [`Renderer`](crate::flow::Renderer) and
//! consume the same [`SceneRenderData`](crate::render::SceneRenderData).

pub mod binding;
pub mod canvas;
pub mod fbo;
pub mod texture_system;
pub mod webgl;
