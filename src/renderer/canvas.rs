//! Immediate-mode 2D canvas renderer.
//!
//! Consumes the same render list as the WebGL renderer but draws every
//! sprite on its own with `drawImage`. No batching, no layers: branch
//! entries are simply walked.

use log::debug;

use crate::{
    data_structures::{
        matrix::Matrix2D,
        scene_graph::{NodeKind, SceneGraph},
        texture::{Texture, TextureId},
    },
    context::Config,
    flow::Renderer,
    render::{RenderEntry, SceneRenderData},
    resources::texture::TextureManager,
};

/// The subset of `CanvasRenderingContext2D` the renderer uses.
pub trait Canvas2d {
    /// Sets the drawing buffer size in pixels.
    fn resize(&mut self, width: u32, height: u32);
    /// Forgets anything cached for a removed texture.
    fn release(&mut self, _id: TextureId) {}
    fn set_transform(&mut self, matrix: &Matrix2D);
    fn set_global_alpha(&mut self, alpha: f32);
    fn set_global_composite_operation(&mut self, operation: &str);
    fn set_fill_style(&mut self, style: &str);
    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn save(&mut self);
    fn restore(&mut self);
    /// Copies `source` (x, y, w, h in texture pixels) of `texture` to
    /// `dest` in the current transform.
    fn draw_image(
        &mut self,
        id: TextureId,
        texture: &Texture,
        source: (f32, f32, f32, f32),
        dest: (f32, f32, f32, f32),
    );
}

/// CSS color for `0xAARRGGBB`. Colors without an alpha byte are opaque.
pub fn css_color(color: u32) -> String {
    let r = (color >> 16) & 0xFF;
    let g = (color >> 8) & 0xFF;
    let b = color & 0xFF;
    let a = if color > 0xFF_FFFF { color >> 24 } else { 255 };
    format!("rgba({r}, {g}, {b}, {})", a as f32 / 255.0)
}

pub struct CanvasRenderer<C: Canvas2d> {
    canvas: C,
    pub width: u32,
    pub height: u32,
    pub resolution: f32,
    logical_width: u32,
    logical_height: u32,
    clear_color: String,
    pub clear_before_render: bool,
    pub optimize_redraw: bool,
}

impl<C: Canvas2d> CanvasRenderer<C> {
    pub fn new(canvas: C, config: &Config) -> Self {
        let mut renderer = Self {
            canvas,
            width: 0,
            height: 0,
            resolution: 1.0,
            logical_width: config.width,
            logical_height: config.height,
            clear_color: css_color(config.background_color),
            clear_before_render: config.clear_before_render,
            optimize_redraw: config.optimize_redraw(),
        };
        renderer.resize(config.width, config.height, config.resolution_for(1.0));
        renderer
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn clear_color(&self) -> &str {
        &self.clear_color
    }

    pub fn set_background_color(&mut self, color: u32) {
        self.clear_color = css_color(color);
    }

    pub fn resize(&mut self, width: u32, height: u32, resolution: f32) {
        self.logical_width = width;
        self.logical_height = height;
        self.resolution = resolution;
        self.width = (width as f32 * resolution) as u32;
        self.height = (height as f32 * resolution) as u32;
        self.canvas.resize(self.width, self.height);
    }

    pub fn reset(&mut self) {
        self.canvas.set_global_alpha(1.0);
        self.canvas.set_global_composite_operation("source-over");
        self.canvas.set_transform(&Matrix2D::IDENTITY);
    }

    /// Drops texture and node queues the 2D context has no use for, and
    /// releases cached sources of removed textures.
    pub fn sync(&mut self, graph: &mut SceneGraph, manager: &mut TextureManager) {
        manager.take_pending();
        for id in manager.take_released() {
            self.canvas.release(id);
        }
        graph.take_released();
    }

    /// Draws one frame, or nothing when redraw optimization is on and the
    /// frame is clean. Drawn nodes consume their dirty transforms.
    pub fn render(&mut self, graph: &mut SceneGraph, manager: &mut TextureManager, data: &SceneRenderData) {
        self.sync(graph, manager);
        if self.optimize_redraw && data.is_clean() {
            return;
        }
        self.reset();
        if self.clear_before_render {
            let (width, height) = (self.width as f32, self.height as f32);
            self.canvas.clear_rect(0.0, 0.0, width, height);
            self.canvas.set_fill_style(&self.clear_color);
            self.canvas.fill_rect(0.0, 0.0, width, height);
        }
        for world in &data.world_data {
            let camera = world.camera.world_transform;
            self.canvas.set_transform(&camera);
            for entry in &world.render_list {
                self.draw_entry(graph, manager, &camera, entry);
            }
        }
    }

    fn draw_entry(
        &mut self,
        graph: &mut SceneGraph,
        manager: &TextureManager,
        camera: &Matrix2D,
        entry: &RenderEntry,
    ) {
        if let Some(node) = graph.get_mut(entry.node) {
            node.pre_render();
        }
        if let Some(node) = graph.get(entry.node)
            && let NodeKind::Sprite(sprite) = &node.kind
            && let Some(id) = sprite.texture
        {
            match manager.texture(id) {
                Some(texture) => {
                    let frame = texture.get_frame(sprite.frame.as_deref());
                    let extent = &node.transform.extent;
                    self.canvas.save();
                    self.canvas.set_transform(&node.transform.world.then(camera));
                    self.canvas.set_global_alpha(node.alpha);
                    self.canvas.draw_image(
                        id,
                        texture,
                        (frame.x, frame.y, frame.width, frame.height),
                        (extent.x, extent.y, frame.width, frame.height),
                    );
                    self.canvas.restore();
                }
                None => debug!("canvas: sprite texture was removed"),
            }
        }
        for child in &entry.children {
            self.draw_entry(graph, manager, camera, child);
        }
    }
}

impl<C: Canvas2d> Renderer for CanvasRenderer<C> {
    fn render(&mut self, graph: &mut SceneGraph, textures: &mut TextureManager, data: &SceneRenderData) {
        CanvasRenderer::render(self, graph, textures, data);
    }

    fn resize(&mut self, width: u32, height: u32, resolution: f32) {
        CanvasRenderer::resize(self, width, height, resolution);
    }

    fn size(&self) -> (u32, u32) {
        (self.logical_width, self.logical_height)
    }

    fn set_background_color(&mut self, color: u32) {
        CanvasRenderer::set_background_color(self, color);
    }
}

/// One recorded [`Canvas2d`] call.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasCall {
    Resize(u32, u32),
    SetTransform([f32; 6]),
    GlobalAlpha(f32),
    CompositeOperation(String),
    FillStyle(String),
    ClearRect(f32, f32, f32, f32),
    FillRect(f32, f32, f32, f32),
    Save,
    Restore,
    DrawImage {
        texture: String,
        source: (f32, f32, f32, f32),
        dest: (f32, f32, f32, f32),
    },
}

/// A [`Canvas2d`] that records calls instead of drawing.
#[derive(Debug, Default)]
pub struct HeadlessCanvas {
    pub calls: Vec<CanvasCall>,
    pub released: Vec<TextureId>,
}

impl HeadlessCanvas {
    pub fn draw_images(&self) -> Vec<&CanvasCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, CanvasCall::DrawImage { .. }))
            .collect()
    }
}

impl Canvas2d for HeadlessCanvas {
    fn resize(&mut self, width: u32, height: u32) {
        self.calls.push(CanvasCall::Resize(width, height));
    }

    fn release(&mut self, id: TextureId) {
        self.released.push(id);
    }

    fn set_transform(&mut self, matrix: &Matrix2D) {
        self.calls.push(CanvasCall::SetTransform(matrix.to_array()));
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.calls.push(CanvasCall::GlobalAlpha(alpha));
    }

    fn set_global_composite_operation(&mut self, operation: &str) {
        self.calls.push(CanvasCall::CompositeOperation(operation.to_string()));
    }

    fn set_fill_style(&mut self, style: &str) {
        self.calls.push(CanvasCall::FillStyle(style.to_string()));
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.calls.push(CanvasCall::ClearRect(x, y, width, height));
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.calls.push(CanvasCall::FillRect(x, y, width, height));
    }

    fn save(&mut self) {
        self.calls.push(CanvasCall::Save);
    }

    fn restore(&mut self) {
        self.calls.push(CanvasCall::Restore);
    }

    fn draw_image(
        &mut self,
        _id: TextureId,
        texture: &Texture,
        source: (f32, f32, f32, f32),
        dest: (f32, f32, f32, f32),
    ) {
        self.calls.push(CanvasCall::DrawImage {
            texture: texture.key.clone(),
            source,
            dest,
        });
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::WebCanvas;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::collections::HashMap;

    use log::warn;
    use wasm_bindgen::{Clamped, JsCast};
    use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData};

    use super::Canvas2d;
    use crate::data_structures::{
        matrix::Matrix2D,
        texture::{Texture, TextureId},
    };

    /// [`Canvas2d`] over a DOM canvas. Texture pixels are copied once into an
    /// offscreen canvas per texture and re-copied when they change.
    pub struct WebCanvas {
        canvas: HtmlCanvasElement,
        ctx: CanvasRenderingContext2d,
        sources: HashMap<TextureId, (u64, HtmlCanvasElement)>,
    }

    impl WebCanvas {
        pub fn new(canvas: HtmlCanvasElement, ctx: CanvasRenderingContext2d) -> Self {
            Self {
                canvas,
                ctx,
                sources: HashMap::new(),
            }
        }

        pub fn element(&self) -> &HtmlCanvasElement {
            &self.canvas
        }

        fn source(&mut self, id: TextureId, texture: &Texture) -> Option<HtmlCanvasElement> {
            if let Some((version, canvas)) = self.sources.get(&id)
                && *version == texture.version()
            {
                return Some(canvas.clone());
            }
            let image = texture.image()?;
            let document = web_sys::window()?.document()?;
            let canvas: HtmlCanvasElement = document.create_element("canvas").ok()?.dyn_into().ok()?;
            canvas.set_width(texture.width);
            canvas.set_height(texture.height);
            let ctx: CanvasRenderingContext2d = canvas.get_context("2d").ok()??.dyn_into().ok()?;
            let data = ImageData::new_with_u8_clamped_array_and_sh(
                Clamped(image.as_raw().as_slice()),
                texture.width,
                texture.height,
            )
            .ok()?;
            if ctx.put_image_data(&data, 0.0, 0.0).is_err() {
                warn!("canvas: cannot upload texture '{}'", texture.key);
                return None;
            }
            self.sources.insert(id, (texture.version(), canvas.clone()));
            Some(canvas)
        }
    }

    impl Canvas2d for WebCanvas {
        fn resize(&mut self, width: u32, height: u32) {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
        }

        fn release(&mut self, id: TextureId) {
            self.sources.remove(&id);
        }

        fn set_transform(&mut self, m: &Matrix2D) {
            let _ = self.ctx.set_transform(
                m.a as f64,
                m.b as f64,
                m.c as f64,
                m.d as f64,
                m.tx as f64,
                m.ty as f64,
            );
        }

        fn set_global_alpha(&mut self, alpha: f32) {
            self.ctx.set_global_alpha(alpha as f64);
        }

        fn set_global_composite_operation(&mut self, operation: &str) {
            let _ = self.ctx.set_global_composite_operation(operation);
        }

        fn set_fill_style(&mut self, style: &str) {
            self.ctx.set_fill_style_str(style);
        }

        fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
            self.ctx.clear_rect(x as f64, y as f64, width as f64, height as f64);
        }

        fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
            self.ctx.fill_rect(x as f64, y as f64, width as f64, height as f64);
        }

        fn save(&mut self) {
            self.ctx.save();
        }

        fn restore(&mut self) {
            self.ctx.restore();
        }

        fn draw_image(
            &mut self,
            id: TextureId,
            texture: &Texture,
            (sx, sy, sw, sh): (f32, f32, f32, f32),
            (dx, dy, dw, dh): (f32, f32, f32, f32),
        ) {
            let Some(source) = self.source(id, texture) else {
                return;
            };
            let _ = self
                .ctx
                .draw_image_with_html_canvas_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                    &source, sx as f64, sy as f64, sw as f64, sh as f64, dx as f64, dy as f64,
                    dw as f64, dh as f64,
                );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_color_handles_alpha_byte() {
        assert_eq!(css_color(0x102030), "rgba(16, 32, 48, 1)");
        assert_eq!(css_color(0x00FF_0000), "rgba(255, 0, 0, 1)");
        assert_eq!(css_color(0x8000_00FF), format!("rgba(0, 0, 255, {})", 128.0f32 / 255.0));
    }

    #[test]
    fn clean_frames_are_skipped_by_default() {
        let config = Config::new().with_renderer(crate::context::RendererKind::Canvas);
        let mut renderer = CanvasRenderer::new(HeadlessCanvas::default(), &config);
        renderer.canvas_mut().calls.clear();
        let mut graph = SceneGraph::new();
        let mut manager = TextureManager::new();
        renderer.render(&mut graph, &mut manager, &SceneRenderData::new(3));
        assert!(renderer.canvas().calls.is_empty());
    }
}
