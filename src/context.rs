//! Engine configuration.
//!
//! [`Config`] is an explicit value handed to the renderer and game
//! constructors; nothing here is global.

use crate::data_structures::geometry::Vec2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RendererKind {
    #[default]
    WebGl,
    Canvas,
}

/// Attributes requested when the WebGL context is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContextAttributes {
    pub alpha: bool,
    pub antialias: bool,
    pub depth: bool,
    pub premultiplied_alpha: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub width: u32,
    pub height: u32,
    /// Pixel ratio of the drawing buffer. `0.0` means the device pixel ratio.
    pub resolution: f32,
    pub background_color: u32,
    /// Id of the DOM element the canvas is appended to.
    pub parent: Option<String>,
    pub renderer: RendererKind,
    /// Texture units used for batching. `0` probes the GPU.
    pub max_textures: usize,
    /// Quads per batch.
    pub batch_size: usize,
    pub default_origin: Vec2,
    optimize_redraw: Option<bool>,
    pub clear_before_render: bool,
    pub auto_resize: bool,
    pub context_attributes: ContextAttributes,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            resolution: 1.0,
            background_color: 0x000000,
            parent: None,
            renderer: RendererKind::WebGl,
            max_textures: 0,
            batch_size: 4096,
            default_origin: Vec2::new(0.5, 0.5),
            optimize_redraw: None,
            clear_before_render: true,
            auto_resize: true,
            context_attributes: ContextAttributes::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_background_color(mut self, color: u32) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_max_textures(mut self, max_textures: usize) -> Self {
        self.max_textures = max_textures;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_default_origin(mut self, x: f32, y: f32) -> Self {
        self.default_origin = Vec2::new(x, y);
        self
    }

    pub fn with_optimize_redraw(mut self, optimize: bool) -> Self {
        self.optimize_redraw = Some(optimize);
        self
    }

    pub fn with_clear_before_render(mut self, clear: bool) -> Self {
        self.clear_before_render = clear;
        self
    }

    pub fn with_auto_resize(mut self, auto_resize: bool) -> Self {
        self.auto_resize = auto_resize;
        self
    }

    pub fn with_context_attributes(mut self, attributes: ContextAttributes) -> Self {
        self.context_attributes = attributes;
        self
    }

    /// Skip drawing frames where nothing changed. Defaults to on for the
    /// canvas renderer and off for WebGL.
    pub fn optimize_redraw(&self) -> bool {
        self.optimize_redraw
            .unwrap_or(self.renderer == RendererKind::Canvas)
    }

    pub fn rgb_array(color: u32) -> [f32; 4] {
        rgb_array(color)
    }

    /// Effective resolution given the device pixel ratio.
    pub fn resolution_for(&self, device_pixel_ratio: f32) -> f32 {
        if self.resolution == 0.0 {
            device_pixel_ratio
        } else {
            self.resolution
        }
    }
}

/// Splits `0xAARRGGBB` into normalized `[r, g, b, a]`.
///
/// Colors no larger than `0xFFFFFF` carry no alpha byte and are opaque.
pub fn rgb_array(color: u32) -> [f32; 4] {
    let r = (color >> 16) & 0xFF;
    let g = (color >> 8) & 0xFF;
    let b = color & 0xFF;
    let a = if color > 0xFF_FFFF { color >> 24 } else { 255 };
    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimize_redraw_defaults_by_renderer() {
        assert!(!Config::default().optimize_redraw());
        assert!(Config::default().with_renderer(RendererKind::Canvas).optimize_redraw());
        assert!(Config::default().with_optimize_redraw(true).optimize_redraw());
    }

    #[test]
    fn rgb_array_treats_small_colors_as_opaque() {
        assert_eq!(rgb_array(0xFF0000), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(rgb_array(0x00FF_0000), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(rgb_array(0x8000_00FF)[3], 128.0 / 255.0);
    }

    #[test]
    fn zero_resolution_uses_device_ratio() {
        assert_eq!(Config::default().with_resolution(0.0).resolution_for(2.0), 2.0);
        assert_eq!(Config::default().resolution_for(2.0), 1.0);
    }
}
