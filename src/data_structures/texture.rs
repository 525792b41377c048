//! CPU-side textures and frames.
//!
//! A [`Texture`] is an RGBA image (or just a size, for render targets) plus a
//! set of named [`Frame`]s. GPU state is not stored here: the WebGL renderer
//! keeps its own binding per [`TextureId`] and re-uploads when
//! [`Texture::version`] changes.

use std::collections::HashMap;

use image::RgbaImage;
use slotmap::new_key_type;

use crate::data_structures::geometry::Vec2;

new_key_type! {
    /// Handle to a texture owned by the texture manager.
    pub struct TextureId;
}

/// Key of the frame that spans the whole image.
pub const BASE_FRAME: &str = "__BASE";

/// Trim metadata of a frame packed without its transparent margin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Trim {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Left/right/top/bottom of a frame relative to a node's origin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameExtent {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub key: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub source_width: f32,
    pub source_height: f32,
    pub trim: Option<Trim>,
    pub pivot: Option<Vec2>,
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
    texture_width: f32,
    texture_height: f32,
}

impl Frame {
    pub fn new(
        key: impl Into<String>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        texture_width: f32,
        texture_height: f32,
    ) -> Self {
        let mut frame = Self {
            key: key.into(),
            x,
            y,
            width,
            height,
            source_width: width,
            source_height: height,
            trim: None,
            pivot: None,
            u0: 0.0,
            v0: 0.0,
            u1: 0.0,
            v1: 0.0,
            texture_width,
            texture_height,
        };
        frame.update_uvs();
        frame
    }

    pub fn set_pivot(&mut self, x: f32, y: f32) {
        self.pivot = Some(Vec2::new(x, y));
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.source_width = width;
        self.source_height = height;
        self.update_uvs();
    }

    pub fn set_source_size(&mut self, width: f32, height: f32) {
        self.source_width = width;
        self.source_height = height;
    }

    /// Marks the frame as trimmed out of a `width`×`height` source, with the
    /// kept area at (`x`, `y`, `w`, `h`) inside it.
    pub fn set_trim(&mut self, width: f32, height: f32, x: f32, y: f32, w: f32, h: f32) {
        self.source_width = width;
        self.source_height = height;
        self.trim = Some(Trim {
            x,
            y,
            width: w,
            height: h,
        });
    }

    pub fn is_trimmed(&self) -> bool {
        self.trim.is_some()
    }

    pub fn get_extent(&self, origin: Vec2) -> FrameExtent {
        let (x, y, width, height) = self.extent_rect(origin);
        FrameExtent {
            left: x,
            right: x + width,
            top: y,
            bottom: y + height,
        }
    }

    /// Extent rectangle `(x, y, width, height)` a node showing this frame
    /// should use for the given origin.
    pub fn extent_rect(&self, origin: Vec2) -> (f32, f32, f32, f32) {
        match self.trim {
            Some(trim) => (
                trim.x - origin.x * self.source_width,
                trim.y - origin.y * self.source_height,
                trim.width,
                trim.height,
            ),
            None => (
                -origin.x * self.source_width,
                -origin.y * self.source_height,
                self.source_width,
                self.source_height,
            ),
        }
    }

    pub fn update_uvs(&mut self) {
        self.u0 = self.x / self.texture_width;
        self.v0 = self.y / self.texture_height;
        self.u1 = (self.x + self.width) / self.texture_width;
        self.v1 = (self.y + self.height) / self.texture_height;
    }

    fn set_texture_size(&mut self, width: f32, height: f32) {
        self.texture_width = width;
        self.texture_height = height;
        self.update_uvs();
    }
}

/// Pixels backing a texture, if any.
#[derive(Clone, Debug)]
pub enum TextureSource {
    Image(RgbaImage),
    /// Size-only texture whose content is produced on the GPU.
    Empty,
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub key: String,
    pub width: u32,
    pub height: u32,
    source: TextureSource,
    base: Frame,
    frames: HashMap<String, Frame>,
    first_frame: Option<String>,
    version: u64,
    /// Free-form data attached by loaders, e.g. atlas metadata.
    pub data: HashMap<String, String>,
}

impl Texture {
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::with_source(TextureSource::Image(image), width, height)
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self::with_source(TextureSource::Empty, width, height)
    }

    fn with_source(source: TextureSource, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            key: String::new(),
            width,
            height,
            source,
            base: Frame::new(BASE_FRAME, 0.0, 0.0, w, h, w, h),
            frames: HashMap::new(),
            first_frame: None,
            version: 0,
            data: HashMap::new(),
        }
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        match &self.source {
            TextureSource::Image(image) => Some(image),
            TextureSource::Empty => None,
        }
    }

    pub fn source(&self) -> &TextureSource {
        &self.source
    }

    /// Bumped whenever the pixels change so GPU copies can be refreshed.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replaces the pixels. The base frame follows the new size.
    pub fn set_image(&mut self, image: RgbaImage) {
        let (width, height) = image.dimensions();
        self.source = TextureSource::Image(image);
        self.version += 1;
        if (width, height) != (self.width, self.height) {
            self.set_size(width, height);
        }
    }

    /// Adds a frame. Returns `None` when `key` is already taken.
    pub fn add_frame(
        &mut self,
        key: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Option<&mut Frame> {
        if self.has_frame(key) {
            return None;
        }
        let frame = Frame::new(
            key,
            x,
            y,
            width,
            height,
            self.width as f32,
            self.height as f32,
        );
        if self.first_frame.is_none() {
            self.first_frame = Some(key.to_string());
        }
        Some(self.frames.entry(key.to_string()).or_insert(frame))
    }

    pub fn has_frame(&self, key: &str) -> bool {
        key == BASE_FRAME || self.frames.contains_key(key)
    }

    /// Number of frames including the base frame.
    pub fn frame_count(&self) -> usize {
        self.frames.len() + 1
    }

    /// The first frame added after construction, or the base frame.
    pub fn first_frame(&self) -> &Frame {
        self.first_frame
            .as_ref()
            .and_then(|key| self.frames.get(key))
            .unwrap_or(&self.base)
    }

    fn lookup(&self, key: &str) -> Option<&Frame> {
        if key == BASE_FRAME {
            Some(&self.base)
        } else {
            self.frames.get(key)
        }
    }

    /// Looks up a frame. `None` or an unknown key yields the first frame.
    pub fn get_frame(&self, key: Option<&str>) -> &Frame {
        match key {
            None => self.first_frame(),
            Some(key) => match self.lookup(key) {
                Some(frame) => frame,
                None => {
                    log::warn!("Frame missing: {} (texture '{}')", key, self.key);
                    self.first_frame()
                }
            },
        }
    }

    pub fn get_frame_mut(&mut self, key: &str) -> Option<&mut Frame> {
        if key == BASE_FRAME {
            Some(&mut self.base)
        } else {
            self.frames.get_mut(key)
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        for frame in self.frames.values_mut() {
            frame.set_texture_size(width as f32, height as f32);
        }
        self.base.set_texture_size(width as f32, height as f32);
        self.base.set_size(width as f32, height as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_frame_covers_whole_image() {
        let texture = Texture::empty(64, 32);
        let frame = texture.first_frame();
        assert_eq!(frame.key, BASE_FRAME);
        assert_eq!((frame.u0, frame.v0, frame.u1, frame.v1), (0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn first_added_frame_replaces_base_as_first() {
        let mut texture = Texture::empty(64, 64);
        texture.add_frame("a", 0.0, 0.0, 32.0, 32.0);
        texture.add_frame("b", 32.0, 0.0, 32.0, 32.0);
        assert_eq!(texture.first_frame().key, "a");
        assert!(texture.add_frame("a", 0.0, 0.0, 1.0, 1.0).is_none());
    }

    #[test]
    fn missing_frame_falls_back_to_first() {
        let mut texture = Texture::empty(64, 64);
        texture.add_frame("walk", 0.0, 32.0, 16.0, 16.0);
        assert_eq!(texture.get_frame(Some("run")).key, "walk");
        let walk = texture.get_frame(Some("walk"));
        assert_eq!((walk.u0, walk.v0, walk.u1, walk.v1), (0.0, 0.5, 0.25, 0.75));
    }

    #[test]
    fn trimmed_extent_uses_sprite_source_offsets() {
        let mut frame = Frame::new("f", 0.0, 0.0, 10.0, 10.0, 100.0, 100.0);
        frame.set_trim(20.0, 20.0, 5.0, 4.0, 10.0, 10.0);
        let extent = frame.get_extent(Vec2::new(0.5, 0.5));
        assert_eq!(extent.left, -5.0);
        assert_eq!(extent.top, -6.0);
        assert_eq!(extent.right, 5.0);
        assert_eq!(extent.bottom, 4.0);
    }
}
