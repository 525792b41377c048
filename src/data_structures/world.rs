//! Worlds and their cameras.
//!
//! A world is a node (see [`NodeKind::World`](crate::data_structures::scene_graph::NodeKind))
//! whose subtree is rendered through one camera. The per-frame work lives in
//! [`render`](crate::render); this module holds the data a world carries
//! between frames.

use crate::data_structures::{geometry::Rectangle, matrix::Matrix2D};

/// A camera that never moves unless told to.
///
/// `dirty_render` starts out `true` so the first frame is always drawn, and
/// is reset once the world has been rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticCamera {
    pub dirty_render: bool,
    pub world_transform: Matrix2D,
    pub bounds: Rectangle,
    pub width: f32,
    pub height: f32,
}

impl StaticCamera {
    pub fn new(width: f32, height: f32) -> Self {
        let mut camera = Self {
            dirty_render: true,
            world_transform: Matrix2D::IDENTITY,
            bounds: Rectangle::default(),
            width,
            height,
        };
        camera.reset(width, height);
        camera
    }

    pub fn reset(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.bounds.set(0.0, 0.0, width, height);
    }

    pub fn set_transform(&mut self, transform: Matrix2D) {
        if !self.world_transform.exact_equals(&transform) {
            self.world_transform = transform;
            self.dirty_render = true;
        }
    }

    /// Column-major camera matrix for the `uCameraMatrix` uniform.
    pub fn matrix(&self) -> [f32; 16] {
        let matrix = self.world_transform.to_mat4();
        let columns: &[f32; 16] = matrix.as_ref();
        *columns
    }
}

/// Counters from the last time a world was rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub game_frame: u64,
    pub dirty_frame: u32,
    pub num_rendered: u32,
    pub num_renderable: u32,
}

#[derive(Clone, Debug)]
pub struct WorldData {
    pub camera: StaticCamera,
    /// Counts one extra dirty frame on the next render, then resets.
    pub force_refresh: bool,
    pub stats: RenderStats,
}

impl WorldData {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            camera: StaticCamera::new(width, height),
            force_refresh: false,
            stats: RenderStats::default(),
        }
    }
}
