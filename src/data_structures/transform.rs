//! Per-node transform data.
//!
//! The component only knows how to derive its own local matrix. Anything
//! that touches parents or children (world propagation, dirty flags) lives in
//! [`SceneGraph`](crate::data_structures::scene_graph::SceneGraph), which owns
//! the tree.

use crate::data_structures::{
    geometry::{Rectangle, Vec2},
    matrix::Matrix2D,
};

#[derive(Clone, Debug)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub skew: Vec2,
    /// Pivot as a fraction of the extent.
    pub origin: Vec2,
    /// Local-space rectangle covered by the node, already offset by the origin.
    pub extent: Rectangle,
    pub local: Matrix2D,
    pub world: Matrix2D,
    /// Copy the parent's world matrix instead of composing with it.
    pub passthru: bool,
}

impl Transform {
    pub fn new(x: f32, y: f32, origin: Vec2) -> Self {
        let mut transform = Self {
            position: Vec2::new(x, y),
            rotation: 0.0,
            scale: Vec2::new(1.0, 1.0),
            skew: Vec2::default(),
            origin,
            extent: Rectangle::default(),
            local: Matrix2D::IDENTITY,
            world: Matrix2D::IDENTITY,
            passthru: false,
        };
        transform.update_local();
        transform.world = transform.local;
        transform
    }

    pub fn update_local(&mut self) {
        let Vec2 { x, y } = self.position;
        let rotation = self.rotation;
        let Vec2 {
            x: scale_x,
            y: scale_y,
        } = self.scale;
        let Vec2 {
            x: skew_x,
            y: skew_y,
        } = self.skew;
        self.local.set(
            (rotation + skew_y).cos() * scale_x,
            (rotation + skew_y).sin() * scale_x,
            -(rotation - skew_x).sin() * scale_y,
            (rotation - skew_x).cos() * scale_y,
            x,
            y,
        );
    }

    /// Recomputes `world` from the parent's world matrix, if any.
    pub fn update_world(&mut self, parent_world: Option<&Matrix2D>) {
        self.world = match parent_world {
            None => self.local,
            Some(parent) if self.passthru => *parent,
            Some(parent) => self.local.then(parent),
        };
    }

    /// Resizes the extent, keeping it anchored at the origin.
    pub fn update_extent(&mut self, width: Option<f32>, height: Option<f32>) {
        if let Some(width) = width {
            self.extent.width = width;
        }
        if let Some(height) = height {
            self.extent.height = height;
        }
        self.extent.x = -self.origin.x * self.extent.width;
        self.extent.y = -self.origin.y * self.extent.height;
    }

    pub fn set_extent(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.extent.set(x, y, width, height);
    }

    pub fn local_to_global(&self, x: f32, y: f32) -> Vec2 {
        self.world.apply(x, y).into()
    }

    pub fn global_to_local(&self, x: f32, y: f32) -> Vec2 {
        self.world.apply_inverse(x, y).into()
    }

    /// World-space corners of the extent: top-left, bottom-left,
    /// bottom-right, top-right.
    pub fn vertices(&self) -> [(f32, f32); 4] {
        let Rectangle { x, y, .. } = self.extent;
        let right = self.extent.right();
        let bottom = self.extent.bottom();
        let w = &self.world;
        [
            w.apply(x, y),
            w.apply(x, bottom),
            w.apply(right, bottom),
            w.apply(right, y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_builds_expected_local() {
        let mut t = Transform::new(4.0, 5.0, Vec2::new(0.5, 0.5));
        t.rotation = std::f32::consts::FRAC_PI_2;
        t.update_local();
        assert!(t.local.a.abs() < 1e-6);
        assert!((t.local.b - 1.0).abs() < 1e-6);
        assert!((t.local.c + 1.0).abs() < 1e-6);
        assert_eq!((t.local.tx, t.local.ty), (4.0, 5.0));
    }

    #[test]
    fn extent_follows_origin() {
        let mut t = Transform::new(0.0, 0.0, Vec2::new(0.5, 0.25));
        t.update_extent(Some(64.0), Some(32.0));
        assert_eq!(t.extent, Rectangle::new(-32.0, -8.0, 64.0, 32.0));
    }

    #[test]
    fn passthru_copies_parent() {
        let mut t = Transform::new(10.0, 10.0, Vec2::default());
        t.passthru = true;
        let parent = Matrix2D::new(2.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        t.update_world(Some(&parent));
        assert_eq!(t.world, parent);
    }
}
