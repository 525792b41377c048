//! Sprite vertex data.
//!
//! A sprite keeps its quad ready for the batcher: four [`QuadVertex`]
//! values in the exact layout the vertex buffer expects, plus the per-vertex
//! tint and alpha they are packed from.

use crate::data_structures::{
    texture::{Frame, TextureId},
    transform::Transform,
};

/// One vertex of a batched quad: `[x, y, u, v, textureUnit, packedRGBA]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
    pub texture_id: f32,
    pub color: u32,
}

impl QuadVertex {
    /// Number of 4-byte words per vertex.
    pub const ELEMENTS: usize = 6;
    pub const BYTES: usize = std::mem::size_of::<QuadVertex>();
}

/// Packs a `0xRRGGBB` tint and a `0..=1` alpha into `0xAARRGGBB`.
pub fn pack_color(rgb: u32, alpha: f32) -> u32 {
    let ua = ((alpha * 255.0) as i32 as u32) & 0xFF;
    (ua << 24) | (rgb & 0x00FF_FFFF)
}

#[derive(Clone, Debug)]
pub struct SpriteData {
    pub texture: Option<TextureId>,
    pub frame: Option<String>,
    pub has_texture: bool,
    pub vertices: [QuadVertex; 4],
    /// Packed colors in vertex order top-left, top-right, bottom-left, bottom-right.
    pub vertex_color: [u32; 4],
    pub vertex_alpha: [f32; 4],
    pub vertex_tint: [u32; 4],
    pub tint: u32,
}

impl Default for SpriteData {
    fn default() -> Self {
        Self {
            texture: None,
            frame: None,
            has_texture: false,
            vertices: [QuadVertex::default(); 4],
            vertex_color: [u32::MAX; 4],
            vertex_alpha: [1.0; 4],
            vertex_tint: [0xFF_FFFF; 4],
            tint: 0xFF_FFFF,
        }
    }
}

impl SpriteData {
    pub fn pack_colors(&mut self) {
        for i in 0..4 {
            self.vertex_color[i] = pack_color(self.vertex_tint[i], self.vertex_alpha[i]);
        }
    }

    /// Writes the world-space corners of `transform` into the vertices.
    pub fn update_vertices(&mut self, transform: &Transform) {
        for (vertex, (x, y)) in self.vertices.iter_mut().zip(transform.vertices()) {
            vertex.position = [x, y];
        }
    }

    pub fn set_uvs(&mut self, frame: &Frame) {
        let Frame { u0, v0, u1, v1, .. } = *frame;
        self.vertices[0].tex_coords = [u0, v0];
        self.vertices[1].tex_coords = [u0, v1];
        self.vertices[2].tex_coords = [u1, v1];
        self.vertices[3].tex_coords = [u1, v0];
    }

    /// Quad ready for the vertex buffer, tagged with `unit`.
    ///
    /// Colors are assigned crosswise, matching how the packed tint of
    /// each corner is laid out in `vertex_color`.
    pub fn batch_vertices(&self, unit: f32) -> [QuadVertex; 4] {
        let mut quad = self.vertices;
        for vertex in quad.iter_mut() {
            vertex.texture_id = unit;
        }
        quad[0].color = self.vertex_color[0];
        quad[1].color = self.vertex_color[2];
        quad[2].color = self.vertex_color[3];
        quad[3].color = self.vertex_color[1];
        quad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_color_puts_alpha_in_high_byte() {
        assert_eq!(pack_color(0xFF_FFFF, 1.0), 0xFFFF_FFFF);
        assert_eq!(pack_color(0x12_3456, 0.5), 0x7F12_3456);
        assert_eq!(pack_color(0x00_00FF, 0.0), 0x0000_00FF);
    }

    #[test]
    fn quad_vertex_is_six_words() {
        assert_eq!(QuadVertex::BYTES, QuadVertex::ELEMENTS * 4);
    }

    #[test]
    fn batch_vertices_tags_every_corner() {
        let mut sprite = SpriteData::default();
        sprite.vertex_color = [1, 2, 3, 4];
        let quad = sprite.batch_vertices(3.0);
        assert!(quad.iter().all(|v| v.texture_id == 3.0));
        assert_eq!(
            quad.iter().map(|v| v.color).collect::<Vec<_>>(),
            vec![1, 3, 4, 2]
        );
    }
}
