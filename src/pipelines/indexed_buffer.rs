use log::warn;

use crate::{
    data_structures::sprite::QuadVertex,
    error::NginResult,
    gl::{ARRAY_BUFFER, DYNAMIC_DRAW, ELEMENT_ARRAY_BUFFER, GlApi, STATIC_DRAW},
};

/// Largest batch whose indices still fit in `u16`.
pub const MAX_BATCH_SIZE: usize = 16384;

/// Two triangles per quad: `4k, 4k+1, 4k+2, 4k+2, 4k+3, 4k`.
pub fn quad_indices(batch_size: usize) -> Vec<u16> {
    let mut index = Vec::with_capacity(batch_size * 6);
    for quad in 0..batch_size {
        let base = (quad * 4) as u16;
        index.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    index
}

/// A CPU vertex array for `batch_size` quads mirrored by a dynamic GPU
/// buffer, plus the matching static index buffer.
#[derive(Debug)]
pub struct IndexedBuffer<G: GlApi> {
    pub batch_size: usize,
    pub vertices: Vec<QuadVertex>,
    pub index: Vec<u16>,
    pub vertex_buffer: G::Buffer,
    pub index_buffer: G::Buffer,
}

impl<G: GlApi> IndexedBuffer<G> {
    pub fn new(gl: &G, batch_size: usize) -> NginResult<Self> {
        let batch_size = if batch_size > MAX_BATCH_SIZE {
            warn!("batch size {batch_size} exceeds {MAX_BATCH_SIZE}, clamping");
            MAX_BATCH_SIZE
        } else {
            batch_size.max(1)
        };
        let vertices = vec![QuadVertex::default(); batch_size * 4];
        let index = quad_indices(batch_size);

        let vertex_buffer = gl.create_buffer()?;
        let index_buffer = match gl.create_buffer() {
            Ok(buffer) => buffer,
            Err(err) => {
                gl.delete_buffer(vertex_buffer);
                return Err(err);
            }
        };
        gl.bind_buffer(ARRAY_BUFFER, Some(vertex_buffer));
        gl.buffer_data(ARRAY_BUFFER, bytemuck::cast_slice(&vertices), DYNAMIC_DRAW);
        gl.bind_buffer(ELEMENT_ARRAY_BUFFER, Some(index_buffer));
        gl.buffer_data(ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(&index), STATIC_DRAW);
        gl.bind_buffer(ARRAY_BUFFER, None);
        gl.bind_buffer(ELEMENT_ARRAY_BUFFER, None);

        Ok(Self {
            batch_size,
            vertices,
            index,
            vertex_buffer,
            index_buffer,
        })
    }

    pub fn bind(&self, gl: &G) {
        gl.bind_buffer(ELEMENT_ARRAY_BUFFER, Some(self.index_buffer));
        gl.bind_buffer(ARRAY_BUFFER, Some(self.vertex_buffer));
    }

    /// Writes one quad at slot `quad`.
    pub fn set_quad(&mut self, quad: usize, vertices: [QuadVertex; 4]) {
        let start = quad * 4;
        self.vertices[start..start + 4].copy_from_slice(&vertices);
    }

    /// Uploads the first `count` quads. A full batch replaces the whole
    /// buffer; anything less only touches the used range.
    pub fn upload(&self, gl: &G, count: usize) {
        if count == self.batch_size {
            gl.buffer_data(ARRAY_BUFFER, bytemuck::cast_slice(&self.vertices), DYNAMIC_DRAW);
        } else {
            let used = &self.vertices[..count * 4];
            gl.buffer_sub_data(ARRAY_BUFFER, 0, bytemuck::cast_slice(used));
        }
    }

    pub fn destroy(self, gl: &G) {
        gl.delete_buffer(self.vertex_buffer);
        gl.delete_buffer(self.index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::headless::{GlCall, HeadlessGl};

    #[test]
    fn indices_follow_quad_pattern() {
        let index = quad_indices(3);
        assert_eq!(index.len(), 18);
        for k in 0..3u16 {
            let i = (k * 6) as usize;
            assert_eq!(
                &index[i..i + 6],
                &[4 * k, 4 * k + 1, 4 * k + 2, 4 * k + 2, 4 * k + 3, 4 * k]
            );
        }
    }

    #[test]
    fn oversized_batches_are_clamped() {
        let gl = HeadlessGl::default();
        let buffer = IndexedBuffer::new(&gl, MAX_BATCH_SIZE * 2).unwrap();
        assert_eq!(buffer.batch_size, MAX_BATCH_SIZE);
        assert_eq!(buffer.index.last(), Some(&((MAX_BATCH_SIZE as u16 - 1) * 4)));
    }

    #[test]
    fn partial_upload_only_sends_used_quads() {
        let gl = HeadlessGl::default();
        let buffer = IndexedBuffer::new(&gl, 8).unwrap();
        gl.clear_calls();
        buffer.upload(&gl, 3);
        buffer.upload(&gl, 8);
        assert_eq!(
            gl.calls(),
            vec![
                GlCall::BufferSubData {
                    target: ARRAY_BUFFER,
                    offset: 0,
                    len: 3 * 4 * QuadVertex::BYTES,
                },
                GlCall::BufferData {
                    target: ARRAY_BUFFER,
                    len: 8 * 4 * QuadVertex::BYTES,
                },
            ]
        );
    }
}
