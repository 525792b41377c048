//! The slice of OpenGL ES 2 / WebGL 1 the renderer talks to.
//!
//! [`GlApi`] is implemented for [`glow::Context`] (see [`glow`](self::glow))
//! and for the recording [`HeadlessGl`](headless::HeadlessGl) used by tests.
//! Methods take `&self` like glow does; GL state lives on the driver side.

use std::fmt::Debug;

use crate::error::NginResult;

pub mod glow;
pub mod headless;

pub use ::glow::{
    ARRAY_BUFFER, BLEND, CLAMP_TO_EDGE, COLOR_ATTACHMENT0, COLOR_BUFFER_BIT, CULL_FACE,
    DEPTH_TEST, DYNAMIC_DRAW, ELEMENT_ARRAY_BUFFER, FLOAT, FRAGMENT_SHADER, LINEAR,
    LINEAR_MIPMAP_LINEAR, NEAREST, ONE, ONE_MINUS_SRC_ALPHA, REPEAT, STATIC_DRAW, TEXTURE_2D,
    TEXTURE_MAG_FILTER, TEXTURE_MIN_FILTER, TEXTURE_WRAP_S, TEXTURE_WRAP_T, UNSIGNED_BYTE,
    VERTEX_SHADER,
};

pub trait GlApi {
    type Texture: Copy + Debug + PartialEq;
    type Framebuffer: Copy + Debug + PartialEq;
    type Buffer: Copy + Debug + PartialEq;
    type Shader: Copy + Debug;
    type Program: Copy + Debug + PartialEq;
    type UniformLocation: Clone + Debug;

    /// `MAX_TEXTURE_IMAGE_UNITS`.
    fn max_texture_units(&self) -> usize;

    fn create_texture(&self) -> NginResult<Self::Texture>;
    fn delete_texture(&self, texture: Self::Texture);
    /// Selects texture unit `unit` (not the `TEXTURE0 + unit` enum).
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, texture: Option<Self::Texture>);
    /// Pixel unpack flags. Only meaningful on WebGL.
    fn set_unpack(&self, flip_y: bool, premultiply_alpha: bool);
    /// RGBA8 upload to the bound texture; `None` allocates storage only.
    fn tex_image_2d(&self, width: u32, height: u32, pixels: Option<&[u8]>);
    fn tex_parameter(&self, parameter: u32, value: i32);
    fn generate_mipmap(&self);

    /// Creates a framebuffer with `texture` attached at `attachment`, and
    /// leaves the default framebuffer bound.
    fn create_framebuffer(
        &self,
        texture: Self::Texture,
        attachment: u32,
    ) -> NginResult<Self::Framebuffer>;
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn enable(&self, capability: u32);
    fn disable(&self, capability: u32);
    fn blend_func(&self, src: u32, dst: u32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: u32);

    fn create_buffer(&self) -> NginResult<Self::Buffer>;
    fn delete_buffer(&self, buffer: Self::Buffer);
    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>);
    fn buffer_data(&self, target: u32, data: &[u8], usage: u32);
    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]);

    fn compile_shader(&self, kind: u32, source: &str) -> NginResult<Self::Shader>;
    fn delete_shader(&self, shader: Self::Shader);
    fn link_program(
        &self,
        vertex: Self::Shader,
        fragment: Self::Shader,
    ) -> NginResult<Self::Program>;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn enable_vertex_attrib_array(&self, index: u32);
    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn uniform_location(&self, program: Self::Program, name: &str)
    -> Option<Self::UniformLocation>;
    fn uniform_matrix4(&self, location: Option<&Self::UniformLocation>, value: &[f32; 16]);
    fn uniform_1i(&self, location: Option<&Self::UniformLocation>, value: i32);
    fn uniform_1iv(&self, location: Option<&Self::UniformLocation>, values: &[i32]);
    fn uniform_1f(&self, location: Option<&Self::UniformLocation>, value: f32);
    fn uniform_2f(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32);

    /// Indexed triangles from the bound `u16` element buffer.
    fn draw_elements(&self, count: i32);
}
