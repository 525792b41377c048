//! [`GlApi`] on top of glow.

use glow::HasContext;

use crate::{
    error::{NginError, NginResult},
    gl::GlApi,
};

/// `UNPACK_FLIP_Y_WEBGL`
#[cfg(target_arch = "wasm32")]
const UNPACK_FLIP_Y: u32 = 0x9240;
/// `UNPACK_PREMULTIPLY_ALPHA_WEBGL`
#[cfg(target_arch = "wasm32")]
const UNPACK_PREMULTIPLY_ALPHA: u32 = 0x9241;

fn shader_stage(kind: u32) -> &'static str {
    if kind == glow::VERTEX_SHADER {
        "vertex"
    } else {
        "fragment"
    }
}

// SAFETY (all blocks below): the renderer only calls these on the thread
// that owns the context, with handles it created from the same context.
impl GlApi for glow::Context {
    type Texture = <glow::Context as HasContext>::Texture;
    type Framebuffer = <glow::Context as HasContext>::Framebuffer;
    type Buffer = <glow::Context as HasContext>::Buffer;
    type Shader = <glow::Context as HasContext>::Shader;
    type Program = <glow::Context as HasContext>::Program;
    type UniformLocation = <glow::Context as HasContext>::UniformLocation;

    fn max_texture_units(&self) -> usize {
        unsafe { self.get_parameter_i32(glow::MAX_TEXTURE_IMAGE_UNITS).max(1) as usize }
    }

    fn create_texture(&self) -> NginResult<Self::Texture> {
        unsafe { HasContext::create_texture(self).map_err(NginError::Gl) }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { HasContext::delete_texture(self, texture) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { HasContext::active_texture(self, glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, texture: Option<Self::Texture>) {
        unsafe { HasContext::bind_texture(self, glow::TEXTURE_2D, texture) }
    }

    #[cfg(target_arch = "wasm32")]
    fn set_unpack(&self, flip_y: bool, premultiply_alpha: bool) {
        unsafe {
            self.pixel_store_bool(UNPACK_FLIP_Y, flip_y);
            self.pixel_store_bool(UNPACK_PREMULTIPLY_ALPHA, premultiply_alpha);
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn set_unpack(&self, _flip_y: bool, _premultiply_alpha: bool) {}

    fn tex_image_2d(&self, width: u32, height: u32, pixels: Option<&[u8]>) {
        unsafe {
            HasContext::tex_image_2d(
                self,
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                pixels,
            )
        }
    }

    fn tex_parameter(&self, parameter: u32, value: i32) {
        unsafe { self.tex_parameter_i32(glow::TEXTURE_2D, parameter, value) }
    }

    fn generate_mipmap(&self) {
        unsafe { HasContext::generate_mipmap(self, glow::TEXTURE_2D) }
    }

    fn create_framebuffer(
        &self,
        texture: Self::Texture,
        attachment: u32,
    ) -> NginResult<Self::Framebuffer> {
        unsafe {
            let framebuffer = HasContext::create_framebuffer(self).map_err(NginError::Gl)?;
            HasContext::bind_framebuffer(self, glow::FRAMEBUFFER, Some(framebuffer));
            self.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                attachment,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            HasContext::bind_framebuffer(self, glow::FRAMEBUFFER, None);
            Ok(framebuffer)
        }
    }

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer) {
        unsafe { HasContext::delete_framebuffer(self, framebuffer) }
    }

    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>) {
        unsafe { HasContext::bind_framebuffer(self, glow::FRAMEBUFFER, framebuffer) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }

    fn enable(&self, capability: u32) {
        unsafe { HasContext::enable(self, capability) }
    }

    fn disable(&self, capability: u32) {
        unsafe { HasContext::disable(self, capability) }
    }

    fn blend_func(&self, src: u32, dst: u32) {
        unsafe { HasContext::blend_func(self, src, dst) }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { HasContext::clear_color(self, r, g, b, a) }
    }

    fn clear(&self, mask: u32) {
        unsafe { HasContext::clear(self, mask) }
    }

    fn create_buffer(&self) -> NginResult<Self::Buffer> {
        unsafe { HasContext::create_buffer(self).map_err(NginError::Gl) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>) {
        unsafe { HasContext::bind_buffer(self, target, buffer) }
    }

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
        unsafe { self.buffer_data_u8_slice(target, data, usage) }
    }

    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]) {
        unsafe { self.buffer_sub_data_u8_slice(target, offset, data) }
    }

    fn compile_shader(&self, kind: u32, source: &str) -> NginResult<Self::Shader> {
        unsafe {
            let shader = self.create_shader(kind).map_err(NginError::Gl)?;
            self.shader_source(shader, source);
            HasContext::compile_shader(self, shader);
            if self.get_shader_compile_status(shader) {
                Ok(shader)
            } else {
                let log = self.get_shader_info_log(shader);
                HasContext::delete_shader(self, shader);
                Err(NginError::ShaderCompile {
                    stage: shader_stage(kind),
                    log,
                })
            }
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn link_program(
        &self,
        vertex: Self::Shader,
        fragment: Self::Shader,
    ) -> NginResult<Self::Program> {
        unsafe {
            let program = self.create_program().map_err(NginError::Gl)?;
            self.attach_shader(program, vertex);
            self.attach_shader(program, fragment);
            HasContext::link_program(self, program);
            if self.get_program_link_status(program) {
                Ok(program)
            } else {
                let log = self.get_program_info_log(program);
                HasContext::delete_program(self, program);
                Err(NginError::ProgramLink(log))
            }
        }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.get_attrib_location(program, name) }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe { self.vertex_attrib_pointer_f32(index, size, data_type, normalized, stride, offset) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn uniform_matrix4(&self, location: Option<&Self::UniformLocation>, value: &[f32; 16]) {
        unsafe { self.uniform_matrix_4_f32_slice(location, false, value) }
    }

    fn uniform_1i(&self, location: Option<&Self::UniformLocation>, value: i32) {
        unsafe { self.uniform_1_i32(location, value) }
    }

    fn uniform_1iv(&self, location: Option<&Self::UniformLocation>, values: &[i32]) {
        unsafe { self.uniform_1_i32_slice(location, values) }
    }

    fn uniform_1f(&self, location: Option<&Self::UniformLocation>, value: f32) {
        unsafe { self.uniform_1_f32(location, value) }
    }

    fn uniform_2f(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        unsafe { self.uniform_2_f32(location, x, y) }
    }

    fn draw_elements(&self, count: i32) {
        unsafe { HasContext::draw_elements(self, glow::TRIANGLES, count, glow::UNSIGNED_SHORT, 0) }
    }
}
