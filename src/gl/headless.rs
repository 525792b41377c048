//! A GL backend that records calls instead of drawing.
//!
//! Handles are plain integers. Everything the renderer does is appended to
//! [`HeadlessGl::calls`], and the live object sets let tests check that GPU
//! resources are released exactly once.

use std::{
    cell::{Ref, RefCell},
    collections::{HashMap, HashSet},
};

use log::debug;

use crate::{
    error::{NginError, NginResult},
    gl::{FRAGMENT_SHADER, GlApi},
};

#[derive(Clone, Debug, PartialEq)]
pub enum GlCall {
    CreateTexture(u32),
    DeleteTexture(u32),
    ActiveTexture(u32),
    BindTexture(Option<u32>),
    TexImage {
        texture: Option<u32>,
        width: u32,
        height: u32,
        with_pixels: bool,
    },
    GenerateMipmap(Option<u32>),
    CreateFramebuffer { framebuffer: u32, texture: u32 },
    DeleteFramebuffer(u32),
    BindFramebuffer(Option<u32>),
    Viewport(i32, i32, i32, i32),
    Clear,
    BufferData { target: u32, len: usize },
    BufferSubData { target: u32, offset: i32, len: usize },
    UseProgram(Option<u32>),
    Uniform { name: String, value: UniformValue },
    DrawElements {
        count: i32,
        program: Option<u32>,
        framebuffer: Option<u32>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Matrix4([f32; 16]),
    Int(i32),
    Ints(Vec<i32>),
    Float(f32),
    Vec2(f32, f32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessUniform {
    pub program: u32,
    pub name: String,
}

#[derive(Default, Debug)]
pub struct HeadlessState {
    next_handle: u32,
    pub calls: Vec<GlCall>,
    pub live_textures: HashSet<u32>,
    pub live_framebuffers: HashSet<u32>,
    pub live_buffers: HashSet<u32>,
    pub live_programs: HashSet<u32>,
    pub framebuffer: Option<u32>,
    pub program: Option<u32>,
    pub active_unit: u32,
    /// Texture bound to each unit.
    pub units: HashMap<u32, Option<u32>>,
}

impl HeadlessState {
    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

#[derive(Debug)]
pub struct HeadlessGl {
    state: RefCell<HeadlessState>,
    max_units: usize,
    /// Fragment shaders with more `if` statements than this fail to compile.
    max_if_statements: Option<usize>,
    /// Fragment sources containing this text fail to compile.
    fail_marker: Option<String>,
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new(16)
    }
}

impl HeadlessGl {
    pub fn new(max_units: usize) -> Self {
        Self {
            state: RefCell::new(HeadlessState::default()),
            max_units,
            max_if_statements: None,
            fail_marker: None,
        }
    }

    pub fn with_max_if_statements(mut self, limit: usize) -> Self {
        self.max_if_statements = Some(limit);
        self
    }

    pub fn with_failing_shader(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    pub fn state(&self) -> Ref<'_, HeadlessState> {
        self.state.borrow()
    }

    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn draw_calls(&self) -> Vec<GlCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, GlCall::DrawElements { .. }))
            .cloned()
            .collect()
    }

    /// Forgets every live object, as a lost context does.
    pub fn lose_context(&self) {
        let mut state = self.state.borrow_mut();
        state.live_textures.clear();
        state.live_framebuffers.clear();
        state.live_buffers.clear();
        state.live_programs.clear();
        state.units.clear();
        state.framebuffer = None;
        state.program = None;
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn uniform(&self, location: Option<&HeadlessUniform>, value: UniformValue) {
        if let Some(location) = location {
            self.record(GlCall::Uniform {
                name: location.name.clone(),
                value,
            });
        }
    }

    fn delete_live(&self, set: fn(&mut HeadlessState) -> &mut HashSet<u32>, handle: u32) {
        let mut state = self.state.borrow_mut();
        if !set(&mut state).remove(&handle) {
            debug!("headless: deleting unknown handle {handle}");
        }
    }
}

impl GlApi for HeadlessGl {
    type Texture = u32;
    type Framebuffer = u32;
    type Buffer = u32;
    type Shader = u32;
    type Program = u32;
    type UniformLocation = HeadlessUniform;

    fn max_texture_units(&self) -> usize {
        self.max_units
    }

    fn create_texture(&self) -> NginResult<u32> {
        let mut state = self.state.borrow_mut();
        let handle = state.handle();
        state.live_textures.insert(handle);
        state.calls.push(GlCall::CreateTexture(handle));
        Ok(handle)
    }

    fn delete_texture(&self, texture: u32) {
        self.delete_live(|s| &mut s.live_textures, texture);
        self.record(GlCall::DeleteTexture(texture));
    }

    fn active_texture(&self, unit: u32) {
        self.state.borrow_mut().active_unit = unit;
        self.record(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&self, texture: Option<u32>) {
        let mut state = self.state.borrow_mut();
        let unit = state.active_unit;
        state.units.insert(unit, texture);
        state.calls.push(GlCall::BindTexture(texture));
    }

    fn set_unpack(&self, _flip_y: bool, _premultiply_alpha: bool) {}

    fn tex_image_2d(&self, width: u32, height: u32, pixels: Option<&[u8]>) {
        let mut state = self.state.borrow_mut();
        let texture = state.units.get(&state.active_unit).copied().flatten();
        state.calls.push(GlCall::TexImage {
            texture,
            width,
            height,
            with_pixels: pixels.is_some(),
        });
    }

    fn tex_parameter(&self, _parameter: u32, _value: i32) {}

    fn generate_mipmap(&self) {
        let mut state = self.state.borrow_mut();
        let texture = state.units.get(&state.active_unit).copied().flatten();
        state.calls.push(GlCall::GenerateMipmap(texture));
    }

    fn create_framebuffer(&self, texture: u32, _attachment: u32) -> NginResult<u32> {
        let mut state = self.state.borrow_mut();
        let framebuffer = state.handle();
        state.live_framebuffers.insert(framebuffer);
        state.calls.push(GlCall::CreateFramebuffer {
            framebuffer,
            texture,
        });
        Ok(framebuffer)
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        self.delete_live(|s| &mut s.live_framebuffers, framebuffer);
        self.record(GlCall::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&self, framebuffer: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.framebuffer = framebuffer;
        state.calls.push(GlCall::BindFramebuffer(framebuffer));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport(x, y, width, height));
    }

    fn enable(&self, _capability: u32) {}

    fn disable(&self, _capability: u32) {}

    fn blend_func(&self, _src: u32, _dst: u32) {}

    fn clear_color(&self, _r: f32, _g: f32, _b: f32, _a: f32) {}

    fn clear(&self, _mask: u32) {
        self.record(GlCall::Clear);
    }

    fn create_buffer(&self) -> NginResult<u32> {
        let mut state = self.state.borrow_mut();
        let handle = state.handle();
        state.live_buffers.insert(handle);
        Ok(handle)
    }

    fn delete_buffer(&self, buffer: u32) {
        self.delete_live(|s| &mut s.live_buffers, buffer);
    }

    fn bind_buffer(&self, _target: u32, _buffer: Option<u32>) {}

    fn buffer_data(&self, target: u32, data: &[u8], _usage: u32) {
        self.record(GlCall::BufferData {
            target,
            len: data.len(),
        });
    }

    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]) {
        self.record(GlCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn compile_shader(&self, kind: u32, source: &str) -> NginResult<u32> {
        if kind == FRAGMENT_SHADER {
            let ifs = source.matches("if (").count();
            if let Some(limit) = self.max_if_statements
                && ifs > limit
            {
                return Err(NginError::ShaderCompile {
                    stage: "fragment",
                    log: format!("too many if statements: {ifs} > {limit}"),
                });
            }
            if let Some(marker) = &self.fail_marker
                && source.contains(marker.as_str())
            {
                return Err(NginError::ShaderCompile {
                    stage: "fragment",
                    log: format!("syntax error near '{marker}'"),
                });
            }
        }
        Ok(self.state.borrow_mut().handle())
    }

    fn delete_shader(&self, _shader: u32) {}

    fn link_program(&self, _vertex: u32, _fragment: u32) -> NginResult<u32> {
        let mut state = self.state.borrow_mut();
        let handle = state.handle();
        state.live_programs.insert(handle);
        Ok(handle)
    }

    fn delete_program(&self, program: u32) {
        self.delete_live(|s| &mut s.live_programs, program);
    }

    fn use_program(&self, program: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.program = program;
        state.calls.push(GlCall::UseProgram(program));
    }

    fn attrib_location(&self, _program: u32, name: &str) -> Option<u32> {
        match name {
            "aVertexPosition" => Some(0),
            "aTextureCoord" => Some(1),
            "aTextureId" => Some(2),
            "aTintColor" => Some(3),
            _ => None,
        }
    }

    fn enable_vertex_attrib_array(&self, _index: u32) {}

    fn vertex_attrib_pointer(
        &self,
        _index: u32,
        _size: i32,
        _data_type: u32,
        _normalized: bool,
        _stride: i32,
        _offset: i32,
    ) {
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<HeadlessUniform> {
        Some(HeadlessUniform {
            program,
            name: name.to_string(),
        })
    }

    fn uniform_matrix4(&self, location: Option<&HeadlessUniform>, value: &[f32; 16]) {
        self.uniform(location, UniformValue::Matrix4(*value));
    }

    fn uniform_1i(&self, location: Option<&HeadlessUniform>, value: i32) {
        self.uniform(location, UniformValue::Int(value));
    }

    fn uniform_1iv(&self, location: Option<&HeadlessUniform>, values: &[i32]) {
        self.uniform(location, UniformValue::Ints(values.to_vec()));
    }

    fn uniform_1f(&self, location: Option<&HeadlessUniform>, value: f32) {
        self.uniform(location, UniformValue::Float(value));
    }

    fn uniform_2f(&self, location: Option<&HeadlessUniform>, x: f32, y: f32) {
        self.uniform(location, UniformValue::Vec2(x, y));
    }

    fn draw_elements(&self, count: i32) {
        let mut state = self.state.borrow_mut();
        let (program, framebuffer) = (state.program, state.framebuffer);
        state.calls.push(GlCall::DrawElements {
            count,
            program,
            framebuffer,
        });
    }
}
