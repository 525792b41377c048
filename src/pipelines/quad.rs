//! Batched quad shaders.
//!
//! Every [`QuadShader`] owns an [`IndexedBuffer`] and collects quads into it
//! until it is flushed. The single-texture variant samples one unit chosen
//! at bind time, the multi-texture variant picks a sampler per vertex, and
//! custom variants are single-texture shaders with user fragment code that
//! may render into their own framebuffer-backed texture.

use log::error;

use crate::{
    data_structures::sprite::QuadVertex,
    error::NginResult,
    gl::{FLOAT, FRAGMENT_SHADER, GlApi, UNSIGNED_BYTE, VERTEX_SHADER},
    pipelines::{
        indexed_buffer::IndexedBuffer,
        source::{MULTI_QUAD_FRAG, QUAD_VERT, SINGLE_QUAD_FRAG, multi_texture_fragment},
    },
    renderer::{binding::GlTextureBinding, fbo::FboSystem},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderKind {
    Single,
    Multi,
    Custom,
}

/// Per-frame values every quad shader receives on bind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub projection: [f32; 16],
    pub camera: [f32; 16],
    /// Milliseconds since the renderer was created.
    pub time: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        let identity = cgmath::Matrix4::<f32>::from_scale(1.0);
        let identity: &[f32; 16] = identity.as_ref();
        Self {
            projection: *identity,
            camera: *identity,
            time: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BindParams<'a> {
    pub uniforms: &'a FrameUniforms,
    pub texture_index: &'a [i32],
}

impl<'a> BindParams<'a> {
    pub fn new(uniforms: &'a FrameUniforms, texture_index: &'a [i32]) -> Self {
        Self {
            uniforms,
            texture_index,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Attributes {
    position: Option<u32>,
    tex_coord: Option<u32>,
    texture_id: Option<u32>,
    tint: Option<u32>,
}

#[derive(Debug)]
struct Uniforms<L> {
    projection: Option<L>,
    camera: Option<L>,
    texture: Option<L>,
    time: Option<L>,
    resolution: Option<L>,
}

#[derive(Debug)]
struct Program<G: GlApi> {
    handle: G::Program,
    attributes: Attributes,
    uniforms: Uniforms<G::UniformLocation>,
}

#[derive(Debug)]
pub struct QuadShader<G: GlApi> {
    pub kind: ShaderKind,
    pub name: String,
    vertex_source: String,
    fragment_source: String,
    program: Option<Program<G>>,
    pub buffer: IndexedBuffer<G>,
    /// Quads waiting in `buffer`.
    pub count: usize,
    pub prev_count: usize,
    /// Draw into `target` instead of the current framebuffer.
    pub render_to_fbo: bool,
    pub target: Option<GlTextureBinding<G>>,
}

impl<G: GlApi> QuadShader<G> {
    pub fn single(gl: &G, batch_size: usize) -> NginResult<Self> {
        Self::new(gl, ShaderKind::Single, "single", QUAD_VERT, SINGLE_QUAD_FRAG, batch_size)
    }

    /// A sampler array of `max_textures` entries, selected per vertex.
    pub fn multi(gl: &G, batch_size: usize, max_textures: usize) -> NginResult<Self> {
        let fragment = multi_texture_fragment(MULTI_QUAD_FRAG, max_textures);
        Self::new(gl, ShaderKind::Multi, "multi", QUAD_VERT, &fragment, batch_size)
    }

    /// A user shader that renders into its own `width`×`height` texture.
    pub fn custom(
        gl: &G,
        name: &str,
        fragment_source: &str,
        batch_size: usize,
        width: u32,
        height: u32,
    ) -> NginResult<Self> {
        let mut shader = Self::new(
            gl,
            ShaderKind::Custom,
            name,
            QUAD_VERT,
            fragment_source,
            batch_size,
        )?;
        shader.target = Some(GlTextureBinding::render_target(gl, width, height)?);
        Ok(shader)
    }

    fn new(
        gl: &G,
        kind: ShaderKind,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
        batch_size: usize,
    ) -> NginResult<Self> {
        let buffer = IndexedBuffer::new(gl, batch_size)?;
        let mut shader = Self {
            kind,
            name: name.to_string(),
            vertex_source: vertex_source.to_string(),
            fragment_source: fragment_source.to_string(),
            program: None,
            buffer,
            count: 0,
            prev_count: 0,
            render_to_fbo: false,
            target: None,
        };
        shader.compile(gl);
        Ok(shader)
    }

    /// Compiles and links the stored sources. Failures are logged and leave
    /// the shader without a program, which makes [`bind`](Self::bind) fail.
    fn compile(&mut self, gl: &G) {
        self.program = match link(gl, &self.vertex_source, &self.fragment_source) {
            Ok(handle) => Some(Program {
                handle,
                attributes: Attributes {
                    position: gl.attrib_location(handle, "aVertexPosition"),
                    tex_coord: gl.attrib_location(handle, "aTextureCoord"),
                    texture_id: gl.attrib_location(handle, "aTextureId"),
                    tint: gl.attrib_location(handle, "aTintColor"),
                },
                uniforms: Uniforms {
                    projection: gl.uniform_location(handle, "uProjectionMatrix"),
                    camera: gl.uniform_location(handle, "uCameraMatrix"),
                    texture: gl.uniform_location(handle, "uTexture"),
                    time: gl.uniform_location(handle, "uTime"),
                    resolution: gl.uniform_location(handle, "uResolution"),
                },
            }),
            Err(err) => {
                error!("shader '{}' failed: {err}", self.name);
                None
            }
        };
        if let Some(program) = &self.program {
            let a = program.attributes;
            for location in [a.position, a.tex_coord, a.texture_id, a.tint].into_iter().flatten() {
                gl.enable_vertex_attrib_array(location);
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.program.is_some()
    }

    pub fn is_full(&self) -> bool {
        self.count == self.buffer.batch_size
    }

    /// Activates the program and uploads the frame uniforms. Returns `false`
    /// when the shader has no program.
    ///
    /// Single-texture shaders sample the unit stored at
    /// `texture_index[texture_id]`; the multi-texture shader gets the whole
    /// index array.
    pub fn bind(&mut self, gl: &G, params: BindParams<'_>, texture_id: usize) -> bool {
        let Some(program) = &self.program else {
            return false;
        };
        let uniforms = &program.uniforms;
        let frame = params.uniforms;
        gl.use_program(Some(program.handle));
        gl.uniform_matrix4(uniforms.projection.as_ref(), &frame.projection);
        gl.uniform_matrix4(uniforms.camera.as_ref(), &frame.camera);
        match self.kind {
            ShaderKind::Multi => gl.uniform_1iv(uniforms.texture.as_ref(), params.texture_index),
            ShaderKind::Single | ShaderKind::Custom => {
                let unit = params.texture_index.get(texture_id).copied().unwrap_or(0);
                gl.uniform_1i(uniforms.texture.as_ref(), unit);
            }
        }
        gl.uniform_1f(uniforms.time.as_ref(), frame.time);
        gl.uniform_2f(uniforms.resolution.as_ref(), frame.width, frame.height);
        self.bind_buffers(gl);
        true
    }

    fn bind_buffers(&mut self, gl: &G) {
        self.buffer.bind(gl);
        if let Some(program) = &self.program {
            let stride = QuadVertex::BYTES as i32;
            let a = program.attributes;
            let layout = [
                (a.position, 2, FLOAT, false, 0),
                (a.tex_coord, 2, FLOAT, false, 8),
                (a.texture_id, 1, FLOAT, false, 16),
                (a.tint, 4, UNSIGNED_BYTE, true, 20),
            ];
            for (location, size, data_type, normalized, offset) in layout {
                if let Some(location) = location {
                    gl.vertex_attrib_pointer(location, size, data_type, normalized, stride, offset);
                }
            }
        }
        self.count = 0;
    }

    /// Appends a prepared quad. The caller flushes first when full.
    pub fn batch_quad(&mut self, vertices: [QuadVertex; 4]) {
        if self.is_full() {
            error!("shader '{}': batch overflow, quad dropped", self.name);
            return;
        }
        self.buffer.set_quad(self.count, vertices);
        self.count += 1;
    }

    /// Appends an axis-aligned quad. V is flipped so framebuffer textures
    /// come out upright.
    #[allow(clippy::too_many_arguments)]
    pub fn batch_single_quad(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        (u0, v0, u1, v1): (f32, f32, f32, f32),
        texture_unit: f32,
        color: u32,
    ) {
        let vertex = |x: f32, y: f32, u: f32, v: f32| QuadVertex {
            position: [x, y],
            tex_coords: [u, v],
            texture_id: texture_unit,
            color,
        };
        self.batch_quad([
            vertex(x, y, u0, v1),
            vertex(x, y + height, u0, v0),
            vertex(x + width, y + height, u1, v0),
            vertex(x + width, y, u1, v1),
        ]);
    }

    /// Uploads `count` quads and draws them.
    pub fn draw(&mut self, gl: &G, fbo: &mut FboSystem<G>, count: usize) {
        self.buffer.upload(gl, count);
        let target = self
            .target
            .as_ref()
            .filter(|_| self.render_to_fbo)
            .and_then(|target| target.framebuffer);
        if let Some(framebuffer) = target {
            fbo.add(gl, Some(framebuffer), true, 0, 0);
        }
        gl.draw_elements((count * 6) as i32);
        if target.is_some() {
            fbo.pop(gl);
        }
    }

    /// Draws pending quads. Returns `false` when there were none.
    pub fn flush(&mut self, gl: &G, fbo: &mut FboSystem<G>) -> bool {
        let count = self.count;
        if count == 0 {
            return false;
        }
        self.draw(gl, fbo, count);
        self.prev_count = count;
        self.count = 0;
        true
    }

    /// Recreates program, buffers and target after a context restore.
    pub fn restore(&mut self, gl: &G) -> NginResult<()> {
        self.buffer = IndexedBuffer::new(gl, self.buffer.batch_size)?;
        self.count = 0;
        self.compile(gl);
        if let Some(target) = &self.target {
            let (width, height) = (target.width, target.height);
            self.target = Some(GlTextureBinding::render_target(gl, width, height)?);
        }
        Ok(())
    }

    /// Replaces the render target with one of the new size.
    pub fn resize_target(&mut self, gl: &G, width: u32, height: u32) -> NginResult<()> {
        if let Some(old) = self.target.take() {
            old.destroy(gl);
            self.target = Some(GlTextureBinding::render_target(gl, width, height)?);
        }
        Ok(())
    }

    pub fn destroy(self, gl: &G) {
        if let Some(program) = self.program {
            gl.delete_program(program.handle);
        }
        self.buffer.destroy(gl);
        if let Some(target) = self.target {
            target.destroy(gl);
        }
    }
}

fn link<G: GlApi>(gl: &G, vertex_source: &str, fragment_source: &str) -> NginResult<G::Program> {
    let fragment = gl.compile_shader(FRAGMENT_SHADER, fragment_source)?;
    let vertex = match gl.compile_shader(VERTEX_SHADER, vertex_source) {
        Ok(vertex) => vertex,
        Err(err) => {
            gl.delete_shader(fragment);
            return Err(err);
        }
    };
    let program = gl.link_program(vertex, fragment);
    gl.delete_shader(vertex);
    gl.delete_shader(fragment);
    program
}
