//! The stack of active quad shaders.
//!
//! The bottom entry is always the multi-texture shader and is never popped.
//! Switching shaders flushes whatever the current one has batched so far.

use slotmap::SlotMap;

use crate::{
    error::NginResult,
    gl::GlApi,
    pipelines::{
        ShaderId,
        quad::{BindParams, QuadShader},
    },
    renderer::fbo::FboSystem,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderKey {
    Multi,
    Single,
    Custom(ShaderId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StackEntry {
    key: ShaderKey,
    texture_id: usize,
}

#[derive(Debug)]
pub struct ShaderSystem<G: GlApi> {
    pub multi: QuadShader<G>,
    pub single: QuadShader<G>,
    pub custom: SlotMap<ShaderId, QuadShader<G>>,
    stack: Vec<StackEntry>,
    /// Draw calls issued through [`flush`](Self::flush) since the last reset.
    pub flush_total: u32,
}

impl<G: GlApi> ShaderSystem<G> {
    pub fn new(gl: &G, batch_size: usize, max_textures: usize) -> NginResult<Self> {
        Ok(Self {
            multi: QuadShader::multi(gl, batch_size, max_textures)?,
            single: QuadShader::single(gl, batch_size)?,
            custom: SlotMap::with_key(),
            stack: vec![StackEntry {
                key: ShaderKey::Multi,
                texture_id: 0,
            }],
            flush_total: 0,
        })
    }

    pub fn add_custom(&mut self, shader: QuadShader<G>) -> ShaderId {
        self.custom.insert(shader)
    }

    pub fn get(&self, key: ShaderKey) -> Option<&QuadShader<G>> {
        match key {
            ShaderKey::Multi => Some(&self.multi),
            ShaderKey::Single => Some(&self.single),
            ShaderKey::Custom(id) => self.custom.get(id),
        }
    }

    pub fn get_mut(&mut self, key: ShaderKey) -> Option<&mut QuadShader<G>> {
        match key {
            ShaderKey::Multi => Some(&mut self.multi),
            ShaderKey::Single => Some(&mut self.single),
            ShaderKey::Custom(id) => self.custom.get_mut(id),
        }
    }

    pub fn current_key(&self) -> ShaderKey {
        self.stack.last().map_or(ShaderKey::Multi, |entry| entry.key)
    }

    pub fn current(&self) -> Option<&QuadShader<G>> {
        self.get(self.current_key())
    }

    pub fn current_mut(&mut self) -> Option<&mut QuadShader<G>> {
        self.get_mut(self.current_key())
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Flushes the current shader, then binds and pushes `key`. Nothing is
    /// pushed when the bind fails.
    pub fn set(
        &mut self,
        gl: &G,
        fbo: &mut FboSystem<G>,
        params: BindParams<'_>,
        key: ShaderKey,
        texture_id: usize,
    ) -> bool {
        self.flush(gl, fbo);
        let bound = self
            .get_mut(key)
            .is_some_and(|shader| shader.bind(gl, params, texture_id));
        if bound {
            self.stack.push(StackEntry { key, texture_id });
        }
        bound
    }

    /// Switches to the single-texture shader sampling `texture_id`.
    pub fn set_default(
        &mut self,
        gl: &G,
        fbo: &mut FboSystem<G>,
        params: BindParams<'_>,
        texture_id: usize,
    ) -> bool {
        self.set(gl, fbo, params, ShaderKey::Single, texture_id)
    }

    /// Flushes and drops the top entry. The base entry stays.
    pub fn pop(&mut self, gl: &G, fbo: &mut FboSystem<G>) {
        self.flush(gl, fbo);
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Binds the current entry again, e.g. after a camera change.
    pub fn rebind(&mut self, gl: &G, params: BindParams<'_>) -> bool {
        let Some(entry) = self.stack.last().copied() else {
            return false;
        };
        self.get_mut(entry.key)
            .is_some_and(|shader| shader.bind(gl, params, entry.texture_id))
    }

    pub fn pop_and_rebind(&mut self, gl: &G, fbo: &mut FboSystem<G>, params: BindParams<'_>) {
        self.pop(gl, fbo);
        self.rebind(gl, params);
    }

    pub fn flush(&mut self, gl: &G, fbo: &mut FboSystem<G>) -> bool {
        let flushed = self
            .current_mut()
            .is_some_and(|shader| shader.flush(gl, fbo));
        if flushed {
            self.flush_total += 1;
        }
        flushed
    }

    /// Drops every pushed entry without drawing, back to the base shader.
    pub fn clear_stack(&mut self) {
        self.stack.truncate(1);
    }

    pub fn restore(&mut self, gl: &G) -> NginResult<()> {
        self.multi.restore(gl)?;
        self.single.restore(gl)?;
        for shader in self.custom.values_mut() {
            shader.restore(gl)?;
        }
        self.clear_stack();
        Ok(())
    }

    pub fn destroy(self, gl: &G) {
        self.multi.destroy(gl);
        self.single.destroy(gl);
        for (_, shader) in self.custom {
            shader.destroy(gl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gl::headless::HeadlessGl,
        pipelines::{quad::FrameUniforms, source::SINGLE_QUAD_FRAG},
    };

    fn system(gl: &HeadlessGl) -> ShaderSystem<HeadlessGl> {
        ShaderSystem::new(gl, 8, 4).unwrap()
    }

    #[test]
    fn base_entry_is_never_popped() {
        let gl = HeadlessGl::default();
        let mut fbo = FboSystem::new(10, 10);
        let mut shaders = system(&gl);
        shaders.pop(&gl, &mut fbo);
        shaders.pop(&gl, &mut fbo);
        assert_eq!(shaders.depth(), 1);
        assert_eq!(shaders.current_key(), ShaderKey::Multi);
    }

    #[test]
    fn set_flushes_previous_shader() {
        let gl = HeadlessGl::default();
        let mut fbo = FboSystem::new(10, 10);
        let mut shaders = system(&gl);
        let uniforms = FrameUniforms::default();
        let index = [0, 1, 2, 3];
        shaders.rebind(&gl, BindParams::new(&uniforms, &index));
        if let Some(multi) = shaders.current_mut() {
            multi.batch_single_quad(0.0, 0.0, 1.0, 1.0, (0.0, 0.0, 1.0, 1.0), 1.0, u32::MAX);
        }
        assert!(shaders.set_default(&gl, &mut fbo, BindParams::new(&uniforms, &index), 0));
        assert_eq!(shaders.flush_total, 1);
        assert_eq!(gl.draw_calls().len(), 1);
        assert_eq!(shaders.current_key(), ShaderKey::Single);
        shaders.pop_and_rebind(&gl, &mut fbo, BindParams::new(&uniforms, &index));
        assert_eq!(shaders.current_key(), ShaderKey::Multi);
        assert_eq!(shaders.flush_total, 1);
    }

    #[test]
    fn failing_custom_shader_is_not_pushed() {
        let gl = HeadlessGl::default().with_failing_shader("uBroken");
        let mut fbo = FboSystem::new(10, 10);
        let mut shaders = system(&gl);
        let ok = QuadShader::custom(&gl, "ok", SINGLE_QUAD_FRAG, 8, 10, 10).unwrap();
        let bad = QuadShader::custom(&gl, "bad", "uniform float uBroken;", 8, 10, 10).unwrap();
        let ok = shaders.add_custom(ok);
        let bad = shaders.add_custom(bad);
        let uniforms = FrameUniforms::default();
        let index = [0, 1, 2, 3];
        let params = BindParams::new(&uniforms, &index);
        assert!(!shaders.set(&gl, &mut fbo, params, ShaderKey::Custom(bad), 0));
        assert_eq!(shaders.depth(), 1);
        assert!(shaders.set(&gl, &mut fbo, params, ShaderKey::Custom(ok), 0));
        assert_eq!(shaders.current_key(), ShaderKey::Custom(ok));
    }
}
