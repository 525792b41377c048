//! Texture unit allocation for the multi-texture batcher.
//!
//! Every unit holds a 1×1 placeholder until a texture is requested. Unit 0
//! is kept for the single-texture shader, so allocation starts at unit 1.
//! `start_active` is a generation counter: a binding whose `index_counter`
//! matches the current generation already owns a unit in this batch. When
//! the units run out the batch is flushed, the generation advances and the
//! requested texture takes unit 1.

use log::{debug, info};

use crate::{
    error::NginResult,
    gl::GlApi,
    pipelines::source::check_shader_max_if_statements,
    renderer::binding::GlTextureBinding,
};

const TEMP_PIXEL: [u8; 4] = [0, 0, 255, 255];

#[derive(Debug)]
pub struct TextureSystem<G: GlApi> {
    pub max_textures: usize,
    /// Sampler value for each unit; uploaded as the `uTexture` array.
    pub texture_index: Vec<i32>,
    temp_textures: Vec<G::Texture>,
    current_active: usize,
    start_active: i64,
}

impl<G: GlApi> TextureSystem<G> {
    /// Probes the usable unit count and binds a placeholder to every unit.
    ///
    /// `configured` of `0` (or above what the GPU offers) means "as many as
    /// the GPU and its shader compiler allow". Any other count is used as
    /// given, with no lower bound of 8 applied.
    pub fn new(gl: &G, configured: usize) -> NginResult<Self> {
        let mut system = Self {
            max_textures: 0,
            texture_index: Vec::new(),
            temp_textures: Vec::new(),
            current_active: 1,
            start_active: 0,
        };
        system.init(gl, configured)?;
        Ok(system)
    }

    fn init(&mut self, gl: &G, configured: usize) -> NginResult<()> {
        let gpu_max = check_shader_max_if_statements(gl, gl.max_texture_units()).max(1);
        let max = if configured == 0 || configured > gpu_max {
            gpu_max
        } else {
            configured
        };
        info!("using {max} texture units");

        self.temp_textures.clear();
        self.texture_index.clear();
        for unit in 0..max {
            let texture = gl.create_texture()?;
            gl.active_texture(unit as u32);
            gl.bind_texture(Some(texture));
            gl.tex_image_2d(1, 1, Some(&TEMP_PIXEL));
            self.temp_textures.push(texture);
            self.texture_index.push(unit as i32);
        }
        self.max_textures = max;
        self.current_active = 1;
        Ok(())
    }

    /// Rebuilds the placeholders after the context was restored. Old
    /// handles died with the context and are not deleted.
    pub fn restore(&mut self, gl: &G, configured: usize) -> NginResult<()> {
        self.init(gl, configured)
    }

    pub fn current_active(&self) -> usize {
        self.current_active
    }

    pub fn start_active(&self) -> i64 {
        self.start_active
    }

    /// Puts the placeholders back on every unit and starts a new generation.
    pub fn reset(&mut self, gl: &G) {
        for (unit, texture) in self.temp_textures.iter().enumerate() {
            gl.active_texture(unit as u32);
            gl.bind_texture(Some(*texture));
        }
        self.current_active = 1;
        self.start_active += 1;
    }

    pub fn bind(&mut self, gl: &G, binding: &mut GlTextureBinding<G>, index: u32) {
        binding.set_index(index);
        gl.active_texture(index);
        gl.bind_texture(Some(binding.texture));
    }

    pub fn unbind(&mut self, gl: &G, index: u32) {
        gl.active_texture(index);
        gl.bind_texture(self.temp_textures.get(index as usize).copied());
        if index > 0 {
            self.start_active += 1;
        }
    }

    /// Gives `binding` a unit for the current batch.
    ///
    /// Returns `false` when it already has one. `flush` is called when the
    /// units are exhausted, before unit 1 is handed out again.
    pub fn request(
        &mut self,
        gl: &G,
        binding: &mut GlTextureBinding<G>,
        flush: impl FnOnce(),
    ) -> bool {
        if binding.index_counter >= self.start_active {
            return false;
        }
        binding.index_counter = self.start_active;
        if self.current_active < self.max_textures {
            self.bind(gl, binding, self.current_active as u32);
            self.current_active += 1;
        } else {
            debug!("texture units exhausted, flushing batch");
            flush();
            self.start_active += 1;
            binding.index_counter = self.start_active;
            self.bind(gl, binding, 1);
            self.current_active = 2;
        }
        true
    }

    pub fn destroy(self, gl: &G) {
        for texture in self.temp_textures {
            gl.delete_texture(texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gl::headless::HeadlessGl, renderer::binding::BindingConfig};

    fn binding(gl: &HeadlessGl) -> GlTextureBinding<HeadlessGl> {
        GlTextureBinding::new(gl, 2, 2, None, BindingConfig::default()).unwrap()
    }

    #[test]
    fn configured_count_below_gpu_limit_is_kept() {
        let gl = HeadlessGl::new(16);
        let system = TextureSystem::new(&gl, 4).unwrap();
        assert_eq!(system.max_textures, 4);
        assert_eq!(system.texture_index, vec![0, 1, 2, 3]);
        assert_eq!(gl.state().live_textures.len(), 4);
    }

    #[test]
    fn probe_limits_unit_count() {
        let gl = HeadlessGl::new(16).with_max_if_statements(4);
        let system = TextureSystem::new(&gl, 0).unwrap();
        assert_eq!(system.max_textures, 4);
    }

    #[test]
    fn request_is_idempotent_within_a_generation() {
        let gl = HeadlessGl::new(4);
        let mut system = TextureSystem::new(&gl, 0).unwrap();
        system.reset(&gl);
        let mut a = binding(&gl);
        assert!(system.request(&gl, &mut a, || {}));
        assert!(!system.request(&gl, &mut a, || panic!("no flush expected")));
        assert_eq!(a.index, 1);
        assert_eq!(system.current_active(), 2);
    }

    #[test]
    fn exhaustion_flushes_once_and_recycles_unit_one() {
        let gl = HeadlessGl::new(4);
        let mut system = TextureSystem::new(&gl, 0).unwrap();
        system.reset(&gl);
        let mut flushes = 0;
        let mut bindings: Vec<_> = (0..4).map(|_| binding(&gl)).collect();
        for b in bindings.iter_mut() {
            system.request(&gl, b, || flushes += 1);
        }
        assert_eq!(flushes, 1);
        assert_eq!(
            bindings.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![1, 2, 3, 1]
        );
        assert_eq!(system.current_active(), 2);
        // Earlier bindings belong to the previous generation now.
        assert!(system.request(&gl, &mut bindings[0], || {}));
        assert_eq!(bindings[0].index, 2);
    }

    #[test]
    fn unbinding_a_sampler_unit_starts_new_generation() {
        let gl = HeadlessGl::new(4);
        let mut system = TextureSystem::new(&gl, 0).unwrap();
        let start = system.start_active();
        system.unbind(&gl, 0);
        assert_eq!(system.start_active(), start);
        system.unbind(&gl, 2);
        assert_eq!(system.start_active(), start + 1);
    }
}
