//! GPU side of a texture.

use log::debug;

use crate::{
    data_structures::texture::{Texture, TextureSource},
    error::NginResult,
    gl::{
        CLAMP_TO_EDGE, COLOR_ATTACHMENT0, GlApi, LINEAR, NEAREST, TEXTURE_MAG_FILTER,
        TEXTURE_MIN_FILTER, TEXTURE_WRAP_S, TEXTURE_WRAP_T,
    },
};

pub fn is_pot(width: u32, height: u32) -> bool {
    width >= 1 && height >= 1 && width.is_power_of_two() && height.is_power_of_two()
}

/// Sampling and upload options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingConfig {
    pub min_filter: u32,
    pub mag_filter: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
    /// `None` generates mipmaps for power-of-two sizes.
    pub generate_mipmap: Option<bool>,
    pub flip_y: bool,
    pub premultiply_alpha: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            min_filter: LINEAR,
            mag_filter: LINEAR,
            wrap_s: CLAMP_TO_EDGE,
            wrap_t: CLAMP_TO_EDGE,
            generate_mipmap: None,
            flip_y: false,
            premultiply_alpha: true,
        }
    }
}

/// A native texture handle, its sampling state and optionally the
/// framebuffer that renders into it.
///
/// `index` is the texture unit last assigned by the texture system and
/// `index_counter` the allocation generation it was assigned in.
#[derive(Debug)]
pub struct GlTextureBinding<G: GlApi> {
    pub texture: G::Texture,
    pub framebuffer: Option<G::Framebuffer>,
    pub width: u32,
    pub height: u32,
    pub index: u32,
    pub index_counter: i64,
    pub dirty_index: bool,
    pub is_pot: bool,
    pub generate_mipmap: bool,
    pub config: BindingConfig,
    /// [`Texture::version`] of the uploaded pixels.
    pub version: u64,
}

impl<G: GlApi> GlTextureBinding<G> {
    /// Creates the native texture and uploads `pixels`, or only allocates
    /// storage when there are none.
    pub fn new(
        gl: &G,
        width: u32,
        height: u32,
        pixels: Option<&[u8]>,
        config: BindingConfig,
    ) -> NginResult<Self> {
        let is_pot = is_pot(width, height);
        let generate_mipmap = config.generate_mipmap.unwrap_or(is_pot);
        let texture = create_gl_texture(gl, width, height, pixels, &config, generate_mipmap && is_pot)?;
        Ok(Self {
            texture,
            framebuffer: None,
            width,
            height,
            index: 0,
            index_counter: -1,
            dirty_index: true,
            is_pot,
            generate_mipmap,
            config,
            version: 0,
        })
    }

    pub fn for_texture(gl: &G, texture: &Texture) -> NginResult<Self> {
        let mut binding = Self::new(
            gl,
            texture.width,
            texture.height,
            texture.image().map(|image| image.as_raw().as_slice()),
            BindingConfig::default(),
        )?;
        binding.version = texture.version();
        Ok(binding)
    }

    /// An empty texture with a framebuffer attached, for render-to-texture.
    pub fn render_target(gl: &G, width: u32, height: u32) -> NginResult<Self> {
        let mut binding = Self::new(gl, width, height, None, BindingConfig::default())?;
        match gl.create_framebuffer(binding.texture, COLOR_ATTACHMENT0) {
            Ok(framebuffer) => binding.framebuffer = Some(framebuffer),
            Err(err) => {
                gl.delete_texture(binding.texture);
                return Err(err);
            }
        }
        Ok(binding)
    }

    /// Brings the GPU copy in line with `texture`. Same-sized pixels are
    /// re-uploaded into the existing handle; a size change recreates it.
    pub fn update(&mut self, gl: &G, texture: &Texture) -> NginResult<()> {
        if texture.width == self.width && texture.height == self.height {
            if let TextureSource::Image(image) = texture.source()
                && self.width > 0
                && self.height > 0
            {
                gl.active_texture(0);
                gl.bind_texture(Some(self.texture));
                gl.set_unpack(self.config.flip_y, self.config.premultiply_alpha);
                gl.tex_image_2d(self.width, self.height, Some(image.as_raw()));
            }
        } else {
            let pixels = texture.image().map(|image| image.as_raw().as_slice());
            self.is_pot = is_pot(texture.width, texture.height);
            let mipmap = self.generate_mipmap && self.is_pot;
            let fresh =
                create_gl_texture(gl, texture.width, texture.height, pixels, &self.config, mipmap)?;
            gl.delete_texture(self.texture);
            self.texture = fresh;
            self.width = texture.width;
            self.height = texture.height;
            self.index_counter = -1;
        }
        self.version = texture.version();
        Ok(())
    }

    pub fn set_filter(&mut self, gl: &G, linear: bool) {
        let mode = if linear { LINEAR } else { NEAREST };
        self.config.min_filter = mode;
        self.config.mag_filter = mode;
        gl.active_texture(0);
        gl.bind_texture(Some(self.texture));
        gl.tex_parameter(TEXTURE_MIN_FILTER, mode as i32);
        gl.tex_parameter(TEXTURE_MAG_FILTER, mode as i32);
    }

    pub fn set_index(&mut self, index: u32) {
        self.dirty_index = index != self.index;
        self.index = index;
    }

    /// Frees the texture and framebuffer handles.
    pub fn destroy(self, gl: &G) {
        debug!("releasing texture binding {:?}", self.texture);
        gl.delete_texture(self.texture);
        if let Some(framebuffer) = self.framebuffer {
            gl.delete_framebuffer(framebuffer);
        }
    }
}

fn create_gl_texture<G: GlApi>(
    gl: &G,
    width: u32,
    height: u32,
    pixels: Option<&[u8]>,
    config: &BindingConfig,
    mipmap: bool,
) -> NginResult<G::Texture> {
    let texture = gl.create_texture()?;
    gl.active_texture(0);
    gl.bind_texture(Some(texture));
    gl.set_unpack(config.flip_y, config.premultiply_alpha);
    gl.tex_image_2d(width, height, pixels);
    gl.tex_parameter(TEXTURE_MIN_FILTER, config.min_filter as i32);
    gl.tex_parameter(TEXTURE_MAG_FILTER, config.mag_filter as i32);
    gl.tex_parameter(TEXTURE_WRAP_S, config.wrap_s as i32);
    gl.tex_parameter(TEXTURE_WRAP_T, config.wrap_t as i32);
    if mipmap {
        gl.generate_mipmap();
    }
    Ok(texture)
}
