//! The batching WebGL renderer.
//!
//! Sprites from the render list are collected into the multi-texture quad
//! shader and drawn in as few calls as the texture units allow. Render and
//! effect layers redirect their children into an offscreen target and
//! composite the result back as a single quad.

use cgmath::Matrix4;
use instant::Instant;
use log::{error, info, warn};
use slotmap::SecondaryMap;

use crate::{
    context::{Config, rgb_array},
    data_structures::{
        dirty::Dirty,
        matrix::{Matrix2D, ortho},
        scene_graph::{NodeId, NodeKind, SceneGraph},
        sprite::QuadVertex,
        texture::TextureId,
    },
    error::NginResult,
    flow::Renderer,
    gl::{BLEND, COLOR_BUFFER_BIT, CULL_FACE, DEPTH_TEST, GlApi, ONE, ONE_MINUS_SRC_ALPHA},
    pipelines::{
        ShaderId,
        quad::{BindParams, FrameUniforms, QuadShader},
        shader_system::{ShaderKey, ShaderSystem},
    },
    render::{RenderEntry, SceneRenderData},
    renderer::{binding::GlTextureBinding, fbo::FboSystem, texture_system::TextureSystem},
    resources::texture::TextureManager,
};

const FULL_UV: (f32, f32, f32, f32) = (0.0, 0.0, 1.0, 1.0);
const WHITE: u32 = 0xFFFF_FFFF;

/// Texture sampled by a layer composite.
#[derive(Clone, Copy, Debug)]
enum LayerSource {
    Layer(NodeId),
    Shader(ShaderId),
}

pub struct WebGlRenderer<G: GlApi> {
    gl: G,
    /// Drawing buffer size in pixels.
    pub width: u32,
    pub height: u32,
    pub resolution: f32,
    logical_width: u32,
    logical_height: u32,
    clear_color: [f32; 4],
    pub clear_before_render: bool,
    pub optimize_redraw: bool,
    context_lost: bool,
    max_textures: usize,
    batch_size: usize,
    uniforms: FrameUniforms,
    current_camera: Option<Matrix2D>,
    pub fbo: FboSystem<G>,
    pub textures: TextureSystem<G>,
    pub shaders: ShaderSystem<G>,
    bindings: SecondaryMap<TextureId, GlTextureBinding<G>>,
    layer_targets: SecondaryMap<NodeId, GlTextureBinding<G>>,
    /// Layers whose target was dropped and must be baked again.
    stale_layers: Vec<NodeId>,
    clock: Instant,
}

impl<G: GlApi> WebGlRenderer<G> {
    /// Sets up GL state, probes the texture units and compiles the built-in
    /// shaders.
    ///
    /// A `resolution` of `0.0` in `config` is treated as `1.0`; platform code
    /// resolves it against the device pixel ratio beforehand.
    pub fn new(gl: G, config: &Config) -> NginResult<Self> {
        gl.disable(DEPTH_TEST);
        gl.disable(CULL_FACE);
        let textures = TextureSystem::new(&gl, config.max_textures)?;
        let shaders = ShaderSystem::new(&gl, config.batch_size, textures.max_textures)?;
        let resolution = config.resolution_for(1.0);
        let mut renderer = Self {
            gl,
            width: 0,
            height: 0,
            resolution,
            logical_width: config.width,
            logical_height: config.height,
            clear_color: rgb_array(config.background_color),
            clear_before_render: config.clear_before_render,
            optimize_redraw: config.optimize_redraw(),
            context_lost: false,
            max_textures: config.max_textures,
            batch_size: config.batch_size,
            uniforms: FrameUniforms::default(),
            current_camera: None,
            fbo: FboSystem::new(0, 0),
            textures,
            shaders,
            bindings: SecondaryMap::new(),
            layer_targets: SecondaryMap::new(),
            stale_layers: Vec::new(),
            clock: Instant::now(),
        };
        renderer.resize(config.width, config.height, resolution);
        Ok(renderer)
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    pub fn context_lost(&self) -> bool {
        self.context_lost
    }

    /// Draw calls issued during the last frame.
    pub fn flush_total(&self) -> u32 {
        self.shaders.flush_total
    }

    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    pub fn binding(&self, texture: TextureId) -> Option<&GlTextureBinding<G>> {
        self.bindings.get(texture)
    }

    pub fn layer_texture(&self, layer: NodeId) -> Option<&GlTextureBinding<G>> {
        self.layer_targets.get(layer)
    }

    /// Compiles a custom single-texture shader for use in effect layers.
    /// The shader renders into its own target the size of the drawing buffer.
    pub fn add_shader(&mut self, name: &str, fragment: &str) -> NginResult<ShaderId> {
        let shader = QuadShader::custom(
            &self.gl,
            name,
            fragment,
            self.batch_size,
            self.width,
            self.height,
        )?;
        Ok(self.shaders.add_custom(shader))
    }

    pub fn set_background_color(&mut self, color: u32) {
        self.clear_color = rgb_array(color);
    }

    /// Resizes the drawing buffer to `width`×`height` CSS pixels at
    /// `resolution`. Offscreen targets are recreated at the new size and
    /// their layers re-baked on the next frame.
    pub fn resize(&mut self, width: u32, height: u32, resolution: f32) {
        self.logical_width = width;
        self.logical_height = height;
        self.resolution = resolution;
        self.width = (width as f32 * resolution) as u32;
        self.height = (height as f32 * resolution) as u32;

        self.gl.viewport(0, 0, self.width as i32, self.height as i32);
        self.fbo.set_size(self.width, self.height);
        let projection: Matrix4<f32> = ortho(width as f32, height as f32);
        let columns: &[f32; 16] = projection.as_ref();
        self.uniforms.projection = *columns;
        self.uniforms.width = self.width as f32;
        self.uniforms.height = self.height as f32;

        for (id, target) in self.layer_targets.drain() {
            target.destroy(&self.gl);
            self.stale_layers.push(id);
        }
        for shader in self.shaders.custom.values_mut() {
            if let Err(err) = shader.resize_target(&self.gl, self.width, self.height) {
                error!("shader '{}': cannot resize target: {err}", shader.name);
            }
        }
    }

    /// Suspends rendering until the context is restored.
    pub fn on_context_lost(&mut self) {
        warn!("WebGL context lost");
        self.context_lost = true;
    }

    /// Rebuilds every GPU object. Handles from before the loss are invalid
    /// and are dropped without being deleted.
    pub fn on_context_restored(&mut self) -> NginResult<()> {
        info!("WebGL context restored");
        self.bindings.clear();
        self.stale_layers.extend(self.layer_targets.keys());
        self.layer_targets.clear();
        self.current_camera = None;
        self.gl.disable(DEPTH_TEST);
        self.gl.disable(CULL_FACE);
        self.textures.restore(&self.gl, self.max_textures)?;
        self.shaders.restore(&self.gl)?;
        self.fbo.reset(&self.gl);
        self.resize(self.logical_width, self.logical_height, self.resolution);
        self.context_lost = false;
        Ok(())
    }

    /// Flags every layer that lost its target so the next render list walks
    /// its children again.
    pub fn prepare(&mut self, graph: &mut SceneGraph) {
        for id in self.stale_layers.drain(..) {
            graph.set_dirty(id, Dirty::CHILD_CACHE);
        }
    }

    /// Restores default GL state at the start of a frame and syncs texture
    /// bindings with `manager`.
    pub fn reset(&mut self, graph: &mut SceneGraph, manager: &mut TextureManager) {
        let gl = &self.gl;
        self.fbo.reset(gl);
        gl.enable(BLEND);
        gl.blend_func(ONE, ONE_MINUS_SRC_ALPHA);
        self.shaders.flush_total = 0;
        self.current_camera = None;
        self.textures.reset(gl);

        for id in manager.take_released() {
            if let Some(binding) = self.bindings.remove(id) {
                binding.destroy(gl);
            }
        }
        for id in manager.take_pending() {
            let Some(texture) = manager.texture(id) else {
                continue;
            };
            match GlTextureBinding::for_texture(gl, texture) {
                Ok(binding) => {
                    self.bindings.insert(id, binding);
                }
                Err(err) => error!("texture '{}': cannot create binding: {err}", texture.key),
            }
        }
        for id in graph.take_released() {
            if let Some(target) = self.layer_targets.remove(id) {
                target.destroy(gl);
            }
        }
    }

    /// Draws one frame. Nothing is drawn while the context is lost, or when
    /// redraw optimization is on and nothing changed.
    pub fn render(
        &mut self,
        graph: &mut SceneGraph,
        manager: &mut TextureManager,
        data: &SceneRenderData,
    ) {
        if self.context_lost {
            return;
        }
        self.reset(graph, manager);
        if self.optimize_redraw && data.is_clean() {
            return;
        }
        if self.clear_before_render {
            let [r, g, b, a] = self.clear_color;
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(COLOR_BUFFER_BIT);
        }
        self.uniforms.time = self.clock.elapsed().as_secs_f32() * 1000.0;

        for world in &data.world_data {
            let camera = &world.camera;
            let same_camera = self
                .current_camera
                .is_some_and(|current| current.exact_equals(&camera.world_transform));
            if !same_camera {
                self.flush();
                self.current_camera = Some(camera.world_transform);
                self.uniforms.camera = camera.matrix();
                self.rebind();
            }
            for entry in &world.render_list {
                self.render_entry(graph, manager, entry);
            }
        }
        self.flush();
    }

    fn render_entry(&mut self, graph: &mut SceneGraph, manager: &TextureManager, entry: &RenderEntry) {
        if entry.children.is_empty() {
            self.render_gl(graph, manager, entry);
        } else {
            self.render_node(graph, manager, entry);
        }
    }

    /// Enters `entry`, draws its children, then leaves it.
    pub fn render_node(
        &mut self,
        graph: &mut SceneGraph,
        manager: &TextureManager,
        entry: &RenderEntry,
    ) {
        self.render_gl(graph, manager, entry);
        for child in &entry.children {
            self.render_entry(graph, manager, child);
        }
        self.post_render_gl(graph, entry.node);
    }

    fn render_gl(&mut self, graph: &mut SceneGraph, manager: &TextureManager, entry: &RenderEntry) {
        let Some(node) = graph.get_mut(entry.node) else {
            return;
        };
        node.pre_render();
        if matches!(node.kind, NodeKind::RenderLayer | NodeKind::EffectLayer(_)) {
            self.render_layer(graph, entry.node, !entry.children.is_empty());
            return;
        }
        if let Some(sprite) = node.sprite()
            && let Some(texture) = sprite.texture
        {
            let quad = sprite.batch_vertices(0.0);
            self.batch_sprite(manager, texture, quad);
        }
    }

    fn post_render_gl(&mut self, graph: &mut SceneGraph, id: NodeId) {
        let chain = match graph.get(id).map(|node| &node.kind) {
            Some(NodeKind::RenderLayer) => Vec::new(),
            Some(NodeKind::EffectLayer(chain)) => chain.clone(),
            _ => return,
        };
        self.post_render_layer(id, &chain);
    }

    /// Appends a sprite quad, giving its texture a unit first.
    fn batch_sprite(&mut self, manager: &TextureManager, texture: TextureId, mut quad: [QuadVertex; 4]) {
        let Self {
            gl,
            shaders,
            textures,
            fbo,
            bindings,
            ..
        } = self;
        if shaders.current().is_some_and(|shader| shader.is_full()) {
            shaders.flush(gl, fbo);
        }
        let Some(binding) = sync_binding(gl, bindings, manager, texture) else {
            return;
        };
        textures.request(gl, binding, || {
            shaders.flush(gl, fbo);
        });
        let unit = binding.index as f32;
        for vertex in quad.iter_mut() {
            vertex.texture_id = unit;
        }
        if let Some(shader) = shaders.current_mut() {
            shader.batch_quad(quad);
        }
    }

    /// Redirects drawing into the layer's target. A clean cache skips the
    /// children and composites the previous bake straight away.
    fn render_layer(&mut self, graph: &mut SceneGraph, id: NodeId, has_entries: bool) {
        let Some(node) = graph.get(id) else {
            return;
        };
        if node.num_children() == 0 {
            return;
        }
        let dirty = node.dirty.is_dirty(Dirty::CHILD_CACHE);
        self.flush();
        let (width, height) = (self.width, self.height);
        let Some((target, created)) =
            layer_target(&self.gl, &mut self.layer_targets, id, width, height)
        else {
            return;
        };
        let framebuffer = target.framebuffer;
        let rebake = dirty || created;
        self.fbo.add(&self.gl, framebuffer, rebake, 0, 0);
        if rebake {
            graph.clear_dirty(id, Dirty::CHILD_CACHE);
        }
        if !has_entries {
            self.post_render_gl(graph, id);
        }
    }

    /// Leaves the layer's target and draws its texture, through `chain`
    /// first when the layer has effect shaders.
    fn post_render_layer(&mut self, id: NodeId, chain: &[ShaderId]) {
        self.flush();
        self.fbo.pop(&self.gl);
        if !self.layer_targets.contains_key(id) {
            return;
        }
        let (width, height) = (self.logical_width as f32, self.logical_height as f32);
        let mut source = LayerSource::Layer(id);
        for &shader_id in chain {
            let key = ShaderKey::Custom(shader_id);
            let Self {
                gl,
                shaders,
                textures,
                fbo,
                uniforms,
                layer_targets,
                ..
            } = self;
            let params = BindParams::new(uniforms, &textures.texture_index);
            if !shaders.set(gl, fbo, params, key, 0) {
                continue;
            }
            if let Some(shader) = shaders.get_mut(key) {
                shader.render_to_fbo = true;
            }
            if let Some(binding) = source_binding(layer_targets, shaders, source) {
                textures.bind(gl, binding, 0);
                if let Some(shader) = shaders.current_mut() {
                    shader.batch_single_quad(0.0, 0.0, width, height, FULL_UV, 0.0, WHITE);
                }
            }
            shaders.pop(gl, fbo);
            textures.unbind(gl, 0);
            source = LayerSource::Shader(shader_id);
        }
        self.draw_textured_quad(source, width, height);
    }

    /// Draws `source` with the single-texture shader, then restores the
    /// previous shader.
    fn draw_textured_quad(&mut self, source: LayerSource, width: f32, height: f32) {
        let Self {
            gl,
            shaders,
            textures,
            fbo,
            uniforms,
            layer_targets,
            ..
        } = self;
        let Some(binding) = source_binding(layer_targets, shaders, source) else {
            return;
        };
        textures.bind(gl, binding, 0);
        let params = BindParams::new(uniforms, &textures.texture_index);
        if shaders.set_default(gl, fbo, params, 0) {
            if let Some(shader) = shaders.current_mut() {
                shader.batch_single_quad(0.0, 0.0, width, height, FULL_UV, 0.0, WHITE);
            }
            shaders.pop_and_rebind(gl, fbo, params);
        }
        textures.unbind(gl, 0);
    }

    pub fn flush(&mut self) -> bool {
        self.shaders.flush(&self.gl, &mut self.fbo)
    }

    fn rebind(&mut self) -> bool {
        let params = BindParams::new(&self.uniforms, &self.textures.texture_index);
        self.shaders.rebind(&self.gl, params)
    }

    /// Frees every GPU object the renderer owns.
    pub fn destroy(self) {
        let gl = &self.gl;
        for (_, binding) in self.bindings {
            binding.destroy(gl);
        }
        for (_, target) in self.layer_targets {
            target.destroy(gl);
        }
        self.shaders.destroy(gl);
        self.textures.destroy(gl);
    }
}

impl<G: GlApi> Renderer for WebGlRenderer<G> {
    fn prepare(&mut self, graph: &mut SceneGraph) {
        WebGlRenderer::prepare(self, graph);
    }

    fn render(&mut self, graph: &mut SceneGraph, textures: &mut TextureManager, data: &SceneRenderData) {
        WebGlRenderer::render(self, graph, textures, data);
    }

    fn resize(&mut self, width: u32, height: u32, resolution: f32) {
        WebGlRenderer::resize(self, width, height, resolution);
    }

    fn size(&self) -> (u32, u32) {
        (self.logical_width, self.logical_height)
    }

    fn set_background_color(&mut self, color: u32) {
        WebGlRenderer::set_background_color(self, color);
    }
}

/// Binding for `texture`, created on first use and re-uploaded when the
/// pixels changed since the last upload.
fn sync_binding<'a, G: GlApi>(
    gl: &G,
    bindings: &'a mut SecondaryMap<TextureId, GlTextureBinding<G>>,
    manager: &TextureManager,
    id: TextureId,
) -> Option<&'a mut GlTextureBinding<G>> {
    let texture = manager.texture(id)?;
    if !bindings.contains_key(id) {
        match GlTextureBinding::for_texture(gl, texture) {
            Ok(binding) => {
                bindings.insert(id, binding);
            }
            Err(err) => {
                error!("texture '{}': cannot create binding: {err}", texture.key);
                return None;
            }
        }
    }
    let binding = bindings.get_mut(id)?;
    if binding.version != texture.version()
        && let Err(err) = binding.update(gl, texture)
    {
        error!("texture '{}': upload failed: {err}", texture.key);
    }
    Some(binding)
}

/// Target of layer `id`, and whether it was created just now.
fn layer_target<'a, G: GlApi>(
    gl: &G,
    targets: &'a mut SecondaryMap<NodeId, GlTextureBinding<G>>,
    id: NodeId,
    width: u32,
    height: u32,
) -> Option<(&'a mut GlTextureBinding<G>, bool)> {
    let mut created = false;
    if !targets.contains_key(id) {
        match GlTextureBinding::render_target(gl, width, height) {
            Ok(target) => {
                targets.insert(id, target);
                created = true;
            }
            Err(err) => {
                error!("layer target: {err}");
                return None;
            }
        }
    }
    targets.get_mut(id).map(|target| (target, created))
}

fn source_binding<'a, G: GlApi>(
    layer_targets: &'a mut SecondaryMap<NodeId, GlTextureBinding<G>>,
    shaders: &'a mut ShaderSystem<G>,
    source: LayerSource,
) -> Option<&'a mut GlTextureBinding<G>> {
    match source {
        LayerSource::Layer(id) => layer_targets.get_mut(id),
        LayerSource::Shader(id) => shaders.custom.get_mut(id)?.target.as_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::headless::{GlCall, HeadlessGl};

    fn renderer() -> WebGlRenderer<HeadlessGl> {
        let config = Config::new().with_size(64, 32).with_max_textures(4).with_batch_size(8);
        WebGlRenderer::new(HeadlessGl::new(4), &config).unwrap()
    }

    #[test]
    fn resize_scales_by_resolution() {
        let mut renderer = renderer();
        renderer.resize(100, 50, 2.0);
        assert_eq!((renderer.width, renderer.height), (200, 100));
        assert_eq!(Renderer::size(&renderer), (100, 50));
        assert_eq!(renderer.uniforms().projection[0], 2.0 / 100.0);
        assert_eq!(renderer.uniforms().projection[5], -2.0 / 50.0);
    }

    #[test]
    fn nothing_is_drawn_while_context_is_lost() {
        let mut renderer = renderer();
        let mut graph = SceneGraph::new();
        let mut manager = TextureManager::new();
        renderer.on_context_lost();
        renderer.gl().clear_calls();
        renderer.render(&mut graph, &mut manager, &SceneRenderData::new(0));
        assert!(renderer.gl().calls().is_empty());
    }

    #[test]
    fn reset_creates_pending_bindings() {
        let mut renderer = renderer();
        let mut graph = SceneGraph::new();
        let mut manager = TextureManager::new();
        renderer.reset(&mut graph, &mut manager);
        assert!(renderer.binding(manager.missing()).is_some());
        assert!(renderer.binding(manager.blank()).is_some());
    }

    #[test]
    fn empty_frame_only_clears() {
        let mut renderer = renderer();
        let mut graph = SceneGraph::new();
        let mut manager = TextureManager::new();
        renderer.gl().clear_calls();
        renderer.render(&mut graph, &mut manager, &SceneRenderData::new(0));
        assert!(renderer.gl().calls().contains(&GlCall::Clear));
        assert!(renderer.gl().draw_calls().is_empty());
        assert_eq!(renderer.flush_total(), 0);
    }
}
