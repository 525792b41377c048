//! Browser entry point: canvas creation, context selection and the
//! `requestAnimationFrame` loop.

use std::{cell::RefCell, rc::Rc};

use anyhow::{Context as _, anyhow};
use log::{error, info, warn};
use wasm_bindgen::{JsCast, prelude::Closure};
use web_sys::{
    CanvasRenderingContext2d, Document, Event, HtmlCanvasElement, WebGlContextAttributes,
    WebGlRenderingContext, Window,
};

use crate::{
    context::{Config, RendererKind},
    data_structures::scene_graph::SceneGraph,
    flow::{Game, Renderer, Scene},
    logging::{LoggingConfig, init_logging},
    render::SceneRenderData,
    renderer::{
        canvas::{CanvasRenderer, WebCanvas},
        webgl::WebGlRenderer,
    },
    resources::{Loader, texture::TextureManager},
};

/// The renderer picked at startup.
pub enum WebRenderer {
    WebGl(WebGlRenderer<glow::Context>),
    Canvas(CanvasRenderer<WebCanvas>),
}

impl Renderer for WebRenderer {
    fn prepare(&mut self, graph: &mut SceneGraph) {
        match self {
            Self::WebGl(r) => Renderer::prepare(r, graph),
            Self::Canvas(r) => Renderer::prepare(r, graph),
        }
    }

    fn render(&mut self, graph: &mut SceneGraph, textures: &mut TextureManager, data: &SceneRenderData) {
        match self {
            Self::WebGl(r) => r.render(graph, textures, data),
            Self::Canvas(r) => r.render(graph, textures, data),
        }
    }

    fn resize(&mut self, width: u32, height: u32, resolution: f32) {
        match self {
            Self::WebGl(r) => Renderer::resize(r, width, height, resolution),
            Self::Canvas(r) => Renderer::resize(r, width, height, resolution),
        }
    }

    fn size(&self) -> (u32, u32) {
        match self {
            Self::WebGl(r) => Renderer::size(r),
            Self::Canvas(r) => Renderer::size(r),
        }
    }

    fn set_background_color(&mut self, color: u32) {
        match self {
            Self::WebGl(r) => Renderer::set_background_color(r, color),
            Self::Canvas(r) => Renderer::set_background_color(r, color),
        }
    }
}

type SharedGame = Rc<RefCell<Game<WebRenderer>>>;

type Scenes = Vec<(String, Box<dyn Scene>)>;

/// Creates the canvas, boots the game and starts the frame loop.
pub fn run(config: Config, scenes: Scenes) -> anyhow::Result<()> {
    let (window, canvas, game) = prepare(config)?;
    launch(window, &canvas, game, scenes)
}

/// Like [`run`], but boots only once everything queued on `loader` has
/// finished loading into the game's textures.
pub fn run_with_loader(config: Config, mut loader: Loader, scenes: Scenes) -> anyhow::Result<()> {
    let (window, canvas, mut game) = prepare(config)?;
    wasm_bindgen_futures::spawn_local(async move {
        if let Some(keys) = loader.start(&mut game.textures).await {
            info!("loaded {} file(s), {} failed", keys.len(), loader.failed().len());
        }
        if let Err(err) = launch(window, &canvas, game, scenes) {
            error!("failed to start: {err:#}");
        }
    });
    Ok(())
}

fn prepare(config: Config) -> anyhow::Result<(Window, HtmlCanvasElement, Game<WebRenderer>)> {
    init_logging(LoggingConfig::default());

    let window = web_sys::window().ok_or_else(|| anyhow!("no window"))?;
    let document = window.document().ok_or_else(|| anyhow!("no document"))?;
    let resolution = config.resolution_for(window.device_pixel_ratio() as f32);
    let canvas = create_canvas(&document, &config, resolution)?;

    let renderer = match config.renderer {
        RendererKind::WebGl => WebRenderer::WebGl(create_webgl(&canvas, &config)?),
        RendererKind::Canvas => WebRenderer::Canvas(create_canvas_renderer(&canvas, &config)?),
    };

    let mut game = Game::new(config, renderer);
    let (width, height) = (game.config.width, game.config.height);
    game.renderer.resize(width, height, resolution);
    Ok((window, canvas, game))
}

fn launch(
    window: Window,
    canvas: &HtmlCanvasElement,
    mut game: Game<WebRenderer>,
    scenes: Scenes,
) -> anyhow::Result<()> {
    for (key, scene) in scenes {
        game.install(&key, scene);
    }
    game.boot();

    let game = Rc::new(RefCell::new(game));
    if matches!(game.borrow().renderer, WebRenderer::WebGl(_)) {
        listen_for_context_loss(canvas, &game)?;
    }
    start_loop(window, game)
}

fn create_canvas(document: &Document, config: &Config, resolution: f32) -> anyhow::Result<HtmlCanvasElement> {
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(|e| anyhow!("{e:?}"))?
        .dyn_into()
        .map_err(|_| anyhow!("created element is not a canvas"))?;
    canvas.set_width((config.width as f32 * resolution) as u32);
    canvas.set_height((config.height as f32 * resolution) as u32);
    let style = canvas.style();
    style
        .set_property("width", &format!("{}px", config.width))
        .and_then(|_| style.set_property("height", &format!("{}px", config.height)))
        .map_err(|e| anyhow!("{e:?}"))?;

    let parent = match &config.parent {
        Some(id) => document
            .get_element_by_id(id)
            .with_context(|| format!("parent element '{id}' not found"))?,
        None => document.body().context("document has no body")?.into(),
    };
    parent.append_child(&canvas).map_err(|e| anyhow!("{e:?}"))?;
    Ok(canvas)
}

fn create_webgl(canvas: &HtmlCanvasElement, config: &Config) -> anyhow::Result<WebGlRenderer<glow::Context>> {
    let wanted = config.context_attributes;
    let attributes = WebGlContextAttributes::new();
    attributes.set_alpha(wanted.alpha);
    attributes.set_antialias(wanted.antialias);
    attributes.set_depth(wanted.depth);
    attributes.set_premultiplied_alpha(wanted.premultiplied_alpha);

    let context: WebGlRenderingContext = canvas
        .get_context_with_context_options("webgl", &attributes)
        .map_err(|e| anyhow!("{e:?}"))?
        .context("WebGL is not available")?
        .dyn_into()
        .map_err(|_| anyhow!("context is not a WebGlRenderingContext"))?;
    let gl = glow::Context::from_webgl1_context(context);
    info!("created WebGL context");
    Ok(WebGlRenderer::new(gl, config)?)
}

fn create_canvas_renderer(canvas: &HtmlCanvasElement, config: &Config) -> anyhow::Result<CanvasRenderer<WebCanvas>> {
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")
        .map_err(|e| anyhow!("{e:?}"))?
        .context("2d context is not available")?
        .dyn_into()
        .map_err(|_| anyhow!("context is not a CanvasRenderingContext2d"))?;
    info!("created 2d canvas context");
    Ok(CanvasRenderer::new(WebCanvas::new(canvas.clone(), ctx), config))
}

fn listen_for_context_loss(canvas: &HtmlCanvasElement, game: &SharedGame) -> anyhow::Result<()> {
    let lost_game = game.clone();
    let on_lost = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        // Without this the browser never restores the context.
        event.prevent_default();
        if let WebRenderer::WebGl(r) = &mut lost_game.borrow_mut().renderer {
            r.on_context_lost();
        }
    });
    let restored_game = game.clone();
    let on_restored = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
        if let WebRenderer::WebGl(r) = &mut restored_game.borrow_mut().renderer
            && let Err(err) = r.on_context_restored()
        {
            error!("failed to restore the WebGL context: {err}");
        }
    });
    canvas
        .add_event_listener_with_callback("webglcontextlost", on_lost.as_ref().unchecked_ref())
        .and_then(|_| {
            canvas.add_event_listener_with_callback("webglcontextrestored", on_restored.as_ref().unchecked_ref())
        })
        .map_err(|e| anyhow!("{e:?}"))?;
    // The listeners live as long as the page.
    on_lost.forget();
    on_restored.forget();
    Ok(())
}

fn start_loop(window: Window, game: SharedGame) -> anyhow::Result<()> {
    let frame: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
    let next = frame.clone();
    let loop_window = window.clone();
    *frame.borrow_mut() = Some(Closure::new(move |_timestamp: f64| {
        game.borrow_mut().tick();
        if let Some(callback) = next.borrow().as_ref()
            && let Err(err) = loop_window.request_animation_frame(callback.as_ref().unchecked_ref())
        {
            warn!("requestAnimationFrame failed: {err:?}");
        }
    }));
    let first = frame.borrow();
    let callback = first.as_ref().context("frame callback missing")?;
    window
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|e| anyhow!("{e:?}"))?;
    Ok(())
}
