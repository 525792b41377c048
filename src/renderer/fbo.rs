//! Framebuffer stack.

use crate::gl::{COLOR_BUFFER_BIT, GlApi};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FboEntry<F> {
    pub framebuffer: Option<F>,
    /// Viewport size to apply when bound; `0` keeps the current viewport.
    pub width: u32,
    pub height: u32,
}

/// Nested render targets. Popping the last entry falls back to the
/// backbuffer at the renderer's size.
#[derive(Debug)]
pub struct FboSystem<G: GlApi> {
    stack: Vec<FboEntry<G::Framebuffer>>,
    current: Option<G::Framebuffer>,
    width: u32,
    height: u32,
}

impl<G: GlApi> FboSystem<G> {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            stack: Vec::new(),
            current: None,
            width,
            height,
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn current(&self) -> Option<G::Framebuffer> {
        self.current
    }

    pub fn reset(&mut self, gl: &G) {
        self.stack.clear();
        self.current = None;
        gl.bind_framebuffer(None);
        gl.viewport(0, 0, self.width as i32, self.height as i32);
    }

    pub fn add(
        &mut self,
        gl: &G,
        framebuffer: Option<G::Framebuffer>,
        clear: bool,
        width: u32,
        height: u32,
    ) {
        let entry = FboEntry {
            framebuffer,
            width,
            height,
        };
        self.stack.push(entry);
        self.set(gl, entry, clear);
    }

    fn set(&mut self, gl: &G, entry: FboEntry<G::Framebuffer>, clear: bool) {
        gl.bind_framebuffer(entry.framebuffer);
        if clear {
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(COLOR_BUFFER_BIT);
        }
        if entry.width > 0 {
            gl.viewport(0, 0, entry.width as i32, entry.height as i32);
        }
        self.current = entry.framebuffer;
    }

    pub fn pop(&mut self, gl: &G) {
        self.stack.pop();
        match self.stack.last().copied() {
            Some(entry) => self.set(gl, entry, false),
            None => self.reset(gl),
        }
    }

    /// Binds the current target again, e.g. after something else touched
    /// the framebuffer binding.
    pub fn rebind(&mut self, gl: &G) {
        gl.bind_framebuffer(self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::headless::{GlCall, HeadlessGl};

    #[test]
    fn pop_restores_previous_target_without_clearing() {
        let gl = HeadlessGl::default();
        let mut fbo = FboSystem::<HeadlessGl>::new(800, 600);
        fbo.add(&gl, Some(1), true, 0, 0);
        fbo.add(&gl, Some(2), true, 64, 64);
        gl.clear_calls();
        fbo.pop(&gl);
        assert_eq!(fbo.current(), Some(1));
        assert_eq!(gl.calls(), vec![GlCall::BindFramebuffer(Some(1))]);
    }

    #[test]
    fn popping_the_last_entry_resets_to_backbuffer() {
        let gl = HeadlessGl::default();
        let mut fbo = FboSystem::<HeadlessGl>::new(800, 600);
        fbo.add(&gl, Some(7), false, 0, 0);
        gl.clear_calls();
        fbo.pop(&gl);
        assert_eq!(fbo.depth(), 0);
        assert_eq!(
            gl.calls(),
            vec![GlCall::BindFramebuffer(None), GlCall::Viewport(0, 0, 800, 600)]
        );
    }
}
