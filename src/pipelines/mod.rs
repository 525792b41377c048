//! Quad shaders and the state machinery around them.
//!
//! - `source` holds the GLSL and the multi-texture chain generator
//! - `indexed_buffer` is the shared quad vertex/index buffer pair
//! - `quad` is a compiled quad shader (single, multi or custom)
//! - `shader_system` is the stack of active shaders

use slotmap::new_key_type;

pub mod indexed_buffer;
pub mod quad;
pub mod shader_system;
pub mod source;

new_key_type! {
    /// Handle to a custom shader registered with the WebGL renderer.
    pub struct ShaderId;
}
