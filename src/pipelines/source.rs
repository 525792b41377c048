//! GLSL sources and the code that specializes them.

use log::debug;

use crate::gl::{FRAGMENT_SHADER, GlApi};

pub const QUAD_VERT: &str = include_str!("shaders/quad.vert");
pub const SINGLE_QUAD_FRAG: &str = include_str!("shaders/single_quad.frag");
pub const MULTI_QUAD_FRAG: &str = include_str!("shaders/multi_quad.frag");
const MAX_IF_PROBE_FRAG: &str = include_str!("shaders/max_if_probe.frag");

/// The sampler selection chain for `max_textures` units.
///
/// Unit 0 is left to the single-texture shader, so the chain starts at 1
/// and the last unit is the unconditional `else`.
pub fn texture_select_chain(max_textures: usize) -> String {
    let mut src = String::new();
    for i in 1..max_textures {
        if i > 1 {
            src.push_str("\n\telse ");
        }
        if i < max_textures - 1 {
            src.push_str(&format!("if (vTextureId < {i}.5)"));
        }
        src.push_str("\n\t{");
        src.push_str(&format!("\n\t\tcolor = texture2D(uTexture[{i}], vTextureCoord);"));
        src.push_str("\n\t}");
    }
    src
}

/// Fills the `%count%` and `%forloop%` placeholders of the multi-texture
/// fragment template.
pub fn multi_texture_fragment(template: &str, max_textures: usize) -> String {
    template
        .replace("%count%", &max_textures.to_string())
        .replace("%forloop%", &texture_select_chain(max_textures))
}

fn max_if_probe_chain(max_ifs: usize) -> String {
    let mut src = String::new();
    for i in 0..max_ifs {
        if i > 0 {
            src.push_str("\nelse ");
        }
        if i + 1 < max_ifs {
            src.push_str(&format!("if (test == {i}.0){{}}"));
        }
    }
    src
}

pub fn max_if_probe_fragment(max_ifs: usize) -> String {
    MAX_IF_PROBE_FRAG.replace("%forloop%", &max_if_probe_chain(max_ifs))
}

/// Halves `max_ifs` until a fragment shader with that many chained `if`
/// statements compiles.
pub fn check_shader_max_if_statements<G: GlApi>(gl: &G, mut max_ifs: usize) -> usize {
    while max_ifs > 0 {
        match gl.compile_shader(FRAGMENT_SHADER, &max_if_probe_fragment(max_ifs)) {
            Ok(shader) => {
                gl.delete_shader(shader);
                break;
            }
            Err(err) => {
                debug!("{max_ifs} if statements rejected, halving ({err})");
                max_ifs /= 2;
            }
        }
    }
    max_ifs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ends_with_plain_else() {
        let src = texture_select_chain(4);
        assert_eq!(src.matches("if (").count(), 2);
        assert!(src.contains("if (vTextureId < 1.5)"));
        assert!(src.contains("if (vTextureId < 2.5)"));
        assert!(src.contains("uTexture[3]"));
        assert!(!src.contains("uTexture[0]"));
    }

    #[test]
    fn template_placeholders_are_replaced() {
        let src = multi_texture_fragment(MULTI_QUAD_FRAG, 8);
        assert!(src.contains("uniform sampler2D uTexture[8];"));
        assert!(!src.contains('%'));
    }

    #[test]
    fn probe_has_one_if_fewer_than_requested() {
        assert_eq!(max_if_probe_fragment(16).matches("if (").count(), 15);
        assert_eq!(max_if_probe_fragment(1).matches("if (").count(), 0);
    }
}
