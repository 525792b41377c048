//! 2D affine matrices.
//!
//! A [`Matrix2D`] stores the six meaningful components of a 2D affine
//! transform laid out as
//!
//! ```text
//! | a  c  tx |
//! | b  d  ty |
//! | 0  0  1  |
//! ```
//!
//! Shaders expect a full column-major 4×4 matrix, see [`Matrix2D::to_mat4`].

use cgmath::Matrix4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix2D {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn set(&mut self, a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> &mut Self {
        *self = Self::new(a, b, c, d, tx, ty);
        self
    }

    pub fn identity(&mut self) -> &mut Self {
        *self = Self::IDENTITY;
        self
    }

    pub fn to_array(&self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.tx, self.ty]
    }

    pub fn from_array(src: [f32; 6]) -> Self {
        Self::new(src[0], src[1], src[2], src[3], src[4], src[5])
    }

    /// Component-wise equality without any tolerance.
    ///
    /// Used to decide whether the renderer has to rebind the camera, so a
    /// change in the last bit counts.
    pub fn exact_equals(&self, other: &Matrix2D) -> bool {
        self.a == other.a
            && self.b == other.b
            && self.c == other.c
            && self.d == other.d
            && self.tx == other.tx
            && self.ty == other.ty
    }

    /// Returns `self ∘ parent`: `self` applied first, then `parent`.
    pub fn then(&self, parent: &Matrix2D) -> Matrix2D {
        let Matrix2D { a, b, c, d, tx, ty } = *self;
        let Matrix2D {
            a: pa,
            b: pb,
            c: pc,
            d: pd,
            tx: ptx,
            ty: pty,
        } = *parent;
        Matrix2D::new(
            a * pa + b * pc,
            a * pb + b * pd,
            c * pa + d * pc,
            c * pb + d * pd,
            tx * pa + ty * pc + ptx,
            tx * pb + ty * pd + pty,
        )
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    pub fn apply_inverse(&self, x: f32, y: f32) -> (f32, f32) {
        let Matrix2D { a, b, c, d, tx, ty } = *self;
        let id = 1.0 / (a * d + c * -b);
        (
            d * id * x + -c * id * y + (ty * c - tx * d) * id,
            a * id * y + -b * id * x + (-ty * a + tx * b) * id,
        )
    }

    pub fn to_mat4(&self) -> Matrix4<f32> {
        Matrix4::new(
            self.a, self.b, 0.0, 0.0, //
            self.c, self.d, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            self.tx, self.ty, 0.0, 1.0,
        )
    }
}

/// Orthographic projection used by every quad shader.
///
/// Maps `(0, 0)..(width, height)` to clip space with y pointing down.
pub fn ortho(width: f32, height: f32) -> Matrix4<f32> {
    ortho_with_depth(width, height, -1.0, 1.0)
}

pub fn ortho_with_depth(width: f32, height: f32, near: f32, far: f32) -> Matrix4<f32> {
    let m00 = -2.0 * (1.0 / -width);
    let m11 = -2.0 * (1.0 / height);
    let m22 = 2.0 * (1.0 / (near - far));
    Matrix4::new(
        m00, 0.0, 0.0, 0.0, //
        0.0, m11, 0.0, 0.0, //
        0.0, 0.0, m22, 0.0, //
        -1.0, 1.0, 0.0, 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ortho_matches_expected_layout() {
        let binding = ortho(800.0, 600.0);
        let m: &[f32; 16] = binding.as_ref();
        assert_eq!(m[0], 2.0 / 800.0);
        assert_eq!(m[5], -2.0 / 600.0);
        assert_eq!(m[10], -1.0);
        assert_eq!(&m[12..], &[-1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn then_composes_child_before_parent() {
        let local = Matrix2D::new(1.0, 0.0, 0.0, 1.0, 10.0, 0.0);
        let parent = Matrix2D::new(2.0, 0.0, 0.0, 2.0, 5.0, 5.0);
        let world = local.then(&parent);
        assert_eq!(world.apply(0.0, 0.0), (25.0, 5.0));
        assert_eq!(world.a, 2.0);
    }

    #[test]
    fn inverse_round_trips() {
        let m = Matrix2D::new(0.0, 1.0, -1.0, 0.0, 3.0, 4.0);
        let (x, y) = m.apply(7.0, -2.0);
        let (ix, iy) = m.apply_inverse(x, y);
        assert!((ix - 7.0).abs() < 1e-5);
        assert!((iy + 2.0).abs() < 1e-5);
    }

    #[test]
    fn exact_equals_detects_tiny_changes() {
        let a = Matrix2D::IDENTITY;
        let mut b = a;
        assert!(a.exact_equals(&b));
        b.tx = f32::EPSILON;
        assert!(!a.exact_equals(&b));
    }
}
