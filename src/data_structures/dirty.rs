//! Dirty flags.
//!
//! Every node carries a [`Dirty`] mask plus the frame at which its primary
//! flag last went from clear to set. Renderers compare that frame with the
//! current one to decide whether anything changed.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Dirty: u64 {
        const TRANSFORM = 1;
        const UPDATE = 1 << 1;
        /// The cached subtree of a layer must be re-baked into its texture.
        const CHILD_CACHE = 1 << 2;
        const POST_RENDER = 1 << 3;
        const COLORS = 1 << 4;
        const BOUNDS = 1 << 5;
        const TEXTURE = 1 << 6;
        const FRAME = 1 << 7;
        const ALPHA = 1 << 8;
        const CHILD = 1 << 9;

        const USER1 = 1 << 29;
        const USER2 = 1 << 30;
        const USER3 = 1 << 31;
        const USER4 = 1 << 32;

        const DEFAULT = Self::TRANSFORM.bits()
            | Self::UPDATE.bits()
            | Self::COLORS.bits()
            | Self::BOUNDS.bits();
    }
}

/// A dirty mask together with the frame it last became dirty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirtyState {
    bits: Dirty,
    frame: u64,
}

impl DirtyState {
    pub fn new(bits: Dirty) -> Self {
        Self { bits, frame: 0 }
    }

    pub fn bits(&self) -> Dirty {
        self.bits
    }

    /// Frame index at which a primary flag last transitioned 0→1.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_dirty(&self, flag: Dirty) -> bool {
        self.bits.intersects(flag)
    }

    /// Sets `flag` and stamps `frame`, but only on its 0→1 edge.
    pub fn set(&mut self, flag: Dirty, frame: u64) {
        if !self.is_dirty(flag) {
            self.bits.toggle(flag);
            self.frame = frame;
        }
    }

    /// Sets `flag` without touching the frame stamp.
    pub fn mark(&mut self, flag: Dirty) {
        if !self.is_dirty(flag) {
            self.bits.toggle(flag);
        }
    }

    /// Overwrites the frame stamp without touching the bits.
    pub fn stamp(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn clear(&mut self, flag: Dirty) {
        if self.is_dirty(flag) {
            self.bits.toggle(flag);
        }
    }
}
