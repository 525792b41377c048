//! Small value types: [`Vec2`] and [`Rectangle`].

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn set(&mut self, x: f32, y: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn to_array(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    pub fn from_array(src: [f32; 2]) -> Self {
        Self::new(src[0], src[1])
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

impl std::fmt::Display for Vec2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[x={}, y={}]", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn set(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        *self = Self::new(x, y, width, height);
        self
    }

    /// Edges are inclusive. Empty rectangles contain nothing.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        if self.width <= 0.0 || self.height <= 0.0 {
            return false;
        }
        self.x <= x && self.right() >= x && self.y <= y && self.bottom() >= y
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn set_right(&mut self, value: f32) {
        self.width = if value <= self.x { 0.0 } else { value - self.x };
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn set_bottom(&mut self, value: f32) {
        self.height = if value <= self.y { 0.0 } else { value - self.y };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let rect = Rectangle::new(10.0, 10.0, 20.0, 5.0);
        assert!(rect.contains(10.0, 10.0));
        assert!(rect.contains(30.0, 15.0));
        assert!(!rect.contains(30.1, 15.0));
    }

    #[test]
    fn empty_rectangle_contains_nothing() {
        let rect = Rectangle::new(0.0, 0.0, 0.0, 10.0);
        assert!(!rect.contains(0.0, 0.0));
    }

    #[test]
    fn right_and_bottom_setters_clamp() {
        let mut rect = Rectangle::new(5.0, 5.0, 10.0, 10.0);
        rect.set_right(2.0);
        rect.set_bottom(25.0);
        assert_eq!(rect.width, 0.0);
        assert_eq!(rect.height, 20.0);
    }
}
