use serde::{Deserialize, Serialize};

/// Integer rectangle with a signed origin and unsigned extent.
///
/// Source crops may carry a negative origin before clamping; destination
/// rectangles are expressed in output coordinates. A rectangle with a zero
/// width or height is considered empty and contributes nothing to unions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Horizontal origin, in pixels.
    pub left: i32,
    /// Vertical origin, in pixels.
    pub top: i32,
    /// Width, in pixels.
    pub width: u32,
    /// Height, in pixels.
    pub height: u32,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const ZERO: Rect = Rect {
        left: 0,
        top: 0,
        width: 0,
        height: 0,
    };

    /// Builds a rectangle from origin and extent.
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Builds a rectangle of the given extent at the origin.
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Whether the rectangle covers no pixels.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn right(&self) -> i64 {
        i64::from(self.left) + i64::from(self.width)
    }

    fn bottom(&self) -> i64 {
        i64::from(self.top) + i64::from(self.height)
    }

    /// Bounding box of `self` and `other`. Empty rectangles are absorbed.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect {
            left,
            top,
            width: (right - i64::from(left)) as u32,
            height: (bottom - i64::from(top)) as u32,
        }
    }

    /// The rectangle shifted by `(dx, dy)`, saturating at the `i32` range.
    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect {
            left: self.left.saturating_add(dx),
            top: self.top.saturating_add(dy),
            ..*self
        }
    }
}
