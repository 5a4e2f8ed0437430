use crate::point::{Point2d, Point2i};

/// An axis-aligned box on the integer pixel grid with inclusive corners.
///
/// The empty box is a valid state: it contains no points and acts as the
/// identity for [`Box2i::include`]. Default-constructed boxes are empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Box2i {
    min: Point2i,
    max: Point2i,
}

impl Default for Box2i {
    fn default() -> Self {
        Self::empty()
    }
}

impl Box2i {
    /// Creates an empty box.
    pub fn empty() -> Self {
        Self {
            min: Point2i::new(0, 0),
            max: Point2i::new(-1, -1),
        }
    }

    /// Creates a box from two inclusive corner points.
    ///
    /// The corners may be given in any order.
    pub fn from_corners(a: Point2i, b: Point2i) -> Self {
        Self {
            min: Point2i::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point2i::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Creates a box from its minimum corner and a width/height in pixels.
    pub fn from_min_size(min: Point2i, width: i32, height: i32) -> Self {
        if width <= 0 || height <= 0 {
            return Self::empty();
        }
        Self {
            min,
            max: Point2i::new(min.x + width - 1, min.y + height - 1),
        }
    }

    /// Returns true if the box contains no pixels.
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y
    }

    /// Minimum column (undefined for empty boxes).
    pub fn min_x(&self) -> i32 {
        self.min.x
    }

    /// Minimum row.
    pub fn min_y(&self) -> i32 {
        self.min.y
    }

    /// Maximum column, inclusive.
    pub fn max_x(&self) -> i32 {
        self.max.x
    }

    /// Maximum row, inclusive.
    pub fn max_y(&self) -> i32 {
        self.max.y
    }

    /// Width in pixels; zero for empty boxes.
    pub fn width(&self) -> i32 {
        if self.is_empty() {
            0
        } else {
            self.max.x - self.min.x + 1
        }
    }

    /// Height in pixels; zero for empty boxes.
    pub fn height(&self) -> i32 {
        if self.is_empty() {
            0
        } else {
            self.max.y - self.min.y + 1
        }
    }

    /// Number of pixels covered.
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Tests whether a pixel lies inside the box.
    pub fn contains(&self, p: Point2i) -> bool {
        !self.is_empty()
            && p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
    }

    /// Grows the box to cover `p`.
    pub fn include(&mut self, p: Point2i) {
        if self.is_empty() {
            self.min = p;
            self.max = p;
        } else {
            self.min.x = self.min.x.min(p.x);
            self.min.y = self.min.y.min(p.y);
            self.max.x = self.max.x.max(p.x);
            self.max.y = self.max.y.max(p.y);
        }
    }

    /// Grows the box to cover `other`. Including an empty box is a no-op.
    pub fn include_box(&mut self, other: &Box2i) {
        if other.is_empty() {
            return;
        }
        self.include(other.min);
        self.include(other.max);
    }

    /// Shrinks the box to its intersection with `other`.
    pub fn clip(&mut self, other: &Box2i) {
        if self.is_empty() {
            return;
        }
        if other.is_empty() {
            *self = Self::empty();
            return;
        }
        self.min.x = self.min.x.max(other.min.x);
        self.min.y = self.min.y.max(other.min.y);
        self.max.x = self.max.x.min(other.max.x);
        self.max.y = self.max.y.min(other.max.y);
        if self.is_empty() {
            *self = Self::empty();
        }
    }

    /// Translates the box by `(dx, dy)`.
    pub fn shift(&mut self, dx: i32, dy: i32) {
        if self.is_empty() {
            return;
        }
        self.min.x += dx;
        self.min.y += dy;
        self.max.x += dx;
        self.max.y += dy;
    }
}

/// An axis-aligned box in continuous pixel coordinates.
///
/// Only used to accumulate transformed corner points before snapping back to
/// the integer grid.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Box2d {
    min: Option<Point2d>,
    max: Option<Point2d>,
}

impl Box2d {
    /// Creates an empty box.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Grows the box to cover `p`.
    pub fn include(&mut self, p: Point2d) {
        match (&mut self.min, &mut self.max) {
            (Some(min), Some(max)) => {
                min.x = min.x.min(p.x);
                min.y = min.y.min(p.y);
                max.x = max.x.max(p.x);
                max.y = max.y.max(p.y);
            }
            _ => {
                self.min = Some(p);
                self.max = Some(p);
            }
        }
    }

    /// Snaps to the smallest integer box covering this box.
    pub fn to_box2i(&self) -> Box2i {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Box2i::from_corners(
                Point2i::new(min.x.floor() as i32, min.y.floor() as i32),
                Point2i::new(max.x.ceil() as i32, max.y.ceil() as i32),
            ),
            _ => Box2i::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_contains_nothing() {
        let b = Box2i::empty();
        assert!(b.is_empty());
        assert_eq!(b.width(), 0);
        assert_eq!(b.area(), 0);
        assert!(!b.contains(Point2i::new(0, 0)));
    }

    #[test]
    fn include_starts_from_empty() {
        let mut b = Box2i::empty();
        b.include(Point2i::new(3, 4));
        b.include(Point2i::new(-1, 7));
        assert_eq!(b.min_x(), -1);
        assert_eq!(b.max_x(), 3);
        assert_eq!(b.min_y(), 4);
        assert_eq!(b.max_y(), 7);
        assert_eq!(b.area(), 5 * 4);
    }

    #[test]
    fn clip_to_disjoint_box_is_empty() {
        let mut b = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(4, 4));
        b.clip(&Box2i::from_corners(Point2i::new(10, 10), Point2i::new(12, 12)));
        assert!(b.is_empty());
    }

    #[test]
    fn box2d_snaps_outward() {
        let mut b = Box2d::empty();
        b.include(Point2d::new(0.2, -0.7));
        b.include(Point2d::new(3.6, 2.1));
        let bi = b.to_box2i();
        assert_eq!((bi.min_x(), bi.min_y()), (0, -1));
        assert_eq!((bi.max_x(), bi.max_y()), (4, 3));
    }
}
