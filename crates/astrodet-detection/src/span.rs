/// One contiguous horizontal run of pixels in a single row.
///
/// Both column bounds are inclusive. The derived ordering sorts by
/// `(y, x0, x1)`, which is the order footprint normalization relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// Row coordinate.
    pub y: i32,
    /// First column, inclusive.
    pub x0: i32,
    /// Last column, inclusive.
    pub x1: i32,
}

impl Span {
    /// Creates a new span. Callers are responsible for `x0 <= x1`.
    pub fn new(y: i32, x0: i32, x1: i32) -> Self {
        Self { y, x0, x1 }
    }

    /// Number of pixels in the span.
    pub fn width(&self) -> i64 {
        self.x1 as i64 - self.x0 as i64 + 1
    }

    /// Tests whether the pixel `(x, y)` lies on this span.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        y == self.y && x >= self.x0 && x <= self.x1
    }

    /// Translates the span by `(dx, dy)`.
    pub fn shift(&mut self, dx: i32, dy: i32) {
        self.y += dy;
        self.x0 += dx;
        self.x1 += dx;
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}: {}..{}", self.y, self.x0, self.x1)
    }
}
