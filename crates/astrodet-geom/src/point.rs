/// A point on the integer pixel grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point2i {
    /// Column coordinate.
    pub x: i32,
    /// Row coordinate.
    pub y: i32,
}

impl Point2i {
    /// Creates a new integer point.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point2i {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// A point in continuous pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point2d {
    /// Column coordinate.
    pub x: f64,
    /// Row coordinate.
    pub y: f64,
}

impl Point2d {
    /// Creates a new floating point point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rounds to the nearest pixel, half-up in both coordinates.
    pub fn round(&self) -> Point2i {
        Point2i::new(
            (0.5 + self.x).floor() as i32,
            (0.5 + self.y).floor() as i32,
        )
    }
}
