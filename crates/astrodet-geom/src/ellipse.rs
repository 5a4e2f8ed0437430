use crate::point::Point2d;

/// An ellipse described by its center, semi-axes and position angle, together
/// with the per-row pixel intervals it covers.
///
/// Rows are visited in increasing order and each row yields at most one
/// `(y, x0, x1)` interval, so consumers can append the intervals directly in
/// sorted order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelEllipse {
    center: Point2d,
    // coefficients of the quadratic form a*u^2 + 2*b*u*v + c*v^2 <= 1
    a: f64,
    b: f64,
    c: f64,
    vmax: f64,
}

impl PixelEllipse {
    /// Creates an ellipse from center, semi-axes `(a, b)` and the position
    /// angle `theta` of the `a` axis, in radians.
    pub fn new(center: Point2d, semi_major: f64, semi_minor: f64, theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        let (ia2, ib2) = (1.0 / (semi_major * semi_major), 1.0 / (semi_minor * semi_minor));
        let a = cos * cos * ia2 + sin * sin * ib2;
        let b = sin * cos * (ia2 - ib2);
        let c = sin * sin * ia2 + cos * cos * ib2;
        // largest |v| with real solutions for u
        let vmax = (a / (a * c - b * b)).sqrt();
        Self { center, a, b, c, vmax }
    }

    /// Iterates over the `(y, x0, x1)` pixel intervals covered by the
    /// ellipse, in increasing row order. Rows whose interval rounds to no
    /// whole pixel are skipped.
    pub fn rows(&self) -> impl Iterator<Item = (i32, i32, i32)> + '_ {
        let y_lo = (self.center.y - self.vmax).ceil() as i32;
        let y_hi = (self.center.y + self.vmax).floor() as i32;
        (y_lo..=y_hi).filter_map(move |y| {
            let v = y as f64 - self.center.y;
            let disc = self.b * self.b * v * v - self.a * (self.c * v * v - 1.0);
            if disc < 0.0 {
                return None;
            }
            let mid = -self.b * v / self.a;
            let half = disc.sqrt() / self.a;
            let x0 = (self.center.x + mid - half).ceil() as i32;
            let x1 = (self.center.x + mid + half).floor() as i32;
            if x0 > x1 {
                return None;
            }
            Some((y, x0, x1))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_rows_are_symmetric() {
        let e = PixelEllipse::new(Point2d::new(0.0, 0.0), 4.0, 4.0, 0.0);
        let rows: Vec<_> = e.rows().collect();
        assert_eq!(rows.first().map(|r| r.0), Some(-4));
        assert_eq!(rows.last().map(|r| r.0), Some(4));
        for (y, x0, x1) in rows {
            let (ny, nx0, nx1) = e
                .rows()
                .find(|r| r.0 == -y)
                .expect("mirror row missing");
            assert_eq!((ny, nx0, nx1), (-y, x0, x1));
        }
    }

    #[test]
    fn rotated_ellipse_covers_center() {
        let e = PixelEllipse::new(Point2d::new(10.0, 10.0), 5.0, 2.0, 0.7);
        let row = e.rows().find(|r| r.0 == 10).expect("center row missing");
        assert!(row.1 <= 10 && row.2 >= 10);
    }
}
