use astrodet_geom::Point2d;

/// A position on the sky, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkyCoord {
    /// Right ascension.
    pub ra: f64,
    /// Declination.
    pub dec: f64,
}

/// Bidirectional mapping between pixel coordinates and the sky.
///
/// The footprint transform only ever calls these two methods; the projection
/// math itself lives with the implementor.
pub trait SkyProjection {
    /// Maps a pixel position to the sky.
    fn pixel_to_sky(&self, x: f64, y: f64) -> SkyCoord;

    /// Maps a sky position to pixel coordinates.
    fn sky_to_pixel(&self, coord: SkyCoord) -> Point2d;
}

/// Transforms `(x, y)` in the frame of one projection to another, via the sky.
pub(crate) fn transform_point<S: SkyProjection + ?Sized, T: SkyProjection + ?Sized>(
    x: f64,
    y: f64,
    source: &S,
    target: &T,
) -> Point2d {
    target.sky_to_pixel(source.pixel_to_sky(x, y))
}
