use astrodet_geom::{Box2i, Point2i};

use crate::error::ImageError;

/// Image size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels.
    pub width: usize,
    /// Height of the image in pixels.
    pub height: usize,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

/// A single-channel 2D raster of a numeric pixel type.
///
/// Pixel storage is row-major. The raster carries an integer origin `(x0, y0)`
/// placing it in a parent coordinate frame: the pixel stored at local index
/// `(0, 0)` sits at parent position `(x0, y0)`. All astrodet algorithms work
/// in the parent frame and subtract the origin when indexing.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T> {
    size: ImageSize,
    origin: Point2i,
    data: Vec<T>,
}

/// A bit-plane mask raster, one `u16` of bit flags per pixel.
pub type Mask = Image<u16>;

impl<T> Image<T> {
    /// Creates a new image from pixel data with origin `(0, 0)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data length does not match the image size.
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, ImageError> {
        if data.len() != size.width * size.height {
            return Err(ImageError::InvalidDataLength(
                data.len(),
                size.width * size.height,
            ));
        }
        Ok(Self {
            size,
            origin: Point2i::new(0, 0),
            data,
        })
    }

    /// Creates a new image filled with `val`, with origin `(0, 0)`.
    pub fn from_size_val(size: ImageSize, val: T) -> Self
    where
        T: Clone,
    {
        let data = vec![val; size.width * size.height];
        Self {
            size,
            origin: Point2i::new(0, 0),
            data,
        }
    }

    /// Creates a new image covering `bbox` in the parent frame, filled with
    /// `val`. An empty box yields a zero-sized image.
    pub fn from_box_val(bbox: &Box2i, val: T) -> Self
    where
        T: Clone,
    {
        let size = ImageSize {
            width: bbox.width() as usize,
            height: bbox.height() as usize,
        };
        let origin = if bbox.is_empty() {
            Point2i::new(0, 0)
        } else {
            Point2i::new(bbox.min_x(), bbox.min_y())
        };
        let data = vec![val; size.width * size.height];
        Self { size, origin, data }
    }

    /// Moves the image origin to `(x0, y0)` in the parent frame.
    pub fn with_origin(mut self, x0: i32, y0: i32) -> Self {
        self.origin = Point2i::new(x0, y0);
        self
    }

    /// The image size in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Width of the image in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height of the image in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Parent-frame column of the leftmost pixel.
    pub fn x0(&self) -> i32 {
        self.origin.x
    }

    /// Parent-frame row of the topmost pixel.
    pub fn y0(&self) -> i32 {
        self.origin.y
    }

    /// The parent-frame box covered by this image.
    pub fn bbox(&self) -> Box2i {
        Box2i::from_min_size(self.origin, self.size.width as i32, self.size.height as i32)
    }

    /// Borrows the pixel at local coordinates `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> &T {
        debug_assert!(x < self.size.width && y < self.size.height);
        &self.data[y * self.size.width + x]
    }

    /// Mutably borrows the pixel at local coordinates `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the image.
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut T {
        debug_assert!(x < self.size.width && y < self.size.height);
        &mut self.data[y * self.size.width + x]
    }

    /// Borrows row `y` as a slice.
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.size.width;
        &self.data[start..start + self.size.width]
    }

    /// Mutably borrows row `y` as a slice.
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        let start = y * self.size.width;
        &mut self.data[start..start + self.size.width]
    }

    /// Borrows the whole pixel buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutably borrows the whole pixel buffer.
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Fills every pixel with `val`.
    pub fn fill(&mut self, val: T)
    where
        T: Clone,
    {
        self.data.fill(val);
    }

    /// Cast the pixel data of the image to a different numeric type.
    ///
    /// # Errors
    ///
    /// Returns an error if any pixel value does not fit the target type.
    pub fn cast<U>(&self) -> Result<Image<U>, ImageError>
    where
        T: num_traits::NumCast + Copy,
        U: num_traits::NumCast,
    {
        let casted = self
            .data
            .iter()
            .map(|&x| U::from(x).ok_or(ImageError::CastError))
            .collect::<Result<Vec<U>, _>>()?;
        Ok(Image {
            size: self.size,
            origin: self.origin,
            data: casted,
        })
    }
}
