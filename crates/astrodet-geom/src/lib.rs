#![deny(missing_docs)]
//! Pixel-grid geometry primitives shared by the astrodet crates.

/// integer and floating point 2d points.
pub mod point;

/// axis-aligned integer and floating point boxes.
pub mod rect;

/// per-row rasterization of an ellipse on the pixel grid.
pub mod ellipse;

pub use crate::ellipse::PixelEllipse;
pub use crate::point::{Point2d, Point2i};
pub use crate::rect::{Box2d, Box2i};
