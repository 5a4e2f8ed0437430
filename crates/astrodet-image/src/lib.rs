#![deny(missing_docs)]
//! Raster buffer types consumed by the astrodet detection algorithms.

/// single-channel raster representation with a parent-frame origin.
pub mod image;

/// Error types for the image module.
pub mod error;

pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize, Mask};
