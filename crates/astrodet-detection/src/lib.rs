#![deny(missing_docs)]
//! astrodet-detection is the footprint library of the astrodet project.
//!
//! A [`Footprint`] describes an irregular region of image pixels as a
//! run-length encoded list of [`Span`]s, together with the peaks detected
//! inside it. The crate provides construction from geometric shapes and mask
//! rasters, normalization, clipping, morphological grow/shrink, merging,
//! frame transforms, rasterization helpers, and a serialized form.

/// connected-component extraction from mask rasters
pub mod detect;

/// error types for the crate
pub mod error;

/// the footprint type and its per-footprint operations
pub mod footprint;

/// span table serialization
pub mod io;

/// merging footprints into their union
pub mod merge;

/// run-length morphological dilation and erosion
pub mod morphology;

/// peak records and catalogs
pub mod peak;

/// stamping footprints into rasters and derived rasters
pub mod raster;

/// the span primitive
pub mod span;

/// the pixel-to-sky projection seam used by footprint transforms
pub mod wcs;

pub use detect::footprints_from_mask;
pub use error::FootprintError;
pub use footprint::{Footprint, Quadrupole};
pub use io::FootprintRecord;
pub use merge::{merge_footprints, merge_footprints_normalized};
pub use morphology::{
    grow_footprint, grow_footprint_directional, shrink_footprint, ElementShape,
    StructuringElement,
};
pub use peak::{PeakCatalog, PeakRecord, PeakSchema};
pub use raster::{
    clear_mask_from_footprint, copy_within_footprint, footprint_array_id_image,
    footprint_id_image, footprint_to_bbox_list, nearest_footprint, set_image_from_footprint,
    set_image_from_footprint_list, set_mask_from_footprint, set_mask_from_footprint_list,
};
pub use span::Span;
pub use wcs::{SkyCoord, SkyProjection};
