#![deny(missing_docs)]
//! The astrodet umbrella crate: re-exports the workspace crates under one
//! name.

#[doc(inline)]
pub use astrodet_geom as geom;

#[doc(inline)]
pub use astrodet_image as image;

#[doc(inline)]
pub use astrodet_detection as detection;
