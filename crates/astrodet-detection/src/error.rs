/// Errors that can occur when constructing or combining footprints.
#[derive(Debug, thiserror::Error)]
pub enum FootprintError {
    /// Error related to the underlying raster buffers.
    #[error(transparent)]
    ImageError(#[from] astrodet_image::ImageError),

    /// A span handed to `add_span_in_series` does not follow the last span in
    /// `(y, x0)` order.
    #[error("span {y},[{x0},{x1}] is NOT in series after last span {last_y},[{last_x0},{last_x1}]")]
    SpanNotInSeries {
        /// Row of the rejected span.
        y: i32,
        /// First column of the rejected span.
        x0: i32,
        /// Last column of the rejected span.
        x1: i32,
        /// Row of the span currently at the end of the footprint.
        last_y: i32,
        /// First column of the last span.
        last_x0: i32,
        /// Last column of the last span.
        last_x1: i32,
    },

    /// Two peak catalogs with different schemas cannot be concatenated.
    #[error("cannot merge footprints when peaks have different schemas")]
    PeakSchemaMismatch,

    /// The operation requires a normalized footprint.
    #[error("footprint is not normalized")]
    NotNormalized,

    /// The id to insert would set bits reserved by the protected mask.
    #[error("id {0:#x} sets bits in the protected mask {1:#x}")]
    IdOverwritesProtectedBits(u64, u64),

    /// The id to insert does not fit the target pixel type.
    #[error("id {0} out of range for image pixel type")]
    IdOutOfRange(u64),

    /// The target image does not cover the footprint's region.
    #[error("image of size ({0}x{1}) doesn't match footprint's host region of size ({2}x{3})")]
    RegionMismatch(usize, usize, i32, i32),
}
