use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use astrodet_geom::{Box2d, Box2i, PixelEllipse, Point2d, Point2i};
use astrodet_image::{Image, Mask};
use num_traits::PrimInt;

use crate::detect::footprints_from_mask;
use crate::error::FootprintError;
use crate::peak::{PeakCatalog, PeakSchema};
use crate::raster::set_mask_from_footprint;
use crate::span::Span;
use crate::wcs::{transform_point, SkyProjection};

/// Counter for footprint ids. Never reused, never reset.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Second moments of a pixel region: an ellipse in quadrupole form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quadrupole {
    /// Second moment along x.
    pub ixx: f64,
    /// Second moment along y.
    pub iyy: f64,
    /// Cross moment.
    pub ixy: f64,
}

/// A region of pixels, run-length encoded as a list of [`Span`]s.
///
/// A footprint also carries the tight bounding box of its spans, the pixel
/// count (`area`), the bounding box of the parent raster it was detected
/// against (`region`), and the peaks found inside it.
///
/// Most algorithms require the footprint to be *normalized*: spans sorted by
/// `(y, x0)`, no two spans on a row overlapping or touching, and `area`/`bbox`
/// exact. [`Footprint::normalize`] establishes this invariant.
#[derive(Debug)]
pub struct Footprint {
    id: u64,
    spans: Vec<Span>,
    area: u64,
    bbox: Box2i,
    region: Box2i,
    peaks: PeakCatalog,
    normalized: bool,
}

impl Clone for Footprint {
    /// Deep-copies spans and peaks; the copy gets a fresh id.
    fn clone(&self) -> Self {
        Self {
            id: next_id(),
            spans: self.spans.clone(),
            area: self.area,
            bbox: self.bbox,
            region: self.region,
            peaks: self.peaks.clone(),
            normalized: self.normalized,
        }
    }
}

impl Footprint {
    /// Creates an empty footprint over `region`, reserving room for
    /// `capacity` spans.
    pub fn new(capacity: usize, region: Box2i) -> Self {
        Self {
            id: next_id(),
            spans: Vec::with_capacity(capacity),
            area: 0,
            bbox: Box2i::empty(),
            region,
            peaks: PeakCatalog::minimal(),
            normalized: true,
        }
    }

    /// Creates an empty footprint using a custom schema for its peaks.
    pub fn with_peak_schema(schema: PeakSchema, capacity: usize, region: Box2i) -> Self {
        let mut foot = Self::new(capacity, region);
        foot.peaks = PeakCatalog::new(schema);
        foot
    }

    /// Creates a rectangular footprint covering `bbox`.
    pub fn from_bbox(bbox: &Box2i, region: Box2i) -> Self {
        let mut foot = Self::new(bbox.height().max(0) as usize, region);
        for y in bbox.min_y()..=bbox.max_y() {
            foot.add_span(y, bbox.min_x(), bbox.max_x());
        }
        foot.normalized = true;
        foot
    }

    /// Creates a circular footprint.
    ///
    /// The radius is rounded so that a circle of radius `r` covers the same
    /// pixels as the disc `x^2 + y^2 <= r^2 + 0.5`.
    pub fn from_circle(center: Point2i, radius: f64, region: Box2i) -> Self {
        let r2 = (radius * radius + 0.5) as i32;
        let r = (r2 as f64).sqrt() as i32;
        let mut foot = Self::new((2 * r + 1).max(0) as usize, region);
        for i in -r..=r {
            let hlen = ((r2 - i * i) as f64).sqrt() as i32;
            foot.add_span(center.y + i, center.x - hlen, center.x + hlen);
        }
        foot.normalized = true;
        foot
    }

    /// Creates an elliptical footprint from a pixel-grid ellipse.
    pub fn from_ellipse(ellipse: &PixelEllipse, region: Box2i) -> Self {
        let mut foot = Self::new(0, region);
        for (y, x0, x1) in ellipse.rows() {
            foot.add_span(y, x0, x1);
        }
        foot.normalized = true;
        foot
    }

    /// Creates a footprint from an explicit span list. The result is not
    /// normalized.
    pub fn from_spans(spans: &[Span], region: Box2i) -> Self {
        let mut foot = Self::new(spans.len(), region);
        for span in spans {
            foot.add_span(span.y, span.x0, span.x1);
        }
        foot
    }

    /// The process-unique id of this footprint. A debugging label only; no
    /// algorithm depends on it.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The spans of the footprint, in insertion order until normalized.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Number of pixels covered. Exact whenever the footprint is normalized.
    pub fn area(&self) -> u64 {
        self.area
    }

    /// The bounding box of the spans. Tight whenever normalized (but see
    /// [`Footprint::intersect_mask`]).
    pub fn bbox(&self) -> &Box2i {
        &self.bbox
    }

    /// The bounds of the parent raster this footprint was defined against.
    pub fn region(&self) -> &Box2i {
        &self.region
    }

    /// Replaces the parent-raster bounds. Purely metadata; span content is
    /// unaffected.
    pub fn set_region(&mut self, region: Box2i) {
        self.region = region;
    }

    /// The peaks attached to this footprint.
    pub fn peaks(&self) -> &PeakCatalog {
        &self.peaks
    }

    /// Mutable access to the peaks.
    pub fn peaks_mut(&mut self) -> &mut PeakCatalog {
        &mut self.peaks
    }

    /// Replaces the whole peak catalog.
    pub fn set_peaks(&mut self, peaks: PeakCatalog) {
        self.peaks = peaks;
    }

    /// Whether the normalization invariant currently holds.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Adds a peak at a sub-pixel position and returns it.
    pub fn add_peak(&mut self, fx: f32, fy: f32, peak_value: f32) -> &crate::peak::PeakRecord {
        self.peaks.add_new(fx, fy, peak_value)
    }

    /// Sorts the peaks from most positive to most negative peak value.
    pub fn sort_peaks(&mut self) {
        self.peaks.sort_by_key_desc(|p| p.peak_value);
    }

    /// Appends a span, swapping the column bounds if they are reversed.
    ///
    /// The footprint becomes unnormalized; `area` and `bbox` are kept
    /// consistent incrementally.
    pub fn add_span(&mut self, y: i32, x0: i32, x1: i32) -> &Span {
        let (x0, x1) = if x1 < x0 { (x1, x0) } else { (x0, x1) };
        let span = Span::new(y, x0, x1);
        self.area += span.width() as u64;
        self.bbox.include(Point2i::new(x0, y));
        self.bbox.include(Point2i::new(x1, y));
        self.normalized = false;
        self.spans.push(span);
        &self.spans[self.spans.len() - 1]
    }

    /// Appends a span known to follow the last span in `(y, x0)` order.
    ///
    /// A span that is row-contiguous with the last span (starts one column
    /// past its end) extends it in place, so a list appended monotonically
    /// stays merged and normalized without running the general normalizer.
    ///
    /// Note that only local contiguity with the last span is verified; the
    /// footprint is marked normalized without a global check (a debug build
    /// re-validates the full invariant).
    ///
    /// # Errors
    ///
    /// Fails if the span is out of series with the last appended span; the
    /// footprint is unchanged in that case.
    pub fn add_span_in_series(&mut self, y: i32, x0: i32, x1: i32) -> Result<&Span, FootprintError> {
        let (x0, x1) = if x1 < x0 { (x1, x0) } else { (x0, x1) };
        let Some(&last) = self.spans.last() else {
            self.add_span(y, x0, x1);
            self.normalized = true;
            return Ok(&self.spans[0]);
        };
        if y == last.y && x0 == last.x1 + 1 {
            // contiguous: extend the last span in place
            let idx = self.spans.len() - 1;
            self.spans[idx].x1 = x1;
            self.area += (x1 as i64 - x0 as i64 + 1) as u64;
            self.bbox.include(Point2i::new(x1, y));
            return Ok(&self.spans[idx]);
        }
        if !(y > last.y || (y == last.y && x0 > last.x1 + 1)) {
            return Err(FootprintError::SpanNotInSeries {
                y,
                x0,
                x1,
                last_y: last.y,
                last_x0: last.x0,
                last_x1: last.x1,
            });
        }
        self.add_span(y, x0, x1);
        self.normalized = true;
        debug_assert!(self.check_invariant());
        Ok(&self.spans[self.spans.len() - 1])
    }

    /// Verifies the normalization invariant in O(spans). Debug aid.
    fn check_invariant(&self) -> bool {
        let mut area = 0u64;
        let mut bbox = Box2i::empty();
        for w in self.spans.windows(2) {
            if !(w[1].y > w[0].y || (w[1].y == w[0].y && w[1].x0 > w[0].x1 + 1)) {
                return false;
            }
        }
        for s in &self.spans {
            area += s.width() as u64;
            bbox.include(Point2i::new(s.x0, s.y));
            bbox.include(Point2i::new(s.x1, s.y));
        }
        area == self.area && bbox == self.bbox
    }

    /// Sorts and merges the spans, recomputing `area` and `bbox` exactly.
    ///
    /// Spans on the same row that overlap or touch (gap of at most one
    /// column) are merged. A no-op when already normalized.
    pub fn normalize(&mut self) {
        if self.normalized {
            return;
        }
        if self.spans.is_empty() {
            self.bbox = Box2i::empty();
            self.area = 0;
            self.normalized = true;
            return;
        }
        let mut spans = std::mem::take(&mut self.spans);
        spans.sort_unstable();

        let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
        let mut area = 0u64;
        let mut bbox = Box2i::empty();
        for span in spans {
            if let Some(last) = merged.last_mut() {
                if last.y == span.y && span.x0 <= last.x1 + 1 {
                    // overlapping or touching: extend the running span
                    if span.x1 > last.x1 {
                        area += (span.x1 - last.x1) as u64;
                        last.x1 = span.x1;
                        bbox.include(Point2i::new(span.x1, span.y));
                    }
                    continue;
                }
            }
            area += span.width() as u64;
            bbox.include(Point2i::new(span.x0, span.y));
            bbox.include(Point2i::new(span.x1, span.y));
            merged.push(span);
        }
        log::trace!(
            "footprint {}: normalized to {} spans, area {}",
            self.id,
            merged.len(),
            area
        );
        self.spans = merged;
        self.area = area;
        self.bbox = bbox;
        self.normalized = true;
    }

    /// Does this footprint contain the pixel?
    pub fn contains(&self, p: Point2i) -> bool {
        self.bbox.contains(p) && self.spans.iter().any(|s| s.contains(p.x, p.y))
    }

    /// Translates every span (and the bounding box) by `(dx, dy)`.
    pub fn shift(&mut self, dx: i32, dy: i32) {
        for span in &mut self.spans {
            span.shift(dx, dy);
        }
        self.bbox.shift(dx, dy);
    }

    /// Area-weighted first moment of the covered pixels.
    ///
    /// # Panics
    ///
    /// Panics if the footprint is empty.
    pub fn centroid(&self) -> Point2d {
        assert!(self.area > 0, "centroid of an empty footprint");
        let mut xc = 0.0;
        let mut yc = 0.0;
        for s in &self.spans {
            let npix = s.width() as f64;
            xc += npix * 0.5 * (s.x0 + s.x1) as f64;
            yc += npix * s.y as f64;
        }
        Point2d::new(xc / self.area as f64, yc / self.area as f64)
    }

    /// Area-weighted second moments about the centroid.
    ///
    /// # Panics
    ///
    /// Panics if the footprint is empty.
    pub fn shape(&self) -> Quadrupole {
        let cen = self.centroid();
        let mut sumxx = 0.0;
        let mut sumxy = 0.0;
        let mut sumyy = 0.0;
        for s in &self.spans {
            let npix = s.width() as f64;
            let dy = s.y as f64 - cen.y;
            for x in s.x0..=s.x1 {
                let dx = x as f64 - cen.x;
                sumxx += dx * dx;
            }
            sumxy += npix * (0.5 * (s.x0 + s.x1) as f64 - cen.x) * dy;
            sumyy += npix * dy * dy;
        }
        let area = self.area as f64;
        Quadrupole {
            ixx: sumxx / area,
            iyy: sumyy / area,
            ixy: sumxy / area,
        }
    }

    /// Restricts the footprint to `bbox`, clamping partially-overlapping
    /// spans and dropping peaks that fall outside. The result is normalized.
    pub fn clip_to(&mut self, bbox: &Box2i) {
        self.spans.retain(|s| {
            !(s.y < bbox.min_y()
                || s.y > bbox.max_y()
                || s.x0 > bbox.max_x()
                || s.x1 < bbox.min_x())
        });
        for s in &mut self.spans {
            s.x0 = s.x0.max(bbox.min_x());
            s.x1 = s.x1.min(bbox.max_x());
        }
        self.peaks.retain(|p| bbox.contains(Point2i::new(p.ix, p.iy)));

        if self.spans.is_empty() {
            self.bbox = Box2i::empty();
            self.area = 0;
            self.normalized = true;
        } else {
            self.normalized = false;
            self.normalize();
        }
    }

    /// Removes every pixel of the footprint where `pixel & bitmask != 0`,
    /// splitting spans around masked pixels.
    ///
    /// Normalizes first. Afterwards `area` is the exact count of surviving
    /// pixels, but `bbox` is the old bounding box intersected with the mask's
    /// bounding box rather than the tight box of the surviving spans;
    /// re-normalization does not tighten it, so callers needing a tight box
    /// should rebuild the footprint from its spans.
    pub fn intersect_mask<T: PrimInt>(&mut self, mask: &Image<T>, bitmask: T) {
        self.normalize();
        let mask_bbox = mask.bbox();

        let mut kept: Vec<Span> = Vec::new();
        let mut kept_area = 0u64;
        for s in &self.spans {
            if s.y < mask_bbox.min_y() {
                continue;
            }
            if s.y > mask_bbox.max_y() {
                break;
            }
            if s.x1 < mask_bbox.min_x() || s.x0 > mask_bbox.max_x() {
                // span is entirely outside the mask
                continue;
            }
            let mut x0 = s.x0.max(mask_bbox.min_x());
            let x1 = s.x1.min(mask_bbox.max_x());

            let row = mask.row((s.y - mask.y0()) as usize);
            for x in x0..=x1 {
                if row[(x - mask.x0()) as usize] & bitmask != T::zero() {
                    // masked pixel found within the span
                    if x > x0 {
                        let piece = Span::new(s.y, x0, x - 1);
                        kept_area += piece.width() as u64;
                        kept.push(piece);
                    }
                    x0 = x + 1;
                }
            }
            if x0 <= x1 {
                let piece = Span::new(s.y, x0, x1);
                kept_area += piece.width() as u64;
                kept.push(piece);
            }
        }
        self.spans = kept;
        self.area = kept_area;
        self.bbox.clip(&mask_bbox);
    }

    /// Returns the bitwise OR of all mask bits under the footprint's spans.
    /// Spans outside the mask contribute nothing.
    pub fn overlaps_mask<T: PrimInt>(&self, mask: &Image<T>) -> T {
        let width = mask.width() as i32;
        let height = mask.height() as i32;
        let mut bits = T::zero();
        for s in &self.spans {
            let y = s.y - mask.y0();
            if y < 0 || y >= height {
                continue;
            }
            let x0 = (s.x0 - mask.x0()).max(0);
            let x1 = (s.x1 - mask.x0()).min(width - 1);
            if x1 < x0 {
                continue;
            }
            let row = mask.row(y as usize);
            for &px in &row[x0 as usize..=x1 as usize] {
                bits = bits | px;
            }
        }
        bits
    }

    /// Trims each span to its outermost nonzero pixels of `image`, dropping
    /// spans that are zero throughout. The result is normalized.
    ///
    /// Every span must lie within the image bounds.
    pub fn clip_to_nonzero<T>(&mut self, image: &Image<T>)
    where
        T: Copy + PartialEq + num_traits::Zero,
    {
        self.normalize();
        let old = std::mem::take(&mut self.spans);
        self.area = 0;
        self.bbox = Box2i::empty();
        for s in &old {
            let row = image.row((s.y - image.y0()) as usize);
            let left = (s.x0..=s.x1)
                .find(|&x| !row[(x - image.x0()) as usize].is_zero());
            let Some(left) = left else {
                // whole span is zero; drop it
                continue;
            };
            let right = (left..=s.x1)
                .rev()
                .find(|&x| !row[(x - image.x0()) as usize].is_zero())
                .unwrap_or(left);
            self.add_span(s.y, left, right);
        }
        self.normalize();
    }

    /// Replaces this footprint with the union of itself (unless
    /// `ignore_self`) and `others`.
    ///
    /// The union is computed by stamping every contributing footprint into a
    /// temporary one-bit mask sized to the union of the bounding boxes and
    /// re-detecting connected runs from that raster.
    pub fn include(&mut self, others: &[&Footprint], ignore_self: bool) {
        if others.is_empty() {
            return;
        }
        let mut bbox = Box2i::empty();
        if !ignore_self {
            bbox.include_box(&self.bbox);
        } else {
            self.spans.clear();
        }
        for other in others {
            bbox.include_box(&other.bbox);
        }
        let bits: u16 = 0x1;
        let mut mask = Mask::from_box_val(&bbox, 0);
        if !ignore_self {
            set_mask_from_footprint(&mut mask, self, bits);
        }
        for other in others {
            set_mask_from_footprint(&mut mask, other, bits);
        }
        let detected = footprints_from_mask(&mask, bits, &self.region);
        log::debug!(
            "footprint {}: include() re-detected {} connected footprints",
            self.id,
            detected.len()
        );
        self.spans.clear();
        for foot in &detected {
            self.spans.extend_from_slice(&foot.spans);
        }
        self.normalized = false;
        self.normalize();
    }

    /// Maps this footprint into the frame of another projection.
    ///
    /// The source bounding box corners are forward-mapped to bound a
    /// candidate region; every pixel of that region is then inverse-mapped
    /// and kept when the rounded source position lies inside this footprint,
    /// so the output is gap-free regardless of the projections' local
    /// distortion. Peaks are forward-mapped individually. When `do_clip` is
    /// set the result is clipped to `region`.
    pub fn transform<S, T>(
        &self,
        source: &S,
        target: &T,
        region: Box2i,
        do_clip: bool,
    ) -> Footprint
    where
        S: SkyProjection,
        T: SkyProjection,
    {
        let mut corners = Box2d::empty();
        for &(x, y) in &[
            (self.bbox.min_x(), self.bbox.min_y()),
            (self.bbox.min_x(), self.bbox.max_y()),
            (self.bbox.max_x(), self.bbox.min_y()),
            (self.bbox.max_x(), self.bbox.max_y()),
        ] {
            corners.include(transform_point(x as f64, y as f64, source, target));
        }
        let candidate = corners.to_box2i();

        let mut out = Footprint::with_peak_schema(self.peaks.schema().clone(), 0, region);
        for y in candidate.min_y()..=candidate.max_y() {
            let mut start = None;
            for x in candidate.min_x()..=candidate.max_x() {
                let p = transform_point(x as f64, y as f64, target, source);
                if self.contains(p.round()) {
                    if start.is_none() {
                        start = Some(x);
                    }
                } else if let Some(x0) = start.take() {
                    out.add_span(y, x0, x - 1);
                }
            }
            if let Some(x0) = start {
                out.add_span(y, x0, candidate.max_x());
            }
        }

        for peak in self.peaks.iter() {
            let tp = transform_point(peak.fx as f64, peak.fy as f64, source, target);
            out.add_peak(tp.x as f32, tp.y as f32, peak.peak_value);
        }

        if do_clip {
            out.clip_to(&region);
        }
        out
    }

    /// Extracts the pixels of the footprint that are missing a vertical
    /// neighbor, or sit on the first or last row, as a new footprint.
    ///
    /// # Errors
    ///
    /// Fails if the footprint is not normalized.
    pub fn find_edge_pixels(&self) -> Result<Footprint, FootprintError> {
        if !self.normalized {
            return Err(FootprintError::NotNormalized);
        }
        let width = self.bbox.width();
        let height = self.bbox.height();
        if height <= 2 || self.spans.len() <= 2 {
            // everything is on the edge
            return Ok(self.clone());
        }

        let mut edges =
            Footprint::with_peak_schema(self.peaks.schema().clone(), 0, self.region);
        let x_start = self.bbox.min_x();
        let y_start = self.bbox.min_y();
        let y_end = self.spans[self.spans.len() - 1].y;

        // group spans by row; normalized spans are already row-contiguous
        let mut rows: Vec<(i32, std::ops::Range<usize>)> = Vec::new();
        let mut i = 0;
        while i < self.spans.len() {
            let y = self.spans[i].y;
            let begin = i;
            while i < self.spans.len() && self.spans[i].y == y {
                i += 1;
            }
            rows.push((y, begin..i));
        }

        let fill_row = |buf: &mut [bool], range: &std::ops::Range<usize>| {
            buf.iter_mut().for_each(|b| *b = false);
            for s in &self.spans[range.clone()] {
                for x in s.x0..=s.x1 {
                    buf[(x - x_start) as usize] = true;
                }
            }
        };

        let mut row_before = vec![false; width as usize];
        let mut row_after = vec![false; width as usize];

        for (ri, (y, range)) in rows.iter().enumerate() {
            let y = *y;
            if y == y_start || y == y_end {
                // the whole row is on an edge
                for s in &self.spans[range.clone()] {
                    edges.add_span_in_series(y, s.x0, s.x1)?;
                }
                continue;
            }
            match rows.get(ri.wrapping_sub(1)) {
                Some((py, prange)) if *py == y - 1 => fill_row(&mut row_before, prange),
                _ => row_before.iter_mut().for_each(|b| *b = false),
            }
            match rows.get(ri + 1) {
                Some((ny, nrange)) if *ny == y + 1 => fill_row(&mut row_after, nrange),
                _ => row_after.iter_mut().for_each(|b| *b = false),
            }

            for s in &self.spans[range.clone()] {
                let mut x0 = s.x0;
                let mut on_edge = true; // the first pixel is an edge
                for x in (s.x0 + 1)..s.x1 {
                    let i = (x - x_start) as usize;
                    if on_edge {
                        if row_before[i] && row_after[i] {
                            // end of the edge run
                            on_edge = false;
                            edges.add_span_in_series(y, x0, x - 1)?;
                        }
                    } else if !row_before[i] || !row_after[i] {
                        on_edge = true;
                        x0 = x;
                    }
                }
                // the last pixel is always an edge
                if on_edge {
                    edges.add_span_in_series(y, x0, s.x1)?;
                } else {
                    edges.add_span_in_series(y, s.x1, s.x1)?;
                }
            }
        }
        edges.normalize();
        Ok(edges)
    }

    /// Adds `id` to the image pixels under the footprint.
    ///
    /// The image must match the dimensions of `region` (or of the
    /// footprint's own region when `region` is empty); spans outside the
    /// image rows are skipped and columns are clipped.
    ///
    /// # Errors
    ///
    /// Fails if the image size does not match the region, or if `id` does
    /// not fit the pixel type.
    pub fn insert_into_image<T>(
        &self,
        image: &mut Image<T>,
        id: u64,
        region: &Box2i,
    ) -> Result<(), FootprintError>
    where
        T: PrimInt,
    {
        self.do_insert_into_image(image, id, false, 0, None, region)
    }

    /// Writes `id` into the image pixels under the footprint, optionally
    /// replacing what was there.
    ///
    /// With `overwrite` set, each pixel becomes `(pixel & protect) + id` and
    /// the ids overwritten (pixel values outside the protected bits) are
    /// recorded in `old_ids` when given. Without it, `id` is added to the
    /// pixel as in [`Footprint::insert_into_image`].
    ///
    /// # Errors
    ///
    /// Fails if `id` sets bits inside the protected mask, if `id` does not
    /// fit the pixel type, or on an image/region size mismatch.
    pub fn insert_into_image_with<T>(
        &self,
        image: &mut Image<T>,
        id: u64,
        overwrite: bool,
        protect: u64,
        old_ids: Option<&mut BTreeSet<u64>>,
        region: &Box2i,
    ) -> Result<(), FootprintError>
    where
        T: PrimInt,
    {
        self.do_insert_into_image(image, id, overwrite, protect, old_ids, region)
    }

    fn do_insert_into_image<T>(
        &self,
        image: &mut Image<T>,
        id: u64,
        overwrite: bool,
        protect: u64,
        mut old_ids: Option<&mut BTreeSet<u64>>,
        region: &Box2i,
    ) -> Result<(), FootprintError>
    where
        T: PrimInt,
    {
        let region = if region.is_empty() {
            &self.region
        } else {
            region
        };
        if region.width() != image.width() as i32 || region.height() != image.height() as i32 {
            return Err(FootprintError::RegionMismatch(
                image.width(),
                image.height(),
                region.width(),
                region.height(),
            ));
        }
        if id & protect != 0 {
            return Err(FootprintError::IdOverwritesProtectedBits(id, protect));
        }
        let id_px = T::from(id).ok_or(FootprintError::IdOutOfRange(id))?;
        let protect_px = T::from(protect).ok_or(FootprintError::IdOutOfRange(protect))?;

        let width = region.width();
        let height = region.height();
        let x0 = region.min_x();
        let y0 = region.min_y();
        for s in &self.spans {
            let sy = s.y - y0;
            if sy < 0 || sy >= height {
                continue;
            }
            let sx0 = (s.x0 - x0).max(0);
            let sx1 = (s.x1 - x0).min(width - 1);
            if sx1 < sx0 {
                continue;
            }
            let row = image.row_mut(sy as usize);
            for px in &mut row[sx0 as usize..=sx1 as usize] {
                if overwrite {
                    let old = *px & !protect_px;
                    if old != T::zero() {
                        if let Some(ids) = old_ids.as_deref_mut() {
                            // the cast back to u64 cannot fail: the pixel held it
                            if let Some(old) = old.to_u64() {
                                ids.insert(old);
                            }
                        }
                    }
                    *px = (*px & protect_px) + id_px;
                } else {
                    *px = *px + id_px;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wcs::SkyCoord;
    use astrodet_image::ImageSize;

    fn region20() -> Box2i {
        Box2i::from_corners(Point2i::new(0, 0), Point2i::new(20, 20))
    }

    #[test]
    fn rectangle_has_exact_area() {
        let bbox = Box2i::from_corners(Point2i::new(2, 3), Point2i::new(8, 7));
        let foot = Footprint::from_bbox(&bbox, region20());
        assert!(foot.is_normalized());
        assert_eq!(foot.area(), 7 * 5);
        assert_eq!(foot.bbox(), &bbox);
    }

    #[test]
    fn circle_contains_expected_points() {
        let foot = Footprint::from_circle(Point2i::new(10, 10), 3.0, region20());
        assert!(foot.contains(Point2i::new(10, 10)));
        assert!(foot.contains(Point2i::new(13, 10)));
        assert!(!foot.contains(Point2i::new(20, 20)));
        let max_area = (std::f64::consts::PI * 9.0 + 10.0) as u64;
        assert!(foot.area() > 0 && foot.area() <= max_area);
    }

    #[test]
    fn normalize_sorts_merges_and_recounts() {
        let mut foot = Footprint::new(0, region20());
        foot.add_span(5, 8, 10);
        foot.add_span(5, 0, 3);
        foot.add_span(5, 4, 6); // touches [0,3]
        foot.add_span(4, 2, 2);
        foot.normalize();
        assert!(foot.is_normalized());
        assert_eq!(
            foot.spans(),
            &[Span::new(4, 2, 2), Span::new(5, 0, 6), Span::new(5, 8, 10)]
        );
        for w in foot.spans().windows(2) {
            if w[0].y == w[1].y {
                assert!(w[1].x0 > w[0].x1 + 1);
            }
        }
        let total: i64 = foot.spans().iter().map(|s| s.width()).sum();
        assert_eq!(foot.area(), total as u64);
        assert_eq!(foot.bbox().min_x(), 0);
        assert_eq!(foot.bbox().max_x(), 10);
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut foot = Footprint::new(0, region20());
        foot.add_span(1, 5, 9);
        foot.add_span(1, 7, 12);
        foot.add_span(0, 0, 0);
        foot.normalize();
        let spans = foot.spans().to_vec();
        let area = foot.area();
        let bbox = *foot.bbox();
        foot.normalize();
        assert_eq!(foot.spans(), &spans[..]);
        assert_eq!(foot.area(), area);
        assert_eq!(foot.bbox(), &bbox);
    }

    #[test]
    fn shift_round_trips() {
        let mut foot = Footprint::from_circle(Point2i::new(5, 5), 2.0, region20());
        let spans = foot.spans().to_vec();
        foot.shift(3, -2);
        foot.shift(-3, 2);
        assert_eq!(foot.spans(), &spans[..]);
    }

    #[test]
    fn add_span_in_series_rejects_out_of_order() {
        let mut foot = Footprint::new(0, region20());
        foot.add_span_in_series(5, 3, 3).unwrap();
        let err = foot.add_span_in_series(5, 0, 1).unwrap_err();
        assert!(matches!(err, FootprintError::SpanNotInSeries { .. }));
        // footprint unchanged by the failed insertion
        assert_eq!(foot.spans(), &[Span::new(5, 3, 3)]);
        assert_eq!(foot.area(), 1);
    }

    #[test]
    fn add_span_in_series_extends_contiguous_span() {
        let mut foot = Footprint::new(0, region20());
        foot.add_span_in_series(2, 0, 4).unwrap();
        foot.add_span_in_series(2, 5, 7).unwrap();
        assert_eq!(foot.spans(), &[Span::new(2, 0, 7)]);
        assert_eq!(foot.area(), 8);
        assert!(foot.is_normalized());
    }

    #[test]
    fn clone_deep_copies_and_renumbers() {
        let mut foot = Footprint::from_circle(Point2i::new(5, 5), 2.0, region20());
        foot.add_peak(5.0, 5.0, 42.0);
        let copy = foot.clone();
        assert_ne!(copy.id(), foot.id());
        assert_eq!(copy.spans(), foot.spans());
        assert_eq!(copy.peaks().len(), 1);
    }

    #[test]
    fn centroid_of_rectangle_is_center() {
        let bbox = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(4, 2));
        let foot = Footprint::from_bbox(&bbox, region20());
        let c = foot.centroid();
        approx::assert_relative_eq!(c.x, 2.0);
        approx::assert_relative_eq!(c.y, 1.0);
        let q = foot.shape();
        approx::assert_relative_eq!(q.ixy, 0.0);
        assert!(q.ixx > q.iyy);
    }

    #[test]
    fn clip_to_drops_and_clamps() {
        let mut foot = Footprint::new(0, region20());
        foot.add_span(0, 0, 10);
        foot.add_span(5, 0, 10);
        foot.add_span(9, 0, 10);
        foot.add_peak(5.0, 5.0, 1.0);
        foot.add_peak(9.0, 9.0, 2.0);
        let clip = Box2i::from_corners(Point2i::new(2, 1), Point2i::new(6, 6));
        foot.clip_to(&clip);
        assert_eq!(foot.spans(), &[Span::new(5, 2, 6)]);
        assert_eq!(foot.area(), 5);
        assert_eq!(foot.peaks().len(), 1);
        assert_eq!(foot.peaks().records()[0].iy, 5);
    }

    #[test]
    fn clip_to_disjoint_box_empties_footprint() {
        let mut foot = Footprint::from_circle(Point2i::new(5, 5), 2.0, region20());
        foot.clip_to(&Box2i::from_corners(Point2i::new(15, 15), Point2i::new(18, 18)));
        assert_eq!(foot.area(), 0);
        assert!(foot.bbox().is_empty());
        assert!(foot.is_normalized());
    }

    #[test]
    fn intersect_mask_removes_masked_pixels() {
        let bbox = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(7, 3));
        let mut foot = Footprint::from_bbox(&bbox, region20());
        let before = foot.area();

        let mut mask = Mask::from_size_val(
            ImageSize {
                width: 8,
                height: 4,
            },
            0,
        );
        // mask out a vertical stripe at x = 3, 4
        for y in 0..4 {
            mask.row_mut(y)[3] = 0x2;
            mask.row_mut(y)[4] = 0x2;
        }
        foot.intersect_mask(&mask, 0x2u16);
        assert_eq!(foot.area(), before - 8);
        for s in foot.spans() {
            for x in s.x0..=s.x1 {
                assert_eq!(mask.row(s.y as usize)[x as usize] & 0x2, 0);
            }
        }
    }

    #[test]
    fn overlaps_mask_ors_bits_under_spans() {
        let mut foot = Footprint::new(0, region20());
        foot.add_span(1, 0, 2);
        let mut mask = Mask::from_size_val(
            ImageSize {
                width: 4,
                height: 3,
            },
            0,
        );
        mask.row_mut(1)[1] = 0x4;
        mask.row_mut(2)[0] = 0x8; // not under the footprint
        assert_eq!(foot.overlaps_mask(&mask), 0x4);
    }

    #[test]
    fn clip_to_nonzero_trims_spans() {
        let mut foot = Footprint::new(0, region20());
        foot.add_span(0, 0, 4);
        foot.add_span(1, 0, 4);
        let mut img = Image::<i32>::from_size_val(
            ImageSize {
                width: 5,
                height: 2,
            },
            0,
        );
        img.row_mut(0)[1] = 7;
        img.row_mut(0)[3] = 7;
        foot.clip_to_nonzero(&img);
        assert_eq!(foot.spans(), &[Span::new(0, 1, 3)]);
        assert_eq!(foot.area(), 3);
    }

    #[test]
    fn edge_pixels_of_solid_rectangle_form_perimeter() {
        let (w, h) = (6i64, 5i64);
        let bbox = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(w as i32 - 1, h as i32 - 1));
        let foot = Footprint::from_bbox(&bbox, region20());
        let edges = foot.find_edge_pixels().unwrap();
        assert_eq!(edges.area() as i64, 2 * w + 2 * (h - 2));
        assert!(!edges.contains(Point2i::new(2, 2)));
        assert!(edges.contains(Point2i::new(0, 2)));
        assert!(edges.contains(Point2i::new(3, 0)));
    }

    #[test]
    fn edge_pixels_require_normalized_input() {
        let mut foot = Footprint::new(0, region20());
        foot.add_span(0, 0, 3);
        assert!(matches!(
            foot.find_edge_pixels(),
            Err(FootprintError::NotNormalized)
        ));
    }

    #[test]
    fn insert_into_image_checks_id_range_and_protected_bits() {
        let region = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(3, 3));
        let foot = Footprint::from_bbox(&region, region);
        let mut small = Image::<u8>::from_size_val(
            ImageSize {
                width: 4,
                height: 4,
            },
            0,
        );
        assert!(matches!(
            foot.insert_into_image(&mut small, 300, &Box2i::empty()),
            Err(FootprintError::IdOutOfRange(300))
        ));
        let mut img = Image::<u16>::from_size_val(
            ImageSize {
                width: 4,
                height: 4,
            },
            0,
        );
        assert!(matches!(
            foot.insert_into_image_with(&mut img, 0x3, true, 0x1, None, &Box2i::empty()),
            Err(FootprintError::IdOverwritesProtectedBits(0x3, 0x1))
        ));
        foot.insert_into_image(&mut img, 5, &Box2i::empty()).unwrap();
        assert_eq!(*img.pixel(2, 2), 5);
    }

    #[test]
    fn insert_into_image_tracks_overwritten_ids() {
        let region = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(3, 3));
        let foot = Footprint::from_bbox(&region, region);
        let mut img = Image::<u16>::from_size_val(
            ImageSize {
                width: 4,
                height: 4,
            },
            7,
        );
        let mut old = BTreeSet::new();
        foot.insert_into_image_with(&mut img, 2, true, 0, Some(&mut old), &Box2i::empty())
            .unwrap();
        assert_eq!(old.into_iter().collect::<Vec<_>>(), vec![7]);
        assert_eq!(*img.pixel(0, 0), 2);
    }

    #[test]
    fn include_unions_disjoint_footprints() {
        let a_box = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(2, 2));
        let b_box = Box2i::from_corners(Point2i::new(10, 10), Point2i::new(12, 12));
        let mut a = Footprint::from_bbox(&a_box, region20());
        let b = Footprint::from_bbox(&b_box, region20());
        a.include(&[&b], false);
        assert!(a.is_normalized());
        assert_eq!(a.area(), 9 + 9);
        assert!(a.contains(Point2i::new(1, 1)));
        assert!(a.contains(Point2i::new(11, 11)));
    }

    #[test]
    fn include_of_overlapping_footprints_merges_runs() {
        let a_box = Box2i::from_corners(Point2i::new(0, 0), Point2i::new(4, 4));
        let b_box = Box2i::from_corners(Point2i::new(3, 0), Point2i::new(7, 4));
        let mut a = Footprint::from_bbox(&a_box, region20());
        let b = Footprint::from_bbox(&b_box, region20());
        a.include(&[&b], false);
        assert_eq!(a.area(), 8 * 5);
        assert_eq!(a.spans().len(), 5);
    }

    /// A projection that just offsets pixel coordinates, so composing two of
    /// them through the sky is a pure translation.
    struct ShiftWcs {
        dx: f64,
        dy: f64,
    }

    impl SkyProjection for ShiftWcs {
        fn pixel_to_sky(&self, x: f64, y: f64) -> SkyCoord {
            SkyCoord {
                ra: x + self.dx,
                dec: y + self.dy,
            }
        }

        fn sky_to_pixel(&self, coord: SkyCoord) -> Point2d {
            Point2d::new(coord.ra - self.dx, coord.dec - self.dy)
        }
    }

    #[test]
    fn transform_through_shifted_projections_translates_spans() {
        let source = ShiftWcs { dx: 0.0, dy: 0.0 };
        let target = ShiftWcs { dx: -3.0, dy: -1.0 };
        let mut foot = Footprint::from_circle(Point2i::new(8, 8), 3.0, region20());
        foot.add_peak(8.0, 8.0, 5.0);

        let moved = foot.transform(&source, &target, region20(), false);
        assert_eq!(moved.area(), foot.area());
        assert!(moved.contains(Point2i::new(11, 9)));
        assert!(!moved.contains(Point2i::new(8, 8)));
        assert_eq!(moved.peaks().len(), 1);
        assert_eq!(moved.peaks().records()[0].ix, 11);

        let clipped = foot.transform(
            &source,
            &target,
            Box2i::from_corners(Point2i::new(11, 9), Point2i::new(20, 20)),
            true,
        );
        assert!(clipped.area() < foot.area());
        assert!(clipped.is_normalized());
    }
}
