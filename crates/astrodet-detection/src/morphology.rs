//! Dilation and erosion of footprints, run-length encoded throughout.
//!
//! Both operations work directly on span lists; no raster is ever built. The
//! structuring element is itself a small span list, one span per row.

use std::collections::BTreeMap;

use astrodet_geom::Point2i;

use crate::error::FootprintError;
use crate::footprint::Footprint;
use crate::span::Span;

/// The shape of a structuring element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementShape {
    /// Euclidean disc: grows by `radius` in all directions.
    Circle,
    /// L1 ball: grows by `radius` along the axes, less along diagonals.
    Diamond,
}

/// A structuring element for morphological operations, stored as one span per
/// row with coordinates relative to the element center.
#[derive(Clone, Debug)]
pub struct StructuringElement {
    widths: Vec<Span>,
    y_range: i32,
}

impl StructuringElement {
    /// Builds a symmetric element of the given shape and radius.
    pub fn from_shape(shape: ElementShape, radius: i32) -> Self {
        let mut widths = Vec::with_capacity((2 * radius + 1).max(1) as usize);
        for dy in -radius..=radius {
            let dx = match shape {
                ElementShape::Circle => {
                    (((radius * radius - dy * dy) as f64).sqrt()) as i32
                }
                ElementShape::Diamond => radius - dy.abs(),
            };
            widths.push(Span::new(dy, -dx, dx));
        }
        Self {
            y_range: widths.len() as i32,
            widths,
        }
    }

    /// Builds an asymmetric cross-shaped element extending a given number of
    /// pixels in each of the four directions.
    pub fn directional(left: i32, right: i32, up: i32, down: i32) -> Self {
        let mut widths = Vec::new();
        for dy in (1..=down).rev() {
            widths.push(Span::new(-dy, 0, 0));
        }
        widths.push(Span::new(0, -left, right));
        for dy in 1..=up {
            widths.push(Span::new(dy, 0, 0));
        }
        Self {
            y_range: widths.len() as i32,
            widths,
        }
    }

    /// The element rows, ordered by row offset.
    pub fn widths(&self) -> &[Span] {
        &self.widths
    }
}

/// Dilates a footprint by a structuring element.
///
/// For every footprint span and every element row, the widened interval is
/// accumulated into a per-row ordered list, coalescing with its neighbors
/// immediately so the map stays small. Peaks are deep-copied to the result.
pub fn dilate(foot: &Footprint, element: &StructuringElement) -> Result<Footprint, FootprintError> {
    // y -> sorted, disjoint (xmin, xmax) intervals
    let mut rows: BTreeMap<i32, Vec<(i32, i32)>> = BTreeMap::new();
    for span in foot.spans() {
        for el in element.widths() {
            let y = span.y + el.y;
            let xmin = span.x0 + el.x0;
            let xmax = span.x1 + el.x1;
            let intervals = rows.entry(y).or_default();

            let at = intervals.partition_point(|&(s, _)| s < xmin);
            intervals.insert(at, (xmin, xmax));
            // coalesce with the previous interval, then with the following ones
            let mut i = at;
            if i > 0 && intervals[i - 1].1 + 1 >= intervals[i].0 {
                intervals[i - 1].1 = intervals[i - 1].1.max(intervals[i].1);
                intervals.remove(i);
                i -= 1;
            }
            while i + 1 < intervals.len() && intervals[i].1 + 1 >= intervals[i + 1].0 {
                intervals[i].1 = intervals[i].1.max(intervals[i + 1].1);
                intervals.remove(i + 1);
            }
        }
    }

    let mut out = Footprint::with_peak_schema(foot.peaks().schema().clone(), 0, *foot.region());
    for (y, intervals) in &rows {
        for &(xmin, xmax) in intervals {
            out.add_span_in_series(*y, xmin, xmax)?;
        }
    }
    out.peaks_mut().extend_from(foot.peaks())?;
    Ok(out)
}

/// A footprint run eligible to survive erosion, tagged with the element row
/// it was produced by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PrimaryRun {
    y: i32,
    m: i32,
    xmin: i32,
    xmax: i32,
}

/// Erodes a footprint by a structuring element.
///
/// A span produces a primary run for element row `m` when the element row is
/// no wider than the span; a pixel survives only when, for its row, every
/// element row produced a run covering it. Peaks falling outside the eroded
/// footprint are dropped.
pub fn erode(foot: &Footprint, element: &StructuringElement) -> Result<Footprint, FootprintError> {
    let y_range = element.y_range;

    let mut primary: Vec<PrimaryRun> = Vec::new();
    for span in foot.spans() {
        for (m, el) in element.widths().iter().enumerate() {
            if el.width() <= span.width() {
                primary.push(PrimaryRun {
                    y: span.y - el.y,
                    m: m as i32,
                    xmin: span.x0 - el.x0,
                    xmax: span.x1 - el.x1,
                });
            }
        }
    }
    primary.sort_unstable();

    let mut out = Footprint::with_peak_schema(foot.peaks().schema().clone(), 0, *foot.region());
    let mut i = 0;
    while i < primary.len() {
        let y = primary[i].y;
        let mut j = i;
        while j < primary.len() && primary[j].y == y {
            j += 1;
        }
        let group = &primary[i..j];
        i = j;
        // a surviving pixel needs a run from every element row
        if (group.len() as i32) < y_range {
            continue;
        }

        let mut good: Vec<(i32, i32)> = Vec::new();
        let mut k = 0;
        for m in 0..y_range {
            let begin = k;
            while k < group.len() && group[k].m == m {
                k += 1;
            }
            if begin == k {
                // this element row produced nothing on this footprint row
                good.clear();
                break;
            }

            // consolidate overlapping or touching runs of the same m
            let mut consolidated: Vec<(i32, i32)> = Vec::new();
            let mut start = group[begin].xmin;
            let mut end = group[begin].xmax;
            for run in &group[begin + 1..k] {
                if run.xmin <= end + 1 {
                    end = end.max(run.xmax);
                } else {
                    consolidated.push((start, end));
                    start = run.xmin;
                    end = run.xmax;
                }
            }
            consolidated.push((start, end));

            if m == 0 {
                good = consolidated;
            } else {
                // intersect the runs accumulated so far with this row's runs
                let mut next: Vec<(i32, i32)> = Vec::new();
                for &(gs, ge) in &good {
                    for &(cs, ce) in &consolidated {
                        let s = gs.max(cs);
                        let e = ge.min(ce);
                        if s <= e {
                            next.push((s, e));
                        }
                    }
                }
                good = next;
            }
            if good.is_empty() {
                break;
            }
        }

        for &(s, e) in &good {
            out.add_span(y, s, e);
        }
    }
    out.normalize();

    for peak in foot.peaks().iter() {
        if out.contains(Point2i::new(peak.ix, peak.iy)) {
            out.peaks_mut().push(*peak);
        }
    }
    Ok(out)
}

/// Grows a footprint by `n_grow` pixels in every direction.
///
/// `isotropic` selects a disc structuring element; otherwise an L1 diamond
/// is used, which is substantially cheaper for large radii. A non-positive
/// `n_grow` or an empty footprint returns a plain copy.
pub fn grow_footprint(
    foot: &Footprint,
    n_grow: i32,
    isotropic: bool,
) -> Result<Footprint, FootprintError> {
    if n_grow <= 0 || foot.area() == 0 {
        return Ok(foot.clone());
    }
    let shape = if isotropic {
        ElementShape::Circle
    } else {
        ElementShape::Diamond
    };
    log::debug!(
        "growing footprint {} by {} ({:?})",
        foot.id(),
        n_grow,
        shape
    );
    dilate(foot, &StructuringElement::from_shape(shape, n_grow))
}

/// Grows a footprint by independent amounts in the four axis directions.
pub fn grow_footprint_directional(
    foot: &Footprint,
    left: i32,
    right: i32,
    up: i32,
    down: i32,
) -> Result<Footprint, FootprintError> {
    if (left <= 0 && right <= 0 && up <= 0 && down <= 0) || foot.area() == 0 {
        return Ok(foot.clone());
    }
    let element =
        StructuringElement::directional(left.max(0), right.max(0), up.max(0), down.max(0));
    dilate(foot, &element)
}

/// Shrinks a footprint by `n_shrink` pixels in every direction.
///
/// The element selection mirrors [`grow_footprint`]. A non-positive
/// `n_shrink` returns a plain copy; a footprint thinner than the element
/// erodes to an empty footprint.
pub fn shrink_footprint(
    foot: &Footprint,
    n_shrink: i32,
    isotropic: bool,
) -> Result<Footprint, FootprintError> {
    if n_shrink <= 0 {
        return Ok(foot.clone());
    }
    let shape = if isotropic {
        ElementShape::Circle
    } else {
        ElementShape::Diamond
    };
    erode(foot, &StructuringElement::from_shape(shape, n_shrink))
}
