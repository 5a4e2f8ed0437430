use astrodet_geom::Box2i;

use crate::error::FootprintError;
use crate::footprint::Footprint;
use crate::peak::PeakCatalog;
use crate::span::Span;

/// Merges two footprints into a new one covering the union of their pixels.
///
/// Both inputs are normalized first, in place.
///
/// # Errors
///
/// Fails when both footprints carry peaks and their schemas differ.
pub fn merge_footprints(
    a: &mut Footprint,
    b: &mut Footprint,
) -> Result<Footprint, FootprintError> {
    a.normalize();
    b.normalize();
    merge_normalized(a, b)
}

/// Merges two footprints that are already normalized.
///
/// # Errors
///
/// Fails when either footprint is not normalized, or on a peak schema
/// mismatch.
pub fn merge_footprints_normalized(
    a: &Footprint,
    b: &Footprint,
) -> Result<Footprint, FootprintError> {
    if !a.is_normalized() || !b.is_normalized() {
        return Err(FootprintError::NotNormalized);
    }
    merge_normalized(a, b)
}

fn merged_peaks(a: &Footprint, b: &Footprint) -> Result<PeakCatalog, FootprintError> {
    if a.peaks().is_empty() {
        return Ok(b.peaks().clone());
    }
    if b.peaks().is_empty() {
        return Ok(a.peaks().clone());
    }
    let mut peaks = a.peaks().clone();
    peaks.extend_from(b.peaks())?;
    Ok(peaks)
}

fn merge_normalized(a: &Footprint, b: &Footprint) -> Result<Footprint, FootprintError> {
    let peaks = merged_peaks(a, b)?;
    let mut out = Footprint::new(a.spans().len() + b.spans().len(), Box2i::empty());
    out.set_peaks(peaks);

    let lhs = a.spans();
    let rhs = b.spans();
    let mut i = 0;
    let mut j = 0;
    while i < lhs.len() || j < rhs.len() {
        // pick the earlier head span
        let take_left = match (lhs.get(i), rhs.get(j)) {
            (Some(l), Some(r)) => (l.y, l.x0) <= (r.y, r.x0),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let mut current: Span = if take_left {
            i += 1;
            lhs[i - 1]
        } else {
            j += 1;
            rhs[j - 1]
        };

        // absorb every following span that overlaps or touches it, from
        // either side
        loop {
            if let Some(l) = lhs.get(i) {
                if l.y == current.y && l.x0 <= current.x1 + 1 {
                    current.x1 = current.x1.max(l.x1);
                    i += 1;
                    continue;
                }
            }
            if let Some(r) = rhs.get(j) {
                if r.y == current.y && r.x0 <= current.x1 + 1 {
                    current.x1 = current.x1.max(r.x1);
                    j += 1;
                    continue;
                }
            }
            break;
        }
        out.add_span_in_series(current.y, current.x0, current.x1)?;
    }
    Ok(out)
}
