//! Serialized form of footprints: one span table and one peak table.
//!
//! Older archives stored peaks with plain float `x`/`y`/`value` columns; the
//! reader accepts both layouts and upgrades legacy rows to the dual
//! integer/float coordinate record on the way in.

use serde::{Deserialize, Serialize};

use astrodet_geom::Box2i;

use crate::footprint::Footprint;
use crate::peak::PeakRecord;

/// One serialized span row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRow {
    /// Row coordinate.
    pub y: i32,
    /// First column, inclusive.
    pub x0: i32,
    /// Last column, inclusive.
    pub x1: i32,
}

/// A peak row in either the current or the legacy layout.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(untagged)]
enum PeakRowCompat {
    Modern(PeakRecord),
    Legacy { x: f32, y: f32, value: f32 },
}

impl From<PeakRowCompat> for PeakRecord {
    fn from(row: PeakRowCompat) -> Self {
        match row {
            PeakRowCompat::Modern(record) => record,
            PeakRowCompat::Legacy { x, y, value } => PeakRecord::new(x, y, value),
        }
    }
}

/// The serialized form of a footprint.
#[derive(Clone, Debug, Serialize)]
pub struct FootprintRecord {
    spans: Vec<SpanRow>,
    peaks: Vec<PeakRecord>,
}

#[derive(Deserialize)]
struct FootprintRecordCompat {
    spans: Vec<SpanRow>,
    peaks: Vec<PeakRowCompat>,
}

impl<'de> Deserialize<'de> for FootprintRecord {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let compat = FootprintRecordCompat::deserialize(deserializer)?;
        Ok(Self {
            spans: compat.spans,
            peaks: compat.peaks.into_iter().map(PeakRecord::from).collect(),
        })
    }
}

impl FootprintRecord {
    /// Captures a footprint's spans and peaks for serialization.
    pub fn from_footprint(foot: &Footprint) -> Self {
        Self {
            spans: foot
                .spans()
                .iter()
                .map(|s| SpanRow {
                    y: s.y,
                    x0: s.x0,
                    x1: s.x1,
                })
                .collect(),
            peaks: foot.peaks().records().to_vec(),
        }
    }

    /// Rebuilds a footprint over `region` from this record.
    ///
    /// The spans are appended as stored; callers wanting the normalization
    /// invariant should call [`Footprint::normalize`] on the result.
    pub fn to_footprint(&self, region: Box2i) -> Footprint {
        let mut foot = Footprint::new(self.spans.len(), region);
        for row in &self.spans {
            foot.add_span(row.y, row.x0, row.x1);
        }
        for peak in &self.peaks {
            foot.peaks_mut().push(*peak);
        }
        foot
    }
}
