use serde::{Deserialize, Serialize};

use crate::error::FootprintError;

/// Rounds a sub-pixel coordinate to its integer pixel, half-up.
pub(crate) fn round_coord(v: f32) -> i32 {
    (v + 0.5).floor() as i32
}

/// A local-maximum detection attached to a footprint.
///
/// Carries both the integer pixel position and the sub-pixel float position,
/// plus the pixel value at the peak.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    /// Integer column of the peak pixel.
    #[serde(rename = "i.x")]
    pub ix: i32,
    /// Integer row of the peak pixel.
    #[serde(rename = "i.y")]
    pub iy: i32,
    /// Sub-pixel column of the peak.
    #[serde(rename = "f.x")]
    pub fx: f32,
    /// Sub-pixel row of the peak.
    #[serde(rename = "f.y")]
    pub fy: f32,
    /// Pixel value at the peak.
    #[serde(rename = "peakValue")]
    pub peak_value: f32,
}

impl PeakRecord {
    /// Creates a peak from a sub-pixel position, rounding the integer
    /// coordinates from the float ones.
    pub fn new(fx: f32, fy: f32, peak_value: f32) -> Self {
        Self {
            ix: round_coord(fx),
            iy: round_coord(fy),
            fx,
            fy,
            peak_value,
        }
    }
}

/// Identifies the record layout of a peak catalog.
///
/// Catalogs can only be concatenated when their schemas compare equal; the
/// minimal schema is the int/float dual-coordinate layout of [`PeakRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeakSchema {
    fields: Vec<String>,
}

impl PeakSchema {
    /// The minimal peak schema: integer and float coordinates plus the value.
    pub fn minimal() -> Self {
        Self {
            fields: ["i.x", "i.y", "f.x", "f.y", "peakValue"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// The minimal schema extended with named extra fields.
    pub fn with_extra_fields(extra: &[&str]) -> Self {
        let mut schema = Self::minimal();
        schema.fields.extend(extra.iter().map(|s| s.to_string()));
        schema
    }

    /// The field names of this schema, in column order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Default for PeakSchema {
    fn default() -> Self {
        Self::minimal()
    }
}

/// An ordered, mutable collection of peaks sharing one schema.
///
/// Cloning a catalog deep-copies its records; catalogs are never shared
/// between footprints.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakCatalog {
    schema: PeakSchema,
    records: Vec<PeakRecord>,
}

impl PeakCatalog {
    /// Creates an empty catalog with the given schema.
    pub fn new(schema: PeakSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Creates an empty catalog with the minimal schema.
    pub fn minimal() -> Self {
        Self::new(PeakSchema::minimal())
    }

    /// The catalog's schema.
    pub fn schema(&self) -> &PeakSchema {
        &self.schema
    }

    /// The records, in catalog order.
    pub fn records(&self) -> &[PeakRecord] {
        &self.records
    }

    /// Iterates over the records in catalog order.
    pub fn iter(&self) -> std::slice::Iter<'_, PeakRecord> {
        self.records.iter()
    }

    /// Number of peaks in the catalog.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the catalog holds no peaks.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a record.
    pub fn push(&mut self, record: PeakRecord) {
        self.records.push(record);
    }

    /// Appends a new peak from a sub-pixel position and returns it.
    pub fn add_new(&mut self, fx: f32, fy: f32, peak_value: f32) -> &PeakRecord {
        self.records.push(PeakRecord::new(fx, fy, peak_value));
        &self.records[self.records.len() - 1]
    }

    /// Bulk-copies all records from `other` into this catalog.
    ///
    /// # Errors
    ///
    /// Fails if the schemas differ; no records are copied in that case.
    pub fn extend_from(&mut self, other: &PeakCatalog) -> Result<(), FootprintError> {
        if self.schema != other.schema {
            return Err(FootprintError::PeakSchemaMismatch);
        }
        self.records.extend_from_slice(&other.records);
        Ok(())
    }

    /// Keeps only the peaks for which `keep` returns true.
    pub fn retain<F: FnMut(&PeakRecord) -> bool>(&mut self, keep: F) {
        self.records.retain(keep);
    }

    /// Sorts the peaks in descending order of the given float key.
    pub fn sort_by_key_desc<F: FnMut(&PeakRecord) -> f32>(&mut self, mut key: F) {
        self.records
            .sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(std::cmp::Ordering::Equal));
    }
}
