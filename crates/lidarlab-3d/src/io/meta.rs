use std::path::Path;

use glam::DVec3;
use lidarlab_io::npy::{self, NpyArray, NpyData};

use crate::error::AnnotationError;

/// Number of columns per metadata row.
pub const META_COLUMNS: usize = 9;

/// Column of the x coordinate.
pub const COL_X: usize = 0;
/// Column of the y coordinate.
pub const COL_Y: usize = 1;
/// Column of the z coordinate.
pub const COL_Z: usize = 2;
/// Column of the source frame index.
pub const COL_FRAME: usize = 6;
/// Column of the category id.
pub const COL_CATEGORY: usize = 7;
/// Column of the instance id.
pub const COL_INSTANCE: usize = 8;

/// File name of the exported metadata.
pub const META_FILE_NAME: &str = "meta_updated.npy";

/// Per-point metadata rows `[x, y, z, _, _, _, frame, category, instance]`.
///
/// Columns 3..6 are carried through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetaTable {
    rows: Vec<[f64; META_COLUMNS]>,
}

// the label columns hold small non-negative integers stored as floats
#[inline]
fn to_label(value: f64) -> u16 {
    value as u16
}

impl MetaTable {
    /// Build a table from a decoded array of shape `(N, 9)`.
    ///
    /// Any supported element type is widened to `f64`.
    pub fn from_npy(array: &NpyArray) -> Result<Self, AnnotationError> {
        let shape = array.shape();
        if shape.len() != 2 || shape[1] != META_COLUMNS {
            return Err(AnnotationError::InvalidMetaShape(shape.to_vec()));
        }

        let values = array.data().to_f64();
        let rows = values
            .chunks_exact(META_COLUMNS)
            .map(|chunk| {
                let mut row = [0.0; META_COLUMNS];
                row.copy_from_slice(chunk);
                row
            })
            .collect();

        Ok(Self { rows })
    }

    /// Decode a table from `.npy` bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, AnnotationError> {
        Self::from_npy(&npy::decode_npy(bytes)?)
    }

    /// Read a table from a `.npy` file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, AnnotationError> {
        Self::from_npy(&npy::read_npy(path)?)
    }

    /// Build a table from raw rows.
    pub fn from_rows(rows: Vec<[f64; META_COLUMNS]>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The raw rows.
    pub fn rows(&self) -> &[[f64; META_COLUMNS]] {
        &self.rows
    }

    /// A raw row.
    pub fn row(&self, index: usize) -> Option<&[f64; META_COLUMNS]> {
        self.rows.get(index)
    }

    /// Stored position of a row.
    pub fn position(&self, index: usize) -> Option<DVec3> {
        self.row(index)
            .map(|r| DVec3::new(r[COL_X], r[COL_Y], r[COL_Z]))
    }

    /// Source frame index of a row.
    pub fn frame(&self, index: usize) -> Option<u16> {
        self.row(index).map(|r| to_label(r[COL_FRAME]))
    }

    /// Category id of a row.
    pub fn category(&self, index: usize) -> Option<u16> {
        self.row(index).map(|r| to_label(r[COL_CATEGORY]))
    }

    /// Instance id of a row.
    pub fn instance(&self, index: usize) -> Option<u16> {
        self.row(index).map(|r| to_label(r[COL_INSTANCE]))
    }

    /// Category ids of every row.
    pub fn categories(&self) -> Vec<u16> {
        self.rows.iter().map(|r| to_label(r[COL_CATEGORY])).collect()
    }

    /// Instance ids of every row.
    pub fn instances(&self) -> Vec<u16> {
        self.rows.iter().map(|r| to_label(r[COL_INSTANCE])).collect()
    }

    /// Frame indices of every row.
    pub fn frames(&self) -> Vec<u16> {
        self.rows.iter().map(|r| to_label(r[COL_FRAME])).collect()
    }

    /// Overwrite the label columns.
    ///
    /// # Arguments
    ///
    /// * `categories` - One category id per row.
    /// * `instances` - One instance id per row.
    pub fn set_labels(&mut self, categories: &[u16], instances: &[u16]) -> Result<(), AnnotationError> {
        if categories.len() != self.rows.len() || instances.len() != self.rows.len() {
            return Err(AnnotationError::Mismatch {
                points: categories.len().min(instances.len()),
                rows: self.rows.len(),
            });
        }

        for ((row, &category), &instance) in self.rows.iter_mut().zip(categories).zip(instances) {
            row[COL_CATEGORY] = category as f64;
            row[COL_INSTANCE] = instance as f64;
        }
        Ok(())
    }

    /// Convert the table into a `<f8` array of shape `(N, 9)`.
    pub fn to_npy(&self) -> Result<NpyArray, AnnotationError> {
        let data = self.rows.iter().flatten().copied().collect();
        Ok(NpyArray::new(
            vec![self.rows.len(), META_COLUMNS],
            NpyData::Float64(data),
        )?)
    }

    /// Encode the table as `.npy` bytes.
    pub fn encode(&self) -> Result<Vec<u8>, AnnotationError> {
        Ok(npy::encode_npy(&self.to_npy()?)?)
    }

    /// Write the table to a `.npy` file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), AnnotationError> {
        Ok(npy::write_npy(path, &self.to_npy()?)?)
    }
}
