use super::NpyError;

/// Element types supported by the codec.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NpyDType {
    /// Little-endian `f32` (`<f4`).
    Float32,
    /// Little-endian `f64` (`<f8`).
    Float64,
    /// Little-endian `u16` (`<u2`).
    UInt16,
    /// Little-endian `i32` (`<i4`).
    Int32,
}

impl NpyDType {
    /// Parse a NumPy dtype descriptor such as `<f8`.
    pub fn from_descr(descr: &str) -> Result<Self, NpyError> {
        match descr {
            "<f4" => Ok(NpyDType::Float32),
            "<f8" => Ok(NpyDType::Float64),
            "<u2" => Ok(NpyDType::UInt16),
            "<i4" => Ok(NpyDType::Int32),
            _ => Err(NpyError::UnsupportedDtype(descr.to_string())),
        }
    }

    /// The NumPy dtype descriptor for this type.
    pub fn descr(&self) -> &'static str {
        match self {
            NpyDType::Float32 => "<f4",
            NpyDType::Float64 => "<f8",
            NpyDType::UInt16 => "<u2",
            NpyDType::Int32 => "<i4",
        }
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            NpyDType::Float32 | NpyDType::Int32 => 4,
            NpyDType::Float64 => 8,
            NpyDType::UInt16 => 2,
        }
    }
}

/// Flat, typed element storage of an NPY array in C order.
#[derive(Debug, PartialEq, Clone)]
pub enum NpyData {
    /// `<f4` elements.
    Float32(Vec<f32>),
    /// `<f8` elements.
    Float64(Vec<f64>),
    /// `<u2` elements.
    UInt16(Vec<u16>),
    /// `<i4` elements.
    Int32(Vec<i32>),
}

impl NpyData {
    /// The dtype of the stored elements.
    pub fn dtype(&self) -> NpyDType {
        match self {
            NpyData::Float32(_) => NpyDType::Float32,
            NpyData::Float64(_) => NpyDType::Float64,
            NpyData::UInt16(_) => NpyDType::UInt16,
            NpyData::Int32(_) => NpyDType::Int32,
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        match self {
            NpyData::Float32(v) => v.len(),
            NpyData::Float64(v) => v.len(),
            NpyData::UInt16(v) => v.len(),
            NpyData::Int32(v) => v.len(),
        }
    }

    /// Check if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen every element to `f64`.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            NpyData::Float32(v) => v.iter().map(|&x| x as f64).collect(),
            NpyData::Float64(v) => v.clone(),
            NpyData::UInt16(v) => v.iter().map(|&x| x as f64).collect(),
            NpyData::Int32(v) => v.iter().map(|&x| x as f64).collect(),
        }
    }
}

/// An n-dimensional array as stored in a `.npy` file.
#[derive(Debug, PartialEq, Clone)]
pub struct NpyArray {
    shape: Vec<usize>,
    data: NpyData,
}

impl NpyArray {
    /// Create an array, checking that the element count matches the shape.
    ///
    /// # Arguments
    ///
    /// * `shape` - The array dimensions. An empty shape is a scalar.
    /// * `data` - The flat elements in C order.
    pub fn new(shape: Vec<usize>, data: NpyData) -> Result<Self, NpyError> {
        let expected = num_elements(&shape).ok_or_else(|| {
            NpyError::MalformedHeader(format!("shape {shape:?} overflows"))
        })?;
        if expected != data.len() {
            return Err(NpyError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// The array dimensions.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The flat elements.
    pub fn data(&self) -> &NpyData {
        &self.data
    }

    /// The element type.
    pub fn dtype(&self) -> NpyDType {
        self.data.dtype()
    }

    /// Split the array into its shape and data.
    pub fn into_parts(self) -> (Vec<usize>, NpyData) {
        (self.shape, self.data)
    }
}

/// Product of the dimensions, `None` on overflow.
pub(crate) fn num_elements(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}
