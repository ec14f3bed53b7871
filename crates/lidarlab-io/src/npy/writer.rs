use std::path::Path;

use super::{
    array::{NpyArray, NpyData},
    NpyError, NPY_HEADER_ALIGNMENT, NPY_MAGIC,
};

/// Format a shape the way Python prints a tuple: `()`, `(5,)`, `(3, 9)`.
fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [d] => format!("({d},)"),
        dims => {
            let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", dims.join(", "))
        }
    }
}

/// Build the padded header text for the given preamble size.
fn padded_header(dict: &str, preamble: usize) -> String {
    // one extra byte for the terminating newline
    let unpadded = preamble + dict.len() + 1;
    let total = unpadded.div_ceil(NPY_HEADER_ALIGNMENT) * NPY_HEADER_ALIGNMENT;
    let mut header = String::with_capacity(total - preamble);
    header.push_str(dict);
    header.extend(std::iter::repeat(' ').take(total - unpadded));
    header.push('\n');
    header
}

fn write_elements(bytes: &mut Vec<u8>, data: &NpyData) {
    match data {
        NpyData::Float32(v) => v.iter().for_each(|x| bytes.extend_from_slice(&x.to_le_bytes())),
        NpyData::Float64(v) => v.iter().for_each(|x| bytes.extend_from_slice(&x.to_le_bytes())),
        NpyData::UInt16(v) => v.iter().for_each(|x| bytes.extend_from_slice(&x.to_le_bytes())),
        NpyData::Int32(v) => v.iter().for_each(|x| bytes.extend_from_slice(&x.to_le_bytes())),
    }
}

/// Encode an array as an in-memory `.npy` buffer.
///
/// The header is written as format version 1.0 when its length fits in two
/// bytes, otherwise as version 2.0. The preamble is padded with spaces to a
/// multiple of 16 bytes and terminated with a newline.
///
/// # Arguments
///
/// * `array` - The array to encode. Its dtype selects the `descr` code.
///
/// # Returns
///
/// The bytes of a complete `.npy` file.
pub fn encode_npy(array: &NpyArray) -> Result<Vec<u8>, NpyError> {
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        array.dtype().descr(),
        shape_literal(array.shape())
    );

    // magic + version pair + header length field
    let mut version = 1u8;
    let mut header = padded_header(&dict, NPY_MAGIC.len() + 2 + 2);
    if header.len() > u16::MAX as usize {
        version = 2;
        header = padded_header(&dict, NPY_MAGIC.len() + 2 + 4);
    }
    let header_len = u32::try_from(header.len())
        .map_err(|_| NpyError::MalformedHeader("header too large".into()))?;

    let payload_len = array.data().len() * array.dtype().size();
    let mut bytes = Vec::with_capacity(NPY_MAGIC.len() + 6 + header.len() + payload_len);
    bytes.extend_from_slice(NPY_MAGIC);
    bytes.extend_from_slice(&[version, 0]);
    if version == 1 {
        bytes.extend_from_slice(&(header_len as u16).to_le_bytes());
    } else {
        bytes.extend_from_slice(&header_len.to_le_bytes());
    }
    bytes.extend_from_slice(header.as_bytes());
    write_elements(&mut bytes, array.data());

    Ok(bytes)
}

/// Write an array to a `.npy` file on disk.
pub fn write_npy(path: impl AsRef<Path>, array: &NpyArray) -> Result<(), NpyError> {
    let bytes = encode_npy(array)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npy::{decode_npy, read_npy, NpyDType};

    #[test]
    fn test_shape_literal() {
        assert_eq!(shape_literal(&[]), "()");
        assert_eq!(shape_literal(&[5]), "(5,)");
        assert_eq!(shape_literal(&[3, 9]), "(3, 9)");
    }

    #[test]
    fn test_header_alignment() -> Result<(), NpyError> {
        for rows in [0usize, 1, 7, 123_456] {
            let array = NpyArray::new(vec![rows, 9], NpyData::Float64(vec![0.0; rows * 9]))?;
            let bytes = encode_npy(&array)?;
            let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
            assert_eq!((10 + header_len) % NPY_HEADER_ALIGNMENT, 0);
            assert_eq!(bytes[10 + header_len - 1], b'\n');
            assert_eq!(bytes.len(), 10 + header_len + rows * 9 * 8);
        }
        Ok(())
    }

    #[test]
    fn test_roundtrip_all_dtypes() -> Result<(), NpyError> {
        let arrays = [
            NpyArray::new(vec![2, 9], NpyData::Float32((0..18).map(|i| i as f32 * 0.5).collect()))?,
            NpyArray::new(vec![2, 9], NpyData::Float64((0..18).map(|i| i as f64 / 3.0).collect()))?,
            NpyArray::new(vec![2, 9], NpyData::UInt16((0..18).map(|i| i * 3000).collect()))?,
            NpyArray::new(vec![2, 9], NpyData::Int32((0..18).map(|i| i - 9).collect()))?,
        ];
        for array in arrays {
            let decoded = decode_npy(&encode_npy(&array)?)?;
            assert_eq!(decoded, array);
        }
        Ok(())
    }

    #[test]
    fn test_roundtrip_empty() -> Result<(), NpyError> {
        let array = NpyArray::new(vec![0, 9], NpyData::Float64(vec![]))?;
        let decoded = decode_npy(&encode_npy(&array)?)?;
        assert_eq!(decoded.shape(), &[0, 9]);
        assert!(decoded.data().is_empty());
        assert_eq!(decoded.dtype(), NpyDType::Float64);
        Ok(())
    }

    #[test]
    fn test_metadata_example_roundtrip() -> Result<(), NpyError> {
        let mut values = vec![0.0f64; 27];
        values[7] = 1.0;
        values[8] = 2.0;
        let array = NpyArray::new(vec![3, 9], NpyData::Float64(values))?;

        let first = decode_npy(&encode_npy(&array)?)?;
        let second = decode_npy(&encode_npy(&first)?)?;

        assert_eq!(second.shape(), &[3, 9]);
        assert_eq!(second, array);
        Ok(())
    }

    #[test]
    fn test_write_read_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("meta.npy");
        let array = NpyArray::new(vec![4], NpyData::Int32(vec![1, -2, 3, -4]))?;

        write_npy(&path, &array)?;
        let decoded = read_npy(&path)?;

        assert_eq!(decoded, array);
        Ok(())
    }
}
