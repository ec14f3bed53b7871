use std::path::Path;

use super::{
    array::{num_elements, NpyArray, NpyDType, NpyData},
    NpyError, NPY_MAGIC,
};

/// The fields of the header dictionary that the codec understands.
#[derive(Debug, PartialEq)]
struct NpyHeader {
    dtype: NpyDType,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// A value on the right hand side of the header dictionary.
#[derive(Debug, PartialEq)]
enum HeaderValue {
    Str(String),
    Bool(bool),
    Tuple(Vec<usize>),
}

/// Minimal parser for the Python literal dictionary stored in the header.
struct HeaderReader<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text: text.as_bytes(),
            pos: 0,
        }
    }

    fn malformed(&self, what: &str) -> NpyError {
        NpyError::MalformedHeader(format!("{what} at byte {}", self.pos))
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.text.get(self.pos).copied()
    }

    fn expect(&mut self, c: u8) -> Result<(), NpyError> {
        if self.peek() != Some(c) {
            return Err(self.malformed(&format!("expected '{}'", c as char)));
        }
        self.pos += 1;
        Ok(())
    }

    fn read_str(&mut self) -> Result<String, NpyError> {
        let quote = match self.peek() {
            Some(q @ (b'\'' | b'"')) => q,
            _ => return Err(self.malformed("expected string")),
        };
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.text.len() && self.text[self.pos] != quote {
            self.pos += 1;
        }
        if self.pos >= self.text.len() {
            return Err(self.malformed("unterminated string"));
        }
        let value = String::from_utf8_lossy(&self.text[start..self.pos]).into_owned();
        self.pos += 1;
        Ok(value)
    }

    fn read_word(&mut self) -> &'a [u8] {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_alphanumeric() {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn read_tuple(&mut self) -> Result<Vec<usize>, NpyError> {
        self.expect(b'(')?;
        let mut dims = Vec::new();
        loop {
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    return Ok(dims);
                }
                Some(c) if c.is_ascii_digit() => {
                    let word = self.read_word();
                    let dim = std::str::from_utf8(word)
                        .ok()
                        .and_then(|w| w.parse::<usize>().ok())
                        .ok_or_else(|| self.malformed("invalid shape dimension"))?;
                    dims.push(dim);

                    // each dimension is followed by a separator or the end
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b')') => {}
                        _ => return Err(self.malformed("expected ',' or ')' in shape")),
                    }
                }
                _ => return Err(self.malformed("invalid shape tuple")),
            }
        }
    }

    fn read_value(&mut self) -> Result<HeaderValue, NpyError> {
        match self.peek() {
            Some(b'\'' | b'"') => Ok(HeaderValue::Str(self.read_str()?)),
            Some(b'(') => Ok(HeaderValue::Tuple(self.read_tuple()?)),
            Some(b'T' | b'F') => match self.read_word() {
                b"True" => Ok(HeaderValue::Bool(true)),
                b"False" => Ok(HeaderValue::Bool(false)),
                _ => Err(self.malformed("invalid literal")),
            },
            _ => Err(self.malformed("unexpected value")),
        }
    }

    fn read_dict(&mut self) -> Result<Vec<(String, HeaderValue)>, NpyError> {
        self.expect(b'{')?;
        let mut entries = Vec::new();
        loop {
            if self.peek() == Some(b'}') {
                self.pos += 1;
                break;
            }
            let key = self.read_str()?;
            self.expect(b':')?;
            let value = self.read_value()?;
            entries.push((key, value));
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.malformed("expected ',' or '}'")),
            }
        }
        if self.peek().is_some() {
            return Err(self.malformed("trailing characters"));
        }
        Ok(entries)
    }
}

fn parse_header(text: &str) -> Result<NpyHeader, NpyError> {
    let mut descr = None;
    let mut fortran_order = false;
    let mut shape = None;

    for (key, value) in HeaderReader::new(text).read_dict()? {
        match (key.as_str(), value) {
            ("descr", HeaderValue::Str(s)) => descr = Some(s),
            ("fortran_order", HeaderValue::Bool(b)) => fortran_order = b,
            ("shape", HeaderValue::Tuple(dims)) => shape = Some(dims),
            (key @ ("descr" | "fortran_order" | "shape"), _) => {
                return Err(NpyError::MalformedHeader(format!(
                    "unexpected value type for '{key}'"
                )))
            }
            _ => {}
        }
    }

    let descr = descr.ok_or_else(|| NpyError::MalformedHeader("cannot parse npy dtype".into()))?;
    let shape = shape.ok_or_else(|| NpyError::MalformedHeader("cannot parse npy shape".into()))?;

    Ok(NpyHeader {
        dtype: NpyDType::from_descr(&descr)?,
        fortran_order,
        shape,
    })
}

/// Split a buffer into its header text and payload.
fn split_preamble(bytes: &[u8]) -> Result<(&str, &[u8]), NpyError> {
    if bytes.len() < 8 || &bytes[..6] != NPY_MAGIC {
        return Err(NpyError::InvalidMagic);
    }

    let major = bytes[6];
    let (len_size, header_start) = match major {
        1 => (2, 10),
        2 | 3 => (4, 12),
        _ => return Err(NpyError::UnsupportedVersion(major)),
    };

    let len_bytes = bytes
        .get(8..8 + len_size)
        .ok_or_else(|| NpyError::MalformedHeader("truncated header length".into()))?;
    let header_len = if len_size == 2 {
        u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize
    } else {
        u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize
    };

    let header_end = header_start + header_len;
    let header = bytes
        .get(header_start..header_end)
        .ok_or_else(|| NpyError::MalformedHeader("truncated header".into()))?;
    let header = std::str::from_utf8(header)
        .map_err(|_| NpyError::MalformedHeader("header is not valid text".into()))?;

    Ok((header, &bytes[header_end..]))
}

fn read_elements<T, const N: usize>(payload: &[u8], from_le: impl Fn([u8; N]) -> T) -> Vec<T> {
    payload
        .chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            from_le(bytes)
        })
        .collect()
}

/// Decode an in-memory `.npy` buffer.
///
/// Supports format versions 1.0 (2-byte header length) and 2.0/3.0 (4-byte
/// header length) with little-endian `f4`, `f8`, `u2` and `i4` payloads.
///
/// # Arguments
///
/// * `bytes` - The full contents of a `.npy` file.
///
/// # Returns
///
/// The decoded array with its shape.
///
/// Example:
///
/// ```
/// use lidarlab_io::npy::{decode_npy, encode_npy, NpyArray, NpyData};
///
/// let array = NpyArray::new(vec![2, 2], NpyData::Float64(vec![1.0, 2.0, 3.0, 4.0])).unwrap();
/// let bytes = encode_npy(&array).unwrap();
/// assert_eq!(decode_npy(&bytes).unwrap(), array);
/// ```
pub fn decode_npy(bytes: &[u8]) -> Result<NpyArray, NpyError> {
    let (header, payload) = split_preamble(bytes)?;
    let header = parse_header(header)?;

    if header.fortran_order {
        return Err(NpyError::UnsupportedFortranOrder);
    }

    let expected = num_elements(&header.shape)
        .and_then(|n| n.checked_mul(header.dtype.size()))
        .ok_or_else(|| NpyError::MalformedHeader("shape overflows".into()))?;
    if payload.len() != expected {
        return Err(NpyError::DataSizeMismatch {
            expected,
            actual: payload.len(),
        });
    }

    let data = match header.dtype {
        NpyDType::Float32 => NpyData::Float32(read_elements(payload, f32::from_le_bytes)),
        NpyDType::Float64 => NpyData::Float64(read_elements(payload, f64::from_le_bytes)),
        NpyDType::UInt16 => NpyData::UInt16(read_elements(payload, u16::from_le_bytes)),
        NpyDType::Int32 => NpyData::Int32(read_elements(payload, i32::from_le_bytes)),
    };

    log::debug!(
        "Decoded npy array: shape {:?}, dtype {}",
        header.shape,
        header.dtype.descr()
    );

    NpyArray::new(header.shape, data)
}

/// Read a `.npy` file from disk.
pub fn read_npy(path: impl AsRef<Path>) -> Result<NpyArray, NpyError> {
    let bytes = std::fs::read(path)?;
    decode_npy(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_buffer(header: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_parse_header_basic() {
        let header =
            parse_header("{'descr': '<f8', 'fortran_order': False, 'shape': (3, 9), }    \n")
                .unwrap();
        assert_eq!(header.dtype, NpyDType::Float64);
        assert!(!header.fortran_order);
        assert_eq!(header.shape, vec![3, 9]);
    }

    #[test]
    fn test_parse_header_shapes() {
        let one_d = parse_header("{'descr': '<u2', 'shape': (5,)}").unwrap();
        assert_eq!(one_d.shape, vec![5]);

        let trailing = parse_header("{'descr': '<u2', 'shape': (3, 9,)}").unwrap();
        assert_eq!(trailing.shape, vec![3, 9]);

        let scalar = parse_header("{'descr': '<i4', 'shape': ()}").unwrap();
        assert!(scalar.shape.is_empty());

        let double_quoted = parse_header("{\"descr\": \"<f4\", \"shape\": (0, 9)}").unwrap();
        assert_eq!(double_quoted.shape, vec![0, 9]);
    }

    #[test]
    fn test_parse_header_errors() {
        assert!(matches!(
            parse_header("{'shape': (3, 9)}"),
            Err(NpyError::MalformedHeader(_))
        ));
        assert!(matches!(
            parse_header("{'descr': '<f8'}"),
            Err(NpyError::MalformedHeader(_))
        ));
        assert!(matches!(
            parse_header("{'descr': '<c16', 'shape': (3,)}"),
            Err(NpyError::UnsupportedDtype(_))
        ));
        assert!(parse_header("{'descr': '<f8', 'shape': (3, x)}").is_err());
        for shape in ["(3 9)", "(3,,9)", "(,)", "(,3)", "(3,,)", "(3", "(3, 9"] {
            let header = format!("{{'descr': '<f8', 'shape': {shape}}}");
            assert!(
                matches!(parse_header(&header), Err(NpyError::MalformedHeader(_))),
                "accepted shape {shape}"
            );
        }
        assert!(parse_header("'descr': '<f8'").is_err());
    }

    #[test]
    fn test_decode_v1() {
        let mut payload = Vec::new();
        for v in [1.5f32, -2.0, 3.25] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        let bytes = v1_buffer("{'descr': '<f4', 'fortran_order': False, 'shape': (3,), }\n", &payload);

        let array = decode_npy(&bytes).unwrap();
        assert_eq!(array.shape(), &[3]);
        assert_eq!(array.data(), &NpyData::Float32(vec![1.5, -2.0, 3.25]));
    }

    #[test]
    fn test_decode_v2() {
        let header = "{'descr': '<u2', 'fortran_order': False, 'shape': (2, 2), }\n";
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[2, 0]);
        bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        for v in [1u16, 2, 3, 65535] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let array = decode_npy(&bytes).unwrap();
        assert_eq!(array.shape(), &[2, 2]);
        assert_eq!(array.data(), &NpyData::UInt16(vec![1, 2, 3, 65535]));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        assert!(matches!(
            decode_npy(b"NOTNUMPY\x00\x00"),
            Err(NpyError::InvalidMagic)
        ));
        assert!(matches!(decode_npy(b"\x93NUM"), Err(NpyError::InvalidMagic)));
    }

    #[test]
    fn test_decode_rejects_bad_version() {
        let mut bytes = v1_buffer("{'descr': '<f8', 'shape': (0,)}", &[]);
        bytes[6] = 7;
        assert!(matches!(
            decode_npy(&bytes),
            Err(NpyError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_decode_rejects_fortran_order() {
        let bytes = v1_buffer(
            "{'descr': '<i4', 'fortran_order': True, 'shape': (1,)}",
            &7i32.to_le_bytes(),
        );
        assert!(matches!(
            decode_npy(&bytes),
            Err(NpyError::UnsupportedFortranOrder)
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let bytes = v1_buffer("{'descr': '<f8', 'shape': (2,)}", &1.0f64.to_le_bytes());
        assert!(matches!(
            decode_npy(&bytes),
            Err(NpyError::DataSizeMismatch {
                expected: 16,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_header() {
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&200u16.to_le_bytes());
        bytes.extend_from_slice(b"{'descr': '<f8'");
        assert!(matches!(
            decode_npy(&bytes),
            Err(NpyError::MalformedHeader(_))
        ));
    }
}
