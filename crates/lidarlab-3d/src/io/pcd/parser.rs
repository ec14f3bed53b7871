use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::Path;

use super::PcdError;

const MAX_POINT_STEP: usize = 1024;
const MAX_POINTS: usize = 50_000_000;

/// Encoding of the point records after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PcdEncoding {
    Ascii,
    Binary,
}

/// Describes a single field in a PCD point record
#[derive(Debug)]
struct PcdField {
    offset: usize, // byte offset within a binary record
    column: usize, // value index within an ascii record
}

#[derive(Debug)]
struct PcdLayout {
    fields: HashMap<String, PcdField>,
    point_step: usize,  // total bytes per binary record
    num_values: usize,  // total values per ascii record
    num_points: usize,
    encoding: PcdEncoding,
}

impl PcdLayout {
    fn get_field(&self, name: &str) -> Result<&PcdField, PcdError> {
        self.fields
            .get(name)
            .ok_or_else(|| PcdError::UnsupportedProperty(format!("missing field {name}")))
    }
}

/// Read a little-endian f32 from a byte buffer
#[inline]
fn read_f32(buf: &[u8], offset: usize) -> Result<f32, PcdError> {
    let slice = buf
        .get(offset..offset + 4)
        .ok_or(PcdError::MalformedHeader)?;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(slice);
    Ok(f32::from_le_bytes(bytes))
}

fn parse_usize_list<'a>(it: impl Iterator<Item = &'a str>) -> Result<Vec<usize>, PcdError> {
    it.map(|v| v.parse::<usize>().map_err(|_| PcdError::MalformedHeader))
        .collect()
}

fn parse_pcd_layout<R: BufRead>(reader: &mut R) -> Result<PcdLayout, PcdError> {
    let mut field_names: Vec<String> = Vec::new();
    let mut sizes = Vec::new();
    let mut types = Vec::new();
    let mut counts = Vec::new();
    let mut points = 0usize;

    let encoding = loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Err(PcdError::MalformedHeader);
        }
        let line = line.trim();

        let mut it = line.split_whitespace();
        match it.next() {
            Some("DATA") => match it.next() {
                Some("binary") => break PcdEncoding::Binary,
                Some("ascii") => break PcdEncoding::Ascii,
                other => {
                    return Err(PcdError::UnsupportedProperty(format!(
                        "DATA {}",
                        other.unwrap_or_default()
                    )))
                }
            },
            Some("SIZE") => sizes = parse_usize_list(it)?,
            Some("TYPE") => {
                types = it
                    .map(|v| v.chars().next().ok_or(PcdError::MalformedHeader))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            Some("COUNT") => counts = parse_usize_list(it)?,
            Some("POINTS") => {
                let token = it.next().ok_or(PcdError::MalformedHeader)?;
                points = token
                    .parse::<usize>()
                    .map_err(|_| PcdError::MalformedHeader)?;
            }
            Some("FIELDS") => field_names = it.map(String::from).collect(),
            _ => {}
        }
    };

    if field_names.is_empty()
        || sizes.len() != field_names.len()
        || types.len() != field_names.len()
        || (!counts.is_empty() && counts.len() != field_names.len())
    {
        return Err(PcdError::MalformedHeader);
    }

    let mut offset = 0usize;
    let mut column = 0usize;
    let mut fields = HashMap::new();

    for (i, name) in field_names.iter().enumerate() {
        // COUNT defaults to 1 when omitted
        let count = counts.get(i).copied().unwrap_or(1);
        let size = sizes[i];

        if matches!(name.as_str(), "x" | "y" | "z") && !(size == 4 && count == 1 && types[i] == 'F')
        {
            return Err(PcdError::UnsupportedProperty(format!(
                "field {name} must be a single 4-byte float"
            )));
        }

        if fields.contains_key(name) {
            return Err(PcdError::MalformedHeader);
        }
        fields.insert(name.clone(), PcdField { offset, column });

        let field_bytes = size.checked_mul(count).ok_or(PcdError::MalformedHeader)?;
        offset = offset
            .checked_add(field_bytes)
            .ok_or(PcdError::MalformedHeader)?;
        column += count;

        if offset > MAX_POINT_STEP {
            return Err(PcdError::MalformedHeader);
        }
    }

    Ok(PcdLayout {
        fields,
        point_step: offset,
        num_values: column,
        num_points: points,
        encoding,
    })
}

fn read_binary_points<R: Read>(
    reader: &mut R,
    layout: &PcdLayout,
    xyz: [usize; 3],
) -> Result<Vec<[f32; 3]>, PcdError> {
    if layout.point_step == 0 {
        return Err(PcdError::MalformedHeader);
    }

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;

    let records = payload.chunks_exact(layout.point_step);
    if records.len() < layout.num_points {
        return Err(PcdError::Truncated {
            expected: layout.num_points,
            actual: records.len(),
        });
    }

    records
        .take(layout.num_points)
        .map(|record| {
            Ok([
                read_f32(record, xyz[0])?,
                read_f32(record, xyz[1])?,
                read_f32(record, xyz[2])?,
            ])
        })
        .collect()
}

fn read_ascii_points<R: BufRead>(
    reader: &mut R,
    layout: &PcdLayout,
    xyz: [usize; 3],
) -> Result<Vec<[f32; 3]>, PcdError> {
    let mut points = Vec::with_capacity(layout.num_points);

    for line in reader.lines() {
        if points.len() == layout.num_points {
            break;
        }
        let line = line?;
        let values = line.split_whitespace().collect::<Vec<_>>();
        if values.is_empty() {
            continue;
        }
        if values.len() < layout.num_values {
            return Err(PcdError::InvalidValue(line));
        }

        let mut point = [0f32; 3];
        for (p, &column) in point.iter_mut().zip(xyz.iter()) {
            *p = values[column]
                .parse::<f32>()
                .map_err(|_| PcdError::InvalidValue(values[column].to_string()))?;
        }
        points.push(point);
    }

    if points.len() < layout.num_points {
        return Err(PcdError::Truncated {
            expected: layout.num_points,
            actual: points.len(),
        });
    }
    Ok(points)
}

fn read_pcd_points<R: BufRead>(reader: &mut R) -> Result<Vec<[f32; 3]>, PcdError> {
    let layout = parse_pcd_layout(reader)?;

    if layout.num_points == 0 || layout.num_points > MAX_POINTS {
        return Err(PcdError::MalformedHeader);
    }

    let (x, y, z) = (
        layout.get_field("x")?,
        layout.get_field("y")?,
        layout.get_field("z")?,
    );

    match layout.encoding {
        PcdEncoding::Binary => {
            read_binary_points(reader, &layout, [x.offset, y.offset, z.offset])
        }
        PcdEncoding::Ascii => read_ascii_points(reader, &layout, [x.column, y.column, z.column]),
    }
}

/// Decode the positions of a PCD point cloud.
///
/// Only the `x y z` fields are read; other fields are skipped. A header
/// declaring zero points is rejected.
///
/// # Arguments
/// * `bytes` - The content of a `.pcd` file with `DATA binary` or `DATA ascii`.
///
/// # Returns
/// One position per point, in file order.
pub fn decode_pcd(bytes: &[u8]) -> Result<Vec<[f32; 3]>, PcdError> {
    let mut reader = std::io::Cursor::new(bytes);
    read_pcd_points(&mut reader)
}

/// Read the positions of a PCD file.
///
/// # Arguments
/// * `path` - Path to a `.pcd` file.
pub fn read_pcd(path: impl AsRef<Path>) -> Result<Vec<[f32; 3]>, PcdError> {
    let Some(file_ext) = path.as_ref().extension() else {
        return Err(PcdError::InvalidFileExtension("".into()));
    };

    if file_ext != "pcd" {
        return Err(PcdError::InvalidFileExtension(
            file_ext.to_string_lossy().to_string(),
        ));
    }

    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    read_pcd_points(&mut reader)
}
