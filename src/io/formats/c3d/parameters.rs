// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! C3D parameter section.
//!
//! The section starts with a 4-byte header (`[_, 0x50, block count,
//! processor]`) followed by group and parameter records:
//!
//! ```text
//! i8   name length (negative when locked, 0 ends the section)
//! i8   group id (negative for a group record)
//! ...  name
//! i16  offset of the next record, counted from this field (0 = last)
//! group:     u8 description length, description
//! parameter: i8 type, u8 dimension count, u8 dimensions...,
//!            data, u8 description length, description
//! ```
//!
//! Values map to [`PropertyValue`]: characters become strings (the first
//! dimension is the string length), bytes `Int8`, integers `Int16`, reals
//! `Float32`. Multi-dimensional values become nested arrays whose innermost
//! level is the first dimension. Records with an unknown type code or more
//! than seven dimensions are kept as [`PropertyValue::Opaque`].

use tracing::warn;

use crate::core::{DecodeError, DeviceError, EncodeError, PropertyValue};
use crate::device::{BufferDevice, Device, Endian};
use crate::io::options::C3dProcessor;
use crate::model::{Metadata, MetadataEntry};

use super::constants::{
    BLOCK_SIZE, MAX_DIMENSIONS, PARAMETER_KEY, TYPE_BYTE, TYPE_CHAR, TYPE_FLOAT, TYPE_INT,
};
use super::{seek_to, FORMAT};

/// Text layout of timestamp values, which have no parameter type.
const TIMESTAMP_TEXT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Group of parameters to encode.
#[derive(Debug, Clone, Default)]
pub struct GroupBlock {
    /// Group name
    pub name: String,
    /// Group description
    pub description: String,
    /// Lock flag
    pub locked: bool,
    /// Parameters in order
    pub parameters: Vec<(String, MetadataEntry)>,
}

/// Header of the parameter section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Declared section size in blocks
    pub block_count: u8,
    /// Processor, which fixes the byte order of the whole file
    pub processor: C3dProcessor,
}

fn device_error(context: &str) -> impl Fn(DeviceError) -> DecodeError + '_ {
    move |e| DecodeError::device(FORMAT, context, e)
}

fn trim_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches([' ', '\0'])
        .to_string()
}

/// Read the 4-byte section header at `start`.
pub fn read_section_header(
    device: &mut dyn Device,
    start: u64,
) -> Result<SectionHeader, DecodeError> {
    seek_to(device, start, "parameter section")?;
    let bytes = device
        .read_bytes(4)
        .map_err(device_error("parameter section"))?;
    let processor = C3dProcessor::from_code(bytes[3]).ok_or_else(|| {
        DecodeError::unsupported(
            FORMAT,
            start + 3,
            "parameter section",
            format!("processor type {}", bytes[3]),
        )
    })?;
    Ok(SectionHeader {
        block_count: bytes[2],
        processor,
    })
}

/// Build nested arrays from values in storage order; `dims[0]` varies
/// fastest.
fn nest(items: &[PropertyValue], dims: &[usize]) -> PropertyValue {
    match dims.split_last() {
        None => items.first().cloned().unwrap_or(PropertyValue::Null),
        Some((&outer, inner)) => {
            let stride: usize = inner.iter().product();
            PropertyValue::Array(
                (0..outer)
                    .map(|i| nest(items.get(i * stride..(i + 1) * stride).unwrap_or(&[]), inner))
                    .collect(),
            )
        }
    }
}

/// Map the data of a known type to a value.
pub fn decode_value(type_code: i8, dims: &[usize], data: &[u8], endian: Endian) -> PropertyValue {
    if type_code == TYPE_CHAR {
        let Some((&length, outer)) = dims.split_first() else {
            return PropertyValue::String(trim_text(data));
        };
        let count: usize = outer.iter().product();
        let strings: Vec<PropertyValue> = if length == 0 {
            vec![PropertyValue::String(String::new()); count]
        } else {
            data.chunks(length)
                .map(|c| PropertyValue::String(trim_text(c)))
                .collect()
        };
        if outer.is_empty() {
            return strings
                .into_iter()
                .next()
                .unwrap_or_else(|| PropertyValue::String(String::new()));
        }
        return nest(&strings, outer);
    }

    let width = type_code.unsigned_abs() as usize;
    let scalars: Vec<PropertyValue> = data
        .chunks_exact(width)
        .map(|c| match type_code {
            TYPE_BYTE => PropertyValue::Int8(c[0] as i8),
            TYPE_INT => PropertyValue::Int16(endian.decode_u16(c) as i16),
            _ => PropertyValue::Float32(endian.decode_f32(c)),
        })
        .collect();
    nest(&scalars, dims)
}

struct Record {
    group_id: i8,
    name: String,
    entry: MetadataEntry,
}

/// Read every record of the section starting at `start` into metadata.
///
/// Records are read until a zero name length, a zero next-record offset or
/// the end of the declared section. Parameters referring to a missing
/// group are dropped with a warning.
pub fn read_parameters(
    device: &mut dyn Device,
    start: u64,
    header: SectionHeader,
) -> Result<Metadata, DecodeError> {
    let endian = header.processor.endian();
    let section_end = start + u64::from(header.block_count.max(1)) * BLOCK_SIZE;
    let mut groups: Vec<(i8, String, String, bool)> = Vec::new();
    let mut records: Vec<Record> = Vec::new();
    let mut position = start + 4;

    while position < section_end {
        seek_to(device, position, "parameter record")?;
        let read = device_error("parameter record");
        let name_len = device.read_i8().map_err(&read)?;
        if name_len == 0 {
            break;
        }
        let id = device.read_i8().map_err(&read)?;
        if id == 0 {
            break;
        }
        let name_bytes = device
            .read_bytes(name_len.unsigned_abs() as usize)
            .map_err(&read)?;
        let name = trim_text(&name_bytes);
        let link = device.tell();
        let next = device.read_i16(endian).map_err(&read)?;
        if next < 0 {
            return Err(DecodeError::malformed(
                FORMAT,
                link,
                "parameter record",
                format!("negative offset {next} to the next record"),
            ));
        }
        let next_position = (next > 0).then(|| link + next as u64);
        let body_end = next_position.unwrap_or(section_end);

        if id < 0 {
            let len = device.read_u8().map_err(&read)?;
            let description = trim_text(&device.read_bytes(len as usize).map_err(&read)?);
            groups.push((id.saturating_neg(), name, description, name_len < 0));
        } else {
            let type_code = device.read_i8().map_err(&read)?;
            let ndims = device.read_u8().map_err(&read)?;
            let dims_raw = device.read_bytes(ndims as usize).map_err(&read)?;
            let known = matches!(type_code, TYPE_CHAR | TYPE_BYTE | TYPE_INT | TYPE_FLOAT)
                && dims_raw.len() <= MAX_DIMENSIONS;
            let entry = if known {
                let dims: Vec<usize> = dims_raw.iter().map(|d| *d as usize).collect();
                let count: usize = dims.iter().product();
                let size = type_code.unsigned_abs() as usize * count;
                let data = device.read_bytes(size).map_err(&read)?;
                let len = device.read_u8().map_err(&read)?;
                let description = trim_text(&device.read_bytes(len as usize).map_err(&read)?);
                MetadataEntry::new(decode_value(type_code, &dims, &data, endian))
                    .with_description(description)
            } else {
                let size = body_end.saturating_sub(device.tell());
                let bytes = device
                    .read_bytes(usize::try_from(size).unwrap_or(usize::MAX))
                    .map_err(&read)?;
                MetadataEntry::new(PropertyValue::Opaque {
                    type_code,
                    dims: dims_raw.iter().map(|d| u16::from(*d)).collect(),
                    bytes,
                })
            };
            records.push(Record {
                group_id: id,
                name,
                entry: entry.with_locked(name_len < 0),
            });
        }

        match next_position {
            Some(next) => position = next,
            None => break,
        }
    }

    let metadata = Metadata::new();
    for (_, name, description, locked) in &groups {
        metadata.ensure_group(name);
        if !description.is_empty() {
            metadata.set_group_description(name, description.clone());
        }
        if *locked {
            metadata.set_group_locked(name, true);
        }
    }
    for record in records {
        match groups.iter().find(|(id, ..)| *id == record.group_id) {
            Some((_, group, ..)) => metadata.insert_entry(group, &record.name, record.entry),
            None => warn!(
                context = "c3d",
                parameter = %record.name,
                group_id = record.group_id,
                "Dropping parameter of an undeclared group"
            ),
        }
    }
    Ok(metadata)
}

/// Encoded parameter payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    /// Type code
    pub type_code: i8,
    /// Dimensions, first varying fastest
    pub dims: Vec<u8>,
    /// Data bytes
    pub data: Vec<u8>,
}

fn dimension(value: usize, what: &str) -> Result<u8, String> {
    u8::try_from(value).map_err(|_| format!("{what} of {value} exceeds 255"))
}

/// Shape of a rectangular nested array, outermost first.
fn shape_of(value: &PropertyValue) -> Result<Vec<usize>, String> {
    match value {
        PropertyValue::Array(items) => {
            let mut shape = vec![items.len()];
            if let Some(first) = items.first() {
                let inner = shape_of(first)?;
                for item in &items[1..] {
                    if shape_of(item)? != inner {
                        return Err("ragged array".to_string());
                    }
                }
                shape.extend(inner);
            }
            Ok(shape)
        }
        _ => Ok(Vec::new()),
    }
}

fn flatten<'a>(value: &'a PropertyValue, out: &mut Vec<&'a PropertyValue>) {
    match value {
        PropertyValue::Array(items) => items.iter().for_each(|i| flatten(i, out)),
        leaf => out.push(leaf),
    }
}

fn int16(value: &PropertyValue) -> Result<i16, String> {
    let v = value
        .as_i64()
        .ok_or_else(|| format!("{} value in an integer array", value.type_name()))?;
    i16::try_from(v).map_err(|_| format!("integer {v} does not fit 16 bits"))
}

fn byte_like(value: &PropertyValue) -> bool {
    matches!(
        value,
        PropertyValue::Bool(_) | PropertyValue::Int8(_) | PropertyValue::UInt8(_)
    )
}

fn byte_of(value: &PropertyValue) -> u8 {
    match value {
        PropertyValue::Bool(b) => u8::from(*b),
        PropertyValue::Int8(v) => *v as u8,
        PropertyValue::UInt8(v) => *v,
        _ => 0,
    }
}

fn string_block(strings: &[&str], shape: &[usize]) -> Result<Encoded, String> {
    let width = strings.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut dims = vec![dimension(width, "string length")?];
    for d in shape.iter().rev() {
        dims.push(dimension(*d, "dimension")?);
    }
    let mut data = Vec::with_capacity(width * strings.len());
    for s in strings {
        data.extend_from_slice(s.as_bytes());
        data.resize(data.len() + width - s.len(), b' ');
    }
    Ok(Encoded {
        type_code: TYPE_CHAR,
        dims,
        data,
    })
}

fn real(value: f32, endian: Endian) -> Result<[u8; 4], String> {
    endian
        .encode_f32(value)
        .ok_or_else(|| format!("real {value} in {endian} format"))
}

/// Map a value to a parameter payload.
///
/// Fails with a message naming what the format cannot hold.
pub fn encode_value(value: &PropertyValue, endian: Endian) -> Result<Encoded, String> {
    let scalar = |type_code: i8, data: Vec<u8>| Encoded {
        type_code,
        dims: Vec::new(),
        data,
    };
    match value {
        PropertyValue::Bool(_) | PropertyValue::Int8(_) | PropertyValue::UInt8(_) => {
            Ok(scalar(TYPE_BYTE, vec![byte_of(value)]))
        }
        PropertyValue::Int16(_)
        | PropertyValue::Int32(_)
        | PropertyValue::Int64(_)
        | PropertyValue::UInt16(_)
        | PropertyValue::UInt32(_)
        | PropertyValue::UInt64(_) => {
            let v = int16(value)?;
            Ok(scalar(TYPE_INT, endian.encode_u16(v as u16).to_vec()))
        }
        PropertyValue::Float32(v) => Ok(scalar(TYPE_FLOAT, real(*v, endian)?.to_vec())),
        PropertyValue::Float64(v) => Ok(scalar(TYPE_FLOAT, real(*v as f32, endian)?.to_vec())),
        PropertyValue::String(s) => string_block(&[s.as_str()], &[]),
        PropertyValue::Bytes(bytes) => Ok(Encoded {
            type_code: TYPE_BYTE,
            dims: vec![dimension(bytes.len(), "byte array length")?],
            data: bytes.clone(),
        }),
        PropertyValue::Array(_) => {
            let shape = shape_of(value)?;
            let mut leaves = Vec::new();
            flatten(value, &mut leaves);

            let strings: Option<Vec<&str>> = leaves.iter().map(|l| l.as_str()).collect();
            if let Some(strings) = strings.filter(|s| !s.is_empty()) {
                if shape.len() + 1 > MAX_DIMENSIONS {
                    return Err(format!("{} dimensions", shape.len() + 1));
                }
                return string_block(&strings, &shape);
            }
            if shape.len() > MAX_DIMENSIONS {
                return Err(format!("{} dimensions", shape.len()));
            }
            let dims = shape
                .iter()
                .rev()
                .map(|d| dimension(*d, "dimension"))
                .collect::<Result<Vec<u8>, String>>()?;

            if leaves.iter().any(|l| l.is_float()) {
                let mut data = Vec::with_capacity(leaves.len() * 4);
                for leaf in &leaves {
                    let v = leaf
                        .as_f64()
                        .ok_or_else(|| format!("{} value in a real array", leaf.type_name()))?;
                    data.extend_from_slice(&real(v as f32, endian)?);
                }
                Ok(Encoded {
                    type_code: TYPE_FLOAT,
                    dims,
                    data,
                })
            } else if !leaves.is_empty() && leaves.iter().all(|l| byte_like(l)) {
                Ok(Encoded {
                    type_code: TYPE_BYTE,
                    dims,
                    data: leaves.iter().map(|l| byte_of(l)).collect(),
                })
            } else {
                let mut data = Vec::with_capacity(leaves.len() * 2);
                for leaf in &leaves {
                    data.extend_from_slice(&endian.encode_u16(int16(leaf)? as u16));
                }
                Ok(Encoded {
                    type_code: TYPE_INT,
                    dims,
                    data,
                })
            }
        }
        PropertyValue::Timestamp(nanos) => {
            let text = chrono::DateTime::<chrono::Utc>::from_timestamp_nanos(*nanos)
                .format(TIMESTAMP_TEXT)
                .to_string();
            string_block(&[text.as_str()], &[])
        }
        PropertyValue::Null | PropertyValue::Opaque { .. } => {
            Err(format!("{} value", value.type_name()))
        }
    }
}

fn unrepresentable(context: &str, what: impl Into<String>) -> EncodeError {
    EncodeError::unrepresentable(FORMAT, context.to_string(), what)
}

fn checked_name(name: &str, locked: bool) -> Result<i8, EncodeError> {
    let len = i8::try_from(name.len())
        .ok()
        .filter(|l| *l > 0)
        .ok_or_else(|| {
            unrepresentable(
                "parameters",
                format!("name '{name}' of {} bytes (1 to 127 allowed)", name.len()),
            )
        })?;
    Ok(if locked { -len } else { len })
}

fn checked_description(description: &str, context: &str) -> Result<u8, EncodeError> {
    u8::try_from(description.len()).map_err(|_| {
        unrepresentable(
            context,
            format!("description of {} bytes", description.len()),
        )
    })
}

fn checked_link(size: usize, name: &str) -> Result<i16, EncodeError> {
    i16::try_from(size)
        .map_err(|_| unrepresentable("parameters", format!("parameter '{name}' of {size} bytes")))
}

fn write_record_start(
    out: &mut BufferDevice,
    name: &str,
    locked: bool,
    id: i8,
    link: i16,
    endian: Endian,
) -> Result<(), DeviceError> {
    let len = if locked {
        -(name.len() as i8)
    } else {
        name.len() as i8
    };
    out.write_i8(len)?;
    out.write_i8(id)?;
    out.write_all(name.as_bytes())?;
    out.write_i16(endian, link)
}

/// Encode the whole section, header included, padded to full blocks.
///
/// Groups get ids from 1 in order. The last record links to 0 unless it is
/// opaque; the zero padding then ends the section.
pub fn encode_section(
    groups: &[GroupBlock],
    processor: C3dProcessor,
) -> Result<Vec<u8>, EncodeError> {
    let endian = processor.endian();
    let device_failure = |e: DeviceError| EncodeError::device(FORMAT, "parameters", e);
    let mut out = BufferDevice::writable();
    out.write_all(&[1, PARAMETER_KEY, 0, processor.code()])
        .map_err(device_failure)?;

    let total: usize = groups.iter().map(|g| 1 + g.parameters.len()).sum();
    let mut written = 0usize;
    for (index, group) in groups.iter().enumerate() {
        let id = i8::try_from(index + 1)
            .map_err(|_| unrepresentable("parameters", format!("{} groups", groups.len())))?;
        checked_name(&group.name, group.locked)?;
        let description_len = checked_description(&group.description, "group description")?;
        written += 1;
        let link = if written == total {
            0
        } else {
            checked_link(2 + 1 + group.description.len(), &group.name)?
        };
        write_record_start(&mut out, &group.name, group.locked, -id, link, endian)
            .and_then(|_| out.write_u8(description_len))
            .and_then(|_| out.write_all(group.description.as_bytes()))
            .map_err(device_failure)?;

        for (name, entry) in &group.parameters {
            checked_name(name, entry.locked)?;
            let context = format!("parameter {}:{name}", group.name);
            written += 1;
            let last = written == total;
            match &entry.value {
                PropertyValue::Opaque {
                    type_code,
                    dims,
                    bytes,
                } => {
                    let dims = dims
                        .iter()
                        .map(|d| u8::try_from(*d))
                        .collect::<Result<Vec<u8>, _>>()
                        .map_err(|_| unrepresentable(&context, "opaque dimension above 255"))?;
                    let ndims = u8::try_from(dims.len())
                        .map_err(|_| unrepresentable(&context, "more than 255 dimensions"))?;
                    // Opaque bytes run to the next record, so even the last
                    // one links past itself
                    let link = checked_link(2 + 2 + dims.len() + bytes.len(), name)?;
                    write_record_start(&mut out, name, entry.locked, id, link, endian)
                        .and_then(|_| out.write_i8(*type_code))
                        .and_then(|_| out.write_u8(ndims))
                        .and_then(|_| out.write_all(&dims))
                        .and_then(|_| out.write_all(bytes))
                        .map_err(device_failure)?;
                }
                value => {
                    let encoded =
                        encode_value(value, endian).map_err(|what| unrepresentable(&context, what))?;
                    let description_len = checked_description(&entry.description, &context)?;
                    let link = if last {
                        0
                    } else {
                        checked_link(
                            2 + 2
                                + encoded.dims.len()
                                + encoded.data.len()
                                + 1
                                + entry.description.len(),
                            name,
                        )?
                    };
                    write_record_start(&mut out, name, entry.locked, id, link, endian)
                        .and_then(|_| out.write_i8(encoded.type_code))
                        .and_then(|_| out.write_u8(encoded.dims.len() as u8))
                        .and_then(|_| out.write_all(&encoded.dims))
                        .and_then(|_| out.write_all(&encoded.data))
                        .and_then(|_| out.write_u8(description_len))
                        .and_then(|_| out.write_all(entry.description.as_bytes()))
                        .map_err(device_failure)?;
                }
            }
        }
    }

    let mut bytes = out.into_inner();
    let blocks = (bytes.len() as u64).div_ceil(BLOCK_SIZE).max(1);
    let block_count = u8::try_from(blocks)
        .map_err(|_| unrepresentable("parameters", format!("{blocks} parameter blocks")))?;
    bytes[2] = block_count;
    bytes.resize((blocks * BLOCK_SIZE) as usize, 0);
    Ok(bytes)
}
