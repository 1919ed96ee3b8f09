// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! C3D encoding.
//!
//! Everything is encoded in memory first, so a trial the format cannot hold
//! is rejected before the first byte reaches the device.

use tracing::debug;

use crate::core::{DeviceError, EncodeError, ModelError, PropertyValue};
use crate::device::{Device, Endian};
use crate::io::options::{C3dOptions, C3dStorage};
use crate::model::{Analog, Metadata, MetadataEntry, Point, PointKind, Trial};

use super::constants::{
    is_managed, BLOCK_SIZE, GROUP_ANALOG, GROUP_EVENT, GROUP_POINT, GROUP_TRIAL,
    MAX_HEADER_EVENTS, PARAMETER_BLOCK,
};
use super::header::{Header, HeaderEvent};
use super::parameters::{encode_section, GroupBlock};
use super::FORMAT;

/// Entries per `LABELS`/`DESCRIPTIONS` parameter before spilling into
/// `LABELS2`, `LABELS3`...
const LABELS_PER_PARAMETER: usize = 255;

fn unrepresentable(context: &str, what: impl Into<String>) -> EncodeError {
    EncodeError::unrepresentable(FORMAT, context.to_string(), what)
}

fn device_failure(context: &'static str) -> impl Fn(DeviceError) -> EncodeError {
    move |e| EncodeError::device_write(FORMAT, context, e)
}

fn strings(values: impl IntoIterator<Item = String>) -> PropertyValue {
    PropertyValue::Array(values.into_iter().map(PropertyValue::String).collect())
}

fn reals(values: impl IntoIterator<Item = f64>) -> PropertyValue {
    PropertyValue::Array(
        values
            .into_iter()
            .map(|v| PropertyValue::Float32(v as f32))
            .collect(),
    )
}

fn int16(value: i64, context: &str) -> Result<PropertyValue, EncodeError> {
    i16::try_from(value)
        .map(PropertyValue::Int16)
        .map_err(|_| unrepresentable(context, format!("{value} does not fit a 16-bit integer")))
}

/// `LABELS`, `LABELS2`... holding at most 255 entries each.
fn numbered(prefix: &str, values: Vec<String>) -> Vec<(String, PropertyValue)> {
    if values.is_empty() {
        return vec![(prefix.to_string(), strings(Vec::new()))];
    }
    values
        .chunks(LABELS_PER_PARAMETER)
        .enumerate()
        .map(|(i, chunk)| {
            let name = if i == 0 {
                prefix.to_string()
            } else {
                format!("{prefix}{}", i + 1)
            };
            (name, strings(chunk.to_vec()))
        })
        .collect()
}

/// Frame number split into two unsigned 16-bit words, stored as signed.
fn split_field(frame: u32) -> PropertyValue {
    PropertyValue::Array(vec![
        PropertyValue::Int16((frame & 0xFFFF) as u16 as i16),
        PropertyValue::Int16((frame >> 16) as u16 as i16),
    ])
}

/// Sample layout of the data section.
struct Layout {
    endian: Endian,
    storage: C3dStorage,
    /// `POINT:SCALE`, negative for real storage
    scale: f64,
}

impl Layout {
    fn new(options: &C3dOptions) -> Result<Self, EncodeError> {
        let magnitude = f64::from(options.integer_point_scale).abs();
        if !magnitude.is_finite() || magnitude == 0.0 {
            return Err(unrepresentable(
                "options",
                format!("point scale {}", options.integer_point_scale),
            ));
        }
        let scale = match options.storage {
            C3dStorage::Float => -magnitude,
            C3dStorage::Integer => magnitude,
        };
        Ok(Self {
            endian: options.processor.endian(),
            storage: options.storage,
            scale,
        })
    }

    fn put_real(&self, out: &mut Vec<u8>, value: f64, label: &str) -> Result<(), EncodeError> {
        let bytes = self.endian.encode_f32(value as f32).ok_or_else(|| {
            unrepresentable(
                "frames",
                format!("value {value} of '{label}' as a {} real", self.endian),
            )
        })?;
        out.extend_from_slice(&bytes);
        Ok(())
    }

    fn put_int(&self, out: &mut Vec<u8>, value: i16) {
        out.extend_from_slice(&self.endian.encode_u16(value as u16));
    }

    /// Stored 16-bit value of `value`, rounded.
    fn quantize(value: f64, context: &str, what: &str) -> Result<i16, EncodeError> {
        let rounded = value.round();
        if !(f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&rounded) {
            return Err(unrepresentable(
                context,
                format!("{what} {value} exceeds the 16-bit integer range"),
            ));
        }
        Ok(rounded as i16)
    }

    /// Residual word: camera mask in the high byte, residual over
    /// `|scale|` in the low byte; `-1` for invalid frames.
    fn residual_word(&self, residual: f64, mask: u16, label: &str) -> Result<i16, EncodeError> {
        if residual < 0.0 {
            return Ok(-1);
        }
        if mask > 0x7F {
            return Err(unrepresentable(
                "points",
                format!("camera mask {mask:#x} of point '{label}' exceeds 7 bits"),
            ));
        }
        let steps = (residual / self.scale.abs()).round();
        if steps > 255.0 {
            return Err(unrepresentable(
                "points",
                format!("residual {residual} of point '{label}' exceeds 255 scale steps"),
            ));
        }
        Ok(((mask << 8) | steps as u16) as i16)
    }

    fn put_point(
        &self,
        out: &mut Vec<u8>,
        xyz: [f64; 3],
        word: i16,
        label: &str,
    ) -> Result<(), EncodeError> {
        let xyz = if word < 0 { [0.0; 3] } else { xyz };
        match self.storage {
            C3dStorage::Float => {
                for value in xyz {
                    self.put_real(out, value, label)?;
                }
                self.put_real(out, f64::from(word), label)?;
            }
            C3dStorage::Integer => {
                for value in xyz {
                    let context = format!("point '{label}'");
                    let raw = Self::quantize(value / self.scale, &context, "coordinate")?;
                    self.put_int(out, raw);
                }
                self.put_int(out, word);
            }
        }
        Ok(())
    }

    fn put_analog(&self, out: &mut Vec<u8>, raw: f64, label: &str) -> Result<(), EncodeError> {
        match self.storage {
            C3dStorage::Float => self.put_real(out, raw, label)?,
            C3dStorage::Integer => {
                let context = format!("analog '{label}'");
                let raw = Self::quantize(raw, &context, "stored value")?;
                self.put_int(out, raw);
            }
        }
        Ok(())
    }
}

/// Frame data of every point, one buffer per point.
struct PointColumn {
    label: String,
    coords: Vec<[f64; 3]>,
    words: Vec<i16>,
}

fn point_columns(points: &[Point], layout: &Layout) -> Result<Vec<PointColumn>, EncodeError> {
    points
        .iter()
        .map(|point| {
            let label = point.label();
            let words = point
                .residuals()
                .into_iter()
                .zip(point.masks())
                .map(|(residual, mask)| layout.residual_word(residual, mask, &label))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PointColumn {
                coords: point.coords(),
                words,
                label,
            })
        })
        .collect()
}

fn encode_frames(
    trial: &Trial,
    points: &[Point],
    analogs: &[Analog],
    layout: &Layout,
) -> Result<Vec<u8>, EncodeError> {
    let frames = trial.frame_count();
    let ratio = trial.analog_ratio() as usize;
    let columns = point_columns(points, layout)?;
    let raw: Vec<(String, Vec<f64>)> = analogs
        .iter()
        .map(|a| (a.label(), a.raw_samples()))
        .collect();

    let short_point = columns
        .iter()
        .find(|c| c.coords.len() != frames || c.words.len() != frames)
        .map(|c| (c.label.clone(), c.coords.len(), frames));
    let short_analog = raw
        .iter()
        .find(|(_, samples)| samples.len() != frames * ratio)
        .map(|(label, samples)| (label.clone(), samples.len(), frames * ratio));
    if let Some((label, found, expected)) = short_point.or(short_analog) {
        return Err(EncodeError::model(
            FORMAT,
            ModelError::inconsistent(format!("'{label}' holds {found} values, expected {expected}")),
        ));
    }

    let width = match layout.storage {
        C3dStorage::Float => 4,
        C3dStorage::Integer => 2,
    };
    let mut out = Vec::with_capacity(frames * (points.len() * 4 + analogs.len() * ratio) * width);
    for frame in 0..frames {
        for column in &columns {
            layout.put_point(
                &mut out,
                column.coords[frame],
                column.words[frame],
                &column.label,
            )?;
        }
        for s in 0..ratio {
            for (label, samples) in &raw {
                layout.put_analog(&mut out, samples[frame * ratio + s], label)?;
            }
        }
    }
    Ok(out)
}

/// Managed `POINT` parameters.
fn point_parameters(
    trial: &Trial,
    points: &[Point],
    layout: &Layout,
    data_start: u16,
) -> Result<Vec<(String, PropertyValue)>, EncodeError> {
    let frames = trial.frame_count();
    let mut parameters = vec![
        ("USED".to_string(), int16(points.len() as i64, "POINT:USED")?),
        (
            "FRAMES".to_string(),
            match i16::try_from(frames) {
                Ok(frames) => PropertyValue::Int16(frames),
                Err(_) => PropertyValue::Float32(frames as f32),
            },
        ),
        (
            "SCALE".to_string(),
            PropertyValue::Float32(layout.scale as f32),
        ),
        (
            "RATE".to_string(),
            PropertyValue::Float32(trial.point_rate() as f32),
        ),
        (
            "DATA_START".to_string(),
            int16(i64::from(data_start), "POINT:DATA_START")?,
        ),
    ];
    parameters.extend(numbered("LABELS", points.iter().map(|p| p.label()).collect()));
    parameters.extend(numbered(
        "DESCRIPTIONS",
        points.iter().map(|p| p.description()).collect(),
    ));

    let units = trial.units();
    for (name, unit) in [
        ("UNITS", &units.marker),
        ("ANGLE_UNITS", &units.angle),
        ("FORCE_UNITS", &units.force),
        ("MOMENT_UNITS", &units.moment),
        ("POWER_UNITS", &units.power),
        ("SCALAR_UNITS", &units.scalar),
    ] {
        parameters.push((name.to_string(), PropertyValue::String(unit.clone())));
    }

    for (name, kind) in [
        ("ANGLES", PointKind::Angle),
        ("FORCES", PointKind::Force),
        ("MOMENTS", PointKind::Moment),
        ("POWERS", PointKind::Power),
        ("SCALARS", PointKind::Scalar),
        ("REACTIONS", PointKind::Reaction),
    ] {
        let labels: Vec<String> = points
            .iter()
            .filter(|p| p.kind() == kind)
            .map(|p| p.label())
            .collect();
        if !labels.is_empty() {
            parameters.push((name.to_string(), strings(labels)));
        }
    }
    Ok(parameters)
}

/// Managed `ANALOG` parameters.
fn analog_parameters(
    trial: &Trial,
    analogs: &[Analog],
) -> Result<Vec<(String, PropertyValue)>, EncodeError> {
    let offsets = analogs
        .iter()
        .map(|a| int16(i64::from(a.offset()), &format!("analog '{}' offset", a.label())))
        .collect::<Result<Vec<_>, _>>()?;
    let mut parameters = vec![(
        "USED".to_string(),
        int16(analogs.len() as i64, "ANALOG:USED")?,
    )];
    parameters.extend(numbered("LABELS", analogs.iter().map(|a| a.label()).collect()));
    parameters.extend(numbered(
        "DESCRIPTIONS",
        analogs.iter().map(|a| a.description()).collect(),
    ));
    parameters.extend([
        ("SCALE".to_string(), reals(analogs.iter().map(|a| a.scale()))),
        ("GEN_SCALE".to_string(), PropertyValue::Float32(1.0)),
        ("OFFSET".to_string(), PropertyValue::Array(offsets)),
        ("UNITS".to_string(), strings(analogs.iter().map(|a| a.unit()))),
        (
            "RATE".to_string(),
            PropertyValue::Float32(trial.analog_rate() as f32),
        ),
        (
            "GAIN".to_string(),
            PropertyValue::Array(
                analogs
                    .iter()
                    .map(|a| PropertyValue::Int16(i16::from(a.gain().code())))
                    .collect(),
            ),
        ),
        ("FORMAT".to_string(), PropertyValue::String("SIGNED".to_string())),
    ]);
    Ok(parameters)
}

/// Event times in seconds, in trial order.
fn event_seconds(trial: &Trial) -> Result<Vec<f64>, EncodeError> {
    let rate = trial.point_rate();
    trial
        .events()
        .map(|event| {
            event.time().seconds(rate).ok_or_else(|| {
                unrepresentable(
                    "events",
                    format!(
                        "event '{}' at {} needs a point rate",
                        event.label(),
                        event.time()
                    ),
                )
            })
        })
        .collect()
}

/// Managed `EVENT` parameters.
fn event_parameters(trial: &Trial, seconds: &[f64]) -> Result<Vec<(String, PropertyValue)>, EncodeError> {
    let events: Vec<_> = trial.events().collect();
    let times = seconds
        .iter()
        .map(|t| {
            let minutes = (t / 60.0).floor();
            reals([minutes, t - minutes * 60.0])
        })
        .collect();
    Ok(vec![
        ("USED".to_string(), int16(events.len() as i64, "EVENT:USED")?),
        ("LABELS".to_string(), strings(events.iter().map(|e| e.label()))),
        (
            "CONTEXTS".to_string(),
            strings(events.iter().map(|e| e.context())),
        ),
        (
            "DESCRIPTIONS".to_string(),
            strings(events.iter().map(|e| e.description().unwrap_or_default())),
        ),
        (
            "SUBJECTS".to_string(),
            strings(events.iter().map(|e| e.subject().unwrap_or_default())),
        ),
        ("TIMES".to_string(), PropertyValue::Array(times)),
    ])
}

fn group_block(metadata: &Metadata, name: &str, managed: Vec<(String, PropertyValue)>) -> GroupBlock {
    let mut parameters: Vec<(String, MetadataEntry)> = managed
        .into_iter()
        .map(|(n, v)| (n, MetadataEntry::new(v)))
        .collect();
    if metadata.group(name).is_some() {
        parameters.extend(
            metadata
                .entries(name)
                .into_iter()
                .filter(|(n, _)| !is_managed(name, n)),
        );
    }
    GroupBlock {
        name: metadata
            .group(name)
            .map_or_else(|| name.to_string(), |g| g.name()),
        description: metadata.group_description(name).unwrap_or_default(),
        locked: metadata.group_locked(name),
        parameters,
    }
}

/// Managed parameters of every group, in metadata order with the model
/// groups appended when missing.
fn parameter_groups(
    trial: &Trial,
    points: &[Point],
    analogs: &[Analog],
    seconds: &[f64],
    layout: &Layout,
    data_start: u16,
) -> Result<Vec<GroupBlock>, EncodeError> {
    let metadata = trial.metadata();
    let first = trial.first_frame();
    let last = trial.last_frame();

    let mut managed: Vec<(&str, Vec<(String, PropertyValue)>)> = vec![
        (
            GROUP_POINT,
            point_parameters(trial, points, layout, data_start)?,
        ),
        (GROUP_ANALOG, analog_parameters(trial, analogs)?),
    ];
    if !seconds.is_empty() || metadata.group(GROUP_EVENT).is_some() {
        managed.push((GROUP_EVENT, event_parameters(trial, seconds)?));
    }
    if first > u32::from(u16::MAX) || last > u32::from(u16::MAX) {
        managed.push((
            GROUP_TRIAL,
            vec![
                ("ACTUAL_START_FIELD".to_string(), split_field(first)),
                ("ACTUAL_END_FIELD".to_string(), split_field(last)),
            ],
        ));
    } else if metadata.group(GROUP_TRIAL).is_some() {
        managed.push((GROUP_TRIAL, Vec::new()));
    }

    let mut groups = Vec::new();
    for group in metadata.groups() {
        let name = group.name();
        let own = managed
            .iter()
            .position(|(g, _)| g.eq_ignore_ascii_case(&name))
            .map(|i| managed.remove(i).1)
            .unwrap_or_default();
        groups.push(group_block(&metadata, &name, own));
    }
    for (name, own) in managed {
        groups.push(group_block(&metadata, name, own));
    }
    Ok(groups)
}

/// Encode `trial` as a C3D file.
pub fn write_trial(
    device: &mut dyn Device,
    trial: &Trial,
    options: &C3dOptions,
) -> Result<(), EncodeError> {
    let layout = Layout::new(options)?;
    trial
        .check_consistency()
        .map_err(|e| EncodeError::model(FORMAT, e))?;
    let points: Vec<Point> = trial.points().collect();
    let analogs: Vec<Analog> = trial.analogs().collect();

    let point_count = u16::try_from(points.len())
        .map_err(|_| unrepresentable("points", format!("{} points", points.len())))?;
    let ratio = u16::try_from(trial.analog_ratio()).map_err(|_| {
        unrepresentable(
            "analogs",
            format!("{} analog samples per frame", trial.analog_ratio()),
        )
    })?;
    let analog_total = u16::try_from(analogs.len() * usize::from(ratio)).map_err(|_| {
        unrepresentable(
            "analogs",
            format!("{} channels at {ratio} samples per frame", analogs.len()),
        )
    })?;
    let seconds = event_seconds(trial)?;
    let data = encode_frames(trial, &points, &analogs, &layout)?;

    // DATA_START has the same encoded size whatever its value, so the
    // section length does not depend on it
    let sized = parameter_groups(trial, &points, &analogs, &seconds, &layout, 0)?;
    let blocks = encode_section(&sized, options.processor)?.len() as u64 / BLOCK_SIZE;
    let data_start = u64::from(PARAMETER_BLOCK) + blocks;
    let data_start = u16::try_from(data_start)
        .map_err(|_| unrepresentable("parameters", format!("data starts at block {data_start}")))?;
    let groups = parameter_groups(trial, &points, &analogs, &seconds, &layout, data_start)?;
    let section = encode_section(&groups, options.processor)?;

    let clamp = |frame: u32| u16::try_from(frame).unwrap_or(u16::MAX);
    let (first_frame, last_frame) = if trial.frame_count() == 0 {
        let first = trial.first_frame().max(1);
        (clamp(first), clamp(first - 1))
    } else {
        (clamp(trial.first_frame()), clamp(trial.last_frame()))
    };
    let header = Header {
        parameter_block: PARAMETER_BLOCK,
        point_count,
        analog_total,
        first_frame,
        last_frame,
        max_gap: 0,
        scale: layout.scale as f32,
        data_start,
        analog_ratio: ratio,
        rate: trial.point_rate() as f32,
        events: trial
            .events()
            .zip(&seconds)
            .take(MAX_HEADER_EVENTS)
            .map(|(event, t)| HeaderEvent {
                label: event.label().chars().take(4).collect(),
                time: *t as f32,
                displayed: true,
            })
            .collect(),
    };

    let header = header.encode(layout.endian).ok_or_else(|| {
        unrepresentable(
            "header",
            format!("point rate, scale or event times as {} reals", layout.endian),
        )
    })?;
    device
        .write_all(&header)
        .map_err(device_failure("header"))?;
    device
        .write_all(&section)
        .map_err(device_failure("parameters"))?;
    device.write_all(&data).map_err(device_failure("data"))?;
    device.flush().map_err(device_failure("data"))?;
    debug!(
        context = "c3d",
        points = points.len(),
        analogs = analogs.len(),
        frames = trial.frame_count(),
        parameter_blocks = blocks,
        "Encoded trial"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::options::C3dProcessor;

    #[test]
    fn test_residual_word() {
        let options = C3dOptions {
            storage: C3dStorage::Integer,
            ..C3dOptions::default()
        };
        let layout = Layout::new(&options).unwrap();
        assert_eq!(layout.residual_word(-1.0, 0, "A").unwrap(), -1);
        assert_eq!(layout.residual_word(0.5, 3, "A").unwrap(), 0x0305);
        assert!(layout.residual_word(30.0, 0, "A").is_err());
        assert!(layout.residual_word(0.5, 0x80, "A").is_err());
    }

    #[test]
    fn test_numbered_labels_spill() {
        let labels: Vec<String> = (0..300).map(|i| format!("M{i}")).collect();
        let params = numbered("LABELS", labels);
        let names: Vec<&str> = params.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["LABELS", "LABELS2"]);
        assert_eq!(params[1].1.as_strings().unwrap().len(), 45);
    }

    #[test]
    fn test_split_field_words() {
        let value = split_field(100_000);
        let words = value.as_f64_vec().unwrap();
        assert_eq!(words, vec![-31072.0, 1.0]);
    }

    #[test]
    fn test_integer_overflow_is_unrepresentable() {
        let trial = Trial::with_frames(100.0, 1).unwrap();
        trial
            .add_point(Point::with_coords("FAR", vec![[5000.0, 0.0, 0.0]]))
            .unwrap();
        let options = C3dOptions {
            processor: C3dProcessor::Mips,
            storage: C3dStorage::Integer,
            integer_point_scale: 0.1,
        };
        let mut device = crate::device::BufferDevice::writable();
        let err = write_trial(&mut device, &trial, &options).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::core::EncodeErrorKind::Unrepresentable(_)
        ));
        assert!(device.as_bytes().is_empty());
    }
}
