// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! C3D decoding.

use tracing::{debug, warn};

use crate::core::DecodeError;
use crate::device::{Device, Endian};
use crate::model::{
    Analog, Event, EventTime, Gain, Metadata, Point, PointKind, Trial, TrialDraft, Units,
};

use super::constants::{
    is_managed, BLOCK_SIZE, GROUP_ANALOG, GROUP_EVENT, GROUP_POINT, GROUP_TRIAL,
    PARAMETER_KEY,
};
use super::header::Header;
use super::parameters::{read_parameters, read_section_header};
use super::{seek_to, FORMAT};

/// Point kinds listed by parameter name in the `POINT` group.
const KIND_LISTS: [(&str, PointKind); 6] = [
    ("ANGLES", PointKind::Angle),
    ("FORCES", PointKind::Force),
    ("MOMENTS", PointKind::Moment),
    ("POWERS", PointKind::Power),
    ("SCALARS", PointKind::Scalar),
    ("REACTIONS", PointKind::Reaction),
];

fn numbers(metadata: &Metadata, group: &str, name: &str) -> Option<Vec<f64>> {
    metadata.entry(group, name).and_then(|v| v.as_f64_vec())
}

fn number(metadata: &Metadata, group: &str, name: &str) -> Option<f64> {
    numbers(metadata, group, name).and_then(|v| v.first().copied())
}

fn strings(metadata: &Metadata, group: &str, name: &str) -> Vec<String> {
    metadata
        .entry(group, name)
        .and_then(|v| v.as_strings())
        .unwrap_or_default()
}

/// Counts declared by parameters fit the 16-bit words the format stores them in.
fn declared_count(value: f64, name: &str, offset: u64) -> Result<usize, DecodeError> {
    if value.is_finite() && (0.0..=f64::from(u16::MAX)).contains(&value) {
        Ok(value as usize)
    } else {
        Err(DecodeError::malformed(
            FORMAT,
            offset,
            "parameters",
            format!("{name} declares {value}, outside 0..=65535"),
        ))
    }
}

/// Concatenation of `PREFIX`, `PREFIX2`, `PREFIX3`... until one is missing.
fn numbered_strings(metadata: &Metadata, group: &str, prefix: &str) -> Vec<String> {
    let mut out = strings(metadata, group, prefix);
    for block in 2.. {
        let name = format!("{prefix}{block}");
        if metadata.entry(group, &name).is_none() {
            break;
        }
        out.extend(strings(metadata, group, &name));
    }
    out
}

/// Frame number stored as a pair of unsigned 16-bit words.
fn split_field(metadata: &Metadata, name: &str) -> Option<u32> {
    let words = numbers(metadata, GROUP_TRIAL, name)?;
    let low = *words.first()? as i64 as u16;
    let high = words.get(1).map_or(0, |w| *w as i64 as u16);
    Some(u32::from(low) + u32::from(high) * 65536)
}

fn label_or_default(labels: &[String], index: usize) -> String {
    labels
        .get(index)
        .filter(|l| !l.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("uname*{}", index + 1))
}

/// Residual and camera mask from a residual word; negative words are
/// invalid frames.
fn split_residual(word: i32, scale: f64) -> (f64, u16) {
    if word < 0 {
        (-1.0, 0)
    } else {
        ((word & 0xFF) as f64 * scale.abs(), ((word >> 8) & 0x7F) as u16)
    }
}

/// Sample layout of the data section.
struct Layout {
    endian: Endian,
    real: bool,
    unsigned_analogs: bool,
}

impl Layout {
    fn width(&self) -> usize {
        if self.real {
            4
        } else {
            2
        }
    }

    fn point_value(&self, data: &[u8], index: usize) -> f64 {
        let at = index * self.width();
        if self.real {
            self.endian.decode_f32(&data[at..at + 4]) as f64
        } else {
            self.endian.decode_u16(&data[at..at + 2]) as i16 as f64
        }
    }

    fn residual_word(&self, data: &[u8], index: usize) -> i32 {
        let at = index * self.width();
        if self.real {
            self.endian.decode_f32(&data[at..at + 4]) as i32
        } else {
            self.endian.decode_u16(&data[at..at + 2]) as i16 as i32
        }
    }

    fn analog_value(&self, data: &[u8], index: usize) -> f64 {
        let at = index * self.width();
        if self.real {
            self.endian.decode_f32(&data[at..at + 4]) as f64
        } else if self.unsigned_analogs {
            self.endian.decode_u16(&data[at..at + 2]) as f64
        } else {
            self.endian.decode_u16(&data[at..at + 2]) as i16 as f64
        }
    }
}

fn read_events(metadata: &Metadata, header: &Header) -> Vec<Event> {
    let used = metadata
        .group(GROUP_EVENT)
        .and_then(|_| number(metadata, GROUP_EVENT, "USED"));
    let Some(used) = used else {
        return header
            .events
            .iter()
            .map(|e| Event::new(e.label.clone(), EventTime::Seconds(e.time as f64)))
            .collect();
    };

    let labels = strings(metadata, GROUP_EVENT, "LABELS");
    let contexts = strings(metadata, GROUP_EVENT, "CONTEXTS");
    let descriptions = strings(metadata, GROUP_EVENT, "DESCRIPTIONS");
    let subjects = strings(metadata, GROUP_EVENT, "SUBJECTS");
    let times = numbers(metadata, GROUP_EVENT, "TIMES").unwrap_or_default();

    let used = used.max(0.0) as usize;
    let count = used.min(times.len() / 2);
    if count < used {
        warn!(
            context = "c3d",
            used,
            times = times.len() / 2,
            "EVENT:TIMES holds fewer entries than EVENT:USED"
        );
    }
    let optional = |values: &[String], i: usize| values.get(i).filter(|v| !v.is_empty()).cloned();
    (0..count)
        .map(|i| {
            let seconds = times[2 * i] * 60.0 + times[2 * i + 1];
            let event = Event::new(label_or_default(&labels, i), EventTime::Seconds(seconds));
            event.set_context(contexts.get(i).cloned().unwrap_or_default());
            event.set_description(optional(&descriptions, i));
            event.set_subject(optional(&subjects, i));
            event
        })
        .collect()
}

fn strip_managed(metadata: &Metadata) {
    for group in [GROUP_POINT, GROUP_ANALOG, GROUP_EVENT, GROUP_TRIAL] {
        if metadata.group(group).is_none() {
            continue;
        }
        for (name, _) in metadata.entries(group) {
            if is_managed(group, &name) {
                metadata.remove_entry(group, &name);
            }
        }
        if metadata.entries(group).is_empty() {
            metadata.remove_group(group);
        }
    }
}

fn device_error(context: &'static str) -> impl Fn(crate::core::DeviceError) -> DecodeError {
    move |e| DecodeError::device(FORMAT, context, e)
}

/// Decode a whole C3D device.
pub fn read_trial(device: &mut dyn Device) -> Result<Trial, DecodeError> {
    seek_to(device, 0, "header")?;
    let block = device
        .read_bytes(BLOCK_SIZE as usize)
        .map_err(device_error("header"))?;
    if block[1] != PARAMETER_KEY {
        return Err(DecodeError::malformed(
            FORMAT,
            1,
            "header",
            format!("key byte is {:#04x}, expected 0x50", block[1]),
        ));
    }
    if block[0] < 2 {
        return Err(DecodeError::malformed(
            FORMAT,
            0,
            "header",
            format!("parameter block {} overlaps the header", block[0]),
        ));
    }

    let section_start = (u64::from(block[0]) - 1) * BLOCK_SIZE;
    let section = read_section_header(device, section_start)?;
    let endian = section.processor.endian();
    let header = Header::parse(&block, endian);
    let metadata = read_parameters(device, section_start, section)?;
    debug!(
        context = "c3d",
        processor = ?section.processor,
        groups = metadata.groups().count(),
        "Decoded parameter section"
    );

    // Points
    let point_count = match number(&metadata, GROUP_POINT, "USED") {
        Some(used) => declared_count(used, "POINT:USED", section_start)?,
        None => header.point_count as usize,
    };
    let scale = number(&metadata, GROUP_POINT, "SCALE").unwrap_or(header.scale as f64);
    let point_rate = number(&metadata, GROUP_POINT, "RATE").unwrap_or(header.rate as f64);
    let data_start = number(&metadata, GROUP_POINT, "DATA_START")
        .map_or(header.data_start, |v| v as i64 as u16);

    // Frames
    let (first, last) = match (
        split_field(&metadata, "ACTUAL_START_FIELD"),
        split_field(&metadata, "ACTUAL_END_FIELD"),
    ) {
        (Some(first), Some(last)) => (first, last),
        _ => (u32::from(header.first_frame), u32::from(header.last_frame)),
    };
    let frames = if last >= first {
        (last - first) as usize + 1
    } else {
        0
    };

    // Analogs
    let analog_rate = number(&metadata, GROUP_ANALOG, "RATE").unwrap_or(0.0);
    let mut ratio = header.analog_ratio as usize;
    if ratio == 0 && point_rate > 0.0 && analog_rate > 0.0 {
        ratio = declared_count(
            (analog_rate / point_rate).round(),
            "ANALOG:RATE / POINT:RATE",
            section_start,
        )?;
    }
    let channels = match number(&metadata, GROUP_ANALOG, "USED") {
        Some(used) => declared_count(used, "ANALOG:USED", section_start)?,
        None if ratio > 0 => header.analog_total as usize / ratio,
        None => 0,
    };
    if channels > 0 && ratio == 0 {
        return Err(DecodeError::malformed(
            FORMAT,
            18,
            "header",
            "analog channels without samples per frame",
        ));
    }
    let ratio = ratio.max(1);
    if channels * ratio != header.analog_total as usize && channels > 0 {
        warn!(
            context = "c3d",
            channels,
            ratio,
            header_total = header.analog_total,
            "ANALOG:USED disagrees with the header analog count"
        );
    }

    let layout = Layout {
        endian,
        real: scale < 0.0,
        unsigned_analogs: strings(&metadata, GROUP_ANALOG, "FORMAT")
            .first()
            .is_some_and(|f| f.eq_ignore_ascii_case("UNSIGNED")),
    };

    // Data
    if data_start == 0 {
        return Err(DecodeError::malformed(
            FORMAT,
            16,
            "header",
            "data start block is 0",
        ));
    }
    let words_per_frame = point_count
        .checked_mul(4)
        .zip(channels.checked_mul(ratio))
        .and_then(|(points, analogs)| points.checked_add(analogs))
        .ok_or_else(|| DecodeError::malformed(FORMAT, 0, "data", "frame size overflows"))?;
    let size = frames
        .checked_mul(words_per_frame)
        .and_then(|w| w.checked_mul(layout.width()))
        .ok_or_else(|| DecodeError::malformed(FORMAT, 0, "data", "data section size overflows"))?;
    let data_offset = (u64::from(data_start) - 1) * BLOCK_SIZE;
    seek_to(device, data_offset, "data")?;
    let data = device.read_bytes(size).map_err(device_error("data"))?;

    let mut coords = vec![Vec::with_capacity(frames); point_count];
    let mut residuals = vec![Vec::with_capacity(frames); point_count];
    let mut masks = vec![Vec::with_capacity(frames); point_count];
    let mut samples = vec![Vec::with_capacity(frames.saturating_mul(ratio)); channels];

    let analog_scales = numbers(&metadata, GROUP_ANALOG, "SCALE").unwrap_or_default();
    let gen_scale = number(&metadata, GROUP_ANALOG, "GEN_SCALE").unwrap_or(1.0);
    let offsets: Vec<i32> = numbers(&metadata, GROUP_ANALOG, "OFFSET")
        .unwrap_or_default()
        .into_iter()
        .map(|o| {
            let o = o as i32;
            if layout.unsigned_analogs && o < 0 {
                o + 65536
            } else {
                o
            }
        })
        .collect();
    let channel_scale = |c: usize| analog_scales.get(c).copied().unwrap_or(1.0) * gen_scale;
    let channel_offset = |c: usize| offsets.get(c).copied().unwrap_or(0);

    for frame in 0..frames {
        let base = frame * words_per_frame;
        for p in 0..point_count {
            let at = base + p * 4;
            let (residual, mask) = split_residual(layout.residual_word(&data, at + 3), scale);
            let xyz = if residual < 0.0 {
                [0.0; 3]
            } else if layout.real {
                [0, 1, 2].map(|axis| layout.point_value(&data, at + axis))
            } else {
                [0, 1, 2].map(|axis| layout.point_value(&data, at + axis) * scale)
            };
            coords[p].push(xyz);
            residuals[p].push(residual);
            masks[p].push(mask);
        }
        let analog_base = base + point_count * 4;
        for s in 0..ratio {
            for (c, channel) in samples.iter_mut().enumerate() {
                let raw = layout.analog_value(&data, analog_base + s * channels + c);
                channel.push((raw - f64::from(channel_offset(c))) * channel_scale(c));
            }
        }
    }

    // Model
    let mut draft = TrialDraft::new();
    draft.point_rate = point_rate;
    draft.analog_ratio = ratio as u32;
    draft.first_frame = first;
    draft.frame_count = Some(frames);

    let defaults = Units::default();
    let unit = |name: &str, default: &str| {
        strings(&metadata, GROUP_POINT, name)
            .into_iter()
            .next()
            .unwrap_or_else(|| default.to_string())
    };
    draft.units = Units {
        marker: unit("UNITS", &defaults.marker),
        angle: unit("ANGLE_UNITS", &defaults.angle),
        force: unit("FORCE_UNITS", &defaults.force),
        moment: unit("MOMENT_UNITS", &defaults.moment),
        power: unit("POWER_UNITS", &defaults.power),
        scalar: unit("SCALAR_UNITS", &defaults.scalar),
    };

    let labels = numbered_strings(&metadata, GROUP_POINT, "LABELS");
    let descriptions = numbered_strings(&metadata, GROUP_POINT, "DESCRIPTIONS");
    let kinds: Vec<(Vec<String>, PointKind)> = KIND_LISTS
        .iter()
        .map(|(name, kind)| (strings(&metadata, GROUP_POINT, name), *kind))
        .collect();
    let point_data = coords.into_iter().zip(residuals).zip(masks);
    for (index, ((coords, residuals), masks)) in point_data.enumerate() {
        let label = label_or_default(&labels, index);
        let point = Point::new(label.clone());
        if let Some((_, kind)) = kinds.iter().find(|(names, _)| names.contains(&label)) {
            point.set_kind(*kind);
        }
        point.set_description(descriptions.get(index).cloned().unwrap_or_default());
        point
            .set_data(coords, residuals, masks)
            .map_err(|e| DecodeError::model(FORMAT, data_offset, e))?;
        draft.points.push(point);
    }

    let analog_labels = numbered_strings(&metadata, GROUP_ANALOG, "LABELS");
    let analog_descriptions = numbered_strings(&metadata, GROUP_ANALOG, "DESCRIPTIONS");
    let units = strings(&metadata, GROUP_ANALOG, "UNITS");
    let gains = numbers(&metadata, GROUP_ANALOG, "GAIN").unwrap_or_default();
    for (index, values) in samples.into_iter().enumerate() {
        let analog = Analog::with_samples(label_or_default(&analog_labels, index), values);
        analog.set_description(analog_descriptions.get(index).cloned().unwrap_or_default());
        if let Some(unit) = units.get(index) {
            analog.set_unit(unit.clone());
        }
        analog.set_gain(
            gains
                .get(index)
                .and_then(|g| Gain::from_code(*g as i64))
                .unwrap_or_default(),
        );
        if analog.set_scale(channel_scale(index)).is_err() {
            warn!(
                context = "c3d",
                channel = %analog.label(),
                scale = channel_scale(index),
                "Ignoring unusable analog scale"
            );
        }
        analog.set_offset(channel_offset(index));
        draft.analogs.push(analog);
    }

    draft.events = read_events(&metadata, &header);
    strip_managed(&metadata);
    draft.metadata = metadata;
    draft
        .finalize()
        .map_err(|e| DecodeError::model(FORMAT, data_offset, e))
}
