// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Motion Analysis TRC marker trajectories.
//!
//! Layout (tab separated):
//!
//! ```text
//! PathFileType  4  (X/Y/Z)  walk.trc
//! DataRate  CameraRate  NumFrames  NumMarkers  Units  OrigDataRate  OrigDataStartFrame  OrigNumFrames
//! 100  100  250  2  mm  100  1  250
//! Frame#  Time  LASI        RASI
//!               X1  Y1  Z1  X2  Y2  Z2
//!
//! 1  0.00000  12.5  -3.25  900  ...
//! ```
//!
//! Signature: offset 0, ASCII `PathFileType`. Empty coordinate fields mark
//! frames where the marker was not reconstructed. The format has no
//! analog channels, residuals, masks, events or metadata.

use tracing::warn;

use crate::core::{DecodeError, EncodeError};
use crate::device::Device;
use crate::model::{Point, Trial, TrialDraft, TrialField, Units};

use super::text::{format_real, parse_real, read_lines, Line};
use crate::io::traits::{match_signature, Capability, Signature, TrialHandler};

const FORMAT: &str = "TRC";
const SIGNATURE: &[u8] = b"PathFileType";
const HEADER_KEYS: [&str; 8] = [
    "DataRate",
    "CameraRate",
    "NumFrames",
    "NumMarkers",
    "Units",
    "OrigDataRate",
    "OrigDataStartFrame",
    "OrigNumFrames",
];

const DISCARDED: &[TrialField] = &[
    TrialField::AnalogRate,
    TrialField::Units,
    TrialField::PointKinds,
    TrialField::PointDescriptions,
    TrialField::PointResiduals,
    TrialField::PointMasks,
    TrialField::Events,
    TrialField::Metadata,
];

/// TRC handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrcHandler;

impl TrcHandler {
    /// Create the handler.
    pub fn new() -> Self {
        Self
    }
}

struct Header {
    rate: f64,
    frames: Option<usize>,
    markers: Option<usize>,
    units: Option<String>,
}

fn header_value<'a>(keys: &[&str], values: &[&'a str], key: &str) -> Option<&'a str> {
    keys.iter()
        .position(|k| k.eq_ignore_ascii_case(key))
        .and_then(|i| values.get(i).copied())
        .filter(|v| !v.is_empty())
}

fn parse_header(keys_line: &Line, values_line: &Line) -> Result<Header, DecodeError> {
    let keys = keys_line.fields();
    let values = values_line.fields();
    let count = |key: &str| -> Result<Option<usize>, DecodeError> {
        header_value(&keys, &values, key)
            .map(|v| {
                v.parse::<usize>().map_err(|_| {
                    DecodeError::malformed(
                        FORMAT,
                        values_line.offset,
                        "header",
                        format!("{key} must be a count, found '{v}'"),
                    )
                })
            })
            .transpose()
    };

    let rate = match header_value(&keys, &values, "DataRate") {
        Some(v) => parse_real(v, FORMAT, values_line, "header")?.unwrap_or(0.0),
        None => {
            return Err(DecodeError::malformed(
                FORMAT,
                keys_line.offset,
                "header",
                "missing DataRate",
            ))
        }
    };

    Ok(Header {
        rate,
        frames: count("NumFrames")?,
        markers: count("NumMarkers")?,
        units: header_value(&keys, &values, "Units").map(str::to_string),
    })
}

fn is_data_row(line: &Line) -> bool {
    line.fields()
        .first()
        .is_some_and(|f| !f.is_empty() && f.parse::<f64>().is_ok())
}

impl TrialHandler for TrcHandler {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Motion Analysis marker trajectories (.trc)"
    }

    fn capability(&self) -> Capability {
        Capability::READ_WRITE
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["trc"]
    }

    fn validate_signature(&self, device: &mut dyn Device) -> Signature {
        match_signature(device, 0, SIGNATURE)
    }

    fn read(&self, device: &mut dyn Device) -> Result<Trial, DecodeError> {
        let lines = read_lines(device, FORMAT)?;
        if lines.len() < 5 {
            let offset = lines.last().map_or(0, |l| l.offset);
            return Err(DecodeError::malformed(
                FORMAT,
                offset,
                "header",
                format!("expected 5 header lines, found {}", lines.len()),
            ));
        }
        if !lines[0].text.starts_with("PathFileType") {
            return Err(DecodeError::malformed(
                FORMAT,
                0,
                "header",
                "missing PathFileType line",
            ));
        }
        let header = parse_header(&lines[1], &lines[2])?;

        // Labels sit on every third column starting after Frame# and Time
        let label_fields = lines[3].fields();
        let mut labels: Vec<String> = label_fields
            .iter()
            .skip(2)
            .step_by(3)
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();
        let rows: Vec<&Line> = lines[5..].iter().filter(|l| !l.is_blank()).collect();

        // A declared count may not exceed the columns the file actually holds
        let columns = rows
            .iter()
            .map(|r| r.fields().len())
            .chain(std::iter::once(label_fields.len()))
            .max()
            .unwrap_or(0);
        let capacity = labels.len().max(columns.saturating_sub(2).div_ceil(3));
        let markers = header.markers.unwrap_or(labels.len());
        if markers > capacity {
            return Err(DecodeError::malformed(
                FORMAT,
                lines[2].offset,
                "header",
                format!("NumMarkers is {markers} but the file holds at most {capacity} markers"),
            ));
        }
        labels.truncate(markers);
        while labels.len() < markers {
            labels.push(format!("uname*{}", labels.len() + 1));
        }

        let mut coords = vec![Vec::with_capacity(rows.len()); markers];
        let mut residuals = vec![Vec::with_capacity(rows.len()); markers];
        let mut first_frame = 1u32;

        for (index, row) in rows.iter().enumerate() {
            if !is_data_row(row) {
                return Err(DecodeError::malformed(
                    FORMAT,
                    row.offset,
                    "frame",
                    "expected a frame number",
                ));
            }
            let fields = row.fields();
            if index == 0 {
                first_frame = fields[0].parse::<f64>().map_or(1, |f| f.max(0.0) as u32);
            }
            for marker in 0..markers {
                let mut xyz = [0.0; 3];
                let mut present = 0;
                for (axis, slot) in xyz.iter_mut().enumerate() {
                    let field = fields.get(2 + marker * 3 + axis).copied().unwrap_or("");
                    if let Some(value) = parse_real(field, FORMAT, row, "frame")? {
                        *slot = value;
                        present += 1;
                    }
                }
                if present == 3 {
                    coords[marker].push(xyz);
                    residuals[marker].push(0.0);
                } else {
                    coords[marker].push([0.0; 3]);
                    residuals[marker].push(-1.0);
                }
            }
        }

        if let Some(declared) = header.frames {
            if declared != rows.len() {
                warn!(
                    context = "trc",
                    declared,
                    found = rows.len(),
                    "NumFrames does not match the number of data rows"
                );
            }
        }

        let mut draft = TrialDraft::new();
        draft.point_rate = header.rate;
        draft.first_frame = first_frame;
        draft.frame_count = Some(rows.len());
        if let Some(unit) = header.units {
            draft.units = Units {
                marker: unit,
                ..Units::default()
            };
        }
        for ((label, coords), residuals) in labels.into_iter().zip(coords).zip(residuals) {
            let point = Point::new(label);
            let masks = vec![0; coords.len()];
            point
                .set_data(coords, residuals, masks)
                .map_err(|e| DecodeError::model(FORMAT, 0, e))?;
            draft.points.push(point);
        }
        draft
            .finalize()
            .map_err(|e| DecodeError::model(FORMAT, device.tell(), e))
    }

    fn write(&self, device: &mut dyn Device, trial: &Trial) -> Result<(), EncodeError> {
        trial
            .check_consistency()
            .map_err(|e| EncodeError::model(FORMAT, e))?;
        if trial.analog_count() > 0 {
            return Err(EncodeError::unrepresentable(
                FORMAT,
                "analog channels",
                format!("{} analog channels", trial.analog_count()),
            ));
        }
        let points: Vec<Point> = trial.points().collect();
        if let Some(point) = points
            .iter()
            .find(|p| p.label().contains(['\t', '\n', '\r']))
        {
            return Err(EncodeError::unrepresentable(
                FORMAT,
                "point labels",
                format!("label '{}' with tab or line break", point.label().escape_debug()),
            ));
        }

        let rate = trial.point_rate();
        let frames = trial.frame_count();
        let first = trial.first_frame();
        let units = trial.units();
        let mut out = String::new();

        out.push_str(&format!(
            "PathFileType\t4\t(X/Y/Z)\t{}\n",
            device.name()
        ));
        out.push_str(&HEADER_KEYS.join("\t"));
        out.push('\n');
        out.push_str(&format!(
            "{rate}\t{rate}\t{frames}\t{}\t{}\t{rate}\t{first}\t{frames}\n",
            points.len(),
            units.marker
        ));
        out.push_str("Frame#\tTime");
        for point in &points {
            out.push_str(&format!("\t{}\t\t", point.label()));
        }
        out.push_str("\n\t");
        for index in 1..=points.len() {
            out.push_str(&format!("\tX{index}\tY{index}\tZ{index}"));
        }
        out.push_str("\n\n");

        let data: Vec<(Vec<[f64; 3]>, Vec<f64>)> = points
            .iter()
            .map(|p| (p.coords(), p.residuals()))
            .collect();
        for frame in 0..frames {
            let time = if rate > 0.0 { frame as f64 / rate } else { 0.0 };
            out.push_str(&format!("{}\t{time:.5}", u64::from(first) + frame as u64));
            for (coords, residuals) in &data {
                if residuals[frame] >= 0.0 {
                    let [x, y, z] = coords[frame];
                    out.push_str(&format!(
                        "\t{}\t{}\t{}",
                        format_real(x),
                        format_real(y),
                        format_real(z)
                    ));
                } else {
                    out.push_str("\t\t\t");
                }
            }
            out.push('\n');
        }

        device
            .write_all(out.as_bytes())
            .map_err(|e| EncodeError::device_write(FORMAT, "trajectories", e))
    }

    fn discarded_fields(&self) -> &'static [TrialField] {
        DISCARDED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BufferDevice;

    const SAMPLE: &str = "PathFileType\t4\t(X/Y/Z)\twalk.trc\n\
DataRate\tCameraRate\tNumFrames\tNumMarkers\tUnits\tOrigDataRate\tOrigDataStartFrame\tOrigNumFrames\n\
60\t60\t3\t2\tmm\t60\t1\t3\n\
Frame#\tTime\tLASI\t\t\tRASI\t\t\n\
\t\tX1\tY1\tZ1\tX2\tY2\tZ2\n\
\n\
5\t0.000\t1.5\t2.5\t3.5\t4\t5\t6\n\
6\t0.017\t\t\t\t4.5\t5.5\t6.5\n\
7\t0.033\t1.75\t2.75\t3.75\t4\t5\t6\n";

    #[test]
    fn test_read_sample() {
        let mut device = BufferDevice::named("walk.trc", SAMPLE.as_bytes().to_vec());
        let trial = TrcHandler::new().read(&mut device).unwrap();
        assert_eq!(trial.point_rate(), 60.0);
        assert_eq!(trial.frame_count(), 3);
        assert_eq!(trial.first_frame(), 5);
        let lasi = trial.point("LASI").unwrap();
        assert_eq!(lasi.coord(0), Some([1.5, 2.5, 3.5]));
        assert!(!lasi.is_valid(1));
        assert!(lasi.is_valid(2));
        assert_eq!(trial.point("RASI").unwrap().coord(1), Some([4.5, 5.5, 6.5]));
    }

    #[test]
    fn test_bad_number_reports_line_offset() {
        let broken = SAMPLE.replace("4.5\t5.5", "4.5\tx");
        let mut device = BufferDevice::new(broken.into_bytes());
        let err = TrcHandler::new().read(&mut device).unwrap_err();
        let line_start = SAMPLE.find("6\t0.017").unwrap() as u64;
        assert_eq!(err.offset, line_start);
    }

    #[test]
    fn test_write_rejects_analogs() {
        let trial = Trial::with_frames(100.0, 1).unwrap();
        trial
            .add_analog(crate::model::Analog::with_samples("FZ", vec![0.0]))
            .unwrap();
        let mut device = BufferDevice::writable();
        let err = TrcHandler::new().write(&mut device, &trial).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::core::EncodeErrorKind::Unrepresentable(_)
        ));
        assert_eq!(device.size(), 0);
    }
}
