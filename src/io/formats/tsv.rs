// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Qualisys Track Manager TSV exports (read only).
//!
//! The file starts with `KEY<TAB>value...` header lines, followed by the
//! marker samples:
//!
//! ```text
//! NO_OF_FRAMES    250
//! NO_OF_MARKERS   2
//! FREQUENCY       100
//! TIME_STAMP      2012-03-05, 14:23:11.123
//! EVENT           Foot Strike  12  0.110
//! MARKER_NAMES    LASI  RASI
//! Frame  Time   LASI X  LASI Y  LASI Z  RASI X  RASI Y  RASI Z
//! 1      0.000  12.5    -3.25   900     ...
//! ```
//!
//! The `Frame`/`Time` header row is optional; older exports write either
//! bare `X Y Z` triplets or prefix them with the two columns without naming
//! them. A sample whose three coordinates are all zero is an occluded
//! frame. Header keys with no model counterpart are kept in the `QTM`
//! metadata group; `TIME_STAMP` is stored as a timestamp when it parses.
//!
//! Signature: offset 0, ASCII `NO_OF_FRAMES`.

use chrono::NaiveDateTime;
use tracing::warn;

use crate::core::{DecodeError, PropertyValue};
use crate::device::Device;
use crate::io::traits::{match_signature, Capability, Signature, TrialHandler};
use crate::model::{Event, EventTime, Metadata, Point, Trial, TrialDraft};

use super::text::{parse_real, read_lines, Line};

const FORMAT: &str = "TSV";
const SIGNATURE: &[u8] = b"NO_OF_FRAMES";

/// Metadata group receiving the unmanaged header keys.
pub const METADATA_GROUP: &str = "QTM";

const TIME_STAMP_FORMATS: [&str; 2] = ["%Y-%m-%d, %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// TSV handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvHandler;

impl TsvHandler {
    /// Create the handler.
    pub fn new() -> Self {
        Self
    }
}

fn is_numeric_row(line: &Line) -> bool {
    line.fields()
        .first()
        .is_some_and(|f| f.parse::<f64>().is_ok())
}

fn parse_time_stamp(text: &str) -> Option<i64> {
    TIME_STAMP_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(text, format)
            .ok()
            .and_then(|dt| dt.and_utc().timestamp_nanos_opt())
    })
}

fn header_count(line: &Line, values: &[&str], key: &str) -> Result<usize, DecodeError> {
    let value = values.first().copied().unwrap_or("");
    value.parse::<usize>().map_err(|_| {
        DecodeError::malformed(
            FORMAT,
            line.offset,
            "header",
            format!("{key} must be a count, found '{value}'"),
        )
    })
}

#[derive(Default)]
struct Header {
    frames: Option<usize>,
    markers: Option<usize>,
    markers_offset: u64,
    rate: f64,
    labels: Vec<String>,
    events: Vec<Event>,
    has_column_header: bool,
}

fn parse_header(lines: &[Line], metadata: &Metadata) -> Result<(Header, usize), DecodeError> {
    let mut header = Header::default();
    let mut index = 0;
    while index < lines.len() {
        let line = &lines[index];
        if line.is_blank() {
            index += 1;
            continue;
        }
        if is_numeric_row(line) {
            break;
        }
        let fields = line.fields();
        let key = fields[0];
        let values = &fields[1..];
        index += 1;
        match key.to_ascii_uppercase().as_str() {
            "NO_OF_FRAMES" => header.frames = Some(header_count(line, values, key)?),
            "NO_OF_MARKERS" => {
                header.markers = Some(header_count(line, values, key)?);
                header.markers_offset = line.offset;
            }
            "FREQUENCY" => {
                let value = values.first().copied().unwrap_or("");
                header.rate = parse_real(value, FORMAT, line, "header")?.unwrap_or(0.0);
            }
            "MARKER_NAMES" => {
                header.labels = values
                    .iter()
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string())
                    .collect();
            }
            "EVENT" => {
                let label = values.first().copied().unwrap_or("");
                let seconds = values.get(2).copied().unwrap_or("");
                let time = match parse_real(seconds, FORMAT, line, "event")? {
                    Some(seconds) => EventTime::Seconds(seconds),
                    None => {
                        let frame = values.get(1).copied().unwrap_or("");
                        let frame = parse_real(frame, FORMAT, line, "event")?.ok_or_else(|| {
                            DecodeError::malformed(FORMAT, line.offset, "event", "missing time")
                        })?;
                        EventTime::Frame(frame as i32)
                    }
                };
                header.events.push(Event::new(label, time));
            }
            "FRAME" => {
                header.has_column_header = true;
                break;
            }
            "TIME_STAMP" => {
                let text = values.join(", ");
                let value = match parse_time_stamp(&text) {
                    Some(ns) => PropertyValue::Timestamp(ns),
                    None => PropertyValue::String(text),
                };
                metadata.set_entry(METADATA_GROUP, key, value);
            }
            _ => {
                let value = match values {
                    [] => PropertyValue::String(String::new()),
                    [single] => PropertyValue::from(*single),
                    many => PropertyValue::from(many.to_vec()),
                };
                metadata.set_entry(METADATA_GROUP, key, value);
            }
        }
    }
    Ok((header, index))
}

impl TrialHandler for TsvHandler {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Qualisys Track Manager 3D export (.tsv)"
    }

    fn capability(&self) -> Capability {
        Capability::CAN_READ
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["tsv"]
    }

    fn validate_signature(&self, device: &mut dyn Device) -> Signature {
        match_signature(device, 0, SIGNATURE)
    }

    fn read(&self, device: &mut dyn Device) -> Result<Trial, DecodeError> {
        let lines = read_lines(device, FORMAT)?;
        let metadata = Metadata::new();
        let (header, data_start) = parse_header(&lines, &metadata)?;

        let rows: Vec<&Line> = lines[data_start..]
            .iter()
            .filter(|l| !l.is_blank())
            .collect();

        let mut labels = header.labels;
        let columns = rows.iter().map(|r| r.fields().len()).max().unwrap_or(0);
        let capacity = labels.len().max(columns.div_ceil(3));
        let markers = header.markers.unwrap_or(labels.len());
        if markers > capacity {
            return Err(DecodeError::malformed(
                FORMAT,
                header.markers_offset,
                "header",
                format!("NO_OF_MARKERS is {markers} but the file holds at most {capacity} markers"),
            ));
        }
        labels.truncate(markers);
        while labels.len() < markers {
            labels.push(format!("uname*{}", labels.len() + 1));
        }
        if let Some(analogs) = metadata
            .entry(METADATA_GROUP, "NO_OF_ANALOG")
            .and_then(|v| v.as_str().and_then(|s| s.parse::<usize>().ok()))
            .filter(|n| *n > 0)
        {
            warn!(
                context = "tsv",
                analogs, "Analog channels are exported separately and are not decoded"
            );
        }

        let expected = markers * 3;
        let leading = match rows.first() {
            _ if header.has_column_header => 2,
            Some(row) => {
                let columns = row.fields().len();
                if columns == expected + 2 {
                    2
                } else if columns == expected {
                    0
                } else {
                    return Err(DecodeError::malformed(
                        FORMAT,
                        row.offset,
                        "frame",
                        format!("{columns} columns for {markers} markers"),
                    ));
                }
            }
            None => 0,
        };

        let mut coords = vec![Vec::with_capacity(rows.len()); markers];
        let mut residuals = vec![Vec::with_capacity(rows.len()); markers];
        let mut first_frame = 1u32;
        for (index, row) in rows.iter().enumerate() {
            let fields = row.fields();
            if index == 0 && leading == 2 {
                if let Some(frame) = parse_real(fields[0], FORMAT, row, "frame")? {
                    first_frame = frame.max(1.0) as u32;
                }
            }
            for marker in 0..markers {
                let mut xyz = [0.0; 3];
                for (axis, slot) in xyz.iter_mut().enumerate() {
                    let field = fields
                        .get(leading + marker * 3 + axis)
                        .copied()
                        .unwrap_or("");
                    *slot = parse_real(field, FORMAT, row, "frame")?.unwrap_or(0.0);
                }
                if xyz == [0.0; 3] {
                    coords[marker].push([0.0; 3]);
                    residuals[marker].push(-1.0);
                } else {
                    coords[marker].push(xyz);
                    residuals[marker].push(0.0);
                }
            }
        }
        if let Some(declared) = header.frames {
            if declared != rows.len() {
                warn!(
                    context = "tsv",
                    declared,
                    found = rows.len(),
                    "NO_OF_FRAMES does not match the number of data rows"
                );
            }
        }

        let mut draft = TrialDraft::new();
        draft.point_rate = header.rate;
        draft.first_frame = first_frame;
        draft.frame_count = Some(rows.len());
        draft.events = header.events;
        draft.metadata = metadata;
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BufferDevice;

    const SAMPLE: &str = "NO_OF_FRAMES\t3\n\
NO_OF_CAMERAS\t8\n\
NO_OF_MARKERS\t2\n\
FREQUENCY\t100\n\
NO_OF_ANALOG\t0\n\
DESCRIPTION\t--\n\
TIME_STAMP\t2012-03-05, 14:23:11.5\n\
DATA_INCLUDED\t3D\n\
EVENT\tFoot Strike\t12\t0.110\n\
MARKER_NAMES\tLASI\tRASI\n\
Frame\tTime\tLASI X\tLASI Y\tLASI Z\tRASI X\tRASI Y\tRASI Z\n\
10\t0.000\t1.0\t2.0\t3.0\t4.0\t5.0\t6.0\n\
11\t0.010\t0.000\t0.000\t0.000\t4.5\t5.5\t6.5\n\
12\t0.020\t1.5\t2.5\t3.5\t4.0\t5.0\t6.0\n";

    #[test]
    fn test_read_with_column_header() {
        let mut device = BufferDevice::named("walk.tsv", SAMPLE.as_bytes().to_vec());
        let trial = TsvHandler::new().read(&mut device).unwrap();
        assert_eq!(trial.point_rate(), 100.0);
        assert_eq!(trial.frame_count(), 3);
        assert_eq!(trial.first_frame(), 10);

        let lasi = trial.point("LASI").unwrap();
        assert!(lasi.is_valid(0));
        assert!(!lasi.is_valid(1));
        assert_eq!(lasi.coord(2), Some([1.5, 2.5, 3.5]));

        let events: Vec<Event> = trial.events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label(), "Foot Strike");
        assert_eq!(events[0].time(), EventTime::Seconds(0.11));

        let metadata = trial.metadata();
        assert_eq!(
            metadata.entry(METADATA_GROUP, "NO_OF_CAMERAS"),
            Some(PropertyValue::from("8"))
        );
        assert!(matches!(
            metadata.entry(METADATA_GROUP, "TIME_STAMP"),
            Some(PropertyValue::Timestamp(_))
        ));
        assert!(metadata.entry(METADATA_GROUP, "FREQUENCY").is_none());
    }

    #[test]
    fn test_read_bare_triplets() {
        let text = "NO_OF_FRAMES\t2\nNO_OF_MARKERS\t1\nFREQUENCY\t50\nMARKER_NAMES\tC7\n\
1.0\t2.0\t3.0\n4.0\t5.0\t6.0\n";
        let mut device = BufferDevice::new(text.as_bytes().to_vec());
        let trial = TsvHandler::new().read(&mut device).unwrap();
        assert_eq!(trial.first_frame(), 1);
        assert_eq!(trial.point("C7").unwrap().coord(1), Some([4.0, 5.0, 6.0]));
    }

    #[test]
    fn test_column_count_mismatch() {
        let text = "NO_OF_FRAMES\t1\nNO_OF_MARKERS\t2\nFREQUENCY\t50\nMARKER_NAMES\tA\tB\n1.0\t2.0\t3.0\n";
        let mut device = BufferDevice::new(text.as_bytes().to_vec());
        assert!(TsvHandler::new().read(&mut device).is_err());
    }

    #[test]
    fn test_read_only() {
        let handler = TsvHandler::new();
        assert!(!handler.capability().can_write());
        let mut device = BufferDevice::writable();
        let trial = Trial::new();
        assert!(handler.write(&mut device, &trial).is_err());
    }
}
