// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Motion Analysis ANC analog recordings.
//!
//! Layout (tab separated):
//!
//! ```text
//! File_Type:  Analog R/C Continuous  Version:  1
//! Board_Type:  National Instruments  Polarity:  Bipolar
//! Trial_Name:  walk  Trial#:  1  Duration(Sec.):  2.5  #Channels:  2
//! BitDepth:  16  PreciseRate:  1000
//!
//! Name   F1X    F1Y
//! Rate   1000   1000
//! Range  10000  10000
//! 0.000  12     -5
//! ```
//!
//! Samples are signed integers. A channel whose range is `R` millivolts
//! converts with `R / 1000 * 2 / 2^BitDepth` volts per count, and the range
//! also gives the channel gain. The format has no points, so the point rate
//! of a decoded trial equals the analog rate.
//!
//! Signature: offset 0, ASCII `File_Type:`.

use crate::core::{DecodeError, EncodeError};
use crate::device::Device;
use crate::io::options::AncOptions;
use crate::io::traits::{match_signature, Capability, Signature, TrialHandler};
use crate::model::{Analog, Gain, Trial, TrialDraft, TrialField};

use super::text::{format_real, parse_real, read_lines, Line};

const FORMAT: &str = "ANC";
const SIGNATURE: &[u8] = b"File_Type:";
const DEFAULT_BIT_DEPTH: u32 = 16;

/// Standard ranges in millivolts, smallest first.
const STANDARD_RANGES: [u32; 5] = [1000, 1250, 2500, 5000, 10000];

const DISCARDED: &[TrialField] = &[
    TrialField::PointRate,
    TrialField::FirstFrame,
    TrialField::FrameCount,
    TrialField::Units,
    TrialField::AnalogDescriptions,
    TrialField::AnalogUnits,
    TrialField::AnalogGains,
    TrialField::AnalogScales,
    TrialField::AnalogOffsets,
    TrialField::Events,
    TrialField::Metadata,
];

/// ANC handler.
#[derive(Debug, Clone, Default)]
pub struct AncHandler {
    options: AncOptions,
}

impl AncHandler {
    /// Create a handler with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler writing with `options`.
    pub fn with_options(options: AncOptions) -> Self {
        Self { options }
    }

    /// Encoder options.
    pub fn options(&self) -> &AncOptions {
        &self.options
    }
}

fn volts_per_count(range_mv: f64, bits: u32) -> f64 {
    range_mv / 1000.0 * 2.0 / 2f64.powi(bits as i32)
}

/// Value following `key` on any header line.
fn header_field<'a>(lines: &'a [Line], key: &str) -> Option<(&'a Line, String)> {
    lines.iter().find_map(|line| {
        let fields = line.fields();
        let index = fields.iter().position(|f| f.eq_ignore_ascii_case(key))?;
        fields
            .get(index + 1)
            .filter(|v| !v.is_empty())
            .map(|v| (line, v.to_string()))
    })
}

/// Fields of the row whose first field is `key`, without the key.
fn table_row<'a>(lines: &'a [Line], key: &str) -> Result<(&'a Line, Vec<String>), DecodeError> {
    lines
        .iter()
        .find(|l| {
            l.fields()
                .first()
                .is_some_and(|f| f.eq_ignore_ascii_case(key))
        })
        .map(|l| {
            let values = l.fields().into_iter().skip(1).map(str::to_string).collect();
            (l, values)
        })
        .ok_or_else(|| {
            DecodeError::malformed(FORMAT, 0, "channel table", format!("missing '{key}' row"))
        })
}

fn parse_channel_values(
    line: &Line,
    values: &[String],
    channels: usize,
    context: &str,
) -> Result<Vec<f64>, DecodeError> {
    (0..channels)
        .map(|i| {
            let field = values.get(i).map_or("", String::as_str);
            parse_real(field, FORMAT, line, context)?.ok_or_else(|| {
                DecodeError::malformed(
                    FORMAT,
                    line.offset,
                    context,
                    format!("missing value for channel {}", i + 1),
                )
            })
        })
        .collect()
}

impl TrialHandler for AncHandler {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Motion Analysis analog channels (.anc)"
    }

    fn capability(&self) -> Capability {
        Capability::READ_WRITE
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["anc"]
    }

    fn validate_signature(&self, device: &mut dyn Device) -> Signature {
        match_signature(device, 0, SIGNATURE)
    }

    fn read(&self, device: &mut dyn Device) -> Result<Trial, DecodeError> {
        let lines = read_lines(device, FORMAT)?;
        let (name_line, labels) = table_row(&lines, "Name")?;
        let labels: Vec<String> = labels.into_iter().filter(|l| !l.is_empty()).collect();
        let channels = labels.len();

        let bits = match header_field(&lines, "BitDepth:") {
            Some((line, value)) => value
                .parse::<u32>()
                .ok()
                .filter(|b| (2..=32).contains(b))
                .ok_or_else(|| {
                    DecodeError::malformed(
                        FORMAT,
                        line.offset,
                        "header",
                        format!("invalid bit depth '{value}'"),
                    )
                })?,
            None => DEFAULT_BIT_DEPTH,
        };

        let (rate_line, rate_values) = table_row(&lines, "Rate")?;
        let rates = parse_channel_values(rate_line, &rate_values, channels, "channel rate")?;
        let (range_line, range_values) = table_row(&lines, "Range")?;
        let ranges = parse_channel_values(range_line, &range_values, channels, "channel range")?;

        if let Some(first) = rates.first() {
            if rates.iter().any(|r| r != first) {
                return Err(DecodeError::unsupported(
                    FORMAT,
                    rate_line.offset,
                    "channel rate",
                    "channels sampled at different rates",
                ));
            }
        }
        let rate = match header_field(&lines, "PreciseRate:") {
            Some((line, value)) => parse_real(&value, FORMAT, line, "header")?.unwrap_or(0.0),
            None => rates.first().copied().unwrap_or(0.0),
        };

        let table_end = [name_line, rate_line, range_line]
            .iter()
            .map(|l| l.offset)
            .max()
            .unwrap_or(0);
        let rows: Vec<&Line> = lines
            .iter()
            .filter(|l| l.offset > table_end && !l.is_blank())
            .collect();

        let scales: Vec<f64> = ranges.iter().map(|r| volts_per_count(*r, bits)).collect();
        let mut samples = vec![Vec::with_capacity(rows.len()); channels];
        let mut first_time = None;
        for row in &rows {
            let fields = row.fields();
            let time = parse_real(fields[0], FORMAT, row, "sample row")?;
            if first_time.is_none() {
                first_time = time;
            }
            for (channel, values) in samples.iter_mut().enumerate() {
                let field = fields.get(channel + 1).copied().unwrap_or("");
                let raw = parse_real(field, FORMAT, row, "sample row")?.ok_or_else(|| {
                    DecodeError::malformed(
                        FORMAT,
                        row.offset,
                        "sample row",
                        format!("missing sample for channel '{}'", labels[channel]),
                    )
                })?;
                values.push(raw * scales[channel]);
            }
        }

        let mut draft = TrialDraft::new();
        draft.point_rate = rate;
        draft.frame_count = Some(rows.len());
        if let Some(t0) = first_time {
            if rate > 0.0 && t0 >= 0.0 {
                draft.first_frame = (t0 * rate).round() as u32 + 1;
            }
        }
        let decoded = labels.into_iter().zip(samples).zip(&ranges).zip(&scales);
        for (((label, values), range), scale) in decoded {
            let analog = Analog::with_samples(label, values);
            analog.set_gain(Gain::from_range_millivolts(range.round() as i64));
            analog
                .set_scale(*scale)
                .map_err(|e| DecodeError::model(FORMAT, range_line.offset, e))?;
            draft.analogs.push(analog);
        }
        draft
            .finalize()
            .map_err(|e| DecodeError::model(FORMAT, device.tell(), e))
    }

    fn write(&self, device: &mut dyn Device, trial: &Trial) -> Result<(), EncodeError> {
        trial
            .check_consistency()
            .map_err(|e| EncodeError::model(FORMAT, e))?;
        if trial.point_count() > 0 {
            return Err(EncodeError::unrepresentable(
                FORMAT,
                "points",
                format!("{} points", trial.point_count()),
            ));
        }
        let bits = u32::from(self.options.bit_depth);
        let max_count = 2f64.powi(bits as i32 - 1);
        let analogs: Vec<Analog> = trial.analogs().collect();
        let rate = trial.analog_rate();
        let frames = trial.analog_sample_count();

        let mut ranges = Vec::with_capacity(analogs.len());
        let mut columns = Vec::with_capacity(analogs.len());
        for analog in &analogs {
            let label = analog.label();
            if label.is_empty() || label.contains(['\t', '\n', '\r']) {
                return Err(EncodeError::unrepresentable(
                    FORMAT,
                    "channel labels",
                    format!("label '{}'", label.escape_debug()),
                ));
            }
            let samples = analog.samples();
            let range = match analog.gain().range_millivolts() {
                Some(range) => range,
                None => {
                    let peak = samples.iter().fold(0.0f64, |m, v| m.max(v.abs()));
                    STANDARD_RANGES
                        .iter()
                        .copied()
                        .find(|r| f64::from(*r) / 1000.0 >= peak)
                        .ok_or_else(|| {
                            EncodeError::unrepresentable(
                                FORMAT,
                                "analog samples",
                                format!("channel '{label}' peaks at {peak} V, above every range"),
                            )
                        })?
                }
            };
            let scale = volts_per_count(f64::from(range), bits);
            let mut raw = Vec::with_capacity(samples.len());
            for value in samples {
                let count = (value / scale).round();
                if !(-max_count..max_count).contains(&count) {
                    return Err(EncodeError::unrepresentable(
                        FORMAT,
                        "analog samples",
                        format!("{value} V on channel '{label}' exceeds {bits}-bit range"),
                    ));
                }
                raw.push(count as i64);
            }
            ranges.push(range);
            columns.push(raw);
        }

        let duration = if rate > 0.0 { frames as f64 / rate } else { 0.0 };
        let trial_name = std::path::Path::new(device.name())
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("trial")
            .to_string();
        let mut out = String::new();
        out.push_str("File_Type:\tAnalog R/C Continuous\tVersion:\t1\n");
        out.push_str("Board_Type:\tNational Instruments\tPolarity:\tBipolar\n");
        out.push_str(&format!(
            "Trial_Name:\t{trial_name}\tTrial#:\t1\tDuration(Sec.):\t{duration}\t#Channels:\t{}\n",
            analogs.len()
        ));
        out.push_str(&format!(
            "BitDepth:\t{bits}\tPreciseRate:\t{}\n\n",
            format_real(rate)
        ));
        out.push_str("Name");
        for analog in &analogs {
            out.push('\t');
            out.push_str(&analog.label());
        }
        out.push_str("\nRate");
        for _ in &analogs {
            out.push_str(&format!("\t{}", rate.round()));
        }
        out.push_str("\nRange");
        for range in &ranges {
            out.push_str(&format!("\t{range}"));
        }
        out.push('\n');

        let start = f64::from(trial.first_frame().saturating_sub(1));
        for sample in 0..frames {
            let time = if rate > 0.0 {
                (start + sample as f64) / rate
            } else {
                0.0
            };
            out.push_str(&format_real(time));
            for column in &columns {
                out.push_str(&format!("\t{}", column[sample]));
            }
            out.push('\n');
        }

        device
            .write_all(out.as_bytes())
            .map_err(|e| EncodeError::device_write(FORMAT, "channels", e))
    }

    fn discarded_fields(&self) -> &'static [TrialField] {
        DISCARDED
    }
}
