// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use mocodec::model::MetadataEntry;
use mocodec::{
    Analog, Event, EventTime, Gain, Point, PointKind, PropertyValue, Trial, TrialField,
};

// ============================================================================
// Temporary files
// ============================================================================

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Get a fresh temporary directory path for one test.
pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!(
        "mocodec_test_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}

/// Create a temporary file path with cleanup guard
pub fn temp_path(name: &str) -> (PathBuf, CleanupGuard) {
    let dir = temp_dir();
    fs::create_dir_all(&dir).ok();
    let path = dir.join(name);
    let guard = CleanupGuard(dir);
    (path, guard)
}

/// Cleanup guard for test temporary files
pub struct CleanupGuard(pub PathBuf);

impl CleanupGuard {
    /// Directory removed on drop.
    pub fn dir(&self) -> &PathBuf {
        &self.0
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

// ============================================================================
// Sample trials
// ============================================================================

/// Frames in the sample trials.
pub const FRAMES: usize = 10;

/// Point rate of the sample trials.
pub const RATE: f64 = 100.0;

/// Analog samples per frame in the sample trials.
pub const RATIO: u32 = 10;

/// Coordinates of marker `m` at `frame`; multiples of 0.1 within ±3276.
pub fn coord(m: usize, frame: usize) -> [f64; 3] {
    let base = (m as f64 + 1.0) * 100.0;
    [
        base + frame as f64 * 1.5,
        -base + frame as f64 * 0.3,
        900.0 + m as f64 * 10.0 - frame as f64 * 0.7,
    ]
}

/// Two markers over ten frames at 100 Hz.
///
/// `LASI` is occluded at frame 4; residuals are multiples of 0.1 and masks
/// fit seven bits.
pub fn marker_trial() -> Trial {
    let trial = Trial::with_frames(RATE, FRAMES).unwrap();
    for (m, label) in ["LASI", "RASI"].into_iter().enumerate() {
        let point = Point::new(label);
        let mut coords = Vec::new();
        let mut residuals = Vec::new();
        let mut masks = Vec::new();
        for frame in 0..FRAMES {
            if m == 0 && frame == 4 {
                coords.push([0.0; 3]);
                residuals.push(-1.0);
                masks.push(0);
            } else {
                coords.push(coord(m, frame));
                residuals.push(0.5 + 0.1 * (frame % 3) as f64);
                masks.push(0x03 + m as u16);
            }
        }
        point.set_data(coords, residuals, masks).unwrap();
        point.set_description(format!("{label} marker"));
        trial.add_point(point).unwrap();
    }
    trial
}

/// Analog value of channel `c` at sample `s`; multiples of the 0.125 scale.
pub fn analog_value(c: usize, s: usize) -> f64 {
    ((s as i64 % 40) - 20 + c as i64 * 3) as f64 * 0.125
}

/// Markers, a knee angle, two analog channels at 1000 Hz, events and
/// C3D-typed metadata.
pub fn full_trial() -> Trial {
    let trial = marker_trial();
    trial.set_analog_ratio(RATIO).unwrap();

    let angle = Point::with_coords(
        "LKneeAngles",
        (0..FRAMES).map(|f| [f as f64, 2.0, -3.5]).collect(),
    );
    angle.set_kind(PointKind::Angle);
    trial.add_point(angle).unwrap();

    for (c, label) in ["EMG1", "Fz"].into_iter().enumerate() {
        let samples = (0..FRAMES * RATIO as usize)
            .map(|s| analog_value(c, s))
            .collect();
        let analog = Analog::with_samples(label, samples);
        analog.set_scale(0.125).unwrap();
        analog.set_gain(Gain::PlusMinus5);
        analog.set_description(format!("{label} channel"));
        if c == 1 {
            analog.set_unit("N");
            analog.set_offset(-12);
        }
        trial.add_analog(analog).unwrap();
    }

    let strike = Event::new("Foot Strike", EventTime::Seconds(0.05));
    strike.set_context("Left");
    strike.set_subject(Some("Ada".to_string()));
    strike.set_description(Some("heel contact".to_string()));
    trial.add_event(strike).unwrap();
    let off = Event::new("Foot Off", EventTime::Seconds(0.08));
    off.set_context("Right");
    trial.add_event(off).unwrap();

    let metadata = trial.metadata();
    metadata.set_entry("SUBJECTS", "NAMES", vec!["Ada"]);
    metadata.set_entry("SUBJECTS", "USED", 1i16);
    metadata.set_group_description("SUBJECTS", "Subject information");
    metadata.insert_entry(
        "SUBJECTS",
        "MARKER_SETS",
        MetadataEntry::new("PlugInGait")
            .with_description("Marker set")
            .with_locked(true),
    );
    metadata.set_entry(
        "FORCE_PLATFORM",
        "ORIGIN",
        PropertyValue::Array(vec![
            PropertyValue::Float32(0.5),
            PropertyValue::Float32(-1.25),
            PropertyValue::Float32(-40.0),
        ]),
    );
    metadata.set_entry("POINT", "X_SCREEN", "+X");
    trial
}

/// Assert that `decoded` matches `original` on every field but `discarded`.
pub fn assert_same_except(original: &Trial, decoded: &Trial, discarded: &[TrialField]) {
    let differences: Vec<_> = original
        .differences(decoded)
        .into_iter()
        .filter(|f| !discarded.contains(f))
        .collect();
    assert!(
        differences.is_empty(),
        "unexpected differences: {differences:?}"
    );
}
