// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Staging area for decoders.
//!
//! Decoders discover rates, channels and frame counts in whatever order
//! their format stores them. A [`TrialDraft`] accepts them in any order and
//! [`TrialDraft::finalize`] assembles the [`Trial`] only once everything is
//! consistent, so a failed decode never leaves a half-built tree behind.

use crate::core::ModelError;

use super::{Analog, Event, Metadata, Point, Trial, Units};

/// Trial content collected by a decoder.
#[derive(Debug, Clone)]
pub struct TrialDraft {
    /// Point sample rate in Hz
    pub point_rate: f64,
    /// Analog samples per point frame
    pub analog_ratio: u32,
    /// Index of the first frame
    pub first_frame: u32,
    /// Declared frame count; inferred from the data when `None`
    pub frame_count: Option<usize>,
    /// Unit labels
    pub units: Units,
    /// Points in order
    pub points: Vec<Point>,
    /// Analog channels in order
    pub analogs: Vec<Analog>,
    /// Events in order
    pub events: Vec<Event>,
    /// Detached metadata tree
    pub metadata: Metadata,
}

impl Default for TrialDraft {
    fn default() -> Self {
        Self {
            point_rate: 0.0,
            analog_ratio: 1,
            first_frame: 1,
            frame_count: None,
            units: Units::default(),
            points: Vec::new(),
            analogs: Vec::new(),
            events: Vec::new(),
            metadata: Metadata::new(),
        }
    }
}

impl TrialDraft {
    /// Create an empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    fn inferred_frame_count(&self) -> usize {
        if let Some(frames) = self.frame_count {
            return frames;
        }
        if let Some(point) = self.points.first() {
            return point.frame_count();
        }
        match self.analogs.first() {
            Some(analog) if self.analog_ratio > 0 => {
                analog.sample_count() / self.analog_ratio as usize
            }
            _ => 0,
        }
    }

    /// Check every invariant and build the trial.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] naming the first violated invariant.
    pub fn finalize(self) -> Result<Trial, ModelError> {
        let trial = Trial::new();
        trial.set_point_rate(self.point_rate)?;
        trial.set_analog_ratio(self.analog_ratio)?;
        trial.set_first_frame(self.first_frame);
        trial.set_frame_count(self.inferred_frame_count())?;
        trial.set_units(self.units);

        for point in self.points {
            trial.add_point(point)?;
        }
        for analog in self.analogs {
            trial.add_analog(analog)?;
        }
        for event in self.events {
            trial.add_event(event)?;
        }
        trial.attach_metadata(&self.metadata)?;
        Ok(trial)
    }
}
