// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Analog channels.

use serde::{Deserialize, Serialize};

use crate::core::ModelError;
use crate::node::Node;

use super::owning_trial;

/// Input range of an analog-to-digital converter channel.
///
/// The discriminants are the integer codes used by acquisition systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Gain {
    /// Range not recorded
    #[default]
    Unknown = 0,
    /// ±10 V
    PlusMinus10 = 1,
    /// ±5 V
    PlusMinus5 = 2,
    /// ±2.5 V
    PlusMinus2Dot5 = 3,
    /// ±1.25 V
    PlusMinus1Dot25 = 4,
    /// ±1 V
    PlusMinus1 = 5,
}

impl Gain {
    /// Integer code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Gain for an integer code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Gain::Unknown),
            1 => Some(Gain::PlusMinus10),
            2 => Some(Gain::PlusMinus5),
            3 => Some(Gain::PlusMinus2Dot5),
            4 => Some(Gain::PlusMinus1Dot25),
            5 => Some(Gain::PlusMinus1),
            _ => None,
        }
    }

    /// Half range in millivolts.
    pub fn range_millivolts(self) -> Option<u32> {
        match self {
            Gain::Unknown => None,
            Gain::PlusMinus10 => Some(10_000),
            Gain::PlusMinus5 => Some(5_000),
            Gain::PlusMinus2Dot5 => Some(2_500),
            Gain::PlusMinus1Dot25 => Some(1_250),
            Gain::PlusMinus1 => Some(1_000),
        }
    }

    /// Gain whose half range is `millivolts`.
    pub fn from_range_millivolts(millivolts: i64) -> Self {
        match millivolts {
            10_000 => Gain::PlusMinus10,
            5_000 => Gain::PlusMinus5,
            2_500 => Gain::PlusMinus2Dot5,
            1_250 => Gain::PlusMinus1Dot25,
            1_000 => Gain::PlusMinus1,
            _ => Gain::Unknown,
        }
    }
}

impl std::fmt::Display for Gain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gain::Unknown => write!(f, "unknown"),
            Gain::PlusMinus10 => write!(f, "+/-10V"),
            Gain::PlusMinus5 => write!(f, "+/-5V"),
            Gain::PlusMinus2Dot5 => write!(f, "+/-2.5V"),
            Gain::PlusMinus1Dot25 => write!(f, "+/-1.25V"),
            Gain::PlusMinus1 => write!(f, "+/-1V"),
        }
    }
}

#[derive(Debug)]
struct AnalogState {
    description: String,
    unit: String,
    gain: Gain,
    scale: f64,
    offset: i32,
    samples: Vec<f64>,
}

impl Default for AnalogState {
    fn default() -> Self {
        Self {
            description: String::new(),
            unit: "V".to_string(),
            gain: Gain::Unknown,
            scale: 1.0,
            offset: 0,
            samples: Vec::new(),
        }
    }
}

/// Handle to an analog channel node.
///
/// Samples are held in physical units. `scale` and `offset` describe the
/// conversion from stored values, `physical = (raw - offset) * scale`, and
/// are only consulted by writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analog {
    node: Node,
}

impl Analog {
    /// Create a detached channel without samples.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_samples(label, Vec::new())
    }

    /// Create a detached channel.
    pub fn with_samples(label: impl Into<String>, samples: Vec<f64>) -> Self {
        let state = AnalogState {
            samples,
            ..AnalogState::default()
        };
        Self {
            node: Node::with_payload(label, state),
        }
    }

    /// View `node` as an analog channel, if it is one.
    pub fn from_node(node: Node) -> Option<Self> {
        node.has_payload::<AnalogState>().then_some(Self { node })
    }

    /// Underlying node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    fn read<R: Default>(&self, f: impl FnOnce(&AnalogState) -> R) -> R {
        self.node.with_state(f).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut AnalogState)) {
        self.node.with_state_mut(f);
    }

    /// Channel label.
    pub fn label(&self) -> String {
        self.node.name()
    }

    /// Rename the channel.
    pub fn set_label(&self, label: impl Into<String>) {
        self.node.set_name(label);
    }

    /// Free-text description.
    pub fn description(&self) -> String {
        self.read(|s| s.description.clone())
    }

    /// Set the description.
    pub fn set_description(&self, description: impl Into<String>) {
        let description = description.into();
        self.update(|s| s.description = description);
    }

    /// Physical unit of the samples.
    pub fn unit(&self) -> String {
        self.read(|s| s.unit.clone())
    }

    /// Set the physical unit.
    pub fn set_unit(&self, unit: impl Into<String>) {
        let unit = unit.into();
        self.update(|s| s.unit = unit);
    }

    /// Converter range.
    pub fn gain(&self) -> Gain {
        self.read(|s| s.gain)
    }

    /// Set the converter range.
    ///
    /// Buffered samples, scale and offset are left untouched; the new gain
    /// only applies to data recorded or written afterwards.
    pub fn set_gain(&self, gain: Gain) {
        self.update(|s| s.gain = gain);
    }

    /// Stored-to-physical scale factor.
    pub fn scale(&self) -> f64 {
        self.read(|s| s.scale)
    }

    /// Set the scale factor.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if `scale` is zero or not finite.
    pub fn set_scale(&self, scale: f64) -> Result<(), ModelError> {
        if !scale.is_finite() || scale == 0.0 {
            return Err(ModelError::inconsistent(format!(
                "analog '{}' scale must be finite and non-zero, got {scale}",
                self.label()
            )));
        }
        self.update(|s| s.scale = scale);
        Ok(())
    }

    /// Stored-value offset.
    pub fn offset(&self) -> i32 {
        self.read(|s| s.offset)
    }

    /// Set the stored-value offset.
    pub fn set_offset(&self, offset: i32) {
        self.update(|s| s.offset = offset);
    }

    /// Number of samples.
    pub fn sample_count(&self) -> usize {
        self.read(|s| s.samples.len())
    }

    /// Samples in physical units.
    pub fn samples(&self) -> Vec<f64> {
        self.read(|s| s.samples.clone())
    }

    /// Sample at `index`.
    pub fn sample(&self, index: usize) -> Option<f64> {
        self.read(|s| s.samples.get(index).copied())
    }

    /// Samples converted back to stored values.
    pub fn raw_samples(&self) -> Vec<f64> {
        self.read(|s| {
            s.samples
                .iter()
                .map(|v| v / s.scale + f64::from(s.offset))
                .collect()
        })
    }

    /// Replace the samples.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if the channel belongs to a trial
    /// expecting another sample count.
    pub fn set_samples(&self, samples: Vec<f64>) -> Result<(), ModelError> {
        if let Some(trial) = owning_trial(&self.node) {
            let expected = trial.analog_sample_count();
            if samples.len() != expected {
                return Err(ModelError::inconsistent(format!(
                    "analog '{}' has {} samples, trial expects {expected}",
                    self.label(),
                    samples.len()
                )));
            }
        }
        self.update(|s| s.samples = samples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_codes() {
        for code in 0..=5 {
            let gain = Gain::from_code(code).unwrap();
            assert_eq!(i64::from(gain.code()), code);
        }
        assert_eq!(Gain::from_code(6), None);
        assert_eq!(Gain::from_range_millivolts(2_500), Gain::PlusMinus2Dot5);
        assert_eq!(Gain::from_range_millivolts(42), Gain::Unknown);
    }

    #[test]
    fn test_set_gain_keeps_samples() {
        let analog = Analog::with_samples("FZ1", vec![0.5, -0.25]);
        analog.set_scale(0.01).unwrap();
        analog.set_offset(2048);
        analog.set_gain(Gain::PlusMinus5);
        assert_eq!(analog.gain(), Gain::PlusMinus5);
        assert_eq!(analog.samples(), vec![0.5, -0.25]);
        assert_eq!(analog.scale(), 0.01);
        assert_eq!(analog.offset(), 2048);
    }

    #[test]
    fn test_raw_samples() {
        let analog = Analog::with_samples("EMG1", vec![1.0, -2.0]);
        analog.set_scale(0.5).unwrap();
        analog.set_offset(10);
        assert_eq!(analog.raw_samples(), vec![12.0, 6.0]);
    }

    #[test]
    fn test_invalid_scale() {
        let analog = Analog::new("FX1");
        assert!(analog.set_scale(0.0).is_err());
        assert!(analog.set_scale(f64::NAN).is_err());
        assert_eq!(analog.scale(), 1.0);
        assert_eq!(analog.unit(), "V");
    }
}
