// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Handler options.
//!
//! Options only affect encoding; decoders always follow what the file
//! declares. They can be loaded from TOML:
//!
//! ```toml
//! [c3d]
//! processor = "dec"
//! storage = "integer"
//! integer_point_scale = 0.05
//!
//! [anc]
//! bit_depth = 12
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::TrialError;
use crate::device::Endian;

/// Processor type recorded in a C3D parameter section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum C3dProcessor {
    /// Intel x86: little endian, IEEE reals
    #[default]
    Intel,
    /// DEC VAX: little endian, VAX reals
    Dec,
    /// MIPS/SGI: big endian, IEEE reals
    Mips,
}

impl C3dProcessor {
    /// Code stored in the parameter section header.
    pub fn code(self) -> u8 {
        match self {
            C3dProcessor::Intel => 84,
            C3dProcessor::Dec => 85,
            C3dProcessor::Mips => 86,
        }
    }

    /// Processor for a stored code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            84 => Some(C3dProcessor::Intel),
            85 => Some(C3dProcessor::Dec),
            86 => Some(C3dProcessor::Mips),
            _ => None,
        }
    }

    /// Byte order and real layout of the processor.
    pub fn endian(self) -> Endian {
        match self {
            C3dProcessor::Intel => Endian::Little,
            C3dProcessor::Dec => Endian::Vax,
            C3dProcessor::Mips => Endian::Big,
        }
    }
}

/// Storage of C3D point and analog samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum C3dStorage {
    /// 32-bit reals
    #[default]
    Float,
    /// 16-bit integers scaled by `POINT:SCALE`
    Integer,
}

/// C3D encoder options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct C3dOptions {
    /// Processor type, which fixes the byte order
    pub processor: C3dProcessor,
    /// Sample storage
    pub storage: C3dStorage,
    /// Magnitude of `POINT:SCALE`: the coordinate step with integer
    /// storage and the residual step with either storage
    pub integer_point_scale: f32,
}

impl Default for C3dOptions {
    fn default() -> Self {
        Self {
            processor: C3dProcessor::Intel,
            storage: C3dStorage::Float,
            integer_point_scale: 0.1,
        }
    }
}

/// ANC encoder options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AncOptions {
    /// Converter resolution in bits
    pub bit_depth: u8,
}

impl Default for AncOptions {
    fn default() -> Self {
        Self { bit_depth: 16 }
    }
}

/// Options for every built-in handler.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IoOptions {
    /// C3D encoder options
    pub c3d: C3dOptions,
    /// ANC encoder options
    pub anc: AncOptions,
}

impl IoOptions {
    /// Parse options from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, TrialError> {
        Self::parse(text, "<string>")
    }

    /// Load options from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrialError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TrialError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(text: &str, origin: &str) -> Result<Self, TrialError> {
        let options: IoOptions = toml::from_str(text).map_err(|e| TrialError::Config {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        options.validate(origin)?;
        Ok(options)
    }

    fn validate(&self, origin: &str) -> Result<(), TrialError> {
        let scale = self.c3d.integer_point_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(TrialError::Config {
                path: origin.to_string(),
                reason: format!("c3d.integer_point_scale must be positive, got {scale}"),
            });
        }
        if !(2..=32).contains(&self.anc.bit_depth) {
            return Err(TrialError::Config {
                path: origin.to_string(),
                reason: format!(
                    "anc.bit_depth must be between 2 and 32, got {}",
                    self.anc.bit_depth
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = IoOptions::default();
        assert_eq!(options.c3d.processor, C3dProcessor::Intel);
        assert_eq!(options.c3d.storage, C3dStorage::Float);
        assert_eq!(options.c3d.integer_point_scale, 0.1);
        assert_eq!(options.anc.bit_depth, 16);
    }

    #[test]
    fn test_partial_toml() {
        let options = IoOptions::from_toml_str("[c3d]\nprocessor = \"mips\"\n").unwrap();
        assert_eq!(options.c3d.processor, C3dProcessor::Mips);
        assert_eq!(options.c3d.storage, C3dStorage::Float);
        assert_eq!(options.anc, AncOptions::default());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = IoOptions::from_toml_str("[c3d]\nprocessor = \"arm\"\n").unwrap_err();
        assert!(matches!(err, TrialError::Config { .. }));
        let err = IoOptions::from_toml_str("[anc]\nbit_depth = 1\n").unwrap_err();
        assert!(matches!(err, TrialError::Config { .. }));
    }

    #[test]
    fn test_processor_codes() {
        for processor in [C3dProcessor::Intel, C3dProcessor::Dec, C3dProcessor::Mips] {
            assert_eq!(C3dProcessor::from_code(processor.code()), Some(processor));
        }
        assert_eq!(C3dProcessor::Dec.endian(), Endian::Vax);
        assert_eq!(C3dProcessor::from_code(83), None);
    }
}
