// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! C3D biomechanics files.
//!
//! A C3D file is a sequence of 512-byte blocks:
//!
//! ```text
//! block 1        header (counts, rates, scale, header events)
//! block N..      parameter section, N given by byte 0 of the header
//! DATA_START..   frames: points (x, y, z, residual word), then analogs
//! ```
//!
//! The processor byte of the parameter section selects the byte order and
//! real layout of everything in the file: Intel (little endian), DEC
//! (little endian, VAX reals) or MIPS (big endian). Samples are stored as
//! 16-bit integers scaled by `POINT:SCALE`, or as reals when the scale is
//! negative.
//!
//! Parameters describing the model (counts, labels, rates, scales, events)
//! are decoded into the trial and stripped from its metadata; every other
//! group and parameter is kept verbatim and written back in order.
//!
//! Signature: byte 1 is `0x50` and byte 0 points past the header block.

mod constants;
mod header;
mod parameters;
mod reader;
mod writer;

pub use header::{Header, HeaderEvent};

use crate::core::{DecodeError, DeviceError, EncodeError};
use crate::device::Device;
use crate::io::options::C3dOptions;
use crate::io::traits::{sample_at, Capability, Signature, TrialHandler};
use crate::model::Trial;

use constants::PARAMETER_KEY;

pub(crate) const FORMAT: &str = "C3D";

/// Move to `position`, reporting a position past the end as a truncation
/// at the end of the device.
pub(crate) fn seek_to(
    device: &mut dyn Device,
    position: u64,
    context: &str,
) -> Result<(), DecodeError> {
    let size = device.size();
    if position > size {
        let missing = usize::try_from(position - size).unwrap_or(usize::MAX);
        return Err(DecodeError::device(
            FORMAT,
            context,
            DeviceError::truncated(size, missing, 0),
        ));
    }
    device
        .seek(position)
        .map_err(|e| DecodeError::device(FORMAT, context, e))
}

/// C3D handler.
#[derive(Debug, Clone, Default)]
pub struct C3dHandler {
    options: C3dOptions,
}

impl C3dHandler {
    /// Create a handler with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler writing with `options`.
    pub fn with_options(options: C3dOptions) -> Self {
        Self { options }
    }

    /// Encoder options.
    pub fn options(&self) -> &C3dOptions {
        &self.options
    }
}

impl TrialHandler for C3dHandler {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "C3D biomechanics data (.c3d)"
    }

    fn capability(&self) -> Capability {
        Capability::READ_WRITE
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["c3d"]
    }

    fn validate_signature(&self, device: &mut dyn Device) -> Signature {
        let start = device.tell();
        let sampled = sample_at(device, 0, 2);
        if device.seek(start).is_err() {
            return Signature::Invalid;
        }
        match sampled.as_deref() {
            Some([block, key]) if *key == PARAMETER_KEY && *block >= 2 => Signature::Valid,
            Some([_, _]) => Signature::Invalid,
            Some([_]) | Some([]) | None => Signature::Indeterminate,
            Some(_) => Signature::Invalid,
        }
    }

    fn read(&self, device: &mut dyn Device) -> Result<Trial, DecodeError> {
        reader::read_trial(device)
    }

    fn write(&self, device: &mut dyn Device, trial: &Trial) -> Result<(), EncodeError> {
        writer::write_trial(device, trial, &self.options)
    }
}
