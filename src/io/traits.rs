// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Format handler contract.
//!
//! Every trial file format is implemented as a [`TrialHandler`]. Handlers
//! are stateless apart from their options and are shared between threads,
//! so a single registry can serve concurrent decodes on independent
//! devices.
//!
//! A handler treats its device as holding exactly one trial starting at
//! offset 0 and positions the device itself.

use crate::core::{DecodeError, EncodeError, EncodeErrorKind};
use crate::device::Device;
use crate::model::{Trial, TrialField};

/// Operations a handler supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    read: bool,
    write: bool,
}

impl Capability {
    /// Decoding only.
    pub const CAN_READ: Capability = Capability {
        read: true,
        write: false,
    };
    /// Encoding only.
    pub const CAN_WRITE: Capability = Capability {
        read: false,
        write: true,
    };
    /// Decoding and encoding.
    pub const READ_WRITE: Capability = Capability {
        read: true,
        write: true,
    };

    /// Check if decoding is supported.
    pub fn can_read(self) -> bool {
        self.read
    }

    /// Check if encoding is supported.
    pub fn can_write(self) -> bool {
        self.write
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.read, self.write) {
            (true, true) => write!(f, "read/write"),
            (true, false) => write!(f, "read"),
            (false, true) => write!(f, "write"),
            (false, false) => write!(f, "none"),
        }
    }
}

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// The content definitely belongs to the format
    Valid,
    /// The content definitely does not belong to the format
    Invalid,
    /// Not enough bytes to decide
    Indeterminate,
}

/// A trial file format.
///
/// # Example
///
/// ```
/// use mocodec::device::BufferDevice;
/// use mocodec::io::formats::TrcHandler;
/// use mocodec::io::{Signature, TrialHandler};
///
/// let handler = TrcHandler::new();
/// let mut device = BufferDevice::new(b"PathFileType\t4\t(X/Y/Z)\twalk.trc\n".to_vec());
/// assert_eq!(handler.validate_signature(&mut device), Signature::Valid);
/// ```
pub trait TrialHandler: Send + Sync {
    /// Short unique name (e.g. "C3D").
    fn name(&self) -> &'static str;

    /// One-line human description.
    fn description(&self) -> &'static str;

    /// Supported operations.
    fn capability(&self) -> Capability;

    /// Lower-case file suffixes, used as a probing pre-filter.
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Specificity among handlers sharing an extension; higher probes first.
    fn priority(&self) -> i32 {
        0
    }

    /// Inspect the device content.
    ///
    /// Implementations must leave the device position unchanged.
    fn validate_signature(&self, device: &mut dyn Device) -> Signature;

    /// Decode the whole device into a trial.
    ///
    /// A trial is only returned once fully assembled and consistent.
    fn read(&self, device: &mut dyn Device) -> Result<Trial, DecodeError>;

    /// Encode `trial` into the device.
    ///
    /// Read-only handlers keep the default, which fails with
    /// [`EncodeErrorKind::NotWritable`].
    fn write(&self, device: &mut dyn Device, trial: &Trial) -> Result<(), EncodeError> {
        let _ = trial;
        Err(EncodeError::new(
            self.name(),
            device.tell(),
            "trial",
            EncodeErrorKind::NotWritable,
        ))
    }

    /// Trial fields an encode/decode cycle through this format loses.
    fn discarded_fields(&self) -> &'static [TrialField] {
        &[]
    }

    /// Check if `extension` (without dot, any case) belongs to the format.
    fn claims_extension(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

/// Compare the bytes at `offset` with `expected`, restoring the position.
///
/// A device too short to hold the whole signature yields
/// [`Signature::Indeterminate`] when the available prefix matches.
pub fn match_signature(device: &mut dyn Device, offset: u64, expected: &[u8]) -> Signature {
    let start = device.tell();
    let sampled = sample_at(device, offset, expected.len());
    if device.seek(start).is_err() {
        return Signature::Invalid;
    }
    match sampled {
        Some(bytes) if bytes == expected => Signature::Valid,
        Some(bytes) if bytes.len() < expected.len() && expected.starts_with(&bytes) => {
            Signature::Indeterminate
        }
        _ => Signature::Invalid,
    }
}

/// Read up to `count` bytes at `offset`, leaving the device wherever the
/// read ended; callers restore the position.
pub(crate) fn sample_at(device: &mut dyn Device, offset: u64, count: usize) -> Option<Vec<u8>> {
    if offset > device.size() {
        return Some(Vec::new());
    }
    device.seek(offset).ok()?;
    device.peek(count).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BufferDevice;

    #[test]
    fn test_capability_flags() {
        assert!(Capability::READ_WRITE.can_read());
        assert!(Capability::READ_WRITE.can_write());
        assert!(!Capability::CAN_READ.can_write());
        assert_eq!(Capability::CAN_READ.to_string(), "read");
    }

    #[test]
    fn test_match_signature_restores_position() {
        let mut device = BufferDevice::new(b"xxNO_OF_FRAMES\t10".to_vec());
        device.seek(5).unwrap();
        assert_eq!(
            match_signature(&mut device, 2, b"NO_OF_FRAMES"),
            Signature::Valid
        );
        assert_eq!(device.tell(), 5);
        assert_eq!(
            match_signature(&mut device, 0, b"NO_OF_FRAMES"),
            Signature::Invalid
        );
        assert_eq!(device.tell(), 5);
    }

    #[test]
    fn test_short_device_is_indeterminate() {
        let mut device = BufferDevice::new(b"Path".to_vec());
        assert_eq!(
            match_signature(&mut device, 0, b"PathFileType"),
            Signature::Indeterminate
        );
        let mut device = BufferDevice::new(b"Pz".to_vec());
        assert_eq!(
            match_signature(&mut device, 0, b"PathFileType"),
            Signature::Invalid
        );
    }
}
