// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Format detection from file names and content.
//!
//! Extensions are only a hint: the registry probes the handlers claiming
//! the extension first, then every other handler, and the content
//! signature decides.
//!
//! # Example
//!
//! ```rust,no_run
//! use mocodec::io::detection::detect_format;
//!
//! let format = detect_format("walk.c3d")?;
//! assert_eq!(format, "C3D");
//! # Ok::<(), mocodec::TrialError>(())
//! ```

use std::path::Path;

use crate::core::TrialError;
use crate::device::{Device, FileDevice, OpenMode};

use super::registry::{default_registry, ProbeOutcome};

/// Number of leading bytes kept for diagnostics.
pub const SAMPLE_LEN: usize = 16;

/// Lower-case extension of a file or device name.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Read the leading bytes of a device without moving it.
pub fn sample_leading_bytes(device: &mut dyn Device) -> Vec<u8> {
    let start = device.tell();
    let sampled = super::traits::sample_at(device, 0, SAMPLE_LEN).unwrap_or_default();
    let _ = device.seek(start);
    sampled
}

/// Detect the format of a file with the built-in handlers.
///
/// Returns the name of the matching handler.
///
/// # Errors
///
/// - [`TrialError::Device`] if the file cannot be opened
/// - [`TrialError::NoMatch`] if no handler recognises the content
pub fn detect_format<P: AsRef<Path>>(path: P) -> Result<&'static str, TrialError> {
    let mut device = FileDevice::open(path, OpenMode::Read)?;
    match default_registry().probe(&mut device) {
        ProbeOutcome::Matched(handler) => Ok(handler.name()),
        ProbeOutcome::NoMatch { sampled } => Err(TrialError::NoMatch { sampled }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BufferDevice;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("data/Walk01.C3D").as_deref(), Some("c3d"));
        assert_eq!(extension_of("trial.trc").as_deref(), Some("trc"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("<memory>"), None);
    }

    #[test]
    fn test_sample_leading_bytes() {
        let mut device = BufferDevice::new((0u8..32).collect());
        device.seek(20).unwrap();
        let sampled = sample_leading_bytes(&mut device);
        assert_eq!(sampled, (0u8..16).collect::<Vec<_>>());
        assert_eq!(device.tell(), 20);

        let mut device = BufferDevice::new(vec![1, 2, 3]);
        assert_eq!(sample_leading_bytes(&mut device), vec![1, 2, 3]);
    }

    #[test]
    fn test_detect_missing_file() {
        let err = detect_format("/nonexistent/walk.c3d").unwrap_err();
        assert!(matches!(err, TrialError::Device(_)));
    }
}
