// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! C3D layout constants.
//!
//! Word numbers in the comments are the 1-based 16-bit words of the header
//! block, as the format documentation counts them.

/// Size of every header, parameter and data block.
pub const BLOCK_SIZE: u64 = 512;

/// Second byte of the header and of the parameter section.
pub const PARAMETER_KEY: u8 = 0x50;

/// Block holding the parameter section in files we write.
pub const PARAMETER_BLOCK: u8 = 2;

/// Marker of the four-character event label support (word 150).
pub const EVENT_LABEL_KEY: u16 = 0x3039;

/// Events stored in the header block.
pub const MAX_HEADER_EVENTS: usize = 18;

// Header byte offsets
/// Word 2: points per frame.
pub const HDR_POINT_COUNT: u64 = 2;
/// Word 150: event label key.
pub const HDR_EVENT_KEY: u64 = 298;
/// Word 151: header event count.
pub const HDR_EVENT_COUNT: u64 = 300;
/// Words 153-188: event times as reals.
pub const HDR_EVENT_TIMES: u64 = 304;
/// Words 189-197: event display flags, one byte each.
pub const HDR_EVENT_FLAGS: u64 = 376;
/// Words 199-234: event labels, four characters each.
pub const HDR_EVENT_LABELS: u64 = 396;

// Parameter type codes
/// Character data.
pub const TYPE_CHAR: i8 = -1;
/// Signed byte.
pub const TYPE_BYTE: i8 = 1;
/// 16-bit integer.
pub const TYPE_INT: i8 = 2;
/// 32-bit real.
pub const TYPE_FLOAT: i8 = 4;

/// Deepest dimension list the reader maps to arrays.
pub const MAX_DIMENSIONS: usize = 7;

/// Point parameters.
pub const GROUP_POINT: &str = "POINT";
/// Analog parameters.
pub const GROUP_ANALOG: &str = "ANALOG";
/// Event parameters.
pub const GROUP_EVENT: &str = "EVENT";
/// Trial parameters; only the frame range fields are managed.
pub const GROUP_TRIAL: &str = "TRIAL";

const POINT_MANAGED: &[&str] = &[
    "USED",
    "FRAMES",
    "SCALE",
    "RATE",
    "DATA_START",
    "UNITS",
    "ANGLE_UNITS",
    "FORCE_UNITS",
    "MOMENT_UNITS",
    "POWER_UNITS",
    "SCALAR_UNITS",
    "ANGLES",
    "FORCES",
    "MOMENTS",
    "POWERS",
    "SCALARS",
    "REACTIONS",
];

const ANALOG_MANAGED: &[&str] = &[
    "USED", "SCALE", "GEN_SCALE", "OFFSET", "UNITS", "RATE", "GAIN", "FORMAT",
];

const EVENT_MANAGED: &[&str] = &[
    "USED",
    "LABELS",
    "CONTEXTS",
    "DESCRIPTIONS",
    "SUBJECTS",
    "TIMES",
];

const TRIAL_MANAGED: &[&str] = &["ACTUAL_START_FIELD", "ACTUAL_END_FIELD"];

/// Check if `name` is `prefix` optionally followed by a block number
/// (`LABELS`, `LABELS2`, ...).
pub fn is_numbered(name: &str, prefix: &str) -> bool {
    match (name.get(..prefix.len()), name.get(prefix.len()..)) {
        (Some(head), Some(tail)) => {
            head.eq_ignore_ascii_case(prefix) && tail.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

/// Check if `group:name` is derived from the trial model.
///
/// Managed parameters are removed from the decoded metadata and
/// regenerated from the model when writing.
pub fn is_managed(group: &str, name: &str) -> bool {
    let listed = |names: &[&str]| names.iter().any(|n| n.eq_ignore_ascii_case(name));
    if group.eq_ignore_ascii_case(GROUP_POINT) {
        listed(POINT_MANAGED) || is_numbered(name, "LABELS") || is_numbered(name, "DESCRIPTIONS")
    } else if group.eq_ignore_ascii_case(GROUP_ANALOG) {
        listed(ANALOG_MANAGED) || is_numbered(name, "LABELS") || is_numbered(name, "DESCRIPTIONS")
    } else if group.eq_ignore_ascii_case(GROUP_EVENT) {
        listed(EVENT_MANAGED)
    } else if group.eq_ignore_ascii_case(GROUP_TRIAL) {
        listed(TRIAL_MANAGED)
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_names() {
        assert!(is_numbered("LABELS", "LABELS"));
        assert!(is_numbered("labels2", "LABELS"));
        assert!(!is_numbered("LABELSX", "LABELS"));
        assert!(!is_numbered("LAB", "LABELS"));
    }

    #[test]
    fn test_managed_parameters() {
        assert!(is_managed("point", "Rate"));
        assert!(is_managed("POINT", "LABELS3"));
        assert!(is_managed("ANALOG", "GEN_SCALE"));
        assert!(!is_managed("ANALOG", "BITS"));
        assert!(is_managed("TRIAL", "ACTUAL_END_FIELD"));
        assert!(!is_managed("TRIAL", "CAMERA_RATE"));
        assert!(!is_managed("FORCE_PLATFORM", "USED"));
    }
}
