// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for mocodec.
//!
//! The taxonomy follows the layers of the library:
//! - [`DeviceError`] - positioning and byte I/O failures
//! - [`NodeError`] - graph structure violations
//! - [`ModelError`] - trial invariant violations
//! - [`DecodeError`] / [`EncodeError`] - format handler failures, carrying
//!   the byte offset and the wrapped lower-level cause
//! - [`TrialError`] - umbrella type returned by the registry and the
//!   convenience readers/writers

use thiserror::Error;

use crate::device::OpenMode;

/// Errors raised by a [`Device`](crate::device::Device).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    /// The underlying source could not be opened
    #[error("Device '{name}' is unavailable: {reason}")]
    Unavailable {
        /// File path or buffer name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Permission failure while opening the source
    #[error("Access denied to '{name}': {reason}")]
    AccessDenied {
        /// File path or buffer name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Seek target outside the readable range
    #[error("Position {position} is out of range (device size: {size})")]
    OutOfRange {
        /// Requested absolute position
        position: u64,
        /// Device size at the time of the seek
        size: u64,
    },

    /// Read past the end of the stream
    #[error("Truncated read: requested {requested} bytes at offset {offset}, but only {available} bytes available")]
    Truncated {
        /// Offset at which the read started
        offset: u64,
        /// Requested byte count
        requested: usize,
        /// Bytes remaining at `offset`
        available: u64,
    },

    /// The underlying write or flush failed
    #[error("Write failed at offset {offset}: {reason}")]
    WriteFailed {
        /// Offset at which the write started
        offset: u64,
        /// Underlying failure
        reason: String,
    },

    /// The operation is not permitted by the open mode
    #[error("Device opened in {mode} mode does not permit {operation}")]
    InvalidMode {
        /// Mode the device was opened with
        mode: OpenMode,
        /// Rejected operation
        operation: &'static str,
    },
}

impl DeviceError {
    /// Map an `std::io::Error` raised while opening `name`.
    pub fn from_open(name: impl Into<String>, err: &std::io::Error) -> Self {
        let name = name.into();
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => DeviceError::AccessDenied {
                name,
                reason: err.to_string(),
            },
            _ => DeviceError::Unavailable {
                name,
                reason: err.to_string(),
            },
        }
    }

    /// Create a truncated read error.
    pub fn truncated(offset: u64, requested: usize, available: u64) -> Self {
        DeviceError::Truncated {
            offset,
            requested,
            available,
        }
    }

    /// Create a write failure.
    pub fn write_failed(offset: u64, reason: impl Into<String>) -> Self {
        DeviceError::WriteFailed {
            offset,
            reason: reason.into(),
        }
    }

    /// Byte offset associated with the failure, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            DeviceError::OutOfRange { position, .. } => Some(*position),
            DeviceError::Truncated { offset, .. } => Some(*offset),
            DeviceError::WriteFailed { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Errors raised by the node graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    /// The child is the parent itself or one of its ancestors
    #[error("Adding '{child}' under '{parent}' would create a cycle")]
    CycleDetected {
        /// Name of the node receiving the child
        parent: String,
        /// Name of the rejected child
        child: String,
    },
}

/// Errors raised when a trial invariant would be broken.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The requested state violates a trial invariant
    #[error("Inconsistent trial: {reason}")]
    Inconsistent {
        /// Violated invariant
        reason: String,
    },

    /// Graph failure while assembling the model
    #[error(transparent)]
    Node(#[from] NodeError),
}

impl ModelError {
    /// Create an inconsistency error.
    pub fn inconsistent(reason: impl Into<String>) -> Self {
        ModelError::Inconsistent {
            reason: reason.into(),
        }
    }
}

/// Cause of a [`DecodeError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeErrorKind {
    /// Device failure (most often a truncated block)
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Decoded content violates the trial invariants
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Sub-version or variant the handler does not implement
    #[error("unsupported {0}")]
    UnsupportedVersion(String),

    /// Content does not follow the format layout
    #[error("{0}")]
    Malformed(String),
}

/// A format handler could not map its input to a consistent trial.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{format} decode error: invalid {context} at offset {offset}: {kind}")]
pub struct DecodeError {
    /// Handler name
    pub format: &'static str,
    /// Byte offset where decoding failed
    pub offset: u64,
    /// Structure being decoded (e.g. "analog block")
    pub context: String,
    /// Underlying cause
    #[source]
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    /// Create a decode error.
    pub fn new(
        format: &'static str,
        offset: u64,
        context: impl Into<String>,
        kind: DecodeErrorKind,
    ) -> Self {
        Self {
            format,
            offset,
            context: context.into(),
            kind,
        }
    }

    /// Create a malformed-layout error.
    pub fn malformed(
        format: &'static str,
        offset: u64,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            format,
            offset,
            context,
            DecodeErrorKind::Malformed(message.into()),
        )
    }

    /// Create an unsupported-variant error.
    pub fn unsupported(
        format: &'static str,
        offset: u64,
        context: impl Into<String>,
        what: impl Into<String>,
    ) -> Self {
        Self::new(
            format,
            offset,
            context,
            DecodeErrorKind::UnsupportedVersion(what.into()),
        )
    }

    /// Wrap a device failure, taking the offset from the device error.
    pub fn device(format: &'static str, context: impl Into<String>, err: DeviceError) -> Self {
        let offset = err.offset().unwrap_or(0);
        Self::new(format, offset, context, DecodeErrorKind::Device(err))
    }

    /// Wrap a model failure raised while finalizing the decoded trial.
    pub fn model(format: &'static str, offset: u64, err: ModelError) -> Self {
        Self::new(format, offset, "trial", DecodeErrorKind::Model(err))
    }
}

/// Cause of an [`EncodeError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeErrorKind {
    /// Device failure while writing
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The trial handed to the writer is inconsistent
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The trial holds data the format cannot represent
    #[error("cannot represent {0}")]
    Unrepresentable(String),

    /// The handler is read-only
    #[error("format is read-only")]
    NotWritable,
}

fn incomplete_note(incomplete: &bool) -> &'static str {
    if *incomplete {
        " (output is incomplete)"
    } else {
        ""
    }
}

/// A format handler could not serialize a trial.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{format} encode error: {context} at offset {offset}: {kind}{}", incomplete_note(.incomplete))]
pub struct EncodeError {
    /// Handler name
    pub format: &'static str,
    /// Device offset when the failure occurred
    pub offset: u64,
    /// Structure being encoded
    pub context: String,
    /// Underlying cause
    #[source]
    pub kind: EncodeErrorKind,
    /// Bytes already reached the device; the output must not be trusted
    pub incomplete: bool,
}

impl EncodeError {
    /// Create an encode error.
    pub fn new(
        format: &'static str,
        offset: u64,
        context: impl Into<String>,
        kind: EncodeErrorKind,
    ) -> Self {
        Self {
            format,
            offset,
            context: context.into(),
            kind,
            incomplete: false,
        }
    }

    /// Create an "unrepresentable data" error.
    pub fn unrepresentable(
        format: &'static str,
        context: impl Into<String>,
        what: impl Into<String>,
    ) -> Self {
        Self::new(
            format,
            0,
            context,
            EncodeErrorKind::Unrepresentable(what.into()),
        )
    }

    /// Wrap a model inconsistency found before encoding.
    pub fn model(format: &'static str, err: ModelError) -> Self {
        Self::new(format, 0, "trial", EncodeErrorKind::Model(err))
    }

    /// Wrap a device failure.
    pub fn device(format: &'static str, context: impl Into<String>, err: DeviceError) -> Self {
        let offset = err.offset().unwrap_or(0);
        Self::new(format, offset, context, EncodeErrorKind::Device(err))
    }

    /// Wrap a failure of a write to the output device.
    ///
    /// The output is flagged incomplete: the medium may hold part of the
    /// write. A device that refuses writes outright leaves it untouched.
    pub fn device_write(
        format: &'static str,
        context: impl Into<String>,
        err: DeviceError,
    ) -> Self {
        let touched = !matches!(err, DeviceError::InvalidMode { .. });
        Self::device(format, context, err).with_incomplete(touched)
    }

    /// Flag the output as incomplete.
    pub fn with_incomplete(mut self, incomplete: bool) -> Self {
        self.incomplete = incomplete;
        self
    }
}

/// Errors returned by the registry and the convenience I/O layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrialError {
    /// Device failure outside of a handler
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Graph failure
    #[error(transparent)]
    Node(#[from] NodeError),

    /// Invariant violation
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Handler decode failure
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Handler encode failure
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// No registered handler recognised the input
    #[error("No handler recognised the input (leading bytes: {})", hex::encode(.sampled))]
    NoMatch {
        /// Leading bytes sampled from the device
        sampled: Vec<u8>,
    },

    /// No handler is registered under the name or extension
    #[error("Unknown trial format '{0}'")]
    UnknownFormat(String),

    /// The handler does not declare the read capability
    #[error("Format '{0}' cannot be read")]
    NotReadable(String),

    /// The handler does not declare the write capability
    #[error("Format '{0}' cannot be written")]
    NotWritable(String),

    /// Options file could not be loaded
    #[error("Invalid configuration '{path}': {reason}")]
    Config {
        /// Path of the options file
        path: String,
        /// Parse or I/O failure
        reason: String,
    },
}

impl TrialError {
    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            TrialError::Device(err) => {
                let mut fields = vec![("device", err.to_string())];
                if let Some(offset) = err.offset() {
                    fields.push(("offset", offset.to_string()));
                }
                fields
            }
            TrialError::Node(err) => vec![("node", err.to_string())],
            TrialError::Model(err) => vec![("model", err.to_string())],
            TrialError::Decode(err) => vec![
                ("format", err.format.to_string()),
                ("offset", err.offset.to_string()),
                ("context", err.context.clone()),
                ("cause", err.kind.to_string()),
            ],
            TrialError::Encode(err) => vec![
                ("format", err.format.to_string()),
                ("offset", err.offset.to_string()),
                ("context", err.context.clone()),
                ("cause", err.kind.to_string()),
                ("incomplete", err.incomplete.to_string()),
            ],
            TrialError::NoMatch { sampled } => vec![("sampled", hex::encode(sampled))],
            TrialError::UnknownFormat(name) => vec![("format", name.clone())],
            TrialError::NotReadable(name) | TrialError::NotWritable(name) => {
                vec![("format", name.clone())]
            }
            TrialError::Config { path, reason } => {
                vec![("path", path.clone()), ("reason", reason.clone())]
            }
        }
    }

    /// Whether a failed write left partial output behind.
    pub fn is_incomplete_output(&self) -> bool {
        matches!(self, TrialError::Encode(err) if err.incomplete)
    }
}

/// Result type for mocodec operations.
pub type Result<T> = std::result::Result<T, TrialError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_truncated_display() {
        let err = DeviceError::truncated(510, 4, 2);
        assert_eq!(
            err.to_string(),
            "Truncated read: requested 4 bytes at offset 510, but only 2 bytes available"
        );
        assert_eq!(err.offset(), Some(510));
    }

    #[test]
    fn test_from_open_permission_denied() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = DeviceError::from_open("/tmp/x.c3d", &io_err);
        assert!(matches!(err, DeviceError::AccessDenied { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = DeviceError::from_open("/tmp/x.c3d", &io_err);
        assert!(matches!(err, DeviceError::Unavailable { .. }));
    }

    #[test]
    fn test_decode_error_wraps_device_cause() {
        let err = DecodeError::device("C3D", "analog block", DeviceError::truncated(512, 2, 0));
        assert_eq!(err.offset, 512);
        assert_eq!(
            err.to_string(),
            "C3D decode error: invalid analog block at offset 512: Truncated read: requested 2 bytes at offset 512, but only 0 bytes available"
        );
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("Truncated read"));
    }

    #[test]
    fn test_encode_error_incomplete_note() {
        let err = EncodeError::unrepresentable("TRC", "analog channels", "2 analog channels");
        assert!(!err.to_string().contains("incomplete"));
        let err = err.with_incomplete(true);
        assert!(err.to_string().ends_with("(output is incomplete)"));

        let trial_err: TrialError = err.into();
        assert!(trial_err.is_incomplete_output());
    }

    #[test]
    fn test_no_match_display_hex() {
        let err = TrialError::NoMatch {
            sampled: vec![0xde, 0xad, 0xbe, 0xef],
        };
        assert_eq!(
            err.to_string(),
            "No handler recognised the input (leading bytes: deadbeef)"
        );
    }

    #[test]
    fn test_model_error_from_node_error() {
        let node_err = NodeError::CycleDetected {
            parent: "a".to_string(),
            child: "b".to_string(),
        };
        let err: ModelError = node_err.clone().into();
        assert_eq!(err, ModelError::Node(node_err));
    }

    #[test]
    fn test_log_fields_decode() {
        let err: TrialError = DecodeError::malformed("TRC", 42, "header", "bad line").into();
        let fields = err.log_fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], ("format", "TRC".to_string()));
        assert_eq!(fields[1], ("offset", "42".to_string()));
        assert_eq!(fields[2], ("context", "header".to_string()));
        assert_eq!(fields[3], ("cause", "bad line".to_string()));
    }

    #[test]
    fn test_log_fields_encode_incomplete() {
        let err: TrialError = EncodeError::unrepresentable("C3D", "points", "256 points")
            .with_incomplete(true)
            .into();
        let fields = err.log_fields();
        assert_eq!(fields.last(), Some(&("incomplete", "true".to_string())));
    }
}
