// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Reading trials from files.
//!
//! The format is detected from the content, with the file extension used
//! only to order the probes. A format can be forced to skip detection.
//!
//! # Example
//!
//! ```rust,no_run
//! use mocodec::io::{read_trial, ReaderBuilder};
//!
//! // Detect the format
//! let trial = read_trial("walk.c3d")?;
//!
//! // Force a format
//! let trial = ReaderBuilder::new()
//!     .path("walk.txt")
//!     .format("TRC")
//!     .read()?;
//! println!("{} points", trial.point_count());
//! # Ok::<(), mocodec::TrialError>(())
//! ```

pub mod builder;

pub use builder::{ReaderBuilder, ReaderConfig};

use std::path::Path;

use crate::core::Result;
use crate::model::Trial;

/// Decode the trial stored at `path` with the built-in handlers.
///
/// # Errors
///
/// - [`TrialError::Device`](crate::TrialError::Device) if the file cannot be opened
/// - [`TrialError::NoMatch`](crate::TrialError::NoMatch) if no handler
///   recognises the content
/// - [`TrialError::Decode`](crate::TrialError::Decode) if decoding fails
pub fn read_trial<P: AsRef<Path>>(path: P) -> Result<Trial> {
    ReaderBuilder::new().path(path).read()
}
