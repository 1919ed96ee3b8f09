// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Writing trials to files.
//!
//! The format defaults to the one claiming the output extension. A failed
//! write removes the output file unless asked to keep it.
//!
//! # Example
//!
//! ```rust,no_run
//! use mocodec::io::{write_trial, C3dOptions, C3dStorage, IoOptions, WriterBuilder};
//! use mocodec::model::Trial;
//!
//! let trial = Trial::with_frames(100.0, 10)?;
//! write_trial("walk.c3d", &trial)?;
//!
//! let options = IoOptions {
//!     c3d: C3dOptions {
//!         storage: C3dStorage::Integer,
//!         ..C3dOptions::default()
//!     },
//!     ..IoOptions::default()
//! };
//! WriterBuilder::new()
//!     .path("walk_int.c3d")
//!     .options(options)
//!     .write(&trial)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;

pub use builder::{WriterBuilder, WriterConfig};

use std::path::Path;

use crate::core::Result;
use crate::model::Trial;

/// Encode `trial` to `path` in the format claiming its extension.
///
/// # Errors
///
/// - [`TrialError::UnknownFormat`](crate::TrialError::UnknownFormat) if no
///   handler claims the extension
/// - [`TrialError::NotWritable`](crate::TrialError::NotWritable) for a
///   read-only format
/// - [`TrialError::Device`](crate::TrialError::Device) if the file cannot be created
/// - [`TrialError::Encode`](crate::TrialError::Encode) if encoding fails
pub fn write_trial<P: AsRef<Path>>(path: P, trial: &Trial) -> Result<()> {
    WriterBuilder::new().path(path).write(trial)
}
