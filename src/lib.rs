// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # mocodec
//!
//! Motion-capture trial I/O: one in-memory model for marker trajectories,
//! analog channels, events and metadata, and pluggable handlers that
//! decode and encode it from biomechanics file formats.
//!
//! - **Devices** in [`device`]: seekable byte streams over memory-mapped
//!   files or buffers, with per-call byte order
//! - **Node graph** in [`node`]: shared, named nodes with properties and
//!   ordered children
//! - **Model** in [`model`]: [`Trial`], points, analogs, events and
//!   metadata as typed views over the node graph
//! - **Formats** in [`io::formats`]: C3D, TRC, ANC and TSV handlers behind
//!   the [`TrialHandler`](io::TrialHandler) trait
//!
//! ## Architecture
//!
//! - `core/` - Errors and property values
//! - `device/` - Binary devices and byte orders
//! - `node/` - Node graph
//! - `model/` - Trial model, invariants and comparison
//! - `io/` - Handler trait, registry, format handlers, file helpers
//!
//! ## Example: Reading a trial
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use mocodec::io::read_trial;
//!
//! let trial = read_trial("walk.c3d")?;
//! for point in trial.points() {
//!     println!("{}: {} frames", point.label(), point.frame_count());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Converting between formats
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use mocodec::io::{read_trial, write_trial};
//!
//! let trial = read_trial("walk.c3d")?;
//! trial.remove_analog("EMG1");
//! write_trial("walk.trc", &trial)?;
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{
    DecodeError, DeviceError, EncodeError, ModelError, NodeError, PropertyValue, Result,
    TrialError,
};

// Binary devices
pub mod device;

// Node graph
pub mod node;

// Trial model
pub mod model;

pub use model::{Analog, Event, EventTime, Gain, Metadata, Point, PointKind, Trial, TrialField};

// I/O (handlers, registry, formats, file helpers)
pub mod io;

pub use io::{read_trial, write_trial, HandlerRegistry, IoOptions, TrialHandler};
