// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for motion-capture trial files.
//!
//! This module provides the handler interface, the registry dispatching
//! devices to handlers, the built-in formats and file-level helpers.

pub mod detection;
pub mod formats;
pub mod options;
pub mod registry;

// Re-exports
pub use detection::detect_format;
pub use options::{AncOptions, C3dOptions, C3dProcessor, C3dStorage, IoOptions};
pub use registry::{default_registry, HandlerRegistry, ProbeOutcome};

// Traits for format handlers
pub mod traits;
pub use traits::{match_signature, Capability, Signature, TrialHandler};

// File-level reading and writing
pub mod reader;
pub mod writer;
pub use reader::{read_trial, ReaderBuilder};
pub use writer::{write_trial, WriterBuilder};
