// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout mocodec.
//!
//! This module provides the foundational types for the library:
//! - [`TrialError`] and the layered error taxonomy
//! - [`PropertyValue`] - tagged value stored in node properties

pub mod error;
pub mod value;

pub use error::{
    DecodeError, DecodeErrorKind, DeviceError, EncodeError, EncodeErrorKind, ModelError,
    NodeError, Result, TrialError,
};
pub use value::PropertyValue;
