// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Trial file format implementations.
//!
//! | Handler | Capability | Extensions | Signature |
//! |---|---|---|---|
//! | [`c3d`] | read/write | `c3d` | byte 1 is `0x50`, byte 0 points past the header block |
//! | [`trc`] | read/write | `trc` | starts with `PathFileType` |
//! | [`anc`] | read/write | `anc` | starts with `File_Type:` |
//! | [`tsv`] | read | `tsv` | starts with `NO_OF_FRAMES` |

pub mod anc;
pub mod c3d;
pub(crate) mod text;
pub mod trc;
pub mod tsv;

pub use anc::AncHandler;
pub use c3d::C3dHandler;
pub use trc::TrcHandler;
pub use tsv::TsvHandler;
