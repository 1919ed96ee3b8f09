// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Domain model of a motion-capture trial.
//!
//! A [`Trial`] is a typed view over a root [`Node`](crate::node::Node) with
//! four child collections:
//!
//! ```text
//! Trial
//! ├── Points    (one node per Point)
//! ├── Analogs   (one node per Analog)
//! ├── Events    (one node per Event)
//! └── Metadata  (group nodes holding entry nodes)
//! ```
//!
//! Domain state (rates, samples, gains, times) lives in module-private
//! payloads attached to the nodes; the typed handles [`Point`], [`Analog`],
//! [`Event`] and [`Metadata`] are the only way to reach it. Handles are
//! cheap clones of the node handle.
//!
//! Invariants enforced by every mutator:
//! - rates are finite and non-negative
//! - analog rate = point rate × integer ratio
//! - every attached point holds `frame_count` frames
//! - every attached analog holds `frame_count × ratio` samples
//!
//! Format handlers build trials through [`TrialDraft`], whose
//! [`finalize`](TrialDraft::finalize) is the single consistency check of the
//! decode path.

pub mod analog;
pub mod compare;
pub mod draft;
pub mod event;
pub mod metadata;
pub mod point;
pub mod trial;

pub use analog::{Analog, Gain};
pub use compare::TrialField;
pub use draft::TrialDraft;
pub use event::{Event, EventTime};
pub use metadata::{Metadata, MetadataEntry};
pub use point::{Point, PointKind};
pub use trial::{Trial, Units};

use crate::node::Node;

/// Trial owning `node` through one of its collections.
pub(crate) fn owning_trial(node: &Node) -> Option<Trial> {
    let collection = node.parent()?;
    Trial::from_node(collection.parent()?)
}

/// Relative comparison at single-precision resolution.
pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= 1e-5 * scale
}
