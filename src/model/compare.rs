// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Structural comparison of trials.
//!
//! [`Trial::differences`] reports which [`TrialField`]s disagree between two
//! trials. Format handlers use the same enumeration to declare the fields
//! their encoding cannot carry, so a decode/encode cycle can be checked
//! field by field.
//!
//! Real values are compared at single-precision resolution. Coordinates of
//! frames invalid in both trials are ignored.

use serde::{Deserialize, Serialize};

use super::{approx_eq, Analog, Event, Point, Trial};

/// A comparable aspect of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrialField {
    /// Point sample rate
    PointRate,
    /// Analog sample rate
    AnalogRate,
    /// Index of the first frame
    FirstFrame,
    /// Number of frames
    FrameCount,
    /// Unit labels
    Units,
    /// Point labels and their order
    PointLabels,
    /// Point kinds
    PointKinds,
    /// Point descriptions
    PointDescriptions,
    /// Coordinates and per-frame validity
    PointValues,
    /// Residuals of valid frames
    PointResiduals,
    /// Camera-visibility masks
    PointMasks,
    /// Analog labels and their order
    AnalogLabels,
    /// Analog descriptions
    AnalogDescriptions,
    /// Analog units
    AnalogUnits,
    /// Analog gains
    AnalogGains,
    /// Analog scale factors
    AnalogScales,
    /// Analog offsets
    AnalogOffsets,
    /// Analog samples
    AnalogValues,
    /// Events (label, time, context, description, subject)
    Events,
    /// Metadata groups and entries
    Metadata,
}

impl std::fmt::Display for TrialField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrialField::PointRate => "point rate",
            TrialField::AnalogRate => "analog rate",
            TrialField::FirstFrame => "first frame",
            TrialField::FrameCount => "frame count",
            TrialField::Units => "units",
            TrialField::PointLabels => "point labels",
            TrialField::PointKinds => "point kinds",
            TrialField::PointDescriptions => "point descriptions",
            TrialField::PointValues => "point values",
            TrialField::PointResiduals => "point residuals",
            TrialField::PointMasks => "point masks",
            TrialField::AnalogLabels => "analog labels",
            TrialField::AnalogDescriptions => "analog descriptions",
            TrialField::AnalogUnits => "analog units",
            TrialField::AnalogGains => "analog gains",
            TrialField::AnalogScales => "analog scales",
            TrialField::AnalogOffsets => "analog offsets",
            TrialField::AnalogValues => "analog values",
            TrialField::Events => "events",
            TrialField::Metadata => "metadata",
        };
        write!(f, "{name}")
    }
}

fn all_close(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y))
}

fn same_point_values(a: &Point, b: &Point) -> bool {
    let (ca, cb) = (a.coords(), b.coords());
    let (ra, rb) = (a.residuals(), b.residuals());
    ca.len() == cb.len()
        && ra.len() == rb.len()
        && ca.iter().zip(&cb).zip(ra.iter().zip(&rb)).all(|((pa, pb), (xa, xb))| {
            match (*xa >= 0.0, *xb >= 0.0) {
                (true, true) => pa.iter().zip(pb).all(|(u, v)| approx_eq(*u, *v)),
                (false, false) => true,
                _ => false,
            }
        })
}

fn valid_residuals(point: &Point) -> Vec<f64> {
    point.residuals().into_iter().filter(|r| *r >= 0.0).collect()
}

fn same_event(a: &Event, b: &Event, rate_a: f64, rate_b: f64) -> bool {
    let time_matches = match (a.time().seconds(rate_a), b.time().seconds(rate_b)) {
        (Some(x), Some(y)) => approx_eq(x, y),
        _ => a.time() == b.time(),
    };
    time_matches
        && a.label() == b.label()
        && a.context() == b.context()
        && a.description() == b.description()
        && a.subject() == b.subject()
}

/// Check a per-item predicate over two collections of equal length.
fn pairwise<T>(a: &[T], b: &[T], same: impl Fn(&T, &T) -> bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same(x, y))
}

impl Trial {
    /// Fields on which `self` and `other` differ, in declaration order.
    ///
    /// Collections are compared position by position; a trial with an extra
    /// point therefore differs in labels and in every per-point field.
    pub fn differences(&self, other: &Trial) -> Vec<TrialField> {
        let mut fields = Vec::new();
        let mut check = |field: TrialField, same: bool| {
            if !same {
                fields.push(field);
            }
        };

        check(
            TrialField::PointRate,
            approx_eq(self.point_rate(), other.point_rate()),
        );
        check(
            TrialField::AnalogRate,
            approx_eq(self.analog_rate(), other.analog_rate()),
        );
        check(
            TrialField::FirstFrame,
            self.first_frame() == other.first_frame(),
        );
        check(
            TrialField::FrameCount,
            self.frame_count() == other.frame_count(),
        );
        check(TrialField::Units, self.units() == other.units());

        let (pa, pb): (Vec<Point>, Vec<Point>) = (self.points().collect(), other.points().collect());
        check(
            TrialField::PointLabels,
            pairwise(&pa, &pb, |x, y| x.label() == y.label()),
        );
        check(
            TrialField::PointKinds,
            pairwise(&pa, &pb, |x, y| x.kind() == y.kind()),
        );
        check(
            TrialField::PointDescriptions,
            pairwise(&pa, &pb, |x, y| x.description() == y.description()),
        );
        check(TrialField::PointValues, pairwise(&pa, &pb, same_point_values));
        check(
            TrialField::PointResiduals,
            pairwise(&pa, &pb, |x, y| {
                all_close(&valid_residuals(x), &valid_residuals(y))
            }),
        );
        check(
            TrialField::PointMasks,
            pairwise(&pa, &pb, |x, y| x.masks() == y.masks()),
        );

        let (aa, ab): (Vec<Analog>, Vec<Analog>) =
            (self.analogs().collect(), other.analogs().collect());
        check(
            TrialField::AnalogLabels,
            pairwise(&aa, &ab, |x, y| x.label() == y.label()),
        );
        check(
            TrialField::AnalogDescriptions,
            pairwise(&aa, &ab, |x, y| x.description() == y.description()),
        );
        check(
            TrialField::AnalogUnits,
            pairwise(&aa, &ab, |x, y| x.unit() == y.unit()),
        );
        check(
            TrialField::AnalogGains,
            pairwise(&aa, &ab, |x, y| x.gain() == y.gain()),
        );
        check(
            TrialField::AnalogScales,
            pairwise(&aa, &ab, |x, y| approx_eq(x.scale(), y.scale())),
        );
        check(
            TrialField::AnalogOffsets,
            pairwise(&aa, &ab, |x, y| x.offset() == y.offset()),
        );
        check(
            TrialField::AnalogValues,
            pairwise(&aa, &ab, |x, y| all_close(&x.samples(), &y.samples())),
        );

        let (ea, eb): (Vec<Event>, Vec<Event>) = (self.events().collect(), other.events().collect());
        let (rate_a, rate_b) = (self.point_rate(), other.point_rate());
        check(
            TrialField::Events,
            pairwise(&ea, &eb, |x, y| same_event(x, y, rate_a, rate_b)),
        );

        check(
            TrialField::Metadata,
            self.metadata().same_content(&other.metadata()),
        );

        fields
    }
}
