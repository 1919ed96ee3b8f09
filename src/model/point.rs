// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! 3-D point trajectories.

use serde::{Deserialize, Serialize};

use crate::core::ModelError;
use crate::node::Node;

use super::owning_trial;

/// Physical quantity carried by a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    /// Marker trajectory
    #[default]
    Marker,
    /// Joint angle
    Angle,
    /// Force
    Force,
    /// Moment
    Moment,
    /// Power
    Power,
    /// Unitless scalar
    Scalar,
    /// Ground reaction
    Reaction,
}

impl PointKind {
    /// All kinds in declaration order.
    pub const ALL: [PointKind; 7] = [
        PointKind::Marker,
        PointKind::Angle,
        PointKind::Force,
        PointKind::Moment,
        PointKind::Power,
        PointKind::Scalar,
        PointKind::Reaction,
    ];
}

impl std::fmt::Display for PointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PointKind::Marker => "marker",
            PointKind::Angle => "angle",
            PointKind::Force => "force",
            PointKind::Moment => "moment",
            PointKind::Power => "power",
            PointKind::Scalar => "scalar",
            PointKind::Reaction => "reaction",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Default)]
struct PointState {
    kind: PointKind,
    description: String,
    coords: Vec<[f64; 3]>,
    residuals: Vec<f64>,
    masks: Vec<u16>,
}

/// Handle to a point node.
///
/// The label is the node name. A negative residual marks a frame where the
/// point was not reconstructed; its coordinates are meaningless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    node: Node,
}

impl Point {
    /// Create a detached point without frames.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_coords(label, Vec::new())
    }

    /// Create a detached point; every frame is valid with a zero residual.
    pub fn with_coords(label: impl Into<String>, coords: Vec<[f64; 3]>) -> Self {
        let frames = coords.len();
        let state = PointState {
            coords,
            residuals: vec![0.0; frames],
            masks: vec![0; frames],
            ..PointState::default()
        };
        Self {
            node: Node::with_payload(label, state),
        }
    }

    /// View `node` as a point, if it is one.
    pub fn from_node(node: Node) -> Option<Self> {
        node.has_payload::<PointState>().then_some(Self { node })
    }

    /// Underlying node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    fn read<R: Default>(&self, f: impl FnOnce(&PointState) -> R) -> R {
        self.node.with_state(f).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut PointState)) {
        self.node.with_state_mut(f);
    }

    /// Point label.
    pub fn label(&self) -> String {
        self.node.name()
    }

    /// Rename the point.
    pub fn set_label(&self, label: impl Into<String>) {
        self.node.set_name(label);
    }

    /// Physical quantity.
    pub fn kind(&self) -> PointKind {
        self.read(|s| s.kind)
    }

    /// Set the physical quantity.
    pub fn set_kind(&self, kind: PointKind) {
        self.update(|s| s.kind = kind);
    }

    /// Free-text description.
    pub fn description(&self) -> String {
        self.read(|s| s.description.clone())
    }

    /// Set the description.
    pub fn set_description(&self, description: impl Into<String>) {
        let description = description.into();
        self.update(|s| s.description = description);
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.read(|s| s.coords.len())
    }

    /// Coordinates of every frame.
    pub fn coords(&self) -> Vec<[f64; 3]> {
        self.read(|s| s.coords.clone())
    }

    /// Residual of every frame.
    pub fn residuals(&self) -> Vec<f64> {
        self.read(|s| s.residuals.clone())
    }

    /// Camera-visibility mask of every frame.
    pub fn masks(&self) -> Vec<u16> {
        self.read(|s| s.masks.clone())
    }

    /// Coordinates at `frame`.
    pub fn coord(&self, frame: usize) -> Option<[f64; 3]> {
        self.read(|s| s.coords.get(frame).copied())
    }

    /// Residual at `frame`.
    pub fn residual(&self, frame: usize) -> Option<f64> {
        self.read(|s| s.residuals.get(frame).copied())
    }

    /// Check if the point was reconstructed at `frame`.
    pub fn is_valid(&self, frame: usize) -> bool {
        self.residual(frame).is_some_and(|r| r >= 0.0)
    }

    /// Replace all frames.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if the three buffers differ in length,
    /// or if the point belongs to a trial with another frame count.
    pub fn set_data(
        &self,
        coords: Vec<[f64; 3]>,
        residuals: Vec<f64>,
        masks: Vec<u16>,
    ) -> Result<(), ModelError> {
        if residuals.len() != coords.len() || masks.len() != coords.len() {
            return Err(ModelError::inconsistent(format!(
                "point '{}' has {} coordinates, {} residuals and {} masks",
                self.label(),
                coords.len(),
                residuals.len(),
                masks.len()
            )));
        }
        if let Some(trial) = owning_trial(&self.node) {
            if coords.len() != trial.frame_count() {
                return Err(ModelError::inconsistent(format!(
                    "point '{}' has {} frames, trial has {}",
                    self.label(),
                    coords.len(),
                    trial.frame_count()
                )));
            }
        }
        self.update(|s| {
            s.coords = coords;
            s.residuals = residuals;
            s.masks = masks;
        });
        Ok(())
    }

    /// Overwrite a single frame.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if `frame` is out of range.
    pub fn set_frame(
        &self,
        frame: usize,
        coord: [f64; 3],
        residual: f64,
        mask: u16,
    ) -> Result<(), ModelError> {
        let frames = self.frame_count();
        if frame >= frames {
            return Err(ModelError::inconsistent(format!(
                "frame {frame} is out of range for point '{}' ({frames} frames)",
                self.label()
            )));
        }
        self.update(|s| {
            s.coords[frame] = coord;
            s.residuals[frame] = residual;
            s.masks[frame] = mask;
        });
        Ok(())
    }

    /// Mark `frame` as not reconstructed.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if `frame` is out of range.
    pub fn invalidate(&self, frame: usize) -> Result<(), ModelError> {
        self.set_frame(frame, [0.0; 3], -1.0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_point_frames_are_valid() {
        let point = Point::with_coords("LASI", vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(point.label(), "LASI");
        assert_eq!(point.frame_count(), 2);
        assert!(point.is_valid(0));
        assert!(point.is_valid(1));
        assert!(!point.is_valid(2));
        assert_eq!(point.masks(), vec![0, 0]);
    }

    #[test]
    fn test_set_data_length_mismatch() {
        let point = Point::new("RASI");
        let err = point
            .set_data(vec![[0.0; 3]; 3], vec![0.0; 2], vec![0; 3])
            .unwrap_err();
        assert!(matches!(err, ModelError::Inconsistent { .. }));
        assert_eq!(point.frame_count(), 0);
    }

    #[test]
    fn test_invalidate_frame() {
        let point = Point::with_coords("LPSI", vec![[1.0; 3]; 4]);
        point.invalidate(2).unwrap();
        assert!(!point.is_valid(2));
        assert_eq!(point.coord(2), Some([0.0; 3]));
        assert!(point.invalidate(4).is_err());
    }

    #[test]
    fn test_from_node_checks_payload() {
        let point = Point::new("RPSI");
        assert!(Point::from_node(point.node().clone()).is_some());
        assert!(Point::from_node(Node::new("plain")).is_none());
    }
}
