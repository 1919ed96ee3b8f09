// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Trial root.

use serde::{Deserialize, Serialize};

use crate::core::ModelError;
use crate::node::Node;

use super::{Analog, Event, Metadata, Point, PointKind};

/// Unit labels per kind of data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Units {
    /// Marker trajectories
    pub marker: String,
    /// Joint angles
    pub angle: String,
    /// Forces and reactions
    pub force: String,
    /// Moments
    pub moment: String,
    /// Powers
    pub power: String,
    /// Unitless scalars
    pub scalar: String,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            marker: "mm".to_string(),
            angle: "deg".to_string(),
            force: "N".to_string(),
            moment: "Nmm".to_string(),
            power: "W".to_string(),
            scalar: String::new(),
        }
    }
}

impl Units {
    /// Unit of a point kind.
    pub fn for_kind(&self, kind: PointKind) -> &str {
        match kind {
            PointKind::Marker => &self.marker,
            PointKind::Angle => &self.angle,
            PointKind::Force | PointKind::Reaction => &self.force,
            PointKind::Moment => &self.moment,
            PointKind::Power => &self.power,
            PointKind::Scalar => &self.scalar,
        }
    }
}

#[derive(Debug)]
struct TrialState {
    point_rate: f64,
    analog_ratio: u32,
    first_frame: u32,
    frame_count: usize,
    units: Units,
}

impl Default for TrialState {
    fn default() -> Self {
        Self {
            point_rate: 0.0,
            analog_ratio: 1,
            first_frame: 1,
            frame_count: 0,
            units: Units::default(),
        }
    }
}

const POINTS: &str = "Points";
const ANALOGS: &str = "Analogs";
const EVENTS: &str = "Events";

/// Handle to a trial tree.
///
/// Cloning the handle shares the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    node: Node,
}

impl Default for Trial {
    fn default() -> Self {
        Self::new()
    }
}

impl Trial {
    /// Name of the trial root node.
    pub const NODE_NAME: &'static str = "Trial";

    /// Create an empty trial: no rate, one analog sample per frame, first
    /// frame 1, no frames.
    pub fn new() -> Self {
        let node = Node::with_payload(Self::NODE_NAME, TrialState::default());
        for name in [POINTS, ANALOGS, EVENTS, Metadata::NODE_NAME] {
            node.adopt(Node::new(name));
        }
        Self { node }
    }

    /// Create an empty trial with a point rate and frame count.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if the rate is negative or not finite.
    pub fn with_frames(point_rate: f64, frame_count: usize) -> Result<Self, ModelError> {
        let trial = Self::new();
        trial.set_point_rate(point_rate)?;
        trial.set_frame_count(frame_count)?;
        Ok(trial)
    }

    /// View `node` as a trial root, if it is one.
    pub fn from_node(node: Node) -> Option<Self> {
        node.has_payload::<TrialState>().then_some(Self { node })
    }

    /// Root node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    fn read<R: Default>(&self, f: impl FnOnce(&TrialState) -> R) -> R {
        self.node.with_state(f).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut TrialState)) {
        self.node.with_state_mut(f);
    }

    fn collection(&self, name: &str) -> Node {
        if let Some(node) = self.node.find_child(name) {
            return node;
        }
        // The collection was detached through the raw node API
        let node = Node::new(name);
        self.node.adopt(node.clone());
        node
    }

    /// Point sample rate in Hz.
    pub fn point_rate(&self) -> f64 {
        self.read(|s| s.point_rate)
    }

    /// Set the point sample rate; the analog rate follows through the ratio.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if the rate is negative or not finite.
    pub fn set_point_rate(&self, rate: f64) -> Result<(), ModelError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ModelError::inconsistent(format!(
                "point rate must be finite and non-negative, got {rate}"
            )));
        }
        self.update(|s| s.point_rate = rate);
        Ok(())
    }

    /// Analog samples per point frame.
    pub fn analog_ratio(&self) -> u32 {
        self.read(|s| s.analog_ratio)
    }

    /// Analog sample rate in Hz.
    pub fn analog_rate(&self) -> f64 {
        self.read(|s| s.point_rate * f64::from(s.analog_ratio))
    }

    /// Set the number of analog samples per frame.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if the ratio is zero or attached analog
    /// channels hold another number of samples.
    pub fn set_analog_ratio(&self, ratio: u32) -> Result<(), ModelError> {
        if ratio == 0 {
            return Err(ModelError::inconsistent("analog ratio must be at least 1"));
        }
        self.check_lengths(self.frame_count(), ratio)?;
        self.update(|s| s.analog_ratio = ratio);
        Ok(())
    }

    /// Set the analog sample rate.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if the rate is not a positive integer
    /// multiple of the point rate.
    pub fn set_analog_rate(&self, rate: f64) -> Result<(), ModelError> {
        let point_rate = self.point_rate();
        if !rate.is_finite() || rate < 0.0 {
            return Err(ModelError::inconsistent(format!(
                "analog rate must be finite and non-negative, got {rate}"
            )));
        }
        if point_rate == 0.0 {
            return Err(ModelError::inconsistent(
                "analog rate cannot be set before the point rate",
            ));
        }
        let ratio = rate / point_rate;
        let rounded = ratio.round();
        if rounded < 1.0 || (ratio - rounded).abs() > 1e-6 * rounded || rounded > f64::from(u32::MAX)
        {
            return Err(ModelError::inconsistent(format!(
                "analog rate {rate} Hz is not an integer multiple of point rate {point_rate} Hz"
            )));
        }
        self.set_analog_ratio(rounded as u32)
    }

    /// Index of the first frame.
    pub fn first_frame(&self) -> u32 {
        self.read(|s| s.first_frame)
    }

    /// Set the index of the first frame.
    pub fn set_first_frame(&self, first_frame: u32) {
        self.update(|s| s.first_frame = first_frame);
    }

    /// Index of the last frame.
    pub fn last_frame(&self) -> u32 {
        self.read(|s| {
            let frames = u32::try_from(s.frame_count).unwrap_or(u32::MAX);
            s.first_frame.saturating_add(frames.saturating_sub(1))
        })
    }

    /// Number of point frames.
    pub fn frame_count(&self) -> usize {
        self.read(|s| s.frame_count)
    }

    /// Samples expected in every analog channel.
    pub fn analog_sample_count(&self) -> usize {
        self.read(|s| s.frame_count * s.analog_ratio as usize)
    }

    /// Duration in seconds (zero without a rate).
    pub fn duration(&self) -> f64 {
        self.read(|s| {
            if s.point_rate > 0.0 {
                s.frame_count as f64 / s.point_rate
            } else {
                0.0
            }
        })
    }

    /// Set the number of frames.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if attached points or analog channels
    /// hold data of another length; data is never padded or truncated.
    pub fn set_frame_count(&self, frame_count: usize) -> Result<(), ModelError> {
        self.check_lengths(frame_count, self.analog_ratio())?;
        self.update(|s| s.frame_count = frame_count);
        Ok(())
    }

    /// Check that every attached point holds `frame_count` frames and every
    /// analog channel `frame_count * analog_ratio` samples.
    ///
    /// Nodes attached through the raw [`Node`] API bypass the checks made by
    /// [`Trial::add_point`] and [`Trial::add_analog`]; writers call this
    /// before encoding.
    pub fn check_consistency(&self) -> Result<(), ModelError> {
        self.check_lengths(self.frame_count(), self.analog_ratio())
    }

    fn check_lengths(&self, frame_count: usize, ratio: u32) -> Result<(), ModelError> {
        if let Some(point) = self.points().find(|p| p.frame_count() != frame_count) {
            return Err(ModelError::inconsistent(format!(
                "point '{}' has {} frames, expected {frame_count}",
                point.label(),
                point.frame_count()
            )));
        }
        let samples = frame_count * ratio as usize;
        if let Some(analog) = self.analogs().find(|a| a.sample_count() != samples) {
            return Err(ModelError::inconsistent(format!(
                "analog '{}' has {} samples, expected {samples}",
                analog.label(),
                analog.sample_count()
            )));
        }
        Ok(())
    }

    /// Unit labels.
    pub fn units(&self) -> Units {
        self.read(|s| s.units.clone())
    }

    /// Set the unit labels.
    pub fn set_units(&self, units: Units) {
        self.update(|s| s.units = units);
    }

    /// Points in order.
    pub fn points(&self) -> impl Iterator<Item = Point> {
        self.collection(POINTS).children().filter_map(Point::from_node)
    }

    /// Number of points.
    pub fn point_count(&self) -> usize {
        self.points().count()
    }

    /// First point labelled `label`.
    pub fn point(&self, label: &str) -> Option<Point> {
        self.points().find(|p| p.label() == label)
    }

    /// Attach a point, moving it out of any previous trial.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] if its frame count differs from the
    /// trial's.
    pub fn add_point(&self, point: Point) -> Result<(), ModelError> {
        let frames = self.frame_count();
        if point.frame_count() != frames {
            return Err(ModelError::inconsistent(format!(
                "point '{}' has {} frames, trial has {frames}",
                point.label(),
                point.frame_count()
            )));
        }
        self.collection(POINTS).add_child(point.node().clone())?;
        Ok(())
    }

    /// Detach the first point labelled `label`.
    pub fn remove_point(&self, label: &str) -> Option<Point> {
        let point = self.point(label)?;
        self.collection(POINTS).remove_child(point.node().id())?;
        Some(point)
    }

    /// Analog channels in order.
    pub fn analogs(&self) -> impl Iterator<Item = Analog> {
        self.collection(ANALOGS)
            .children()
            .filter_map(Analog::from_node)
    }

    /// Number of analog channels.
    pub fn analog_count(&self) -> usize {
        self.analogs().count()
    }

    /// First analog channel labelled `label`.
    pub fn analog(&self, label: &str) -> Option<Analog> {
        self.analogs().find(|a| a.label() == label)
    }

    /// Attach an analog channel.
    ///
    /// # Errors
    ///
    /// [`ModelError::Inconsistent`] unless it holds exactly
    /// `frame_count × analog_ratio` samples.
    pub fn add_analog(&self, analog: Analog) -> Result<(), ModelError> {
        let expected = self.analog_sample_count();
        if analog.sample_count() != expected {
            return Err(ModelError::inconsistent(format!(
                "analog '{}' has {} samples, trial expects {expected}",
                analog.label(),
                analog.sample_count()
            )));
        }
        self.collection(ANALOGS).add_child(analog.node().clone())?;
        Ok(())
    }

    /// Detach the first analog channel labelled `label`.
    pub fn remove_analog(&self, label: &str) -> Option<Analog> {
        let analog = self.analog(label)?;
        self.collection(ANALOGS).remove_child(analog.node().id())?;
        Some(analog)
    }

    /// Events in order.
    pub fn events(&self) -> impl Iterator<Item = Event> {
        self.collection(EVENTS).children().filter_map(Event::from_node)
    }

    /// Number of events.
    pub fn event_count(&self) -> usize {
        self.events().count()
    }

    /// Attach an event.
    ///
    /// # Errors
    ///
    /// Only a graph failure, which cannot happen for an event node.
    pub fn add_event(&self, event: Event) -> Result<(), ModelError> {
        self.collection(EVENTS).add_child(event.node().clone())?;
        Ok(())
    }

    /// Detach `event`; returns `false` if it is not part of this trial.
    pub fn remove_event(&self, event: &Event) -> bool {
        self.collection(EVENTS)
            .remove_child(event.node().id())
            .is_some()
    }

    /// Metadata tree.
    pub fn metadata(&self) -> Metadata {
        Metadata::from_node(self.collection(Metadata::NODE_NAME))
    }

    /// Replace the metadata tree with `metadata`'s groups.
    pub(crate) fn attach_metadata(&self, metadata: &Metadata) -> Result<(), ModelError> {
        let target = self.collection(Metadata::NODE_NAME);
        for group in metadata.node().clear_children() {
            target.add_child(group)?;
        }
        Ok(())
    }
}
