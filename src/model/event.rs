// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Timed events.

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Occurrence time of an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTime {
    /// Seconds from the start of the capture
    Seconds(f64),
    /// Frame index, the first captured frame being 1
    Frame(i32),
}

impl EventTime {
    /// Time in seconds at `point_rate`.
    ///
    /// Returns `None` for a frame time when the rate is zero.
    pub fn seconds(self, point_rate: f64) -> Option<f64> {
        match self {
            EventTime::Seconds(s) => Some(s),
            EventTime::Frame(frame) if point_rate > 0.0 => {
                Some(f64::from(frame - 1) / point_rate)
            }
            EventTime::Frame(_) => None,
        }
    }

    /// Nearest frame index at `point_rate`.
    pub fn frame(self, point_rate: f64) -> Option<i32> {
        match self {
            EventTime::Frame(frame) => Some(frame),
            EventTime::Seconds(s) if point_rate > 0.0 && s.is_finite() => {
                Some((s * point_rate).round() as i32 + 1)
            }
            EventTime::Seconds(_) => None,
        }
    }
}

impl std::fmt::Display for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventTime::Seconds(s) => write!(f, "{s}s"),
            EventTime::Frame(frame) => write!(f, "frame {frame}"),
        }
    }
}

#[derive(Debug)]
struct EventState {
    time: EventTime,
    context: String,
    description: Option<String>,
    subject: Option<String>,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            time: EventTime::Seconds(0.0),
            context: String::new(),
            description: None,
            subject: None,
        }
    }
}

/// Handle to an event node. The label is the node name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    node: Node,
}

impl Event {
    /// Create a detached event.
    pub fn new(label: impl Into<String>, time: EventTime) -> Self {
        let state = EventState {
            time,
            ..EventState::default()
        };
        Self {
            node: Node::with_payload(label, state),
        }
    }

    /// View `node` as an event, if it is one.
    pub fn from_node(node: Node) -> Option<Self> {
        node.has_payload::<EventState>().then_some(Self { node })
    }

    /// Underlying node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    fn read<R: Default>(&self, f: impl FnOnce(&EventState) -> R) -> R {
        self.node.with_state(f).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut EventState)) {
        self.node.with_state_mut(f);
    }

    /// Event label (e.g. "Foot Strike").
    pub fn label(&self) -> String {
        self.node.name()
    }

    /// Rename the event.
    pub fn set_label(&self, label: impl Into<String>) {
        self.node.set_name(label);
    }

    /// Occurrence time.
    pub fn time(&self) -> EventTime {
        self.node
            .with_state(|s: &EventState| s.time)
            .unwrap_or(EventTime::Seconds(0.0))
    }

    /// Set the occurrence time.
    pub fn set_time(&self, time: EventTime) {
        self.update(|s| s.time = time);
    }

    /// Context or side tag (e.g. "Left").
    pub fn context(&self) -> String {
        self.read(|s| s.context.clone())
    }

    /// Set the context tag.
    pub fn set_context(&self, context: impl Into<String>) {
        let context = context.into();
        self.update(|s| s.context = context);
    }

    /// Optional description.
    pub fn description(&self) -> Option<String> {
        self.read(|s| s.description.clone())
    }

    /// Set or clear the description.
    pub fn set_description(&self, description: Option<String>) {
        self.update(|s| s.description = description);
    }

    /// Optional subject name.
    pub fn subject(&self) -> Option<String> {
        self.read(|s| s.subject.clone())
    }

    /// Set or clear the subject.
    pub fn set_subject(&self, subject: Option<String>) {
        self.update(|s| s.subject = subject);
    }
}
