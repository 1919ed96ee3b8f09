// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Vendor metadata tree.
//!
//! Metadata is organised as groups (child nodes of the metadata root) each
//! holding entries (child nodes of the group). An entry node stores its
//! value under the [`VALUE`] property and optionally a [`DESCRIPTION`] and
//! a [`LOCKED`] flag; group nodes may carry the last two as well.
//!
//! Group and entry lookups ignore ASCII case, as vendor files do.

use serde::{Deserialize, Serialize};

use crate::core::PropertyValue;
use crate::node::Node;

/// Property holding an entry value.
pub const VALUE: &str = "value";
/// Property holding a group or entry description.
pub const DESCRIPTION: &str = "description";
/// Property flagging a group or entry as locked.
pub const LOCKED: &str = "locked";

/// Snapshot of a metadata entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Entry value
    pub value: PropertyValue,
    /// Free-text description
    pub description: String,
    /// Lock flag
    pub locked: bool,
}

impl MetadataEntry {
    /// Create an unlocked entry without description.
    pub fn new(value: impl Into<PropertyValue>) -> Self {
        Self {
            value: value.into(),
            description: String::new(),
            locked: false,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the lock flag.
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    fn from_node(node: &Node) -> Self {
        Self {
            value: node.get_property(VALUE).unwrap_or(PropertyValue::Null),
            description: text_property(node, DESCRIPTION),
            locked: flag_property(node, LOCKED),
        }
    }
}

fn text_property(node: &Node, key: &str) -> String {
    node.get_property(key)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn flag_property(node: &Node, key: &str) -> bool {
    matches!(node.get_property(key), Some(PropertyValue::Bool(true)))
}

fn find_ignore_case(parent: &Node, name: &str) -> Option<Node> {
    parent
        .children()
        .find(|child| child.name().eq_ignore_ascii_case(name))
}

/// Handle to the metadata subtree of a trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    node: Node,
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

impl Metadata {
    /// Name of the metadata root node.
    pub const NODE_NAME: &'static str = "Metadata";

    /// Create a detached, empty metadata tree.
    pub fn new() -> Self {
        Self {
            node: Node::new(Self::NODE_NAME),
        }
    }

    pub(crate) fn from_node(node: Node) -> Self {
        Self { node }
    }

    /// Underlying node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Check if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.node.child_count() == 0
    }

    /// Group nodes in order.
    pub fn groups(&self) -> impl Iterator<Item = Node> {
        self.node.children()
    }

    /// Group named `name`.
    pub fn group(&self, name: &str) -> Option<Node> {
        find_ignore_case(&self.node, name)
    }

    /// Group named `name`, created at the end if missing.
    pub fn ensure_group(&self, name: &str) -> Node {
        if let Some(group) = self.group(name) {
            return group;
        }
        let group = Node::new(name);
        self.node.adopt(group.clone());
        group
    }

    /// Detach the group named `name`.
    pub fn remove_group(&self, name: &str) -> Option<Node> {
        let group = self.group(name)?;
        self.node.remove_child(group.id())
    }

    /// Description of a group.
    pub fn group_description(&self, name: &str) -> Option<String> {
        self.group(name).map(|g| text_property(&g, DESCRIPTION))
    }

    /// Set the description of a group, creating it if missing.
    pub fn set_group_description(&self, name: &str, description: impl Into<String>) {
        let description: String = description.into();
        self.ensure_group(name).set_property(DESCRIPTION, description);
    }

    /// Lock flag of a group.
    pub fn group_locked(&self, name: &str) -> bool {
        self.group(name).is_some_and(|g| flag_property(&g, LOCKED))
    }

    /// Set the lock flag of a group, creating it if missing.
    pub fn set_group_locked(&self, name: &str, locked: bool) {
        self.ensure_group(name).set_property(LOCKED, locked);
    }

    /// Entry node `group:name`.
    pub fn entry_node(&self, group: &str, name: &str) -> Option<Node> {
        find_ignore_case(&self.group(group)?, name)
    }

    /// Value of entry `group:name`.
    pub fn entry(&self, group: &str, name: &str) -> Option<PropertyValue> {
        self.entry_node(group, name)?.get_property(VALUE)
    }

    /// Full entry `group:name`.
    pub fn entry_details(&self, group: &str, name: &str) -> Option<MetadataEntry> {
        self.entry_node(group, name)
            .map(|node| MetadataEntry::from_node(&node))
    }

    /// Entries of a group in order.
    pub fn entries(&self, group: &str) -> Vec<(String, MetadataEntry)> {
        self.group(group)
            .map(|g| {
                g.children()
                    .map(|node| (node.name(), MetadataEntry::from_node(&node)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set the value of entry `group:name`, creating both if missing.
    ///
    /// An existing entry keeps its description and lock flag.
    pub fn set_entry(&self, group: &str, name: &str, value: impl Into<PropertyValue>) {
        let value = value.into();
        match self.entry_node(group, name) {
            Some(node) => node.set_property(VALUE, value),
            None => self.insert_entry(group, name, MetadataEntry::new(value)),
        }
    }

    /// Insert or replace entry `group:name`.
    pub fn insert_entry(&self, group: &str, name: &str, entry: MetadataEntry) {
        let node = match self.entry_node(group, name) {
            Some(node) => node,
            None => {
                let node = Node::new(name);
                self.ensure_group(group).adopt(node.clone());
                node
            }
        };
        node.set_property(VALUE, entry.value);
        if entry.description.is_empty() {
            node.remove_property(DESCRIPTION);
        } else {
            node.set_property(DESCRIPTION, entry.description);
        }
        if entry.locked {
            node.set_property(LOCKED, true);
        } else {
            node.remove_property(LOCKED);
        }
    }

    /// Remove entry `group:name`.
    pub fn remove_entry(&self, group: &str, name: &str) -> Option<MetadataEntry> {
        let group_node = self.group(group)?;
        let node = find_ignore_case(&group_node, name)?;
        group_node.remove_child(node.id())?;
        Some(MetadataEntry::from_node(&node))
    }

    /// Structural equality of two metadata trees.
    ///
    /// Groups and entries are compared in order, names exactly.
    pub fn same_content(&self, other: &Metadata) -> bool {
        let ours: Vec<Node> = self.groups().collect();
        let theirs: Vec<Node> = other.groups().collect();
        ours.len() == theirs.len()
            && ours.iter().zip(&theirs).all(|(a, b)| {
                a.name() == b.name()
                    && text_property(a, DESCRIPTION) == text_property(b, DESCRIPTION)
                    && flag_property(a, LOCKED) == flag_property(b, LOCKED)
                    && self.entries(&a.name()) == other.entries(&b.name())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_entry_creates_group() {
        let metadata = Metadata::new();
        assert!(metadata.is_empty());
        metadata.set_entry("SUBJECTS", "NAMES", vec!["Alice"]);
        assert!(metadata.group("subjects").is_some());
        assert_eq!(
            metadata.entry("Subjects", "names"),
            Some(PropertyValue::Array(vec![PropertyValue::String(
                "Alice".to_string()
            )]))
        );
    }

    #[test]
    fn test_set_entry_keeps_description() {
        let metadata = Metadata::new();
        metadata.insert_entry(
            "POINT",
            "X_SCREEN",
            MetadataEntry::new("+X").with_description("screen axis").with_locked(true),
        );
        metadata.set_entry("POINT", "X_SCREEN", "-Y");
        let entry = metadata.entry_details("POINT", "X_SCREEN").unwrap();
        assert_eq!(entry.value, PropertyValue::String("-Y".to_string()));
        assert_eq!(entry.description, "screen axis");
        assert!(entry.locked);
    }

    #[test]
    fn test_remove_entry_and_group() {
        let metadata = Metadata::new();
        metadata.set_entry("FORCE_PLATFORM", "USED", 2i16);
        metadata.set_entry("FORCE_PLATFORM", "TYPE", vec![2i16, 2i16]);
        let removed = metadata.remove_entry("FORCE_PLATFORM", "USED").unwrap();
        assert_eq!(removed.value, PropertyValue::Int16(2));
        assert_eq!(metadata.entries("FORCE_PLATFORM").len(), 1);
        assert!(metadata.remove_group("FORCE_PLATFORM").is_some());
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_same_content() {
        let a = Metadata::new();
        let b = Metadata::new();
        a.set_entry("TRIAL", "CAMERA_RATE", 100.0f32);
        assert!(!a.same_content(&b));
        b.set_entry("TRIAL", "CAMERA_RATE", 100.0f32);
        assert!(a.same_content(&b));
        b.set_group_description("TRIAL", "trial info");
        assert!(!a.same_content(&b));
    }
}
