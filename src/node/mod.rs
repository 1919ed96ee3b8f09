// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Ownership-safe hierarchical node graph.
//!
//! A [`Node`] is a reference-counted handle to a named element holding an
//! ordered property list and an ordered list of owned children. Cloning a
//! `Node` clones the handle, never the subtree. Parents own their children;
//! children refer back to their parent through a weak reference, so dropping
//! the last handle to a root releases the whole subtree.
//!
//! The graph is kept acyclic: [`Node::add_child`] rejects a node that is the
//! receiver itself or one of its ancestors. [`WeakNode`] handles are never
//! ownership edges and take no part in cycle detection.
//!
//! Domain types (trial, point, analog, event) attach a private typed payload
//! to their node; only the owning module can reach it.
//!
//! # Example
//!
//! ```
//! use mocodec::node::Node;
//!
//! let root = Node::new("root");
//! let group = Node::new("FORCE_PLATFORM");
//! root.add_child(group.clone())?;
//! group.set_property("USED", 2i16);
//!
//! assert_eq!(root.children().count(), 1);
//! assert!(root.add_child(root.clone()).is_err());
//! # Ok::<(), mocodec::NodeError>(())
//! ```

use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{NodeError, PropertyValue};

/// Stable identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    fn new() -> Self {
        NodeId(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Payload = Box<dyn Any + Send + Sync>;

struct NodeData {
    id: NodeId,
    name: String,
    properties: Vec<(String, PropertyValue)>,
    children: Vec<Node>,
    parent: Weak<RwLock<NodeData>>,
    payload: Option<Payload>,
}

/// Shared handle to a graph node.
///
/// Equality is identity: two handles are equal when they refer to the same
/// node.
#[derive(Clone)]
pub struct Node {
    inner: Arc<RwLock<NodeData>>,
}

impl Node {
    /// Create a detached node without payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// Create a detached node carrying a private payload.
    pub(crate) fn with_payload<T: Any + Send + Sync>(name: impl Into<String>, payload: T) -> Self {
        Self::build(name.into(), Some(Box::new(payload)))
    }

    fn build(name: String, payload: Option<Payload>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(NodeData {
                id: NodeId::new(),
                name,
                properties: Vec::new(),
                children: Vec::new(),
                parent: Weak::new(),
                payload,
            })),
        }
    }

    // A panic while a guard was held cannot leave NodeData half-updated:
    // every mutation below is a single assignment or Vec operation.
    fn read(&self) -> RwLockReadGuard<'_, NodeData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NodeData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stable identity of the node.
    pub fn id(&self) -> NodeId {
        self.read().id
    }

    /// Node name (not required to be unique).
    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    /// Rename the node.
    pub fn set_name(&self, name: impl Into<String>) {
        self.write().name = name.into();
    }

    /// Check if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a non-owning handle.
    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Owning parent, if the node is attached.
    pub fn parent(&self) -> Option<Node> {
        self.read()
            .parent
            .upgrade()
            .map(|inner| Node { inner })
    }

    /// Check if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Node) -> bool {
        let mut current = other.parent();
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Append `child`, detaching it from its previous parent.
    ///
    /// # Errors
    ///
    /// [`NodeError::CycleDetected`] if `child` is `self` or an ancestor of
    /// `self`.
    pub fn add_child(&self, child: Node) -> Result<(), NodeError> {
        let index = self.child_count();
        self.insert_child(index, child)
    }

    /// Insert `child` at `index` (clamped to the child count).
    ///
    /// # Errors
    ///
    /// [`NodeError::CycleDetected`] if `child` is `self` or an ancestor of
    /// `self`.
    pub fn insert_child(&self, index: usize, child: Node) -> Result<(), NodeError> {
        if child.ptr_eq(self) || child.is_ancestor_of(self) {
            return Err(NodeError::CycleDetected {
                parent: self.name(),
                child: child.name(),
            });
        }

        if let Some(previous) = child.parent() {
            previous.write().children.retain(|c| !c.ptr_eq(&child));
        }
        child.write().parent = Arc::downgrade(&self.inner);

        let mut data = self.write();
        let index = index.min(data.children.len());
        data.children.insert(index, child);
        Ok(())
    }

    /// Append a freshly created node without the cycle check.
    ///
    /// `child` must be a new detached node that was never attached
    /// anywhere, so it cannot be an ancestor of `self`.
    pub(crate) fn adopt(&self, child: Node) {
        child.write().parent = Arc::downgrade(&self.inner);
        self.write().children.push(child);
    }

    /// Detach and return the child with the given id.
    pub fn remove_child(&self, id: NodeId) -> Option<Node> {
        let removed = {
            let mut data = self.write();
            let position = data.children.iter().position(|c| c.id() == id)?;
            data.children.remove(position)
        };
        removed.write().parent = Weak::new();
        Some(removed)
    }

    /// Detach every child, returning them in order.
    pub fn clear_children(&self) -> Vec<Node> {
        let removed = std::mem::take(&mut self.write().children);
        for child in &removed {
            child.write().parent = Weak::new();
        }
        removed
    }

    /// Lazy iterator over the children in insertion order.
    ///
    /// The iterator holds no lock between steps, so the graph may be
    /// mutated while iterating; cloning it restarts from the clone point.
    pub fn children(&self) -> Children {
        Children {
            parent: self.clone(),
            index: 0,
        }
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        self.read().children.len()
    }

    /// Child at `index`.
    pub fn child(&self, index: usize) -> Option<Node> {
        self.read().children.get(index).cloned()
    }

    /// First child named `name`.
    pub fn find_child(&self, name: &str) -> Option<Node> {
        self.read()
            .children
            .iter()
            .find(|c| c.read().name == name)
            .cloned()
    }

    /// Depth-first, pre-order iterator over all descendants (excluding `self`).
    pub fn descendants(&self) -> Descendants {
        let mut stack: Vec<Node> = self.read().children.clone();
        stack.reverse();
        Descendants { stack }
    }

    /// Get a property value.
    pub fn get_property(&self, key: &str) -> Option<PropertyValue> {
        self.read()
            .properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Check if a property is set.
    pub fn has_property(&self, key: &str) -> bool {
        self.read().properties.iter().any(|(k, _)| k == key)
    }

    /// Set a property, keeping its position if it already exists.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let key = key.into();
        let value = value.into();
        let mut data = self.write();
        match data.properties.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => data.properties.push((key, value)),
        }
    }

    /// Remove a property.
    pub fn remove_property(&self, key: &str) -> Option<PropertyValue> {
        let mut data = self.write();
        let position = data.properties.iter().position(|(k, _)| k == key)?;
        Some(data.properties.remove(position).1)
    }

    /// Snapshot of all properties in insertion order.
    pub fn properties(&self) -> Vec<(String, PropertyValue)> {
        self.read().properties.clone()
    }

    /// Check if the node carries a payload of type `T`.
    pub(crate) fn has_payload<T: Any>(&self) -> bool {
        self.read()
            .payload
            .as_ref()
            .is_some_and(|p| p.is::<T>())
    }

    /// Run `f` on the payload, if it has type `T`.
    pub(crate) fn with_state<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = self.read();
        data.payload.as_ref()?.downcast_ref::<T>().map(f)
    }

    /// Run `f` on the mutable payload, if it has type `T`.
    pub(crate) fn with_state_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut data = self.write();
        data.payload.as_mut()?.downcast_mut::<T>().map(f)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read();
        f.debug_struct("Node")
            .field("id", &data.id)
            .field("name", &data.name)
            .field("properties", &data.properties.len())
            .field("children", &data.children.len())
            .finish()
    }
}

/// Non-owning handle to a node.
#[derive(Clone, Default)]
pub struct WeakNode {
    inner: Weak<RwLock<NodeData>>,
}

impl WeakNode {
    /// Get an owning handle if the node is still alive.
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakNode")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Iterator over the children of a node.
#[derive(Clone)]
pub struct Children {
    parent: Node,
    index: usize,
}

impl Iterator for Children {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let child = self.parent.child(self.index)?;
        self.index += 1;
        Some(child)
    }
}

/// Depth-first pre-order iterator over descendants.
pub struct Descendants {
    stack: Vec<Node>,
}

impl Iterator for Descendants {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let node = self.stack.pop()?;
        let mut children = node.read().children.clone();
        children.reverse();
        self.stack.extend(children);
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (Node, Node, Node, Node) {
        // root -> a -> a1 ; root -> b
        let root = Node::new("root");
        let a = Node::new("a");
        let a1 = Node::new("a1");
        let b = Node::new("b");
        root.add_child(a.clone()).unwrap();
        a.add_child(a1.clone()).unwrap();
        root.add_child(b.clone()).unwrap();
        (root, a, a1, b)
    }

    #[test]
    fn test_cycle_detection() {
        let (root, a, a1, _) = tree();
        assert!(matches!(
            a1.add_child(root.clone()),
            Err(NodeError::CycleDetected { .. })
        ));
        assert!(matches!(
            a1.add_child(a.clone()),
            Err(NodeError::CycleDetected { .. })
        ));
        assert!(matches!(
            a.add_child(a.clone()),
            Err(NodeError::CycleDetected { .. })
        ));
        // Graph untouched by the failed calls
        assert_eq!(root.child_count(), 2);
        assert_eq!(a1.child_count(), 0);
    }

    #[test]
    fn test_weak_links_do_not_count_as_cycles() {
        let (root, _, a1, _) = tree();
        let back = root.downgrade();
        a1.set_property("link", "root");
        assert!(back.upgrade().is_some());
        assert!(a1.add_child(Node::new("leaf")).is_ok());
    }

    #[test]
    fn test_reparenting_moves_child() {
        let (root, a, a1, b) = tree();
        b.add_child(a1.clone()).unwrap();
        assert_eq!(a.child_count(), 0);
        assert_eq!(b.child_count(), 1);
        assert_eq!(a1.parent(), Some(b.clone()));
        assert!(root.is_ancestor_of(&a1));
    }

    #[test]
    fn test_children_order_and_restart() {
        let root = Node::new("points");
        for label in ["LASI", "RASI", "LPSI"] {
            root.add_child(Node::new(label)).unwrap();
        }
        let children = root.children();
        let names: Vec<String> = children.clone().map(|n| n.name()).collect();
        assert_eq!(names, vec!["LASI", "RASI", "LPSI"]);
        let again: Vec<String> = children.map(|n| n.name()).collect();
        assert_eq!(again, names);
    }

    #[test]
    fn test_insert_child_position() {
        let root = Node::new("root");
        root.add_child(Node::new("first")).unwrap();
        root.add_child(Node::new("third")).unwrap();
        root.insert_child(1, Node::new("second")).unwrap();
        root.insert_child(99, Node::new("last")).unwrap();
        let names: Vec<String> = root.children().map(|n| n.name()).collect();
        assert_eq!(names, vec!["first", "second", "third", "last"]);
    }

    #[test]
    fn test_remove_child_detaches() {
        let (root, a, _, _) = tree();
        let removed = root.remove_child(a.id()).unwrap();
        assert_eq!(removed, a);
        assert!(a.parent().is_none());
        assert_eq!(root.child_count(), 1);
        assert!(root.remove_child(a.id()).is_none());
    }

    #[test]
    fn test_descendants_pre_order() {
        let (root, _, _, _) = tree();
        let names: Vec<String> = root.descendants().map(|n| n.name()).collect();
        assert_eq!(names, vec!["a", "a1", "b"]);
    }

    #[test]
    fn test_properties_keep_order() {
        let node = Node::new("POINT");
        node.set_property("USED", 2i16);
        node.set_property("RATE", 100.0f32);
        node.set_property("USED", 3i16);
        let keys: Vec<String> = node.properties().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["USED", "RATE"]);
        assert_eq!(node.get_property("USED"), Some(PropertyValue::Int16(3)));
        assert_eq!(node.remove_property("RATE"), Some(PropertyValue::Float32(100.0)));
        assert!(!node.has_property("RATE"));
    }

    #[test]
    fn test_dropping_root_releases_subtree() {
        let root = Node::new("root");
        let child = Node::new("child");
        root.add_child(child.clone()).unwrap();
        let weak_child = child.downgrade();
        drop(child);
        assert!(weak_child.upgrade().is_some());
        drop(root);
        assert!(weak_child.upgrade().is_none());
    }

    #[test]
    fn test_payload_access() {
        let node = Node::with_payload("p", 41u32);
        assert!(node.has_payload::<u32>());
        assert!(!node.has_payload::<i64>());
        node.with_state_mut::<u32, _>(|v| *v += 1);
        assert_eq!(node.with_state::<u32, _>(|v| *v), Some(42));
        assert_eq!(node.with_state::<i64, _>(|v| *v), None);
    }

    #[test]
    fn test_node_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Node>();
        assert_send_sync::<WeakNode>();
    }
}
