// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node arena of a decoded value.

use crate::ledger::Address;
use crate::types::TypeId;
use std::fmt;

/// Index of a node in its [`DecodedTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One decoded structure element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Field that holds the element; empty at the root.
    pub name: String,
    pub type_id: TypeId,
    pub address: Address,
    /// Position within the field's array.
    pub index: usize,
    /// Nested structure elements, in encounter order.
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

/// Structure elements of one decoded value.
///
/// Nodes reference heap memory by [`Address`]; they own nothing in the heap.
#[derive(Debug, Default, Clone)]
pub struct DecodedTree {
    nodes: Vec<TreeNode>,
}

impl DecodedTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node under `parent`.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        type_id: TypeId,
        address: Address,
        index: usize,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            name: name.into(),
            type_id,
            address,
            index,
            children: Vec::new(),
            parent,
        });
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
            parent.children.push(id);
        }
        id
    }

    /// Make room for `additional` more children under `id`.
    pub(crate) fn reserve_children(&mut self, id: NodeId, additional: usize) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.children.reserve(additional);
        }
    }

    /// The first parentless node.
    pub fn root(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.parent.is_none())
            .map(NodeId)
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// `from` and every node below it, depth-first pre-order.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if self.get(id).is_none() {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Number of ancestors.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(id);
        while let Some(p) = cursor {
            depth += 1;
            cursor = self.parent(p);
        }
        depth
    }

    /// Dotted location from the root, e.g. `pts[1].origin[0]`.
    pub fn path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(node) = cursor.and_then(|c| self.get(c)) {
            if node.parent.is_some() {
                segments.push(format!("{}[{}]", node.name, node.index));
            }
            cursor = node.parent;
        }
        segments.reverse();
        segments.join(".")
    }
}
