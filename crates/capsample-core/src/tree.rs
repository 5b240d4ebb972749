//! Arena-backed trie that aggregates weighted path samples.
//!
//! Every inserted path is split on `/` and walked from the root, creating
//! nodes on demand. Each node tracks the weight attributed directly to it
//! (`samples`) and the weight of its whole subtree (`sum_samples`).
//!
//! [`SampleTree::prune_until`] compacts the tree for display by repeatedly
//! folding the lightest leaf into its parent until the tree is small enough
//! and every remaining leaf is heavy enough.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::ops::Index;

use compact_str::CompactString;
use tracing::debug;

use crate::error::ReportError;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Index of a node within a [`SampleTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Arena slot of this node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One path segment within an owner's sample tree.
#[derive(Debug, Clone)]
pub struct SampleNode {
    name: CompactString,
    parent: Option<NodeId>,
    children: BTreeMap<CompactString, NodeId>,
    samples: u64,
    sum_samples: u64,
}

impl SampleNode {
    fn new(name: impl Into<CompactString>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            parent,
            children: BTreeMap::new(),
            samples: 0,
            sum_samples: 0,
        }
    }

    /// Path segment this node represents (empty for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Containing node, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Weight attributed to exactly this path.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Weight of this node plus all of its descendants.
    pub fn sum_samples(&self) -> u64 {
        self.sum_samples
    }

    /// Children in lexicographic order of their names.
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Whether this node currently has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether this node is the root of its tree.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Aggregate of weighted path samples for a single owner.
///
/// Nodes live in a flat arena and refer to their parent by [`NodeId`], so the
/// back-reference never owns anything. Slots of nodes removed by pruning are
/// left empty and never reused.
#[derive(Debug, Clone)]
pub struct SampleTree {
    nodes: Vec<Option<SampleNode>>,
    root: NodeId,
    live: usize,
}

impl SampleTree {
    /// Create a tree holding only an empty root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(SampleNode::new("", None))],
            root: NodeId(0),
            live: 1,
        }
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a node by id, `None` if it was pruned away.
    pub fn get(&self, id: NodeId) -> Option<&SampleNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> &mut SampleNode {
        self.nodes[id.index()]
            .as_mut()
            .expect("node ids handed out by the tree stay valid until removed")
    }

    /// Number of nodes currently in the tree, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the tree holds nothing but an empty root.
    pub fn is_empty(&self) -> bool {
        self.live == 1 && self[self.root].samples == 0
    }

    /// Total weight inserted into the tree.
    pub fn total_samples(&self) -> u64 {
        self[self.root].sum_samples
    }

    /// Look up the direct child of `parent` called `name`.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.get(parent)?.children.get(name).copied()
    }

    /// Look up the node for `path`, using the same segmentation as [`insert`].
    ///
    /// [`insert`]: SampleTree::insert
    pub fn find(&self, path: &str) -> Option<NodeId> {
        segments(path).try_fold(self.root, |id, segment| self.child(id, segment))
    }

    /// Add `weight` samples at `path`.
    ///
    /// Missing nodes along the path are created. The final node's `samples`
    /// and the `sum_samples` of every node from the root down grow by
    /// `weight`. An empty path denotes the root itself.
    ///
    /// # Panics
    ///
    /// Panics if the tree's total weight would overflow a `u64`. Use
    /// [`SampleTree::try_insert`] to handle that case.
    pub fn insert(&mut self, path: &str, weight: u64) -> NodeId {
        self.try_insert(path, weight)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Add `weight` samples at `path`, failing if the total would overflow.
    ///
    /// The root carries the largest sum in the tree, so checking it covers
    /// every node on the path. The tree is left untouched on error.
    pub fn try_insert(&mut self, path: &str, weight: u64) -> Result<NodeId, ReportError> {
        let total = self.total_samples();
        if total.checked_add(weight).is_none() {
            return Err(ReportError::WeightOverflow { total, weight });
        }

        let mut current = self.root;
        self.node_mut(current).sum_samples += weight;

        for segment in segments(path) {
            current = match self.child(current, segment) {
                Some(id) => id,
                None => self.add_child(current, segment),
            };
            self.node_mut(current).sum_samples += weight;
        }

        self.node_mut(current).samples += weight;
        Ok(current)
    }

    fn add_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(SampleNode::new(name, Some(parent))));
        self.node_mut(parent).children.insert(CompactString::new(name), id);
        self.live += 1;
        id
    }

    /// Iterate over every node that currently has no children.
    ///
    /// The iterator borrows the tree, so it must be drained before any
    /// pruning starts.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Number of leaves currently in the tree.
    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    /// Fold the leaf `id` into its parent and return the parent.
    ///
    /// The parent's `samples` absorbs the leaf's weight and the leaf is
    /// unlinked in the same step, so `sum_samples` stays consistent. The root
    /// has nowhere to go and is returned unchanged.
    fn merge_up(&mut self, id: NodeId) -> NodeId {
        let Some(parent) = self.get(id).and_then(SampleNode::parent) else {
            return id;
        };
        debug_assert!(self[id].is_leaf(), "only leaves are merged up");

        let Some(leaf) = self.nodes[id.index()].take() else {
            return parent;
        };
        let parent_node = self.node_mut(parent);
        parent_node.samples += leaf.samples;
        parent_node.children.remove(&leaf.name);
        self.live -= 1;
        parent
    }

    /// Collapse light leaves into their parents.
    ///
    /// Repeatedly takes the leaf with the smallest direct weight. Stops once
    /// that weight exceeds `min_samples` while at most `max_leaves` leaves
    /// remain, or once only the root is left. Parents that lose their last
    /// child become leaves and compete like any other. Total weight is
    /// unchanged.
    ///
    /// Equal weights are taken in arena order. Returns the number of merges.
    pub fn prune_until(&mut self, max_leaves: usize, min_samples: u64) -> usize {
        let mut heap: BinaryHeap<Reverse<(u64, NodeId)>> = self
            .leaves()
            .map(|id| Reverse((self[id].samples, id)))
            .collect();
        let mut merges = 0;

        while let Some(&Reverse((samples, id))) = heap.peek() {
            if id == self.root {
                break;
            }
            if samples > min_samples && heap.len() <= max_leaves {
                break;
            }

            heap.pop();
            let parent = self.merge_up(id);
            merges += 1;

            if self[parent].is_leaf() {
                heap.push(Reverse((self[parent].samples, parent)));
            }
        }

        debug!(
            merges,
            remaining = self.live,
            max_leaves,
            min_samples,
            "pruned sample tree"
        );
        merges
    }

    /// Render the whole tree as a directory listing.
    ///
    /// See [`SampleTree::render_from`].
    pub fn render(&self, indent: &str, format_samples: impl Fn(u64) -> String) -> String {
        self.render_from(self.root, indent, format_samples)
    }

    /// Render the subtree at `id` as a directory listing.
    ///
    /// Each line is `indent`, a connector (`\---` for the last sibling, `+---`
    /// otherwise) and the node name. Nodes carrying direct samples are
    /// followed by `(format_samples(sum_samples))`. Children are listed in
    /// name order; lines are joined with `\n` without a trailing newline.
    pub fn render_from(
        &self,
        id: NodeId,
        indent: &str,
        format_samples: impl Fn(u64) -> String,
    ) -> String {
        let mut out = String::new();
        if self.get(id).is_some() {
            self.render_node(id, indent, true, &format_samples, &mut out);
        }
        out
    }

    fn render_node(
        &self,
        id: NodeId,
        indent: &str,
        is_last: bool,
        format_samples: &dyn Fn(u64) -> String,
        out: &mut String,
    ) {
        let node = &self[id];
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(indent);
        out.push_str(if is_last { "\\---" } else { "+---" });
        out.push_str(&node.name);
        if node.samples > 0 {
            out.push('(');
            out.push_str(&format_samples(node.sum_samples));
            out.push(')');
        }

        let next_indent = format!("{indent}{}", if is_last { "    " } else { "|   " });
        let last = node.children.len().saturating_sub(1);
        for (i, child) in node.children.values().enumerate() {
            self.render_node(*child, &next_indent, i == last, format_samples, out);
        }
    }

    /// Check that every node's `sum_samples` equals its own samples plus its
    /// children's sums, and that parent and child links agree.
    pub fn is_consistent(&self) -> bool {
        self.nodes.iter().enumerate().all(|(index, slot)| {
            let Some(node) = slot else { return true };
            let children_sum: u64 = node
                .children
                .values()
                .filter_map(|child| self.get(*child))
                .map(SampleNode::sum_samples)
                .sum();
            let linked = node.children.iter().all(|(name, child)| {
                self.get(*child)
                    .is_some_and(|c| c.parent == Some(NodeId(index)) && &c.name == name)
            });
            node.sum_samples == node.samples + children_sum && linked
        })
    }
}

impl Default for SampleTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<NodeId> for SampleTree {
    type Output = SampleNode;

    fn index(&self, id: NodeId) -> &SampleNode {
        self.get(id)
            .unwrap_or_else(|| panic!("node {} was removed from the tree", id.index()))
    }
}

/// Depth-first iterator over the leaves of a [`SampleTree`].
pub struct Leaves<'a> {
    tree: &'a SampleTree,
    stack: Vec<NodeId>,
}

impl Iterator for Leaves<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            let node = &self.tree[id];
            if node.is_leaf() {
                return Some(id);
            }
            self.stack.extend(node.children.values().copied());
        }
        None
    }
}

/// Split a path into segments. The empty path has none.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    let mut parts = path.split(PATH_SEPARATOR);
    if path.is_empty() {
        parts.next();
    }
    parts
}
