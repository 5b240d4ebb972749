//! Per-owner sample trees and the capacity report built from them.

use std::fmt;

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::estimate::CapacityFormatter;
use crate::tree::{NodeId, SampleTree};

/// Indentation in front of every rendered owner tree.
pub const TREE_INDENT: &str = "    ";

/// Sample trees keyed by owner label, in the order owners were first seen.
#[derive(Debug, Clone, Default)]
pub struct OwnerTrees {
    trees: IndexMap<CompactString, SampleTree>,
}

impl OwnerTrees {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` samples at `path` to `owner`'s tree, creating it if needed.
    pub fn insert(&mut self, owner: &str, path: &str, weight: u64) {
        self.trees
            .entry(CompactString::new(owner))
            .or_default()
            .insert(path, weight);
    }

    /// Tree for `owner`, if any samples were attributed to it.
    pub fn get(&self, owner: &str) -> Option<&SampleTree> {
        self.trees.get(owner)
    }

    /// Number of distinct owners.
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Whether no samples were inserted.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Total weight across every owner.
    pub fn total_samples(&self) -> u64 {
        self.trees.values().map(SampleTree::total_samples).sum()
    }

    /// Owners in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SampleTree)> {
        self.trees.iter().map(|(owner, tree)| (owner.as_str(), tree))
    }

    /// Owner labels sorted by descending total weight.
    ///
    /// Owners with equal weight keep their discovery order.
    pub fn owners_by_weight(&self) -> Vec<&str> {
        let mut owners: Vec<_> = self.iter().collect();
        owners.sort_by(|(_, a), (_, b)| b.total_samples().cmp(&a.total_samples()));
        owners.into_iter().map(|(owner, _)| owner).collect()
    }

    fn into_sorted(self) -> Vec<(CompactString, SampleTree)> {
        let mut owners: Vec<_> = self.trees.into_iter().collect();
        owners.sort_by(|(_, a), (_, b)| b.total_samples().cmp(&a.total_samples()));
        owners
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for OwnerTrees {
    /// Build trees from `(owner, path)` pairs, one sample each.
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut trees = Self::new();
        for (owner, path) in iter {
            trees.insert(owner, path, 1);
        }
        trees
    }
}

/// Serializable snapshot of a (pruned) sample tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeView {
    /// Path segment.
    pub name: String,
    /// Weight attributed directly to this node.
    pub samples: u64,
    /// Weight of the whole subtree.
    pub sum_samples: u64,
    /// Children in name order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeView>,
}

impl TreeView {
    /// Snapshot the subtree of `tree` rooted at `id`.
    pub fn of(tree: &SampleTree, id: NodeId) -> Self {
        let node = &tree[id];
        Self {
            name: node.name().to_string(),
            samples: node.samples(),
            sum_samples: node.sum_samples(),
            children: node
                .children()
                .map(|(_, child)| TreeView::of(tree, child))
                .collect(),
        }
    }
}

/// One owner's section of the report.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerReport {
    /// Owner label.
    pub owner: String,
    /// Samples attributed to this owner.
    pub samples: u64,
    /// Share of all samples, in percent.
    pub percent: f64,
    /// Formatted capacity or cost estimate.
    pub capacity: String,
    /// Pruned directory tree.
    pub tree: TreeView,
    /// Rendered directory listing of the pruned tree.
    #[serde(skip)]
    pub listing: String,
}

/// Capacity report across every owner.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Number of samples the estimates are based on.
    pub total_samples: u64,
    /// Total capacity used under the sampled root, in bytes.
    pub total_capacity: u64,
    /// Formatted estimate for the whole root.
    pub total: String,
    /// Owners sorted by descending sample count.
    pub owners: Vec<OwnerReport>,
}

impl Report {
    /// Prune every owner's tree and format the estimates.
    ///
    /// `total_samples` is the number of draws the trees were built from; it
    /// must be positive and no owner may hold more than that.
    pub fn build(
        trees: OwnerTrees,
        config: &ReportConfig,
        total_samples: u64,
        total_capacity: u64,
    ) -> Result<Self, ReportError> {
        let formatter = CapacityFormatter::new(total_samples, total_capacity, config)?;
        if let Some(count) = trees
            .iter()
            .map(|(_, tree)| tree.total_samples())
            .find(|count| *count > total_samples)
        {
            return Err(ReportError::CountExceedsTotal {
                count,
                total: total_samples,
            });
        }

        info!(
            owners = trees.len(),
            total_samples,
            total_capacity,
            "building capacity report"
        );

        let owners = trees
            .into_sorted()
            .into_iter()
            .map(|(owner, mut tree)| {
                tree.prune_until(config.max_leaves, config.min_samples);
                let samples = tree.total_samples();
                let listing = tree.render_from(
                    display_root(&tree),
                    TREE_INDENT,
                    |n| formatter.format(n),
                );
                OwnerReport {
                    owner: owner.to_string(),
                    samples,
                    percent: formatter.percent(samples),
                    capacity: formatter.format(samples),
                    tree: TreeView::of(&tree, tree.root()),
                    listing,
                }
            })
            .collect();

        Ok(Self {
            total_samples,
            total_capacity,
            total: formatter.format(total_samples),
            owners,
        })
    }
}

/// Node the listing starts from.
///
/// Absolute sample paths put everything under a child with an empty name;
/// that child stands in for the root when present.
fn display_root(tree: &SampleTree) -> NodeId {
    tree.child(tree.root(), "").unwrap_or(tree.root())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total: {}", self.total)?;
        for owner in &self.owners {
            writeln!(
                f,
                "Owner {} (~{:.1}%/{})",
                owner.owner, owner.percent, owner.capacity
            )?;
            writeln!(f, "{}", owner.listing)?;
        }
        Ok(())
    }
}
