//! Core engine for capsample.
//!
//! This crate turns a stream of `(owner, path)` samples into a per-owner
//! capacity report without touching the filesystem itself:
//!
//! - **Sample trees** - a trie per owner accumulating sample weight per path
//!   segment, compacted for display by merging light leaves upward
//! - **Estimates** - sample counts scaled to bytes or monthly cost, with
//!   optional 95% confidence intervals
//! - **Reports** - owners ordered by weight, rendered as text or serialized
//!
//! ```rust
//! use capsample_core::{OwnerTrees, Report, ReportConfig};
//!
//! let mut trees = OwnerTrees::new();
//! trees.insert("alice", "projects/video/raw.mov", 1);
//! trees.insert("bob", "home/bob/notes.txt", 1);
//!
//! let report = Report::build(trees, &ReportConfig::default(), 2, 1 << 40).unwrap();
//! println!("{report}");
//! ```

mod config;
mod error;
mod estimate;
mod report;
mod tree;

pub use config::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_LEAVES, DEFAULT_MIN_SAMPLES, DEFAULT_SAMPLES, ReportConfig,
    ReportConfigBuilder, ReportConfigBuilderError, SamplingConfig, SamplingConfigBuilder,
    SamplingConfigBuilderError,
};
pub use error::{ReportError, SampleError, SampleWarning, WarningKind};
pub use estimate::{
    BYTES_PER_TERABYTE, CONFIDENCE_Z, CapacityFormatter, Estimate, estimate,
    format_byte_magnitude,
};
pub use report::{OwnerReport, OwnerTrees, Report, TREE_INDENT, TreeView};
pub use tree::{Leaves, NodeId, PATH_SEPARATOR, SampleNode, SampleTree};
