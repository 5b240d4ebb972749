//! Sample sources and owner resolution for capsample.
//!
//! This crate provides the collaborators around the report engine in
//! `capsample-core`:
//!
//! - **Sources** - traits a storage backend implements to hand out samples,
//!   total capacity, file owners and directory lookups
//! - **Local backend** - capacity-weighted sampling over a local directory
//!   tree indexed with jwalk
//! - **Owner resolution** - owner identities turned into report labels,
//!   memoized per run
//! - **Worker pool** - bounded fan-out of sample and owner requests

mod cache;
mod local;
mod owner;
mod pool;
mod source;

pub use cache::OwnerCache;
pub use local::{LocalBackend, LocalDirectory};
pub use owner::{OwnerResolver, format_owner};
pub use pool::{OWNER_BATCH_SIZE, WorkerPool};
pub use source::{
    Account, AttributeSource, CapacitySource, FileId, IdentityDirectory, IdentityKind,
    OwnerIdentity, RelatedIdentity, SampleRecord, SampleSource,
};

// Re-export core types for convenience
pub use capsample_core::{SampleError, SampleWarning, SamplingConfig, WarningKind};
