//! Boundary contracts between the report engine and a storage backend.

use std::fmt;
use std::path::Path;

use compact_str::CompactString;
use strum::{EnumString, IntoStaticStr};

use capsample_core::SampleError;

/// Opaque identifier of a file within a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub CompactString);

impl FileId {
    /// Create a file id from its backend representation.
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self(id.into())
    }

    /// Backend representation of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation drawn by a sample source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    /// Path of the sampled file, relative to the sampled root, `/` separated.
    pub path: CompactString,
    /// Backend id of the sampled file.
    pub id: FileId,
}

impl SampleRecord {
    /// Create a sample record.
    pub fn new(path: impl Into<CompactString>, id: FileId) -> Self {
        Self {
            path: path.into(),
            id,
        }
    }
}

/// Namespace an owner identifier belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityKind {
    /// Windows security identifier.
    SmbSid,
    /// Numeric NFS / POSIX user id.
    NfsUid,
    /// Numeric NFS / POSIX group id.
    NfsGid,
    /// User local to the storage system.
    LocalUser,
    /// Group local to the storage system.
    LocalGroup,
    /// Anything the backend reports that has no dedicated handling.
    #[strum(default)]
    Other(String),
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKind::Other(kind) => f.write_str(kind),
            known => f.write_str(known.into()),
        }
    }
}

/// Owner of a file as reported by the backend, before label resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerIdentity {
    /// Backend-wide id of the owning principal.
    pub auth_id: CompactString,
    /// Namespace of `value`.
    pub kind: IdentityKind,
    /// Raw identifier within `kind`.
    pub value: CompactString,
}

impl OwnerIdentity {
    /// Create an owner identity.
    pub fn new(
        auth_id: impl Into<CompactString>,
        kind: IdentityKind,
        value: impl Into<CompactString>,
    ) -> Self {
        Self {
            auth_id: auth_id.into(),
            kind,
            value: value.into(),
        }
    }
}

/// Directory-service account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account name.
    pub name: String,
    /// Object classes of the account (`user`, `group`, ...).
    pub classes: Vec<String>,
}

impl Account {
    /// Whether the account is a group rather than a user.
    pub fn is_group(&self) -> bool {
        self.classes.iter().any(|class| class == "group")
    }
}

/// Identity equivalent to another one in a different namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedIdentity {
    /// Namespace of `value`.
    pub kind: IdentityKind,
    /// Raw identifier within `kind`.
    pub value: CompactString,
}

/// Draws capacity-weighted samples of the files under a root.
pub trait SampleSource: Sync {
    /// Draw `count` samples under `root`.
    fn sample(&self, root: &Path, count: u64) -> Result<Vec<SampleRecord>, SampleError>;
}

/// Reports the total capacity a backend tracks for a root.
pub trait CapacitySource {
    /// Bytes used under `root`.
    fn total_capacity(&self, root: &Path) -> Result<u64, SampleError>;
}

/// Reports per-file attributes.
pub trait AttributeSource: Sync {
    /// Owner of the file with id `id`.
    fn owner_identity(&self, id: &FileId) -> Result<OwnerIdentity, SampleError>;
}

/// Resolves identities to human-readable names.
pub trait IdentityDirectory: Sync {
    /// Directory account for a Windows SID.
    fn sid_to_account(&self, sid: &str) -> Result<Account, SampleError>;

    /// Every identity equivalent to `auth_id`.
    fn related_identities(&self, auth_id: &str) -> Result<Vec<RelatedIdentity>, SampleError>;

    /// Local user name for a numeric uid.
    fn uid_to_name(&self, uid: &str) -> Result<String, SampleError>;
}
