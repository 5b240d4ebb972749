//! Per-run memoization of owner labels.

use compact_str::CompactString;
use dashmap::DashMap;

use crate::source::{FileId, OwnerIdentity};

/// Owner labels already resolved during one report run.
///
/// Labels are cached both by file id and by owner identity, so files owned
/// by the same principal cost a single directory lookup. The maps are
/// concurrent, letting worker threads share one cache.
#[derive(Debug, Default)]
pub struct OwnerCache {
    by_file: DashMap<FileId, CompactString>,
    by_identity: DashMap<OwnerIdentity, CompactString>,
}

impl OwnerCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            by_file: DashMap::new(),
            by_identity: DashMap::new(),
        }
    }

    /// Label previously resolved for a file.
    pub fn file_label(&self, id: &FileId) -> Option<CompactString> {
        self.by_file.get(id).map(|label| label.value().clone())
    }

    /// Remember the label of a file.
    pub fn insert_file_label(&self, id: FileId, label: CompactString) {
        self.by_file.insert(id, label);
    }

    /// Label for `identity`, computing and storing it on first use.
    pub fn identity_label(
        &self,
        identity: &OwnerIdentity,
        resolve: impl FnOnce() -> CompactString,
    ) -> CompactString {
        if let Some(label) = self.by_identity.get(identity) {
            return label.value().clone();
        }
        // Resolve outside the shard lock; a racing thread computes the same label.
        let label = resolve();
        self.by_identity
            .entry(identity.clone())
            .or_insert(label)
            .value()
            .clone()
    }

    /// Number of files with a cached label.
    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    /// Check if no labels have been cached.
    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty() && self.by_identity.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IdentityKind;
    use std::cell::Cell;

    #[test]
    fn test_file_label_round_trip() {
        let cache = OwnerCache::new();
        let id = FileId::new("42");

        assert!(cache.file_label(&id).is_none());
        cache.insert_file_label(id.clone(), "AD:alice".into());
        assert_eq!(cache.file_label(&id).as_deref(), Some("AD:alice"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_identity_label_resolves_once() {
        let cache = OwnerCache::new();
        let identity = OwnerIdentity::new("500", IdentityKind::NfsUid, "1001");
        let calls = Cell::new(0);

        for _ in 0..3 {
            let label = cache.identity_label(&identity, || {
                calls.set(calls.get() + 1);
                "NFS_UID:1001".into()
            });
            assert_eq!(label, "NFS_UID:1001");
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_is_empty() {
        let cache = OwnerCache::new();
        assert!(cache.is_empty());
        cache.insert_file_label(FileId::new("1"), "LOCAL:admin".into());
        assert!(!cache.is_empty());
    }
}
