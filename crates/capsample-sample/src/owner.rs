//! Turning file owners into report labels.

use compact_str::{CompactString, format_compact};
use tracing::debug;

use crate::cache::OwnerCache;
use crate::source::{AttributeSource, FileId, IdentityDirectory, IdentityKind, OwnerIdentity};

/// Human-readable label for an owner identity.
///
/// - `SMB_SID`: `AD:<account>`
/// - `NFS_UID`: `AD:<account>` of a related SID that is not a group, else
///   `NFS:<user> (id:<uid>)`
/// - `LOCAL_USER`: `LOCAL:<name>`
///
/// Whenever a lookup fails the label falls back to `<KIND>:<value>`.
pub fn format_owner(directory: &impl IdentityDirectory, identity: &OwnerIdentity) -> CompactString {
    let value = identity.value.as_str();
    let label = match &identity.kind {
        IdentityKind::SmbSid => match directory.sid_to_account(value) {
            Ok(account) => Some(format_compact!("AD:{}", account.name)),
            Err(err) => {
                debug!(sid = value, error = %err, "SID lookup failed");
                None
            }
        },
        IdentityKind::NfsUid => ad_label_for(directory, &identity.auth_id)
            .or_else(|| match directory.uid_to_name(value) {
                Ok(name) => Some(format_compact!("NFS:{name} (id:{value})")),
                Err(err) => {
                    debug!(uid = value, error = %err, "uid lookup failed");
                    None
                }
            }),
        IdentityKind::LocalUser => Some(format_compact!("LOCAL:{value}")),
        _ => None,
    };

    label.unwrap_or_else(|| format_compact!("{}:{value}", identity.kind))
}

/// Directory account behind any SID related to `auth_id`.
///
/// Group accounts are skipped; when several users match, the last one wins.
fn ad_label_for(directory: &impl IdentityDirectory, auth_id: &str) -> Option<CompactString> {
    let related = directory.related_identities(auth_id).unwrap_or_else(|err| {
        debug!(auth_id, error = %err, "related identity lookup failed");
        Vec::new()
    });

    related
        .iter()
        .filter(|identity| identity.kind == IdentityKind::SmbSid)
        .filter_map(|identity| match directory.sid_to_account(&identity.value) {
            Ok(account) if !account.is_group() => Some(format_compact!("AD:{}", account.name)),
            Ok(_) => None,
            Err(err) => {
                debug!(sid = %identity.value, error = %err, "SID lookup failed");
                None
            }
        })
        .last()
}

/// Resolves file ids to owner labels, memoizing in a per-run cache.
pub struct OwnerResolver<'a, A, D> {
    attributes: &'a A,
    directory: &'a D,
    cache: &'a OwnerCache,
}

impl<'a, A, D> OwnerResolver<'a, A, D>
where
    A: AttributeSource,
    D: IdentityDirectory,
{
    /// Create a resolver backed by `attributes` and `directory`.
    pub fn new(attributes: &'a A, directory: &'a D, cache: &'a OwnerCache) -> Self {
        Self {
            attributes,
            directory,
            cache,
        }
    }

    /// Cache the resolver writes to.
    pub fn cache(&self) -> &OwnerCache {
        self.cache
    }

    /// Owner label of the file `id`.
    ///
    /// Never fails: a file whose attributes cannot be read is labelled
    /// `UNKNOWN:<file id>`.
    pub fn resolve(&self, id: &FileId) -> CompactString {
        if let Some(label) = self.cache.file_label(id) {
            return label;
        }

        let label = match self.attributes.owner_identity(id) {
            Ok(identity) => self
                .cache
                .identity_label(&identity, || format_owner(self.directory, &identity)),
            Err(err) => {
                debug!(file = %id, error = %err, "owner attribute lookup failed");
                format_compact!("UNKNOWN:{id}")
            }
        };

        self.cache.insert_file_label(id.clone(), label.clone());
        label
    }
}
