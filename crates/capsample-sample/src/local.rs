//! Sample backend over a local directory tree.
//!
//! The tree is indexed once with jwalk. Samples are then drawn in
//! proportion to file size: each draw picks a uniformly random byte offset
//! in the concatenation of all files and reports the file containing it, so
//! every draw is an independent trial.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDir};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use capsample_core::{SampleError, SampleWarning, WarningKind};

use crate::source::{
    Account, AttributeSource, CapacitySource, FileId, IdentityDirectory, IdentityKind,
    OwnerIdentity, RelatedIdentity, SampleRecord, SampleSource,
};

/// A regular file found while indexing.
#[derive(Debug, Clone)]
struct IndexedFile {
    path: CompactString,
    id: FileId,
    owner_uid: Option<u32>,
}

/// Capacity-weighted sampling over the regular files below a directory.
pub struct LocalBackend {
    root: PathBuf,
    files: Vec<IndexedFile>,
    /// Running total of file sizes; `ends[i]` is the offset just past file `i`.
    ends: Vec<u64>,
    by_id: HashMap<FileId, usize>,
    warnings: Vec<SampleWarning>,
    /// Fixed generator seed; `None` seeds every request from OS entropy.
    seed: Option<u64>,
    requests: AtomicU64,
}

impl LocalBackend {
    /// Index every regular file below `root`.
    ///
    /// `threads` sizes the walk's thread pool (0 = rayon default). Hardlinked
    /// files are counted once.
    pub fn open(root: impl AsRef<Path>, threads: usize) -> Result<Self, SampleError> {
        let requested = root.as_ref();
        let root = requested
            .canonicalize()
            .map_err(|e| SampleError::io(requested, e))?;
        if !root.is_dir() {
            return Err(SampleError::NotADirectory { path: root });
        }

        let parallelism = match threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };
        let walker = WalkDir::new(&root)
            .parallelism(parallelism)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true);

        let mut backend = Self {
            root,
            files: Vec::new(),
            ends: Vec::new(),
            by_id: HashMap::new(),
            warnings: Vec::new(),
            seed: None,
            requests: AtomicU64::new(0),
        };
        let mut seen_links = HashSet::new();
        let mut total: u64 = 0;

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    backend.warn(path, err.to_string(), WarningKind::ReadError);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    backend.warn(path, err.to_string(), WarningKind::MetadataError);
                    continue;
                }
            };

            let relative = relative_path(&backend.root, &path);
            let id = file_id(&metadata, &relative);
            if get_nlink(&metadata) > 1 && !seen_links.insert(id.clone()) {
                continue;
            }

            total += metadata.len();
            backend.by_id.insert(id.clone(), backend.files.len());
            backend.ends.push(total);
            backend.files.push(IndexedFile {
                path: relative,
                id,
                owner_uid: get_uid(&metadata),
            });
        }

        info!(
            root = %backend.root.display(),
            files = backend.files.len(),
            bytes = total,
            warnings = backend.warnings.len(),
            "indexed local tree"
        );
        Ok(backend)
    }

    /// Seed every request's generator from `seed` instead of OS entropy.
    ///
    /// Each request still gets its own stream, so concurrent workers draw
    /// different samples, but a run's sample set is reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn warn(&mut self, path: PathBuf, message: String, kind: WarningKind) {
        warn!(path = %path.display(), %message, "skipping entry");
        self.warnings.push(SampleWarning::new(path, message, kind));
    }

    /// Canonical root the backend was opened on.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Bytes across every indexed file.
    pub fn total_bytes(&self) -> u64 {
        self.ends.last().copied().unwrap_or(0)
    }

    /// Entries skipped while indexing.
    pub fn warnings(&self) -> &[SampleWarning] {
        &self.warnings
    }

    fn check_root(&self, root: &Path) -> Result<(), SampleError> {
        let requested = root.canonicalize().map_err(|e| SampleError::io(root, e))?;
        if requested != self.root {
            return Err(SampleError::RootMismatch {
                expected: self.root.clone(),
                requested,
            });
        }
        Ok(())
    }

    /// Generator for one sample request.
    fn request_rng(&self) -> ChaCha8Rng {
        let request = self.requests.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(request);
                rng
            }
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// File containing a uniformly drawn byte offset.
    fn draw<R: Rng>(&self, rng: &mut R) -> Option<&IndexedFile> {
        let total = self.total_bytes();
        if total == 0 {
            return None;
        }
        let offset = rng.gen_range(0..total);
        let index = self.ends.partition_point(|&end| end <= offset);
        self.files.get(index)
    }
}

impl SampleSource for LocalBackend {
    fn sample(&self, root: &Path, count: u64) -> Result<Vec<SampleRecord>, SampleError> {
        self.check_root(root)?;
        let mut rng = self.request_rng();
        Ok((0..count)
            .filter_map(|_| self.draw(&mut rng))
            .map(|file| SampleRecord::new(file.path.clone(), file.id.clone()))
            .collect())
    }
}

impl CapacitySource for LocalBackend {
    fn total_capacity(&self, root: &Path) -> Result<u64, SampleError> {
        self.check_root(root)?;
        Ok(self.total_bytes())
    }
}

impl AttributeSource for LocalBackend {
    fn owner_identity(&self, id: &FileId) -> Result<OwnerIdentity, SampleError> {
        let file = self
            .by_id
            .get(id)
            .and_then(|&index| self.files.get(index))
            .ok_or_else(|| SampleError::lookup(id.as_str(), "file is not indexed"))?;
        let uid = file
            .owner_uid
            .ok_or_else(|| SampleError::lookup(id.as_str(), "owner is not available"))?;
        let uid = uid.to_string();
        Ok(OwnerIdentity::new(uid.as_str(), IdentityKind::NfsUid, uid.as_str()))
    }
}

/// Identity lookups against the local system user database.
///
/// There is no directory service locally, so SID lookups always fail and no
/// identities are related.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDirectory;

impl IdentityDirectory for LocalDirectory {
    fn sid_to_account(&self, sid: &str) -> Result<Account, SampleError> {
        Err(SampleError::lookup(sid, "no directory service configured"))
    }

    fn related_identities(&self, _auth_id: &str) -> Result<Vec<RelatedIdentity>, SampleError> {
        Ok(Vec::new())
    }

    fn uid_to_name(&self, uid: &str) -> Result<String, SampleError> {
        lookup_user(uid)
    }
}

#[cfg(unix)]
fn lookup_user(uid: &str) -> Result<String, SampleError> {
    use nix::unistd::{Uid, User};

    let raw: u32 = uid
        .parse()
        .map_err(|e: std::num::ParseIntError| SampleError::lookup(uid, e.to_string()))?;
    match User::from_uid(Uid::from_raw(raw)) {
        Ok(Some(user)) => Ok(user.name),
        Ok(None) => Err(SampleError::lookup(uid, "no such user")),
        Err(errno) => Err(SampleError::lookup(uid, errno.to_string())),
    }
}

#[cfg(not(unix))]
fn lookup_user(uid: &str) -> Result<String, SampleError> {
    Err(SampleError::lookup(uid, "user database not available"))
}

/// `/`-separated path of `path` relative to `root`.
fn relative_path(root: &Path, path: &Path) -> CompactString {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut out = CompactString::default();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}

// Cross-platform metadata helpers

/// Device and inode identify a file on unix.
#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata, _relative: &str) -> FileId {
    FileId::new(format!("{}:{}", metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata, relative: &str) -> FileId {
    FileId::new(relative)
}

/// Get the number of hard links from metadata.
#[cfg(unix)]
fn get_nlink(metadata: &std::fs::Metadata) -> u64 {
    metadata.nlink()
}

#[cfg(not(unix))]
fn get_nlink(_metadata: &std::fs::Metadata) -> u64 {
    1 // Assume single link on Windows
}

/// Get the owning user id from metadata.
#[cfg(unix)]
fn get_uid(metadata: &std::fs::Metadata) -> Option<u32> {
    Some(metadata.uid())
}

#[cfg(not(unix))]
fn get_uid(_metadata: &std::fs::Metadata) -> Option<u32> {
    None
}
