//! # Blob Storage
//!
//! The durable storage boundary used by ingestion. An upload first lands in
//! a *scratch* file under a unique name; once the engine decides the
//! content is novel it is renamed to its permanent, content-addressed key.
//!
//! ## Layout
//!
//! ```text
//! {blob_dir}/{fingerprint_hex}{extension}   permanent blobs
//! {scratch_dir}/{uuid}.part                 in-flight uploads
//! ```
//!
//! The scratch directory should live on the same filesystem as the blob
//! directory so that promotion is a single `rename(2)`. The default layout
//! puts it at `{blob_dir}/tmp`.
//!
//! ## Scratch Names
//!
//! Scratch names are random UUIDs, never derived from the client filename,
//! so two concurrent uploads of `clip.ts` can never clobber each other.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use ccweb_core::StorageKey;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ScratchHandle
// ---------------------------------------------------------------------------

/// Opaque reference to an in-flight upload in scratch storage.
///
/// Deliberately not `Clone`: ownership of the handle tracks who is
/// responsible for promoting or removing the scratch bytes.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ScratchHandle(String);

impl ScratchHandle {
    /// Allocate a fresh, unique scratch name.
    pub fn new() -> Self {
        Self(format!("{}.part", Uuid::new_v4()))
    }

    /// The scratch file name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for ScratchHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScratchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// Durable byte storage with a scratch area and content-addressed blobs.
///
/// Implementations must be `Send + Sync` so one store can serve every
/// request worker.
pub trait BlobStore: Send + Sync {
    /// Reader over scratch bytes, used for fingerprinting.
    type ScratchReader: Read;
    /// Reader over a permanent blob, used for retrieval.
    type BlobReader: Read + Send + 'static;

    /// Copy `source` to completion into a new scratch file.
    ///
    /// On failure the partial scratch file is removed before returning.
    fn write_scratch(&self, source: &mut dyn Read) -> io::Result<ScratchHandle>;

    /// Open scratch bytes for reading.
    fn open_scratch(&self, scratch: &ScratchHandle) -> io::Result<Self::ScratchReader>;

    /// Size of the scratch bytes.
    fn size_of(&self, scratch: &ScratchHandle) -> io::Result<u64>;

    /// Promote scratch bytes to the permanent blob `key`.
    fn rename(&self, scratch: &ScratchHandle, key: &StorageKey) -> io::Result<()>;

    /// Discard scratch bytes.
    fn remove(&self, scratch: &ScratchHandle) -> io::Result<()>;

    /// Whether a permanent blob exists under `key`.
    fn contains(&self, key: &StorageKey) -> io::Result<bool>;

    /// Open a permanent blob, or `None` if it is missing.
    fn open(&self, key: &StorageKey) -> io::Result<Option<Self::BlobReader>>;
}

// ---------------------------------------------------------------------------
// FsBlobStore
// ---------------------------------------------------------------------------

/// A [`BlobStore`] backed by two local directories.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    blob_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl FsBlobStore {
    /// Create a store with explicit blob and scratch directories.
    ///
    /// Directories are created lazily on first write; call
    /// [`ensure_dirs()`](FsBlobStore::ensure_dirs) to fail fast at startup.
    pub fn new(blob_dir: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            blob_dir: blob_dir.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Create a store whose scratch area is `{blob_dir}/tmp`.
    pub fn with_default_scratch(blob_dir: impl Into<PathBuf>) -> Self {
        let blob_dir = blob_dir.into();
        let scratch_dir = blob_dir.join("tmp");
        Self::new(blob_dir, scratch_dir)
    }

    /// Create both directories if they do not exist.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.blob_dir)?;
        fs::create_dir_all(&self.scratch_dir)
    }

    /// Directory holding permanent blobs.
    pub fn blob_dir(&self) -> &Path {
        &self.blob_dir
    }

    /// Directory holding scratch files.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Filesystem path of a scratch handle.
    ///
    /// Async callers use this to spool an upload body themselves before
    /// handing the handle to the engine.
    pub fn scratch_path(&self, scratch: &ScratchHandle) -> PathBuf {
        self.scratch_dir.join(scratch.name())
    }

    /// Filesystem path of a permanent blob.
    ///
    /// Keys containing path separators are rejected.
    pub fn blob_path(&self, key: &StorageKey) -> io::Result<PathBuf> {
        let k = key.as_str();
        if k.is_empty() || k.contains(['/', '\\']) || k == "." || k == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("storage key {k:?} is not a plain file name"),
            ));
        }
        Ok(self.blob_dir.join(k))
    }
}

impl BlobStore for FsBlobStore {
    type ScratchReader = fs::File;
    type BlobReader = fs::File;

    fn write_scratch(&self, source: &mut dyn Read) -> io::Result<ScratchHandle> {
        fs::create_dir_all(&self.scratch_dir)?;
        let handle = ScratchHandle::new();
        let path = self.scratch_path(&handle);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        let copied = io::copy(source, &mut file).and_then(|_| file.flush());
        if let Err(e) = copied {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        Ok(handle)
    }

    fn open_scratch(&self, scratch: &ScratchHandle) -> io::Result<fs::File> {
        fs::File::open(self.scratch_path(scratch))
    }

    fn size_of(&self, scratch: &ScratchHandle) -> io::Result<u64> {
        Ok(fs::metadata(self.scratch_path(scratch))?.len())
    }

    fn rename(&self, scratch: &ScratchHandle, key: &StorageKey) -> io::Result<()> {
        let target = self.blob_path(key)?;
        fs::create_dir_all(&self.blob_dir)?;
        fs::rename(self.scratch_path(scratch), target)
    }

    fn remove(&self, scratch: &ScratchHandle) -> io::Result<()> {
        fs::remove_file(self.scratch_path(scratch))
    }

    fn contains(&self, key: &StorageKey) -> io::Result<bool> {
        Ok(self.blob_path(key)?.is_file())
    }

    fn open(&self, key: &StorageKey) -> io::Result<Option<fs::File>> {
        match fs::File::open(self.blob_path(key)?) {
            Ok(f) => Ok(Some(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ccweb_core::sha256_bytes;
    use std::io::Cursor;

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::with_default_scratch(dir.path().join("files"));
        (dir, store)
    }

    fn scratch_count(store: &FsBlobStore) -> usize {
        match fs::read_dir(store.scratch_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[test]
    fn scratch_handles_are_unique() {
        let a = ScratchHandle::new();
        let b = ScratchHandle::new();
        assert_ne!(a, b);
        assert!(a.name().ends_with(".part"));
    }

    #[test]
    fn write_scratch_then_read_back() {
        let (_dir, store) = store();
        let handle = store.write_scratch(&mut Cursor::new(b"hello".to_vec())).unwrap();
        assert_eq!(store.size_of(&handle).unwrap(), 5);

        let mut buf = String::new();
        store.open_scratch(&handle).unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn failed_scratch_write_leaves_nothing_behind() {
        struct HalfThenFail(bool);
        impl Read for HalfThenFail {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0 {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "client aborted"));
                }
                self.0 = true;
                buf[..3].copy_from_slice(b"abc");
                Ok(3)
            }
        }

        let (_dir, store) = store();
        let err = store.write_scratch(&mut HalfThenFail(false)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(scratch_count(&store), 0);
    }

    #[test]
    fn rename_promotes_to_content_address() {
        let (_dir, store) = store();
        let handle = store.write_scratch(&mut Cursor::new(b"X".to_vec())).unwrap();
        let key = StorageKey::derive(&sha256_bytes(b"X"), ".srt");

        assert!(!store.contains(&key).unwrap());
        store.rename(&handle, &key).unwrap();
        assert!(store.contains(&key).unwrap());
        assert_eq!(scratch_count(&store), 0);

        let mut buf = Vec::new();
        store.open(&key).unwrap().unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"X");
        assert_eq!(
            store.blob_path(&key).unwrap(),
            store.blob_dir().join(format!("{}.srt", sha256_bytes(b"X").to_hex()))
        );
    }

    #[test]
    fn remove_discards_scratch() {
        let (_dir, store) = store();
        let handle = store.write_scratch(&mut Cursor::new(b"tmp".to_vec())).unwrap();
        assert_eq!(scratch_count(&store), 1);
        store.remove(&handle).unwrap();
        assert_eq!(scratch_count(&store), 0);
        assert_eq!(store.remove(&handle).unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn open_missing_blob_is_none() {
        let (_dir, store) = store();
        let key = StorageKey::derive(&sha256_bytes(b"absent"), "");
        assert!(store.open(&key).unwrap().is_none());
    }

    #[test]
    fn blob_path_rejects_separators() {
        let (_dir, store) = store();
        for bad in ["../escape", "a/b", "a\\b", "..", ""] {
            let key = StorageKey::from_stored(bad);
            assert_eq!(
                store.blob_path(&key).unwrap_err().kind(),
                io::ErrorKind::InvalidInput,
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let (_dir, store) = store();
        store.ensure_dirs().unwrap();
        assert!(store.blob_dir().is_dir());
        assert!(store.scratch_dir().is_dir());
        assert!(store.scratch_dir().starts_with(store.blob_dir()));
    }
}
