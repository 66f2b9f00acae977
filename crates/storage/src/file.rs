//! Filesystem storage backend.
//!
//! [`FileBackend`] keeps one file per identity key inside a root directory.
//! Writes go to a temporary sibling first and are then renamed over the
//! target, so a crash mid-write leaves either the old blob or the new one.
//!
//! Every write gets its own randomly named temporary file, so concurrent
//! stores for one key never share a partially written file and the last
//! rename wins.
//!
//! File names are the URL-safe base64 encoding of the identity key, which
//! keeps separators and `..` out of the path regardless of what the caller
//! passes in. Keys whose encoding would exceed [`MAX_ENCODED_NAME_LEN`] are
//! named by their SHA-256 digest instead. The `sha256.` prefix cannot occur
//! in a base64 name, so the two schemes never collide.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
};

const BLOB_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Longest base64 file stem used verbatim. Longer keys are digested.
pub const MAX_ENCODED_NAME_LEN: usize = 128;

/// Directory-backed persistence adapter.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Opens (and creates if needed) a backend rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::connection_with_source(
                format!("cannot create storage directory {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob file for `identity_key`.
    #[must_use]
    pub fn blob_path(&self, identity_key: &str) -> PathBuf {
        self.root.join(format!("{}.{BLOB_EXTENSION}", file_stem(identity_key)))
    }

    /// A fresh temporary path for one write of `identity_key`.
    fn temp_path(&self, identity_key: &str) -> PathBuf {
        let nonce: u64 = rand::random();
        self.root.join(format!("{}.{nonce:016x}.{TEMP_EXTENSION}", file_stem(identity_key)))
    }
}

async fn write_and_rename(temp: &Path, path: &Path, blob: &[u8]) -> StorageResult<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp)
        .await
        .map_err(|e| io_error("cannot create", temp, e))?;
    file.write_all(blob).await.map_err(|e| io_error("cannot write", temp, e))?;
    file.sync_all().await.map_err(|e| io_error("cannot sync", temp, e))?;
    drop(file);

    fs::rename(temp, path).await.map_err(|e| io_error("cannot rename", temp, e))
}

fn file_stem(identity_key: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(identity_key.as_bytes());
    if encoded.len() <= MAX_ENCODED_NAME_LEN {
        encoded
    } else {
        format!("sha256.{:x}", Sha256::digest(identity_key.as_bytes()))
    }
}

/// Maps an I/O failure onto the adapter error taxonomy.
///
/// Failures that retrying cannot fix (bad names, permissions, wrong file
/// types) are [`StorageError::Internal`]. Everything else is treated as the
/// medium being unavailable.
fn io_error(action: &str, path: &Path, err: std::io::Error) -> StorageError {
    let message = format!("{action} {}", path.display());
    match err.kind() {
        ErrorKind::PermissionDenied
        | ErrorKind::InvalidFilename
        | ErrorKind::InvalidInput
        | ErrorKind::ReadOnlyFilesystem
        | ErrorKind::IsADirectory
        | ErrorKind::NotADirectory
        | ErrorKind::FileTooLarge => StorageError::internal_with_source(message, err),
        _ => StorageError::connection_with_source(message, err),
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    #[tracing::instrument(skip(self))]
    async fn load(&self, identity_key: &str) -> StorageResult<Option<String>> {
        let path = self.blob_path(identity_key);
        match fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                StorageError::serialization_with_source(
                    format!("blob at {} is not valid UTF-8", path.display()),
                    e,
                )
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("cannot read", &path, e)),
        }
    }

    #[tracing::instrument(skip(self, blob), fields(blob_len = blob.len()))]
    async fn store(&self, identity_key: &str, blob: String) -> StorageResult<()> {
        let path = self.blob_path(identity_key);
        let temp = self.temp_path(identity_key);

        let result = write_and_rename(&temp, &path, blob.as_bytes()).await;
        if result.is_err()
            && let Err(err) = fs::remove_file(&temp).await
            && err.kind() != ErrorKind::NotFound
        {
            tracing::warn!(path = %temp.display(), error = %err, "cannot remove temp file");
        }
        result
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, identity_key: &str) -> StorageResult<()> {
        let path = self.blob_path(identity_key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("cannot delete", &path, e)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<()> {
        let meta =
            fs::metadata(&self.root).await.map_err(|e| io_error("cannot stat", &self.root, e))?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(StorageError::internal(format!("{} is not a directory", self.root.display())))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blob_path_stays_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        let path = backend.blob_path("../../etc/passwd");
        assert_eq!(path.parent(), Some(dir.path()));
    }

    #[tokio::test]
    async fn store_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        backend.store("K", "first".to_owned()).await.unwrap();
        backend.store("K", "second".to_owned()).await.unwrap();

        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        let only = entries.next().unwrap().unwrap();
        assert!(entries.next().is_none());
        assert_eq!(only.path(), backend.blob_path("K"));
        assert_eq!(backend.load("K").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn long_identity_keys_get_bounded_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        let a = format!("{}a", "k".repeat(300));
        let b = format!("{}b", "k".repeat(300));

        let path_a = backend.blob_path(&a);
        let name_len = path_a.file_name().unwrap().len();
        assert!(name_len < 255, "file name is {name_len} bytes");
        assert_ne!(path_a, backend.blob_path(&b));
        assert_eq!(path_a.parent(), Some(dir.path()));

        backend.store(&a, "A".to_owned()).await.unwrap();
        backend.store(&b, "B".to_owned()).await.unwrap();
        assert_eq!(backend.load(&a).await.unwrap().as_deref(), Some("A"));
        assert_eq!(backend.load(&b).await.unwrap().as_deref(), Some("B"));
    }

    #[test]
    fn short_keys_keep_readable_names() {
        assert_eq!(file_stem("primary"), URL_SAFE_NO_PAD.encode("primary"));
        assert!(file_stem(&"x".repeat(200)).starts_with("sha256."));
    }

    #[test]
    fn permanent_io_errors_are_not_transient() {
        let path = Path::new("blob.json");
        for kind in [ErrorKind::PermissionDenied, ErrorKind::InvalidFilename, ErrorKind::NotADirectory]
        {
            let err = io_error("cannot create", path, std::io::Error::from(kind));
            assert!(matches!(err, StorageError::Internal { .. }), "{kind:?} gave {err:?}");
            assert!(!err.is_transient());
        }

        let err = io_error("cannot read", path, std::io::Error::from(ErrorKind::TimedOut));
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn failed_store_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        // A directory at the blob path makes the final rename fail.
        std::fs::create_dir(backend.blob_path("K")).unwrap();
        std::fs::write(backend.blob_path("K").join("occupant"), b"x").unwrap();

        let err = backend.store("K", "blob".to_owned()).await.unwrap_err();
        assert!(!err.is_transient(), "got {err:?}");

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(names, vec![backend.blob_path("K")]);
    }

    #[tokio::test]
    async fn non_utf8_blob_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        std::fs::write(backend.blob_path("K"), [0xff, 0xfe, 0x00]).unwrap();

        let err = backend.load("K").await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileBackend::open(dir.path()).await.unwrap().store("K", "blob".to_owned()).await.unwrap();

        let reopened = FileBackend::open(dir.path()).await.unwrap();
        assert_eq!(reopened.load("K").await.unwrap().as_deref(), Some("blob"));
    }
}
