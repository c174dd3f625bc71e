//! Local filesystem blob store.
//!
//! Objects are stored in a sharded directory structure mirroring their path:
//! ```text
//! {base_path}/
//! ├── users/alice/
//! │   └── ab/
//! │       ├── ab12cd34-5678-90ab-cdef-123456789012.docx
//! │       └── ab12cd34-5678-90ab-cdef-123456789012.docx.meta.json
//! └── cd/
//!     └── cd90ab12-3456-7890-abcd-ef1234567890.doc
//! ```
//! Download links point back at the relay (`/files/{path}`) and carry an
//! HMAC signature over the path and expiry.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use super::{
    expiry_after, BlobStore, ObjectMetadata, PutObject, StorageError, StorageResult, UrlSigner,
};
use crate::clock::SharedClock;
use crate::config::StorageProvider;
use crate::upload::SignedDownloadLink;

/// Route prefix under which the relay serves local objects.
pub const FILES_ROUTE_PREFIX: &str = "/files";

const META_SUFFIX: &str = ".meta.json";

/// Why a signed link was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRejection {
    /// Signature does not match.
    InvalidSignature,
    /// Link is past its expiry.
    Expired,
}

/// Filesystem-backed blob store.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    /// Base directory for object storage.
    base_path: PathBuf,
    /// Base URL of the relay, without trailing slash.
    public_url: String,
    signer: UrlSigner,
    clock: SharedClock,
}

impl LocalBlobStore {
    /// Create a new store with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(
        base_path: impl Into<PathBuf>,
        public_url: &str,
        signer: UrlSigner,
        clock: SharedClock,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            public_url: public_url.trim_end_matches('/').to_string(),
            signer,
            clock,
        })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the full file path for an object path.
    ///
    /// The file lands in `{base_path}/{dir}/{shard}/{name}` where shard is the
    /// first 2 characters of the object name.
    pub fn get_file_path(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Self::checked_relative(path)?;
        let name = relative
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let dir = relative.parent().unwrap_or_else(|| Path::new(""));

        Ok(self
            .base_path
            .join(dir)
            .join(Self::get_shard(name))
            .join(name))
    }

    /// Reject absolute paths, `..` and empty paths.
    fn checked_relative(path: &str) -> StorageResult<PathBuf> {
        let candidate = Path::new(path);
        let all_normal = candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !all_normal || path.ends_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(candidate.to_path_buf())
    }

    /// Get the shard directory name for an object name.
    fn get_shard(name: &str) -> &str {
        match name.char_indices().nth(2) {
            Some((idx, _)) => &name[..idx],
            None => name,
        }
    }

    fn meta_path(file_path: &Path) -> PathBuf {
        let mut os = file_path.as_os_str().to_os_string();
        os.push(META_SUFFIX);
        PathBuf::from(os)
    }

    /// Load an object and its metadata.
    pub async fn load(&self, path: &str) -> StorageResult<(Bytes, ObjectMetadata)> {
        let file_path = self.get_file_path(path)?;

        let content = match tokio::fs::read(&file_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("Object {path}")));
            }
            Err(e) => return Err(e.into()),
        };

        let raw_meta = tokio::fs::read(Self::meta_path(&file_path)).await?;
        let metadata: ObjectMetadata = serde_json::from_slice(&raw_meta)
            .map_err(|e| StorageError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        Ok((Bytes::from(content), metadata))
    }

    /// Check if an object exists.
    pub fn exists(&self, path: &str) -> bool {
        self.get_file_path(path)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Check a download link's signature and expiry.
    pub fn verify_link(
        &self,
        path: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), LinkRejection> {
        if !self.signer.verify(path, expires, signature) {
            return Err(LinkRejection::InvalidSignature);
        }
        if self.clock.now().timestamp() >= expires {
            return Err(LinkRejection::Expired);
        }
        Ok(())
    }

    fn link_for(&self, path: &str, expires: i64) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}{}/{}?expires={}&signature={}",
            self.public_url,
            FILES_ROUTE_PREFIX,
            encoded.join("/"),
            expires,
            self.signer.sign(path, expires)
        )
    }

    async fn write_new(path: &Path, content: &[u8]) -> io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(content).await?;
        file.flush().await
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Local
    }

    async fn put(&self, object: PutObject) -> StorageResult<()> {
        let file_path = self.get_file_path(&object.path)?;

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let meta = serde_json::to_vec(&object.metadata)
            .map_err(|e| StorageError::Write(format!("metadata encoding failed: {e}")))?;

        match Self::write_new(&file_path, &object.bytes).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(object.path));
            }
            Err(e) => return Err(StorageError::Write(e.to_string())),
        }

        tokio::fs::write(Self::meta_path(&file_path), meta)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;

        tracing::debug!(path = %object.path, size = object.bytes.len(), "Stored object on disk");
        Ok(())
    }

    async fn signed_url(
        &self,
        path: &str,
        expires_in: Duration,
    ) -> StorageResult<SignedDownloadLink> {
        if !self.exists(path) {
            return Err(StorageError::Link(format!("object {path} does not exist")));
        }

        let expires_at = expiry_after(self.clock.now(), expires_in)?;
        Ok(SignedDownloadLink {
            url: self.link_for(path, expires_at.timestamp()),
            expires_at,
            expires_in: expires_in.as_secs(),
        })
    }
}
