//! # Storage Collaborators
//!
//! Data model and traits for the addressable stores the transform pipeline
//! sits in front of.
//!
//! - `FileId` / `ParsedFileId`: how a file is addressed inside one store
//! - `Filesystem`: a single backing store (put/get/delete/stream by FileId)
//! - `NamingStrategy`: maps `(filename, hash, variant)` to a FileId
//! - `FileHashingService`: content-hash bookkeeping that follows moves
//! - `AssetStore`: the write/move surface the storage layer calls

pub mod hashing;
pub mod local;
pub mod naming;

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::debug;

pub use hashing::InMemoryHashingService;
pub use local::{LocalAssetStore, LocalFilesystem};
pub use naming::{HashedNaming, NamingStrategy, NaturalNaming};

/// Readable byte stream handed between stores
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Opaque key of a file inside one store, always `/`-separated and relative
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim_start_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the identifier, empty for top-level files
    pub fn dir(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Parent of a `/`-separated directory, empty at the top level
pub fn parent_dir(dir: &str) -> &str {
    dir.trim_end_matches('/').rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Logical identity of a stored file: `(filename, hash, variant)` plus the
/// FileId it was found under, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFileId {
    pub filename: String,
    pub hash: String,
    /// `None` for the canonical file, a tag such as `thumb64` for renditions
    pub variant: Option<String>,
    pub file_id: Option<FileId>,
}

impl ParsedFileId {
    pub fn new(filename: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            hash: hash.into(),
            variant: None,
            file_id: None,
        }
    }

    /// Set the variant tag; an empty tag means the canonical file
    pub fn with_variant(mut self, variant: Option<&str>) -> Self {
        self.variant = variant.filter(|v| !v.is_empty()).map(str::to_string);
        self
    }

    pub fn with_file_id(mut self, file_id: FileId) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn is_variant(&self) -> bool {
        self.variant.is_some()
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

/// Visibility class of a backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

/// What to do when the target FileId already holds a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    #[default]
    Overwrite,
    UseExisting,
    Rename,
    Exception,
}

/// Per-write options passed through the interceptor unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub conflict: ConflictResolution,
    /// Target store; `None` lets the store decide
    pub visibility: Option<Visibility>,
}

/// Identity of a file after a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub filename: String,
    pub hash: String,
    pub variant: Option<String>,
}

/// Summary of a cross-store move
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    /// `(source id, destination id)` per moved variant
    pub moved: Vec<(FileId, FileId)>,
    /// Source ids removed from the origin store
    pub deleted: Vec<FileId>,
    /// WebP siblings derived at the destination
    pub webp_derived: usize,
    /// Stale WebP siblings removed next to the old location
    pub webp_removed: usize,
}

/// One addressable backing store
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Stable label used for hash bookkeeping and logs
    fn name(&self) -> &str;

    fn visibility(&self) -> Visibility;

    async fn has(&self, id: &FileId) -> Result<bool>;

    async fn read_stream(&self, id: &FileId) -> Result<ByteStream>;

    async fn put_stream(&self, id: &FileId, stream: ByteStream) -> Result<()>;

    async fn read(&self, id: &FileId) -> Result<Vec<u8>>;

    async fn write(&self, id: &FileId, data: &[u8]) -> Result<()>;

    async fn delete(&self, id: &FileId) -> Result<()>;

    /// Files directly inside `dir` (not recursive)
    async fn list_files(&self, dir: &str) -> Result<Vec<FileId>>;

    /// True when `dir` has no entries, or does not exist
    async fn is_dir_empty(&self, dir: &str) -> Result<bool>;

    async fn delete_dir(&self, dir: &str) -> Result<()>;
}

/// Content-hash bookkeeping that has to follow a file across stores
#[async_trait]
pub trait FileHashingService: Send + Sync {
    async fn move_file(&self, from_id: &FileId, from: &dyn Filesystem, to_id: &FileId, to: &dyn Filesystem) -> Result<()>;
}

/// The storage layer's write and move surface
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store the file at a local path
    async fn set_from_local_file(
        &self,
        path: &Path,
        filename: Option<&str>,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile>;

    /// Store an in-memory buffer
    async fn set_from_bytes(
        &self,
        data: Vec<u8>,
        filename: &str,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile>;

    fn public_filesystem(&self) -> &dyn Filesystem;

    fn protected_filesystem(&self) -> &dyn Filesystem;

    fn public_strategy(&self) -> &dyn NamingStrategy;

    fn protected_strategy(&self) -> &dyn NamingStrategy;

    fn hashing_service(&self) -> &dyn FileHashingService;

    /// FileId of the canonical file under the public naming strategy
    fn file_id(&self, filename: &str, hash: &str) -> FileId {
        self.public_strategy().build_file_id(&ParsedFileId::new(filename, hash))
    }

    /// Path of a file relative to the public asset root
    fn public_url_path(&self, filename: &str, hash: &str, variant: Option<&str>) -> FileId {
        self.public_strategy()
            .build_file_id(&ParsedFileId::new(filename, hash).with_variant(variant))
    }

    /// Local directory backing public URLs, when the store has one
    fn public_asset_root(&self) -> Option<&Path> {
        None
    }

    /// Move a file and every variant between stores.
    ///
    /// Per variant: stream copy, delete at the origin, hash move, prune the
    /// origin directory, then `on_variant_moved`.
    async fn move_between_stores(
        &self,
        parsed: &ParsedFileId,
        from: &dyn Filesystem,
        from_strategy: &dyn NamingStrategy,
        to: &dyn Filesystem,
        to_strategy: &dyn NamingStrategy,
        swap: bool,
    ) -> Result<MoveReport> {
        debug!("Moving {} from {} to {} (swap: {})", parsed.filename, from.name(), to.name(), swap);
        let mut report = MoveReport::default();
        let mut variants = from_strategy.find_variants(parsed, from);

        while let Some(variant) = variants.try_next().await? {
            let from_id = variant
                .file_id
                .clone()
                .unwrap_or_else(|| from_strategy.build_file_id(&variant));
            let to_id = to_strategy.build_file_id(&variant);

            let stream = from.read_stream(&from_id).await?;
            to.put_stream(&to_id, stream).await?;

            report.deleted.push(from_id.clone());
            from.delete(&from_id).await?;

            self.hashing_service().move_file(&from_id, from, &to_id, to).await?;
            self.truncate_directory(from_id.dir(), from).await?;

            self.on_variant_moved(&variant, from, &from_id, &to_id, &mut report).await?;
            report.moved.push((from_id, to_id));
        }

        Ok(report)
    }

    /// Called once per variant after it has landed at `to_id`
    async fn on_variant_moved(
        &self,
        _variant: &ParsedFileId,
        _from: &dyn Filesystem,
        _from_id: &FileId,
        _to_id: &FileId,
        _report: &mut MoveReport,
    ) -> Result<()> {
        Ok(())
    }

    /// Remove `dir` and its ancestors while they are empty.
    ///
    /// Top-level directories are kept.
    async fn truncate_directory(&self, dir: &str, fs: &dyn Filesystem) -> Result<()> {
        let mut dir = dir.trim_matches('/');
        while !dir.is_empty() && !parent_dir(dir).is_empty() {
            if !fs.is_dir_empty(dir).await? {
                break;
            }
            debug!("Pruning empty directory {} in {}", dir, fs.name());
            fs.delete_dir(dir).await?;
            dir = parent_dir(dir);
        }
        Ok(())
    }

    /// Move a protected file and its variants to the public store
    async fn publish(&self, filename: &str, hash: &str) -> Result<MoveReport> {
        let parsed = ParsedFileId::new(filename, hash);
        self.move_between_stores(
            &parsed,
            self.protected_filesystem(),
            self.protected_strategy(),
            self.public_filesystem(),
            self.public_strategy(),
            false,
        )
        .await
    }

    /// Move a public file and its variants to the protected store
    async fn protect(&self, filename: &str, hash: &str) -> Result<MoveReport> {
        let parsed = ParsedFileId::new(filename, hash);
        self.move_between_stores(
            &parsed,
            self.public_filesystem(),
            self.public_strategy(),
            self.protected_filesystem(),
            self.protected_strategy(),
            false,
        )
        .await
    }
}

/// Reject identifiers that could escape a store root
pub fn validate_file_id(id: &FileId) -> Result<()> {
    let invalid = id.as_str().is_empty()
        || id
            .as_str()
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StoreError::InvalidFileId(id.to_string()));
    }
    Ok(())
}
