//! # Local Stores
//!
//! Directory-backed implementations of the storage collaborators.
//!
//! ```text
//! <root>/public/Uploads/photo.jpg                  NaturalNaming
//! <root>/protected/Uploads/a1b2c3d4e5/photo.jpg    HashedNaming
//! ```
//!
//! `LocalAssetStore` is the plain store: it writes bytes where the naming
//! strategy says and keeps hash bookkeeping, nothing more.

use super::hashing::{hash_bytes, InMemoryHashingService};
use super::naming::{HashedNaming, NamingStrategy, NaturalNaming};
use super::{
    validate_file_id, AssetStore, ByteStream, ConflictResolution, FileHashingService, FileId, Filesystem,
    ParsedFileId, StoredFile, Visibility, WriteOptions,
};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use walkdir::WalkDir;

/// A store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    name: String,
    root: PathBuf,
    visibility: Visibility,
}

impl LocalFilesystem {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            visibility,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of a FileId
    pub fn path_for(&self, id: &FileId) -> Result<PathBuf> {
        validate_file_id(id)?;
        Ok(self.root.join(id.as_str()))
    }

    fn dir_path(&self, dir: &str) -> Result<PathBuf> {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            return Ok(self.root.clone());
        }
        self.path_for(&FileId::new(dir))
    }

    fn not_found(id: &FileId) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io(e)
            }
        }
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    async fn has(&self, id: &FileId) -> Result<bool> {
        match fs::metadata(self.path_for(id)?).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_stream(&self, id: &FileId) -> Result<ByteStream> {
        let file = fs::File::open(self.path_for(id)?).await.map_err(Self::not_found(id))?;
        Ok(Box::new(file))
    }

    async fn put_stream(&self, id: &FileId, mut stream: ByteStream) -> Result<()> {
        let path = self.path_for(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        let copied = tokio::io::copy(&mut stream, &mut file).await?;
        file.flush().await?;
        debug!("Wrote {} bytes to {}:{}", copied, self.name, id);
        Ok(())
    }

    async fn read(&self, id: &FileId) -> Result<Vec<u8>> {
        fs::read(self.path_for(id)?).await.map_err(Self::not_found(id))
    }

    async fn write(&self, id: &FileId, data: &[u8]) -> Result<()> {
        let path = self.path_for(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn delete(&self, id: &FileId) -> Result<()> {
        fs::remove_file(self.path_for(id)?).await.map_err(Self::not_found(id))
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<FileId>> {
        let dir_path = self.dir_path(dir)?;
        if !dir_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir_path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(FileId::new(id));
        }

        files.sort();
        Ok(files)
    }

    async fn is_dir_empty(&self, dir: &str) -> Result<bool> {
        match fs::read_dir(self.dir_path(dir)?).await {
            Ok(mut entries) => Ok(entries.next_entry().await?.is_none()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_dir(&self, dir: &str) -> Result<()> {
        match fs::remove_dir(self.dir_path(dir)?).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Plain asset store over a public and a protected directory
#[derive(Debug)]
pub struct LocalAssetStore {
    public: LocalFilesystem,
    protected: LocalFilesystem,
    hasher: InMemoryHashingService,
}

impl LocalAssetStore {
    /// Stores rooted at `<root>/public` and `<root>/protected`
    pub fn new(root: &Path) -> Self {
        Self::with_filesystems(
            LocalFilesystem::new("public", root.join("public"), Visibility::Public),
            LocalFilesystem::new("protected", root.join("protected"), Visibility::Protected),
        )
    }

    pub fn with_filesystems(public: LocalFilesystem, protected: LocalFilesystem) -> Self {
        Self {
            public,
            protected,
            hasher: InMemoryHashingService::new(),
        }
    }

    pub fn hashes(&self) -> &InMemoryHashingService {
        &self.hasher
    }

    fn store_for(&self, visibility: Visibility) -> (&LocalFilesystem, &dyn NamingStrategy) {
        match visibility {
            Visibility::Public => (&self.public, &NaturalNaming),
            Visibility::Protected => (&self.protected, &HashedNaming),
        }
    }

    /// Variants follow their canonical file; new files start protected
    async fn target_visibility(&self, parsed: &ParsedFileId, options: &WriteOptions) -> Result<Visibility> {
        if let Some(visibility) = options.visibility {
            return Ok(visibility);
        }
        if parsed.is_variant() {
            let canonical = ParsedFileId::new(parsed.filename.as_str(), parsed.hash.as_str());
            if self.public.has(&NaturalNaming.build_file_id(&canonical)).await? {
                return Ok(Visibility::Public);
            }
        }
        Ok(Visibility::Protected)
    }

    /// Next free `stem-vN.ext` name for a renamed canonical file
    async fn free_filename(&self, parsed: &ParsedFileId, fs: &LocalFilesystem, strategy: &dyn NamingStrategy) -> Result<ParsedFileId> {
        let (stem, ext) = match parsed.filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => (stem, Some(ext)),
            _ => (parsed.filename.as_str(), None),
        };

        for version in 2.. {
            let filename = match ext {
                Some(ext) => format!("{}-v{}.{}", stem, version, ext),
                None => format!("{}-v{}", stem, version),
            };
            let candidate = ParsedFileId {
                filename,
                ..parsed.clone()
            };
            if !fs.has(&strategy.build_file_id(&candidate)).await? {
                return Ok(candidate);
            }
        }
        unreachable!("unbounded version search always returns")
    }

    async fn write_bytes(
        &self,
        data: &[u8],
        filename: &str,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile> {
        let hash = hash
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| hash_bytes(data));
        let filename = if filename.is_empty() { hash.clone() } else { filename.to_string() };

        let mut parsed = ParsedFileId::new(filename, hash).with_variant(variant);
        let visibility = self.target_visibility(&parsed, options).await?;
        let (fs, strategy) = self.store_for(visibility);

        let mut id = strategy.build_file_id(&parsed);
        if fs.has(&id).await? {
            match options.conflict {
                ConflictResolution::Overwrite => {}
                ConflictResolution::UseExisting => {
                    debug!("Keeping existing {}:{}", fs.name(), id);
                    return Ok(StoredFile {
                        filename: parsed.filename,
                        hash: parsed.hash,
                        variant: parsed.variant,
                    });
                }
                ConflictResolution::Exception => return Err(StoreError::Conflict(id.to_string())),
                ConflictResolution::Rename => {
                    parsed = self.free_filename(&parsed, fs, strategy).await?;
                    id = strategy.build_file_id(&parsed);
                }
            }
        }

        fs.write(&id, data).await?;
        self.hasher.record(fs, &id, &parsed.hash).await;
        debug!("Stored {} bytes at {}:{}", data.len(), fs.name(), id);

        Ok(StoredFile {
            filename: parsed.filename,
            hash: parsed.hash,
            variant: parsed.variant,
        })
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn set_from_local_file(
        &self,
        path: &Path,
        filename: Option<&str>,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile> {
        let data = fs::read(path).await?;
        let fallback = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let filename = filename.filter(|name| !name.is_empty()).unwrap_or(&fallback);
        self.write_bytes(&data, filename, hash, variant, options).await
    }

    async fn set_from_bytes(
        &self,
        data: Vec<u8>,
        filename: &str,
        hash: Option<&str>,
        variant: Option<&str>,
        options: &WriteOptions,
    ) -> Result<StoredFile> {
        self.write_bytes(&data, filename, hash, variant, options).await
    }

    fn public_filesystem(&self) -> &dyn Filesystem {
        &self.public
    }

    fn protected_filesystem(&self) -> &dyn Filesystem {
        &self.protected
    }

    fn public_strategy(&self) -> &dyn NamingStrategy {
        &NaturalNaming
    }

    fn protected_strategy(&self) -> &dyn NamingStrategy {
        &HashedNaming
    }

    fn hashing_service(&self) -> &dyn FileHashingService {
        &self.hasher
    }

    fn public_asset_root(&self) -> Option<&Path> {
        Some(self.public.root())
    }
}
