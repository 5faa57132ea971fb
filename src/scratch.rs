//! # Scratch Files
//!
//! Short-lived working copies owned by a single transform call. Each
//! `ScratchFile` is deleted when dropped, so every exit path (early return,
//! `?`, panic unwind) releases it.

use std::path::Path;
use tempfile::TempPath;
use tracing::debug;

/// Prefix for the optimizer's working copy of an upload
pub const OPTIM_PREFIX: &str = "optim_";
/// Prefix for buffer writes persisted to disk before optimization
pub const RAW_PREFIX: &str = "raw_";

/// A uniquely named file in the scratch directory, removed on drop
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    /// Create an empty `<prefix><uniqueid>.<ext>` file in `dir`.
    ///
    /// The file handle is closed immediately so external tools can rewrite it.
    pub fn create(dir: &Path, prefix: &str, extension: &str) -> std::io::Result<Self> {
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension)
        };

        let path = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(&suffix)
            .tempfile_in(dir)?
            .into_temp_path();

        debug!("Created scratch file: {}", path.display());
        Ok(Self { path })
    }

    /// Create a scratch file holding a copy of `source`
    pub async fn copy_of(dir: &Path, prefix: &str, extension: &str, source: &Path) -> std::io::Result<Self> {
        let scratch = Self::create(dir, prefix, extension)?;
        tokio::fs::copy(source, scratch.path()).await?;
        Ok(scratch)
    }

    /// Create a scratch file holding `data`
    pub async fn with_contents(dir: &Path, prefix: &str, extension: &str, data: &[u8]) -> std::io::Result<Self> {
        let scratch = Self::create(dir, prefix, extension)?;
        tokio::fs::write(scratch.path(), data).await?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        debug!("Releasing scratch file: {}", self.path.display());
    }
}
