//! # Optimizer Chain Runner
//!
//! Runs the configured optimizer tools, in order, against a scratch copy of
//! an upload and writes the result back over the original only when it is
//! strictly smaller and non-empty.
//!
//! ## Pipeline
//!
//! 1. **Filename check**: no filename → nothing to do (type is unknown)
//! 2. **Extension**: lowercase extension of the logical filename
//! 3. **Working copy**: `optim_<uniqueid>.<ext>` in the scratch directory
//! 4. **Chain**: every entry whose tool handles the extension runs in place
//! 5. **Compare**: `original > optimized > 0` → overwrite the original
//! 6. **Cleanup**: the working copy is dropped on every exit path
//!
//! ## Failure policy
//!
//! - Tool binary not installed: skipped (debug log)
//! - Tool exits non-zero: logged, chain continues
//! - Resolved tool cannot be spawned: `StoreError::Tool`, the write fails

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::file_manager::FileManager;
use crate::optimizer::OptimizerEntry;
use crate::scratch::{ScratchFile, OPTIM_PREFIX};
use crate::tool_resolver::ToolPathResolver;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Size comparison of one optimization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOutcome {
    pub original_size: u64,
    pub optimized_size: u64,
    /// The original bytes were overwritten with the optimized ones
    pub replaced: bool,
}

/// Ordered chain of external optimizers
#[derive(Debug, Clone)]
pub struct OptimizerChain {
    entries: Vec<OptimizerEntry>,
    resolver: ToolPathResolver,
    scratch_dir: PathBuf,
}

impl OptimizerChain {
    pub fn new(entries: Vec<OptimizerEntry>, resolver: ToolPathResolver, scratch_dir: PathBuf) -> Self {
        Self {
            entries,
            resolver,
            scratch_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.chains.clone(),
            ToolPathResolver::new(config.tools_dir.clone()),
            config.scratch_dir(),
        )
    }

    pub fn entries(&self) -> &[OptimizerEntry] {
        &self.entries
    }

    pub fn resolver(&self) -> &ToolPathResolver {
        &self.resolver
    }

    /// Optimize the file at `path` in place.
    ///
    /// Returns `None` when nothing was attempted (no filename, or no tool in
    /// the chain handles the extension).
    pub async fn optimize_path(&self, path: &Path, filename: Option<&str>) -> Result<Option<OptimizeOutcome>> {
        let Some(filename) = filename.filter(|name| !name.is_empty()) else {
            debug!("No filename for {}, skipping optimization", path.display());
            return Ok(None);
        };

        let ext = FileManager::extension_of(filename);
        if !self.entries.iter().any(|entry| entry.tool.handles(&ext)) {
            debug!("No optimizer handles '{}' ({}), skipping", ext, filename);
            return Ok(None);
        }

        let working = ScratchFile::copy_of(&self.scratch_dir, OPTIM_PREFIX, &ext, path).await?;
        self.run_chain(working.path(), &ext).await?;

        let original_size = FileManager::file_size(path).await?;
        let optimized_size = FileManager::file_size(working.path()).await?;
        let replaced = original_size > optimized_size && optimized_size > 0;

        if replaced {
            FileManager::replace_file(path, working.path()).await?;
            info!(
                "Optimized {}: {} -> {} ({:.1}% saved)",
                filename,
                FileManager::format_size(original_size),
                FileManager::format_size(optimized_size),
                FileManager::calculate_reduction(original_size, optimized_size)
            );
        } else {
            debug!(
                "Keeping original {} ({} bytes, optimized {} bytes)",
                filename, original_size, optimized_size
            );
        }

        Ok(Some(OptimizeOutcome {
            original_size,
            optimized_size,
            replaced,
        }))
    }

    /// Run every applicable tool against `target`, in configured order
    async fn run_chain(&self, target: &Path, ext: &str) -> Result<()> {
        for entry in self.entries.iter().filter(|entry| entry.tool.handles(ext)) {
            let tool_name = entry.tool.binary();
            let Some(tool_path) = self.resolver.resolve_tool(tool_name) else {
                debug!("Optimizer {} not installed, skipping", tool_name);
                continue;
            };

            let argv = entry.tool.command_args(&entry.args, target);
            debug!("Running {} {:?}", tool_path.display(), argv);

            let start_time = std::time::Instant::now();
            let output = Command::new(&tool_path)
                .args(&argv)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|source| StoreError::Tool {
                    tool: tool_name.to_string(),
                    source,
                })?;
            let elapsed = start_time.elapsed();

            if output.status.success() {
                debug!("{} finished in {:?}", tool_name, elapsed);
            } else {
                warn!(
                    "{} exited with {} after {:?}: {}",
                    tool_name,
                    output.status,
                    elapsed,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
        }

        Ok(())
    }
}
