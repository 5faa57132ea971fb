//! # File Management Module
//!
//! Questo modulo raccoglie le operazioni sui file usate dalla pipeline di trasformazione.
//!
//! ## Responsabilità:
//! - Determinazione dell'estensione (lowercase) a partire dal filename logico
//! - Lettura dimensioni e sostituzione del contenuto di un file
//! - Formattazione human-readable delle dimensioni per i log
//!
//! ## Esempio:
//! ```rust,ignore
//! use asset_optimizer::file_manager::FileManager;
//!
//! assert_eq!(FileManager::extension_of("Uploads/Photo.JPG"), "jpg");
//! ```

use std::path::Path;
use tokio::fs;

/// Stateless helpers for file inspection and replacement
pub struct FileManager;

impl FileManager {
    /// Lowercase extension of a logical filename, empty when there is none
    pub fn extension_of(filename: &str) -> String {
        Path::new(filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Size of a file on disk in bytes
    pub async fn file_size(path: &Path) -> std::io::Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Overwrite `original` with the bytes of `optimized`.
    ///
    /// The original path keeps its inode-level identity from the caller's point
    /// of view: it is truncated and rewritten, never renamed over.
    pub async fn replace_file(original: &Path, optimized: &Path) -> std::io::Result<()> {
        let bytes = fs::read(optimized).await?;
        fs::write(original, bytes).await
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
