//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione statica della pipeline, caricata una
//! sola volta all'avvio e mai riletta durante un'operazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con la catena di optimizer e i parametri WebP
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `chains`: Lista ordinata `(tool, args)` degli optimizer esterni
//! - `webp_enabled`: Abilita la derivazione dei sibling WebP (default: true)
//! - `webp_default_quality`: Qualità passata a `cwebp -q` (1-100, default: 80)
//! - `scratch_dir`: Directory per i file temporanei (default: temp di sistema)
//! - `public_asset_root`: Directory locale degli asset pubblici (default: la root pubblica
//!   dello store interno, altrimenti `public/assets`)
//! - `tools_dir`: Directory opzionale cercata prima del `PATH`
//!
//! ## Catena di default:
//! | tool      | args                           |
//! |-----------|--------------------------------|
//! | jpegoptim | `--max=85 --all-progressive`   |
//! | pngquant  | `--force`                      |
//! | optipng   | `-i0 -o2 -quiet`               |
//! | gifsicle  | `-b -O3`                       |
//!
//! ## Esempio:
//! ```rust,ignore
//! use asset_optimizer::Config;
//!
//! let config = Config {
//!     webp_default_quality: 90,
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//! ```

use crate::args;
use crate::optimizer::{OptimizerEntry, OptimizerTool};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Public asset root used when neither the config nor the store names one
pub const FALLBACK_PUBLIC_ASSET_ROOT: &str = "public/assets";

/// Configuration for the transforming asset store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ordered optimizer chain
    pub chains: Vec<OptimizerEntry>,
    /// Derive WebP siblings on buffer writes and store moves
    pub webp_enabled: bool,
    /// WebP quality (1-100) for `cwebp`; the built-in lossless encoder ignores it
    pub webp_default_quality: u8,
    /// Directory for `optim_*` / `raw_*` working files (None = system temp)
    pub scratch_dir: Option<PathBuf>,
    /// Local directory backing the public asset URLs (None = the inner store's public root)
    pub public_asset_root: Option<PathBuf>,
    /// Directory searched for optimizer binaries before PATH
    pub tools_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chains: Self::default_chains(),
            webp_enabled: true,
            webp_default_quality: 80,
            scratch_dir: None,
            public_asset_root: None,
            tools_dir: None,
        }
    }
}

impl Config {
    /// The stock jpegoptim → pngquant → optipng → gifsicle chain
    pub fn default_chains() -> Vec<OptimizerEntry> {
        let jpeg_quality = 85;
        vec![
            OptimizerEntry::new(
                OptimizerTool::Jpegoptim,
                args![format!("--max={}", jpeg_quality), "--all-progressive"],
            ),
            OptimizerEntry::new(OptimizerTool::Pngquant, args!["--force"]),
            OptimizerEntry::new(OptimizerTool::Optipng, args!["-i0", "-o2", "-quiet"]),
            OptimizerEntry::new(OptimizerTool::Gifsicle, args!["-b", "-O3"]),
        ]
    }

    /// Directory used for scratch files
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Public asset root: the configured one, else the store's, else `public/assets`
    pub fn resolve_public_asset_root(&self, store_root: Option<&Path>) -> PathBuf {
        self.public_asset_root
            .clone()
            .or_else(|| store_root.map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_PUBLIC_ASSET_ROOT))
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.webp_default_quality == 0 || self.webp_default_quality > 100 {
            return Err(anyhow::anyhow!("WebP quality must be between 1 and 100"));
        }

        for entry in &self.chains {
            if entry.tool.binary().trim().is_empty() {
                return Err(anyhow::anyhow!("Optimizer chain entry has an empty program name"));
            }
            if let OptimizerTool::Command { extensions, .. } = &entry.tool {
                if extensions.is_empty() {
                    return Err(anyhow::anyhow!(
                        "Command optimizer '{}' must list at least one extension",
                        entry.tool.binary()
                    ));
                }
            }
        }

        if let Some(ref scratch_dir) = self.scratch_dir {
            if !scratch_dir.is_dir() {
                return Err(anyhow::anyhow!("Scratch directory does not exist: {}", scratch_dir.display()));
            }
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.webp_default_quality = 0;
        assert!(config.validate().is_err());

        config.webp_default_quality = 80;
        config.chains.push(OptimizerEntry::new(
            OptimizerTool::Command { program: "sh".into(), extensions: vec![] },
            vec![],
        ));
        assert!(config.validate().is_err());

        config.chains.pop();
        config.scratch_dir = Some(PathBuf::from("/definitely/not/a/scratch/dir"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.webp_default_quality, 80);
        assert!(config.webp_enabled);

        let tools: Vec<&str> = config.chains.iter().map(|e| e.tool.binary()).collect();
        assert_eq!(tools, vec!["jpegoptim", "pngquant", "optipng", "gifsicle"]);
        assert_eq!(config.chains[0].args, vec!["--max=85", "--all-progressive"]);
        assert_eq!(config.chains[2].args, vec!["-i0", "-o2", "-quiet"]);
    }

    #[test]
    fn test_public_asset_root_resolution() {
        let mut config = Config::default();
        assert_eq!(config.resolve_public_asset_root(None), PathBuf::from("public/assets"));
        assert_eq!(
            config.resolve_public_asset_root(Some(Path::new("/srv/store/public"))),
            PathBuf::from("/srv/store/public")
        );

        config.public_asset_root = Some(PathBuf::from("/var/www/assets"));
        assert_eq!(
            config.resolve_public_asset_root(Some(Path::new("/srv/store/public"))),
            PathBuf::from("/var/www/assets")
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"webp_default_quality": 70}"#).unwrap();
        assert_eq!(config.webp_default_quality, 70);
        assert_eq!(config.chains.len(), 4);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            chains: vec![OptimizerEntry::new(OptimizerTool::Gifsicle, args!["-O2"])],
            webp_enabled: false,
            webp_default_quality: 65,
            scratch_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.chains, original_config.chains);
        assert!(!loaded_config.webp_enabled);
        assert_eq!(loaded_config.webp_default_quality, 65);
        assert_eq!(loaded_config.scratch_dir.as_deref(), Some(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_missing_file_gives_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.chains.len(), 4);
    }
}
