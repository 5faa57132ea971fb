//! # Asset Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento e validazione della configurazione JSON
//! - Costruzione del `TransformingStore` sopra lo store locale ed esecuzione del comando
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (root, config, sottocomando)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica la configurazione; senza `public_asset_root` i sibling WebP vanno in `<root>/public`
//! 4. Esegue il sottocomando e stampa il risultato in JSON
//!
//! ## Esempio di utilizzo:
//! ```bash
//! asset-optimizer --root ./assets put photo.jpg --name Uploads/photo.jpg
//! asset-optimizer --root ./assets publish Uploads/photo.jpg <hash>
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use asset_optimizer::{AssetStore, Config, LocalAssetStore, TransformingStore, Visibility, WriteOptions};

#[derive(Parser)]
#[command(name = "asset-optimizer")]
#[command(about = "Optimize assets on write and keep WebP siblings in step with publication")]
struct Args {
    /// Store root (public/ and protected/ live below it)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a file's bytes through the buffer write path
    Put {
        file: PathBuf,

        /// Logical filename (defaults to the file's name)
        #[arg(short, long)]
        name: Option<String>,

        /// Variant tag, e.g. `thumb64`
        #[arg(long)]
        variant: Option<String>,

        /// Content hash of the canonical file
        #[arg(long)]
        hash: Option<String>,

        /// Write to the public store
        #[arg(long)]
        public: bool,
    },

    /// Store a local file through the local-file write path (optimizes it in place)
    PutLocal {
        file: PathBuf,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        variant: Option<String>,

        #[arg(long)]
        hash: Option<String>,

        #[arg(long)]
        public: bool,
    },

    /// Move a protected file and its variants to the public store
    Publish { filename: String, hash: String },

    /// Move a public file and its variants to the protected store
    Protect { filename: String, hash: String },

    /// Report which optimizer tools are installed
    Tools,
}

fn write_options(public: bool) -> WriteOptions {
    WriteOptions {
        visibility: public.then_some(Visibility::Public),
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = match args.config {
        Some(ref path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if !args.root.exists() {
        std::fs::create_dir_all(&args.root)?;
        info!("Created store root: {}", args.root.display());
    }

    config.validate()?;
    let store = TransformingStore::new(LocalAssetStore::new(&args.root), &config);

    match args.command {
        Command::Put {
            file,
            name,
            variant,
            hash,
            public,
        } => {
            if !file.is_file() {
                return Err(anyhow::anyhow!("Input file does not exist: {}", file.display()));
            }
            let data = tokio::fs::read(&file).await?;
            let filename = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            });
            let stored = store
                .set_from_bytes(data, &filename, hash.as_deref(), variant.as_deref(), &write_options(public))
                .await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Command::PutLocal {
            file,
            name,
            variant,
            hash,
            public,
        } => {
            if !file.is_file() {
                return Err(anyhow::anyhow!("Input file does not exist: {}", file.display()));
            }
            let stored = store
                .set_from_local_file(
                    &file,
                    name.as_deref(),
                    hash.as_deref(),
                    variant.as_deref(),
                    &write_options(public),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Command::Publish { filename, hash } => {
            let report = store.publish(&filename, &hash).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Protect { filename, hash } => {
            let report = store.protect(&filename, &hash).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Tools => {
            let chain = store.chain();
            let names: Vec<&str> = chain.entries().iter().map(|entry| entry.tool.binary()).collect();
            print!("{}", chain.resolver().tools_report(names));
            let deriver = store.deriver();
            println!(
                "WebP codecs: {:?} (enabled: {}, encoder: {}, output: {})",
                deriver.support(),
                config.webp_enabled,
                deriver
                    .cwebp()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "lossless built-in".to_string()),
                deriver.public_root().display()
            );
        }
    }

    Ok(())
}
