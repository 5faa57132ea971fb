//! # Asset Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare della pipeline di trasformazione degli asset
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione statica (catena optimizer, parametri WebP, directory)
//! - `error`: Tipi di errore custom per store e conversione
//! - `file_manager`: Helper su estensioni, dimensioni e sostituzione file
//! - `scratch`: File temporanei `optim_`/`raw_` eliminati al drop
//! - `tool_resolver`: Risoluzione dei binari esterni (tools dir, `PATH`)
//! - `optimizer`: Catena di optimizer esterni su copia scratch
//! - `webp`: Derivazione dei sibling `<name>.<ext>.webp`
//! - `storage`: FileId, naming strategy, filesystem e store locali
//! - `asset_store`: `TransformingStore`, interceptor delle scritture e mover tra store
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use asset_optimizer::{AssetStore, Config, LocalAssetStore, TransformingStore, WriteOptions};
//!
//! let config = Config::default();
//! // senza `public_asset_root` i sibling WebP finiscono in `<root>/public`
//! let store = TransformingStore::new(LocalAssetStore::new(&root), &config);
//! store.set_from_bytes(data, "Uploads/photo.jpg", None, None, &WriteOptions::default()).await?;
//! store.publish("Uploads/photo.jpg", &hash).await?;
//! ```

pub mod asset_store;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod optimizer;
pub mod scratch;
pub mod storage;
pub mod tool_resolver;
pub mod utils;
pub mod webp;

pub use asset_store::TransformingStore;
pub use config::Config;
pub use error::{ConversionError, StoreError};
pub use optimizer::{OptimizeOutcome, OptimizerChain, OptimizerEntry, OptimizerTool};
pub use storage::{
    AssetStore, ConflictResolution, FileId, Filesystem, LocalAssetStore, LocalFilesystem, MoveReport, ParsedFileId,
    StoredFile, Visibility, WriteOptions,
};
pub use webp::{webp_sibling_name, webp_sibling_path, CodecSupport, Derivation, WebpDeriver};
