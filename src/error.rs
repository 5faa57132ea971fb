//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - `StoreError`: errori delle operazioni di store (write, move, tool esterni)
//! - `ConversionError`: errori della derivazione WebP, sempre scartati dal chiamante
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Tool`: Un optimizer esterno risolto non è stato avviato (difetto di configurazione)
//! - `NotFound`: FileId assente nello store di origine
//! - `Conflict`: Scrittura rifiutata dalla conflict resolution
//! - `InvalidFileId`: Filename o FileId non interpretabile
//!
//! ## Esempio:
//! ```rust,ignore
//! if !fs.has(&file_id).await? {
//!     return Err(StoreError::NotFound(file_id.to_string()));
//! }
//! ```

/// Errors raised by store writes, moves and the optimizer chain
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Optimizer '{tool}' could not be started: {source}")]
    Tool {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found in store: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    Conflict(String),

    #[error("Invalid file identifier: {0}")]
    InvalidFileId(String),
}

/// Errors raised while deriving a WebP sibling.
///
/// These never escape a store write; callers log and drop them.
#[derive(thiserror::Error, Debug)]
pub enum ConversionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Encoder task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
