//! # Hash Bookkeeping
//!
//! Content hashes are SHA-256 hex digests. `InMemoryHashingService` keeps the
//! hash known for each `(store, FileId)` pair and re-keys it when a file moves.

use super::{FileHashingService, FileId, Filesystem};
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// SHA-256 of `data`, lowercase hex
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
struct HashState {
    hashes: HashMap<(String, FileId), String>,
    moves: Vec<(FileId, FileId)>,
}

/// Hash cache keyed by store name and FileId
#[derive(Debug, Default)]
pub struct InMemoryHashingService {
    state: Mutex<HashState>,
}

impl InMemoryHashingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the hash of a freshly written file
    pub async fn record(&self, fs: &dyn Filesystem, id: &FileId, hash: &str) {
        let mut state = self.state.lock().await;
        state.hashes.insert((fs.name().to_string(), id.clone()), hash.to_string());
    }

    pub async fn hash_of(&self, fs: &dyn Filesystem, id: &FileId) -> Option<String> {
        let state = self.state.lock().await;
        state.hashes.get(&(fs.name().to_string(), id.clone())).cloned()
    }

    /// Every `(from, to)` move notification received so far
    pub async fn moves(&self) -> Vec<(FileId, FileId)> {
        self.state.lock().await.moves.clone()
    }
}

#[async_trait]
impl FileHashingService for InMemoryHashingService {
    async fn move_file(&self, from_id: &FileId, from: &dyn Filesystem, to_id: &FileId, to: &dyn Filesystem) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(hash) = state.hashes.remove(&(from.name().to_string(), from_id.clone())) {
            state.hashes.insert((to.name().to_string(), to_id.clone()), hash);
        }
        state.moves.push((from_id.clone(), to_id.clone()));
        debug!("Hash moved {}:{} -> {}:{}", from.name(), from_id, to.name(), to_id);
        Ok(())
    }
}
