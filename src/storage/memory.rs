//! In-memory document store (`memory` engine)
//!
//! Keeps the latest version of each document in a map. It has no table
//! order to walk, so it does not grant the ordered scan capability.

use std::collections::HashMap;
use std::sync::RwLock;

use super::engine::{DocumentStorage, StorageEngineKind, StoredDocument};
use super::errors::{StorageError, StorageResult};

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, StoredDocument>,
    last_etag: u64,
}

/// Process-local document store.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StorageError {
    StorageError::lock_poisoned("Memory store lock poisoned")
}

impl DocumentStorage for MemoryStorage {
    fn engine(&self) -> StorageEngineKind {
        StorageEngineKind::Memory
    }

    fn put(&self, key: &str, data: Option<&[u8]>, metadata: Option<&[u8]>) -> StorageResult<u64> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.last_etag += 1;
        let etag = state.last_etag;
        state.documents.insert(
            key.to_string(),
            StoredDocument {
                key: key.to_string(),
                etag,
                data: data.map(<[u8]>::to_vec),
                metadata: metadata.map(<[u8]>::to_vec),
            },
        );
        Ok(etag)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        Ok(state.documents.remove(key).is_some())
    }

    fn get(&self, key: &str) -> StorageResult<Option<StoredDocument>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.documents.get(key).cloned())
    }

    fn document_count(&self) -> usize {
        self.state
            .read()
            .map(|state| state.documents.len())
            .unwrap_or(0)
    }
}
