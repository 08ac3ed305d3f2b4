// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::config::StateStoreConfig;
use crate::traits::StateStore;

/// Open the state store described by `config`
pub async fn open(config: &StateStoreConfig) -> Result<Box<dyn StateStore>, crate::Error> {
    match config {
        StateStoreConfig::Memory => {
            tracing::debug!("Using in-memory state store");
            Ok(Box::new(MemoryStateStore::new()))
        }
        StateStoreConfig::File { path } => {
            if path.trim().is_empty() {
                return Err(crate::Error::config("State store path cannot be empty"));
            }
            tracing::debug!("Using file state store at {}", path);
            Ok(Box::new(FileStateStore::new(path).await?))
        }
    }
}
