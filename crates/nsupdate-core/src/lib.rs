// # nsupdate-core
//
// Core library for managing DNS A record sets through RFC 2136 dynamic
// updates.
//
// ## Architecture Overview
//
// - **RecordSetEngine**: create/read/update/delete of one record set,
//   sending only the address delta and verifying by read-back query
// - **Transport**: Trait for exchanging DNS messages with the server
// - **StateStore**: Trait for persistent state; a stored record is the
//   resource identity
// - **Reconciler**: Declarative driver applying a list of record sets
// - **TransactionSigner**: Optional TSIG signing of update transactions
//
// ## Design Principles
//
// 1. **Delta only**: Unchanged address sets send no update
// 2. **Verify after write**: Every update is confirmed by query
// 3. **Fail closed**: A failed exchange or mismatch clears the identity
// 4. **Library-First**: The daemon is a thin wrapper over this crate

pub mod address;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod name;
pub mod reconciler;
pub mod resource;
pub mod state;
pub mod traits;
pub mod transaction;
pub mod tsig;

// Re-export core types for convenience
pub use address::AddressSet;
pub use config::{NsupdateConfig, RecordSetConfig, StateStoreConfig, UpdateServerConfig};
pub use engine::RecordSetEngine;
pub use error::{Error, Operation, Result};
pub use reconciler::{ReconcileEvent, Reconciler};
pub use resource::RecordSet;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{StateStore, Transport, TransportError};
pub use tsig::TransactionSigner;
