//! Core traits for the nsupdate system
//!
//! This module defines the seams the engine depends on.
//!
//! - [`Transport`]: Exchange DNS messages with the authoritative server
//! - [`StateStore`]: Persistent resource state and identity

pub mod state_store;
pub mod transport;

pub use state_store::{ResourceStatus, StateRecord, StateStore};
pub use transport::{Transport, TransportError};
