// # State Store Trait
//
// Defines the interface for persistent resource state.
//
// ## Purpose
//
// The state store holds, per record FQDN:
// - The address set last applied to the server (the "old" side of a change)
// - The immutable fields the identity was created with (zone, name, TTL)
// - Whether the identity has been verified yet
//
// A record being present in the store *is* the resource identity. Removing
// it invalidates the identity and tells the caller to recreate the resource.
//
// ## Implementations
//
// - In-memory: `MemoryStateStore`
// - File-based (JSON): `FileStateStore`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::AddressSet;
use crate::resource::RecordSet;

/// Lifecycle status of a tracked identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Created, not yet verified against the server
    Pending,
    /// Updated and verified
    Present,
}

/// State record for one A record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Zone the identity was created in
    pub zone: String,
    /// Record name relative to the zone
    pub name: String,
    /// TTL the identity was created with
    pub ttl: u32,
    /// Addresses last applied to the server
    pub addresses: AddressSet,
    /// Lifecycle status
    pub status: ResourceStatus,
    /// Timestamp of the last change
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl StateRecord {
    /// Record for a freshly created identity: nothing applied yet
    pub fn pending(record_set: &RecordSet) -> Self {
        Self {
            zone: record_set.zone.clone(),
            name: record_set.name.clone(),
            ttl: record_set.ttl,
            addresses: AddressSet::new(),
            status: ResourceStatus::Pending,
            last_updated: chrono::Utc::now(),
        }
    }

    /// Copy of this record with `addresses` applied
    pub fn applied(&self, addresses: AddressSet) -> Self {
        Self {
            addresses,
            last_updated: chrono::Utc::now(),
            ..self.clone()
        }
    }

    /// Copy of this record marked as verified
    pub fn verified(&self) -> Self {
        Self {
            status: ResourceStatus::Present,
            ..self.clone()
        }
    }

    /// Resource identity of the record
    pub fn fqdn(&self) -> String {
        crate::name::compose_fqdn(&self.name, &self.zone)
    }
}

/// Trait for state store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// - ✅ Persist and return state records keyed by FQDN
/// - ✅ Implement locking for thread safety
/// - ❌ Decide whether an update is needed (owned by `RecordSetEngine`)
/// - ❌ Talk to DNS servers (owned by `Transport`)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the state record for an identity
    ///
    /// # Returns
    ///
    /// - `Ok(Some(StateRecord))`: The identity is tracked
    /// - `Ok(None)`: No identity
    /// - `Err(Error)`: Storage error
    async fn get_record(&self, fqdn: &str) -> Result<Option<StateRecord>, crate::Error>;

    /// Create or replace the state record for an identity
    async fn set_record(&self, fqdn: &str, record: &StateRecord) -> Result<(), crate::Error>;

    /// Delete a state record, invalidating the identity
    ///
    /// Succeeds when the record did not exist.
    async fn delete_record(&self, fqdn: &str) -> Result<(), crate::Error>;

    /// List all tracked identities
    async fn list_records(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
