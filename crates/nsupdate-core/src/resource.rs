//! Typed record-set view
//!
//! [`RecordSet`] is decoded once from the caller's declaration; the engine
//! never touches raw field values. Zone, name and TTL are immutable for the
//! life of an identity, the address set is the only mutable field.

use crate::address::AddressSet;
use crate::config::RecordSetConfig;
use crate::error::Result;
use crate::name;
use crate::traits::StateRecord;

/// Declared state of one A record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// Zone the record set lives in, expected fully qualified
    pub zone: String,
    /// Record name relative to the zone
    pub name: String,
    /// Normalized addresses
    pub addresses: AddressSet,
    /// TTL applied to every record of the set
    pub ttl: u32,
}

impl RecordSet {
    /// Build a record set, normalizing its addresses
    pub fn new<I, S>(zone: impl Into<String>, name: impl Into<String>, addresses: I, ttl: u32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            zone: zone.into(),
            name: name.into(),
            addresses: AddressSet::parse(addresses)?,
            ttl,
        })
    }

    /// Decode a raw declaration
    pub fn from_config(config: &RecordSetConfig) -> Result<Self> {
        Self::new(&config.zone, &config.name, &config.addresses, config.ttl)
    }

    /// Rebuild the record set last recorded in the state store
    pub fn from_state(record: &StateRecord) -> Self {
        Self {
            zone: record.zone.clone(),
            name: record.name.clone(),
            addresses: record.addresses.clone(),
            ttl: record.ttl,
        }
    }

    /// Resource identity: name joined with zone
    pub fn fqdn(&self) -> String {
        name::compose_fqdn(&self.name, &self.zone)
    }

    /// Same record set with a different desired address set
    pub fn with_addresses(&self, addresses: AddressSet) -> Self {
        Self {
            addresses,
            ..self.clone()
        }
    }

    /// Whether changing from `recorded` to `self` requires a new identity
    ///
    /// Zone, name and TTL cannot be changed in place.
    pub fn forces_new(&self, recorded: &StateRecord) -> bool {
        self.zone != recorded.zone || self.name != recorded.name || self.ttl != recorded.ttl
    }
}
