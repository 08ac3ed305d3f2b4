//! Configuration types for the nsupdate system
//!
//! The engine consumes [`UpdateServerConfig`]; the daemon assembles a full
//! [`NsupdateConfig`] from the environment.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main nsupdate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsupdateConfig {
    /// Authoritative server receiving updates and queries
    pub server: UpdateServerConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Address record sets to manage
    pub records: Vec<RecordSetConfig>,

    /// Optional reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl NsupdateConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.server.validate()?;
        self.reconciler.validate()?;

        for record in &self.records {
            record.validate()?;
        }

        let mut seen = std::collections::HashSet::new();
        for record in &self.records {
            if !seen.insert(record.fqdn()) {
                return Err(crate::Error::config(format!(
                    "Record set {} is declared more than once",
                    record.fqdn()
                )));
            }
        }

        Ok(())
    }
}

/// Update server configuration
///
/// Process-wide and read-only from the engine's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateServerConfig {
    /// Server host name or address
    pub server: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport protocol
    #[serde(default)]
    pub transport: TransportProtocol,

    /// Per-exchange timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional TSIG key; unsigned when absent or when its name is empty
    #[serde(default)]
    pub key: Option<SigningKeyConfig>,
}

impl UpdateServerConfig {
    /// Create a configuration for `server` with defaults
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: default_port(),
            transport: TransportProtocol::default(),
            timeout_secs: default_timeout_secs(),
            key: None,
        }
    }

    /// Set the signing key
    pub fn with_key(mut self, key: SigningKeyConfig) -> Self {
        self.key = Some(key);
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `host:port` address of the server, bracketing IPv6 literals
    pub fn address(&self) -> String {
        if self.server.contains(':') && !self.server.starts_with('[') {
            format!("[{}]:{}", self.server, self.port)
        } else {
            format!("{}:{}", self.server, self.port)
        }
    }

    /// Per-exchange timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the server configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.server.trim().is_empty() {
            return Err(crate::Error::config("Update server cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("Update server port must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Update server timeout must be > 0"));
        }
        if let Some(key) = &self.key {
            key.validate()?;
        }
        Ok(())
    }
}

/// Transport protocol used for exchanges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    /// UDP, retried over TCP when the response is truncated
    #[default]
    Udp,
    /// TCP only
    Tcp,
}

impl std::str::FromStr for TransportProtocol {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            other => Err(crate::Error::config(format!(
                "Unsupported transport {other:?}. Supported: udp, tcp"
            ))),
        }
    }
}

/// TSIG key configuration
///
/// The Debug implementation intentionally does NOT expose the secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct SigningKeyConfig {
    /// Key name; an empty name disables signing
    pub name: String,

    /// HMAC algorithm name (e.g., "hmac-sha256")
    #[serde(default = "default_key_algorithm")]
    pub algorithm: String,

    /// Base64-encoded shared secret
    pub secret: String,
}

impl fmt::Debug for SigningKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyConfig")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl SigningKeyConfig {
    /// Create a key configuration
    pub fn new(
        name: impl Into<String>,
        algorithm: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            algorithm: algorithm.into(),
            secret: secret.into(),
        }
    }

    /// Validate the key configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Ok(());
        }
        if self.secret.trim().is_empty() {
            return Err(crate::Error::config(format!(
                "TSIG key {} has an empty secret",
                self.name
            )));
        }
        crate::tsig::parse_algorithm(&self.algorithm)?;
        Ok(())
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

/// Declared address record set
///
/// Raw, as supplied by the caller. Decoded once into a
/// [`RecordSet`](crate::resource::RecordSet) before reaching the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSetConfig {
    /// Fully-qualified zone (e.g., "example.com.")
    pub zone: String,

    /// Record name relative to the zone (e.g., "www")
    pub name: String,

    /// IP addresses of the record set
    pub addresses: Vec<String>,

    /// Time-to-live for every record in the set
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl RecordSetConfig {
    /// Create a new record set configuration with the default TTL
    pub fn new<I, S>(zone: impl Into<String>, name: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            zone: zone.into(),
            name: name.into(),
            addresses: addresses.into_iter().map(Into::into).collect(),
            ttl: default_ttl(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Record FQDN composed from name and zone
    pub fn fqdn(&self) -> String {
        crate::name::compose_fqdn(&self.name, &self.zone)
    }

    /// Validate the declaration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config(format!(
                "Record name cannot be empty (zone {})",
                self.zone
            )));
        }
        crate::name::validate_zone(&self.zone, crate::error::Operation::Create)?;
        Ok(())
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Interval between reconciliation passes (in seconds)
    ///
    /// Set to 0 to reconcile once and stop.
    #[serde(default)]
    pub interval_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_port() -> u16 {
    53
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_key_algorithm() -> String {
    "hmac-sha256".to_string()
}

/// Default record TTL (in seconds)
pub fn default_ttl() -> u32 {
    3600
}

fn default_event_channel_capacity() -> usize {
    1000
}
