//! Error types for the nsupdate engine
//!
//! Every engine operation returns [`Result`]. Input errors (zone, address)
//! are detected before any exchange; wire errors carry the operation that
//! produced them so messages stay actionable.

use std::fmt;

use hickory_proto::op::ResponseCode;
use thiserror::Error;

use crate::traits::TransportError;

/// Result type alias for nsupdate operations
pub type Result<T> = std::result::Result<T, Error>;

/// The record-set operation an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Create => "creating",
            Operation::Read => "querying",
            Operation::Update => "updating",
            Operation::Delete => "deleting",
        };
        f.write_str(verb)
    }
}

/// Core error type for the nsupdate engine
#[derive(Error, Debug)]
pub enum Error {
    /// Zone is not a fully-qualified domain name
    #[error("Error {operation} DNS record: \"zone\" should be an FQDN, got {zone:?}")]
    InvalidZone {
        /// Operation that validated the zone
        operation: Operation,
        /// The rejected zone string
        zone: String,
    },

    /// Address text does not parse as an IP address
    #[error("Error parsing IP address: {0:?}")]
    InvalidAddress(String),

    /// A resource record could not be constructed from validated input
    #[error("Error encoding DNS record {record:?}: {message}")]
    RecordEncoding {
        /// Text form of the record being built
        record: String,
        /// Underlying cause
        message: String,
    },

    /// Signing the transaction failed
    #[error("Error signing DNS transaction: {0}")]
    Signing(String),

    /// The exchange with the server did not complete
    #[error("Error {operation} DNS record: {source}")]
    Transport {
        /// Operation that issued the exchange
        operation: Operation,
        /// Transport failure
        #[source]
        source: TransportError,
    },

    /// The server answered with a non-success response code
    #[error("Error {operation} DNS record: server responded {code}")]
    ServerStatus {
        /// Operation that issued the exchange
        operation: Operation,
        /// Response code returned by the server
        code: ResponseCode,
    },

    /// Server state does not equal the declared address set
    #[error("DNS record {fqdn} differs: expected {expected:?}, found {found:?}")]
    RecordMismatch {
        /// Record that was verified
        fqdn: String,
        /// Declared, normalized addresses
        expected: Vec<String>,
        /// Addresses returned by the server, normalized
        found: Vec<String>,
    },

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid zone error
    pub fn invalid_zone(operation: Operation, zone: impl Into<String>) -> Self {
        Self::InvalidZone {
            operation,
            zone: zone.into(),
        }
    }

    /// Create an invalid address error
    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress(address.into())
    }

    /// Create a record encoding error
    pub fn record_encoding(record: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::RecordEncoding {
            record: record.into(),
            message: message.to_string(),
        }
    }

    /// Create a signing error
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Create a transport error for the given operation
    pub fn transport(operation: Operation, source: TransportError) -> Self {
        Self::Transport { operation, source }
    }

    /// Create a server status error
    pub fn server_status(operation: Operation, code: ResponseCode) -> Self {
        Self::ServerStatus { operation, code }
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error was caused by caller input rather than the server
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidZone { .. } | Self::InvalidAddress(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
