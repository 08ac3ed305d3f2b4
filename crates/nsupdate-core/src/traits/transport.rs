// # Transport Trait
//
// Defines the interface for exchanging DNS messages with a server.
//
// ## Implementations
//
// - UDP/TCP over tokio: `nsupdate-transport` crate
// - In-process fakes: contract tests in `nsupdate-core/tests`
//
// ## Usage
//
// ```rust,ignore
// use nsupdate_core::traits::Transport;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let transport = /* Transport implementation */;
//
//     let response = transport.exchange(query, "127.0.0.1:53").await?;
//     println!("rcode: {}", response.response_code());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use hickory_proto::error::ProtoError;
use hickory_proto::op::Message;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while exchanging a message
#[derive(Error, Debug)]
pub enum TransportError {
    /// Socket-level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No response within the configured timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The message could not be encoded or the response decoded
    #[error("malformed DNS message: {0}")]
    Proto(#[from] ProtoError),

    /// The response does not answer the request that was sent
    #[error("response id {received} does not match request id {expected}")]
    IdMismatch {
        /// ID of the request
        expected: u16,
        /// ID carried by the response
        received: u16,
    },

    /// Message too large for the transport's framing
    #[error("message of {0} bytes exceeds transport limit")]
    MessageTooLarge(usize),

    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

/// Trait for DNS message transports
///
/// # Contract
///
/// - One request, one response: `exchange` sends the message once and waits
///   for its answer. Retry and backoff are not performed here.
/// - Timeouts are enforced by the implementation and reported as
///   [`TransportError::Timeout`].
/// - The response code is not interpreted; that is the engine's job.
/// - Implementations must be usable across async tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `message` to `server` (`host:port`) and return the response
    async fn exchange(&self, message: Message, server: &str) -> Result<Message, TransportError>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
