// # DNS Transport
//
// This crate provides the network transport for the nsupdate engine.
//
// ## Protocols
//
// - **UDP** (default): one datagram each way on an ephemeral socket. A
//   truncated response is retried over TCP.
// - **TCP**: one connection per exchange, messages framed with a 2-byte
//   big-endian length prefix (RFC 1035 §4.2.2).
//
// Every network step runs under the configured timeout. The response ID
// must match the request ID.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::BinEncodable;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, trace};

use nsupdate_core::config::{TransportProtocol, UpdateServerConfig};
use nsupdate_core::traits::{Transport, TransportError};

/// Largest DNS message a UDP datagram or TCP frame can carry
const MAX_MESSAGE_SIZE: usize = 65535;

/// UDP/TCP transport over tokio
#[derive(Debug, Clone)]
pub struct DnsTransport {
    protocol: TransportProtocol,
    timeout: Duration,
}

impl DnsTransport {
    /// Create a transport
    pub fn new(protocol: TransportProtocol, timeout: Duration) -> Self {
        Self { protocol, timeout }
    }

    /// Create a transport from the update server configuration
    pub fn from_config(config: &UpdateServerConfig) -> Self {
        Self::new(config.transport, config.timeout())
    }

    pub fn protocol(&self) -> TransportProtocol {
        self.protocol
    }

    async fn resolve(&self, server: &str) -> Result<SocketAddr, TransportError> {
        let mut addrs = self.timed(tokio::net::lookup_host(server)).await?;
        addrs
            .next()
            .ok_or_else(|| TransportError::Other(format!("{server} did not resolve to an address")))
    }

    async fn exchange_udp(&self, addr: SocketAddr, wire: &[u8]) -> Result<Message, TransportError> {
        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;

        self.timed(socket.send(wire)).await?;

        let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
        let len = self.timed(socket.recv(&mut buf)).await?;
        trace!("Received {} bytes over UDP from {}", len, addr);

        Ok(Message::from_vec(&buf[..len])?)
    }

    async fn exchange_tcp(&self, addr: SocketAddr, wire: &[u8]) -> Result<Message, TransportError> {
        let len = u16::try_from(wire.len()).map_err(|_| TransportError::MessageTooLarge(wire.len()))?;

        let mut stream = self.timed(TcpStream::connect(addr)).await?;

        let mut frame = Vec::with_capacity(wire.len() + 2);
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(wire);
        self.timed(stream.write_all(&frame)).await?;

        let mut len_buf = [0u8; 2];
        self.timed(stream.read_exact(&mut len_buf)).await?;
        let resp_len = u16::from_be_bytes(len_buf) as usize;

        let mut resp_buf = vec![0u8; resp_len];
        self.timed(stream.read_exact(&mut resp_buf)).await?;
        trace!("Received {} bytes over TCP from {}", resp_len, addr);

        Ok(Message::from_vec(&resp_buf)?)
    }

    async fn timed<F, T>(&self, future: F) -> Result<T, TransportError>
    where
        F: std::future::Future<Output = std::io::Result<T>>,
    {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(TransportError::from)
    }
}

fn check_id(request_id: u16, response: Message) -> Result<Message, TransportError> {
    if response.id() != request_id {
        return Err(TransportError::IdMismatch {
            expected: request_id,
            received: response.id(),
        });
    }
    Ok(response)
}

#[async_trait]
impl Transport for DnsTransport {
    async fn exchange(&self, message: Message, server: &str) -> Result<Message, TransportError> {
        let addr = self.resolve(server).await?;
        let wire = message.to_vec()?;
        let id = message.id();

        let response = match self.protocol {
            TransportProtocol::Tcp => self.exchange_tcp(addr, &wire).await?,
            TransportProtocol::Udp => {
                let response = self.exchange_udp(addr, &wire).await?;
                if response.truncated() {
                    debug!("Response from {} truncated, retrying over TCP", addr);
                    self.exchange_tcp(addr, &wire).await?
                } else {
                    response
                }
            }
        };

        check_id(id, response)
    }

    fn transport_name(&self) -> &'static str {
        match self.protocol {
            TransportProtocol::Udp => "udp",
            TransportProtocol::Tcp => "tcp",
        }
    }
}
