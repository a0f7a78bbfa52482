//! The DNS exchange capability consumed by the verifier and TXT resolver

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, trace};

use crate::dns::DNSPacket;
use crate::dns::enums::DNSResourceType;
use crate::dns::name;
use crate::error::TransportError;

/// One DNS question/answer exchange with a recursive resolver.
///
/// Implementations return whatever response arrived, including SERVFAIL and
/// NXDOMAIN; classifying response codes is left to the caller.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn query(&self, name: &str, rtype: DNSResourceType)
    -> Result<DNSPacket, TransportError>;
}

/// UDP transport with TCP fallback on truncation
pub struct UdpTransport {
    upstreams: Vec<SocketAddr>,
    payload_size: u16,
    next_upstream: AtomicUsize,
}

impl UdpTransport {
    pub fn new(upstreams: Vec<SocketAddr>, payload_size: u16) -> Self {
        Self {
            upstreams,
            payload_size,
            next_upstream: AtomicUsize::new(0),
        }
    }

    async fn exchange(
        &self,
        query_bytes: &[u8],
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket, TransportError> {
        let response = self.send_udp_query(query_bytes, upstream_addr).await?;
        if response.header.tc {
            debug!("UDP response from {} truncated, retrying with TCP", upstream_addr);
            return self.send_tcp_query(query_bytes, upstream_addr).await;
        }
        Ok(response)
    }

    async fn send_udp_query(
        &self,
        query_bytes: &[u8],
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket, TransportError> {
        let bind_addr: SocketAddr = if upstream_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(upstream_addr).await?;
        socket.send(query_bytes).await?;

        let mut response_buf = vec![0u8; usize::from(self.payload_size.max(512))];
        let response_len = socket.recv(&mut response_buf).await?;
        trace!(
            "Raw UDP response data ({} bytes): {:02x?}",
            response_len,
            &response_buf[..response_len.min(64)]
        );

        let response = DNSPacket::parse(&response_buf[..response_len]).map_err(|e| {
            debug!("Failed to parse UDP response from {}: {:?}", upstream_addr, e);
            TransportError::Malformed(e.to_string())
        })?;
        log_response_details(&response, response_len, "UDP");
        Ok(response)
    }

    async fn send_tcp_query(
        &self,
        query_bytes: &[u8],
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket, TransportError> {
        let mut stream = TcpStream::connect(upstream_addr).await?;

        let query_length = u16::try_from(query_bytes.len())
            .map_err(|_| TransportError::Malformed("query exceeds 65535 bytes".to_string()))?;
        stream.write_all(&query_length.to_be_bytes()).await?;
        stream.write_all(query_bytes).await?;
        stream.flush().await?;

        let mut length_buf = [0u8; 2];
        stream.read_exact(&mut length_buf).await?;
        let response_length = usize::from(u16::from_be_bytes(length_buf));

        let mut response_buf = vec![0; response_length];
        stream.read_exact(&mut response_buf).await?;

        let response = DNSPacket::parse(&response_buf).map_err(|e| {
            debug!("Failed to parse TCP response from {}: {:?}", upstream_addr, e);
            TransportError::Malformed(e.to_string())
        })?;
        log_response_details(&response, response_length, "TCP");
        Ok(response)
    }
}

fn log_response_details(response: &DNSPacket, response_len: usize, protocol: &str) {
    debug!(
        "Parsed {} response: rcode={}, answers={}, authorities={}, additional={}, ad={}",
        protocol,
        response.response_code(),
        response.answers.len(),
        response.authorities.len(),
        response.resources.len(),
        response.header.ad
    );
    trace!("Received {} response: {} bytes", protocol, response_len);
}

#[async_trait]
impl DnsTransport for UdpTransport {
    async fn query(
        &self,
        qname: &str,
        rtype: DNSResourceType,
    ) -> Result<DNSPacket, TransportError> {
        if self.upstreams.is_empty() {
            return Err(TransportError::NoUpstream);
        }
        if name::to_wire(qname, false).is_err() {
            return Err(TransportError::InvalidName(qname.to_string()));
        }

        let id: u16 = rand::random();
        let query = DNSPacket::query(id, qname, rtype, self.payload_size, true);
        let query_bytes = query.serialize()?;

        // Spread successive queries (and retries) across the upstreams
        let start = self.next_upstream.fetch_add(1, Ordering::Relaxed);
        let mut last_error = TransportError::NoUpstream;
        for offset in 0..self.upstreams.len() {
            let upstream_addr = self.upstreams[(start + offset) % self.upstreams.len()];
            trace!("Sending {} {} to {}", qname, rtype, upstream_addr);

            match self.exchange(&query_bytes, upstream_addr).await {
                Ok(response) if response.header.id != id => {
                    last_error = TransportError::Mismatch(format!(
                        "id {} from {}, expected {}",
                        response.header.id, upstream_addr, id
                    ));
                }
                Ok(response) if !response.answers_question(qname, rtype) => {
                    last_error = TransportError::Mismatch(format!(
                        "question section from {} does not echo {} {}",
                        upstream_addr, qname, rtype
                    ));
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    debug!("Upstream {} failed for {} {}: {}", upstream_addr, qname, rtype, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
