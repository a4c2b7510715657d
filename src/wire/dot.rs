use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::dns::DNSPacket;
use crate::error::Result;

use super::transport_error;

/// DNS-over-TLS client (RFC 7858). The teacher's `tls.rs` builds a
/// `rustls::ServerConfig` for its own DoT *listener*; this adapts the same
/// `rustls`/`tokio-rustls` stack to the client role, verifying the peer
/// against the Mozilla root bundle.
pub struct DotClient {
    connector: TlsConnector,
}

impl Default for DotClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DotClient {
    pub fn new() -> Self {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    pub async fn exchange(
        &self,
        query_bytes: &[u8],
        addr: SocketAddr,
        timeout: Duration,
    ) -> Result<DNSPacket> {
        tokio::time::timeout(timeout, self.exchange_inner(query_bytes, addr))
            .await
            .map_err(|_| transport_error(addr, "dot exchange timed out"))?
    }

    async fn exchange_inner(&self, query_bytes: &[u8], addr: SocketAddr) -> Result<DNSPacket> {
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|e| transport_error(addr, e.to_string()))?;

        let server_name = ServerName::IpAddress(addr.ip().into());
        let mut stream = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| transport_error(addr, format!("tls handshake failed: {e}")))?;

        let len = query_bytes.len() as u16;
        stream.write_all(&len.to_be_bytes()).await?;
        stream.write_all(query_bytes).await?;
        stream.flush().await?;

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await?;
        let reply_len = u16::from_be_bytes(len_buf) as usize;

        let mut reply_buf = vec![0u8; reply_len];
        stream.read_exact(&mut reply_buf).await?;

        Ok(DNSPacket::parse(&reply_buf)?)
    }
}
