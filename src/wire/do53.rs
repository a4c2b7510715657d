use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tracing::debug;

use crate::dns::DNSPacket;
use crate::error::Result;

use super::transport_error;

/// A pool of reusable UDP sockets, one bucket per upstream address, grounded
/// on the teacher's `ConnectionPool` (`resolver.rs`).
struct SocketPool {
    sockets: Mutex<HashMap<SocketAddr, Vec<UdpSocket>>>,
    max_per_server: usize,
}

impl SocketPool {
    fn new(max_per_server: usize) -> Self {
        Self {
            sockets: Mutex::new(HashMap::new()),
            max_per_server,
        }
    }

    async fn checkout(&self, addr: SocketAddr) -> Result<UdpSocket> {
        let mut pool = self.sockets.lock().await;
        if let Some(sockets) = pool.get_mut(&addr) {
            if let Some(socket) = sockets.pop() {
                debug!(%addr, "reusing pooled udp socket");
                return Ok(socket);
            }
        }
        debug!(%addr, "opening new udp socket");
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;
        Ok(socket)
    }

    async fn checkin(&self, addr: SocketAddr, socket: UdpSocket) {
        let mut pool = self.sockets.lock().await;
        let bucket = pool.entry(addr).or_default();
        if bucket.len() < self.max_per_server {
            bucket.push(socket);
        }
    }
}

/// Plain DNS over UDP, falling back to TCP on truncation (§4.5).
pub struct Do53Client {
    pool: Arc<SocketPool>,
}

impl Default for Do53Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Do53Client {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(SocketPool::new(5)),
        }
    }

    pub async fn exchange(
        &self,
        query_bytes: &[u8],
        addr: SocketAddr,
        timeout: Duration,
    ) -> Result<DNSPacket> {
        let result = tokio::time::timeout(timeout, self.exchange_inner(query_bytes, addr)).await;
        result.map_err(|_| transport_error(addr, "do53 exchange timed out"))?
    }

    async fn exchange_inner(&self, query_bytes: &[u8], addr: SocketAddr) -> Result<DNSPacket> {
        let reply = self.exchange_udp(query_bytes, addr).await?;
        if reply.header.tc {
            debug!(%addr, "udp response truncated, retrying over tcp");
            return self.exchange_tcp(query_bytes, addr).await;
        }
        Ok(reply)
    }

    async fn exchange_udp(&self, query_bytes: &[u8], addr: SocketAddr) -> Result<DNSPacket> {
        let socket = self.pool.checkout(addr).await?;
        socket
            .send(query_bytes)
            .await
            .map_err(|e| transport_error(addr, e.to_string()))?;

        let mut buf = vec![0u8; 4096];
        let len = socket
            .recv(&mut buf)
            .await
            .map_err(|e| transport_error(addr, e.to_string()))?;
        self.pool.checkin(addr, socket).await;

        Ok(DNSPacket::parse(&buf[..len])?)
    }

    async fn exchange_tcp(&self, query_bytes: &[u8], addr: SocketAddr) -> Result<DNSPacket> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| transport_error(addr, e.to_string()))?;

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
