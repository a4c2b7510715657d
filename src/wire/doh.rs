use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Client;

use crate::dns::DNSPacket;
use crate::error::Result;

use super::transport_error;

const DOH_CONTENT_TYPE: &str = "application/dns-message";

/// DNS-over-HTTPS client (RFC 8484), POSTing wire-format queries. The
/// teacher's `transport/doh.rs` implements the server side of this same
/// content type negotiation; this is the client counterpart, built on
/// `reqwest` (already in the teacher's dependency table).
pub struct DohClient {
    client: Client,
}

impl Default for DohClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DohClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("reqwest client builds with default rustls config"),
        }
    }

    pub async fn exchange(
        &self,
        query_bytes: &[u8],
        addr: SocketAddr,
        timeout: Duration,
    ) -> Result<DNSPacket> {
        let url = format!("https://{}/dns-query", addr);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, DOH_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, DOH_CONTENT_TYPE)
            .body(query_bytes.to_vec())
            .send()
            .await
            .map_err(|e| transport_error(addr, e.to_string()))?;

        if !response.status().is_success() {
            return Err(transport_error(
                addr,
                format!("doh server returned {}", response.status()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(addr, e.to_string()))?;

        Ok(DNSPacket::parse(&body)?)
    }
}
