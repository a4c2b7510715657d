use std::sync::Arc;

use clap::Parser;
use resolvd::config::{CliArgs, ResolverConfig};
use resolvd::context::ResolverContext;
use resolvd::dispatcher::Dispatcher;
use resolvd::dns::enums::ResponseCode;
use resolvd::dns::header::DNSHeader;
use resolvd::dns::DNSPacket;
use resolvd::dnssec::{TrustAnchor, TrustAnchorStore};
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config = ResolverConfig::load(&args)?;

    tracing_subscriber::fmt().with_env_filter(config.log_filter.as_str()).init();

    info!(listen = ?config.listen_addrs, "starting resolver");

    let trust_anchors = Arc::new(TrustAnchorStore::new());
    for entry in &config.trust_anchors {
        if let Some(anchor) = parse_trust_anchor(&entry.zone, &entry.rdata) {
            trust_anchors.add_anchor(anchor);
        } else {
            warn!(zone = %entry.zone, "ignoring malformed configured trust anchor");
        }
    }
    let ctx = Arc::new(ResolverContext::new(config, trust_anchors));
    resolvd::root_hints::seed_roots(&ctx);
    for stub in &ctx.config.stub_zones {
        ctx.seed_stub_zone(&stub.zone, &stub.servers);
    }

    let dispatcher = Arc::new(Dispatcher::new(ctx.clone()));

    let mut handles = Vec::new();
    for addr in ctx.config.listen_addrs.clone() {
        let socket = UdpSocket::bind(addr).await?;
        info!(%addr, "listening for udp queries");
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            serve_udp(socket, dispatcher).await;
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

/// Parse a configured trust anchor's rdata as `flags protocol algorithm
/// base64-key`, the DNSKEY presentation-format fields (§3.9, §6.4).
fn parse_trust_anchor(zone: &str, rdata: &str) -> Option<TrustAnchor> {
    let parts: Vec<&str> = rdata.split_whitespace().collect();
    if parts.len() != 4 {
        return None;
    }
    let flags: u16 = parts[0].parse().ok()?;
    let protocol: u8 = parts[1].parse().ok()?;
    let algorithm: u8 = parts[2].parse().ok()?;
    let key = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, parts[3]).ok()?;
    TrustAnchor::new(zone.to_string(), flags, protocol, algorithm, key)
}

async fn serve_udp(socket: UdpSocket, dispatcher: Arc<Dispatcher>) {
    let socket = Arc::new(socket);
    let mut buf = [0u8; 4096];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!("udp recv failed: {err}");
                continue;
            }
        };

        let query = match DNSPacket::parse(&buf[..len]) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%from, "malformed query: {err}");
                continue;
            }
        };

        let socket = socket.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let response = handle_query(&dispatcher, &query).await;
            if let Ok(bytes) = response.serialize() {
                if let Err(err) = socket.send_to(&bytes, from).await {
                    error!(%from, "udp send failed: {err}");
                }
            }
        });
    }
}

async fn handle_query(dispatcher: &Dispatcher, query: &DNSPacket) -> DNSPacket {
    let mut response_header = DNSHeader {
        id: query.header.id,
        qr: true,
        rd: query.header.rd,
        ra: true,
        ..Default::default()
    };

    let Some(question) = query.questions.first() else {
        response_header.rcode = ResponseCode::FormatError.to_u8();
        return DNSPacket::new(response_header);
    };

    let qname = question.labels.join(".");
    let outcome = dispatcher.resolve(&qname, question.qtype).await;

    response_header.rcode = outcome.rcode.to_u8();
    let mut response = DNSPacket::new(response_header);
    response.questions.push(question.clone());

    if let Some(rrset) = outcome.rrset {
        response.answers.extend(rrset.records);
        response.answers.extend(rrset.rrsigs);
    }

    if let Some(ede) = &outcome.ede {
        let mut opt = resolvd::dns::edns::EdnsOpt::with_payload_size(4096);
        opt.add_extended_error(ede.code, ede.text.as_deref());
        response.edns = Some(opt);
    }

    response.update_counts();
    response
}
