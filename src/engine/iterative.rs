use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::RRsetCache;
use crate::context::ResolverContext;
use crate::dns::enums::{DNSResourceClass, DNSResourceType, ResponseCode};
use crate::dns::header::DNSHeader;
use crate::dns::question::DNSQuestion;
use crate::dns::resource::DNSResource;
use crate::dns::DNSPacket;
use crate::error::{ResolverError, Result};
use crate::model::{AuthServer, CachedRRset, Context, RRset, Transport, ValidationState, Zone};
use crate::transport_signal;

use super::classify::{classify_response, Classification};

const MAX_SERVER_ATTEMPTS: usize = 15;
const MAX_CNAME_DEPTH: u8 = 10;
const MIN_NEGATIVE_TTL: u32 = 60;

/// The final shape returned to a caller (§4.7.1 entry point).
pub struct ResolveOutcome {
    pub rcode: ResponseCode,
    pub rrset: Option<RRset>,
    pub context: Context,
    pub state: ValidationState,
    pub error: Option<ResolverError>,
    pub ede: Option<crate::model::ExtendedError>,
}

fn labels_to_name(labels: &[String]) -> String {
    if labels.is_empty() {
        ".".to_string()
    } else {
        labels.join(".")
    }
}

/// Drives one top-level resolution (§4.7.1).
pub async fn resolve(
    ctx: &ResolverContext,
    cancel: CancellationToken,
    qname: &str,
    qtype: DNSResourceType,
    force_refetch: bool,
) -> ResolveOutcome {
    let qname = qname.trim_end_matches('.').to_ascii_lowercase();

    if !force_refetch {
        if let Some(cached) = ctx.rrset_cache.get(&qname, qtype) {
            if cached.is_caller_visible() {
                return ResolveOutcome {
                    rcode: cached.rcode,
                    rrset: cached.rrset,
                    context: cached.context,
                    state: cached.state,
                    error: None,
                    ede: cached.ede,
                };
            }
        }
    }

    let mut visited: HashSet<(String, String)> = HashSet::new();
    resolve_inner(ctx, cancel, &qname, qtype, &mut visited, 0).await
}

async fn resolve_inner(
    ctx: &ResolverContext,
    cancel: CancellationToken,
    qname: &str,
    qtype: DNSResourceType,
    visited: &mut HashSet<(String, String)>,
    cname_depth: u8,
) -> ResolveOutcome {
    let (zone, servers) = match bootstrap_servers(ctx, qname) {
        Some(pair) => pair,
        None => {
            return ResolveOutcome {
                rcode: ResponseCode::ServerFailure,
                rrset: None,
                context: Context::Failure,
                state: ValidationState::Indeterminate,
                error: Some(ResolverError::NoReachableServer { zone: qname.to_string() }),
                ede: None,
            };
        }
    };

    let mut attempts = 0usize;
    let mut last_error = None;

    'server_loop: for server in &servers {
        if attempts >= MAX_SERVER_ATTEMPTS || cancel.is_cancelled() {
            break;
        }
        let addresses = ctx.auth_servers.available_addresses(server, Some(&zone));
        for addr in addresses {
            if attempts >= MAX_SERVER_ATTEMPTS || cancel.is_cancelled() {
                break 'server_loop;
            }
            attempts += 1;

            let transport = pick_transport(server, qname);
            let socket_addr = SocketAddr::new(addr, default_port(transport));
            let query = build_query(qname, qtype);
            let timeout = ctx.config.timeout_for(transport);

            ctx.metrics.record_exchange_attempt(transport);
            let exchange = ctx.wire.exchange(transport, socket_addr, &query, timeout).await;

            let reply = match exchange {
                Ok(exchange) => {
                    server.record_exchange(transport, true);
                    ctx.metrics.record_exchange(transport, true, exchange.round_trip.as_secs_f64());
                    ctx.auth_servers.record_address_success(
                        server,
                        Some(&zone),
                        addr,
                        crate::authserver::registry::FailureKind::Transport,
                    );
                    exchange.reply
                }
                Err(err) => {
                    warn!(%addr, transport = %transport, "exchange failed: {err}");
                    server.record_exchange(transport, false);
                    ctx.metrics.record_exchange(transport, false, 0.0);
                    ctx.auth_servers.record_address_failure(
                        server,
                        Some(&zone),
                        addr,
                        crate::authserver::registry::FailureKind::Transport,
                    );
                    last_error = Some(err);
                    continue;
                }
            };

            match classify_response(qname, &reply) {
                Classification::Answer => {
                    return handle_answer(ctx, qname, qtype, &reply, visited, cname_depth).await;
                }
                Classification::Referral => {
                    match handle_referral(ctx, qname, &reply, visited).await {
                        Ok(Some((next_zone, next_servers))) => {
                            let mut boxed = Box::pin(resolve_with_servers(
                                ctx,
                                cancel.clone(),
                                qname,
                                qtype,
                                visited,
                                cname_depth,
                                next_zone,
                                next_servers,
                            ));
                            return boxed.as_mut().await;
                        }
                        Ok(None) => continue,
                        Err(err) => {
                            return ResolveOutcome {
                                rcode: ResponseCode::ServerFailure,
                                rrset: None,
                                context: Context::Failure,
                                state: ValidationState::Indeterminate,
                                error: Some(err),
                                ede: None,
                            };
                        }
                    }
                }
                Classification::NegativeNxDomain | Classification::NegativeNoData => {
                    return handle_negative(ctx, qname, qtype, &reply, classify_response(qname, &reply)).await;
                }
                Classification::Error | Classification::Unknown => {
                    let kind = if reply.header.rcode == ResponseCode::Refused as u8
                        || reply.header.rcode == ResponseCode::NotAuth as u8
                        || reply.header.rcode == ResponseCode::NotImplemented as u8
                        || reply.header.rcode == ResponseCode::ServerFailure as u8
                    {
                        crate::authserver::registry::FailureKind::Authority(ResponseCode::from_u8(
                            reply.header.rcode,
                        ))
                    } else {
                        crate::authserver::registry::FailureKind::Transport
                    };
                    ctx.auth_servers.record_address_failure(server, Some(&zone), addr, kind);
                    continue;
                }
            }
        }
    }

    ResolveOutcome {
        rcode: ResponseCode::ServerFailure,
        rrset: None,
        context: Context::NoErrNoAns,
        state: ValidationState::Indeterminate,
        error: last_error.or(Some(ResolverError::NoReachableServer { zone: qname.to_string() })),
        ede: None,
    }
}

/// Continue a resolution against a freshly-handed server set from a referral
/// (§4.7.5 step 9), without re-consulting the cache.
async fn resolve_with_servers(
    ctx: &ResolverContext,
    cancel: CancellationToken,
    qname: &str,
    qtype: DNSResourceType,
    visited: &mut HashSet<(String, String)>,
    cname_depth: u8,
    zone: Arc<Zone>,
    servers: Vec<Arc<AuthServer>>,
) -> ResolveOutcome {
    let mut attempts = 0usize;
    let mut last_error = None;

    for server in &servers {
        if attempts >= MAX_SERVER_ATTEMPTS {
            break;
        }
        let addresses = ctx.auth_servers.available_addresses(server, Some(&zone));
        for addr in addresses {
            if attempts >= MAX_SERVER_ATTEMPTS || cancel.is_cancelled() {
                break;
            }
            attempts += 1;
            let transport = pick_transport(server, qname);
            let socket_addr = SocketAddr::new(addr, default_port(transport));
            let query = build_query(qname, qtype);
            let timeout = ctx.config.timeout_for(transport);

            let reply = match ctx.wire.exchange(transport, socket_addr, &query, timeout).await {
                Ok(exchange) => exchange.reply,
                Err(err) => {
                    last_error = Some(err);
                    ctx.auth_servers.record_address_failure(
                        server,
                        Some(&zone),
                        addr,
                        crate::authserver::registry::FailureKind::Transport,
                    );
                    continue;
                }
            };

            match classify_response(qname, &reply) {
                Classification::Answer => {
                    return handle_answer(ctx, qname, qtype, &reply, visited, cname_depth).await;
                }
                Classification::Referral => match handle_referral(ctx, qname, &reply, visited).await {
                    Ok(Some((next_zone, next_servers))) => {
                        let mut boxed = Box::pin(resolve_with_servers(
                            ctx,
                            cancel.clone(),
                            qname,
                            qtype,
                            visited,
                            cname_depth,
                            next_zone,
                            next_servers,
                        ));
                        return boxed.as_mut().await;
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        return ResolveOutcome {
                            rcode: ResponseCode::ServerFailure,
                            rrset: None,
                            context: Context::Failure,
                            state: ValidationState::Indeterminate,
                            error: Some(err),
                            ede: None,
                        };
                    }
                },
                Classification::NegativeNxDomain | Classification::NegativeNoData => {
                    return handle_negative(ctx, qname, qtype, &reply, classify_response(qname, &reply)).await;
                }
                Classification::Error | Classification::Unknown => continue,
            }
        }
    }

    ResolveOutcome {
        rcode: ResponseCode::ServerFailure,
        rrset: None,
        context: Context::NoErrNoAns,
        state: ValidationState::Indeterminate,
        error: last_error,
        ede: None,
    }
}

fn bootstrap_servers(ctx: &ResolverContext, qname: &str) -> Option<(Arc<Zone>, Vec<Arc<AuthServer>>)> {
    let found = ctx.zone_map.find_closest(qname, |zone_name| {
        let zone = match ctx.zone_map.get(zone_name) {
            Some(z) => z,
            None => return Vec::new(),
        };
        zone.ns_names()
            .into_iter()
            .filter_map(|name| ctx.auth_servers.get(&name))
            .collect()
    });
    if found.is_some() {
        return found;
    }
    crate::root_hints::seed_roots(ctx);
    ctx.zone_map.find_closest(qname, |zone_name| {
        let zone = match ctx.zone_map.get(zone_name) {
            Some(z) => z,
            None => return Vec::new(),
        };
        zone.ns_names()
            .into_iter()
            .filter_map(|name| ctx.auth_servers.get(&name))
            .collect()
    })
}

/// `pick_transport` (§4.7.2).
fn pick_transport(server: &AuthServer, qname: &str) -> Transport {
    let weights: Vec<(Transport, u8)> = server
        .transports()
        .into_iter()
        .map(|t| (t, server.transport_weight(t)))
        .filter(|(_, w)| *w > 0)
        .collect();

    if weights.is_empty() {
        return server.preferred_transport().unwrap_or(Transport::Do53);
    }

    let nonce = format!("{qname}|{}", server.name);
    transport_signal::select_transport(&weights, nonce.as_bytes())
}

fn default_port(transport: Transport) -> u16 {
    match transport {
        Transport::Do53 => 53,
        Transport::DoT => 853,
        Transport::DoH => 443,
        Transport::DoQ => 853,
    }
}

fn build_query(qname: &str, qtype: DNSResourceType) -> DNSPacket {
    let mut header = DNSHeader::default();
    header.id = rand::random();
    header.rd = false;
    header.qdcount = 1;
    let mut packet = DNSPacket::new(header);
    packet.questions.push(DNSQuestion {
        labels: qname.split('.').filter(|l| !l.is_empty()).map(String::from).collect(),
        qtype,
        qclass: DNSResourceClass::IN,
    });
    packet.add_edns(4096, true);
    packet.update_counts();
    packet
}

/// `handle_answer` (§4.7.4).
async fn handle_answer(
    ctx: &ResolverContext,
    qname: &str,
    qtype: DNSResourceType,
    reply: &DNSPacket,
    visited: &mut HashSet<(String, String)>,
    cname_depth: u8,
) -> ResolveOutcome {
    let direct: Vec<DNSResource> = reply
        .answers
        .iter()
        .filter(|r| r.rtype == qtype && labels_to_name(&r.labels).eq_ignore_ascii_case(qname))
        .cloned()
        .collect();

    let cname = reply
        .answers
        .iter()
        .find(|r| r.rtype == DNSResourceType::CNAME && labels_to_name(&r.labels).eq_ignore_ascii_case(qname));

    if direct.is_empty() {
        if let Some(cname_rr) = cname {
            if cname_depth >= MAX_CNAME_DEPTH {
                return ResolveOutcome {
                    rcode: ResponseCode::ServerFailure,
                    rrset: None,
                    context: Context::Failure,
                    state: ValidationState::Indeterminate,
                    error: Some(ResolverError::CnameExcessive { name: qname.to_string() }),
                    ede: None,
                };
            }
            let target = cname_rr
                .parsed_rdata
                .clone()
                .unwrap_or_else(|| labels_to_name(&cname_rr.labels));

            let mut chain = RRset::new(qname.to_string(), DNSResourceClass::IN, DNSResourceType::CNAME);
            chain.push(cname_rr.clone());

            let mut boxed = Box::pin(resolve_inner(
                ctx,
                CancellationToken::new(),
                &target,
                qtype,
                visited,
                cname_depth + 1,
            ));
            let mut inner = boxed.as_mut().await;
            if let Some(rrset) = &mut inner.rrset {
                rrset.rrsigs.extend(chain.rrsigs.clone());
            }
            return inner;
        }
    }

    let mut rrset = RRset::new(qname.to_string(), DNSResourceClass::IN, qtype);
    for r in &direct {
        rrset.push(r.clone());
    }
    for r in reply.answers.iter().filter(|r| r.rtype == DNSResourceType::RRSIG) {
        rrset.rrsigs.push(r.clone());
    }

    let (state, ede) = if rrset.rrsigs.is_empty() {
        (ValidationState::Insecure, None)
    } else {
        map_validation_result(ctx.validator.validate(reply).await)
    };

    let min_ttl = rrset.min_ttl().max(1);
    let prior = ctx.rrset_cache.get(qname, qtype).map(|e| e.state);
    if may_cache_answer(state, prior) {
        let cached = CachedRRset {
            rcode: ResponseCode::NoError,
            rrset: Some(rrset.clone()),
            neg_authority: None,
            context: Context::Answer,
            state,
            expiration: Instant::now() + Duration::from_secs(min_ttl as u64),
            ede: ede.clone(),
        };
        ctx.rrset_cache.set(qname, qtype, cached);
    }

    if matches!(qtype, DNSResourceType::SVCB | DNSResourceType::TSYNC) {
        apply_transport_signal_from_answer(ctx, qname, &direct, state);
    }

    if qtype == DNSResourceType::TLSA {
        let records: Vec<crate::tlsa::TlsaRecord> = direct
            .iter()
            .filter_map(|r| r.get_tlsa_fields())
            .filter_map(|(cert_usage, selector, matching_type, hex_data)| {
                hex::decode(&hex_data).ok().map(|data| crate::tlsa::TlsaRecord {
                    cert_usage,
                    selector,
                    matching_type,
                    data,
                })
            })
            .collect();
        if !records.is_empty() {
            ctx.tlsa.set(qname, records);
        }
    }

    ResolveOutcome {
        rcode: ResponseCode::NoError,
        rrset: Some(rrset),
        context: Context::Answer,
        state,
        error: None,
        ede,
    }
}

/// Per §4.10: a Bogus result only overwrites the RRset Cache if nothing was
/// cached yet or the prior entry was itself Bogus, so a Secure answer
/// already on file can't be clobbered by a later spoofed/broken reply.
/// Maps a whole-packet `ValidationResult` to the `ValidationState`/EDE pair
/// stored on a `CachedRRset` (§4.10).
fn map_validation_result(
    result: crate::dnssec::ValidationResult,
) -> (ValidationState, Option<crate::model::ExtendedError>) {
    match result {
        crate::dnssec::ValidationResult::Secure => (ValidationState::Secure, None),
        crate::dnssec::ValidationResult::Insecure => (ValidationState::Insecure, None),
        crate::dnssec::ValidationResult::Bogus(reason) => (
            ValidationState::Bogus,
            Some(crate::model::ExtendedError { code: 6, text: Some(reason) }),
        ),
        crate::dnssec::ValidationResult::Indeterminate => (ValidationState::Indeterminate, None),
    }
}

fn may_cache_answer(state: ValidationState, prior: Option<ValidationState>) -> bool {
    match state {
        ValidationState::Bogus => matches!(prior, None | Some(ValidationState::Bogus)),
        _ => true,
    }
}

/// Applies an SVCB/TSYNC answer's transport signal to every `AuthServer`
/// named `ns_name`, promoting `conn_mode` to at least Opportunistic, or to
/// Validated when the answer itself validated Secure (§4.9).
fn apply_transport_signal_from_answer(
    ctx: &ResolverContext,
    owner: &str,
    records: &[DNSResource],
    state: ValidationState,
) {
    if !ctx.config.use_transport_signals {
        return;
    }
    let ns_name = owner.strip_prefix("_dns.").unwrap_or(owner);
    let server = ctx.auth_servers.get_or_create(ns_name);
    let promote_to = if state == ValidationState::Secure {
        crate::model::ConnMode::Validated
    } else {
        crate::model::ConnMode::Opportunistic
    };
    for record in records {
        if record.rtype == DNSResourceType::TSYNC {
            if let Ok(text) = std::str::from_utf8(&record.rdata) {
                ctx.auth_servers.apply_transport_string(&server, text, promote_to);
            }
            continue;
        }
        if let Some(text) = &record.parsed_rdata {
            ctx.auth_servers.apply_transport_string(&server, text, promote_to);
        }
    }
}

/// `handle_referral` (§4.7.5), steps 1-6 and 9; step 8 (NS revalidation) runs
/// inline, gated on `revalidate_ns`, after the referral's own cache writes so
/// it never blocks or overrides them on failure. Step 7 (background address
/// probing for out-of-bailiwick NS) is not implemented: glue is still applied
/// via `parse_additional`, but no extra address query is issued when glue is
/// absent.
async fn handle_referral(
    ctx: &ResolverContext,
    qname: &str,
    reply: &DNSPacket,
    visited: &mut HashSet<(String, String)>,
) -> Result<Option<(Arc<Zone>, Vec<Arc<AuthServer>>)>> {
    let ns_records: Vec<&DNSResource> = reply
        .authorities
        .iter()
        .filter(|r| r.rtype == DNSResourceType::NS)
        .collect();
    if ns_records.is_empty() {
        return Ok(None);
    }

    let zone_name = labels_to_name(&ns_records[0].labels);
    let visit_key = (qname.to_string(), zone_name.clone());
    if !visited.insert(visit_key) {
        return Err(ResolverError::ReferralLoop { name: qname.to_string() });
    }

    let zone = ctx.zone_map.get_or_create(&zone_name);

    let rrsigs_present = reply.authorities.iter().any(|r| r.rtype == DNSResourceType::RRSIG);

    // Step 3: the NS RRset is only validated if the referral carries RRSIGs
    // covering it; otherwise its cached state is Indeterminate.
    let (referral_state, referral_ede) = if rrsigs_present {
        map_validation_result(ctx.validator.validate(reply).await)
    } else {
        (ValidationState::Indeterminate, None)
    };

    let mut ns_rrset = RRset::new(zone_name.clone(), DNSResourceClass::IN, DNSResourceType::NS);
    for r in &ns_records {
        ns_rrset.push((*r).clone());
    }
    if rrsigs_present {
        for r in reply.authorities.iter().filter(|r| r.rtype == DNSResourceType::RRSIG) {
            ns_rrset.rrsigs.push(r.clone());
        }
    }
    ctx.rrset_cache.set(
        &zone_name,
        DNSResourceType::NS,
        CachedRRset {
            rcode: ResponseCode::NoError,
            rrset: Some(ns_rrset),
            neg_authority: None,
            context: Context::Referral,
            state: referral_state,
            expiration: Instant::now() + Duration::from_secs(ns_records[0].ttl.max(1) as u64),
            ede: referral_ede.clone(),
        },
    );

    // Step 4: a signed DS RRset is validated and propagated into Zone.state;
    // step 5 otherwise approximates "parent proved the child unsigned" via
    // trust-anchor presence, since this implementation doesn't walk a full
    // NSEC closest-encloser proof (§4.6.2's Open Question resolution).
    let ds_records: Vec<&DNSResource> = reply.authorities.iter().filter(|r| r.rtype == DNSResourceType::DS).collect();
    if !ds_records.is_empty() && rrsigs_present {
        let mut ds_rrset = RRset::new(zone_name.clone(), DNSResourceClass::IN, DNSResourceType::DS);
        for r in &ds_records {
            ds_rrset.push((*r).clone());
        }
        for r in reply.authorities.iter().filter(|r| r.rtype == DNSResourceType::RRSIG) {
            ds_rrset.rrsigs.push(r.clone());
        }
        let min_ttl = ds_rrset.min_ttl().max(1);
        ctx.rrset_cache.set(
            &zone_name,
            DNSResourceType::DS,
            CachedRRset {
                rcode: ResponseCode::NoError,
                rrset: Some(ds_rrset),
                neg_authority: None,
                context: Context::Referral,
                state: referral_state,
                expiration: Instant::now() + Duration::from_secs(min_ttl as u64),
                ede: referral_ede,
            },
        );
        zone.set_state(referral_state);
    } else {
        let is_root_child = zone_name != "." && !zone_name.contains('.');
        let zone_state = if ctx.validator.has_trust_anchors() && !is_root_child {
            ValidationState::Insecure
        } else {
            ValidationState::Indeterminate
        };
        zone.set_state(zone_state);
    }

    let mut servers = Vec::new();
    for ns in &ns_records {
        let hostname = ns
            .parsed_rdata
            .clone()
            .unwrap_or_else(|| labels_to_name(&ns.labels));
        let server = ctx.auth_servers.get_or_create(&hostname);
        zone.add_ns_name(hostname.clone());
        servers.push(server);
    }

    parse_additional(ctx, reply, &servers);

    if ctx.config.revalidate_ns {
        revalidate_ns(ctx, &zone, &zone_name, &servers).await;
    }

    info!(zone = %zone_name, "followed referral");
    Ok(Some((zone, servers)))
}

/// §4.7.5 step 8: re-query the zone's NS set directly from up to 3 of the
/// just-followed referral servers. A successful, authoritative answer
/// overwrites the referral-sourced NS cache entry with `context = Answer`;
/// any failure leaves the existing entry untouched.
async fn revalidate_ns(ctx: &ResolverContext, zone: &Zone, zone_name: &str, servers: &[Arc<AuthServer>]) {
    for server in servers.iter().take(3) {
        let addresses = ctx.auth_servers.available_addresses(server, Some(zone));
        for addr in addresses {
            let transport = pick_transport(server, zone_name);
            let socket_addr = SocketAddr::new(addr, default_port(transport));
            let query = build_query(zone_name, DNSResourceType::NS);
            let timeout = ctx.config.timeout_for(transport);

            let reply = match ctx.wire.exchange(transport, socket_addr, &query, timeout).await {
                Ok(exchange) => exchange.reply,
                Err(_) => continue,
            };

            if classify_response(zone_name, &reply) != Classification::Answer {
                continue;
            }
            let ns_answers: Vec<&DNSResource> =
                reply.answers.iter().filter(|r| r.rtype == DNSResourceType::NS).collect();
            if ns_answers.is_empty() {
                continue;
            }

            let mut rrset = RRset::new(zone_name.to_string(), DNSResourceClass::IN, DNSResourceType::NS);
            for r in &ns_answers {
                rrset.push((*r).clone());
            }
            let rrsigs_present = reply.answers.iter().any(|r| r.rtype == DNSResourceType::RRSIG);
            let (state, ede) = if rrsigs_present {
                for r in reply.answers.iter().filter(|r| r.rtype == DNSResourceType::RRSIG) {
                    rrset.rrsigs.push(r.clone());
                }
                map_validation_result(ctx.validator.validate(&reply).await)
            } else {
                (ValidationState::Indeterminate, None)
            };
            let min_ttl = rrset.min_ttl().max(1);
            ctx.rrset_cache.set(
                zone_name,
                DNSResourceType::NS,
                CachedRRset {
                    rcode: ResponseCode::NoError,
                    rrset: Some(rrset),
                    neg_authority: None,
                    context: Context::Answer,
                    state,
                    expiration: Instant::now() + Duration::from_secs(min_ttl as u64),
                    ede,
                },
            );
            return;
        }
    }
}

/// `parse_additional` (§4.8): glue A/AAAA and transport signals.
fn parse_additional(ctx: &ResolverContext, reply: &DNSPacket, servers: &[Arc<AuthServer>]) {
    for record in &reply.resources {
        let owner = labels_to_name(&record.labels);
        let bare_owner = owner.strip_prefix("_dns.").unwrap_or(&owner);

        let matching_server = servers.iter().find(|s| s.name.eq_ignore_ascii_case(bare_owner));
        let Some(server) = matching_server else { continue };

        match record.rtype {
            DNSResourceType::A | DNSResourceType::AAAA if !owner.starts_with("_dns.") => {
                if let Some(ip) = record.parsed_rdata.as_deref().and_then(|s| s.parse::<IpAddr>().ok()) {
                    server.add_addr(ip);
                }
            }
            DNSResourceType::SVCB if ctx.config.use_transport_signals => {
                if let Some(text) = &record.parsed_rdata {
                    ctx.auth_servers
                        .apply_transport_string(server, text, crate::model::ConnMode::Opportunistic);
                }
            }
            DNSResourceType::TSYNC if ctx.config.use_transport_signals => {
                if let Ok(text) = std::str::from_utf8(&record.rdata) {
                    ctx.auth_servers
                        .apply_transport_string(server, text, crate::model::ConnMode::Opportunistic);
                }
            }
            _ => {}
        }
    }
}

/// `handle_negative` (§4.7.6).
async fn handle_negative(
    ctx: &ResolverContext,
    qname: &str,
    qtype: DNSResourceType,
    reply: &DNSPacket,
    classification: Classification,
) -> ResolveOutcome {
    let soa = reply.authorities.iter().find(|r| r.rtype == DNSResourceType::SOA);

    let ttl = soa
        .and_then(|s| s.get_soa_minimum().map(|min| min.min(s.ttl)))
        .unwrap_or(MIN_NEGATIVE_TTL)
        .max(MIN_NEGATIVE_TTL);

    let negative = crate::dnssec::validate_negative(&ctx.validator, reply).await;

    let mut neg_authority = Vec::new();
    if let Some(soa) = soa {
        let mut rrset = RRset::new(labels_to_name(&soa.labels), DNSResourceClass::IN, DNSResourceType::SOA);
        rrset.push(soa.clone());
        neg_authority.push(rrset);
    }

    let (context, rcode) = match classification {
        Classification::NegativeNxDomain => (Context::NXDomain, ResponseCode::NameError),
        _ => (Context::NoErrNoAns, ResponseCode::NoError),
    };

    let prior = ctx.rrset_cache.get(qname, qtype).map(|e| e.state);
    if may_cache_answer(negative.state, prior) {
        ctx.rrset_cache.set(
            qname,
            qtype,
            CachedRRset {
                rcode,
                rrset: None,
                neg_authority: Some(neg_authority),
                context,
                state: negative.state,
                expiration: Instant::now() + Duration::from_secs(ttl as u64),
                ede: negative.ede.clone(),
            },
        );
    }

    if let Some(soa) = soa {
        let soa_name = labels_to_name(&soa.labels);
        let soa_prior = ctx.rrset_cache.get(&soa_name, DNSResourceType::SOA).map(|e| e.state);
        if may_cache_answer(negative.state, soa_prior) {
            let mut soa_rrset = RRset::new(soa_name.clone(), DNSResourceClass::IN, DNSResourceType::SOA);
            soa_rrset.push(soa.clone());
            ctx.rrset_cache.set(
                &soa_name,
                DNSResourceType::SOA,
                CachedRRset {
                    rcode: ResponseCode::NoError,
                    rrset: Some(soa_rrset),
                    neg_authority: None,
                    context: Context::Answer,
                    state: negative.state,
                    expiration: Instant::now() + Duration::from_secs(soa.ttl.max(1) as u64),
                    ede: None,
                },
            );
        }
    }

    debug!(%qname, ?context, "cached negative response");

    ResolveOutcome {
        rcode,
        rrset: None,
        context,
        state: negative.state,
        error: None,
        ede: negative.ede,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::dnssec::TrustAnchorStore;
    use crate::model::Source;

    fn resolver() -> ResolverContext {
        ResolverContext::new(ResolverConfig::default(), Arc::new(TrustAnchorStore::new()))
    }

    fn ns(owner: &str, target: &str) -> DNSResource {
        DNSResource {
            labels: owner.split('.').map(String::from).collect(),
            rtype: DNSResourceType::NS,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdlength: 0,
            rdata: vec![],
            parsed_rdata: Some(target.to_string()),
            raw_class: None,
        }
    }

    #[test]
    fn pick_transport_is_deterministic_for_fixed_inputs() {
        let server = AuthServer::new("ns1.example.com".into(), Source::Referral);
        server.apply_transport_signal(
            vec![Transport::Do53, Transport::DoT],
            [(Transport::Do53, 50u8), (Transport::DoT, 50u8)].into_iter().collect(),
            crate::model::ConnMode::Opportunistic,
        );
        let a = pick_transport(&server, "www.example.com");
        let b = pick_transport(&server, "www.example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn pick_transport_falls_back_to_do53_with_no_weights() {
        let server = AuthServer::new("ns1.example.com".into(), Source::Referral);
        assert_eq!(pick_transport(&server, "www.example.com"), Transport::Do53);
    }

    #[test]
    fn build_query_sets_edns_and_single_question() {
        let packet = build_query("www.example.com", DNSResourceType::A);
        assert_eq!(packet.questions.len(), 1);
        assert_eq!(packet.questions[0].labels, vec!["www", "example", "com"]);
        assert!(!packet.header.rd);
        assert!(packet.edns.is_some());
    }

    #[test]
    fn labels_to_name_empty_is_root() {
        assert_eq!(labels_to_name(&[]), ".");
    }

    #[test]
    fn bogus_does_not_overwrite_a_secure_entry() {
        assert!(!may_cache_answer(ValidationState::Bogus, Some(ValidationState::Secure)));
    }

    #[test]
    fn bogus_overwrites_a_prior_bogus_or_absent_entry() {
        assert!(may_cache_answer(ValidationState::Bogus, Some(ValidationState::Bogus)));
        assert!(may_cache_answer(ValidationState::Bogus, None));
    }

    #[test]
    fn non_bogus_states_always_cache() {
        assert!(may_cache_answer(ValidationState::Secure, Some(ValidationState::Bogus)));
        assert!(may_cache_answer(ValidationState::Insecure, None));
    }

    #[tokio::test]
    async fn handle_referral_populates_zone_map_once() {
        let ctx = resolver();
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.authorities.push(ns("example.com", "a.iana-servers.net"));

        let mut visited = HashSet::new();
        let result = handle_referral(&ctx, "www.example.com", &reply, &mut visited)
            .await
            .expect("first referral should succeed")
            .expect("referral should yield a zone");
        assert_eq!(result.0.name, "example.com");
        assert!(ctx.zone_map.get("example.com").is_some());
    }

    #[tokio::test]
    async fn handle_referral_detects_loop_on_repeat_visit() {
        let ctx = resolver();
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.authorities.push(ns("example.com", "a.iana-servers.net"));

        let mut visited = HashSet::new();
        handle_referral(&ctx, "www.example.com", &reply, &mut visited)
            .await
            .expect("first referral should succeed");
        let err = handle_referral(&ctx, "www.example.com", &reply, &mut visited)
            .await
            .expect_err("repeated (qname, zone) visit should be a loop");
        assert!(matches!(err, ResolverError::ReferralLoop { .. }));
    }

    #[tokio::test]
    async fn handle_referral_leaves_referral_ns_entry_when_revalidate_ns_has_no_addresses() {
        let mut config = ResolverConfig::default();
        config.revalidate_ns = true;
        let ctx = ResolverContext::new(config, Arc::new(TrustAnchorStore::new()));
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.authorities.push(ns("example.com", "a.iana-servers.net"));

        let mut visited = HashSet::new();
        handle_referral(&ctx, "www.example.com", &reply, &mut visited)
            .await
            .expect("referral should succeed")
            .expect("referral should yield a zone");

        let cached = ctx.rrset_cache.get("example.com", DNSResourceType::NS).unwrap();
        assert_eq!(cached.context, Context::Referral);
    }

    #[tokio::test]
    async fn handle_referral_without_ds_marks_deep_zone_insecure() {
        let ctx = resolver();
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.authorities.push(ns("example.org", "ns1.example.org"));

        let mut visited = HashSet::new();
        let (zone, _) = handle_referral(&ctx, "www.example.org", &reply, &mut visited)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(zone.state(), ValidationState::Insecure);
        assert_eq!(
            ctx.rrset_cache.get("example.org", DNSResourceType::NS).unwrap().state,
            ValidationState::Indeterminate
        );
    }

    #[tokio::test]
    async fn handle_referral_without_ds_keeps_root_child_indeterminate() {
        let ctx = resolver();
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.authorities.push(ns("org", "a0.org.afilias-nst.info"));

        let mut visited = HashSet::new();
        let (zone, _) = handle_referral(&ctx, "www.example.org", &reply, &mut visited)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(zone.state(), ValidationState::Indeterminate);
    }

    fn rrsig(owner: &str, type_covered: u16, sig_expiration: u32) -> DNSResource {
        let mut rdata = type_covered.to_be_bytes().to_vec();
        rdata.push(8); // algorithm
        rdata.push(1); // labels
        rdata.extend(3600u32.to_be_bytes()); // original_ttl
        rdata.extend(sig_expiration.to_be_bytes());
        rdata.extend(0u32.to_be_bytes()); // sig_inception
        rdata.extend(0u16.to_be_bytes()); // key_tag
        rdata.push(0); // signer name: root
        rdata.extend([0xAA; 16]); // signature (garbage)

        DNSResource {
            labels: owner.split('.').map(String::from).collect(),
            rtype: DNSResourceType::RRSIG,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdlength: rdata.len() as u16,
            rdata,
            parsed_rdata: None,
            raw_class: None,
        }
    }

    fn ds(owner: &str) -> DNSResource {
        DNSResource {
            labels: owner.split('.').map(String::from).collect(),
            rtype: DNSResourceType::DS,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdlength: 0,
            rdata: vec![],
            parsed_rdata: None,
            raw_class: None,
        }
    }

    #[tokio::test]
    async fn handle_referral_with_expired_ds_signature_marks_zone_bogus() {
        let ctx = resolver();
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.authorities.push(ns("example.org", "ns1.example.org"));
        reply.authorities.push(ds("example.org"));
        reply.authorities.push(rrsig("example.org", 2, 1)); // covers NS, expired
        reply.authorities.push(rrsig("example.org", 43, 1)); // covers DS, expired

        let mut visited = HashSet::new();
        let (zone, _) = handle_referral(&ctx, "www.example.org", &reply, &mut visited)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(zone.state(), ValidationState::Bogus);
        let ds_entry = ctx.rrset_cache.get("example.org", DNSResourceType::DS).unwrap();
        assert_eq!(ds_entry.state, ValidationState::Bogus);
        assert_eq!(ds_entry.context, Context::Referral);
    }

    fn tlsa(owner: &str) -> DNSResource {
        DNSResource {
            labels: owner.split('.').map(String::from).collect(),
            rtype: DNSResourceType::TLSA,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdlength: 0,
            rdata: vec![],
            parsed_rdata: Some("3 1 1 abcd".to_string()),
            raw_class: None,
        }
    }

    #[tokio::test]
    async fn handle_answer_stores_tlsa_records_in_the_tlsa_store() {
        let ctx = resolver();
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.answers.push(tlsa("_853._tcp.ns1.example.com"));

        let mut visited = HashSet::new();
        let outcome = handle_answer(
            &ctx,
            "_853._tcp.ns1.example.com",
            DNSResourceType::TLSA,
            &reply,
            &mut visited,
            0,
        )
        .await;
        assert_eq!(outcome.rcode, ResponseCode::NoError);
        let stored = ctx.tlsa.get("_853._tcp.ns1.example.com").expect("TLSA should be stored");
        assert_eq!(stored[0].cert_usage, 3);
        assert_eq!(stored[0].data, vec![0xab, 0xcd]);
    }

    fn tsync(owner: &str, value: &str) -> DNSResource {
        DNSResource {
            labels: owner.split('.').map(String::from).collect(),
            rtype: DNSResourceType::TSYNC,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdlength: value.len() as u16,
            rdata: value.as_bytes().to_vec(),
            parsed_rdata: None,
            raw_class: None,
        }
    }

    #[tokio::test]
    async fn handle_answer_applies_tsync_transport_signal() {
        let mut config = ResolverConfig::default();
        config.use_transport_signals = true;
        let ctx = ResolverContext::new(config, Arc::new(TrustAnchorStore::new()));
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.answers.push(tsync("ns1.example.com", "transport=doq=70,dot=30"));

        let mut visited = HashSet::new();
        handle_answer(&ctx, "ns1.example.com", DNSResourceType::TSYNC, &reply, &mut visited, 0).await;

        let server = ctx.auth_servers.get("ns1.example.com").expect("server should exist");
        assert!(server.transport_weight(Transport::DoQ) > 0);
        assert!(server.transport_weight(Transport::DoT) > 0);
    }

    #[tokio::test]
    async fn handle_answer_ignores_tsync_signal_when_disabled() {
        let ctx = resolver();
        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.answers.push(tsync("ns1.example.com", "transport=doq=70,dot=30"));

        let mut visited = HashSet::new();
        handle_answer(&ctx, "ns1.example.com", DNSResourceType::TSYNC, &reply, &mut visited, 0).await;

        let server = ctx.auth_servers.get_or_create("ns1.example.com");
        assert_eq!(server.transport_weight(Transport::DoQ), 0);
        assert_eq!(server.transport_weight(Transport::DoT), 0);
    }
}
