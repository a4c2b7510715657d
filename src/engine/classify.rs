use crate::dns::DNSPacket;
use crate::dns::enums::{DNSResourceType, ResponseCode};

/// The shape of a reply, independent of transport (§4.7.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Answer,
    Referral,
    NegativeNoData,
    NegativeNxDomain,
    Error,
    Unknown,
}

fn is_ancestor_or_equal(owner: &str, qname: &str) -> bool {
    let owner = owner.trim_end_matches('.').to_ascii_lowercase();
    let qname = qname.trim_end_matches('.').to_ascii_lowercase();
    qname == owner || qname.ends_with(&format!(".{owner}")) || owner.is_empty()
}

/// Classify a reply against the question that produced it (§4.7.3).
pub fn classify_response(qname: &str, msg: &DNSPacket) -> Classification {
    let rcode = ResponseCode::from_u8(msg.header.rcode);

    if !msg.answers.is_empty() {
        return Classification::Answer;
    }

    let soa = msg
        .authorities
        .iter()
        .find(|r| r.rtype == DNSResourceType::SOA);

    match rcode {
        ResponseCode::NameError => {
            if soa
                .map(|r| is_ancestor_or_equal(&r.labels.join("."), qname))
                .unwrap_or(false)
            {
                Classification::NegativeNxDomain
            } else {
                Classification::Error
            }
        }
        ResponseCode::NoError => {
            if let Some(soa) = soa {
                if is_ancestor_or_equal(&soa.labels.join("."), qname) {
                    return Classification::NegativeNoData;
                }
            }
            let has_ns = msg
                .authorities
                .iter()
                .any(|r| r.rtype == DNSResourceType::NS);
            if has_ns {
                Classification::Referral
            } else {
                Classification::Unknown
            }
        }
        _ => Classification::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::DNSResourceClass;
    use crate::dns::header::DNSHeader;
    use crate::dns::resource::DNSResource;

    fn packet(rcode: u8) -> DNSPacket {
        let mut header = DNSHeader::default();
        header.rcode = rcode;
        DNSPacket::new(header)
    }

    fn soa(owner: &str) -> DNSResource {
        DNSResource {
            labels: owner.split('.').map(String::from).collect(),
            rtype: DNSResourceType::SOA,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdlength: 0,
            rdata: vec![],
            parsed_rdata: None,
            raw_class: None,
        }
    }

    fn ns(owner: &str) -> DNSResource {
        DNSResource {
            labels: owner.split('.').map(String::from).collect(),
            rtype: DNSResourceType::NS,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdlength: 0,
            rdata: vec![],
            parsed_rdata: None,
            raw_class: None,
        }
    }

    #[test]
    fn nxdomain_with_ancestor_soa_is_negative_nxdomain() {
        let mut msg = packet(3);
        msg.authorities.push(soa("example.com"));
        assert_eq!(
            classify_response("www.example.com", &msg),
            Classification::NegativeNxDomain
        );
    }

    #[test]
    fn nxdomain_without_soa_is_error() {
        let msg = packet(3);
        assert_eq!(classify_response("www.example.com", &msg), Classification::Error);
    }

    #[test]
    fn noerror_empty_with_soa_is_nodata() {
        let mut msg = packet(0);
        msg.authorities.push(soa("example.com"));
        assert_eq!(
            classify_response("www.example.com", &msg),
            Classification::NegativeNoData
        );
    }

    #[test]
    fn noerror_empty_with_ns_only_is_referral() {
        let mut msg = packet(0);
        msg.authorities.push(ns("example.com"));
        assert_eq!(
            classify_response("www.example.com", &msg),
            Classification::Referral
        );
    }

    #[test]
    fn servfail_is_error() {
        let msg = packet(2);
        assert_eq!(classify_response("www.example.com", &msg), Classification::Error);
    }
}
