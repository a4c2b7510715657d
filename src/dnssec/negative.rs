use crate::dns::DNSPacket;
use crate::dns::enums::DNSResourceType;
use crate::model::{ExtendedError, ValidationState};

use super::{DnsSecValidator, ValidationResult};

/// Outcome of validating a negative response (§4.6.2): the state to cache,
/// plus an EDE note when NSEC/NSEC3 records accompanied the response but
/// were not used to complete a closest-encloser proof.
pub struct NegativeValidation {
    pub state: ValidationState,
    pub ede: Option<ExtendedError>,
}

/// Validate a negative response (NXDOMAIN or NOERROR/NODATA). The SOA RRset
/// (and its RRSIG) must already be present in `packet`'s authority section,
/// alongside any NSEC/NSEC3 records the server returned.
///
/// This implementation takes the SOA-sufficiency path recorded in
/// DESIGN.md: an authenticated SOA alone is enough to mark the entry Secure.
/// NSEC/NSEC3 closest-encloser proofs are not synthesized or required; their
/// presence without being used to complete a proof is merely noted via EDE.
pub async fn validate_negative(validator: &DnsSecValidator, packet: &DNSPacket) -> NegativeValidation {
    let has_soa = packet
        .authorities
        .iter()
        .any(|r| r.rtype == DNSResourceType::SOA);
    if !has_soa {
        return NegativeValidation {
            state: ValidationState::Indeterminate,
            ede: None,
        };
    }

    let has_nsec = packet.authorities.iter().any(|r| {
        matches!(r.rtype, DNSResourceType::NSEC | DNSResourceType::NSEC3)
    });

    match validator.validate(packet).await {
        ValidationResult::Secure => NegativeValidation {
            state: ValidationState::Secure,
            ede: has_nsec.then(|| ExtendedError {
                code: 9, // RFC 8914 DNSSEC Indeterminate-ish: "unsupported DNSSEC mechanism"
                text: Some(
                    "NSEC/NSEC3 closest-encloser proof not evaluated; SOA authentication used instead"
                        .to_string(),
                ),
            }),
        },
        ValidationResult::Insecure => NegativeValidation {
            state: ValidationState::Insecure,
            ede: None,
        },
        ValidationResult::Bogus(reason) => NegativeValidation {
            state: ValidationState::Bogus,
            ede: Some(ExtendedError {
                code: 6, // RFC 8914: DNSSEC Bogus
                text: Some(reason),
            }),
        },
        ValidationResult::Indeterminate => NegativeValidation {
            state: ValidationState::Indeterminate,
            ede: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::header::DNSHeader;
    use crate::dnssec::TrustAnchorStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn no_soa_is_indeterminate() {
        let validator = DnsSecValidator::new(
            Arc::new(TrustAnchorStore::new()),
            Arc::new(crate::cache::DnskeyCache::new()),
        );
        let packet = DNSPacket::new(DNSHeader::default());
        let result = validate_negative(&validator, &packet).await;
        assert_eq!(result.state, ValidationState::Indeterminate);
        assert!(result.ede.is_none());
    }
}
