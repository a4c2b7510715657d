use bitstream_io::{BigEndian, BitReader, BitWriter};

use super::{
    ParseError,
    common::PacketComponent,
    edns::EdnsOpt,
    enums::DNSResourceType,
    header::DNSHeader,
    question::DNSQuestion,
    resource::DNSResource,
};

/// A full, owned DNS message: header, question section, and the three
/// resource record sections. The EDNS0 OPT pseudo-record, if present in the
/// additional section, is split out into `edns` rather than kept in
/// `resources`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    pub edns: Option<EdnsOpt>,
}

impl DNSPacket {
    pub fn new(header: DNSHeader) -> Self {
        Self {
            header,
            ..Default::default()
        }
    }

    /// Parse a full wire-format message, following compression pointers
    /// against the whole buffer.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < 12 {
            return Err(ParseError::InvalidHeader);
        }

        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut header = DNSHeader::default();
        header.read(&mut reader)?;

        let mut questions = Vec::with_capacity(header.qdcount as usize);
        for _ in 0..header.qdcount {
            let mut q = DNSQuestion::default();
            q.read_with_buffer(&mut reader, buf)?;
            questions.push(q);
        }

        let mut answers = Vec::with_capacity(header.ancount as usize);
        for _ in 0..header.ancount {
            let mut r = DNSResource::default();
            r.read_with_buffer(&mut reader, buf)?;
            answers.push(r);
        }

        let mut authorities = Vec::with_capacity(header.nscount as usize);
        for _ in 0..header.nscount {
            let mut r = DNSResource::default();
            r.read_with_buffer(&mut reader, buf)?;
            authorities.push(r);
        }

        let mut resources = Vec::with_capacity(header.arcount as usize);
        for _ in 0..header.arcount {
            let mut r = DNSResource::default();
            r.read_with_buffer(&mut reader, buf)?;
            resources.push(r);
        }

        let mut edns = None;
        if let Some(pos) = resources.iter().position(|r| r.rtype == DNSResourceType::OPT) {
            let opt_rr = resources.remove(pos);
            let raw_class = opt_rr.raw_class.unwrap_or(0);
            edns = EdnsOpt::parse_from_resource(raw_class, opt_rr.ttl, &opt_rr.rdata).ok();
        }

        Ok(Self {
            header,
            questions,
            answers,
            authorities,
            resources,
            edns,
        })
    }

    /// Serialize back to wire format, recomputing section counts and
    /// re-attaching the EDNS0 OPT record to the additional section.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.resources.len() as u16 + self.edns.is_some() as u16;

        let mut buf = Vec::new();
        {
            let mut writer = BitWriter::<_, BigEndian>::new(&mut buf);
            header.write(&mut writer)?;
            for q in &self.questions {
                q.write(&mut writer)?;
            }
            for r in &self.answers {
                r.write(&mut writer)?;
            }
            for r in &self.authorities {
                r.write(&mut writer)?;
            }
            for r in &self.resources {
                r.write(&mut writer)?;
            }
            if let Some(edns) = &self.edns {
                let (class, ttl, rdata) = edns.to_resource_format();
                let opt = DNSResource {
                    labels: Vec::new(),
                    rtype: DNSResourceType::OPT,
                    rclass: class.into(),
                    ttl,
                    rdlength: rdata.len() as u16,
                    rdata,
                    parsed_rdata: None,
                    raw_class: Some(class),
                };
                opt.write(&mut writer)?;
            }
        }

        Ok(buf)
    }

    /// Whether the query carried an EDNS0 OPT record.
    pub fn supports_edns(&self) -> bool {
        self.edns.is_some()
    }

    /// Advertised UDP payload size, or the RFC 1035 default if EDNS is absent.
    pub fn max_udp_payload_size(&self) -> u16 {
        self.edns.as_ref().map(|e| e.payload_size()).unwrap_or(512)
    }

    /// Attach an EDNS0 OPT record with the given payload size and DO bit.
    pub fn add_edns(&mut self, payload_size: u16, do_bit: bool) {
        let mut edns = EdnsOpt::with_payload_size(payload_size);
        edns.set_do_flag(do_bit);
        self.edns = Some(edns);
    }

    pub fn update_counts(&mut self) {
        self.header.qdcount = self.questions.len() as u16;
        self.header.ancount = self.answers.len() as u16;
        self.header.nscount = self.authorities.len() as u16;
        self.header.arcount = self.resources.len() as u16 + self.edns.is_some() as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::DNSResourceClass;

    fn sample_query() -> DNSPacket {
        let mut header = DNSHeader::default();
        header.id = 0x1234;
        header.rd = true;
        header.qdcount = 1;
        let mut packet = DNSPacket::new(header);
        packet.questions.push(DNSQuestion {
            labels: vec!["example".into(), "com".into()],
            qtype: DNSResourceType::A,
            qclass: DNSResourceClass::IN,
        });
        packet
    }

    #[test]
    fn round_trips_a_query() {
        let packet = sample_query();
        let bytes = packet.serialize().unwrap();
        let parsed = DNSPacket::parse(&bytes).unwrap();
        assert_eq!(parsed.header.id, 0x1234);
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].labels, vec!["example", "com"]);
    }

    #[test]
    fn edns_round_trips_with_do_bit() {
        let mut packet = sample_query();
        packet.add_edns(4096, true);
        let bytes = packet.serialize().unwrap();
        let parsed = DNSPacket::parse(&bytes).unwrap();
        let edns = parsed.edns.expect("edns should survive round trip");
        assert_eq!(edns.payload_size(), 4096);
        assert!(edns.do_flag());
        assert!(parsed.resources.is_empty());
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            DNSPacket::parse(&[0u8; 4]),
            Err(ParseError::InvalidHeader)
        ));
    }
}
