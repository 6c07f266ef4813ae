use nom::number::complete::be_u32;
use nom::IResult;

use super::{Extension, Extensions};
use crate::codec::{opaque16, opaque8, parse_exact, put_opaque16, put_opaque8, put_u32, verify};
use crate::types::ProtocolVersion;
use crate::Error;

/// NewSessionTicket of RFC 5077, used up to TLS 1.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T12NewSessionTicket {
    pub lifetime_hint: u32,
    pub ticket: Vec<u8>,
}

impl T12NewSessionTicket {
    pub fn parse(input: &[u8]) -> IResult<&[u8], T12NewSessionTicket> {
        let (input, lifetime_hint) = be_u32(input)?;
        let (input, ticket) = opaque16(input)?;
        Ok((
            input,
            T12NewSessionTicket {
                lifetime_hint,
                ticket: ticket.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        put_u32(out, self.lifetime_hint);
        put_opaque16(out, &self.ticket);
    }
}

/// NewSessionTicket of TLS 1.3 (RFC 8446 4.6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T13NewSessionTicket {
    pub lifetime: u32,
    pub age_add: u32,
    pub nonce: Vec<u8>,
    pub ticket: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl T13NewSessionTicket {
    pub fn parse(input: &[u8]) -> IResult<&[u8], T13NewSessionTicket> {
        let (input, lifetime) = be_u32(input)?;
        let (input, age_add) = be_u32(input)?;
        let (input, nonce) = opaque8(input)?;
        let (input, ticket) = opaque16(input)?;
        verify(input, !ticket.is_empty())?;
        let (input, extensions) = Extensions::parse(input)?;
        Ok((
            input,
            T13NewSessionTicket {
                lifetime,
                age_add,
                nonce: nonce.to_vec(),
                ticket: ticket.to_vec(),
                extensions,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        put_u32(out, self.lifetime);
        put_u32(out, self.age_add);
        put_opaque8(out, &self.nonce);
        put_opaque16(out, &self.ticket);
        Extensions::serialize(&self.extensions, out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewSessionTicket {
    T12(T12NewSessionTicket),
    T13(T13NewSessionTicket),
}

impl NewSessionTicket {
    pub fn decode(body: &[u8], version: ProtocolVersion) -> Result<NewSessionTicket, Error> {
        if version.use_tls13_plus() {
            parse_exact(body, T13NewSessionTicket::parse).map(NewSessionTicket::T13)
        } else {
            parse_exact(body, T12NewSessionTicket::parse).map(NewSessionTicket::T12)
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            NewSessionTicket::T12(m) => m.serialize(out),
            NewSessionTicket::T13(m) => m.serialize(out),
        }
    }

    /// Encoded size of the body.
    pub fn message_length(&self) -> usize {
        match self {
            NewSessionTicket::T12(m) => 4 + 2 + m.ticket.len(),
            NewSessionTicket::T13(m) => {
                4 + 4 + 1 + m.nonce.len() + 2 + m.ticket.len() + Extensions::length(&m.extensions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::arbitrary;

    const T12_MESSAGE: &[u8] = &[
        0x00, 0x00, 0x1C, 0x20, // lifetime 7200
        0x00, 0x03, 0x01, 0x02, 0x03, // ticket
    ];

    const T13_MESSAGE: &[u8] = &[
        0x00, 0x00, 0x1C, 0x20, // lifetime 7200
        0x12, 0x34, 0x56, 0x78, // age_add
        0x01, 0x00, // nonce
        0x00, 0x02, 0xAA, 0xBB, // ticket
        0x00, 0x00, // no extensions
    ];

    #[test]
    fn roundtrips() {
        let m = NewSessionTicket::decode(T12_MESSAGE, ProtocolVersion::TLS1_2).unwrap();
        let NewSessionTicket::T12(t) = &m else {
            panic!("wrong layout");
        };
        assert_eq!(t.lifetime_hint, 7200);
        let mut out = Vec::new();
        m.serialize(&mut out);
        assert_eq!(out, T12_MESSAGE);

        let m = NewSessionTicket::decode(T13_MESSAGE, ProtocolVersion::TLS1_3).unwrap();
        let NewSessionTicket::T13(t) = &m else {
            panic!("wrong layout");
        };
        assert_eq!(t.age_add, 0x12345678);
        assert_eq!(t.nonce, vec![0]);
        let mut out = Vec::new();
        m.serialize(&mut out);
        assert_eq!(out, T13_MESSAGE);
    }

    #[test]
    fn randomized_roundtrip() {
        let mut rng = arbitrary::rng(0x57);
        for _ in 0..arbitrary::ROUNDS {
            let t12 = NewSessionTicket::T12(T12NewSessionTicket {
                lifetime_hint: rng.random(),
                ticket: arbitrary::bytes(&mut rng, 0..=160),
            });
            let t13 = NewSessionTicket::T13(T13NewSessionTicket {
                lifetime: rng.random(),
                age_add: rng.random(),
                nonce: arbitrary::bytes(&mut rng, 0..=16),
                ticket: arbitrary::bytes(&mut rng, 1..=160),
                extensions: arbitrary::extensions(&mut rng),
            });

            for (m, v) in [(t12, ProtocolVersion::TLS1_1), (t13, ProtocolVersion::TLS1_3)] {
                let mut out = Vec::new();
                m.serialize(&mut out);
                assert_eq!(m.message_length(), out.len());
                assert_eq!(NewSessionTicket::decode(&out, v).unwrap(), m);
            }
        }
    }

    #[test]
    fn empty_tls13_ticket_refused() {
        let m: &[u8] = &[0, 0, 0, 1, 0, 0, 0, 0, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(NewSessionTicket::decode(m, ProtocolVersion::TLS1_3).is_err());
    }

    #[test]
    fn length_exactness() {
        for (m, v) in [
            (T12_MESSAGE, ProtocolVersion::TLS1_2),
            (T13_MESSAGE, ProtocolVersion::TLS1_3),
        ] {
            assert!(NewSessionTicket::decode(&m[..m.len() - 1], v).is_err());
            let mut longer = m.to_vec();
            longer.push(0);
            assert!(NewSessionTicket::decode(&longer, v).is_err());
        }
    }
}
