use nom::IResult;

use super::{Extension, Extensions};
use crate::codec::{list24, nested24, opaque24, opaque8, parse_exact, put_opaque24, put_opaque8};
use crate::types::ProtocolVersion;
use crate::Error;

/// Certificate up to TLS 1.2: a chain of DER certificates, leaf first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct T12Certificate {
    pub chain: Vec<Vec<u8>>,
}

impl T12Certificate {
    pub fn parse(input: &[u8]) -> IResult<&[u8], T12Certificate> {
        let (input, chain) = list24(input, |i| {
            let (i, cert) = opaque24(i)?;
            Ok((i, cert.to_vec()))
        })?;
        Ok((input, T12Certificate { chain }))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        nested24(out, |out| {
            for cert in &self.chain {
                put_opaque24(out, cert);
            }
        });
    }
}

/// One certificate of a TLS 1.3 chain, with its own extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    pub data: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl CertificateEntry {
    fn parse(input: &[u8]) -> IResult<&[u8], CertificateEntry> {
        let (input, data) = opaque24(input)?;
        let (input, extensions) = Extensions::parse(input)?;
        Ok((
            input,
            CertificateEntry {
                data: data.to_vec(),
                extensions,
            },
        ))
    }
}

/// Certificate in TLS 1.3 (RFC 8446 4.4.2).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct T13Certificate {
    /// Echo of the CertificateRequest context. Empty for the server.
    pub context: Vec<u8>,
    pub entries: Vec<CertificateEntry>,
}

impl T13Certificate {
    pub fn parse(input: &[u8]) -> IResult<&[u8], T13Certificate> {
        let (input, context) = opaque8(input)?;
        let (input, entries) = list24(input, CertificateEntry::parse)?;
        Ok((
            input,
            T13Certificate {
                context: context.to_vec(),
                entries,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        put_opaque8(out, &self.context);
        nested24(out, |out| {
            for e in &self.entries {
                put_opaque24(out, &e.data);
                Extensions::serialize(&e.extensions, out);
            }
        });
    }
}

/// Certificate message of either layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    T12(T12Certificate),
    T13(T13Certificate),
}

impl Certificate {
    pub fn decode(body: &[u8], version: ProtocolVersion) -> Result<Certificate, Error> {
        if version.use_tls13_plus() {
            parse_exact(body, T13Certificate::parse).map(Certificate::T13)
        } else {
            parse_exact(body, T12Certificate::parse).map(Certificate::T12)
        }
    }

    /// Build a message for `version` around `chain`.
    pub fn new(version: ProtocolVersion, context: &[u8], chain: &[Vec<u8>]) -> Certificate {
        if version.use_tls13_plus() {
            Certificate::T13(T13Certificate {
                context: context.to_vec(),
                entries: chain
                    .iter()
                    .map(|c| CertificateEntry {
                        data: c.clone(),
                        extensions: Vec::new(),
                    })
                    .collect(),
            })
        } else {
            Certificate::T12(T12Certificate {
                chain: chain.to_vec(),
            })
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            Certificate::T12(c) => c.serialize(out),
            Certificate::T13(c) => c.serialize(out),
        }
    }

    /// Encoded size of the body.
    pub fn message_length(&self) -> usize {
        match self {
            Certificate::T12(c) => 3 + c.chain.iter().map(|d| 3 + d.len()).sum::<usize>(),
            Certificate::T13(c) => {
                1 + c.context.len()
                    + 3
                    + c.entries
                        .iter()
                        .map(|e| 3 + e.data.len() + Extensions::length(&e.extensions))
                        .sum::<usize>()
            }
        }
    }

    /// The DER chain, leaf first.
    pub fn chain(&self) -> Vec<Vec<u8>> {
        match self {
            Certificate::T12(c) => c.chain.clone(),
            Certificate::T13(c) => c.entries.iter().map(|e| e.data.clone()).collect(),
        }
    }

    pub fn context(&self) -> &[u8] {
        match self {
            Certificate::T12(_) => &[],
            Certificate::T13(c) => &c.context,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Certificate::T12(c) => c.chain.is_empty(),
            Certificate::T13(c) => c.entries.is_empty(),
        }
    }
}
