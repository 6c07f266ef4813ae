//! CertificateRequest in its three layouts.
//!
//! TLS 1.0 and 1.1 (and SSL 3.0) carry certificate types and authorities.
//! TLS 1.2 inserts the signature scheme list between them. TLS 1.3 replaces
//! everything with a context and an extension block. The three are distinct
//! types; [`CertificateRequest::decode`] picks one by version.

use nom::IResult;

use super::{Extension, Extensions};
use crate::codec::{list16, list8, nested16, nested8, opaque16, opaque8};
use crate::codec::{parse_exact, put_opaque16, put_opaque8};
use crate::types::{ClientCertificateType, ProtocolVersion, SignatureScheme};
use crate::types::{PROTOCOLS_OF_12, PROTOCOLS_OF_13, PROTOCOLS_TO_11};
use crate::Error;

fn authority(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (input, dn) = opaque16(input)?;
    Ok((input, dn.to_vec()))
}

fn put_authorities(out: &mut Vec<u8>, authorities: &[Vec<u8>]) {
    nested16(out, |out| {
        for dn in authorities {
            put_opaque16(out, dn);
        }
    });
}

fn put_cert_types(out: &mut Vec<u8>, types: &[ClientCertificateType]) {
    nested8(out, |out| {
        for t in types {
            out.push(t.as_u8());
        }
    });
}

/// CertificateRequest of SSL 3.0, TLS 1.0 and TLS 1.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T10CertificateRequest {
    pub cert_types: Vec<ClientCertificateType>,
    /// DER distinguished names in wire order.
    pub authorities: Vec<Vec<u8>>,
}

impl T10CertificateRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], T10CertificateRequest> {
        let (input, cert_types) = list8(input, ClientCertificateType::parse)?;
        let (input, authorities) = list16(input, authority)?;
        Ok((
            input,
            T10CertificateRequest {
                cert_types,
                authorities,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        put_cert_types(out, &self.cert_types);
        put_authorities(out, &self.authorities);
    }
}

/// CertificateRequest of TLS 1.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T12CertificateRequest {
    pub cert_types: Vec<ClientCertificateType>,
    pub signature_schemes: Vec<SignatureScheme>,
    pub authorities: Vec<Vec<u8>>,
}

impl T12CertificateRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], T12CertificateRequest> {
        let (input, cert_types) = list8(input, ClientCertificateType::parse)?;
        let (input, signature_schemes) = list16(input, SignatureScheme::parse)?;
        let (input, authorities) = list16(input, authority)?;
        Ok((
            input,
            T12CertificateRequest {
                cert_types,
                signature_schemes,
                authorities,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        put_cert_types(out, &self.cert_types);
        nested16(out, |out| {
            for s in &self.signature_schemes {
                s.serialize(out);
            }
        });
        put_authorities(out, &self.authorities);
    }
}

/// CertificateRequest of TLS 1.3. Schemes and authorities travel as extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T13CertificateRequest {
    pub context: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl T13CertificateRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], T13CertificateRequest> {
        let (input, context) = opaque8(input)?;
        let (input, extensions) = Extensions::parse(input)?;
        Ok((
            input,
            T13CertificateRequest {
                context: context.to_vec(),
                extensions,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        put_opaque8(out, &self.context);
        Extensions::serialize(&self.extensions, out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateRequest {
    T10(T10CertificateRequest),
    T12(T12CertificateRequest),
    T13(T13CertificateRequest),
}

type Decoder = fn(&[u8]) -> Result<CertificateRequest, Error>;

fn decode_t10(body: &[u8]) -> Result<CertificateRequest, Error> {
    parse_exact(body, T10CertificateRequest::parse).map(CertificateRequest::T10)
}

fn decode_t12(body: &[u8]) -> Result<CertificateRequest, Error> {
    parse_exact(body, T12CertificateRequest::parse).map(CertificateRequest::T12)
}

fn decode_t13(body: &[u8]) -> Result<CertificateRequest, Error> {
    parse_exact(body, T13CertificateRequest::parse).map(CertificateRequest::T13)
}

const DECODERS: &[(&[ProtocolVersion], Decoder)] = &[
    (PROTOCOLS_TO_11, decode_t10),
    (PROTOCOLS_OF_12, decode_t12),
    (PROTOCOLS_OF_13, decode_t13),
];

impl CertificateRequest {
    pub fn decode(body: &[u8], version: ProtocolVersion) -> Result<CertificateRequest, Error> {
        let (_, decoder) = DECODERS
            .iter()
            .find(|(versions, _)| versions.contains(&version))
            .ok_or_else(|| Error::internal(format!("No CertificateRequest layout for {}", version)))?;
        decoder(body)
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            CertificateRequest::T10(m) => m.serialize(out),
            CertificateRequest::T12(m) => m.serialize(out),
            CertificateRequest::T13(m) => m.serialize(out),
        }
    }

    /// Encoded size of the body.
    pub fn message_length(&self) -> usize {
        match self {
            CertificateRequest::T10(m) => {
                1 + m.cert_types.len() + 2 + m.authorities.iter().map(|a| 2 + a.len()).sum::<usize>()
            }
            CertificateRequest::T12(m) => {
                1 + m.cert_types.len()
                    + 2
                    + 2 * m.signature_schemes.len()
                    + 2
                    + m.authorities.iter().map(|a| 2 + a.len()).sum::<usize>()
            }
            CertificateRequest::T13(m) => 1 + m.context.len() + Extensions::length(&m.extensions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::arbitrary;
    use crate::rng::SeededRng;
    use crate::types::ExtensionType;

    const DN: [u8; 20] = [
        0x30, 0x12, 0x31, 0x10, 0x30, 0x0E, 0x06, 0x03, 0x55, 0x04, 0x03, 0x0C, 0x07, 0x54, 0x65,
        0x73, 0x74, 0x20, 0x43, 0x41,
    ];

    const T12_MESSAGE: &[u8] = &[
        0x02, 0x01, 0x40, // rsa_sign, ecdsa_sign
        0x00, 0x04, 0x04, 0x01, 0x04, 0x03, // rsa_pkcs1_sha256, ecdsa_secp256r1_sha256
        0x00, 0x16, // authorities
        0x00, 0x14, // one 20 byte DN
        0x30, 0x12, 0x31, 0x10, 0x30, 0x0E, 0x06, 0x03, 0x55, 0x04, 0x03, 0x0C, 0x07, 0x54, 0x65,
        0x73, 0x74, 0x20, 0x43, 0x41,
    ];

    const T10_MESSAGE: &[u8] = &[
        0x01, 0x01, // rsa_sign
        0x00, 0x00, // no authorities
    ];

    const T13_MESSAGE: &[u8] = &[
        0x00, // empty context
        0x00, 0x08, // extensions
        0x00, 0x0D, 0x00, 0x04, 0x00, 0x02, 0x04, 0x03, // signature_algorithms
    ];

    #[test]
    fn t12_roundtrip() {
        let req = CertificateRequest::T12(T12CertificateRequest {
            cert_types: vec![ClientCertificateType::RsaSign, ClientCertificateType::EcdsaSign],
            signature_schemes: vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::ECDSA_SECP256R1_SHA256,
            ],
            authorities: vec![DN.to_vec()],
        });

        let mut out = Vec::new();
        req.serialize(&mut out);
        assert_eq!(out, T12_MESSAGE);
        assert_eq!(req.message_length(), out.len());

        let decoded = CertificateRequest::decode(&out, ProtocolVersion::TLS1_2).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn version_picks_layout() {
        let t10 = CertificateRequest::decode(T10_MESSAGE, ProtocolVersion::TLS1_1).unwrap();
        assert!(matches!(t10, CertificateRequest::T10(_)));
        assert_eq!(t10.message_length(), T10_MESSAGE.len());

        let t13 = CertificateRequest::decode(T13_MESSAGE, ProtocolVersion::TLS1_3).unwrap();
        let CertificateRequest::T13(m) = &t13 else {
            panic!("wrong layout");
        };
        assert_eq!(m.extensions[0].ext_type, ExtensionType::SignatureAlgorithms);
        assert_eq!(t13.message_length(), T13_MESSAGE.len());

        // The TLS 1.2 layout does not parse as TLS 1.1.
        assert!(CertificateRequest::decode(T12_MESSAGE, ProtocolVersion::TLS1_1).is_err());
    }

    #[test]
    fn dtls_uses_tls_layouts() {
        let m = CertificateRequest::decode(T12_MESSAGE, ProtocolVersion::DTLS1_2).unwrap();
        assert!(matches!(m, CertificateRequest::T12(_)));
    }

    #[test]
    fn authority_order_preserved() {
        let req = T10CertificateRequest {
            cert_types: vec![ClientCertificateType::EcdsaSign],
            authorities: vec![vec![3], vec![1], vec![2]],
        };
        let mut out = Vec::new();
        req.serialize(&mut out);
        let back = CertificateRequest::decode(&out, ProtocolVersion::TLS1_0).unwrap();
        let CertificateRequest::T10(back) = back else {
            panic!("wrong layout");
        };
        assert_eq!(back.authorities, vec![vec![3], vec![1], vec![2]]);
    }

    fn cert_types(rng: &mut SeededRng) -> Vec<ClientCertificateType> {
        arbitrary::list(rng, 0..=6, |r| ClientCertificateType::from_u8(r.random()))
    }

    fn authorities(rng: &mut SeededRng) -> Vec<Vec<u8>> {
        arbitrary::list(rng, 0..=4, |r| arbitrary::bytes(r, 0..=40))
    }

    #[test]
    fn randomized_roundtrip() {
        let mut rng = arbitrary::rng(0xC2);
        for _ in 0..arbitrary::ROUNDS {
            let t10 = CertificateRequest::T10(T10CertificateRequest {
                cert_types: cert_types(&mut rng),
                authorities: authorities(&mut rng),
            });
            let t12 = CertificateRequest::T12(T12CertificateRequest {
                cert_types: cert_types(&mut rng),
                signature_schemes: arbitrary::list(&mut rng, 0..=12, |r| {
                    SignatureScheme::from_u16(r.random())
                }),
                authorities: authorities(&mut rng),
            });
            let t13 = CertificateRequest::T13(T13CertificateRequest {
                context: arbitrary::bytes(&mut rng, 0..=8),
                extensions: arbitrary::extensions(&mut rng),
            });
            let cases = [
                (t10, ProtocolVersion::TLS1_1),
                (t12, ProtocolVersion::DTLS1_2),
                (t13, ProtocolVersion::TLS1_3),
            ];

            for (req, v) in cases {
                let mut out = Vec::new();
                req.serialize(&mut out);
                assert_eq!(req.message_length(), out.len());
                assert_eq!(CertificateRequest::decode(&out, v).unwrap(), req);
            }
        }
    }

    #[test]
    fn every_certificate_type_survives() {
        for value in 0..=u8::MAX {
            let t = ClientCertificateType::from_u8(value);
            assert_eq!(t.as_u8(), value);

            let req = CertificateRequest::T10(T10CertificateRequest {
                cert_types: vec![t],
                authorities: Vec::new(),
            });
            let mut out = Vec::new();
            req.serialize(&mut out);
            assert_eq!(out, [1, value, 0, 0]);
            assert_eq!(req.message_length(), 4);
            assert_eq!(CertificateRequest::decode(&out, ProtocolVersion::TLS1_0).unwrap(), req);
        }
    }

    #[test]
    fn length_exactness() {
        for (m, v) in [
            (T10_MESSAGE, ProtocolVersion::TLS1_0),
            (T12_MESSAGE, ProtocolVersion::TLS1_2),
            (T13_MESSAGE, ProtocolVersion::TLS1_3),
        ] {
            assert!(CertificateRequest::decode(&m[..m.len() - 1], v).is_err());
            let mut longer = m.to_vec();
            longer.push(0);
            assert!(CertificateRequest::decode(&longer, v).is_err());
        }
    }
}
