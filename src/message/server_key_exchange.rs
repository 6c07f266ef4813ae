use nom::number::complete::be_u8;
use nom::IResult;

use super::DigitallySigned;
use crate::codec::{opaque16, opaque8, parse_exact, put_opaque16, put_opaque8, verify};
use crate::types::{KeyExchangeAlgorithm, NamedGroup, ProtocolVersion};
use crate::Error;

/// ECCurveType named_curve (RFC 8422 5.4).
const NAMED_CURVE: u8 = 3;

/// Key exchange parameters of a ServerKeyExchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyParams {
    /// ECDHE over a named curve.
    Ecdhe { group: NamedGroup, public: Vec<u8> },
    /// Finite field DHE with explicit parameters.
    Dhe { p: Vec<u8>, g: Vec<u8>, public: Vec<u8> },
    /// Temporary export RSA key.
    RsaExport { modulus: Vec<u8>, exponent: Vec<u8> },
}

impl ServerKeyParams {
    fn parse(input: &[u8], kx: KeyExchangeAlgorithm) -> IResult<&[u8], ServerKeyParams> {
        if kx.is_ecc() {
            let (input, curve_type) = be_u8(input)?;
            verify(input, curve_type == NAMED_CURVE)?;
            let (input, group) = NamedGroup::parse(input)?;
            let (input, public) = opaque8(input)?;
            verify(input, !public.is_empty())?;
            return Ok((
                input,
                ServerKeyParams::Ecdhe {
                    group,
                    public: public.to_vec(),
                },
            ));
        }
        if kx.is_ffdhe() {
            let (input, p) = opaque16(input)?;
            let (input, g) = opaque16(input)?;
            let (input, public) = opaque16(input)?;
            verify(input, !p.is_empty() && !g.is_empty() && !public.is_empty())?;
            return Ok((
                input,
                ServerKeyParams::Dhe {
                    p: p.to_vec(),
                    g: g.to_vec(),
                    public: public.to_vec(),
                },
            ));
        }
        let (input, modulus) = opaque16(input)?;
        let (input, exponent) = opaque16(input)?;
        Ok((
            input,
            ServerKeyParams::RsaExport {
                modulus: modulus.to_vec(),
                exponent: exponent.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            ServerKeyParams::Ecdhe { group, public } => {
                out.push(NAMED_CURVE);
                group.serialize(out);
                put_opaque8(out, public);
            }
            ServerKeyParams::Dhe { p, g, public } => {
                put_opaque16(out, p);
                put_opaque16(out, g);
                put_opaque16(out, public);
            }
            ServerKeyParams::RsaExport { modulus, exponent } => {
                put_opaque16(out, modulus);
                put_opaque16(out, exponent);
            }
        }
    }

    pub fn message_length(&self) -> usize {
        match self {
            ServerKeyParams::Ecdhe { public, .. } => 1 + 2 + 1 + public.len(),
            ServerKeyParams::Dhe { p, g, public } => 6 + p.len() + g.len() + public.len(),
            ServerKeyParams::RsaExport { modulus, exponent } => 4 + modulus.len() + exponent.len(),
        }
    }

    /// The bytes covered by the signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize(&mut out);
        out
    }
}

/// ServerKeyExchange (RFC 5246 7.4.3, RFC 8422 5.4).
///
/// The layout depends on the negotiated key exchange, which the parser must
/// be told. Anonymous exchanges carry no signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub params: ServerKeyParams,
    pub signature: Option<DigitallySigned>,
}

impl ServerKeyExchange {
    pub fn decode(
        body: &[u8],
        kx: KeyExchangeAlgorithm,
        version: ProtocolVersion,
    ) -> Result<ServerKeyExchange, Error> {
        if matches!(
            kx,
            KeyExchangeAlgorithm::Rsa | KeyExchangeAlgorithm::EcdhEcdsa | KeyExchangeAlgorithm::Tls13
        ) {
            return Err(Error::UnexpectedMessage(format!(
                "ServerKeyExchange not used with {:?}",
                kx
            )));
        }
        parse_exact(body, |input| {
            let (input, params) = ServerKeyParams::parse(input, kx)?;
            if !kx.is_authenticated() {
                return Ok((
                    input,
                    ServerKeyExchange {
                        params,
                        signature: None,
                    },
                ));
            }
            let (input, signature) = DigitallySigned::parse(input, version.use_tls12_plus())?;
            Ok((
                input,
                ServerKeyExchange {
                    params,
                    signature: Some(signature),
                },
            ))
        })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.params.serialize(out);
        if let Some(s) = &self.signature {
            s.serialize(out);
        }
    }

    /// Encoded size of the body.
    pub fn message_length(&self) -> usize {
        self.params.message_length()
            + self
                .signature
                .as_ref()
                .map(|s| s.message_length())
                .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::arbitrary;
    use crate::rng::SeededRng;
    use crate::types::SignatureScheme;

    const ECDHE_MESSAGE: &[u8] = &[
        0x03, // named_curve
        0x00, 0x1D, // x25519
        0x04, 0x01, 0x02, 0x03, 0x04, // public
        0x04, 0x03, // ecdsa_secp256r1_sha256
        0x00, 0x02, 0xEE, 0xFF, // signature
    ];

    const DHE_ANON_MESSAGE: &[u8] = &[
        0x00, 0x01, 0x17, // p
        0x00, 0x01, 0x02, // g
        0x00, 0x01, 0x05, // Ys
    ];

    #[test]
    fn ecdhe_roundtrip() {
        let ske = ServerKeyExchange::decode(
            ECDHE_MESSAGE,
            KeyExchangeAlgorithm::EcdheEcdsa,
            ProtocolVersion::TLS1_2,
        )
        .unwrap();
        assert_eq!(
            ske.params,
            ServerKeyParams::Ecdhe {
                group: NamedGroup::X25519,
                public: vec![1, 2, 3, 4]
            }
        );
        let sig = ske.signature.as_ref().unwrap();
        assert_eq!(sig.scheme, Some(SignatureScheme::ECDSA_SECP256R1_SHA256));
        assert_eq!(ske.params.to_bytes(), &ECDHE_MESSAGE[..8]);

        let mut out = Vec::new();
        ske.serialize(&mut out);
        assert_eq!(out, ECDHE_MESSAGE);
    }

    fn params(rng: &mut SeededRng, kx: KeyExchangeAlgorithm) -> ServerKeyParams {
        if kx.is_ecc() {
            ServerKeyParams::Ecdhe {
                group: NamedGroup::from_u16(rng.random()),
                public: arbitrary::bytes(rng, 1..=133),
            }
        } else if kx.is_ffdhe() {
            ServerKeyParams::Dhe {
                p: arbitrary::bytes(rng, 1..=256),
                g: arbitrary::bytes(rng, 1..=2),
                public: arbitrary::bytes(rng, 1..=256),
            }
        } else {
            ServerKeyParams::RsaExport {
                modulus: arbitrary::bytes(rng, 0..=64),
                exponent: arbitrary::bytes(rng, 0..=4),
            }
        }
    }

    #[test]
    fn randomized_roundtrip() {
        let kxs = [
            KeyExchangeAlgorithm::EcdheEcdsa,
            KeyExchangeAlgorithm::EcdheRsa,
            KeyExchangeAlgorithm::EcdhAnon,
            KeyExchangeAlgorithm::DheRsa,
            KeyExchangeAlgorithm::DhAnon,
            KeyExchangeAlgorithm::RsaExport,
        ];
        let versions = [
            ProtocolVersion::SSL3_0,
            ProtocolVersion::TLS1_0,
            ProtocolVersion::TLS1_2,
            ProtocolVersion::DTLS1_2,
        ];
        let mut rng = arbitrary::rng(0x5C);
        for _ in 0..arbitrary::ROUNDS {
            let kx = arbitrary::pick(&mut rng, &kxs);
            let v = arbitrary::pick(&mut rng, &versions);
            let params = params(&mut rng, kx);
            let signature = if kx.is_authenticated() {
                let scheme = if v.use_tls12_plus() {
                    Some(SignatureScheme::from_u16(rng.random()))
                } else {
                    None
                };
                Some(DigitallySigned {
                    scheme,
                    signature: arbitrary::bytes(&mut rng, 0..=256),
                })
            } else {
                None
            };
            let ske = ServerKeyExchange { params, signature };

            let mut out = Vec::new();
            ske.serialize(&mut out);
            assert_eq!(ske.message_length(), out.len());
            assert_eq!(ServerKeyExchange::decode(&out, kx, v).unwrap(), ske);
        }
    }

    #[test]
    fn legacy_signature_has_no_scheme() {
        let mut m = ECDHE_MESSAGE[..8].to_vec();
        m.extend_from_slice(&[0x00, 0x01, 0x77]);
        let ske =
            ServerKeyExchange::decode(&m, KeyExchangeAlgorithm::EcdheRsa, ProtocolVersion::TLS1_0)
                .unwrap();
        assert_eq!(ske.signature.unwrap().scheme, None);
    }

    #[test]
    fn anonymous_has_no_signature() {
        let ske = ServerKeyExchange::decode(
            DHE_ANON_MESSAGE,
            KeyExchangeAlgorithm::DhAnon,
            ProtocolVersion::TLS1_2,
        )
        .unwrap();
        assert!(ske.signature.is_none());
        let mut out = Vec::new();
        ske.serialize(&mut out);
        assert_eq!(out, DHE_ANON_MESSAGE);
    }

    #[test]
    fn wrong_curve_type() {
        let mut m = ECDHE_MESSAGE.to_vec();
        m[0] = 0x01;
        assert!(ServerKeyExchange::decode(
            &m,
            KeyExchangeAlgorithm::EcdheEcdsa,
            ProtocolVersion::TLS1_2
        )
        .is_err());
    }

    #[test]
    fn length_exactness() {
        let kx = KeyExchangeAlgorithm::EcdheEcdsa;
        let v = ProtocolVersion::TLS1_2;
        let m = ECDHE_MESSAGE;
        assert!(ServerKeyExchange::decode(&m[..m.len() - 1], kx, v).is_err());
        let mut longer = m.to_vec();
        longer.push(0);
        assert!(ServerKeyExchange::decode(&longer, kx, v).is_err());
    }
}
