use nom::IResult;

use super::{Extension, Extensions};
use crate::codec::{list16, list8, nested16, nested8, opaque8, parse_exact, put_opaque8, verify};
use crate::types::{CipherSuite, ExtensionType, ProtocolVersion, Random, SessionId};
use crate::Error;

/// ClientHello (RFC 5246 7.4.1.2, RFC 6347 4.2.2, RFC 8446 4.1.2).
///
/// The cookie field only exists on the wire when `legacy_version` is a DTLS
/// version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cookie: Option<Vec<u8>>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, legacy_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = if legacy_version.is_dtls() {
            let (input, cookie) = opaque8(input)?;
            (input, Some(cookie.to_vec()))
        } else {
            (input, None)
        };
        let (input, cipher_suites) = list16(input, CipherSuite::parse)?;
        verify(input, !cipher_suites.is_empty())?;
        let (input, compression_methods) = list8(input, nom::number::complete::be_u8)?;
        verify(input, !compression_methods.is_empty())?;
        let (input, extensions) = Extensions::parse_optional(input)?;

        Ok((
            input,
            ClientHello {
                legacy_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn decode(body: &[u8]) -> Result<ClientHello, Error> {
        parse_exact(body, ClientHello::parse)
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.legacy_version.serialize(out);
        self.random.serialize(out);
        self.session_id.serialize(out);
        if let Some(cookie) = &self.cookie {
            put_opaque8(out, cookie);
        }
        nested16(out, |out| {
            for s in &self.cipher_suites {
                s.serialize(out);
            }
        });
        nested8(out, |out| out.extend_from_slice(&self.compression_methods));
        Extensions::serialize_optional(&self.extensions, out);
    }

    /// Encoded size of the body.
    pub fn message_length(&self) -> usize {
        2 + 32
            + 1
            + self.session_id.as_slice().len()
            + self.cookie.as_ref().map(|c| 1 + c.len()).unwrap_or(0)
            + 2
            + 2 * self.cipher_suites.len()
            + 1
            + self.compression_methods.len()
            + Extensions::length_optional(&self.extensions)
    }

    pub fn extension(&self, ext_type: ExtensionType) -> Option<&Extension> {
        super::find_extension(&self.extensions, ext_type)
    }

    pub fn offers_suite(&self, suite: CipherSuite) -> bool {
        self.cipher_suites.contains(&suite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::arbitrary;

    const MESSAGE: &[u8] = &[
        0x03, 0x03, // TLS 1.2
        // random
        0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
        0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
        0x01, 0x01, //
        0x00, // session id
        0x00, 0x04, // suites length
        0x13, 0x01, // TLS_AES_128_GCM_SHA256
        0xC0, 0x2B, // ECDHE_ECDSA_AES128_GCM_SHA256
        0x01, 0x00, // null compression
        0x00, 0x04, // extensions length
        0x00, 0x17, 0x00, 0x00, // extended_master_secret
    ];

    const DTLS_MESSAGE: &[u8] = &[
        0xFE, 0xFD, // DTLS 1.2
        // random
        0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
        0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
        0x02, 0x02, //
        0x00, // session id
        0x02, 0xAA, 0xBB, // cookie
        0x00, 0x02, // suites length
        0xC0, 0x2B, //
        0x01, 0x00, // null compression
    ];

    #[test]
    fn roundtrip() {
        let hello = ClientHello::decode(MESSAGE).unwrap();
        assert_eq!(hello.legacy_version, ProtocolVersion::TLS1_2);
        assert!(hello.cookie.is_none());
        assert!(hello.offers_suite(CipherSuite::TLS13_AES_128_GCM_SHA256));
        assert!(hello.extension(ExtensionType::ExtendedMasterSecret).is_some());

        let mut out = Vec::new();
        hello.serialize(&mut out);
        assert_eq!(out, MESSAGE);
        assert_eq!(hello.message_length(), MESSAGE.len());
    }

    #[test]
    fn randomized_roundtrip() {
        let versions = [
            ProtocolVersion::SSL3_0,
            ProtocolVersion::TLS1_0,
            ProtocolVersion::TLS1_2,
            ProtocolVersion::DTLS1_0,
            ProtocolVersion::DTLS1_2,
        ];
        let mut rng = arbitrary::rng(0xC1);
        for _ in 0..arbitrary::ROUNDS {
            let legacy_version = arbitrary::pick(&mut rng, &versions);
            let cookie = if legacy_version.is_dtls() {
                Some(arbitrary::bytes(&mut rng, 0..=32))
            } else {
                None
            };
            let hello = ClientHello {
                legacy_version,
                random: arbitrary::random(&mut rng),
                session_id: arbitrary::session_id(&mut rng),
                cookie,
                cipher_suites: arbitrary::list(&mut rng, 1..=24, |r| {
                    CipherSuite::from_u16(r.random())
                }),
                compression_methods: arbitrary::bytes(&mut rng, 1..=3),
                extensions: arbitrary::extensions(&mut rng),
            };

            let mut out = Vec::new();
            hello.serialize(&mut out);
            assert_eq!(hello.message_length(), out.len());
            assert_eq!(ClientHello::decode(&out).unwrap(), hello);
        }
    }

    #[test]
    fn dtls_cookie_and_no_extensions() {
        let hello = ClientHello::decode(DTLS_MESSAGE).unwrap();
        assert_eq!(hello.cookie.as_deref(), Some(&[0xAA, 0xBB][..]));
        assert!(hello.extensions.is_empty());

        let mut out = Vec::new();
        hello.serialize(&mut out);
        assert_eq!(out, DTLS_MESSAGE);
    }

    #[test]
    fn length_exactness() {
        assert!(ClientHello::decode(&MESSAGE[..MESSAGE.len() - 1]).is_err());
        let mut longer = MESSAGE.to_vec();
        longer.push(0);
        assert!(ClientHello::decode(&longer).is_err());
    }

    #[test]
    fn empty_suites_refused() {
        let mut m = DTLS_MESSAGE[..38].to_vec();
        m.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]);
        assert!(ClientHello::decode(&m).is_err());
    }
}
