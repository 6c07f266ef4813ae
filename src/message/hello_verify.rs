use nom::IResult;

use crate::codec::{opaque8, parse_exact, put_opaque8};
use crate::types::ProtocolVersion;
use crate::Error;

/// DTLS HelloVerifyRequest (RFC 6347 4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Vec<u8>,
}

impl HelloVerifyRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = opaque8(input)?;
        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie: cookie.to_vec(),
            },
        ))
    }

    pub fn decode(body: &[u8]) -> Result<HelloVerifyRequest, Error> {
        parse_exact(body, HelloVerifyRequest::parse)
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.server_version.serialize(out);
        put_opaque8(out, &self.cookie);
    }

    pub fn message_length(&self) -> usize {
        2 + 1 + self.cookie.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::arbitrary;

    const MESSAGE: &[u8] = &[
        0xFE, 0xFF, // DTLS 1.0 on the wire, as RFC 6347 recommends
        0x04, // cookie length
        0x0A, 0x0B, 0x0C, 0x0D,
    ];

    #[test]
    fn roundtrip() {
        let hvr = HelloVerifyRequest::decode(MESSAGE).unwrap();
        assert_eq!(hvr.server_version, ProtocolVersion::DTLS1_0);
        assert_eq!(hvr.cookie, vec![0x0A, 0x0B, 0x0C, 0x0D]);

        let mut out = Vec::new();
        hvr.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }

    #[test]
    fn randomized_roundtrip() {
        let versions = [ProtocolVersion::DTLS1_0, ProtocolVersion::DTLS1_2];
        let mut rng = arbitrary::rng(0x4E);
        for _ in 0..arbitrary::ROUNDS {
            let hvr = HelloVerifyRequest {
                server_version: arbitrary::pick(&mut rng, &versions),
                cookie: arbitrary::bytes(&mut rng, 0..=255),
            };

            let mut out = Vec::new();
            hvr.serialize(&mut out);
            assert_eq!(hvr.message_length(), out.len());
            assert_eq!(HelloVerifyRequest::decode(&out).unwrap(), hvr);
        }
    }

    #[test]
    fn length_exactness() {
        assert!(HelloVerifyRequest::decode(&MESSAGE[..MESSAGE.len() - 1]).is_err());
        let mut longer = MESSAGE.to_vec();
        longer.push(0);
        assert!(HelloVerifyRequest::decode(&longer).is_err());
    }
}
