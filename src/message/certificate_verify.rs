use nom::IResult;

use crate::codec::{opaque16, parse_exact, put_opaque16};
use crate::types::SignatureScheme;
use crate::Error;

/// A signature with its scheme, as in CertificateVerify and ServerKeyExchange.
///
/// Before TLS 1.2 the scheme is not on the wire and `scheme` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitallySigned {
    pub scheme: Option<SignatureScheme>,
    pub signature: Vec<u8>,
}

impl DigitallySigned {
    pub fn parse(input: &[u8], with_scheme: bool) -> IResult<&[u8], DigitallySigned> {
        let (input, scheme) = if with_scheme {
            let (input, scheme) = SignatureScheme::parse(input)?;
            (input, Some(scheme))
        } else {
            (input, None)
        };
        let (input, signature) = opaque16(input)?;
        Ok((
            input,
            DigitallySigned {
                scheme,
                signature: signature.to_vec(),
            },
        ))
    }

    /// CertificateVerify body.
    pub fn decode(body: &[u8], with_scheme: bool) -> Result<DigitallySigned, Error> {
        parse_exact(body, |i| DigitallySigned::parse(i, with_scheme))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        if let Some(scheme) = &self.scheme {
            scheme.serialize(out);
        }
        put_opaque16(out, &self.signature);
    }

    pub fn message_length(&self) -> usize {
        self.scheme.map(|_| 2).unwrap_or(0) + 2 + self.signature.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::arbitrary;

    const MESSAGE: &[u8] = &[
        0x08, 0x04, // rsa_pss_rsae_sha256
        0x00, 0x03, 0xAA, 0xBB, 0xCC,
    ];

    #[test]
    fn roundtrip() {
        let ds = DigitallySigned::decode(MESSAGE, true).unwrap();
        assert_eq!(ds.scheme, Some(SignatureScheme::RSA_PSS_RSAE_SHA256));

        let mut out = Vec::new();
        ds.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }

    #[test]
    fn randomized_roundtrip() {
        let mut rng = arbitrary::rng(0xCF);
        for _ in 0..arbitrary::ROUNDS {
            let with_scheme: bool = rng.random();
            let scheme = if with_scheme {
                Some(SignatureScheme::from_u16(rng.random()))
            } else {
                None
            };
            let ds = DigitallySigned {
                scheme,
                signature: arbitrary::bytes(&mut rng, 0..=512),
            };

            let mut out = Vec::new();
            ds.serialize(&mut out);
            assert_eq!(ds.message_length(), out.len());
            assert_eq!(DigitallySigned::decode(&out, with_scheme).unwrap(), ds);
        }
    }

    #[test]
    fn legacy_has_no_scheme() {
        let ds = DigitallySigned::decode(&MESSAGE[2..], false).unwrap();
        assert_eq!(ds.scheme, None);
        assert_eq!(ds.signature, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn length_exactness() {
        assert!(DigitallySigned::decode(&MESSAGE[..MESSAGE.len() - 1], true).is_err());
        let mut longer = MESSAGE.to_vec();
        longer.push(0);
        assert!(DigitallySigned::decode(&longer, true).is_err());
    }
}
