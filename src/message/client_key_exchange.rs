use crate::codec::{opaque16, opaque8, parse_exact, put_opaque16, put_opaque8};
use crate::types::{KeyExchangeAlgorithm, ProtocolVersion};
use crate::Error;

/// ClientKeyExchange (RFC 5246 7.4.7, RFC 8422 5.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyExchange {
    /// RSA encrypted premaster secret.
    Rsa(Vec<u8>),
    /// Client ECDH point.
    Ecdh(Vec<u8>),
    /// Client DH public value.
    Dh(Vec<u8>),
}

impl ClientKeyExchange {
    pub fn decode(
        body: &[u8],
        kx: KeyExchangeAlgorithm,
        version: ProtocolVersion,
    ) -> Result<ClientKeyExchange, Error> {
        let msg = match kx {
            // SSL 3.0 sends the encrypted secret without a length prefix.
            KeyExchangeAlgorithm::Rsa | KeyExchangeAlgorithm::RsaExport
                if version == ProtocolVersion::SSL3_0 =>
            {
                ClientKeyExchange::Rsa(body.to_vec())
            }
            KeyExchangeAlgorithm::Rsa | KeyExchangeAlgorithm::RsaExport => {
                ClientKeyExchange::Rsa(parse_exact(body, opaque16)?.to_vec())
            }
            k if k.is_ecc() => ClientKeyExchange::Ecdh(parse_exact(body, opaque8)?.to_vec()),
            k if k.is_ffdhe() => ClientKeyExchange::Dh(parse_exact(body, opaque16)?.to_vec()),
            _ => {
                return Err(Error::UnexpectedMessage(format!(
                    "ClientKeyExchange not used with {:?}",
                    kx
                )))
            }
        };
        if msg.payload().is_empty() {
            return Err(Error::decode("Empty ClientKeyExchange"));
        }
        Ok(msg)
    }

    pub fn serialize(&self, version: ProtocolVersion, out: &mut Vec<u8>) {
        match self {
            ClientKeyExchange::Rsa(data) if version == ProtocolVersion::SSL3_0 => {
                out.extend_from_slice(data)
            }
            ClientKeyExchange::Rsa(data) | ClientKeyExchange::Dh(data) => put_opaque16(out, data),
            ClientKeyExchange::Ecdh(data) => put_opaque8(out, data),
        }
    }

    /// Encoded size of the body at `version`.
    pub fn message_length(&self, version: ProtocolVersion) -> usize {
        match self {
            ClientKeyExchange::Rsa(data) if version == ProtocolVersion::SSL3_0 => data.len(),
            ClientKeyExchange::Rsa(data) | ClientKeyExchange::Dh(data) => 2 + data.len(),
            ClientKeyExchange::Ecdh(data) => 1 + data.len(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            ClientKeyExchange::Rsa(d) | ClientKeyExchange::Ecdh(d) | ClientKeyExchange::Dh(d) => d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::arbitrary;

    const ECDH_MESSAGE: &[u8] = &[0x03, 0x04, 0x05, 0x06];
    const RSA_MESSAGE: &[u8] = &[0x00, 0x02, 0x99, 0x98];

    #[test]
    fn ecdh_roundtrip() {
        let v = ProtocolVersion::TLS1_2;
        let cke = ClientKeyExchange::decode(ECDH_MESSAGE, KeyExchangeAlgorithm::EcdheRsa, v).unwrap();
        assert_eq!(cke, ClientKeyExchange::Ecdh(vec![4, 5, 6]));
        let mut out = Vec::new();
        cke.serialize(v, &mut out);
        assert_eq!(out, ECDH_MESSAGE);
    }

    #[test]
    fn ssl3_rsa_has_no_prefix() {
        let cke = ClientKeyExchange::decode(
            &RSA_MESSAGE[2..],
            KeyExchangeAlgorithm::Rsa,
            ProtocolVersion::SSL3_0,
        )
        .unwrap();
        assert_eq!(cke.payload(), &[0x99, 0x98]);

        let mut out = Vec::new();
        cke.serialize(ProtocolVersion::TLS1_0, &mut out);
        assert_eq!(out, RSA_MESSAGE);
    }

    #[test]
    fn randomized_roundtrip() {
        let cases = [
            (KeyExchangeAlgorithm::Rsa, ProtocolVersion::SSL3_0),
            (KeyExchangeAlgorithm::Rsa, ProtocolVersion::TLS1_2),
            (KeyExchangeAlgorithm::RsaExport, ProtocolVersion::TLS1_0),
            (KeyExchangeAlgorithm::EcdheEcdsa, ProtocolVersion::TLS1_2),
            (KeyExchangeAlgorithm::EcdhAnon, ProtocolVersion::TLS1_1),
            (KeyExchangeAlgorithm::DheRsa, ProtocolVersion::DTLS1_2),
            (KeyExchangeAlgorithm::DhAnon, ProtocolVersion::TLS1_0),
        ];
        let mut rng = arbitrary::rng(0xCE);
        for _ in 0..arbitrary::ROUNDS {
            let (kx, v) = arbitrary::pick(&mut rng, &cases);
            let cke = if kx.is_ecc() {
                ClientKeyExchange::Ecdh(arbitrary::bytes(&mut rng, 1..=133))
            } else if kx.is_ffdhe() {
                ClientKeyExchange::Dh(arbitrary::bytes(&mut rng, 1..=512))
            } else {
                ClientKeyExchange::Rsa(arbitrary::bytes(&mut rng, 1..=512))
            };

            let mut out = Vec::new();
            cke.serialize(v, &mut out);
            assert_eq!(cke.message_length(v), out.len());
            assert_eq!(ClientKeyExchange::decode(&out, kx, v).unwrap(), cke);
        }
    }

    #[test]
    fn length_exactness() {
        let v = ProtocolVersion::TLS1_2;
        let kx = KeyExchangeAlgorithm::Rsa;
        assert!(ClientKeyExchange::decode(&RSA_MESSAGE[..3], kx, v).is_err());
        let mut longer = RSA_MESSAGE.to_vec();
        longer.push(0);
        assert!(ClientKeyExchange::decode(&longer, kx, v).is_err());
    }
}
