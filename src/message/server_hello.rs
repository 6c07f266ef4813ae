use nom::number::complete::be_u8;
use nom::IResult;

use super::{Extension, Extensions};
use crate::codec::parse_exact;
use crate::types::{CipherSuite, ExtensionType, ProtocolVersion, Random, SessionId};
use crate::Error;

/// ServerHello, and HelloRetryRequest which shares its layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, legacy_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = be_u8(input)?;
        let (input, extensions) = Extensions::parse_optional(input)?;

        Ok((
            input,
            ServerHello {
                legacy_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn decode(body: &[u8]) -> Result<ServerHello, Error> {
        parse_exact(body, ServerHello::parse)
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.legacy_version.serialize(out);
        self.random.serialize(out);
        self.session_id.serialize(out);
        self.cipher_suite.serialize(out);
        out.push(self.compression_method);
        Extensions::serialize_optional(&self.extensions, out);
    }

    /// Encoded size of the body.
    pub fn message_length(&self) -> usize {
        2 + 32
            + 1
            + self.session_id.as_slice().len()
            + 2
            + 1
            + Extensions::length_optional(&self.extensions)
    }

    pub fn is_retry_request(&self) -> bool {
        self.random.is_hello_retry_request()
    }

    pub fn extension(&self, ext_type: ExtensionType) -> Option<&Extension> {
        super::find_extension(&self.extensions, ext_type)
    }
}
