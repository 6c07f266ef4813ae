use nom::number::complete::be_u8;
use nom::IResult;

/// Handshake message types (RFC 5246, RFC 6347, RFC 8446).
///
/// `HelloRetryRequest` shares the wire value of `ServerHello`. It is never
/// produced by [`HandshakeType::from_u8`]; the engine switches to it after
/// recognising the special random value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandshakeType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    NewSessionTicket,
    EndOfEarlyData,
    HelloRetryRequest,
    EncryptedExtensions,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    KeyUpdate,
    MessageHash,
    Unknown(u8),
}

impl Default for HandshakeType {
    fn default() -> Self {
        Self::Unknown(255)
    }
}

impl HandshakeType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HandshakeType::HelloRequest,
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            3 => HandshakeType::HelloVerifyRequest,
            4 => HandshakeType::NewSessionTicket,
            5 => HandshakeType::EndOfEarlyData,
            8 => HandshakeType::EncryptedExtensions,
            11 => HandshakeType::Certificate,
            12 => HandshakeType::ServerKeyExchange,
            13 => HandshakeType::CertificateRequest,
            14 => HandshakeType::ServerHelloDone,
            15 => HandshakeType::CertificateVerify,
            16 => HandshakeType::ClientKeyExchange,
            20 => HandshakeType::Finished,
            24 => HandshakeType::KeyUpdate,
            254 => HandshakeType::MessageHash,
            _ => HandshakeType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HandshakeType::HelloRequest => 0,
            HandshakeType::ClientHello => 1,
            HandshakeType::ServerHello => 2,
            HandshakeType::HelloVerifyRequest => 3,
            HandshakeType::NewSessionTicket => 4,
            HandshakeType::EndOfEarlyData => 5,
            HandshakeType::HelloRetryRequest => 2,
            HandshakeType::EncryptedExtensions => 8,
            HandshakeType::Certificate => 11,
            HandshakeType::ServerKeyExchange => 12,
            HandshakeType::CertificateRequest => 13,
            HandshakeType::ServerHelloDone => 14,
            HandshakeType::CertificateVerify => 15,
            HandshakeType::ClientKeyExchange => 16,
            HandshakeType::Finished => 20,
            HandshakeType::KeyUpdate => 24,
            HandshakeType::MessageHash => 254,
            HandshakeType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HandshakeType> {
        let (input, value) = be_u8(input)?;
        Ok((input, HandshakeType::from_u8(value)))
    }

    /// Whether the message takes part in the transcript hash.
    ///
    /// HelloRequest is never hashed. HelloVerifyRequest is hashed by nobody
    /// because the transcript restarts with the second ClientHello.
    pub fn is_hashed(&self) -> bool {
        !matches!(
            self,
            HandshakeType::HelloRequest | HandshakeType::HelloVerifyRequest
        )
    }

    /// Messages that may arrive after the handshake completed.
    pub fn is_post_handshake(&self) -> bool {
        matches!(
            self,
            HandshakeType::NewSessionTicket
                | HandshakeType::KeyUpdate
                | HandshakeType::HelloRequest
                | HandshakeType::CertificateRequest
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_retry_request_shares_server_hello_value() {
        assert_eq!(HandshakeType::HelloRetryRequest.as_u8(), 2);
        assert_eq!(HandshakeType::from_u8(2), HandshakeType::ServerHello);
    }

    #[test]
    fn unknown_roundtrip() {
        let t = HandshakeType::from_u8(99);
        assert_eq!(t, HandshakeType::Unknown(99));
        assert_eq!(t.as_u8(), 99);
    }
}
