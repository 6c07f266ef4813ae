//! Structural encode/decode of handshake messages.
//!
//! Every message has a `parse` nom parser, a `decode` that insists the body is
//! consumed exactly, and a `serialize` producing the inverse layout. Messages
//! whose layout differs between protocol versions are separate types, picked
//! by a small version table at decode time.

use nom::number::complete::{be_u16, be_u24};
use nom::IResult;

use crate::codec::{put_u16, put_u24};
use crate::types::HandshakeType;
use crate::Error;

mod certificate;
mod certificate_request;
mod certificate_verify;
mod client_hello;
mod client_key_exchange;
mod extensions;
mod finished;
mod hello_verify;
mod key_update;
mod new_session_ticket;
mod server_hello;
mod server_key_exchange;

pub use certificate::{Certificate, CertificateEntry, T12Certificate, T13Certificate};
pub use certificate_request::{CertificateRequest, T10CertificateRequest};
pub use certificate_request::{T12CertificateRequest, T13CertificateRequest};
pub use certificate_verify::DigitallySigned;
pub use client_hello::ClientHello;
pub use client_key_exchange::ClientKeyExchange;
pub use extensions::{find_extension, Extension, Extensions};
pub use finished::Finished;
pub use hello_verify::HelloVerifyRequest;
pub use key_update::KeyUpdate;
pub use new_session_ticket::{NewSessionTicket, T12NewSessionTicket, T13NewSessionTicket};
pub use server_hello::ServerHello;
pub use server_key_exchange::{ServerKeyExchange, ServerKeyParams};

/// Size of the TLS handshake header.
pub const HEADER_LEN: usize = 4;

/// Size of the DTLS handshake header.
pub const DTLS_HEADER_LEN: usize = 12;

/// Largest handshake body the engine accepts.
pub const MAX_MESSAGE_LEN: usize = 1 << 16;

/// Handshake message header. DTLS adds sequencing and fragment fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub msg_type: HandshakeType,
    pub length: u32,
    pub dtls: Option<DtlsFragment>,
}

/// DTLS part of a handshake header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtlsFragment {
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl HandshakeHeader {
    pub fn parse(input: &[u8], dtls: bool) -> IResult<&[u8], HandshakeHeader> {
        let (input, msg_type) = HandshakeType::parse(input)?;
        let (input, length) = be_u24(input)?;
        if !dtls {
            return Ok((
                input,
                HandshakeHeader {
                    msg_type,
                    length,
                    dtls: None,
                },
            ));
        }
        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;
        Ok((
            input,
            HandshakeHeader {
                msg_type,
                length,
                dtls: Some(DtlsFragment {
                    message_seq,
                    fragment_offset,
                    fragment_length,
                }),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.msg_type.as_u8());
        put_u24(out, self.length);
        if let Some(d) = &self.dtls {
            put_u16(out, d.message_seq);
            put_u24(out, d.fragment_offset);
            put_u24(out, d.fragment_length);
        }
    }

    /// Bytes of body that follow this header on the wire.
    pub fn body_len(&self) -> usize {
        match &self.dtls {
            Some(d) => d.fragment_length as usize,
            None => self.length as usize,
        }
    }
}

/// Wrap `body` in a handshake header.
///
/// With `dtls_seq` the header is the unfragmented 12 byte DTLS form.
pub fn frame(msg_type: HandshakeType, body: &[u8], dtls_seq: Option<u16>) -> Vec<u8> {
    let length = body.len() as u32;
    let header = HandshakeHeader {
        msg_type,
        length,
        dtls: dtls_seq.map(|message_seq| DtlsFragment {
            message_seq,
            fragment_offset: 0,
            fragment_length: length,
        }),
    };
    let mut out = Vec::with_capacity(DTLS_HEADER_LEN + body.len());
    header.serialize(&mut out);
    out.extend_from_slice(body);
    out
}

/// Empty bodies: HelloRequest, ServerHelloDone, EndOfEarlyData.
pub fn decode_empty(body: &[u8], msg_type: HandshakeType) -> Result<(), Error> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(Error::decode(format!("{:?} must have an empty body", msg_type)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const FINISHED_TLS: &[u8] = &[
        0x14, // Finished
        0x00, 0x00, 0x03, // length
        0x01, 0x02, 0x03,
    ];

    const FINISHED_DTLS: &[u8] = &[
        0x14, // Finished
        0x00, 0x00, 0x03, // length
        0x00, 0x05, // message_seq
        0x00, 0x00, 0x00, // fragment_offset
        0x00, 0x00, 0x03, // fragment_length
        0x01, 0x02, 0x03,
    ];

    #[test]
    fn tls_frame() {
        let framed = frame(HandshakeType::Finished, &[1, 2, 3], None);
        assert_eq!(framed, FINISHED_TLS);

        let (rest, header) = HandshakeHeader::parse(FINISHED_TLS, false).unwrap();
        assert_eq!(header.msg_type, HandshakeType::Finished);
        assert_eq!(header.body_len(), 3);
        assert_eq!(rest, &[1, 2, 3]);
    }

    #[test]
    fn dtls_frame() {
        let framed = frame(HandshakeType::Finished, &[1, 2, 3], Some(5));
        assert_eq!(framed, FINISHED_DTLS);

        let (rest, header) = HandshakeHeader::parse(FINISHED_DTLS, true).unwrap();
        let d = header.dtls.unwrap();
        assert_eq!(d.message_seq, 5);
        assert_eq!(d.fragment_offset, 0);
        assert_eq!(rest.len(), 3);
    }

    #[test]
    fn empty_bodies() {
        assert!(decode_empty(&[], HandshakeType::ServerHelloDone).is_ok());
        assert!(decode_empty(&[0], HandshakeType::ServerHelloDone).is_err());
    }
}
