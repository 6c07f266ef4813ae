//! ServerHelloDone: the end of the server's first flight before TLS 1.3.

use super::context::HandshakeContext;
use super::{certificate, certificate_verify, client_key_exchange, finished};
use crate::message::decode_empty;
use crate::types::HandshakeType;
use crate::Error;

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    ctx.send_handshake(HandshakeType::ServerHelloDone, &[])?;
    if ctx.client_auth_requested {
        ctx.expect(&[HandshakeType::Certificate]);
    } else {
        ctx.expect(&[HandshakeType::ClientKeyExchange]);
    }
    Ok(())
}

/// Client: answer with the second flight.
pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    decode_empty(ctx.inbound()?.body(), HandshakeType::ServerHelloDone)?;
    ctx.consume_inbound()?;

    if ctx.cert_request.is_some() {
        ctx.queue(certificate::produce);
    }
    ctx.queue(client_key_exchange::produce);
    // Only signs when a certificate went out.
    ctx.queue(certificate_verify::produce);
    ctx.queue(finished::produce);
    Ok(())
}
