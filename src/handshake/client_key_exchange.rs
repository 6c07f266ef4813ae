//! ClientKeyExchange: the premaster secret, transported or agreed.

use super::context::HandshakeContext;
use super::keys;
use crate::kx;
use crate::message::ClientKeyExchange;
use crate::types::HandshakeType;
use crate::Error;

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let (message, pms) = kx::client_key_exchange(ctx)?;
    let mut body = Vec::new();
    message.serialize(version, &mut body);
    ctx.send_handshake(HandshakeType::ClientKeyExchange, &body)?;
    // With extended master secret the session hash includes this message.
    keys::derive_master_secret(ctx, &pms)
}

pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;
    let message = ClientKeyExchange::decode(ctx.inbound()?.body(), spec.kx, version)?;
    let pms = kx::server_premaster(ctx, &message)?;
    ctx.consume_inbound()?;
    keys::derive_master_secret(ctx, &pms)?;

    if ctx.peer_certificate().is_some() {
        ctx.expect(&[HandshakeType::CertificateVerify]);
    } else {
        ctx.ccs.expected = true;
        ctx.expect(&[HandshakeType::Finished]);
    }
    Ok(())
}
