//! EncryptedExtensions, TLS 1.3 only.

use super::context::HandshakeContext;
use crate::codec::parse_exact;
use crate::extension;
use crate::message::Extensions;
use crate::types::HandshakeType;
use crate::Error;

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let extensions = extension::produce(ctx, HandshakeType::EncryptedExtensions)?;
    let mut body = Vec::new();
    Extensions::serialize(&extensions, &mut body);
    ctx.send_handshake(HandshakeType::EncryptedExtensions, &body)?;
    trace!("EncryptedExtensions with {} entries", extensions.len());
    Ok(())
}

pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let extensions = parse_exact(ctx.inbound()?.body(), Extensions::parse)?;
    extension::load(ctx, HandshakeType::EncryptedExtensions, &extensions)?;
    extension::check_absent(ctx, HandshakeType::EncryptedExtensions)?;
    extension::trade(ctx, HandshakeType::EncryptedExtensions)?;
    ctx.consume_inbound()?;

    if ctx.negotiated.resumed {
        ctx.expect(&[HandshakeType::Finished]);
    } else {
        ctx.expect(&[HandshakeType::CertificateRequest, HandshakeType::Certificate]);
    }
    Ok(())
}
