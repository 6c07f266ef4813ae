//! CertificateVerify: proof of the private key behind a sent certificate.

use super::context::HandshakeContext;
use crate::kx::signature;
use crate::kx::Credential;
use crate::message::DigitallySigned;
use crate::types::HandshakeType;
use crate::Error;

/// Sign the transcript, or do nothing when no certificate was sent.
pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let Some((identity, scheme)) = ctx.identity() else {
        trace!("No identity, no CertificateVerify");
        return Ok(());
    };
    let identity = identity.clone();
    let signed = signature::sign_certificate_verify(ctx, &identity, scheme)?;
    let mut body = Vec::new();
    signed.serialize(&mut body);
    ctx.send_handshake(HandshakeType::CertificateVerify, &body)
}

pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let signed = DigitallySigned::decode(ctx.inbound()?.body(), version.use_tls12_plus())?;
    let Some(Credential::Certificate { chain, info }) = ctx.peer_certificate() else {
        return Err(Error::UnexpectedMessage(
            "CertificateVerify without a certificate".to_string(),
        ));
    };
    // Verified over the transcript before this message.
    signature::verify_certificate_verify(ctx, chain, info, &signed)?;
    ctx.negotiated.peer_scheme = signed.scheme;
    ctx.consume_inbound()?;

    if !version.use_tls13_plus() {
        ctx.ccs.expected = true;
    }
    ctx.expect(&[HandshakeType::Finished]);
    Ok(())
}
