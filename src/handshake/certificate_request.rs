//! CertificateRequest: the server asks the client to authenticate.

use super::context::{CertRequestInfo, HandshakeContext};
use crate::extension::{self, local_schemes, peer_authorities, peer_certificate_schemes};
use crate::extension::peer_signature_schemes;
use crate::message::{CertificateRequest, T10CertificateRequest, T12CertificateRequest};
use crate::message::T13CertificateRequest;
use crate::types::{ClientCertificateType, HandshakeType, KeyFamily};
use crate::Error;

/// Certificate types asked for before TLS 1.3. DSA and fixed DH are not
/// supported.
const REQUESTED_TYPES: &[ClientCertificateType] =
    &[ClientCertificateType::RsaSign, ClientCertificateType::EcdsaSign];

fn families_of(types: &[ClientCertificateType]) -> Vec<KeyFamily> {
    let mut out = Vec::new();
    for t in types {
        match t {
            ClientCertificateType::RsaSign => out.push(KeyFamily::Rsa),
            ClientCertificateType::EcdsaSign => out.push(KeyFamily::Ec),
            other => trace!("Ignoring certificate type {:?}", other),
        }
    }
    out
}

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let authorities = ctx.config.certificate_authorities().to_vec();
    let request = if version.use_tls13_plus() {
        CertificateRequest::T13(T13CertificateRequest {
            context: Vec::new(),
            extensions: extension::produce(ctx, HandshakeType::CertificateRequest)?,
        })
    } else if version.use_tls12_plus() {
        CertificateRequest::T12(T12CertificateRequest {
            cert_types: REQUESTED_TYPES.to_vec(),
            signature_schemes: local_schemes(ctx),
            authorities,
        })
    } else {
        CertificateRequest::T10(T10CertificateRequest {
            cert_types: REQUESTED_TYPES.to_vec(),
            authorities,
        })
    };
    let mut body = Vec::new();
    request.serialize(&mut body);
    ctx.send_handshake(HandshakeType::CertificateRequest, &body)?;
    ctx.client_auth_requested = true;
    debug!("Requested a client certificate");
    Ok(())
}

pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    if !ctx.suite_spec()?.kx.is_authenticated() {
        return Err(Error::handshake_failure(
            "CertificateRequest in an anonymous exchange",
        ));
    }
    let request = CertificateRequest::decode(ctx.inbound()?.body(), version)?;

    let info = match request {
        CertificateRequest::T10(r) => CertRequestInfo {
            families: families_of(&r.cert_types),
            schemes: Vec::new(),
            cert_schemes: Vec::new(),
            authorities: r.authorities,
            context: Vec::new(),
        },
        CertificateRequest::T12(r) => CertRequestInfo {
            families: families_of(&r.cert_types),
            cert_schemes: r.signature_schemes.clone(),
            schemes: r.signature_schemes,
            authorities: r.authorities,
            context: Vec::new(),
        },
        CertificateRequest::T13(r) => {
            if !r.context.is_empty() {
                return Err(Error::illegal("Non-empty context in a handshake CertificateRequest"));
            }
            extension::load(ctx, HandshakeType::CertificateRequest, &r.extensions)?;
            extension::check_absent(ctx, HandshakeType::CertificateRequest)?;
            extension::trade(ctx, HandshakeType::CertificateRequest)?;
            CertRequestInfo {
                families: vec![KeyFamily::Ec, KeyFamily::RsaPss, KeyFamily::Rsa],
                schemes: peer_signature_schemes(ctx, HandshakeType::CertificateRequest),
                cert_schemes: peer_certificate_schemes(ctx, HandshakeType::CertificateRequest),
                authorities: peer_authorities(ctx, HandshakeType::CertificateRequest),
                context: r.context,
            }
        }
    };
    debug!(
        "Server requested a certificate ({:?}, {} authorities)",
        info.families,
        info.authorities.len()
    );
    ctx.cert_request = Some(info);
    ctx.consume_inbound()?;

    if version.use_tls13_plus() {
        ctx.expect(&[HandshakeType::Certificate]);
    } else {
        ctx.expect(&[HandshakeType::ServerHelloDone]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_skip_unsupported_types() {
        let types = [
            ClientCertificateType::DssSign,
            ClientCertificateType::EcdsaSign,
            ClientCertificateType::RsaFixedDh,
            ClientCertificateType::RsaSign,
        ];
        assert_eq!(families_of(&types), vec![KeyFamily::Ec, KeyFamily::Rsa]);
    }
}
