//! Certificate, in both directions.
//!
//! A server always sends its chain unless the exchange is anonymous or
//! resumed. A client sends one only when asked, and sends an empty message
//! when it has nothing matching the request.

use std::sync::Arc;

use super::context::{HandshakeContext, Role};
use crate::catalog::auth_families;
use crate::config::ClientAuth;
use crate::crypto::{Identity, PublicKeyInfo};
use crate::extension::local_schemes;
use crate::kx::{Credential, Possession};
use crate::message::Certificate;
use crate::types::{AlertDescription, HandshakeType, KeyExchangeAlgorithm, ProtocolVersion};
use crate::types::SignatureScheme;
use crate::Error;

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    match ctx.role {
        Role::Server => produce_server(ctx),
        Role::Client => produce_client(ctx),
    }
}

fn send(
    ctx: &mut HandshakeContext,
    version: ProtocolVersion,
    context: &[u8],
    chain: &[Vec<u8>],
) -> Result<(), Error> {
    let message = Certificate::new(version, context, chain);
    let mut body = Vec::new();
    message.serialize(&mut body);
    ctx.send_handshake(HandshakeType::Certificate, &body)
}

fn produce_server(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let chain = ctx
        .identity()
        .map(|(identity, _)| identity.chain().to_vec())
        .ok_or_else(|| Error::internal("No server identity"))?;
    send(ctx, version, &[], &chain)?;
    trace!("Sent chain of {} certificates", chain.len());
    ctx.negotiated.local_certificates = chain;
    Ok(())
}

fn produce_client(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let request = ctx
        .cert_request
        .clone()
        .ok_or_else(|| Error::internal("Client Certificate without a request"))?;

    let chosen = match ctx
        .config
        .key_manager()
        .choose_client_identity(&request.families, &request.authorities, &request.cert_schemes)
    {
        Some(identity) => client_scheme(ctx, &identity, &request.schemes, version)
            .map(|scheme| (identity, scheme)),
        None => None,
    };

    let Some((identity, scheme)) = chosen else {
        // SSL 3.0 would send a no_certificate alert, an empty message works
        // for every version we accept.
        debug!("No client certificate fits the request");
        return send(ctx, version, &request.context, &[]);
    };
    let chain = identity.chain().to_vec();
    ctx.negotiated.local_scheme = scheme;
    ctx.possessions.push(Possession::Identity { identity, scheme });
    send(ctx, version, &request.context, &chain)?;
    debug!("Sent client chain of {} certificates", chain.len());
    ctx.negotiated.local_certificates = chain;
    Ok(())
}

/// The scheme the client signs its CertificateVerify with, `Some(None)`
/// before TLS 1.2.
fn client_scheme(
    ctx: &HandshakeContext,
    identity: &Arc<Identity>,
    requested: &[SignatureScheme],
    version: ProtocolVersion,
) -> Option<Option<SignatureScheme>> {
    if !version.use_tls12_plus() {
        return Some(None);
    }
    let found = ctx.config.catalogs().preferable_scheme(
        requested,
        &local_schemes(ctx),
        version,
        identity.key().as_ref(),
        ctx.config.constraints(),
    );
    if found.is_none() {
        debug!("Client identity cannot sign with any requested scheme");
    }
    found.map(Some)
}

pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let message = Certificate::decode(ctx.inbound()?.body(), version)?;
    match ctx.role {
        Role::Client => consume_server_chain(ctx, version, message.chain()),
        Role::Server => consume_client_chain(ctx, version, &message),
    }
}

/// Key facts of the leaf, checked against the local constraints.
fn inspect(ctx: &HandshakeContext, chain: &[Vec<u8>]) -> Result<PublicKeyInfo, Error> {
    let leaf = chain
        .first()
        .ok_or_else(|| Error::internal("Inspecting an empty chain"))?;
    let info = ctx
        .provider()
        .certificate_inspector
        .inspect(leaf)
        .map_err(|e| Error::CertificateError(AlertDescription::BadCertificate, e))?;
    if !ctx.config.constraints().permits_key(info.family, info.bits) {
        return Err(Error::CertificateError(
            AlertDescription::InsufficientSecurity,
            format!("{} key of {} bits not permitted", info.family.name(), info.bits),
        ));
    }
    Ok(info)
}

fn validate(ctx: &HandshakeContext, chain: &[Vec<u8>], server_name: Option<&str>) -> Result<(), Error> {
    ctx.config
        .certificate_validator()
        .validate(chain, server_name)
        .map_err(|e| {
            debug!("Certificate chain rejected: {}", e);
            Error::CertificateError(AlertDescription::BadCertificate, e)
        })
}

fn consume_server_chain(
    ctx: &mut HandshakeContext,
    version: ProtocolVersion,
    chain: Vec<Vec<u8>>,
) -> Result<(), Error> {
    if chain.is_empty() {
        return Err(Error::decode("Server sent no certificate"));
    }
    let spec = ctx.suite_spec()?;
    let info = inspect(ctx, &chain)?;
    if !auth_families(spec).contains(&info.family) {
        return Err(Error::CertificateError(
            AlertDescription::UnsupportedCertificate,
            format!("{} certificate for {}", info.family.name(), spec.suite),
        ));
    }
    let server_name = ctx.config.server_name().map(str::to_string);
    validate(ctx, &chain, server_name.as_deref())?;

    debug!("Server chain of {} certificates accepted", chain.len());
    ctx.negotiated.peer_certificates = chain.clone();
    ctx.credentials.push(Credential::Certificate { chain, info });
    ctx.consume_inbound()?;

    if version.use_tls13_plus() {
        ctx.expect(&[HandshakeType::CertificateVerify]);
        return Ok(());
    }
    match spec.kx {
        KeyExchangeAlgorithm::Rsa | KeyExchangeAlgorithm::EcdhEcdsa => ctx.expect(&[
            HandshakeType::CertificateRequest,
            HandshakeType::ServerHelloDone,
        ]),
        // The temporary key is only sent when the certificate key is too
        // large for export.
        KeyExchangeAlgorithm::RsaExport => ctx.expect(&[
            HandshakeType::ServerKeyExchange,
            HandshakeType::CertificateRequest,
            HandshakeType::ServerHelloDone,
        ]),
        _ => ctx.expect(&[HandshakeType::ServerKeyExchange]),
    }
    Ok(())
}

fn consume_client_chain(
    ctx: &mut HandshakeContext,
    version: ProtocolVersion,
    message: &Certificate,
) -> Result<(), Error> {
    if version.use_tls13_plus() && !message.context().is_empty() {
        return Err(Error::illegal("Certificate context does not match the request"));
    }
    let chain = message.chain();

    if chain.is_empty() {
        if ctx.config.client_auth() == ClientAuth::Required {
            let alert = if version.use_tls13_plus() {
                AlertDescription::CertificateRequired
            } else {
                AlertDescription::HandshakeFailure
            };
            return Err(Error::CertificateError(
                alert,
                "Client sent no certificate".to_string(),
            ));
        }
        debug!("Client declined to authenticate");
        ctx.consume_inbound()?;
        if version.use_tls13_plus() {
            ctx.expect(&[HandshakeType::Finished]);
        } else {
            ctx.expect(&[HandshakeType::ClientKeyExchange]);
        }
        return Ok(());
    }

    let info = inspect(ctx, &chain)?;
    validate(ctx, &chain, None)?;
    debug!("Client chain of {} certificates accepted", chain.len());
    ctx.negotiated.peer_certificates = chain.clone();
    ctx.credentials.push(Credential::Certificate { chain, info });
    ctx.consume_inbound()?;

    if version.use_tls13_plus() {
        ctx.expect(&[HandshakeType::CertificateVerify]);
    } else {
        ctx.expect(&[HandshakeType::ClientKeyExchange]);
    }
    Ok(())
}
