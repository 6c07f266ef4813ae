//! signature_algorithms and signature_algorithms_cert (RFC 5246 7.4.1.4.1,
//! RFC 8446 4.2.3).

use super::{ExtensionHandler, ExtensionSpec};
use crate::catalog::TLS12_DEFAULT_SCHEMES;
use crate::codec::{list16, nested16, parse_exact};
use crate::handshake::context::HandshakeContext;
use crate::types::{AlertDescription, ExtensionType, HandshakeType, SignatureScheme};
use crate::types::{PROTOCOLS_12_13, PROTOCOLS_OF_13};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::SignatureAlgorithms,
        HandshakeType::ClientHello,
        PROTOCOLS_12_13,
    )
    .produce(produce)
    .load(load)
    .absence(absent_in_client_hello),
    ExtensionHandler::new(
        ExtensionType::SignatureAlgorithms,
        HandshakeType::CertificateRequest,
        PROTOCOLS_OF_13,
    )
    .produce(produce)
    .load(load)
    .absence(absent_in_certificate_request),
    ExtensionHandler::new(
        ExtensionType::SignatureAlgorithmsCert,
        HandshakeType::ClientHello,
        PROTOCOLS_12_13,
    )
    .load(load_cert),
    ExtensionHandler::new(
        ExtensionType::SignatureAlgorithmsCert,
        HandshakeType::CertificateRequest,
        PROTOCOLS_OF_13,
    )
    .load(load_cert),
];

/// Schemes this side verifies with, in local preference order.
pub(crate) fn local_schemes(ctx: &HandshakeContext) -> Vec<SignatureScheme> {
    let versions = match ctx.negotiated.version {
        Some(v) => vec![v],
        None => ctx.active_versions.clone(),
    };
    ctx.config.catalogs().supported_schemes(
        ctx.config.signature_schemes(),
        &versions,
        ctx.config.constraints(),
    )
}

fn produce(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let schemes = local_schemes(ctx);
    if schemes.is_empty() {
        return Err(Error::ConfigurationError(
            "No usable signature scheme".to_string(),
        ));
    }
    let mut out = Vec::new();
    nested16(&mut out, |out| {
        for s in &schemes {
            s.serialize(out);
        }
    });
    Ok(Some(out))
}

fn decode(data: &[u8]) -> Result<Vec<SignatureScheme>, Error> {
    let schemes = parse_exact(data, |i| list16(i, SignatureScheme::parse))?;
    if schemes.is_empty() {
        return Err(Error::decode("Empty signature scheme list"));
    }
    Ok(schemes)
}

fn load(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    decode(data).map(ExtensionSpec::SignatureAlgorithms)
}

fn load_cert(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    decode(data).map(ExtensionSpec::SignatureAlgorithmsCert)
}

fn absent_in_client_hello(ctx: &HandshakeContext) -> Result<(), Error> {
    let psk = ctx
        .extensions
        .contains(HandshakeType::ClientHello, ExtensionType::PreSharedKey);
    if ctx.is_tls13() && !psk {
        return Err(Error::NegotiationFailure(
            AlertDescription::MissingExtension,
            "No signature_algorithms in a certificate based ClientHello".to_string(),
        ));
    }
    Ok(())
}

fn absent_in_certificate_request(ctx: &HandshakeContext) -> Result<(), Error> {
    if ctx.is_tls13() {
        return Err(Error::NegotiationFailure(
            AlertDescription::MissingExtension,
            "No signature_algorithms in CertificateRequest".to_string(),
        ));
    }
    Ok(())
}

/// Schemes the peer accepts for signatures it verifies.
///
/// A TLS 1.2 peer that sent nothing accepts the SHA-1 defaults. Older
/// versions sign with the legacy digest, so the list stays empty.
pub(crate) fn peer_signature_schemes(ctx: &HandshakeContext, msg: HandshakeType) -> Vec<SignatureScheme> {
    if let Some(ExtensionSpec::SignatureAlgorithms(s)) =
        ctx.spec(msg, ExtensionType::SignatureAlgorithms)
    {
        return s.clone();
    }
    let version = ctx.tentative_version();
    if version.use_tls12_plus() && !version.use_tls13_plus() {
        TLS12_DEFAULT_SCHEMES.to_vec()
    } else {
        Vec::new()
    }
}

/// Schemes the peer accepts in certificate chains. Falls back to
/// signature_algorithms.
pub(crate) fn peer_certificate_schemes(ctx: &HandshakeContext, msg: HandshakeType) -> Vec<SignatureScheme> {
    match ctx.spec(msg, ExtensionType::SignatureAlgorithmsCert) {
        Some(ExtensionSpec::SignatureAlgorithmsCert(s)) => s.clone(),
        _ => peer_signature_schemes(ctx, msg),
    }
}
