//! Handshake signatures: ServerKeyExchange and CertificateVerify.
//!
//! TLS 1.2 and 1.3 sign the content under a negotiated scheme. Earlier
//! versions sign a fixed digest: MD5 followed by SHA-1 for RSA keys, SHA-1
//! alone for ECDSA keys.

use crate::catalog::scheme_spec;
use crate::crypto::prf::ssl3_certificate_verify;
use crate::crypto::{CryptoProvider, Identity, PublicKeyInfo};
use crate::handshake::context::{HandshakeContext, Role};
use crate::message::DigitallySigned;
use crate::types::{AlertDescription, HashAlgorithm, KeyFamily, ProtocolVersion, SignatureScheme};
use crate::Error;

const TLS13_SERVER_CONTEXT: &[u8] = b"TLS 1.3, server CertificateVerify";
const TLS13_CLIENT_CONTEXT: &[u8] = b"TLS 1.3, client CertificateVerify";

fn crypto(e: String) -> Error {
    Error::CryptoError(e)
}

fn hash(provider: &CryptoProvider, hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, Error> {
    provider
        .hash(hash, data)
        .ok_or_else(|| Error::CryptoError(format!("{} not available", hash.name())))
}

/// Digest signed by the versions before TLS 1.2.
pub(crate) fn legacy_digest(
    provider: &CryptoProvider,
    family: KeyFamily,
    content: &[u8],
) -> Result<Vec<u8>, Error> {
    let sha1 = hash(provider, HashAlgorithm::SHA1, content)?;
    if family == KeyFamily::Ec {
        return Ok(sha1);
    }
    let mut out = hash(provider, HashAlgorithm::MD5, content)?;
    out.extend_from_slice(&sha1);
    Ok(out)
}

/// Cut a legacy MD5 + SHA-1 digest down to what `family` signs.
fn fit_legacy(family: KeyFamily, digest: Vec<u8>) -> Vec<u8> {
    if family == KeyFamily::Ec && digest.len() > 20 {
        digest[digest.len() - 20..].to_vec()
    } else {
        digest
    }
}

/// The bytes a ServerKeyExchange signature covers.
pub(crate) fn key_exchange_content(client_random: &[u8], server_random: &[u8], params: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + params.len());
    out.extend_from_slice(client_random);
    out.extend_from_slice(server_random);
    out.extend_from_slice(params);
    out
}

/// The bytes a TLS 1.3 CertificateVerify signature covers.
pub(crate) fn tls13_content(server: bool, transcript_hash: &[u8]) -> Vec<u8> {
    let context = if server {
        TLS13_SERVER_CONTEXT
    } else {
        TLS13_CLIENT_CONTEXT
    };
    let mut out = vec![0x20; 64];
    out.extend_from_slice(context);
    out.push(0);
    out.extend_from_slice(transcript_hash);
    out
}

/// Sign arbitrary content, falling back to the legacy digest before TLS 1.2.
pub(crate) fn sign(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    identity: &Identity,
    scheme: Option<SignatureScheme>,
    content: &[u8],
) -> Result<DigitallySigned, Error> {
    let signature = if version.use_tls12_plus() {
        let scheme = scheme.ok_or_else(|| Error::internal("No signature scheme selected"))?;
        identity.key().sign(Some(scheme), content).map_err(crypto)?
    } else {
        let digest = legacy_digest(provider, identity.family(), content)?;
        identity.key().sign(None, &digest).map_err(crypto)?
    };
    Ok(DigitallySigned {
        scheme: if version.use_tls12_plus() { scheme } else { None },
        signature,
    })
}

/// Check that a peer scheme is one we asked for and fits the peer key.
pub(crate) fn check_peer_scheme(
    ctx: &HandshakeContext,
    scheme: SignatureScheme,
    info: &PublicKeyInfo,
) -> Result<(), Error> {
    let version = ctx.version()?;
    let local = crate::extension::local_schemes(ctx);
    let ok = ctx.config.catalogs().accepts_peer_scheme(
        scheme,
        &local,
        version,
        info.family,
        info.bits,
        info.curve,
    ) && ctx.config.constraints().permits_scheme(scheme);
    if !ok {
        let name = scheme_spec(scheme).map(|s| s.name).unwrap_or("unknown");
        debug!("Peer signed with unacceptable scheme {}", name);
        return Err(Error::illegal(format!("Unacceptable signature scheme {}", name)));
    }
    Ok(())
}

/// Verify a signature over `content` by the leaf of `chain`.
pub(crate) fn verify(
    ctx: &HandshakeContext,
    chain: &[Vec<u8>],
    info: &PublicKeyInfo,
    signed: &DigitallySigned,
    content: &[u8],
) -> Result<(), Error> {
    let version = ctx.version()?;
    let leaf = chain
        .first()
        .ok_or_else(|| Error::internal("No peer certificate to verify with"))?;
    let result = if version.use_tls12_plus() {
        let scheme = signed
            .scheme
            .ok_or_else(|| Error::decode("Signature without a scheme"))?;
        check_peer_scheme(ctx, scheme, info)?;
        ctx.provider()
            .signature_verification
            .verify_signature(leaf, Some(scheme), content, &signed.signature)
    } else {
        let digest = legacy_digest(ctx.provider(), info.family, content)?;
        ctx.provider()
            .signature_verification
            .verify_signature(leaf, None, &digest, &signed.signature)
    };
    result.map_err(|e| {
        debug!("Signature verification failed: {}", e);
        Error::NegotiationFailure(AlertDescription::DecryptError, "Bad signature".to_string())
    })
}

/// What a CertificateVerify signs or checks at the negotiated version.
///
/// The returned flag tells whether the bytes are already the digest.
fn certificate_verify_input(
    ctx: &HandshakeContext,
    signer: Role,
    family: KeyFamily,
) -> Result<(Vec<u8>, bool), Error> {
    let version = ctx.version()?;
    if version.use_tls13_plus() {
        let th = ctx.transcript.digest()?;
        return Ok((tls13_content(signer == Role::Server, &th), false));
    }
    if version.use_tls12_plus() {
        return Ok((ctx.transcript.messages().to_vec(), false));
    }
    if version == ProtocolVersion::SSL3_0 {
        let (md5, sha1) = ctx
            .transcript
            .legacy_contexts()
            .ok_or_else(|| Error::internal("SSL 3.0 transcript without MD5 and SHA-1"))?;
        let ms = ctx
            .keys
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::internal("No master secret for CertificateVerify"))?;
        let digest = ssl3_certificate_verify(ctx.provider(), md5, sha1, ms)?;
        return Ok((fit_legacy(family, digest), true));
    }
    // TLS 1.0 and 1.1: the running MD5 and SHA-1 are the digest.
    Ok((fit_legacy(family, ctx.transcript.digest()?), true))
}

/// Produce the CertificateVerify signature of `identity`.
pub(crate) fn sign_certificate_verify(
    ctx: &HandshakeContext,
    identity: &Identity,
    scheme: Option<SignatureScheme>,
) -> Result<DigitallySigned, Error> {
    let version = ctx.version()?;
    let (input, digested) = certificate_verify_input(ctx, ctx.role, identity.family())?;
    let signature = if digested {
        identity.key().sign(None, &input).map_err(crypto)?
    } else {
        let scheme = scheme.ok_or_else(|| Error::internal("No signature scheme selected"))?;
        identity.key().sign(Some(scheme), &input).map_err(crypto)?
    };
    Ok(DigitallySigned {
        scheme: if version.use_tls12_plus() { scheme } else { None },
        signature,
    })
}

/// Check the peer's CertificateVerify. Must run before the message enters
/// the transcript.
pub(crate) fn verify_certificate_verify(
    ctx: &HandshakeContext,
    chain: &[Vec<u8>],
    info: &PublicKeyInfo,
    signed: &DigitallySigned,
) -> Result<(), Error> {
    let peer = match ctx.role {
        Role::Client => Role::Server,
        Role::Server => Role::Client,
    };
    let (input, digested) = certificate_verify_input(ctx, peer, info.family)?;
    let leaf = chain
        .first()
        .ok_or_else(|| Error::internal("No peer certificate to verify with"))?;
    let result = if digested {
        ctx.provider()
            .signature_verification
            .verify_signature(leaf, None, &input, &signed.signature)
    } else {
        let scheme = signed
            .scheme
            .ok_or_else(|| Error::decode("Signature without a scheme"))?;
        check_peer_scheme(ctx, scheme, info)?;
        ctx.provider()
            .signature_verification
            .verify_signature(leaf, Some(scheme), &input, &signed.signature)
    };
    result.map_err(|e| {
        debug!("CertificateVerify failed: {}", e);
        Error::NegotiationFailure(AlertDescription::DecryptError, "Bad CertificateVerify".to_string())
    })
}
