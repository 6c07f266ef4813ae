//! Key exchange: what each side holds, what it learned from the peer, and
//! how the premaster secret comes out of it.
//!
//! Possessions are local secrets (the identity key, an ephemeral key
//! exchange, a temporary export key). Credentials are peer public material
//! (the certificate chain, an ephemeral public value, a temporary RSA key).

use std::sync::Arc;

use crate::catalog::{auth_families, GroupKind, NamedGroupSpec};
use crate::crypto::{ActiveKeyExchange, EphemeralRsaKey, Identity, PublicKeyInfo};
use crate::extension::{local_groups, local_schemes, peer_authorities, peer_groups};
use crate::extension::{peer_certificate_schemes, peer_signature_schemes};
use crate::handshake::context::{HandshakeContext, Secret};
use crate::message::ClientKeyExchange;
use crate::types::{CipherSuiteSpec, HandshakeType, KeyExchangeAlgorithm, KeyFamily};
use crate::types::{NamedGroup, ProtocolVersion, SignatureScheme};
use crate::Error;

pub(crate) mod signature;

/// Size of an RSA premaster secret.
const PREMASTER_LEN: usize = 48;

/// Export suites cap the key transport modulus at this size.
const EXPORT_RSA_BITS: usize = 512;

/// Local key material of one handshake.
#[derive(Debug)]
pub(crate) enum Possession {
    /// Certificate and private key, with the scheme chosen to sign.
    Identity {
        identity: Arc<Identity>,
        scheme: Option<SignatureScheme>,
    },
    /// Ephemeral (EC)DHE key pair.
    Ephemeral(Box<dyn ActiveKeyExchange>),
    /// Temporary RSA key of an export exchange.
    EphemeralRsa(Box<dyn EphemeralRsaKey>),
}

/// Public material received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Credential {
    Certificate {
        chain: Vec<Vec<u8>>,
        info: PublicKeyInfo,
    },
    EphemeralPublic {
        group: NamedGroup,
        public: Vec<u8>,
    },
    RsaPublic {
        modulus: Vec<u8>,
        exponent: Vec<u8>,
    },
}

/// What the server needs to run the key exchange of one suite.
#[derive(Debug)]
pub(crate) struct KxSelection {
    pub possessions: Vec<Possession>,
    pub group: Option<NamedGroup>,
    pub scheme: Option<SignatureScheme>,
}

fn is_ecdhe(kx: KeyExchangeAlgorithm) -> bool {
    matches!(
        kx,
        KeyExchangeAlgorithm::EcdheEcdsa | KeyExchangeAlgorithm::EcdheRsa | KeyExchangeAlgorithm::EcdhAnon
    )
}

/// Whether the server signs a ServerKeyExchange in this exchange.
pub(crate) fn signs_key_exchange(kx: KeyExchangeAlgorithm) -> bool {
    matches!(
        kx,
        KeyExchangeAlgorithm::EcdheEcdsa
            | KeyExchangeAlgorithm::EcdheRsa
            | KeyExchangeAlgorithm::DheRsa
            | KeyExchangeAlgorithm::RsaExport
    )
}

/// Whether the server sends a ServerKeyExchange.
pub(crate) fn sends_key_exchange(ctx: &HandshakeContext, kx: KeyExchangeAlgorithm) -> bool {
    match kx {
        KeyExchangeAlgorithm::Rsa | KeyExchangeAlgorithm::EcdhEcdsa | KeyExchangeAlgorithm::Tls13 => false,
        KeyExchangeAlgorithm::RsaExport => ctx
            .possessions
            .iter()
            .any(|p| matches!(p, Possession::EphemeralRsa(_))),
        _ => true,
    }
}

/// The scheme `key` signs with at `version`, `None` before TLS 1.2.
fn signing_scheme(
    ctx: &HandshakeContext,
    identity: &Identity,
    version: ProtocolVersion,
) -> Option<Option<SignatureScheme>> {
    if !version.use_tls12_plus() {
        return Some(None);
    }
    let peer = peer_signature_schemes(ctx, HandshakeType::ClientHello);
    let local = local_schemes(ctx);
    ctx.config
        .catalogs()
        .preferable_scheme(
            &peer,
            &local,
            version,
            identity.key().as_ref(),
            ctx.config.constraints(),
        )
        .map(Some)
}

/// Pick the group of an (EC)DHE exchange at TLS 1.2 and earlier.
fn key_exchange_group(ctx: &HandshakeContext, kx: KeyExchangeAlgorithm) -> Option<NamedGroup> {
    let version = ctx.version().ok()?;
    let local = local_groups(ctx);
    let catalogs = ctx.config.catalogs();
    if is_ecdhe(kx) {
        let ecc: &dyn Fn(&NamedGroupSpec) -> bool = &|g| g.is_ecc();
        // A client without supported_groups takes secp256r1 (RFC 8422 5.1.1).
        let default = [NamedGroup::Secp256r1];
        let peer = peer_groups(ctx).unwrap_or(&default[..]);
        return catalogs.preferable_group(peer, &local, version, Some(ecc));
    }
    let ffdhe: &dyn Fn(&NamedGroupSpec) -> bool = &|g| g.kind == GroupKind::Ffdhe;
    let listed = peer_groups(ctx)
        .map(|p| p.iter().any(|g| g.is_ffdhe()))
        .unwrap_or(false);
    if listed {
        let peer = peer_groups(ctx).unwrap_or_default();
        return catalogs.preferable_group(peer, &local, version, Some(ffdhe));
    }
    // No RFC 7919 negotiation, any local group works.
    local.iter().copied().find(|g| g.is_ffdhe())
}

/// Server: collect what `spec` needs, or `None` when this suite cannot run.
pub(crate) fn create_possessions(
    ctx: &HandshakeContext,
    spec: &CipherSuiteSpec,
) -> Result<Option<KxSelection>, Error> {
    let version = ctx.version()?;
    let mut selection = KxSelection {
        possessions: Vec::new(),
        group: None,
        scheme: None,
    };

    if spec.kx.is_authenticated() {
        let families = auth_families(spec);
        let authorities = peer_authorities(ctx, HandshakeType::ClientHello);
        let cert_schemes = peer_certificate_schemes(ctx, HandshakeType::ClientHello);
        let server_name = ctx.negotiated.server_name.as_deref();
        let Some(identity) = ctx.config.key_manager().choose_server_identity(
            &families,
            &authorities,
            &cert_schemes,
            server_name,
        ) else {
            trace!("No identity for {}", spec.name);
            return Ok(None);
        };
        let info = identity.public_key();
        if !ctx.config.constraints().permits_key(info.family, info.bits) {
            trace!("Identity key too weak for {}", spec.name);
            return Ok(None);
        }
        // An ECDSA certificate must be on a curve the client can verify.
        if info.family == KeyFamily::Ec {
            if let (Some(curve), Some(groups)) = (info.curve, peer_groups(ctx)) {
                if !groups.contains(&curve) {
                    trace!("Client cannot use curve {:?}", curve);
                    return Ok(None);
                }
            }
        }
        let scheme = if signs_key_exchange(spec.kx) || spec.kx == KeyExchangeAlgorithm::Tls13 {
            match signing_scheme(ctx, &identity, version) {
                Some(s) => s,
                None => {
                    trace!("No signature scheme for {}", spec.name);
                    return Ok(None);
                }
            }
        } else {
            None
        };

        if spec.kx == KeyExchangeAlgorithm::RsaExport && info.bits > EXPORT_RSA_BITS {
            let temp = ctx
                .provider()
                .key_transport
                .generate_ephemeral(EXPORT_RSA_BITS)
                .map_err(Error::CryptoError)?;
            selection.possessions.push(Possession::EphemeralRsa(temp));
        }
        selection.scheme = scheme;
        selection.possessions.push(Possession::Identity { identity, scheme });
    }

    if is_ecdhe(spec.kx) || spec.kx.is_ffdhe() {
        let Some(group) = key_exchange_group(ctx, spec.kx) else {
            trace!("No group for {}", spec.name);
            return Ok(None);
        };
        let Some(kx_group) = ctx.provider().kx_group(group) else {
            return Ok(None);
        };
        let kx = kx_group.start_exchange().map_err(Error::CryptoError)?;
        selection.group = Some(group);
        selection.possessions.push(Possession::Ephemeral(kx));
    }

    Ok(Some(selection))
}

fn take_ephemeral(ctx: &mut HandshakeContext) -> Result<Box<dyn ActiveKeyExchange>, Error> {
    let idx = ctx
        .possessions
        .iter()
        .position(|p| matches!(p, Possession::Ephemeral(_)))
        .ok_or_else(|| Error::internal("No ephemeral key exchange"))?;
    match ctx.possessions.remove(idx) {
        Possession::Ephemeral(kx) => Ok(kx),
        _ => Err(Error::internal("No ephemeral key exchange")),
    }
}

/// Run the ephemeral exchange held in the possessions against `peer`.
pub(crate) fn complete_ephemeral(ctx: &mut HandshakeContext, peer: &[u8]) -> Result<Secret, Error> {
    let kx = take_ephemeral(ctx)?;
    agree(kx, peer)
}

fn agree(kx: Box<dyn ActiveKeyExchange>, peer: &[u8]) -> Result<Secret, Error> {
    let ffdhe = kx.group().is_ffdhe();
    let shared = kx.complete(peer).map_err(|e| {
        debug!("Key agreement failed: {}", e);
        Error::illegal("Invalid peer key share")
    })?;
    Ok(if ffdhe {
        strip_leading_zeros(shared)
    } else {
        Secret::new(shared)
    })
}

/// A DH premaster secret drops its leading zero bytes (RFC 5246 8.1.2).
fn strip_leading_zeros(mut shared: Vec<u8>) -> Secret {
    let zeros = shared.iter().take_while(|b| **b == 0).count();
    shared.drain(..zeros);
    Secret::new(shared)
}

fn peer_ephemeral(ctx: &HandshakeContext) -> Result<(NamedGroup, Vec<u8>), Error> {
    ctx.credentials
        .iter()
        .find_map(|c| match c {
            Credential::EphemeralPublic { group, public } => Some((*group, public.clone())),
            _ => None,
        })
        .ok_or_else(|| Error::internal("No server key exchange parameters"))
}

/// Client: build the ClientKeyExchange and the premaster secret.
pub(crate) fn client_key_exchange(
    ctx: &mut HandshakeContext,
) -> Result<(ClientKeyExchange, Secret), Error> {
    let spec = ctx.suite_spec()?;
    match spec.kx {
        KeyExchangeAlgorithm::Rsa | KeyExchangeAlgorithm::RsaExport => {
            let hello_version = ctx
                .client_hello
                .as_ref()
                .map(|ch| ch.legacy_version)
                .ok_or_else(|| Error::internal("No ClientHello sent"))?;
            let mut pms = ctx.secret_bytes(PREMASTER_LEN)?;
            pms[..2].copy_from_slice(&hello_version.as_u16().to_be_bytes());

            let transport = ctx.provider().key_transport;
            let temp = ctx.credentials.iter().find_map(|c| match c {
                Credential::RsaPublic { modulus, exponent } => Some((modulus, exponent)),
                _ => None,
            });
            let encrypted = match temp {
                Some((m, e)) => transport.encrypt_with_key(m, e, &pms),
                None => {
                    let Some(Credential::Certificate { chain, .. }) = ctx.peer_certificate() else {
                        return Err(Error::internal("No server certificate for RSA"));
                    };
                    let leaf = chain
                        .first()
                        .ok_or_else(|| Error::internal("Empty server chain"))?;
                    transport.encrypt(leaf, &pms)
                }
            }
            .map_err(Error::CryptoError)?;
            Ok((ClientKeyExchange::Rsa(encrypted), pms))
        }
        KeyExchangeAlgorithm::EcdhEcdsa => {
            // Static ECDH against the key in the server certificate.
            let Some(Credential::Certificate { info, .. }) = ctx.peer_certificate() else {
                return Err(Error::internal("No server certificate for ECDH"));
            };
            let group = info
                .curve
                .ok_or_else(|| Error::handshake_failure("Server certificate has no named curve"))?;
            let public = info.public_key.clone();
            exchange_with(ctx, group, &public, ClientKeyExchange::Ecdh)
        }
        kx if kx.is_ecc() => {
            let (group, public) = peer_ephemeral(ctx)?;
            exchange_with(ctx, group, &public, ClientKeyExchange::Ecdh)
        }
        kx if kx.is_ffdhe() => {
            let (group, public) = peer_ephemeral(ctx)?;
            exchange_with(ctx, group, &public, ClientKeyExchange::Dh)
        }
        other => Err(Error::internal(format!("No ClientKeyExchange for {:?}", other))),
    }
}

fn exchange_with(
    ctx: &mut HandshakeContext,
    group: NamedGroup,
    peer: &[u8],
    wrap: fn(Vec<u8>) -> ClientKeyExchange,
) -> Result<(ClientKeyExchange, Secret), Error> {
    let kx_group = ctx
        .provider()
        .kx_group(group)
        .ok_or_else(|| Error::handshake_failure(format!("Group {:?} not available", group)))?;
    let kx = kx_group.start_exchange().map_err(Error::CryptoError)?;
    let public = kx.pub_key().to_vec();
    // Not through the possessions: a TLS 1.3 key share may still sit there.
    let pms = agree(kx, peer)?;
    ctx.negotiated.group = Some(group);
    Ok((wrap(public), pms))
}

/// Server: recover the premaster secret from the ClientKeyExchange.
pub(crate) fn server_premaster(ctx: &mut HandshakeContext, cke: &ClientKeyExchange) -> Result<Secret, Error> {
    let spec = ctx.suite_spec()?;
    match (spec.kx, cke) {
        (KeyExchangeAlgorithm::Rsa | KeyExchangeAlgorithm::RsaExport, ClientKeyExchange::Rsa(data)) => {
            rsa_premaster(ctx, data)
        }
        (KeyExchangeAlgorithm::EcdhEcdsa, ClientKeyExchange::Ecdh(public)) => {
            let (identity, _) = ctx
                .identity()
                .ok_or_else(|| Error::internal("No identity for static ECDH"))?;
            let shared = identity.key().agree(public).map_err(|e| {
                debug!("Static ECDH failed: {}", e);
                Error::illegal("Invalid client ECDH point")
            })?;
            Ok(Secret::new(shared))
        }
        (_, ClientKeyExchange::Ecdh(public)) | (_, ClientKeyExchange::Dh(public)) => {
            complete_ephemeral(ctx, public)
        }
        _ => Err(Error::internal("ClientKeyExchange does not fit the suite")),
    }
}

/// Decrypt an RSA premaster. Any failure is hidden behind a random secret so
/// the client learns nothing before Finished (RFC 5246 7.4.7.1).
fn rsa_premaster(ctx: &HandshakeContext, data: &[u8]) -> Result<Secret, Error> {
    let fallback = ctx.secret_bytes(PREMASTER_LEN)?;
    let temp = ctx.possessions.iter().find_map(|p| match p {
        Possession::EphemeralRsa(k) => Some(k),
        _ => None,
    });
    let decrypted = match temp {
        Some(k) => k.decrypt(data),
        None => {
            let (identity, _) = ctx
                .identity()
                .ok_or_else(|| Error::internal("No identity for RSA key transport"))?;
            identity.key().decrypt(data)
        }
    };
    let expected = ctx
        .client_hello
        .as_ref()
        .map(|ch| ch.legacy_version.as_u16().to_be_bytes());
    match decrypted {
        Ok(pms) if pms.len() == PREMASTER_LEN && Some([pms[0], pms[1]]) == expected => {
            Ok(Secret::new(pms))
        }
        Ok(_) | Err(_) => {
            debug!("RSA premaster rejected, continuing with a random secret");
            Ok(fallback)
        }
    }
}

/// Client: find the provider group with these finite field parameters.
pub(crate) fn ffdhe_group(ctx: &HandshakeContext, p: &[u8], g: &[u8]) -> Option<NamedGroup> {
    ctx.provider().kx_groups.iter().find_map(|kx| {
        let params = kx.ffdhe_params()?;
        (params.p == p && params.g == g).then(|| kx.name())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dh_secret_loses_leading_zeros() {
        let s = strip_leading_zeros(vec![0, 0, 1, 0, 2]);
        assert_eq!(&s[..], &[1, 0, 2]);
    }

    #[test]
    fn key_exchange_signing() {
        assert!(signs_key_exchange(KeyExchangeAlgorithm::EcdheRsa));
        assert!(!signs_key_exchange(KeyExchangeAlgorithm::Rsa));
        assert!(!signs_key_exchange(KeyExchangeAlgorithm::EcdhAnon));
    }
}
