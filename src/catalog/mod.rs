//! Catalogs of cipher suites, named groups and signature schemes.
//!
//! Each entry is checked once against the crypto provider when the catalog is
//! built. The result never changes afterwards, so a catalog can be shared by
//! any number of handshakes without locking.
//!
//! Selection keeps order: lists come out in the order they went in, which is
//! the local preference, and peer lists are scanned first match wins.

use std::sync::Arc;

use once_cell::sync::Lazy;

mod constraints;
mod group;
mod scheme;

pub use constraints::{AlgorithmConstraints, DisabledAlgorithms, PermitAll};
pub use group::{group_spec, GroupKind, NamedGroupSpec};
pub use scheme::{scheme_spec, SignatureSchemeSpec, TLS12_DEFAULT_SCHEMES};

use crate::crypto::rust_crypto::default_provider;
use crate::crypto::{CryptoProvider, SigningKey};
use crate::types::{CipherSuite, CipherSuiteSpec, HashAlgorithm, KeyExchangeAlgorithm};
use crate::types::{KeyFamily, MacAlgorithm, NamedGroup, ProtocolVersion, SignatureAlgorithm};
use crate::types::SignatureScheme;

/// Availability of every catalog entry under one crypto provider.
#[derive(Debug)]
pub struct Catalogs {
    groups: Vec<(&'static NamedGroupSpec, bool)>,
    schemes: Vec<(&'static SignatureSchemeSpec, bool)>,
    suites: Vec<(CipherSuite, bool)>,
    /// MD5 and SHA-1 both present, needed by everything before TLS 1.2.
    legacy_hashes: bool,
}

static DEFAULT_CATALOGS: Lazy<Arc<Catalogs>> =
    Lazy::new(|| initialize_catalogs(&default_provider()));

/// Check every catalog entry against `provider`.
pub fn initialize_catalogs(provider: &CryptoProvider) -> Arc<Catalogs> {
    let groups: Vec<_> = group::GROUPS
        .iter()
        .map(|g| (g, provider.kx_group(g.group).is_some()))
        .collect();

    let schemes: Vec<_> = scheme::SCHEMES
        .iter()
        .map(|s| {
            let ok = provider.signature_verification.supports(s.scheme)
                && (s.hash == HashAlgorithm::None || provider.has_hash(s.hash));
            (s, ok)
        })
        .collect();

    let has_ecc = groups.iter().any(|(g, ok)| *ok && g.is_ecc());
    let has_ffdhe = groups.iter().any(|(g, ok)| *ok && g.kind == GroupKind::Ffdhe);

    let suites = CipherSuite::all()
        .filter_map(|s| s.spec())
        .map(|spec| {
            let mac_ok = spec.mac == MacAlgorithm::Aead || provider.has_hash(spec.mac.hash());
            let kx_ok = match spec.kx {
                KeyExchangeAlgorithm::EcdheEcdsa
                | KeyExchangeAlgorithm::EcdheRsa
                | KeyExchangeAlgorithm::EcdhAnon => has_ecc,
                KeyExchangeAlgorithm::DheRsa | KeyExchangeAlgorithm::DhAnon => has_ffdhe,
                KeyExchangeAlgorithm::Tls13 => has_ecc || has_ffdhe,
                _ => true,
            };
            let ok = provider.has_cipher(spec.bulk)
                && mac_ok
                && provider.has_hash(spec.hash)
                && kx_ok;
            (spec.suite, ok)
        })
        .collect();

    let legacy_hashes =
        provider.has_hash(HashAlgorithm::MD5) && provider.has_hash(HashAlgorithm::SHA1);

    debug!(
        "Catalogs initialized (legacy hashes: {}, groups: {})",
        legacy_hashes,
        groups.iter().filter(|(_, ok)| *ok).count()
    );

    Arc::new(Catalogs {
        groups,
        schemes,
        suites,
        legacy_hashes,
    })
}

/// Catalogs of the default provider, built on first use.
pub fn default_catalogs() -> Arc<Catalogs> {
    DEFAULT_CATALOGS.clone()
}

impl Catalogs {
    /// Whether the provider can run anything older than TLS 1.2.
    pub fn has_legacy_hashes(&self) -> bool {
        self.legacy_hashes
    }

    /// Whether a version can be run at all with this provider.
    pub fn version_available(&self, version: ProtocolVersion) -> bool {
        version.is_known() && (version.use_tls12_plus() || self.legacy_hashes)
    }

    pub fn group_available(&self, group: NamedGroup) -> bool {
        self.groups.iter().any(|(g, ok)| *ok && g.group == group)
    }

    pub fn scheme_available(&self, scheme: SignatureScheme) -> bool {
        self.schemes.iter().any(|(s, ok)| *ok && s.scheme == scheme)
    }

    /// Whether `suite` can be negotiated at `version`.
    pub fn suite_available(&self, suite: CipherSuite, version: ProtocolVersion) -> bool {
        let Some(spec) = suite.spec() else {
            return false;
        };
        let usable = self.suites.iter().any(|(s, ok)| *ok && *s == suite);
        usable && spec.supports(version) && self.version_available(version)
    }

    /// Configured suites that are available for at least one of `versions`
    /// and permitted by `constraints`, in configured order.
    pub fn supported_suites(
        &self,
        configured: &[CipherSuite],
        versions: &[ProtocolVersion],
        constraints: &dyn AlgorithmConstraints,
    ) -> Vec<CipherSuite> {
        configured
            .iter()
            .copied()
            .filter(|s| versions.iter().any(|v| self.suite_available(*s, *v)))
            .filter(|s| s.spec().map(|spec| constraints.permits_suite(spec)).unwrap_or(false))
            .collect()
    }

    /// Configured groups that are available for at least one of `versions`
    /// and permitted by `constraints`, in configured order.
    pub fn supported_groups(
        &self,
        configured: &[NamedGroup],
        versions: &[ProtocolVersion],
        constraints: &dyn AlgorithmConstraints,
    ) -> Vec<NamedGroup> {
        configured
            .iter()
            .copied()
            .filter(|g| self.group_available(*g))
            .filter(|g| group_spec(*g).map(|s| s.supports_any(versions)).unwrap_or(false))
            .filter(|g| constraints.permits_group(*g))
            .collect()
    }

    /// First group of `peer` that is also in `local` and usable at `version`.
    ///
    /// `kind` narrows the search to the groups a TLS 1.2 key exchange can use.
    pub fn preferable_group(
        &self,
        peer: &[NamedGroup],
        local: &[NamedGroup],
        version: ProtocolVersion,
        kind: Option<&dyn Fn(&NamedGroupSpec) -> bool>,
    ) -> Option<NamedGroup> {
        peer.iter().copied().find(|g| {
            local.contains(g)
                && group_spec(*g)
                    .map(|s| s.supports(version) && kind.map(|k| k(s)).unwrap_or(true))
                    .unwrap_or(false)
        })
    }

    /// Configured schemes that are available for at least one of `versions`
    /// and permitted by `constraints`, in configured order.
    pub fn supported_schemes(
        &self,
        configured: &[SignatureScheme],
        versions: &[ProtocolVersion],
        constraints: &dyn AlgorithmConstraints,
    ) -> Vec<SignatureScheme> {
        configured
            .iter()
            .copied()
            .filter(|s| self.scheme_available(*s))
            .filter(|s| {
                scheme_spec(*s)
                    .map(|spec| versions.iter().any(|v| spec.supports(*v)))
                    .unwrap_or(false)
            })
            .filter(|s| constraints.permits_scheme(*s))
            .collect()
    }

    /// Whether `scheme` may sign handshake messages at `version`.
    pub fn handshake_scheme_usable(&self, scheme: SignatureScheme, version: ProtocolVersion) -> bool {
        self.scheme_available(scheme)
            && scheme_spec(scheme)
                .map(|s| s.supports_handshake(version))
                .unwrap_or(false)
    }

    /// First scheme of `peer` that `key` can sign with at `version`.
    ///
    /// The scheme must also be in `local`. No re-sorting: the peer's order
    /// decides.
    pub fn preferable_scheme(
        &self,
        peer: &[SignatureScheme],
        local: &[SignatureScheme],
        version: ProtocolVersion,
        key: &dyn SigningKey,
        constraints: &dyn AlgorithmConstraints,
    ) -> Option<SignatureScheme> {
        peer.iter().copied().find(|s| {
            let Some(spec) = scheme_spec(*s) else {
                return false;
            };
            local.contains(s)
                && self.handshake_scheme_usable(*s, version)
                && constraints.permits_scheme(*s)
                && key_matches(spec, key.family(), key.bits(), key.curve(), version)
                && key.supports(*s)
        })
    }

    /// Whether a peer signature with `scheme` from a key of this shape is acceptable.
    pub fn accepts_peer_scheme(
        &self,
        scheme: SignatureScheme,
        local: &[SignatureScheme],
        version: ProtocolVersion,
        family: KeyFamily,
        bits: usize,
        curve: Option<NamedGroup>,
    ) -> bool {
        let Some(spec) = scheme_spec(scheme) else {
            return false;
        };
        local.contains(&scheme)
            && self.handshake_scheme_usable(scheme, version)
            && key_matches(spec, family, bits, curve, version)
    }
}

fn key_matches(
    spec: &SignatureSchemeSpec,
    family: KeyFamily,
    bits: usize,
    curve: Option<NamedGroup>,
    version: ProtocolVersion,
) -> bool {
    // An rsaEncryption key may sign rsa_pss_rsae, an RSASSA-PSS key only rsa_pss_pss.
    if spec.family != family {
        return false;
    }
    if bits < spec.min_key_bits {
        return false;
    }
    if version.use_tls13_plus() && spec.scheme.signature_algorithm() == SignatureAlgorithm::ECDSA {
        return spec.curve.is_some() && spec.curve == curve;
    }
    true
}

/// Key families a key exchange may authenticate with, in preference order.
pub fn auth_families(spec: &CipherSuiteSpec) -> Vec<KeyFamily> {
    match spec.kx {
        KeyExchangeAlgorithm::Tls13 => {
            vec![KeyFamily::Ec, KeyFamily::RsaPss, KeyFamily::Rsa, KeyFamily::Ed25519]
        }
        KeyExchangeAlgorithm::EcdheRsa | KeyExchangeAlgorithm::DheRsa => {
            vec![KeyFamily::Rsa, KeyFamily::RsaPss]
        }
        other => other.server_key_family().into_iter().collect(),
    }
}

/// All known groups in default preference order.
pub fn default_groups() -> Vec<NamedGroup> {
    group::GROUPS.iter().map(|g| g.group).collect()
}

/// All known schemes in default preference order.
pub fn default_schemes() -> Vec<SignatureScheme> {
    scheme::SCHEMES.iter().map(|s| s.scheme).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PROTOCOLS_TO_13;

    #[test]
    fn default_provider_availability() {
        let c = default_catalogs();
        assert!(c.has_legacy_hashes());
        assert!(c.group_available(NamedGroup::X25519));
        assert!(c.group_available(NamedGroup::Ffdhe2048));
        assert!(!c.group_available(NamedGroup::X448));
        assert!(c.scheme_available(SignatureScheme::ECDSA_SECP256R1_SHA256));
        assert!(!c.scheme_available(SignatureScheme::RSA_PKCS1_SHA1));
        assert!(!c.scheme_available(SignatureScheme::ED25519));
        assert!(c.suite_available(CipherSuite::TLS13_AES_128_GCM_SHA256, ProtocolVersion::TLS1_3));
        assert!(c.suite_available(CipherSuite::RSA_AES128_CBC_SHA, ProtocolVersion::TLS1_2));
        assert!(c.suite_available(CipherSuite::RSA_AES128_CBC_SHA, ProtocolVersion::SSL3_0));
        assert!(c.version_available(ProtocolVersion::TLS1_1));
    }

    #[test]
    fn supported_lists_are_stable_and_ordered() {
        let c = default_catalogs();
        let configured = vec![NamedGroup::Secp384r1, NamedGroup::X448, NamedGroup::X25519];
        let a = c.supported_groups(&configured, PROTOCOLS_TO_13, &PermitAll);
        let b = c.supported_groups(&configured, PROTOCOLS_TO_13, &PermitAll);
        assert_eq!(a, vec![NamedGroup::Secp384r1, NamedGroup::X25519]);
        assert_eq!(a, b);

        let s1 = c.supported_schemes(&default_schemes(), PROTOCOLS_TO_13, &PermitAll);
        let s2 = c.supported_schemes(&default_schemes(), PROTOCOLS_TO_13, &PermitAll);
        assert_eq!(s1, s2);
        assert_eq!(s1[0], SignatureScheme::ECDSA_SECP256R1_SHA256);
    }

    #[test]
    fn constraints_filter_groups() {
        let c = default_catalogs();
        let d = DisabledAlgorithms {
            groups: vec![NamedGroup::X25519],
            ..Default::default()
        };
        let g = c.supported_groups(&default_groups(), PROTOCOLS_TO_13, &d);
        assert!(!g.contains(&NamedGroup::X25519));
        assert!(g.contains(&NamedGroup::Secp256r1));
    }

    #[test]
    fn preferable_group_takes_peer_order() {
        let c = default_catalogs();
        let local = vec![NamedGroup::X25519, NamedGroup::Secp256r1];
        let peer = vec![NamedGroup::Secp256r1, NamedGroup::X25519];
        assert_eq!(
            c.preferable_group(&peer, &local, ProtocolVersion::TLS1_3, None),
            Some(NamedGroup::Secp256r1)
        );
        let ffdhe_only = |s: &NamedGroupSpec| s.kind == GroupKind::Ffdhe;
        assert_eq!(
            c.preferable_group(&peer, &local, ProtocolVersion::TLS1_2, Some(&ffdhe_only)),
            None
        );
    }

    #[test]
    fn tls13_binds_ecdsa_curve() {
        let spec = scheme_spec(SignatureScheme::ECDSA_SECP384R1_SHA384).unwrap();
        let p256 = Some(NamedGroup::Secp256r1);
        assert!(!key_matches(spec, KeyFamily::Ec, 256, p256, ProtocolVersion::TLS1_3));
        assert!(key_matches(spec, KeyFamily::Ec, 256, p256, ProtocolVersion::TLS1_2));
    }
}
