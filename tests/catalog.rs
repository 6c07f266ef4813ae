//! Algorithm catalogs as seen through the public API.

use std::sync::Arc;

use tlshake::catalog::{default_catalogs, initialize_catalogs, DisabledAlgorithms, PermitAll};
use tlshake::crypto::rust_crypto::default_provider;
use tlshake::crypto::{CryptoProvider, SupportedKxGroup};
use tlshake::types::{CipherSuite, NamedGroup, ProtocolVersion};

const VERSIONS: &[ProtocolVersion] = &[ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2];

#[test]
fn catalogs_are_stable() {
    let _ = env_logger::builder().is_test(true).try_init();
    let a = default_catalogs();
    let b = default_catalogs();
    assert!(Arc::ptr_eq(&a, &b));

    let suites = CipherSuite::default_suites();
    let first = a.supported_suites(&suites, VERSIONS, &PermitAll);
    let second = a.supported_suites(&suites, VERSIONS, &PermitAll);
    assert!(!first.is_empty());
    assert_eq!(first, second);

    // A fresh catalog over the same provider agrees.
    let fresh = initialize_catalogs(&default_provider());
    assert_eq!(fresh.supported_suites(&suites, VERSIONS, &PermitAll), first);
}

#[test]
fn configured_order_is_kept() {
    let catalogs = default_catalogs();
    let configured = [
        CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
        CipherSuite::TLS13_AES_256_GCM_SHA384,
        CipherSuite::TLS13_AES_128_GCM_SHA256,
    ];
    assert_eq!(
        catalogs.supported_suites(&configured, VERSIONS, &PermitAll),
        configured.to_vec()
    );
    // Only the TLS 1.3 suites run at TLS 1.3.
    assert_eq!(
        catalogs.supported_suites(&configured, &[ProtocolVersion::TLS1_3], &PermitAll),
        configured[1..].to_vec()
    );
}

#[test]
fn defaults_leave_out_weak_suites() {
    let suites = CipherSuite::default_suites();
    for s in &suites {
        let name = format!("{:?}", s);
        assert!(!name.contains("EXPORT"), "{}", name);
        assert!(!name.contains("3DES"), "{}", name);
        assert!(!name.contains("ANON"), "{}", name);
    }
    assert!(suites.contains(&CipherSuite::TLS13_AES_128_GCM_SHA256));
}

#[test]
fn legacy_versions_need_legacy_hashes() {
    let catalogs = default_catalogs();
    assert!(catalogs.version_available(ProtocolVersion::TLS1_2));
    assert!(catalogs.version_available(ProtocolVersion::TLS1_3));
    assert_eq!(
        catalogs.version_available(ProtocolVersion::TLS1_0),
        catalogs.has_legacy_hashes()
    );
}

#[test]
fn constraints_filter_groups() {
    let catalogs = default_catalogs();
    let groups = [NamedGroup::X25519, NamedGroup::Secp256r1];
    let all = catalogs.supported_groups(&groups, VERSIONS, &PermitAll);
    assert_eq!(all, groups.to_vec());
    let defaults = catalogs.supported_groups(&groups, VERSIONS, &DisabledAlgorithms::default());
    assert_eq!(defaults, groups.to_vec());
}

/// The default provider with X25519 as its only key exchange group.
fn x25519_only() -> CryptoProvider {
    let groups: Vec<&'static dyn SupportedKxGroup> = default_provider()
        .kx_groups
        .iter()
        .copied()
        .filter(|g| g.name() == NamedGroup::X25519)
        .collect();
    CryptoProvider {
        kx_groups: Box::leak(groups.into_boxed_slice()),
        ..default_provider()
    }
}

#[test]
fn availability_follows_the_provider() {
    let catalogs = initialize_catalogs(&x25519_only());
    assert!(catalogs.group_available(NamedGroup::X25519));
    assert!(!catalogs.group_available(NamedGroup::Secp256r1));

    let groups = [NamedGroup::Secp256r1, NamedGroup::X25519, NamedGroup::Ffdhe2048];
    assert_eq!(
        catalogs.supported_groups(&groups, VERSIONS, &PermitAll),
        vec![NamedGroup::X25519]
    );
    // Without finite field groups no DHE suite is usable.
    assert!(!catalogs.suite_available(CipherSuite::DHE_RSA_AES128_GCM_SHA256, ProtocolVersion::TLS1_2));
    assert!(catalogs.suite_available(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256, ProtocolVersion::TLS1_2));
}
