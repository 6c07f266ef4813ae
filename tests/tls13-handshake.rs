//! TLS 1.3 handshakes between two in-memory handshakers.


use std::sync::Arc;
use std::time::Instant;

use handshake_common::*;
use tlshake::crypto::rust_crypto::default_provider;
use tlshake::crypto::Identity;
use tlshake::types::{AlertDescription, CipherSuite, HandshakeType, NamedGroup, ProtocolVersion};
use tlshake::types::SignatureScheme;
use tlshake::{ClientAuth, Error, Handshaker, Phase, Secrets, TrafficStage};

const TLS13: &[ProtocolVersion] = &[ProtocolVersion::TLS1_3];

fn traffic(secrets: &[Secrets], stage: TrafficStage) -> Option<Secrets> {
    secrets
        .iter()
        .find(|s| matches!(s, Secrets::Traffic { stage: st, .. } if *st == stage))
        .cloned()
}

#[test]
fn tls13_full_handshake() {
    let (client, server, outcome) = connect(&client_config(TLS13), &server_config(TLS13));

    let c = client.negotiated();
    let s = server.negotiated();
    assert_eq!(c.version(), Some(ProtocolVersion::TLS1_3));
    assert_eq!(c.cipher_suite(), s.cipher_suite());
    assert_eq!(c.named_group(), Some(NamedGroup::X25519));
    assert!(!c.resumed());
    assert_eq!(c.peer_certificates().len(), 1);
    assert_eq!(c.peer_certificates(), s.local_certificates());
    assert!(s.peer_certificates().is_empty());
    assert_eq!(c.server_name(), Some(SERVER_NAME));

    // Both sides derive the same traffic secrets.
    for stage in [TrafficStage::Handshake, TrafficStage::Application] {
        let ct = traffic(&outcome.server.secrets, stage);
        let st = traffic(&outcome.client.secrets, stage);
        assert!(ct.is_some(), "{:?} secrets missing", stage);
        assert_eq!(ct, st);
    }

    assert_eq!(
        outcome.server.types()[..5],
        [
            HandshakeType::ServerHello.as_u8(),
            HandshakeType::EncryptedExtensions.as_u8(),
            HandshakeType::Certificate.as_u8(),
            HandshakeType::CertificateVerify.as_u8(),
            HandshakeType::Finished.as_u8(),
        ]
    );
    assert_eq!(outcome.server.change_cipher_specs, 0);
}

#[test]
fn tls13_server_prefers_its_suite_order() {
    let client = Arc::new(
        client_builder(TLS13)
            .cipher_suites(&[
                CipherSuite::TLS13_AES_128_GCM_SHA256,
                CipherSuite::TLS13_AES_256_GCM_SHA384,
            ])
            .build()
            .unwrap(),
    );
    let server = Arc::new(
        server_builder(TLS13)
            .cipher_suites(&[CipherSuite::TLS13_AES_256_GCM_SHA384])
            .build()
            .unwrap(),
    );
    let (c, _, _) = connect(&client, &server);
    assert_eq!(
        c.negotiated().cipher_suite(),
        Some(CipherSuite::TLS13_AES_256_GCM_SHA384)
    );
}

#[test]
fn tls13_hello_retry_for_group() {
    let client = Arc::new(
        client_builder(TLS13)
            .named_groups(&[NamedGroup::X25519, NamedGroup::Secp256r1])
            .build()
            .unwrap(),
    );
    let server = Arc::new(
        server_builder(TLS13)
            .named_groups(&[NamedGroup::Secp256r1])
            .build()
            .unwrap(),
    );
    let (c, s, outcome) = connect(&client, &server);

    assert_eq!(c.negotiated().named_group(), Some(NamedGroup::Secp256r1));
    assert_eq!(s.negotiated().named_group(), Some(NamedGroup::Secp256r1));

    // Two hellos from the client, the retry first from the server.
    let hellos = outcome
        .client
        .types()
        .iter()
        .filter(|t| **t == HandshakeType::ClientHello.as_u8())
        .count();
    assert_eq!(hellos, 2);
    assert_eq!(outcome.server.types()[0], HandshakeType::ServerHello.as_u8());
    assert_eq!(
        traffic(&outcome.client.secrets, TrafficStage::Application),
        traffic(&outcome.server.secrets, TrafficStage::Application)
    );
}

#[test]
fn tls13_mutual_authentication() {
    let client = Arc::new(
        client_builder(TLS13)
            .with_identity(identity("client"))
            .build()
            .unwrap(),
    );
    let server = Arc::new(
        server_builder(TLS13)
            .client_auth(ClientAuth::Required)
            .build()
            .unwrap(),
    );
    let (c, s, outcome) = connect(&client, &server);

    assert_eq!(s.negotiated().peer_certificates().len(), 1);
    assert_eq!(s.negotiated().peer_certificates(), c.negotiated().local_certificates());
    assert!(s.negotiated().peer_signature_scheme().is_some());
    assert!(outcome
        .server
        .types()
        .contains(&HandshakeType::CertificateRequest.as_u8()));
}

#[test]
fn tls13_server_sends_chain_client_can_verify() {
    let mut params = rcgen::CertificateParams::new(vec![SERVER_NAME.to_string()]);
    params.alg = &rcgen::PKCS_ECDSA_P384_SHA384;
    let cert = rcgen::Certificate::from_params(params).unwrap();
    let der = cert.serialize_der().unwrap();
    let p384 = Identity::new(
        &default_provider(),
        vec![der.clone()],
        &cert.serialize_private_key_der(),
    )
    .unwrap();

    let client = Arc::new(
        client_builder(TLS13)
            .signature_schemes(&[SignatureScheme::ECDSA_SECP384R1_SHA384])
            .build()
            .unwrap(),
    );
    // The P-256 chain comes first but is signed with ecdsa_secp256r1_sha256.
    let server = Arc::new(server_builder(TLS13).with_identity(p384).build().unwrap());
    let (c, s, _) = connect(&client, &server);

    assert_eq!(
        c.negotiated().peer_signature_scheme(),
        Some(SignatureScheme::ECDSA_SECP384R1_SHA384)
    );
    assert_eq!(c.negotiated().peer_certificates(), s.negotiated().local_certificates());
    assert_eq!(c.negotiated().peer_certificates()[0], der);
}

#[test]
fn tls13_optional_client_auth_without_certificate() {
    let server = Arc::new(
        server_builder(TLS13)
            .client_auth(ClientAuth::Requested)
            .build()
            .unwrap(),
    );
    let (_, s, outcome) = connect(&client_config(TLS13), &server);
    assert!(s.negotiated().peer_certificates().is_empty());

    // The client answered with an empty Certificate and no CertificateVerify.
    let types = outcome.client.types();
    assert!(types.contains(&HandshakeType::Certificate.as_u8()));
    assert!(!types.contains(&HandshakeType::CertificateVerify.as_u8()));
}

#[test]
fn tls13_required_client_certificate_missing() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server_config = Arc::new(
        server_builder(TLS13)
            .client_auth(ClientAuth::Required)
            .build()
            .unwrap(),
    );
    let client = Handshaker::client(client_config(TLS13));
    let server = Handshaker::server(server_config);

    let err = handshake(&client, &server, Instant::now()).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::CertificateRequired);
    assert_eq!(server.phase(), Phase::Closed);
    assert_eq!(
        drain(&server).alerts,
        vec![AlertDescription::CertificateRequired]
    );
}

#[test]
fn tls13_server_issues_ticket_after_handshake() {
    let (_, _, outcome) = connect(&client_config(TLS13), &server_config(TLS13));
    let last = *outcome.server.types().last().unwrap();
    assert_eq!(last, HandshakeType::NewSessionTicket.as_u8());
}

#[test]
fn no_common_version() {
    let _ = env_logger::builder().is_test(true).try_init();
    let client = Handshaker::client(client_config(TLS13));
    let server = Handshaker::server(server_config(&[ProtocolVersion::TLS1_2]));

    let err = handshake(&client, &server, Instant::now()).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::ProtocolVersion);
    assert!(matches!(err, Error::NegotiationFailure(_, _)));
}

const HTTP11_SELECTION: &[u8] = &[
    0x00, 0x09, // list length
    0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1',
];

#[test]
fn tls13_alpn_selects_server_preference() {
    let client = Arc::new(
        client_builder(TLS13)
            .alpn_protocols(&["h2", "http/1.1"])
            .build()
            .unwrap(),
    );
    let server = Arc::new(
        server_builder(TLS13)
            .alpn_protocols(&["http/1.1"])
            .build()
            .unwrap(),
    );
    let (c, s, outcome) = connect(&client, &server);

    assert_eq!(c.negotiated().alpn(), Some(&b"http/1.1"[..]));
    assert_eq!(s.negotiated().alpn(), Some(&b"http/1.1"[..]));

    let ee = outcome
        .server
        .body_of(HandshakeType::EncryptedExtensions)
        .expect("EncryptedExtensions");
    let alpn = extensions(ee)
        .into_iter()
        .find(|(t, _)| *t == 0x0010)
        .map(|(_, data)| data)
        .expect("ALPN selection");
    assert_eq!(alpn, HTTP11_SELECTION);
}

#[test]
fn tls13_alpn_without_common_protocol() {
    let _ = env_logger::builder().is_test(true).try_init();
    let client = Handshaker::client(Arc::new(
        client_builder(TLS13).alpn_protocols(&["h2"]).build().unwrap(),
    ));
    let server = Handshaker::server(Arc::new(
        server_builder(TLS13)
            .alpn_protocols(&["http/1.1"])
            .build()
            .unwrap(),
    ));

    let err = handshake(&client, &server, Instant::now()).unwrap_err();
    assert!(matches!(
        err,
        Error::NegotiationFailure(AlertDescription::NoApplicationProtocol, _)
    ));
    assert_eq!(
        drain(&server).alerts,
        vec![AlertDescription::NoApplicationProtocol]
    );
    assert_eq!(server.phase(), Phase::Closed);
}

#[test]
fn alpn_ignored_by_server_without_protocols() {
    let client = Arc::new(
        client_builder(TLS13)
            .alpn_protocols(&["h2"])
            .build()
            .unwrap(),
    );
    let (c, _, _) = connect(&client, &server_config(TLS13));
    assert_eq!(c.negotiated().alpn(), None);
}
