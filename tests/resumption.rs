//! Abbreviated handshakes from cached sessions.


use std::sync::Arc;
use std::time::{Duration, Instant};

use handshake_common::*;
use tlshake::types::{HandshakeType, ProtocolVersion};
use tlshake::Handshaker;

const TLS12: &[ProtocolVersion] = &[ProtocolVersion::TLS1_2];
const TLS13: &[ProtocolVersion] = &[ProtocolVersion::TLS1_3];

#[test]
fn tls12_resume_by_session_id() {
    let client = Arc::new(client_builder(TLS12).session_tickets(false).build().unwrap());
    let server = Arc::new(server_builder(TLS12).session_tickets(false).build().unwrap());

    let (c1, s1, _) = connect(&client, &server);
    assert!(!c1.negotiated().resumed());
    assert!(!c1.negotiated().session_id().is_empty());

    let (c2, s2, outcome) = connect(&client, &server);
    assert!(c2.negotiated().resumed());
    assert!(s2.negotiated().resumed());
    assert_eq!(c2.negotiated().session_id(), c1.negotiated().session_id());
    assert_eq!(c2.negotiated().cipher_suite(), s1.negotiated().cipher_suite());
    assert_eq!(c2.negotiated().peer_certificates(), c1.negotiated().peer_certificates());

    // The server finishes first and sends no certificate.
    assert_eq!(
        outcome.server.types(),
        vec![HandshakeType::ServerHello.as_u8(), HandshakeType::Finished.as_u8()]
    );
    assert_eq!(
        outcome.client.types(),
        vec![HandshakeType::ClientHello.as_u8(), HandshakeType::Finished.as_u8()]
    );
}

#[test]
fn tls12_resume_by_ticket() {
    let client = client_config(TLS12);
    let server = server_config(TLS12);

    let (_, _, first) = connect(&client, &server);
    assert!(first
        .server
        .types()
        .contains(&HandshakeType::NewSessionTicket.as_u8()));

    let (c2, s2, outcome) = connect(&client, &server);
    assert!(c2.negotiated().resumed());
    assert!(s2.negotiated().resumed());
    assert!(!outcome
        .server
        .types()
        .contains(&HandshakeType::Certificate.as_u8()));
}

#[test]
fn tls12_no_resumption_without_cache() {
    let client = Arc::new(client_builder(TLS12).session_cache_size(0).build().unwrap());
    let server = server_config(TLS12);

    connect(&client, &server);
    let (c2, _, _) = connect(&client, &server);
    assert!(!c2.negotiated().resumed());
}

#[test]
fn tls12_expired_session_is_not_resumed() {
    let _ = env_logger::builder().is_test(true).try_init();
    let client = Arc::new(
        client_builder(TLS12)
            .session_lifetime(Duration::from_secs(10))
            .build()
            .unwrap(),
    );
    let server = server_config(TLS12);
    connect(&client, &server);

    let now = Instant::now() + Duration::from_secs(60);
    let c = Handshaker::client(client.clone());
    let s = Handshaker::server(server.clone());
    handshake(&c, &s, now).unwrap();
    assert!(c.is_complete());
    assert!(!c.negotiated().resumed());
}

#[test]
fn tls13_resume_with_psk() {
    let client = client_config(TLS13);
    let server = server_config(TLS13);

    let (c1, _, _) = connect(&client, &server);
    assert!(!c1.negotiated().resumed());

    let (c2, s2, outcome) = connect(&client, &server);
    assert!(c2.negotiated().resumed());
    assert!(s2.negotiated().resumed());
    assert_eq!(c2.negotiated().peer_certificates(), c1.negotiated().peer_certificates());

    let types = outcome.server.types();
    assert!(!types.contains(&HandshakeType::Certificate.as_u8()));
    assert!(!types.contains(&HandshakeType::CertificateVerify.as_u8()));
    assert_eq!(
        types[..3],
        [
            HandshakeType::ServerHello.as_u8(),
            HandshakeType::EncryptedExtensions.as_u8(),
            HandshakeType::Finished.as_u8(),
        ]
    );
}

#[test]
fn tls13_tickets_disabled_on_server() {
    let client = client_config(TLS13);
    let server = Arc::new(server_builder(TLS13).session_tickets(false).build().unwrap());

    let (_, _, first) = connect(&client, &server);
    assert!(!first
        .server
        .types()
        .contains(&HandshakeType::NewSessionTicket.as_u8()));

    let (c2, _, _) = connect(&client, &server);
    assert!(!c2.negotiated().resumed());
}
