//! Messages exchanged on an established connection.


use std::sync::Arc;
use std::time::Instant;

use handshake_common::*;
use tlshake::types::{AlertDescription, HandshakeType, ProtocolVersion};
use tlshake::{Direction, Error, Phase, Secrets};

const TLS12: &[ProtocolVersion] = &[ProtocolVersion::TLS1_2];
const TLS13: &[ProtocolVersion] = &[ProtocolVersion::TLS1_3];

fn updated(secrets: &[Secrets], direction: Direction) -> Vec<Secrets> {
    secrets
        .iter()
        .filter(|s| matches!(s, Secrets::Updated { direction: d, .. } if *d == direction))
        .cloned()
        .collect()
}

fn secret_of(s: &Secrets) -> Vec<u8> {
    match s {
        Secrets::Updated { secret, .. } => secret.to_vec(),
        other => panic!("not an update: {:?}", other),
    }
}

#[test]
fn key_update_requested_by_client() {
    let (client, server, _) = connect(&client_config(TLS13), &server_config(TLS13));
    let now = Instant::now();

    client.key_update(true, now).unwrap();
    let outcome = exchange(&client, &server, now).unwrap();

    assert_eq!(outcome.client.types(), vec![HandshakeType::KeyUpdate.as_u8()]);
    assert_eq!(outcome.server.types(), vec![HandshakeType::KeyUpdate.as_u8()]);

    let client_send = updated(&outcome.client.secrets, Direction::Send);
    let client_recv = updated(&outcome.client.secrets, Direction::Receive);
    let server_send = updated(&outcome.server.secrets, Direction::Send);
    let server_recv = updated(&outcome.server.secrets, Direction::Receive);
    assert_eq!(client_send.len(), 1);
    assert_eq!(server_send.len(), 1);
    assert_eq!(secret_of(&client_send[0]), secret_of(&server_recv[0]));
    assert_eq!(secret_of(&server_send[0]), secret_of(&client_recv[0]));
    assert_ne!(secret_of(&client_send[0]), secret_of(&server_send[0]));
    assert!(client.is_complete());
}

#[test]
fn key_update_not_requested_gets_no_answer() {
    let (client, server, _) = connect(&client_config(TLS13), &server_config(TLS13));
    let now = Instant::now();

    server.key_update(false, now).unwrap();
    let outcome = exchange(&client, &server, now).unwrap();
    assert_eq!(outcome.server.types(), vec![HandshakeType::KeyUpdate.as_u8()]);
    assert!(outcome.client.messages.is_empty());
    assert_eq!(updated(&outcome.client.secrets, Direction::Receive).len(), 1);
}

#[test]
fn key_update_needs_tls13() {
    let (client, _, _) = connect(&client_config(TLS12), &server_config(TLS12));
    assert!(matches!(
        client.key_update(false, Instant::now()),
        Err(Error::ConfigurationError(_))
    ));
    assert!(client.is_complete());
}

#[test]
fn extra_session_ticket() {
    let (client, server, _) = connect(&client_config(TLS13), &server_config(TLS13));
    let now = Instant::now();
    server.send_session_ticket(now).unwrap();
    let outcome = exchange(&client, &server, now).unwrap();
    assert_eq!(
        outcome.server.types(),
        vec![HandshakeType::NewSessionTicket.as_u8()]
    );
    assert!(client.send_session_ticket(now).is_err());
}

fn renegotiating(versions: &[ProtocolVersion]) -> (Arc<tlshake::Config>, Arc<tlshake::Config>) {
    let client = Arc::new(
        client_builder(versions)
            .allow_renegotiation(true)
            .build()
            .unwrap(),
    );
    let server = Arc::new(
        server_builder(versions)
            .allow_renegotiation(true)
            .build()
            .unwrap(),
    );
    (client, server)
}

#[test]
fn client_renegotiates() {
    let (client_config, server_config) = renegotiating(TLS12);
    let (client, server, _) = connect(&client_config, &server_config);
    let now = Instant::now();

    client.renegotiate(now).unwrap();
    assert_eq!(client.phase(), Phase::Negotiating);
    let outcome = exchange(&client, &server, now).unwrap();

    assert_eq!(outcome.client.types()[0], HandshakeType::ClientHello.as_u8());
    assert!(outcome.client.complete);
    assert!(outcome.server.complete);
    assert!(client.is_complete());
    assert!(server.is_complete());
    assert!(!client.negotiated().resumed());
}

#[test]
fn server_requests_renegotiation() {
    let (client_config, server_config) = renegotiating(TLS12);
    let (client, server, _) = connect(&client_config, &server_config);
    let now = Instant::now();

    server.renegotiate(now).unwrap();
    let outcome = exchange(&client, &server, now).unwrap();

    assert_eq!(outcome.server.types()[0], HandshakeType::HelloRequest.as_u8());
    assert_eq!(outcome.client.types()[0], HandshakeType::ClientHello.as_u8());
    assert!(outcome.client.complete);
    assert!(client.is_complete());
    assert!(server.is_complete());
}

#[test]
fn refused_renegotiation_keeps_connection() {
    let _ = env_logger::builder().is_test(true).try_init();
    let client_config = Arc::new(
        client_builder(TLS12)
            .allow_renegotiation(true)
            .build()
            .unwrap(),
    );
    let (client, server, first) = connect(&client_config, &server_config(TLS12));
    let now = Instant::now();

    client.renegotiate(now).unwrap();
    let outcome = exchange(&client, &server, now).unwrap();

    assert_eq!(outcome.server.alerts, vec![AlertDescription::NoRenegotiation]);
    assert_eq!(client.phase(), Phase::Completed);
    assert_eq!(server.phase(), Phase::Completed);
    assert_eq!(client.negotiated().cipher_suite(), server.negotiated().cipher_suite());
    assert!(first.client.complete);
}

#[test]
fn client_refuses_hello_request() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server_config = Arc::new(
        server_builder(TLS12)
            .allow_renegotiation(true)
            .build()
            .unwrap(),
    );
    let (client, server, _) = connect(&client_config(TLS12), &server_config);
    let now = Instant::now();

    server.renegotiate(now).unwrap();
    let outcome = exchange(&client, &server, now).unwrap();
    assert_eq!(outcome.client.alerts, vec![AlertDescription::NoRenegotiation]);
    assert!(client.is_complete());
    assert!(server.is_complete());
}

#[test]
fn no_renegotiation_in_tls13() {
    let (client_config, server_config) = renegotiating(TLS13);
    let (client, server, _) = connect(&client_config, &server_config);
    assert!(client.renegotiate(Instant::now()).is_err());
    assert!(server.renegotiate(Instant::now()).is_err());
    assert!(client.is_complete());
}

#[test]
fn fatal_alert_after_handshake_closes() {
    let (client, _, _) = connect(&client_config(TLS13), &server_config(TLS13));
    let err = client.handle_alert(AlertDescription::CloseNotify).unwrap_err();
    assert_eq!(err, Error::AlertReceived(AlertDescription::CloseNotify));
    assert_eq!(client.phase(), Phase::Closed);
    assert!(drain(&client).alerts.is_empty());
}
