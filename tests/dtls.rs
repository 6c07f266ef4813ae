//! DTLS handshakes: cookies, flights, retransmission and fragmentation.


use std::sync::Arc;
use std::time::{Duration, Instant};

use handshake_common::*;
use tlshake::types::{HandshakeType, ProtocolVersion};
use tlshake::{Error, Handshaker, Output, Phase, Secrets};

const DTLS12: &[ProtocolVersion] = &[ProtocolVersion::DTLS1_2];
const DTLS13: &[ProtocolVersion] = &[ProtocolVersion::DTLS1_3];

#[test]
fn dtls12_handshake() {
    let (c, s, outcome) = connect(&client_config(DTLS12), &server_config(DTLS12));
    assert_eq!(c.negotiated().version(), Some(ProtocolVersion::DTLS1_2));
    assert_eq!(s.negotiated().version(), Some(ProtocolVersion::DTLS1_2));
    assert!(outcome.client.complete);
    assert!(outcome.server.complete);

    let key_block = |secrets: &[Secrets]| {
        secrets
            .iter()
            .find(|s| matches!(s, Secrets::KeyBlock { .. }))
            .cloned()
    };
    assert!(key_block(&outcome.client.secrets).is_some());
    assert_eq!(
        key_block(&outcome.client.secrets),
        key_block(&outcome.server.secrets)
    );
}

#[test]
fn dtls12_cookie_exchange() {
    let server = Arc::new(server_builder(DTLS12).cookie_exchange(true).build().unwrap());
    let (c, _, outcome) = connect(&client_config(DTLS12), &server);

    assert_eq!(outcome.server.types()[0], HandshakeType::HelloVerifyRequest.as_u8());
    let hellos = outcome
        .client
        .types()
        .iter()
        .filter(|t| **t == HandshakeType::ClientHello.as_u8())
        .count();
    assert_eq!(hellos, 2);
    assert_eq!(c.negotiated().version(), Some(ProtocolVersion::DTLS1_2));
}

#[test]
fn dtls13_handshake() {
    let (c, s, outcome) = connect(&client_config(DTLS13), &server_config(DTLS13));
    assert_eq!(c.negotiated().version(), Some(ProtocolVersion::DTLS1_3));
    assert_eq!(c.negotiated().cipher_suite(), s.negotiated().cipher_suite());
    assert_eq!(outcome.server.change_cipher_specs, 0);
    assert!(outcome
        .server
        .secrets
        .iter()
        .any(|s| matches!(s, Secrets::Traffic { .. })));
}

#[test]
fn dtls13_cookie_in_hello_retry() {
    let server = Arc::new(server_builder(DTLS13).cookie_exchange(true).build().unwrap());
    let (c, _, outcome) = connect(&client_config(DTLS13), &server);

    let hellos = outcome
        .client
        .types()
        .iter()
        .filter(|t| **t == HandshakeType::ClientHello.as_u8())
        .count();
    assert_eq!(hellos, 2);
    assert!(!outcome
        .server
        .types()
        .contains(&HandshakeType::HelloVerifyRequest.as_u8()));
    assert_eq!(c.negotiated().version(), Some(ProtocolVersion::DTLS1_3));
}

fn handshake_messages(d: &Delivered) -> usize {
    d.messages.len()
}

#[test]
fn lost_client_hello_is_resent() {
    let _ = env_logger::builder().is_test(true).try_init();
    let now = Instant::now();
    let client = Handshaker::client(client_config(DTLS12));
    let server = Handshaker::server(server_config(DTLS12));

    client.start(now).unwrap();
    server.start(now).unwrap();
    let lost = drain(&client);
    assert_eq!(lost.types(), vec![HandshakeType::ClientHello.as_u8()]);

    let due = client.poll_timeout().expect("retransmit timer");
    assert!(due > now);

    // Early timeouts do nothing.
    client.handle_timeout(now).unwrap();
    assert!(drain(&client).is_empty());

    client.handle_timeout(due).unwrap();
    let outcome = exchange(&client, &server, due).unwrap();
    assert_eq!(outcome.client.types()[0], HandshakeType::ClientHello.as_u8());
    assert_eq!(outcome.client.messages[0], lost.messages[0]);
    assert!(client.is_complete());
    assert!(server.is_complete());
    assert_eq!(client.poll_timeout(), None);
}

#[test]
fn retransmissions_run_out() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = Arc::new(
        client_builder(DTLS12)
            .flight_start_rto(Duration::from_millis(100))
            .flight_retries(2)
            .build()
            .unwrap(),
    );
    let client = Handshaker::client(config);
    client.start(Instant::now()).unwrap();
    assert_eq!(handshake_messages(&drain(&client)), 1);

    for _ in 0..2 {
        let due = client.poll_timeout().expect("timer armed");
        client.handle_timeout(due).unwrap();
        let resent = drain(&client);
        assert_eq!(resent.types(), vec![HandshakeType::ClientHello.as_u8()]);
    }

    let due = client.poll_timeout().expect("timer armed");
    assert_eq!(client.handle_timeout(due), Err(Error::Timeout));
    assert_eq!(client.phase(), Phase::Closed);
    assert_eq!(client.poll_timeout(), None);
}

#[test]
fn repeated_server_flight_is_answered_again() {
    let _ = env_logger::builder().is_test(true).try_init();
    let now = Instant::now();
    let client = Handshaker::client(client_config(DTLS12));
    let server = Handshaker::server(server_config(DTLS12));
    client.start(now).unwrap();
    server.start(now).unwrap();

    let hello = drain(&client);
    for m in &hello.messages {
        server.handle_handshake(m, now).unwrap();
    }
    drain(&server);

    // The hello arrives again, the server repeats its flight.
    for m in &hello.messages {
        server.handle_handshake(m, now).unwrap();
    }
    let again = drain(&server);
    assert_eq!(again.types()[0], HandshakeType::ServerHello.as_u8());
}

#[test]
fn small_packets_fragment_messages() {
    let client = Arc::new(client_builder(DTLS12).max_packet_size(150).build().unwrap());
    let server = Arc::new(server_builder(DTLS12).max_packet_size(150).build().unwrap());
    let (c, _, outcome) = connect(&client, &server);
    assert!(c.is_complete());

    let mut seqs: Vec<u16> = Vec::new();
    for m in &outcome.server.messages {
        assert!(m.len() <= 150 - 13, "fragment of {} bytes", m.len());
        let seq = u16::from_be_bytes([m[4], m[5]]);
        if seqs.last() != Some(&seq) {
            seqs.push(seq);
        }
    }
    // More fragments than messages.
    assert!(outcome.server.messages.len() > seqs.len());
}

#[test]
fn dtls_fragments_reassemble_out_of_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let now = Instant::now();
    let server_config = Arc::new(server_builder(DTLS12).max_packet_size(150).build().unwrap());
    let client = Handshaker::client(client_config(DTLS12));
    let server = Handshaker::server(server_config);
    client.start(now).unwrap();
    server.start(now).unwrap();
    deliver(&client, &server, now).unwrap();

    let mut flight = Vec::new();
    while let Some(out) = server.poll_output() {
        if let Output::Handshake(m) = out {
            flight.push(m);
        }
    }
    assert!(flight.len() > 3);
    for m in flight.iter().rev() {
        client.handle_handshake(m, now).unwrap();
    }
    let answer = drain(&client);
    assert_eq!(
        answer.types()[0],
        HandshakeType::ClientKeyExchange.as_u8()
    );
}
