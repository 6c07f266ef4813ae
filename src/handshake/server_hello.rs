//! ServerHello and HelloRetryRequest.
//!
//! The client side reads the version out of the hello first: the
//! supported_versions extension when present, the legacy field otherwise.
//! Everything else is interpreted under that version.

use super::context::HandshakeContext;
use super::{client_hello, keys};
use crate::extension::{self, client_shares, parse_selected_version, server_selected, server_share};
use crate::kx::{self, Possession};
use crate::message::ServerHello;
use crate::types::{AlertDescription, ExtensionType, HandshakeType, ProtocolVersion, Random};
use crate::types::{SessionId, DOWNGRADE_TLS11, DOWNGRADE_TLS12, HELLO_RETRY_REQUEST_RANDOM};
use crate::Error;

/// Server: answer the hello. For TLS 1.3 this also completes the key
/// exchange and starts the handshake traffic secrets.
pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;

    let mut random = ctx.new_random();
    mark_downgrade(ctx, version, &mut random);
    ctx.negotiated.server_random = random;

    let session_id = if version.use_tls13_plus() {
        echoed_session_id(ctx)
    } else {
        ctx.negotiated.session_id.clone()
    };
    let extensions = extension::produce(ctx, HandshakeType::ServerHello)?;
    let hello = ServerHello {
        legacy_version: version.legacy_wire_version(),
        random,
        session_id,
        cipher_suite: spec.suite,
        compression_method: 0,
        extensions,
    };
    let mut body = Vec::new();
    hello.serialize(&mut body);
    ctx.send_handshake(HandshakeType::ServerHello, &body)?;
    debug!(
        "ServerHello {} {}{}",
        version,
        spec.suite,
        if ctx.negotiated.resumed { " (resumed)" } else { "" }
    );

    if version.use_tls13_plus() {
        let group = ctx.negotiated.group;
        let peer = client_shares(ctx)
            .iter()
            .find(|s| Some(s.group) == group)
            .map(|s| s.key.clone())
            .ok_or_else(|| Error::internal("Client share vanished"))?;
        let shared = kx::complete_ephemeral(ctx, &peer)?;
        keys::handshake_secrets(ctx, &shared)?;
    } else if ctx.negotiated.resumed {
        keys::emit_key_block(ctx)?;
    }
    Ok(())
}

/// Server: a HelloRetryRequest naming the group or carrying the cookie.
pub(crate) fn produce_retry(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;
    // The first hello is replaced by its hash before the retry is hashed.
    ctx.transcript.rollup_for_hrr()?;

    let session_id = echoed_session_id(ctx);
    let extensions = extension::produce(ctx, HandshakeType::HelloRetryRequest)?;
    let retry = ServerHello {
        legacy_version: version.legacy_wire_version(),
        random: HELLO_RETRY_REQUEST_RANDOM,
        session_id,
        cipher_suite: spec.suite,
        compression_method: 0,
        extensions,
    };
    let mut body = Vec::new();
    retry.serialize(&mut body);
    ctx.send_handshake(HandshakeType::HelloRetryRequest, &body)?;
    ctx.io.final_flight();
    Ok(())
}

fn echoed_session_id(ctx: &HandshakeContext) -> SessionId {
    ctx.client_hello
        .as_ref()
        .map(|h| h.session_id.clone())
        .unwrap_or_default()
}

/// Sentinels in the last eight bytes of the random when a server capable of
/// a newer version settles for an older one.
fn mark_downgrade(ctx: &HandshakeContext, version: ProtocolVersion, random: &mut Random) {
    if version.use_tls13_plus() {
        return;
    }
    let Some(newest) = ProtocolVersion::newest(&ctx.active_versions) else {
        return;
    };
    if newest.use_tls13_plus() && version.use_tls12_plus() {
        random.set_downgrade(&DOWNGRADE_TLS12);
    } else if newest.use_tls12_plus() && !version.use_tls12_plus() {
        random.set_downgrade(&DOWNGRADE_TLS11);
    }
}

/// Client: read the answer to our hello.
pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let hello = ServerHello::decode(ctx.inbound()?.body())?;
    if hello.is_retry_request() {
        return consume_retry(ctx, hello);
    }

    let version = server_version(ctx, &hello)?;
    if ctx.hello_retry && ctx.negotiated.version != Some(version) {
        return Err(Error::illegal("Version changed after HelloRetryRequest"));
    }
    check_downgrade(ctx, version, &hello.random)?;
    ctx.set_version(version)?;
    check_suite(ctx, &hello, version)?;
    if hello.compression_method != 0 {
        return Err(Error::illegal("Server picked a compression method"));
    }
    ctx.set_suite(hello.cipher_suite)?;
    ctx.negotiated.server_random = hello.random;

    extension::load(ctx, HandshakeType::ServerHello, &hello.extensions)?;
    extension::check_absent(ctx, HandshakeType::ServerHello)?;
    extension::trade(ctx, HandshakeType::ServerHello)?;

    if version.use_tls13_plus() {
        consume_tls13(ctx, &hello)
    } else {
        consume_tls12(ctx, &hello)
    }
}

fn server_version(ctx: &HandshakeContext, hello: &ServerHello) -> Result<ProtocolVersion, Error> {
    if let Some(ext) = hello.extension(ExtensionType::SupportedVersions) {
        let selected = parse_selected_version(&ext.data)?;
        if !selected.use_tls13_plus() || !ctx.active_versions.contains(&selected) {
            return Err(Error::illegal(format!("Server selected {}", selected)));
        }
        return Ok(selected);
    }
    let version = hello.legacy_version;
    if version.use_tls13_plus() || !ctx.active_versions.contains(&version) {
        return Err(Error::NegotiationFailure(
            AlertDescription::ProtocolVersion,
            format!("Server chose {}", version),
        ));
    }
    Ok(version)
}

/// Refuse a downgrade the server itself flagged.
fn check_downgrade(
    ctx: &HandshakeContext,
    version: ProtocolVersion,
    random: &Random,
) -> Result<(), Error> {
    if version.use_tls13_plus() {
        return Ok(());
    }
    let Some(newest) = ProtocolVersion::newest(&ctx.active_versions) else {
        return Ok(());
    };
    let flagged = (newest.use_tls13_plus()
        && (random.has_downgrade(&DOWNGRADE_TLS12) || random.has_downgrade(&DOWNGRADE_TLS11)))
        || (newest.use_tls12_plus()
            && !version.use_tls12_plus()
            && random.has_downgrade(&DOWNGRADE_TLS11));
    if flagged {
        warn!("Downgrade to {} flagged by the server random", version);
        return Err(Error::illegal("Downgrade sentinel in ServerHello random"));
    }
    Ok(())
}

fn check_suite(
    ctx: &HandshakeContext,
    hello: &ServerHello,
    version: ProtocolVersion,
) -> Result<(), Error> {
    let suite = hello.cipher_suite;
    let offered = ctx
        .client_hello
        .as_ref()
        .map(|h| h.offers_suite(suite))
        .unwrap_or(false);
    if !offered || suite.is_scsv() {
        return Err(Error::illegal(format!("Server picked {} which was not offered", suite)));
    }
    if !ctx.config.catalogs().suite_available(suite, version) {
        return Err(Error::illegal(format!("{} is not usable with {}", suite, version)));
    }
    if ctx.negotiated.suite.map(|s| s != suite).unwrap_or(false) {
        return Err(Error::illegal("Cipher suite changed after HelloRetryRequest"));
    }
    Ok(())
}

fn check_echo(ctx: &HandshakeContext, hello: &ServerHello) -> Result<(), Error> {
    let sent = ctx.client_hello.as_ref().map(|h| &h.session_id);
    if sent != Some(&hello.session_id) {
        return Err(Error::illegal("Session id not echoed"));
    }
    Ok(())
}

fn consume_retry(ctx: &mut HandshakeContext, retry: ServerHello) -> Result<(), Error> {
    if ctx.hello_retry {
        return Err(Error::UnexpectedMessage(
            "Second HelloRetryRequest".to_string(),
        ));
    }
    let version = server_version(ctx, &retry)?;
    if !version.use_tls13_plus() {
        return Err(Error::illegal("HelloRetryRequest below TLS 1.3"));
    }
    ctx.set_version(version)?;
    check_suite(ctx, &retry, version)?;
    check_echo(ctx, &retry)?;
    ctx.set_suite(retry.cipher_suite)?;

    extension::load(ctx, HandshakeType::HelloRetryRequest, &retry.extensions)?;
    extension::trade(ctx, HandshakeType::HelloRetryRequest)?;
    if ctx.retry_group.is_none() && ctx.retry_cookie.is_none() {
        return Err(Error::illegal("HelloRetryRequest that changes nothing"));
    }
    ctx.hello_retry = true;

    ctx.transcript.rollup_for_hrr()?;
    ctx.consume_inbound()?;

    let hash = ctx.suite_spec()?.hash;
    let psk_usable = ctx
        .resuming
        .as_ref()
        .map(|s| s.suite.spec().map(|sp| sp.hash) == Some(hash))
        .unwrap_or(true);
    if !psk_usable {
        debug!("Dropping PSK of another hash after HelloRetryRequest");
        ctx.resuming = None;
    }
    if ctx.retry_group.is_some() {
        ctx.possessions
            .retain(|p| !matches!(p, Possession::Ephemeral(_)));
    }
    debug!("HelloRetryRequest for {:?}", ctx.retry_group);
    ctx.queue(client_hello::produce);
    Ok(())
}

fn consume_tls13(ctx: &mut HandshakeContext, hello: &ServerHello) -> Result<(), Error> {
    check_echo(ctx, hello)?;
    let share = server_share(ctx).cloned().ok_or_else(|| {
        Error::NegotiationFailure(
            AlertDescription::MissingExtension,
            "ServerHello without key_share".to_string(),
        )
    })?;

    if server_selected(ctx) {
        let hash = ctx.suite_spec()?.hash;
        let session = ctx
            .resuming
            .clone()
            .ok_or_else(|| Error::illegal("PSK selected but none offered"))?;
        if session.suite.spec().map(|s| s.hash) != Some(hash) {
            return Err(Error::illegal("PSK selected with a suite of another hash"));
        }
        debug!("Server accepted the PSK");
        ctx.negotiated.resumed = true;
        ctx.negotiated.peer_certificates = session.peer_certificates.clone();
    }

    ctx.negotiated.group = Some(share.group);
    let shared = kx::complete_ephemeral(ctx, &share.key)?;
    ctx.consume_inbound()?;
    keys::handshake_secrets(ctx, &shared)?;
    ctx.expect(&[HandshakeType::EncryptedExtensions]);
    Ok(())
}

fn consume_tls12(ctx: &mut HandshakeContext, hello: &ServerHello) -> Result<(), Error> {
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;
    ctx.negotiated.session_id = hello.session_id.clone();
    // Any key share offered for TLS 1.3 is unused from here on.
    ctx.possessions
        .retain(|p| !matches!(p, Possession::Ephemeral(_)));

    let offered_id = ctx
        .client_hello
        .as_ref()
        .map(|h| h.session_id.clone())
        .unwrap_or_default();
    let resumed = match &ctx.resuming {
        Some(s) => {
            !s.version.use_tls13_plus()
                && !offered_id.is_empty()
                && offered_id == hello.session_id
        }
        None => false,
    };

    if resumed {
        let session = ctx
            .resuming
            .clone()
            .ok_or_else(|| Error::internal("Resumption without a session"))?;
        if session.version != version || session.suite != spec.suite {
            return Err(Error::illegal("Resumed session with other parameters"));
        }
        if session.extended_master_secret != ctx.negotiated.extended_master_secret {
            return Err(Error::handshake_failure(
                "Extended master secret differs from the resumed session",
            ));
        }
        debug!("Server resumed the {} session", spec.suite);
        ctx.negotiated.resumed = true;
        ctx.negotiated.peer_certificates = session.peer_certificates.clone();
        ctx.negotiated.local_certificates = session.local_certificates.clone();
        ctx.keys.master_secret = Some(session.secret.clone());
        keys::emit_key_block(ctx)?;
        ctx.consume_inbound()?;
        ctx.ccs.expected = true;
        if ctx.ticket_expected {
            ctx.expect(&[HandshakeType::NewSessionTicket, HandshakeType::Finished]);
        } else {
            ctx.expect(&[HandshakeType::Finished]);
        }
        return Ok(());
    }

    if ctx.resuming.is_some() {
        trace!("Server declined resumption");
    }
    ctx.consume_inbound()?;
    if spec.kx.is_authenticated() {
        ctx.expect(&[HandshakeType::Certificate]);
    } else {
        ctx.expect(&[HandshakeType::ServerKeyExchange]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;

    #[test]
    fn downgrade_sentinels() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2])
            .build()
            .unwrap();
        let ctx = context(Role::Server, config);

        let mut random = Random([1; 32]);
        mark_downgrade(&ctx, ProtocolVersion::TLS1_2, &mut random);
        assert!(random.has_downgrade(&DOWNGRADE_TLS12));
        assert!(check_downgrade(&ctx, ProtocolVersion::TLS1_2, &random).is_err());

        let mut random = Random([1; 32]);
        mark_downgrade(&ctx, ProtocolVersion::TLS1_3, &mut random);
        assert_eq!(random, Random([1; 32]));
        assert!(check_downgrade(&ctx, ProtocolVersion::TLS1_2, &random).is_ok());
    }

    #[test]
    fn tls12_only_server_marks_nothing_for_tls12() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_2])
            .build()
            .unwrap();
        let ctx = context(Role::Server, config);
        let mut random = Random([3; 32]);
        mark_downgrade(&ctx, ProtocolVersion::TLS1_2, &mut random);
        assert_eq!(random, Random([3; 32]));
    }

    #[test]
    fn unoffered_version_is_refused() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_3])
            .build()
            .unwrap();
        let ctx = context(Role::Client, config);
        let hello = ServerHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: Random([0; 32]),
            session_id: SessionId::empty(),
            cipher_suite: crate::types::CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            compression_method: 0,
            extensions: Vec::new(),
        };
        let err = server_version(&ctx, &hello).unwrap_err();
        assert_eq!(err.alert(), AlertDescription::ProtocolVersion);
    }
}
