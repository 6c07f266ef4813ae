//! Finished, and the end of the handshake.
//!
//! Before TLS 1.3 each Finished follows a ChangeCipherSpec and whoever
//! sends second completes. In TLS 1.3 the server Finished opens the
//! application secrets and the client Finished ends the handshake.

use std::sync::Arc;

use super::context::{ct_eq, HandshakeContext, Role};
use super::{certificate, certificate_verify, keys, new_session_ticket, set_phase};
use crate::event::Output;
use crate::message::Finished;
use crate::session::Session;
use crate::types::{AlertDescription, HandshakeType};
use crate::Error;

use super::context::Phase;

fn peer_of(role: Role) -> Role {
    match role {
        Role::Client => Role::Server,
        Role::Server => Role::Client,
    }
}

fn verify_data_mut(ctx: &mut HandshakeContext, sender: Role) -> &mut Vec<u8> {
    match sender {
        Role::Client => &mut ctx.verify_data.client,
        Role::Server => &mut ctx.verify_data.server,
    }
}

fn has_verify_data(ctx: &HandshakeContext, sender: Role) -> bool {
    match sender {
        Role::Client => !ctx.verify_data.client.is_empty(),
        Role::Server => !ctx.verify_data.server.is_empty(),
    }
}

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let role = ctx.role;
    if version.use_tls13_plus() {
        return produce_tls13(ctx);
    }

    keys::emit_key_block(ctx)?;
    ctx.send_change_cipher_spec();
    let verify_data = keys::legacy_verify_data(ctx, role)?;
    send(ctx, &verify_data)?;
    *verify_data_mut(ctx, role) = verify_data;

    if has_verify_data(ctx, peer_of(role)) {
        return complete(ctx);
    }
    ctx.ccs.expected = true;
    if role == Role::Client && ctx.ticket_expected {
        ctx.expect(&[HandshakeType::NewSessionTicket, HandshakeType::Finished]);
    } else {
        ctx.expect(&[HandshakeType::Finished]);
    }
    Ok(())
}

fn produce_tls13(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let role = ctx.role;
    let verify_data = keys::tls13_verify_data(ctx, role)?;
    send(ctx, &verify_data)?;
    *verify_data_mut(ctx, role) = verify_data;

    match role {
        Role::Server => {
            keys::application_secrets(ctx)?;
            if ctx.client_auth_requested {
                ctx.expect(&[HandshakeType::Certificate]);
            } else {
                ctx.expect(&[HandshakeType::Finished]);
            }
            Ok(())
        }
        Role::Client => {
            keys::resumption_secret(ctx)?;
            complete(ctx)
        }
    }
}

fn send(ctx: &mut HandshakeContext, verify_data: &[u8]) -> Result<(), Error> {
    let mut body = Vec::new();
    Finished {
        verify_data: verify_data.to_vec(),
    }
    .serialize(&mut body);
    ctx.send_handshake(HandshakeType::Finished, &body)
}

pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let role = ctx.role;
    let peer = peer_of(role);

    let expected = if version.use_tls13_plus() {
        keys::tls13_verify_data(ctx, peer)?
    } else {
        if !ctx.ccs.received {
            return Err(Error::UnexpectedMessage(
                "Finished before ChangeCipherSpec".to_string(),
            ));
        }
        keys::legacy_verify_data(ctx, peer)?
    };
    let finished = Finished::decode(ctx.inbound()?.body(), expected.len())?;
    if !ct_eq(&expected, &finished.verify_data) {
        return Err(Error::NegotiationFailure(
            AlertDescription::DecryptError,
            "Finished does not verify".to_string(),
        ));
    }
    trace!("Peer Finished verified");
    *verify_data_mut(ctx, peer) = finished.verify_data;
    ctx.consume_inbound()?;

    if version.use_tls13_plus() {
        return match role {
            Role::Client => {
                keys::application_secrets(ctx)?;
                if ctx.cert_request.is_some() {
                    ctx.queue(certificate::produce);
                    ctx.queue(certificate_verify::produce);
                }
                ctx.queue(produce);
                Ok(())
            }
            Role::Server => {
                keys::resumption_secret(ctx)?;
                complete(ctx)
            }
        };
    }

    if has_verify_data(ctx, role) {
        return complete(ctx);
    }
    if role == Role::Server && ctx.ticket_expected {
        ctx.queue(new_session_ticket::produce);
    }
    ctx.queue(produce);
    Ok(())
}

/// Mark the handshake done and keep the session for later resumption.
pub(crate) fn complete(ctx: &mut HandshakeContext) -> Result<(), Error> {
    ctx.expected.clear();
    ctx.transcript.finish()?;
    ctx.io.final_flight();
    save_session(ctx)?;
    set_phase(ctx, Phase::Completed);
    debug!(
        "Handshake complete: {} {}{}",
        ctx.version()?,
        ctx.suite_spec()?.suite,
        if ctx.negotiated.resumed { " (resumed)" } else { "" }
    );
    ctx.push(Output::Complete);
    Ok(())
}

/// Cache a TLS 1.2 and earlier session. TLS 1.3 sessions come from
/// NewSessionTicket after the handshake.
fn save_session(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let cache = ctx.config.session_cache().clone();
    if version.use_tls13_plus() || cache.capacity() == 0 {
        return Ok(());
    }
    let Some(secret) = ctx.keys.master_secret.clone() else {
        return Ok(());
    };
    let ticket = ctx.ticket.as_ref().map(|(_, t)| t.clone());
    if ctx.negotiated.resumed && ticket.is_none() {
        return Ok(());
    }

    let mut session = Session::from_negotiated(
        &ctx.negotiated,
        ctx.negotiated.session_id.clone(),
        secret,
        ctx.now,
        cache.lifetime(),
    )
    .ok_or_else(|| Error::internal("Saving a session before negotiation"))?;

    match ctx.role {
        Role::Server => {
            let id = ctx.negotiated.session_id.clone();
            let session = Arc::new(session);
            match (&ticket, id.is_empty()) {
                (Some(t), false) => {
                    cache.put(id.as_slice(), session.clone());
                    cache.put_child(id.as_slice(), t, session);
                }
                (Some(t), true) => cache.put(t, session),
                (None, false) => cache.put(id.as_slice(), session),
                (None, true) => return Ok(()),
            }
            trace!("Cached server session");
        }
        Role::Client => {
            let Some(name) = ctx.config.server_name() else {
                return Ok(());
            };
            if session.id.is_empty() && ticket.is_none() {
                return Ok(());
            }
            session.ticket = ticket;
            cache.put(name.as_bytes(), Arc::new(session));
            trace!("Cached session for {}", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::types::{CipherSuite, ProtocolVersion};

    #[test]
    fn completion_freezes_transcript() {
        let mut ctx = context(Role::Client, Config::default());
        ctx.set_version(ProtocolVersion::TLS1_2).unwrap();
        ctx.set_suite(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256).unwrap();
        ctx.send_handshake(HandshakeType::Finished, &[0; 12]).unwrap();
        let before = ctx.transcript.digest().unwrap();

        complete(&mut ctx).unwrap();
        assert_eq!(ctx.phase, Phase::Completed);
        assert_eq!(ctx.transcript.digest().unwrap(), before);
        assert!(ctx.send_handshake(HandshakeType::Finished, &[0; 12]).is_err());
    }
}
