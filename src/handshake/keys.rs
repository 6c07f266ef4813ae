//! Secrets derived along the handshake and handed to the record layer.
//!
//! TLS 1.2 and earlier derive one master secret and expand it into a key
//! block. TLS 1.3 runs the HKDF schedule in three stages, each of them
//! announced as an [`Output::Secrets`].

use super::context::{HandshakeContext, Role, Secret};
use crate::crypto::key_schedule::KeySchedule;
use crate::crypto::prf;
use crate::event::{Output, Secrets, TrafficStage};
use crate::types::ProtocolVersion;
use crate::Error;

const SSL3_CLIENT_SENDER: &[u8; 4] = b"CLNT";
const SSL3_SERVER_SENDER: &[u8; 4] = b"SRVR";

/// Master secret from the premaster secret. The key block follows at once.
pub(crate) fn derive_master_secret(ctx: &mut HandshakeContext, pms: &[u8]) -> Result<(), Error> {
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;
    // The session hash runs up to and including the ClientKeyExchange.
    let session_hash = if ctx.negotiated.extended_master_secret {
        Some(ctx.transcript.digest()?)
    } else {
        None
    };
    let ms = prf::master_secret(
        ctx.provider(),
        version,
        spec.hash,
        pms,
        &ctx.negotiated.client_random.0,
        &ctx.negotiated.server_random.0,
        session_hash.as_deref(),
    )?;
    ctx.keys.master_secret = Some(ms);
    emit_key_block(ctx)
}

/// Hand the key block of the master secret to the record layer, once.
pub(crate) fn emit_key_block(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if ctx.keys.key_block_emitted {
        return Ok(());
    }
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;
    let ms = ctx
        .keys
        .master_secret
        .as_ref()
        .ok_or_else(|| Error::internal("No master secret for the key block"))?;
    let keys = prf::key_block(
        ctx.provider(),
        version,
        spec,
        ms,
        &ctx.negotiated.client_random.0,
        &ctx.negotiated.server_random.0,
    )?;
    ctx.keys.key_block_emitted = true;
    trace!("Key block ready for {}", spec.suite);
    ctx.push(Output::Secrets(Secrets::KeyBlock {
        suite: spec.suite,
        keys,
    }));
    Ok(())
}

/// verify_data of the Finished sent by `sender`, over the transcript as it
/// stands. TLS 1.2 and earlier only.
pub(crate) fn legacy_verify_data(ctx: &HandshakeContext, sender: Role) -> Result<Vec<u8>, Error> {
    let version = ctx.version()?;
    let ms = ctx
        .keys
        .master_secret
        .as_ref()
        .ok_or_else(|| Error::internal("No master secret for Finished"))?;
    if version == ProtocolVersion::SSL3_0 {
        let (md5, sha1) = ctx
            .transcript
            .legacy_contexts()
            .ok_or_else(|| Error::internal("SSL 3.0 transcript without MD5 and SHA-1"))?;
        let label = match sender {
            Role::Client => SSL3_CLIENT_SENDER,
            Role::Server => SSL3_SERVER_SENDER,
        };
        return prf::ssl3_finished(ctx.provider(), md5, sha1, ms, label);
    }
    let spec = ctx.suite_spec()?;
    let th = ctx.transcript.digest()?;
    prf::finished_verify_data(
        ctx.provider(),
        version,
        spec.hash,
        ms,
        sender.is_client(),
        &th,
    )
}

/// verify_data of a TLS 1.3 Finished sent by `sender`.
pub(crate) fn tls13_verify_data(ctx: &HandshakeContext, sender: Role) -> Result<Vec<u8>, Error> {
    let schedule = schedule(ctx)?;
    let base = match sender {
        Role::Client => ctx.keys.client_handshake.as_ref(),
        Role::Server => ctx.keys.server_handshake.as_ref(),
    }
    .ok_or_else(|| Error::internal("No handshake traffic secret"))?;
    let th = ctx.transcript.digest()?;
    schedule.finished_verify_data(base, &th)
}

fn schedule(ctx: &HandshakeContext) -> Result<&KeySchedule, Error> {
    ctx.keys
        .schedule
        .as_ref()
        .ok_or_else(|| Error::internal("Key schedule not started"))
}

fn schedule_mut(ctx: &mut HandshakeContext) -> Result<&mut KeySchedule, Error> {
    ctx.keys
        .schedule
        .as_mut()
        .ok_or_else(|| Error::internal("Key schedule not started"))
}

/// Start the TLS 1.3 schedule, mix in the (EC)DHE secret and derive the
/// handshake traffic secrets over the transcript up to ServerHello.
pub(crate) fn handshake_secrets(ctx: &mut HandshakeContext, shared: &[u8]) -> Result<(), Error> {
    let spec = ctx.suite_spec()?;
    let psk: Option<Secret> = if ctx.negotiated.resumed {
        ctx.resuming.as_ref().map(|s| s.secret.clone())
    } else {
        None
    };
    let mut schedule = KeySchedule::new(
        ctx.provider(),
        spec.hash,
        ctx.is_dtls(),
        psk.as_ref().map(|p| p.as_slice()),
    )?;
    schedule.input_shared_secret(shared)?;
    let th = ctx.transcript.digest()?;
    let (client, server) = schedule.handshake_traffic_secrets(&th)?;
    ctx.keys.schedule = Some(schedule);
    ctx.keys.client_handshake = Some(client.clone());
    ctx.keys.server_handshake = Some(server.clone());
    trace!("Handshake traffic secrets ready");
    ctx.push(Output::Secrets(Secrets::Traffic {
        stage: TrafficStage::Handshake,
        suite: spec.suite,
        client,
        server,
    }));
    Ok(())
}

/// Application traffic and exporter secrets over the transcript up to the
/// server Finished.
pub(crate) fn application_secrets(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let spec = ctx.suite_spec()?;
    let th = ctx.transcript.digest()?;
    let schedule = schedule_mut(ctx)?;
    schedule.input_empty()?;
    let (client, server) = schedule.application_traffic_secrets(&th)?;
    let exporter = schedule.exporter_master_secret(&th)?;
    ctx.keys.client_application = Some(client.clone());
    ctx.keys.server_application = Some(server.clone());
    ctx.keys.exporter = Some(exporter);
    trace!("Application traffic secrets ready");
    ctx.push(Output::Secrets(Secrets::Traffic {
        stage: TrafficStage::Application,
        suite: spec.suite,
        client,
        server,
    }));
    Ok(())
}

/// Resumption master secret over the transcript up to the client Finished.
pub(crate) fn resumption_secret(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let th = ctx.transcript.digest()?;
    let rms = schedule(ctx)?.resumption_master_secret(&th)?;
    ctx.keys.resumption_master = Some(rms);
    Ok(())
}
