//! ClientHello: the client's offer, and the server side negotiation.
//!
//! The server reads the hello, fixes the version, and from there takes one
//! of these paths:
//!
//! ```text
//! DTLS 1.0/1.2, no valid cookie   HelloVerifyRequest, wait for a new hello
//! TLS 1.3, no usable key share    HelloRetryRequest, wait for a new hello
//! TLS 1.3                         ServerHello .. Finished
//! TLS 1.2 and earlier, resumable  ServerHello, ChangeCipherSpec, Finished
//! TLS 1.2 and earlier             ServerHello .. ServerHelloDone
//! ```

use std::sync::Arc;

use super::context::{ct_eq, HandshakeContext};
use super::{certificate, certificate_request, certificate_verify, encrypted_extensions};
use super::{finished, hello_verify, server_hello, server_hello_done, server_key_exchange};
use crate::config::ClientAuth;
use crate::crypto::key_schedule::KeySchedule;
use crate::extension::{self, client_allows_mode, client_shares, client_versions};
use crate::extension::{local_groups, offered_psks, peer_groups, presented_ticket};
use crate::extension::{OfferedPsks, PSK_DHE_KE};
use crate::kx::{self, Possession};
use crate::message::{ClientHello, HandshakeHeader};
use crate::session::Session;
use crate::types::{AlertDescription, CipherSuite, ExtensionType, HandshakeType};
use crate::types::{NamedGroup, ProtocolVersion, SessionId};
use crate::Error;

/// Client: send the first hello, or repeat it after a HelloVerifyRequest or
/// HelloRetryRequest.
pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let (random, session_id) = match &ctx.client_hello {
        Some(previous) => (previous.random, previous.session_id.clone()),
        None => {
            ctx.negotiated.client_random = ctx.new_random();
            ctx.resuming = cached_session(ctx);
            (ctx.negotiated.client_random, offered_session_id(ctx))
        }
    };

    let newest = ctx
        .active_versions
        .first()
        .copied()
        .ok_or_else(|| Error::ConfigurationError("No protocol version available".to_string()))?;

    let mut suites = ctx.config.catalogs().supported_suites(
        ctx.config.cipher_suites(),
        &ctx.active_versions,
        ctx.config.constraints(),
    );
    if suites.is_empty() {
        return Err(Error::ConfigurationError(
            "No cipher suite available for the enabled versions".to_string(),
        ));
    }

    let extensions = extension::produce(ctx, HandshakeType::ClientHello)?;
    let has_reneg_info = extensions
        .iter()
        .any(|e| e.ext_type == ExtensionType::RenegotiationInfo);
    if !has_reneg_info && ctx.renegotiation.is_none() {
        suites.push(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV);
    }

    let mut hello = ClientHello {
        legacy_version: newest.legacy_wire_version(),
        random,
        session_id,
        cookie: ctx.is_dtls().then(|| ctx.cookie.clone().unwrap_or_default()),
        cipher_suites: suites,
        compression_methods: vec![0],
        extensions,
    };

    let mut body = Vec::new();
    hello.serialize(&mut body);
    patch_binder(ctx, &mut hello, &mut body)?;

    debug!(
        "ClientHello for {} with {} suites",
        newest,
        hello.cipher_suites.len()
    );
    ctx.client_hello = Some(hello);
    ctx.send_handshake(HandshakeType::ClientHello, &body)?;

    if ctx.is_dtls() && ctx.cookie.is_none() && !ctx.hello_retry {
        ctx.expect(&[HandshakeType::ServerHello, HandshakeType::HelloVerifyRequest]);
    } else {
        ctx.expect(&[HandshakeType::ServerHello]);
    }
    Ok(())
}

/// A session for the configured server name, if it can be offered.
fn cached_session(ctx: &HandshakeContext) -> Option<Arc<Session>> {
    if ctx.renegotiation.is_some() {
        return None;
    }
    let name = ctx.config.server_name()?;
    let session = ctx
        .config
        .session_cache()
        .get(name.as_bytes(), ctx.now)?;
    let usable = session.is_resumable(ctx.now)
        && ctx.active_versions.contains(&session.version)
        && ctx.config.cipher_suites().contains(&session.suite);
    if !usable {
        debug!("Cached session for {} is not usable", name);
        return None;
    }
    trace!("Offering cached {} session for {}", session.version, name);
    Some(session)
}

fn offered_session_id(ctx: &HandshakeContext) -> SessionId {
    match &ctx.resuming {
        Some(s) if !s.version.use_tls13_plus() => s.id.clone(),
        _ => SessionId::empty(),
    }
}

/// Fill in the PSK binder, computed over the hello up to the binder list.
fn patch_binder(
    ctx: &HandshakeContext,
    hello: &mut ClientHello,
    body: &mut Vec<u8>,
) -> Result<(), Error> {
    let Some(ext) = hello
        .extensions
        .last_mut()
        .filter(|e| e.ext_type == ExtensionType::PreSharedKey)
    else {
        return Ok(());
    };
    let session = ctx
        .resuming
        .as_ref()
        .ok_or_else(|| Error::internal("PSK offered without a session"))?;
    let spec = session
        .suite
        .spec()
        .ok_or_else(|| Error::internal("PSK of an unknown suite"))?;
    let binders_len = 2 + 1 + spec.hash.output_len();
    let kept = body
        .len()
        .checked_sub(binders_len)
        .ok_or_else(|| Error::internal("ClientHello shorter than its binders"))?;

    let mut partial = Vec::with_capacity(4 + kept);
    HandshakeHeader {
        msg_type: HandshakeType::ClientHello,
        length: body.len() as u32,
        dtls: None,
    }
    .serialize(&mut partial);
    partial.extend_from_slice(&body[..kept]);
    let th = ctx.transcript.digest_with(spec.hash, &partial)?;

    let schedule = KeySchedule::new(ctx.provider(), spec.hash, ctx.is_dtls(), Some(session.secret.as_slice()))?;
    let binder_key = schedule.binder_key(true)?;
    let binder = schedule.binder(&binder_key, &th)?;

    let mut binders = Vec::new();
    OfferedPsks {
        identities: Vec::new(),
        binders: vec![binder],
    }
    .serialize_binders(&mut binders);

    body.truncate(kept);
    body.extend_from_slice(&binders);
    let ext_kept = ext.data.len() - binders_len;
    ext.data.truncate(ext_kept);
    ext.data.extend_from_slice(&binders);
    trace!("Patched PSK binder");
    Ok(())
}

/// Server: negotiate from a received hello.
pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let hello = ClientHello::decode(ctx.inbound()?.body())?;
    if !hello.compression_methods.contains(&0) {
        return Err(Error::illegal("Null compression not offered"));
    }
    if ctx.hello_retry {
        ctx.extensions.clear_for(HandshakeType::ClientHello);
    }
    extension::load(ctx, HandshakeType::ClientHello, &hello.extensions)?;

    let version = select_version(ctx, &hello)?;
    if hello.offers_suite(CipherSuite::FALLBACK_SCSV) {
        if let Some(newest) = ctx.active_versions.first() {
            if version.is_below(*newest) {
                return Err(Error::NegotiationFailure(
                    AlertDescription::InappropriateFallback,
                    format!("Fallback to {} while {} is enabled", version, newest),
                ));
            }
        }
    }

    if hello_verify::cookie_required(ctx, &hello, version)? {
        ctx.consume_inbound()?;
        ctx.reset_transcript();
        ctx.extensions.clear_for(HandshakeType::ClientHello);
        ctx.queue(hello_verify::produce);
        ctx.expect(&[HandshakeType::ClientHello]);
        return Ok(());
    }

    if ctx.hello_retry && ctx.negotiated.version != Some(version) {
        return Err(Error::illegal("Version changed after HelloRetryRequest"));
    }
    ctx.set_version(version)?;
    extension::check_absent(ctx, HandshakeType::ClientHello)?;

    if hello.offers_suite(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV) {
        if ctx.renegotiation.is_some() {
            return Err(Error::handshake_failure(
                "Renegotiation signalling suite in a renegotiating hello",
            ));
        }
        ctx.negotiated.secure_renegotiation = true;
    }

    ctx.negotiated.client_random = hello.random;
    ctx.client_hello = Some(hello);

    if version.use_tls13_plus() {
        negotiate_tls13(ctx)
    } else {
        negotiate_tls12(ctx)
    }
}

/// The newest version both sides can speak.
fn select_version(ctx: &HandshakeContext, hello: &ClientHello) -> Result<ProtocolVersion, Error> {
    let found = match client_versions(ctx) {
        Some(offered) => ctx
            .active_versions
            .iter()
            .copied()
            .find(|v| offered.contains(v)),
        None => ctx.active_versions.iter().copied().find(|v| {
            !v.use_tls13_plus()
                && v.is_dtls() == hello.legacy_version.is_dtls()
                && !hello.legacy_version.is_below(*v)
        }),
    };
    found.ok_or_else(|| {
        debug!("No common version with client at {}", hello.legacy_version);
        Error::NegotiationFailure(
            AlertDescription::ProtocolVersion,
            format!("No common version, client offered {}", hello.legacy_version),
        )
    })
}

fn negotiate_tls13(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let suite = select_tls13_suite(ctx)?;
    if ctx.negotiated.suite.map(|s| s != suite).unwrap_or(false) {
        return Err(Error::illegal("Cipher suite changed after HelloRetryRequest"));
    }
    ctx.set_suite(suite)?;
    extension::trade(ctx, HandshakeType::ClientHello)?;

    if ctx.hello_retry
        && ctx.retry_cookie.is_some()
        && !ctx
            .extensions
            .contains(HandshakeType::ClientHello, ExtensionType::Cookie)
    {
        return Err(Error::NegotiationFailure(
            AlertDescription::MissingExtension,
            "Retried hello without the cookie".to_string(),
        ));
    }

    let (group, has_share) = select_share_group(ctx)?;
    let want_cookie = ctx.is_dtls() && ctx.config.cookie_exchange() && !ctx.hello_retry;
    if !has_share || want_cookie {
        if ctx.hello_retry {
            return Err(Error::illegal("Retried hello still has no usable key share"));
        }
        ctx.hello_retry = true;
        ctx.retry_group = (!has_share).then_some(group);
        if want_cookie {
            let mut cookie = vec![0u8; 32];
            ctx.rng.fill(&mut cookie);
            ctx.retry_cookie = Some(cookie);
        }
        debug!("Asking for a new hello (group {:?})", ctx.retry_group);
        ctx.queue(server_hello::produce_retry);
        ctx.expect(&[HandshakeType::ClientHello]);
        return Ok(());
    }

    accept_psk(ctx)?;

    if !ctx.negotiated.resumed {
        let spec = ctx.suite_spec()?;
        let selection = kx::create_possessions(ctx, spec)?
            .ok_or_else(|| Error::handshake_failure("No certificate usable with TLS 1.3"))?;
        ctx.possessions = selection.possessions;
        ctx.negotiated.local_scheme = selection.scheme;
    }

    let kx = ctx
        .provider()
        .kx_group(group)
        .ok_or_else(|| Error::internal(format!("No provider for {:?}", group)))?
        .start_exchange()
        .map_err(Error::CryptoError)?;
    ctx.possessions.push(Possession::Ephemeral(kx));
    ctx.negotiated.group = Some(group);

    ctx.queue(server_hello::produce);
    ctx.queue(encrypted_extensions::produce);
    if !ctx.negotiated.resumed {
        if ctx.config.client_auth() != ClientAuth::None {
            ctx.queue(certificate_request::produce);
        }
        ctx.queue(certificate::produce);
        ctx.queue(certificate_verify::produce);
    }
    ctx.queue(finished::produce);
    Ok(())
}

/// Server preference: the first local suite the client also offered.
fn select_tls13_suite(ctx: &HandshakeContext) -> Result<CipherSuite, Error> {
    let version = ctx.version()?;
    let offered = ctx
        .client_hello
        .as_ref()
        .map(|h| h.cipher_suites.as_slice())
        .unwrap_or_default();
    ctx.config
        .catalogs()
        .supported_suites(ctx.config.cipher_suites(), &[version], ctx.config.constraints())
        .into_iter()
        .find(|s| offered.contains(s) && s.spec().map(|sp| sp.is_tls13()).unwrap_or(false))
        .ok_or_else(|| Error::handshake_failure("No TLS 1.3 cipher suite in common"))
}

/// The group to key with, and whether the client already sent a share for it.
fn select_share_group(ctx: &HandshakeContext) -> Result<(NamedGroup, bool), Error> {
    let local = local_groups(ctx);
    let shares = client_shares(ctx);
    if let Some(g) = local.iter().find(|g| shares.iter().any(|s| s.group == **g)) {
        return Ok((*g, true));
    }
    let peer = peer_groups(ctx).unwrap_or(&[]);
    local
        .iter()
        .find(|g| peer.contains(g))
        .map(|g| (*g, false))
        .ok_or_else(|| Error::handshake_failure("No key exchange group in common"))
}

/// Take the offered ticket if it is ours, still valid and its binder checks.
fn accept_psk(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let Some(offered) = offered_psks(ctx).cloned() else {
        return Ok(());
    };
    if !ctx.config.session_tickets() || !client_allows_mode(ctx, PSK_DHE_KE) {
        return Ok(());
    }
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;
    let Some(identity) = offered.identities.first() else {
        return Ok(());
    };
    let Some(session) = ctx
        .config
        .session_cache()
        .get(&identity.identity, ctx.now)
    else {
        debug!("Unknown PSK identity, full handshake");
        return Ok(());
    };
    let same_hash = session.suite.spec().map(|s| s.hash) == Some(spec.hash);
    if !session.is_resumable(ctx.now) || session.version != version || !same_hash {
        debug!("PSK not usable with {}, full handshake", spec.suite);
        return Ok(());
    }

    let hashed = ctx.inbound()?.hashed_form(Some(version));
    let kept = hashed
        .len()
        .checked_sub(offered.binders_len())
        .ok_or_else(|| Error::decode("Binders longer than the hello"))?;
    let th = ctx.transcript.digest_with(spec.hash, &hashed[..kept])?;
    let schedule = KeySchedule::new(ctx.provider(), spec.hash, ctx.is_dtls(), Some(session.secret.as_slice()))?;
    let binder_key = schedule.binder_key(true)?;
    let expected = schedule.binder(&binder_key, &th)?;
    let received = offered.binders.first().map(|b| b.as_slice()).unwrap_or_default();
    if !ct_eq(&expected, received) {
        return Err(Error::NegotiationFailure(
            AlertDescription::DecryptError,
            "PSK binder does not verify".to_string(),
        ));
    }

    debug!("Resuming {} session by PSK", session.suite);
    ctx.psk_index = Some(0);
    ctx.negotiated.resumed = true;
    ctx.negotiated.peer_certificates = session.peer_certificates.clone();
    ctx.resuming = Some(session);
    Ok(())
}

fn negotiate_tls12(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if let Some(session) = resumable_session(ctx) {
        return resume(ctx, session);
    }
    let version = ctx.version()?;
    let offered = ctx
        .client_hello
        .as_ref()
        .map(|h| h.cipher_suites.clone())
        .unwrap_or_default();
    let ours = ctx.config.catalogs().supported_suites(
        ctx.config.cipher_suites(),
        &[version],
        ctx.config.constraints(),
    );

    let mut chosen = None;
    for suite in ours {
        if !offered.contains(&suite) || suite.is_scsv() {
            continue;
        }
        let Some(spec) = suite.spec() else {
            continue;
        };
        if spec.is_tls13() {
            continue;
        }
        if let Some(selection) = kx::create_possessions(ctx, spec)? {
            chosen = Some((spec, selection));
            break;
        }
    }
    let (spec, selection) =
        chosen.ok_or_else(|| Error::handshake_failure("No cipher suite in common"))?;

    ctx.set_suite(spec.suite)?;
    ctx.possessions = selection.possessions;
    ctx.negotiated.group = selection.group;
    ctx.negotiated.local_scheme = selection.scheme;
    extension::trade(ctx, HandshakeType::ClientHello)?;

    if ctx.config.session_cache().capacity() > 0 {
        let mut id = [0u8; SessionId::MAX_LEN];
        ctx.rng.fill(&mut id);
        ctx.negotiated.session_id = SessionId::try_new(&id).unwrap_or_default();
    }

    let authenticated = spec.kx.is_authenticated();
    ctx.queue(server_hello::produce);
    if authenticated {
        ctx.queue(certificate::produce);
    }
    if kx::sends_key_exchange(ctx, spec.kx) {
        ctx.queue(server_key_exchange::produce);
    }
    if authenticated && ctx.config.client_auth() != ClientAuth::None {
        ctx.queue(certificate_request::produce);
    }
    ctx.queue(server_hello_done::produce);
    Ok(())
}

/// A cached session the hello names by ticket or id, if it can resume here.
fn resumable_session(ctx: &HandshakeContext) -> Option<Arc<Session>> {
    if ctx.renegotiation.is_some() {
        return None;
    }
    let hello = ctx.client_hello.as_ref()?;
    let cache = ctx.config.session_cache();
    let by_ticket = presented_ticket(ctx)
        .filter(|_| ctx.config.session_tickets())
        .and_then(|t| cache.get(t, ctx.now));
    let session = match by_ticket {
        Some(s) => s,
        None if !hello.session_id.is_empty() => cache.get(hello.session_id.as_slice(), ctx.now)?,
        None => return None,
    };
    let version = ctx.negotiated.version?;
    if !session.is_resumable(ctx.now) || session.version != version {
        return None;
    }
    if !hello.offers_suite(session.suite)
        || !ctx.config.catalogs().suite_available(session.suite, version)
    {
        debug!("Session suite {} no longer offered", session.suite);
        return None;
    }
    let ems = ctx
        .extensions
        .contains(HandshakeType::ClientHello, ExtensionType::ExtendedMasterSecret);
    if session.extended_master_secret != ems {
        debug!("Extended master secret differs from the session, full handshake");
        return None;
    }
    Some(session)
}

fn resume(ctx: &mut HandshakeContext, session: Arc<Session>) -> Result<(), Error> {
    debug!("Resuming {} session", session.suite);
    ctx.set_suite(session.suite)?;
    extension::trade(ctx, HandshakeType::ClientHello)?;

    let echoed = ctx
        .client_hello
        .as_ref()
        .map(|h| h.session_id.clone())
        .filter(|id| !id.is_empty());
    ctx.negotiated.session_id = echoed.unwrap_or_else(|| session.id.clone());
    ctx.negotiated.resumed = true;
    ctx.negotiated.extended_master_secret = session.extended_master_secret;
    ctx.negotiated.peer_certificates = session.peer_certificates.clone();
    ctx.negotiated.local_certificates = session.local_certificates.clone();
    ctx.keys.master_secret = Some(session.secret.clone());
    ctx.ticket_expected = false;
    ctx.resuming = Some(session);

    ctx.queue(server_hello::produce);
    ctx.queue(finished::produce);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;

    #[test]
    fn client_hello_offers_configured_suites() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2])
            .build()
            .unwrap();
        let mut ctx = context(Role::Client, config);
        produce(&mut ctx).unwrap();

        let hello = ctx.client_hello.clone().unwrap();
        assert_eq!(hello.legacy_version, ProtocolVersion::TLS1_2);
        assert_eq!(hello.compression_methods, vec![0]);
        assert!(hello.cookie.is_none());
        assert!(hello.extension(ExtensionType::SupportedVersions).is_some());
        assert!(hello.extension(ExtensionType::KeyShare).is_some());
        assert!(ctx.expected.contains(HandshakeType::ServerHello));
        assert!(!ctx.expected.contains(HandshakeType::HelloVerifyRequest));
    }

    #[test]
    fn version_from_legacy_field() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2])
            .build()
            .unwrap();
        let ctx = context(Role::Server, config);
        let mut hello = ClientHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: Default::default(),
            session_id: SessionId::empty(),
            cookie: None,
            cipher_suites: vec![CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256],
            compression_methods: vec![0],
            extensions: Vec::new(),
        };
        // Without supported_versions TLS 1.3 is never picked.
        assert_eq!(select_version(&ctx, &hello).unwrap(), ProtocolVersion::TLS1_2);

        hello.legacy_version = ProtocolVersion::TLS1_0;
        let err = select_version(&ctx, &hello).unwrap_err();
        assert_eq!(err.alert(), AlertDescription::ProtocolVersion);
    }
}
