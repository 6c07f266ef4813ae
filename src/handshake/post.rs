//! Messages after the handshake completed.
//!
//! ```text
//! TLS 1.3     NewSessionTicket   client stores a resumption PSK
//!             KeyUpdate          next traffic secret, answered when requested
//! TLS 1.2-    HelloRequest       client starts a renegotiation
//!             ClientHello        server accepts a renegotiation
//! ```
//!
//! Renegotiation runs in a fresh [`HandshakeContext`] bound to the version
//! of this connection. Only TLS does it. DTLS restarts message sequence
//! numbers per handshake, which the established connection cannot tell
//! apart from retransmissions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::context::{HandshakeContext, Negotiated, Role, Secret, VerifyData};
use super::io::{HandshakeIo, Inbound};
use crate::config::Config;
use crate::crypto::key_schedule::KeySchedule;
use crate::event::{Direction, Output, Secrets};
use crate::extension::{client_allows_mode, PSK_DHE_KE};
use crate::message::{decode_empty, KeyUpdate, NewSessionTicket, T13NewSessionTicket};
use crate::rng::SeededRng;
use crate::session::Session;
use crate::types::{AlertDescription, HandshakeType, ProtocolVersion, SessionId};
use crate::Error;

/// Size of a TLS 1.3 ticket, a random lookup key into the server cache.
const TICKET_LEN: usize = 32;

/// What the connection must do after a post-handshake message.
#[derive(Debug)]
pub(crate) enum PostAction {
    None,
    /// Start a new handshake. A server passes the hello that asked for it.
    Renegotiate(Option<Inbound>),
}

/// State kept once the handshake is done.
pub(crate) struct PostHandshakeContext {
    pub config: Arc<Config>,
    pub role: Role,
    pub negotiated: Negotiated,
    pub io: HandshakeIo,
    rng: SeededRng,
    schedule: Option<KeySchedule>,
    client_application: Option<Secret>,
    server_application: Option<Secret>,
    resumption_master: Option<Secret>,
    pub verify_data: VerifyData,
    /// The client accepts tickets for PSK with (EC)DHE.
    tickets_wanted: bool,
    ticket_nonce: u64,
}

impl std::fmt::Debug for PostHandshakeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostHandshakeContext")
            .field("role", &self.role)
            .field("negotiated", &self.negotiated)
            .field("io", &self.io)
            .field("ticket_nonce", &self.ticket_nonce)
            .finish()
    }
}

impl PostHandshakeContext {
    pub fn new(ctx: HandshakeContext) -> Self {
        let tickets_wanted = ctx.role == Role::Server
            && ctx.is_tls13()
            && ctx.config.session_tickets()
            && client_allows_mode(&ctx, PSK_DHE_KE);
        PostHandshakeContext {
            tickets_wanted,
            config: ctx.config,
            role: ctx.role,
            negotiated: ctx.negotiated,
            io: ctx.io,
            rng: ctx.rng,
            schedule: ctx.keys.schedule,
            client_application: ctx.keys.client_application,
            server_application: ctx.keys.server_application,
            resumption_master: ctx.keys.resumption_master,
            verify_data: ctx.verify_data,
            ticket_nonce: 0,
        }
    }

    fn version(&self) -> Result<ProtocolVersion, Error> {
        self.negotiated
            .version
            .ok_or_else(|| Error::internal("Connection without a version"))
    }

    fn is_tls13(&self) -> bool {
        self.negotiated
            .version
            .map(|v| v.use_tls13_plus())
            .unwrap_or(false)
    }

    fn schedule(&self) -> Result<&KeySchedule, Error> {
        self.schedule
            .as_ref()
            .ok_or_else(|| Error::internal("No key schedule"))
    }

    /// Whether a renegotiation may run on this connection.
    pub fn may_renegotiate(&self) -> bool {
        !self.is_tls13()
            && !self.io.is_dtls()
            && self.config.allow_renegotiation()
            && self.negotiated.secure_renegotiation
    }

    /// Whether the server should hand out a ticket without being asked.
    pub fn wants_ticket(&self) -> bool {
        self.tickets_wanted && self.ticket_nonce == 0
    }

    fn send(&mut self, msg_type: HandshakeType, body: &[u8], now: Instant) {
        trace!("Send {:?} ({} bytes)", msg_type, body.len());
        self.io.send(msg_type, body, now);
        // Nothing answers these, so nothing to retransmit on a timer.
        self.io.final_flight();
    }

    pub fn handle(&mut self, inbound: Inbound, now: Instant) -> Result<PostAction, Error> {
        self.io.message_received();
        trace!("Post-handshake {:?}", inbound.msg_type);
        match (self.role, inbound.msg_type, self.is_tls13()) {
            (Role::Client, HandshakeType::NewSessionTicket, true) => {
                self.receive_ticket(inbound.body(), now)?;
                Ok(PostAction::None)
            }
            (_, HandshakeType::KeyUpdate, true) => {
                self.receive_key_update(inbound.body(), now)?;
                Ok(PostAction::None)
            }
            (Role::Client, HandshakeType::HelloRequest, false) => {
                decode_empty(inbound.body(), HandshakeType::HelloRequest)?;
                Ok(self.renegotiation_request(None))
            }
            (Role::Server, HandshakeType::ClientHello, false) => {
                Ok(self.renegotiation_request(Some(inbound)))
            }
            (_, other, _) => Err(Error::UnexpectedMessage(format!(
                "{:?} after the handshake",
                other
            ))),
        }
    }

    fn renegotiation_request(&mut self, hello: Option<Inbound>) -> PostAction {
        if self.may_renegotiate() {
            debug!("Peer asked to renegotiate");
            return PostAction::Renegotiate(hello);
        }
        warn!("Refusing renegotiation");
        self.io.push(Output::Alert(AlertDescription::NoRenegotiation));
        PostAction::None
    }

    /// Server: ask the client for a new handshake.
    pub fn request_renegotiation(&mut self, now: Instant) -> Result<(), Error> {
        if !self.may_renegotiate() {
            return Err(Error::ConfigurationError(
                "Renegotiation not possible on this connection".to_string(),
            ));
        }
        self.send(HandshakeType::HelloRequest, &[], now);
        Ok(())
    }

    fn receive_ticket(&mut self, body: &[u8], now: Instant) -> Result<(), Error> {
        let version = self.version()?;
        let NewSessionTicket::T13(ticket) = NewSessionTicket::decode(body, version)? else {
            return Err(Error::internal("Legacy ticket after a TLS 1.3 handshake"));
        };
        if ticket.lifetime == 0 {
            debug!("Ticket with zero lifetime ignored");
            return Ok(());
        }
        let Some(name) = self.config.server_name().map(str::to_string) else {
            trace!("No server name to store the ticket under");
            return Ok(());
        };
        let rms = self
            .resumption_master
            .as_ref()
            .ok_or_else(|| Error::internal("No resumption master secret"))?;
        let psk = self.schedule()?.resumption_psk(rms, &ticket.nonce)?;

        let cache = self.config.session_cache().clone();
        let lifetime = cache.lifetime().min(Duration::from_secs(ticket.lifetime as u64));
        let mut session =
            Session::from_negotiated(&self.negotiated, SessionId::empty(), psk, now, lifetime)
                .ok_or_else(|| Error::internal("Ticket before negotiation"))?;
        session.ticket = Some(ticket.ticket);
        session.ticket_age_add = ticket.age_add;
        cache.put(name.as_bytes(), Arc::new(session));
        debug!("Stored TLS 1.3 ticket for {}", name);
        Ok(())
    }

    /// Server: issue a TLS 1.3 ticket.
    pub fn issue_ticket(&mut self, now: Instant) -> Result<(), Error> {
        if self.role != Role::Server || !self.is_tls13() {
            return Err(Error::ConfigurationError(
                "Only a TLS 1.3 server issues tickets".to_string(),
            ));
        }
        let cache = self.config.session_cache().clone();
        if !self.config.session_tickets() || cache.capacity() == 0 {
            return Ok(());
        }
        let rms = self
            .resumption_master
            .as_ref()
            .ok_or_else(|| Error::internal("No resumption master secret"))?;
        let nonce = self.ticket_nonce.to_be_bytes().to_vec();
        self.ticket_nonce += 1;
        let psk = self.schedule()?.resumption_psk(rms, &nonce)?;

        let mut id = vec![0u8; TICKET_LEN];
        self.rng.fill(&mut id);
        let age_add: u32 = self.rng.random();
        let lifetime = cache.lifetime();

        let mut session =
            Session::from_negotiated(&self.negotiated, SessionId::empty(), psk, now, lifetime)
                .ok_or_else(|| Error::internal("Ticket before negotiation"))?;
        session.ticket = Some(id.clone());
        session.ticket_age_add = age_add;
        cache.put(&id, Arc::new(session));

        let message = NewSessionTicket::T13(T13NewSessionTicket {
            lifetime: lifetime.as_secs().min(u32::MAX as u64) as u32,
            age_add,
            nonce,
            ticket: id,
            extensions: Vec::new(),
        });
        let mut body = Vec::new();
        message.serialize(&mut body);
        self.send(HandshakeType::NewSessionTicket, &body, now);
        debug!("Issued TLS 1.3 ticket");
        Ok(())
    }

    fn own_secret(&mut self) -> &mut Option<Secret> {
        match self.role {
            Role::Client => &mut self.client_application,
            Role::Server => &mut self.server_application,
        }
    }

    fn peer_secret(&mut self) -> &mut Option<Secret> {
        match self.role {
            Role::Client => &mut self.server_application,
            Role::Server => &mut self.client_application,
        }
    }

    fn receive_key_update(&mut self, body: &[u8], now: Instant) -> Result<(), Error> {
        let update = KeyUpdate::decode(body)?;
        let current = self
            .peer_secret()
            .clone()
            .ok_or_else(|| Error::internal("No peer traffic secret"))?;
        let next = self.schedule()?.next_traffic_secret(&current)?;
        *self.peer_secret() = Some(next.clone());
        trace!("Peer traffic secret updated");
        self.io.push(Output::Secrets(Secrets::Updated {
            direction: Direction::Receive,
            secret: next,
        }));
        if update == KeyUpdate::UpdateRequested {
            self.send_key_update(false, now)?;
        }
        Ok(())
    }

    /// Move our sending side to the next traffic secret.
    pub fn send_key_update(&mut self, request_peer: bool, now: Instant) -> Result<(), Error> {
        if !self.is_tls13() {
            return Err(Error::ConfigurationError(
                "KeyUpdate needs TLS 1.3".to_string(),
            ));
        }
        let update = if request_peer {
            KeyUpdate::UpdateRequested
        } else {
            KeyUpdate::UpdateNotRequested
        };
        let mut body = Vec::new();
        update.serialize(&mut body);
        self.send(HandshakeType::KeyUpdate, &body, now);

        let current = self
            .own_secret()
            .clone()
            .ok_or_else(|| Error::internal("No traffic secret"))?;
        let next = self.schedule()?.next_traffic_secret(&current)?;
        *self.own_secret() = Some(next.clone());
        trace!("Own traffic secret updated");
        self.io.push(Output::Secrets(Secrets::Updated {
            direction: Direction::Send,
            secret: next,
        }));
        Ok(())
    }
}
