//! The handshake state machine and the connection driving it.
//!
//! ## Full handshake, TLS 1.2 and earlier (RFC 5246)
//!
//! ```text
//! Client                                               Server
//!
//! 1     ClientHello                  -------->
//!
//! 2                                  <--------   HelloVerifyRequest*
//!                                                  (DTLS only)
//!
//! 3     ClientHello                  -------->
//!       + cookie
//!
//! 4                                                      ServerHello
//!                                                       Certificate*
//!                                                 ServerKeyExchange*
//!                                                CertificateRequest*
//!                                    <--------       ServerHelloDone
//!
//! 5     Certificate*
//!       ClientKeyExchange
//!       CertificateVerify*
//!       [ChangeCipherSpec]
//!       Finished                     -------->
//!
//! 6                                              NewSessionTicket*
//!                                                 [ChangeCipherSpec]
//!                                    <--------             Finished
//! ```
//!
//! An abbreviated handshake swaps the order of the last two flights: the
//! server answers the hello with ServerHello, ChangeCipherSpec and Finished.
//!
//! ## Full handshake, TLS 1.3 (RFC 8446)
//!
//! ```text
//! 1     ClientHello                  -------->
//!       + key_share
//!
//! 2                                  <--------   HelloRetryRequest*
//!
//! 3     ClientHello                  -------->
//!
//! 4                                                      ServerHello
//!                                              EncryptedExtensions
//!                                              CertificateRequest*
//!                                                     Certificate*
//!                                               CertificateVerify*
//!                                    <--------             Finished
//!
//! 5     Certificate*
//!       CertificateVerify*
//!       Finished                     -------->
//! ```
//!
//! Each message type is handled by a consumer, selected from a fixed table
//! by role and type. A message is only accepted when the previous consumer
//! or producer put its type in the expected set. Consumers queue the
//! producers of the next flight, which run once the consumer returns.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::Config;
use crate::event::Output;
use crate::types::{AlertDescription, HandshakeType};
use crate::Error;

pub(crate) mod context;
pub(crate) mod io;

mod certificate;
mod certificate_request;
mod certificate_verify;
mod client_hello;
mod client_key_exchange;
mod encrypted_extensions;
mod finished;
mod hello_verify;
mod keys;
mod new_session_ticket;
mod post;
mod server_hello;
mod server_hello_done;
mod server_key_exchange;

use context::{Consumer, HandshakeContext};
use io::{HandshakeIo, Inbound};
use post::{PostAction, PostHandshakeContext};

pub use context::{Negotiated, Phase, Role};

/// Move the handshake to `phase`.
pub(crate) fn set_phase(ctx: &mut HandshakeContext, phase: Phase) {
    if ctx.phase != phase {
        trace!("{:?} -> {:?}", ctx.phase, phase);
        ctx.phase = phase;
    }
}

/// The consumer of `msg_type` at `role`. `None` means the type is never
/// received there.
fn consumer(role: Role, msg_type: HandshakeType) -> Option<Consumer> {
    use HandshakeType::*;
    let c: Consumer = match (role, msg_type) {
        (Role::Client, ServerHello) => server_hello::consume,
        (Role::Client, HelloVerifyRequest) => hello_verify::consume,
        (Role::Client, EncryptedExtensions) => encrypted_extensions::consume,
        (Role::Client, CertificateRequest) => certificate_request::consume,
        (Role::Client, ServerKeyExchange) => server_key_exchange::consume,
        (Role::Client, ServerHelloDone) => server_hello_done::consume,
        (Role::Client, NewSessionTicket) => new_session_ticket::consume,
        (Role::Server, ClientHello) => client_hello::consume,
        (Role::Server, ClientKeyExchange) => client_key_exchange::consume,
        (_, Certificate) => certificate::consume,
        (_, CertificateVerify) => certificate_verify::consume,
        (_, Finished) => finished::consume,
        _ => return None,
    };
    Some(c)
}

/// Messages whose consumer may run as a [`DelegatedTask`]. These carry the
/// certificate checks and private key operations.
fn is_delegable(msg_type: HandshakeType) -> bool {
    matches!(
        msg_type,
        HandshakeType::Certificate
            | HandshakeType::CertificateVerify
            | HandshakeType::ClientKeyExchange
    )
}

fn run_producers(ctx: &mut HandshakeContext) -> Result<(), Error> {
    while let Some(producer) = ctx.producers.pop_front() {
        producer(ctx)?;
    }
    Ok(())
}

/// Consume one message and produce whatever it calls for.
fn dispatch(ctx: &mut HandshakeContext, inbound: Inbound, now: Instant) -> Result<(), Error> {
    ctx.now = now;
    let msg_type = inbound.msg_type;

    // RFC 5246 7.4.1.1: ignored while negotiating.
    if ctx.role == Role::Client && msg_type == HandshakeType::HelloRequest {
        trace!("HelloRequest during the handshake ignored");
        return Ok(());
    }

    if !ctx.expected.contains(msg_type) {
        return Err(Error::UnexpectedMessage(format!(
            "{:?} while expecting {:?}",
            msg_type,
            ctx.expected.as_slice()
        )));
    }
    let consume = consumer(ctx.role, msg_type).ok_or_else(|| {
        Error::UnexpectedMessage(format!("{:?} is never sent to a {:?}", msg_type, ctx.role))
    })?;

    set_phase(ctx, Phase::Negotiating);
    trace!("Consume {:?}", msg_type);
    ctx.inbound = Some(inbound);
    consume(ctx)?;
    ctx.consume_inbound()?;
    run_producers(ctx)
}

/// Input waiting behind a delegated task.
#[derive(Debug)]
enum Pending {
    Handshake(Inbound),
    ChangeCipherSpec,
}

enum Stage {
    Handshake(Box<HandshakeContext>),
    Established(Box<PostHandshakeContext>),
    Closed {
        io: HandshakeIo,
        negotiated: Negotiated,
    },
}

struct Connection {
    config: Arc<Config>,
    stage: Stage,
    /// Message held for a delegated task, with the time it arrived.
    held: Option<(Inbound, Instant)>,
    /// Whether the held message was handed out by `take_delegated_task`.
    task_taken: bool,
    /// Input that arrived while a message was held.
    backlog: VecDeque<Pending>,
    /// The established connection a renegotiation started from.
    previous: Option<Box<PostHandshakeContext>>,
}

impl Connection {
    fn new(config: Arc<Config>, role: Role, now: Instant) -> Self {
        let io = HandshakeIo::new(&config);
        let mut ctx = HandshakeContext::new(config.clone(), role, io, now);
        if role == Role::Server {
            ctx.expect(&[HandshakeType::ClientHello]);
        }
        Connection {
            config,
            stage: Stage::Handshake(Box::new(ctx)),
            held: None,
            task_taken: false,
            backlog: VecDeque::new(),
            previous: None,
        }
    }

    fn io(&mut self) -> &mut HandshakeIo {
        match &mut self.stage {
            Stage::Handshake(ctx) => &mut ctx.io,
            Stage::Established(post) => &mut post.io,
            Stage::Closed { io, .. } => io,
        }
    }

    fn take_stage(&mut self) -> Stage {
        let placeholder = Stage::Closed {
            io: HandshakeIo::new(&self.config),
            negotiated: Negotiated::default(),
        };
        std::mem::replace(&mut self.stage, placeholder)
    }

    fn is_closed(&self) -> bool {
        matches!(self.stage, Stage::Closed { .. })
    }

    /// Tear down after a fatal error. The alert, if any, is the last output.
    fn fail(&mut self, err: Error) -> Error {
        if self.is_closed() {
            return err;
        }
        debug!("Handshake failed: {}", err);
        let phase = self.phase();
        let (mut io, negotiated) = match self.take_stage() {
            Stage::Handshake(ctx) => (ctx.io, ctx.negotiated),
            Stage::Established(post) => (post.io, post.negotiated),
            Stage::Closed { io, negotiated } => (io, negotiated),
        };
        trace!("{:?} -> {:?}", phase, Phase::Closed);
        io.final_flight();
        if err.sends_alert() {
            io.push(Output::Alert(err.alert()));
        }
        self.held = None;
        self.task_taken = false;
        self.backlog.clear();
        self.previous = None;
        self.stage = Stage::Closed { io, negotiated };
        err
    }

    fn phase(&self) -> Phase {
        match &self.stage {
            Stage::Handshake(ctx) => ctx.phase,
            Stage::Established(_) => Phase::Completed,
            Stage::Closed { .. } => Phase::Closed,
        }
    }

    fn negotiated(&self) -> Negotiated {
        match &self.stage {
            Stage::Handshake(ctx) => ctx.negotiated.clone(),
            Stage::Established(post) => post.negotiated.clone(),
            Stage::Closed { negotiated, .. } => negotiated.clone(),
        }
    }

    fn start(&mut self, now: Instant) -> Result<(), Error> {
        let Stage::Handshake(ctx) = &mut self.stage else {
            return Err(Error::Closed);
        };
        if ctx.phase != Phase::Initialized {
            return Ok(());
        }
        ctx.now = now;
        set_phase(ctx, Phase::Negotiating);
        if ctx.role == Role::Client {
            ctx.queue(client_hello::produce);
            run_producers(ctx)?;
        }
        Ok(())
    }

    /// Route one whole message by stage.
    fn process(&mut self, inbound: Inbound, now: Instant) -> Result<(), Error> {
        if self.held.is_some() {
            trace!("{:?} waits for the delegated task", inbound.msg_type);
            self.backlog.push_back(Pending::Handshake(inbound));
            return Ok(());
        }

        let action = match &mut self.stage {
            Stage::Handshake(ctx) => {
                ctx.io.message_received();
                let delegate = self.config.delegated_tasks()
                    && is_delegable(inbound.msg_type)
                    && ctx.expected.contains(inbound.msg_type);
                if delegate {
                    trace!("{:?} held for a delegated task", inbound.msg_type);
                    self.held = Some((inbound, now));
                    self.task_taken = false;
                    return Ok(());
                }
                dispatch(ctx, inbound, now)?;
                PostAction::None
            }
            Stage::Established(post) => post.handle(inbound, now)?,
            Stage::Closed { .. } => return Err(Error::Closed),
        };

        if let PostAction::Renegotiate(hello) = action {
            self.renegotiate_from(hello, now)?;
        }
        self.settle(now)
    }

    /// Run a held message, then whatever queued up behind it.
    fn run_held(&mut self) -> Result<(), Error> {
        let Some((inbound, now)) = self.held.take() else {
            return Ok(());
        };
        self.task_taken = false;
        match &mut self.stage {
            Stage::Handshake(ctx) => dispatch(ctx, inbound, now)?,
            _ => return Err(Error::Closed),
        }
        self.settle(now)?;

        while self.held.is_none() {
            let Some(pending) = self.backlog.pop_front() else {
                break;
            };
            match pending {
                Pending::Handshake(inbound) => self.process(inbound, now)?,
                Pending::ChangeCipherSpec => self.change_cipher_spec()?,
            }
        }
        Ok(())
    }

    fn change_cipher_spec(&mut self) -> Result<(), Error> {
        if self.held.is_some() {
            self.backlog.push_back(Pending::ChangeCipherSpec);
            return Ok(());
        }
        match &mut self.stage {
            Stage::Handshake(ctx) => {
                // Middlebox compatibility records (RFC 8446 D.4).
                if ctx.is_tls13() {
                    trace!("ChangeCipherSpec ignored in TLS 1.3");
                    return Ok(());
                }
                if ctx.io.has_partial_input() {
                    return Err(Error::UnexpectedMessage(
                        "ChangeCipherSpec inside a handshake message".to_string(),
                    ));
                }
                if ctx.is_dtls() && ctx.ccs.received {
                    trace!("Repeated ChangeCipherSpec ignored");
                    return Ok(());
                }
                if !ctx.ccs.expected {
                    return Err(Error::UnexpectedMessage(
                        "ChangeCipherSpec out of order".to_string(),
                    ));
                }
                ctx.ccs.expected = false;
                ctx.ccs.received = true;
                trace!("Peer ChangeCipherSpec");
                Ok(())
            }
            Stage::Established(post) => {
                let tls13 = post.negotiated.version().map(|v| v.use_tls13_plus());
                if post.io.is_dtls() || tls13 == Some(true) {
                    trace!("ChangeCipherSpec after the handshake ignored");
                    return Ok(());
                }
                Err(Error::UnexpectedMessage(
                    "ChangeCipherSpec after the handshake".to_string(),
                ))
            }
            Stage::Closed { .. } => Err(Error::Closed),
        }
    }

    fn alert(&mut self, description: AlertDescription) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if description != AlertDescription::NoRenegotiation {
            return Err(Error::AlertReceived(description));
        }

        match self.previous.take() {
            Some(mut previous) => {
                // The peer refused our renegotiation. The old session stays.
                warn!("Peer refused to renegotiate");
                if let Stage::Handshake(ctx) = self.take_stage() {
                    previous.io = ctx.io;
                    previous.io.final_flight();
                }
                self.held = None;
                self.backlog.clear();
                self.stage = Stage::Established(previous);
            }
            None => warn!("no_renegotiation outside a renegotiation"),
        }
        Ok(())
    }

    /// Switch to a new handshake on an established connection.
    fn renegotiate_from(&mut self, hello: Option<Inbound>, now: Instant) -> Result<(), Error> {
        let mut post = match self.take_stage() {
            Stage::Established(post) => post,
            other => {
                self.stage = other;
                return Err(Error::internal("Renegotiation outside an established connection"));
            }
        };
        debug!("Renegotiating {:?}", post.negotiated.version());

        let io = std::mem::replace(&mut post.io, HandshakeIo::new(&self.config));
        let mut ctx = HandshakeContext::new(self.config.clone(), post.role, io, now);
        if let Some(version) = post.negotiated.version() {
            ctx.active_versions = vec![version];
        }
        ctx.renegotiation = Some(post.verify_data.clone());
        set_phase(&mut ctx, Phase::Negotiating);
        self.previous = Some(post);

        match hello {
            None => {
                ctx.queue(client_hello::produce);
                self.stage = Stage::Handshake(Box::new(ctx));
                if let Stage::Handshake(ctx) = &mut self.stage {
                    run_producers(ctx)?;
                }
                Ok(())
            }
            Some(hello) => {
                ctx.expect(&[HandshakeType::ClientHello]);
                self.stage = Stage::Handshake(Box::new(ctx));
                if let Stage::Handshake(ctx) = &mut self.stage {
                    dispatch(ctx, hello, now)?;
                }
                Ok(())
            }
        }
    }

    /// Move a completed handshake into the established stage.
    fn settle(&mut self, now: Instant) -> Result<(), Error> {
        let completed = matches!(&self.stage, Stage::Handshake(ctx) if ctx.phase == Phase::Completed);
        if !completed {
            return Ok(());
        }
        let ctx = match self.take_stage() {
            Stage::Handshake(ctx) => ctx,
            other => {
                self.stage = other;
                return Ok(());
            }
        };
        self.previous = None;
        let post = PostHandshakeContext::new(*ctx);
        let wants_ticket = post.wants_ticket();
        self.stage = Stage::Established(Box::new(post));
        if wants_ticket {
            if let Stage::Established(post) = &mut self.stage {
                post.issue_ticket(now)?;
            }
        }
        Ok(())
    }

    fn established(&mut self) -> Result<&mut PostHandshakeContext, Error> {
        match &mut self.stage {
            Stage::Established(post) => Ok(&mut **post),
            Stage::Closed { .. } => Err(Error::Closed),
            Stage::Handshake(_) => Err(Error::ConfigurationError(
                "The handshake is not complete".to_string(),
            )),
        }
    }
}

/// One side of a TLS or DTLS handshake.
///
/// The handshaker does no I/O. Feed it the handshake messages, ChangeCipherSpec
/// records and alerts the record layer receives, and drain
/// [`Handshaker::poll_output`] for what to send and which keys to install.
///
/// A handshaker is cheap to clone. Clones drive the same connection, and
/// every call holds one lock for its whole duration.
#[derive(Clone)]
pub struct Handshaker {
    inner: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Handshaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = self.inner.try_lock().map(|c| c.phase()).ok();
        f.debug_struct("Handshaker").field("phase", &phase).finish()
    }
}

impl Handshaker {
    /// A client handshake. Nothing is sent until [`Handshaker::start`].
    pub fn client(config: Arc<Config>) -> Self {
        Self::new(config, Role::Client)
    }

    /// A server handshake, waiting for a ClientHello.
    pub fn server(config: Arc<Config>) -> Self {
        Self::new(config, Role::Server)
    }

    fn new(config: Arc<Config>, role: Role) -> Self {
        Handshaker {
            inner: Arc::new(Mutex::new(Connection::new(config, role, Instant::now()))),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.inner
            .lock()
            .map_err(|_| Error::internal("Connection lock poisoned"))
    }

    /// Begin the handshake. A client sends its ClientHello.
    pub fn start(&self, now: Instant) -> Result<(), Error> {
        let mut conn = self.lock()?;
        conn.start(now).map_err(|e| conn.fail(e))
    }

    /// Handshake record content. TLS input may split or join messages
    /// anywhere. DTLS input is a sequence of whole fragments.
    pub fn handle_handshake(&self, data: &[u8], now: Instant) -> Result<(), Error> {
        let mut conn = self.lock()?;
        if conn.is_closed() {
            return Err(Error::Closed);
        }
        let result = conn.io().read(data).and_then(|messages| {
            for inbound in messages {
                conn.process(inbound, now)?;
            }
            Ok(())
        });
        result.map_err(|e| conn.fail(e))
    }

    /// One whole message, already split from its header.
    pub fn handle_message(&self, msg_type: HandshakeType, body: &[u8], now: Instant) -> Result<(), Error> {
        let mut conn = self.lock()?;
        if conn.is_closed() {
            return Err(Error::Closed);
        }
        let inbound = conn.io().inbound(msg_type, body);
        conn.process(inbound, now).map_err(|e| conn.fail(e))
    }

    /// A ChangeCipherSpec record.
    pub fn handle_change_cipher_spec(&self) -> Result<(), Error> {
        let mut conn = self.lock()?;
        conn.change_cipher_spec().map_err(|e| conn.fail(e))
    }

    /// An alert from the peer. Only `no_renegotiation` keeps the connection.
    pub fn handle_alert(&self, description: AlertDescription) -> Result<(), Error> {
        let mut conn = self.lock()?;
        conn.alert(description).map_err(|e| conn.fail(e))
    }

    /// Next thing to send or install, in order.
    pub fn poll_output(&self) -> Option<Output> {
        let mut conn = self.lock().ok()?;
        conn.io().poll_output()
    }

    /// When [`Handshaker::handle_timeout`] should be called next. DTLS only.
    pub fn poll_timeout(&self) -> Option<Instant> {
        let mut conn = self.lock().ok()?;
        if conn.is_closed() {
            return None;
        }
        conn.io().poll_timeout()
    }

    /// Resend the last flight if its timer expired. Fails with
    /// [`Error::Timeout`] once the retries are used up.
    pub fn handle_timeout(&self, now: Instant) -> Result<(), Error> {
        let mut conn = self.lock()?;
        if conn.is_closed() {
            return Err(Error::Closed);
        }
        let result = conn.io().handle_timeout(now);
        result.map_err(|e| conn.fail(e))
    }

    /// The work held back when [`Config::delegated_tasks`] is on.
    ///
    /// Input keeps being accepted while a task is out, and is processed in
    /// order once the task has run.
    pub fn take_delegated_task(&self) -> Option<DelegatedTask> {
        let mut conn = self.lock().ok()?;
        if conn.held.is_none() || conn.task_taken {
            return None;
        }
        conn.task_taken = true;
        Some(DelegatedTask {
            inner: self.inner.clone(),
        })
    }

    /// Snapshot of what has been agreed so far.
    pub fn negotiated(&self) -> Negotiated {
        self.lock().map(|c| c.negotiated()).unwrap_or_default()
    }

    pub fn phase(&self) -> Phase {
        self.lock().map(|c| c.phase()).unwrap_or(Phase::Closed)
    }

    /// Whether the handshake finished and the connection is established.
    pub fn is_complete(&self) -> bool {
        self.phase() == Phase::Completed
    }

    /// TLS 1.3: move to the next sending traffic secret, and ask the peer to
    /// do the same if `request_peer`.
    pub fn key_update(&self, request_peer: bool, now: Instant) -> Result<(), Error> {
        let mut conn = self.lock()?;
        conn.established()?.send_key_update(request_peer, now)
    }

    /// TLS 1.2 and earlier: start a new handshake. A client sends a new
    /// ClientHello, a server sends HelloRequest.
    pub fn renegotiate(&self, now: Instant) -> Result<(), Error> {
        let mut conn = self.lock()?;
        let post = conn.established()?;
        if post.role == Role::Server {
            return post.request_renegotiation(now);
        }
        if !post.may_renegotiate() {
            return Err(Error::ConfigurationError(
                "Renegotiation not possible on this connection".to_string(),
            ));
        }
        conn.renegotiate_from(None, now).map_err(|e| conn.fail(e))
    }

    /// TLS 1.3 server: send another NewSessionTicket.
    pub fn send_session_ticket(&self, now: Instant) -> Result<(), Error> {
        let mut conn = self.lock()?;
        conn.established()?.issue_ticket(now)
    }
}

/// Held handshake work, to be run off the caller's thread if it likes.
pub struct DelegatedTask {
    inner: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for DelegatedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedTask").finish_non_exhaustive()
    }
}

impl DelegatedTask {
    /// Consume the held message and everything that queued up behind it.
    pub fn run(self) -> Result<(), Error> {
        let mut conn = self
            .inner
            .lock()
            .map_err(|_| Error::internal("Connection lock poisoned"))?;
        conn.run_held().map_err(|e| conn.fail(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::frame;
    use crate::types::ProtocolVersion;

    fn drain(h: &Handshaker) -> Vec<Output> {
        std::iter::from_fn(|| h.poll_output()).collect()
    }

    #[test]
    fn client_starts_with_hello() {
        let _ = env_logger::builder().is_test(true).try_init();
        let client = Handshaker::client(Arc::new(Config::default()));
        assert_eq!(client.phase(), Phase::Initialized);
        client.start(Instant::now()).unwrap();
        assert_eq!(client.phase(), Phase::Negotiating);

        let out = drain(&client);
        assert_eq!(out.len(), 1);
        let Output::Handshake(hello) = &out[0] else {
            panic!("expected a handshake message");
        };
        assert_eq!(hello[0], HandshakeType::ClientHello.as_u8());
    }

    #[test]
    fn unexpected_message_closes_with_alert() {
        let server = Handshaker::server(Arc::new(Config::default()));
        let finished = frame(HandshakeType::Finished, &[0; 12], None);
        let err = server.handle_handshake(&finished, Instant::now()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedMessage(_)));
        assert_eq!(server.phase(), Phase::Closed);
        assert_eq!(
            drain(&server),
            vec![Output::Alert(AlertDescription::UnexpectedMessage)]
        );
        assert_eq!(
            server.handle_handshake(&finished, Instant::now()),
            Err(Error::Closed)
        );
    }

    #[test]
    fn early_change_cipher_spec_is_refused() {
        let server = Handshaker::server(Arc::new(Config::default()));
        let err = server.handle_change_cipher_spec().unwrap_err();
        assert!(matches!(err, Error::UnexpectedMessage(_)));
    }

    #[test]
    fn client_ignores_hello_request_while_negotiating() {
        let client = Handshaker::client(Arc::new(Config::default()));
        let now = Instant::now();
        client.start(now).unwrap();
        drain(&client);
        client
            .handle_message(HandshakeType::HelloRequest, &[], now)
            .unwrap();
        assert_eq!(client.phase(), Phase::Negotiating);
        assert!(drain(&client).is_empty());
    }

    #[test]
    fn fatal_alert_closes_without_answer() {
        let client = Handshaker::client(Arc::new(Config::default()));
        client.start(Instant::now()).unwrap();
        drain(&client);
        let err = client.handle_alert(AlertDescription::HandshakeFailure).unwrap_err();
        assert_eq!(err, Error::AlertReceived(AlertDescription::HandshakeFailure));
        assert!(drain(&client).is_empty());
        assert_eq!(client.phase(), Phase::Closed);
    }

    #[test]
    fn post_handshake_calls_need_a_completed_handshake() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_3])
            .build()
            .unwrap();
        let client = Handshaker::client(Arc::new(config));
        assert!(matches!(
            client.key_update(false, Instant::now()),
            Err(Error::ConfigurationError(_))
        ));
        assert!(client.take_delegated_task().is_none());
    }

    #[test]
    fn consumer_table_follows_roles() {
        assert!(consumer(Role::Client, HandshakeType::ServerHello).is_some());
        assert!(consumer(Role::Server, HandshakeType::ServerHello).is_none());
        assert!(consumer(Role::Server, HandshakeType::ClientKeyExchange).is_some());
        assert!(consumer(Role::Client, HandshakeType::ClientKeyExchange).is_none());
        assert!(consumer(Role::Client, HandshakeType::Finished).is_some());
        assert!(consumer(Role::Server, HandshakeType::Finished).is_some());
        assert!(consumer(Role::Server, HandshakeType::NewSessionTicket).is_none());
    }
}
