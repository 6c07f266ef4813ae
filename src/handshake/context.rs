//! The mutable aggregate of one handshake attempt.
//!
//! A [`HandshakeContext`] lives from the first hello to the last Finished.
//! Its state is split into owned sub-records: the negotiated parameters,
//! the extension map, the possession and credential lists, the key state and
//! the dispatch expectations. The connection keeps it behind one lock, so
//! none of the sub-records need their own.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tinyvec::ArrayVec;
use zeroize::Zeroizing;

use super::io::{hashed_form, HandshakeIo, Inbound};
use crate::config::Config;
use crate::crypto::key_schedule::KeySchedule;
use crate::crypto::CryptoProvider;
use crate::event::Output;
use crate::extension::ExtensionSpec;
use crate::kx::{Credential, Possession};
use crate::message::ClientHello;
use crate::rng::SeededRng;
use crate::session::Session;
use crate::transcript::TranscriptHash;
use crate::types::{CipherSuite, CipherSuiteSpec, ExtensionType, HandshakeType, KeyFamily};
use crate::types::{NamedGroup, ProtocolVersion, Random, SessionId, SignatureScheme};
use crate::Error;

pub(crate) type Secret = Zeroizing<Vec<u8>>;

/// Runs for an incoming message. The message is in [`HandshakeContext::inbound`].
pub(crate) type Consumer = fn(&mut HandshakeContext) -> Result<(), Error>;

/// Emits one outgoing message.
pub(crate) type Producer = fn(&mut HandshakeContext) -> Result<(), Error>;

/// Which end of the connection this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn is_client(&self) -> bool {
        *self == Role::Client
    }
}

/// Lifecycle of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialized,
    Negotiating,
    Completed,
    Closed,
}

/// Parameters agreed with the peer.
///
/// Version and cipher suite are write-once. Setting either again with a
/// different value is an internal error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Negotiated {
    pub(crate) version: Option<ProtocolVersion>,
    pub(crate) suite: Option<CipherSuite>,
    pub(crate) group: Option<NamedGroup>,
    pub(crate) local_scheme: Option<SignatureScheme>,
    pub(crate) peer_scheme: Option<SignatureScheme>,
    pub(crate) alpn: Option<Vec<u8>>,
    pub(crate) max_fragment_length: Option<u16>,
    pub(crate) server_name: Option<String>,
    pub(crate) extended_master_secret: bool,
    pub(crate) secure_renegotiation: bool,
    pub(crate) resumed: bool,
    pub(crate) client_random: Random,
    pub(crate) server_random: Random,
    pub(crate) session_id: SessionId,
    pub(crate) peer_certificates: Vec<Vec<u8>>,
    pub(crate) local_certificates: Vec<Vec<u8>>,
}

impl Negotiated {
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.suite
    }

    pub fn named_group(&self) -> Option<NamedGroup> {
        self.group
    }

    pub fn local_signature_scheme(&self) -> Option<SignatureScheme> {
        self.local_scheme
    }

    pub fn peer_signature_scheme(&self) -> Option<SignatureScheme> {
        self.peer_scheme
    }

    /// The application protocol both sides agreed on.
    pub fn alpn(&self) -> Option<&[u8]> {
        self.alpn.as_deref()
    }

    pub fn max_fragment_length(&self) -> Option<u16> {
        self.max_fragment_length
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    pub fn secure_renegotiation(&self) -> bool {
        self.secure_renegotiation
    }

    /// Whether the handshake resumed an earlier session.
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Peer chain, leaf first. Empty for anonymous and PSK handshakes.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    pub fn local_certificates(&self) -> &[Vec<u8>] {
        &self.local_certificates
    }

    pub(crate) fn set_version(&mut self, version: ProtocolVersion) -> Result<bool, Error> {
        match self.version {
            Some(v) if v == version => Ok(false),
            Some(v) => Err(Error::internal(format!(
                "Version already negotiated as {}, not {}",
                v, version
            ))),
            None => {
                self.version = Some(version);
                Ok(true)
            }
        }
    }

    pub(crate) fn set_suite(&mut self, suite: CipherSuite) -> Result<bool, Error> {
        match self.suite {
            Some(s) if s == suite => Ok(false),
            Some(s) => Err(Error::internal(format!(
                "Cipher suite already negotiated as {}, not {}",
                s, suite
            ))),
            None => {
                self.suite = Some(suite);
                Ok(true)
            }
        }
    }
}

/// Decoded extensions, at most one per (message, extension) pair.
#[derive(Debug, Default)]
pub(crate) struct ExtensionMap {
    specs: BTreeMap<(HandshakeType, ExtensionType), ExtensionSpec>,
}

impl ExtensionMap {
    pub fn insert(
        &mut self,
        msg: HandshakeType,
        ext: ExtensionType,
        spec: ExtensionSpec,
    ) -> Result<(), Error> {
        if self.specs.contains_key(&(msg, ext)) {
            return Err(Error::internal(format!("{:?} loaded twice for {:?}", ext, msg)));
        }
        self.specs.insert((msg, ext), spec);
        Ok(())
    }

    pub fn get(&self, msg: HandshakeType, ext: ExtensionType) -> Option<&ExtensionSpec> {
        self.specs.get(&(msg, ext))
    }

    pub fn contains(&self, msg: HandshakeType, ext: ExtensionType) -> bool {
        self.specs.contains_key(&(msg, ext))
    }

    /// Forget everything loaded from `msg`, as for the second ClientHello.
    pub fn clear_for(&mut self, msg: HandshakeType) {
        self.specs.retain(|(m, _), _| *m != msg);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }
}

/// The message types that may arrive next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedSet {
    types: ArrayVec<[HandshakeType; 8]>,
}

impl ExpectedSet {
    pub(crate) fn expect_only(&mut self, types: &[HandshakeType]) {
        self.types.clear();
        for t in types {
            self.types.push(*t);
        }
    }

    pub fn contains(&self, msg_type: HandshakeType) -> bool {
        self.types.contains(&msg_type)
    }

    pub(crate) fn clear(&mut self) {
        self.types.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn as_slice(&self) -> &[HandshakeType] {
        &self.types
    }
}

/// Derived secrets of the running handshake.
#[derive(Default)]
pub(crate) struct KeyState {
    pub schedule: Option<KeySchedule>,
    /// TLS 1.2 and earlier.
    pub master_secret: Option<Secret>,
    pub client_handshake: Option<Secret>,
    pub server_handshake: Option<Secret>,
    pub client_application: Option<Secret>,
    pub server_application: Option<Secret>,
    pub resumption_master: Option<Secret>,
    pub exporter: Option<Secret>,
    /// TLS 1.2 key block went out as [`Output::Secrets`].
    pub key_block_emitted: bool,
}

impl fmt::Debug for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyState")
            .field("schedule", &self.schedule)
            .field("master_secret", &self.master_secret.is_some())
            .field("handshake", &self.client_handshake.is_some())
            .field("application", &self.client_application.is_some())
            .finish()
    }
}

/// What a CertificateRequest asked of the client.
#[derive(Debug, Clone, Default)]
pub(crate) struct CertRequestInfo {
    pub families: Vec<KeyFamily>,
    pub schemes: Vec<SignatureScheme>,
    /// Schemes the server accepts in the client chain.
    pub cert_schemes: Vec<SignatureScheme>,
    pub authorities: Vec<Vec<u8>>,
    pub context: Vec<u8>,
}

/// Finished verify_data of both sides, kept for secure renegotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct VerifyData {
    pub client: Vec<u8>,
    pub server: Vec<u8>,
}

/// ChangeCipherSpec bookkeeping for TLS 1.2 and earlier.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CcsState {
    pub expected: bool,
    pub received: bool,
    pub sent: bool,
}

/// The state of one handshake attempt.
pub(crate) struct HandshakeContext {
    pub config: Arc<Config>,
    pub role: Role,
    pub phase: Phase,
    pub negotiated: Negotiated,
    /// Enabled versions that survive provider and constraints, newest first.
    pub active_versions: Vec<ProtocolVersion>,
    pub extensions: ExtensionMap,
    /// Extensions this side put in its hello, for the "never offered" check.
    pub offered: Vec<ExtensionType>,
    pub expected: ExpectedSet,
    pub producers: VecDeque<Producer>,
    pub possessions: Vec<Possession>,
    pub credentials: Vec<Credential>,
    pub transcript: TranscriptHash,
    pub io: HandshakeIo,
    pub rng: SeededRng,
    pub now: Instant,
    pub inbound: Option<Inbound>,
    /// DTLS messages seen before the version fixed their transcript form.
    deferred_hash: Vec<Vec<u8>>,
    /// Client: the hello last sent. Server: the hello last received.
    pub client_hello: Option<ClientHello>,
    pub hello_retry: bool,
    /// Cookie of a HelloVerifyRequest. The client echoes it, the server checks it.
    pub cookie: Option<Vec<u8>>,
    /// Cookie of a HelloRetryRequest.
    pub retry_cookie: Option<Vec<u8>>,
    /// Group a HelloRetryRequest asked for.
    pub retry_group: Option<NamedGroup>,
    /// Client: the session offered. Server: the session being resumed.
    pub resuming: Option<Arc<Session>>,
    /// Server: index of the accepted PSK identity.
    pub psk_index: Option<u16>,
    pub keys: KeyState,
    pub ccs: CcsState,
    pub cert_request: Option<CertRequestInfo>,
    /// Server: a CertificateRequest went out.
    pub client_auth_requested: bool,
    /// Verify data of the previous handshake on this connection.
    pub renegotiation: Option<VerifyData>,
    pub verify_data: VerifyData,
    /// TLS 1.2 ticket: server will issue one, or client expects one.
    pub ticket_expected: bool,
    /// TLS 1.2 ticket issued or received in this handshake, with its lifetime hint.
    pub ticket: Option<(u32, Vec<u8>)>,
    /// Server key for cookies of the stateless retry.
    pub cookie_secret: [u8; 32],
}

impl fmt::Debug for HandshakeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeContext")
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("negotiated", &self.negotiated)
            .field("expected", &self.expected)
            .field("extensions", &self.extensions.len())
            .field("possessions", &self.possessions.len())
            .field("credentials", &self.credentials.len())
            .field("keys", &self.keys)
            .finish()
    }
}

impl HandshakeContext {
    pub fn new(config: Arc<Config>, role: Role, io: HandshakeIo, now: Instant) -> Self {
        let mut rng = SeededRng::new(config.rng_seed());
        let mut cookie_secret = [0u8; 32];
        rng.fill(&mut cookie_secret);
        HandshakeContext {
            active_versions: config.active_versions(),
            transcript: TranscriptHash::new(config.crypto_provider()),
            config,
            role,
            phase: Phase::Initialized,
            negotiated: Negotiated::default(),
            extensions: ExtensionMap::default(),
            offered: Vec::new(),
            expected: ExpectedSet::default(),
            producers: VecDeque::new(),
            possessions: Vec::new(),
            credentials: Vec::new(),
            io,
            rng,
            now,
            inbound: None,
            deferred_hash: Vec::new(),
            client_hello: None,
            hello_retry: false,
            cookie: None,
            retry_cookie: None,
            retry_group: None,
            resuming: None,
            psk_index: None,
            keys: KeyState::default(),
            ccs: CcsState::default(),
            cert_request: None,
            client_auth_requested: false,
            renegotiation: None,
            verify_data: VerifyData::default(),
            ticket_expected: false,
            ticket: None,
            cookie_secret,
        }
    }

    pub fn provider(&self) -> &CryptoProvider {
        self.config.crypto_provider()
    }

    pub fn is_dtls(&self) -> bool {
        self.io.is_dtls()
    }

    /// The negotiated version. Asking before it is known is a programming error.
    pub fn version(&self) -> Result<ProtocolVersion, Error> {
        self.negotiated
            .version
            .ok_or_else(|| Error::internal("Version not negotiated yet"))
    }

    /// The negotiated version, or the newest enabled one while still
    /// negotiating.
    pub fn tentative_version(&self) -> ProtocolVersion {
        self.negotiated
            .version
            .or_else(|| self.active_versions.first().copied())
            .unwrap_or(ProtocolVersion::TLS1_2)
    }

    /// Whether an extension for `versions` applies right now.
    pub fn applies_to(&self, versions: &[ProtocolVersion]) -> bool {
        match self.negotiated.version {
            Some(v) => versions.contains(&v),
            None => self.active_versions.iter().any(|v| versions.contains(v)),
        }
    }

    pub fn is_tls13(&self) -> bool {
        self.negotiated
            .version
            .map(|v| v.use_tls13_plus())
            .unwrap_or(false)
    }

    pub fn suite_spec(&self) -> Result<&'static CipherSuiteSpec, Error> {
        self.negotiated
            .suite
            .and_then(|s| s.spec())
            .ok_or_else(|| Error::internal("Cipher suite not negotiated yet"))
    }

    /// Fix the version. DTLS messages held back for it enter the transcript.
    pub fn set_version(&mut self, version: ProtocolVersion) -> Result<(), Error> {
        if self.negotiated.set_version(version)? {
            debug!("Negotiated {}", version);
            for framed in std::mem::take(&mut self.deferred_hash) {
                let hashed = hashed_form(&framed, true, Some(version));
                self.transcript.deliver(&hashed)?;
            }
        }
        Ok(())
    }

    /// Fix the cipher suite and commit the transcript to its hash.
    pub fn set_suite(&mut self, suite: CipherSuite) -> Result<(), Error> {
        let version = self.version()?;
        let spec = suite
            .spec()
            .ok_or_else(|| Error::internal(format!("No spec for {}", suite)))?;
        if self.negotiated.set_suite(suite)? {
            debug!("Negotiated {}", suite);
        }
        self.transcript.commit(version, spec.hash)
    }

    pub fn expect(&mut self, types: &[HandshakeType]) {
        trace!("Expecting {:?}", types);
        self.expected.expect_only(types);
    }

    pub fn queue(&mut self, producer: Producer) {
        self.producers.push_back(producer);
    }

    /// The message being consumed.
    pub fn inbound(&self) -> Result<&Inbound, Error> {
        self.inbound
            .as_ref()
            .ok_or_else(|| Error::internal("No message being consumed"))
    }

    /// Hash the message being consumed. Calling this again does nothing.
    pub fn consume_inbound(&mut self) -> Result<(), Error> {
        let Some(inbound) = self.inbound.take() else {
            return Ok(());
        };
        if !inbound.msg_type.is_hashed() {
            return Ok(());
        }
        if self.is_dtls() && self.negotiated.version.is_none() {
            self.deferred_hash.push(inbound.framed);
            return Ok(());
        }
        self.transcript
            .receive(&inbound.hashed_form(self.negotiated.version));
        self.transcript.consume()
    }

    /// Frame, queue and hash an outgoing message.
    pub fn send_handshake(&mut self, msg_type: HandshakeType, body: &[u8]) -> Result<(), Error> {
        trace!("Send {:?} ({} bytes)", msg_type, body.len());
        let framed = self.io.send(msg_type, body, self.now);
        if !msg_type.is_hashed() {
            return Ok(());
        }
        if self.is_dtls() && self.negotiated.version.is_none() {
            self.deferred_hash.push(framed);
            return Ok(());
        }
        let hashed = hashed_form(&framed, self.is_dtls(), self.negotiated.version);
        self.transcript.deliver(&hashed)
    }

    /// Forget the transcript, as after a HelloVerifyRequest.
    pub fn reset_transcript(&mut self) {
        self.transcript.reset();
        self.deferred_hash.clear();
    }

    pub fn send_change_cipher_spec(&mut self) {
        self.ccs.sent = true;
        self.io.send_change_cipher_spec(self.now);
    }

    pub fn push(&mut self, output: Output) {
        self.io.push(output);
    }

    /// Random of a hello, repeatable under a configured seed.
    pub fn new_random(&mut self) -> Random {
        let mut r = Random::default();
        self.rng.fill(&mut r.0);
        r
    }

    /// Secret bytes from the crypto provider.
    pub fn secret_bytes(&self, len: usize) -> Result<Secret, Error> {
        let mut out = Zeroizing::new(vec![0u8; len]);
        self.provider()
            .secure_random
            .fill(&mut out)
            .map_err(Error::CryptoError)?;
        Ok(out)
    }

    /// Spec of extension `ext` as loaded from `msg`.
    pub fn spec(&self, msg: HandshakeType, ext: ExtensionType) -> Option<&ExtensionSpec> {
        self.extensions.get(msg, ext)
    }

    /// Where a server sends hello extensions answers at the negotiated version.
    pub fn server_extensions_message(&self) -> HandshakeType {
        if self.is_tls13() {
            HandshakeType::EncryptedExtensions
        } else {
            HandshakeType::ServerHello
        }
    }

    /// The local identity chosen for this handshake.
    pub fn identity(&self) -> Option<(&Arc<crate::crypto::Identity>, Option<SignatureScheme>)> {
        self.possessions.iter().find_map(|p| match p {
            Possession::Identity { identity, scheme } => Some((identity, *scheme)),
            _ => None,
        })
    }

    /// The peer certificate chain and its public key facts.
    pub fn peer_certificate(&self) -> Option<&Credential> {
        self.credentials
            .iter()
            .find(|c| matches!(c, Credential::Certificate { .. }))
    }
}

/// Constant time equality for verify data and binders.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
