//! Resumable sessions and the cache that owns them.
//!
//! A handshake looks sessions up and hands new ones over, but never owns
//! them. Sessions created by ticket issuance are children of the session of
//! the connection that issued them; invalidating a parent takes its children
//! with it.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use zeroize::Zeroizing;

use crate::handshake::context::Negotiated;
use crate::types::{CipherSuite, NamedGroup, ProtocolVersion, SessionId};

/// Everything needed to resume a handshake.
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) version: ProtocolVersion,
    pub(crate) suite: CipherSuite,
    /// TLS 1.2 and earlier: the master secret. TLS 1.3: the resumption PSK.
    pub(crate) secret: Zeroizing<Vec<u8>>,
    pub(crate) extended_master_secret: bool,
    pub(crate) server_name: Option<String>,
    pub(crate) alpn: Option<Vec<u8>>,
    pub(crate) max_fragment_length: Option<u16>,
    pub(crate) group: Option<NamedGroup>,
    pub(crate) peer_certificates: Vec<Vec<u8>>,
    pub(crate) local_certificates: Vec<Vec<u8>>,
    /// Opaque ticket the client presents instead of the session id.
    pub(crate) ticket: Option<Vec<u8>>,
    pub(crate) ticket_age_add: u32,
    pub(crate) created: Instant,
    pub(crate) lifetime: Duration,
    valid: AtomicBool,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SessionId,
        version: ProtocolVersion,
        suite: CipherSuite,
        secret: Zeroizing<Vec<u8>>,
        created: Instant,
        lifetime: Duration,
    ) -> Self {
        Session {
            id,
            version,
            suite,
            secret,
            extended_master_secret: false,
            server_name: None,
            alpn: None,
            max_fragment_length: None,
            group: None,
            peer_certificates: Vec::new(),
            local_certificates: Vec::new(),
            ticket: None,
            ticket_age_add: 0,
            created,
            lifetime,
            valid: AtomicBool::new(true),
        }
    }

    /// A session carrying the parameters of a finished handshake.
    pub(crate) fn from_negotiated(
        negotiated: &Negotiated,
        id: SessionId,
        secret: Zeroizing<Vec<u8>>,
        created: Instant,
        lifetime: Duration,
    ) -> Option<Self> {
        let mut session = Session::new(
            id,
            negotiated.version?,
            negotiated.suite?,
            secret,
            created,
            lifetime,
        );
        session.extended_master_secret = negotiated.extended_master_secret;
        session.server_name = negotiated.server_name.clone();
        session.alpn = negotiated.alpn.clone();
        session.max_fragment_length = negotiated.max_fragment_length;
        session.group = negotiated.group;
        session.peer_certificates = negotiated.peer_certificates.clone();
        session.local_certificates = negotiated.local_certificates.clone();
        Some(session)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.suite
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn alpn(&self) -> Option<&[u8]> {
        self.alpn.as_deref()
    }

    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    pub fn ticket(&self) -> Option<&[u8]> {
        self.ticket.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= self.lifetime
    }

    /// Whether the session may still be resumed at `now`.
    pub fn is_resumable(&self, now: Instant) -> bool {
        self.is_valid() && !self.is_expired(now) && !self.secret.is_empty()
    }

    /// Milliseconds since creation, as sent in the obfuscated ticket age.
    pub(crate) fn age_millis(&self, now: Instant) -> u32 {
        now.saturating_duration_since(self.created).as_millis() as u32
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("suite", &self.suite)
            .field("ems", &self.extended_master_secret)
            .field("server_name", &self.server_name)
            .field("ticket", &self.ticket.as_ref().map(|t| t.len()))
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[derive(Default)]
struct CacheInner {
    sessions: HashMap<Vec<u8>, Arc<Session>>,
    /// Insertion order, oldest first, for eviction.
    order: VecDeque<Vec<u8>>,
    children: HashMap<Vec<u8>, Vec<Vec<u8>>>,
}

impl CacheInner {
    fn remove(&mut self, key: &[u8]) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(key);
        self.order.retain(|k| k != key);
        if let Some(children) = self.children.remove(key) {
            for child in children {
                if let Some(s) = self.remove(&child) {
                    s.invalidate();
                }
            }
        }
        removed
    }
}

/// Size and lifetime bounded session store, safe to share between handshakes.
pub struct SessionCache {
    capacity: usize,
    lifetime: Duration,
    inner: Mutex<CacheInner>,
}

impl SessionCache {
    /// A cache of at most `capacity` sessions, each living at most `lifetime`.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        SessionCache {
            capacity,
            lifetime,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // A panic while holding the lock leaves the maps consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `session` under `key`, evicting the oldest entry when full.
    pub fn put(&self, key: &[u8], session: Arc<Session>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.lock();
        inner.remove(key);
        while inner.sessions.len() >= self.capacity {
            let Some(oldest) = inner.order.front().cloned() else {
                break;
            };
            trace!("Session cache full, evicting oldest entry");
            inner.remove(&oldest);
        }
        inner.order.push_back(key.to_vec());
        inner.sessions.insert(key.to_vec(), session);
    }

    /// Store `session` as a child of the entry at `parent`.
    pub fn put_child(&self, parent: &[u8], key: &[u8], session: Arc<Session>) {
        self.put(key, session);
        let mut inner = self.lock();
        if inner.sessions.contains_key(key) {
            inner
                .children
                .entry(parent.to_vec())
                .or_default()
                .push(key.to_vec());
        }
    }

    /// Look up a resumable session. Expired or invalidated entries are dropped.
    pub fn get(&self, key: &[u8], now: Instant) -> Option<Arc<Session>> {
        let mut inner = self.lock();
        let session = inner.sessions.get(key)?.clone();
        if session.is_resumable(now) {
            return Some(session);
        }
        debug!("Dropping stale session from cache");
        inner.remove(key);
        None
    }

    /// Remove and return, for single use tickets.
    pub fn take(&self, key: &[u8], now: Instant) -> Option<Arc<Session>> {
        let session = self.get(key, now)?;
        self.lock().sessions.remove(key);
        Some(session)
    }

    /// Invalidate the entry at `key` and everything derived from it.
    pub fn invalidate(&self, key: &[u8]) {
        if let Some(s) = self.lock().remove(key) {
            s.invalidate();
        }
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("capacity", &self.capacity)
            .field("lifetime", &self.lifetime)
            .field("len", &self.len())
            .finish()
    }
}
