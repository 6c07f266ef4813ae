//! Running hash over the handshake messages.
//!
//! The hash algorithm is unknown until the cipher suite is picked, so bytes
//! are buffered until [`TranscriptHash::commit`]. From then on they stream into
//! one digest (TLS 1.2 and later) or into MD5 and SHA-1 side by side (SSL 3.0
//! to TLS 1.1).
//!
//! Incoming messages are first [received](TranscriptHash::receive) and only
//! enter the digest when the dispatcher [consumes](TranscriptHash::consume)
//! them. This lets a consumer look at the transcript as it was before its own
//! message, which the PSK binder and the Finished checks need.

use std::collections::VecDeque;

use crate::crypto::{CryptoProvider, HashContext};
use crate::types::{HandshakeType, HashAlgorithm, ProtocolVersion};
use crate::Error;

enum Digests {
    Single(HashAlgorithm, Box<dyn HashContext>),
    Dual {
        md5: Box<dyn HashContext>,
        sha1: Box<dyn HashContext>,
    },
}

impl Digests {
    fn update(&mut self, data: &[u8]) {
        match self {
            Digests::Single(_, ctx) => ctx.update(data),
            Digests::Dual { md5, sha1 } => {
                md5.update(data);
                sha1.update(data);
            }
        }
    }

    fn snapshot(&self) -> Vec<u8> {
        match self {
            Digests::Single(_, ctx) => ctx.clone_and_finalize(),
            Digests::Dual { md5, sha1 } => {
                let mut out = md5.clone_and_finalize();
                out.extend(sha1.clone_and_finalize());
                out
            }
        }
    }
}

enum State {
    Uncommitted(Vec<u8>),
    Committed(Digests),
    Finished(Vec<u8>),
}

/// The transcript of one handshake.
pub struct TranscriptHash {
    provider: CryptoProvider,
    state: State,
    /// Received messages not yet consumed, in receipt order.
    pending: VecDeque<Vec<u8>>,
    /// Every hashed message in order. TLS 1.2 CertificateVerify signs these
    /// with a hash that may differ from the PRF hash.
    log: Vec<u8>,
}

impl std::fmt::Debug for TranscriptHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Uncommitted(b) => format!("Uncommitted({} bytes)", b.len()),
            State::Committed(Digests::Single(h, _)) => format!("Committed({})", h.name()),
            State::Committed(Digests::Dual { .. }) => "Committed(MD5+SHA1)".to_string(),
            State::Finished(_) => "Finished".to_string(),
        };
        f.debug_struct("TranscriptHash")
            .field("state", &state)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl TranscriptHash {
    pub fn new(provider: &CryptoProvider) -> Self {
        TranscriptHash {
            provider: provider.clone(),
            state: State::Uncommitted(Vec::new()),
            pending: VecDeque::new(),
            log: Vec::new(),
        }
    }

    fn feed(&mut self, data: &[u8]) -> Result<(), Error> {
        match &mut self.state {
            State::Uncommitted(buf) => buf.extend_from_slice(data),
            State::Committed(d) => d.update(data),
            State::Finished(_) => {
                return Err(Error::internal("Transcript updated after finish"));
            }
        }
        self.log.extend_from_slice(data);
        Ok(())
    }

    /// Queue an incoming message. It is hashed on the next [`consume`](Self::consume).
    pub fn receive(&mut self, message: &[u8]) {
        self.pending.push_back(message.to_vec());
    }

    /// Hash a message right away. Used for everything we send.
    pub fn deliver(&mut self, message: &[u8]) -> Result<(), Error> {
        self.feed(message)
    }

    /// Move the oldest received message into the digest.
    ///
    /// Does nothing when no message is pending, so repeated calls without a
    /// new [`receive`](Self::receive) hash nothing twice.
    pub fn consume(&mut self) -> Result<(), Error> {
        if let Some(message) = self.pending.pop_front() {
            self.feed(&message)?;
        }
        Ok(())
    }

    /// Fix the hash algorithm and flush the buffered bytes into it.
    ///
    /// Committing again is a no-op when the algorithm does not change.
    pub fn commit(&mut self, version: ProtocolVersion, hash: HashAlgorithm) -> Result<(), Error> {
        let buffered = match &self.state {
            State::Uncommitted(buf) => buf.clone(),
            State::Committed(Digests::Single(h, _)) if *h == hash && version.use_tls12_plus() => {
                return Ok(());
            }
            State::Committed(Digests::Dual { .. }) if !version.use_tls12_plus() => return Ok(()),
            _ => return Err(Error::internal("Transcript committed twice")),
        };

        let create = |h: HashAlgorithm| {
            self.provider
                .hash_provider
                .create_hash(h)
                .ok_or_else(|| Error::CryptoError(format!("{} not available", h.name())))
        };

        let mut digests = if version.use_tls12_plus() {
            Digests::Single(hash, create(hash)?)
        } else {
            Digests::Dual {
                md5: create(HashAlgorithm::MD5)?,
                sha1: create(HashAlgorithm::SHA1)?,
            }
        };
        digests.update(&buffered);
        trace!("Transcript committed for {} with {} buffered bytes", version, buffered.len());
        self.state = State::Committed(digests);
        Ok(())
    }

    /// Current digest without changing the state.
    ///
    /// MD5 and SHA-1 are concatenated for the legacy versions. Asking before
    /// the hash is committed is a programming error.
    pub fn digest(&self) -> Result<Vec<u8>, Error> {
        match &self.state {
            State::Committed(d) => Ok(d.snapshot()),
            State::Finished(d) => Ok(d.clone()),
            State::Uncommitted(_) => Err(Error::internal("Transcript digest before commit")),
        }
    }

    /// Digest of the transcript followed by `extra` under `hash`.
    ///
    /// Works before commit, which is what the PSK binder of the first
    /// ClientHello needs.
    pub fn digest_with(&self, hash: HashAlgorithm, extra: &[u8]) -> Result<Vec<u8>, Error> {
        match &self.state {
            State::Committed(Digests::Single(h, ctx)) if *h == hash => {
                let mut ctx = ctx.box_clone();
                ctx.update(extra);
                Ok(ctx.clone_and_finalize())
            }
            State::Uncommitted(buf) => {
                let mut ctx = self
                    .provider
                    .hash_provider
                    .create_hash(hash)
                    .ok_or_else(|| Error::CryptoError(format!("{} not available", hash.name())))?;
                ctx.update(buf);
                ctx.update(extra);
                Ok(ctx.clone_and_finalize())
            }
            _ => Err(Error::internal("Transcript hash mismatch")),
        }
    }

    /// Extract the final digest. No further updates are allowed.
    pub fn finish(&mut self) -> Result<Vec<u8>, Error> {
        let d = self.digest()?;
        self.state = State::Finished(d.clone());
        Ok(d)
    }

    /// Replace ClientHello1 with a synthetic message_hash message (RFC 8446 4.4.1).
    pub fn rollup_for_hrr(&mut self) -> Result<(), Error> {
        let hash = match &self.state {
            State::Committed(Digests::Single(h, _)) => *h,
            _ => return Err(Error::internal("HelloRetryRequest before commit")),
        };
        let ch1 = self.digest()?;

        let mut ctx = self
            .provider
            .hash_provider
            .create_hash(hash)
            .ok_or_else(|| Error::CryptoError(format!("{} not available", hash.name())))?;
        let mut synthetic = vec![HandshakeType::MessageHash.as_u8(), 0, 0, ch1.len() as u8];
        synthetic.extend_from_slice(&ch1);
        ctx.update(&synthetic);

        self.state = State::Committed(Digests::Single(hash, ctx));
        self.log = synthetic;
        Ok(())
    }

    /// Forget everything, as after a DTLS HelloVerifyRequest.
    pub fn reset(&mut self) {
        self.state = State::Uncommitted(Vec::new());
        self.pending.clear();
        self.log.clear();
    }

    /// All hashed handshake bytes so far.
    pub fn messages(&self) -> &[u8] {
        &self.log
    }

    /// Running MD5 and SHA-1 contexts of the legacy versions.
    pub fn legacy_contexts(&self) -> Option<(&dyn HashContext, &dyn HashContext)> {
        match &self.state {
            State::Committed(Digests::Dual { md5, sha1 }) => Some((md5.as_ref(), sha1.as_ref())),
            _ => None,
        }
    }

}
