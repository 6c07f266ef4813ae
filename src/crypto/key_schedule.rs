//! TLS 1.3 Key Schedule (RFC 8446 Section 7.1)
//!
//! ```text
//!              0
//!              |
//!              v
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!              +-----> Derive-Secret(., "ext binder" | "res binder", "")
//!              |                     = binder_key
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic", ClientHello...ServerHello)
//!              +-----> Derive-Secret(., "s hs traffic", ClientHello...ServerHello)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "s ap traffic", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "exp master", ClientHello...server Finished)
//!              +-----> Derive-Secret(., "res master", ClientHello...client Finished)
//! ```
//!
//! DTLS 1.3 uses the label prefix "dtls13" instead of "tls13 " (RFC 9147 5.9).
//! 0-RTT is not supported, so the early traffic secrets are never derived.

use zeroize::Zeroizing;

use crate::codec::{put_opaque8, put_u16};
use crate::crypto::provider::CryptoProvider;
use crate::types::{BulkCipher, HashAlgorithm};
use crate::Error;

type Secret = Zeroizing<Vec<u8>>;

fn crypto(e: String) -> Error {
    Error::CryptoError(e)
}

/// HKDF-Expand-Label(Secret, Label, Context, Length).
pub fn hkdf_expand_label(
    provider: &CryptoProvider,
    hash: HashAlgorithm,
    dtls: bool,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    len: usize,
) -> Result<Secret, Error> {
    let prefix: &[u8] = if dtls { b"dtls13" } else { b"tls13 " };
    let mut full_label = Vec::with_capacity(prefix.len() + label.len());
    full_label.extend_from_slice(prefix);
    full_label.extend_from_slice(label);

    let mut info = Vec::with_capacity(4 + full_label.len() + context.len());
    put_u16(&mut info, len as u16);
    put_opaque8(&mut info, &full_label);
    put_opaque8(&mut info, context);

    provider
        .hkdf_provider
        .hkdf_expand(hash, secret, &info, len)
        .map(Zeroizing::new)
        .map_err(crypto)
}

/// The TLS 1.3 key schedule of one handshake.
///
/// Secrets move forward through the stages and are never re-derived. Traffic
/// secrets are returned to the caller, which surfaces them to the record layer.
pub struct KeySchedule {
    provider: CryptoProvider,
    hash: HashAlgorithm,
    dtls: bool,
    early: Option<Secret>,
    handshake: Option<Secret>,
    master: Option<Secret>,
}

impl std::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySchedule")
            .field("hash", &self.hash)
            .field("dtls", &self.dtls)
            .field("has_handshake", &self.handshake.is_some())
            .field("has_master", &self.master.is_some())
            .finish()
    }
}

impl KeySchedule {
    /// Start the schedule. Without a PSK a zero string of hash length is used.
    pub fn new(
        provider: &CryptoProvider,
        hash: HashAlgorithm,
        dtls: bool,
        psk: Option<&[u8]>,
    ) -> Result<Self, Error> {
        let zeros = vec![0u8; hash.output_len()];
        let ikm = psk.unwrap_or(&zeros);
        let early = provider
            .hkdf_provider
            .hkdf_extract(hash, &[], ikm)
            .map_err(crypto)?;
        Ok(KeySchedule {
            provider: provider.clone(),
            hash,
            dtls,
            early: Some(Zeroizing::new(early)),
            handshake: None,
            master: None,
        })
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    fn empty_hash(&self) -> Result<Vec<u8>, Error> {
        self.provider
            .hash(self.hash, &[])
            .ok_or_else(|| Error::CryptoError(format!("{} not available", self.hash.name())))
    }

    pub fn expand_label(&self, secret: &[u8], label: &[u8], context: &[u8], len: usize) -> Result<Secret, Error> {
        hkdf_expand_label(
            &self.provider,
            self.hash,
            self.dtls,
            secret,
            label,
            context,
            len,
        )
    }

    /// Derive-Secret(Secret, Label, Messages) with the messages already hashed.
    pub fn derive_secret(&self, secret: &[u8], label: &[u8], transcript_hash: &[u8]) -> Result<Secret, Error> {
        self.expand_label(secret, label, transcript_hash, self.hash.output_len())
    }

    fn stage<'a>(secret: &'a Option<Secret>, name: &str) -> Result<&'a Secret, Error> {
        secret
            .as_ref()
            .ok_or_else(|| Error::internal(format!("Key schedule has no {} secret", name)))
    }

    /// Binder key for resumption (`true`) or external PSKs.
    pub fn binder_key(&self, resumption: bool) -> Result<Secret, Error> {
        let early = Self::stage(&self.early, "early")?;
        let label: &[u8] = if resumption {
            b"res binder"
        } else {
            b"ext binder"
        };
        self.derive_secret(early, label, &self.empty_hash()?)
    }

    /// Move to the handshake secret with the (EC)DHE shared secret.
    pub fn input_shared_secret(&mut self, shared: &[u8]) -> Result<(), Error> {
        let early = Self::stage(&self.early, "early")?;
        let derived = self.derive_secret(early, b"derived", &self.empty_hash()?)?;
        let hs = self
            .provider
            .hkdf_provider
            .hkdf_extract(self.hash, &derived, shared)
            .map_err(crypto)?;
        self.handshake = Some(Zeroizing::new(hs));
        self.early = None;
        Ok(())
    }

    /// (client, server) handshake traffic secrets over ClientHello..ServerHello.
    pub fn handshake_traffic_secrets(&self, transcript_hash: &[u8]) -> Result<(Secret, Secret), Error> {
        let hs = Self::stage(&self.handshake, "handshake")?;
        Ok((
            self.derive_secret(hs, b"c hs traffic", transcript_hash)?,
            self.derive_secret(hs, b"s hs traffic", transcript_hash)?,
        ))
    }

    /// Move to the master secret.
    pub fn input_empty(&mut self) -> Result<(), Error> {
        let hs = Self::stage(&self.handshake, "handshake")?;
        let derived = self.derive_secret(hs, b"derived", &self.empty_hash()?)?;
        let zeros = vec![0u8; self.hash.output_len()];
        let master = self
            .provider
            .hkdf_provider
            .hkdf_extract(self.hash, &derived, &zeros)
            .map_err(crypto)?;
        self.master = Some(Zeroizing::new(master));
        self.handshake = None;
        Ok(())
    }

    /// (client, server) application traffic secrets over ClientHello..server Finished.
    pub fn application_traffic_secrets(&self, transcript_hash: &[u8]) -> Result<(Secret, Secret), Error> {
        let master = Self::stage(&self.master, "master")?;
        Ok((
            self.derive_secret(master, b"c ap traffic", transcript_hash)?,
            self.derive_secret(master, b"s ap traffic", transcript_hash)?,
        ))
    }

    pub fn exporter_master_secret(&self, transcript_hash: &[u8]) -> Result<Secret, Error> {
        let master = Self::stage(&self.master, "master")?;
        self.derive_secret(master, b"exp master", transcript_hash)
    }

    /// Resumption master secret over ClientHello..client Finished.
    pub fn resumption_master_secret(&self, transcript_hash: &[u8]) -> Result<Secret, Error> {
        let master = Self::stage(&self.master, "master")?;
        self.derive_secret(master, b"res master", transcript_hash)
    }

    /// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
    pub fn finished_key(&self, base_key: &[u8]) -> Result<Secret, Error> {
        self.expand_label(base_key, b"finished", &[], self.hash.output_len())
    }

    /// verify_data = HMAC(finished_key, Transcript-Hash)
    pub fn finished_verify_data(&self, base_key: &[u8], transcript_hash: &[u8]) -> Result<Vec<u8>, Error> {
        let key = self.finished_key(base_key)?;
        self.provider
            .hmac_provider
            .hmac(self.hash, &key, transcript_hash)
            .map_err(crypto)
    }

    /// PSK binder over the truncated ClientHello transcript.
    pub fn binder(&self, binder_key: &[u8], transcript_hash: &[u8]) -> Result<Vec<u8>, Error> {
        self.finished_verify_data(binder_key, transcript_hash)
    }

    /// PSK of a ticket: HKDF-Expand-Label(resumption_master_secret, "resumption", nonce, Hash.length)
    pub fn resumption_psk(&self, resumption_master_secret: &[u8], nonce: &[u8]) -> Result<Secret, Error> {
        self.expand_label(
            resumption_master_secret,
            b"resumption",
            nonce,
            self.hash.output_len(),
        )
    }

    /// application_traffic_secret_N+1 for KeyUpdate.
    pub fn next_traffic_secret(&self, secret: &[u8]) -> Result<Secret, Error> {
        self.expand_label(secret, b"traffic upd", &[], self.hash.output_len())
    }

    /// Record key and IV of a traffic secret for `bulk`.
    pub fn traffic_keys(&self, secret: &[u8], bulk: BulkCipher) -> Result<(Secret, Vec<u8>), Error> {
        let key = self.expand_label(secret, b"key", &[], bulk.key_len())?;
        let iv = self.expand_label(secret, b"iv", &[], 12)?;
        Ok((key, iv.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    // RFC 8448 Simple 1-RTT Handshake.
    const EARLY_SECRET: &[u8] = &[
        0x33, 0xad, 0x0a, 0x1c, 0x60, 0x7e, 0xc0, 0x3b, 0x09, 0xe6, 0xcd, 0x98, 0x93, 0x68, 0x0c,
        0xe2, 0x10, 0xad, 0xf3, 0x00, 0xaa, 0x1f, 0x26, 0x60, 0xe1, 0xb2, 0x2e, 0x10, 0xf1, 0x70,
        0xf9, 0x2a,
    ];

    #[test]
    fn early_secret_without_psk() {
        let provider = default_provider();
        let ks = KeySchedule::new(&provider, HashAlgorithm::SHA256, false, None).unwrap();
        assert_eq!(ks.early.as_deref().unwrap().as_slice(), EARLY_SECRET);
    }

    #[test]
    fn stages_are_ordered() {
        let provider = default_provider();
        let mut ks = KeySchedule::new(&provider, HashAlgorithm::SHA256, false, None).unwrap();
        assert!(ks.handshake_traffic_secrets(&[0; 32]).is_err());
        assert!(ks.input_empty().is_err());

        ks.input_shared_secret(&[7; 32]).unwrap();
        let (c, s) = ks.handshake_traffic_secrets(&[0; 32]).unwrap();
        assert_ne!(c, s);
        assert!(ks.binder_key(true).is_err());

        ks.input_empty().unwrap();
        let (c, s) = ks.application_traffic_secrets(&[1; 32]).unwrap();
        assert_eq!(c.len(), 32);
        assert_ne!(c, s);
    }

    #[test]
    fn dtls_labels_differ() {
        let provider = default_provider();
        let tls = hkdf_expand_label(&provider, HashAlgorithm::SHA256, false, &[1; 32], b"key", &[], 16)
            .unwrap();
        let dtls = hkdf_expand_label(&provider, HashAlgorithm::SHA256, true, &[1; 32], b"key", &[], 16)
            .unwrap();
        assert_ne!(tls, dtls);
    }

    #[test]
    fn key_update_chain() {
        let provider = default_provider();
        let ks = KeySchedule::new(&provider, HashAlgorithm::SHA384, false, None).unwrap();
        let s0 = vec![5u8; 48];
        let s1 = ks.next_traffic_secret(&s0).unwrap();
        let s2 = ks.next_traffic_secret(&s1).unwrap();
        assert_eq!(s1.len(), 48);
        assert_ne!(s1, s2);
    }
}
