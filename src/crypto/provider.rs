//! Cryptographic capability traits consumed by the handshake engine.
//!
//! The engine never implements a primitive itself. Hashing, HMAC, HKDF, key
//! agreement, signatures, key transport and certificate inspection are all
//! reached through the components of a [`CryptoProvider`].
//!
//! # Architecture
//!
//! [`CryptoProvider`] holds `&'static dyn Trait` references, one per
//! capability:
//!
//! - **Hash Provider** ([`HashProvider`]): incremental digests, including
//!   MD5 and SHA-1 when the backend has them
//! - **HMAC Provider** ([`HmacProvider`]): HMAC over any available hash
//! - **HKDF Provider** ([`HkdfProvider`]): extract and expand for TLS 1.3
//! - **Key Exchange Groups** ([`SupportedKxGroup`]): ECDHE, XDH and FFDHE
//! - **Signature Verification** ([`SignatureVerifier`]): verify against a certificate
//! - **Key Provider** ([`KeyProvider`]): load private keys into [`SigningKey`]s
//! - **Certificate Inspector** ([`CertificateInspector`]): public key facts of a DER certificate
//! - **Key Transport** ([`KeyTransport`]): RSA premaster encryption and export keys
//! - **Ciphers** ([`SupportedCipher`]): which bulk ciphers the record layer can run
//! - **Secure Random** ([`SecureRandom`]): cryptographically secure RNG
//!
//! A capability that is missing from the provider makes the catalog entries
//! depending on it unavailable. It never fails the handshake by itself.
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::{Arc, OnceLock};

use crate::types::{BulkCipher, HashAlgorithm, KeyFamily, NamedGroup, SignatureScheme};

/// Marker trait for types that are safe to use in crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits (created by factories)
// ============================================================================

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize the clone.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self) -> Vec<u8>;

    /// Clone the running state.
    fn box_clone(&self) -> Box<dyn HashContext>;
}

/// Ephemeral key pair for one key agreement.
pub trait ActiveKeyExchange: CryptoSafe {
    /// Public value to send to the peer.
    fn pub_key(&self) -> &[u8];

    /// Complete the agreement with the peer's public value, returning the shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Vec<u8>, String>;

    /// Group of this exchange.
    fn group(&self) -> NamedGroup;
}

/// A local private key.
pub trait SigningKey: CryptoSafe {
    /// Family of the key.
    fn family(&self) -> KeyFamily;

    /// Size of the key in bits.
    fn bits(&self) -> usize;

    /// Curve for EC keys.
    fn curve(&self) -> Option<NamedGroup>;

    /// Whether the key can produce signatures for `scheme`.
    fn supports(&self, scheme: SignatureScheme) -> bool;

    /// Sign `message` with `scheme`.
    ///
    /// With `None` the message is an already computed legacy digest (MD5 and
    /// SHA-1 concatenated for RSA, SHA-1 for ECDSA) and is signed without a
    /// DigestInfo prefix.
    fn sign(&self, scheme: Option<SignatureScheme>, message: &[u8]) -> Result<Vec<u8>, String>;

    /// Decrypt an RSA encrypted premaster secret.
    fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>, String> {
        Err(format!("{} key cannot decrypt", self.family().name()))
    }

    /// Static ECDH with the certificate key.
    fn agree(&self, _peer_pub: &[u8]) -> Result<Vec<u8>, String> {
        Err(format!("{} key cannot agree", self.family().name()))
    }
}

/// A temporary RSA key of an export-grade exchange.
pub trait EphemeralRsaKey: CryptoSafe {
    /// Big-endian modulus.
    fn modulus(&self) -> &[u8];

    /// Big-endian public exponent.
    fn exponent(&self) -> &[u8];

    /// Decrypt an RSA encrypted premaster secret.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, String>;
}

// ============================================================================
// Factory Traits (used by CryptoProvider)
// ============================================================================

/// Finite field group parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FfdheParams {
    pub p: &'static [u8],
    pub g: &'static [u8],
}

/// Key exchange group support (factory for ActiveKeyExchange).
pub trait SupportedKxGroup: CryptoSafe {
    /// Named group for this key exchange group.
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating an ephemeral keypair.
    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String>;

    /// Prime and generator for finite field groups.
    fn ffdhe_params(&self) -> Option<FfdheParams> {
        None
    }
}

/// Signature verification against certificates.
pub trait SignatureVerifier: CryptoSafe {
    /// Whether the verifier can check signatures of `scheme`.
    fn supports(&self, scheme: SignatureScheme) -> bool;

    /// Verify `signature` over `message` with the public key of `cert_der`.
    ///
    /// With `None` the message is an already computed legacy digest, see
    /// [`SigningKey::sign`].
    fn verify_signature(
        &self,
        cert_der: &[u8],
        scheme: Option<SignatureScheme>,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), String>;
}

/// Private key parser (factory for SigningKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER/PEM bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Arc<dyn SigningKey>, String>;
}

/// Public facts of a certificate, as needed for negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    pub family: KeyFamily,
    pub bits: usize,
    pub curve: Option<NamedGroup>,
    /// Raw public key (SEC1 point or PKCS#1 RSAPublicKey).
    pub public_key: Vec<u8>,
    /// DER encoded issuer name.
    pub issuer: Vec<u8>,
    /// DER encoded subject name.
    pub subject: Vec<u8>,
    /// Scheme the certificate itself is signed with, if it has a code point.
    pub signed_with: Option<SignatureScheme>,
}

/// Reads public key facts out of DER certificates.
pub trait CertificateInspector: CryptoSafe {
    fn inspect(&self, cert_der: &[u8]) -> Result<PublicKeyInfo, String>;
}

/// RSA key transport.
pub trait KeyTransport: CryptoSafe {
    /// Encrypt `data` with the RSA key of `cert_der` (PKCS#1 v1.5).
    fn encrypt(&self, cert_der: &[u8], data: &[u8]) -> Result<Vec<u8>, String>;

    /// Encrypt `data` with an explicit RSA public key.
    fn encrypt_with_key(&self, modulus: &[u8], exponent: &[u8], data: &[u8])
        -> Result<Vec<u8>, String>;

    /// Generate a temporary export-grade RSA key.
    fn generate_ephemeral(&self, bits: usize) -> Result<Box<dyn EphemeralRsaKey>, String>;
}

/// Bulk cipher availability for the record layer.
pub trait SupportedCipher: CryptoSafe {
    fn bulk(&self) -> BulkCipher;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for HashContext).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context, or `None` if the algorithm is unavailable.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Option<Box<dyn HashContext>>;
}

/// HMAC provider.
pub trait HmacProvider: CryptoSafe {
    /// HMAC-`hash`(key, data).
    fn hmac(&self, hash: HashAlgorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>, String>;
}

/// HKDF provider for TLS 1.3 key derivation (RFC 5869).
pub trait HkdfProvider: CryptoSafe {
    /// PRK = HKDF-Extract(salt, IKM)
    fn hkdf_extract(&self, hash: HashAlgorithm, salt: &[u8], ikm: &[u8])
        -> Result<Vec<u8>, String>;

    /// OKM = HKDF-Expand(PRK, info, L)
    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        output_len: usize,
    ) -> Result<Vec<u8>, String>;
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for the handshake engine.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported key exchange groups, in no particular order.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Signature verification for certificates.
    pub signature_verification: &'static dyn SignatureVerifier,

    /// Key provider for parsing private keys.
    pub key_provider: &'static dyn KeyProvider,

    /// Certificate public key inspection.
    pub certificate_inspector: &'static dyn CertificateInspector,

    /// RSA key transport.
    pub key_transport: &'static dyn KeyTransport,

    /// Bulk ciphers the record layer supports.
    pub ciphers: &'static [&'static dyn SupportedCipher],

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for transcript hashing.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider for the PRF and Finished.
    pub hmac_provider: &'static dyn HmacProvider,

    /// HKDF provider for TLS 1.3 key derivation.
    pub hkdf_provider: &'static dyn HkdfProvider,
}

static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a default crypto provider for the process.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn install_default(provider: CryptoProvider) {
        DEFAULT
            .set(provider)
            .expect("CryptoProvider::install_default() called more than once");
    }

    /// Get the default crypto provider, if one has been installed.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    /// Find the key exchange group for `group`.
    pub fn kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().copied().find(|g| g.name() == group)
    }

    /// Whether `hash` can be instantiated.
    pub fn has_hash(&self, hash: HashAlgorithm) -> bool {
        self.hash_provider.create_hash(hash).is_some()
    }

    /// Whether the record layer can run `bulk`.
    pub fn has_cipher(&self, bulk: BulkCipher) -> bool {
        self.ciphers.iter().any(|c| c.bulk() == bulk)
    }

    /// One-shot digest.
    pub fn hash(&self, hash: HashAlgorithm, data: &[u8]) -> Option<Vec<u8>> {
        let mut ctx = self.hash_provider.create_hash(hash)?;
        ctx.update(data);
        Some(ctx.clone_and_finalize())
    }

    /// Checks the minimum a provider needs to drive any handshake.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.has_hash(HashAlgorithm::SHA256) {
            return Err(crate::Error::ConfigurationError(
                "CryptoProvider lacks SHA-256".to_string(),
            ));
        }
        if self.kx_groups.is_empty() {
            return Err(crate::Error::ConfigurationError(
                "CryptoProvider has no key exchange groups".to_string(),
            ));
        }
        let mac = self
            .hmac_provider
            .hmac(HashAlgorithm::SHA256, b"key", b"data")
            .map_err(crate::Error::ConfigurationError)?;
        if mac.len() != HashAlgorithm::SHA256.output_len() {
            return Err(crate::Error::ConfigurationError(
                "HMAC provider returned wrong output length".to_string(),
            ));
        }
        Ok(())
    }
}
