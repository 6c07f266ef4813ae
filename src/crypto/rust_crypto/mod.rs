//! RustCrypto cryptographic provider implementation for tlshake.
//!
//! This module provides a pure Rust backend using crates from the
//! [RustCrypto](https://github.com/RustCrypto) organization, plus
//! `x25519-dalek` for X25519 and `rsa` for RSA and finite field arithmetic.
//!
//! # Usage
//!
//! ```
//! use tlshake::Config;
//! use tlshake::crypto::rust_crypto;
//!
//! let config = Config::builder()
//!     .with_crypto_provider(rust_crypto::default_provider())
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! ```

mod cipher;
mod hash;
mod hkdf;
mod hmac;
mod inspect;
mod kx_group;
mod random;
mod sign;
mod transport;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Key Exchange Groups
///
/// - `x25519`
/// - `secp256r1` (P-256)
/// - `secp384r1` (P-384)
/// - `ffdhe2048` (RFC 7919)
///
/// # Supported Signatures
///
/// - ECDSA with P-256 and P-384, SHA-256/384/512
/// - RSA PKCS#1 v1.5 and RSA-PSS, SHA-256/384/512
/// - Legacy unprefixed RSA and prehashed ECDSA for TLS 1.1 and earlier
///
/// # Hash Algorithms
///
/// SHA-256, SHA-384 and SHA-512, plus MD5 and SHA-1 for the dual transcript
/// and the PRFs of SSL 3.0 to TLS 1.1.
///
/// # Key Formats
///
/// PKCS#8, SEC1 and PKCS#1 DER, and PEM encoded versions of those.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        kx_groups: kx_group::ALL_KX_GROUPS,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        key_provider: &sign::KEY_PROVIDER,
        certificate_inspector: &inspect::CERTIFICATE_INSPECTOR,
        key_transport: &transport::KEY_TRANSPORT,
        ciphers: cipher::ALL_CIPHERS,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
        hkdf_provider: &hkdf::HKDF_PROVIDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_provider_validates() {
        default_provider().validate().unwrap();
    }
}
