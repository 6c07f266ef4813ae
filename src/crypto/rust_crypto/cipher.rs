//! Bulk ciphers a RustCrypto record layer can run.
//!
//! The handshake only needs to know which ciphers exist and how large their
//! keys are. The record protection itself lives with the caller.

use crate::crypto::provider::SupportedCipher;
use crate::types::BulkCipher;

#[derive(Debug)]
struct Cipher(BulkCipher);

impl SupportedCipher for Cipher {
    fn bulk(&self) -> BulkCipher {
        self.0
    }
}

static AES_128_GCM: Cipher = Cipher(BulkCipher::Aes128Gcm);
static AES_256_GCM: Cipher = Cipher(BulkCipher::Aes256Gcm);
static CHACHA20_POLY1305: Cipher = Cipher(BulkCipher::Chacha20Poly1305);
static AES_128_CBC: Cipher = Cipher(BulkCipher::Aes128Cbc);
static AES_256_CBC: Cipher = Cipher(BulkCipher::Aes256Cbc);

/// All supported bulk ciphers.
pub(super) static ALL_CIPHERS: &[&dyn SupportedCipher] = &[
    &AES_128_GCM,
    &AES_256_GCM,
    &CHACHA20_POLY1305,
    &AES_128_CBC,
    &AES_256_CBC,
];
