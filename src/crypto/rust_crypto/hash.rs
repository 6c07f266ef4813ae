//! Hash implementations using RustCrypto.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::crypto::provider::{HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
#[derive(Clone)]
enum RustCryptoHashContext {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl std::fmt::Debug for RustCryptoHashContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RustCryptoHashContext::Md5(_) => "Md5",
            RustCryptoHashContext::Sha1(_) => "Sha1",
            RustCryptoHashContext::Sha256(_) => "Sha256",
            RustCryptoHashContext::Sha384(_) => "Sha384",
            RustCryptoHashContext::Sha512(_) => "Sha512",
        };
        f.debug_tuple("RustCryptoHashContext").field(&name).finish()
    }
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Md5(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha1(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha256(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha384(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha512(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self) -> Vec<u8> {
        match self {
            RustCryptoHashContext::Md5(ctx) => ctx.clone().finalize().to_vec(),
            RustCryptoHashContext::Sha1(ctx) => ctx.clone().finalize().to_vec(),
            RustCryptoHashContext::Sha256(ctx) => ctx.clone().finalize().to_vec(),
            RustCryptoHashContext::Sha384(ctx) => ctx.clone().finalize().to_vec(),
            RustCryptoHashContext::Sha512(ctx) => ctx.clone().finalize().to_vec(),
        }
    }

    fn box_clone(&self) -> Box<dyn HashContext> {
        Box::new(self.clone())
    }
}

/// Hash provider implementation.
///
/// MD5 and SHA-1 are only here for the handshakes before TLS 1.2.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Option<Box<dyn HashContext>> {
        match algorithm {
            HashAlgorithm::MD5 => Some(Box::new(RustCryptoHashContext::Md5(Md5::new()))),
            HashAlgorithm::SHA1 => Some(Box::new(RustCryptoHashContext::Sha1(Sha1::new()))),
            HashAlgorithm::SHA256 => Some(Box::new(RustCryptoHashContext::Sha256(Sha256::new()))),
            HashAlgorithm::SHA384 => Some(Box::new(RustCryptoHashContext::Sha384(Sha384::new()))),
            HashAlgorithm::SHA512 => Some(Box::new(RustCryptoHashContext::Sha512(Sha512::new()))),
            _ => None,
        }
    }
}

/// Static instance of the hash provider.
pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;

/// One-shot digest used by the signature code.
pub(super) fn digest(hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, String> {
    match hash {
        HashAlgorithm::MD5 => Ok(Md5::digest(data).to_vec()),
        HashAlgorithm::SHA1 => Ok(Sha1::digest(data).to_vec()),
        HashAlgorithm::SHA256 => Ok(Sha256::digest(data).to_vec()),
        HashAlgorithm::SHA384 => Ok(Sha384::digest(data).to_vec()),
        HashAlgorithm::SHA512 => Ok(Sha512::digest(data).to_vec()),
        _ => Err(format!("Unsupported hash algorithm: {:?}", hash)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_and_finalize_keeps_running() {
        let mut ctx = HASH_PROVIDER.create_hash(HashAlgorithm::SHA256).unwrap();
        ctx.update(b"abc");
        let first = ctx.clone_and_finalize();
        assert_eq!(first, Sha256::digest(b"abc").to_vec());

        let fork = ctx.box_clone();
        ctx.update(b"def");
        assert_eq!(ctx.clone_and_finalize(), Sha256::digest(b"abcdef").to_vec());
        assert_eq!(fork.clone_and_finalize(), first);
    }

    #[test]
    fn legacy_hashes() {
        let mut md5 = HASH_PROVIDER.create_hash(HashAlgorithm::MD5).unwrap();
        md5.update(b"abc");
        assert_eq!(
            md5.clone_and_finalize(),
            [
                0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, 0xd6, 0x96, 0x3f, 0x7d, 0x28, 0xe1,
                0x7f, 0x72,
            ]
        );

        let mut sha1 = HASH_PROVIDER.create_hash(HashAlgorithm::SHA1).unwrap();
        sha1.update(b"abc");
        assert_eq!(
            sha1.clone_and_finalize(),
            [
                0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
                0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
            ]
        );
    }
}
