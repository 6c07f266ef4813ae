//! HMAC using RustCrypto.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::crypto::provider::HmacProvider;
use crate::types::HashAlgorithm;

macro_rules! mac {
    ($hash:ty, $key:expr, $data:expr) => {{
        let mut m = Hmac::<$hash>::new_from_slice($key).map_err(|_| "Invalid HMAC key".to_string())?;
        m.update($data);
        Ok(m.finalize().into_bytes().to_vec())
    }};
}

/// HMAC provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac(&self, hash: HashAlgorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
        match hash {
            HashAlgorithm::MD5 => mac!(Md5, key, data),
            HashAlgorithm::SHA1 => mac!(Sha1, key, data),
            HashAlgorithm::SHA256 => mac!(Sha256, key, data),
            HashAlgorithm::SHA384 => mac!(Sha384, key, data),
            HashAlgorithm::SHA512 => mac!(Sha512, key, data),
            _ => Err(format!("Unsupported HMAC hash algorithm: {:?}", hash)),
        }
    }
}

/// Static instance of the HMAC provider.
pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4231_case_2() {
        let out = HMAC_PROVIDER
            .hmac(
                HashAlgorithm::SHA256,
                b"Jefe",
                b"what do ya want for nothing?",
            )
            .unwrap();
        assert_eq!(
            out,
            [
                0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
                0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
                0x64, 0xec, 0x38, 0x43,
            ]
        );
    }

    #[test]
    fn rfc2202_sha1_case_2() {
        let out = HMAC_PROVIDER
            .hmac(HashAlgorithm::SHA1, b"Jefe", b"what do ya want for nothing?")
            .unwrap();
        assert_eq!(
            out,
            [
                0xef, 0xfc, 0xdf, 0x6a, 0xe5, 0xeb, 0x2f, 0xa2, 0xd2, 0x74, 0x16, 0xd5, 0xf1, 0x84,
                0xdf, 0x9c, 0x25, 0x9a, 0x7c, 0x79,
            ]
        );
    }

    #[test]
    fn rfc2202_md5_case_2() {
        let out = HMAC_PROVIDER
            .hmac(HashAlgorithm::MD5, b"Jefe", b"what do ya want for nothing?")
            .unwrap();
        assert_eq!(
            out,
            [
                0x75, 0x0c, 0x78, 0x3e, 0x6a, 0xb0, 0xb5, 0x03, 0xea, 0xa8, 0x6e, 0x31, 0x0a, 0x5d,
                0xb7, 0x38,
            ]
        );
    }
}
