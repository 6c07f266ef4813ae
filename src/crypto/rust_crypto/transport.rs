//! RSA key transport using RustCrypto.

use rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use super::sign::{cert_key, CertKey};
use crate::crypto::provider::{EphemeralRsaKey, KeyTransport};

/// Temporary RSA key of an export key exchange.
struct RustCryptoEphemeralRsa {
    key: RsaPrivateKey,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
}

impl std::fmt::Debug for RustCryptoEphemeralRsa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustCryptoEphemeralRsa")
            .field("modulus_len", &self.modulus.len())
            .finish_non_exhaustive()
    }
}

impl EphemeralRsaKey for RustCryptoEphemeralRsa {
    fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, String> {
        self.key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| format!("RSA decryption failed: {e}"))
    }
}

/// Key transport implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyTransport;

impl KeyTransport for RustCryptoKeyTransport {
    fn encrypt(&self, cert_der: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
        let key = match cert_key(cert_der)? {
            CertKey::Rsa(key) => key,
            _ => return Err("Certificate key cannot encrypt".to_string()),
        };
        key.encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
            .map_err(|e| format!("RSA encryption failed: {e}"))
    }

    fn encrypt_with_key(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, String> {
        let key = RsaPublicKey::new(
            BigUint::from_bytes_be(modulus),
            BigUint::from_bytes_be(exponent),
        )
        .map_err(|e| format!("Invalid RSA public key: {e}"))?;
        key.encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
            .map_err(|e| format!("RSA encryption failed: {e}"))
    }

    fn generate_ephemeral(&self, bits: usize) -> Result<Box<dyn EphemeralRsaKey>, String> {
        let key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| format!("RSA key generation failed: {e}"))?;
        let modulus = key.n().to_bytes_be();
        let exponent = key.e().to_bytes_be();
        Ok(Box::new(RustCryptoEphemeralRsa {
            key,
            modulus,
            exponent,
        }))
    }
}

/// Static instance of the key transport.
pub(super) static KEY_TRANSPORT: RustCryptoKeyTransport = RustCryptoKeyTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_roundtrip() {
        let eph = KEY_TRANSPORT.generate_ephemeral(512).unwrap();
        assert_eq!(eph.modulus().len(), 64);
        let ct = KEY_TRANSPORT
            .encrypt_with_key(eph.modulus(), eph.exponent(), &[7; 48])
            .unwrap();
        assert_eq!(eph.decrypt(&ct).unwrap(), vec![7; 48]);
    }

    #[test]
    fn ec_certificate_cannot_encrypt() {
        let cert = rcgen::generate_simple_self_signed(vec!["a".to_string()]).unwrap();
        let der = cert.serialize_der().unwrap();
        assert!(KEY_TRANSPORT.encrypt(&der, &[0; 48]).is_err());
    }
}
