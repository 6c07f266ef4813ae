//! Signing and key loading implementations using RustCrypto.

use std::str;
use std::sync::Arc;

use der::Decode;
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::NistP256;
use p384::NistP384;
use pkcs8::DecodePrivateKey;
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use super::hash::digest;
use crate::crypto::provider::{KeyProvider, SignatureVerifier, SigningKey as SigningKeyTrait};
use crate::types::{HashAlgorithm, KeyFamily, NamedGroup, SignatureAlgorithm, SignatureScheme};

pub(super) const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub(super) const OID_RSASSA_PSS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");
pub(super) const OID_EC_PUBLIC_KEY: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
pub(super) const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
pub(super) const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
pub(super) const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
pub(super) const OID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");

fn is_sha2(hash: HashAlgorithm) -> bool {
    matches!(
        hash,
        HashAlgorithm::SHA256 | HashAlgorithm::SHA384 | HashAlgorithm::SHA512
    )
}

fn is_pss_rsae(scheme: SignatureScheme) -> bool {
    matches!(
        scheme,
        SignatureScheme::RSA_PSS_RSAE_SHA256
            | SignatureScheme::RSA_PSS_RSAE_SHA384
            | SignatureScheme::RSA_PSS_RSAE_SHA512
    )
}

fn is_pss_pss(scheme: SignatureScheme) -> bool {
    matches!(
        scheme,
        SignatureScheme::RSA_PSS_PSS_SHA256
            | SignatureScheme::RSA_PSS_PSS_SHA384
            | SignatureScheme::RSA_PSS_PSS_SHA512
    )
}

fn pkcs1_padding(hash: HashAlgorithm) -> Result<Pkcs1v15Sign, String> {
    match hash {
        HashAlgorithm::SHA256 => Ok(Pkcs1v15Sign::new::<Sha256>()),
        HashAlgorithm::SHA384 => Ok(Pkcs1v15Sign::new::<Sha384>()),
        HashAlgorithm::SHA512 => Ok(Pkcs1v15Sign::new::<Sha512>()),
        _ => Err(format!("Unsupported PKCS#1 hash: {:?}", hash)),
    }
}

fn pss_padding(hash: HashAlgorithm) -> Result<Pss, String> {
    match hash {
        HashAlgorithm::SHA256 => Ok(Pss::new::<Sha256>()),
        HashAlgorithm::SHA384 => Ok(Pss::new::<Sha384>()),
        HashAlgorithm::SHA512 => Ok(Pss::new::<Sha512>()),
        _ => Err(format!("Unsupported PSS hash: {:?}", hash)),
    }
}

/// ECDSA signing key implementation.
enum EcdsaSigningKey {
    P256(SigningKey<NistP256>),
    P384(SigningKey<NistP384>),
}

impl std::fmt::Debug for EcdsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EcdsaSigningKey::P256(_) => f.debug_tuple("EcdsaSigningKey::P256").finish(),
            EcdsaSigningKey::P384(_) => f.debug_tuple("EcdsaSigningKey::P384").finish(),
        }
    }
}

impl SigningKeyTrait for EcdsaSigningKey {
    fn family(&self) -> KeyFamily {
        KeyFamily::Ec
    }

    fn bits(&self) -> usize {
        match self {
            EcdsaSigningKey::P256(_) => 256,
            EcdsaSigningKey::P384(_) => 384,
        }
    }

    fn curve(&self) -> Option<NamedGroup> {
        match self {
            EcdsaSigningKey::P256(_) => Some(NamedGroup::Secp256r1),
            EcdsaSigningKey::P384(_) => Some(NamedGroup::Secp384r1),
        }
    }

    fn supports(&self, scheme: SignatureScheme) -> bool {
        scheme.signature_algorithm() == SignatureAlgorithm::ECDSA
            && is_sha2(scheme.hash_algorithm())
    }

    fn sign(&self, scheme: Option<SignatureScheme>, message: &[u8]) -> Result<Vec<u8>, String> {
        let prehash = match scheme {
            Some(scheme) => {
                if !self.supports(scheme) {
                    return Err(format!("EC key cannot sign with {:?}", scheme));
                }
                digest(scheme.hash_algorithm(), message)?
            }
            None => message.to_vec(),
        };

        match self {
            EcdsaSigningKey::P256(key) => {
                let signature: Signature<NistP256> = key
                    .sign_prehash(&prehash)
                    .map_err(|_| "Signing failed".to_string())?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            EcdsaSigningKey::P384(key) => {
                let signature: Signature<NistP384> = key
                    .sign_prehash(&prehash)
                    .map_err(|_| "Signing failed".to_string())?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }

    fn agree(&self, peer_pub: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            EcdsaSigningKey::P256(key) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared = p256::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
                Ok(shared.raw_secret_bytes().to_vec())
            }
            EcdsaSigningKey::P384(key) => {
                let peer = p384::PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared = p384::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
                Ok(shared.raw_secret_bytes().to_vec())
            }
        }
    }
}

/// RSA signing and decryption key.
struct RsaSigningKey {
    key: RsaPrivateKey,
}

impl std::fmt::Debug for RsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaSigningKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl SigningKeyTrait for RsaSigningKey {
    fn family(&self) -> KeyFamily {
        KeyFamily::Rsa
    }

    fn bits(&self) -> usize {
        self.key.n().bits()
    }

    fn curve(&self) -> Option<NamedGroup> {
        None
    }

    fn supports(&self, scheme: SignatureScheme) -> bool {
        let hash = scheme.hash_algorithm();
        if !is_sha2(hash) {
            return false;
        }
        if is_pss_rsae(scheme) {
            // EM must hold the digest, an equally long salt and two more bytes.
            return self.key.size() >= 2 * hash.output_len() + 2;
        }
        !is_pss_pss(scheme) && scheme.signature_algorithm() == SignatureAlgorithm::RSA
    }

    fn sign(&self, scheme: Option<SignatureScheme>, message: &[u8]) -> Result<Vec<u8>, String> {
        let Some(scheme) = scheme else {
            return self
                .key
                .sign(Pkcs1v15Sign::new_unprefixed(), message)
                .map_err(|e| format!("RSA signing failed: {e}"));
        };

        if !self.supports(scheme) {
            return Err(format!("RSA key cannot sign with {:?}", scheme));
        }

        let hash = scheme.hash_algorithm();
        let hashed = digest(hash, message)?;
        if is_pss_rsae(scheme) {
            self.key
                .sign_with_rng(&mut OsRng, pss_padding(hash)?, &hashed)
                .map_err(|e| format!("RSA-PSS signing failed: {e}"))
        } else {
            self.key
                .sign(pkcs1_padding(hash)?, &hashed)
                .map_err(|e| format!("RSA signing failed: {e}"))
        }
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, String> {
        self.key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| format!("RSA decryption failed: {e}"))
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Arc<dyn SigningKeyTrait>, String> {
        // PKCS#8 first, it is what most tooling writes.
        if let Ok(key) = SigningKey::<NistP256>::from_pkcs8_der(key_der) {
            return Ok(Arc::new(EcdsaSigningKey::P256(key)));
        }
        if let Ok(key) = SigningKey::<NistP384>::from_pkcs8_der(key_der) {
            return Ok(Arc::new(EcdsaSigningKey::P384(key)));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(key_der) {
            return Ok(Arc::new(RsaSigningKey { key }));
        }

        // SEC1 and PKCS#1, as written by OpenSSL.
        if let Ok(key) = p256::SecretKey::from_sec1_der(key_der) {
            return Ok(Arc::new(EcdsaSigningKey::P256(key.into())));
        }
        if let Ok(key) = p384::SecretKey::from_sec1_der(key_der) {
            return Ok(Arc::new(EcdsaSigningKey::P384(key.into())));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(key_der) {
            return Ok(Arc::new(RsaSigningKey { key }));
        }

        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                if let Ok((_label, doc)) = pkcs8::Document::from_pem(pem_str) {
                    return self.load_private_key(doc.as_bytes());
                }
            }
        }

        Err("Failed to parse private key in any supported format".to_string())
    }
}

/// Public key of a certificate, in a form the verifier can use.
pub(super) enum CertKey {
    P256(VerifyingKey<NistP256>),
    P384(VerifyingKey<NistP384>),
    Rsa(RsaPublicKey),
    RsaPss(RsaPublicKey),
}

pub(super) fn cert_key(cert_der: &[u8]) -> Result<CertKey, String> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| format!("Failed to parse certificate: {e}"))?;
    let spki = &cert.tbs_certificate.subject_public_key_info;

    let key_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| "Invalid subject_public_key bitstring".to_string())?;

    match spki.algorithm.oid {
        OID_EC_PUBLIC_KEY => {
            let curve_oid: ObjectIdentifier = spki
                .algorithm
                .parameters
                .as_ref()
                .ok_or("Missing EC curve parameter in certificate")?
                .decode_as()
                .map_err(|_| "Invalid EC curve parameter in certificate".to_string())?;
            match curve_oid {
                OID_P256 => VerifyingKey::<NistP256>::from_sec1_bytes(key_bytes)
                    .map(CertKey::P256)
                    .map_err(|_| "Invalid P-256 public key".to_string()),
                OID_P384 => VerifyingKey::<NistP384>::from_sec1_bytes(key_bytes)
                    .map(CertKey::P384)
                    .map_err(|_| "Invalid P-384 public key".to_string()),
                _ => Err(format!("Unsupported EC curve: {}", curve_oid)),
            }
        }
        OID_RSA_ENCRYPTION => RsaPublicKey::from_pkcs1_der(key_bytes)
            .map(CertKey::Rsa)
            .map_err(|e| format!("Invalid RSA public key: {e}")),
        OID_RSASSA_PSS => RsaPublicKey::from_pkcs1_der(key_bytes)
            .map(CertKey::RsaPss)
            .map_err(|e| format!("Invalid RSA public key: {e}")),
        oid => Err(format!("Unsupported public key algorithm: {}", oid)),
    }
}

/// Signature verifier implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn supports(&self, scheme: SignatureScheme) -> bool {
        is_sha2(scheme.hash_algorithm())
            && matches!(
                scheme.signature_algorithm(),
                SignatureAlgorithm::ECDSA | SignatureAlgorithm::RSA
            )
    }

    fn verify_signature(
        &self,
        cert_der: &[u8],
        scheme: Option<SignatureScheme>,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        let key = cert_key(cert_der)?;

        if let Some(scheme) = scheme {
            if !self.supports(scheme) {
                return Err(format!("Unsupported signature scheme: {:?}", scheme));
            }
        }

        // With no scheme the message is the legacy digest itself.
        let (hash, prehash) = match scheme {
            Some(scheme) => {
                let hash = scheme.hash_algorithm();
                (Some(hash), digest(hash, message)?)
            }
            None => (None, message.to_vec()),
        };

        let ecdsa_scheme = scheme
            .map(|s| s.signature_algorithm() == SignatureAlgorithm::ECDSA)
            .unwrap_or(true);

        match key {
            CertKey::P256(key) => {
                if !ecdsa_scheme {
                    return Err("Scheme does not match EC certificate".to_string());
                }
                let sig = Signature::<NistP256>::from_der(signature)
                    .map_err(|_| "Invalid signature format".to_string())?;
                key.verify_prehash(&prehash, &sig)
                    .map_err(|_| "ECDSA signature verification failed".to_string())
            }
            CertKey::P384(key) => {
                if !ecdsa_scheme {
                    return Err("Scheme does not match EC certificate".to_string());
                }
                let sig = Signature::<NistP384>::from_der(signature)
                    .map_err(|_| "Invalid signature format".to_string())?;
                key.verify_prehash(&prehash, &sig)
                    .map_err(|_| "ECDSA signature verification failed".to_string())
            }
            CertKey::Rsa(key) => match (scheme, hash) {
                (None, _) => key
                    .verify(Pkcs1v15Sign::new_unprefixed(), &prehash, signature)
                    .map_err(|_| "RSA signature verification failed".to_string()),
                (Some(s), Some(hash)) if is_pss_rsae(s) => key
                    .verify(pss_padding(hash)?, &prehash, signature)
                    .map_err(|_| "RSA-PSS signature verification failed".to_string()),
                (Some(s), Some(hash))
                    if !is_pss_pss(s) && s.signature_algorithm() == SignatureAlgorithm::RSA =>
                {
                    key.verify(pkcs1_padding(hash)?, &prehash, signature)
                        .map_err(|_| "RSA signature verification failed".to_string())
                }
                _ => Err("Scheme does not match RSA certificate".to_string()),
            },
            CertKey::RsaPss(key) => match (scheme, hash) {
                (Some(s), Some(hash)) if is_pss_pss(s) => key
                    .verify(pss_padding(hash)?, &prehash, signature)
                    .map_err(|_| "RSA-PSS signature verification failed".to_string()),
                _ => Err("Scheme does not match RSASSA-PSS certificate".to_string()),
            },
        }
    }
}

/// Static instance of the key provider.
pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

/// Static instance of the signature verifier.
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> (Vec<u8>, Vec<u8>) {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (
            cert.serialize_der().unwrap(),
            cert.serialize_private_key_der(),
        )
    }

    #[test]
    fn ecdsa_sign_and_verify() {
        let (cert, key) = self_signed();
        let key = KEY_PROVIDER.load_private_key(&key).unwrap();
        assert_eq!(key.family(), KeyFamily::Ec);
        assert_eq!(key.curve(), Some(NamedGroup::Secp256r1));

        let scheme = SignatureScheme::ECDSA_SECP256R1_SHA256;
        let sig = key.sign(Some(scheme), b"hello").unwrap();
        SIGNATURE_VERIFIER
            .verify_signature(&cert, Some(scheme), b"hello", &sig)
            .unwrap();
        assert!(SIGNATURE_VERIFIER
            .verify_signature(&cert, Some(scheme), b"other", &sig)
            .is_err());
    }

    #[test]
    fn ecdsa_rejects_rsa_scheme() {
        let (cert, key) = self_signed();
        let key = KEY_PROVIDER.load_private_key(&key).unwrap();
        assert!(!key.supports(SignatureScheme::RSA_PKCS1_SHA256));
        let sig = key
            .sign(Some(SignatureScheme::ECDSA_SECP256R1_SHA256), b"x")
            .unwrap();
        assert!(SIGNATURE_VERIFIER
            .verify_signature(&cert, Some(SignatureScheme::RSA_PKCS1_SHA256), b"x", &sig)
            .is_err());
    }

    #[test]
    fn legacy_digest_signature() {
        let (cert, key) = self_signed();
        let key = KEY_PROVIDER.load_private_key(&key).unwrap();
        let digest = [0x42u8; 20];
        let sig = key.sign(None, &digest).unwrap();
        SIGNATURE_VERIFIER
            .verify_signature(&cert, None, &digest, &sig)
            .unwrap();
    }

    #[test]
    fn static_ecdh_agrees_with_ephemeral() {
        let (_, key) = self_signed();
        let key = KEY_PROVIDER.load_private_key(&key).unwrap();
        let secret = p256::SecretKey::from_pkcs8_der(&self_signed().1).unwrap();
        let peer_pub = secret.public_key().to_sec1_bytes();
        assert_eq!(key.agree(&peer_pub).unwrap().len(), 32);
    }

    #[test]
    fn garbage_key_fails() {
        assert!(KEY_PROVIDER.load_private_key(&[1, 2, 3]).is_err());
    }
}
