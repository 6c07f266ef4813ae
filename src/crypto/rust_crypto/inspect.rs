//! Certificate public key inspection using x509-cert.

use der::{Decode, Encode};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use super::sign::{OID_DSA, OID_EC_PUBLIC_KEY, OID_ED25519, OID_P256, OID_P384};
use super::sign::{OID_RSASSA_PSS, OID_RSA_ENCRYPTION};
use crate::crypto::provider::{CertificateInspector, PublicKeyInfo};
use crate::types::{KeyFamily, NamedGroup, SignatureScheme};

const OID_P521: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

const OID_SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const OID_SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const OID_SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const OID_SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const OID_ECDSA_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
const OID_ECDSA_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const OID_ECDSA_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const OID_ECDSA_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// TLS code point of a certificate signature algorithm. RSASSA-PSS hides the
/// hash in its parameters and maps to nothing.
fn certificate_scheme(oid: ObjectIdentifier) -> Option<SignatureScheme> {
    let scheme = match oid {
        OID_SHA1_WITH_RSA => SignatureScheme::RSA_PKCS1_SHA1,
        OID_SHA256_WITH_RSA => SignatureScheme::RSA_PKCS1_SHA256,
        OID_SHA384_WITH_RSA => SignatureScheme::RSA_PKCS1_SHA384,
        OID_SHA512_WITH_RSA => SignatureScheme::RSA_PKCS1_SHA512,
        OID_ECDSA_SHA1 => SignatureScheme::ECDSA_SHA1,
        OID_ECDSA_SHA256 => SignatureScheme::ECDSA_SECP256R1_SHA256,
        OID_ECDSA_SHA384 => SignatureScheme::ECDSA_SECP384R1_SHA384,
        OID_ECDSA_SHA512 => SignatureScheme::ECDSA_SECP521R1_SHA512,
        OID_ED25519 => SignatureScheme::ED25519,
        _ => return None,
    };
    Some(scheme)
}

#[derive(Debug)]
pub(super) struct RustCryptoCertificateInspector;

impl CertificateInspector for RustCryptoCertificateInspector {
    fn inspect(&self, cert_der: &[u8]) -> Result<PublicKeyInfo, String> {
        let cert = X509Certificate::from_der(cert_der)
            .map_err(|e| format!("Failed to parse certificate: {e}"))?;
        let tbs = &cert.tbs_certificate;
        let spki = &tbs.subject_public_key_info;

        let public_key = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| "Invalid subject_public_key bitstring".to_string())?
            .to_vec();

        let (family, bits, curve) = match spki.algorithm.oid {
            OID_RSA_ENCRYPTION | OID_RSASSA_PSS => {
                let key = RsaPublicKey::from_pkcs1_der(&public_key)
                    .map_err(|e| format!("Invalid RSA public key: {e}"))?;
                let family = if spki.algorithm.oid == OID_RSASSA_PSS {
                    KeyFamily::RsaPss
                } else {
                    KeyFamily::Rsa
                };
                (family, key.n().bits(), None)
            }
            OID_EC_PUBLIC_KEY => {
                let curve_oid: ObjectIdentifier = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or("Missing EC curve parameter in certificate")?
                    .decode_as()
                    .map_err(|_| "Invalid EC curve parameter in certificate".to_string())?;
                let (group, bits) = match curve_oid {
                    OID_P256 => (NamedGroup::Secp256r1, 256),
                    OID_P384 => (NamedGroup::Secp384r1, 384),
                    OID_P521 => (NamedGroup::Secp521r1, 521),
                    _ => (NamedGroup::Unknown(0), 0),
                };
                (KeyFamily::Ec, bits, Some(group))
            }
            OID_ED25519 => (KeyFamily::Ed25519, 256, None),
            // The DSA public value is about the size of the prime.
            OID_DSA => (KeyFamily::Dsa, public_key.len().saturating_sub(4) * 8, None),
            oid => return Err(format!("Unsupported public key algorithm: {}", oid)),
        };

        let issuer = tbs
            .issuer
            .to_der()
            .map_err(|e| format!("Failed to encode issuer: {e}"))?;
        let subject = tbs
            .subject
            .to_der()
            .map_err(|e| format!("Failed to encode subject: {e}"))?;

        Ok(PublicKeyInfo {
            family,
            bits,
            curve,
            public_key,
            issuer,
            subject,
            signed_with: certificate_scheme(cert.signature_algorithm.oid),
        })
    }
}

pub(super) static CERTIFICATE_INSPECTOR: RustCryptoCertificateInspector =
    RustCryptoCertificateInspector;
