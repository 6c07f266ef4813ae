use crate::types::{HashAlgorithm, KeyFamily, NamedGroup, ProtocolVersion, SignatureScheme};
use crate::types::{PROTOCOLS_12_13, PROTOCOLS_TO_12, PROTOCOLS_TO_13};

/// Immutable facts about a signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureSchemeSpec {
    pub scheme: SignatureScheme,
    pub name: &'static str,
    pub hash: HashAlgorithm,
    pub family: KeyFamily,
    /// Curve the scheme is bound to in TLS 1.3.
    pub curve: Option<NamedGroup>,
    /// Smallest RSA key able to carry the padding and digest.
    pub min_key_bits: usize,
    /// Versions where the scheme may appear in certificates.
    pub versions: &'static [ProtocolVersion],
    /// Versions where the scheme may sign handshake messages.
    pub handshake_versions: &'static [ProtocolVersion],
}

impl SignatureSchemeSpec {
    pub fn supports(&self, version: ProtocolVersion) -> bool {
        self.versions.contains(&version)
    }

    pub fn supports_handshake(&self, version: ProtocolVersion) -> bool {
        self.handshake_versions.contains(&version)
    }
}

macro_rules! schemes {
    ($( $scheme:ident, $name:literal, $hash:ident, $family:ident, $curve:expr, $bits:literal, $versions:ident, $hs:ident; )*) => {
        /// Every known scheme in default preference order.
        pub(crate) static SCHEMES: &[SignatureSchemeSpec] = &[
            $(
                SignatureSchemeSpec {
                    scheme: SignatureScheme::$scheme,
                    name: $name,
                    hash: HashAlgorithm::$hash,
                    family: KeyFamily::$family,
                    curve: $curve,
                    min_key_bits: $bits,
                    versions: $versions,
                    handshake_versions: $hs,
                },
            )*
        ];
    };
}

schemes! {
    ED25519, "ed25519", None, Ed25519, None, 0, PROTOCOLS_12_13, PROTOCOLS_12_13;
    ECDSA_SECP256R1_SHA256, "ecdsa_secp256r1_sha256", SHA256, Ec, Some(NamedGroup::Secp256r1), 0, PROTOCOLS_TO_13, PROTOCOLS_12_13;
    ECDSA_SECP384R1_SHA384, "ecdsa_secp384r1_sha384", SHA384, Ec, Some(NamedGroup::Secp384r1), 0, PROTOCOLS_TO_13, PROTOCOLS_12_13;
    ECDSA_SECP521R1_SHA512, "ecdsa_secp521r1_sha512", SHA512, Ec, Some(NamedGroup::Secp521r1), 0, PROTOCOLS_TO_13, PROTOCOLS_12_13;
    RSA_PSS_RSAE_SHA256, "rsa_pss_rsae_sha256", SHA256, Rsa, None, 528, PROTOCOLS_12_13, PROTOCOLS_12_13;
    RSA_PSS_RSAE_SHA384, "rsa_pss_rsae_sha384", SHA384, Rsa, None, 784, PROTOCOLS_12_13, PROTOCOLS_12_13;
    RSA_PSS_RSAE_SHA512, "rsa_pss_rsae_sha512", SHA512, Rsa, None, 1040, PROTOCOLS_12_13, PROTOCOLS_12_13;
    RSA_PSS_PSS_SHA256, "rsa_pss_pss_sha256", SHA256, RsaPss, None, 528, PROTOCOLS_12_13, PROTOCOLS_12_13;
    RSA_PSS_PSS_SHA384, "rsa_pss_pss_sha384", SHA384, RsaPss, None, 784, PROTOCOLS_12_13, PROTOCOLS_12_13;
    RSA_PSS_PSS_SHA512, "rsa_pss_pss_sha512", SHA512, RsaPss, None, 1040, PROTOCOLS_12_13, PROTOCOLS_12_13;
    RSA_PKCS1_SHA256, "rsa_pkcs1_sha256", SHA256, Rsa, None, 511, PROTOCOLS_TO_13, PROTOCOLS_TO_12;
    RSA_PKCS1_SHA384, "rsa_pkcs1_sha384", SHA384, Rsa, None, 768, PROTOCOLS_TO_13, PROTOCOLS_TO_12;
    RSA_PKCS1_SHA512, "rsa_pkcs1_sha512", SHA512, Rsa, None, 768, PROTOCOLS_TO_13, PROTOCOLS_TO_12;
    DSA_SHA256, "dsa_sha256", SHA256, Dsa, None, 0, PROTOCOLS_TO_12, PROTOCOLS_TO_12;
    ECDSA_SHA224, "ecdsa_sha224", SHA224, Ec, None, 0, PROTOCOLS_TO_12, PROTOCOLS_TO_12;
    RSA_SHA224, "rsa_sha224", SHA224, Rsa, None, 511, PROTOCOLS_TO_12, PROTOCOLS_TO_12;
    DSA_SHA224, "dsa_sha224", SHA224, Dsa, None, 0, PROTOCOLS_TO_12, PROTOCOLS_TO_12;
    ECDSA_SHA1, "ecdsa_sha1", SHA1, Ec, None, 0, PROTOCOLS_TO_13, PROTOCOLS_TO_12;
    RSA_PKCS1_SHA1, "rsa_pkcs1_sha1", SHA1, Rsa, None, 511, PROTOCOLS_TO_13, PROTOCOLS_TO_12;
    DSA_SHA1, "dsa_sha1", SHA1, Dsa, None, 0, PROTOCOLS_TO_12, PROTOCOLS_TO_12;
    RSA_MD5, "rsa_md5", MD5, Rsa, None, 511, PROTOCOLS_TO_12, PROTOCOLS_TO_12;
}

/// Look up the spec of a scheme.
pub fn scheme_spec(scheme: SignatureScheme) -> Option<&'static SignatureSchemeSpec> {
    SCHEMES.iter().find(|s| s.scheme == scheme)
}

/// Schemes assumed for a TLS 1.2 peer that sent no signature_algorithms
/// (RFC 5246 7.4.1.4.1).
pub const TLS12_DEFAULT_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme::RSA_PKCS1_SHA1,
    SignatureScheme::DSA_SHA1,
    SignatureScheme::ECDSA_SHA1,
];
