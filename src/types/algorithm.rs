use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// Hash algorithms (RFC 5246 7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    None,
    MD5,
    SHA1,
    SHA224,
    SHA256,
    SHA384,
    SHA512,
    Unknown(u8),
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HashAlgorithm::None,
            1 => HashAlgorithm::MD5,
            2 => HashAlgorithm::SHA1,
            3 => HashAlgorithm::SHA224,
            4 => HashAlgorithm::SHA256,
            5 => HashAlgorithm::SHA384,
            6 => HashAlgorithm::SHA512,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::MD5 => 1,
            HashAlgorithm::SHA1 => 2,
            HashAlgorithm::SHA224 => 3,
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::SHA384 => 5,
            HashAlgorithm::SHA512 => 6,
            HashAlgorithm::Unknown(value) => *value,
        }
    }

    /// Digest size in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA224 => 28,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 => 64,
            HashAlgorithm::None | HashAlgorithm::Unknown(_) => 0,
        }
    }

    /// Input block size in bytes, needed for HMAC and the SSL 3.0 pads.
    pub fn block_len(&self) -> usize {
        match self {
            HashAlgorithm::SHA384 | HashAlgorithm::SHA512 => 128,
            _ => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::None => "NONE",
            HashAlgorithm::MD5 => "MD5",
            HashAlgorithm::SHA1 => "SHA1",
            HashAlgorithm::SHA224 => "SHA224",
            HashAlgorithm::SHA256 => "SHA256",
            HashAlgorithm::SHA384 => "SHA384",
            HashAlgorithm::SHA512 => "SHA512",
            HashAlgorithm::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Signature algorithms (RFC 5246 7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureAlgorithm {
    #[default]
    Anonymous,
    RSA,
    DSA,
    ECDSA,
    ED25519,
    Unknown(u8),
}

impl SignatureAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SignatureAlgorithm::Anonymous,
            1 => SignatureAlgorithm::RSA,
            2 => SignatureAlgorithm::DSA,
            3 => SignatureAlgorithm::ECDSA,
            7 => SignatureAlgorithm::ED25519,
            _ => SignatureAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureAlgorithm::Anonymous => 0,
            SignatureAlgorithm::RSA => 1,
            SignatureAlgorithm::DSA => 2,
            SignatureAlgorithm::ECDSA => 3,
            SignatureAlgorithm::ED25519 => 7,
            SignatureAlgorithm::Unknown(value) => *value,
        }
    }
}

/// Family of a public/private key pair, as found in a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    Rsa,
    RsaPss,
    Ec,
    Ed25519,
    Dsa,
}

impl KeyFamily {
    pub fn name(&self) -> &'static str {
        match self {
            KeyFamily::Rsa => "RSA",
            KeyFamily::RsaPss => "RSASSA-PSS",
            KeyFamily::Ec => "EC",
            KeyFamily::Ed25519 => "Ed25519",
            KeyFamily::Dsa => "DSA",
        }
    }
}

/// Signature schemes (RFC 8446 4.2.3). In TLS 1.2 the same code points are
/// the (hash, signature) pairs of RFC 5246.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum SignatureScheme {
    ECDSA_SECP256R1_SHA256,
    ECDSA_SECP384R1_SHA384,
    ECDSA_SECP521R1_SHA512,
    ED25519,
    RSA_PSS_RSAE_SHA256,
    RSA_PSS_RSAE_SHA384,
    RSA_PSS_RSAE_SHA512,
    RSA_PSS_PSS_SHA256,
    RSA_PSS_PSS_SHA384,
    RSA_PSS_PSS_SHA512,
    RSA_PKCS1_SHA256,
    RSA_PKCS1_SHA384,
    RSA_PKCS1_SHA512,
    DSA_SHA256,
    ECDSA_SHA224,
    RSA_SHA224,
    DSA_SHA224,
    ECDSA_SHA1,
    RSA_PKCS1_SHA1,
    DSA_SHA1,
    RSA_MD5,
    Unknown(u16),
}

impl SignatureScheme {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0403 => SignatureScheme::ECDSA_SECP256R1_SHA256,
            0x0503 => SignatureScheme::ECDSA_SECP384R1_SHA384,
            0x0603 => SignatureScheme::ECDSA_SECP521R1_SHA512,
            0x0807 => SignatureScheme::ED25519,
            0x0804 => SignatureScheme::RSA_PSS_RSAE_SHA256,
            0x0805 => SignatureScheme::RSA_PSS_RSAE_SHA384,
            0x0806 => SignatureScheme::RSA_PSS_RSAE_SHA512,
            0x0809 => SignatureScheme::RSA_PSS_PSS_SHA256,
            0x080a => SignatureScheme::RSA_PSS_PSS_SHA384,
            0x080b => SignatureScheme::RSA_PSS_PSS_SHA512,
            0x0401 => SignatureScheme::RSA_PKCS1_SHA256,
            0x0501 => SignatureScheme::RSA_PKCS1_SHA384,
            0x0601 => SignatureScheme::RSA_PKCS1_SHA512,
            0x0402 => SignatureScheme::DSA_SHA256,
            0x0303 => SignatureScheme::ECDSA_SHA224,
            0x0301 => SignatureScheme::RSA_SHA224,
            0x0302 => SignatureScheme::DSA_SHA224,
            0x0203 => SignatureScheme::ECDSA_SHA1,
            0x0201 => SignatureScheme::RSA_PKCS1_SHA1,
            0x0202 => SignatureScheme::DSA_SHA1,
            0x0101 => SignatureScheme::RSA_MD5,
            _ => SignatureScheme::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            SignatureScheme::ECDSA_SECP256R1_SHA256 => 0x0403,
            SignatureScheme::ECDSA_SECP384R1_SHA384 => 0x0503,
            SignatureScheme::ECDSA_SECP521R1_SHA512 => 0x0603,
            SignatureScheme::ED25519 => 0x0807,
            SignatureScheme::RSA_PSS_RSAE_SHA256 => 0x0804,
            SignatureScheme::RSA_PSS_RSAE_SHA384 => 0x0805,
            SignatureScheme::RSA_PSS_RSAE_SHA512 => 0x0806,
            SignatureScheme::RSA_PSS_PSS_SHA256 => 0x0809,
            SignatureScheme::RSA_PSS_PSS_SHA384 => 0x080a,
            SignatureScheme::RSA_PSS_PSS_SHA512 => 0x080b,
            SignatureScheme::RSA_PKCS1_SHA256 => 0x0401,
            SignatureScheme::RSA_PKCS1_SHA384 => 0x0501,
            SignatureScheme::RSA_PKCS1_SHA512 => 0x0601,
            SignatureScheme::DSA_SHA256 => 0x0402,
            SignatureScheme::ECDSA_SHA224 => 0x0303,
            SignatureScheme::RSA_SHA224 => 0x0301,
            SignatureScheme::DSA_SHA224 => 0x0302,
            SignatureScheme::ECDSA_SHA1 => 0x0203,
            SignatureScheme::RSA_PKCS1_SHA1 => 0x0201,
            SignatureScheme::DSA_SHA1 => 0x0202,
            SignatureScheme::RSA_MD5 => 0x0101,
            SignatureScheme::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureScheme> {
        let (input, value) = be_u16(input)?;
        Ok((input, SignatureScheme::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    /// The hash half of the code point.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            SignatureScheme::ED25519 => HashAlgorithm::None,
            SignatureScheme::RSA_PSS_RSAE_SHA256 | SignatureScheme::RSA_PSS_PSS_SHA256 => {
                HashAlgorithm::SHA256
            }
            SignatureScheme::RSA_PSS_RSAE_SHA384 | SignatureScheme::RSA_PSS_PSS_SHA384 => {
                HashAlgorithm::SHA384
            }
            SignatureScheme::RSA_PSS_RSAE_SHA512 | SignatureScheme::RSA_PSS_PSS_SHA512 => {
                HashAlgorithm::SHA512
            }
            other => HashAlgorithm::from_u8((other.as_u16() >> 8) as u8),
        }
    }

    /// The signature half of the code point.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            SignatureScheme::ED25519 => SignatureAlgorithm::ED25519,
            SignatureScheme::RSA_PSS_RSAE_SHA256
            | SignatureScheme::RSA_PSS_RSAE_SHA384
            | SignatureScheme::RSA_PSS_RSAE_SHA512
            | SignatureScheme::RSA_PSS_PSS_SHA256
            | SignatureScheme::RSA_PSS_PSS_SHA384
            | SignatureScheme::RSA_PSS_PSS_SHA512 => SignatureAlgorithm::RSA,
            other => SignatureAlgorithm::from_u8((other.as_u16() & 0xFF) as u8),
        }
    }
}

/// Named groups for key exchange (RFC 8422, RFC 7919, RFC 8446).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    Secp256r1,
    Secp384r1,
    Secp521r1,
    X25519,
    X448,
    Ffdhe2048,
    Ffdhe3072,
    Ffdhe4096,
    Ffdhe6144,
    Ffdhe8192,
    Unknown(u16),
}

impl NamedGroup {
    pub fn from_u16(value: u16) -> Self {
        match value {
            23 => NamedGroup::Secp256r1,
            24 => NamedGroup::Secp384r1,
            25 => NamedGroup::Secp521r1,
            29 => NamedGroup::X25519,
            30 => NamedGroup::X448,
            256 => NamedGroup::Ffdhe2048,
            257 => NamedGroup::Ffdhe3072,
            258 => NamedGroup::Ffdhe4096,
            259 => NamedGroup::Ffdhe6144,
            260 => NamedGroup::Ffdhe8192,
            _ => NamedGroup::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 23,
            NamedGroup::Secp384r1 => 24,
            NamedGroup::Secp521r1 => 25,
            NamedGroup::X25519 => 29,
            NamedGroup::X448 => 30,
            NamedGroup::Ffdhe2048 => 256,
            NamedGroup::Ffdhe3072 => 257,
            NamedGroup::Ffdhe4096 => 258,
            NamedGroup::Ffdhe6144 => 259,
            NamedGroup::Ffdhe8192 => 260,
            NamedGroup::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedGroup::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    pub fn is_ffdhe(&self) -> bool {
        (256..=511).contains(&self.as_u16())
    }
}

/// Certificate types of the TLS 1.0 to 1.2 CertificateRequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCertificateType {
    RsaSign,
    DssSign,
    RsaFixedDh,
    DssFixedDh,
    EcdsaSign,
    RsaFixedEcdh,
    EcdsaFixedEcdh,
    Unknown(u8),
}

impl ClientCertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ClientCertificateType::RsaSign,
            2 => ClientCertificateType::DssSign,
            3 => ClientCertificateType::RsaFixedDh,
            4 => ClientCertificateType::DssFixedDh,
            64 => ClientCertificateType::EcdsaSign,
            65 => ClientCertificateType::RsaFixedEcdh,
            66 => ClientCertificateType::EcdsaFixedEcdh,
            _ => ClientCertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ClientCertificateType::RsaSign => 1,
            ClientCertificateType::DssSign => 2,
            ClientCertificateType::RsaFixedDh => 3,
            ClientCertificateType::DssFixedDh => 4,
            ClientCertificateType::EcdsaSign => 64,
            ClientCertificateType::RsaFixedEcdh => 65,
            ClientCertificateType::EcdsaFixedEcdh => 66,
            ClientCertificateType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientCertificateType> {
        let (input, value) = be_u8(input)?;
        Ok((input, ClientCertificateType::from_u8(value)))
    }

    /// Key family a client certificate must have to satisfy this type.
    pub fn key_family(&self) -> Option<KeyFamily> {
        match self {
            ClientCertificateType::RsaSign => Some(KeyFamily::Rsa),
            ClientCertificateType::DssSign => Some(KeyFamily::Dsa),
            ClientCertificateType::EcdsaSign => Some(KeyFamily::Ec),
            _ => None,
        }
    }
}
