use std::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

use super::{HashAlgorithm, KeyFamily, ProtocolVersion};

/// Cipher suites known to the engine.
///
/// The wire identifier and the immutable properties of each suite live in
/// [`CipherSuiteSpec`], looked up through [`CipherSuite::spec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    // TLS 1.3
    TLS13_AES_128_GCM_SHA256,
    TLS13_AES_256_GCM_SHA384,
    TLS13_CHACHA20_POLY1305_SHA256,

    // ECDHE
    ECDHE_ECDSA_AES256_GCM_SHA384,
    ECDHE_ECDSA_AES128_GCM_SHA256,
    ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
    ECDHE_RSA_AES256_GCM_SHA384,
    ECDHE_RSA_AES128_GCM_SHA256,
    ECDHE_RSA_CHACHA20_POLY1305_SHA256,
    ECDHE_ECDSA_AES128_CBC_SHA256,
    ECDHE_RSA_AES128_CBC_SHA256,
    ECDHE_ECDSA_AES128_CBC_SHA,
    ECDHE_RSA_AES128_CBC_SHA,

    // DHE
    DHE_RSA_AES256_GCM_SHA384,
    DHE_RSA_AES128_GCM_SHA256,
    DHE_RSA_AES128_CBC_SHA256,
    DHE_RSA_AES128_CBC_SHA,

    // Static ECDH
    ECDH_ECDSA_AES128_GCM_SHA256,
    ECDH_ECDSA_AES128_CBC_SHA,

    // RSA key transport
    RSA_AES256_GCM_SHA384,
    RSA_AES128_GCM_SHA256,
    RSA_AES128_CBC_SHA256,
    RSA_AES128_CBC_SHA,
    RSA_3DES_EDE_CBC_SHA,

    // Export grade
    RSA_EXPORT_RC4_40_MD5,
    RSA_EXPORT_DES40_CBC_SHA,

    // Anonymous
    DH_ANON_AES128_CBC_SHA,
    ECDH_ANON_AES128_CBC_SHA,

    // Signalling values
    EMPTY_RENEGOTIATION_INFO_SCSV,
    FALLBACK_SCSV,

    Unknown(u16),
}

/// Key exchange algorithm of a TLS 1.2 and earlier suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchangeAlgorithm {
    Rsa,
    RsaExport,
    DheRsa,
    DhAnon,
    EcdheEcdsa,
    EcdheRsa,
    EcdhEcdsa,
    EcdhAnon,
    /// TLS 1.3 suites leave key exchange to the named group.
    Tls13,
    Scsv,
}

impl KeyExchangeAlgorithm {
    /// Whether the server proves its identity with a certificate.
    pub fn is_authenticated(&self) -> bool {
        !matches!(
            self,
            KeyExchangeAlgorithm::DhAnon | KeyExchangeAlgorithm::EcdhAnon
        )
    }

    pub fn is_ecc(&self) -> bool {
        matches!(
            self,
            KeyExchangeAlgorithm::EcdheEcdsa
                | KeyExchangeAlgorithm::EcdheRsa
                | KeyExchangeAlgorithm::EcdhEcdsa
                | KeyExchangeAlgorithm::EcdhAnon
        )
    }

    pub fn is_ffdhe(&self) -> bool {
        matches!(
            self,
            KeyExchangeAlgorithm::DheRsa | KeyExchangeAlgorithm::DhAnon
        )
    }

    /// Key family of the server certificate this exchange needs.
    pub fn server_key_family(&self) -> Option<KeyFamily> {
        match self {
            KeyExchangeAlgorithm::Rsa
            | KeyExchangeAlgorithm::RsaExport
            | KeyExchangeAlgorithm::DheRsa
            | KeyExchangeAlgorithm::EcdheRsa => Some(KeyFamily::Rsa),
            KeyExchangeAlgorithm::EcdheEcdsa | KeyExchangeAlgorithm::EcdhEcdsa => {
                Some(KeyFamily::Ec)
            }
            _ => None,
        }
    }
}

/// Bulk cipher of a suite. The engine never runs it; the sizes drive key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum BulkCipher {
    Null,
    Rc4_40,
    Des40Cbc,
    TripleDesCbc,
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
    Chacha20Poly1305,
}

impl BulkCipher {
    /// Key bytes taken from the key block.
    pub fn key_len(&self) -> usize {
        match self {
            BulkCipher::Null => 0,
            BulkCipher::Rc4_40 | BulkCipher::Des40Cbc => 5,
            BulkCipher::TripleDesCbc => 24,
            BulkCipher::Aes128Cbc | BulkCipher::Aes128Gcm => 16,
            BulkCipher::Aes256Cbc | BulkCipher::Aes256Gcm | BulkCipher::Chacha20Poly1305 => 32,
        }
    }

    /// Expanded key size for export ciphers.
    pub fn expanded_key_len(&self) -> usize {
        match self {
            BulkCipher::Rc4_40 => 16,
            BulkCipher::Des40Cbc => 8,
            other => other.key_len(),
        }
    }

    pub fn block_len(&self) -> usize {
        match self {
            BulkCipher::Des40Cbc | BulkCipher::TripleDesCbc => 8,
            BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc => 16,
            _ => 0,
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(
            self,
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm | BulkCipher::Chacha20Poly1305
        )
    }

    pub fn is_exportable(&self) -> bool {
        matches!(self, BulkCipher::Rc4_40 | BulkCipher::Des40Cbc)
    }

    /// IV bytes taken from the key block for the given version.
    pub fn fixed_iv_len(&self, version: ProtocolVersion) -> usize {
        match self {
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => 4,
            BulkCipher::Chacha20Poly1305 => 12,
            // Explicit per-record IVs from TLS 1.1 onwards.
            _ if version.use_tls11_plus() => 0,
            other => other.block_len(),
        }
    }

    /// Bytes a record grows by at most when protected with this cipher.
    pub fn expansion(&self, mac_len: usize) -> usize {
        match self {
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => 8 + 16,
            BulkCipher::Chacha20Poly1305 => 16,
            BulkCipher::Null | BulkCipher::Rc4_40 => mac_len,
            other => {
                let b = other.block_len();
                // Explicit IV, MAC and a full block of padding.
                b + mac_len + b
            }
        }
    }
}

/// MAC algorithm of a non-AEAD suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    Aead,
    Md5,
    Sha1,
    Sha256,
    Sha384,
}

impl MacAlgorithm {
    pub fn hash(&self) -> HashAlgorithm {
        match self {
            MacAlgorithm::Aead => HashAlgorithm::None,
            MacAlgorithm::Md5 => HashAlgorithm::MD5,
            MacAlgorithm::Sha1 => HashAlgorithm::SHA1,
            MacAlgorithm::Sha256 => HashAlgorithm::SHA256,
            MacAlgorithm::Sha384 => HashAlgorithm::SHA384,
        }
    }

    pub fn key_len(&self) -> usize {
        self.hash().output_len()
    }
}

/// Immutable properties of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteSpec {
    pub suite: CipherSuite,
    pub id: u16,
    pub name: &'static str,
    pub kx: KeyExchangeAlgorithm,
    pub bulk: BulkCipher,
    pub mac: MacAlgorithm,
    /// Hash for the TLS 1.2 PRF or the TLS 1.3 HKDF.
    pub hash: HashAlgorithm,
    pub min: ProtocolVersion,
    pub max: ProtocolVersion,
}

impl CipherSuiteSpec {
    /// Whether the suite may be negotiated at `version`.
    pub fn supports(&self, version: ProtocolVersion) -> bool {
        if !version.is_known() || self.kx == KeyExchangeAlgorithm::Scsv {
            return false;
        }
        // Stream ciphers are not allowed in DTLS.
        if version.is_dtls() && self.bulk == BulkCipher::Rc4_40 {
            return false;
        }
        version.is_at_least(self.min) && self.max.is_at_least(version)
    }

    /// Whether the suite is usable for any of `versions`.
    pub fn supports_any(&self, versions: &[ProtocolVersion]) -> bool {
        versions.iter().any(|v| self.supports(*v))
    }

    pub fn is_tls13(&self) -> bool {
        self.kx == KeyExchangeAlgorithm::Tls13
    }
}

macro_rules! suites {
    ($( $name:ident = $id:literal, $kx:ident, $bulk:ident, $mac:ident, $hash:ident, $min:ident, $max:ident; )*) => {
        static SPECS: &[CipherSuiteSpec] = &[
            $(
                CipherSuiteSpec {
                    suite: CipherSuite::$name,
                    id: $id,
                    name: stringify!($name),
                    kx: KeyExchangeAlgorithm::$kx,
                    bulk: BulkCipher::$bulk,
                    mac: MacAlgorithm::$mac,
                    hash: HashAlgorithm::$hash,
                    min: ProtocolVersion::$min,
                    max: ProtocolVersion::$max,
                },
            )*
        ];
    };
}

suites! {
    TLS13_AES_128_GCM_SHA256 = 0x1301, Tls13, Aes128Gcm, Aead, SHA256, TLS1_3, TLS1_3;
    TLS13_AES_256_GCM_SHA384 = 0x1302, Tls13, Aes256Gcm, Aead, SHA384, TLS1_3, TLS1_3;
    TLS13_CHACHA20_POLY1305_SHA256 = 0x1303, Tls13, Chacha20Poly1305, Aead, SHA256, TLS1_3, TLS1_3;

    ECDHE_ECDSA_AES256_GCM_SHA384 = 0xC02C, EcdheEcdsa, Aes256Gcm, Aead, SHA384, TLS1_2, TLS1_2;
    ECDHE_ECDSA_AES128_GCM_SHA256 = 0xC02B, EcdheEcdsa, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2;
    ECDHE_ECDSA_CHACHA20_POLY1305_SHA256 = 0xCCA9, EcdheEcdsa, Chacha20Poly1305, Aead, SHA256, TLS1_2, TLS1_2;
    ECDHE_RSA_AES256_GCM_SHA384 = 0xC030, EcdheRsa, Aes256Gcm, Aead, SHA384, TLS1_2, TLS1_2;
    ECDHE_RSA_AES128_GCM_SHA256 = 0xC02F, EcdheRsa, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2;
    ECDHE_RSA_CHACHA20_POLY1305_SHA256 = 0xCCA8, EcdheRsa, Chacha20Poly1305, Aead, SHA256, TLS1_2, TLS1_2;
    ECDHE_ECDSA_AES128_CBC_SHA256 = 0xC023, EcdheEcdsa, Aes128Cbc, Sha256, SHA256, TLS1_2, TLS1_2;
    ECDHE_RSA_AES128_CBC_SHA256 = 0xC027, EcdheRsa, Aes128Cbc, Sha256, SHA256, TLS1_2, TLS1_2;
    ECDHE_ECDSA_AES128_CBC_SHA = 0xC009, EcdheEcdsa, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2;
    ECDHE_RSA_AES128_CBC_SHA = 0xC013, EcdheRsa, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2;

    DHE_RSA_AES256_GCM_SHA384 = 0x009F, DheRsa, Aes256Gcm, Aead, SHA384, TLS1_2, TLS1_2;
    DHE_RSA_AES128_GCM_SHA256 = 0x009E, DheRsa, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2;
    DHE_RSA_AES128_CBC_SHA256 = 0x0067, DheRsa, Aes128Cbc, Sha256, SHA256, TLS1_2, TLS1_2;
    DHE_RSA_AES128_CBC_SHA = 0x0033, DheRsa, Aes128Cbc, Sha1, SHA256, SSL3_0, TLS1_2;

    ECDH_ECDSA_AES128_GCM_SHA256 = 0xC02D, EcdhEcdsa, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2;
    ECDH_ECDSA_AES128_CBC_SHA = 0xC004, EcdhEcdsa, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2;

    RSA_AES256_GCM_SHA384 = 0x009D, Rsa, Aes256Gcm, Aead, SHA384, TLS1_2, TLS1_2;
    RSA_AES128_GCM_SHA256 = 0x009C, Rsa, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2;
    RSA_AES128_CBC_SHA256 = 0x003C, Rsa, Aes128Cbc, Sha256, SHA256, TLS1_2, TLS1_2;
    RSA_AES128_CBC_SHA = 0x002F, Rsa, Aes128Cbc, Sha1, SHA256, SSL3_0, TLS1_2;
    RSA_3DES_EDE_CBC_SHA = 0x000A, Rsa, TripleDesCbc, Sha1, SHA256, SSL3_0, TLS1_2;

    RSA_EXPORT_RC4_40_MD5 = 0x0003, RsaExport, Rc4_40, Md5, SHA256, SSL3_0, TLS1_0;
    RSA_EXPORT_DES40_CBC_SHA = 0x0008, RsaExport, Des40Cbc, Sha1, SHA256, SSL3_0, TLS1_0;

    DH_ANON_AES128_CBC_SHA = 0x0034, DhAnon, Aes128Cbc, Sha1, SHA256, SSL3_0, TLS1_2;
    ECDH_ANON_AES128_CBC_SHA = 0xC018, EcdhAnon, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2;

    EMPTY_RENEGOTIATION_INFO_SCSV = 0x00FF, Scsv, Null, Aead, None, SSL3_0, TLS1_2;
    FALLBACK_SCSV = 0x5600, Scsv, Null, Aead, None, SSL3_0, TLS1_2;
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        SPECS
            .iter()
            .find(|s| s.id == value)
            .map(|s| s.suite)
            .unwrap_or(CipherSuite::Unknown(value))
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::Unknown(value) => *value,
            _ => self.spec().map(|s| s.id).unwrap_or(0),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    /// Properties of the suite. `None` for unknown suites.
    pub fn spec(&self) -> Option<&'static CipherSuiteSpec> {
        SPECS.iter().find(|s| s.suite == *self)
    }

    /// All known suites in default preference order, signalling values excluded.
    pub fn all() -> impl Iterator<Item = CipherSuite> {
        SPECS
            .iter()
            .filter(|s| s.kx != KeyExchangeAlgorithm::Scsv)
            .map(|s| s.suite)
    }

    /// Suites enabled when nothing is configured.
    pub fn default_suites() -> Vec<CipherSuite> {
        SPECS
            .iter()
            .filter(|s| {
                s.kx != KeyExchangeAlgorithm::Scsv
                    && s.kx.is_authenticated()
                    && !s.bulk.is_exportable()
                    && s.bulk != BulkCipher::TripleDesCbc
            })
            .map(|s| s.suite)
            .collect()
    }

    pub fn is_scsv(&self) -> bool {
        matches!(
            self,
            CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV | CipherSuite::FALLBACK_SCSV
        )
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.spec() {
            Some(spec) => write!(f, "{}", spec.name),
            None => write!(f, "Unknown(0x{:04x})", self.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip() {
        for spec in SPECS {
            assert_eq!(CipherSuite::from_u16(spec.id), spec.suite);
            assert_eq!(spec.suite.as_u16(), spec.id);
        }
    }

    #[test]
    fn version_ranges() {
        let gcm = CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256.spec().unwrap();
        assert!(gcm.supports(ProtocolVersion::TLS1_2));
        assert!(gcm.supports(ProtocolVersion::DTLS1_2));
        assert!(!gcm.supports(ProtocolVersion::TLS1_1));
        assert!(!gcm.supports(ProtocolVersion::TLS1_3));

        let export = CipherSuite::RSA_EXPORT_RC4_40_MD5.spec().unwrap();
        assert!(export.supports(ProtocolVersion::SSL3_0));
        assert!(export.supports(ProtocolVersion::TLS1_0));
        assert!(!export.supports(ProtocolVersion::TLS1_1));

        let tls13 = CipherSuite::TLS13_AES_128_GCM_SHA256.spec().unwrap();
        assert!(tls13.supports(ProtocolVersion::DTLS1_3));
        assert!(!tls13.supports(ProtocolVersion::TLS1_2));
    }

    #[test]
    fn rc4_never_in_dtls() {
        let rc4 = CipherSuite::RSA_EXPORT_RC4_40_MD5.spec().unwrap();
        assert!(!rc4.supports(ProtocolVersion::DTLS1_0));
    }
}
