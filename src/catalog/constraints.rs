//! Algorithm policy injected by the caller.

use std::fmt;

use crate::types::{BulkCipher, CipherSuiteSpec, KeyExchangeAlgorithm, KeyFamily};
use crate::types::{NamedGroup, ProtocolVersion, SignatureScheme};

/// Decides which algorithms and key sizes may be used.
///
/// Consulted both for what we offer and for what the peer offers. A peer
/// choice that fails the constraints aborts the handshake.
pub trait AlgorithmConstraints: Send + Sync + fmt::Debug {
    fn permits_version(&self, version: ProtocolVersion) -> bool;

    fn permits_suite(&self, suite: &CipherSuiteSpec) -> bool;

    fn permits_group(&self, group: NamedGroup) -> bool;

    fn permits_scheme(&self, scheme: SignatureScheme) -> bool;

    /// Public keys of certificates and key exchanges.
    fn permits_key(&self, family: KeyFamily, bits: usize) -> bool;

    /// Finite field DH parameters of a DHE exchange.
    fn permits_dh_bits(&self, bits: usize) -> bool;
}

/// Permits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermitAll;

impl AlgorithmConstraints for PermitAll {
    fn permits_version(&self, _: ProtocolVersion) -> bool {
        true
    }
    fn permits_suite(&self, _: &CipherSuiteSpec) -> bool {
        true
    }
    fn permits_group(&self, _: NamedGroup) -> bool {
        true
    }
    fn permits_scheme(&self, _: SignatureScheme) -> bool {
        true
    }
    fn permits_key(&self, _: KeyFamily, _: usize) -> bool {
        true
    }
    fn permits_dh_bits(&self, _: usize) -> bool {
        true
    }
}

/// Deny lists plus minimum key sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledAlgorithms {
    pub versions: Vec<ProtocolVersion>,
    pub bulk_ciphers: Vec<BulkCipher>,
    pub key_exchanges: Vec<KeyExchangeAlgorithm>,
    pub groups: Vec<NamedGroup>,
    pub schemes: Vec<SignatureScheme>,
    pub min_rsa_bits: usize,
    pub min_ec_bits: usize,
    pub min_dh_bits: usize,
}

impl Default for DisabledAlgorithms {
    /// SSL 3.0, RC4, 40 bit DES, export and anonymous exchanges, NULL
    /// encryption, MD5 signatures and short keys are off.
    fn default() -> Self {
        DisabledAlgorithms {
            versions: vec![ProtocolVersion::SSL3_0],
            bulk_ciphers: vec![BulkCipher::Null, BulkCipher::Rc4_40, BulkCipher::Des40Cbc],
            key_exchanges: vec![
                KeyExchangeAlgorithm::RsaExport,
                KeyExchangeAlgorithm::DhAnon,
                KeyExchangeAlgorithm::EcdhAnon,
            ],
            groups: Vec::new(),
            schemes: vec![SignatureScheme::RSA_MD5],
            min_rsa_bits: 1024,
            min_ec_bits: 224,
            min_dh_bits: 1024,
        }
    }
}

impl AlgorithmConstraints for DisabledAlgorithms {
    fn permits_version(&self, version: ProtocolVersion) -> bool {
        !self.versions.contains(&version)
    }

    fn permits_suite(&self, suite: &CipherSuiteSpec) -> bool {
        !self.bulk_ciphers.contains(&suite.bulk) && !self.key_exchanges.contains(&suite.kx)
    }

    fn permits_group(&self, group: NamedGroup) -> bool {
        !self.groups.contains(&group)
    }

    fn permits_scheme(&self, scheme: SignatureScheme) -> bool {
        !self.schemes.contains(&scheme)
    }

    fn permits_key(&self, family: KeyFamily, bits: usize) -> bool {
        match family {
            KeyFamily::Rsa | KeyFamily::RsaPss => bits >= self.min_rsa_bits,
            KeyFamily::Ec => bits >= self.min_ec_bits,
            KeyFamily::Dsa => bits >= self.min_dh_bits,
            KeyFamily::Ed25519 => true,
        }
    }

    fn permits_dh_bits(&self, bits: usize) -> bool {
        bits >= self.min_dh_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CipherSuite;

    #[test]
    fn defaults_block_weak_choices() {
        let d = DisabledAlgorithms::default();
        assert!(!d.permits_version(ProtocolVersion::SSL3_0));
        assert!(d.permits_version(ProtocolVersion::TLS1_2));
        assert!(!d.permits_suite(CipherSuite::RSA_EXPORT_RC4_40_MD5.spec().unwrap()));
        assert!(!d.permits_suite(CipherSuite::DH_ANON_AES128_CBC_SHA.spec().unwrap()));
        assert!(d.permits_suite(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256.spec().unwrap()));
        assert!(!d.permits_scheme(SignatureScheme::RSA_MD5));
        assert!(!d.permits_key(KeyFamily::Rsa, 512));
        assert!(d.permits_key(KeyFamily::Ec, 256));
    }
}
