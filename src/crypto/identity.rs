//! Local identities: a certificate chain with the private key of its leaf.

use std::fmt;
use std::sync::Arc;

use crate::crypto::provider::{CryptoProvider, PublicKeyInfo, SigningKey};
use crate::types::{KeyFamily, SignatureScheme};
use crate::Error;

/// Certificate chain plus the private key of the leaf.
pub struct Identity {
    chain: Vec<Vec<u8>>,
    key: Arc<dyn SigningKey>,
    leaf: PublicKeyInfo,
    issuers: Vec<Vec<u8>>,
    signed_with: Vec<Option<SignatureScheme>>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("chain_len", &self.chain.len())
            .field("family", &self.leaf.family)
            .field("bits", &self.leaf.bits)
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Load an identity from DER certificates (leaf first) and a private key.
    pub fn new(
        provider: &CryptoProvider,
        chain: Vec<Vec<u8>>,
        private_key: &[u8],
    ) -> Result<Self, Error> {
        let leaf_der = chain
            .first()
            .ok_or_else(|| Error::ConfigurationError("Empty certificate chain".to_string()))?;
        let leaf = provider
            .certificate_inspector
            .inspect(leaf_der)
            .map_err(Error::ConfigurationError)?;
        let key = provider
            .key_provider
            .load_private_key(private_key)
            .map_err(Error::ConfigurationError)?;

        let rsa_pss = key.family() == KeyFamily::Rsa && leaf.family == KeyFamily::RsaPss;
        if key.family() != leaf.family && !rsa_pss {
            return Err(Error::ConfigurationError(format!(
                "Private key is {} but certificate is {}",
                key.family().name(),
                leaf.family.name()
            )));
        }

        let mut issuers = Vec::with_capacity(chain.len());
        let mut signed_with = Vec::with_capacity(chain.len());
        for cert in &chain {
            let info = provider
                .certificate_inspector
                .inspect(cert)
                .map_err(Error::ConfigurationError)?;
            issuers.push(info.issuer);
            signed_with.push(info.signed_with);
        }

        Ok(Identity {
            chain,
            key,
            leaf,
            issuers,
            signed_with,
        })
    }

    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    pub fn leaf(&self) -> &[u8] {
        &self.chain[0]
    }

    pub fn key(&self) -> &Arc<dyn SigningKey> {
        &self.key
    }

    pub fn public_key(&self) -> &PublicKeyInfo {
        &self.leaf
    }

    pub fn family(&self) -> KeyFamily {
        self.leaf.family
    }

    /// Whether any certificate of the chain was issued by `authority` (DER name).
    pub fn issued_by(&self, authority: &[u8]) -> bool {
        self.issuers.iter().any(|i| i == authority)
    }

    /// Whether a peer accepting `schemes` in certificates can check this
    /// chain. An empty list accepts anything, as do signatures without a
    /// TLS code point.
    pub fn verifiable_with(&self, schemes: &[SignatureScheme]) -> bool {
        schemes.is_empty()
            || self
                .signed_with
                .iter()
                .flatten()
                .all(|s| schemes.contains(s))
    }
}

/// Chooses local identities during the handshake.
///
/// Families and authorities are passed in the order the peer or the cipher
/// suite gave them. The first identity that matches wins. `cert_schemes` are
/// the schemes the peer accepts in certificate chains, empty when it did not
/// say.
pub trait KeyManager: Send + Sync + fmt::Debug {
    /// Identity for the server side of a key exchange.
    fn choose_server_identity(
        &self,
        families: &[KeyFamily],
        authorities: &[Vec<u8>],
        cert_schemes: &[SignatureScheme],
        server_name: Option<&str>,
    ) -> Option<Arc<Identity>>;

    /// Identity to answer a CertificateRequest with.
    fn choose_client_identity(
        &self,
        families: &[KeyFamily],
        authorities: &[Vec<u8>],
        cert_schemes: &[SignatureScheme],
    ) -> Option<Arc<Identity>>;
}

/// A fixed list of identities, tried in configuration order.
#[derive(Debug, Default)]
pub struct StaticKeyManager {
    identities: Vec<Arc<Identity>>,
}

impl StaticKeyManager {
    pub fn new(identities: Vec<Identity>) -> Self {
        StaticKeyManager {
            identities: identities.into_iter().map(Arc::new).collect(),
        }
    }

    fn choose(
        &self,
        families: &[KeyFamily],
        authorities: &[Vec<u8>],
        cert_schemes: &[SignatureScheme],
    ) -> Option<Arc<Identity>> {
        for family in families {
            let of_family: Vec<_> = self
                .identities
                .iter()
                .filter(|i| i.family() == *family)
                .collect();
            let candidates: Vec<_> = if authorities.is_empty() {
                of_family
            } else {
                authorities
                    .iter()
                    .flat_map(|a| of_family.iter().filter(move |i| i.issued_by(a)))
                    .copied()
                    .collect()
            };
            // A chain the peer cannot verify is still better than none.
            let found = candidates
                .iter()
                .find(|i| i.verifiable_with(cert_schemes))
                .or_else(|| candidates.first());
            if let Some(found) = found {
                return Some((*found).clone());
            }
        }
        None
    }
}

impl KeyManager for StaticKeyManager {
    fn choose_server_identity(
        &self,
        families: &[KeyFamily],
        authorities: &[Vec<u8>],
        cert_schemes: &[SignatureScheme],
        _server_name: Option<&str>,
    ) -> Option<Arc<Identity>> {
        // Servers fall back to any identity of the family when the
        // authorities do not match.
        self.choose(families, authorities, cert_schemes)
            .or_else(|| self.choose(families, &[], cert_schemes))
    }

    fn choose_client_identity(
        &self,
        families: &[KeyFamily],
        authorities: &[Vec<u8>],
        cert_schemes: &[SignatureScheme],
    ) -> Option<Arc<Identity>> {
        self.choose(families, authorities, cert_schemes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    fn identity(name: &str) -> Identity {
        let cert = rcgen::generate_simple_self_signed(vec![name.to_string()]).unwrap();
        Identity::new(
            &default_provider(),
            vec![cert.serialize_der().unwrap()],
            &cert.serialize_private_key_der(),
        )
        .unwrap()
    }

    #[test]
    fn family_order_wins() {
        let km = StaticKeyManager::new(vec![identity("a")]);
        assert!(km
            .choose_server_identity(&[KeyFamily::Rsa, KeyFamily::Ec], &[], &[], None)
            .is_some());
        assert!(km
            .choose_server_identity(&[KeyFamily::Rsa], &[], &[], None)
            .is_none());
    }

    #[test]
    fn client_identity_needs_matching_authority() {
        let id = identity("a");
        let issuer = id.public_key().issuer.clone();
        let km = StaticKeyManager::new(vec![id]);

        assert!(km
            .choose_client_identity(&[KeyFamily::Ec], &[vec![0x30, 0x00]], &[])
            .is_none());
        assert!(km
            .choose_client_identity(&[KeyFamily::Ec], &[vec![0x30, 0x00], issuer], &[])
            .is_some());
    }

    #[test]
    fn certificate_schemes_rank_chains() {
        let sha256 = identity("a");
        let mut params = rcgen::CertificateParams::new(vec!["b".to_string()]);
        params.alg = &rcgen::PKCS_ECDSA_P384_SHA384;
        let cert = rcgen::Certificate::from_params(params).unwrap();
        let sha384 = Identity::new(
            &default_provider(),
            vec![cert.serialize_der().unwrap()],
            &cert.serialize_private_key_der(),
        )
        .unwrap();
        assert!(sha384.verifiable_with(&[SignatureScheme::ECDSA_SECP384R1_SHA384]));
        assert!(!sha384.verifiable_with(&[SignatureScheme::ECDSA_SECP256R1_SHA256]));
        assert!(sha384.verifiable_with(&[]));

        let km = StaticKeyManager::new(vec![sha256, sha384]);
        let families = [KeyFamily::Ec];
        let pick = |schemes: &[SignatureScheme]| {
            km.choose_server_identity(&families, &[], schemes, None)
                .unwrap()
                .leaf()
                .to_vec()
        };
        let first = pick(&[]);
        assert_eq!(pick(&[SignatureScheme::ECDSA_SECP256R1_SHA256]), first);
        assert_ne!(pick(&[SignatureScheme::ECDSA_SECP384R1_SHA384]), first);
        // Nothing verifiable, the first chain still goes out.
        assert_eq!(pick(&[SignatureScheme::ED25519]), first);
    }

    #[test]
    fn empty_chain_rejected() {
        let a = rcgen::generate_simple_self_signed(vec!["a".to_string()]).unwrap();
        let r = Identity::new(&default_provider(), vec![], &a.serialize_private_key_der());
        assert!(matches!(r, Err(Error::ConfigurationError(_))));
    }
}
