//! Cryptographic capabilities and the key derivation built on them.

mod identity;
pub mod key_schedule;
pub mod prf;
pub mod provider;
pub mod rust_crypto;
mod validation;

pub use identity::{Identity, KeyManager, StaticKeyManager};
pub use validation::{AcceptAll, CertificateValidator};

pub use provider::{ActiveKeyExchange, CryptoProvider, CryptoSafe, HashContext, HashProvider};
pub use provider::{CertificateInspector, FfdheParams, PublicKeyInfo};
pub use provider::{EphemeralRsaKey, KeyTransport, SupportedCipher};
pub use provider::{HkdfProvider, HmacProvider, KeyProvider};
pub use provider::{SecureRandom, SignatureVerifier, SigningKey, SupportedKxGroup};

// Shared types for provider implementations.
pub use crate::types::{HashAlgorithm, KeyFamily, NamedGroup, SignatureAlgorithm, SignatureScheme};
