//! Protocol identifiers shared by every part of the engine.

mod algorithm;
pub use algorithm::{ClientCertificateType, HashAlgorithm, KeyFamily};
pub use algorithm::{NamedGroup, SignatureAlgorithm, SignatureScheme};

mod alert;
pub use alert::{AlertDescription, AlertLevel};

mod cipher_suite;
pub use cipher_suite::{BulkCipher, CipherSuite, CipherSuiteSpec};
pub use cipher_suite::{KeyExchangeAlgorithm, MacAlgorithm};

mod ext;
pub use ext::ExtensionType;

mod handshake;
pub use handshake::HandshakeType;

mod random;
pub use random::{Random, SessionId};
pub use random::{DOWNGRADE_TLS11, DOWNGRADE_TLS12, HELLO_RETRY_REQUEST_RANDOM};

mod version;
pub use version::ProtocolVersion;
pub use version::{PROTOCOLS_10_12, PROTOCOLS_10_13, PROTOCOLS_12_13};
pub use version::{PROTOCOLS_OF_12, PROTOCOLS_OF_13, PROTOCOLS_OF_30};
pub use version::{PROTOCOLS_TO_11, PROTOCOLS_TO_12, PROTOCOLS_TO_13};
