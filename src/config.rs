use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{default_groups, default_schemes, initialize_catalogs};
use crate::catalog::{AlgorithmConstraints, Catalogs, DisabledAlgorithms};
use crate::crypto::rust_crypto;
use crate::crypto::{AcceptAll, CertificateValidator, CryptoProvider, Identity, KeyManager};
use crate::crypto::StaticKeyManager;
use crate::session::SessionCache;
use crate::types::{CipherSuite, NamedGroup, ProtocolVersion, SignatureScheme};
use crate::Error;

/// Values the max_fragment_length extension can carry (RFC 6066 4).
pub const MAX_FRAGMENT_LENGTHS: [u16; 4] = [512, 1024, 2048, 4096];

/// Whether a server asks the client for a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    /// No CertificateRequest is sent.
    #[default]
    None,
    /// A CertificateRequest is sent, an empty client Certificate is accepted.
    Requested,
    /// A CertificateRequest is sent and the handshake fails without a client certificate.
    Required,
}

/// Handshake configuration, shared by any number of handshakes.
#[derive(Debug, Clone)]
pub struct Config {
    versions: Vec<ProtocolVersion>,
    cipher_suites: Vec<CipherSuite>,
    named_groups: Vec<NamedGroup>,
    signature_schemes: Vec<SignatureScheme>,
    alpn_protocols: Vec<Vec<u8>>,
    server_name: Option<String>,
    max_fragment_length: Option<u16>,
    max_packet_size: Option<usize>,
    client_auth: ClientAuth,
    certificate_authorities: Vec<Vec<u8>>,
    session_tickets: bool,
    session_cache: Arc<SessionCache>,
    allow_renegotiation: bool,
    delegated_tasks: bool,
    cookie_exchange: bool,
    with_extended_master_secret: bool,
    flight_start_rto: Duration,
    flight_retries: usize,
    rng_seed: Option<u64>,
    crypto_provider: CryptoProvider,
    constraints: Arc<dyn AlgorithmConstraints>,
    key_manager: Arc<dyn KeyManager>,
    certificate_validator: Arc<dyn CertificateValidator>,
    catalogs: Arc<Catalogs>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            versions: vec![ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2],
            cipher_suites: CipherSuite::default_suites(),
            named_groups: default_groups(),
            signature_schemes: default_schemes(),
            alpn_protocols: Vec::new(),
            server_name: None,
            max_fragment_length: None,
            max_packet_size: None,
            client_auth: ClientAuth::None,
            certificate_authorities: Vec::new(),
            session_tickets: true,
            session_cache_size: 256,
            session_lifetime: Duration::from_secs(24 * 3600),
            session_cache: None,
            allow_renegotiation: false,
            delegated_tasks: false,
            cookie_exchange: false,
            with_extended_master_secret: true,
            flight_start_rto: Duration::from_secs(1),
            flight_retries: 4,
            rng_seed: None,
            crypto_provider: None,
            constraints: None,
            key_manager: None,
            identities: Vec::new(),
            certificate_validator: None,
        }
    }

    /// Enabled protocol versions. Either all TLS or all DTLS.
    #[inline(always)]
    pub fn versions(&self) -> &[ProtocolVersion] {
        &self.versions
    }

    /// Whether this is a DTLS configuration.
    #[inline(always)]
    pub fn is_dtls(&self) -> bool {
        self.versions.iter().any(|v| v.is_dtls())
    }

    /// Enabled cipher suites in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Enabled named groups in preference order.
    #[inline(always)]
    pub fn named_groups(&self) -> &[NamedGroup] {
        &self.named_groups
    }

    /// Enabled signature schemes in preference order.
    #[inline(always)]
    pub fn signature_schemes(&self) -> &[SignatureScheme] {
        &self.signature_schemes
    }

    /// Application protocols. A client offers them in this order, a server
    /// picks the first of them the client offered.
    #[inline(always)]
    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        &self.alpn_protocols
    }

    /// Host name a client sends in server_name.
    #[inline(always)]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Fragment length a client requests.
    #[inline(always)]
    pub fn max_fragment_length(&self) -> Option<u16> {
        self.max_fragment_length
    }

    /// Largest protected record the transport accepts.
    ///
    /// A negotiated fragment length that would not fit after protection is
    /// dropped.
    #[inline(always)]
    pub fn max_packet_size(&self) -> Option<usize> {
        self.max_packet_size
    }

    /// For a server, whether and how to request a client certificate.
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// DER names of the authorities a server names in its CertificateRequest.
    #[inline(always)]
    pub fn certificate_authorities(&self) -> &[Vec<u8>] {
        &self.certificate_authorities
    }

    /// Whether session tickets are issued (server) or requested (client).
    #[inline(always)]
    pub fn session_tickets(&self) -> bool {
        self.session_tickets
    }

    /// Cache of resumable sessions.
    #[inline(always)]
    pub fn session_cache(&self) -> &Arc<SessionCache> {
        &self.session_cache
    }

    /// Whether a completed TLS 1.2 or earlier handshake may be renegotiated.
    #[inline(always)]
    pub fn allow_renegotiation(&self) -> bool {
        self.allow_renegotiation
    }

    /// Whether expensive messages are handed out as delegated tasks instead
    /// of being processed inline.
    #[inline(always)]
    pub fn delegated_tasks(&self) -> bool {
        self.delegated_tasks
    }

    /// For a server, whether to send a cookie before doing any work.
    ///
    /// DTLS uses HelloVerifyRequest, TLS 1.3 a HelloRetryRequest with cookie.
    #[inline(always)]
    pub fn cookie_exchange(&self) -> bool {
        self.cookie_exchange
    }

    /// Whether to use the Extended Master Secret extension (rfc7627).
    #[inline(always)]
    pub fn with_extended_master_secret(&self) -> bool {
        self.with_extended_master_secret
    }

    /// Time of first retry.
    ///
    /// Every flight restarts with this value.
    /// Doubled for every retry with a ±25% jitter.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Max number of retries per flight.
    #[inline(always)]
    pub fn flight_retries(&self) -> usize {
        self.flight_retries
    }

    /// Seed for the non-cryptographic randomness (jitter, ticket age add).
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Algorithm policy for both local and peer choices.
    #[inline(always)]
    pub fn constraints(&self) -> &dyn AlgorithmConstraints {
        self.constraints.as_ref()
    }

    /// Source of local identities.
    #[inline(always)]
    pub fn key_manager(&self) -> &dyn KeyManager {
        self.key_manager.as_ref()
    }

    /// Decides whether the peer chain is trusted.
    #[inline(always)]
    pub fn certificate_validator(&self) -> &dyn CertificateValidator {
        self.certificate_validator.as_ref()
    }

    /// Availability of every catalog entry under the crypto provider.
    #[inline(always)]
    pub fn catalogs(&self) -> &Arc<Catalogs> {
        &self.catalogs
    }

    /// Versions that survive the constraints and the provider, newest first.
    pub(crate) fn active_versions(&self) -> Vec<ProtocolVersion> {
        let mut v: Vec<_> = self
            .versions
            .iter()
            .copied()
            .filter(|v| self.constraints.permits_version(*v))
            .filter(|v| self.catalogs.version_available(*v))
            .collect();
        v.sort_by(|a, b| {
            if a.is_below(*b) {
                Ordering::Greater
            } else if b.is_below(*a) {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        });
        v
    }
}

/// Builder for handshake configuration.
pub struct ConfigBuilder {
    versions: Vec<ProtocolVersion>,
    cipher_suites: Vec<CipherSuite>,
    named_groups: Vec<NamedGroup>,
    signature_schemes: Vec<SignatureScheme>,
    alpn_protocols: Vec<Vec<u8>>,
    server_name: Option<String>,
    max_fragment_length: Option<u16>,
    max_packet_size: Option<usize>,
    client_auth: ClientAuth,
    certificate_authorities: Vec<Vec<u8>>,
    session_tickets: bool,
    session_cache_size: usize,
    session_lifetime: Duration,
    session_cache: Option<Arc<SessionCache>>,
    allow_renegotiation: bool,
    delegated_tasks: bool,
    cookie_exchange: bool,
    with_extended_master_secret: bool,
    flight_start_rto: Duration,
    flight_retries: usize,
    rng_seed: Option<u64>,
    crypto_provider: Option<CryptoProvider>,
    constraints: Option<Arc<dyn AlgorithmConstraints>>,
    key_manager: Option<Arc<dyn KeyManager>>,
    identities: Vec<Identity>,
    certificate_validator: Option<Arc<dyn CertificateValidator>>,
}

impl ConfigBuilder {
    /// Set the enabled protocol versions.
    ///
    /// Defaults to TLS 1.3 and TLS 1.2.
    pub fn versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.versions = versions.to_vec();
        self
    }

    /// Set the enabled cipher suites in preference order.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    /// Set the enabled named groups in preference order.
    pub fn named_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.named_groups = groups.to_vec();
        self
    }

    /// Set the enabled signature schemes in preference order.
    pub fn signature_schemes(mut self, schemes: &[SignatureScheme]) -> Self {
        self.signature_schemes = schemes.to_vec();
        self
    }

    /// Set the application protocols (ALPN).
    pub fn alpn_protocols<P: AsRef<[u8]>>(mut self, protocols: &[P]) -> Self {
        self.alpn_protocols = protocols.iter().map(|p| p.as_ref().to_vec()).collect();
        self
    }

    /// Set the host name a client sends in server_name.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Set the fragment length a client requests. One of 512, 1024, 2048 or 4096.
    pub fn max_fragment_length(mut self, len: u16) -> Self {
        self.max_fragment_length = Some(len);
        self
    }

    /// Set the largest protected record the transport accepts.
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = Some(size);
        self
    }

    /// Set whether a server requests a client certificate.
    ///
    /// Defaults to [`ClientAuth::None`].
    pub fn client_auth(mut self, auth: ClientAuth) -> Self {
        self.client_auth = auth;
        self
    }

    /// Authorities (DER distinguished names) to list in a CertificateRequest.
    pub fn certificate_authorities(mut self, authorities: Vec<Vec<u8>>) -> Self {
        self.certificate_authorities = authorities;
        self
    }

    /// Set whether session tickets are used.
    ///
    /// Defaults to true.
    pub fn session_tickets(mut self, enabled: bool) -> Self {
        self.session_tickets = enabled;
        self
    }

    /// Set the number of sessions kept for resumption. Zero disables resumption.
    ///
    /// Defaults to 256.
    pub fn session_cache_size(mut self, size: usize) -> Self {
        self.session_cache_size = size;
        self
    }

    /// Set how long a session may be resumed.
    ///
    /// Defaults to 24 hours.
    pub fn session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// Share an existing session cache, overriding size and lifetime.
    pub fn with_session_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.session_cache = Some(cache);
        self
    }

    /// Set whether renegotiation is allowed.
    ///
    /// Defaults to false.
    pub fn allow_renegotiation(mut self, allow: bool) -> Self {
        self.allow_renegotiation = allow;
        self
    }

    /// Set whether expensive messages are handed out as delegated tasks.
    ///
    /// Defaults to false.
    pub fn delegated_tasks(mut self, enabled: bool) -> Self {
        self.delegated_tasks = enabled;
        self
    }

    /// Set whether a server makes clients echo a cookie first.
    ///
    /// Defaults to false.
    pub fn cookie_exchange(mut self, enabled: bool) -> Self {
        self.cookie_exchange = enabled;
        self
    }

    /// Set whether to enable Extended Master Secret extension (rfc7627)
    ///
    /// Defaults to true.
    pub fn with_extended_master_secret(mut self, enabled: bool) -> Self {
        self.with_extended_master_secret = enabled;
        self
    }

    /// Set the time of first retry.
    ///
    /// Every flight restarts with this value.
    /// Doubled for every retry with a ±25% jitter.
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set the max number of retries per flight.
    ///
    /// Defaults to 4.
    pub fn flight_retries(mut self, retries: usize) -> Self {
        self.flight_retries = retries;
        self
    }

    /// Seed the non-cryptographic randomness, for reproducible tests.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, the installed default or the RustCrypto provider is used.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Set the algorithm constraints.
    ///
    /// Defaults to [`DisabledAlgorithms::default()`].
    pub fn with_constraints(mut self, constraints: Arc<dyn AlgorithmConstraints>) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Set the source of local identities.
    pub fn with_key_manager(mut self, key_manager: Arc<dyn KeyManager>) -> Self {
        self.key_manager = Some(key_manager);
        self
    }

    /// Add a local identity. Ignored when a key manager is set.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    /// Set the peer certificate validator.
    ///
    /// Defaults to [`AcceptAll`], leaving the trust decision to the caller
    /// that reads the peer chain after the handshake.
    pub fn with_certificate_validator(mut self, validator: Arc<dyn CertificateValidator>) -> Self {
        self.certificate_validator = Some(validator);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigurationError` when the settings cannot work
    /// together. Nothing has been sent at this point.
    ///
    /// The crypto provider is selected in the following priority order:
    /// 1. Explicit provider set via `with_crypto_provider()`
    /// 2. Default provider installed via `CryptoProvider::install_default()`
    /// 3. The RustCrypto provider
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(rust_crypto::default_provider);

        // Always validate the crypto provider
        crypto_provider.validate()?;

        validate_versions(&self.versions)?;
        validate_alpn(&self.alpn_protocols)?;
        if let Some(len) = self.max_fragment_length {
            if !MAX_FRAGMENT_LENGTHS.contains(&len) {
                return Err(Error::ConfigurationError(format!(
                    "max_fragment_length {} is not one of {:?}",
                    len, MAX_FRAGMENT_LENGTHS
                )));
            }
        }

        let catalogs = initialize_catalogs(&crypto_provider);
        let constraints: Arc<dyn AlgorithmConstraints> = self
            .constraints
            .unwrap_or_else(|| Arc::new(DisabledAlgorithms::default()));

        let permitted: Vec<ProtocolVersion> = self
            .versions
            .iter()
            .copied()
            .filter(|v| constraints.permits_version(*v) && catalogs.version_available(*v))
            .collect();
        if permitted.is_empty() {
            return Err(Error::ConfigurationError(
                "No enabled version is permitted".to_string(),
            ));
        }

        let usable =
            catalogs.supported_suites(&self.cipher_suites, &permitted, constraints.as_ref());
        if usable.is_empty() {
            return Err(Error::ConfigurationError(
                "No cipher suite is usable with the enabled versions".to_string(),
            ));
        }

        let key_manager: Arc<dyn KeyManager> = match self.key_manager {
            Some(km) => km,
            None => Arc::new(StaticKeyManager::new(self.identities)),
        };

        let session_cache = self.session_cache.unwrap_or_else(|| {
            Arc::new(SessionCache::new(
                self.session_cache_size,
                self.session_lifetime,
            ))
        });

        Ok(Config {
            versions: self.versions,
            cipher_suites: self.cipher_suites,
            named_groups: self.named_groups,
            signature_schemes: self.signature_schemes,
            alpn_protocols: self.alpn_protocols,
            server_name: self.server_name,
            max_fragment_length: self.max_fragment_length,
            max_packet_size: self.max_packet_size,
            client_auth: self.client_auth,
            certificate_authorities: self.certificate_authorities,
            session_tickets: self.session_tickets,
            session_cache,
            allow_renegotiation: self.allow_renegotiation,
            delegated_tasks: self.delegated_tasks,
            cookie_exchange: self.cookie_exchange,
            with_extended_master_secret: self.with_extended_master_secret,
            flight_start_rto: self.flight_start_rto,
            flight_retries: self.flight_retries,
            rng_seed: self.rng_seed,
            crypto_provider,
            constraints,
            key_manager,
            certificate_validator: self
                .certificate_validator
                .unwrap_or_else(|| Arc::new(AcceptAll)),
            catalogs,
        })
    }
}

fn validate_versions(versions: &[ProtocolVersion]) -> Result<(), Error> {
    if versions.is_empty() {
        return Err(Error::ConfigurationError("No protocol version enabled".to_string()));
    }
    if let Some(v) = versions.iter().find(|v| !v.is_known()) {
        return Err(Error::ConfigurationError(format!("Unknown protocol version {}", v)));
    }
    let dtls = versions.iter().filter(|v| v.is_dtls()).count();
    if dtls != 0 && dtls != versions.len() {
        return Err(Error::ConfigurationError(
            "TLS and DTLS versions cannot be mixed".to_string(),
        ));
    }
    Ok(())
}

fn validate_alpn(protocols: &[Vec<u8>]) -> Result<(), Error> {
    for p in protocols {
        if p.is_empty() {
            return Err(Error::ConfigurationError("Empty ALPN protocol name".to_string()));
        }
        if p.len() > 255 {
            return Err(Error::ConfigurationError(format!(
                "ALPN protocol name of {} bytes exceeds 255",
                p.len()
            )));
        }
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
