//! Peer certificate validation hook.
//!
//! Path building and trust decisions belong to the caller. The engine hands the
//! peer chain over and only continues when the validator accepts it.

use std::fmt;

/// Decides whether a peer certificate chain is trusted.
pub trait CertificateValidator: Send + Sync + fmt::Debug {
    /// `chain` is leaf first. `server_name` is the name the client asked for,
    /// and `None` when validating a client certificate.
    fn validate(&self, chain: &[Vec<u8>], server_name: Option<&str>) -> Result<(), String>;
}

/// Accepts every chain. Only for tests and closed environments.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl CertificateValidator for AcceptAll {
    fn validate(&self, _chain: &[Vec<u8>], _server_name: Option<&str>) -> Result<(), String> {
        Ok(())
    }
}
