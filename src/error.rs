use thiserror::Error;

use crate::types::{AlertDescription, ExtensionType, HandshakeType};

/// Errors raised by the handshake engine.
///
/// Every variant maps to exactly one alert via [`Error::alert()`]. The text
/// carried by a variant is for local diagnostics only and never reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed or truncated wire structure.
    #[error("Decode error ({0:?}): {1}")]
    DecodeError(AlertDescription, String),

    /// A message arrived that is not expected in the current state.
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// An extension arrived in a message that may not carry it, or was never requested.
    #[error("Unexpected extension {0:?} in {1:?}")]
    UnexpectedExtension(ExtensionType, HandshakeType),

    /// No mutually acceptable version, suite, group or scheme.
    #[error("Negotiation failure ({0:?}): {1}")]
    NegotiationFailure(AlertDescription, String),

    /// Peer offered an algorithm or key that fails the configured constraints.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Local misconfiguration detected before any bytes were sent.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Certificate could not be parsed or was rejected.
    #[error("Certificate error ({0:?}): {1}")]
    CertificateError(AlertDescription, String),

    /// A crypto provider operation failed.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// Engine invariant broken. A programming error, not a peer fault.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// The peer sent a fatal alert.
    #[error("Alert received: {0:?}")]
    AlertReceived(AlertDescription),

    /// DTLS flight retransmissions ran out without an answer.
    #[error("Handshake timed out")]
    Timeout,

    /// The handshake was already terminated.
    #[error("Closed")]
    Closed,
}

impl Error {
    /// The alert to send to the peer for this error.
    pub fn alert(&self) -> AlertDescription {
        match self {
            Error::DecodeError(alert, _) => *alert,
            Error::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            Error::UnexpectedExtension(_, _) => AlertDescription::UnsupportedExtension,
            Error::NegotiationFailure(alert, _) => *alert,
            Error::ConstraintViolation(_) => AlertDescription::InsufficientSecurity,
            Error::ConfigurationError(_) => AlertDescription::IllegalParameter,
            Error::CertificateError(alert, _) => *alert,
            Error::CryptoError(_) => AlertDescription::InternalError,
            Error::InternalError(_) => AlertDescription::InternalError,
            Error::AlertReceived(_) => AlertDescription::CloseNotify,
            Error::Timeout => AlertDescription::CloseNotify,
            Error::Closed => AlertDescription::CloseNotify,
        }
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Error::DecodeError(AlertDescription::DecodeError, msg.into())
    }

    pub(crate) fn illegal(msg: impl Into<String>) -> Self {
        Error::DecodeError(AlertDescription::IllegalParameter, msg.into())
    }

    pub(crate) fn handshake_failure(msg: impl Into<String>) -> Self {
        Error::NegotiationFailure(AlertDescription::HandshakeFailure, msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Error::InternalError(msg.into())
    }

    /// Whether the error should be answered with an alert to the peer.
    pub(crate) fn sends_alert(&self) -> bool {
        !matches!(
            self,
            Error::AlertReceived(_) | Error::Timeout | Error::Closed
        )
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::decode("Truncated structure"),
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::decode(format!(
                "Parse failed ({:?}) with {} bytes remaining",
                e.code,
                e.input.len()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_maps_to_one_alert() {
        assert_eq!(
            Error::decode("x").alert(),
            AlertDescription::DecodeError
        );
        assert_eq!(
            Error::UnexpectedMessage("x".into()).alert(),
            AlertDescription::UnexpectedMessage
        );
        assert_eq!(
            Error::ConstraintViolation("x".into()).alert(),
            AlertDescription::InsufficientSecurity
        );
        assert_eq!(
            Error::ConfigurationError("x".into()).alert(),
            AlertDescription::IllegalParameter
        );
        assert_eq!(
            Error::NegotiationFailure(AlertDescription::NoApplicationProtocol, "x".into()).alert(),
            AlertDescription::NoApplicationProtocol
        );
    }

    #[test]
    fn nom_errors_are_decode_errors() {
        let input: &[u8] = &[0x01];
        let r: nom::IResult<&[u8], u16> = nom::number::complete::be_u16(input);
        let err: Error = r.unwrap_err().into();
        assert_eq!(err.alert(), AlertDescription::DecodeError);
    }
}
