//! What the handshake hands back to its caller.
//!
//! The engine never touches the transport. Everything it wants sent, and
//! every key the record layer must install, is queued as an [`Output`] and
//! drained with [`Handshaker::poll_output`](crate::Handshaker::poll_output).

use std::fmt;

use zeroize::Zeroizing;

use crate::crypto::prf::KeyBlock;
use crate::types::{AlertDescription, CipherSuite};

/// Which TLS 1.3 traffic keys a [`Secrets::Traffic`] event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficStage {
    Handshake,
    Application,
}

/// Direction of a traffic key update, from the local point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// Key material for the record layer.
#[derive(Clone, PartialEq, Eq)]
pub enum Secrets {
    /// TLS 1.2 and earlier. Installed at the ChangeCipherSpec of each side.
    KeyBlock { suite: CipherSuite, keys: KeyBlock },
    /// TLS 1.3 traffic secrets of both directions.
    Traffic {
        stage: TrafficStage,
        suite: CipherSuite,
        client: Zeroizing<Vec<u8>>,
        server: Zeroizing<Vec<u8>>,
    },
    /// Next generation traffic secret after a KeyUpdate.
    Updated {
        direction: Direction,
        secret: Zeroizing<Vec<u8>>,
    },
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secrets::KeyBlock { suite, .. } => write!(f, "KeyBlock({})", suite),
            Secrets::Traffic { stage, suite, .. } => write!(f, "Traffic({:?}, {})", stage, suite),
            Secrets::Updated { direction, .. } => write!(f, "Updated({:?})", direction),
        }
    }
}

/// One item of handshake output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A handshake message, header included, for the record layer to send.
    ///
    /// DTLS messages larger than the configured packet size arrive here as
    /// several fragments, each with its own 12 byte header.
    Handshake(Vec<u8>),
    /// Send a ChangeCipherSpec record.
    ChangeCipherSpec,
    /// Send an alert. Fatal unless the description is a warning by nature
    /// (`no_renegotiation`, `close_notify`).
    Alert(AlertDescription),
    /// Install new keys.
    Secrets(Secrets),
    /// Both Finished messages are verified.
    Complete,
}
