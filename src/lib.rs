//! tlshake
//!
//! A Sans-IO TLS and DTLS handshake engine covering SSL 3.0 to TLS 1.3 and
//! DTLS 1.0 to 1.3.
//!
//! The engine negotiates the protocol version, cipher suite, key exchange and
//! extensions, authenticates both sides and derives the traffic secrets. It
//! does not protect records: the keys it derives are handed to the caller's
//! record layer as [`Output::Secrets`], together with the handshake messages
//! to send.
//!
//! A connection is driven through a [`Handshaker`]. Feed it what the record
//! layer receives with [`Handshaker::handle_handshake`],
//! [`Handshaker::handle_change_cipher_spec`] and [`Handshaker::handle_alert`],
//! and drain [`Handshaker::poll_output`] after each call. DTLS callers also
//! drive the retransmission timer with [`Handshaker::poll_timeout`] and
//! [`Handshaker::handle_timeout`].
//!
//! Cryptography comes from a [`crypto::CryptoProvider`]. The default one is
//! built on the RustCrypto crates.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

pub(crate) mod codec;

mod error;
pub use error::Error;

pub mod types;

pub mod message;

pub mod catalog;

pub mod crypto;

mod transcript;

mod session;
pub use session::{Session, SessionCache};

mod config;
pub use config::{ClientAuth, Config, ConfigBuilder, MAX_FRAGMENT_LENGTHS};

mod rng;

mod timer;

mod event;
pub use event::{Direction, Output, Secrets, TrafficStage};

mod kx;

mod extension;

mod handshake;
pub use handshake::{DelegatedTask, Handshaker, Negotiated, Phase, Role};
