//! Hello extensions.
//!
//! Every extension registers one [`ExtensionHandler`] per message type it can
//! appear in. A handler has up to four hooks:
//!
//! * `produce` emits the extension body, or `None` to leave it out.
//! * `load` decodes a received body into an [`ExtensionSpec`]. It only reads
//!   the context; the spec goes into the extension map.
//! * `trade` runs once the whole message is loaded and the version is known,
//!   and applies the effects to the negotiated parameters.
//! * `absence` runs when the extension was not received. It only reads the
//!   context, so running it changes nothing but the outcome.
//!
//! Handlers apply to a range of versions. A handler outside the negotiated
//! version (or outside every enabled version while that is still open) is
//! treated as if it was not registered at all.

use once_cell::sync::Lazy;

use crate::handshake::context::{HandshakeContext, Role};
use crate::message::Extension;
use crate::types::{ExtensionType, HandshakeType, NamedGroup, ProtocolVersion, SignatureScheme};
use crate::Error;

mod alpn;
mod certificate_authorities;
mod cookie;
mod ec_point_formats;
mod extended_master_secret;
mod key_share;
mod max_fragment_length;
mod psk;
mod renegotiation_info;
mod server_name;
mod session_ticket;
mod signature_algorithms;
mod supported_groups;
mod supported_versions;

pub(crate) use certificate_authorities::peer_authorities;
pub(crate) use key_share::{client_shares, server_share, KeyShareEntry};
pub(crate) use psk::{client_allows_mode, offered_psks, server_selected};
pub(crate) use psk::{OfferedPsks, PSK_DHE_KE};
pub(crate) use session_ticket::presented_ticket;
pub(crate) use signature_algorithms::{local_schemes, peer_certificate_schemes};
pub(crate) use signature_algorithms::peer_signature_schemes;
pub(crate) use supported_groups::{local_groups, peer_groups};
pub(crate) use supported_versions::{client_versions, parse_selected_version};

/// Decoded body of one extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExtensionSpec {
    /// Host name of a ClientHello, `None` for the empty acknowledgement.
    ServerName(Option<String>),
    MaxFragmentLength(u16),
    SupportedGroups(Vec<NamedGroup>),
    EcPointFormats(Vec<u8>),
    SignatureAlgorithms(Vec<SignatureScheme>),
    SignatureAlgorithmsCert(Vec<SignatureScheme>),
    Alpn(Vec<Vec<u8>>),
    SupportedVersions(Vec<ProtocolVersion>),
    SelectedVersion(ProtocolVersion),
    KeyShares(Vec<KeyShareEntry>),
    KeyShare(KeyShareEntry),
    KeyShareRetry(NamedGroup),
    Cookie(Vec<u8>),
    RenegotiationInfo(Vec<u8>),
    ExtendedMasterSecret,
    SessionTicket(Vec<u8>),
    PskModes(Vec<u8>),
    OfferedPsks(OfferedPsks),
    SelectedPsk(u16),
    CertificateAuthorities(Vec<Vec<u8>>),
}

pub(crate) type ProduceFn = fn(&mut HandshakeContext) -> Result<Option<Vec<u8>>, Error>;
pub(crate) type LoadFn = fn(&HandshakeContext, &[u8]) -> Result<ExtensionSpec, Error>;
pub(crate) type TradeFn = fn(&mut HandshakeContext) -> Result<(), Error>;
pub(crate) type AbsenceFn = fn(&HandshakeContext) -> Result<(), Error>;

/// Hooks of one extension in one message type.
#[derive(Clone, Copy)]
pub(crate) struct ExtensionHandler {
    pub ext: ExtensionType,
    pub msg: HandshakeType,
    pub versions: &'static [ProtocolVersion],
    pub produce: Option<ProduceFn>,
    pub load: Option<LoadFn>,
    pub trade: Option<TradeFn>,
    pub absence: Option<AbsenceFn>,
}

impl ExtensionHandler {
    pub const fn new(
        ext: ExtensionType,
        msg: HandshakeType,
        versions: &'static [ProtocolVersion],
    ) -> Self {
        ExtensionHandler {
            ext,
            msg,
            versions,
            produce: None,
            load: None,
            trade: None,
            absence: None,
        }
    }

    pub const fn produce(mut self, f: ProduceFn) -> Self {
        self.produce = Some(f);
        self
    }

    pub const fn load(mut self, f: LoadFn) -> Self {
        self.load = Some(f);
        self
    }

    pub const fn trade(mut self, f: TradeFn) -> Self {
        self.trade = Some(f);
        self
    }

    pub const fn absence(mut self, f: AbsenceFn) -> Self {
        self.absence = Some(f);
        self
    }
}

impl std::fmt::Debug for ExtensionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExtensionHandler({:?} in {:?})", self.ext, self.msg)
    }
}

/// Every handler in production order. pre_shared_key must stay last.
static REGISTRY: Lazy<Vec<ExtensionHandler>> = Lazy::new(|| {
    let groups: &[&[ExtensionHandler]] = &[
        server_name::HANDLERS,
        max_fragment_length::HANDLERS,
        supported_groups::HANDLERS,
        ec_point_formats::HANDLERS,
        signature_algorithms::HANDLERS,
        alpn::HANDLERS,
        extended_master_secret::HANDLERS,
        session_ticket::HANDLERS,
        renegotiation_info::HANDLERS,
        supported_versions::HANDLERS,
        cookie::HANDLERS,
        psk::MODE_HANDLERS,
        certificate_authorities::HANDLERS,
        key_share::HANDLERS,
        psk::HANDLERS,
    ];
    groups.iter().flat_map(|g| g.iter().copied()).collect()
});

fn handlers(msg: HandshakeType) -> impl Iterator<Item = &'static ExtensionHandler> {
    REGISTRY.iter().filter(move |h| h.msg == msg)
}

fn handler(msg: HandshakeType, ext: ExtensionType) -> Option<&'static ExtensionHandler> {
    REGISTRY.iter().find(|h| h.msg == msg && h.ext == ext)
}

/// Messages a server sends in answer to the ClientHello extensions.
fn is_response(msg: HandshakeType) -> bool {
    matches!(
        msg,
        HandshakeType::ServerHello
            | HandshakeType::HelloRetryRequest
            | HandshakeType::EncryptedExtensions
    )
}

/// Extensions a server may send without the client asking.
fn unsolicited(msg: HandshakeType, ext: ExtensionType) -> bool {
    msg == HandshakeType::HelloRetryRequest && ext == ExtensionType::Cookie
}

/// A ClientHello offers for every enabled version, whatever got negotiated.
fn applies(ctx: &HandshakeContext, h: &ExtensionHandler) -> bool {
    if h.msg == HandshakeType::ClientHello && ctx.role == Role::Client {
        return ctx.active_versions.iter().any(|v| h.versions.contains(v));
    }
    ctx.applies_to(h.versions)
}

/// Run the producers of `msg`.
pub(crate) fn produce(ctx: &mut HandshakeContext, msg: HandshakeType) -> Result<Vec<Extension>, Error> {
    let mut out = Vec::new();
    for h in handlers(msg) {
        let Some(produce) = h.produce else {
            continue;
        };
        if !applies(ctx, h) {
            continue;
        }
        if is_response(msg)
            && !unsolicited(msg, h.ext)
            && !ctx.extensions.contains(HandshakeType::ClientHello, h.ext)
        {
            continue;
        }
        if let Some(data) = produce(ctx)? {
            trace!("Produced {:?} in {:?} ({} bytes)", h.ext, msg, data.len());
            out.push(Extension::new(h.ext, data));
        }
    }
    if msg == HandshakeType::ClientHello {
        ctx.offered = out.iter().map(|e| e.ext_type).collect();
    }
    Ok(out)
}

/// Decode received extensions of `msg` into the extension map.
pub(crate) fn load(
    ctx: &mut HandshakeContext,
    msg: HandshakeType,
    list: &[Extension],
) -> Result<(), Error> {
    for (i, e) in list.iter().enumerate() {
        if is_response(msg) && !unsolicited(msg, e.ext_type) && !ctx.offered.contains(&e.ext_type) {
            debug!("Peer sent {:?} in {:?} without being asked", e.ext_type, msg);
            return Err(Error::UnexpectedExtension(e.ext_type, msg));
        }
        let found = handler(msg, e.ext_type).filter(|h| h.load.is_some() && applies(ctx, h));
        let Some(h) = found else {
            if is_response(msg) {
                return Err(Error::UnexpectedExtension(e.ext_type, msg));
            }
            trace!("Ignoring {:?} in {:?}", e.ext_type, msg);
            continue;
        };
        if e.ext_type == ExtensionType::PreSharedKey
            && msg == HandshakeType::ClientHello
            && i + 1 != list.len()
        {
            return Err(Error::illegal("pre_shared_key is not the last extension"));
        }
        let Some(load) = h.load else {
            continue;
        };
        let spec = load(ctx, &e.data)?;
        trace!("Loaded {:?} from {:?}", e.ext_type, msg);
        ctx.extensions.insert(msg, e.ext_type, spec)?;
    }
    Ok(())
}

/// Run the absence handlers of `msg` for extensions that were not received.
pub(crate) fn check_absent(ctx: &HandshakeContext, msg: HandshakeType) -> Result<(), Error> {
    for h in handlers(msg) {
        let Some(absence) = h.absence else {
            continue;
        };
        if !applies(ctx, h) || ctx.extensions.contains(msg, h.ext) {
            continue;
        }
        absence(ctx)?;
    }
    Ok(())
}

/// Apply the loaded extensions of `msg` to the negotiated parameters.
pub(crate) fn trade(ctx: &mut HandshakeContext, msg: HandshakeType) -> Result<(), Error> {
    for h in handlers(msg) {
        let Some(trade) = h.trade else {
            continue;
        };
        if !ctx.applies_to(h.versions) || !ctx.extensions.contains(msg, h.ext) {
            continue;
        }
        trade(ctx)?;
    }
    Ok(())
}
