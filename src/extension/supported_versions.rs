//! supported_versions (RFC 8446, section 4.2.1).

use nom::number::complete::be_u16;

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{list8, nested8, parse_exact};
use crate::handshake::context::HandshakeContext;
use crate::types::{ExtensionType, HandshakeType, ProtocolVersion, PROTOCOLS_OF_13};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::SupportedVersions,
        HandshakeType::ClientHello,
        PROTOCOLS_OF_13,
    )
    .produce(produce_list)
    .load(load_list),
    ExtensionHandler::new(
        ExtensionType::SupportedVersions,
        HandshakeType::ServerHello,
        PROTOCOLS_OF_13,
    )
    .produce(produce_selected)
    .load(load_selected),
    ExtensionHandler::new(
        ExtensionType::SupportedVersions,
        HandshakeType::HelloRetryRequest,
        PROTOCOLS_OF_13,
    )
    .produce(produce_selected)
    .load(load_selected),
];

fn produce_list(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let mut out = Vec::new();
    nested8(&mut out, |out| {
        for v in &ctx.active_versions {
            v.serialize(out);
        }
    });
    Ok(Some(out))
}

fn load_list(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let versions = parse_exact(data, |i| list8(i, ProtocolVersion::parse))?;
    if versions.is_empty() {
        return Err(Error::decode("Empty supported_versions"));
    }
    Ok(ExtensionSpec::SupportedVersions(versions))
}

fn produce_selected(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let mut out = Vec::new();
    ctx.version()?.serialize(&mut out);
    Ok(Some(out))
}

/// The version a ServerHello selects, read before the rest of the
/// extensions can be loaded.
pub(crate) fn parse_selected_version(data: &[u8]) -> Result<ProtocolVersion, Error> {
    let v = parse_exact(data, be_u16)?;
    Ok(ProtocolVersion::from_u16(v))
}

fn load_selected(ctx: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let v = parse_selected_version(data)?;
    if !v.use_tls13_plus() || !ctx.active_versions.contains(&v) {
        return Err(Error::illegal(format!("Server selected {} which was not offered", v)));
    }
    Ok(ExtensionSpec::SelectedVersion(v))
}

/// Versions the client listed, if it used the extension.
pub(crate) fn client_versions(ctx: &HandshakeContext) -> Option<&[ProtocolVersion]> {
    match ctx.spec(HandshakeType::ClientHello, ExtensionType::SupportedVersions) {
        Some(ExtensionSpec::SupportedVersions(v)) => Some(v),
        _ => None,
    }
}
