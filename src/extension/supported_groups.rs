//! supported_groups (RFC 8422 section 5.1.1, RFC 7919, RFC 8446 section 4.2.7).

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{list16, nested16, parse_exact};
use crate::handshake::context::HandshakeContext;
use crate::types::{ExtensionType, HandshakeType, NamedGroup, PROTOCOLS_OF_13, PROTOCOLS_TO_13};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::SupportedGroups,
        HandshakeType::ClientHello,
        PROTOCOLS_TO_13,
    )
    .produce(produce)
    .load(load)
    .absence(absent),
    // Informational in TLS 1.3. The client keeps it but does not act on it.
    ExtensionHandler::new(
        ExtensionType::SupportedGroups,
        HandshakeType::EncryptedExtensions,
        PROTOCOLS_OF_13,
    )
    .load(load),
];

/// Groups the local side offers, in preference order.
pub(crate) fn local_groups(ctx: &HandshakeContext) -> Vec<NamedGroup> {
    let versions = match ctx.negotiated.version {
        Some(v) => vec![v],
        None => ctx.active_versions.clone(),
    };
    ctx.config.catalogs().supported_groups(
        ctx.config.named_groups(),
        &versions,
        ctx.config.constraints(),
    )
}

fn produce(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let groups = ctx.config.catalogs().supported_groups(
        ctx.config.named_groups(),
        &ctx.active_versions,
        ctx.config.constraints(),
    );
    if groups.is_empty() {
        return Ok(None);
    }
    let mut out = Vec::new();
    nested16(&mut out, |out| {
        for g in &groups {
            g.serialize(out);
        }
    });
    Ok(Some(out))
}

fn load(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let groups = parse_exact(data, |i| list16(i, NamedGroup::parse))?;
    if groups.is_empty() {
        return Err(Error::decode("Empty supported_groups"));
    }
    Ok(ExtensionSpec::SupportedGroups(groups))
}

/// TLS 1.3 key agreement needs the list. Earlier versions fall back to
/// server defaults.
fn absent(ctx: &HandshakeContext) -> Result<(), Error> {
    if ctx.is_tls13() && ctx.extensions.contains(HandshakeType::ClientHello, ExtensionType::KeyShare) {
        return Err(Error::NegotiationFailure(
            crate::types::AlertDescription::MissingExtension,
            "key_share without supported_groups".to_string(),
        ));
    }
    Ok(())
}

/// Groups the client listed, if it listed any.
pub(crate) fn peer_groups(ctx: &HandshakeContext) -> Option<&[NamedGroup]> {
    match ctx.spec(HandshakeType::ClientHello, ExtensionType::SupportedGroups) {
        Some(ExtensionSpec::SupportedGroups(g)) => Some(g),
        _ => None,
    }
}
