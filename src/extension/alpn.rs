//! application_layer_protocol_negotiation (RFC 7301).

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{list16, nested16, opaque8, parse_exact, put_opaque8};
use crate::handshake::context::HandshakeContext;
use crate::types::{AlertDescription, ExtensionType, HandshakeType};
use crate::types::{PROTOCOLS_OF_13, PROTOCOLS_TO_12, PROTOCOLS_TO_13};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::ApplicationLayerProtocolNegotiation,
        HandshakeType::ClientHello,
        PROTOCOLS_TO_13,
    )
    .produce(produce_request)
    .load(load_request)
    .trade(trade_request),
    ExtensionHandler::new(
        ExtensionType::ApplicationLayerProtocolNegotiation,
        HandshakeType::ServerHello,
        PROTOCOLS_TO_12,
    )
    .produce(produce_selection)
    .load(load_selection)
    .trade(trade_selection),
    ExtensionHandler::new(
        ExtensionType::ApplicationLayerProtocolNegotiation,
        HandshakeType::EncryptedExtensions,
        PROTOCOLS_OF_13,
    )
    .produce(produce_selection)
    .load(load_selection)
    .trade(trade_selection),
];

fn encode(protocols: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    nested16(&mut out, |out| {
        for p in protocols {
            put_opaque8(out, p);
        }
    });
    out
}

fn decode(data: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    let names = parse_exact(data, |i| list16(i, opaque8))?;
    if names.is_empty() || names.iter().any(|n| n.is_empty()) {
        return Err(Error::decode("Empty ALPN protocol list or name"));
    }
    Ok(names.into_iter().map(|n| n.to_vec()).collect())
}

fn produce_request(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let protocols: Vec<&[u8]> = ctx
        .config
        .alpn_protocols()
        .iter()
        .map(|p| p.as_slice())
        .collect();
    if protocols.is_empty() {
        return Ok(None);
    }
    Ok(Some(encode(&protocols)))
}

fn load_request(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    decode(data).map(ExtensionSpec::Alpn)
}

/// Server: first locally configured protocol the client also offered.
fn trade_request(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let local = ctx.config.alpn_protocols();
    if local.is_empty() {
        trace!("No local ALPN protocols, ignoring the client list");
        return Ok(());
    }
    let Some(ExtensionSpec::Alpn(offered)) = ctx.spec(
        HandshakeType::ClientHello,
        ExtensionType::ApplicationLayerProtocolNegotiation,
    ) else {
        return Ok(());
    };
    let Some(chosen) = local.iter().find(|p| offered.contains(p)).cloned() else {
        debug!("No ALPN protocol in common");
        return Err(Error::NegotiationFailure(
            AlertDescription::NoApplicationProtocol,
            "No application protocol in common".to_string(),
        ));
    };
    debug!("Selected ALPN protocol {}", String::from_utf8_lossy(&chosen));
    ctx.negotiated.alpn = Some(chosen);
    Ok(())
}

fn produce_selection(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    Ok(ctx.negotiated.alpn.as_deref().map(|p| encode(&[p])))
}

/// Client: exactly one protocol, and one we offered.
fn load_selection(ctx: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let names = decode(data)?;
    if names.len() != 1 {
        return Err(Error::illegal("ALPN selection must name one protocol"));
    }
    if !ctx.config.alpn_protocols().contains(&names[0]) {
        return Err(Error::illegal("Server selected a protocol that was not offered"));
    }
    Ok(ExtensionSpec::Alpn(names))
}

fn trade_selection(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let msg = ctx.server_extensions_message();
    if let Some(ExtensionSpec::Alpn(names)) =
        ctx.spec(msg, ExtensionType::ApplicationLayerProtocolNegotiation)
    {
        ctx.negotiated.alpn = names.first().cloned();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;
    use crate::types::ProtocolVersion;

    const OFFER: &[u8] = &[
        0x00, 0x0C, // list length
        0x02, b'h', b'2', //
        0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1',
    ];

    const SELECTION: &[u8] = &[
        0x00, 0x09, // list length
        0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1',
    ];

    fn server(protocols: &[&str], offer: &[u8]) -> HandshakeContext {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_2])
            .alpn_protocols(protocols)
            .build()
            .unwrap();
        let mut ctx = context(Role::Server, config);
        ctx.set_version(ProtocolVersion::TLS1_2).unwrap();
        let spec = load_request(&ctx, offer).unwrap();
        ctx.extensions
            .insert(
                HandshakeType::ClientHello,
                ExtensionType::ApplicationLayerProtocolNegotiation,
                spec,
            )
            .unwrap();
        ctx
    }

    #[test]
    fn client_offer() {
        let config = Config::builder().alpn_protocols(&["h2", "http/1.1"]).build().unwrap();
        let mut ctx = context(Role::Client, config);
        assert_eq!(produce_request(&mut ctx).unwrap().unwrap(), OFFER);
    }

    #[test]
    fn server_selects_common_protocol() {
        let mut ctx = server(&["http/1.1"], OFFER);
        trade_request(&mut ctx).unwrap();
        assert_eq!(ctx.negotiated.alpn(), Some(&b"http/1.1"[..]));
        assert_eq!(produce_selection(&mut ctx).unwrap().unwrap(), SELECTION);
    }

    #[test]
    fn no_common_protocol() {
        let mut ctx = server(&["bar"], &[0x00, 0x04, 0x03, b'f', b'o', b'o']);
        let err = trade_request(&mut ctx).unwrap_err();
        assert_eq!(err.alert(), AlertDescription::NoApplicationProtocol);
        assert_eq!(ctx.negotiated.alpn(), None);
    }

    #[test]
    fn client_checks_selection() {
        let config = Config::builder().alpn_protocols(&["h2", "http/1.1"]).build().unwrap();
        let ctx = context(Role::Client, config);
        assert_eq!(
            load_selection(&ctx, SELECTION).unwrap(),
            ExtensionSpec::Alpn(vec![b"http/1.1".to_vec()])
        );
        assert!(load_selection(&ctx, &[0x00, 0x04, 0x03, b's', b'p', b'y']).is_err());
        assert!(load_selection(&ctx, OFFER).is_err());
    }
}
