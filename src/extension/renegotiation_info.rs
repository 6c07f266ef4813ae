//! renegotiation_info (RFC 5746).

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{opaque8, parse_exact, put_opaque8};
use crate::handshake::context::{ct_eq, HandshakeContext};
use crate::types::{ExtensionType, HandshakeType, ProtocolVersion, PROTOCOLS_TO_12};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::RenegotiationInfo,
        HandshakeType::ClientHello,
        PROTOCOLS_TO_12,
    )
    .produce(produce_request)
    .load(load)
    .trade(trade_request)
    .absence(absent_in_client_hello),
    ExtensionHandler::new(
        ExtensionType::RenegotiationInfo,
        HandshakeType::ServerHello,
        PROTOCOLS_TO_12,
    )
    .produce(produce_ack)
    .load(load)
    .trade(trade_ack)
    .absence(absent_in_server_hello),
];

fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    put_opaque8(&mut out, data);
    out
}

fn load(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let info = parse_exact(data, opaque8)?;
    Ok(ExtensionSpec::RenegotiationInfo(info.to_vec()))
}

fn received(ctx: &HandshakeContext, msg: HandshakeType) -> &[u8] {
    match ctx.spec(msg, ExtensionType::RenegotiationInfo) {
        Some(ExtensionSpec::RenegotiationInfo(d)) => d,
        _ => &[],
    }
}

/// Client: empty on the first handshake, our last verify data after.
///
/// An SSL 3.0 only client signals with the SCSV suite instead.
fn produce_request(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    if ctx.active_versions.iter().all(|v| *v == ProtocolVersion::SSL3_0) {
        return Ok(None);
    }
    let data = match &ctx.renegotiation {
        Some(prev) => encode(&prev.client),
        None => encode(&[]),
    };
    Ok(Some(data))
}

fn trade_request(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let info = received(ctx, HandshakeType::ClientHello);
    let ok = match &ctx.renegotiation {
        None => info.is_empty(),
        Some(prev) => ct_eq(info, &prev.client),
    };
    if !ok {
        return Err(Error::handshake_failure("renegotiation_info does not match"));
    }
    ctx.negotiated.secure_renegotiation = true;
    Ok(())
}

/// Only secure connections renegotiate, so a renegotiating hello must carry
/// the extension. The SCSV of an initial hello is checked where the cipher
/// suites are read.
fn absent_in_client_hello(ctx: &HandshakeContext) -> Result<(), Error> {
    if ctx.renegotiation.is_some() {
        return Err(Error::handshake_failure(
            "Secure renegotiation without renegotiation_info",
        ));
    }
    Ok(())
}

fn produce_ack(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    if !ctx.negotiated.secure_renegotiation {
        return Ok(None);
    }
    let data = match &ctx.renegotiation {
        Some(prev) => {
            let mut both = prev.client.clone();
            both.extend_from_slice(&prev.server);
            encode(&both)
        }
        None => encode(&[]),
    };
    Ok(Some(data))
}

fn trade_ack(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let info = received(ctx, HandshakeType::ServerHello);
    let ok = match &ctx.renegotiation {
        None => info.is_empty(),
        Some(prev) => {
            let mut both = prev.client.clone();
            both.extend_from_slice(&prev.server);
            ct_eq(info, &both)
        }
    };
    if !ok {
        return Err(Error::handshake_failure("renegotiation_info does not match"));
    }
    ctx.negotiated.secure_renegotiation = true;
    Ok(())
}

fn absent_in_server_hello(ctx: &HandshakeContext) -> Result<(), Error> {
    if ctx.renegotiation.is_some() {
        return Err(Error::handshake_failure(
            "Server dropped renegotiation_info on renegotiation",
        ));
    }
    Ok(())
}
