//! ec_point_formats (RFC 8422, section 5.1.2). Only uncompressed points.

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{list8, parse_exact, put_opaque8};
use crate::handshake::context::HandshakeContext;
use crate::types::{ExtensionType, HandshakeType, PROTOCOLS_TO_12};
use crate::Error;

const UNCOMPRESSED: u8 = 0;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::EcPointFormats,
        HandshakeType::ClientHello,
        PROTOCOLS_TO_12,
    )
    .produce(produce_request)
    .load(load),
    ExtensionHandler::new(
        ExtensionType::EcPointFormats,
        HandshakeType::ServerHello,
        PROTOCOLS_TO_12,
    )
    .produce(produce_ack)
    .load(load),
];

fn body() -> Vec<u8> {
    let mut out = Vec::new();
    put_opaque8(&mut out, &[UNCOMPRESSED]);
    out
}

fn produce_request(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let legacy: Vec<_> = ctx
        .active_versions
        .iter()
        .copied()
        .filter(|v| !v.use_tls13_plus())
        .collect();
    let offers_ecc = ctx
        .config
        .catalogs()
        .supported_suites(ctx.config.cipher_suites(), &legacy, ctx.config.constraints())
        .iter()
        .filter_map(|s| s.spec())
        .any(|s| s.kx.is_ecc());
    Ok(offers_ecc.then(body))
}

fn load(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let formats = parse_exact(data, |i| list8(i, nom::number::complete::be_u8))?;
    if !formats.contains(&UNCOMPRESSED) {
        return Err(Error::illegal("Peer does not accept uncompressed points"));
    }
    Ok(ExtensionSpec::EcPointFormats(formats))
}

fn produce_ack(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let ecc = ctx.suite_spec().map(|s| s.kx.is_ecc()).unwrap_or(false);
    Ok(ecc.then(body))
}
