//! server_name (RFC 6066, section 3).

use nom::number::complete::be_u8;
use nom::IResult;

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{list16, nested16, opaque16, parse_exact, put_opaque16, put_u8};
use crate::handshake::context::HandshakeContext;
use crate::types::{ExtensionType, HandshakeType, PROTOCOLS_OF_13, PROTOCOLS_TO_12, PROTOCOLS_TO_13};
use crate::Error;

const HOST_NAME: u8 = 0;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(ExtensionType::ServerName, HandshakeType::ClientHello, PROTOCOLS_TO_13)
        .produce(produce_request)
        .load(load_request)
        .trade(trade_request),
    ExtensionHandler::new(ExtensionType::ServerName, HandshakeType::ServerHello, PROTOCOLS_TO_12)
        .produce(produce_ack)
        .load(load_ack)
        .trade(trade_ack),
    ExtensionHandler::new(
        ExtensionType::ServerName,
        HandshakeType::EncryptedExtensions,
        PROTOCOLS_OF_13,
    )
    .produce(produce_ack)
    .load(load_ack)
    .trade(trade_ack),
];

fn produce_request(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let Some(name) = ctx.config.server_name() else {
        return Ok(None);
    };
    // Literal addresses are not sent.
    if name.parse::<std::net::IpAddr>().is_ok() {
        return Ok(None);
    }
    let mut out = Vec::new();
    nested16(&mut out, |out| {
        put_u8(out, HOST_NAME);
        put_opaque16(out, name.as_bytes());
    });
    Ok(Some(out))
}

fn entry(input: &[u8]) -> IResult<&[u8], (u8, &[u8])> {
    let (input, name_type) = be_u8(input)?;
    let (input, name) = opaque16(input)?;
    Ok((input, (name_type, name)))
}

fn load_request(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let entries = parse_exact(data, |i| list16(i, entry))?;
    if entries.is_empty() {
        return Err(Error::decode("Empty server_name list"));
    }
    let mut host = None;
    for (name_type, name) in entries {
        if name_type != HOST_NAME {
            continue;
        }
        if host.is_some() {
            return Err(Error::illegal("Two host names in server_name"));
        }
        let name = std::str::from_utf8(name)
            .ok()
            .filter(|n| !n.is_empty() && n.is_ascii() && !n.ends_with('.'))
            .ok_or_else(|| Error::illegal("Malformed host name"))?;
        host = Some(name.to_ascii_lowercase());
    }
    Ok(ExtensionSpec::ServerName(host))
}

fn trade_request(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if let Some(ExtensionSpec::ServerName(Some(name))) =
        ctx.spec(HandshakeType::ClientHello, ExtensionType::ServerName)
    {
        debug!("Client asked for server name {}", name);
        ctx.negotiated.server_name = Some(name.clone());
    }
    Ok(())
}

fn produce_ack(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let requested = matches!(
        ctx.spec(HandshakeType::ClientHello, ExtensionType::ServerName),
        Some(ExtensionSpec::ServerName(Some(_)))
    );
    // A resumed TLS 1.2 session keeps the name it was created with.
    if !requested || (ctx.negotiated.resumed && !ctx.is_tls13()) {
        return Ok(None);
    }
    Ok(Some(Vec::new()))
}

fn load_ack(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    if !data.is_empty() {
        return Err(Error::decode("server_name acknowledgement must be empty"));
    }
    Ok(ExtensionSpec::ServerName(None))
}

fn trade_ack(ctx: &mut HandshakeContext) -> Result<(), Error> {
    ctx.negotiated.server_name = ctx.config.server_name().map(|s| s.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;

    const MESSAGE: &[u8] = &[
        0x00, 0x0E, // list length
        0x00, // host_name
        0x00, 0x0B, // name length
        b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c', b'o', b'm',
    ];

    #[test]
    fn produce_and_load() {
        let config = Config::builder().server_name("example.com").build().unwrap();
        let mut ctx = context(Role::Client, config);
        let data = produce_request(&mut ctx).unwrap().unwrap();
        assert_eq!(data, MESSAGE);

        let spec = load_request(&ctx, MESSAGE).unwrap();
        assert_eq!(spec, ExtensionSpec::ServerName(Some("example.com".to_string())));
    }

    #[test]
    fn address_is_not_sent() {
        let config = Config::builder().server_name("192.0.2.1").build().unwrap();
        let mut ctx = context(Role::Client, config);
        assert_eq!(produce_request(&mut ctx).unwrap(), None);
    }

    #[test]
    fn length_must_be_exact() {
        let config = Config::builder().build().unwrap();
        let ctx = context(Role::Server, config);
        assert!(load_request(&ctx, &MESSAGE[..MESSAGE.len() - 1]).is_err());
        let mut long = MESSAGE.to_vec();
        long.push(0);
        assert!(load_request(&ctx, &long).is_err());
        assert!(load_ack(&ctx, &[0]).is_err());
    }
}
