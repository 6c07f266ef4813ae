//! cookie (RFC 8446, section 4.2.2).

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{opaque16, parse_exact, put_opaque16};
use crate::handshake::context::{ct_eq, HandshakeContext};
use crate::types::{ExtensionType, HandshakeType, PROTOCOLS_OF_13};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(ExtensionType::Cookie, HandshakeType::ClientHello, PROTOCOLS_OF_13)
        .produce(produce_echo)
        .load(load_echo),
    ExtensionHandler::new(
        ExtensionType::Cookie,
        HandshakeType::HelloRetryRequest,
        PROTOCOLS_OF_13,
    )
    .produce(produce_retry)
    .load(load_retry)
    .trade(trade_retry),
];

fn encode(cookie: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    put_opaque16(&mut out, cookie);
    out
}

fn decode(data: &[u8]) -> Result<Vec<u8>, Error> {
    let cookie = parse_exact(data, opaque16)?;
    if cookie.is_empty() {
        return Err(Error::decode("Empty cookie"));
    }
    Ok(cookie.to_vec())
}

fn produce_echo(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    Ok(ctx.retry_cookie.as_deref().map(encode))
}

/// Server: a cookie is only valid if it is the one we sent.
fn load_echo(ctx: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let cookie = decode(data)?;
    match &ctx.retry_cookie {
        Some(sent) if ct_eq(sent, &cookie) => Ok(ExtensionSpec::Cookie(cookie)),
        _ => Err(Error::illegal("Cookie does not match")),
    }
}

fn produce_retry(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    Ok(ctx.retry_cookie.as_deref().map(encode))
}

fn load_retry(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    decode(data).map(ExtensionSpec::Cookie)
}

fn trade_retry(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if let Some(ExtensionSpec::Cookie(c)) =
        ctx.spec(HandshakeType::HelloRetryRequest, ExtensionType::Cookie)
    {
        ctx.retry_cookie = Some(c.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;

    const MESSAGE: &[u8] = &[0x00, 0x03, 0x01, 0x02, 0x03];

    #[test]
    fn server_checks_echo() {
        let mut ctx = context(Role::Server, Config::builder().build().unwrap());
        assert!(load_echo(&ctx, MESSAGE).is_err());
        ctx.retry_cookie = Some(vec![1, 2, 3]);
        assert_eq!(produce_retry(&mut ctx).unwrap().unwrap(), MESSAGE);
        assert!(load_echo(&ctx, MESSAGE).is_ok());
        assert!(load_echo(&ctx, &[0x00, 0x03, 0x01, 0x02, 0x04]).is_err());
    }

    #[test]
    fn empty_cookie_is_malformed() {
        let ctx = context(Role::Client, Config::builder().build().unwrap());
        assert!(load_retry(&ctx, &[0x00, 0x00]).is_err());
    }
}
