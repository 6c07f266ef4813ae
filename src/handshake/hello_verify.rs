//! HelloVerifyRequest, the DTLS 1.0 and 1.2 cookie exchange.
//!
//! The cookie is an HMAC over the hello fields that must not change between
//! the two hellos, keyed with a per handshake secret. Neither the request nor
//! the first hello enter the transcript.

use super::client_hello;
use super::context::{ct_eq, HandshakeContext};
use crate::codec::put_u16;
use crate::message::{ClientHello, HelloVerifyRequest};
use crate::types::{HashAlgorithm, HandshakeType, ProtocolVersion};
use crate::Error;

fn cookie_for(ctx: &HandshakeContext, hello: &ClientHello) -> Result<Vec<u8>, Error> {
    let mut data = Vec::with_capacity(128);
    hello.random.serialize(&mut data);
    hello.session_id.serialize(&mut data);
    for suite in &hello.cipher_suites {
        put_u16(&mut data, suite.as_u16());
    }
    ctx.provider()
        .hmac_provider
        .hmac(HashAlgorithm::SHA256, &ctx.cookie_secret, &data)
        .map_err(Error::CryptoError)
}

/// Server: whether `hello` must first prove it can receive at its address.
///
/// When it must, the cookie to send is left in the context.
pub(crate) fn cookie_required(
    ctx: &mut HandshakeContext,
    hello: &ClientHello,
    version: ProtocolVersion,
) -> Result<bool, Error> {
    if !ctx.is_dtls()
        || !ctx.config.cookie_exchange()
        || version.use_tls13_plus()
        || ctx.renegotiation.is_some()
    {
        return Ok(false);
    }
    let expected = cookie_for(ctx, hello)?;
    let received = hello.cookie.as_deref().unwrap_or_default();
    if ct_eq(&expected, received) {
        trace!("Cookie verified");
        return Ok(false);
    }
    if !received.is_empty() {
        debug!("Hello with a stale cookie");
    }
    ctx.cookie = Some(expected);
    Ok(true)
}

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let cookie = ctx
        .cookie
        .clone()
        .ok_or_else(|| Error::internal("No cookie to send"))?;
    let request = HelloVerifyRequest {
        server_version: ProtocolVersion::DTLS1_0,
        cookie,
    };
    let mut body = Vec::new();
    request.serialize(&mut body);
    ctx.send_handshake(HandshakeType::HelloVerifyRequest, &body)?;
    // Answered again when the first hello is retransmitted, never on a timer.
    ctx.io.final_flight();
    Ok(())
}

/// Client: repeat the hello with the cookie.
pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let request = HelloVerifyRequest::decode(ctx.inbound()?.body())?;
    if !request.server_version.is_dtls() {
        return Err(Error::illegal(format!(
            "HelloVerifyRequest for {}",
            request.server_version
        )));
    }
    if request.cookie.is_empty() {
        return Err(Error::illegal("Empty cookie"));
    }
    debug!("Server asked for a cookie of {} bytes", request.cookie.len());
    ctx.cookie = Some(request.cookie);
    ctx.consume_inbound()?;
    ctx.reset_transcript();
    ctx.queue(client_hello::produce);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;
    use crate::types::{CipherSuite, Random, SessionId};

    fn hello(cookie: Option<Vec<u8>>) -> ClientHello {
        ClientHello {
            legacy_version: ProtocolVersion::DTLS1_2,
            random: Random([7; 32]),
            session_id: SessionId::empty(),
            cookie,
            cipher_suites: vec![CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256],
            compression_methods: vec![0],
            extensions: Vec::new(),
        }
    }

    #[test]
    fn cookie_round_trip() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::DTLS1_2])
            .cookie_exchange(true)
            .build()
            .unwrap();
        let mut ctx = context(Role::Server, config);

        let first = hello(Some(Vec::new()));
        assert!(cookie_required(&mut ctx, &first, ProtocolVersion::DTLS1_2).unwrap());
        let cookie = ctx.cookie.clone().unwrap();
        assert_eq!(cookie.len(), 32);

        let second = hello(Some(cookie));
        assert!(!cookie_required(&mut ctx, &second, ProtocolVersion::DTLS1_2).unwrap());

        let mut other = hello(Some(vec![1; 32]));
        other.random = Random([8; 32]);
        assert!(cookie_required(&mut ctx, &other, ProtocolVersion::DTLS1_2).unwrap());
    }

    #[test]
    fn no_cookie_without_exchange() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::DTLS1_2])
            .cookie_exchange(false)
            .build()
            .unwrap();
        let mut ctx = context(Role::Server, config);
        assert!(!cookie_required(&mut ctx, &hello(None), ProtocolVersion::DTLS1_2).unwrap());
    }
}
