//! max_fragment_length (RFC 6066, section 4).
//!
//! A length that would not fit the configured packet size once the record
//! is protected is dropped without an alert. The handshake goes on with the
//! default fragment size.

use super::{ExtensionHandler, ExtensionSpec};
use crate::handshake::context::HandshakeContext;
use crate::handshake::io::{DTLS_RECORD_HEADER_LEN, TLS_RECORD_HEADER_LEN};
use crate::types::{CipherSuiteSpec, ExtensionType, HandshakeType};
use crate::types::{PROTOCOLS_OF_13, PROTOCOLS_TO_12, PROTOCOLS_TO_13};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::MaxFragmentLength,
        HandshakeType::ClientHello,
        PROTOCOLS_TO_13,
    )
    .produce(produce_request)
    .load(load_request)
    .trade(trade_request),
    ExtensionHandler::new(
        ExtensionType::MaxFragmentLength,
        HandshakeType::ServerHello,
        PROTOCOLS_TO_12,
    )
    .produce(produce_ack)
    .load(load_ack)
    .trade(trade_ack),
    ExtensionHandler::new(
        ExtensionType::MaxFragmentLength,
        HandshakeType::EncryptedExtensions,
        PROTOCOLS_OF_13,
    )
    .produce(produce_ack)
    .load(load_ack)
    .trade(trade_ack),
];

fn code(len: u16) -> Option<u8> {
    match len {
        512 => Some(1),
        1024 => Some(2),
        2048 => Some(3),
        4096 => Some(4),
        _ => None,
    }
}

fn length(code: u8) -> Option<u16> {
    match code {
        1 => Some(512),
        2 => Some(1024),
        3 => Some(2048),
        4 => Some(4096),
        _ => None,
    }
}

/// Growth of a record under `spec`, including the TLS 1.3 content type byte.
fn expansion(spec: &CipherSuiteSpec) -> usize {
    let e = spec.bulk.expansion(spec.mac.key_len());
    if spec.is_tls13() {
        e + 1
    } else {
        e
    }
}

/// Whether a full fragment still fits a packet once protected.
fn fits(ctx: &HandshakeContext, fragment: u16, expansion: usize) -> bool {
    let Some(max) = ctx.config.max_packet_size() else {
        return true;
    };
    let header = if ctx.is_dtls() {
        DTLS_RECORD_HEADER_LEN
    } else {
        TLS_RECORD_HEADER_LEN
    };
    fragment as usize + header + expansion <= max
}

fn decode(data: &[u8]) -> Result<u16, Error> {
    let [c] = data else {
        return Err(Error::decode("max_fragment_length must be one byte"));
    };
    length(*c).ok_or_else(|| Error::illegal(format!("Unknown max_fragment_length code {}", c)))
}

fn produce_request(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let Some(len) = ctx.config.max_fragment_length() else {
        return Ok(None);
    };
    let worst = ctx
        .config
        .cipher_suites()
        .iter()
        .filter_map(|s| s.spec())
        .map(expansion)
        .max()
        .unwrap_or(0);
    if !fits(ctx, len, worst) {
        debug!("max_fragment_length {} exceeds the packet size, not requested", len);
        return Ok(None);
    }
    Ok(code(len).map(|c| vec![c]))
}

fn load_request(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    decode(data).map(ExtensionSpec::MaxFragmentLength)
}

fn trade_request(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let Some(ExtensionSpec::MaxFragmentLength(len)) = ctx
        .spec(HandshakeType::ClientHello, ExtensionType::MaxFragmentLength)
        .cloned()
    else {
        return Ok(());
    };
    let spec = ctx.suite_spec()?;
    if !fits(ctx, len, expansion(spec)) {
        debug!("max_fragment_length {} exceeds the packet size, ignored", len);
        ctx.negotiated.max_fragment_length = None;
        return Ok(());
    }
    debug!("Negotiated max_fragment_length {}", len);
    ctx.negotiated.max_fragment_length = Some(len);
    Ok(())
}

fn produce_ack(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    Ok(ctx
        .negotiated
        .max_fragment_length
        .and_then(code)
        .map(|c| vec![c]))
}

fn load_ack(ctx: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let len = decode(data)?;
    if ctx.config.max_fragment_length() != Some(len) {
        return Err(Error::illegal("max_fragment_length differs from the request"));
    }
    Ok(ExtensionSpec::MaxFragmentLength(len))
}

fn trade_ack(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if let Some(ExtensionSpec::MaxFragmentLength(len)) =
        ctx.spec(ctx.server_extensions_message(), ExtensionType::MaxFragmentLength)
    {
        ctx.negotiated.max_fragment_length = Some(*len);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;
    use crate::types::{CipherSuite, ProtocolVersion};

    #[test]
    fn request_fits() {
        let config = Config::builder().max_fragment_length(1024).build().unwrap();
        let mut ctx = context(Role::Client, config);
        assert_eq!(produce_request(&mut ctx).unwrap(), Some(vec![2]));
    }

    #[test]
    fn oversized_request_is_dropped() {
        let config = Config::builder()
            .max_fragment_length(4096)
            .max_packet_size(4096)
            .build()
            .unwrap();
        let mut ctx = context(Role::Client, config);
        assert_eq!(produce_request(&mut ctx).unwrap(), None);
    }

    #[test]
    fn server_drops_length_that_overflows() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_2])
            .max_packet_size(4096)
            .build()
            .unwrap();
        let mut ctx = context(Role::Server, config);
        ctx.set_version(ProtocolVersion::TLS1_2).unwrap();
        ctx.set_suite(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256).unwrap();
        let spec = load_request(&ctx, &[4]).unwrap();
        ctx.extensions
            .insert(HandshakeType::ClientHello, ExtensionType::MaxFragmentLength, spec)
            .unwrap();

        trade_request(&mut ctx).unwrap();
        assert_eq!(ctx.negotiated.max_fragment_length(), None);
        assert_eq!(produce_ack(&mut ctx).unwrap(), None);
    }

    #[test]
    fn codes() {
        assert!(load_request(&context(Role::Server, Config::builder().build().unwrap()), &[5]).is_err());
        assert_eq!(decode(&[1]).unwrap(), 512);
        assert!(decode(&[1, 2]).is_err());
    }
}
