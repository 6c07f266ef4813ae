//! certificate_authorities (RFC 8446, section 4.2.4).

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{list16, nested16, opaque16, parse_exact, put_opaque16};
use crate::handshake::context::HandshakeContext;
use crate::types::{ExtensionType, HandshakeType, PROTOCOLS_OF_13};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::CertificateAuthorities,
        HandshakeType::ClientHello,
        PROTOCOLS_OF_13,
    )
    .produce(produce)
    .load(load),
    ExtensionHandler::new(
        ExtensionType::CertificateAuthorities,
        HandshakeType::CertificateRequest,
        PROTOCOLS_OF_13,
    )
    .produce(produce)
    .load(load),
];

fn produce(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let authorities = ctx.config.certificate_authorities();
    if authorities.is_empty() {
        return Ok(None);
    }
    let mut out = Vec::new();
    nested16(&mut out, |out| {
        for dn in authorities {
            put_opaque16(out, dn);
        }
    });
    Ok(Some(out))
}

fn load(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let names = parse_exact(data, |i| list16(i, opaque16))?;
    if names.is_empty() || names.iter().any(|n| n.is_empty()) {
        return Err(Error::decode("Empty certificate_authorities"));
    }
    Ok(ExtensionSpec::CertificateAuthorities(
        names.into_iter().map(|n| n.to_vec()).collect(),
    ))
}

/// Distinguished names the peer trusts, as received in `msg`.
pub(crate) fn peer_authorities(ctx: &HandshakeContext, msg: HandshakeType) -> Vec<Vec<u8>> {
    match ctx.spec(msg, ExtensionType::CertificateAuthorities) {
        Some(ExtensionSpec::CertificateAuthorities(a)) => a.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;

    const MESSAGE: &[u8] = &[
        0x00, 0x05, // list length
        0x00, 0x03, 0x30, 0x01, 0x00, // one name
    ];

    #[test]
    fn round_trip() {
        let config = Config::builder()
            .certificate_authorities(vec![vec![0x30, 0x01, 0x00]])
            .build()
            .unwrap();
        let mut ctx = context(Role::Server, config);
        assert_eq!(produce(&mut ctx).unwrap().unwrap(), MESSAGE);
        assert_eq!(
            load(&ctx, MESSAGE).unwrap(),
            ExtensionSpec::CertificateAuthorities(vec![vec![0x30, 0x01, 0x00]])
        );
        assert!(load(&ctx, &[0x00, 0x00]).is_err());
    }
}
