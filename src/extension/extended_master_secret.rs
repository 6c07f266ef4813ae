//! extended_master_secret (RFC 7627).

use super::{ExtensionHandler, ExtensionSpec};
use crate::handshake::context::HandshakeContext;
use crate::types::{ExtensionType, HandshakeType, PROTOCOLS_10_12, PROTOCOLS_10_13};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::ExtendedMasterSecret,
        HandshakeType::ClientHello,
        PROTOCOLS_10_13,
    )
    .produce(produce)
    .load(load)
    .trade(trade),
    ExtensionHandler::new(
        ExtensionType::ExtendedMasterSecret,
        HandshakeType::ServerHello,
        PROTOCOLS_10_12,
    )
    .produce(produce)
    .load(load)
    .trade(trade),
];

fn produce(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    if !ctx.config.with_extended_master_secret() {
        return Ok(None);
    }
    // The server only answers once it decided to use it.
    if !ctx.role.is_client() && !ctx.negotiated.extended_master_secret {
        return Ok(None);
    }
    Ok(Some(Vec::new()))
}

fn load(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    if !data.is_empty() {
        return Err(Error::decode("extended_master_secret must be empty"));
    }
    Ok(ExtensionSpec::ExtendedMasterSecret)
}

fn trade(ctx: &mut HandshakeContext) -> Result<(), Error> {
    // TLS 1.3 has its own key schedule, the extension is inert there.
    if ctx.is_tls13() {
        return Ok(());
    }
    let use_it = ctx.config.with_extended_master_secret();
    if use_it {
        debug!("Using extended master secret");
    }
    ctx.negotiated.extended_master_secret = use_it;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;
    use crate::types::ProtocolVersion;

    #[test]
    fn server_answers_after_trade() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_2])
            .build()
            .unwrap();
        let mut ctx = context(Role::Server, config);
        ctx.set_version(ProtocolVersion::TLS1_2).unwrap();
        assert_eq!(produce(&mut ctx).unwrap(), None);
        ctx.extensions
            .insert(
                HandshakeType::ClientHello,
                ExtensionType::ExtendedMasterSecret,
                load(&ctx, &[]).unwrap(),
            )
            .unwrap();
        trade(&mut ctx).unwrap();
        assert!(ctx.negotiated.extended_master_secret());
        assert_eq!(produce(&mut ctx).unwrap(), Some(vec![]));
    }

    #[test]
    fn body_must_be_empty() {
        let ctx = context(Role::Server, Config::builder().build().unwrap());
        assert!(load(&ctx, &[0]).is_err());
    }
}
