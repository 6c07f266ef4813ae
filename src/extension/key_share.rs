//! key_share (RFC 8446, section 4.2.8).

use nom::IResult;

use super::supported_groups::local_groups;
use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{list16, opaque16, parse_exact, put_opaque16};
use crate::handshake::context::HandshakeContext;
use crate::kx::Possession;
use crate::types::{ExtensionType, HandshakeType, NamedGroup, PROTOCOLS_OF_13};
use crate::Error;

/// One offered or selected key share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyShareEntry {
    pub group: NamedGroup,
    pub key: Vec<u8>,
}

impl KeyShareEntry {
    fn parse(input: &[u8]) -> IResult<&[u8], KeyShareEntry> {
        let (input, group) = NamedGroup::parse(input)?;
        let (input, key) = opaque16(input)?;
        Ok((
            input,
            KeyShareEntry {
                group,
                key: key.to_vec(),
            },
        ))
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        self.group.serialize(out);
        put_opaque16(out, &self.key);
    }
}

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(ExtensionType::KeyShare, HandshakeType::ClientHello, PROTOCOLS_OF_13)
        .produce(produce_shares)
        .load(load_shares),
    ExtensionHandler::new(ExtensionType::KeyShare, HandshakeType::ServerHello, PROTOCOLS_OF_13)
        .produce(produce_share)
        .load(load_share),
    ExtensionHandler::new(
        ExtensionType::KeyShare,
        HandshakeType::HelloRetryRequest,
        PROTOCOLS_OF_13,
    )
    .produce(produce_retry)
    .load(load_retry)
    .trade(trade_retry),
];

/// The ephemeral key exchange held for this handshake.
fn ephemeral(ctx: &HandshakeContext) -> Option<(NamedGroup, &[u8])> {
    ctx.possessions.iter().find_map(|p| match p {
        Possession::Ephemeral(kx) => Some((kx.group(), kx.pub_key())),
        _ => None,
    })
}

/// Client: one share, for the group a HelloRetryRequest named or else the
/// most preferred TLS 1.3 group.
fn produce_shares(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let group = match ctx.retry_group {
        Some(g) => g,
        None => match local_groups(ctx).first() {
            Some(g) => *g,
            None => return Ok(None),
        },
    };
    let kx_group = ctx
        .provider()
        .kx_group(group)
        .ok_or_else(|| Error::internal(format!("No provider for {:?}", group)))?;
    let kx = kx_group.start_exchange().map_err(Error::CryptoError)?;
    let entry = KeyShareEntry {
        group,
        key: kx.pub_key().to_vec(),
    };
    ctx.possessions.retain(|p| !matches!(p, Possession::Ephemeral(_)));
    ctx.possessions.push(Possession::Ephemeral(kx));
    trace!("Offering key share for {:?}", group);

    let mut out = Vec::new();
    crate::codec::nested16(&mut out, |out| entry.serialize(out));
    Ok(Some(out))
}

fn load_shares(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let entries = parse_exact(data, |i| list16(i, KeyShareEntry::parse))?;
    for (i, e) in entries.iter().enumerate() {
        if entries[..i].iter().any(|o| o.group == e.group) {
            return Err(Error::illegal(format!("Two key shares for {:?}", e.group)));
        }
    }
    Ok(ExtensionSpec::KeyShares(entries))
}

fn produce_share(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let (group, key) = ephemeral(ctx).ok_or_else(|| Error::internal("No key share to send"))?;
    let entry = KeyShareEntry {
        group,
        key: key.to_vec(),
    };
    let mut out = Vec::new();
    entry.serialize(&mut out);
    Ok(Some(out))
}

/// Client: the server's share must be for the group we sent.
fn load_share(ctx: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let entry = parse_exact(data, KeyShareEntry::parse)?;
    match ephemeral(ctx) {
        Some((group, _)) if group == entry.group => Ok(ExtensionSpec::KeyShare(entry)),
        _ => Err(Error::illegal(format!(
            "Server key share for {:?} which was not offered",
            entry.group
        ))),
    }
}

fn produce_retry(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    // A retry only for the cookie names no group.
    let Some(group) = ctx.retry_group else {
        return Ok(None);
    };
    let mut out = Vec::new();
    group.serialize(&mut out);
    Ok(Some(out))
}

/// Client: the group must be one we support and not the one already sent.
fn load_retry(ctx: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let group = parse_exact(data, NamedGroup::parse)?;
    if !local_groups(ctx).contains(&group) {
        return Err(Error::illegal(format!("Retry for unsupported group {:?}", group)));
    }
    if ephemeral(ctx).map(|(g, _)| g) == Some(group) {
        return Err(Error::illegal("Retry for the group already offered"));
    }
    Ok(ExtensionSpec::KeyShareRetry(group))
}

fn trade_retry(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if let Some(ExtensionSpec::KeyShareRetry(group)) =
        ctx.spec(HandshakeType::HelloRetryRequest, ExtensionType::KeyShare)
    {
        debug!("Server asked for a key share for {:?}", group);
        ctx.retry_group = Some(*group);
    }
    Ok(())
}

/// Shares the client offered, empty when it sent none.
pub(crate) fn client_shares(ctx: &HandshakeContext) -> &[KeyShareEntry] {
    match ctx.spec(HandshakeType::ClientHello, ExtensionType::KeyShare) {
        Some(ExtensionSpec::KeyShares(s)) => s,
        _ => &[],
    }
}

/// The share the server selected.
pub(crate) fn server_share(ctx: &HandshakeContext) -> Option<&KeyShareEntry> {
    match ctx.spec(HandshakeType::ServerHello, ExtensionType::KeyShare) {
        Some(ExtensionSpec::KeyShare(s)) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;
    use crate::types::ProtocolVersion;

    const SHARES: &[u8] = &[
        0x00, 0x0A, // list length
        0x00, 0x1D, 0x00, 0x02, 0xAA, 0xBB, // x25519
        0x00, 0x17, 0x00, 0x00, // secp256r1, empty
    ];

    #[test]
    fn client_offers_one_share() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_3])
            .named_groups(&[NamedGroup::X25519])
            .build()
            .unwrap();
        let mut ctx = context(Role::Client, config);
        let data = produce_shares(&mut ctx).unwrap().unwrap();
        // 2 list + 2 group + 2 length + 32 key
        assert_eq!(data.len(), 38);
        assert_eq!(&data[2..4], &[0x00, 0x1D]);
        assert_eq!(ctx.possessions.len(), 1);

        // A second hello replaces the ephemeral
        ctx.retry_group = Some(NamedGroup::X25519);
        produce_shares(&mut ctx).unwrap();
        assert_eq!(ctx.possessions.len(), 1);
    }

    #[test]
    fn server_reads_shares() {
        let ctx = context(Role::Server, Config::builder().build().unwrap());
        let ExtensionSpec::KeyShares(s) = load_shares(&ctx, SHARES).unwrap() else {
            panic!("wrong spec");
        };
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].key, vec![0xAA, 0xBB]);

        let dup = [0x00, 0x08, 0x00, 0x1D, 0x00, 0x00, 0x00, 0x1D, 0x00, 0x00];
        assert!(load_shares(&ctx, &dup).is_err());
    }

    #[test]
    fn retry_for_offered_group_is_refused() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_3])
            .named_groups(&[NamedGroup::X25519, NamedGroup::Secp256r1])
            .build()
            .unwrap();
        let mut ctx = context(Role::Client, config);
        produce_shares(&mut ctx).unwrap();
        assert!(load_retry(&ctx, &[0x00, 0x1D]).is_err());
        assert_eq!(
            load_retry(&ctx, &[0x00, 0x17]).unwrap(),
            ExtensionSpec::KeyShareRetry(NamedGroup::Secp256r1)
        );
    }
}
