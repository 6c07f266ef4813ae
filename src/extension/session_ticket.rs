//! SessionTicket (RFC 5077). Tickets are opaque handles into the server
//! session cache, not encrypted session state.

use super::{ExtensionHandler, ExtensionSpec};
use crate::handshake::context::HandshakeContext;
use crate::types::{ExtensionType, HandshakeType, PROTOCOLS_TO_12};
use crate::Error;

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::SessionTicket,
        HandshakeType::ClientHello,
        PROTOCOLS_TO_12,
    )
    .produce(produce_request)
    .load(load_request)
    .trade(trade_request),
    ExtensionHandler::new(
        ExtensionType::SessionTicket,
        HandshakeType::ServerHello,
        PROTOCOLS_TO_12,
    )
    .produce(produce_ack)
    .load(load_ack)
    .trade(trade_ack),
];

/// Client: the ticket of the session being resumed, or empty to ask for one.
fn produce_request(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    if !ctx.config.session_tickets() {
        return Ok(None);
    }
    let ticket = ctx
        .resuming
        .as_ref()
        .filter(|s| !s.version().use_tls13_plus())
        .and_then(|s| s.ticket())
        .map(|t| t.to_vec())
        .unwrap_or_default();
    Ok(Some(ticket))
}

fn load_request(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    Ok(ExtensionSpec::SessionTicket(data.to_vec()))
}

fn trade_request(ctx: &mut HandshakeContext) -> Result<(), Error> {
    ctx.ticket_expected = ctx.config.session_tickets();
    Ok(())
}

/// Server: empty, and only when a NewSessionTicket will follow.
fn produce_ack(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    Ok(ctx.ticket_expected.then(Vec::new))
}

fn load_ack(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    if !data.is_empty() {
        return Err(Error::decode("SessionTicket acknowledgement must be empty"));
    }
    Ok(ExtensionSpec::SessionTicket(Vec::new()))
}

fn trade_ack(ctx: &mut HandshakeContext) -> Result<(), Error> {
    ctx.ticket_expected = true;
    Ok(())
}

/// The ticket a client presented, if not empty.
pub(crate) fn presented_ticket(ctx: &HandshakeContext) -> Option<&[u8]> {
    match ctx.spec(HandshakeType::ClientHello, ExtensionType::SessionTicket) {
        Some(ExtensionSpec::SessionTicket(t)) if !t.is_empty() => Some(t),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::handshake::context::Role;

    #[test]
    fn empty_request_without_session() {
        let config = Config::builder().session_tickets(true).build().unwrap();
        let mut ctx = context(Role::Client, config);
        assert_eq!(produce_request(&mut ctx).unwrap(), Some(vec![]));

        let config = Config::builder().session_tickets(false).build().unwrap();
        let mut ctx = context(Role::Client, config);
        assert_eq!(produce_request(&mut ctx).unwrap(), None);
    }

    #[test]
    fn ack_must_be_empty() {
        let ctx = context(Role::Client, Config::builder().build().unwrap());
        assert!(load_ack(&ctx, &[1]).is_err());
        assert!(load_ack(&ctx, &[]).is_ok());
    }
}
