//! NewSessionTicket inside a TLS 1.2 and earlier handshake (RFC 5077).
//!
//! Tickets are opaque lookup keys into the server's session cache, not
//! encrypted session state.

use super::context::{HandshakeContext, Role};
use crate::message::{NewSessionTicket, T12NewSessionTicket};
use crate::types::HandshakeType;
use crate::Error;

/// Size of the random lookup key handed out as a ticket.
pub(crate) const TICKET_LEN: usize = 32;

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let mut ticket = vec![0u8; TICKET_LEN];
    ctx.rng.fill(&mut ticket);
    let lifetime_hint = ctx
        .config
        .session_cache()
        .lifetime()
        .as_secs()
        .min(u32::MAX as u64) as u32;

    let message = NewSessionTicket::T12(T12NewSessionTicket {
        lifetime_hint,
        ticket: ticket.clone(),
    });
    let mut body = Vec::new();
    message.serialize(&mut body);
    ctx.send_handshake(HandshakeType::NewSessionTicket, &body)?;
    trace!("Issued session ticket, hint {}s", lifetime_hint);
    ctx.ticket = Some((lifetime_hint, ticket));
    Ok(())
}

pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    if ctx.role != Role::Client || !ctx.ticket_expected {
        return Err(Error::UnexpectedMessage(
            "NewSessionTicket without session_ticket".to_string(),
        ));
    }
    let version = ctx.version()?;
    let NewSessionTicket::T12(message) = NewSessionTicket::decode(ctx.inbound()?.body(), version)?
    else {
        return Err(Error::internal("TLS 1.3 ticket inside the handshake"));
    };
    // An empty ticket means the server will not issue one after all.
    if message.ticket.is_empty() {
        debug!("Server sent an empty ticket");
    } else {
        debug!("Received session ticket, hint {}s", message.lifetime_hint);
        ctx.ticket = Some((message.lifetime_hint, message.ticket));
    }
    ctx.consume_inbound()?;
    ctx.expect(&[HandshakeType::Finished]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extension::tests::context;
    use crate::types::ProtocolVersion;

    #[test]
    fn issued_ticket_is_remembered() {
        let config = Config::builder()
            .versions(&[ProtocolVersion::TLS1_2])
            .session_tickets(true)
            .build()
            .unwrap();
        let mut ctx = context(Role::Server, config);
        ctx.negotiated.set_version(ProtocolVersion::TLS1_2).unwrap();
        produce(&mut ctx).unwrap();
        let (hint, ticket) = ctx.ticket.clone().unwrap();
        assert_eq!(ticket.len(), TICKET_LEN);
        assert_eq!(hint as u64, ctx.config.session_cache().lifetime().as_secs());
    }
}
