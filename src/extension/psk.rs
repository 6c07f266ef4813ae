//! pre_shared_key and psk_key_exchange_modes (RFC 8446, sections 4.2.9
//! and 4.2.11).
//!
//! The client offers at most one identity, the ticket of a cached TLS 1.3
//! session. Binders go out as zeros here and are patched in once the rest
//! of the ClientHello is known.

use nom::number::complete::{be_u32, be_u8};
use nom::IResult;

use super::{ExtensionHandler, ExtensionSpec};
use crate::codec::{list16, list8, nested16, nested8, opaque16, opaque8, parse_exact};
use crate::codec::{put_opaque16, put_opaque8, put_u16, put_u32};
use crate::handshake::context::HandshakeContext;
use crate::types::{AlertDescription, ExtensionType, HandshakeType, PROTOCOLS_OF_13};
use crate::Error;

/// psk_dhe_ke, the only mode spoken here.
pub(crate) const PSK_DHE_KE: u8 = 1;

/// A ticket identity as offered in a ClientHello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PskIdentity {
    pub identity: Vec<u8>,
    pub obfuscated_age: u32,
}

/// The body of a ClientHello pre_shared_key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OfferedPsks {
    pub identities: Vec<PskIdentity>,
    pub binders: Vec<Vec<u8>>,
}

impl OfferedPsks {
    fn parse(input: &[u8]) -> IResult<&[u8], OfferedPsks> {
        let (input, identities) = list16(input, |i| {
            let (i, identity) = opaque16(i)?;
            let (i, obfuscated_age) = be_u32(i)?;
            Ok((
                i,
                PskIdentity {
                    identity: identity.to_vec(),
                    obfuscated_age,
                },
            ))
        })?;
        let (input, binders) = list16(input, |i| {
            let (i, b) = opaque8(i)?;
            Ok((i, b.to_vec()))
        })?;
        Ok((
            input,
            OfferedPsks {
                identities,
                binders,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        nested16(out, |out| {
            for id in &self.identities {
                put_opaque16(out, &id.identity);
                put_u32(out, id.obfuscated_age);
            }
        });
        self.serialize_binders(out);
    }

    pub fn serialize_binders(&self, out: &mut Vec<u8>) {
        nested16(out, |out| {
            for b in &self.binders {
                put_opaque8(out, b);
            }
        });
    }

    /// Length of the binders list on the wire, length prefix included.
    pub fn binders_len(&self) -> usize {
        2 + self.binders.iter().map(|b| 1 + b.len()).sum::<usize>()
    }
}

pub(super) const MODE_HANDLERS: &[ExtensionHandler] = &[ExtensionHandler::new(
    ExtensionType::PskKeyExchangeModes,
    HandshakeType::ClientHello,
    PROTOCOLS_OF_13,
)
.produce(produce_modes)
.load(load_modes)
.absence(absent_modes)];

pub(super) const HANDLERS: &[ExtensionHandler] = &[
    ExtensionHandler::new(
        ExtensionType::PreSharedKey,
        HandshakeType::ClientHello,
        PROTOCOLS_OF_13,
    )
    .produce(produce_offer)
    .load(load_offer),
    ExtensionHandler::new(
        ExtensionType::PreSharedKey,
        HandshakeType::ServerHello,
        PROTOCOLS_OF_13,
    )
    .produce(produce_selected)
    .load(load_selected),
];

fn produce_modes(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    if !ctx.config.session_tickets() {
        return Ok(None);
    }
    let mut out = Vec::new();
    nested8(&mut out, |out| out.push(PSK_DHE_KE));
    Ok(Some(out))
}

fn load_modes(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let modes = parse_exact(data, |i| list8(i, be_u8))?;
    if modes.is_empty() {
        return Err(Error::decode("Empty psk_key_exchange_modes"));
    }
    Ok(ExtensionSpec::PskModes(modes))
}

fn absent_modes(ctx: &HandshakeContext) -> Result<(), Error> {
    if ctx
        .extensions
        .contains(HandshakeType::ClientHello, ExtensionType::PreSharedKey)
    {
        return Err(Error::NegotiationFailure(
            AlertDescription::MissingExtension,
            "pre_shared_key without psk_key_exchange_modes".to_string(),
        ));
    }
    Ok(())
}

/// Client: offer the cached session when it is a TLS 1.3 ticket whose suite
/// is still enabled.
fn produce_offer(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    let Some(session) = ctx.resuming.clone() else {
        return Ok(None);
    };
    if !session.version().use_tls13_plus() || !ctx.config.cipher_suites().contains(&session.suite) {
        return Ok(None);
    }
    let Some(ticket) = session.ticket() else {
        return Ok(None);
    };
    let Some(spec) = session.suite.spec() else {
        return Ok(None);
    };
    let offered = OfferedPsks {
        identities: vec![PskIdentity {
            identity: ticket.to_vec(),
            obfuscated_age: session
                .age_millis(ctx.now)
                .wrapping_add(session.ticket_age_add),
        }],
        binders: vec![vec![0; spec.hash.output_len()]],
    };
    trace!("Offering a resumption PSK for {}", session.suite);
    let mut out = Vec::new();
    offered.serialize(&mut out);
    Ok(Some(out))
}

fn load_offer(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let offered = parse_exact(data, OfferedPsks::parse)?;
    if offered.identities.is_empty() {
        return Err(Error::decode("No PSK identity"));
    }
    if offered.identities.len() != offered.binders.len() {
        return Err(Error::illegal("PSK identity and binder counts differ"));
    }
    Ok(ExtensionSpec::OfferedPsks(offered))
}

fn produce_selected(ctx: &mut HandshakeContext) -> Result<Option<Vec<u8>>, Error> {
    Ok(ctx.psk_index.map(|i| {
        let mut out = Vec::new();
        put_u16(&mut out, i);
        out
    }))
}

/// Client: only one identity was offered, so only index 0 is valid.
fn load_selected(_: &HandshakeContext, data: &[u8]) -> Result<ExtensionSpec, Error> {
    let index = parse_exact(data, nom::number::complete::be_u16)?;
    if index != 0 {
        return Err(Error::illegal(format!("Selected PSK {} was never offered", index)));
    }
    Ok(ExtensionSpec::SelectedPsk(index))
}

/// The PSKs a ClientHello offered.
pub(crate) fn offered_psks(ctx: &HandshakeContext) -> Option<&OfferedPsks> {
    match ctx.spec(HandshakeType::ClientHello, ExtensionType::PreSharedKey) {
        Some(ExtensionSpec::OfferedPsks(o)) => Some(o),
        _ => None,
    }
}

/// Whether the client allows `mode`.
pub(crate) fn client_allows_mode(ctx: &HandshakeContext, mode: u8) -> bool {
    matches!(
        ctx.spec(HandshakeType::ClientHello, ExtensionType::PskKeyExchangeModes),
        Some(ExtensionSpec::PskModes(m)) if m.contains(&mode)
    )
}

/// Whether the server accepted our PSK.
pub(crate) fn server_selected(ctx: &HandshakeContext) -> bool {
    ctx.extensions
        .contains(HandshakeType::ServerHello, ExtensionType::PreSharedKey)
}
