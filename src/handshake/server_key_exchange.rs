//! ServerKeyExchange: ephemeral parameters of a TLS 1.2 and earlier exchange,
//! signed by the server unless the suite is anonymous.

use super::context::HandshakeContext;
use crate::extension::local_groups;
use crate::kx::signature::{self, key_exchange_content};
use crate::kx::{self, Credential, Possession};
use crate::message::{ServerKeyExchange, ServerKeyParams};
use crate::types::{AlertDescription, HandshakeType, KeyExchangeAlgorithm};
use crate::Error;

fn local_params(ctx: &HandshakeContext, kx: KeyExchangeAlgorithm) -> Result<ServerKeyParams, Error> {
    if kx == KeyExchangeAlgorithm::RsaExport {
        return ctx
            .possessions
            .iter()
            .find_map(|p| match p {
                Possession::EphemeralRsa(k) => Some(ServerKeyParams::RsaExport {
                    modulus: k.modulus().to_vec(),
                    exponent: k.exponent().to_vec(),
                }),
                _ => None,
            })
            .ok_or_else(|| Error::internal("No temporary RSA key"));
    }
    let ephemeral = ctx
        .possessions
        .iter()
        .find_map(|p| match p {
            Possession::Ephemeral(e) => Some(e),
            _ => None,
        })
        .ok_or_else(|| Error::internal("No ephemeral key exchange"))?;
    let group = ephemeral.group();
    let public = ephemeral.pub_key().to_vec();
    if !kx.is_ffdhe() {
        return Ok(ServerKeyParams::Ecdhe { group, public });
    }
    let params = ctx
        .provider()
        .kx_group(group)
        .and_then(|g| g.ffdhe_params())
        .ok_or_else(|| Error::internal(format!("No parameters for {:?}", group)))?;
    Ok(ServerKeyParams::Dhe {
        p: params.p.to_vec(),
        g: params.g.to_vec(),
        public,
    })
}

pub(crate) fn produce(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;
    let params = local_params(ctx, spec.kx)?;

    let signature = if spec.kx.is_authenticated() {
        let (identity, scheme) = ctx
            .identity()
            .ok_or_else(|| Error::internal("No identity to sign with"))?;
        let content = key_exchange_content(
            &ctx.negotiated.client_random.0,
            &ctx.negotiated.server_random.0,
            &params.to_bytes(),
        );
        Some(signature::sign(ctx.provider(), version, identity, scheme, &content)?)
    } else {
        None
    };

    let message = ServerKeyExchange { params, signature };
    let mut body = Vec::new();
    message.serialize(&mut body);
    ctx.send_handshake(HandshakeType::ServerKeyExchange, &body)?;
    trace!("ServerKeyExchange for {:?}", spec.kx);
    Ok(())
}

/// Significant bits of a big endian integer.
fn bit_len(n: &[u8]) -> usize {
    let Some(pos) = n.iter().position(|b| *b != 0) else {
        return 0;
    };
    (n.len() - pos) * 8 - n[pos].leading_zeros() as usize
}

pub(crate) fn consume(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let version = ctx.version()?;
    let spec = ctx.suite_spec()?;
    let message = ServerKeyExchange::decode(ctx.inbound()?.body(), spec.kx, version)?;

    if let Some(signed) = &message.signature {
        let Some(Credential::Certificate { chain, info }) = ctx.peer_certificate() else {
            return Err(Error::internal("Signed key exchange without a certificate"));
        };
        let content = key_exchange_content(
            &ctx.negotiated.client_random.0,
            &ctx.negotiated.server_random.0,
            &message.params.to_bytes(),
        );
        signature::verify(ctx, chain, info, signed, &content)?;
        ctx.negotiated.peer_scheme = signed.scheme;
    }

    let credential = match message.params {
        ServerKeyParams::Ecdhe { group, public } => {
            if !local_groups(ctx).contains(&group) {
                return Err(Error::illegal(format!("Server picked {:?} which was not offered", group)));
            }
            ctx.negotiated.group = Some(group);
            Credential::EphemeralPublic { group, public }
        }
        ServerKeyParams::Dhe { p, g, public } => {
            let bits = bit_len(&p);
            if !ctx.config.constraints().permits_dh_bits(bits) {
                return Err(Error::NegotiationFailure(
                    AlertDescription::InsufficientSecurity,
                    format!("DH group of {} bits", bits),
                ));
            }
            let group = kx::ffdhe_group(ctx, &p, &g)
                .ok_or_else(|| Error::handshake_failure("Unknown finite field group"))?;
            ctx.negotiated.group = Some(group);
            Credential::EphemeralPublic { group, public }
        }
        ServerKeyParams::RsaExport { modulus, exponent } => {
            Credential::RsaPublic { modulus, exponent }
        }
    };
    ctx.credentials.push(credential);
    ctx.consume_inbound()?;

    if spec.kx.is_authenticated() {
        ctx.expect(&[HandshakeType::CertificateRequest, HandshakeType::ServerHelloDone]);
    } else {
        ctx.expect(&[HandshakeType::ServerHelloDone]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prime_bit_length() {
        assert_eq!(bit_len(&[]), 0);
        assert_eq!(bit_len(&[0, 0, 1]), 1);
        assert_eq!(bit_len(&[0x80, 0]), 16);
        assert_eq!(bit_len(&[0, 0x7F, 0xFF]), 15);
        assert_eq!(bit_len(&[0xFF; 256]), 2048);
    }
}
