//! Key derivation for SSL 3.0 up to TLS 1.2.
//!
//! TLS 1.2 uses P_hash with the hash of the cipher suite (RFC 5246 5). TLS 1.0
//! and 1.1 split the secret and XOR P_MD5 with P_SHA1 (RFC 2246 5). SSL 3.0
//! predates the PRF and builds everything out of nested MD5 and SHA-1.
//!
//! All HMAC and hash work goes through the [`CryptoProvider`], so the legacy
//! paths are only usable with a provider that offers MD5 and SHA-1.

use zeroize::Zeroizing;

use crate::crypto::provider::{CryptoProvider, HashContext};
use crate::types::{CipherSuiteSpec, HashAlgorithm, ProtocolVersion};
use crate::Error;

/// Size of the master secret for every version before TLS 1.3.
pub const MASTER_SECRET_LEN: usize = 48;

/// Size of the Finished verify_data from TLS 1.0 onwards.
pub const VERIFY_DATA_LEN: usize = 12;

/// Size of the SSL 3.0 Finished body (MD5 + SHA-1).
pub const SSL3_VERIFY_DATA_LEN: usize = 36;

const SSL3_PAD1: u8 = 0x36;
const SSL3_PAD2: u8 = 0x5c;

/// Sender constants of the SSL 3.0 Finished message.
pub const SSL3_CLIENT_SENDER: &[u8; 4] = b"CLNT";
pub const SSL3_SERVER_SENDER: &[u8; 4] = b"SRVR";

fn crypto(e: String) -> Error {
    Error::CryptoError(e)
}

fn hash_once(provider: &CryptoProvider, hash: HashAlgorithm, parts: &[&[u8]]) -> Result<Vec<u8>, Error> {
    let mut ctx = provider
        .hash_provider
        .create_hash(hash)
        .ok_or_else(|| Error::CryptoError(format!("{} not available", hash.name())))?;
    for p in parts {
        ctx.update(p);
    }
    Ok(ctx.clone_and_finalize())
}

/// P_hash(secret, seed) from RFC 5246 5, truncated to `output_len`.
pub fn p_hash(
    provider: &CryptoProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    let hmac = provider.hmac_provider;
    let mut result = Vec::with_capacity(output_len);

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a = hmac.hmac(hash, secret, seed).map_err(crypto)?;

    while result.len() < output_len {
        let mut input = Vec::with_capacity(a.len() + seed.len());
        input.extend_from_slice(&a);
        input.extend_from_slice(seed);
        let output = hmac.hmac(hash, secret, &input).map_err(crypto)?;

        let remaining = output_len - result.len();
        let to_copy = remaining.min(output.len());
        result.extend_from_slice(&output[..to_copy]);

        if result.len() < output_len {
            a = hmac.hmac(hash, secret, &a).map_err(crypto)?;
        }
    }

    Ok(result)
}

/// PRF(secret, label, seed) for the given version.
///
/// `hash` is the PRF hash of the cipher suite and is only consulted for
/// TLS 1.2. SSL 3.0 has no PRF.
pub fn prf(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    debug_assert!(label.is_ascii());
    let mut full_seed = Vec::with_capacity(label.len() + seed.len());
    full_seed.extend_from_slice(label.as_bytes());
    full_seed.extend_from_slice(seed);

    let version = version.tls_equivalent();
    if version.use_tls12_plus() {
        return p_hash(provider, hash, secret, &full_seed, output_len);
    }
    if version == ProtocolVersion::SSL3_0 {
        return Err(Error::internal("SSL 3.0 has no PRF"));
    }

    // Halves overlap by one byte when the secret length is odd.
    let half = secret.len().div_ceil(2);
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let md5 = p_hash(provider, HashAlgorithm::MD5, s1, &full_seed, output_len)?;
    let sha1 = p_hash(provider, HashAlgorithm::SHA1, s2, &full_seed, output_len)?;
    Ok(md5.iter().zip(sha1.iter()).map(|(a, b)| a ^ b).collect())
}

/// The SSL 3.0 construction shared by the master secret and the key block.
///
/// block(i) = MD5(secret + SHA1(label(i) + secret + seed)) where label(i) is
/// 'A', 'BB', 'CCC' and so on.
fn ssl3_expand(
    provider: &CryptoProvider,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(output_len + 16);
    let mut i = 0u8;
    while out.len() < output_len {
        if i >= 26 {
            return Err(Error::internal("SSL 3.0 key expansion too long"));
        }
        let label = vec![b'A' + i; i as usize + 1];
        let inner = hash_once(provider, HashAlgorithm::SHA1, &[&label, secret, seed])?;
        let block = hash_once(provider, HashAlgorithm::MD5, &[secret, &inner])?;
        out.extend_from_slice(&block);
        i += 1;
    }
    out.truncate(output_len);
    Ok(out)
}

/// Compute the master secret.
///
/// With `session_hash` the extended master secret of RFC 7627 is derived
/// instead of the classic one.
#[allow(clippy::too_many_arguments)]
pub fn master_secret(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    session_hash: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);

    let out = if version == ProtocolVersion::SSL3_0 {
        ssl3_expand(provider, pre_master_secret, &seed, MASTER_SECRET_LEN)?
    } else if let Some(session_hash) = session_hash {
        prf(
            provider,
            version,
            hash,
            pre_master_secret,
            "extended master secret",
            session_hash,
            MASTER_SECRET_LEN,
        )?
    } else {
        prf(
            provider,
            version,
            hash,
            pre_master_secret,
            "master secret",
            &seed,
            MASTER_SECRET_LEN,
        )?
    };
    Ok(Zeroizing::new(out))
}

/// Keys of one connection direction pair, cut out of the key block.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyBlock {
    pub client_write_mac_key: Zeroizing<Vec<u8>>,
    pub server_write_mac_key: Zeroizing<Vec<u8>>,
    pub client_write_key: Zeroizing<Vec<u8>>,
    pub server_write_key: Zeroizing<Vec<u8>>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

impl std::fmt::Debug for KeyBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBlock")
            .field("mac_key_len", &self.client_write_mac_key.len())
            .field("key_len", &self.client_write_key.len())
            .field("iv_len", &self.client_write_iv.len())
            .finish()
    }
}

/// Expand the master secret into the key block of `suite` and split it.
pub fn key_block(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    suite: &CipherSuiteSpec,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<KeyBlock, Error> {
    let mac_len = suite.mac.key_len();
    let key_len = suite.bulk.key_len();
    let iv_len = suite.bulk.fixed_iv_len(version);
    let export = suite.bulk.is_exportable();
    // Export ciphers derive their IVs separately.
    let block_iv_len = if export { 0 } else { iv_len };
    let total = 2 * (mac_len + key_len + block_iv_len);

    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let block = Zeroizing::new(if version == ProtocolVersion::SSL3_0 {
        ssl3_expand(provider, master_secret, &seed, total)?
    } else {
        prf(
            provider,
            version,
            suite.hash,
            master_secret,
            "key expansion",
            &seed,
            total,
        )?
    });

    let mut rest: &[u8] = &block;
    let mut take = |n: usize| {
        let (a, b) = rest.split_at(n);
        rest = b;
        a.to_vec()
    };

    let client_write_mac_key = Zeroizing::new(take(mac_len));
    let server_write_mac_key = Zeroizing::new(take(mac_len));
    let client_write_key = Zeroizing::new(take(key_len));
    let server_write_key = Zeroizing::new(take(key_len));
    let client_write_iv = take(block_iv_len);
    let server_write_iv = take(block_iv_len);

    let mut kb = KeyBlock {
        client_write_mac_key,
        server_write_mac_key,
        client_write_key,
        server_write_key,
        client_write_iv,
        server_write_iv,
    };

    if export {
        export_keys(
            provider,
            version,
            suite,
            &mut kb,
            client_random,
            server_random,
        )?;
    }

    Ok(kb)
}

/// Turn the 40 bit export keys into full cipher keys and derive the IVs.
fn export_keys(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    suite: &CipherSuiteSpec,
    kb: &mut KeyBlock,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<(), Error> {
    let expanded = suite.bulk.expanded_key_len();
    let iv_len = suite.bulk.block_len();

    let mut cs = Vec::with_capacity(64);
    cs.extend_from_slice(client_random);
    cs.extend_from_slice(server_random);
    let mut sc = Vec::with_capacity(64);
    sc.extend_from_slice(server_random);
    sc.extend_from_slice(client_random);

    if version == ProtocolVersion::SSL3_0 {
        let ck = hash_once(provider, HashAlgorithm::MD5, &[&kb.client_write_key, &cs])?;
        let sk = hash_once(provider, HashAlgorithm::MD5, &[&kb.server_write_key, &sc])?;
        kb.client_write_key = Zeroizing::new(ck[..expanded].to_vec());
        kb.server_write_key = Zeroizing::new(sk[..expanded].to_vec());
        if iv_len > 0 {
            kb.client_write_iv = hash_once(provider, HashAlgorithm::MD5, &[&cs])?[..iv_len].to_vec();
            kb.server_write_iv = hash_once(provider, HashAlgorithm::MD5, &[&sc])?[..iv_len].to_vec();
        }
        return Ok(());
    }

    let ck = prf(
        provider,
        version,
        suite.hash,
        &kb.client_write_key,
        "client write key",
        &cs,
        expanded,
    )?;
    let sk = prf(
        provider,
        version,
        suite.hash,
        &kb.server_write_key,
        "server write key",
        &cs,
        expanded,
    )?;
    kb.client_write_key = Zeroizing::new(ck);
    kb.server_write_key = Zeroizing::new(sk);

    if iv_len > 0 {
        let ivs = prf(provider, version, suite.hash, &[], "IV block", &cs, 2 * iv_len)?;
        kb.client_write_iv = ivs[..iv_len].to_vec();
        kb.server_write_iv = ivs[iv_len..].to_vec();
    }
    Ok(())
}

/// verify_data of a TLS 1.0 to 1.2 Finished message.
pub fn finished_verify_data(
    provider: &CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    master_secret: &[u8],
    client: bool,
    transcript_hash: &[u8],
) -> Result<Vec<u8>, Error> {
    let label = if client {
        "client finished"
    } else {
        "server finished"
    };
    prf(
        provider,
        version,
        hash,
        master_secret,
        label,
        transcript_hash,
        VERIFY_DATA_LEN,
    )
}

/// One half of the SSL 3.0 MAC-like construction over a running hash.
///
/// hash(master + pad2 + hash(messages + sender + master + pad1))
fn ssl3_half(
    provider: &CryptoProvider,
    running: &dyn HashContext,
    hash: HashAlgorithm,
    master_secret: &[u8],
    sender: &[u8],
) -> Result<Vec<u8>, Error> {
    let pad_len = if hash == HashAlgorithm::MD5 { 48 } else { 40 };
    let mut inner = running.box_clone();
    inner.update(sender);
    inner.update(master_secret);
    inner.update(&vec![SSL3_PAD1; pad_len]);
    let inner = inner.clone_and_finalize();

    hash_once(
        provider,
        hash,
        &[master_secret, &vec![SSL3_PAD2; pad_len], &inner],
    )
}

/// SSL 3.0 Finished body, computed from the running MD5 and SHA-1 transcript.
pub fn ssl3_finished(
    provider: &CryptoProvider,
    md5: &dyn HashContext,
    sha1: &dyn HashContext,
    master_secret: &[u8],
    sender: &[u8; 4],
) -> Result<Vec<u8>, Error> {
    let mut out = ssl3_half(provider, md5, HashAlgorithm::MD5, master_secret, sender)?;
    out.extend(ssl3_half(provider, sha1, HashAlgorithm::SHA1, master_secret, sender)?);
    Ok(out)
}

/// SSL 3.0 CertificateVerify digest. Same as Finished without a sender.
pub fn ssl3_certificate_verify(
    provider: &CryptoProvider,
    md5: &dyn HashContext,
    sha1: &dyn HashContext,
    master_secret: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut out = ssl3_half(provider, md5, HashAlgorithm::MD5, master_secret, &[])?;
    out.extend(ssl3_half(provider, sha1, HashAlgorithm::SHA1, master_secret, &[])?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;
    use crate::types::CipherSuite;

    #[test]
    fn tls12_prf_sha256_vector() {
        let provider = default_provider();
        let secret = [
            0x9b, 0xbe, 0x43, 0x6b, 0xa9, 0x40, 0xf0, 0x17, 0xb1, 0x76, 0x52, 0x84, 0x9a, 0x71,
            0xdb, 0x35,
        ];
        let seed = [
            0xa0, 0xba, 0x9f, 0x93, 0x6c, 0xda, 0x31, 0x18, 0x27, 0xa6, 0xf7, 0x96, 0xff, 0xd5,
            0x19, 0x8c,
        ];
        let out = prf(
            &provider,
            ProtocolVersion::TLS1_2,
            HashAlgorithm::SHA256,
            &secret,
            "test label",
            &seed,
            100,
        )
        .unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(&out[..8], &[0xe3, 0xf2, 0x29, 0xba, 0x72, 0x7b, 0xe1, 0x7b]);
    }

    #[test]
    fn p_hash_is_prefix_stable() {
        let provider = default_provider();
        let long = p_hash(&provider, HashAlgorithm::SHA256, b"k", b"s", 80).unwrap();
        let short = p_hash(&provider, HashAlgorithm::SHA256, b"k", b"s", 33).unwrap();
        assert_eq!(&long[..33], &short[..]);
    }

    #[test]
    fn tls10_prf_vector() {
        let provider = default_provider();
        let out = prf(
            &provider,
            ProtocolVersion::TLS1_0,
            HashAlgorithm::SHA256,
            &[0xab; 48],
            "PRF Testvector",
            &[0xcd; 64],
            104,
        )
        .unwrap();
        let expected = [
            0xd3, 0xd4, 0xd1, 0xe3, 0x49, 0xb5, 0xd5, 0x15, 0x04, 0x46, 0x66, 0xd5, 0x1d, 0xe3,
            0x2b, 0xab, 0x25, 0x8c, 0xb5, 0x21, 0xb6, 0xb0, 0x53, 0x46, 0x3e, 0x35, 0x48, 0x32,
            0xfd, 0x97, 0x67, 0x54, 0x44, 0x3b, 0xcf, 0x9a, 0x29, 0x65, 0x19, 0xbc, 0x28, 0x9a,
            0xbc, 0xbc, 0x11, 0x87, 0xe4, 0xeb, 0xd3, 0x1e, 0x60, 0x23, 0x53, 0x77, 0x6c, 0x40,
            0x8a, 0xaf, 0xb7, 0x4c, 0xbc, 0x85, 0xef, 0xf6, 0x92, 0x55, 0xf9, 0x78, 0x8f, 0xaa,
            0x18, 0x4c, 0xbb, 0x95, 0x7a, 0x98, 0x19, 0xd8, 0x4a, 0x5d, 0x7e, 0xb0, 0x06, 0xeb,
            0x45, 0x9d, 0x3a, 0xe8, 0xde, 0x98, 0x10, 0x45, 0x4b, 0x8b, 0x2d, 0x8f, 0x1a, 0xfb,
            0xc6, 0x55, 0xa8, 0xc9, 0xa0, 0x13,
        ];
        assert_eq!(out, expected);

        // TLS 1.1 shares the construction.
        let same = prf(
            &provider,
            ProtocolVersion::TLS1_1,
            HashAlgorithm::SHA384,
            &[0xab; 48],
            "PRF Testvector",
            &[0xcd; 64],
            104,
        )
        .unwrap();
        assert_eq!(same, out);
    }

    #[test]
    fn ssl3_master_secret_and_key_block() {
        let provider = default_provider();
        let mut pms = vec![3, 0];
        pms.extend(0..46u8);

        let ms = master_secret(
            &provider,
            ProtocolVersion::SSL3_0,
            HashAlgorithm::SHA256,
            &pms,
            &[1; 32],
            &[2; 32],
            None,
        )
        .unwrap();
        assert_eq!(
            &ms[..],
            &[
                0xfb, 0xa4, 0xd5, 0xcc, 0x41, 0xef, 0x0c, 0xe4, 0x63, 0xc1, 0x43, 0x87, 0x94, 0x96,
                0xa9, 0xae, 0x48, 0x02, 0xbb, 0x1f, 0x2f, 0x3c, 0x6e, 0xa5, 0xb4, 0x54, 0x33, 0x87,
                0xe1, 0x71, 0xdd, 0x20, 0x28, 0xf5, 0xd5, 0xf2, 0xf0, 0xcb, 0xce, 0x66, 0x58, 0xdc,
                0xf5, 0x8e, 0xb3, 0x77, 0xbc, 0x4a,
            ][..]
        );

        let suite = CipherSuite::RSA_AES128_CBC_SHA.spec().unwrap();
        let kb = key_block(
            &provider,
            ProtocolVersion::SSL3_0,
            suite,
            &ms,
            &[1; 32],
            &[2; 32],
        )
        .unwrap();
        let block = [
            0xf3, 0x61, 0x2e, 0xf2, 0x97, 0x8c, 0x01, 0x2f, 0xe9, 0x02, 0x2a, 0x98, 0x35, 0x29,
            0x42, 0xa8, 0x94, 0xef, 0xdc, 0x3e, 0x4e, 0x99, 0xb5, 0x40, 0x37, 0xe8, 0x15, 0xfa,
            0xf3, 0x6c, 0x60, 0xbb, 0x4f, 0x54, 0x3d, 0x26, 0x97, 0x44, 0x80, 0x31, 0x56, 0xa3,
            0xfb, 0xe3, 0xc8, 0xb4, 0x83, 0xc4, 0xb3, 0x25, 0x6e, 0x82, 0xd8, 0x66, 0xa8, 0xad,
            0xd3, 0xd9, 0x76, 0x7c, 0x93, 0x32, 0xc2, 0xde, 0x12, 0x4f, 0x07, 0x2d, 0x56, 0x8c,
            0x7c, 0xeb, 0xd0, 0xc2, 0x47, 0x64, 0xdf, 0x19, 0x82, 0xc7, 0xa6, 0x1e, 0x64, 0xff,
            0x4a, 0x9f, 0x94, 0xf7, 0x35, 0x5a, 0x4e, 0x5e, 0xe0, 0x18, 0xb8, 0x8a, 0xc7, 0x52,
            0x49, 0x2f, 0xff, 0xb2, 0xfe, 0xcf,
        ];
        assert_eq!(&kb.client_write_mac_key[..], &block[..20]);
        assert_eq!(&kb.server_write_mac_key[..], &block[20..40]);
        assert_eq!(&kb.client_write_key[..], &block[40..56]);
        assert_eq!(&kb.server_write_key[..], &block[56..72]);
        assert_eq!(kb.client_write_iv, &block[72..88]);
        assert_eq!(kb.server_write_iv, &block[88..]);
    }

    #[test]
    fn ssl3_has_no_prf() {
        let provider = default_provider();
        let r = prf(
            &provider,
            ProtocolVersion::SSL3_0,
            HashAlgorithm::SHA256,
            b"secret",
            "x",
            b"seed",
            12,
        );
        assert!(matches!(r, Err(Error::InternalError(_))));
    }

    #[test]
    fn key_block_sizes() {
        let provider = default_provider();
        let suite = CipherSuite::ECDHE_RSA_AES128_CBC_SHA256.spec().unwrap();
        let kb = key_block(
            &provider,
            ProtocolVersion::TLS1_2,
            suite,
            &[1; 48],
            &[2; 32],
            &[3; 32],
        )
        .unwrap();
        assert_eq!(kb.client_write_mac_key.len(), 32);
        assert_eq!(kb.client_write_key.len(), 16);
        assert!(kb.client_write_iv.is_empty());
        assert_ne!(kb.client_write_key, kb.server_write_key);

        let suite = CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256.spec().unwrap();
        let kb = key_block(
            &provider,
            ProtocolVersion::TLS1_2,
            suite,
            &[1; 48],
            &[2; 32],
            &[3; 32],
        )
        .unwrap();
        assert!(kb.client_write_mac_key.is_empty());
        assert_eq!(kb.client_write_iv.len(), 4);
    }

    #[test]
    fn extended_master_secret_differs() {
        let provider = default_provider();
        let a = master_secret(
            &provider,
            ProtocolVersion::TLS1_2,
            HashAlgorithm::SHA256,
            &[9; 48],
            &[1; 32],
            &[2; 32],
            None,
        )
        .unwrap();
        let b = master_secret(
            &provider,
            ProtocolVersion::TLS1_2,
            HashAlgorithm::SHA256,
            &[9; 48],
            &[1; 32],
            &[2; 32],
            Some(&[0; 32]),
        )
        .unwrap();
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
    }
}
