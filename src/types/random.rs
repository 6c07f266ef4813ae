use std::fmt;

use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;

use crate::codec::verify;

/// The 32 byte hello random.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Random(pub [u8; 32]);

/// Fixed server random of a HelloRetryRequest (RFC 8446 4.1.3).
pub const HELLO_RETRY_REQUEST_RANDOM: Random = Random([
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11, 0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E, 0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
]);

/// Last 8 bytes of a TLS 1.3 capable server's random when negotiating TLS 1.2.
pub const DOWNGRADE_TLS12: [u8; 8] = [0x44, 0x4F, 0x57, 0x4E, 0x47, 0x52, 0x44, 0x01];

/// Last 8 bytes of a TLS 1.2+ capable server's random when negotiating TLS 1.1 or below.
pub const DOWNGRADE_TLS11: [u8; 8] = [0x44, 0x4F, 0x57, 0x4E, 0x47, 0x52, 0x44, 0x00];

impl Random {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, bytes) = crate::codec::array::<32>(input)?;
        Ok((input, Random(bytes)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.0);
    }

    pub fn is_hello_retry_request(&self) -> bool {
        *self == HELLO_RETRY_REQUEST_RANDOM
    }

    /// Stamp a downgrade sentinel into the last 8 bytes.
    pub fn set_downgrade(&mut self, sentinel: &[u8; 8]) {
        self.0[24..].copy_from_slice(sentinel);
    }

    pub fn has_downgrade(&self, sentinel: &[u8; 8]) -> bool {
        &self.0[24..] == sentinel
    }
}

impl fmt::Debug for Random {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Random(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..)")
    }
}

/// Session id of at most 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SessionId(Vec<u8>);

impl SessionId {
    pub const MAX_LEN: usize = 32;

    pub fn empty() -> Self {
        SessionId(Vec::new())
    }

    pub fn try_new(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > Self::MAX_LEN {
            return None;
        }
        Some(SessionId(bytes.to_vec()))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SessionId> {
        let (input, len) = be_u8(input)?;
        let (input, _) = verify(input, len as usize <= Self::MAX_LEN)?;
        let (input, bytes) = take(len)(input)?;
        Ok((input, SessionId(bytes.to_vec())))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        crate::codec::put_opaque8(output, &self.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}
