use std::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

/// Protocol versions from SSL 3.0 up to TLS 1.3, plus the DTLS family.
///
/// Versions are ordered within their family. DTLS versions are mapped onto the
/// TLS version they are derived from when comparing, so `DTLS1_2` behaves like
/// `TLS1_2` in "is at least" checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ProtocolVersion {
    SSL3_0,
    TLS1_0,
    TLS1_1,
    TLS1_2,
    TLS1_3,
    DTLS1_0,
    DTLS1_2,
    DTLS1_3,
    Unknown(u16),
}

/// Versions up to and including TLS 1.3 (both families).
pub const PROTOCOLS_TO_13: &[ProtocolVersion] = &[
    ProtocolVersion::TLS1_3,
    ProtocolVersion::TLS1_2,
    ProtocolVersion::TLS1_1,
    ProtocolVersion::TLS1_0,
    ProtocolVersion::SSL3_0,
    ProtocolVersion::DTLS1_3,
    ProtocolVersion::DTLS1_2,
    ProtocolVersion::DTLS1_0,
];

/// Versions up to and including TLS 1.2 (both families).
pub const PROTOCOLS_TO_12: &[ProtocolVersion] = &[
    ProtocolVersion::TLS1_2,
    ProtocolVersion::TLS1_1,
    ProtocolVersion::TLS1_0,
    ProtocolVersion::SSL3_0,
    ProtocolVersion::DTLS1_2,
    ProtocolVersion::DTLS1_0,
];

/// Versions up to and including TLS 1.1.
pub const PROTOCOLS_TO_11: &[ProtocolVersion] = &[
    ProtocolVersion::TLS1_1,
    ProtocolVersion::TLS1_0,
    ProtocolVersion::SSL3_0,
    ProtocolVersion::DTLS1_0,
];

/// Versions from TLS 1.0 up to TLS 1.2.
pub const PROTOCOLS_10_12: &[ProtocolVersion] = &[
    ProtocolVersion::TLS1_2,
    ProtocolVersion::TLS1_1,
    ProtocolVersion::TLS1_0,
    ProtocolVersion::DTLS1_2,
    ProtocolVersion::DTLS1_0,
];

/// Versions from TLS 1.0 up to TLS 1.3.
pub const PROTOCOLS_10_13: &[ProtocolVersion] = &[
    ProtocolVersion::TLS1_3,
    ProtocolVersion::TLS1_2,
    ProtocolVersion::TLS1_1,
    ProtocolVersion::TLS1_0,
    ProtocolVersion::DTLS1_3,
    ProtocolVersion::DTLS1_2,
    ProtocolVersion::DTLS1_0,
];

/// TLS 1.2 and TLS 1.3.
pub const PROTOCOLS_12_13: &[ProtocolVersion] = &[
    ProtocolVersion::TLS1_3,
    ProtocolVersion::TLS1_2,
    ProtocolVersion::DTLS1_3,
    ProtocolVersion::DTLS1_2,
];

/// TLS 1.2 only.
pub const PROTOCOLS_OF_12: &[ProtocolVersion] =
    &[ProtocolVersion::TLS1_2, ProtocolVersion::DTLS1_2];

/// TLS 1.3 only.
pub const PROTOCOLS_OF_13: &[ProtocolVersion] =
    &[ProtocolVersion::TLS1_3, ProtocolVersion::DTLS1_3];

/// SSL 3.0 only.
pub const PROTOCOLS_OF_30: &[ProtocolVersion] = &[ProtocolVersion::SSL3_0];

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0300 => ProtocolVersion::SSL3_0,
            0x0301 => ProtocolVersion::TLS1_0,
            0x0302 => ProtocolVersion::TLS1_1,
            0x0303 => ProtocolVersion::TLS1_2,
            0x0304 => ProtocolVersion::TLS1_3,
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            0xFEFC => ProtocolVersion::DTLS1_3,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::SSL3_0 => 0x0300,
            ProtocolVersion::TLS1_0 => 0x0301,
            ProtocolVersion::TLS1_1 => 0x0302,
            ProtocolVersion::TLS1_2 => 0x0303,
            ProtocolVersion::TLS1_3 => 0x0304,
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::DTLS1_3 => 0xFEFC,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, value) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    pub fn is_dtls(&self) -> bool {
        matches!(
            self,
            ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2 | ProtocolVersion::DTLS1_3
        )
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ProtocolVersion::Unknown(_))
    }

    /// Rank on the common TLS scale. DTLS 1.0 is derived from TLS 1.1.
    fn rank(&self) -> u8 {
        match self {
            ProtocolVersion::SSL3_0 => 1,
            ProtocolVersion::TLS1_0 => 2,
            ProtocolVersion::TLS1_1 | ProtocolVersion::DTLS1_0 => 3,
            ProtocolVersion::TLS1_2 | ProtocolVersion::DTLS1_2 => 4,
            ProtocolVersion::TLS1_3 | ProtocolVersion::DTLS1_3 => 5,
            ProtocolVersion::Unknown(_) => 0,
        }
    }

    /// Whether `self` is the same or a later version than `other` on the TLS scale.
    pub fn is_at_least(&self, other: ProtocolVersion) -> bool {
        self.rank() >= other.rank()
    }

    /// Whether `self` is an earlier version than `other` on the TLS scale.
    pub fn is_below(&self, other: ProtocolVersion) -> bool {
        self.rank() < other.rank()
    }

    pub fn use_tls13_plus(&self) -> bool {
        self.is_at_least(ProtocolVersion::TLS1_3)
    }

    pub fn use_tls12_plus(&self) -> bool {
        self.is_at_least(ProtocolVersion::TLS1_2)
    }

    pub fn use_tls11_plus(&self) -> bool {
        self.is_at_least(ProtocolVersion::TLS1_1)
    }

    /// The TLS version this version corresponds to.
    pub fn tls_equivalent(&self) -> ProtocolVersion {
        match self {
            ProtocolVersion::DTLS1_0 => ProtocolVersion::TLS1_1,
            ProtocolVersion::DTLS1_2 => ProtocolVersion::TLS1_2,
            ProtocolVersion::DTLS1_3 => ProtocolVersion::TLS1_3,
            v => *v,
        }
    }

    /// The version sent in the legacy version fields of hellos and records
    /// when this version is being negotiated.
    pub fn legacy_wire_version(&self) -> ProtocolVersion {
        match self {
            ProtocolVersion::TLS1_3 => ProtocolVersion::TLS1_2,
            ProtocolVersion::DTLS1_3 => ProtocolVersion::DTLS1_2,
            v => *v,
        }
    }

    /// Pick the newest of the given versions, if any.
    pub fn newest(versions: &[ProtocolVersion]) -> Option<ProtocolVersion> {
        versions
            .iter()
            .filter(|v| v.is_known())
            .copied()
            .max_by_key(|v| v.rank())
    }

    /// Pick the oldest of the given versions, if any.
    pub fn oldest(versions: &[ProtocolVersion]) -> Option<ProtocolVersion> {
        versions
            .iter()
            .filter(|v| v.is_known())
            .copied()
            .min_by_key(|v| v.rank())
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProtocolVersion::SSL3_0 => "SSLv3",
            ProtocolVersion::TLS1_0 => "TLSv1",
            ProtocolVersion::TLS1_1 => "TLSv1.1",
            ProtocolVersion::TLS1_2 => "TLSv1.2",
            ProtocolVersion::TLS1_3 => "TLSv1.3",
            ProtocolVersion::DTLS1_0 => "DTLSv1.0",
            ProtocolVersion::DTLS1_2 => "DTLSv1.2",
            ProtocolVersion::DTLS1_3 => "DTLSv1.3",
            ProtocolVersion::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::Unknown(v) => write!(f, "Unknown(0x{:04x})", v),
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_across_families() {
        assert!(ProtocolVersion::DTLS1_2.is_at_least(ProtocolVersion::TLS1_2));
        assert!(ProtocolVersion::DTLS1_0.is_below(ProtocolVersion::TLS1_2));
        assert!(ProtocolVersion::TLS1_3.use_tls13_plus());
        assert!(!ProtocolVersion::TLS1_2.use_tls13_plus());
        assert!(ProtocolVersion::SSL3_0.is_below(ProtocolVersion::TLS1_0));
    }

    #[test]
    fn newest_and_oldest() {
        let v = [
            ProtocolVersion::TLS1_1,
            ProtocolVersion::TLS1_3,
            ProtocolVersion::Unknown(0x7f1c),
            ProtocolVersion::TLS1_2,
        ];
        assert_eq!(ProtocolVersion::newest(&v), Some(ProtocolVersion::TLS1_3));
        assert_eq!(ProtocolVersion::oldest(&v), Some(ProtocolVersion::TLS1_1));
    }

    #[test]
    fn wire_values() {
        for v in PROTOCOLS_TO_13 {
            assert_eq!(ProtocolVersion::from_u16(v.as_u16()), *v);
        }
        assert_eq!(
            ProtocolVersion::TLS1_3.legacy_wire_version(),
            ProtocolVersion::TLS1_2
        );
    }
}
