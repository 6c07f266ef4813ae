use crate::types::{NamedGroup, ProtocolVersion, PROTOCOLS_TO_13};

/// Kind of key agreement a named group runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Ecdhe,
    Xdh,
    Ffdhe,
}

/// Immutable facts about a named group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedGroupSpec {
    pub group: NamedGroup,
    pub name: &'static str,
    pub kind: GroupKind,
    /// Rough strength, used against key size constraints.
    pub bits: usize,
    pub versions: &'static [ProtocolVersion],
}

impl NamedGroupSpec {
    pub fn supports(&self, version: ProtocolVersion) -> bool {
        self.versions.contains(&version)
    }

    pub fn supports_any(&self, versions: &[ProtocolVersion]) -> bool {
        versions.iter().any(|v| self.supports(*v))
    }

    /// Whether the group can serve a TLS 1.2 and earlier key exchange of this kind.
    pub fn is_ecc(&self) -> bool {
        matches!(self.kind, GroupKind::Ecdhe | GroupKind::Xdh)
    }
}

macro_rules! groups {
    ($( $group:ident, $name:literal, $kind:ident, $bits:literal; )*) => {
        /// Every known group in default preference order.
        pub(crate) static GROUPS: &[NamedGroupSpec] = &[
            $(
                NamedGroupSpec {
                    group: NamedGroup::$group,
                    name: $name,
                    kind: GroupKind::$kind,
                    bits: $bits,
                    versions: PROTOCOLS_TO_13,
                },
            )*
        ];
    };
}

groups! {
    X25519, "x25519", Xdh, 255;
    Secp256r1, "secp256r1", Ecdhe, 256;
    Secp384r1, "secp384r1", Ecdhe, 384;
    Secp521r1, "secp521r1", Ecdhe, 521;
    X448, "x448", Xdh, 448;
    Ffdhe2048, "ffdhe2048", Ffdhe, 2048;
    Ffdhe3072, "ffdhe3072", Ffdhe, 3072;
    Ffdhe4096, "ffdhe4096", Ffdhe, 4096;
    Ffdhe6144, "ffdhe6144", Ffdhe, 6144;
    Ffdhe8192, "ffdhe8192", Ffdhe, 8192;
}

/// Look up the spec of a group.
pub fn group_spec(group: NamedGroup) -> Option<&'static NamedGroupSpec> {
    GROUPS.iter().find(|g| g.group == group)
}
