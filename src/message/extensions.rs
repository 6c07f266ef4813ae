use nom::number::complete::be_u16;
use nom::IResult;

use crate::codec::{items, nested16, opaque16, put_opaque16, put_u16, verify};
use crate::types::ExtensionType;

/// One extension as it appears on the wire. The body is decoded by the
/// extension registry, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub ext_type: ExtensionType,
    pub data: Vec<u8>,
}

impl Extension {
    pub fn new(ext_type: ExtensionType, data: Vec<u8>) -> Self {
        Extension { ext_type, data }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Extension> {
        let (input, ext_type) = ExtensionType::parse(input)?;
        let (input, data) = opaque16(input)?;
        Ok((
            input,
            Extension {
                ext_type,
                data: data.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        put_u16(out, self.ext_type.as_u16());
        put_opaque16(out, &self.data);
    }
}

/// Extension block: 2-byte total length followed by the extensions.
pub struct Extensions;

impl Extensions {
    /// A mandatory extension block. Duplicate types are refused.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Vec<Extension>> {
        let (input, data) = opaque16(input)?;
        let (_, list) = items(data, Extension::parse)?;
        let mut seen: Vec<ExtensionType> = Vec::with_capacity(list.len());
        for e in &list {
            verify(input, !seen.contains(&e.ext_type))?;
            seen.push(e.ext_type);
        }
        Ok((input, list))
    }

    /// The trailing block of a hello, which may be left out entirely.
    pub fn parse_optional(input: &[u8]) -> IResult<&[u8], Vec<Extension>> {
        if input.is_empty() {
            return Ok((input, Vec::new()));
        }
        let (_, declared) = be_u16(input)?;
        verify(input, declared as usize + 2 <= input.len())?;
        Self::parse(input)
    }

    pub fn serialize(list: &[Extension], out: &mut Vec<u8>) {
        nested16(out, |out| {
            for e in list {
                e.serialize(out);
            }
        });
    }

    /// Hellos omit an empty block.
    pub fn serialize_optional(list: &[Extension], out: &mut Vec<u8>) {
        if !list.is_empty() {
            Self::serialize(list, out);
        }
    }

    /// Encoded size of a block holding `list`.
    pub fn length(list: &[Extension]) -> usize {
        2 + list.iter().map(|e| 4 + e.data.len()).sum::<usize>()
    }

    pub fn length_optional(list: &[Extension]) -> usize {
        if list.is_empty() {
            0
        } else {
            Self::length(list)
        }
    }
}

/// Find an extension by type.
pub fn find_extension(list: &[Extension], ext_type: ExtensionType) -> Option<&Extension> {
    list.iter().find(|e| e.ext_type == ext_type)
}
