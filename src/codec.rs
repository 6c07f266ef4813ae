//! Wire primitives shared by every message and extension.
//!
//! Readers are nom parsers over `&[u8]`. Writers append to a `Vec<u8>`.
//! Length-prefixed writers patch the prefix in after the body is written, so
//! nested structures can be emitted without computing sizes up front.

use nom::bytes::complete::take;
use nom::combinator::all_consuming;
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult};

use crate::Error;

/// Opaque vector with a 1-byte length prefix.
pub fn opaque8(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u8)(input)
}

/// Opaque vector with a 2-byte length prefix.
pub fn opaque16(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u16)(input)
}

/// Opaque vector with a 3-byte length prefix.
pub fn opaque24(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u24)(input)
}

/// Fixed size array.
pub fn array<const N: usize>(input: &[u8]) -> IResult<&[u8], [u8; N]> {
    let (input, bytes) = take(N)(input)?;
    let mut out = [0; N];
    out.copy_from_slice(bytes);
    Ok((input, out))
}

/// Parse every item in `data`. Fails unless the items exactly cover the input.
pub fn items<'a, O, F>(data: &'a [u8], mut item: F) -> IResult<&'a [u8], Vec<O>>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let mut out = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let (r, o) = item(rest)?;
        if r.len() == rest.len() {
            return Err(Err::Failure(NomError::new(rest, ErrorKind::Many0)));
        }
        out.push(o);
        rest = r;
    }
    Ok((rest, out))
}

/// A list behind a 1-byte length prefix.
pub fn list8<'a, O, F>(input: &'a [u8], item: F) -> IResult<&'a [u8], Vec<O>>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let (input, data) = opaque8(input)?;
    let (_, out) = items(data, item)?;
    Ok((input, out))
}

/// A list behind a 2-byte length prefix.
pub fn list16<'a, O, F>(input: &'a [u8], item: F) -> IResult<&'a [u8], Vec<O>>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let (input, data) = opaque16(input)?;
    let (_, out) = items(data, item)?;
    Ok((input, out))
}

/// A list behind a 3-byte length prefix.
pub fn list24<'a, O, F>(input: &'a [u8], item: F) -> IResult<&'a [u8], Vec<O>>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let (input, data) = opaque24(input)?;
    let (_, out) = items(data, item)?;
    Ok((input, out))
}

/// Fail with a nom error unless `cond` holds.
pub fn verify(input: &[u8], cond: bool) -> IResult<&[u8], ()> {
    if cond {
        Ok((input, ()))
    } else {
        Err(Err::Failure(NomError::new(input, ErrorKind::Verify)))
    }
}

/// Run `parser` over the whole of `input`.
///
/// Leftover bytes or missing bytes are both a decode error.
pub fn parse_exact<'a, O, F>(input: &'a [u8], parser: F) -> Result<O, Error>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let (_, out) = all_consuming(parser)(input)?;
    Ok(out)
}

pub fn put_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u24(out: &mut Vec<u8>, v: u32) {
    debug_assert!(v <= 0xFF_FFFF);
    out.extend_from_slice(&v.to_be_bytes()[1..]);
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_opaque8(out: &mut Vec<u8>, data: &[u8]) {
    debug_assert!(data.len() <= 0xFF);
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

pub fn put_opaque16(out: &mut Vec<u8>, data: &[u8]) {
    debug_assert!(data.len() <= 0xFFFF);
    put_u16(out, data.len() as u16);
    out.extend_from_slice(data);
}

pub fn put_opaque24(out: &mut Vec<u8>, data: &[u8]) {
    put_u24(out, data.len() as u32);
    out.extend_from_slice(data);
}

/// Write a 1-byte length prefix covering whatever `f` appends.
pub fn nested8(out: &mut Vec<u8>, f: impl FnOnce(&mut Vec<u8>)) {
    nested(out, 1, f)
}

/// Write a 2-byte length prefix covering whatever `f` appends.
pub fn nested16(out: &mut Vec<u8>, f: impl FnOnce(&mut Vec<u8>)) {
    nested(out, 2, f)
}

/// Write a 3-byte length prefix covering whatever `f` appends.
pub fn nested24(out: &mut Vec<u8>, f: impl FnOnce(&mut Vec<u8>)) {
    nested(out, 3, f)
}

fn nested(out: &mut Vec<u8>, width: usize, f: impl FnOnce(&mut Vec<u8>)) {
    let start = out.len();
    out.extend(std::iter::repeat(0).take(width));
    f(out);
    let len = out.len() - start - width;
    debug_assert!(len < 1 << (8 * width));
    let be = (len as u32).to_be_bytes();
    out[start..start + width].copy_from_slice(&be[4 - width..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_prefixes() {
        let input = [0x00, 0x02, 0xAA, 0xBB, 0xCC];
        let (rest, v) = opaque16(&input).unwrap();
        assert_eq!(v, &[0xAA, 0xBB]);
        assert_eq!(rest, &[0xCC]);

        let input = [0x00, 0x00, 0x01, 0x11];
        let (rest, v) = opaque24(&input).unwrap();
        assert_eq!(v, &[0x11]);
        assert!(rest.is_empty());
    }

    #[test]
    fn declared_length_beyond_input() {
        let input = [0x03, 0x01, 0x02];
        assert!(opaque8(&input).is_err());
    }

    #[test]
    fn parse_exact_rejects_slack_and_shortfall() {
        let exact = [0x02, 0x01, 0x02];
        assert_eq!(parse_exact(&exact, opaque8).unwrap(), &[0x01, 0x02]);

        let slack = [0x02, 0x01, 0x02, 0x00];
        assert!(parse_exact(&slack, opaque8).is_err());

        let short = [0x02, 0x01];
        assert!(parse_exact(&short, opaque8).is_err());
    }

    #[test]
    fn nested_writers_patch_length() {
        let mut out = Vec::new();
        nested16(&mut out, |out| {
            nested8(out, |out| out.extend_from_slice(b"h2"));
            nested8(out, |out| out.extend_from_slice(b"http/1.1"));
        });
        assert_eq!(
            out,
            [0x00, 0x0C, 0x02, b'h', b'2', 0x08, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1']
        );

        let mut out = Vec::new();
        nested24(&mut out, |out| put_u16(out, 0xABCD));
        assert_eq!(out, [0x00, 0x00, 0x02, 0xAB, 0xCD]);
    }

    #[test]
    fn list_of_u16() {
        let input = [0x00, 0x04, 0x00, 0x17, 0x00, 0x1D];
        let (_, v) = list16(&input, be_u16).unwrap();
        assert_eq!(v, vec![0x17, 0x1D]);

        // Odd length cannot be covered by u16 items.
        let input = [0x00, 0x03, 0x00, 0x17, 0x00];
        assert!(list16(&input, be_u16).is_err());
    }
}
