//! Streaming BER parser.
//!
//! Built on `nom`'s streaming byte parsers: a value cut short by the network
//! yields `Err(Incomplete)` and consumes nothing, so the caller can retry
//! with the same buffer once more bytes have been appended.

use crate::common::{TagClass, TagStructure};
use crate::structure::{StructureTag, PL};

use nom::bytes::streaming::take;
use nom::error::{Error, ErrorKind, ParseError};
use nom::number::streaming::be_u8;
use nom::{Err, IResult, Needed};

fn fail<T>(i: &[u8], kind: ErrorKind) -> IResult<&[u8], T> {
    Err(Err::Failure(Error::from_error_kind(i, kind)))
}

fn parse_type_header(i: &[u8]) -> IResult<&[u8], (TagClass, TagStructure, u64)> {
    let (i, lead) = be_u8(i)?;
    let class = match lead >> 6 {
        0 => TagClass::Universal,
        1 => TagClass::Application,
        2 => TagClass::Context,
        _ => TagClass::Private,
    };
    let form = if lead & 0x20 == 0 {
        TagStructure::Primitive
    } else {
        TagStructure::Constructed
    };
    if lead & 0x1F != 0x1F {
        return Ok((i, (class, form, (lead & 0x1F) as u64)));
    }
    // High tag number: base-128 octets, continuation bit on all but the last.
    let mut id = 0u64;
    let mut rest = i;
    loop {
        let (j, octet) = be_u8(rest)?;
        rest = j;
        if id > u64::MAX >> 7 {
            return fail(rest, ErrorKind::TooLarge);
        }
        id = id << 7 | (octet & 0x7F) as u64;
        if octet & 0x80 == 0 {
            break;
        }
    }
    Ok((rest, (class, form, id)))
}

fn parse_length(i: &[u8]) -> IResult<&[u8], usize> {
    let (i, lead) = be_u8(i)?;
    if lead < 128 {
        return Ok((i, lead as usize));
    }
    if lead == 0x80 {
        // Indefinite length; we never emit it and refuse to consume it.
        return fail(i, ErrorKind::LengthValue);
    }
    let count = (lead & 0x7F) as usize;
    if count > std::mem::size_of::<usize>() {
        return fail(i, ErrorKind::TooLarge);
    }
    let (i, octets) = take(count)(i)?;
    let len = octets.iter().fold(0usize, |acc, &b| acc << 8 | b as usize);
    Ok((i, len))
}

/// Fold a primitive payload into an unsigned integer.
pub fn parse_uint(i: &[u8]) -> IResult<&[u8], u64> {
    if i.len() > 8 {
        return fail(i, ErrorKind::TooLarge);
    }
    Ok((i, i.iter().fold(0, |acc, &b| acc << 8 | b as u64)))
}

/// Fold a primitive payload into a signed two's-complement integer.
pub fn parse_int(i: &[u8]) -> IResult<&[u8], i64> {
    if i.is_empty() || i.len() > 8 {
        return fail(i, ErrorKind::TooLarge);
    }
    let init: i64 = if i[0] & 0x80 != 0 { -1 } else { 0 };
    Ok((i, i.iter().fold(init, |acc, &b| acc << 8 | b as i64)))
}

/// Parse one complete TLV from the input, recursing into constructed values.
pub fn parse_tag(i: &[u8]) -> IResult<&[u8], StructureTag> {
    let (i, (class, form, id)) = parse_type_header(i)?;
    let (i, len) = parse_length(i)?;
    let (i, mut contents) = take(len)(i)?;

    let payload = match form {
        TagStructure::Primitive => PL::P(contents.to_vec()),
        TagStructure::Constructed => {
            let mut children = Vec::new();
            while !contents.is_empty() {
                // The enclosing length promised complete children; a short
                // child here is corruption, not a retryable condition.
                let (rest, child) = match parse_tag(contents) {
                    Ok(ok) => ok,
                    Err(Err::Incomplete(_)) => return fail(contents, ErrorKind::Complete),
                    Err(e) => return Err(e),
                };
                contents = rest;
                children.push(child);
            }
            PL::C(children)
        }
    };

    Ok((i, StructureTag { class, id, payload }))
}

/// Handle for parsing successive messages off a streaming buffer.
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse<'a>(&mut self, input: &'a [u8]) -> IResult<&'a [u8], StructureTag> {
        if input.is_empty() {
            return Err(Err::Incomplete(Needed::Unknown));
        }
        parse_tag(input)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TagClass;
    use crate::structure::{StructureTag, PL};

    #[test]
    fn primitive() {
        let bytes: Vec<u8> = vec![2, 2, 255, 127];
        let expected = StructureTag {
            class: TagClass::Universal,
            id: 2,
            payload: PL::P(vec![255, 127]),
        };
        assert_eq!(parse_tag(&bytes), Ok((&b""[..], expected)));
    }

    #[test]
    fn constructed() {
        let bytes: Vec<u8> = vec![48, 14, 12, 12, 72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100, 33];
        let expected = StructureTag {
            class: TagClass::Universal,
            id: 16,
            payload: PL::C(vec![StructureTag {
                class: TagClass::Universal,
                id: 12,
                payload: PL::P(b"Hello World!".to_vec()),
            }]),
        };
        assert_eq!(parse_tag(&bytes), Ok((&b""[..], expected)));
    }

    #[test]
    fn long_form_length() {
        let mut bytes = vec![0x04, 0x82, 0x01, 0x2C];
        bytes.extend(std::iter::repeat(0x55).take(300));
        let (rest, tag) = parse_tag(&bytes).expect("parse");
        assert!(rest.is_empty());
        assert_eq!(tag.expect_primitive().expect("primitive").len(), 300);
    }

    #[test]
    fn high_tag_number() {
        let bytes = vec![0x9F, 0x87, 0x68, 0x01, 0xAA];
        let (_, tag) = parse_tag(&bytes).expect("parse");
        assert_eq!(tag.class, TagClass::Context);
        assert_eq!(tag.id, 1000);
    }

    #[test]
    fn truncated_is_incomplete() {
        // Length says 4 octets, only 2 arrived so far.
        let bytes: Vec<u8> = vec![0x04, 0x04, 0x61, 0x62];
        assert!(matches!(parse_tag(&bytes), Err(Err::Incomplete(_))));
        // A truncated header behaves the same way.
        assert!(matches!(parse_tag(&[0x30][..]), Err(Err::Incomplete(_))));
    }

    #[test]
    fn indefinite_length_rejected() {
        let bytes: Vec<u8> = vec![0x30, 0x80, 0x04, 0x01, 0x61, 0x00, 0x00];
        assert!(matches!(parse_tag(&bytes), Err(Err::Failure(_))));
    }

    #[test]
    fn truncated_child_is_failure() {
        // Outer length covers a child whose own length overruns it.
        let bytes: Vec<u8> = vec![0x30, 0x03, 0x04, 0x04, 0x61];
        assert!(matches!(parse_tag(&bytes), Err(Err::Failure(_))));
    }

    #[test]
    fn signed_payloads() {
        assert_eq!(parse_int(&[0xFF]).map(|r| r.1), Ok(-1));
        assert_eq!(parse_int(&[0x80]).map(|r| r.1), Ok(-128));
        assert_eq!(parse_int(&[0x00, 0x80]).map(|r| r.1), Ok(128));
        assert_eq!(
            parse_int(&i64::MIN.to_be_bytes()).map(|r| r.1),
            Ok(i64::MIN)
        );
        assert!(parse_int(&[0u8; 9]).is_err());
    }

    #[test]
    fn roundtrip_full_range() {
        use crate::structures::{ASNTag, Integer, Tag};
        for n in [
            0i64,
            1,
            -1,
            127,
            128,
            -128,
            -129,
            255,
            256,
            i32::MAX as i64,
            i32::MIN as i64,
            i64::MAX,
            i64::MIN,
        ] {
            let st = Tag::Integer(Integer {
                inner: n,
                ..Default::default()
            })
            .into_structure();
            let bytes = crate::write::encode_to_vec(&st);
            let (rest, tag) = parse_tag(&bytes).expect("parse");
            assert!(rest.is_empty());
            let body = tag.expect_primitive().expect("primitive");
            assert_eq!(parse_int(&body).map(|r| r.1), Ok(n), "value {}", n);
        }
    }
}
