//! LDAPMessage envelope assembly and disassembly.

use bytes::{Buf, BytesMut};

use crate::controls::{Control, RawControl};
use crate::controls_impl::{build_tag, parse_controls};
use crate::result::{LdapError, Result};

use lber::common::TagClass;
use lber::parse::parse_uint;
use lber::structure::{StructureTag, PL};
use lber::structures::{ASNTag, Integer, Sequence, Tag};
use lber::universal::Types;
use lber::write;

// Application tags of the protocol ops (RFC 4511, appendix B).
pub(crate) const BIND_REQ: u64 = 0;
pub(crate) const BIND_RESP: u64 = 1;
pub(crate) const UNBIND_REQ: u64 = 2;
pub(crate) const SEARCH_REQ: u64 = 3;
pub(crate) const SEARCH_RES_ENTRY: u64 = 4;
pub(crate) const SEARCH_RES_DONE: u64 = 5;
pub(crate) const MODIFY_REQ: u64 = 6;
pub(crate) const MODIFY_RESP: u64 = 7;
pub(crate) const ADD_REQ: u64 = 8;
pub(crate) const ADD_RESP: u64 = 9;
pub(crate) const DELETE_REQ: u64 = 10;
pub(crate) const DELETE_RESP: u64 = 11;
pub(crate) const MODDN_REQ: u64 = 12;
pub(crate) const MODDN_RESP: u64 = 13;
pub(crate) const COMPARE_REQ: u64 = 14;
pub(crate) const COMPARE_RESP: u64 = 15;
pub(crate) const ABANDON_REQ: u64 = 16;
pub(crate) const SEARCH_RES_REF: u64 = 19;
pub(crate) const EXTENDED_REQ: u64 = 23;
pub(crate) const EXTENDED_RESP: u64 = 24;
pub(crate) const INTERMEDIATE_RESP: u64 = 25;

/// One decoded LDAPMessage.
pub(crate) struct Envelope {
    pub id: i32,
    pub protoop: StructureTag,
    pub ctrls: Vec<Control>,
}

/// Serialize a request envelope: message ID, the application-tagged
/// operation, and any controls under context-constructed tag 0 of the
/// outer sequence.
pub(crate) fn encode_envelope(
    buf: &mut BytesMut,
    id: i32,
    protoop: Tag,
    controls: Vec<RawControl>,
) {
    let mut msg = vec![
        Tag::Integer(Integer {
            inner: id as i64,
            ..Default::default()
        }),
        protoop,
    ];
    if !controls.is_empty() {
        msg.push(Tag::StructureTag(StructureTag {
            id: 0,
            class: TagClass::Context,
            payload: PL::C(controls.into_iter().map(|c| build_tag(c).into_structure()).collect()),
        }));
    }
    let envelope = Tag::Sequence(Sequence {
        inner: msg,
        ..Default::default()
    });
    write::encode_into(buf, &envelope.into_structure());
}

/// Extract one envelope from the front of the buffer.
///
/// Returns `Ok(None)` when the buffer doesn't yet hold a complete message;
/// nothing is consumed in that case, so the caller can read more bytes and
/// retry. Anything malformed is an error and poisons the exchange.
pub(crate) fn decode_envelope(buf: &mut BytesMut) -> Result<Option<Envelope>> {
    let mut parser = lber::Parser::new();
    let (rest_len, tag) = match parser.parse(buf) {
        Ok((rest, tag)) => (rest.len(), tag),
        Err(e) if e.is_incomplete() => return Ok(None),
        Err(_) => return Err(LdapError::BerDecode("envelope")),
    };
    buf.advance(buf.len() - rest_len);

    let mut tags = tag
        .match_class(TagClass::Universal)
        .and_then(|t| t.match_id(Types::Sequence as u64))
        .and_then(|t| t.expect_constructed())
        .ok_or(LdapError::BerDecode("envelope sequence"))?;
    let mut maybe_controls = tags.pop().ok_or(LdapError::BerDecode("empty envelope"))?;
    let has_controls = match maybe_controls {
        StructureTag {
            id,
            class,
            ref payload,
        } if class == TagClass::Context && id == 0 => match *payload {
            PL::C(_) => true,
            PL::P(_) => return Err(LdapError::BerDecode("controls")),
        },
        StructureTag { id, class, .. } if class == TagClass::Context && id == 10 => {
            // Active Directory quirk: its Notice of Disconnection puts the
            // notification OID at the end of the envelope, where controls
            // would go, instead of inside the ExtendedResponse. Skip it.
            maybe_controls = tags.pop().ok_or(LdapError::BerDecode("empty envelope"))?;
            false
        }
        _ => false,
    };
    let (protoop, ctrls) = if has_controls {
        let protoop = tags.pop().ok_or(LdapError::BerDecode("protocol op"))?;
        (protoop, parse_controls(maybe_controls)?)
    } else {
        (maybe_controls, vec![])
    };
    let id_bytes = tags
        .pop()
        .and_then(|t| t.match_class(TagClass::Universal))
        .and_then(|t| t.match_id(Types::Integer as u64))
        .and_then(|t| t.expect_primitive())
        .ok_or(LdapError::BerDecode("message id"))?;
    let id = match parse_uint(id_bytes.as_slice()) {
        Ok((_, id)) if id <= i32::MAX as u64 => id as i32,
        _ => return Err(LdapError::BerDecode("message id")),
    };
    Ok(Some(Envelope { id, protoop, ctrls }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lber::structures::OctetString;

    fn sample_request() -> BytesMut {
        let mut buf = BytesMut::new();
        let op = Tag::OctetString(OctetString {
            id: DELETE_REQ,
            class: TagClass::Application,
            inner: b"dc=example".to_vec(),
        });
        encode_envelope(&mut buf, 7, op, vec![]);
        buf
    }

    #[test]
    fn envelope_roundtrip() {
        let mut buf = sample_request();
        let env = decode_envelope(&mut buf).unwrap().expect("envelope");
        assert_eq!(env.id, 7);
        assert_eq!(env.protoop.class, TagClass::Application);
        assert_eq!(env.protoop.id, DELETE_REQ);
        assert!(env.ctrls.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_leaves_buffer_untouched() {
        let full = sample_request();
        let mut partial = BytesMut::from(&full[..full.len() - 3]);
        assert!(decode_envelope(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), full.len() - 3);
        // retry succeeds once the rest arrives
        partial.extend_from_slice(&full[full.len() - 3..]);
        assert!(decode_envelope(&mut partial).unwrap().is_some());
    }

    #[test]
    fn controls_are_decoded() {
        let mut buf = BytesMut::new();
        let op = Tag::OctetString(OctetString {
            id: DELETE_REQ,
            class: TagClass::Application,
            inner: b"dc=example".to_vec(),
        });
        let ctrl = RawControl {
            ctype: "1.2.840.113556.1.4.319".to_string(),
            crit: true,
            val: Some(vec![0x30, 0x00]),
        };
        encode_envelope(&mut buf, 3, op, vec![ctrl]);
        let env = decode_envelope(&mut buf).unwrap().expect("envelope");
        assert_eq!(env.ctrls.len(), 1);
        let raw = &env.ctrls[0].1;
        assert_eq!(raw.ctype, "1.2.840.113556.1.4.319");
        assert!(raw.crit);
        assert_eq!(raw.val.as_deref(), Some(&[0x30u8, 0x00][..]));
    }

    #[test]
    fn two_envelopes_in_one_buffer() {
        let mut buf = sample_request();
        buf.extend_from_slice(&sample_request());
        assert!(decode_envelope(&mut buf).unwrap().is_some());
        assert!(decode_envelope(&mut buf).unwrap().is_some());
        assert!(decode_envelope(&mut buf).unwrap().is_none());
    }
}
