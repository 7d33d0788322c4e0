//! BER serialization.

use crate::common::{TagClass, TagStructure};
use crate::structure::{StructureTag, PL};

use bytes::BytesMut;

/// Serialize a tag into the output buffer.
pub fn encode_into(buf: &mut BytesMut, tag: &StructureTag) {
    let mut out = Vec::new();
    encode_tag(&mut out, tag);
    buf.extend_from_slice(&out);
}

/// Serialize a tag into a fresh vector. Also used as the canonical ordering
/// key for set-of members.
pub(crate) fn encode_to_vec(tag: &StructureTag) -> Vec<u8> {
    let mut out = Vec::new();
    encode_tag(&mut out, tag);
    out
}

fn encode_tag(out: &mut Vec<u8>, tag: &StructureTag) {
    match &tag.payload {
        PL::P(contents) => {
            write_type(out, tag.class, TagStructure::Primitive, tag.id);
            write_length(out, contents.len());
            out.extend_from_slice(contents);
        }
        PL::C(children) => {
            let mut body = Vec::new();
            for child in children {
                encode_tag(&mut body, child);
            }
            write_type(out, tag.class, TagStructure::Constructed, tag.id);
            write_length(out, body.len());
            out.extend_from_slice(&body);
        }
    }
}

fn write_type(out: &mut Vec<u8>, class: TagClass, form: TagStructure, id: u64) {
    let lead = (class as u8) << 6 | (form as u8) << 5;
    if id <= 30 {
        out.push(lead | id as u8);
        return;
    }
    // High tag number: base-128 follow-up octets, all but the last with
    // the continuation bit set.
    out.push(lead | 0x1F);
    let mut shift = (63 - id.leading_zeros() as u64) / 7 * 7;
    loop {
        let septet = ((id >> shift) & 0x7F) as u8;
        if shift == 0 {
            out.push(septet);
            break;
        }
        out.push(septet | 0x80);
        shift -= 7;
    }
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    // Short definite form up to 127, else minimal big-endian long form.
    if len < 128 {
        out.push(len as u8);
        return;
    }
    let repr = (len as u64).to_be_bytes();
    let skip = (len as u64).leading_zeros() as usize / 8;
    out.push(0x80 | (repr.len() - skip) as u8);
    out.extend_from_slice(&repr[skip..]);
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use crate::common::TagClass::*;
    use crate::structures::*;

    fn encoded(tag: Tag) -> BytesMut {
        let mut buf = BytesMut::new();
        super::encode_into(&mut buf, &tag.into_structure());
        buf
    }

    #[test]
    fn primitive_integer() {
        let tag = Tag::Integer(Integer {
            inner: 1616,
            ..Default::default()
        });
        assert_eq!(encoded(tag), &[0x02, 0x02, 0x06, 0x50][..]);
    }

    #[test]
    fn nested_sequence() {
        let tag = Tag::Sequence(Sequence {
            inner: vec![Tag::OctetString(OctetString {
                inner: b"Hello World!".to_vec(),
                ..Default::default()
            })],
            ..Default::default()
        });
        assert_eq!(
            encoded(tag),
            &[48, 14, 4, 12, 72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100, 33][..]
        );
    }

    #[test]
    fn application_and_context_retagging() {
        let tag = Tag::Sequence(Sequence {
            inner: vec![
                Tag::Integer(Integer {
                    inner: 1,
                    ..Default::default()
                }),
                Tag::Sequence(Sequence {
                    id: 0,
                    class: Application,
                    inner: vec![
                        Tag::Integer(Integer {
                            inner: 3,
                            ..Default::default()
                        }),
                        Tag::OctetString(OctetString {
                            inner: b"cn=root,dc=plabs".to_vec(),
                            ..Default::default()
                        }),
                        Tag::OctetString(OctetString {
                            id: 0,
                            class: Context,
                            inner: b"asdf".to_vec(),
                        }),
                    ],
                }),
            ],
            ..Default::default()
        });
        let expected = vec![
            0x30, 0x20, 0x02, 0x01, 0x01, 0x60, 0x1B, 0x02, 0x01, 0x03, 0x04, 0x10, 0x63, 0x6E,
            0x3D, 0x72, 0x6F, 0x6F, 0x74, 0x2C, 0x64, 0x63, 0x3D, 0x70, 0x6C, 0x61, 0x62, 0x73,
            0x80, 0x04, 0x61, 0x73, 0x64, 0x66,
        ];
        assert_eq!(encoded(tag), expected);
    }

    #[test]
    fn long_form_length() {
        let tag = Tag::OctetString(OctetString {
            inner: vec![0x55; 300],
            ..Default::default()
        });
        let buf = encoded(tag);
        assert_eq!(&buf[..4], &[0x04, 0x82, 0x01, 0x2C]);
        assert_eq!(buf.len(), 304);
    }

    #[test]
    fn high_tag_number() {
        let tag = Tag::OctetString(OctetString {
            id: 1000,
            class: Context,
            inner: vec![0xAA],
        });
        // 1000 = 0x3E8 -> 0x87 0x68 in base 128
        assert_eq!(encoded(tag), &[0x9F, 0x87, 0x68, 0x01, 0xAA][..]);
    }
}
