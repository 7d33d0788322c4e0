//! Typed ASN.1 tags.
//!
//! Each type carries its `class` and `id` so implicit retagging is just a
//! struct literal away; the `Default` impls supply the universal identifier
//! of the type. `ASNTag` lowers a typed value into the generic
//! [`StructureTag`](../structure/struct.StructureTag.html) form, where only
//! the payload encoding differs between types.

use crate::common::TagClass;
use crate::structure::{StructureTag, PL};
use crate::universal::Types;
use crate::write;

/// Conversion of a typed tag into the serializable form.
pub trait ASNTag {
    fn into_structure(self) -> StructureTag;
}

/// The ASN.1 types needed by LDAP.
#[derive(Clone, Debug, PartialEq)]
pub enum Tag {
    /// Integer value.
    Integer(Integer),
    /// Integer carrying the Enumerated tag.
    Enumerated(Enumerated),
    /// String of bytes.
    OctetString(OctetString),
    /// Boolean value.
    Boolean(Boolean),
    /// Empty value.
    Null(Null),
    /// Ordered collection of values.
    Sequence(Sequence),
    /// Unordered collection of values; encodes in a canonical order.
    Set(Set),
    /// Explicitly tagged value. LDAP tags implicitly, but the Not filter
    /// needs a constructed wrapper around a single inner value.
    ExplicitTag(ExplicitTag),
    /// Pre-lowered value, passed through untouched.
    StructureTag(StructureTag),
}

impl ASNTag for Tag {
    fn into_structure(self) -> StructureTag {
        match self {
            Tag::Integer(i) => i.into_structure(),
            Tag::Enumerated(e) => e.into_structure(),
            Tag::OctetString(o) => o.into_structure(),
            Tag::Boolean(b) => b.into_structure(),
            Tag::Null(n) => n.into_structure(),
            Tag::Sequence(s) => s.into_structure(),
            Tag::Set(s) => s.into_structure(),
            Tag::ExplicitTag(e) => e.into_structure(),
            Tag::StructureTag(st) => st,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integer {
    pub id: u64,
    pub class: TagClass,
    pub inner: i64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Enumerated {
    pub id: u64,
    pub class: TagClass,
    pub inner: i64,
}

/// Minimal two's-complement encoding: drop every leading octet that merely
/// repeats the sign of the octet after it.
fn int_payload(inner: i64) -> Vec<u8> {
    let repr = inner.to_be_bytes();
    let mut skip = 0;
    while skip < repr.len() - 1 {
        let sign = repr[skip + 1] & 0x80;
        match repr[skip] {
            0x00 if sign == 0 => skip += 1,
            0xFF if sign != 0 => skip += 1,
            _ => break,
        }
    }
    repr[skip..].to_vec()
}

impl ASNTag for Integer {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::P(int_payload(self.inner)),
        }
    }
}

impl ASNTag for Enumerated {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::P(int_payload(self.inner)),
        }
    }
}

impl Default for Integer {
    fn default() -> Integer {
        Integer {
            id: Types::Integer as u64,
            class: TagClass::Universal,
            inner: 0,
        }
    }
}

impl Default for Enumerated {
    fn default() -> Enumerated {
        Enumerated {
            id: Types::Enumerated as u64,
            class: TagClass::Universal,
            inner: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OctetString {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<u8>,
}

impl ASNTag for OctetString {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::P(self.inner),
        }
    }
}

impl Default for OctetString {
    fn default() -> OctetString {
        OctetString {
            id: Types::OctetString as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Boolean {
    pub id: u64,
    pub class: TagClass,
    pub inner: bool,
}

impl ASNTag for Boolean {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::P(vec![if self.inner { 0xFF } else { 0x00 }]),
        }
    }
}

impl Default for Boolean {
    fn default() -> Boolean {
        Boolean {
            id: Types::Boolean as u64,
            class: TagClass::Universal,
            inner: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Null {
    pub id: u64,
    pub class: TagClass,
    pub inner: (),
}

impl ASNTag for Null {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::P(Vec::new()),
        }
    }
}

impl Default for Null {
    fn default() -> Null {
        Null {
            id: Types::Null as u64,
            class: TagClass::Universal,
            inner: (),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<Tag>,
}

impl ASNTag for Sequence {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::C(self.inner.into_iter().map(Tag::into_structure).collect()),
        }
    }
}

impl Default for Sequence {
    fn default() -> Sequence {
        Sequence {
            id: Types::Sequence as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Set {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<Tag>,
}

impl ASNTag for Set {
    /// Children are ordered by their encoded octet strings, so two sets with
    /// the same members serialize identically no matter the insertion order.
    fn into_structure(self) -> StructureTag {
        let mut children: Vec<StructureTag> =
            self.inner.into_iter().map(Tag::into_structure).collect();
        children.sort_by_cached_key(write::encode_to_vec);
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::C(children),
        }
    }
}

impl Default for Set {
    fn default() -> Set {
        Set {
            id: Types::Set as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

// No Default here; a freestanding explicit tag has no natural identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitTag {
    pub id: u64,
    pub class: TagClass,
    pub inner: Box<Tag>,
}

impl ASNTag for ExplicitTag {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::C(vec![self.inner.into_structure()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::PL;

    #[test]
    fn integer_minimal_positive() {
        // 127 fits a single octet; 128 needs a sign pad.
        assert_eq!(int_payload(127), vec![0x7F]);
        assert_eq!(int_payload(128), vec![0x00, 0x80]);
        assert_eq!(int_payload(0), vec![0x00]);
        assert_eq!(int_payload(256), vec![0x01, 0x00]);
    }

    #[test]
    fn integer_minimal_negative() {
        assert_eq!(int_payload(-1), vec![0xFF]);
        assert_eq!(int_payload(-128), vec![0x80]);
        assert_eq!(int_payload(-129), vec![0xFF, 0x7F]);
        assert_eq!(int_payload(i64::MIN), vec![0x80, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn boolean_bytes() {
        let t = Boolean {
            inner: true,
            ..Default::default()
        }
        .into_structure();
        assert_eq!(t.payload, PL::P(vec![0xFF]));
        let f = Boolean {
            inner: false,
            ..Default::default()
        }
        .into_structure();
        assert_eq!(f.payload, PL::P(vec![0x00]));
    }

    #[test]
    fn set_orders_members() {
        let forward = Set {
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: b"person".to_vec(),
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: b"top".to_vec(),
                    ..Default::default()
                }),
            ],
            ..Default::default()
        };
        let backward = Set {
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: b"top".to_vec(),
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: b"person".to_vec(),
                    ..Default::default()
                }),
            ],
            ..Default::default()
        };
        assert_eq!(forward.into_structure(), backward.into_structure());
    }
}
