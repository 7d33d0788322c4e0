use crate::common::TagClass;

/// A generic BER value ready for serialization, or freshly parsed.
///
/// The identifier is kept as a (class, tag number) pair; the encoding form
/// follows from the payload variant.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StructureTag {
    pub class: TagClass,
    pub id: u64,
    pub payload: PL,
}

/// Payload of a tagged value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PL {
    /// Primitive contents.
    P(Vec<u8>),
    /// Constructed contents.
    C(Vec<StructureTag>),
}

impl StructureTag {
    /// Keep the tag if its class matches, drop it otherwise.
    pub fn match_class(self, class: TagClass) -> Option<Self> {
        if self.class == class { Some(self) } else { None }
    }

    /// Keep the tag if its tag number matches, drop it otherwise.
    pub fn match_id(self, id: u64) -> Option<Self> {
        if self.id == id { Some(self) } else { None }
    }

    /// Unwrap a constructed payload.
    pub fn expect_constructed(self) -> Option<Vec<StructureTag>> {
        match self.payload {
            PL::P(_) => None,
            PL::C(children) => Some(children),
        }
    }

    /// Unwrap a primitive payload.
    pub fn expect_primitive(self) -> Option<Vec<u8>> {
        match self.payload {
            PL::P(bytes) => Some(bytes),
            PL::C(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TagClass;

    fn sample() -> StructureTag {
        StructureTag {
            class: TagClass::Application,
            id: 1,
            payload: PL::C(vec![
                StructureTag {
                    class: TagClass::Universal,
                    id: 10,
                    payload: PL::P(vec![0]),
                },
                StructureTag {
                    class: TagClass::Universal,
                    id: 4,
                    payload: PL::P(b"dc=example".to_vec()),
                },
            ]),
        }
    }

    #[test]
    fn match_chain() {
        let out = sample()
            .match_class(TagClass::Application)
            .and_then(|t| t.match_id(1));
        assert_eq!(out, Some(sample()));
        assert!(sample().match_id(2).is_none());
        assert!(sample().match_class(TagClass::Context).is_none());
    }

    #[test]
    fn unwrap_payloads() {
        let children = sample().expect_constructed().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[1].clone().expect_primitive().unwrap(),
            b"dc=example".to_vec()
        );
        assert!(children[0].clone().expect_constructed().is_none());
    }
}
