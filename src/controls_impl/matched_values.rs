use bytes::BytesMut;
use lber::structures::{ASNTag, Sequence, Tag};
use lber::write;

use super::RawControl;
use crate::filter::Filter;
use crate::result::{LdapError, Result};

pub const MATCHED_VALUES_OID: &str = "1.2.826.0.1.3344810.2.3";

/// Matched Values control ([RFC 3876](https://tools.ietf.org/html/rfc3876)).
///
/// Restricts the values returned for an entry's attributes to those
/// matching one of the given filters. Only simple filter items are
/// allowed; and/or/not compositions have no place in the value list and
/// are rejected at construction.
#[derive(Clone, Debug)]
pub struct MatchedValues {
    val: Vec<u8>,
}

impl MatchedValues {
    pub fn new(filters: &[Filter]) -> Result<MatchedValues> {
        for filter in filters {
            if matches!(
                filter,
                Filter::And(_) | Filter::Or(_) | Filter::Not(_) | Filter::Extensible { dn_attrs: true, .. }
            ) {
                return Err(LdapError::NotSimpleFilter);
            }
        }
        let val = Tag::Sequence(Sequence {
            inner: filters.iter().map(Filter::to_tag).collect(),
            ..Default::default()
        });
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, &val.into_structure());
        Ok(MatchedValues {
            val: Vec::from(&buf[..]),
        })
    }
}

impl From<MatchedValues> for RawControl {
    fn from(mv: MatchedValues) -> RawControl {
        RawControl {
            ctype: MATCHED_VALUES_OID.to_owned(),
            crit: false,
            val: Some(mv.val),
        }
    }
}
