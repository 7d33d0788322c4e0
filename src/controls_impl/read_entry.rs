use bytes::BytesMut;
use lber::parse::parse_tag;
use lber::structures::{ASNTag, OctetString, Sequence, Tag};
use lber::write;

use super::{ControlParser, RawControl};
use crate::result::{LdapError, Result};
use crate::search::SearchEntry;

pub const PRE_READ_OID: &str = "1.3.6.1.1.13.1";
pub const POST_READ_OID: &str = "1.3.6.1.1.13.2";

fn attr_list_value(attrs: Vec<String>) -> Vec<u8> {
    let val = Tag::Sequence(Sequence {
        inner: attrs
            .into_iter()
            .map(|attr| {
                Tag::OctetString(OctetString {
                    inner: attr.into_bytes(),
                    ..Default::default()
                })
            })
            .collect(),
        ..Default::default()
    });
    let mut buf = BytesMut::new();
    write::encode_into(&mut buf, &val.into_structure());
    Vec::from(&buf[..])
}

/// Pre-Read request control ([RFC 4527](https://tools.ietf.org/html/rfc4527)).
///
/// Asks the server to return the named attributes of the target entry as
/// it looked _before_ the accompanying modify, delete or modify-DN took
/// effect.
#[derive(Clone, Debug)]
pub struct PreRead {
    /// Attribute selection; empty means all user attributes.
    pub attrs: Vec<String>,
}

/// Post-Read request control ([RFC 4527](https://tools.ietf.org/html/rfc4527)).
///
/// Like [`PreRead`](struct.PreRead.html), but captures the entry _after_
/// the accompanying add, modify or modify-DN took effect.
#[derive(Clone, Debug)]
pub struct PostRead {
    /// Attribute selection; empty means all user attributes.
    pub attrs: Vec<String>,
}

impl From<PreRead> for RawControl {
    fn from(pr: PreRead) -> RawControl {
        RawControl {
            ctype: PRE_READ_OID.to_owned(),
            crit: false,
            val: Some(attr_list_value(pr.attrs)),
        }
    }
}

impl From<PostRead> for RawControl {
    fn from(pr: PostRead) -> RawControl {
        RawControl {
            ctype: POST_READ_OID.to_owned(),
            crit: false,
            val: Some(attr_list_value(pr.attrs)),
        }
    }
}

/// Entry returned in a Pre-Read or Post-Read response control.
#[derive(Clone, Debug)]
pub struct ReadEntryResp {
    pub entry: SearchEntry,
}

/// Pre-Read response control.
pub type PreReadResp = ReadEntryResp;

/// Post-Read response control.
pub type PostReadResp = ReadEntryResp;

impl ControlParser for ReadEntryResp {
    fn parse(val: &[u8]) -> Result<ReadEntryResp> {
        let tag = match parse_tag(val) {
            Ok((_, tag)) => tag,
            _ => return Err(LdapError::BerDecode("read entry value")),
        };
        let entry = SearchEntry::from_tag(tag)?;
        Ok(ReadEntryResp { entry })
    }
}
