use bytes::BytesMut;
use lber::common::TagClass;
use lber::parse::{parse_int, parse_tag};
use lber::structures::{ASNTag, Integer, OctetString, Sequence, Tag};
use lber::universal::Types;
use lber::write;

use super::{ControlParser, MakeCritical, RawControl};
use crate::result::{LdapError, Result};

pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// Paged Results control ([RFC 2696](https://tools.ietf.org/html/rfc2696)).
///
/// The same structure is used for requests and responses. In a request,
/// `size` asks for a page of at most that many entries, and `cookie` is
/// empty on the first search, then echoed from the previous response. A
/// response with an empty cookie marks the last page.
#[derive(Clone, Debug)]
pub struct PagedResults {
    /// Requested page size or the server's result-set size estimate.
    pub size: i32,
    /// Paging position marker, opaque to the client.
    pub cookie: Vec<u8>,
}

impl MakeCritical for PagedResults {}

impl From<PagedResults> for RawControl {
    fn from(pr: PagedResults) -> RawControl {
        let val = Tag::Sequence(Sequence {
            inner: vec![
                Tag::Integer(Integer {
                    inner: pr.size as i64,
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: pr.cookie,
                    ..Default::default()
                }),
            ],
            ..Default::default()
        });
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, &val.into_structure());
        RawControl {
            ctype: PAGED_RESULTS_OID.to_owned(),
            crit: false,
            val: Some(Vec::from(&buf[..])),
        }
    }
}

impl ControlParser for PagedResults {
    fn parse(val: &[u8]) -> Result<PagedResults> {
        let tag = match parse_tag(val) {
            Ok((_, tag)) => tag,
            _ => return Err(LdapError::BerDecode("paged results value")),
        };
        let mut elems = tag
            .expect_constructed()
            .ok_or(LdapError::BerDecode("paged results value"))?
            .into_iter();
        let size_bytes = elems
            .next()
            .and_then(|t| t.match_class(TagClass::Universal))
            .and_then(|t| t.match_id(Types::Integer as u64))
            .and_then(|t| t.expect_primitive())
            .ok_or(LdapError::BerDecode("page size"))?;
        let size = match parse_int(size_bytes.as_slice()) {
            Ok((_, size)) => size as i32,
            _ => return Err(LdapError::BerDecode("page size")),
        };
        let cookie = elems
            .next()
            .and_then(|t| t.expect_primitive())
            .ok_or(LdapError::BerDecode("page cookie"))?;
        Ok(PagedResults { size, cookie })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let rc: RawControl = PagedResults {
            size: 50,
            cookie: b"opaque".to_vec(),
        }
        .into();
        assert_eq!(rc.ctype, PAGED_RESULTS_OID);
        assert!(!rc.crit);
        let pr = PagedResults::parse(rc.val.as_deref().unwrap()).unwrap();
        assert_eq!(pr.size, 50);
        assert_eq!(pr.cookie, b"opaque".to_vec());
    }
}
