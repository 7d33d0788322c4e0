use bytes::BytesMut;
use lber::common::TagClass;
use lber::structures::{ASNTag, Boolean, OctetString, Sequence, Tag};
use lber::write;

use super::{MakeCritical, RawControl};

pub const SORT_REQ_OID: &str = "1.2.840.113556.1.4.473";

/// One key of a server-side sort.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortKey {
    /// Attribute to sort by.
    pub attr: String,
    /// Ordering matching rule OID, if not the attribute's own.
    pub rule: Option<String>,
    /// Sort in descending order.
    pub reverse: bool,
}

impl SortKey {
    /// Parse the `attr[:rule][:reverse]` form used on the command line:
    /// `cn`, `cn:reverse`, `cn:2.5.13.3:reverse`.
    pub fn parse_spec(spec: &str) -> SortKey {
        let mut parts = spec.splitn(3, ':');
        let mut key = SortKey {
            attr: parts.next().unwrap_or("").to_string(),
            ..Default::default()
        };
        match (parts.next(), parts.next()) {
            (Some(flag), None) if flag.eq_ignore_ascii_case("reverse") => key.reverse = true,
            (Some(rule), None) => key.rule = Some(rule.to_string()),
            (Some(rule), Some(flag)) => {
                key.rule = Some(rule.to_string());
                key.reverse = flag.eq_ignore_ascii_case("reverse");
            }
            _ => (),
        }
        key
    }
}

/// Server Side Sorting request control ([RFC 2891](https://tools.ietf.org/html/rfc2891)).
#[derive(Clone, Debug)]
pub struct SortRequest {
    pub keys: Vec<SortKey>,
}

impl MakeCritical for SortRequest {}

impl From<SortRequest> for RawControl {
    fn from(sr: SortRequest) -> RawControl {
        let keys = sr
            .keys
            .into_iter()
            .map(|key| {
                let mut inner = vec![Tag::OctetString(OctetString {
                    inner: key.attr.into_bytes(),
                    ..Default::default()
                })];
                if let Some(rule) = key.rule {
                    inner.push(Tag::OctetString(OctetString {
                        id: 0,
                        class: TagClass::Context,
                        inner: rule.into_bytes(),
                    }));
                }
                if key.reverse {
                    inner.push(Tag::Boolean(Boolean {
                        id: 1,
                        class: TagClass::Context,
                        inner: true,
                    }));
                }
                Tag::Sequence(Sequence {
                    inner,
                    ..Default::default()
                })
            })
            .collect();
        let val = Tag::Sequence(Sequence {
            inner: keys,
            ..Default::default()
        });
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, &val.into_structure());
        RawControl {
            ctype: SORT_REQ_OID.to_owned(),
            crit: false,
            val: Some(Vec::from(&buf[..])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_specs() {
        assert_eq!(
            SortKey::parse_spec("cn"),
            SortKey {
                attr: "cn".into(),
                rule: None,
                reverse: false
            }
        );
        assert_eq!(
            SortKey::parse_spec("cn:reverse"),
            SortKey {
                attr: "cn".into(),
                rule: None,
                reverse: true
            }
        );
        assert_eq!(
            SortKey::parse_spec("cn:2.5.13.3"),
            SortKey {
                attr: "cn".into(),
                rule: Some("2.5.13.3".into()),
                reverse: false
            }
        );
        assert_eq!(
            SortKey::parse_spec("cn:2.5.13.3:reverse"),
            SortKey {
                attr: "cn".into(),
                rule: Some("2.5.13.3".into()),
                reverse: true
            }
        );
    }
}
