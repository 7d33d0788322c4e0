use bytes::BytesMut;
use lber::common::TagClass;
use lber::parse::parse_tag;
use lber::structures::{ASNTag, OctetString, Sequence, Tag};
use lber::write;

use super::{Exop, ExopParser};
use crate::result::{LdapError, Result};

pub const PASSMOD_OID: &str = "1.3.6.1.4.1.4203.1.11.1";

/// Password Modify extended operation ([RFC 3062](https://tools.ietf.org/html/rfc3062)).
///
/// All elements are optional. A missing `user_id` targets the bound user;
/// a missing `new_passwd` asks the server to generate one, returned in the
/// response.
#[derive(Clone, Debug, Default)]
pub struct PasswordModify<'a> {
    /// Authentication identity, typically a DN prefixed with `dn:`, or a
    /// plain DN.
    pub user_id: Option<&'a str>,
    /// Current password of the identity.
    pub old_passwd: Option<&'a str>,
    /// New password to set.
    pub new_passwd: Option<&'a str>,
}

/// Password Modify response.
#[derive(Clone, Debug)]
pub struct PasswordModifyResp {
    /// Server-generated password, present when none was proposed.
    pub gen_passwd: Option<String>,
}

impl<'a> From<PasswordModify<'a>> for Exop {
    fn from(pm: PasswordModify) -> Exop {
        let mut inner = vec![];
        for (id, elem) in [(0, pm.user_id), (1, pm.old_passwd), (2, pm.new_passwd)] {
            if let Some(elem) = elem {
                inner.push(Tag::OctetString(OctetString {
                    id,
                    class: TagClass::Context,
                    inner: Vec::from(elem.as_bytes()),
                }));
            }
        }
        let req = Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        });
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, &req.into_structure());
        Exop {
            name: Some(PASSMOD_OID.to_owned()),
            val: Some(Vec::from(&buf[..])),
        }
    }
}

impl ExopParser for PasswordModifyResp {
    fn parse(val: &[u8]) -> Result<PasswordModifyResp> {
        let tag = match parse_tag(val) {
            Ok((_, tag)) => tag,
            _ => return Err(LdapError::BerDecode("password modify response")),
        };
        let mut gen_passwd = None;
        let elems = tag
            .expect_constructed()
            .ok_or(LdapError::BerDecode("password modify response"))?;
        for elem in elems {
            if elem.id == 0 && elem.class == TagClass::Context {
                let passwd = elem
                    .expect_primitive()
                    .ok_or(LdapError::BerDecode("genPasswd"))?;
                gen_passwd =
                    Some(String::from_utf8(passwd).map_err(|_| LdapError::DecodingUTF8)?);
            }
        }
        Ok(PasswordModifyResp { gen_passwd })
    }
}
