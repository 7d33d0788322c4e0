use bytes::BytesMut;
use lber::structures::{ASNTag, Integer, Sequence, Tag};
use lber::write;

use super::Exop;

pub const CANCEL_OID: &str = "1.3.6.1.1.8";

/// Cancel extended operation ([RFC 3909](https://tools.ietf.org/html/rfc3909)).
///
/// Unlike Abandon, Cancel is answered by the server, making the outcome
/// observable: a result of `canceled` (118) on the target operation and
/// `success` on the Cancel itself, or an error such as `noSuchOperation`.
#[derive(Clone, Debug)]
pub struct Cancel {
    /// Message ID of the operation to cancel.
    pub msg_id: i32,
}

impl From<Cancel> for Exop {
    fn from(c: Cancel) -> Exop {
        let req = Tag::Sequence(Sequence {
            inner: vec![Tag::Integer(Integer {
                inner: c.msg_id as i64,
                ..Default::default()
            })],
            ..Default::default()
        });
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, &req.into_structure());
        Exop {
            name: Some(CANCEL_OID.to_owned()),
            val: Some(Vec::from(&buf[..])),
        }
    }
}
