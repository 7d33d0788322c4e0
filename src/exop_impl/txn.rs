use bytes::BytesMut;
use lber::common::TagClass;
use lber::parse::{parse_int, parse_tag};
use lber::structure::{StructureTag, PL};
use lber::structures::{ASNTag, Boolean, OctetString, Sequence, Tag};
use lber::universal::Types;
use lber::write;

use super::{Exop, ExopParser};
use crate::result::{LdapError, Result};

pub const TXN_START_OID: &str = "1.3.6.1.1.21.1";
pub const TXN_END_OID: &str = "1.3.6.1.1.21.3";
pub const TXN_ABORTED_OID: &str = "1.3.6.1.1.21.4";

/// Start Transaction extended operation ([RFC 5805](https://tools.ietf.org/html/rfc5805)).
///
/// This operation doesn't have any data associated with a request.
#[derive(Clone, Debug)]
pub struct StartTxn;

/// Start Transaction response.
#[derive(Clone, Debug)]
pub struct StartTxnResp {
    /// Opaque identifier of the newly started transaction, quoted back to
    /// the server in the transaction control and the End Transaction
    /// request.
    pub txn_id: Vec<u8>,
}

impl From<StartTxn> for Exop {
    fn from(_: StartTxn) -> Exop {
        Exop {
            name: Some(TXN_START_OID.to_owned()),
            val: None,
        }
    }
}

impl ExopParser for StartTxnResp {
    fn parse(val: &[u8]) -> Result<StartTxnResp> {
        Ok(StartTxnResp {
            txn_id: val.to_vec(),
        })
    }
}

/// End Transaction request.
///
/// The `commit` field selects between committing and aborting the
/// transaction named by `txn_id`; the identifier must be the one returned
/// by Start Transaction on the same connection.
#[derive(Clone, Debug)]
pub struct EndTxn<'a> {
    pub txn_id: &'a [u8],
    pub commit: bool,
}

/// End Transaction response.
///
/// If the server failed to end the transaction, `msg_id` carries the
/// message ID of the update request responsible for the failure.
#[derive(Clone, Debug)]
pub struct EndTxnResp {
    pub msg_id: Option<i32>,
}

impl<'a> From<EndTxn<'a>> for Exop {
    fn from(et: EndTxn) -> Exop {
        let mut inner = vec![];
        // commit is DEFAULT TRUE, so it's only encoded when aborting
        if !et.commit {
            inner.push(Tag::Boolean(Boolean {
                inner: false,
                ..Default::default()
            }));
        }
        inner.push(Tag::OctetString(OctetString {
            inner: et.txn_id.to_vec(),
            ..Default::default()
        }));
        let req = Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        });
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, &req.into_structure());
        Exop {
            name: Some(TXN_END_OID.to_owned()),
            val: Some(Vec::from(&buf[..])),
        }
    }
}

impl ExopParser for EndTxnResp {
    fn parse(val: &[u8]) -> Result<EndTxnResp> {
        let tag = match parse_tag(val) {
            Ok((_, tag)) => tag,
            _ => return Err(LdapError::BerDecode("end txn response")),
        };
        let elems = tag
            .expect_constructed()
            .ok_or(LdapError::BerDecode("end txn response"))?;
        let mut msg_id = None;
        for elem in elems {
            match elem {
                StructureTag {
                    id,
                    class: TagClass::Universal,
                    payload: PL::P(v),
                } if id == Types::Integer as u64 => {
                    msg_id = match parse_int(v.as_slice()) {
                        Ok((_, id)) => Some(id as i32),
                        _ => return Err(LdapError::BerDecode("end txn message id")),
                    };
                }
                // updatesControls, not surfaced
                StructureTag {
                    id,
                    class: TagClass::Universal,
                    payload: PL::C(_),
                } if id == Types::Sequence as u64 => (),
                _ => return Err(LdapError::BerDecode("end txn response")),
            }
        }
        Ok(EndTxnResp { msg_id })
    }
}
