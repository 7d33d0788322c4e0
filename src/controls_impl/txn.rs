use super::RawControl;

pub const TXN_SPEC_OID: &str = "1.3.6.1.1.21.2";

/// Transaction Specification control ([RFC 5805](https://tools.ietf.org/html/rfc5805)).
///
/// Attached to update operations which should execute inside the named
/// transaction. Always critical; the value is the raw transaction
/// identifier from the Start Transaction response. The connection attaches
/// this control itself while a transaction is active.
#[derive(Clone, Debug)]
pub struct TxnSpec<'a> {
    pub id: &'a [u8],
}

impl<'a> From<TxnSpec<'a>> for RawControl {
    fn from(ts: TxnSpec) -> RawControl {
        RawControl {
            ctype: TXN_SPEC_OID.to_owned(),
            crit: true,
            val: Some(ts.id.to_vec()),
        }
    }
}
