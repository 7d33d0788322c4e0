use super::RawControl;
use crate::filter::Filter;
use crate::result::Result;

pub const ASSERTION_OID: &str = "1.3.6.1.1.12";

/// Assertion control ([RFC 4528](https://tools.ietf.org/html/rfc4528)).
///
/// The operation it accompanies only executes if the filter evaluates to
/// true for the target entry. Constructed critical, as the RFC recommends
/// for most uses; the filter is serialized eagerly so that an invalid
/// tree is reported here and not at send time.
#[derive(Clone, Debug)]
pub struct Assertion {
    val: Vec<u8>,
}

impl Assertion {
    pub fn new(filter: &Filter) -> Result<Assertion> {
        Ok(Assertion {
            val: Vec::from(&filter.marshal()?[..]),
        })
    }
}

impl From<Assertion> for RawControl {
    fn from(a: Assertion) -> RawControl {
        RawControl {
            ctype: ASSERTION_OID.to_owned(),
            crit: true,
            val: Some(a.val),
        }
    }
}
