//! Extended operation construction and parsing.
//!
//! A generic exop is represented by [`Exop`](struct.Exop.html). A request
//! struct implements the `From` conversion of itself into `Exop`; a response
//! struct implements [`ExopParser`](trait.ExopParser.html).

use lber::common::TagClass;
use lber::structures::{OctetString, Tag};

use crate::result::Result;

mod cancel;
pub use self::cancel::Cancel;

mod passmod;
pub use self::passmod::{PasswordModify, PasswordModifyResp};

mod starttls;
pub use self::starttls::StartTLS;
pub(crate) use self::starttls::STARTTLS_OID;

mod txn;
pub use self::txn::{EndTxn, EndTxnResp, StartTxn, StartTxnResp};
pub(crate) use self::txn::{TXN_ABORTED_OID, TXN_END_OID, TXN_START_OID};

mod whoami;
pub use self::whoami::{WhoAmI, WhoAmIResp};

/// Generic extended operation.
///
/// Since the same struct can be used both for requests and responses,
/// both fields are declared as optional; when sending an extended request,
/// `name` must be set.
#[derive(Clone, Debug)]
pub struct Exop {
    /// OID of the operation.
    pub name: Option<String>,
    /// Request or response value, if any.
    pub val: Option<Vec<u8>>,
}

/// Conversion trait for extended response values.
pub trait ExopParser: Sized {
    /// Convert the raw BER value into a response-specific struct.
    fn parse(val: &[u8]) -> Result<Self>;
}

impl Exop {
    /// Parse the generic response value into an operation-specific struct,
    /// if a value is present.
    pub fn parse<T: ExopParser>(&self) -> Result<Option<T>> {
        match self.val {
            Some(ref val) => T::parse(val).map(Some),
            None => Ok(None),
        }
    }
}

pub(crate) fn construct_exop(exop: Exop) -> Vec<Tag> {
    let mut inner = vec![];
    if let Some(name) = exop.name {
        inner.push(Tag::OctetString(OctetString {
            id: 0,
            class: TagClass::Context,
            inner: name.into_bytes(),
        }));
    }
    if let Some(val) = exop.val {
        inner.push(Tag::OctetString(OctetString {
            id: 1,
            class: TagClass::Context,
            inner: val,
        }));
    }
    inner
}
