use std::collections::HashMap;
use std::sync::LazyLock;

use crate::result::{LdapError, Result};

use lber::structure::{StructureTag, PL};
use lber::structures::{Boolean, OctetString, Sequence, Tag};
use lber::universal::Types;

/// Recognized response control types.
///
/// The variants can't be exhaustively matched, since the list of
/// recognized and internally implemented controls can change from one
/// release to the next.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlType {
    PagedResults,
    PostReadResp,
    PreReadResp,
}

mod assertion;
pub use self::assertion::Assertion;

mod matched_values;
pub use self::matched_values::MatchedValues;

mod paged_results;
pub use self::paged_results::PagedResults;

mod proxy_auth;
pub use self::proxy_auth::ProxyAuth;

mod read_entry;
pub use self::read_entry::{PostRead, PostReadResp, PreRead, PreReadResp, ReadEntryResp};

mod sort;
pub use self::sort::{SortKey, SortRequest};

mod txn;
pub use self::txn::TxnSpec;
pub(crate) use self::txn::TXN_SPEC_OID;

#[rustfmt::skip]
static CONTROLS: LazyLock<HashMap<&'static str, ControlType>> = LazyLock::new(|| {
    HashMap::from([
        (self::paged_results::PAGED_RESULTS_OID, ControlType::PagedResults),
        (self::read_entry::POST_READ_OID, ControlType::PostReadResp),
        (self::read_entry::PRE_READ_OID, ControlType::PreReadResp),
    ])
});

/// Mark a control as critical.
///
/// All controls are instantiated as non-critical by default, unless
/// dictated otherwise by their specification.
pub trait MakeCritical {
    /// Mark the control instance as critical. This operation consumes the
    /// control, and is irreversible.
    fn critical(self) -> CriticalControl<Self>
    where
        Self: Sized,
    {
        CriticalControl { control: self }
    }
}

/// Wrapper for a control marked as critical.
pub struct CriticalControl<T> {
    control: T,
}

impl<T> From<CriticalControl<T>> for RawControl
where
    T: Into<RawControl>,
{
    fn from(cc: CriticalControl<T>) -> RawControl {
        let mut rc = cc.control.into();
        rc.crit = true;
        rc
    }
}

/// Conversion trait for response control values.
pub trait ControlParser: Sized {
    /// Convert the raw BER value into a control-specific struct.
    fn parse(val: &[u8]) -> Result<Self>;
}

/// Response control.
///
/// The first element will have a value if the OID was recognized while
/// parsing the response as belonging to a control implemented by this
/// library, otherwise it will be `None`.
#[derive(Clone, Debug)]
pub struct Control(pub Option<ControlType>, pub RawControl);

/// Generic control.
///
/// This struct is used both for request and response controls. A request
/// control provides an instance of this type through the `From` conversion
/// on its specific struct; a response control's value can be parsed by
/// calling type-qualified [`parse()`](#method.parse) on the instance,
/// given a [`ControlParser`](trait.ControlParser.html) implementation for
/// the chosen type.
#[derive(Clone, Debug)]
pub struct RawControl {
    /// OID of the control.
    pub ctype: String,
    /// Criticality; has no meaning on response.
    pub crit: bool,
    /// Raw value of the control, if any.
    pub val: Option<Vec<u8>>,
}

impl RawControl {
    /// Parse the generic control into a control-specific struct.
    pub fn parse<T: ControlParser>(&self) -> Result<T> {
        let val = self
            .val
            .as_ref()
            .ok_or(LdapError::BerDecode("control without a value"))?;
        T::parse(val)
    }
}

pub(crate) fn build_tag(rc: RawControl) -> Tag {
    let mut seq = vec![Tag::OctetString(OctetString {
        inner: Vec::from(rc.ctype.as_bytes()),
        ..Default::default()
    })];
    if rc.crit {
        seq.push(Tag::Boolean(Boolean {
            inner: true,
            ..Default::default()
        }));
    }
    if let Some(val) = rc.val {
        seq.push(Tag::OctetString(OctetString {
            inner: val,
            ..Default::default()
        }));
    }
    Tag::Sequence(Sequence {
        inner: seq,
        ..Default::default()
    })
}

pub(crate) fn parse_controls(t: StructureTag) -> Result<Vec<Control>> {
    let tags = t
        .expect_constructed()
        .ok_or(LdapError::BerDecode("controls sequence"))?;
    let mut ctrls = Vec::new();
    for ctrl in tags {
        let mut components = ctrl
            .expect_constructed()
            .ok_or(LdapError::BerDecode("control components"))?
            .into_iter();
        let ctype = String::from_utf8(
            components
                .next()
                .and_then(|t| t.expect_primitive())
                .ok_or(LdapError::BerDecode("control type"))?,
        )
        .map_err(|_| LdapError::DecodingUTF8)?;
        let next = components.next();
        let (crit, maybe_val) = match next {
            None => (false, None),
            Some(c) => match c {
                StructureTag {
                    id,
                    payload: PL::P(ref v),
                    ..
                } if id == Types::Boolean as u64 => {
                    (!v.is_empty() && v[0] != 0, components.next())
                }
                StructureTag { id, .. } if id == Types::OctetString as u64 => (false, Some(c)),
                _ => return Err(LdapError::BerDecode("control criticality")),
            },
        };
        let val = match maybe_val {
            Some(v) => Some(
                v.expect_primitive()
                    .ok_or(LdapError::BerDecode("control value"))?,
            ),
            None => None,
        };
        let known_type = CONTROLS.get(&*ctype).copied();
        ctrls.push(Control(known_type, RawControl { ctype, crit, val }));
    }
    Ok(ctrls)
}
