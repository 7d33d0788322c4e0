//! Search filter construction, parsing and serialization.
//!
//! A [`Filter`](enum.Filter.html) is an owned expression tree which can be
//! built programmatically, parsed from its RFC 4515 string form with
//! [`parse()`](fn.parse.html), printed back with `Display`, logically negated
//! with [`negate()`](enum.Filter.html#method.negate), and serialized to the
//! BER form used in Search requests and the Assertion control.

use std::fmt;

use crate::result::{LdapError, Result};
use crate::util::ldap_escape;

use bytes::BytesMut;
use lber::common::TagClass;
use lber::structures::{ASNTag, Boolean, ExplicitTag, OctetString, Sequence, Tag};
use lber::write;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::digit1;
use nom::character::{is_alphabetic, is_alphanumeric, is_hex_digit};
use nom::combinator::{map_res, opt, recognize, verify};
use nom::multi::{fold_many0, many0, many1};
use nom::number::complete::be_u8;
use nom::sequence::{delimited, preceded};
use nom::IResult;

pub(crate) const AND_FILT: u64 = 0;
pub(crate) const OR_FILT: u64 = 1;
pub(crate) const NOT_FILT: u64 = 2;

pub(crate) const EQ_MATCH: u64 = 3;
pub(crate) const SUBSTR_MATCH: u64 = 4;
pub(crate) const GTE_MATCH: u64 = 5;
pub(crate) const LTE_MATCH: u64 = 6;
pub(crate) const PRES_MATCH: u64 = 7;
pub(crate) const APPROX_MATCH: u64 = 8;
pub(crate) const EXT_MATCH: u64 = 9;

const SUB_INITIAL: u64 = 0;
const SUB_ANY: u64 = 1;
const SUB_FINAL: u64 = 2;

/// An LDAP search filter.
///
/// Assertion values are byte strings: RFC 4515 hex escapes can smuggle
/// arbitrary octets into a filter, and servers compare them as octets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Conjunction of one or more filters.
    And(Vec<Filter>),
    /// Disjunction of one or more filters.
    Or(Vec<Filter>),
    /// Negation of exactly one filter.
    Not(Box<Filter>),
    /// Attribute equals value.
    Equality(String, Vec<u8>),
    /// Attribute matches a wildcard pattern.
    Substring {
        attr: String,
        /// Fragment anchored at the start, if any.
        pre: Option<Vec<u8>>,
        /// Unanchored middle fragments.
        any: Vec<Vec<u8>>,
        /// Fragment anchored at the end, if any.
        post: Option<Vec<u8>>,
    },
    /// Attribute is greater than or equal to the value.
    GreaterOrEqual(String, Vec<u8>),
    /// Attribute is less than or equal to the value.
    LessOrEqual(String, Vec<u8>),
    /// Attribute is present, with any value.
    Present(String),
    /// Attribute approximately matches the value.
    Approx(String, Vec<u8>),
    /// Extensible match; at least one of `rule` and `attr` must be given.
    Extensible {
        rule: Option<String>,
        attr: Option<String>,
        value: Vec<u8>,
        dn_attrs: bool,
    },
}

impl Filter {
    pub fn and(filters: Vec<Filter>) -> Filter {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Filter {
        Filter::Or(filters)
    }

    pub fn equality<S: Into<String>, V: Into<Vec<u8>>>(attr: S, value: V) -> Filter {
        Filter::Equality(attr.into(), value.into())
    }

    pub fn greater_or_equal<S: Into<String>, V: Into<Vec<u8>>>(attr: S, value: V) -> Filter {
        Filter::GreaterOrEqual(attr.into(), value.into())
    }

    pub fn less_or_equal<S: Into<String>, V: Into<Vec<u8>>>(attr: S, value: V) -> Filter {
        Filter::LessOrEqual(attr.into(), value.into())
    }

    pub fn approx<S: Into<String>, V: Into<Vec<u8>>>(attr: S, value: V) -> Filter {
        Filter::Approx(attr.into(), value.into())
    }

    pub fn present<S: Into<String>>(attr: S) -> Filter {
        Filter::Present(attr.into())
    }

    /// Logical negation: wraps the filter in a Not, or unwraps a double
    /// negation, so `f.negate().negate()` structurally equals `f`.
    pub fn negate(self) -> Filter {
        match self {
            Filter::Not(inner) => *inner,
            f => Filter::Not(Box::new(f)),
        }
    }

    /// Reject shapes which have no legal encoding.
    fn validate(&self) -> Result<()> {
        match self {
            Filter::And(fs) | Filter::Or(fs) => {
                if fs.is_empty() {
                    return Err(LdapError::EmptyJunction);
                }
                fs.iter().try_for_each(Filter::validate)
            }
            Filter::Not(inner) => inner.validate(),
            Filter::Substring { pre, any, post, .. } => {
                let some = pre.as_deref().is_some_and(|p| !p.is_empty())
                    || post.as_deref().is_some_and(|p| !p.is_empty())
                    || any.iter().any(|a| !a.is_empty());
                if some {
                    Ok(())
                } else {
                    Err(LdapError::EmptySubstring)
                }
            }
            Filter::Extensible { rule, attr, .. } => {
                if rule.is_none() && attr.is_none() {
                    return Err(LdapError::ExtensibleMissingType);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Lower the filter into its BER tag form.
    pub fn to_tag(&self) -> Tag {
        fn octets(class: TagClass, id: u64, bytes: &[u8]) -> Tag {
            Tag::OctetString(OctetString {
                class,
                id,
                inner: bytes.to_vec(),
            })
        }
        fn attr_val(id: u64, attr: &str, value: &[u8]) -> Tag {
            Tag::Sequence(Sequence {
                class: TagClass::Context,
                id,
                inner: vec![
                    octets(TagClass::Universal, 4, attr.as_bytes()),
                    octets(TagClass::Universal, 4, value),
                ],
            })
        }

        match self {
            Filter::And(fs) | Filter::Or(fs) => Tag::Sequence(Sequence {
                class: TagClass::Context,
                id: if matches!(self, Filter::And(_)) {
                    AND_FILT
                } else {
                    OR_FILT
                },
                inner: fs.iter().map(Filter::to_tag).collect(),
            }),
            Filter::Not(inner) => Tag::ExplicitTag(ExplicitTag {
                class: TagClass::Context,
                id: NOT_FILT,
                inner: Box::new(inner.to_tag()),
            }),
            Filter::Equality(attr, value) => attr_val(EQ_MATCH, attr, value),
            Filter::GreaterOrEqual(attr, value) => attr_val(GTE_MATCH, attr, value),
            Filter::LessOrEqual(attr, value) => attr_val(LTE_MATCH, attr, value),
            Filter::Approx(attr, value) => attr_val(APPROX_MATCH, attr, value),
            Filter::Present(attr) => octets(TagClass::Context, PRES_MATCH, attr.as_bytes()),
            Filter::Substring {
                attr,
                pre,
                any,
                post,
            } => {
                let mut frags = vec![];
                if let Some(pre) = pre {
                    frags.push(octets(TagClass::Context, SUB_INITIAL, pre));
                }
                for frag in any {
                    frags.push(octets(TagClass::Context, SUB_ANY, frag));
                }
                if let Some(post) = post {
                    frags.push(octets(TagClass::Context, SUB_FINAL, post));
                }
                Tag::Sequence(Sequence {
                    class: TagClass::Context,
                    id: SUBSTR_MATCH,
                    inner: vec![
                        octets(TagClass::Universal, 4, attr.as_bytes()),
                        Tag::Sequence(Sequence {
                            inner: frags,
                            ..Default::default()
                        }),
                    ],
                })
            }
            Filter::Extensible {
                rule,
                attr,
                value,
                dn_attrs,
            } => {
                let mut inner = vec![];
                if let Some(rule) = rule {
                    inner.push(octets(TagClass::Context, 1, rule.as_bytes()));
                }
                if let Some(attr) = attr {
                    inner.push(octets(TagClass::Context, 2, attr.as_bytes()));
                }
                inner.push(octets(TagClass::Context, 3, value));
                if *dn_attrs {
                    inner.push(Tag::Boolean(Boolean {
                        class: TagClass::Context,
                        id: 4,
                        inner: true,
                    }));
                }
                Tag::Sequence(Sequence {
                    class: TagClass::Context,
                    id: EXT_MATCH,
                    inner,
                })
            }
        }
    }

    /// Serialize to BER bytes, checking the tree invariants first.
    pub fn marshal(&self) -> Result<BytesMut> {
        self.validate()?;
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, &self.to_tag().into_structure());
        Ok(buf)
    }
}

/// Escape an assertion value for the string representation. Valid UTF-8
/// passes through with only the RFC 4515 specials escaped; anything else is
/// hex-escaped byte by byte.
fn fmt_value(f: &mut fmt::Formatter, value: &[u8]) -> fmt::Result {
    match std::str::from_utf8(value) {
        Ok(s) => write!(f, "{}", ldap_escape(s)),
        Err(_) => {
            for &b in value {
                write!(f, "\\{:02x}", b)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Filter::And(fs) => {
                write!(f, "(&")?;
                fs.iter().try_for_each(|x| write!(f, "{}", x))?;
                write!(f, ")")
            }
            Filter::Or(fs) => {
                write!(f, "(|")?;
                fs.iter().try_for_each(|x| write!(f, "{}", x))?;
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
            Filter::Equality(attr, value) => {
                write!(f, "({}=", attr)?;
                fmt_value(f, value)?;
                write!(f, ")")
            }
            Filter::GreaterOrEqual(attr, value) => {
                write!(f, "({}>=", attr)?;
                fmt_value(f, value)?;
                write!(f, ")")
            }
            Filter::LessOrEqual(attr, value) => {
                write!(f, "({}<=", attr)?;
                fmt_value(f, value)?;
                write!(f, ")")
            }
            Filter::Approx(attr, value) => {
                write!(f, "({}~=", attr)?;
                fmt_value(f, value)?;
                write!(f, ")")
            }
            Filter::Present(attr) => write!(f, "({}=*)", attr),
            Filter::Substring {
                attr,
                pre,
                any,
                post,
            } => {
                write!(f, "({}=", attr)?;
                if let Some(pre) = pre {
                    fmt_value(f, pre)?;
                }
                for frag in any {
                    write!(f, "*")?;
                    fmt_value(f, frag)?;
                }
                write!(f, "*")?;
                if let Some(post) = post {
                    fmt_value(f, post)?;
                }
                write!(f, ")")
            }
            Filter::Extensible {
                rule,
                attr,
                value,
                dn_attrs,
            } => {
                write!(f, "(")?;
                if let Some(attr) = attr {
                    write!(f, "{}", attr)?;
                }
                if *dn_attrs {
                    write!(f, ":dn")?;
                }
                if let Some(rule) = rule {
                    write!(f, ":{}", rule)?;
                }
                write!(f, ":=")?;
                fmt_value(f, value)?;
                write!(f, ")")
            }
        }
    }
}

/// Parse the RFC 4515 string representation of a filter.
///
/// Both the parenthesized form and a bare item (`a=b`) are accepted at the
/// top level. The error carries the byte offset where parsing stopped.
pub fn parse(input: &str) -> Result<Filter> {
    match filtexpr(input.as_bytes()) {
        Ok((rest, filter)) => {
            if rest.is_empty() {
                Ok(filter)
            } else {
                Err(LdapError::FilterParsing {
                    offset: input.len() - rest.len(),
                })
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(LdapError::FilterParsing {
            offset: input.len() - e.input.len(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(LdapError::FilterParsing {
            offset: input.len(),
        }),
    }
}

fn filtexpr(i: &[u8]) -> IResult<&[u8], Filter> {
    alt((filter, item))(i)
}

fn filter(i: &[u8]) -> IResult<&[u8], Filter> {
    delimited(tag(b"("), filtercomp, tag(b")"))(i)
}

fn filtercomp(i: &[u8]) -> IResult<&[u8], Filter> {
    alt((and, or, not, item))(i)
}

fn filterlist(i: &[u8]) -> IResult<&[u8], Vec<Filter>> {
    many1(filter)(i)
}

fn and(i: &[u8]) -> IResult<&[u8], Filter> {
    let (i, list) = preceded(tag(b"&"), filterlist)(i)?;
    Ok((i, Filter::And(list)))
}

fn or(i: &[u8]) -> IResult<&[u8], Filter> {
    let (i, list) = preceded(tag(b"|"), filterlist)(i)?;
    Ok((i, Filter::Or(list)))
}

fn not(i: &[u8]) -> IResult<&[u8], Filter> {
    let (i, inner) = preceded(tag(b"!"), filter)(i)?;
    Ok((i, Filter::Not(Box::new(inner))))
}

fn item(i: &[u8]) -> IResult<&[u8], Filter> {
    alt((eq, non_eq, extensible))(i)
}

pub(crate) enum Unescaper {
    WantFirst,
    WantSecond(u8),
    Value(u8),
    Error,
}

impl Unescaper {
    pub(crate) fn feed(&self, c: u8) -> Unescaper {
        fn hex_nibble(c: u8) -> u8 {
            c - if c <= b'9' { b'0' } else { (c & 0x20) + b'A' - 10 }
        }
        match *self {
            Unescaper::Error => Unescaper::Error,
            Unescaper::WantFirst => {
                if is_hex_digit(c) {
                    Unescaper::WantSecond(hex_nibble(c))
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::WantSecond(hi) => {
                if is_hex_digit(c) {
                    Unescaper::Value(hi << 4 | hex_nibble(c))
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::Value(_) => {
                if c == b'\\' {
                    Unescaper::WantFirst
                } else {
                    Unescaper::Value(c)
                }
            }
        }
    }
}

// Any octet of the assertion value may be written as \NN, N a hex digit.
// Parentheses, the asterisk and the backslash itself can only appear in
// that form.
fn unescaped(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map_res(
        fold_many0(
            verify(be_u8, is_value_char),
            || (Unescaper::Value(0), Vec::new()),
            |(u, mut out): (Unescaper, Vec<_>), c: u8| {
                let u = u.feed(c);
                if let Unescaper::Value(c) = u {
                    out.push(c);
                }
                (u, out)
            },
        ),
        |(u, out): (Unescaper, Vec<_>)| -> std::result::Result<Vec<u8>, ()> {
            if let Unescaper::Value(_) = u {
                Ok(out)
            } else {
                Err(())
            }
        },
    )(i)
}

fn is_value_char(&c: &u8) -> bool {
    c != 0 && c != b'(' && c != b')' && c != b'*'
}

fn non_eq(i: &[u8]) -> IResult<&[u8], Filter> {
    let (i, attr) = attributedescription(i)?;
    let (i, op) = alt((tag(b">="), tag(b"<="), tag(b"~=")))(i)?;
    let (i, value) = unescaped(i)?;
    let attr = String::from_utf8_lossy(attr).into_owned();
    let filter = match op {
        b">=" => Filter::GreaterOrEqual(attr, value),
        b"<=" => Filter::LessOrEqual(attr, value),
        _ => Filter::Approx(attr, value),
    };
    Ok((i, filter))
}

fn eq(i: &[u8]) -> IResult<&[u8], Filter> {
    let (i, attr) = attributedescription(i)?;
    let (i, _) = tag(b"=")(i)?;
    let (i, initial) = unescaped(i)?;
    let (i, mid_final) = map_res(
        many0(preceded(tag(b"*"), unescaped)),
        |v: Vec<Vec<u8>>| -> std::result::Result<Vec<Vec<u8>>, ()> {
            // Only the trailing fragment may be empty; "a=f**" is a syntax
            // error, "a=f*" a final wildcard.
            let misplaced_empty = v
                .iter()
                .enumerate()
                .any(|(n, frag)| frag.is_empty() && n + 1 != v.len());
            if misplaced_empty {
                Err(())
            } else {
                Ok(v)
            }
        },
    )(i)?;
    let attr = String::from_utf8_lossy(attr).into_owned();
    let filter = if mid_final.is_empty() {
        // simple equality, no asterisks in assertion value
        Filter::Equality(attr, initial)
    } else if initial.is_empty() && mid_final.len() == 1 && mid_final[0].is_empty() {
        // presence, single asterisk in assertion value
        Filter::Present(attr)
    } else {
        let pre = if initial.is_empty() {
            None
        } else {
            Some(initial)
        };
        let n = mid_final.len();
        let mut any = vec![];
        let mut post = None;
        for (x, frag) in mid_final.into_iter().enumerate() {
            if frag.is_empty() {
                break;
            }
            if x + 1 != n {
                any.push(frag);
            } else {
                post = Some(frag);
            }
        }
        Filter::Substring {
            attr,
            pre,
            any,
            post,
        }
    };
    Ok((i, filter))
}

fn extensible(i: &[u8]) -> IResult<&[u8], Filter> {
    alt((attr_dn_mrule, dn_mrule))(i)
}

fn attr_dn_mrule(i: &[u8]) -> IResult<&[u8], Filter> {
    let (i, attr) = attributedescription(i)?;
    let (i, dn) = opt(tag(b":dn"))(i)?;
    let (i, rule) = opt(preceded(tag(b":"), attributetype))(i)?;
    let (i, _) = tag(b":=")(i)?;
    let (i, value) = unescaped(i)?;
    Ok((i, extensible_filter(rule, Some(attr), value, dn.is_some())))
}

fn dn_mrule(i: &[u8]) -> IResult<&[u8], Filter> {
    let (i, dn) = opt(tag(b":dn"))(i)?;
    let (i, rule) = preceded(tag(b":"), attributetype)(i)?;
    let (i, _) = tag(b":=")(i)?;
    let (i, value) = unescaped(i)?;
    Ok((i, extensible_filter(Some(rule), None, value, dn.is_some())))
}

fn extensible_filter(
    rule: Option<&[u8]>,
    attr: Option<&[u8]>,
    value: Vec<u8>,
    dn_attrs: bool,
) -> Filter {
    Filter::Extensible {
        rule: rule.map(|r| String::from_utf8_lossy(r).into_owned()),
        attr: attr.map(|a| String::from_utf8_lossy(a).into_owned()),
        value,
        dn_attrs,
    }
}

fn attributedescription(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(|i| -> IResult<&[u8], ()> {
        let (i, _) = attributetype(i)?;
        let (i, _) = many0(preceded(tag(b";"), take_while1(is_alnum_hyphen)))(i)?;
        Ok((i, ()))
    })(i)
}

fn is_alnum_hyphen(c: u8) -> bool {
    is_alphanumeric(c) || c == b'-'
}

fn attributetype(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((numericoid, descr))(i)
}

fn numericoid(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(|i| -> IResult<&[u8], ()> {
        let (i, _) = number(i)?;
        let (i, _) = many1(preceded(tag(b"."), number))(i)?;
        Ok((i, ()))
    })(i)
}

// A number may be zero, but must not have superfluous leading zeroes
fn number(i: &[u8]) -> IResult<&[u8], &[u8]> {
    verify(digit1, |d: &[u8]| d.len() == 1 || d[0] != b'0')(i)
}

fn descr(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(|i| -> IResult<&[u8], ()> {
        let (i, _) = verify(be_u8, |c| is_alphabetic(*c))(i)?;
        let (i, _) = take_while(is_alnum_hyphen)(i)?;
        Ok((i, ()))
    })(i)
}

#[cfg(test)]
mod tests {
    use super::{parse, Filter};

    fn ber_vec_eq(filter: &str, ber: &[u8]) {
        let parsed = parse(filter).unwrap();
        assert_eq!(&parsed.marshal().unwrap()[..], ber);
    }

    #[test]
    fn filt_bare_item() {
        ber_vec_eq("a=v", b"\xa3\x06\x04\x01a\x04\x01v");
    }

    #[test]
    fn filt_simple_eq() {
        ber_vec_eq("(a=v)", b"\xa3\x06\x04\x01a\x04\x01v");
    }

    #[test]
    fn filt_extra_garbage() {
        assert!(parse("(a=v)garbage").is_err());
    }

    #[test]
    fn filt_simple_noneq() {
        ber_vec_eq("(a<=2)", b"\xa6\x06\x04\x01a\x04\x012");
        ber_vec_eq("(a>=2)", b"\xa5\x06\x04\x01a\x04\x012");
        ber_vec_eq("(a~=2)", b"\xa8\x06\x04\x01a\x04\x012");
    }

    #[test]
    fn filt_pres() {
        ber_vec_eq("(a=*)", b"\x87\x01a");
        assert_eq!(parse("(a=*)").unwrap(), Filter::present("a"));
    }

    #[test]
    fn filt_ast_ini() {
        ber_vec_eq("(a=*v)", b"\xa4\x08\x04\x01a0\x03\x82\x01v");
    }

    #[test]
    fn filt_ast_fin() {
        ber_vec_eq("(a=v*)", b"\xa4\x08\x04\x01a0\x03\x80\x01v");
    }

    #[test]
    fn filt_ast_multi() {
        ber_vec_eq(
            "(a=v*x*y)",
            b"\xa4\x0e\x04\x01a0\t\x80\x01v\x81\x01x\x82\x01y",
        );
    }

    #[test]
    fn filt_any_only() {
        // No anchored fragments at all.
        let f = parse("(a=*x*y*)").unwrap();
        assert_eq!(
            f,
            Filter::Substring {
                attr: "a".into(),
                pre: None,
                any: vec![b"x".to_vec(), b"y".to_vec()],
                post: None,
            }
        );
    }

    #[test]
    fn filt_ast_double() {
        assert!(parse("(a=f**)").is_err());
    }

    #[test]
    fn filt_esc_ok() {
        ber_vec_eq("(a=v\\2ax)", b"\xa3\x08\x04\x01a\x04\x03v*x");
    }

    #[test]
    fn filt_esc_runt() {
        assert!(parse("(a=v\\2)").is_err());
    }

    #[test]
    fn filt_esc_invalid() {
        assert!(parse("(a=v\\0x)").is_err());
    }

    #[test]
    fn filt_oid() {
        ber_vec_eq("(2.5.4.3=v)", b"\xa3\x0c\x04\x072.5.4.3\x04\x01v");
    }

    #[test]
    fn filt_oidl0() {
        assert!(parse("(2.5.04.0=top)").is_err());
    }

    #[test]
    fn filt_complex() {
        ber_vec_eq(
            "(&(a=v)(b=x)(!(c=y)))",
            b"\xa0\x1a\xa3\x06\x04\x01a\x04\x01v\xa3\x06\x04\x01b\x04\x01x\xa2\x08\xa3\x06\x04\x01c\x04\x01y",
        );
    }

    #[test]
    fn filt_empty_junction() {
        assert!(parse("(&)").is_err());
        assert!(parse("(|)").is_err());
        assert!(Filter::and(vec![]).marshal().is_err());
    }

    #[test]
    fn filt_ext_dn() {
        ber_vec_eq(
            "(ou:dn:=People)",
            b"\xa9\x0f\x82\x02ou\x83\x06People\x84\x01\xff",
        );
    }

    #[test]
    fn filt_ext_mrule() {
        ber_vec_eq(
            "(cn:2.5.13.5:=J D)",
            b"\xa9\x13\x81\x082.5.13.5\x82\x02cn\x83\x03J D",
        );
    }

    #[test]
    fn filt_simple_utf8() {
        ber_vec_eq("(a=ć)", b"\xa3\x07\x04\x01a\x04\x02\xc4\x87");
    }

    #[test]
    fn substring_and_negation_bytes() {
        // Substring with initial fragment, wrapped with an equality under
        // a negation, all conjoined.
        ber_vec_eq(
            "(&(cn=Jane*)(!(status=blocked)))",
            b"\xa0\x23\
              \xa4\x0c\x04\x02cn0\x06\x80\x04Jane\
              \xa2\x13\xa3\x11\x04\x06status\x04\x07blocked",
        );
    }

    #[test]
    fn print_reparse() {
        for s in [
            "(objectClass=*)",
            "(&(a=v)(b=x))",
            "(|(cn=Jane*doe)(sn<=z))",
            "(!(st=TX))",
            "(a=*x*y*)",
            "(cn:2.5.13.5:=J D)",
            "(ou:dn:=People)",
            "(a=v\\2ax)",
        ] {
            let f = parse(s).unwrap();
            let printed = f.to_string();
            assert_eq!(parse(&printed).unwrap(), f, "via {}", printed);
        }
        // Already-minimal strings survive verbatim.
        assert_eq!(parse("(&(a=v)(b=x))").unwrap().to_string(), "(&(a=v)(b=x))");
    }

    #[test]
    fn double_negation() {
        let f = parse("(a=v)").unwrap();
        assert_eq!(parse("(!(!(a=v)))").unwrap(), f.clone().negate().negate());
        assert_eq!(f.clone().negate().negate(), f);
    }
}
