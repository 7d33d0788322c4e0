//! Operation result structures and helpers.
//!
//! Most LDAP operations return an [`LdapResult`](struct.LdapResult.html). This
//! module contains its definition, the wrapper structs for operations with a
//! richer outcome (Search, Compare, Extended), and the library error enum,
//! which adapts LDAP result and error handling to Rust conventions.

use std::error::Error;
use std::fmt;
use std::io;
use std::result::Result as StdResult;

use crate::controls::Control;
use crate::exop::Exop;
use crate::search::{parse_refs, ResultEntry};

use lber::common::TagClass;
use lber::parse::parse_uint;
use lber::structure::StructureTag;
use lber::universal::Types;

use thiserror::Error;

/// Type alias for the standard `Result` with the fixed `LdapError` error part.
pub type Result<T> = std::result::Result<T, LdapError>;

/// Error variants recognized by the library.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Encapsulated I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// TLS library error.
    #[error("TLS error: {source}")]
    Tls {
        #[from]
        source: native_tls::Error,
    },

    /// TLS handshake failure.
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// URL parsing error.
    #[error("url parse error: {source}")]
    UrlParsing {
        #[from]
        source: url::ParseError,
    },

    /// Unknown LDAP URL scheme.
    #[error("unknown LDAP URL scheme: {0}")]
    UnknownScheme(String),

    /// Operation attempted on a connection that is shut down or poisoned.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The message ID counter reached its ceiling; the connection must be
    /// reopened to continue.
    #[error("LDAP message IDs exhausted")]
    IdExhausted,

    /// Received BER data that doesn't decode as expected.
    #[error("malformed response: {0}")]
    BerDecode(&'static str),

    /// A response carried an operation tag other than the one solicited.
    #[error("unexpected response tag {got}, expected {expected}")]
    UnexpectedTag { expected: u64, got: u64 },

    /// A response carried a message ID other than the outstanding one.
    #[error("response for message ID {got}, expected {expected}")]
    MismatchedId { expected: i32, got: i32 },

    /// The server closed the stream mid-operation.
    #[error("premature end of stream")]
    EndOfStream,

    /// Error parsing the string representation of a search filter.
    #[error("filter parse error at byte {offset}")]
    FilterParsing { offset: usize },

    /// Marshalling an and/or filter with no members.
    #[error("empty and/or filter")]
    EmptyJunction,

    /// Marshalling a substring filter without any fragment.
    #[error("substring filter has no fragments")]
    EmptySubstring,

    /// Marshalling an extensible match with neither rule nor attribute.
    #[error("extensible match needs a matching rule or an attribute")]
    ExtensibleMissingType,

    /// A composite filter where only simple filter items are permitted.
    #[error("only simple filter items are allowed here")]
    NotSimpleFilter,

    /// Error parsing a distinguished name.
    #[error("invalid DN at byte {pos}: {msg}")]
    DnParsing { pos: usize, msg: &'static str },

    /// Error in an LDIF stream.
    #[error("LDIF error at line {line}: {msg}")]
    Ldif { line: usize, msg: String },

    /// No values provided for the Add operation.
    #[error("empty value set for Add")]
    AddNoValues,

    /// Error converting an octet string to UTF-8.
    #[error("utf8 decoding error")]
    DecodingUTF8,

    /// Transaction requested while another one is active.
    #[error("transaction already active")]
    TxnInProgress,

    /// Commit or rollback without an active transaction.
    #[error("no active transaction")]
    NoTxn,

    /// Unsolicited notice of disconnection; the connection is unusable.
    #[error("notice of disconnection: {0}")]
    Disconnected(String),

    /// Unsolicited aborted-transaction notice; the connection is unusable.
    #[error("transaction aborted by server: {0}")]
    TxnAborted(String),

    /// Unsolicited notification with an unrecognized OID.
    #[error("unsolicited notification: {0}")]
    Unsolicited(String),

    /// LDAP operation result with an error return code.
    #[error("LDAP operation result: {result}")]
    LdapResult {
        #[from]
        result: LdapResult,
    },
}

impl From<LdapError> for io::Error {
    fn from(le: LdapError) -> io::Error {
        match le {
            LdapError::Io { source, .. } => source,
            _ => io::Error::new(io::ErrorKind::Other, format!("{}", le)),
        }
    }
}

/// Common components of an LDAP operation result.
///
/// This structure faithfully replicates the components dictated by the
/// standard, relying on numeric codes for the indication of outcome. The
/// helper methods [`success()`](#method.success) and
/// [`non_error()`](#method.non_error) turn unwanted codes into errors when
/// simple condition checking suffices.
#[derive(Clone, Debug)]
pub struct LdapResult {
    /// Result code.
    ///
    /// Zero indicates successful completion, but there's a number of other
    /// non-error codes arising as a result of various operations. See
    /// [Section A.1 of RFC 4511](https://tools.ietf.org/html/rfc4511#appendix-A.1).
    pub rc: u32,
    /// Matched component DN, where applicable.
    pub matched: String,
    /// Additional diagnostic text.
    pub text: String,
    /// Referrals. Absence of referrals is represented by an empty vector.
    pub refs: Vec<String>,
    /// Response controls. Missing and empty controls are both represented
    /// by an empty vector.
    pub ctrls: Vec<Control>,
}

pub(crate) fn result_code_text(rc: u32) -> &'static str {
    match rc {
        0 => "success",
        1 => "operationsError",
        2 => "protocolError",
        3 => "timeLimitExceeded",
        4 => "sizeLimitExceeded",
        5 => "compareFalse",
        6 => "compareTrue",
        7 => "authMethodNotSupported",
        8 => "strongerAuthRequired",
        10 => "referral",
        11 => "adminLimitExceeded",
        12 => "unavailableCriticalExtension",
        13 => "confidentialityRequired",
        14 => "saslBindInProgress",
        16 => "noSuchAttribute",
        17 => "undefinedAttributeType",
        18 => "inappropriateMatching",
        19 => "constraintViolation",
        20 => "attributeOrValueExists",
        21 => "invalidAttributeSyntax",
        32 => "noSuchObject",
        33 => "aliasProblem",
        34 => "invalidDNSyntax",
        36 => "aliasDereferencingProblem",
        48 => "inappropriateAuthentication",
        49 => "invalidCredentials",
        50 => "insufficientAccessRights",
        51 => "busy",
        52 => "unavailable",
        53 => "unwillingToPerform",
        54 => "loopDetect",
        64 => "namingViolation",
        65 => "objectClassViolation",
        66 => "notAllowedOnNonLeaf",
        67 => "notAllowedOnRDN",
        68 => "entryAlreadyExists",
        69 => "objectClassModsProhibited",
        71 => "affectsMultipleDSAs",
        80 => "other",
        88 => "abandoned",
        118 => "canceled",
        119 => "noSuchOperation",
        120 => "tooLate",
        121 => "cannotCancel",
        122 => "assertionFailed",
        123 => "authorizationDenied",
        _ => "unknown",
    }
}

impl Error for LdapResult {}

impl fmt::Display for LdapResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> StdResult<(), fmt::Error> {
        write!(
            f,
            "rc={} ({}), dn: \"{}\", text: \"{}\"",
            self.rc,
            result_code_text(self.rc),
            self.matched,
            self.text
        )
    }
}

impl LdapResult {
    /// True for the result codes which do not signal a failed operation:
    /// success (0), compareFalse (5), compareTrue (6), referral (10) and
    /// saslBindInProgress (14).
    pub fn non_failure(&self) -> bool {
        matches!(self.rc, 0 | 5 | 6 | 10 | 14)
    }

    /// If the result code is zero, return the instance itself wrapped
    /// in `Ok()`, otherwise wrap the instance in an `LdapError`.
    pub fn success(self) -> Result<Self> {
        if self.rc == 0 {
            Ok(self)
        } else {
            Err(LdapError::from(self))
        }
    }

    /// If the result code is 0 or 10 (referral), return the instance
    /// itself wrapped in `Ok()`, otherwise wrap the instance in an
    /// `LdapError`.
    pub fn non_error(self) -> Result<Self> {
        if self.rc == 0 || self.rc == 10 {
            Ok(self)
        } else {
            Err(LdapError::from(self))
        }
    }
}

/// An operation result together with the extended-response components.
#[derive(Clone, Debug)]
pub(crate) struct LdapResultExt(pub LdapResult, pub Exop);

impl TryFrom<StructureTag> for LdapResultExt {
    type Error = LdapError;

    fn try_from(t: StructureTag) -> Result<LdapResultExt> {
        let tags = t
            .expect_constructed()
            .ok_or(LdapError::BerDecode("result sequence"))?;
        let mut tags = tags.into_iter();
        let rc_tag = tags
            .next()
            .ok_or(LdapError::BerDecode("result code"))?
            .match_class(TagClass::Universal)
            .and_then(|t| t.match_id(Types::Enumerated as u64))
            .and_then(|t| t.expect_primitive())
            .ok_or(LdapError::BerDecode("result code"))?;
        let rc = match parse_uint(rc_tag.as_slice()) {
            Ok((_, rc)) => rc as u32,
            _ => return Err(LdapError::BerDecode("result code")),
        };
        let matched = String::from_utf8(
            tags.next()
                .and_then(|t| t.expect_primitive())
                .ok_or(LdapError::BerDecode("matched dn"))?,
        )
        .map_err(|_| LdapError::DecodingUTF8)?;
        let text = String::from_utf8(
            tags.next()
                .and_then(|t| t.expect_primitive())
                .ok_or(LdapError::BerDecode("diagnostic message"))?,
        )
        .map_err(|_| LdapError::DecodingUTF8)?;
        let mut refs = Vec::new();
        let mut exop_name = None;
        let mut exop_val = None;
        for comp in tags {
            match comp.id {
                3 => refs.extend(parse_refs(comp)),
                10 => {
                    exop_name = Some(
                        String::from_utf8(
                            comp.expect_primitive()
                                .ok_or(LdapError::BerDecode("responseName"))?,
                        )
                        .map_err(|_| LdapError::DecodingUTF8)?,
                    );
                }
                11 => {
                    exop_val = Some(
                        comp.expect_primitive()
                            .ok_or(LdapError::BerDecode("responseValue"))?,
                    );
                }
                _ => (),
            }
        }
        Ok(LdapResultExt(
            LdapResult {
                rc,
                matched,
                text,
                refs,
                ctrls: vec![],
            },
            Exop {
                name: exop_name,
                val: exop_val,
            },
        ))
    }
}

/// Wrapper for the result of a Search operation returning all entries at once.
///
/// [`success()`](#method.success) and [`non_error()`](#method.non_error)
/// destructure the wrapper and return its components as elements of an
/// anonymous tuple.
#[derive(Clone, Debug)]
pub struct SearchResult(pub Vec<ResultEntry>, pub LdapResult);

impl SearchResult {
    /// If the result code is zero, return an anonymous tuple of component
    /// structs wrapped in `Ok()`, otherwise wrap the `LdapResult` part in
    /// an `LdapError`.
    pub fn success(self) -> Result<(Vec<ResultEntry>, LdapResult)> {
        if self.1.rc == 0 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from(self.1))
        }
    }

    /// If the result code is 0 or 10 (referral), return an anonymous tuple
    /// of component structs wrapped in `Ok()`, otherwise wrap the
    /// `LdapResult` part in an `LdapError`.
    pub fn non_error(self) -> Result<(Vec<ResultEntry>, LdapResult)> {
        if self.1.rc == 0 || self.1.rc == 10 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from(self.1))
        }
    }
}

/// Wrapper for the result of a Compare operation.
///
/// Compare uniquely has two non-zero return codes to indicate the outcome of
/// a successful comparison, while other return codes indicate errors, as
/// usual (except 10 for referral). The [`equal()`](#method.equal) method
/// optimizes for the expected case of ignoring referrals;
/// [`non_error()`](#method.non_error) can be used when that's not possible.
#[derive(Clone, Debug)]
pub struct CompareResult(pub LdapResult);

impl CompareResult {
    /// If the result code is 5 (compareFalse) or 6 (compareTrue), return
    /// the corresponding boolean value wrapped in `Ok()`, otherwise wrap
    /// the `LdapResult` part in an `LdapError`.
    pub fn equal(self) -> Result<bool> {
        match self.0.rc {
            5 => Ok(false),
            6 => Ok(true),
            _ => Err(LdapError::from(self.0)),
        }
    }

    /// If the result code is 5 (compareFalse), 6 (compareTrue), or 10
    /// (referral), return the inner `LdapResult`, otherwise rewrap it in
    /// an `LdapError`.
    pub fn non_error(self) -> Result<LdapResult> {
        if self.0.rc == 5 || self.0.rc == 6 || self.0.rc == 10 {
            Ok(self.0)
        } else {
            Err(LdapError::from(self.0))
        }
    }
}

/// Wrapper for the result of an Extended operation.
#[derive(Clone, Debug)]
pub struct ExopResult(pub Exop, pub LdapResult);

impl ExopResult {
    /// If the result code is zero, return an anonymous tuple of component
    /// structs wrapped in `Ok()`, otherwise wrap the `LdapResult` part in
    /// an `LdapError`.
    pub fn success(self) -> Result<(Exop, LdapResult)> {
        if self.1.rc == 0 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from(self.1))
        }
    }

    /// If the result code is 0 or 10 (referral), return an anonymous tuple
    /// of component structs wrapped in `Ok()`, otherwise wrap the
    /// `LdapResult` part in an `LdapError`.
    pub fn non_error(self) -> Result<(Exop, LdapResult)> {
        if self.1.rc == 0 || self.1.rc == 10 {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::from(self.1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(rc: u32) -> LdapResult {
        LdapResult {
            rc,
            matched: String::new(),
            text: String::new(),
            refs: vec![],
            ctrls: vec![],
        }
    }

    #[test]
    fn non_failure_set() {
        for rc in [0, 5, 6, 10, 14] {
            assert!(res(rc).non_failure(), "rc {}", rc);
        }
        for rc in [1, 32, 49, 53, 80, 118] {
            assert!(!res(rc).non_failure(), "rc {}", rc);
        }
    }

    #[test]
    fn compare_mapping() {
        assert_eq!(CompareResult(res(5)).equal().unwrap(), false);
        assert_eq!(CompareResult(res(6)).equal().unwrap(), true);
        assert!(CompareResult(res(32)).equal().is_err());
    }

    #[test]
    fn code_table() {
        assert_eq!(result_code_text(0), "success");
        assert_eq!(result_code_text(53), "unwillingToPerform");
        assert_eq!(result_code_text(121), "cannotCancel");
        assert_eq!(result_code_text(9), "unknown");
    }
}
