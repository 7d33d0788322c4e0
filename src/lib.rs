//! A pure-Rust LDAP v3 client library.
//!
//! ## Summary
//!
//! The library speaks the RFC 4511 wire protocol to a directory server over
//! TCP, with optional TLS: either from the first byte (`ldaps://`) or by
//! upgrading the running connection with StartTLS. The
//! [`LdapConn`](struct.LdapConn.html) structure is the starting point for
//! all operations; it owns one connection and serializes the operations
//! invoked on it, so it can be shared between threads behind an `Arc`.
//!
//! Beyond the protocol client, the library ships the supporting cast a
//! directory tool needs: an RFC 4515 [filter](filter/index.html) algebra, an
//! RFC 4514 [distinguished name](dn/struct.Dn.html) exploder, and an RFC
//! 2849 [LDIF](ldif/index.html) change-record reader. The `ldap` binary
//! built from this crate wires those pieces into a command-line client.
//!
//! The documentation is written for readers familiar with LDAP concepts and
//! terminology, which it won't attempt to explain.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ldapc::{LdapConn, Scope, SearchEntry};
//! use ldapc::result::Result;
//!
//! fn main() -> Result<()> {
//!     let conn = LdapConn::bind("ldap://localhost:2389", "cn=admin,dc=example,dc=org", "secret")?;
//!     let (entries, _res) = conn.search(
//!         "ou=Places,dc=example,dc=org",
//!         Scope::Subtree,
//!         "(&(objectClass=locality)(l=ma*))",
//!         &["l"],
//!     )?.success()?;
//!     for entry in entries {
//!         println!("{:?}", SearchEntry::construct(entry)?);
//!     }
//!     conn.unbind()
//! }
//! ```

mod conn;
pub mod controls {
    //! Control construction and parsing.
    //!
    //! A control can be associated with a request or a response. The common
    //! controls are implemented directly by this library; where a response
    //! control differs from its request, the response struct's name carries
    //! the `Resp` suffix.
    //!
    //! A request control is created by instantiating its structure and
    //! converting it with `into()` where a
    //! [`RawControl`](struct.RawControl.html) is expected. A third-party
    //! control only needs to implement that same conversion.
    //!
    //! `RawControl`, together with an optional
    //! [`ControlType`](enum.ControlType.html), forms
    //! [`Control`](struct.Control.html); a vector of `Control`s is part of
    //! the result of every operation which can return one. A recognized
    //! response control can be parsed by calling
    //! [`parse()`](struct.RawControl.html#method.parse) on its `RawControl`,
    //! given a [`ControlParser`](trait.ControlParser.html) implementation.
    pub use crate::controls_impl::{
        Assertion, MatchedValues, PagedResults, PostRead, PostReadResp, PreRead, PreReadResp,
        ProxyAuth, ReadEntryResp, SortKey, SortRequest, TxnSpec,
    };
    pub use crate::controls_impl::{
        Control, ControlParser, ControlType, CriticalControl, MakeCritical, RawControl,
    };
}
mod controls_impl;
pub mod dn;
mod exop_impl;
pub mod exop {
    //! Extended operation construction and parsing.
    //!
    //! A generic exop is represented by [`Exop`](struct.Exop.html). A
    //! request struct implements the `From` conversion of itself into
    //! `Exop`; a response struct implements the
    //! [`ExopParser`](trait.ExopParser.html) trait.
    pub use crate::exop_impl::{
        Cancel, EndTxn, EndTxnResp, Exop, ExopParser, PasswordModify, PasswordModifyResp,
        StartTLS, StartTxn, StartTxnResp, WhoAmI, WhoAmIResp,
    };
}
pub mod filter;
mod ldap;
pub mod ldif;
mod protocol;
pub mod result;
mod search;
mod util;

pub use conn::{LdapConn, LdapConnSettings};
pub use dn::Dn;
pub use filter::parse as parse_filter;
pub use filter::Filter;
pub use ldap::{EntryStream, Mod};
pub use ldif::{Change, ChangeKind, LdifReader};
pub use result::{LdapError, LdapResult, SearchResult};
pub use search::parse_refs;
pub use search::{DerefAliases, ResultEntry, Scope, SearchEntry, SearchOptions};
pub use util::{dn_escape, ldap_escape};
