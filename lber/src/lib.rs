//! A small BER (Basic Encoding Rules) library, covering the subset of ASN.1
//! needed to speak LDAP v3: the universal types used by the protocol, plus
//! implicitly tagged values of any class.
//!
//! Values meant for the wire are built from the typed tags in
//! [`structures`](structures/index.html), lowered into the generic
//! [`StructureTag`](structure/struct.StructureTag.html) form, and serialized
//! with [`write::encode_into`](write/fn.encode_into.html). Incoming bytes are
//! parsed back into `StructureTag`s with the streaming parser in
//! [`parse`](parse/index.html); a truncated value reports "incomplete"
//! without consuming anything, so a network reader can retry the same buffer
//! after more bytes arrive.

pub mod common;
pub mod parse;
pub mod structure;
pub mod structures;
pub mod universal;
pub mod write;

pub use nom::IResult;
pub use parse::Parser;
