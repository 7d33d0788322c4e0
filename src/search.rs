//! Search parameters and result entries.

use std::collections::HashMap;

use crate::controls::{Control, RawControl};
use crate::result::{LdapError, Result};

use lber::structure::StructureTag;

/// Possible values for search scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Base object; search only the object named in the base DN.
    Base = 0,
    /// Search the objects immediately below the base DN.
    OneLevel = 1,
    /// Search the object named in the base DN and the whole subtree below it.
    Subtree = 2,
}

/// Possible values for alias dereferencing during search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DerefAliases {
    /// Never dereference.
    #[default]
    Never = 0,
    /// Dereference while retrieving objects according to search scope.
    Searching = 1,
    /// Dereference while finding the base object.
    Finding = 2,
    /// Always dereference.
    Always = 3,
}

/// Additional parameters for the Search operation.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct SearchOptions {
    pub deref: DerefAliases,
    pub typesonly: bool,
    pub timelimit: i32,
    pub sizelimit: i32,
    pub controls: Vec<RawControl>,
}

impl SearchOptions {
    /// Create an instance of the structure with default values.
    pub fn new() -> Self {
        SearchOptions {
            ..Default::default()
        }
    }

    /// Set the method for dereferencing aliases.
    pub fn deref(mut self, d: DerefAliases) -> Self {
        self.deref = d;
        self
    }

    /// Set the indicator of returning just attribute names (`true`)
    /// vs. names and values (`false`).
    pub fn typesonly(mut self, typesonly: bool) -> Self {
        self.typesonly = typesonly;
        self
    }

    /// Set the time limit, in seconds, for the whole search operation.
    ///
    /// This is a server-side limit of the elapsed time for performing the
    /// operation, _not_ a network timeout for retrieving the results.
    pub fn timelimit(mut self, timelimit: i32) -> Self {
        self.timelimit = timelimit;
        self
    }

    /// Set the size limit, in entries, for the whole search operation.
    pub fn sizelimit(mut self, sizelimit: i32) -> Self {
        self.sizelimit = sizelimit;
        self
    }

    /// Attach a request control to the search.
    pub fn control<R: Into<RawControl>>(mut self, ctrl: R) -> Self {
        self.controls.push(ctrl.into());
        self
    }
}

/// Wrapper for the internal structure of a result entry.
///
/// The entry body is kept as raw BER until
/// [`SearchEntry::construct`](struct.SearchEntry.html#method.construct) is
/// called: the read loop only needs the outer tag to route a message, and a
/// payload it cannot digest shouldn't take the whole stream down with it.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ResultEntry(pub StructureTag, pub Vec<Control>);

impl ResultEntry {
    pub(crate) fn new(st: StructureTag, ctrls: Vec<Control>) -> ResultEntry {
        ResultEntry(st, ctrls)
    }
}

/// Parsed search result entry.
///
/// Attribute values are returned as octet strings without any type
/// information. The parser tries to convert every value into a `String`;
/// an attribute with any value that isn't valid UTF-8 moves wholesale to
/// the `bin_attrs` map. An attribute whose particular values happen to
/// decode should still be looked up in both maps.
#[derive(Debug, Clone, Default)]
pub struct SearchEntry {
    /// Entry DN.
    pub dn: String,
    /// Attributes with textual values.
    pub attrs: HashMap<String, Vec<String>>,
    /// Attributes with binary values.
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl SearchEntry {
    /// Parse raw BER data and convert it into attribute map(s).
    pub fn construct(re: ResultEntry) -> Result<SearchEntry> {
        SearchEntry::from_tag(re.0)
    }

    pub(crate) fn from_tag(tag: StructureTag) -> Result<SearchEntry> {
        // The application tag is present on a search response, absent on
        // the bare entry inside a pre/post-read control value.
        let mut tags = tag
            .expect_constructed()
            .ok_or(LdapError::BerDecode("entry"))?
            .into_iter();
        let dn = String::from_utf8(
            tags.next()
                .and_then(|t| t.expect_primitive())
                .ok_or(LdapError::BerDecode("entry dn"))?,
        )
        .map_err(|_| LdapError::DecodingUTF8)?;
        let mut attr_vals = HashMap::new();
        let mut bin_attr_vals: HashMap<String, Vec<Vec<u8>>> = HashMap::new();
        let attrs = tags
            .next()
            .and_then(|t| t.expect_constructed())
            .ok_or(LdapError::BerDecode("entry attributes"))?;
        for attr in attrs {
            let mut parts = attr
                .expect_constructed()
                .ok_or(LdapError::BerDecode("partial attribute"))?
                .into_iter();
            let a_type = String::from_utf8(
                parts
                    .next()
                    .and_then(|t| t.expect_primitive())
                    .ok_or(LdapError::BerDecode("attribute type"))?,
            )
            .map_err(|_| LdapError::DecodingUTF8)?;
            let raw_vals = parts
                .next()
                .and_then(|t| t.expect_constructed())
                .ok_or(LdapError::BerDecode("attribute values"))?;
            let mut any_binary = false;
            let mut values = Vec::with_capacity(raw_vals.len());
            for val in raw_vals {
                let bytes = val
                    .expect_primitive()
                    .ok_or(LdapError::BerDecode("attribute value"))?;
                match String::from_utf8(bytes) {
                    Ok(s) => values.push(s),
                    Err(e) => {
                        bin_attr_vals
                            .entry(a_type.clone())
                            .or_default()
                            .push(e.into_bytes());
                        any_binary = true;
                    }
                }
            }
            if any_binary {
                bin_attr_vals
                    .entry(a_type)
                    .or_default()
                    .extend(values.into_iter().map(String::into_bytes));
            } else {
                attr_vals.insert(a_type, values);
            }
        }
        Ok(SearchEntry {
            dn,
            attrs: attr_vals,
            bin_attrs: bin_attr_vals,
        })
    }
}

/// Parse the referrals from the supplied BER-encoded sequence.
///
/// Components which aren't proper octet strings are skipped; no referral
/// chasing happens anywhere in this library, the URIs are only reported.
pub fn parse_refs(t: StructureTag) -> Vec<String> {
    t.expect_constructed()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.expect_primitive())
        .filter_map(|v| String::from_utf8(v).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lber::common::TagClass;
    use lber::structure::PL;

    fn entry_tag(dn: &str, attrs: Vec<(&str, Vec<&[u8]>)>) -> StructureTag {
        StructureTag {
            class: TagClass::Application,
            id: 4,
            payload: PL::C(vec![
                StructureTag {
                    class: TagClass::Universal,
                    id: 4,
                    payload: PL::P(dn.as_bytes().to_vec()),
                },
                StructureTag {
                    class: TagClass::Universal,
                    id: 16,
                    payload: PL::C(
                        attrs
                            .into_iter()
                            .map(|(name, vals)| StructureTag {
                                class: TagClass::Universal,
                                id: 16,
                                payload: PL::C(vec![
                                    StructureTag {
                                        class: TagClass::Universal,
                                        id: 4,
                                        payload: PL::P(name.as_bytes().to_vec()),
                                    },
                                    StructureTag {
                                        class: TagClass::Universal,
                                        id: 17,
                                        payload: PL::C(
                                            vals.into_iter()
                                                .map(|v| StructureTag {
                                                    class: TagClass::Universal,
                                                    id: 4,
                                                    payload: PL::P(v.to_vec()),
                                                })
                                                .collect(),
                                        ),
                                    },
                                ]),
                            })
                            .collect(),
                    ),
                },
            ]),
        }
    }

    #[test]
    fn construct_text_entry() {
        let tag = entry_tag(
            "uid=a,dc=x",
            vec![("objectClass", vec![b"top", b"person"]), ("cn", vec![b"A"])],
        );
        let entry = SearchEntry::construct(ResultEntry::new(tag, vec![])).unwrap();
        assert_eq!(entry.dn, "uid=a,dc=x");
        assert_eq!(entry.attrs["objectClass"], vec!["top", "person"]);
        assert_eq!(entry.attrs["cn"], vec!["A"]);
        assert!(entry.bin_attrs.is_empty());
    }

    #[test]
    fn construct_binary_entry() {
        let tag = entry_tag("uid=a,dc=x", vec![("photo", vec![b"ok", b"\xff\xfe"])]);
        let entry = SearchEntry::construct(ResultEntry::new(tag, vec![])).unwrap();
        // one binary value drags the whole attribute into bin_attrs
        assert!(entry.attrs.is_empty());
        assert_eq!(entry.bin_attrs["photo"].len(), 2);
    }

    #[test]
    fn construct_malformed() {
        let tag = StructureTag {
            class: TagClass::Application,
            id: 4,
            payload: PL::P(vec![1, 2, 3]),
        };
        assert!(SearchEntry::construct(ResultEntry::new(tag, vec![])).is_err());
    }
}
