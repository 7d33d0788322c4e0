//! LDAP operations.
//!
//! All operations live on [`LdapConn`](struct.LdapConn.html) and block until
//! the final response arrives. Mutating operations accept request controls;
//! while a transaction started with [`begin()`](struct.LdapConn.html#method.begin)
//! is active, they automatically carry the transaction control as well.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::MutexGuard;

use bytes::BytesMut;
use lber::common::TagClass;
use lber::structures::{Boolean, Enumerated, Integer, Null, OctetString, Sequence, Set, Tag};
use log::debug;

use crate::conn::{ConnCore, LdapConn};
use crate::controls::RawControl;
use crate::dn::Dn;
use crate::exop_impl::{Cancel, EndTxn, EndTxnResp, Exop, PasswordModify, StartTxn, WhoAmI};
use crate::filter;
use crate::protocol::{
    encode_envelope, ABANDON_REQ, ADD_REQ, ADD_RESP, BIND_REQ, BIND_RESP, COMPARE_REQ,
    COMPARE_RESP, DELETE_REQ, DELETE_RESP, MODDN_REQ, MODDN_RESP, MODIFY_REQ, MODIFY_RESP,
    SEARCH_REQ, SEARCH_RES_DONE, SEARCH_RES_ENTRY, SEARCH_RES_REF, UNBIND_REQ,
};
use crate::result::{
    CompareResult, ExopResult, LdapError, LdapResult, Result, SearchResult,
};
use crate::search::{ResultEntry, Scope, SearchOptions};

/// Possible sub-operations for the Modify operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mod<S: AsRef<[u8]> + Eq + Hash> {
    /// Add an attribute, with at least one value.
    Add(S, HashSet<S>),
    /// Delete the entire attribute, or the given values of an attribute.
    Delete(S, HashSet<S>),
    /// Replace an existing attribute, setting its values to those in the
    /// set, or delete it if no values are given.
    Replace(S, HashSet<S>),
    /// Increment the attribute by the given value.
    Increment(S, S),
}

fn octet_string(bytes: &[u8]) -> Tag {
    Tag::OctetString(OctetString {
        inner: bytes.to_vec(),
        ..Default::default()
    })
}

fn value_set<S: AsRef<[u8]> + Eq + Hash>(values: HashSet<S>) -> Tag {
    Tag::Set(Set {
        inner: values
            .into_iter()
            .map(|v| octet_string(v.as_ref()))
            .collect(),
        ..Default::default()
    })
}

impl LdapConn {
    /// Do a simple Bind with the provided DN (`bind_dn`) and password
    /// (`bind_pw`).
    ///
    /// A repeated Bind on an already bound connection is a no-op returning
    /// success; reconnect to rebind under another identity.
    pub fn simple_bind(&self, bind_dn: &str, bind_pw: &str) -> Result<LdapResult> {
        let mut core = self.lock()?;
        if core.bound {
            return Ok(LdapResult {
                rc: 0,
                matched: String::new(),
                text: String::new(),
                refs: vec![],
                ctrls: vec![],
            });
        }
        let req = Tag::Sequence(Sequence {
            id: BIND_REQ,
            class: TagClass::Application,
            inner: vec![
                Tag::Integer(Integer {
                    inner: 3,
                    ..Default::default()
                }),
                octet_string(bind_dn.as_bytes()),
                Tag::OctetString(OctetString {
                    id: 0,
                    class: TagClass::Context,
                    inner: Vec::from(bind_pw.as_bytes()),
                }),
            ],
        });
        let res = core.op_call(req, BIND_RESP, vec![])?.0;
        if res.rc == 0 {
            core.bound = true;
        }
        Ok(res)
    }

    /// Terminate the connection to the server. The Unbind notice is sent
    /// on a best-effort basis; the transport is closed regardless.
    pub fn unbind(&self) -> Result<()> {
        let mut core = self.lock()?;
        let req = Tag::Null(Null {
            id: UNBIND_REQ,
            class: TagClass::Application,
            inner: (),
        });
        core.shutdown(Some(req));
        Ok(())
    }

    /// Perform a Search with the given base DN, scope, RFC 4515 filter
    /// string, and list of attributes to return. An empty attribute list,
    /// or the special name `*`, returns all user attributes.
    pub fn search<S: AsRef<str>>(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[S],
    ) -> Result<SearchResult> {
        self.search_with(SearchOptions::new(), base, scope, filter, attrs)
    }

    /// Like [`search()`](#method.search), with explicit
    /// [`SearchOptions`](search/struct.SearchOptions.html) carrying the
    /// rarely used parameters and any request controls.
    pub fn search_with<S: AsRef<str>>(
        &self,
        opts: SearchOptions,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[S],
    ) -> Result<SearchResult> {
        let mut stream = self.streaming_search_with(opts, base, scope, filter, attrs)?;
        let mut entries = vec![];
        while let Some(entry) = stream.next()? {
            entries.push(entry);
        }
        let res = stream.finish()?;
        Ok(SearchResult(entries, res))
    }

    /// Start a Search whose entries are retrieved one by one from the
    /// returned stream. The stream borrows the connection exclusively
    /// until it's dropped.
    pub fn streaming_search<S: AsRef<str>>(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[S],
    ) -> Result<EntryStream> {
        self.streaming_search_with(SearchOptions::new(), base, scope, filter, attrs)
    }

    /// See [`streaming_search()`](#method.streaming_search) and
    /// [`search_with()`](#method.search_with).
    pub fn streaming_search_with<S: AsRef<str>>(
        &self,
        opts: SearchOptions,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[S],
    ) -> Result<EntryStream> {
        let parsed = filter::parse(filter)?;
        let req = Tag::Sequence(Sequence {
            id: SEARCH_REQ,
            class: TagClass::Application,
            inner: vec![
                octet_string(base.as_bytes()),
                Tag::Enumerated(Enumerated {
                    inner: scope as i64,
                    ..Default::default()
                }),
                Tag::Enumerated(Enumerated {
                    inner: opts.deref as i64,
                    ..Default::default()
                }),
                Tag::Integer(Integer {
                    inner: opts.sizelimit as i64,
                    ..Default::default()
                }),
                Tag::Integer(Integer {
                    inner: opts.timelimit as i64,
                    ..Default::default()
                }),
                Tag::Boolean(Boolean {
                    inner: opts.typesonly,
                    ..Default::default()
                }),
                parsed.to_tag(),
                Tag::Sequence(Sequence {
                    inner: attrs
                        .iter()
                        .map(|s| octet_string(s.as_ref().as_bytes()))
                        .collect(),
                    ..Default::default()
                }),
            ],
        });
        let mut core = self.lock()?;
        let id = {
            core.ensure_open()?;
            let id = core.next_msgid()?;
            let mut out = BytesMut::new();
            encode_envelope(&mut out, id, req, opts.controls);
            core.write_all(&out)?;
            id
        };
        Ok(EntryStream {
            core,
            id,
            res: None,
            done: false,
        })
    }

    /// Add an entry named by `dn`, with the given attributes and their
    /// value sets. None of the value sets may be empty.
    pub fn add<S: AsRef<[u8]> + Eq + Hash>(
        &self,
        dn: &str,
        attrs: Vec<(S, HashSet<S>)>,
        ctrls: Vec<RawControl>,
    ) -> Result<LdapResult> {
        let mut any_empty = false;
        let req = Tag::Sequence(Sequence {
            id: ADD_REQ,
            class: TagClass::Application,
            inner: vec![
                octet_string(dn.as_bytes()),
                Tag::Sequence(Sequence {
                    inner: attrs
                        .into_iter()
                        .map(|(name, vals)| {
                            if vals.is_empty() {
                                any_empty = true;
                            }
                            Tag::Sequence(Sequence {
                                inner: vec![octet_string(name.as_ref()), value_set(vals)],
                                ..Default::default()
                            })
                        })
                        .collect(),
                    ..Default::default()
                }),
            ],
        });
        if any_empty {
            return Err(LdapError::AddNoValues);
        }
        self.mutating_op(req, ADD_RESP, ctrls)
    }

    /// Delete an entry named by `dn`.
    pub fn delete(&self, dn: &str, ctrls: Vec<RawControl>) -> Result<LdapResult> {
        // Delete is the one request whose body is a bare octet string,
        // primitive, not a sequence.
        let req = Tag::OctetString(OctetString {
            id: DELETE_REQ,
            class: TagClass::Application,
            inner: Vec::from(dn.as_bytes()),
        });
        self.mutating_op(req, DELETE_RESP, ctrls)
    }

    /// Modify an entry named by `dn` by sequentially applying the
    /// modifications given by `mods`. See [`Mod`](enum.Mod.html) for the
    /// possible values.
    pub fn modify<S: AsRef<[u8]> + Eq + Hash>(
        &self,
        dn: &str,
        mods: Vec<Mod<S>>,
        ctrls: Vec<RawControl>,
    ) -> Result<LdapResult> {
        let mut any_add_empty = false;
        let req = Tag::Sequence(Sequence {
            id: MODIFY_REQ,
            class: TagClass::Application,
            inner: vec![
                octet_string(dn.as_bytes()),
                Tag::Sequence(Sequence {
                    inner: mods
                        .into_iter()
                        .map(|m| {
                            let mut is_add = false;
                            let (num, attr, values) = match m {
                                Mod::Add(attr, values) => {
                                    is_add = true;
                                    (0, attr, values)
                                }
                                Mod::Delete(attr, values) => (1, attr, values),
                                Mod::Replace(attr, values) => (2, attr, values),
                                Mod::Increment(attr, value) => (3, attr, HashSet::from([value])),
                            };
                            if is_add && values.is_empty() {
                                any_add_empty = true;
                            }
                            Tag::Sequence(Sequence {
                                inner: vec![
                                    Tag::Enumerated(Enumerated {
                                        inner: num,
                                        ..Default::default()
                                    }),
                                    Tag::Sequence(Sequence {
                                        inner: vec![octet_string(attr.as_ref()), value_set(values)],
                                        ..Default::default()
                                    }),
                                ],
                                ..Default::default()
                            })
                        })
                        .collect(),
                    ..Default::default()
                }),
            ],
        });
        if any_add_empty {
            return Err(LdapError::AddNoValues);
        }
        self.mutating_op(req, MODIFY_RESP, ctrls)
    }

    /// Rename and/or move an entry named by `dn`. The new name is given by
    /// `rdn`. If `delete_old` is `true`, the previous value of the naming
    /// attribute is deleted from the entry. To move the entry elsewhere in
    /// the tree, `new_sup` names the new superior entry.
    pub fn modifydn(
        &self,
        dn: &str,
        rdn: &str,
        delete_old: bool,
        new_sup: Option<&str>,
        ctrls: Vec<RawControl>,
    ) -> Result<LdapResult> {
        let mut params = vec![
            octet_string(dn.as_bytes()),
            octet_string(rdn.as_bytes()),
            Tag::Boolean(Boolean {
                inner: delete_old,
                ..Default::default()
            }),
        ];
        if let Some(new_sup) = new_sup {
            params.push(Tag::OctetString(OctetString {
                id: 0,
                class: TagClass::Context,
                inner: Vec::from(new_sup.as_bytes()),
            }));
        }
        let req = Tag::Sequence(Sequence {
            id: MODDN_REQ,
            class: TagClass::Application,
            inner: params,
        });
        self.mutating_op(req, MODDN_RESP, ctrls)
    }

    /// Move an entry under a new parent, keeping its RDN. The RDN is
    /// recovered by exploding `dn`.
    pub fn move_entry(
        &self,
        dn: &str,
        new_parent: &str,
        ctrls: Vec<RawControl>,
    ) -> Result<LdapResult> {
        let parsed: Dn = dn.parse()?;
        let rdn = parsed
            .rdn()
            .ok_or(LdapError::DnParsing {
                pos: 0,
                msg: "empty DN",
            })?
            .to_string();
        self.modifydn(dn, &rdn, false, Some(new_parent), ctrls)
    }

    /// Compare the value(s) of the attribute `attr` of the entry named by
    /// `dn` with `val`. A match is reported through the result code; see
    /// [`CompareResult`](result/struct.CompareResult.html).
    pub fn compare<B: AsRef<[u8]>>(
        &self,
        dn: &str,
        attr: &str,
        val: B,
        ctrls: Vec<RawControl>,
    ) -> Result<CompareResult> {
        let req = Tag::Sequence(Sequence {
            id: COMPARE_REQ,
            class: TagClass::Application,
            inner: vec![
                octet_string(dn.as_bytes()),
                Tag::Sequence(Sequence {
                    inner: vec![octet_string(attr.as_bytes()), octet_string(val.as_ref())],
                    ..Default::default()
                }),
            ],
        });
        let mut core = self.lock()?;
        Ok(CompareResult(core.op_call(req, COMPARE_RESP, ctrls)?.0))
    }

    /// Perform an Extended operation. Extended operations are defined in
    /// the [`exop`](exop/index.html) module.
    pub fn extended<E: Into<Exop>>(
        &self,
        exop: E,
        ctrls: Vec<RawControl>,
    ) -> Result<ExopResult> {
        let mut core = self.lock()?;
        let lre = core.extended_op(exop.into(), ctrls)?;
        Ok(ExopResult(lre.1, lre.0))
    }

    /// Ask the server for the authorization identity of this connection
    /// (RFC 4532 Who Am I).
    pub fn whoami(&self, ctrls: Vec<RawControl>) -> Result<String> {
        let (exop, _res) = self.extended(WhoAmI, ctrls)?.success()?;
        match exop.val {
            Some(val) => String::from_utf8(val).map_err(|_| LdapError::DecodingUTF8),
            None => Ok(String::new()),
        }
    }

    /// Change a password (RFC 3062). `user` targets another entry when
    /// given; `old` proves knowledge of the current password where the
    /// server requires it; a missing `new` asks the server to generate a
    /// password, which is then returned.
    pub fn modify_password(
        &self,
        user: Option<&str>,
        old: Option<&str>,
        new: Option<&str>,
        ctrls: Vec<RawControl>,
    ) -> Result<Option<String>> {
        let req = PasswordModify {
            user_id: user,
            old_passwd: old,
            new_passwd: new,
        };
        let (exop, _) = self.extended(req, ctrls)?.success()?;
        Ok(exop
            .parse::<crate::exop::PasswordModifyResp>()?
            .and_then(|resp| resp.gen_passwd))
    }

    /// Start a transaction (RFC 5805). While the transaction is active,
    /// Add, Modify, Delete and ModifyDN requests on this connection carry
    /// the transaction control automatically.
    pub fn begin(&self) -> Result<()> {
        let mut core = self.lock()?;
        if core.txn_id.is_some() {
            return Err(LdapError::TxnInProgress);
        }
        let lre = core.extended_op(Exop::from(StartTxn), vec![])?;
        lre.0.success()?;
        let txn_id = lre.1.val.ok_or(LdapError::BerDecode("transaction id"))?;
        core.txn_id = Some(txn_id);
        Ok(())
    }

    /// Commit the active transaction.
    pub fn commit(&self) -> Result<()> {
        self.end_txn(true)
    }

    /// Abort the active transaction, undoing the operations made under it.
    pub fn rollback(&self) -> Result<()> {
        self.end_txn(false)
    }

    fn end_txn(&self, commit: bool) -> Result<()> {
        let mut core = self.lock()?;
        let txn_id = core.txn_id.clone().ok_or(LdapError::NoTxn)?;
        let lre = core.extended_op(
            Exop::from(EndTxn {
                txn_id: &txn_id,
                commit,
            }),
            vec![],
        )?;
        if let Err(e) = lre.0.clone().success() {
            if let Some(EndTxnResp { msg_id: Some(id) }) = lre.1.parse()? {
                debug!("transaction failed at message ID {}", id);
            }
            return Err(e);
        }
        // the identifier is spent only once the server confirms the end
        core.txn_id = None;
        Ok(())
    }

    /// Ask the server to abandon the operation identified by `msgid`.
    /// Abandon has no response; there is no way to know whether it worked.
    pub fn abandon(&self, msgid: i32) -> Result<()> {
        let mut core = self.lock()?;
        let req = Tag::Integer(Integer {
            id: ABANDON_REQ,
            class: TagClass::Application,
            inner: msgid as i64,
        });
        core.send_only(req, vec![])
    }

    /// Ask the server to cancel the operation identified by `msgid`
    /// (RFC 3909). Unlike [`abandon()`](#method.abandon), the server
    /// reports the outcome.
    pub fn cancel(&self, msgid: i32, ctrls: Vec<RawControl>) -> Result<ExopResult> {
        self.extended(Cancel { msg_id: msgid }, ctrls)
    }

    /// An update operation: runs with the transaction control attached
    /// while a transaction is active.
    fn mutating_op(
        &self,
        req: Tag,
        expected: u64,
        mut ctrls: Vec<RawControl>,
    ) -> Result<LdapResult> {
        let mut core = self.lock()?;
        if let Some(txn_ctrl) = core.take_txn_control() {
            ctrls.push(txn_ctrl);
        }
        Ok(core.op_call(req, expected, ctrls)?.0)
    }
}

/// Handle for retrieving entries of an in-progress Search one by one.
///
/// The stream holds the connection lock for its whole lifetime, which is
/// exact about the protocol reality: the entries keep arriving on the
/// shared stream until the final result, and nothing else can be
/// multiplexed in between.
pub struct EntryStream<'a> {
    core: MutexGuard<'a, ConnCore>,
    id: i32,
    res: Option<LdapResult>,
    done: bool,
}

impl<'a> EntryStream<'a> {
    /// Fetch the next entry. `Ok(None)` signals the end of the stream;
    /// the overall result is then available from [`finish()`](#method.finish).
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<ResultEntry>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let env = self.core.read_envelope()?;
            if env.id != self.id {
                return Err(LdapError::MismatchedId {
                    expected: self.id,
                    got: env.id,
                });
            }
            if env.protoop.class != TagClass::Application {
                return Err(LdapError::UnexpectedTag {
                    expected: SEARCH_RES_ENTRY,
                    got: env.protoop.id,
                });
            }
            match env.protoop.id {
                SEARCH_RES_ENTRY => {
                    return Ok(Some(ResultEntry::new(env.protoop, env.ctrls)));
                }
                SEARCH_RES_REF => {
                    // no referral chasing; drop it
                    debug!("ignoring search referral");
                    continue;
                }
                SEARCH_RES_DONE => {
                    let ctrls = env.ctrls;
                    let mut res = crate::result::LdapResultExt::try_from(env.protoop)?.0;
                    res.ctrls = ctrls;
                    self.res = Some(res);
                    self.done = true;
                    return Ok(None);
                }
                got => {
                    return Err(LdapError::UnexpectedTag {
                        expected: SEARCH_RES_ENTRY,
                        got,
                    })
                }
            }
        }
    }

    /// Drain any remaining entries and return the overall Search result.
    pub fn finish(mut self) -> Result<LdapResult> {
        while !self.done {
            self.next()?;
        }
        self.res.take().ok_or(LdapError::EndOfStream)
    }

    /// The message ID of the Search, usable with `abandon` or `cancel`
    /// from another connection.
    pub fn last_id(&self) -> i32 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::NOTICE_OF_DISCONNECTION_OID;
    use crate::controls_impl::TXN_SPEC_OID;
    use crate::exop_impl::STARTTLS_OID;
    use crate::protocol::{decode_envelope, Envelope, EXTENDED_RESP, SEARCH_RES_DONE, SEARCH_RES_ENTRY};
    use crate::search::SearchEntry;

    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    // One scripted server conversation: the handler sees each decoded
    // request envelope and produces the bytes to send back (possibly
    // several envelopes, possibly nothing). The returned log lists
    // (message ID, operation tag) of every request received.
    fn serve<F>(mut handler: F) -> (String, thread::JoinHandle<Vec<(i32, u64)>>)
    where
        F: FnMut(usize, &Envelope) -> Vec<u8> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let handle = thread::spawn(move || {
            let (mut sock, _) = listener.accept().expect("accept");
            let mut buf = bytes::BytesMut::new();
            let mut log = vec![];
            let mut seq = 0;
            loop {
                match decode_envelope(&mut buf) {
                    Ok(Some(env)) => {
                        log.push((env.id, env.protoop.id));
                        let resp = handler(seq, &env);
                        seq += 1;
                        if !resp.is_empty() {
                            sock.write_all(&resp).expect("server write");
                        }
                        continue;
                    }
                    Ok(None) => (),
                    Err(_) => break,
                }
                let mut chunk = [0u8; 4096];
                match sock.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            log
        });
        (addr, handle)
    }

    fn envelope_bytes(id: i32, body: Tag) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_envelope(&mut buf, id, body, vec![]);
        buf.to_vec()
    }

    fn result_body(app: u64, rc: u32, text: &str, extra: Vec<Tag>) -> Tag {
        let mut inner = vec![
            Tag::Enumerated(Enumerated {
                inner: rc as i64,
                ..Default::default()
            }),
            octet_string(b""),
            octet_string(text.as_bytes()),
        ];
        inner.extend(extra);
        Tag::Sequence(Sequence {
            id: app,
            class: TagClass::Application,
            inner,
        })
    }

    fn result_envelope(id: i32, app: u64, rc: u32) -> Vec<u8> {
        envelope_bytes(id, result_body(app, rc, "", vec![]))
    }

    fn extended_envelope(id: i32, rc: u32, name: Option<&str>, val: Option<&[u8]>) -> Vec<u8> {
        let mut extra = vec![];
        if let Some(name) = name {
            extra.push(Tag::OctetString(OctetString {
                id: 10,
                class: TagClass::Context,
                inner: name.as_bytes().to_vec(),
            }));
        }
        if let Some(val) = val {
            extra.push(Tag::OctetString(OctetString {
                id: 11,
                class: TagClass::Context,
                inner: val.to_vec(),
            }));
        }
        envelope_bytes(id, result_body(EXTENDED_RESP, rc, "", extra))
    }

    fn entry_envelope(id: i32, dn: &str, attrs: Vec<(&str, Vec<&[u8]>)>) -> Vec<u8> {
        let body = Tag::Sequence(Sequence {
            id: SEARCH_RES_ENTRY,
            class: TagClass::Application,
            inner: vec![
                octet_string(dn.as_bytes()),
                Tag::Sequence(Sequence {
                    inner: attrs
                        .into_iter()
                        .map(|(name, vals)| {
                            Tag::Sequence(Sequence {
                                inner: vec![
                                    octet_string(name.as_bytes()),
                                    Tag::Set(Set {
                                        inner: vals.into_iter().map(octet_string).collect(),
                                        ..Default::default()
                                    }),
                                ],
                                ..Default::default()
                            })
                        })
                        .collect(),
                    ..Default::default()
                }),
            ],
        });
        envelope_bytes(id, body)
    }

    fn exop_oid(env: &Envelope) -> String {
        let children = env.protoop.clone().expect_constructed().expect("exop body");
        let oid = children
            .into_iter()
            .find(|t| t.class == TagClass::Context && t.id == 0)
            .and_then(|t| t.expect_primitive())
            .expect("exop oid");
        String::from_utf8(oid).expect("oid utf8")
    }

    #[test]
    fn bind_success_and_rebind_noop() {
        let (addr, handle) = serve(|_, env| match env.protoop.id {
            BIND_REQ => result_envelope(env.id, BIND_RESP, 0),
            UNBIND_REQ => vec![],
            other => panic!("unexpected op {}", other),
        });
        let conn = LdapConn::new(&addr).unwrap();
        let res = conn.simple_bind("cn=admin,dc=example,dc=com", "secret").unwrap();
        assert_eq!(res.rc, 0);
        // rebinding is a local no-op
        let res = conn.simple_bind("cn=admin,dc=example,dc=com", "secret").unwrap();
        assert_eq!(res.rc, 0);
        conn.unbind().unwrap();
        let log = handle.join().unwrap();
        assert_eq!(log, vec![(1, BIND_REQ), (2, UNBIND_REQ)]);
    }

    #[test]
    fn search_returns_two_entries() {
        let (addr, handle) = serve(|_, env| match env.protoop.id {
            SEARCH_REQ => {
                let mut out = entry_envelope(
                    env.id,
                    "uid=a,dc=example,dc=com",
                    vec![("cn", vec![b"A"])],
                );
                out.extend(entry_envelope(
                    env.id,
                    "uid=b,dc=example,dc=com",
                    vec![("cn", vec![b"B"])],
                ));
                out.extend(result_envelope(env.id, SEARCH_RES_DONE, 0));
                out
            }
            UNBIND_REQ => vec![],
            other => panic!("unexpected op {}", other),
        });
        let conn = LdapConn::new(&addr).unwrap();
        let (entries, res) = conn
            .search("dc=example,dc=com", Scope::Subtree, "(objectClass=*)", &["cn"])
            .unwrap()
            .success()
            .unwrap();
        assert_eq!(entries.len(), 2);
        let first = SearchEntry::construct(entries[0].clone()).unwrap();
        assert_eq!(first.dn, "uid=a,dc=example,dc=com");
        assert_eq!(first.attrs["cn"], vec!["A"]);
        assert_eq!(res.rc, 0);
        conn.unbind().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn search_unexpected_tag_is_protocol_error() {
        let (addr, handle) = serve(|_, env| match env.protoop.id {
            SEARCH_REQ => result_envelope(env.id, ADD_RESP, 0),
            _ => vec![],
        });
        let conn = LdapConn::new(&addr).unwrap();
        let err = conn
            .search("dc=example", Scope::Base, "(objectClass=*)", &["cn"])
            .unwrap_err();
        assert!(matches!(err, LdapError::UnexpectedTag { got, .. } if got == ADD_RESP));
        drop(conn);
        handle.join().unwrap();
    }

    #[test]
    fn message_ids_increase_from_one() {
        let (addr, handle) = serve(|_, env| match env.protoop.id {
            crate::protocol::EXTENDED_REQ => extended_envelope(env.id, 0, None, Some(b"dn:x")),
            UNBIND_REQ => vec![],
            other => panic!("unexpected op {}", other),
        });
        let conn = LdapConn::new(&addr).unwrap();
        for _ in 0..3 {
            conn.whoami(vec![]).unwrap();
        }
        conn.unbind().unwrap();
        let ids: Vec<i32> = handle.join().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn unsolicited_disconnection_poisons_connection() {
        let (addr, handle) = serve(|_, _| {
            extended_envelope(0, 52, Some(NOTICE_OF_DISCONNECTION_OID), None)
        });
        let conn = LdapConn::new(&addr).unwrap();
        let err = conn.whoami(vec![]).unwrap_err();
        assert!(matches!(err, LdapError::Disconnected(_)));
        assert!(conn.is_closed());
        let err = conn.whoami(vec![]).unwrap_err();
        assert!(matches!(err, LdapError::ConnectionClosed));
        drop(conn);
        handle.join().unwrap();
    }

    #[test]
    fn transaction_rollback_clears_identifier() {
        let (addr, handle) = serve(|_, env| match env.protoop.id {
            crate::protocol::EXTENDED_REQ => {
                let oid = exop_oid(env);
                match oid.as_str() {
                    super::super::exop_impl::TXN_START_OID => {
                        extended_envelope(env.id, 0, None, Some(b"txid123"))
                    }
                    super::super::exop_impl::TXN_END_OID => extended_envelope(env.id, 0, None, None),
                    other => panic!("unexpected exop {}", other),
                }
            }
            ADD_REQ => {
                // the update inside the transaction must carry the
                // transaction control with the server-issued identifier
                let txn = env
                    .ctrls
                    .iter()
                    .find(|c| c.1.ctype == TXN_SPEC_OID)
                    .expect("transaction control");
                assert!(txn.1.crit);
                assert_eq!(txn.1.val.as_deref(), Some(&b"txid123"[..]));
                result_envelope(env.id, ADD_RESP, 53)
            }
            UNBIND_REQ => vec![],
            other => panic!("unexpected op {}", other),
        });
        let conn = LdapConn::new(&addr).unwrap();
        conn.begin().unwrap();
        let res = conn
            .add(
                "uid=c,dc=example,dc=com",
                vec![("cn", HashSet::from(["C"]))],
                vec![],
            )
            .unwrap();
        assert_eq!(res.rc, 53);
        conn.rollback().unwrap();
        // identifier is gone: a new transaction can start
        conn.begin().unwrap();
        assert!(matches!(conn.begin(), Err(LdapError::TxnInProgress)));
        conn.unbind().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn refused_starttls_stays_plain() {
        let (addr, handle) = serve(|_, env| match env.protoop.id {
            crate::protocol::EXTENDED_REQ => {
                assert_eq!(exop_oid(env), STARTTLS_OID);
                extended_envelope(env.id, 1, None, None)
            }
            UNBIND_REQ => vec![],
            other => panic!("unexpected op {}", other),
        });
        let conn = LdapConn::new(&addr).unwrap();
        let err = conn.start_tls().unwrap_err();
        assert!(matches!(err, LdapError::LdapResult { .. }));
        assert!(!conn.lock().unwrap().is_tls());
        assert!(!conn.is_closed());
        conn.unbind().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn compare_outcomes() {
        let (addr, handle) = serve(|seq, env| match env.protoop.id {
            COMPARE_REQ => result_envelope(env.id, COMPARE_RESP, if seq == 0 { 6 } else { 5 }),
            UNBIND_REQ => vec![],
            other => panic!("unexpected op {}", other),
        });
        let conn = LdapConn::new(&addr).unwrap();
        assert!(conn
            .compare("uid=a,dc=x", "cn", "A", vec![])
            .unwrap()
            .equal()
            .unwrap());
        assert!(!conn
            .compare("uid=a,dc=x", "cn", "B", vec![])
            .unwrap()
            .equal()
            .unwrap());
        conn.unbind().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn abandon_is_fire_and_forget() {
        let (addr, handle) = serve(|_, env| match env.protoop.id {
            ABANDON_REQ | UNBIND_REQ => vec![],
            other => panic!("unexpected op {}", other),
        });
        let conn = LdapConn::new(&addr).unwrap();
        conn.abandon(1).unwrap();
        conn.unbind().unwrap();
        let log = handle.join().unwrap();
        assert_eq!(log[0].1, ABANDON_REQ);
    }

    #[test]
    fn entry_envelope_shape() {
        let bytes = entry_envelope(9, "uid=a,dc=x", vec![("cn", vec![b"A"])]);
        let mut buf = BytesMut::from(&bytes[..]);
        let env = decode_envelope(&mut buf).unwrap().unwrap();
        assert_eq!(env.id, 9);
        assert_eq!(env.protoop.id, SEARCH_RES_ENTRY);
    }
}
