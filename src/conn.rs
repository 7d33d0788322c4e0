//! Connection handling.
//!
//! An [`LdapConn`](struct.LdapConn.html) owns one TCP connection to a
//! directory server, possibly wrapped in TLS, and serializes every operation
//! on it behind a single mutex: concurrent callers are fine, they just take
//! turns. There is no pipelining; one request occupies the connection from
//! the moment its envelope is written until its last response is decoded,
//! and responses are therefore read in order.

use std::io::{Read, Write};
use std::mem;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bytes::BytesMut;
use lber::common::TagClass;
use lber::structures::{Sequence, Tag};
use log::{debug, warn};
use native_tls::{TlsConnector, TlsStream};
use url::Url;

use crate::controls::RawControl;
use crate::exop_impl::{construct_exop, Exop, StartTLS, TXN_ABORTED_OID};
use crate::protocol::{decode_envelope, encode_envelope, Envelope, EXTENDED_REQ, EXTENDED_RESP};
use crate::result::{LdapError, LdapResultExt, Result};

pub(crate) const NOTICE_OF_DISCONNECTION_OID: &str = "1.3.6.1.4.1.1466.20036";

const READ_CHUNK: usize = 8192;

/// Additional settings for an LDAP connection.
///
/// An instance with default values is constructed by [`new()`](#method.new),
/// and all available settings can be replaced through a builder-like
/// interface.
#[derive(Default)]
pub struct LdapConnSettings {
    conn_timeout: Option<Duration>,
    connector: Option<TlsConnector>,
    starttls: bool,
    no_tls_verify: bool,
}

impl LdapConnSettings {
    /// Create an instance of the structure with default settings.
    pub fn new() -> LdapConnSettings {
        LdapConnSettings {
            ..Default::default()
        }
    }

    /// Set the connection timeout. If a connection to the server can't be
    /// established before the timeout expires, an error will be returned
    /// to the user. Defaults to `None`, meaning an infinite timeout.
    pub fn set_conn_timeout(mut self, timeout: Duration) -> Self {
        self.conn_timeout = Some(timeout);
        self
    }

    /// Set a custom TLS connector, which enables setting various options
    /// when establishing a secure connection. The default of `None` will
    /// use a connector with default settings.
    pub fn set_connector(mut self, connector: TlsConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// If `true`, use the StartTLS extended operation to establish a
    /// secure connection immediately after connecting. Defaults to `false`.
    pub fn set_starttls(mut self, starttls: bool) -> Self {
        self.starttls = starttls;
        self
    }

    /// If `true`, try to establish a TLS connection without certificate
    /// verification. Defaults to `false`.
    pub fn set_no_tls_verify(mut self, no_tls_verify: bool) -> Self {
        self.no_tls_verify = no_tls_verify;
        self
    }
}

enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Closed,
}

impl Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::Tls(s) => s.read(buf),
            Transport::Closed => Err(std::io::ErrorKind::NotConnected.into()),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Transport::Plain(s) => s.write_all(buf).and_then(|_| s.flush()),
            Transport::Tls(s) => s.write_all(buf).and_then(|_| s.flush()),
            Transport::Closed => Err(std::io::ErrorKind::NotConnected.into()),
        }
    }

    fn shutdown(&mut self) {
        let res = match self {
            Transport::Plain(s) => s.shutdown(Shutdown::Both),
            Transport::Tls(s) => s.get_ref().shutdown(Shutdown::Both),
            Transport::Closed => Ok(()),
        };
        if let Err(e) = res {
            debug!("socket shutdown error: {}", e);
        }
    }
}

pub(crate) struct ConnCore {
    transport: Transport,
    rdbuf: BytesMut,
    next_id: i32,
    host: String,
    connector: Option<TlsConnector>,
    no_tls_verify: bool,
    pub(crate) bound: bool,
    pub(crate) txn_id: Option<Vec<u8>>,
    pub(crate) closed: bool,
}

/// Handle for LDAP operations; a connected client.
///
/// All operations allow attaching request controls where the protocol
/// admits them. Operations return [`LdapResult`](result/struct.LdapResult.html)
/// or one of its wrappers; inspect the result code or use the `success()`
/// helpers to convert failures into errors.
pub struct LdapConn {
    pub(crate) core: Mutex<ConnCore>,
}

impl LdapConn {
    /// Connect to an LDAP server.
    ///
    /// The address is either a plain `host:port` (port defaulting to 389
    /// when absent), or an `ldap://` / `ldaps://` URL; the latter starts
    /// TLS immediately, with 636 as the default port.
    pub fn new(addr: &str) -> Result<LdapConn> {
        Self::with_settings(LdapConnSettings::new(), addr)
    }

    /// Connect to an LDAP server, using `settings` to specify additional
    /// parameters.
    pub fn with_settings(settings: LdapConnSettings, addr: &str) -> Result<LdapConn> {
        let (host, port, immediate_tls) = if addr.contains("://") {
            let url = Url::parse(addr)?;
            let tls = match url.scheme() {
                "ldap" => false,
                "ldaps" => true,
                s => return Err(LdapError::UnknownScheme(s.to_string())),
            };
            let host = match url.host_str() {
                Some("") | None => "localhost".to_string(),
                Some(h) => h.to_string(),
            };
            let port = url.port().unwrap_or(if tls { 636 } else { 389 });
            (host, port, tls)
        } else {
            match addr.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port
                        .parse()
                        .map_err(|_| LdapError::UnknownScheme(addr.to_string()))?;
                    (host.to_string(), port, false)
                }
                None => (addr.to_string(), 389, false),
            }
        };
        let stream = dial(&host, port, settings.conn_timeout)?;
        let mut core = ConnCore {
            transport: Transport::Plain(stream),
            rdbuf: BytesMut::new(),
            next_id: 0,
            host,
            connector: settings.connector,
            no_tls_verify: settings.no_tls_verify,
            bound: false,
            txn_id: None,
            closed: false,
        };
        if immediate_tls {
            core.tls_wrap()?;
        } else if settings.starttls {
            core.start_tls()?;
        }
        Ok(LdapConn {
            core: Mutex::new(core),
        })
    }

    /// Connect and do a simple Bind in one step.
    pub fn bind(addr: &str, bind_dn: &str, bind_pw: &str) -> Result<LdapConn> {
        let conn = Self::new(addr)?;
        conn.simple_bind(bind_dn, bind_pw)?.success()?;
        Ok(conn)
    }

    /// Connect, upgrade the connection with StartTLS, and do a simple Bind.
    pub fn bind_starttls(
        settings: LdapConnSettings,
        addr: &str,
        bind_dn: &str,
        bind_pw: &str,
    ) -> Result<LdapConn> {
        let conn = Self::with_settings(settings.set_starttls(true), addr)?;
        conn.simple_bind(bind_dn, bind_pw)?.success()?;
        Ok(conn)
    }

    /// Upgrade the connection to TLS with the StartTLS extended operation.
    /// A no-op if the transport is already TLS.
    pub fn start_tls(&self) -> Result<()> {
        self.lock()?.start_tls()
    }

    /// Whether the connection has been closed, by `unbind` or by an error.
    pub fn is_closed(&self) -> bool {
        self.core.lock().map(|core| core.closed).unwrap_or(true)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<ConnCore>> {
        self.core.lock().map_err(|_| LdapError::ConnectionClosed)
    }
}

fn dial(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream> {
    let stream = match timeout {
        None => TcpStream::connect((host, port))?,
        Some(timeout) => {
            let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
            let mut last_err = None;
            let mut stream = None;
            for addr in addrs {
                match TcpStream::connect_timeout(&addr, timeout) {
                    Ok(s) => {
                        stream = Some(s);
                        break;
                    }
                    Err(e) => last_err = Some(e),
                }
            }
            match stream {
                Some(s) => s,
                None => {
                    return Err(last_err
                        .unwrap_or_else(|| std::io::ErrorKind::AddrNotAvailable.into())
                        .into())
                }
            }
        }
    };
    Ok(stream)
}

impl ConnCore {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(LdapError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Allocate the next message ID. IDs are strictly increasing from 1;
    /// the counter refusing to wrap is the caller's cue to reconnect.
    pub(crate) fn next_msgid(&mut self) -> Result<i32> {
        if self.next_id == i32::MAX {
            return Err(LdapError::IdExhausted);
        }
        self.next_id += 1;
        Ok(self.next_id)
    }

    pub(crate) fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(e) = self.transport.write_all(bytes) {
            self.closed = true;
            return Err(e.into());
        }
        Ok(())
    }

    /// Read until one complete envelope is decoded. Unsolicited messages
    /// (ID 0) become errors here and never reach the operation handlers.
    pub(crate) fn read_envelope(&mut self) -> Result<Envelope> {
        loop {
            match decode_envelope(&mut self.rdbuf) {
                Err(e) => return Err(e),
                Ok(Some(env)) if env.id == 0 => return Err(self.unsolicited(env)),
                Ok(Some(env)) => return Ok(env),
                Ok(None) => (),
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = match self.transport.read(&mut chunk) {
                Ok(n) => n,
                Err(e) => {
                    self.closed = true;
                    return Err(e.into());
                }
            };
            if n == 0 {
                self.closed = true;
                return Err(LdapError::EndOfStream);
            }
            self.rdbuf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Classify a server-initiated message. Disconnection and transaction
    /// abort notices poison the connection; anything else only fails the
    /// in-flight operation.
    fn unsolicited(&mut self, env: Envelope) -> LdapError {
        let lre = match env
            .protoop
            .match_class(TagClass::Application)
            .and_then(|t| t.match_id(EXTENDED_RESP))
        {
            Some(protoop) => match LdapResultExt::try_from(protoop) {
                Ok(lre) => lre,
                Err(e) => return e,
            },
            None => return LdapError::BerDecode("unsolicited notification"),
        };
        let oid = lre.1.name.unwrap_or_default();
        match oid.as_str() {
            NOTICE_OF_DISCONNECTION_OID => {
                warn!("server sent notice of disconnection: {}", lre.0.text);
                self.closed = true;
                LdapError::Disconnected(lre.0.text)
            }
            TXN_ABORTED_OID => {
                self.closed = true;
                self.txn_id = None;
                LdapError::TxnAborted(lre.0.text)
            }
            _ => LdapError::Unsolicited(oid),
        }
    }

    /// Write one request and read its single response, checking message ID
    /// and operation tag. The decoded result carries any response controls.
    pub(crate) fn op_call(
        &mut self,
        protoop: Tag,
        expected: u64,
        ctrls: Vec<RawControl>,
    ) -> Result<LdapResultExt> {
        self.ensure_open()?;
        let id = self.next_msgid()?;
        let mut out = BytesMut::new();
        encode_envelope(&mut out, id, protoop, ctrls);
        self.write_all(&out)?;
        let env = self.read_envelope()?;
        self.expect_response(&env, id, expected)?;
        let ctrls = env.ctrls;
        let mut lre = LdapResultExt::try_from(env.protoop)?;
        lre.0.ctrls = ctrls;
        Ok(lre)
    }

    pub(crate) fn expect_response(&self, env: &Envelope, id: i32, expected: u64) -> Result<()> {
        if env.id != id {
            return Err(LdapError::MismatchedId {
                expected: id,
                got: env.id,
            });
        }
        if env.protoop.class != TagClass::Application || env.protoop.id != expected {
            return Err(LdapError::UnexpectedTag {
                expected,
                got: env.protoop.id,
            });
        }
        Ok(())
    }

    /// Write a request for which no response will arrive (Unbind, Abandon).
    pub(crate) fn send_only(&mut self, protoop: Tag, ctrls: Vec<RawControl>) -> Result<()> {
        self.ensure_open()?;
        let id = self.next_msgid()?;
        let mut out = BytesMut::new();
        encode_envelope(&mut out, id, protoop, ctrls);
        self.write_all(&out)
    }

    pub(crate) fn extended_op(
        &mut self,
        exop: Exop,
        ctrls: Vec<RawControl>,
    ) -> Result<LdapResultExt> {
        let req = Tag::Sequence(Sequence {
            id: EXTENDED_REQ,
            class: TagClass::Application,
            inner: construct_exop(exop),
        });
        self.op_call(req, EXTENDED_RESP, ctrls)
    }

    pub(crate) fn start_tls(&mut self) -> Result<()> {
        if matches!(self.transport, Transport::Tls(_)) {
            return Ok(());
        }
        let lre = self.extended_op(Exop::from(StartTLS), vec![])?;
        lre.0.success()?;
        self.tls_wrap()
    }

    /// Wrap the plain transport in a TLS session, in place. All later
    /// traffic, starting with the Bind that usually follows, flows through
    /// the TLS layer.
    fn tls_wrap(&mut self) -> Result<()> {
        if matches!(self.transport, Transport::Tls(_)) {
            return Ok(());
        }
        let connector = match self.connector.take() {
            Some(connector) => connector,
            None => {
                let mut builder = TlsConnector::builder();
                if self.no_tls_verify {
                    builder.danger_accept_invalid_certs(true);
                }
                builder.build()?
            }
        };
        let stream = match mem::replace(&mut self.transport, Transport::Closed) {
            Transport::Plain(stream) => stream,
            other => {
                self.transport = other;
                return Err(LdapError::ConnectionClosed);
            }
        };
        match connector.connect(&self.host, stream) {
            Ok(tls) => {
                self.transport = Transport::Tls(Box::new(tls));
                Ok(())
            }
            Err(e) => {
                self.closed = true;
                Err(LdapError::TlsHandshake(e.to_string()))
            }
        }
    }

    /// Send the Unbind notice and close the transport. Write errors are
    /// not reported; the connection is going away either way.
    pub(crate) fn shutdown(&mut self, unbind_notice: Option<Tag>) {
        if self.closed {
            return;
        }
        if let Some(protoop) = unbind_notice {
            if let Err(e) = self.send_only(protoop, vec![]) {
                debug!("unbind send error: {}", e);
            }
        }
        self.transport.shutdown();
        self.transport = Transport::Closed;
        self.bound = false;
        self.txn_id = None;
        self.closed = true;
    }

    pub(crate) fn take_txn_control(&self) -> Option<RawControl> {
        self.txn_id.as_deref().map(|id| {
            RawControl::from(crate::controls_impl::TxnSpec { id })
        })
    }

    #[cfg(test)]
    pub(crate) fn is_tls(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }
}
