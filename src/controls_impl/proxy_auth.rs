use super::RawControl;

pub const PROXY_AUTH_OID: &str = "2.16.840.1.113730.3.4.18";

/// Proxied Authorization control ([RFC 4370](https://tools.ietf.org/html/rfc4370)).
///
/// The RFC requires this control to always be critical, so that's how
/// it's constructed. The control value is the authorization identity
/// itself, not a BER structure.
#[derive(Clone, Debug)]
pub struct ProxyAuth {
    /// Authorization identity, empty for anonymous.
    pub authzid: String,
}

impl From<ProxyAuth> for RawControl {
    fn from(pa: ProxyAuth) -> RawControl {
        RawControl {
            ctype: PROXY_AUTH_OID.to_owned(),
            crit: true,
            val: Some(Vec::from(pa.authzid.as_bytes())),
        }
    }
}
