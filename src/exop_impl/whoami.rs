use std::str;

use super::{Exop, ExopParser};
use crate::result::{LdapError, Result};

pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// Who Am I extended operation ([RFC 4532](https://tools.ietf.org/html/rfc4532)).
///
/// This operation doesn't have any data associated with a request. It can be
/// combined with request controls which change the authorization status,
/// in which case the response will reflect the effective identity.
#[derive(Clone, Debug)]
pub struct WhoAmI;

/// Who Am I response.
#[derive(Clone, Debug)]
pub struct WhoAmIResp {
    /// The authorization identity of the bound user, typically prefixed
    /// with `dn:` or `u:`. Empty for an anonymous session.
    pub authzid: String,
}

impl From<WhoAmI> for Exop {
    fn from(_: WhoAmI) -> Exop {
        Exop {
            name: Some(WHOAMI_OID.to_owned()),
            val: None,
        }
    }
}

impl ExopParser for WhoAmIResp {
    fn parse(val: &[u8]) -> Result<WhoAmIResp> {
        let authzid = str::from_utf8(val)
            .map_err(|_| LdapError::DecodingUTF8)?
            .to_owned();
        Ok(WhoAmIResp { authzid })
    }
}
