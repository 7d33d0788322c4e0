//! Distinguished name handling.
//!
//! A [`Dn`](struct.Dn.html) is the syntactic explosion of an RFC 4514 string:
//! a sequence of RDNs, each one or more attribute-value assertions. No schema
//! lookups and no normalization happen here; printing a parsed DN yields the
//! input back, minimally escaped.

use std::fmt;
use std::str::FromStr;

use crate::result::{LdapError, Result};
use crate::util::dn_escape;

/// A parsed distinguished name, most specific RDN first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dn {
    rdns: Vec<Rdn>,
}

/// One relative distinguished name; multi-valued when joined with `+`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rdn {
    avas: Vec<Ava>,
}

/// A single attribute-value assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ava {
    pub attr: String,
    pub value: String,
}

impl Dn {
    /// Number of RDNs.
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// The leftmost (most specific) RDN.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    pub fn at(&self, i: usize) -> Option<&Rdn> {
        self.rdns.get(i)
    }

    /// The name with the first `depth` RDNs removed.
    pub fn parent(&self, depth: usize) -> Dn {
        if depth >= self.rdns.len() {
            return Dn::default();
        }
        Dn {
            rdns: self.rdns[depth..].to_vec(),
        }
    }
}

impl Rdn {
    pub fn multi_valued(&self) -> bool {
        self.avas.len() > 1
    }

    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", rdn)?;
        }
        Ok(())
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "{}={}", ava.attr, dn_escape(&*ava.value))?;
        }
        Ok(())
    }
}

impl FromStr for Dn {
    type Err = LdapError;

    fn from_str(s: &str) -> Result<Dn> {
        Scanner::new(s).explode()
    }
}

enum Sep {
    Comma,
    Plus,
    End,
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Scanner<'a> {
        Scanner {
            input: s.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, msg: &'static str) -> LdapError {
        LdapError::DnParsing { pos: self.pos, msg }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn explode(mut self) -> Result<Dn> {
        let mut rdns = Vec::new();
        self.skip_spaces();
        if self.peek().is_none() {
            return Ok(Dn { rdns });
        }
        loop {
            let mut avas = Vec::new();
            loop {
                let (ava, sep) = self.ava()?;
                avas.push(ava);
                match sep {
                    Sep::Plus => continue,
                    Sep::Comma => break,
                    Sep::End => {
                        rdns.push(Rdn { avas });
                        return Ok(Dn { rdns });
                    }
                }
            }
            rdns.push(Rdn { avas });
        }
    }

    fn ava(&mut self) -> Result<(Ava, Sep)> {
        self.skip_spaces();
        let attr = self.attr_type()?;
        let (value, sep) = self.attr_value()?;
        let value = String::from_utf8(value).map_err(|_| self.err("value is not valid UTF-8"))?;
        Ok((Ava { attr, value }, sep))
    }

    // shortname (letter, then letters/digits/hyphens) or numeric OID
    // (digit, then digits and dots), terminated by '='
    fn attr_type(&mut self) -> Result<String> {
        let accept: fn(u8) -> bool = match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => |c| c.is_ascii_alphanumeric() || c == b'-',
            Some(c) if c.is_ascii_digit() => |c| c.is_ascii_digit() || c == b'.',
            _ => return Err(self.err("expected attribute type")),
        };
        let start = self.pos;
        while let Some(c) = self.peek() {
            if accept(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name = &self.input[start..self.pos];
        match self.bump() {
            Some(b'=') => (),
            _ => return Err(self.err("expected '=' after attribute type")),
        }
        Ok(String::from_utf8(name.to_vec()).expect("ascii attribute type"))
    }

    fn attr_value(&mut self) -> Result<(Vec<u8>, Sep)> {
        if self.peek() == Some(b'"') {
            return self.quoted_value();
        }
        let mut out = Vec::new();
        let mut trailing_spaces = 0;
        let sep = loop {
            match self.bump() {
                None => break Sep::End,
                Some(b',') => break Sep::Comma,
                Some(b'+') => break Sep::Plus,
                Some(0) => return Err(self.err("NUL in value")),
                Some(b'\\') => {
                    out.push(self.escaped()?);
                    trailing_spaces = 0;
                }
                Some(b' ') => {
                    out.push(b' ');
                    trailing_spaces += 1;
                }
                Some(c) => {
                    out.push(c);
                    trailing_spaces = 0;
                }
            }
        };
        // unescaped trailing spaces are insignificant
        out.truncate(out.len() - trailing_spaces);
        Ok((out, sep))
    }

    fn quoted_value(&mut self) -> Result<(Vec<u8>, Sep)> {
        self.bump();
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated quoted value")),
                Some(b'"') => break,
                Some(b'\\') => out.push(self.escaped()?),
                Some(c) => out.push(c),
            }
        }
        self.skip_spaces();
        let sep = match self.bump() {
            None => Sep::End,
            Some(b',') => Sep::Comma,
            Some(b'+') => Sep::Plus,
            _ => return Err(self.err("expected separator after quoted value")),
        };
        Ok((out, sep))
    }

    // A backslash either carries a hex pair or passes the next byte through.
    fn escaped(&mut self) -> Result<u8> {
        let first = self.bump().ok_or_else(|| self.err("dangling backslash"))?;
        if first.is_ascii_hexdigit() {
            match self.peek() {
                Some(second) if second.is_ascii_hexdigit() => {
                    self.pos += 1;
                    return Ok(hex_nibble(first) << 4 | hex_nibble(second));
                }
                _ => return Err(self.err("expected two hex digits after backslash")),
            }
        }
        Ok(first)
    }
}

fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explode_stability() {
        let s = "uid=jdoe,ou=People,dc=example,dc=com";
        let dn: Dn = s.parse().unwrap();
        assert_eq!(dn.len(), 4);
        assert_eq!(dn.to_string(), s);
    }

    #[test]
    fn rdn_accessors() {
        let dn: Dn = "uid=jdoe,ou=People,dc=example,dc=com".parse().unwrap();
        assert_eq!(dn.rdn().unwrap().to_string(), "uid=jdoe");
        assert_eq!(dn.at(1).unwrap().to_string(), "ou=People");
        assert_eq!(dn.parent(1).to_string(), "ou=People,dc=example,dc=com");
        assert_eq!(dn.parent(4), Dn::default());
    }

    #[test]
    fn multi_valued_rdn() {
        let dn: Dn = "cn=John Doe+mail=jdoe@example.com,dc=example".parse().unwrap();
        assert!(dn.rdn().unwrap().multi_valued());
        assert_eq!(dn.rdn().unwrap().avas().len(), 2);
        assert_eq!(
            dn.to_string(),
            "cn=John Doe+mail=jdoe@example.com,dc=example"
        );
    }

    #[test]
    fn escapes() {
        let dn: Dn = "cn=Doe\\, John,dc=example".parse().unwrap();
        assert_eq!(dn.rdn().unwrap().avas()[0].value, "Doe, John");
        let dn: Dn = "cn=Doe\\2c John,dc=example".parse().unwrap();
        assert_eq!(dn.rdn().unwrap().avas()[0].value, "Doe, John");
        // printing escapes the comma again
        assert_eq!(dn.to_string(), "cn=Doe\\2c John,dc=example");
    }

    #[test]
    fn quoted_value() {
        let dn: Dn = "cn=\"Doe, John\",dc=example".parse().unwrap();
        assert_eq!(dn.rdn().unwrap().avas()[0].value, "Doe, John");
        assert_eq!(dn.len(), 2);
    }

    #[test]
    fn oid_attribute_type() {
        let dn: Dn = "2.5.4.3=server,dc=example".parse().unwrap();
        assert_eq!(dn.rdn().unwrap().avas()[0].attr, "2.5.4.3");
    }

    #[test]
    fn separator_spaces() {
        let dn: Dn = "uid=jdoe, ou=People".parse().unwrap();
        assert_eq!(dn.at(1).unwrap().to_string(), "ou=People");
    }

    #[test]
    fn trailing_space_trimmed() {
        let dn: Dn = "cn=trail ,dc=example".parse().unwrap();
        assert_eq!(dn.rdn().unwrap().avas()[0].value, "trail");
        let dn: Dn = "cn=trail\\ ,dc=example".parse().unwrap();
        assert_eq!(dn.rdn().unwrap().avas()[0].value, "trail ");
    }

    #[test]
    fn empty_and_errors() {
        assert!("".parse::<Dn>().unwrap().is_empty());
        assert!("=x".parse::<Dn>().is_err());
        assert!("cn".parse::<Dn>().is_err());
        assert!("cn=\"open".parse::<Dn>().is_err());
        assert!("-x=v".parse::<Dn>().is_err());
    }
}
