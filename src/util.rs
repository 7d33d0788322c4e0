use std::borrow::Cow;

/// Escape a filter literal.
///
/// Literal values appearing in an LDAP filter can contain any character,
/// but some characters (parentheses, asterisk, backslash, NUL) must be
/// escaped in the filter's string representation. This function does the
/// escaping.
///
/// The argument, `lit`, can be owned or borrowed. The function doesn't
/// allocate the return value unless there's need to escape the input.
pub fn ldap_escape<'a, S: Into<Cow<'a, str>>>(lit: S) -> Cow<'a, str> {
    #[inline]
    fn needs_escape(c: u8) -> bool {
        c == b'\\' || c == b'*' || c == b'(' || c == b')' || c == 0
    }

    let lit = lit.into();
    let mut output = None;
    for (i, &c) in lit.as_bytes().iter().enumerate() {
        if needs_escape(c) {
            if output.is_none() {
                let mut out = Vec::with_capacity(lit.len() + 12);
                out.extend(lit[..i].as_bytes());
                output = Some(out);
            }
            let output = output.as_mut().expect("escape buffer");
            output.push(b'\\');
            output.push(xdigit(c >> 4));
            output.push(xdigit(c & 0xF));
        } else if let Some(ref mut output) = output {
            output.push(c);
        }
    }
    if let Some(output) = output {
        Cow::Owned(String::from_utf8(output).expect("ldap escaped"))
    } else {
        lit
    }
}

/// Escape an attribute value in a relative distinguished name (RDN).
///
/// When a literal string is used to represent an attribute value in an RDN,
/// some of its characters might need to be escaped according to the rules
/// of [RFC 4514](https://tools.ietf.org/html/rfc4514).
///
/// The argument, `val`, can be owned or borrowed. The function doesn't
/// allocate the return value unless there's need to escape the input.
pub fn dn_escape<'a, S: Into<Cow<'a, str>>>(val: S) -> Cow<'a, str> {
    #[inline]
    fn always_escape(c: u8) -> bool {
        matches!(c, b'"' | b'+' | b',' | b';' | b'<' | b'=' | b'>' | b'\\' | 0)
    }

    let val = val.into();
    let mut output = None;
    for (i, &c) in val.as_bytes().iter().enumerate() {
        let leading = i == 0 && (c == b' ' || c == b'#');
        let trailing = i + 1 == val.len() && c == b' ';
        if always_escape(c) || leading || trailing {
            if output.is_none() {
                let mut out = Vec::with_capacity(val.len() + 12);
                out.extend(val[..i].as_bytes());
                output = Some(out);
            }
            let output = output.as_mut().expect("escape buffer");
            output.push(b'\\');
            output.push(xdigit(c >> 4));
            output.push(xdigit(c & 0xF));
        } else if let Some(ref mut output) = output {
            output.push(c);
        }
    }
    if let Some(output) = output {
        Cow::Owned(String::from_utf8(output).expect("dn escaped"))
    } else {
        val
    }
}

#[inline]
fn xdigit(c: u8) -> u8 {
    c + if c < 10 { b'0' } else { b'a' - 10 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_literal() {
        assert_eq!(ldap_escape("plain"), "plain");
        assert_eq!(ldap_escape("f*o(b)a\\r"), "f\\2ao\\28b\\29a\\5cr");
    }

    #[test]
    fn rdn_value() {
        assert_eq!(dn_escape("Doe, John"), "Doe\\2c John");
        assert_eq!(dn_escape(" leading"), "\\20leading");
        assert_eq!(dn_escape("trailing "), "trailing\\20");
        assert_eq!(dn_escape("#tag"), "\\23tag");
        assert_eq!(dn_escape("inner # sign"), "inner # sign");
    }
}
