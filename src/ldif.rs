//! LDIF change records (RFC 2849).
//!
//! [`LdifReader`](struct.LdifReader.html) pulls change records off any
//! buffered reader, one at a time: records are separated by blank lines,
//! folded lines are unfolded, comments skipped, and the three value forms
//! (`attr: literal`, `attr:: base64`, `attr:< url`) all yield raw bytes.
//! A record without a `changetype` is an entry to add.
//!
//! [`write_entry`](fn.write_entry.html) goes the other way, emitting a
//! search result entry in LDIF form.

use std::collections::HashSet;
use std::io::{self, BufRead, Read, Write};

use crate::ldap::Mod;
use crate::result::{LdapError, Result};
use crate::search::SearchEntry;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use percent_encoding::percent_decode_str;
use url::Url;

/// One attribute with its values, insertion order preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<Vec<u8>>,
}

/// A change record pulled from an LDIF stream.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    /// Target entry name.
    pub dn: String,
    pub kind: ChangeKind,
}

/// The operation a change record describes.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeKind {
    /// Add an entry with these attributes.
    Add(Vec<Attribute>),
    /// Delete the entry.
    Delete,
    /// Apply modifications in order.
    Modify(Vec<Mod<Vec<u8>>>),
    /// Rename and possibly move the entry.
    ModRdn {
        new_rdn: String,
        delete_old: bool,
        new_superior: Option<String>,
    },
}

/// Streaming reader of LDIF change records.
pub struct LdifReader<R> {
    src: R,
    line_no: usize,
}

impl<R: BufRead> LdifReader<R> {
    pub fn new(src: R) -> LdifReader<R> {
        LdifReader { src, line_no: 0 }
    }

    /// Return the next change record, or `None` at end of stream.
    pub fn next_change(&mut self) -> Result<Option<Change>> {
        match self.next_record()? {
            Some(record) => parse_record(record).map(Some),
            None => Ok(None),
        }
    }

    /// Collect one record's logical lines, unfolding continuations and
    /// dropping comments. `None` once the input is exhausted.
    fn next_record(&mut self) -> Result<Option<Vec<Line>>> {
        let mut lines: Vec<Line> = Vec::new();
        let mut in_comment = false;
        loop {
            let mut raw = String::new();
            let n = self.src.read_line(&mut raw)?;
            if n == 0 {
                break;
            }
            self.line_no += 1;
            let line = raw.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if lines.is_empty() {
                    continue;
                }
                break;
            }
            if let Some(folded) = line.strip_prefix(' ') {
                // continuation of the previous line, or of a skipped comment
                if in_comment {
                    continue;
                }
                match lines.last_mut() {
                    Some(last) => last.text.push_str(folded),
                    None => {
                        return Err(LdapError::Ldif {
                            line: self.line_no,
                            msg: "continuation line at start of record".into(),
                        })
                    }
                }
                continue;
            }
            if line.starts_with('#') {
                in_comment = true;
                continue;
            }
            in_comment = false;
            // a leading "version: 1" spec line is noise for our purposes
            if lines.is_empty() && line.starts_with("version:") {
                continue;
            }
            lines.push(Line {
                no: self.line_no,
                text: line.to_string(),
            });
        }
        if lines.is_empty() {
            Ok(None)
        } else {
            Ok(Some(lines))
        }
    }
}

struct Line {
    no: usize,
    text: String,
}

impl Line {
    fn err(&self, msg: impl Into<String>) -> LdapError {
        LdapError::Ldif {
            line: self.no,
            msg: msg.into(),
        }
    }

    /// Split `name: value` and resolve the value form to bytes.
    fn attr_value(&self) -> Result<(&str, Vec<u8>)> {
        let Some(colon) = self.text.find(':') else {
            return Err(self.err("missing ':'"));
        };
        let name = &self.text[..colon];
        if name.is_empty() {
            return Err(self.err("empty attribute name"));
        }
        let rest = &self.text[colon + 1..];
        let value = if let Some(b64) = rest.strip_prefix(':') {
            BASE64
                .decode(b64.trim_start_matches(' '))
                .map_err(|e| self.err(format!("bad base64 value: {}", e)))?
        } else if let Some(url) = rest.strip_prefix('<') {
            self.fetch(url.trim_start_matches(' '))?
        } else {
            rest.strip_prefix(' ').unwrap_or(rest).as_bytes().to_vec()
        };
        Ok((name, value))
    }

    /// Same, but the value must be UTF-8 text.
    fn attr_string(&self) -> Result<(&str, String)> {
        let (name, value) = self.attr_value()?;
        let value = String::from_utf8(value).map_err(|_| self.err("value is not valid UTF-8"))?;
        Ok((name, value))
    }

    fn fetch(&self, spec: &str) -> Result<Vec<u8>> {
        let url = Url::parse(spec).map_err(|e| self.err(format!("bad value URL: {}", e)))?;
        match url.scheme() {
            "file" => {
                let path = percent_decode_str(url.path()).decode_utf8_lossy();
                Ok(std::fs::read(path.as_ref())?)
            }
            "http" | "https" => {
                let resp = ureq::get(url.as_str())
                    .call()
                    .map_err(|e| self.err(format!("fetch failed: {}", e)))?;
                let mut body = Vec::new();
                resp.into_reader().read_to_end(&mut body)?;
                Ok(body)
            }
            other => Err(self.err(format!("unsupported value URL scheme: {}", other))),
        }
    }
}

fn parse_record(lines: Vec<Line>) -> Result<Change> {
    let mut it = lines.into_iter().peekable();
    let dn_line = it.next().expect("non-empty record");
    let (name, dn) = dn_line.attr_string()?;
    if !name.eq_ignore_ascii_case("dn") {
        return Err(dn_line.err("record must start with dn:"));
    }

    let changetype = match it.peek() {
        Some(line) if line.text.to_ascii_lowercase().starts_with("changetype") => {
            let line = it.next().expect("peeked");
            let (_, ct) = line.attr_string()?;
            match ct.to_ascii_lowercase().as_str() {
                "add" => ChangeKind::Add(vec![]),
                "delete" => ChangeKind::Delete,
                "modify" => ChangeKind::Modify(vec![]),
                "modrdn" | "moddn" => ChangeKind::ModRdn {
                    new_rdn: String::new(),
                    delete_old: false,
                    new_superior: None,
                },
                other => return Err(line.err(format!("unsupported changetype {:?}", other))),
            }
        }
        _ => ChangeKind::Add(vec![]),
    };

    let kind = match changetype {
        ChangeKind::Add(_) => ChangeKind::Add(read_add(it)?),
        ChangeKind::Modify(_) => ChangeKind::Modify(read_modify(it)?),
        ChangeKind::Delete => {
            if let Some(line) = it.next() {
                return Err(line.err("unexpected data in delete record"));
            }
            ChangeKind::Delete
        }
        ChangeKind::ModRdn { .. } => read_modrdn(it)?,
    };
    Ok(Change { dn, kind })
}

fn read_add(it: impl Iterator<Item = Line>) -> Result<Vec<Attribute>> {
    let mut attrs: Vec<Attribute> = Vec::new();
    for line in it {
        let (name, value) = line.attr_value()?;
        match attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.values.push(value),
            None => attrs.push(Attribute {
                name: name.to_string(),
                values: vec![value],
            }),
        }
    }
    Ok(attrs)
}

fn read_modify(mut it: impl Iterator<Item = Line>) -> Result<Vec<Mod<Vec<u8>>>> {
    let mut mods = Vec::new();
    while let Some(op_line) = it.next() {
        let (op, attr) = op_line.attr_string()?;
        let mut values: HashSet<Vec<u8>> = HashSet::new();
        for line in it.by_ref() {
            if line.text == "-" {
                break;
            }
            let (name, value) = line.attr_value()?;
            if name != attr {
                return Err(line.err(format!("value for {:?} inside block for {:?}", name, attr)));
            }
            values.insert(value);
        }
        let attr = attr.into_bytes();
        mods.push(match op.to_ascii_lowercase().as_str() {
            "add" => Mod::Add(attr, values),
            "delete" => Mod::Delete(attr, values),
            "replace" => Mod::Replace(attr, values),
            other => return Err(op_line.err(format!("unsupported modification {:?}", other))),
        });
    }
    Ok(mods)
}

fn read_modrdn(it: impl Iterator<Item = Line>) -> Result<ChangeKind> {
    let mut new_rdn = None;
    let mut delete_old = None;
    let mut new_superior = None;
    for line in it {
        let (name, value) = line.attr_string()?;
        match name.to_ascii_lowercase().as_str() {
            "newrdn" => new_rdn = Some(value),
            "deleteoldrdn" => {
                delete_old = Some(match value.as_str() {
                    "0" => false,
                    "1" => true,
                    _ => return Err(line.err("deleteoldrdn must be 0 or 1")),
                })
            }
            "newsuperior" => new_superior = Some(value),
            other => return Err(line.err(format!("unexpected {:?} in modrdn record", other))),
        }
    }
    match (new_rdn, delete_old) {
        (Some(new_rdn), Some(delete_old)) => Ok(ChangeKind::ModRdn {
            new_rdn,
            delete_old,
            new_superior,
        }),
        _ => Err(LdapError::Ldif {
            line: 0,
            msg: "modrdn record needs newrdn and deleteoldrdn".into(),
        }),
    }
}

/// True when the bytes can appear verbatim after `attr: `.
fn ldif_safe(value: &[u8]) -> bool {
    if let Some(&first) = value.first() {
        if first == b' ' || first == b':' || first == b'<' {
            return false;
        }
    }
    value.iter().all(|&b| (0x20..0x7F).contains(&b))
}

fn write_line<W: Write>(w: &mut W, name: &str, value: &[u8]) -> io::Result<()> {
    if ldif_safe(value) {
        writeln!(w, "{}: {}", name, String::from_utf8_lossy(value))
    } else {
        writeln!(w, "{}:: {}", name, BASE64.encode(value))
    }
}

/// Write one entry in LDIF form: the dn line, then one line per attribute
/// value. The caller separates records with blank lines.
pub fn write_entry<W: Write>(w: &mut W, entry: &SearchEntry) -> io::Result<()> {
    write_line(w, "dn", entry.dn.as_bytes())?;
    let mut names: Vec<&String> = entry.attrs.keys().chain(entry.bin_attrs.keys()).collect();
    names.sort();
    names.dedup();
    for name in names {
        if let Some(values) = entry.attrs.get(name) {
            for value in values {
                write_line(w, name, value.as_bytes())?;
            }
        }
        if let Some(values) = entry.bin_attrs.get(name) {
            for value in values {
                write_line(w, name, value)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(s: &str) -> LdifReader<Cursor<&str>> {
        LdifReader::new(Cursor::new(s))
    }

    fn drain(s: &str) -> Vec<Change> {
        let mut r = reader(s);
        let mut out = vec![];
        while let Some(c) = r.next_change().unwrap() {
            out.push(c);
        }
        out
    }

    #[test]
    fn implicit_add_record() {
        let changes = drain("dn: uid=a,dc=x\nobjectClass: top\nobjectClass: person\ncn: A\n");
        assert_eq!(changes.len(), 1);
        let c = &changes[0];
        assert_eq!(c.dn, "uid=a,dc=x");
        match &c.kind {
            ChangeKind::Add(attrs) => {
                assert_eq!(attrs.len(), 2);
                assert_eq!(attrs[0].name, "objectClass");
                assert_eq!(attrs[0].values, vec![b"top".to_vec(), b"person".to_vec()]);
                assert_eq!(attrs[1].name, "cn");
                assert_eq!(attrs[1].values, vec![b"A".to_vec()]);
            }
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn record_segmentation() {
        let input = "dn: dc=a\ncn: one\n\ndn: dc=b\ncn: two\n\n\ndn: dc=c\nchangetype: delete\n\n\n";
        let changes = drain(input);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[2].kind, ChangeKind::Delete);
    }

    #[test]
    fn continuation_and_comments() {
        let input = "# a comment\n#  folded\ndn: uid=long,dc=exa\n mple\n# mid-record comment\ncn: Longi\n sh Name\n";
        let changes = drain(input);
        assert_eq!(changes[0].dn, "uid=long,dc=example");
        match &changes[0].kind {
            ChangeKind::Add(attrs) => assert_eq!(attrs[0].values[0], b"Longish Name".to_vec()),
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn base64_values() {
        let input = "dn:: dWlkPWEsZGM9eA==\ncn:: QSBCIEM=\n";
        let changes = drain(input);
        assert_eq!(changes[0].dn, "uid=a,dc=x");
        match &changes[0].kind {
            ChangeKind::Add(attrs) => assert_eq!(attrs[0].values[0], b"A B C".to_vec()),
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn modify_record() {
        let input = "dn: uid=a,dc=x\nchangetype: modify\nadd: mail\nmail: a@x\nmail: b@x\n-\ndelete: phone\n-\nreplace: sn\nsn: New\n-\n";
        let changes = drain(input);
        match &changes[0].kind {
            ChangeKind::Modify(mods) => {
                assert_eq!(mods.len(), 3);
                match &mods[0] {
                    Mod::Add(attr, vals) => {
                        assert_eq!(attr, &b"mail".to_vec());
                        assert_eq!(vals.len(), 2);
                    }
                    other => panic!("expected add mod, got {:?}", other),
                }
                assert!(matches!(&mods[1], Mod::Delete(a, v) if a == &b"phone".to_vec() && v.is_empty()));
                assert!(matches!(&mods[2], Mod::Replace(a, _) if a == &b"sn".to_vec()));
            }
            other => panic!("expected modify, got {:?}", other),
        }
    }

    #[test]
    fn modify_mismatched_attr() {
        let input = "dn: uid=a,dc=x\nchangetype: modify\nadd: mail\nphone: 123\n-\n";
        let mut r = reader(input);
        assert!(r.next_change().is_err());
    }

    #[test]
    fn modrdn_record() {
        let input =
            "dn: uid=a,dc=x\nchangetype: modrdn\nnewrdn: uid=b\ndeleteoldrdn: 1\nnewsuperior: ou=New,dc=x\n";
        let changes = drain(input);
        assert_eq!(
            changes[0].kind,
            ChangeKind::ModRdn {
                new_rdn: "uid=b".into(),
                delete_old: true,
                new_superior: Some("ou=New,dc=x".into()),
            }
        );
    }

    #[test]
    fn delete_with_garbage() {
        let input = "dn: uid=a,dc=x\nchangetype: delete\ncn: nope\n";
        let mut r = reader(input);
        assert!(r.next_change().is_err());
    }

    #[test]
    fn file_url_value() {
        let dir = std::env::temp_dir().join("ldifread-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("blob.bin");
        std::fs::write(&path, b"\x00\x01payload").unwrap();
        let input = format!("dn: uid=a,dc=x\njpegPhoto:< file://{}\n", path.display());
        let changes = drain(&input);
        match &changes[0].kind {
            ChangeKind::Add(attrs) => assert_eq!(attrs[0].values[0], b"\x00\x01payload".to_vec()),
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn unsupported_url_scheme() {
        let input = "dn: uid=a,dc=x\ncn:< gopher://host/1\n";
        let mut r = reader(input);
        assert!(r.next_change().is_err());
    }

    #[test]
    fn entry_output() {
        use std::collections::HashMap;
        let mut attrs = HashMap::new();
        attrs.insert("cn".to_string(), vec!["A".to_string()]);
        attrs.insert("seeAlso".to_string(), vec![":colon".to_string()]);
        let mut bin_attrs = HashMap::new();
        bin_attrs.insert("jpegPhoto".to_string(), vec![vec![0u8, 1, 2]]);
        let entry = SearchEntry {
            dn: "uid=a,dc=x".to_string(),
            attrs,
            bin_attrs,
        };
        let mut out = Vec::new();
        write_entry(&mut out, &entry).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "dn: uid=a,dc=x\ncn: A\njpegPhoto:: AAEC\nseeAlso:: OmNvbG9u\n"
        );
    }
}
