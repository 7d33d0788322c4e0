//! Command-line LDAP client.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use ldapc::controls::{Assertion, MatchedValues, RawControl, SortKey, SortRequest};
use ldapc::ldif::{self, ChangeKind, LdifReader};
use ldapc::result::LdapError;
use ldapc::{Filter, LdapConn, LdapConnSettings, Scope, SearchEntry, SearchOptions};

#[derive(Parser)]
#[command(name = "ldap", version, about = "LDAP directory client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConnectArgs {
    /// Remote host:port, or an ldap:// / ldaps:// URL
    #[arg(short = 'r', long = "remote", default_value = "localhost:389")]
    remote: String,

    /// Bind DN; empty binds anonymously
    #[arg(short = 'u', long = "user", default_value = "")]
    user: String,

    /// Bind password
    #[arg(short = 'p', long = "password", default_value = "")]
    password: String,

    /// Upgrade the connection with StartTLS before binding
    #[arg(short = 'z', long = "starttls")]
    starttls: bool,

    /// Skip TLS certificate verification
    #[arg(long = "no-verify")]
    no_verify: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate against the directory
    #[command(visible_alias = "auth")]
    Bind {
        #[command(flatten)]
        conn: ConnectArgs,
    },

    /// Search for entries, printing them in LDIF
    #[command(visible_alias = "find")]
    Search {
        #[command(flatten)]
        conn: ConnectArgs,

        /// Attributes to return; an attribute may carry a matched-values
        /// filter in parentheses
        #[arg(short = 'a', value_delimiter = ',')]
        attrs: Vec<String>,

        /// Search scope: base, one or whole
        #[arg(short = 's', default_value = "base")]
        scope: String,

        /// Server-side sort keys, attr[:rule][:reverse]
        #[arg(short = 'o', value_delimiter = ',')]
        sort: Vec<String>,

        /// Return attribute names only, without values
        #[arg(short = 't')]
        types_only: bool,

        /// Limit the number of entries returned
        #[arg(short = 'n', default_value_t = 0)]
        limit: i32,

        /// Assertion filter the base entry must satisfy
        #[arg(short = 'f')]
        assert_filter: Option<String>,

        /// Base DN
        base: String,

        /// RFC 4515 filter; objectClass presence when absent
        filter: Option<String>,
    },

    /// List supported extensions, features and controls
    Support {
        #[command(flatten)]
        conn: ConnectArgs,

        /// Show supported extensions
        #[arg(short = 'e')]
        extensions: bool,

        /// Show supported features
        #[arg(short = 'f')]
        features: bool,

        /// Show supported controls
        #[arg(short = 'c')]
        controls: bool,
    },

    /// Compare entry attributes with assertions
    #[command(visible_alias = "cmp")]
    Compare {
        #[command(flatten)]
        conn: ConnectArgs,

        /// Target entry
        dn: String,

        /// Assertions in attr:value or attr::base64 form
        #[arg(required = true)]
        assertions: Vec<String>,
    },

    /// Remove entries from the directory
    #[command(visible_aliases = ["rm", "del"])]
    Delete {
        #[command(flatten)]
        conn: ConnectArgs,

        /// Entries to remove
        #[arg(required = true)]
        dns: Vec<String>,
    },

    /// Rename an entry
    Rename {
        #[command(flatten)]
        conn: ConnectArgs,

        /// Keep the old RDN as an attribute of the entry
        #[arg(short = 'k')]
        keep: bool,

        /// Entry to rename
        dn: String,

        /// New RDN
        rdn: String,
    },

    /// Move an entry under a new parent
    #[command(visible_alias = "mv")]
    Move {
        #[command(flatten)]
        conn: ConnectArgs,

        /// Entry to move
        dn: String,

        /// New parent DN
        parent: String,
    },

    /// Apply LDIF changes from a file, or stdin when absent
    #[command(visible_alias = "exec")]
    Execute {
        #[command(flatten)]
        conn: ConnectArgs,

        /// Run the whole batch inside a transaction, rolling back on the
        /// first error
        #[arg(short = 't')]
        transaction: bool,

        /// Keep applying changes past individual failures
        #[arg(short = 'c')]
        keep_going: bool,

        /// LDIF file; stdin when absent
        file: Option<PathBuf>,
    },

    /// Change a password
    Password {
        #[command(flatten)]
        conn: ConnectArgs,

        /// Current password
        #[arg(short = 'o')]
        old: Option<String>,

        /// New password; the server generates one when absent
        #[arg(short = 'n')]
        new: Option<String>,

        /// Target entry; the bound user when absent
        dn: Option<String>,
    },

    /// Show the authorization identity of the connection
    Whoami {
        #[command(flatten)]
        conn: ConnectArgs,
    },
}

enum AppError {
    Usage(String),
    Remote(LdapError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Usage(msg) => write!(f, "{}", msg),
            AppError::Remote(e) => write!(f, "{}", e),
        }
    }
}

impl From<LdapError> for AppError {
    fn from(e: LdapError) -> AppError {
        AppError::Remote(e)
    }
}

impl From<io::Error> for AppError {
    fn from(e: io::Error) -> AppError {
        AppError::Remote(e.into())
    }
}

fn usage(msg: impl Into<String>) -> AppError {
    AppError::Usage(msg.into())
}

fn main() {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };
    match run(cli.command) {
        Ok(()) => (),
        Err(AppError::Usage(msg)) => {
            eprintln!("ldap: {}", msg);
            process::exit(1);
        }
        Err(AppError::Remote(e)) => {
            eprintln!("ldap: {}", e);
            process::exit(2);
        }
    }
}

fn connect(args: &ConnectArgs) -> Result<LdapConn, LdapError> {
    let mut settings = LdapConnSettings::new();
    if args.starttls {
        settings = settings.set_starttls(true);
    }
    if args.no_verify {
        settings = settings.set_no_tls_verify(true);
    }
    let conn = LdapConn::with_settings(settings, &args.remote)?;
    conn.simple_bind(&args.user, &args.password)?.success()?;
    Ok(conn)
}

fn parse_scope(scope: &str) -> Result<Scope, AppError> {
    match scope.to_ascii_lowercase().as_str() {
        "" | "base" => Ok(Scope::Base),
        "one" | "single" => Ok(Scope::OneLevel),
        "whole" | "sub" | "subtree" => Ok(Scope::Subtree),
        other => Err(usage(format!("{}: invalid value for scope", other))),
    }
}

fn parse_cli_filter(input: &str) -> Result<Filter, AppError> {
    ldapc::parse_filter(input).map_err(|e| usage(format!("{}: {}", input, e)))
}

fn assertion_control(filter: &Option<String>) -> Result<Vec<RawControl>, AppError> {
    match filter {
        Some(f) => {
            let parsed = parse_cli_filter(f)?;
            let assertion = Assertion::new(&parsed).map_err(AppError::from)?;
            Ok(vec![assertion.into()])
        }
        None => Ok(vec![]),
    }
}

fn run(command: Command) -> Result<(), AppError> {
    match command {
        Command::Bind { conn } => {
            let conn = connect(&conn)?;
            conn.unbind()?;
            Ok(())
        }
        Command::Search {
            conn,
            attrs,
            scope,
            sort,
            types_only,
            limit,
            assert_filter,
            base,
            filter,
        } => {
            let scope = parse_scope(&scope)?;
            // an attribute spec may smuggle in a matched-values filter
            let mut names = Vec::new();
            let mut mv_filters = Vec::new();
            for attr in &attrs {
                match attr.find('(') {
                    Some(x) => {
                        names.push(attr[..x].trim().to_string());
                        mv_filters.push(parse_cli_filter(&attr[x..])?);
                    }
                    None => names.push(attr.trim().to_string()),
                }
            }
            if let Some(f) = &filter {
                parse_cli_filter(f)?;
            }
            let mut opts = SearchOptions::new()
                .typesonly(types_only)
                .sizelimit(limit);
            if !sort.is_empty() {
                let keys = sort.iter().map(|s| SortKey::parse_spec(s)).collect();
                opts = opts.control(SortRequest { keys });
            }
            if !mv_filters.is_empty() {
                let mv = MatchedValues::new(&mv_filters).map_err(AppError::from)?;
                opts = opts.control(mv);
            }
            for ctrl in assertion_control(&assert_filter)? {
                opts = opts.control(ctrl);
            }
            let conn = connect(&conn)?;
            let filter = filter.as_deref().unwrap_or("(objectClass=*)");
            let (entries, _res) = conn
                .search_with(opts, &base, scope, filter, &names)?
                .success()?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for (i, entry) in entries.into_iter().enumerate() {
                if i > 0 {
                    writeln!(out)?;
                }
                let entry = SearchEntry::construct(entry)?;
                ldif::write_entry(&mut out, &entry)?;
            }
            conn.unbind()?;
            Ok(())
        }
        Command::Support {
            conn,
            extensions,
            features,
            controls,
        } => {
            let all = !extensions && !features && !controls;
            let conn = connect(&conn)?;
            if extensions || all {
                print_supported(&conn, "supportedExtension", "E", EXTENSION_NAMES)?;
            }
            if features || all {
                print_supported(&conn, "supportedFeatures", "F", FEATURE_NAMES)?;
            }
            if controls || all {
                print_supported(&conn, "supportedControl", "C", CONTROL_NAMES)?;
            }
            conn.unbind()?;
            Ok(())
        }
        Command::Compare {
            conn,
            dn,
            assertions,
        } => {
            let parsed: Vec<(String, Vec<u8>)> = assertions
                .iter()
                .map(|a| parse_assertion(a))
                .collect::<Result<_, _>>()?;
            let conn = connect(&conn)?;
            for (spec, (attr, value)) in assertions.iter().zip(parsed) {
                let equal = conn.compare(&dn, &attr, value, vec![])?.equal()?;
                if equal {
                    println!("TRUE:  {}", spec);
                } else {
                    println!("FALSE: {}", spec);
                }
            }
            conn.unbind()?;
            Ok(())
        }
        Command::Delete { conn, dns } => {
            let conn = connect(&conn)?;
            let mut last_err = None;
            for dn in &dns {
                if let Err(e) = conn.delete(dn, vec![]).and_then(|res| res.success()) {
                    eprintln!("fail to delete {}: {}", dn, e);
                    last_err = Some(e);
                }
            }
            conn.unbind()?;
            match last_err {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        }
        Command::Rename {
            conn,
            keep,
            dn,
            rdn,
        } => {
            let conn = connect(&conn)?;
            conn.modifydn(&dn, &rdn, !keep, None, vec![])?.success()?;
            conn.unbind()?;
            Ok(())
        }
        Command::Move { conn, dn, parent } => {
            let conn = connect(&conn)?;
            conn.move_entry(&dn, &parent, vec![])?.success()?;
            conn.unbind()?;
            Ok(())
        }
        Command::Execute {
            conn,
            transaction,
            keep_going,
            file,
        } => {
            let reader: Box<dyn BufRead> = match &file {
                Some(path) => Box::new(BufReader::new(File::open(path)?)),
                None => Box::new(BufReader::new(io::stdin())),
            };
            let conn = connect(&conn)?;
            let res = execute_changes(&conn, reader, transaction, keep_going);
            conn.unbind()?;
            res
        }
        Command::Password { conn, old, new, dn } => {
            let args = conn;
            let conn = connect(&args)?;
            // without a target DN the bound user changes their own password
            let user = dn.as_deref();
            let old = old.as_deref().or(if dn.is_none() && !args.password.is_empty() {
                Some(args.password.as_str())
            } else {
                None
            });
            let generated = conn.modify_password(user, old, new.as_deref(), vec![])?;
            if let Some(generated) = generated {
                println!("{}", generated);
            }
            conn.unbind()?;
            Ok(())
        }
        Command::Whoami { conn } => {
            let conn = connect(&conn)?;
            let who = conn.whoami(vec![])?;
            println!("{}", who.strip_prefix("dn:").unwrap_or(&who));
            conn.unbind()?;
            Ok(())
        }
    }
}

fn execute_changes(
    conn: &LdapConn,
    reader: Box<dyn BufRead>,
    transaction: bool,
    keep_going: bool,
) -> Result<(), AppError> {
    if transaction {
        conn.begin()?;
    }
    let mut ldif = LdifReader::new(reader);
    loop {
        let change = match ldif.next_change() {
            Ok(Some(change)) => change,
            Ok(None) => break,
            Err(e) => {
                if transaction {
                    conn.rollback()?;
                }
                return Err(e.into());
            }
        };
        let dn = change.dn;
        let applied = match change.kind {
            ChangeKind::Add(attrs) => {
                let attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attrs
                    .into_iter()
                    .map(|a| (a.name.into_bytes(), a.values.into_iter().collect()))
                    .collect();
                conn.add(&dn, attrs, vec![]).and_then(|res| res.success())
            }
            ChangeKind::Delete => conn.delete(&dn, vec![]).and_then(|res| res.success()),
            ChangeKind::Modify(mods) => {
                conn.modify(&dn, mods, vec![]).and_then(|res| res.success())
            }
            ChangeKind::ModRdn {
                new_rdn,
                delete_old,
                new_superior,
            } => conn
                .modifydn(&dn, &new_rdn, delete_old, new_superior.as_deref(), vec![])
                .and_then(|res| res.success()),
        };
        if let Err(e) = applied {
            if keep_going && !transaction {
                eprintln!("fail to apply change for {}: {}", dn, e);
                continue;
            }
            if transaction {
                conn.rollback()?;
            }
            return Err(e.into());
        }
    }
    if transaction {
        conn.commit()?;
    }
    Ok(())
}

/// Split an `attr:value` / `attr::base64` assertion argument.
fn parse_assertion(input: &str) -> Result<(String, Vec<u8>), AppError> {
    let Some(colon) = input.find(':') else {
        return Err(usage(format!(
            "{}: invalid assertion (missing colon)",
            input
        )));
    };
    let attr = input[..colon].to_string();
    let rest = &input[colon + 1..];
    let value = match rest.strip_prefix(':') {
        Some(b64) => BASE64
            .decode(b64)
            .map_err(|e| usage(format!("{}: {}", input, e)))?,
        None => rest.as_bytes().to_vec(),
    };
    Ok((attr, value))
}

fn print_supported(
    conn: &LdapConn,
    attr: &str,
    prefix: &str,
    names: &[(&str, &str)],
) -> Result<(), AppError> {
    let opts = SearchOptions::new().sizelimit(1);
    let (entries, _res) = conn
        .search_with(opts, "", Scope::Base, "(objectClass=*)", &[attr])?
        .success()?;
    let Some(entry) = entries.into_iter().next() else {
        return Ok(());
    };
    let entry = SearchEntry::construct(entry)?;
    let mut oids = entry.attrs.get(attr).cloned().unwrap_or_default();
    oids.sort();
    for oid in oids {
        match names.iter().find(|(o, _)| *o == oid) {
            Some((_, name)) => println!("- {}: {} ({})", prefix, name, oid),
            None => println!("- {}: {}", prefix, oid),
        }
    }
    Ok(())
}

const EXTENSION_NAMES: &[(&str, &str)] = &[
    ("1.3.6.1.4.1.1466.20037", "Start TLS extension"),
    ("1.3.6.1.4.1.4203.1.11.1", "Modify password extension"),
    ("1.3.6.1.4.1.4203.1.11.3", "Who am I extension"),
    ("1.3.6.1.1.8", "Cancel extension"),
    ("1.3.6.1.1.21.1", "Begin transaction extension"),
    ("1.3.6.1.1.21.3", "End transaction extension"),
];

const FEATURE_NAMES: &[(&str, &str)] = &[
    ("1.3.6.1.4.1.4203.1.5.1", "All operational attributes"),
    ("1.3.6.1.4.1.4203.1.5.2", "Attributes by object class"),
    ("1.3.6.1.4.1.4203.1.5.3", "True/false filters"),
    ("1.3.6.1.4.1.4203.1.5.4", "Language tag options"),
    ("1.3.6.1.4.1.4203.1.5.5", "Language range options"),
    ("1.3.6.1.1.14", "Modify-increment"),
];

const CONTROL_NAMES: &[(&str, &str)] = &[
    ("2.16.840.1.113730.3.4.18", "proxied authorization control"),
    ("1.2.840.113556.1.4.319", "pagination control"),
    ("1.2.840.113556.1.4.473", "sort request control"),
    ("1.2.840.113556.1.4.474", "sort response control"),
    ("1.3.6.1.1.12", "assertion control"),
    ("1.3.6.1.1.13.1", "pre read control"),
    ("1.3.6.1.1.13.2", "post read control"),
    ("1.3.6.1.1.21.2", "transaction control"),
    ("1.2.826.0.1.3344810.2.3", "matched values control"),
    ("1.3.6.1.1.22", "don't use copy control"),
    ("2.16.840.1.113730.3.4.2", "manage dsa it control"),
    ("1.3.6.1.4.1.4203.1.10.1", "subentries control"),
];
