//! The line-oriented wire protocol.
//!
//! One request is one line terminated by exactly one `\n`:
//!
//! ```text
//! <VERB> "|" <PACKAGE> "|" <DEPS> "\n"
//! ```
//!
//! `VERB` is one of `INDEX`, `REMOVE` or `QUERY` (case-sensitive). `PACKAGE` is the substring
//! between the first two `|` separators and must be non-empty. `DEPS` is everything after the
//! second `|` up to the terminal `\n`; it is split on `,`, each segment trimmed of surrounding
//! ASCII whitespace, and empty segments are dropped. The line must contain exactly two `|`
//! separators: no more, no fewer. Package names are never trimmed.

use std::fmt;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Index a package with the given (deduplicated-on-use) dependency list.
    Index {
        /// The package being indexed.
        package: String,
        /// The dependencies it declares, in the order they appeared on the wire.
        deps: Vec<String>,
    },
    /// Remove a package from the index.
    Remove {
        /// The package to remove.
        package: String,
    },
    /// Query whether a package is currently indexed.
    Query {
        /// The package to look up.
        package: String,
    },
}

/// The line failed to parse as a valid request.
///
/// Carries no detail: the wire protocol only distinguishes "parsed" from "did not parse", and
/// every parse failure renders the same `ERROR\n` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("malformed request line")
    }
}

impl std::error::Error for ParseError {}

/// Parses one request line, including its terminal `\n`, into a [`Command`].
///
/// Fails with [`ParseError`] when: the line does not end in `\n`; splitting on `|` yields other
/// than three fields; the verb is not one of `INDEX`, `REMOVE` or `QUERY`; or the package field
/// is empty. No other condition is a parse error — package and dependency names are treated as
/// opaque bytes and are never validated against a character class.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let body = line.strip_suffix('\n').ok_or(ParseError)?;

    let fields: Vec<&str> = body.split('|').collect();
    let [verb, package, deps] = fields[..] else {
        return Err(ParseError);
    };

    if package.is_empty() {
        return Err(ParseError);
    }

    let deps: Vec<String> = deps
        .split(',')
        .map(str::trim)
        .filter(|dep| !dep.is_empty())
        .map(str::to_owned)
        .collect();

    match verb {
        "INDEX" => Ok(Command::Index {
            package: package.to_owned(),
            deps,
        }),
        "REMOVE" => Ok(Command::Remove {
            package: package.to_owned(),
        }),
        "QUERY" => Ok(Command::Query {
            package: package.to_owned(),
        }),
        _ => Err(ParseError),
    }
}

/// A response token.
///
/// Rendered verbatim as one of `OK\n`, `FAIL\n` or `ERROR\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// The command succeeded.
    Ok,
    /// The command failed a business rule (missing dependency, blocked removal, etc...).
    Fail,
    /// The request line did not parse.
    Error,
}

impl Response {
    /// Renders this response as its wire bytes, including the terminal `\n`.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Response::Ok => b"OK\n",
            Response::Fail => b"FAIL\n",
            Response::Error => b"ERROR\n",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_index_with_deps() {
        let cmd = parse("INDEX|cloog|gmp,isl,pkg-config\n").unwrap();
        assert_eq!(
            cmd,
            Command::Index {
                package: "cloog".to_owned(),
                deps: vec!["gmp".to_owned(), "isl".to_owned(), "pkg-config".to_owned()],
            }
        );
    }

    #[test]
    fn parses_index_with_empty_deps() {
        let cmd = parse("INDEX|a|\n").unwrap();
        assert_eq!(
            cmd,
            Command::Index {
                package: "a".to_owned(),
                deps: vec![],
            }
        );
    }

    #[test]
    fn drops_trailing_comma_segment() {
        let cmd = parse("INDEX|a|gmp,\n").unwrap();
        assert_eq!(
            cmd,
            Command::Index {
                package: "a".to_owned(),
                deps: vec!["gmp".to_owned()],
            }
        );
    }

    #[test]
    fn trims_dependency_whitespace_but_not_package() {
        let cmd = parse("INDEX| pad |  gmp  , isl\n").unwrap();
        assert_eq!(
            cmd,
            Command::Index {
                package: " pad ".to_owned(),
                deps: vec!["gmp".to_owned(), "isl".to_owned()],
            }
        );
    }

    #[test]
    fn parses_remove_and_query() {
        assert_eq!(
            parse("REMOVE|cloog|\n").unwrap(),
            Command::Remove {
                package: "cloog".to_owned()
            }
        );
        assert_eq!(
            parse("QUERY|cloog|\n").unwrap(),
            Command::Query {
                package: "cloog".to_owned()
            }
        );
    }

    #[test]
    fn rejects_missing_newline() {
        assert_eq!(parse("INDEX|foo|bar"), Err(ParseError));
    }

    #[test]
    fn rejects_too_many_separators() {
        assert_eq!(parse("INDEX|foo|bar|baz\n"), Err(ParseError));
    }

    #[test]
    fn rejects_too_few_separators() {
        assert_eq!(parse("INDEX|foo\n"), Err(ParseError));
        assert_eq!(parse("INDEX\n"), Err(ParseError));
    }

    #[test]
    fn rejects_empty_package() {
        assert_eq!(parse("INDEX||\n"), Err(ParseError));
    }

    #[test]
    fn rejects_unknown_verb() {
        assert_eq!(parse("BOGUS|foo|\n"), Err(ParseError));
    }

    #[test]
    fn verb_is_case_sensitive() {
        assert_eq!(parse("index|foo|\n"), Err(ParseError));
    }

    #[test]
    fn response_renders_verbatim() {
        assert_eq!(Response::Ok.as_bytes(), b"OK\n");
        assert_eq!(Response::Fail.as_bytes(), b"FAIL\n");
        assert_eq!(Response::Error.as_bytes(), b"ERROR\n");
    }
}
