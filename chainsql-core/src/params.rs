//! Placeholder scanning and rewriting
//!
//! Statements are assembled with `?` placeholders. PostgreSQL wants `$1..$n`
//! instead, and raw queries may use `:name` parameters; both are rewritten
//! here. Quoted literals and `--` / `/* */` comments are never touched.
//!
//! Quotes are escaped the standard way, by doubling them. MySQL's backslash
//! escape (`'it\'s'`) is not recognised, so raw MySQL text should double the
//! quote instead.

use std::iter::Peekable;
use std::str::Chars;

use crate::builder::Statement;
use crate::{Error, Result, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Quoted(char),
    LineComment,
    // the `*` of `/*` and the `/` of `*/` still belong to the comment
    BlockOpen,
    Block,
    BlockClose,
}

/// Walks SQL text and reports which characters are plain code, as opposed
/// to literal or comment text
struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    mode: Mode,
}

impl<'a> Scanner<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            chars: sql.chars().peekable(),
            mode: Mode::Code,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }
}

impl<'a> Iterator for Scanner<'a> {
    /// (char, is code)
    type Item = (char, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.chars.next()?;
        let next = self.peek();
        let (mode, code) = match self.mode {
            Mode::Code => match c {
                '\'' | '"' => (Mode::Quoted(c), false),
                '-' if next == Some('-') => (Mode::LineComment, false),
                '/' if next == Some('*') => (Mode::BlockOpen, false),
                _ => (Mode::Code, true),
            },
            Mode::Quoted(q) if c == q => (Mode::Code, false),
            Mode::Quoted(q) => (Mode::Quoted(q), false),
            Mode::LineComment if c == '\n' => (Mode::Code, false),
            Mode::LineComment => (Mode::LineComment, false),
            Mode::BlockOpen => (Mode::Block, false),
            Mode::Block if c == '*' && next == Some('/') => (Mode::BlockClose, false),
            Mode::Block => (Mode::Block, false),
            Mode::BlockClose => (Mode::Code, false),
        };
        self.mode = mode;
        Some((c, code))
    }
}

/// Count `?` placeholders outside literals and comments
pub fn count_placeholders(sql: &str) -> usize {
    Scanner::new(sql)
        .filter(|(c, code)| *code && *c == '?')
        .count()
}

/// Rewrite `?` placeholders into PostgreSQL's `$1, $2, ...`
pub fn rewrite_dollar_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    for (c, code) in Scanner::new(sql) {
        if code && c == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(c);
        }
    }
    out
}

/// Turn `:name` parameters into positional `?`s and collect the values in
/// textual order. A name may appear more than once; `::type` casts are left
/// alone.
pub fn bind_named(sql: &str, named: &[(&str, Value)]) -> Result<Statement> {
    let mut out = String::with_capacity(sql.len());
    let mut params = Vec::new();
    let mut scanner = Scanner::new(sql);

    while let Some((c, code)) = scanner.next() {
        if !code || c != ':' {
            out.push(c);
            continue;
        }

        match scanner.peek() {
            Some(':') => {
                // cast, e.g. `id::text`
                out.push_str("::");
                scanner.next();
            }
            Some(next) if next.is_ascii_alphabetic() || next == '_' => {
                let mut name = String::new();
                while let Some(next) = scanner.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_') {
                        break;
                    }
                    name.push(next);
                    scanner.next();
                }
                let value = named
                    .iter()
                    .find(|(key, _)| key.trim_start_matches(':') == name)
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| {
                        Error::invalid_query(format!("no value given for parameter :{}", name))
                    })?;
                params.push(value);
                out.push('?');
            }
            _ => out.push(c),
        }
    }

    Ok(Statement::new(out, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_skips_literals() {
        assert_eq!(count_placeholders("SELECT * FROM t WHERE a = ? AND b = ?"), 2);
        assert_eq!(count_placeholders("SELECT '?' , \"?\" FROM t WHERE a = ?"), 1);
        assert_eq!(count_placeholders("SELECT 'it''s ?' FROM t"), 0);
        assert_eq!(count_placeholders(""), 0);
    }

    #[test]
    fn test_count_skips_comments() {
        assert_eq!(
            count_placeholders("SELECT * FROM t -- why?\nWHERE a = ? /* and ? */ AND b = ?"),
            2
        );
        assert_eq!(count_placeholders("SELECT 1 /*/ ? */ , ?"), 1);
        assert_eq!(count_placeholders("SELECT 5 - ? FROM t"), 1);
        assert_eq!(count_placeholders("SELECT ? -- trailing ?"), 1);
    }

    #[test]
    fn test_dollar_rewrite() {
        assert_eq!(
            rewrite_dollar_placeholders("UPDATE t SET a = ?, b = '?' WHERE id = ?"),
            "UPDATE t SET a = $1, b = '?' WHERE id = $2"
        );
        assert_eq!(rewrite_dollar_placeholders("SELECT 1"), "SELECT 1");
        assert_eq!(
            rewrite_dollar_placeholders("SELECT ? /* ? */ -- ?\n, ?"),
            "SELECT $1 /* ? */ -- ?\n, $2"
        );
    }

    #[test]
    fn test_named_parameters_bind_in_textual_order() {
        let stmt = bind_named(
            "SELECT * FROM users WHERE login = :login OR (id > :min AND id < :max) OR nick = :login",
            &[
                ("max", Value::I32(10)),
                ("login", Value::from("admin")),
                (":min", Value::I32(1)),
            ],
        )
        .unwrap();

        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE login = ? OR (id > ? AND id < ?) OR nick = ?"
        );
        assert_eq!(
            stmt.params,
            vec![
                Value::from("admin"),
                Value::I32(1),
                Value::I32(10),
                Value::from("admin"),
            ]
        );
        assert!(stmt.check_arity().is_ok());
    }

    #[test]
    fn test_named_leaves_casts_and_literals_alone() {
        let stmt = bind_named(
            "SELECT id::text, ':skip' FROM t WHERE ts > :since",
            &[("since", Value::from("2024-01-01"))],
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT id::text, ':skip' FROM t WHERE ts > ?");
        assert_eq!(stmt.params.len(), 1);
    }

    #[test]
    fn test_named_unknown_parameter() {
        let err = bind_named("SELECT * FROM t WHERE id = :id", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
        assert!(err.to_string().contains(":id"));
    }
}
