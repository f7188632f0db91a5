//! # Expression Grammar
//!
//! Updaters, valuers and repository specs all share one small grammar:
//!
//! ```text
//! name(key=value, key='quoted, value', ...)=value
//! ```
//!
//! The parenthesised parameter list and the `=value` tail are both optional.
//! Inside the parameter list, single or double quotes protect commas and
//! parentheses, and unquoted parentheses are balanced so that values such as
//! regex capture groups (`pattern=v(\d+)`) survive without quoting.
//!
//! ## Examples
//!
//! ```
//! use repo_scribe::params::parse_expression;
//!
//! let expr = parse_expression("regex(file=go.mod,pattern='go (\\S+)')=1.22", "updater").unwrap();
//! assert_eq!(expr.name, "regex");
//! assert_eq!(expr.params["file"], "go.mod");
//! assert_eq!(expr.params["pattern"], "go (\\S+)");
//! assert_eq!(expr.value.as_deref(), Some("1.22"));
//! ```

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Parameters of an expression. Duplicate keys keep the last value.
pub type Params = BTreeMap<String, String>;

/// A parsed `name(params)=value` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// The name before the parameter list.
    pub name: String,
    /// The `key=value` parameters.
    pub params: Params,
    /// The raw text after the top-level `=`, if any.
    pub value: Option<String>,
}

/// Parse a `name(params)=value` expression.
///
/// `what` names the kind of expression being parsed ("updater", "valuer",
/// "repository") and is only used in error messages.
pub fn parse_expression(input: &str, what: &str) -> Result<Expression> {
    let text = input.trim();
    if text.is_empty() {
        return Err(Error::syntax(input, format!("empty {} expression", what)));
    }

    let name_end = text.find(['(', '=']).unwrap_or(text.len());
    let name = text[..name_end].trim();
    if name.is_empty() {
        return Err(Error::syntax(input, format!("missing {} name", what)));
    }
    if let Some(bad) = name.chars().find(|c| !is_name_char(*c)) {
        return Err(Error::syntax(
            input,
            format!("invalid character {:?} in {} name", bad, what),
        ));
    }

    let mut rest = &text[name_end..];
    let mut params = Params::new();

    if rest.starts_with('(') {
        let close = find_closing_paren(rest)
            .ok_or_else(|| Error::syntax(input, "missing closing parenthesis"))?;
        params =
            parse_params(&rest[1..close]).map_err(|message| Error::syntax(input, message))?;
        rest = &rest[close + 1..];
    }

    let value = if rest.is_empty() {
        None
    } else if let Some(raw) = rest.strip_prefix('=') {
        Some(strip_outer_double_quotes(raw).to_string())
    } else {
        return Err(Error::syntax(
            input,
            format!("unexpected trailing input {:?}", rest),
        ));
    };

    Ok(Expression {
        name: name.to_string(),
        params,
        value,
    })
}

/// Returns true when `input` looks like `name(...)`, i.e. it should be parsed
/// as an expression instead of a literal.
pub fn is_call(input: &str) -> bool {
    let text = input.trim();
    match text.find('(') {
        Some(open) if open > 0 => {
            text[..open].chars().all(is_name_char)
                && find_closing_paren(&text[open..]) == Some(text.len() - open - 1)
        }
        _ => false,
    }
}

/// Parse a comma-separated `key=value` list (without the surrounding parens).
pub fn parse_params(list: &str) -> std::result::Result<Params, String> {
    let mut params = Params::new();
    for item in split_top_level(list, ",") {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let eq = find_top_level(item, "=")
            .ok_or_else(|| format!("parameter {:?} is not of the form key=value", item))?;
        let key = item[..eq].trim();
        if key.is_empty() {
            return Err(format!("parameter {:?} has an empty key", item));
        }
        params.insert(key.to_string(), unquote(item[eq + 1..].trim()));
    }
    Ok(params)
}

/// Fetch a mandatory parameter.
pub fn required<'a>(params: &'a Params, key: &str) -> Result<&'a str> {
    match params.get(key) {
        Some(value) if !value.is_empty() => Ok(value.as_str()),
        _ => Err(Error::InvalidParam {
            param: key.to_string(),
            message: "missing mandatory parameter".to_string(),
        }),
    }
}

/// Parse a boolean the way command-line flags are usually parsed.
///
/// Returns `None` for anything unrecognised so that callers can treat an
/// unparseable value as absent.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "yes" | "on" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

fn strip_outer_double_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Index of the `)` matching the `(` at position 0 of `text`.
fn find_closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` where it is outside quotes and nested parentheses.
///
/// An empty `sep` never splits.
///
/// ```
/// use repo_scribe::params::split_top_level;
///
/// assert_eq!(
///     split_top_level("a/b(draft=true,merge=true),c/d", ","),
///     vec!["a/b(draft=true,merge=true)", "c/d"]
/// );
/// ```
pub fn split_top_level<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        return vec![text];
    }
    split_top_level_with(text, |rest| rest.starts_with(sep).then_some(sep.len()))
}

/// Split on runs of whitespace outside quotes and nested parentheses.
/// Empty pieces are dropped.
pub fn split_top_level_whitespace(text: &str) -> Vec<&str> {
    split_top_level_with(text, |rest| {
        rest.chars()
            .next()
            .filter(|c| c.is_whitespace())
            .map(char::len_utf8)
    })
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect()
}

/// `separator` returns the separator's byte length when `rest` starts with one.
fn split_top_level_with<F>(text: &str, separator: F) -> Vec<&str>
where
    F: Fn(&str) -> Option<usize>,
{
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if idx < start {
            continue;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        if depth == 0 {
            if let Some(len) = separator(&text[idx..]) {
                parts.push(&text[start..idx]);
                start = idx + len;
                continue;
            }
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn find_top_level(text: &str, target: &str) -> Option<usize> {
    let first = split_top_level(text, target);
    if first.len() > 1 {
        Some(first[0].len())
    } else {
        None
    }
}

/// Remove one layer of matching quotes, resolving backslash escapes.
fn unquote(value: &str) -> String {
    let first = value.chars().next();
    let last = value.chars().last();
    match (first, last) {
        (Some(q @ ('\'' | '"')), Some(l)) if q == l && value.len() >= 2 => {
            let inner = &value[1..value.len() - 1];
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars().peekable();
            while let Some(ch) = chars.next() {
                // Only the quote character and the backslash itself are escapes,
                // so regex classes like `\d` pass through untouched.
                match (ch, chars.peek()) {
                    ('\\', Some(&next)) if next == q || next == '\\' => {
                        out.push(next);
                        chars.next();
                    }
                    _ => out.push(ch),
                }
            }
            out
        }
        _ => value.to_string(),
    }
}
