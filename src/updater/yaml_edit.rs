//! In-place editing of scalars in block-style YAML.
//!
//! Updaters decide what a document should become by editing its parsed
//! [`Value`]. This module then rewrites only the scalars that differ, so
//! comments, key order, quoting and indentation elsewhere in the file stay
//! as the author wrote them. The edited text is parsed again and must equal
//! the intended value before it is accepted.
//!
//! Streams of several `---` separated documents are edited document by
//! document. When a change cannot be made in place (a new key, a flow
//! collection, a block scalar), files without comments are re-rendered from
//! the parsed value and files with comments are refused.

use super::files;
use super::yaml::PathSegment;
use crate::error::{Error, Result};
use serde_yaml::Value;
use std::fs;
use std::ops::Range;
use std::path::Path;

/// One document of a YAML stream.
#[derive(Debug, Clone)]
pub struct Document {
    /// Byte range of the document body, markers excluded.
    pub range: Range<usize>,
    pub value: Value,
}

/// Split `content` on `---` markers and parse each document.
///
/// Parts holding only blank lines, comments and directives are not
/// documents. A stream with no document yields a single null document.
pub fn parse_documents(content: &str) -> std::result::Result<Vec<Document>, serde_yaml::Error> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for raw in content.split_inclusive('\n') {
        if is_marker(raw.trim_end_matches(['\n', '\r'])) {
            parts.push(start..offset);
            start = offset + 3;
        }
        offset += raw.len();
    }
    parts.push(start..content.len());

    let mut documents = Vec::new();
    for range in parts {
        let body = &content[range.clone()];
        if !body
            .lines()
            .any(|line| is_content(line) && !line.starts_with('%'))
        {
            continue;
        }
        documents.push(Document {
            value: serde_yaml::from_str(body)?,
            range,
        });
    }
    if documents.is_empty() {
        documents.push(Document {
            range: 0..content.len(),
            value: Value::Null,
        });
    }
    Ok(documents)
}

/// Apply `edit` to every document of the YAML file at `path` and write the
/// result back. `edit` also learns whether the file holds several documents.
///
/// Returns whether the file changed on disk.
pub fn update_file<F>(path: &Path, updater: &str, mut edit: F) -> Result<bool>
where
    F: FnMut(&mut Value, bool) -> Result<bool>,
{
    let content = fs::read_to_string(path)?;
    let documents = parse_documents(&content)
        .map_err(|e| Error::updater(updater, format!("{}: {}", path.display(), e)))?;
    let in_stream = documents.len() > 1;

    let mut expected = Vec::with_capacity(documents.len());
    let mut changed = false;
    for document in &documents {
        let mut value = document.value.clone();
        changed |= edit(&mut value, in_stream)?;
        expected.push(value);
    }
    if !changed {
        return Ok(false);
    }

    let rendered = match rewrite(&content, &documents, &expected) {
        Some(text) => text,
        None if !has_comments(&content) => render_stream(&expected)?,
        None => {
            return Err(Error::updater(
                updater,
                format!(
                    "{}: cannot edit in place without dropping comments; \
                     only existing block-style scalars can be changed",
                    path.display()
                ),
            ))
        }
    };
    files::write_if_changed(path, &content, &rendered)
}

/// Rewrite the scalars of `content` so that its documents parse to
/// `expected`. `None` when some difference is not a scalar that can be
/// located in the text.
pub fn rewrite(content: &str, documents: &[Document], expected: &[Value]) -> Option<String> {
    if documents.len() != expected.len() {
        return None;
    }

    let mut edits = Vec::new();
    for (document, new) in documents.iter().zip(expected) {
        let mut changes = Vec::new();
        if !changed_scalars(&document.value, new, &mut Vec::new(), &mut changes) {
            return None;
        }
        if changes.is_empty() {
            continue;
        }
        let lines = lines_of(content, document.range.clone());
        for (path, value) in changes {
            let (span, quote) = locate(&lines, &path)?;
            edits.push((span, render_scalar(&value, quote)?));
        }
    }

    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut text = content.to_string();
    for (span, replacement) in edits {
        text.replace_range(span, &replacement);
    }

    let reparsed = parse_documents(&text).ok()?;
    let same = reparsed.len() == expected.len()
        && reparsed.iter().zip(expected).all(|(d, v)| d.value == *v);
    same.then_some(text)
}

fn render_stream(documents: &[Value]) -> Result<String> {
    let mut out = String::new();
    for (i, document) in documents.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n");
        }
        out.push_str(&serde_yaml::to_string(document)?);
    }
    Ok(out)
}

fn has_comments(content: &str) -> bool {
    content.lines().any(|line| {
        line.trim_start().starts_with('#') || line.contains(" #") || line.contains("\t#")
    })
}

fn is_marker(line: &str) -> bool {
    line == "---" || line == "..." || line.starts_with("--- ") || line.starts_with("---\t")
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

fn is_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ") || text.starts_with("-\t")
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

/// Collect the paths of scalars that differ between `old` and `new`.
/// `false` when the two differ in shape (keys added, lengths changed).
fn changed_scalars(
    old: &Value,
    new: &Value,
    path: &mut Vec<PathSegment>,
    out: &mut Vec<(Vec<PathSegment>, Value)>,
) -> bool {
    if old == new {
        return true;
    }
    match (old, new) {
        (Value::Mapping(a), Value::Mapping(b)) => {
            if a.len() != b.len() {
                return false;
            }
            for (key, value) in b {
                let (Value::String(name), Some(previous)) = (key, a.get(key)) else {
                    return false;
                };
                path.push(PathSegment::Key(name.clone()));
                let ok = changed_scalars(previous, value, path, out);
                path.pop();
                if !ok {
                    return false;
                }
            }
            true
        }
        (Value::Sequence(a), Value::Sequence(b)) => {
            if a.len() != b.len() {
                return false;
            }
            for (index, (previous, value)) in a.iter().zip(b).enumerate() {
                path.push(PathSegment::Index(index));
                let ok = changed_scalars(previous, value, path, out);
                path.pop();
                if !ok {
                    return false;
                }
            }
            true
        }
        (a, b) if is_scalar(a) && is_scalar(b) => {
            out.push((path.clone(), b.clone()));
            true
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Plain,
    Single,
    Double,
}

/// Text for `value` in the quoting style of the scalar it replaces.
fn render_scalar(value: &Value, quote: Quote) -> Option<String> {
    match (value, quote) {
        (Value::String(s), Quote::Double) => serde_json::to_string(s).ok(),
        (Value::String(s), Quote::Single) if !s.contains('\n') => {
            Some(format!("'{}'", s.replace('\'', "''")))
        }
        _ => {
            let text = serde_yaml::to_string(value).ok()?;
            let text = text.trim_end_matches('\n');
            (!text.contains('\n')).then(|| text.to_string())
        }
    }
}

struct Line<'a> {
    start: usize,
    text: &'a str,
}

fn lines_of(content: &str, range: Range<usize>) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = range.start;
    for raw in content[range].split_inclusive('\n') {
        lines.push(Line {
            start: offset,
            text: raw.trim_end_matches(['\n', '\r']),
        });
        offset += raw.len();
    }
    lines
}

/// A node's text: it starts at `col` of `line` and owns the following lines
/// up to `end`.
#[derive(Debug, Clone, Copy)]
struct Region {
    line: usize,
    col: usize,
    end: usize,
}

fn locate(lines: &[Line], path: &[PathSegment]) -> Option<(Range<usize>, Quote)> {
    let mut region = Region {
        line: 0,
        col: 0,
        end: lines.len(),
    };
    for segment in path {
        region = match segment {
            PathSegment::Key(key) => find_key(lines, region, key)?,
            PathSegment::Index(index) => find_index(lines, region, *index)?,
            PathSegment::Each => return None,
        };
    }
    scalar_span(lines, region)
}

/// Line and column of the first non-comment text in `region`.
fn first_content(lines: &[Line], region: Region) -> Option<(usize, usize)> {
    let rest = lines.get(region.line)?.text.get(region.col..)?;
    let trimmed = rest.trim_start();
    if !trimmed.is_empty() && !trimmed.starts_with('#') {
        return Some((region.line, region.col + rest.len() - trimmed.len()));
    }
    (region.line + 1..region.end)
        .find(|&l| is_content(lines[l].text))
        .map(|l| (l, indent_of(lines[l].text)))
}

/// First line after `from` that leaves a block indented at `indent`.
/// Sequence items at `indent` stay inside when `items_belong` is set, as a
/// mapping value may be a sequence written at its key's indentation.
fn block_end(lines: &[Line], from: usize, indent: usize, end: usize, items_belong: bool) -> usize {
    (from + 1..end)
        .find(|&l| {
            let text = lines[l].text;
            if !is_content(text) {
                return false;
            }
            let level = indent_of(text);
            level < indent || (level == indent && !(items_belong && is_item(&text[level..])))
        })
        .unwrap_or(end)
}

fn find_key(lines: &[Line], region: Region, key: &str) -> Option<Region> {
    let (mut line, indent) = first_content(lines, region)?;
    let mut col = indent;
    loop {
        let (name, after) = entry_key(&lines[line].text[col..])?;
        let end = block_end(lines, line, indent, region.end, true);
        if name == key {
            return Some(Region {
                line,
                col: col + after,
                end,
            });
        }
        if end >= region.end || indent_of(lines[end].text) != indent {
            return None;
        }
        line = end;
        col = indent;
    }
}

fn find_index(lines: &[Line], region: Region, index: usize) -> Option<Region> {
    let (mut line, indent) = first_content(lines, region)?;
    let mut col = indent;
    for _ in 0..index {
        if !is_item(&lines[line].text[col..]) {
            return None;
        }
        let next = block_end(lines, line, indent, region.end, false);
        if next >= region.end || indent_of(lines[next].text) != indent {
            return None;
        }
        line = next;
        col = indent;
    }
    if !is_item(&lines[line].text[col..]) {
        return None;
    }
    Some(Region {
        line,
        col: col + 1,
        end: block_end(lines, line, indent, region.end, false),
    })
}

/// Key of a `key: value` entry and the offset just past its colon.
fn entry_key(text: &str) -> Option<(String, usize)> {
    let (key, key_end) = match text.chars().next()? {
        '"' => {
            let close = closing_double(text)?;
            (serde_json::from_str::<String>(&text[..=close]).ok()?, close + 1)
        }
        '\'' => {
            let close = closing_single(text)?;
            (text[1..close].replace("''", "'"), close + 1)
        }
        '-' if is_item(text) => return None,
        '?' | '[' | '{' | '&' | '*' | '!' | '#' | '|' | '>' => return None,
        _ => {
            let colon = plain_colon(text)?;
            (text[..colon].trim_end().to_string(), colon)
        }
    };
    let rest = &text[key_end..];
    let trimmed = rest.trim_start_matches(' ');
    let colon = key_end + rest.len() - trimmed.len();
    let tail = trimmed.strip_prefix(':')?;
    if !(tail.is_empty() || tail.starts_with(' ') || tail.starts_with('\t')) {
        return None;
    }
    Some((key, colon + 1))
}

/// Offset of the first `:` that ends a plain key, stopping at a comment.
fn plain_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b':' if matches!(bytes.get(i + 1), None | Some(b' ') | Some(b'\t')) => return Some(i),
            b'#' if i > 0 && matches!(bytes[i - 1], b' ' | b'\t') => return None,
            _ => {}
        }
    }
    None
}

fn closing_double(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, b) in text.bytes().enumerate().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'"' => return Some(i),
            _ => {}
        }
    }
    None
}

fn closing_single(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

fn comment_start(text: &str) -> Option<usize> {
    text.as_bytes()
        .windows(2)
        .position(|w| matches!(w[0], b' ' | b'\t') && w[1] == b'#')
}

/// Byte span of the single-line scalar that makes up `region`.
fn scalar_span(lines: &[Line], region: Region) -> Option<(Range<usize>, Quote)> {
    let (line, col) = first_content(lines, region)?;
    if (line + 1..region.end).any(|l| is_content(lines[l].text)) {
        return None;
    }
    let text = &lines[line].text[col..];
    let (len, quote) = match text.chars().next()? {
        '"' => (closing_double(text)? + 1, Quote::Double),
        '\'' => (closing_single(text)? + 1, Quote::Single),
        '|' | '>' | '[' | '{' | '&' | '*' | '!' | '%' | '@' | '`' | '?' | '#' => return None,
        '-' if is_item(text) => return None,
        _ => {
            let end = comment_start(text).unwrap_or(text.len());
            let value = text[..end].trim_end();
            if plain_colon(value).is_some() {
                return None;
            }
            (value.len(), Quote::Plain)
        }
    };
    let tail = text[len..].trim_start();
    if !(tail.is_empty() || tail.starts_with('#')) {
        return None;
    }
    let start = lines[line].start + col;
    Some((start..start + len, quote))
}
