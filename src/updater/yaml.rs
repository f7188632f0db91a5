//! # YAML Updaters
//!
//! Two updaters share this module:
//!
//! - `yaml(file=…, path=…)` sets the value at a dot/bracket path such as
//!   `spec.template.containers[0].image` or `metadata["app.kubernetes.io/name"]`.
//!   Missing mappings along the path are created.
//! - `yq(file=…, expression=…)` takes a leading-dot expression and
//!   additionally understands `[]`, which applies the rest of the expression
//!   to every element of a sequence (`.jobs[].runs-on`).
//!
//! Both compare the parsed value before writing, so re-running with the same
//! value leaves the file untouched and reports no change. Only the changed
//! scalars are rewritten, so comments and layout survive (see
//! [`yaml_edit`](super::yaml_edit)). In a `---` separated stream only the
//! documents where the path already exists are edited.

use super::{files, yaml_edit, Description};
use crate::error::{Error, Result};
use crate::params::{self, Params};
use crate::valuer::ValueSource;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// One step of a YAML path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Mapping key.
    Key(String),
    /// Sequence index.
    Index(usize),
    /// Every element of a sequence (`[]`).
    Each,
}

/// Parse a dot/bracket path into segments.
///
/// Supports `a.b`, `a[0]`, `a["dotted.key"]`, `a['k']`, `a[]` and `\.` to
/// escape a literal dot.
///
/// # Examples
///
/// ```
/// use repo_scribe::updater::yaml::{parse_path, PathSegment};
///
/// let segments = parse_path("jobs[].steps[0].uses").unwrap();
/// assert_eq!(segments[0], PathSegment::Key("jobs".to_string()));
/// assert_eq!(segments[1], PathSegment::Each);
/// assert_eq!(segments[3], PathSegment::Index(0));
/// ```
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let invalid = |message: String| Error::InvalidParam {
        param: "path".to_string(),
        message,
    };

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' => escaped = true,
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                match chars.peek().copied() {
                    Some(quote) if quote == '"' || quote == '\'' => {
                        chars.next();
                        let mut key = String::new();
                        let mut closed = false;
                        while let Some(ch) = chars.next() {
                            if ch == quote && chars.peek() == Some(&']') {
                                chars.next();
                                closed = true;
                                break;
                            }
                            key.push(ch);
                        }
                        if !closed {
                            return Err(invalid(format!("unterminated quoted key in {:?}", path)));
                        }
                        segments.push(PathSegment::Key(key));
                    }
                    _ => {
                        let mut content = String::new();
                        let mut closed = false;
                        for ch in chars.by_ref() {
                            if ch == ']' {
                                closed = true;
                                break;
                            }
                            content.push(ch);
                        }
                        if !closed {
                            return Err(invalid(format!("missing ']' in {:?}", path)));
                        }
                        let content = content.trim();
                        if content.is_empty() {
                            segments.push(PathSegment::Each);
                        } else {
                            let index = content.parse::<usize>().map_err(|_| {
                                invalid(format!("invalid index [{}] in {:?}", content, path))
                            })?;
                            segments.push(PathSegment::Index(index));
                        }
                    }
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }
    if segments.is_empty() {
        return Err(invalid(format!("empty path {:?}", path)));
    }
    Ok(segments)
}

/// Set every node addressed by `path` to `new`, creating missing mappings.
///
/// Returns whether any node actually changed.
pub fn assign(node: &mut Value, path: &[PathSegment], new: &Value) -> Result<bool> {
    let Some((head, rest)) = path.split_first() else {
        if *node == *new {
            return Ok(false);
        }
        *node = new.clone();
        return Ok(true);
    };

    match head {
        PathSegment::Key(key) => {
            if node.is_null() {
                *node = Value::Mapping(Mapping::new());
            }
            let map = node.as_mapping_mut().ok_or_else(|| {
                Error::updater("yaml", format!("expected mapping while navigating to '{}'", key))
            })?;
            let child = map
                .entry(Value::String(key.clone()))
                .or_insert(Value::Null);
            assign(child, rest, new)
        }
        PathSegment::Index(index) => {
            if node.is_null() {
                *node = Value::Sequence(Vec::new());
            }
            let seq = node.as_sequence_mut().ok_or_else(|| {
                Error::updater("yaml", format!("expected sequence at index {}", index))
            })?;
            while seq.len() <= *index {
                seq.push(Value::Null);
            }
            assign(&mut seq[*index], rest, new)
        }
        PathSegment::Each => {
            let seq = node
                .as_sequence_mut()
                .ok_or_else(|| Error::updater("yaml", "expected sequence for []"))?;
            let mut changed = false;
            for item in seq.iter_mut() {
                changed |= assign(item, rest, new)?;
            }
            Ok(changed)
        }
    }
}

/// Interpret `text` as a YAML scalar unless `as_string` forces a string.
///
/// `3` becomes a number and `true` a boolean; anything that does not parse
/// to a scalar is kept as a string.
pub fn scalar_value(text: &str, as_string: bool) -> Value {
    if as_string || text.is_empty() {
        return Value::String(text.to_string());
    }
    match serde_yaml::from_str::<Value>(text) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        Ok(Value::Null) if text == "null" || text == "~" => Value::Null,
        _ => Value::String(text.to_string()),
    }
}

fn force_string(params: &Params) -> Result<bool> {
    match params.get("style").map(String::as_str) {
        None | Some("auto") => Ok(false),
        Some("string") => Ok(true),
        Some(other) => Err(Error::InvalidParam {
            param: "style".to_string(),
            message: format!("expected auto or string, got {:?}", other),
        }),
    }
}

/// Whether every step of `path` exists in `node`. `[]` needs one element.
fn resolves(node: &Value, path: &[PathSegment]) -> bool {
    let Some((head, rest)) = path.split_first() else {
        return true;
    };
    match head {
        PathSegment::Key(key) => node
            .get(key.as_str())
            .map_or(false, |child| resolves(child, rest)),
        PathSegment::Index(index) => node
            .as_sequence()
            .and_then(|seq| seq.get(*index))
            .map_or(false, |child| resolves(child, rest)),
        PathSegment::Each => node
            .as_sequence()
            .map_or(false, |seq| seq.iter().any(|child| resolves(child, rest))),
    }
}

fn set_in_files(
    working_copy: &Path,
    file: &str,
    path: &[PathSegment],
    new: &Value,
    updater: &str,
) -> Result<bool> {
    let mut changed = false;
    for target in files::require_matches(working_copy, file, updater)? {
        changed |= yaml_edit::update_file(&target, updater, |doc, in_stream| {
            if in_stream && !resolves(doc, path) {
                return Ok(false);
            }
            assign(doc, path, new).map_err(|e| match e {
                Error::Updater { message, .. } => Error::updater(updater, message),
                other => other,
            })
        })?;
    }
    Ok(changed)
}

/// `yaml(file=…, path=…[, style=string])`
#[derive(Debug, Clone)]
pub struct YamlPathUpdater {
    file: String,
    path: String,
    segments: Vec<PathSegment>,
    as_string: bool,
    value: ValueSource,
}

impl YamlPathUpdater {
    pub fn new(params: &Params, value: ValueSource) -> Result<Self> {
        let file = params::required(params, "file")?.to_string();
        let path = params::required(params, "path")?.to_string();
        let segments = parse_path(&path)?;
        if segments.contains(&PathSegment::Each) {
            return Err(Error::InvalidParam {
                param: "path".to_string(),
                message: "[] iteration is only supported by the yq updater".to_string(),
            });
        }
        Ok(Self {
            file,
            path,
            segments,
            as_string: force_string(params)?,
            value,
        })
    }

    pub fn apply(&self, working_copy: &Path) -> Result<bool> {
        let value = self
            .value
            .resolve(working_copy)
            .map_err(|e| Error::updater("yaml", e.to_string()))?;
        let new = scalar_value(&value, self.as_string);
        set_in_files(working_copy, &self.file, &self.segments, &new, "yaml")
    }

    pub fn describe(&self) -> Description {
        Description {
            title: format!("Set {} to {}", self.path, self.value.describe()),
            body: format!(
                "Set `{}` to `{}` in files matching `{}`.",
                self.path,
                self.value.describe(),
                self.file
            ),
        }
    }
}

/// `yq(file=…, expression=…[, style=string])`
#[derive(Debug, Clone)]
pub struct YqUpdater {
    file: String,
    expression: String,
    segments: Vec<PathSegment>,
    as_string: bool,
    value: ValueSource,
}

impl YqUpdater {
    pub fn new(params: &Params, value: ValueSource) -> Result<Self> {
        let file = params::required(params, "file")?.to_string();
        let expression = params::required(params, "expression")?.to_string();
        let Some(path) = expression.strip_prefix('.') else {
            return Err(Error::InvalidParam {
                param: "expression".to_string(),
                message: format!("{:?} must start with '.'", expression),
            });
        };
        let segments = parse_path(path)?;
        Ok(Self {
            file,
            expression,
            segments,
            as_string: force_string(params)?,
            value,
        })
    }

    pub fn apply(&self, working_copy: &Path) -> Result<bool> {
        let value = self
            .value
            .resolve(working_copy)
            .map_err(|e| Error::updater("yq", e.to_string()))?;
        let new = scalar_value(&value, self.as_string);
        set_in_files(working_copy, &self.file, &self.segments, &new, "yq")
    }

    pub fn describe(&self) -> Description {
        Description {
            title: format!("Set {} to {}", self.expression, self.value.describe()),
            body: format!(
                "Evaluated `{} = {:?}` on files matching `{}`.",
                self.expression,
                self.value.describe(),
                self.file
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse_params;
    use std::fs;
    use tempfile::TempDir;

    fn literal(value: &str) -> ValueSource {
        ValueSource::Literal(value.to_string())
    }

    mod path_tests {
        use super::*;

        #[test]
        fn test_dotted_keys() {
            assert_eq!(
                parse_path("a.b.c").unwrap(),
                vec![
                    PathSegment::Key("a".into()),
                    PathSegment::Key("b".into()),
                    PathSegment::Key("c".into())
                ]
            );
        }

        #[test]
        fn test_index_and_quoted_key() {
            assert_eq!(
                parse_path("items[2][\"app.io/name\"]").unwrap(),
                vec![
                    PathSegment::Key("items".into()),
                    PathSegment::Index(2),
                    PathSegment::Key("app.io/name".into())
                ]
            );
        }

        #[test]
        fn test_escaped_dot() {
            assert_eq!(
                parse_path(r"labels.app\.io").unwrap(),
                vec![
                    PathSegment::Key("labels".into()),
                    PathSegment::Key("app.io".into())
                ]
            );
        }

        #[test]
        fn test_errors() {
            assert!(parse_path("").is_err());
            assert!(parse_path("a[x]").is_err());
            assert!(parse_path("a[1").is_err());
            assert!(parse_path("a[\"b").is_err());
        }
    }

    mod assign_tests {
        use super::*;

        #[test]
        fn test_creates_missing_mappings() {
            let mut doc = Value::Null;
            let changed = assign(
                &mut doc,
                &parse_path("a.b").unwrap(),
                &Value::String("x".into()),
            )
            .unwrap();
            assert!(changed);
            assert_eq!(serde_yaml::to_string(&doc).unwrap(), "a:\n  b: x\n");
        }

        #[test]
        fn test_same_value_is_no_change() {
            let mut doc: Value = serde_yaml::from_str("a: 1\n").unwrap();
            let changed = assign(&mut doc, &parse_path("a").unwrap(), &scalar_value("1", false))
                .unwrap();
            assert!(!changed);
        }

        #[test]
        fn test_each_applies_to_all_elements() {
            let mut doc: Value =
                serde_yaml::from_str("jobs:\n  - os: a\n  - os: b\n").unwrap();
            let changed = assign(
                &mut doc,
                &parse_path("jobs[].os").unwrap(),
                &Value::String("c".into()),
            )
            .unwrap();
            assert!(changed);
            assert_eq!(
                serde_yaml::to_string(&doc).unwrap(),
                "jobs:\n- os: c\n- os: c\n"
            );
        }

        #[test]
        fn test_scalar_in_the_way() {
            let mut doc: Value = serde_yaml::from_str("a: 1\n").unwrap();
            let err = assign(
                &mut doc,
                &parse_path("a.b").unwrap(),
                &Value::String("x".into()),
            )
            .unwrap_err();
            assert!(err.to_string().contains("expected mapping"));
        }
    }

    #[test]
    fn test_scalar_value() {
        assert_eq!(scalar_value("3", false), Value::Number(3.into()));
        assert_eq!(scalar_value("true", false), Value::Bool(true));
        assert_eq!(scalar_value("3", true), Value::String("3".into()));
        assert_eq!(scalar_value("v1.2", false), Value::String("v1.2".into()));
        assert_eq!(scalar_value("[a, b]", false), Value::String("[a, b]".into()));
        assert_eq!(scalar_value("", false), Value::String(String::new()));
    }

    #[test]
    fn test_yaml_updater_sets_value_once() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("values.yaml");
        fs::write(&file, "image:\n  repository: app\n  tag: v1\n").unwrap();

        let updater = YamlPathUpdater::new(
            &parse_params("file=values.yaml,path=image.tag").unwrap(),
            literal("v2"),
        )
        .unwrap();

        assert!(updater.apply(temp.path()).unwrap());
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "image:\n  repository: app\n  tag: v2\n"
        );
        assert!(!updater.apply(temp.path()).unwrap());
    }

    #[test]
    fn test_yaml_updater_rejects_iteration() {
        let result = YamlPathUpdater::new(
            &parse_params("file=a.yaml,path=jobs[].os").unwrap(),
            literal("x"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_updater_style_string() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.yaml");
        fs::write(&file, "version: 1\n").unwrap();

        let updater = YamlPathUpdater::new(
            &parse_params("file=a.yaml,path=version,style=string").unwrap(),
            literal("2"),
        )
        .unwrap();
        assert!(updater.apply(temp.path()).unwrap());
        assert_eq!(fs::read_to_string(&file).unwrap(), "version: '2'\n");
    }

    #[test]
    fn test_yaml_updater_bad_style() {
        assert!(YamlPathUpdater::new(
            &parse_params("file=a.yaml,path=v,style=bold").unwrap(),
            literal("2"),
        )
        .is_err());
    }

    #[test]
    fn test_yq_requires_leading_dot() {
        let err = YqUpdater::new(
            &parse_params("file=a.yaml,expression=a.b").unwrap(),
            literal("x"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must start with '.'"));
    }

    #[test]
    fn test_yq_updates_every_job() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".github/workflows");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("ci.yaml"),
            "jobs:\n- runs-on: ubuntu-20.04\n- runs-on: ubuntu-22.04\n",
        )
        .unwrap();

        let updater = YqUpdater::new(
            &parse_params("file='.github/workflows/*.yaml',expression='.jobs[].runs-on'")
                .unwrap(),
            literal("ubuntu-24.04"),
        )
        .unwrap();

        assert!(updater.apply(temp.path()).unwrap());
        assert_eq!(
            fs::read_to_string(dir.join("ci.yaml")).unwrap(),
            "jobs:\n- runs-on: ubuntu-24.04\n- runs-on: ubuntu-24.04\n"
        );
        assert!(!updater.apply(temp.path()).unwrap());
    }

    #[test]
    fn test_yaml_updater_keeps_comments() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("values.yaml");
        let content = "\
# Default values for the api chart.
image:
  # registry mirror
  repository: registry.example.com/api
  tag: \"1.4.0\"   # managed by release tooling

replicas: 2
";
        fs::write(&file, content).unwrap();

        let updater = YamlPathUpdater::new(
            &parse_params("file=values.yaml,path=image.tag").unwrap(),
            literal("1.5.0"),
        )
        .unwrap();
        assert!(updater.apply(temp.path()).unwrap());
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            content.replace("\"1.4.0\"", "\"1.5.0\"")
        );
    }

    #[test]
    fn test_yaml_updater_refuses_new_key_in_commented_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("values.yaml");
        fs::write(&file, "# api\nimage:\n  repository: app\n").unwrap();

        let updater = YamlPathUpdater::new(
            &parse_params("file=values.yaml,path=image.tag").unwrap(),
            literal("v2"),
        )
        .unwrap();
        let err = updater.apply(temp.path()).unwrap_err();
        assert!(err.to_string().contains("cannot edit in place"));
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "# api\nimage:\n  repository: app\n"
        );
    }

    #[test]
    fn test_yaml_updater_multi_document_stream() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("manifests.yaml");
        let content = "\
# deployment
apiVersion: apps/v1
kind: Deployment
spec:
  replicas: 1 # scaled by hpa
---
apiVersion: v1
kind: Service
metadata:
  name: app
---
kind: Deployment
spec:
  replicas: 2
";
        fs::write(&file, content).unwrap();

        let updater = YamlPathUpdater::new(
            &parse_params("file=manifests.yaml,path=spec.replicas").unwrap(),
            literal("3"),
        )
        .unwrap();
        assert!(updater.apply(temp.path()).unwrap());
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            content
                .replace("replicas: 1 #", "replicas: 3 #")
                .replace("replicas: 2\n", "replicas: 3\n")
        );
        assert!(!updater.apply(temp.path()).unwrap());
    }

    #[test]
    fn test_resolves() {
        let doc: Value = serde_yaml::from_str("a:\n  b: [ {c: 1}, {d: 2} ]\n").unwrap();
        assert!(resolves(&doc, &parse_path("a.b").unwrap()));
        assert!(resolves(&doc, &parse_path("a.b[1].d").unwrap()));
        assert!(resolves(&doc, &parse_path("a.b[].c").unwrap()));
        assert!(!resolves(&doc, &parse_path("a.x").unwrap()));
        assert!(!resolves(&doc, &parse_path("a.b[2]").unwrap()));
    }

    #[test]
    fn test_describe() {
        let updater = YqUpdater::new(
            &parse_params("file=a.yaml,expression=.a.b").unwrap(),
            literal("x"),
        )
        .unwrap();
        assert_eq!(updater.describe().title, "Set .a.b to x");
    }
}
