//! # Repository Targets
//!
//! `--repo` values name the repositories a run touches. Three forms are
//! accepted and may be mixed freely:
//!
//! - `owner/name` or `owner/name(draft=true)`: a literal repository with
//!   optional per-repository parameters.
//! - `env(var=REPOS, sep=",", merge=true)`: the whitespace (or `sep`)
//!   separated literals in an environment variable. Any other parameter is a
//!   default for every repository found, never overriding a value the
//!   literal already carries.
//! - `search(query="org:acme topic:go", type=repositories)`: every result of
//!   a GitHub search. Other parameters are attached to every result.
//!
//! Results are concatenated and then collapsed to one target per
//! `(owner, name)`. The first occurrence wins, including its parameters.

use crate::error::{Error, Result};
use crate::github::{Forge, SearchKind};
use crate::params::{self, Params};
use log::{debug, info};
use std::collections::HashSet;
use std::fmt;

/// One repository to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub owner: String,
    pub name: String,
    /// Per-repository overrides such as `draft` and `merge`.
    pub params: Params,
}

impl RepositoryTarget {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            params: Params::new(),
        }
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// A boolean parameter; unparseable values count as absent.
    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(|v| params::parse_bool(v))
    }
}

impl fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parse `owner/name(params)`.
pub fn parse_literal(spec: &str) -> Result<RepositoryTarget> {
    let expr = params::parse_expression(spec, "repository")?;
    if expr.value.is_some() {
        return Err(Error::syntax(spec, "a repository takes no value"));
    }
    let parts: Vec<&str> = expr.name.split('/').collect();
    let [owner, name] = parts.as_slice() else {
        return Err(Error::syntax(
            spec,
            format!("expected owner/name, found {} path segments", parts.len()),
        ));
    };
    for part in [owner, name] {
        if part.is_empty() || !part.chars().all(is_repo_char) {
            return Err(Error::syntax(spec, format!("invalid owner/name {:?}", expr.name)));
        }
    }
    Ok(RepositoryTarget {
        owner: owner.to_string(),
        name: name.to_string(),
        params: expr.params,
    })
}

fn is_repo_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Resolve every `--repo` spec into a de-duplicated target list.
///
/// `forge` is only needed for `search(...)`; literal and `env(...)` specs
/// resolve offline. Any malformed entry fails the whole batch.
pub fn resolve_targets<S: AsRef<str>>(
    specs: &[S],
    forge: Option<&dyn Forge>,
) -> Result<Vec<RepositoryTarget>> {
    let mut all = Vec::new();
    for spec in specs.iter().map(AsRef::as_ref) {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        all.extend(resolve_one(spec, forge)?);
    }
    let targets = dedup(all);
    info!("Resolved {} target repositories", targets.len());
    Ok(targets)
}

fn resolve_one(spec: &str, forge: Option<&dyn Forge>) -> Result<Vec<RepositoryTarget>> {
    let expr = params::parse_expression(spec, "repository")?;
    if expr.name.contains('/') || !spec.contains('(') {
        return Ok(vec![parse_literal(spec)?]);
    }
    match expr.name.as_str() {
        "env" => from_env(expr.params),
        "search" => from_search(expr.params, forge),
        other => Err(Error::UnknownRepoSource {
            name: other.to_string(),
        }),
    }
}

fn from_env(mut params: Params) -> Result<Vec<RepositoryTarget>> {
    let var = params::required(&params, "var")?.to_string();
    params.remove("var");
    let sep = params.remove("sep").filter(|s| !s.is_empty());
    let value = std::env::var(&var).unwrap_or_default();

    let tokens = match &sep {
        Some(sep) => params::split_top_level(&value, sep),
        None => params::split_top_level_whitespace(&value),
    };

    let mut targets = Vec::new();
    for token in tokens.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
        let mut target = parse_literal(token)?;
        for (key, default) in &params {
            target
                .params
                .entry(key.clone())
                .or_insert_with(|| default.clone());
        }
        targets.push(target);
    }
    debug!("${} yielded {} repositories", var, targets.len());
    Ok(targets)
}

fn from_search(mut params: Params, forge: Option<&dyn Forge>) -> Result<Vec<RepositoryTarget>> {
    let query = params::required(&params, "query")?.to_string();
    params.remove("query");
    let kind = match params.remove("type") {
        Some(kind) => kind.parse::<SearchKind>()?,
        None => SearchKind::default(),
    };
    let forge = forge.ok_or_else(|| Error::Config {
        message: "search(...) needs a GitHub token".to_string(),
    })?;

    let results = forge.search_repositories(&query, kind)?;
    debug!("search {:?} yielded {} repositories", query, results.len());
    Ok(results
        .into_iter()
        .map(|(owner, name)| RepositoryTarget {
            owner,
            name,
            params: params.clone(),
        })
        .collect())
}

/// Keep the first target for each `(owner, name)`, preserving order.
pub fn dedup(targets: Vec<RepositoryTarget>) -> Vec<RepositoryTarget> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|t| seen.insert((t.owner.clone(), t.name.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{MergeRequest, NewPullRequest, PullRequest, PullRequestEdit};
    use serial_test::serial;
    use std::sync::Mutex;

    mod parse_literal_tests {
        use super::*;

        #[test]
        fn test_plain() {
            let target = parse_literal("acme/widgets").unwrap();
            assert_eq!(target.owner, "acme");
            assert_eq!(target.name, "widgets");
            assert!(target.params.is_empty());
            assert_eq!(target.full_name(), "acme/widgets");
        }

        #[test]
        fn test_with_params() {
            let target = parse_literal("acme/widgets(draft=true,merge=false)").unwrap();
            assert_eq!(target.params["draft"], "true");
            assert_eq!(target.param_bool("draft"), Some(true));
            assert_eq!(target.param_bool("merge"), Some(false));
        }

        #[test]
        fn test_unparseable_bool_is_absent() {
            let target = parse_literal("acme/widgets(draft=maybe)").unwrap();
            assert_eq!(target.param_bool("draft"), None);
            assert_eq!(target.param_bool("merge"), None);
        }

        #[test]
        fn test_errors_name_the_input() {
            for spec in ["widgets", "acme/widgets/extra", "/widgets", "acme/", "acme/wid gets"] {
                let err = parse_literal(spec).unwrap_err();
                assert!(
                    err.to_string().contains(&format!("{:?}", spec)),
                    "{} -> {}",
                    spec,
                    err
                );
            }
        }

        #[test]
        fn test_rejects_value() {
            assert!(parse_literal("acme/widgets=1").is_err());
        }
    }

    mod dedup_tests {
        use super::*;

        #[test]
        fn test_first_occurrence_wins_and_later_params_are_dropped() {
            let targets = resolve_targets(&["A/B(draft=true)", "A/B(merge=true)", "A/C"], None)
                .unwrap();
            assert_eq!(targets.len(), 2);
            assert_eq!(targets[0].full_name(), "A/B");
            assert_eq!(targets[0].params.get("draft").map(String::as_str), Some("true"));
            assert!(!targets[0].params.contains_key("merge"));
            assert_eq!(targets[1].full_name(), "A/C");
        }

        #[test]
        fn test_blank_specs_are_skipped() {
            let targets = resolve_targets(&["", "  ", "a/b"], None).unwrap();
            assert_eq!(targets.len(), 1);
        }

        #[test]
        fn test_one_bad_entry_fails_the_batch() {
            assert!(resolve_targets(&["a/b", "nope"], None).is_err());
        }
    }

    mod env_tests {
        use super::*;

        #[test]
        #[serial]
        fn test_defaults_never_override_literal_params() {
            std::env::set_var("SCRIBE_TEST_REPOS", "a/one(draft=false) a/two");
            let targets = resolve_targets(&["env(var=SCRIBE_TEST_REPOS,draft=true)"], None).unwrap();
            std::env::remove_var("SCRIBE_TEST_REPOS");

            assert_eq!(targets.len(), 2);
            assert_eq!(targets[0].params["draft"], "false");
            assert_eq!(targets[1].params["draft"], "true");
            assert!(!targets[0].params.contains_key("var"));
        }

        #[test]
        #[serial]
        fn test_custom_separator_is_not_forwarded() {
            std::env::set_var("SCRIBE_TEST_REPOS", "a/one,a/two,");
            let targets = resolve_targets(&["env(var=SCRIBE_TEST_REPOS,sep=',')"], None).unwrap();
            std::env::remove_var("SCRIBE_TEST_REPOS");

            assert_eq!(targets.len(), 2);
            assert!(targets.iter().all(|t| !t.params.contains_key("sep")));
        }

        #[test]
        #[serial]
        fn test_separator_inside_params_does_not_split() {
            std::env::set_var(
                "SCRIBE_TEST_REPOS",
                "a/one(draft=true,merge=true),a/two(merge='x,y')",
            );
            let targets = resolve_targets(&["env(var=SCRIBE_TEST_REPOS,sep=',')"], None).unwrap();
            std::env::set_var("SCRIBE_TEST_REPOS", "a/three(draft=true, merge=true)\ta/four");
            let spaced = resolve_targets(&["env(var=SCRIBE_TEST_REPOS)"], None).unwrap();
            std::env::remove_var("SCRIBE_TEST_REPOS");

            assert_eq!(targets.len(), 2);
            assert_eq!(targets[0].params["draft"], "true");
            assert_eq!(targets[0].params["merge"], "true");
            assert_eq!(targets[1].params["merge"], "x,y");
            assert_eq!(spaced.len(), 2);
            assert_eq!(spaced[0].params["merge"], "true");
            assert_eq!(spaced[1].name, "four");
        }

        #[test]
        #[serial]
        fn test_unset_or_empty_variable_yields_nothing() {
            std::env::remove_var("SCRIBE_TEST_REPOS");
            assert!(resolve_targets(&["env(var=SCRIBE_TEST_REPOS)"], None)
                .unwrap()
                .is_empty());
            std::env::set_var("SCRIBE_TEST_REPOS", "");
            assert!(resolve_targets(&["env(var=SCRIBE_TEST_REPOS)"], None)
                .unwrap()
                .is_empty());
            std::env::remove_var("SCRIBE_TEST_REPOS");
        }

        #[test]
        #[serial]
        fn test_malformed_token_fails() {
            std::env::set_var("SCRIBE_TEST_REPOS", "a/one broken");
            let result = resolve_targets(&["env(var=SCRIBE_TEST_REPOS)"], None);
            std::env::remove_var("SCRIBE_TEST_REPOS");
            assert!(result.is_err());
        }
    }

    struct SearchForge {
        queries: Mutex<Vec<(String, SearchKind)>>,
    }

    impl Forge for SearchForge {
        fn find_pull_requests(&self, _: &str, _: &str, _: &str) -> Result<Vec<PullRequest>> {
            unimplemented!()
        }
        fn create_pull_request(&self, _: &str, _: &str, _: &NewPullRequest) -> Result<PullRequest> {
            unimplemented!()
        }
        fn edit_pull_request(
            &self,
            _: &str,
            _: &str,
            _: u64,
            _: &PullRequestEdit,
        ) -> Result<PullRequest> {
            unimplemented!()
        }
        fn add_labels(&self, _: &str, _: &str, _: u64, _: &[String]) -> Result<()> {
            unimplemented!()
        }
        fn add_comment(&self, _: &str, _: &str, _: u64, _: &str) -> Result<()> {
            unimplemented!()
        }
        fn get_pull_request(&self, _: &str, _: &str, _: u64) -> Result<PullRequest> {
            unimplemented!()
        }
        fn merge_pull_request(&self, _: &str, _: &str, _: u64, _: &MergeRequest) -> Result<()> {
            unimplemented!()
        }
        fn search_repositories(
            &self,
            query: &str,
            kind: SearchKind,
        ) -> Result<Vec<(String, String)>> {
            self.queries.lock().unwrap().push((query.to_string(), kind));
            Ok(vec![
                ("acme".to_string(), "api".to_string()),
                ("acme".to_string(), "web".to_string()),
            ])
        }
    }

    #[test]
    fn test_search_attaches_shared_params() {
        let forge = SearchForge {
            queries: Mutex::new(Vec::new()),
        };
        let targets = resolve_targets(
            &["acme/web(draft=true)", "search(query='org:acme topic:go',type=code,merge=true)"],
            Some(&forge),
        )
        .unwrap();

        assert_eq!(
            forge.queries.lock().unwrap().as_slice(),
            &[("org:acme topic:go".to_string(), SearchKind::Code)]
        );
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].full_name(), "acme/web");
        assert!(!targets[0].params.contains_key("merge"));
        assert_eq!(targets[1].full_name(), "acme/api");
        assert_eq!(targets[1].params["merge"], "true");
        assert!(!targets[1].params.contains_key("query"));
    }

    #[test]
    fn test_search_without_forge() {
        let err = resolve_targets(&["search(query=x)"], None).unwrap_err();
        assert!(err.to_string().contains("GitHub token"));
    }

    #[test]
    fn test_unknown_source() {
        let err = resolve_targets(&["gitlab(group=x)"], None).unwrap_err();
        assert_eq!(err.to_string(), "unknown repository source gitlab");
    }
}
