//! `helm` updater: bump a chart dependency's version in `Chart.yaml`.
//!
//! Only the matched `version:` scalars are rewritten; comments and the rest
//! of the chart keep their text.

use super::{files, yaml_edit, Description};
use crate::error::{Error, Result};
use crate::params::{self, Params};
use crate::valuer::ValueSource;
use log::{info, warn};
use serde_yaml::Value;
use std::path::Path;

const DEFAULT_FILE: &str = "Chart.yaml";

/// Sets `dependencies[].version` for every dependency named `dependency`
/// (and, if given, whose `repository` matches) in the files matching `file`.
#[derive(Debug, Clone)]
pub struct HelmUpdater {
    file: String,
    dependency: String,
    repository: Option<String>,
    value: ValueSource,
}

impl HelmUpdater {
    pub fn new(params: &Params, value: ValueSource) -> Result<Self> {
        Ok(Self {
            file: params
                .get("file")
                .filter(|f| !f.is_empty())
                .cloned()
                .unwrap_or_else(|| DEFAULT_FILE.to_string()),
            dependency: params::required(params, "dependency")?.to_string(),
            repository: params.get("repository").filter(|r| !r.is_empty()).cloned(),
            value,
        })
    }

    pub fn apply(&self, working_copy: &Path) -> Result<bool> {
        let version = self
            .value
            .resolve(working_copy)
            .map_err(|e| Error::updater("helm", e.to_string()))?;
        let mut changed = false;
        let mut found = false;

        for path in files::require_matches(working_copy, &self.file, "helm")? {
            changed |= yaml_edit::update_file(&path, "helm", |chart, _| {
                let Some(dependencies) = chart
                    .get_mut("dependencies")
                    .and_then(Value::as_sequence_mut)
                else {
                    return Ok(false);
                };

                let mut chart_changed = false;
                for dependency in dependencies.iter_mut() {
                    if !self.matches(dependency) {
                        continue;
                    }
                    found = true;
                    let current = dependency.get("version").and_then(version_text);
                    if current.as_deref() == Some(version.as_str()) {
                        continue;
                    }
                    if let Some(current) = &current {
                        info!(
                            "{}: {} {} -> {}{}",
                            path.display(),
                            self.dependency,
                            current,
                            version,
                            direction(current, &version)
                        );
                    }
                    if let Some(map) = dependency.as_mapping_mut() {
                        map.insert(
                            Value::String("version".to_string()),
                            Value::String(version.clone()),
                        );
                        chart_changed = true;
                    }
                }
                Ok(chart_changed)
            })?;
        }

        if !found {
            warn!(
                "no dependency {} found in files matching {}",
                self.dependency, self.file
            );
        }
        Ok(changed)
    }

    pub fn describe(&self) -> Description {
        let mut body = format!(
            "Set the version of chart dependency `{}` to `{}` in `{}`",
            self.dependency,
            self.value.describe(),
            self.file
        );
        if let Some(repository) = &self.repository {
            body.push_str(&format!(" (repository `{}`)", repository));
        }
        body.push('.');
        Description {
            title: format!("Bump {} to {}", self.dependency, self.value.describe()),
            body,
        }
    }

    fn matches(&self, dependency: &Value) -> bool {
        let field = |key: &str| dependency.get(key).and_then(Value::as_str);
        if field("name") != Some(self.dependency.as_str()) {
            return false;
        }
        match &self.repository {
            Some(repository) => {
                field("repository").map(|r| r.trim_end_matches('/'))
                    == Some(repository.trim_end_matches('/'))
            }
            None => true,
        }
    }
}

/// Versions may be written unquoted, in which case YAML reads `1.2` as a number.
fn version_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// " (upgrade)" or " (downgrade)" when both sides are semantic versions.
fn direction(from: &str, to: &str) -> &'static str {
    let parse = |v: &str| semver::Version::parse(v.trim_start_matches('v')).ok();
    match (parse(from), parse(to)) {
        (Some(from), Some(to)) if to > from => " (upgrade)",
        (Some(from), Some(to)) if to < from => " (downgrade)",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse_params;
    use std::fs;
    use tempfile::TempDir;

    const CHART: &str = "\
apiVersion: v2
name: app
version: 0.1.0
dependencies:
- name: my-chart
  version: 1.0.0
  repository: https://charts.example.com
- name: other
  version: 3.0.0
  repository: https://charts.example.com
";

    fn updater(list: &str, version: &str) -> HelmUpdater {
        HelmUpdater::new(
            &parse_params(list).unwrap(),
            ValueSource::Literal(version.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_dependency() {
        assert!(HelmUpdater::new(
            &parse_params("file=Chart.yaml").unwrap(),
            ValueSource::Literal("1".into())
        )
        .is_err());
    }

    #[test]
    fn test_bumps_only_named_dependency() {
        let temp = TempDir::new().unwrap();
        let chart = temp.path().join("Chart.yaml");
        fs::write(&chart, CHART).unwrap();

        let updater = updater("dependency=my-chart", "2.0.0");
        assert!(updater.apply(temp.path()).unwrap());

        let content = fs::read_to_string(&chart).unwrap();
        assert!(content.contains("- name: my-chart\n  version: 2.0.0\n"));
        assert!(content.contains("- name: other\n  version: 3.0.0\n"));

        assert!(!updater.apply(temp.path()).unwrap());
        assert_eq!(fs::read_to_string(&chart).unwrap(), content);
    }

    #[test]
    fn test_repository_filter() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Chart.yaml"), CHART).unwrap();

        let miss = updater(
            "dependency=my-chart,repository=https://elsewhere.example.com",
            "2.0.0",
        );
        assert!(!miss.apply(temp.path()).unwrap());

        let hit = updater(
            "dependency=my-chart,repository='https://charts.example.com/'",
            "2.0.0",
        );
        assert!(hit.apply(temp.path()).unwrap());
    }

    #[test]
    fn test_missing_dependency_is_no_change() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Chart.yaml"), CHART).unwrap();
        assert!(!updater("dependency=absent", "2.0.0")
            .apply(temp.path())
            .unwrap());
    }

    #[test]
    fn test_custom_file_glob() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("charts/api")).unwrap();
        fs::write(temp.path().join("charts/api/Chart.yaml"), CHART).unwrap();

        let updater = updater("file='charts/*/Chart.yaml',dependency=other", "3.1.0");
        assert!(updater.apply(temp.path()).unwrap());
    }

    #[test]
    fn test_no_chart_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(updater("dependency=my-chart", "2.0.0")
            .apply(temp.path())
            .is_err());
    }

    const COMMENTED_CHART: &str = "\
# Chart maintained by team X
apiVersion: v2
name: app
version: 0.1.0
dependencies:
  # cache
  - name: redis
    version: 1.0.0 # pinned
    repository: https://charts.example.com
  - name: other
    version: \"3.0.0\"
    repository: https://charts.example.com
";

    #[test]
    fn test_keeps_comments_and_indentation() {
        let temp = TempDir::new().unwrap();
        let chart = temp.path().join("Chart.yaml");
        fs::write(&chart, COMMENTED_CHART).unwrap();

        assert!(updater("dependency=redis", "2.0.0")
            .apply(temp.path())
            .unwrap());
        assert_eq!(
            fs::read_to_string(&chart).unwrap(),
            COMMENTED_CHART.replace("version: 1.0.0 # pinned", "version: 2.0.0 # pinned")
        );

        assert!(updater("dependency=other", "3.1.0")
            .apply(temp.path())
            .unwrap());
        assert!(fs::read_to_string(&chart)
            .unwrap()
            .contains("  - name: other\n    version: \"3.1.0\"\n"));
    }

    #[test]
    fn test_multi_document_chart_file() {
        let temp = TempDir::new().unwrap();
        let chart = temp.path().join("Chart.yaml");
        let content = format!("{}---\n{}", COMMENTED_CHART, CHART);
        fs::write(&chart, &content).unwrap();

        assert!(updater("dependency=other", "4.0.0")
            .apply(temp.path())
            .unwrap());
        assert_eq!(
            fs::read_to_string(&chart).unwrap(),
            content
                .replace("version: \"3.0.0\"", "version: \"4.0.0\"")
                .replace("version: 3.0.0\n", "version: 4.0.0\n")
        );
    }

    #[test]
    fn test_missing_version_in_commented_chart_is_refused() {
        let temp = TempDir::new().unwrap();
        let chart = temp.path().join("Chart.yaml");
        let content = "# app\ndependencies:\n- name: redis\n  repository: https://x\n";
        fs::write(&chart, content).unwrap();

        let err = updater("dependency=redis", "2.0.0")
            .apply(temp.path())
            .unwrap_err();
        assert!(err.to_string().contains("cannot edit in place"));
        assert_eq!(fs::read_to_string(&chart).unwrap(), content);
    }

    #[test]
    fn test_numeric_version_compares_as_text() {
        assert_eq!(version_text(&Value::Number(2.into())), Some("2".to_string()));
    }

    #[test]
    fn test_direction() {
        assert_eq!(direction("1.0.0", "2.0.0"), " (upgrade)");
        assert_eq!(direction("v2.0.0", "1.9.9"), " (downgrade)");
        assert_eq!(direction("1.0.0", "1.0.0"), "");
        assert_eq!(direction("latest", "2.0.0"), "");
    }

    #[test]
    fn test_describe() {
        let description = updater("dependency=my-chart", "2.0.0").describe();
        assert_eq!(description.title, "Bump my-chart to 2.0.0");
        assert!(description.body.contains("Chart.yaml"));
    }
}
