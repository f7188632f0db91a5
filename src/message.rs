//! # Commit and Pull Request Text
//!
//! Builds the commit message and pull request title/body for one repository
//! run from the configured templates and the descriptions of the update
//! operations that changed something.
//!
//! Configured texts may use `{owner}`, `{name}`, `{repo}` (the full
//! `owner/name`) and `{branch}`. When no title is configured, a single
//! operation's title is used, otherwise `Apply <n> updates`. The default body
//! lists every operation title followed by each operation's body.

use crate::options::UpdateOptions;
use crate::updater::Description;

/// Line separating the footer from the rest of a message.
pub const FOOTER_SEPARATOR: &str = "-- ";

/// Values substituted into configured texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub owner: String,
    pub name: String,
    pub branch: String,
}

impl Placeholders {
    pub fn expand(&self, template: &str) -> String {
        template
            .replace("{owner}", &self.owner)
            .replace("{name}", &self.name)
            .replace("{repo}", &format!("{}/{}", self.owner, self.name))
            .replace("{branch}", &self.branch)
    }
}

/// Composed texts for one repository run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texts {
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
}

/// How configured text is combined with an existing pull request's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Ignore,
    Replace,
    Prepend,
    Append,
}

impl TextMode {
    /// The new value for a field currently holding `existing`, or `None`
    /// when the field should not be touched. Empty configured text never
    /// blanks out existing content.
    pub fn merge(self, existing: &str, configured: &str) -> Option<String> {
        if configured.trim().is_empty() {
            return None;
        }
        let merged = match self {
            TextMode::Ignore => return None,
            TextMode::Replace => configured.to_string(),
            TextMode::Append if existing.trim().is_empty() => configured.to_string(),
            TextMode::Prepend if existing.trim().is_empty() => configured.to_string(),
            TextMode::Append => {
                if existing.contains(configured) {
                    return None;
                }
                format!("{}\n\n{}", existing.trim_end(), configured)
            }
            TextMode::Prepend => {
                if existing.contains(configured) {
                    return None;
                }
                format!("{}\n\n{}", configured, existing.trim_start())
            }
        };
        (merged != existing).then_some(merged)
    }

    /// Titles are single-line: append and prepend replace them.
    pub fn merge_title(self, existing: &str, configured: &str) -> Option<String> {
        match self {
            TextMode::Ignore => None,
            _ => TextMode::Replace.merge(existing, configured),
        }
    }
}

/// Build all texts for a run.
pub fn compose(
    options: &UpdateOptions,
    descriptions: &[Description],
    placeholders: &Placeholders,
) -> Texts {
    let configured = |text: &Option<String>| {
        text.as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| placeholders.expand(t))
    };

    let commit_title = configured(&options.git.commit_title)
        .unwrap_or_else(|| default_title(descriptions));
    let commit_body =
        configured(&options.git.commit_body).unwrap_or_else(|| default_body(descriptions));
    let footer = configured(&options.git.commit_footer);

    let pr_title = configured(&options.pull_request.title).unwrap_or_else(|| commit_title.clone());
    let pr_body = configured(&options.pull_request.body).unwrap_or_else(|| commit_body.clone());

    Texts {
        commit_message: join(&[&commit_title, &commit_body], footer.as_deref()),
        pr_title,
        pr_body: join(&[&pr_body], footer.as_deref()),
    }
}

fn default_title(descriptions: &[Description]) -> String {
    match descriptions {
        [only] => only.title.clone(),
        many => format!("Apply {} updates", many.len()),
    }
}

fn default_body(descriptions: &[Description]) -> String {
    let list = descriptions
        .iter()
        .map(|d| format!("- {}", d.title))
        .collect::<Vec<_>>()
        .join("\n");
    let bodies = descriptions
        .iter()
        .map(|d| d.body.trim())
        .filter(|b| !b.is_empty());
    std::iter::once(list.as_str())
        .chain(bodies)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Blank-line separated parts, then the footer after a `-- ` line.
fn join(parts: &[&str], footer: Option<&str>) -> String {
    let mut text = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    if let Some(footer) = footer {
        text.push_str("\n\n");
        text.push_str(FOOTER_SEPARATOR);
        text.push('\n');
        text.push_str(footer.trim());
    }
    text
}
