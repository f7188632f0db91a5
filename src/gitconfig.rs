//! # Git Identity Resolution
//!
//! Commits need an author and a committer. Each of the four fields (author
//! name/email, committer name/email) is resolved independently by trying, in
//! order:
//!
//! 1. the explicit command-line flag,
//! 2. the `GIT_AUTHOR_*` / `GIT_COMMITTER_*` environment variable,
//! 3. the working copy's `.git/config`,
//! 4. the global `~/.gitconfig`,
//! 5. the XDG `$XDG_CONFIG_HOME/git/config` (or `~/.config/git/config`),
//! 6. the system `/etc/gitconfig`.
//!
//! The first non-empty value wins. A committer field that is still empty
//! afterwards takes the author's value.

use crate::error::{Error, Result};
use ini::Ini;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// A resolved name/email pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Identity fields given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Author,
    Committer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Email,
}

impl Role {
    fn env_var(self, field: Field) -> &'static str {
        match (self, field) {
            (Role::Author, Field::Name) => "GIT_AUTHOR_NAME",
            (Role::Author, Field::Email) => "GIT_AUTHOR_EMAIL",
            (Role::Committer, Field::Name) => "GIT_COMMITTER_NAME",
            (Role::Committer, Field::Email) => "GIT_COMMITTER_EMAIL",
        }
    }
}

impl Field {
    fn config_key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
        }
    }
}

/// Git config files in lookup order: local, global, XDG, system.
pub fn config_files(working_copy: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(wc) = working_copy {
        files.push(wc.join(".git").join("config"));
    }
    if let Some(home) = dirs::home_dir() {
        files.push(home.join(".gitconfig"));
    }
    let xdg = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")));
    if let Some(xdg) = xdg {
        files.push(xdg.join("git").join("config"));
    }
    files.push(PathBuf::from("/etc/gitconfig"));
    files
}

/// Look up `section.key` in one git config file's contents.
///
/// Section and key names are case-insensitive; a later assignment overrides
/// an earlier one, as in git.
pub fn lookup(content: &str, section: &str, key: &str) -> Option<String> {
    let ini = Ini::load_from_str(content).ok()?;
    let mut found = None;
    for (name, properties) in ini.iter() {
        if !name.is_some_and(|n| n.trim().eq_ignore_ascii_case(section)) {
            continue;
        }
        for (k, v) in properties.iter() {
            if k.trim().eq_ignore_ascii_case(key) {
                found = Some(v.trim().to_string());
            }
        }
    }
    found
}

/// First value of `section.key` across `files`, skipping unreadable files.
pub fn config_value(files: &[PathBuf], section: &str, key: &str) -> Option<String> {
    files.iter().find_map(|file| {
        let content = fs::read_to_string(file).ok()?;
        lookup(&content, section, key).filter(|v| !v.is_empty())
    })
}

type Resolver<'a> = Box<dyn Fn(Role, Field) -> Option<String> + 'a>;

/// Resolves author and committer identities for one working copy.
pub struct IdentityResolver {
    files: Vec<PathBuf>,
    use_env: bool,
}

impl IdentityResolver {
    /// Full chain for a cloned working copy.
    pub fn for_working_copy(working_copy: &Path) -> Self {
        Self {
            files: config_files(Some(working_copy)),
            use_env: true,
        }
    }

    /// Flags and the given files only. Used by tests.
    pub fn with_files(files: Vec<PathBuf>, use_env: bool) -> Self {
        Self { files, use_env }
    }

    /// Returns `(author, committer)`.
    pub fn resolve(
        &self,
        author: &PartialIdentity,
        committer: &PartialIdentity,
    ) -> Result<(Identity, Identity)> {
        let flag = |role: Role, field: Field| {
            let given = match role {
                Role::Author => author,
                Role::Committer => committer,
            };
            match field {
                Field::Name => given.name.clone(),
                Field::Email => given.email.clone(),
            }
        };
        let mut resolvers: Vec<Resolver<'_>> = vec![Box::new(flag)];
        if self.use_env {
            resolvers.push(Box::new(|role: Role, field: Field| {
                std::env::var(role.env_var(field)).ok()
            }));
        }
        for file in &self.files {
            resolvers.push(Box::new(move |_: Role, field: Field| {
                config_value(std::slice::from_ref(file), "user", field.config_key())
            }));
        }

        let resolve = |role: Role, field: Field| -> String {
            resolvers
                .iter()
                .filter_map(|r| r(role, field))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
                .unwrap_or_default()
        };

        let author = Identity {
            name: resolve(Role::Author, Field::Name),
            email: resolve(Role::Author, Field::Email),
        };
        if author.name.is_empty() || author.email.is_empty() {
            return Err(Error::Config {
                message: "no git author identity; set --git-author-name and --git-author-email \
                          or user.name and user.email in git config"
                    .to_string(),
            });
        }
        let mut committer = Identity {
            name: resolve(Role::Committer, Field::Name),
            email: resolve(Role::Committer, Field::Email),
        };
        if committer.name.is_empty() {
            committer.name = author.name.clone();
        }
        if committer.email.is_empty() {
            committer.email = author.email.clone();
        }
        debug!(
            "author {} <{}>, committer {} <{}>",
            author.name, author.email, committer.name, committer.email
        );
        Ok((author, committer))
    }
}
