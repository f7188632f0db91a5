//! # GitHub REST Client
//!
//! A blocking `reqwest` client for the handful of REST v3 endpoints the
//! engine needs. One client is shared by every repository task; it holds no
//! per-call state, so `&GitHubClient` is enough to use it from many threads.
//!
//! Every call goes through [`retry::with_retry`], so transient failures
//! (408, 429, 5xx, transport errors) are retried uniformly.

use super::retry::{self, AttemptError, RetryConfig};
use super::{
    Forge, MergeRequest, NewPullRequest, PullRequest, PullRequestEdit, SearchKind,
};
use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;
const USER_AGENT: &str = "repo-scribe";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: String,
    retry: RetryConfig,
    cancel: Cancellation,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: impl Into<String>, cancel: Cancellation) -> Result<Self> {
        Url::parse(api_url)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            retry: RetryConfig::default(),
            cancel,
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.api_url, path.trim_start_matches('/')))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Send one request (with retries) and return the response headers and body.
    fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<(HeaderMap, String)> {
        let what = format!("{} {}", method, url.path());
        retry::with_retry(&self.retry, &self.cancel, &what, || {
            debug!("{}", what);
            let mut request = self.http.request(method.clone(), url.clone());
            if !self.token.is_empty() {
                request = request.bearer_auth(&self.token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().map_err(|e| AttemptError::Transient {
                error: Error::Http(e),
                retry_after: None,
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            let text = response.text().map_err(|e| AttemptError::Transient {
                error: Error::Http(e),
                retry_after: None,
            })?;

            if status.is_success() {
                return Ok((headers, text));
            }
            let error = Error::GitHub {
                status: Some(status.as_u16()),
                message: error_message(&what, &text),
            };
            if retry::is_retryable_status(status.as_u16()) {
                Err(AttemptError::Transient {
                    error,
                    retry_after: retry_after(&headers),
                })
            } else {
                Err(AttemptError::Permanent(error))
            }
        })
    }

    fn json<T: DeserializeOwned>(&self, method: Method, url: Url, body: Option<&Value>) -> Result<T> {
        let (_, text) = self.send(method, url, body)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch every page of a list endpoint. `items` extracts the entries
    /// from one page's body.
    fn paginate<T, F>(&self, path: &str, query: &[(&str, String)], items: F) -> Result<Vec<T>>
    where
        F: Fn(&str) -> Result<Vec<T>>,
    {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let mut query = query.to_vec();
            query.push(("per_page", PER_PAGE.to_string()));
            query.push(("page", page.to_string()));
            let (headers, text) = self.send(Method::GET, self.url(path, &query)?, None)?;
            let batch = items(&text)?;
            let count = batch.len();
            all.extend(batch);
            if count < PER_PAGE || !has_next_page(&headers) {
                return Ok(all);
            }
            page += 1;
        }
    }
}

impl Forge for GitHubClient {
    fn find_pull_requests(&self, owner: &str, repo: &str, base: &str) -> Result<Vec<PullRequest>> {
        let query = [("state", "open".to_string()), ("base", base.to_string())];
        self.paginate(&format!("repos/{}/{}/pulls", owner, repo), &query, |text| {
            let payload: Vec<PullRequestPayload> = serde_json::from_str(text)?;
            Ok(payload.into_iter().map(PullRequest::from).collect())
        })
    }

    fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        new: &NewPullRequest,
    ) -> Result<PullRequest> {
        let body = json!({
            "title": new.title,
            "body": new.body,
            "head": new.head,
            "base": new.base,
            "draft": new.draft,
        });
        let url = self.url(&format!("repos/{}/{}/pulls", owner, repo), &[])?;
        let payload: PullRequestPayload = self.json(Method::POST, url, Some(&body))?;
        Ok(payload.into())
    }

    fn edit_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        edit: &PullRequestEdit,
    ) -> Result<PullRequest> {
        let mut body = serde_json::Map::new();
        if let Some(title) = &edit.title {
            body.insert("title".to_string(), json!(title));
        }
        if let Some(text) = &edit.body {
            body.insert("body".to_string(), json!(text));
        }
        let url = self.url(&format!("repos/{}/{}/pulls/{}", owner, repo, number), &[])?;
        let payload: PullRequestPayload =
            self.json(Method::PATCH, url, Some(&Value::Object(body)))?;
        Ok(payload.into())
    }

    fn add_labels(&self, owner: &str, repo: &str, number: u64, labels: &[String]) -> Result<()> {
        let url = self.url(&format!("repos/{}/{}/issues/{}/labels", owner, repo, number), &[])?;
        self.send(Method::POST, url, Some(&json!({ "labels": labels })))?;
        Ok(())
    }

    fn add_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<()> {
        let url = self.url(
            &format!("repos/{}/{}/issues/{}/comments", owner, repo, number),
            &[],
        )?;
        self.send(Method::POST, url, Some(&json!({ "body": body })))?;
        Ok(())
    }

    fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest> {
        let url = self.url(&format!("repos/{}/{}/pulls/{}", owner, repo, number), &[])?;
        let payload: PullRequestPayload = self.json(Method::GET, url, None)?;
        Ok(payload.into())
    }

    fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        merge: &MergeRequest,
    ) -> Result<()> {
        let mut body = serde_json::Map::new();
        body.insert("merge_method".to_string(), json!(merge.method.as_str()));
        if let Some(title) = &merge.commit_title {
            body.insert("commit_title".to_string(), json!(title));
        }
        if let Some(message) = &merge.commit_message {
            body.insert("commit_message".to_string(), json!(message));
        }
        if let Some(sha) = &merge.sha {
            body.insert("sha".to_string(), json!(sha));
        }
        let url = self.url(&format!("repos/{}/{}/pulls/{}/merge", owner, repo, number), &[])?;
        let result: MergePayload = self.json(Method::PUT, url, Some(&Value::Object(body)))?;
        if !result.merged {
            return Err(Error::GitHub {
                status: None,
                message: format!("pull request #{} was not merged: {}", number, result.message),
            });
        }
        Ok(())
    }

    fn search_repositories(&self, query: &str, kind: SearchKind) -> Result<Vec<(String, String)>> {
        let query = [("q", query.to_string())];
        match kind {
            SearchKind::Repositories => self.paginate("search/repositories", &query, |text| {
                let page: SearchPage<RepositoryPayload> = serde_json::from_str(text)?;
                Ok(page.items.into_iter().map(RepositoryPayload::into_pair).collect())
            }),
            SearchKind::Code => self.paginate("search/code", &query, |text| {
                let page: SearchPage<CodeResultPayload> = serde_json::from_str(text)?;
                Ok(page
                    .items
                    .into_iter()
                    .map(|item| item.repository.into_pair())
                    .collect())
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
    html_url: String,
    #[serde(default)]
    node_id: String,
    #[serde(default)]
    title: String,
    body: Option<String>,
    #[serde(default)]
    draft: bool,
    head: RefPayload,
    #[serde(default)]
    labels: Vec<LabelPayload>,
    #[serde(default)]
    mergeable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RefPayload {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct LabelPayload {
    name: String,
}

impl From<PullRequestPayload> for PullRequest {
    fn from(p: PullRequestPayload) -> Self {
        PullRequest {
            number: p.number,
            url: p.html_url,
            node_id: p.node_id,
            title: p.title,
            body: p.body.unwrap_or_default(),
            head_ref: p.head.ref_name,
            head_sha: p.head.sha,
            labels: p.labels.into_iter().map(|l| l.name).collect(),
            draft: p.draft,
            mergeable: p.mergeable,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MergePayload {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name: String,
    owner: OwnerPayload,
}

impl RepositoryPayload {
    fn into_pair(self) -> (String, String) {
        (self.owner.login, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct CodeResultPayload {
    repository: RepositoryPayload,
}

/// Prefer GitHub's `message` field; fall back to the raw body.
fn error_message(what: &str, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    format!("{}: {}", what, detail)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|part| part.contains("rel=\"next\"")))
}
