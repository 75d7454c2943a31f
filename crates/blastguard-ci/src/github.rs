//! Review comments on GitHub pull requests.
//!
//! Only used in CI mode, only when the run is blocked, and only when a token
//! is available. Each pull request gets one comment, found again by a hidden
//! marker and edited on later runs. A failed post is logged and never changes
//! the exit code.

use std::path::Path;
use std::time::Duration;

use blastguard_core::{RunContext, RunResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

const COMMENT_MARKER: &str = "<!-- blastguard -->";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const COMMENTS_PER_PAGE: u32 = 100;

/// Errors that can occur while posting a review comment
#[derive(Error, Debug)]
pub enum CommentError {
    /// Pull-request context could not be determined from the environment
    #[error("pull request context unavailable: {0}")]
    MissingContext(String),

    /// Connection or TLS failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// GitHub answered with a non-success status
    #[error("GitHub API returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// IO error reading the event payload
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CommentError {
    fn from(err: reqwest::Error) -> Self {
        CommentError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CommentError>;

/// `owner/repo#number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// Resolve from `GITHUB_REPOSITORY` plus `BLASTGUARD_PR_NUMBER`, or the
    /// `pull_request.number` in the event payload at `GITHUB_EVENT_PATH`.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let repository = lookup("GITHUB_REPOSITORY")
            .ok_or_else(|| CommentError::MissingContext("GITHUB_REPOSITORY is not set".into()))?;
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty())
            .ok_or_else(|| {
                CommentError::MissingContext(format!("malformed GITHUB_REPOSITORY: {repository}"))
            })?;

        let number = match lookup("BLASTGUARD_PR_NUMBER") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                CommentError::MissingContext(format!("BLASTGUARD_PR_NUMBER is not a number: {raw}"))
            })?,
            None => {
                let path = lookup("GITHUB_EVENT_PATH").ok_or_else(|| {
                    CommentError::MissingContext(
                        "neither BLASTGUARD_PR_NUMBER nor GITHUB_EVENT_PATH is set".into(),
                    )
                })?;
                pr_number_from_event(Path::new(&path))?
            }
        };

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

fn pr_number_from_event(path: &Path) -> Result<u64> {
    let payload: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    payload
        .pointer("/pull_request/number")
        .or_else(|| payload.pointer("/number"))
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            CommentError::MissingContext(format!(
                "{} has no pull_request.number (not a pull_request event?)",
                path.display()
            ))
        })
}

/// Minimal client for the issue-comments endpoint.
pub struct GitHubCommenter {
    api_base: String,
    token: String,
    http_client: reqwest::Client,
}

impl GitHubCommenter {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("blastguard/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            http_client,
        })
    }

    /// Point at GitHub Enterprise (`GITHUB_API_URL`) or a test server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Create or refresh the run's comment on `pr`. An earlier comment
    /// carrying the marker is edited in place so a pull request holds at
    /// most one BlastGuard comment.
    pub async fn upsert(&self, pr: &PullRequestRef, body: &str) -> Result<(u64, bool)> {
        let body = format!("{body}\n{COMMENT_MARKER}\n");
        match self.find_marked(pr).await? {
            Some(id) => {
                self.update(pr, id, &body).await?;
                Ok((id, true))
            }
            None => Ok((self.create(pr, &body).await?, false)),
        }
    }

    /// Id of the first comment on `pr` carrying the marker, if any.
    pub async fn find_marked(&self, pr: &PullRequestRef) -> Result<Option<u64>> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments?per_page={COMMENTS_PER_PAGE}",
            self.api_base, pr.owner, pr.repo, pr.number
        );
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let comments: Vec<Value> = check_status(response).await?.json().await?;
        Ok(select_marked_comment(&comments))
    }

    async fn create(&self, pr: &PullRequestRef, body: &str) -> Result<u64> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base, pr.owner, pr.repo, pr.number
        );
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&json!({ "body": body }))
            .send()
            .await?;

        let created: Value = check_status(response).await?.json().await?;
        Ok(created.get("id").and_then(Value::as_u64).unwrap_or_default())
    }

    async fn update(&self, pr: &PullRequestRef, id: u64, body: &str) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/issues/comments/{id}",
            self.api_base, pr.owner, pr.repo
        );
        let response = self
            .http_client
            .patch(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&json!({ "body": body }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CommentError::Status {
        code: status.as_u16(),
        body: body.chars().take(320).collect(),
    })
}

/// First comment in `comments` (GitHub's issue-comment objects) whose body
/// carries the marker.
pub fn select_marked_comment(comments: &[Value]) -> Option<u64> {
    comments
        .iter()
        .filter(|c| {
            c.get("body")
                .and_then(Value::as_str)
                .is_some_and(|b| b.contains(COMMENT_MARKER))
        })
        .find_map(|c| c.get("id").and_then(Value::as_u64))
}

/// What happened to the review comment for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentStatus {
    NotCi,
    NotBlocked,
    NoToken,
    Posted { pr: PullRequestRef, comment_id: u64 },
    Updated { pr: PullRequestRef, comment_id: u64 },
    Failed(String),
}

/// Post the report when the run is blocked in CI and a token exists.
/// Never fails: problems are logged and reported as `Failed`.
pub async fn publish_report(
    result: &RunResult,
    context: &RunContext,
    lookup: impl Fn(&str) -> Option<String>,
) -> CommentStatus {
    if !context.is_ci() {
        return CommentStatus::NotCi;
    }
    if !result.blocked() {
        return CommentStatus::NotBlocked;
    }
    let Some(token) = lookup(TOKEN_ENV_VAR).filter(|t| !t.trim().is_empty()) else {
        info!(event = "comment.skipped", "no GITHUB_TOKEN, not posting review comment");
        return CommentStatus::NoToken;
    };

    let outcome = async {
        let pr = PullRequestRef::from_env(&lookup)?;
        let mut commenter = GitHubCommenter::new(token)?;
        if let Some(api_base) = lookup("GITHUB_API_URL") {
            commenter = commenter.with_api_base(api_base);
        }
        let (comment_id, updated) = commenter.upsert(&pr, &result.report).await?;
        Ok::<_, CommentError>((pr, comment_id, updated))
    }
    .await;

    match outcome {
        Ok((pr, comment_id, true)) => {
            info!(event = "comment.updated", pr = %pr, comment_id);
            CommentStatus::Updated { pr, comment_id }
        }
        Ok((pr, comment_id, false)) => {
            info!(event = "comment.posted", pr = %pr, comment_id);
            CommentStatus::Posted { pr, comment_id }
        }
        Err(e) => {
            warn!(event = "comment.failed", error = %e, "could not post review comment");
            CommentStatus::Failed(e.to_string())
        }
    }
}
