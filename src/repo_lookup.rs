// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Repository metadata for projects linked to a GitHub repository.
//!
//! Read-only. Failures come back as [`LookupError`] values; callers show
//! an "unavailable" indicator instead of blocking on them.
//!
//! ```text
//! GET /repos/{owner}/{repo}                    → default branch, issues, pushed_at
//! GET /repos/{owner}/{repo}/commits?per_page=5 → recent commits
//! GET /repos/{owner}/{repo}/branches/{branch}  → head commit of the branch
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::SyncConfig;
use crate::model::GithubMetadata;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("not a GitHub repository URL: {0}")]
    InvalidUrl(String),
    #[error("repository service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("repository service unreachable: {0}")]
    Transport(String),
    #[error("unexpected repository service response: {0}")]
    Decode(String),
}

/// `owner/repo` pair extracted from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Extract owner and repository from a URL of the form `…github.com/owner/repo…`.
///
/// ```
/// use mindtrail_sync::repo_lookup::parse_repo_url;
///
/// let r = parse_repo_url("https://github.com/rust-lang/cargo.git").unwrap();
/// assert_eq!(r.full_name(), "rust-lang/cargo");
/// assert!(parse_repo_url("https://gitlab.com/a/b").is_err());
/// ```
pub fn parse_repo_url(url: &str) -> Result<RepoRef, LookupError> {
    let invalid = || LookupError::InvalidUrl(url.to_string());
    let (_, path) = url.split_once("github.com/").ok_or_else(invalid)?;
    let mut segments = path.split('/');
    let owner = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let repo = segments
        .next()
        .map(|s| s.split(['?', '#']).next().unwrap_or(s))
        .map(|s| s.strip_suffix(".git").unwrap_or(s))
        .filter(|s| !s.is_empty())
        .ok_or_else(invalid)?;
    Ok(RepoRef { owner: owner.to_string(), repo: repo.to_string() })
}

/// One entry of a repository's recent history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    /// First line of the commit message
    pub message: String,
    pub author: Option<String>,
    pub committed_at: Option<DateTime<Utc>>,
}

/// Repository descriptor shown next to a linked project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDetails {
    pub full_name: String,
    pub default_branch: String,
    pub open_issues_count: u64,
    pub pushed_at: Option<DateTime<Utc>>,
    /// Most recent first
    pub commits: Vec<CommitSummary>,
}

/// Read-only repository metadata service.
#[async_trait]
pub trait RepoLookup: Send + Sync {
    /// Descriptor plus recent commits.
    async fn repo_details(&self, token: &str, repo_url: &str) -> Result<RepoDetails, LookupError>;

    /// Head commit of the default branch.
    async fn latest_commit(&self, token: &str, repo_url: &str) -> Result<GithubMetadata, LookupError>;
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    full_name: String,
    default_branch: String,
    #[serde(default)]
    open_issues_count: u64,
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitBody,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

impl From<CommitResponse> for CommitSummary {
    fn from(c: CommitResponse) -> Self {
        let (author, committed_at) = match c.commit.author {
            Some(a) => (a.name, a.date),
            None => (None, None),
        };
        Self {
            sha: c.sha,
            message: c.commit.message.lines().next().unwrap_or_default().to_string(),
            author,
            committed_at,
        }
    }
}

/// GitHub REST implementation.
pub struct GithubLookup {
    client: Client,
    api_url: String,
    commit_limit: usize,
}

impl GithubLookup {
    pub fn new(api_url: impl Into<String>, commit_limit: usize) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            commit_limit,
        }
    }

    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.github_api_url.clone(), config.recent_commit_limit)
    }

    async fn get<R: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, LookupError> {
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .query(query)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", concat!("mindtrail-sync/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, LookupError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| LookupError::Transport(e.to_string()))?;
    if !status.is_success() {
        debug!(status = status.as_u16(), body = %body, "Repository service rejected request");
        return Err(LookupError::Status { status: status.as_u16(), message: body });
    }
    serde_json::from_str(&body).map_err(|e| LookupError::Decode(e.to_string()))
}

#[async_trait]
impl RepoLookup for GithubLookup {
    async fn repo_details(&self, token: &str, repo_url: &str) -> Result<RepoDetails, LookupError> {
        let r = parse_repo_url(repo_url)?;
        let repo_path = format!("/repos/{}/{}", r.owner, r.repo);
        let commits_path = format!("{repo_path}/commits");
        let per_page = [("per_page", self.commit_limit.to_string())];

        let (repo, commits) = tokio::try_join!(
            self.get::<RepoResponse>(token, &repo_path, &[]),
            self.get::<Vec<CommitResponse>>(token, &commits_path, &per_page),
        )?;

        Ok(RepoDetails {
            full_name: repo.full_name,
            default_branch: repo.default_branch,
            open_issues_count: repo.open_issues_count,
            pushed_at: repo.pushed_at,
            commits: commits.into_iter().map(CommitSummary::from).collect(),
        })
    }

    async fn latest_commit(&self, token: &str, repo_url: &str) -> Result<GithubMetadata, LookupError> {
        let r = parse_repo_url(repo_url)?;
        let repo_path = format!("/repos/{}/{}", r.owner, r.repo);

        let repo: RepoResponse = self.get(token, &repo_path, &[]).await?;
        let branch: BranchResponse = self
            .get(token, &format!("{repo_path}/branches/{}", repo.default_branch), &[])
            .await?;

        Ok(GithubMetadata {
            repo: r.full_name(),
            branch: repo.default_branch,
            commit: branch.commit.sha,
        })
    }
}
