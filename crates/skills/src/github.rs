//! The two GitHub endpoints skill discovery needs: the recursive tree
//! listing (rate limited) and raw file content (not rate limited).

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{StatusCode, header::HeaderMap},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    skillhub_config::SkillhubConfig,
    tracing::debug,
};

use crate::error::{Error, Result};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
const USER_AGENT: &str = concat!("skillhub/", env!("CARGO_PKG_VERSION"));

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    Blob,
    Tree,
    /// Submodule pointer.
    Commit,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.kind == TreeEntryKind::Blob
    }
}

/// Rate-limit headers attached to a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: u32,
    /// Unix time at which the window resets.
    pub reset: u64,
}

/// A repository's full file tree at one ref.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeListing {
    pub entries: Vec<TreeEntry>,
    /// The server hit its size cap and returned a partial tree.
    pub truncated: bool,
    pub rate_limit: Option<RateLimit>,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

/// Read-only access to repository content.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Recursive file listing of `owner/repo` at `reference`.
    async fn list_tree(&self, owner: &str, repo: &str, reference: &str) -> Result<TreeListing>;

    /// Raw bytes of one file.
    async fn fetch_raw(&self, owner: &str, repo: &str, reference: &str, path: &str)
    -> Result<Vec<u8>>;
}

/// [`GitHubApi`] over HTTPS.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    raw_base: String,
    token: Option<Secret<String>>,
}

impl GitHubClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_base: DEFAULT_API_BASE.into(),
            raw_base: DEFAULT_RAW_BASE.into(),
            token: None,
        }
    }

    /// Build from config: base URLs and the token (config value or `GITHUB_TOKEN`).
    pub fn from_config(config: &SkillhubConfig) -> Self {
        let client = Self::new().with_base_urls(&config.api_base_url, &config.raw_base_url);
        match config.resolved_github_token() {
            Some(token) => client.with_token(token),
            None => client,
        }
    }

    pub fn with_token(mut self, token: Secret<String>) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_base_urls(mut self, api_base: &str, raw_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.raw_base = raw_base.trim_end_matches('/').to_string();
        self
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn list_tree(&self, owner: &str, repo: &str, reference: &str) -> Result<TreeListing> {
        let url = format!(
            "{}/repos/{owner}/{repo}/git/trees/{reference}?recursive=1",
            self.api_base
        );
        debug!(%url, "fetching tree listing");

        let resp = self
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let status = resp.status();
        let rate_limit = parse_rate_limit(resp.headers());

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                resource: format!("repository or branch {owner}/{repo}@{reference}"),
            });
        }
        if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
            && let Some(limit) = rate_limit
            && limit.remaining == 0
        {
            return Err(Error::RateLimited { reset: limit.reset });
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url,
            });
        }

        let body: TreeResponse = resp.json().await?;
        Ok(TreeListing {
            entries: body.tree,
            truncated: body.truncated,
            rate_limit,
        })
    }

    async fn fetch_raw(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<Vec<u8>> {
        let url = format!("{}/{owner}/{repo}/{reference}/{path}", self.raw_base);
        debug!(%url, "fetching raw file");

        let resp = self.get(&url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                resource: format!("file {path} in {owner}/{repo}@{reference}"),
            });
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url,
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimit> {
    let header = |name: &str| headers.get(name)?.to_str().ok()?.trim().parse::<u64>().ok();
    let remaining = header("x-ratelimit-remaining")?;
    Some(RateLimit {
        remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
        reset: header("x-ratelimit-reset").unwrap_or_default(),
    })
}
