//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Design
//!
//! This module implements the `Forge` trait for GitHub's git-data API:
//! refs, compare, trees, blobs, and commits under
//! `{api_base}/repos/{owner}/{repo}`. The compare endpoint is fetched with
//! the diff media type so the response body is the unified diff itself.
//!
//! # Authentication
//!
//! Credentials come from [`ForgeConfig`]: with a username configured,
//! requests use basic auth (username + password/token); without one, the
//! token is sent as a bearer token. Credentials are static for the life of
//! the forge — there is no refresh machinery, and 401/403 responses map to
//! `ForgeError::AuthFailed` for the caller to handle.
//!
//! # Enterprise
//!
//! Self-hosted installations live at a different path prefix (e.g.
//! `https://gh.internal.com/api/v3`). The base URL is taken from
//! configuration and never inferred.
//!
//! # Rate Limiting
//!
//! GitHub has rate limits. This implementation returns
//! `ForgeError::RateLimited` when limits are hit and never retries on its
//! own; retry policy belongs to the caller.
//!
//! # Example
//!
//! ```ignore
//! use graftwork::core::config::ForgeConfig;
//! use graftwork::forge::{Forge, GitHubForge};
//!
//! let config = ForgeConfig::new(
//!     Some("whiskeyriver".into()),
//!     token,
//!     "whiskeyriver",
//!     "ghpick_test",
//!     None,
//! )?;
//! let forge = GitHubForge::new(&config);
//! let tip = forge.resolve_ref("rel_1.0_dev").await?;
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{
    CommitAuthor, CommitInfo, EntryKind, Forge, ForgeError, TreeEntry, TreeListing, TreeWrite,
};
use crate::core::config::ForgeConfig;
use crate::core::types::{BranchName, Oid};

/// Media type for unified-diff compare responses.
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "graft-cli";

/// GitHub's maximum page size for commit listings.
const COMMITS_PER_PAGE: u32 = 100;

/// GitHub forge implementation.
///
/// Implements the `Forge` trait against the REST git-data endpoints.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Account name for basic auth; bearer auth when absent
    username: Option<String>,
    /// Password or personal access token
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("username", &self.username)
            .field("has_token", &!self.token.is_empty())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubForge {
    /// Create a forge from validated configuration.
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            client: Client::new(),
            username: config.username.clone(),
            token: config.token.clone(),
            owner: config.organization.clone(),
            repo: config.repository.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// Common headers for API requests with the given media type.
    fn headers(&self, accept: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers
    }

    /// Start a request with headers and credentials applied.
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.request_accept(method, url, "application/vnd.github+json")
    }

    /// Start a request asking for a specific media type.
    fn request_accept(&self, method: Method, url: &str, accept: &'static str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .headers(self.headers(accept));
        match &self.username {
            Some(user) => builder.basic_auth(user, Some(&self.token)),
            None => builder.bearer_auth(&self.token),
        }
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {}", e),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ForgeError> {
        // Try to get the error message from the body
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => {
                ForgeError::AuthFailed("invalid or expired credentials".into())
            }
            StatusCode::FORBIDDEN => {
                ForgeError::AuthFailed(format!("permission denied: {}", message))
            }
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Send a request and map transport failures.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ForgeError> {
        builder
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    /// Look up a ref in a namespace (`heads` or `tags`).
    async fn get_ref(&self, namespace: &str, name: &str) -> Result<Oid, ForgeError> {
        let url = self.repo_url(&format!("git/ref/{}/{}", namespace, name));
        let response = self.send(self.request(Method::GET, &url)).await?;
        let reference: GitRefResponse = self.handle_response(response).await?;
        parse_oid(&reference.object.sha)
    }
}

/// Parse a SHA from a response body into an `Oid`.
fn parse_oid(sha: &str) -> Result<Oid, ForgeError> {
    Oid::new(sha).map_err(|_| ForgeError::ApiError {
        status: 0,
        message: format!("malformed sha in response: {}", sha),
    })
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn resolve_ref(&self, reference: &str) -> Result<Oid, ForgeError> {
        // A full SHA resolves to itself; no round-trip needed.
        if Oid::looks_like_sha(reference) {
            return parse_oid(reference);
        }

        // Branches first, then lightweight tags, matching ref priority for
        // the common case.
        for namespace in ["heads", "tags"] {
            match self.get_ref(namespace, reference).await {
                Ok(sha) => {
                    debug!(reference, namespace, %sha, "resolved ref");
                    return Ok(sha);
                }
                Err(ForgeError::NotFound(_)) => continue,
                Err(other) => return Err(other),
            }
        }

        Err(ForgeError::NotFound(format!(
            "{} is not a branch, tag, or full sha",
            reference
        )))
    }

    async fn diff(&self, base: &Oid, target: &Oid) -> Result<String, ForgeError> {
        let url = self.repo_url(&format!("compare/{}...{}", base, target));
        debug!(%base, %target, "fetching compare diff");

        let builder = self.request_accept(Method::GET, &url, DIFF_MEDIA_TYPE);
        let response = self.send(builder).await?;

        let status = response.status();
        if status.is_success() {
            response.text().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to read diff body: {}", e),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    async fn commits_between(&self, from: &Oid, to: &Oid) -> Result<Vec<CommitInfo>, ForgeError> {
        // The list endpoint has no "between" filter, so anchor on the
        // starting commit's committer date and pare the result at the
        // starting SHA.
        let anchor = self.commit_info(from).await?;

        let mut commits = Vec::new();
        let mut page: u32 = 1;

        loop {
            let url = self.repo_url(&format!(
                "commits?sha={}&since={}&per_page={}&page={}",
                to, anchor.date, COMMITS_PER_PAGE, page
            ));
            let response = self.send(self.request(Method::GET, &url)).await?;
            let items: Vec<RepoCommitWire> = self.handle_response(response).await?;
            let page_len = items.len();

            for item in items {
                if item.sha == from.as_str() {
                    return Ok(commits);
                }
                commits.push(item.try_into()?);
            }

            if page_len < COMMITS_PER_PAGE as usize {
                return Ok(commits);
            }
            page += 1;
        }
    }

    async fn commit_info(&self, sha: &Oid) -> Result<CommitInfo, ForgeError> {
        let url = self.repo_url(&format!("git/commits/{}", sha));
        let response = self.send(self.request(Method::GET, &url)).await?;
        let commit: GitCommitResponse = self.handle_response(response).await?;
        Ok(CommitInfo {
            sha: parse_oid(&commit.sha)?,
            message: commit.message,
            author: commit.author.name,
            date: commit.committer.date,
        })
    }

    async fn tree(&self, treeish: &str) -> Result<TreeListing, ForgeError> {
        let url = self.repo_url(&format!("git/trees/{}?recursive=1", treeish));
        debug!(treeish, "fetching recursive tree");
        let response = self.send(self.request(Method::GET, &url)).await?;
        let tree: TreeResponse = self.handle_response(response).await?;
        tree.try_into()
    }

    async fn blob(&self, sha: &Oid) -> Result<Vec<u8>, ForgeError> {
        let url = self.repo_url(&format!("git/blobs/{}", sha));
        let response = self.send(self.request(Method::GET, &url)).await?;
        let blob: BlobResponse = self.handle_response(response).await?;

        match blob.encoding.as_str() {
            "base64" => {
                // The API wraps base64 bodies with newlines
                let compact: String = blob.content.split_whitespace().collect();
                BASE64.decode(compact).map_err(|e| ForgeError::ApiError {
                    status: 0,
                    message: format!("malformed base64 blob {}: {}", sha, e),
                })
            }
            "utf-8" => Ok(blob.content.into_bytes()),
            other => Err(ForgeError::ApiError {
                status: 0,
                message: format!("unexpected blob encoding: {}", other),
            }),
        }
    }

    async fn create_blob(&self, content: &[u8]) -> Result<Oid, ForgeError> {
        let url = self.repo_url("git/blobs");
        let body = CreateBlobBody {
            content: BASE64.encode(content),
            encoding: "base64",
        };
        let response = self
            .send(self.request(Method::POST, &url).json(&body))
            .await?;
        let created: ShaResponse = self.handle_response(response).await?;
        debug!(sha = %created.sha, bytes = content.len(), "created blob");
        parse_oid(&created.sha)
    }

    async fn create_tree(
        &self,
        base_tree: Option<&Oid>,
        writes: &[TreeWrite],
    ) -> Result<Oid, ForgeError> {
        let url = self.repo_url("git/trees");
        let body = CreateTreeBody {
            base_tree: base_tree.map(Oid::as_str),
            tree: writes
                .iter()
                .map(|w| TreeWriteWire {
                    path: &w.path,
                    mode: &w.mode,
                    kind: "blob",
                    sha: w.sha.as_ref().map(Oid::as_str),
                })
                .collect(),
        };
        let response = self
            .send(self.request(Method::POST, &url).json(&body))
            .await?;
        let created: ShaResponse = self.handle_response(response).await?;
        debug!(sha = %created.sha, writes = writes.len(), "created tree");
        parse_oid(&created.sha)
    }

    async fn create_commit(
        &self,
        tree: &Oid,
        parent: &Oid,
        message: &str,
        author: Option<&CommitAuthor>,
    ) -> Result<Oid, ForgeError> {
        let url = self.repo_url("git/commits");
        let body = CreateCommitBody {
            message,
            tree: tree.as_str(),
            parents: vec![parent.as_str()],
            author,
        };
        let response = self
            .send(self.request(Method::POST, &url).json(&body))
            .await?;
        let created: ShaResponse = self.handle_response(response).await?;
        debug!(sha = %created.sha, %tree, %parent, "created commit");
        parse_oid(&created.sha)
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        new_sha: &Oid,
        expected_old: &Oid,
    ) -> Result<(), ForgeError> {
        // Optimistic check: the ref endpoint has no native precondition, so
        // read the head and refuse to write over a moved branch. The
        // non-force PATCH still rejects non-fast-forward races that slip
        // between the read and the write.
        let current = self.get_ref("heads", branch.as_str()).await?;
        if current != *expected_old {
            return Err(ForgeError::StaleRef {
                branch: branch.to_string(),
                expected: expected_old.to_string(),
                actual: current.to_string(),
            });
        }

        let url = self.repo_url(&format!("git/refs/heads/{}", branch));
        let body = UpdateRefBody {
            sha: new_sha.as_str(),
            force: false,
        };
        let response = self
            .send(self.request(Method::PATCH, &url).json(&body))
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(%branch, %new_sha, "branch updated");
            return Ok(());
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            // Non-fast-forward rejection: somebody moved the branch under us
            return Err(ForgeError::StaleRef {
                branch: branch.to_string(),
                expected: expected_old.to_string(),
                actual: "unknown (moved during update)".to_string(),
            });
        }
        self.handle_error_response(response, status).await
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// `git/ref` response format.
#[derive(Deserialize)]
struct GitRefResponse {
    object: GitRefObject,
}

#[derive(Deserialize)]
struct GitRefObject {
    sha: String,
}

/// Response carrying only a created object's SHA.
#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

/// `git/blobs/{sha}` response format.
#[derive(Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}

/// `git/trees/{sha}?recursive=1` response format.
#[derive(Deserialize)]
struct TreeResponse {
    sha: String,
    #[serde(default)]
    tree: Vec<TreeItemWire>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeItemWire {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

impl TryFrom<TreeResponse> for TreeListing {
    type Error = ForgeError;

    fn try_from(resp: TreeResponse) -> Result<Self, Self::Error> {
        let mut entries = Vec::with_capacity(resp.tree.len());
        for item in resp.tree {
            let kind = EntryKind::parse(&item.kind).ok_or_else(|| ForgeError::ApiError {
                status: 0,
                message: format!("unexpected tree entry type '{}' at {}", item.kind, item.path),
            })?;
            entries.push(TreeEntry {
                sha: parse_oid(&item.sha)?,
                path: item.path,
                mode: item.mode,
                kind,
            });
        }
        Ok(TreeListing {
            sha: parse_oid(&resp.sha)?,
            entries,
            truncated: resp.truncated,
        })
    }
}

/// `git/commits/{sha}` response format.
#[derive(Deserialize)]
struct GitCommitResponse {
    sha: String,
    message: String,
    author: StampWire,
    committer: StampWire,
}

/// Author/committer stamp.
#[derive(Deserialize)]
struct StampWire {
    #[serde(default)]
    name: String,
    date: String,
}

/// Repository commit-list item (subset; the list endpoint nests the git
/// commit under `commit`).
#[derive(Deserialize)]
struct RepoCommitWire {
    sha: String,
    commit: RepoCommitInner,
}

#[derive(Deserialize)]
struct RepoCommitInner {
    message: String,
    author: StampWire,
    committer: StampWire,
}

impl TryFrom<RepoCommitWire> for CommitInfo {
    type Error = ForgeError;

    fn try_from(item: RepoCommitWire) -> Result<Self, Self::Error> {
        Ok(CommitInfo {
            sha: parse_oid(&item.sha)?,
            message: item.commit.message,
            author: item.commit.author.name,
            date: item.commit.committer.date,
        })
    }
}

/// Request body for creating a blob.
#[derive(Serialize)]
struct CreateBlobBody<'a> {
    content: String,
    encoding: &'a str,
}

/// Request body for creating a tree.
#[derive(Serialize)]
struct CreateTreeBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_tree: Option<&'a str>,
    tree: Vec<TreeWriteWire<'a>>,
}

/// One tree write on the wire. A `null` sha deletes the path.
#[derive(Serialize)]
struct TreeWriteWire<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: Option<&'a str>,
}

/// Request body for creating a commit.
#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a CommitAuthor>,
}

/// Request body for a conditional ref update.
#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}
