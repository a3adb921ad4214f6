//! [`RemoteStore`] over the GitHub repository contents API.
//!
//! The canonical map is a single JSON file in a repository branch. Reads
//! return the base64 file content and its blob SHA; writes `PUT` new content
//! together with the SHA that was read, so GitHub itself rejects a commit
//! based on a stale version.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::remote::{RemoteSnapshot, RemoteStore, VersionToken};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Which file, in which repository branch, holds the canonical map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

impl GithubTarget {
    #[must_use]
    pub fn from_app_config(config: &festmap_core::AppConfig) -> Self {
        Self {
            owner: config.github_owner.clone(),
            repo: config.github_repo.clone(),
            branch: config.github_branch.clone(),
            path: config.github_path.clone(),
        }
    }
}

/// Client for one file in one GitHub repository.
///
/// Use [`GithubStore::new`] for production or [`GithubStore::with_base_url`]
/// to point at a mock server in tests.
pub struct GithubStore {
    client: Client,
    token: String,
    target: GithubTarget,
    contents_url: Url,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: PutContentsFile,
}

#[derive(Debug, Deserialize)]
struct PutContentsFile {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GithubErrorBody {
    #[serde(default)]
    message: String,
}

impl GithubStore {
    /// Creates a store client pointed at the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        target: GithubTarget,
        token: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, StoreError> {
        Self::with_base_url(target, token, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a store client from application configuration.
    ///
    /// # Errors
    ///
    /// See [`GithubStore::with_base_url`].
    pub fn from_app_config(config: &festmap_core::AppConfig) -> Result<Self, StoreError> {
        Self::with_base_url(
            GithubTarget::from_app_config(config),
            &config.github_token,
            config.request_timeout_secs,
            &config.user_agent,
            &config.github_api_url,
        )
    }

    /// Creates a store client with a custom API base URL (GitHub Enterprise,
    /// or a wiremock server in tests).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`StoreError::InvalidBaseUrl`] if `base_url` cannot hold a path.
    pub fn with_base_url(
        target: GithubTarget,
        token: &str,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let contents_url = contents_url(base_url, &target)?;

        Ok(Self {
            client,
            token: token.to_owned(),
            target,
            contents_url,
        })
    }

    #[must_use]
    pub fn target(&self) -> &GithubTarget {
        &self.target
    }

    async fn fetch(&self) -> Result<RemoteSnapshot, StoreError> {
        let mut url = self.contents_url.clone();
        url.query_pairs_mut()
            .append_pair("ref", &self.target.branch);

        tracing::debug!(path = %self.target.path, branch = %self.target.branch, "github: reading document");

        let response = self.authorized(self.client.get(url)).send().await?;
        let response = self.check_status(response).await?;
        let body: ContentsResponse = response.json().await?;

        let bytes = match body.encoding.as_deref() {
            Some("base64") | None => decode_content(&body.content)?,
            // Files over 1 MB come back without inline content.
            Some(_) => self.download_raw(body.download_url.as_deref()).await?,
        };

        Ok(RemoteSnapshot {
            bytes,
            version: VersionToken(body.sha),
        })
    }

    async fn download_raw(&self, download_url: Option<&str>) -> Result<Vec<u8>, StoreError> {
        let Some(download_url) = download_url else {
            return Err(StoreError::Decode {
                context: self.target.path.clone(),
                reason: "content is not inline and no download_url was given".to_string(),
            });
        };

        let response = self
            .authorized(self.client.get(download_url))
            .send()
            .await?;
        let response = self.check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn commit(
        &self,
        bytes: &[u8],
        expected: &VersionToken,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        let request = PutContentsRequest {
            message,
            content: STANDARD.encode(bytes),
            sha: expected.as_str(),
            branch: &self.target.branch,
        };

        tracing::debug!(
            path = %self.target.path,
            branch = %self.target.branch,
            expected = %expected,
            size = bytes.len(),
            "github: committing document"
        );

        let response = self
            .authorized(self.client.put(self.contents_url.clone()))
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let body: PutContentsResponse = response.json().await?;

        Ok(VersionToken(body.content.sha))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    /// Maps non-2xx responses onto [`StoreError`] variants, keeping GitHub's
    /// `message` for diagnostics.
    async fn check_status(&self, response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let message = response
            .json::<GithubErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_default();

        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound {
                path: self.target.path.clone(),
            },
            StatusCode::CONFLICT => StoreError::Conflict {
                path: self.target.path.clone(),
                message,
            },
            StatusCode::UNPROCESSABLE_ENTITY if is_stale_sha_message(&message) => {
                StoreError::Conflict {
                    path: self.target.path.clone(),
                    message,
                }
            }
            other => StoreError::UnexpectedStatus {
                status: other.as_u16(),
                url,
                message,
            },
        })
    }
}

impl RemoteStore for GithubStore {
    async fn read(&self) -> Result<RemoteSnapshot, StoreError> {
        self.fetch().await
    }

    async fn write(
        &self,
        bytes: &[u8],
        expected: &VersionToken,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        self.commit(bytes, expected, message).await
    }
}

/// Builds `{base}/repos/{owner}/{repo}/contents/{path}` with every segment
/// percent-encoded.
fn contents_url(base_url: &str, target: &GithubTarget) -> Result<Url, StoreError> {
    let invalid = |reason: String| StoreError::InvalidBaseUrl {
        base_url: base_url.to_string(),
        reason,
    };

    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    let mut url = Url::parse(&normalised).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("URL cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["repos", target.owner.as_str(), target.repo.as_str(), "contents"])
        .extend(target.path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}

/// A 422 is only a stale-sha conflict when GitHub says the supplied sha does
/// not match the file. Other 422s (missing sha, bad payload) are not
/// retryable.
fn is_stale_sha_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("does not match") || message.contains("but expected")
}

/// GitHub wraps base64 content at 60 columns.
fn decode_content(content: &str) -> Result<Vec<u8>, StoreError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| StoreError::Decode {
            context: "contents.content".to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_sha_mismatch_messages_count_as_stale() {
        assert!(is_stale_sha_message("data/map-data.json does not match abc123"));
        assert!(is_stale_sha_message("is at def456 but expected abc123"));
        assert!(!is_stale_sha_message("Invalid request.\n\n\"sha\" wasn't supplied."));
        assert!(!is_stale_sha_message("content is not valid Base64"));
    }

    fn target() -> GithubTarget {
        GithubTarget {
            owner: "festival".to_string(),
            repo: "map-data".to_string(),
            branch: "main".to_string(),
            path: "data/map-data.json".to_string(),
        }
    }

    #[test]
    fn contents_url_joins_segments() {
        let url = contents_url("https://api.github.com", &target()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/festival/map-data/contents/data/map-data.json"
        );
    }

    #[test]
    fn contents_url_strips_trailing_slash_and_keeps_prefix() {
        let url = contents_url("https://ghe.example.org/api/v3/", &target()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.org/api/v3/repos/festival/map-data/contents/data/map-data.json"
        );
    }

    #[test]
    fn contents_url_encodes_special_characters() {
        let mut t = target();
        t.path = "maps/summer fest.json".to_string();
        let url = contents_url("https://api.github.com", &t).unwrap();
        assert!(
            url.as_str().ends_with("/contents/maps/summer%20fest.json"),
            "path should be percent-encoded: {url}"
        );
    }

    #[test]
    fn contents_url_rejects_garbage() {
        let err = contents_url("not a url", &target()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn decode_content_ignores_line_wrapping() {
        let encoded = STANDARD.encode(br#"{"locations":{}}"#);
        let (head, tail) = encoded.split_at(8);
        let wrapped = format!("{head}\n{tail}\n");
        assert_eq!(decode_content(&wrapped).unwrap(), br#"{"locations":{}}"#);
    }

    #[test]
    fn decode_content_rejects_invalid_base64() {
        let err = decode_content("!!!not-base64!!!").unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
