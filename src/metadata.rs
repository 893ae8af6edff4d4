use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::UpdateConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub open_issues_count: u64,
    #[serde(default)]
    pub parent: Option<ParentRepository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRepository {
    pub full_name: String,
    pub default_branch: String,
    pub stargazers_count: u64,
    pub forks_count: u64,
}

/// Answer of a hosting API for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostResponse {
    Found(RepositoryMetadata),
    /// Non-success HTTP status.
    Unavailable(u16),
}

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Looks up `owner/repo`.
    ///
    /// # Errors
    ///
    /// Returns an error when the host cannot be reached or answers with an unexpected body
    async fn repository(&self, full_name: &str) -> Result<HostResponse>;
}

pub struct GitHubClient {
    http: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    #[must_use]
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into(),
            token,
        }
    }

    #[must_use]
    pub fn from_config(config: &UpdateConfig) -> Self {
        Self::new(config.metadata_api_base.clone(), config.github_token.clone())
    }

    fn repository_endpoint(&self, full_name: &str) -> String {
        format!("{}/repos/{}", self.api_base.trim_end_matches('/'), full_name)
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    #[instrument(skip(self))]
    async fn repository(&self, full_name: &str) -> Result<HostResponse> {
        let mut request = self
            .http
            .get(self.repository_endpoint(full_name))
            .header(ACCEPT, "application/vnd.github.v3+json")
            .header(USER_AGENT, concat!("git-update/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|err| Error::Http(format!("failed to call repository host: {err}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(%status, "Repository host returned non-success status");
            return Ok(HostResponse::Unavailable(status.as_u16()));
        }

        let metadata = response
            .json::<RepositoryMetadata>()
            .await
            .map_err(|err| Error::Http(format!("failed to parse repository metadata: {err}")))?;
        Ok(HostResponse::Found(metadata))
    }
}

/// Looks up `full_name`, retrying once with `fallback` on a non-success status.
///
/// Metadata is optional to every caller, so failures end in `None`.
pub async fn fetch_repository_metadata(
    host: &dyn RepositoryHost,
    full_name: &str,
    fallback: &str,
) -> Option<RepositoryMetadata> {
    match host.repository(full_name).await {
        Ok(HostResponse::Found(metadata)) => Some(metadata),
        Ok(HostResponse::Unavailable(status)) if full_name != fallback => {
            warn!(full_name, status, fallback, "Repository metadata unavailable, trying fallback");
            match host.repository(fallback).await {
                Ok(HostResponse::Found(metadata)) => Some(metadata),
                Ok(HostResponse::Unavailable(status)) => {
                    warn!(fallback, status, "Fallback repository metadata unavailable");
                    None
                }
                Err(err) => {
                    warn!(fallback, error = %err, "Fallback repository lookup failed");
                    None
                }
            }
        }
        Ok(HostResponse::Unavailable(status)) => {
            warn!(full_name, status, "Repository metadata unavailable");
            None
        }
        Err(err) => {
            warn!(full_name, error = %err, "Repository lookup failed");
            None
        }
    }
}
