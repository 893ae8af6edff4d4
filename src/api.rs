//! HTTP-shaped handlers, independent of any server framework.
//!
//! A handler takes the request method and body and returns a status code with
//! a JSON body. Wiring them into a router is left to the embedding server.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::config::UpdateConfig;
use crate::error::Error;
use crate::metadata::{fetch_repository_metadata, RepositoryHost, RepositoryMetadata};
use crate::orchestrator::{UpdateOrchestrator, UpdateOutcome};
use crate::repository::{parse_remote_url, RepositoryStateReader};
use crate::types::{INVALID_BRANCH_MESSAGE, UNKNOWN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn json(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(err: &Error) -> Self {
        match err {
            Error::Validation(_) | Error::MethodNotAllowed => {
                Self::json(err.status_code(), json!({ "error": err.to_string() }))
            }
            _ => Self::json(500, json!({ "success": false, "error": err.to_string() })),
        }
    }
}

/// `POST /api/update`
#[instrument(skip(orchestrator, body), fields(body_length = body.len()))]
pub async fn handle_update(
    orchestrator: &UpdateOrchestrator,
    method: &str,
    body: &[u8],
) -> ApiResponse {
    if !method.eq_ignore_ascii_case("POST") {
        return ApiResponse::error(&Error::MethodNotAllowed);
    }

    let Ok(body) = serde_json::from_slice::<Value>(body) else {
        return ApiResponse::error(&Error::Validation(INVALID_BRANCH_MESSAGE.to_string()));
    };

    let orchestrator = orchestrator.clone();
    let outcome = match tokio::spawn(async move { orchestrator.run(&body).await }).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "Update check aborted");
            return ApiResponse::error(&Error::from(err));
        }
    };

    match outcome {
        UpdateOutcome::Rejected(report) => {
            let message = report
                .error
                .unwrap_or_else(|| INVALID_BRANCH_MESSAGE.to_string());
            ApiResponse::json(400, json!({ "error": message }))
        }
        UpdateOutcome::Reported(report) => match serde_json::to_value(&report) {
            Ok(body) => ApiResponse::json(200, body),
            Err(err) => ApiResponse::error(&Error::from(err)),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalInfo {
    pub commit_hash: String,
    pub branch: String,
    pub commit_time: String,
    pub author: String,
    pub email: String,
    pub remote_url: String,
    pub repo_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedRepository {
    pub full_name: String,
    pub default_branch: String,
    pub stars: u64,
    pub forks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_issues: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedInfo {
    pub current_repo: HostedRepository,
    pub upstream: Option<HostedRepository>,
}

impl From<RepositoryMetadata> for HostedInfo {
    fn from(metadata: RepositoryMetadata) -> Self {
        Self {
            current_repo: HostedRepository {
                full_name: metadata.full_name,
                default_branch: metadata.default_branch,
                stars: metadata.stargazers_count,
                forks: metadata.forks_count,
                open_issues: Some(metadata.open_issues_count),
            },
            upstream: metadata.parent.map(|parent| HostedRepository {
                full_name: parent.full_name,
                default_branch: parent.default_branch,
                stars: parent.stargazers_count,
                forks: parent.forks_count,
                open_issues: None,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    pub local: LocalInfo,
    pub github: Option<HostedInfo>,
    pub is_forked: bool,
    pub timestamp: String,
}

/// Local identity of the working copy plus hosted metadata, when reachable.
///
/// Metadata is looked up for the repository behind the local remote, falling
/// back to the configured repository.
pub async fn git_info(
    reader: &RepositoryStateReader,
    host: &dyn RepositoryHost,
    config: &UpdateConfig,
) -> GitInfo {
    let reader = reader.clone();
    let local = tokio::task::spawn_blocking(move || {
        let git_ref = reader.git_ref();
        let commit = reader.commit_info();
        let repo_name = parse_remote_url(&git_ref.remote_url)
            .map_or_else(|| UNKNOWN.to_string(), |(_, repo)| repo);
        LocalInfo {
            commit_hash: git_ref.commit,
            branch: git_ref.branch,
            commit_time: commit.commit_time,
            author: commit.author,
            email: commit.email,
            remote_url: git_ref.remote_url,
            repo_name,
        }
    })
    .await
    .unwrap_or_else(|err| {
        error!(error = %err, "Local repository read aborted");
        LocalInfo {
            commit_hash: UNKNOWN.to_string(),
            branch: UNKNOWN.to_string(),
            commit_time: UNKNOWN.to_string(),
            author: UNKNOWN.to_string(),
            email: UNKNOWN.to_string(),
            remote_url: UNKNOWN.to_string(),
            repo_name: UNKNOWN.to_string(),
        }
    });

    let requested = if local.repo_name == UNKNOWN {
        config.metadata_repository.as_str()
    } else {
        local.repo_name.as_str()
    };
    let github = fetch_repository_metadata(host, requested, &config.metadata_repository)
        .await
        .map(HostedInfo::from);

    GitInfo {
        local,
        is_forked: github
            .as_ref()
            .is_some_and(|info| info.upstream.is_some()),
        github,
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// `GET /api/system/git-info`
pub async fn handle_git_info(
    reader: &RepositoryStateReader,
    host: &dyn RepositoryHost,
    config: &UpdateConfig,
    method: &str,
) -> ApiResponse {
    if !method.eq_ignore_ascii_case("GET") {
        return ApiResponse::error(&Error::MethodNotAllowed);
    }

    let info = git_info(reader, host, config).await;
    match serde_json::to_value(&info) {
        Ok(body) => ApiResponse::json(200, body),
        Err(err) => ApiResponse::error(&Error::from(err)),
    }
}
