//! Decides whether an update can be applied and describes what it contains.
//!
//! A run always ends in [`Stage::Complete`]. Pulling, installing and building
//! belong to a separately supervised apply step that consumes the report.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::changelog::{ChangelogSynthesizer, CHANGELOG_UNAVAILABLE};
use crate::commits::CommitLogParser;
use crate::config::UpdateConfig;
use crate::error::{Error, Result};
use crate::git::{validate_ref, Git};
use crate::range::RangeDiffCollector;
use crate::repository::{compare_url, RemoteSyncChecker, RepositoryStateReader};
use crate::types::{
    DiffStats, GitRef, Stage, UpdateDetails, UpdateReport, UpdateRequest, WorkingDirectoryStatus,
};

const UNSAFE_BRANCH_MESSAGE: &str =
    "Invalid request body: branch contains unsupported characters";

/// How a run ended, from the caller's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The request body was rejected before any repository access.
    Rejected(UpdateReport),
    /// The repository was evaluated; the report says whether to proceed.
    Reported(UpdateReport),
}

impl UpdateOutcome {
    #[must_use]
    pub const fn report(&self) -> &UpdateReport {
        match self {
            Self::Rejected(report) | Self::Reported(report) => report,
        }
    }

    #[must_use]
    pub fn into_report(self) -> UpdateReport {
        match self {
            Self::Rejected(report) | Self::Reported(report) => report,
        }
    }
}

#[derive(Clone)]
pub struct UpdateOrchestrator {
    reader: RepositoryStateReader,
    checker: RemoteSyncChecker,
    collector: RangeDiffCollector,
    changelog: ChangelogSynthesizer,
    stage_timeout: Duration,
}

impl UpdateOrchestrator {
    #[must_use]
    pub fn new(git: Arc<dyn Git>, config: &UpdateConfig) -> Self {
        Self {
            reader: RepositoryStateReader::new(git.clone(), config.remote.clone()),
            checker: RemoteSyncChecker::new(git.clone(), config.remote.clone()),
            collector: RangeDiffCollector::new(git.clone()),
            changelog: ChangelogSynthesizer::new(git, config.changelog_path.clone()),
            stage_timeout: config.stage_timeout(),
        }
    }

    #[must_use]
    pub const fn with_stage_timeout(mut self, stage_timeout: Duration) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }

    /// Validates a raw request body and evaluates it.
    pub async fn run(&self, body: &Value) -> UpdateOutcome {
        let request = match UpdateRequest::from_json(body) {
            Ok(request) => request,
            Err(err) => {
                debug!(error = %err, "Rejected update request");
                return UpdateOutcome::Rejected(UpdateReport::failed(
                    "Invalid update request",
                    &err,
                ));
            }
        };

        if validate_ref(&request.branch).is_err() {
            let err = Error::Validation(UNSAFE_BRANCH_MESSAGE.to_string());
            warn!(branch = %request.branch, "Rejected unsafe branch name");
            return UpdateOutcome::Rejected(UpdateReport::failed("Invalid update request", &err));
        }

        UpdateOutcome::Reported(self.check(&request).await)
    }

    /// Evaluates a validated request. Never fails; errors land in the report.
    #[instrument(skip(self), fields(branch = %request.branch))]
    pub async fn check(&self, request: &UpdateRequest) -> UpdateReport {
        match self.evaluate(request).await {
            Ok(report) => {
                info!(
                    update_ready = report.details.update_ready,
                    message = %report.message,
                    "Update check complete"
                );
                report
            }
            Err(err) => {
                warn!(error = %err, "Update check failed");
                UpdateReport::failed("Update check failed", &err)
            }
        }
    }

    async fn evaluate(&self, request: &UpdateRequest) -> Result<UpdateReport> {
        let (git_ref, status) = self.read_state().await?;
        debug!(?git_ref, clean = status.is_clean(), "Repository state read");

        if !status.is_clean() {
            let mut report = UpdateReport::complete(
                "Local changes detected. Commit or stash them before updating.",
            );
            report.progress = Some(100);
            report.details.current_commit = git_ref.commit;
            report.details.changed_files = status.into_changes();
            return Ok(report);
        }

        let checker = self.checker.clone();
        let branch = request.branch.clone();
        let sync = self.stage("fetch", move || checker.check(&branch)).await?;

        if !sync.has_changes {
            let mut report =
                UpdateReport::complete("No updates available. You are on the latest version.");
            report.progress = Some(100);
            report.details.current_commit = git_ref.commit;
            report.details.remote_commit = sync.remote_commit;
            return Ok(report);
        }

        let from = git_ref.commit.clone();
        let to = sync.remote_commit.clone();
        let (stats, commit_messages) = self.collect_range(&from, &to).await?;
        let changelog = self.changelog(&from, &to).await;

        let mut message = format!(
            "Update available: {} commit(s) behind {}",
            commit_messages.len(),
            request.branch
        );
        if request.auto_update == Some(true) {
            message.push_str(
                ". Automatic update requested; apply it with the pull, install and build stages",
            );
        }

        Ok(UpdateReport {
            stage: Stage::Complete,
            message,
            progress: Some(100),
            error: None,
            details: UpdateDetails {
                update_ready: true,
                changelog,
                compare_url: compare_url(&git_ref.remote_url, &from, &to),
                current_commit: from,
                remote_commit: to,
                changed_files: stats.changed_files,
                additions: stats.additions,
                deletions: stats.deletions,
                commit_messages,
                total_size: stats.total_size,
            },
        })
    }

    /// The four state reads run concurrently. Each query degrades to its own
    /// sentinel when git fails, but a read that outlives the stage timeout
    /// fails the whole check: a status that was never read is not clean.
    async fn read_state(&self) -> Result<(GitRef, WorkingDirectoryStatus)> {
        let (branch, commit, remote_url, status) = tokio::join!(
            self.read(RepositoryStateReader::current_branch),
            self.read(RepositoryStateReader::current_commit),
            self.read(RepositoryStateReader::remote_url),
            self.read(RepositoryStateReader::working_directory_status),
        );
        Ok((
            GitRef {
                branch: branch?,
                commit: commit?,
                remote_url: remote_url?,
            },
            status?,
        ))
    }

    async fn read<T>(&self, query: fn(&RepositoryStateReader) -> T) -> Result<T>
    where
        T: Send + 'static,
    {
        let reader = self.reader.clone();
        self.stage("read", move || query(&reader)).await
    }

    async fn collect_range(&self, from: &str, to: &str) -> Result<(DiffStats, Vec<String>)> {
        let collector = self.collector.clone();
        let (from, to) = (from.to_string(), to.to_string());
        self.stage("diff", move || -> Result<(DiffStats, Vec<String>)> {
            let stats = collector.stats(&from, &to)?;
            let log = collector.log(&from, &to)?;
            let commit_messages = CommitLogParser::default()
                .parse_all(&log.stdout)?
                .into_iter()
                .map(|commit| commit.subject)
                .collect();
            Ok((stats, commit_messages))
        })
        .await?
    }

    async fn changelog(&self, from: &str, to: &str) -> String {
        let synthesizer = self.changelog.clone();
        let (from, to) = (from.to_string(), to.to_string());
        self.stage("changelog", move || synthesizer.synthesize(&from, &to))
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "Changelog stage did not finish");
                CHANGELOG_UNAVAILABLE.to_string()
            })
    }

    /// Runs blocking git work off the async runtime, bounded by the stage timeout.
    async fn stage<T, F>(&self, stage: &'static str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(job);
        match tokio::time::timeout(self.stage_timeout, handle).await {
            Ok(joined) => Ok(joined?),
            Err(_) => Err(Error::Timeout {
                stage,
                limit: self.stage_timeout,
            }),
        }
    }
}
