pub use error::{Error, Result};
pub use types::{
    ChangelogSection, ClassifiedCommit, CommitRecord, CommitType, DiffStats, GitRef, Stage,
    SyncStatus, UpdateDetails, UpdateReport, UpdateRequest, WorkingDirectoryStatus, UNKNOWN,
};

use std::path::Path;
use std::sync::Arc;

pub mod api;
pub mod changelog;
pub mod commits;
pub mod config;
mod error;
pub mod git;
pub mod metadata;
pub mod orchestrator;
pub mod range;
pub mod repository;
mod types;

use config::UpdateConfig;
use git::GitCli;
use orchestrator::UpdateOrchestrator;

/// Creates an `UpdateOrchestrator` backed by the git CLI in `config.repo_path`.
///
/// # Arguments
///
/// * `config`: Repository location, remote name, changelog path and stage timeout.
#[must_use]
pub fn new(config: &UpdateConfig) -> UpdateOrchestrator {
    let git = GitCli::new(config.repo_path.clone()).with_timeout(config.stage_timeout());
    UpdateOrchestrator::new(Arc::new(git), config)
}

/// Creates an `UpdateOrchestrator` for a local repository, configured from the environment.
///
/// # Arguments
///
/// * `repo_path`: The path to the local Git repository.
#[must_use]
pub fn new_from_local(repo_path: &Path) -> UpdateOrchestrator {
    new(&UpdateConfig::from_env(repo_path))
}
