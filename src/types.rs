use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Sentinel returned by identity reads that could not be performed.
pub const UNKNOWN: &str = "unknown";

pub const INVALID_BRANCH_MESSAGE: &str =
    "Invalid request body: branch is required and must be a string";

/// Identity of a working copy at the moment it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRef {
    pub branch: String,
    pub commit: String,
    pub remote_url: String,
}

/// Uncommitted modifications of the working directory.
///
/// Clean exactly when there are no recorded changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingDirectoryStatus {
    is_clean: bool,
    changes: Vec<String>,
}

impl WorkingDirectoryStatus {
    #[must_use]
    pub fn new(changes: Vec<String>) -> Self {
        Self {
            is_clean: changes.is_empty(),
            changes,
        }
    }

    /// Status reported when the working directory cannot be inspected.
    #[must_use]
    pub const fn clean() -> Self {
        Self {
            is_clean: true,
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.is_clean
    }

    #[must_use]
    pub fn changes(&self) -> &[String] {
        &self.changes
    }

    #[must_use]
    pub fn into_changes(self) -> Vec<String> {
        self.changes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub hash: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Feature,
    Fix,
    Docs,
    Style,
    Refactor,
    Perf,
    Test,
    Build,
    Ci,
    Other,
}

impl CommitType {
    /// Display order of changelog sections.
    pub const ALL: [Self; 10] = [
        Self::Feature,
        Self::Fix,
        Self::Docs,
        Self::Style,
        Self::Refactor,
        Self::Perf,
        Self::Test,
        Self::Build,
        Self::Ci,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Fix => "fix",
            Self::Docs => "docs",
            Self::Style => "style",
            Self::Refactor => "refactor",
            Self::Perf => "perf",
            Self::Test => "test",
            Self::Build => "build",
            Self::Ci => "ci",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Feature => "Features",
            Self::Fix => "Bug Fixes",
            Self::Docs => "Documentation",
            Self::Style => "Styles",
            Self::Refactor => "Code Refactoring",
            Self::Perf => "Performance",
            Self::Test => "Tests",
            Self::Build => "Build",
            Self::Ci => "CI",
            Self::Other => "Other Changes",
        }
    }

    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Feature => "✨",
            Self::Fix => "🐛",
            Self::Docs => "📚",
            Self::Style => "💎",
            Self::Refactor => "♻️",
            Self::Perf => "⚡",
            Self::Test => "🧪",
            Self::Build => "🛠️",
            Self::Ci => "⚙️",
            Self::Other => "🔍",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedCommit {
    #[serde(rename = "type")]
    pub commit_type: CommitType,
    pub message: String,
}

/// One rendered block of the changelog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogSection {
    #[serde(rename = "type")]
    pub commit_type: CommitType,
    pub title: &'static str,
    pub emoji: &'static str,
    pub commits: Vec<CommitRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub changed_files: Vec<String>,
    pub additions: u64,
    pub deletions: u64,
    pub total_size: String,
}

impl Default for DiffStats {
    fn default() -> Self {
        Self {
            changed_files: Vec::new(),
            additions: 0,
            deletions: 0,
            total_size: "0 B".to_string(),
        }
    }
}

/// Result of comparing the fetched remote head with the local head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub has_changes: bool,
    pub remote_commit: String,
}

impl SyncStatus {
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            has_changes: false,
            remote_commit: UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Pull,
    Install,
    Build,
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDetails {
    pub update_ready: bool,
    pub changelog: String,
    pub compare_url: String,
    pub current_commit: String,
    pub remote_commit: String,
    pub changed_files: Vec<String>,
    pub additions: u64,
    pub deletions: u64,
    pub commit_messages: Vec<String>,
    pub total_size: String,
}

/// The single response object of an update check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: UpdateDetails,
}

impl UpdateReport {
    /// A terminal report with no update ready and every detail defaulted.
    #[must_use]
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Complete,
            message: message.into(),
            progress: None,
            error: None,
            details: UpdateDetails {
                total_size: "0 B".to_string(),
                ..UpdateDetails::default()
            },
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, error: &Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::complete(message)
        }
    }
}

/// Parsed body of `POST /api/update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub branch: String,
    pub auto_update: Option<bool>,
}

impl UpdateRequest {
    /// Validates the shape of a request body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when `branch` is missing or not a string.
    pub fn from_json(body: &Value) -> Result<Self> {
        let branch = body
            .as_object()
            .and_then(|object| object.get("branch"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation(INVALID_BRANCH_MESSAGE.to_string()))?;

        let auto_update = match body.get("autoUpdate") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(flag)) => Some(*flag),
            Some(other) => {
                debug!(auto_update = %other, "Ignoring non-boolean autoUpdate");
                None
            }
        };

        Ok(Self {
            branch: branch.to_string(),
            auto_update,
        })
    }
}
