//! Turning raw log text into classified commit records.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::range::LOG_FIELD_DELIMITER;
use crate::types::{ClassifiedCommit, CommitRecord, CommitType};

/// Conventional-commit prefixes in match priority; first hit wins.
const PREFIXES: &[(&str, CommitType)] = &[
    ("feat:", CommitType::Feature),
    ("feature:", CommitType::Feature),
    ("fix:", CommitType::Fix),
    ("docs:", CommitType::Docs),
    ("style:", CommitType::Style),
    ("refactor:", CommitType::Refactor),
    ("perf:", CommitType::Perf),
    ("test:", CommitType::Test),
    ("build:", CommitType::Build),
    ("ci:", CommitType::Ci),
];

/// Splits log lines of the form `hash<delim>subject<delim>body`.
#[derive(Debug, Clone)]
pub struct CommitLogParser {
    delimiter: String,
}

impl Default for CommitLogParser {
    fn default() -> Self {
        Self::new(LOG_FIELD_DELIMITER)
    }
}

impl CommitLogParser {
    #[must_use]
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    /// Splits one line into hash, subject and body. Delimiters past the second
    /// belong to the body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogParse`] when the line has fewer than three fields
    pub fn parse_line(&self, line: &str) -> Result<CommitRecord> {
        let mut fields = line.splitn(3, self.delimiter.as_str());
        match (fields.next(), fields.next(), fields.next()) {
            (Some(hash), Some(subject), Some(body)) if !hash.is_empty() => Ok(CommitRecord {
                hash: hash.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            }),
            _ => Err(Error::LogParse(line.to_string())),
        }
    }

    /// Parses log output in emission order, skipping empty lines.
    ///
    /// A line without the delimiter continues the body of the previous record,
    /// which is how git prints multi-line commit bodies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogParse`] when the text starts with a continuation line
    pub fn parse_all(&self, text: &str) -> Result<Vec<CommitRecord>> {
        let mut records: Vec<CommitRecord> = Vec::new();
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            if line.contains(self.delimiter.as_str()) {
                records.push(self.parse_line(line)?);
                continue;
            }
            let previous = records
                .last_mut()
                .ok_or_else(|| Error::LogParse(line.to_string()))?;
            if !previous.body.is_empty() {
                previous.body.push('\n');
            }
            previous.body.push_str(line);
        }
        debug!(commits = records.len(), "Parsed commit log");
        Ok(records)
    }
}

/// Maps a subject line to its conventional-commit type.
#[must_use]
pub fn classify(subject: &str) -> ClassifiedCommit {
    PREFIXES
        .iter()
        .find_map(|(prefix, commit_type)| {
            subject.strip_prefix(*prefix).map(|rest| ClassifiedCommit {
                commit_type: *commit_type,
                message: rest.trim().to_string(),
            })
        })
        .unwrap_or_else(|| ClassifiedCommit {
            commit_type: CommitType::Other,
            message: subject.to_string(),
        })
}

/// Buckets commits by type, keeping each bucket in input order.
#[must_use]
pub fn group_by_type(commits: &[CommitRecord]) -> BTreeMap<CommitType, Vec<CommitRecord>> {
    commits.iter().fold(BTreeMap::new(), |mut groups, commit| {
        groups
            .entry(classify(&commit.subject).commit_type)
            .or_insert_with(Vec::new)
            .push(commit.clone());
        groups
    })
}
