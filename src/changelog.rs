use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::commits::{group_by_type, CommitLogParser};
use crate::error::Result;
use crate::git::Git;
use crate::range::RangeDiffCollector;
use crate::types::{ChangelogSection, CommitRecord, CommitType};

/// Returned in place of a changelog whenever one cannot be produced.
pub const CHANGELOG_UNAVAILABLE: &str = "Unable to fetch changelog";

const HEADER: &str = "# Changes in this Update";

/// Where the changelog text of an update comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangelogSource {
    /// Checked-in changelog file, used verbatim.
    File(String),
    /// Commits of the range, rendered by category.
    Commits(Vec<CommitRecord>),
}

#[derive(Clone)]
pub struct ChangelogSynthesizer {
    git: Arc<dyn Git>,
    collector: RangeDiffCollector,
    parser: CommitLogParser,
    changelog_path: String,
}

impl ChangelogSynthesizer {
    #[must_use]
    pub fn new(git: Arc<dyn Git>, changelog_path: impl Into<String>) -> Self {
        Self {
            collector: RangeDiffCollector::new(git.clone()),
            git,
            parser: CommitLogParser::default(),
            changelog_path: changelog_path.into(),
        }
    }

    /// Markdown changelog for `from..to`; never fails.
    #[instrument(skip(self))]
    pub fn synthesize(&self, from: &str, to: &str) -> String {
        match self.try_synthesize(from, to) {
            Ok(changelog) => changelog,
            Err(err) => {
                warn!(error = %err, "Changelog could not be produced");
                CHANGELOG_UNAVAILABLE.to_string()
            }
        }
    }

    /// Picks the checked-in changelog at `to` when it has content, else the commit log.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be queried or the log cannot be parsed
    pub fn source(&self, from: &str, to: &str) -> Result<ChangelogSource> {
        if let Some(content) = self.git.get_file_content(to, &self.changelog_path)? {
            if !content.trim().is_empty() {
                debug!(path = %self.changelog_path, "Using checked-in changelog");
                return Ok(ChangelogSource::File(content));
            }
        }

        let log = self.collector.log(from, to)?;
        Ok(ChangelogSource::Commits(self.parser.parse_all(&log.stdout)?))
    }

    fn try_synthesize(&self, from: &str, to: &str) -> Result<String> {
        match self.source(from, to)? {
            ChangelogSource::File(content) => Ok(content),
            ChangelogSource::Commits(commits) => {
                let stat = self.collector.diff(from, to)?;
                Ok(render(&commits, &stat.stdout))
            }
        }
    }
}

/// Non-empty sections in canonical category order.
#[must_use]
pub fn sections(commits: &[CommitRecord]) -> Vec<ChangelogSection> {
    let mut groups = group_by_type(commits);
    CommitType::ALL
        .iter()
        .filter_map(|commit_type| {
            groups.remove(commit_type).map(|commits| ChangelogSection {
                commit_type: *commit_type,
                title: commit_type.title(),
                emoji: commit_type.emoji(),
                commits,
            })
        })
        .collect()
}

/// Renders the markdown report, appending `stat` when it is not blank.
#[must_use]
pub fn render(commits: &[CommitRecord], stat: &str) -> String {
    let mut out = format!("{HEADER}\n");
    for section in sections(commits) {
        out.push_str(&format!("\n## {} {}\n\n", section.emoji, section.title));
        for commit in &section.commits {
            out.push_str(&format!("- {}\n", commit.subject));
        }
    }

    if !stat.trim().is_empty() {
        out.push_str(&format!(
            "\n## 📊 Statistics\n\n```\n{}\n```\n",
            stat.trim_end()
        ));
    }
    out
}
