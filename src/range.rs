use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::git::{validate_ref, CommandOutput, Git};
use crate::types::DiffStats;

/// Separates hash, subject and body in collected log lines.
pub const LOG_FIELD_DELIMITER: &str = "\u{1f}";

const LOG_FORMAT: &str = "--pretty=format:%H%x1f%s%x1f%b";

/// Collects raw diff and log text between two references
#[derive(Clone)]
pub struct RangeDiffCollector {
    git: Arc<dyn Git>,
}

impl RangeDiffCollector {
    #[must_use]
    pub fn new(git: Arc<dyn Git>) -> Self {
        Self { git }
    }

    /// `git diff --stat` for the range.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference is unsafe or git fails
    pub fn diff(&self, from: &str, to: &str) -> Result<CommandOutput> {
        self.run_range(&["diff", "--stat", "--no-renames"], from, to, false)
    }

    /// One line per commit in `from..to`, fields joined by [`LOG_FIELD_DELIMITER`].
    ///
    /// # Errors
    ///
    /// Returns an error if a reference is unsafe or git fails
    pub fn log(&self, from: &str, to: &str) -> Result<CommandOutput> {
        self.run_range(&["log", LOG_FORMAT], from, to, true)
    }

    /// Aggregates per-file line counts and patch size for the range.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference is unsafe or git fails
    #[instrument(skip(self))]
    pub fn stats(&self, from: &str, to: &str) -> Result<DiffStats> {
        let numstat = self.run_range(&["diff", "--numstat", "--no-renames"], from, to, false)?;
        let patch_size = self
            .git
            .output_size(&["diff", "--no-renames", validate_ref(from)?, validate_ref(to)?])?;

        let mut stats = parse_numstat(&numstat.stdout);
        stats.total_size = format_size(patch_size);
        debug!(
            files = stats.changed_files.len(),
            additions = stats.additions,
            deletions = stats.deletions,
            total_size = %stats.total_size,
            "Diff stats collected"
        );
        Ok(stats)
    }

    #[instrument(skip(self))]
    fn run_range(
        &self,
        args: &[&str],
        from: &str,
        to: &str,
        as_range: bool,
    ) -> Result<CommandOutput> {
        let from = validate_ref(from)?;
        let to = validate_ref(to)?;

        let range = format!("{from}..{to}");
        let mut full_args = args.to_vec();
        if as_range {
            full_args.push(&range);
        } else {
            full_args.extend([from, to]);
        }

        let output = self.git.execute(&full_args)?;
        if !output.success {
            debug!(error = %output.stderr, "Range command failed");
            return Err(Error::GitCommandError(output.stderr.trim().to_string()));
        }
        Ok(output)
    }
}

/// Parses `git diff --numstat` output. Binary files count zero lines.
#[must_use]
pub fn parse_numstat(output: &str) -> DiffStats {
    let mut stats = DiffStats::default();
    for line in output.lines() {
        let mut parts = line.splitn(3, '\t');
        let (Some(added), Some(deleted), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        stats.additions += added.parse::<u64>().unwrap_or(0);
        stats.deletions += deleted.parse::<u64>().unwrap_or(0);
        if !stats.changed_files.iter().any(|known| known == path) {
            stats.changed_files.push(path.to_string());
        }
    }
    stats
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    // Below this, one decimal of KB still reads under 1024.0.
    const KB_LIMIT: u64 = MB - KB / 20;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < KB_LIMIT {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
