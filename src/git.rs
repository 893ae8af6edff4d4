use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Raw result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Trait defining the read-only Git operations the update checker relies on
pub trait Git: Send + Sync {
    /// Run git with the given arguments and capture its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the git binary cannot be executed at all
    fn execute(&self, args: &[&str]) -> Result<CommandOutput>;

    /// Run a Git command and return its trimmed stdout
    ///
    /// # Errors
    ///
    /// Returns an error if the git command cannot be executed or exits unsuccessfully
    fn run_git_command(&self, args: &[&str]) -> Result<String> {
        let output = self.execute(args)?;
        if !output.success {
            debug!(error = %output.stderr, "Git command failed");
            return Err(Error::GitCommandError(output.stderr.trim().to_string()));
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Number of bytes a successful git command writes to stdout
    ///
    /// # Errors
    ///
    /// Returns an error if the git command cannot be executed or exits unsuccessfully
    fn output_size(&self, args: &[&str]) -> Result<u64> {
        let output = self.execute(args)?;
        if !output.success {
            return Err(Error::GitCommandError(output.stderr.trim().to_string()));
        }
        Ok(output.stdout.len() as u64)
    }

    /// Get the content of a file at a specific Git reference
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is not a safe token or git cannot be executed
    fn get_file_content(&self, ref_name: &str, path: &str) -> Result<Option<String>> {
        let ref_name = validate_ref(ref_name)?;
        let output = self.execute(&["show", &format!("{ref_name}:{path}")])?;
        if !output.success {
            debug!(ref_name, path, "File not found at reference");
            return Ok(None);
        }
        debug!(content_length = output.stdout.len(), "File content retrieved");
        Ok(Some(output.stdout))
    }
}

/// Implementation of Git operations using the local Git CLI
///
/// With a timeout set, a git process still running at the deadline is killed.
pub struct GitCli {
    repo_path: PathBuf,
    timeout: Option<Duration>,
}

impl GitCli {
    /// Creates a new `GitCli` instance with the given repository path
    #[must_use]
    pub const fn new(repo_path: PathBuf) -> Self {
        Self {
            repo_path,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Spawns git, hands its stdout to `consume` on a reader thread and waits
    /// for it to exit. Returns the exit status, the consumer's value and stderr.
    fn spawn<T, F>(&self, args: &[&str], consume: F) -> Result<(ExitStatus, T, String)>
    where
        T: Send + 'static,
        F: FnOnce(ChildStdout) -> io::Result<T> + Send + 'static,
    {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    Error::ToolUnavailable(e.to_string())
                }
                _ => Error::IoError(e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("git stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("git stderr was not captured"))?;

        let stdout_reader = thread::spawn(move || consume(stdout));
        let stderr_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).map(|_| buf)
        });

        let status = self.wait(&mut child, args)?;

        let stdout = stdout_reader
            .join()
            .map_err(|_| io::Error::other("git stdout reader panicked"))??;
        let stderr = stderr_reader
            .join()
            .map_err(|_| io::Error::other("git stderr reader panicked"))??;
        Ok((status, stdout, String::from_utf8_lossy(&stderr).into_owned()))
    }

    fn wait(&self, child: &mut Child, args: &[&str]) -> Result<ExitStatus> {
        let Some(limit) = self.timeout else {
            return Ok(child.wait()?);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                warn!(?args, ?limit, "Killing git command past its deadline");
                if let Err(err) = child.kill() {
                    debug!(error = %err, "Git exited before it could be killed");
                }
                child.wait()?;
                return Err(Error::CommandTimeout {
                    command: args.join(" "),
                    limit,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Git for GitCli {
    #[instrument(skip(self), fields(args = ?args, repo_path = %self.repo_path.display()))]
    fn execute(&self, args: &[&str]) -> Result<CommandOutput> {
        let (status, stdout, stderr) = self.spawn(args, |mut stdout| {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        })?;

        let result = CommandOutput {
            success: status.success(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr,
        };

        debug!(
            %status,
            output_length = result.stdout.len(),
            "Git command finished"
        );
        Ok(result)
    }

    #[instrument(skip(self), fields(args = ?args, repo_path = %self.repo_path.display()))]
    fn output_size(&self, args: &[&str]) -> Result<u64> {
        let (status, size, stderr) =
            self.spawn(args, |mut stdout| io::copy(&mut stdout, &mut io::sink()))?;
        if !status.success() {
            debug!(error = %stderr, "Git command failed");
            return Err(Error::GitCommandError(stderr.trim().to_string()));
        }
        debug!(%status, size, "Git output measured");
        Ok(size)
    }
}

/// Checks that a reference can be handed to git as a plain argument.
///
/// Only ASCII alphanumerics and `.`, `/`, `-`, `_` are accepted. A leading `-`
/// would be read as an option and `..` as range syntax, so both are refused.
///
/// # Errors
///
/// Returns [`Error::InvalidReference`] when the token is not safe
pub fn validate_ref(reference: &str) -> Result<&str> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '-' | '_');
    if reference.is_empty()
        || reference.starts_with('-')
        || reference.contains("..")
        || !reference.chars().all(allowed)
    {
        return Err(Error::InvalidReference(reference.to_string()));
    }
    Ok(reference)
}
