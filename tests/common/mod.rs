#![allow(dead_code)]

use git_update::git::{CommandOutput, Git};
use git_update::Result;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;
use tree_fs::{Tree, TreeBuilder};

/// In-memory git that answers scripted commands and records every call.
#[derive(Default)]
pub struct FakeGit {
    responses: HashMap<String, CommandOutput>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, command: &str, stdout: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            CommandOutput {
                success: true,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    pub fn fail(mut self, command: &str, stderr: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn slow(mut self, command: &str, delay: Duration) -> Self {
        self.delays.insert(command.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn invoked(&self, subcommand: &str) -> bool {
        self.calls()
            .iter()
            .any(|call| call.split(' ').next() == Some(subcommand))
    }
}

impl Git for FakeGit {
    fn execute(&self, args: &[&str]) -> Result<CommandOutput> {
        let command = args.join(" ");
        self.calls.lock().unwrap().push(command.clone());
        if let Some(delay) = self.delays.get(&command) {
            std::thread::sleep(*delay);
        }
        Ok(self
            .responses
            .get(&command)
            .cloned()
            .unwrap_or_else(|| CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: format!("fatal: unscripted command `{command}`"),
            }))
    }
}

pub const LOG_FORMAT: &str = "log --pretty=format:%H%x1f%s%x1f%b";

/// A clean checkout at `aaa111` whose remote `main` moved to `bbb222`.
pub fn behind_remote() -> FakeGit {
    FakeGit::new()
        .on("rev-parse --abbrev-ref HEAD", "main\n")
        .on("rev-parse HEAD", "aaa111\n")
        .on("remote get-url origin", "git@github.com:acme/app.git\n")
        .on("status --porcelain", "")
        .on("fetch origin main", "")
        .on("rev-parse origin/main", "bbb222\n")
        .on(
            "diff --numstat --no-renames aaa111 bbb222",
            "3\t1\tsrc/app.rs\n5\t0\tsrc/login.rs\n",
        )
        .on("diff --no-renames aaa111 bbb222", "diff --git a/src/app.rs b/src/app.rs\n")
        .on(
            &format!("{LOG_FORMAT} aaa111..bbb222"),
            "c2\u{1f}fix: crash on start\u{1f}\nc1\u{1f}feat: login\u{1f}adds a form\n",
        )
        .fail("show bbb222:CHANGELOG.md", "fatal: path does not exist")
        .on(
            "diff --stat --no-renames aaa111 bbb222",
            " src/app.rs   | 4 +++-\n src/login.rs | 5 +++++\n 2 files changed, 8 insertions(+), 1 deletion(-)\n",
        )
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .expect("Failed to parse git output")
        .trim()
        .to_string()
}

fn configure_user(dir: &Path) {
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "user.email", "test@example.com"]);
}

/// A bare `origin`, a working copy cloned from it, and a second clone used
/// to publish new upstream commits.
pub struct Fixture {
    pub origin: Tree,
    pub app: Tree,
    pub upstream: Tree,
}

impl Fixture {
    pub fn new() -> Self {
        let origin = TreeBuilder::default()
            .create()
            .expect("Failed to create origin tree");
        git(&origin.root, &["init", "--bare"]);
        git(&origin.root, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let app = TreeBuilder::default()
            .add_file("file1.txt", "original content")
            .add_file("dir1/file2.txt", "file 2 content")
            .create()
            .expect("Failed to create app tree");
        git(&app.root, &["init"]);
        configure_user(&app.root);
        git(&app.root, &["add", "."]);
        git(&app.root, &["commit", "-m", "feat: initial import"]);
        git(&app.root, &["branch", "-M", "main"]);
        let origin_path = origin.root.to_string_lossy().to_string();
        git(&app.root, &["remote", "add", "origin", &origin_path]);
        git(&app.root, &["push", "-u", "origin", "main"]);

        let upstream = TreeBuilder::default()
            .create()
            .expect("Failed to create upstream tree");
        git(&upstream.root, &["clone", &origin_path, "."]);
        configure_user(&upstream.root);

        Self {
            origin,
            app,
            upstream,
        }
    }

    /// Commits `content` to `path` in the upstream clone and pushes it.
    pub fn publish(&self, path: &str, content: &str, subject: &str) -> String {
        let target = self.upstream.root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&target, content).expect("Failed to write upstream file");
        git(&self.upstream.root, &["add", "--all"]);
        git(&self.upstream.root, &["commit", "-m", subject]);
        git(&self.upstream.root, &["push", "origin", "main"]);
        self.head(&self.upstream.root)
    }

    pub fn head(&self, dir: &Path) -> String {
        git(dir, &["rev-parse", "HEAD"])
    }

    pub fn remote_tracking_head(&self) -> String {
        git(&self.app.root, &["rev-parse", "origin/main"])
    }
}
