use clap::{Parser, Subcommand};
use git_update::api;
use git_update::changelog::ChangelogSynthesizer;
use git_update::config::UpdateConfig;
use git_update::git::GitCli;
use git_update::metadata::GitHubClient;
use git_update::repository::RepositoryStateReader;
use git_update::UpdateRequest;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

fn parse_ref(s: &str) -> std::result::Result<String, String> {
    git_update::git::validate_ref(s.trim())
        .map(ToString::to_string)
        .map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local Git repository (defaults to the current directory)
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    /// JSON config file (defaults come from the environment otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(global = true, short, long, default_value = "error")]
    log: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the remote branch has updates and describe them
    Check {
        /// Branch to compare against on the remote
        #[arg(short, long, value_parser = parse_ref)]
        branch: String,

        /// Mark the request as an automatic update
        #[arg(long)]
        auto_update: bool,
    },
    /// Print local repository identity and hosted metadata
    Info,
    /// Print the changelog between two references
    Changelog {
        #[arg(long, value_parser = parse_ref)]
        from: String,

        #[arg(long, value_parser = parse_ref)]
        to: String,
    },
}

#[tokio::main]
async fn main() -> git_update::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive(cli.log.into());

    fmt()
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .pretty()
        .init();

    let mut config = match &cli.config {
        Some(path) => UpdateConfig::from_json_file(path)?,
        None => UpdateConfig::from_env(cli.repo.as_deref().unwrap_or(Path::new("."))),
    };
    if let Some(repo) = cli.repo {
        config.repo_path = repo;
    }
    debug!(
        repo_path = %config.repo_path.display(),
        remote = %config.remote,
        "Configuration loaded"
    );

    match cli.command {
        Command::Check {
            branch,
            auto_update,
        } => {
            let orchestrator = git_update::new(&config);
            let request = UpdateRequest {
                branch,
                auto_update: auto_update.then_some(true),
            };
            let report = orchestrator.check(&request).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Info => {
            let git = GitCli::new(config.repo_path.clone()).with_timeout(config.stage_timeout());
            let git = Arc::new(git);
            let reader = RepositoryStateReader::new(git, config.remote.clone());
            let host = GitHubClient::from_config(&config);
            let info = api::git_info(&reader, &host, &config).await;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Changelog { from, to } => {
            let git = GitCli::new(config.repo_path.clone()).with_timeout(config.stage_timeout());
            let git = Arc::new(git);
            let synthesizer = ChangelogSynthesizer::new(git, config.changelog_path.clone());
            println!("{}", synthesizer.synthesize(&from, &to));
        }
    }

    Ok(())
}
