use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use commitlens_core::{
    list_branches, AnalysisReport, AnalysisRequest, Analyzer, GitHubClient, OpenAIClient,
    ProgressMessage, ProgressReceiver, ProgressRegistry, ANY_BRANCH, DEFAULT_GITHUB_API_URL,
    DEFAULT_MAX_COMMITS, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL,
};

/// commitlens: AI-summarized commit history reports
#[derive(Parser, Debug)]
#[command(name = "commitlens")]
#[command(about = "AI-summarized commit history reports for GitHub repositories")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze the commits of a repository over a date window
    Analyze(AnalyzeArgs),
    /// Validate a repository reference and list its branches
    Branches(BranchesArgs),
}

#[derive(Parser, Debug)]
struct GitHubArgs {
    /// GitHub token (if not provided, will use GITHUB_TOKEN environment variable)
    #[arg(long)]
    github_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, default_value = DEFAULT_GITHUB_API_URL)]
    github_api_url: String,
}

impl GitHubArgs {
    fn client(self) -> Result<GitHubClient> {
        let token = self
            .github_token
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty());
        GitHubClient::with_base_url(&self.github_api_url, token)
    }
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Repository as owner/name or https://github.com/owner/name
    repo: String,

    /// Start of the window (ISO-8601 timestamp or YYYY-MM-DD)
    #[arg(long)]
    since: String,

    /// End of the window (ISO-8601 timestamp or YYYY-MM-DD)
    #[arg(long)]
    until: String,

    /// Branch to analyze; defaults to the repository's default branch
    #[arg(long, conflicts_with = "all_branches")]
    branch: Option<String>,

    /// Analyze every branch, deduplicating commits
    #[arg(long)]
    all_branches: bool,

    /// Keep merge commits
    #[arg(long)]
    include_merges: bool,

    /// Maximum number of commits to analyze
    #[arg(long, default_value_t = DEFAULT_MAX_COMMITS)]
    max_commits: usize,

    /// OpenAI model for summaries (if not provided, will use OPENAI_MODEL environment variable)
    #[arg(long)]
    model: Option<String>,

    /// OpenAI API key (if not provided, will use OPENAI_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// Print the full report as JSON instead of Markdown
    #[arg(long)]
    json: bool,

    /// Do not print progress to stderr
    #[arg(long)]
    quiet: bool,

    #[command(flatten)]
    github: GitHubArgs,
}

#[derive(Parser, Debug)]
struct BranchesArgs {
    /// Repository as owner/name or https://github.com/owner/name
    repo: String,

    #[command(flatten)]
    github: GitHubArgs,
}

/// Print narrated progress until the run completes.
async fn print_progress(mut receiver: ProgressReceiver) {
    while let Some(message) = receiver.recv().await {
        match message {
            ProgressMessage::Event(event) => {
                eprintln!("[{}] {}", event.timestamp.format("%H:%M:%S"), event.message)
            }
            ProgressMessage::Ready => {}
            ProgressMessage::Done => break,
        }
    }
}

fn print_report(report: &AnalysisReport) {
    println!("{}", report.rollup.trim_end());
    println!();
    println!(
        "{} commits, {} files, +{}/-{} in {} between {} and {}",
        report.aggregate.count,
        report.aggregate.files,
        report.aggregate.additions,
        report.aggregate.deletions,
        report.repo,
        report.since,
        report.until
    );
    for enriched in &report.commits {
        println!(
            "  {} [{}/{}] {}",
            enriched.commit.short_sha(),
            enriched.ai.change_type,
            enriched.ai.risk.as_str(),
            enriched.ai.summary
        );
    }
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let api_key = args
        .api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .context(
            "OpenAI API key must be provided via --api-key argument or OPENAI_API_KEY environment variable",
        )?;
    let model = args
        .model
        .or_else(|| std::env::var("OPENAI_MODEL").ok())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let registry = Arc::new(ProgressRegistry::new());
    let analyzer = Analyzer::new(
        Arc::new(args.github.client()?),
        Arc::new(OpenAIClient::with_base_url(&args.openai_base_url, api_key)?),
        registry.clone(),
        model,
    );

    let request_id = uuid::Uuid::new_v4().to_string();
    let printer = if args.quiet {
        None
    } else {
        let receiver = registry.subscribe(&request_id).await;
        Some(tokio::spawn(print_progress(receiver)))
    };

    let branch = if args.all_branches {
        Some(ANY_BRANCH.to_string())
    } else {
        args.branch
    };
    let request = AnalysisRequest {
        repo: args.repo,
        since: args.since,
        until: args.until,
        branch,
        include_merges: args.include_merges,
        max_commits: args.max_commits,
        request_id: Some(request_id),
    };

    let result = analyzer.analyze(request).await;
    if let Some(printer) = printer {
        // The run has completed its channel, so the printer is finishing
        let _ = printer.await;
    }
    let report = result?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn run_branches(args: BranchesArgs) -> Result<()> {
    let client = args.github.client()?;
    let listing = list_branches(&client, &args.repo).await?;

    if !listing.valid {
        anyhow::bail!("Not a valid repository reference: {}", args.repo);
    }

    println!(
        "{} ({})",
        listing.repo,
        if listing.private { "private" } else { "public" }
    );
    let default_branch = listing.default_branch.unwrap_or_default();
    for branch in &listing.branches {
        let marker = if *branch == default_branch { "*" } else { " " };
        println!("{} {}", marker, branch);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await,
        Commands::Branches(args) => run_branches(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_defaults() {
        let cli = Cli::parse_from([
            "commitlens",
            "analyze",
            "octo/demo",
            "--since",
            "2025-01-01",
            "--until",
            "2025-01-31",
        ]);
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.max_commits, 60);
        assert!(!args.include_merges);
        assert_eq!(args.branch, None);
        assert_eq!(args.github.github_api_url, "https://api.github.com");
    }

    #[test]
    fn test_branch_and_all_branches_conflict() {
        let result = Cli::try_parse_from([
            "commitlens",
            "analyze",
            "octo/demo",
            "--since",
            "2025-01-01",
            "--until",
            "2025-01-31",
            "--branch",
            "main",
            "--all-branches",
        ]);
        assert!(result.is_err());
    }
}
