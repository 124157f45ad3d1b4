use clap::Parser;
use llm_changelog::commands::changelog::{changelog_command, ChangelogArgs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "changelog")]
#[command(about = "Generate a changelog for a GitHub repository range using an LLM", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository in owner/repo form
    repository: String,

    /// Starting tag of the range
    #[arg(long)]
    from_tag: Option<String>,

    /// Ending tag of the range
    #[arg(long)]
    to_tag: Option<String>,

    /// Collect everything since this tag
    #[arg(long, conflicts_with_all = ["from_tag", "to_tag"])]
    since_tag: Option<String>,

    /// Branch to compare against with --since-tag (default: repository default branch)
    #[arg(short, long)]
    branch: Option<String>,

    /// Output file (default: <owner>-<repo>_<from>_to_<to>.md)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// LLM provider (claude or gemini)
    #[arg(long)]
    provider: Option<String>,

    /// Continue with partial data when GitHub truncates the comparison
    #[arg(long)]
    allow_partial: bool,

    /// Print the collected payload as JSON and skip the LLM
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("llm_changelog=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let args = ChangelogArgs {
        repository: cli.repository,
        from_tag: cli.from_tag,
        to_tag: cli.to_tag,
        since_tag: cli.since_tag,
        branch: cli.branch,
        output: cli.output,
        token: cli.token,
        config: cli.config,
        provider: cli.provider,
        allow_partial: cli.allow_partial,
        json: cli.json,
    };

    if let Some(path) = changelog_command(args).await? {
        println!("Changelog successfully written to {}", path.display());
    }

    Ok(())
}
