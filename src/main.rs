use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use team_wrapped::report::Report;
use team_wrapped::store::{self, RecordStore};
use team_wrapped::throttle::FixedInterval;
use team_wrapped::{calculate_metrics, AppConfig, CollectedData, Collector, GitHubClient, WebStats};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Summarize a team's year of GitHub activity across an organization
#[derive(Parser)]
#[command(name = "team-wrapped", version)]
#[command(long_about = r#"team-wrapped - Summarize a team's GitHub activity

Reads GITHUB_TOKEN, GITHUB_ORG, TEAM_MEMBERS and SINCE_DATE from the environment
(or a .env file), collects pull requests, comments, commits and workflow runs,
prints a summary and writes the stats document for the web page."#)]
struct Args {
    /// Recompute statistics from previously stored records instead of calling the API
    #[arg(long)]
    skip_collection: bool,

    /// Skip fetching per-commit additions and deletions
    #[arg(long)]
    skip_commit_stats: bool,

    /// Directory for stored records (overrides OUTPUT_DIR)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Path of the generated stats.json (overrides WEB_STATS_PATH)
    #[arg(long, value_name = "PATH")]
    web_stats: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "team_wrapped=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("Failed to load configuration from environment")?;

    tokio::select! {
        result = run(&args, &config) => result,
        _ = shutdown_signal() => {
            tracing::warn!("Interrupted, collected records were not saved");
            std::process::exit(130);
        }
    }
}

async fn run(args: &Args, config: &AppConfig) -> anyhow::Result<()> {
    let store = RecordStore::new(
        args.output_dir
            .clone()
            .unwrap_or_else(|| config.output_dir.clone()),
    );

    let data = if args.skip_collection {
        tracing::info!(dir = %store.dir().display(), "Skipping collection, loading stored records");
        store.load().context("Failed to load stored records")?
    } else {
        let data = collect(args, config).await?;
        store.save(&data).context("Failed to save collected records")?;
        data
    };

    let metrics = calculate_metrics(&data, config.since_date);
    println!("{}", Report(&metrics));

    let web_stats_path = args
        .web_stats
        .clone()
        .unwrap_or_else(|| config.web_stats_path.clone());
    let web_stats = WebStats::new(&metrics, config.team_members.len());
    store::write_web_stats(&web_stats_path, &web_stats)
        .with_context(|| format!("Failed to write {}", web_stats_path.display()))?;

    Ok(())
}

async fn collect(args: &Args, config: &AppConfig) -> anyhow::Result<CollectedData> {
    let client = GitHubClient::new(config).context("Failed to build GitHub client")?;
    let throttle = FixedInterval::new(config.repo_pacing());

    let mut collector = Collector::new(&client, &throttle, config);
    if args.skip_commit_stats {
        collector = collector.without_commit_stats();
    }

    let data = collector.collect().await?;
    tracing::info!(
        repos = data.repos.len(),
        prs = data.pull_requests.len(),
        comments = data.comments.len(),
        commits = data.commits.len(),
        workflow_runs = data.workflow_runs.len(),
        "Data collection complete"
    );
    Ok(data)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, aborting collection");
}
