//! omni-post - Compose and publish posts across social platforms

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use libomnicast::poster::{DispatchPolicy, Dispatcher};
use libomnicast::scheduling::parse_schedule;
use libomnicast::store::PostStore;
use libomnicast::types::{MediaFile, PostContent};
use libomnicast::{Config, OmnicastError, PlatformRegistry, Post, PostStatus, Result};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "omni-post")]
#[command(version)]
#[command(about = "Compose and publish posts across social platforms")]
#[command(long_about = "\
omni-post - Compose and publish posts across social platforms

DESCRIPTION:
    omni-post creates a post from text and optional media attachments and
    either publishes it immediately, schedules it, or saves it as a draft.
    Scheduled posts are picked up by the omni-send daemon.

USAGE:
    # Post to every connected account now
    omni-post \"Hello from the command line\"

    # Post to specific accounts
    omni-post -a brand-twitter,brand-linkedin \"Targeted update\"

    # Attach media
    omni-post -m photo.jpg -m chart.png \"Quarterly numbers\"

    # Schedule for later
    omni-post -s \"tomorrow 9am\" \"Morning announcement\"
    omni-post -s 2h \"In two hours\"
    omni-post -s random:1h-4h \"Sometime this afternoon\"

    # Save a draft
    omni-post --draft \"Work in progress\"

    # Read content from stdin
    echo \"Piped content\" | omni-post

EXIT CODES:
    0 - Success
    1 - Posting failed
    2 - Configuration error
    3 - Invalid input
")]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target account names or ids (comma-separated; default: all connected)
    #[arg(short, long)]
    accounts: Option<String>,

    /// Attach a media file (repeatable)
    #[arg(short, long, value_name = "PATH")]
    media: Vec<PathBuf>,

    /// Alt text for attachments, matched to --media by position (repeatable)
    #[arg(long, value_name = "TEXT")]
    alt: Vec<String>,

    /// Schedule instead of posting now (e.g. "2h", "tomorrow 9am", "random:1h-4h")
    #[arg(short, long, value_name = "WHEN")]
    schedule: Option<String>,

    /// Save as draft without posting
    #[arg(short, long)]
    draft: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    libomnicast::logging::init_cli(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let content = read_content(cli.content.clone())?;
    if content.trim().is_empty() && cli.media.is_empty() {
        return Err(OmnicastError::InvalidInput(
            "Post needs content or at least one media attachment".to_string(),
        ));
    }

    let config = Config::load()?;
    let store = PostStore::new(&config.database.path).await?;

    let targets = resolve_targets(&store, cli.accounts.as_deref()).await?;
    let media = load_media(&cli.media, &cli.alt)?;

    let mut post = Post::new(PostContent::Universal(content), targets);
    post.media = media;

    if cli.draft {
        store.add_post(&post).await?;
        print_saved(&cli.format, &post, "draft");
        return Ok(());
    }

    if let Some(schedule) = &cli.schedule {
        let last_scheduled = last_scheduled_at(&store).await?;
        let when = parse_schedule(schedule, last_scheduled)?;

        post.status = PostStatus::Scheduled;
        post.scheduled_at = Some(when);
        store.add_post(&post).await?;

        info!(post_id = %post.id, scheduled_at = %when, "Post scheduled");
        print_saved(&cli.format, &post, "scheduled");
        return Ok(());
    }

    // Immediate publish
    store.add_post(&post).await?;
    let registry = PlatformRegistry::from_config(&config)?;
    let dispatcher = Dispatcher::new(
        store.clone(),
        registry,
        DispatchPolicy::from_config(&config.scheduler),
    );
    let report = dispatcher.dispatch(&post).await?;

    let stored = store
        .get_post(&post.id)
        .await?
        .ok_or_else(|| OmnicastError::InvalidInput("Post vanished during dispatch".to_string()))?;

    match cli.format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "id": stored.id,
                "status": stored.status.as_str(),
                "post_urls": stored.post_urls,
                "error": stored.error,
                "succeeded": report.succeeded(),
                "failed": report.failed(),
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        }
        _ => {
            for result in &report.results {
                if result.success {
                    println!(
                        "✓ {} ({}): {}",
                        result.account_id,
                        result.platform,
                        result.post_url.as_deref().unwrap_or("posted")
                    );
                } else {
                    println!(
                        "✗ {} ({}): {}",
                        result.account_id,
                        result.platform,
                        result.error.as_deref().unwrap_or("failed")
                    );
                }
            }
            println!("{}: {}", stored.status.as_str(), stored.id);
        }
    }

    if stored.status == PostStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Positional content, or stdin when absent
fn read_content(arg: Option<String>) -> Result<String> {
    match arg {
        Some(content) => Ok(content),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| OmnicastError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
            Ok(buffer.trim_end().to_string())
        }
    }
}

/// Match `--accounts` entries against account names and ids; default to
/// every connected account
async fn resolve_targets(store: &PostStore, accounts: Option<&str>) -> Result<Vec<String>> {
    let all = store.list_accounts().await?;

    let targets = match accounts {
        None => all
            .iter()
            .filter(|a| a.connected)
            .map(|a| a.id.clone())
            .collect::<Vec<_>>(),
        Some(spec) => {
            let mut targets = Vec::new();
            for name in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let found = all
                    .iter()
                    .find(|a| a.account_name == name || a.id == name)
                    .ok_or_else(|| {
                        OmnicastError::InvalidInput(format!("Unknown account: {}", name))
                    })?;
                targets.push(found.id.clone());
            }
            targets
        }
    };

    if targets.is_empty() {
        return Err(OmnicastError::InvalidInput(
            "No target accounts. Connect one with omni-accounts add".to_string(),
        ));
    }
    Ok(targets)
}

fn load_media(paths: &[PathBuf], alts: &[String]) -> Result<Vec<MediaFile>> {
    let mut media = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        media.push(MediaFile::from_path(path, alts.get(i).cloned())?);
    }
    Ok(media)
}

/// Most distant scheduled time in the queue, used to anchor random schedules
async fn last_scheduled_at(store: &PostStore) -> Result<Option<i64>> {
    let scheduled = store.list_posts(Some(PostStatus::Scheduled), 1000).await?;
    Ok(scheduled
        .iter()
        .filter_map(|p| p.scheduled_at.map(|t| t.timestamp()))
        .max())
}

fn print_saved(format: &str, post: &Post, verb: &str) {
    match format {
        "json" => {
            let output = serde_json::json!({
                "id": post.id,
                "status": post.status.as_str(),
                "scheduled_at": post.scheduled_at.map(|t| t.to_rfc3339()),
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        }
        _ => match post.scheduled_at {
            Some(when) => println!("{} {} for {}", verb, post.id, when),
            None => println!("{} {}", verb, post.id),
        },
    }
}
