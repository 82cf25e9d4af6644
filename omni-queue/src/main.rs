//! omni-queue - Inspect and manage the post queue

use clap::{Parser, Subcommand};
use libomnicast::scheduling::parse_schedule;
use libomnicast::store::{PostPatch, PostStore};
use libomnicast::types::now_seconds;
use libomnicast::{Config, OmnicastError, Post, PostStatus, Result};

#[derive(Parser, Debug)]
#[command(name = "omni-queue")]
#[command(version)]
#[command(about = "Inspect and manage the post queue")]
#[command(long_about = "\
omni-queue - Inspect and manage the post queue

DESCRIPTION:
    omni-queue lists queued posts and changes their schedule or status.
    A cancelled post becomes a draft; 'now' makes a post due immediately
    so the next omni-send scan picks it up.

USAGE:
    # List everything in the queue
    omni-queue list

    # Only failed posts, as JSON
    omni-queue list --status failed --format json

    # Show one post in full
    omni-queue show 4f7c2b1a

    # Move a post
    omni-queue reschedule 4f7c2b1a \"tomorrow 9am\"
    omni-queue now 4f7c2b1a
    omni-queue cancel 4f7c2b1a
    omni-queue remove 4f7c2b1a

    # Queue totals by status
    omni-queue stats

EXIT CODES:
    0 - Success
    1 - Runtime error
    2 - Configuration error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List posts in the queue
    List {
        /// Filter by status (draft, scheduled, posting, posted, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of posts to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show one post in full
    Show {
        /// Post id (or unique prefix)
        id: String,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Cancel a scheduled post, keeping it as a draft
    Cancel {
        /// Post id (or unique prefix)
        id: String,
    },
    /// Move a post to a new schedule
    Reschedule {
        /// Post id (or unique prefix)
        id: String,

        /// New schedule (e.g. "2h", "tomorrow 9am", "random:1h-4h")
        schedule: String,
    },
    /// Make a post due immediately
    Now {
        /// Post id (or unique prefix)
        id: String,
    },
    /// Delete a post from the queue
    Remove {
        /// Post id (or unique prefix)
        id: String,
    },
    /// Queue totals by status
    Stats {
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libomnicast::logging::init_cli(false);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = PostStore::new(&config.database.path).await?;

    match cli.command {
        Command::List {
            status,
            limit,
            format,
        } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let posts = store.list_posts(status, limit).await?;
            print_posts(&format, &posts);
        }
        Command::Show { id, format } => {
            let post = find_post(&store, &id).await?;
            print_post_detail(&format, &post);
        }
        Command::Cancel { id } => {
            let post = find_post(&store, &id).await?;
            if post.status != PostStatus::Scheduled {
                return Err(OmnicastError::InvalidInput(format!(
                    "Post {} is {}, only scheduled posts can be cancelled",
                    post.id,
                    post.status.as_str()
                )));
            }
            let patch = PostPatch {
                status: Some(PostStatus::Draft),
                scheduled_at: Some(None),
                ..Default::default()
            };
            store.update_post(&post.id, patch).await?;
            println!("cancelled {}", post.id);
        }
        Command::Reschedule { id, schedule } => {
            let post = find_post(&store, &id).await?;
            let when = parse_schedule(&schedule, None)?;
            let patch = PostPatch {
                status: Some(PostStatus::Scheduled),
                scheduled_at: Some(Some(when)),
                error: Some(None),
                ..Default::default()
            };
            store.update_post(&post.id, patch).await?;
            println!("rescheduled {} for {}", post.id, when);
        }
        Command::Now { id } => {
            let post = find_post(&store, &id).await?;
            let patch = PostPatch {
                status: Some(PostStatus::Scheduled),
                scheduled_at: Some(Some(now_seconds())),
                error: Some(None),
                ..Default::default()
            };
            store.update_post(&post.id, patch).await?;
            println!("queued {} for immediate dispatch", post.id);
        }
        Command::Remove { id } => {
            let post = find_post(&store, &id).await?;
            store.delete_post(&post.id).await?;
            println!("removed {}", post.id);
        }
        Command::Stats { format } => {
            print_stats(&store, &format).await?;
        }
    }

    Ok(())
}

fn parse_status(s: &str) -> Result<PostStatus> {
    match s {
        "draft" | "scheduled" | "posting" | "posted" | "failed" => Ok(PostStatus::parse(s)),
        _ => Err(OmnicastError::InvalidInput(format!(
            "Unknown status: {} (expected draft, scheduled, posting, posted, or failed)",
            s
        ))),
    }
}

/// Look a post up by full id or unique prefix
async fn find_post(store: &PostStore, id: &str) -> Result<Post> {
    if let Some(post) = store.get_post(id).await? {
        return Ok(post);
    }

    let posts = store.list_posts(None, 10_000).await?;
    let mut matches = posts.into_iter().filter(|p| p.id.starts_with(id));

    match (matches.next(), matches.next()) {
        (Some(post), None) => Ok(post),
        (Some(_), Some(_)) => Err(OmnicastError::InvalidInput(format!(
            "Ambiguous post id prefix: {}",
            id
        ))),
        _ => Err(OmnicastError::InvalidInput(format!("No such post: {}", id))),
    }
}

fn print_posts(format: &str, posts: &[Post]) {
    if format == "json" {
        let entries: Vec<_> = posts.iter().map(post_summary).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return;
    }

    if posts.is_empty() {
        println!("Queue is empty");
        return;
    }

    for post in posts {
        let when = post
            .scheduled_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let mut preview = post.content.preview().replace('\n', " ");
        if preview.chars().count() > 50 {
            preview = preview.chars().take(47).collect::<String>() + "...";
        }
        println!(
            "{}  {:9}  {:25}  {}",
            &post.id[..8.min(post.id.len())],
            post.status.as_str(),
            when,
            preview
        );
    }
}

fn post_summary(post: &Post) -> serde_json::Value {
    serde_json::json!({
        "id": post.id,
        "status": post.status.as_str(),
        "scheduled_at": post.scheduled_at.map(|t| t.to_rfc3339()),
        "targets": post.targets,
        "media_count": post.media.len(),
        "preview": post.content.preview(),
        "error": post.error,
    })
}

fn print_post_detail(format: &str, post: &Post) {
    if format == "json" {
        let mut value = post_summary(post);
        value["post_urls"] = serde_json::json!(post.post_urls);
        value["created_at"] = serde_json::json!(post.created_at.to_rfc3339());
        value["posted_at"] = serde_json::json!(post.posted_at.map(|t| t.to_rfc3339()));
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return;
    }

    println!("id:           {}", post.id);
    println!("status:       {}", post.status.as_str());
    println!("created:      {}", post.created_at.to_rfc3339());
    if let Some(when) = post.scheduled_at {
        println!("scheduled:    {}", when.to_rfc3339());
    }
    if let Some(when) = post.posted_at {
        println!("posted:       {}", when.to_rfc3339());
    }
    println!("targets:      {}", post.targets.join(", "));
    if !post.media.is_empty() {
        println!("media:");
        for file in &post.media {
            println!("  {} ({})", file.file_path, file.mime.as_str());
        }
    }
    if !post.post_urls.is_empty() {
        println!("urls:");
        for (account, url) in &post.post_urls {
            println!("  {}: {}", account, url);
        }
    }
    if let Some(error) = &post.error {
        println!("error:        {}", error);
    }
    println!("---");
    println!("{}", post.content.preview());
}

async fn print_stats(store: &PostStore, format: &str) -> Result<()> {
    let statuses = [
        PostStatus::Draft,
        PostStatus::Scheduled,
        PostStatus::Posting,
        PostStatus::Posted,
        PostStatus::Failed,
    ];

    let mut counts = Vec::with_capacity(statuses.len());
    let mut next_due = None;
    for status in statuses {
        let posts = store.list_posts(Some(status), 100_000).await?;
        if status == PostStatus::Scheduled {
            next_due = posts.iter().filter_map(|p| p.scheduled_at).min();
        }
        counts.push((status, posts.len()));
    }

    if format == "json" {
        let mut value: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(s, n)| (s.as_str().to_string(), serde_json::json!(n)))
            .collect();
        value.insert(
            "next_due".to_string(),
            serde_json::json!(next_due.map(|t| t.to_rfc3339())),
        );
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::Value::Object(value)).unwrap_or_default()
        );
    } else {
        for (status, count) in counts {
            println!("{:10} {}", status.as_str(), count);
        }
        if let Some(when) = next_due {
            println!("next due   {}", when.to_rfc3339());
        }
    }
    Ok(())
}
