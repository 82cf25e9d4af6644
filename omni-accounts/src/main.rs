//! omni-accounts - Manage connected platform accounts

use clap::{Parser, Subcommand};
use libomnicast::store::PostStore;
use libomnicast::types::PlatformAccount;
use libomnicast::{Config, OmnicastError, PlatformId, PlatformRegistry, Result};

#[derive(Parser, Debug)]
#[command(name = "omni-accounts")]
#[command(version)]
#[command(about = "Manage connected platform accounts")]
#[command(long_about = "\
omni-accounts - Manage connected platform accounts

DESCRIPTION:
    omni-accounts connects, inspects, and removes the platform accounts
    that omni-post and omni-send publish to. Connecting an account runs
    the platform's credential check so token problems surface here rather
    than at posting time.

USAGE:
    # Connect a new account
    omni-accounts add --platform twitter --name brand-twitter --token <TOKEN>

    # List accounts
    omni-accounts list
    omni-accounts list --format json

    # Manage an account
    omni-accounts rename brand-twitter brand-main
    omni-accounts disconnect brand-main
    omni-accounts connect brand-main
    omni-accounts remove brand-main

EXIT CODES:
    0 - Success
    1 - Runtime error
    2 - Authentication or configuration error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect a new account
    Add {
        /// Platform (facebook, instagram, youtube, twitter, linkedin)
        #[arg(short, long)]
        platform: PlatformId,

        /// Local name for the account
        #[arg(short, long)]
        name: String,

        /// Access token for the platform API
        #[arg(short, long)]
        token: String,

        /// Skip the credential check
        #[arg(long)]
        no_verify: bool,
    },
    /// List accounts
    List {
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Rename an account
    Rename {
        /// Current account name or id
        account: String,

        /// New name
        new_name: String,
    },
    /// Mark an account disconnected so posting skips it
    Disconnect {
        /// Account name or id
        account: String,
    },
    /// Reconnect a disconnected account
    Connect {
        /// Account name or id
        account: String,
    },
    /// Delete an account
    Remove {
        /// Account name or id
        account: String,
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
        Command::Add {
            platform,
            name,
            token,
            no_verify,
        } => {
            if store
                .list_accounts()
                .await?
                .iter()
                .any(|a| a.account_name == name)
            {
                return Err(OmnicastError::InvalidInput(format!(
                    "An account named {} already exists",
                    name
                )));
            }

            let account = PlatformAccount::new(platform, name, token);

            if !no_verify {
                let registry = PlatformRegistry::from_config(&config)?;
                let adapter = registry.get(platform).ok_or_else(|| {
                    OmnicastError::InvalidInput(format!(
                        "{} is not enabled in the configuration",
                        platform
                    ))
                })?;
                adapter
                    .preflight(&account)
                    .await
                    .map_err(OmnicastError::Platform)?;
            }

            store.add_account(&account).await?;
            println!("added {} ({})", account.account_name, account.id);
        }
        Command::List { format } => {
            let accounts = store.list_accounts().await?;
            print_accounts(&format, &accounts);
        }
        Command::Rename { account, new_name } => {
            let account = find_account(&store, &account).await?;
            store.rename_account(&account.id, &new_name).await?;
            println!("renamed {} to {}", account.account_name, new_name);
        }
        Command::Disconnect { account } => {
            let account = find_account(&store, &account).await?;
            store.set_account_connected(&account.id, false).await?;
            println!("disconnected {}", account.account_name);
        }
        Command::Connect { account } => {
            let account = find_account(&store, &account).await?;
            store.set_account_connected(&account.id, true).await?;
            println!("connected {}", account.account_name);
        }
        Command::Remove { account } => {
            let account = find_account(&store, &account).await?;
            store.delete_account(&account.id).await?;
            println!("removed {}", account.account_name);
        }
    }

    Ok(())
}

async fn find_account(store: &PostStore, name_or_id: &str) -> Result<PlatformAccount> {
    if let Some(account) = store.get_account(name_or_id).await? {
        return Ok(account);
    }

    store
        .list_accounts()
        .await?
        .into_iter()
        .find(|a| a.account_name == name_or_id)
        .ok_or_else(|| OmnicastError::InvalidInput(format!("No such account: {}", name_or_id)))
}

fn print_accounts(format: &str, accounts: &[PlatformAccount]) {
    if format == "json" {
        let entries: Vec<_> = accounts
            .iter()
            .map(|a| {
                serde_json::json!({
                    "id": a.id,
                    "platform": a.platform.as_str(),
                    "name": a.account_name,
                    "display_name": a.profile.display_name,
                    "connected": a.connected,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return;
    }

    if accounts.is_empty() {
        println!("No accounts. Connect one with: omni-accounts add");
        return;
    }

    for account in accounts {
        let state = if account.connected {
            "connected"
        } else {
            "disconnected"
        };
        println!(
            "{:10} {:20} {:12} {}",
            account.platform.as_str(),
            account.account_name,
            state,
            account.id
        );
    }
}
