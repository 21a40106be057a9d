use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod utils;

use marketchat::config::{self, SyncConfig};
use marketchat::credentials::{load_credentials, save_credentials, Credentials};
use marketchat::models::Contact;
use marketchat::MessengerSession;

/// Command line arguments for marketchat
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "marketchat: keep marketplace conversations in sync from the terminal."
)]
struct Args {
    /// Directory holding config.json and credentials.json
    #[arg(long, value_name = "PATH")]
    config_dir: Option<PathBuf>,

    /// Write logs to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List conversations with unread counts
    Conversations,
    /// Send a text message to a contact
    Send { contact: String, text: String },
    /// Search professionals by name or trade
    Search { query: String },
    /// Stay connected and log incoming activity until Ctrl-C
    Watch,
}

/// Credentials from the environment, the stored file, or a prompt
fn resolve_credentials() -> Result<Credentials> {
    if let (Ok(user_id), Ok(token)) = (env::var("MARKETCHAT_USER_ID"), env::var("MARKETCHAT_TOKEN")) {
        return Ok(Credentials::new(&user_id, &token));
    }
    if let Some(credentials) = load_credentials()? {
        info!("Using cached credentials for {}", credentials.user_id);
        return Ok(credentials);
    }

    eprintln!("Enter your user id:");
    let user_id = utils::read_line()?;
    eprintln!("Enter your access token:");
    let token = utils::read_line()?;
    if user_id.is_empty() || token.is_empty() {
        return Err(anyhow!("user id and token are required"));
    }
    let credentials = Credentials::new(&user_id, &token);
    save_credentials(&credentials)?;
    Ok(credentials)
}

fn print_contact(contact: &Contact) {
    let status = if contact.online { "online" } else { "offline" };
    let unread = if contact.unread_count > 0 {
        format!(" ({} unread)", contact.unread_count)
    } else {
        String::new()
    };
    println!(
        "{:<24} {:<8} {}{}",
        contact.display_name, status, contact.last_message_text, unread
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = args.log_file.as_ref().and_then(|path| path.to_str());
    utils::setup_logging(log_file, args.log_level)?;

    if let Some(dir) = &args.config_dir {
        std::fs::create_dir_all(dir)?;
        config::set_config_dir_override(dir.clone());
    }

    let sync_config = SyncConfig::load()?;
    let credentials = resolve_credentials()?;
    info!("Opening session for {} against {}", credentials.user_id, sync_config.api_base_url);

    let mut session = MessengerSession::open(sync_config, &credentials).await?;
    let messenger = session.messenger();

    match args.command {
        Command::Conversations => {
            for contact in messenger.contacts().await {
                print_contact(&contact);
            }
        }
        Command::Send { contact, text } => {
            let message = messenger.send_message(&contact, &text).await?;
            println!("Sent {} to {}", message.id, contact);
            // Give the echo a moment to replace the optimistic entry.
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Some(last) = messenger.messages(&contact).await.last() {
                println!("Last message id: {}", last.id);
            }
        }
        Command::Search { query } => {
            let (search, mut results) = session.professional_search();
            search.query(&query);
            results.changed().await?;
            let found = results.borrow().clone();
            if let Some(error) = found.error {
                return Err(anyhow!("search failed: {}", error));
            }
            for professional in found.professionals {
                println!(
                    "{:<16} {:<24} {}",
                    professional.id,
                    professional.display_name,
                    professional.headline.unwrap_or_default()
                );
            }
        }
        Command::Watch => {
            let mut notifications = session
                .take_notifications()
                .ok_or_else(|| anyhow!("notification stream already taken"))?;
            println!("Watching {} conversations, Ctrl-C to quit", messenger.contacts().await.len());
            loop {
                tokio::select! {
                    Some(notification) = notifications.recv() => {
                        println!("{}: {}", notification.sender_name, notification.preview);
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    session.close().await;
    Ok(())
}
